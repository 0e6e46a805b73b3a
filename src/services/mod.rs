pub mod booking_service;
pub mod object_store;
pub mod storage_gateway;
