pub mod health_handlers;
pub mod image_handlers;
pub mod item_handlers;
pub mod message_handlers;
pub mod object_handlers;
pub mod rental_handlers;
pub mod user_handlers;
