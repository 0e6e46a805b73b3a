use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub storage_dir: String,
    pub bucket: String,
    pub region: String,
    /// Scheme clients use to reach stored objects.
    pub public_scheme: String,
    /// Host clients use to reach stored objects.
    pub public_endpoint: String,
    /// Port clients use to reach stored objects.
    pub public_port: u16,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Peer-to-peer item rental marketplace API")]
pub struct Args {
    /// Host to bind to (overrides RENTAL_MARKET_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides RENTAL_MARKET_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides RENTAL_MARKET_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory where uploaded objects are stored (overrides RENTAL_MARKET_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Object store bucket for item media (overrides RENTAL_MARKET_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("RENTAL_MARKET_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = read_port("RENTAL_MARKET_PORT", 3000)?;
        let env_db = env::var("RENTAL_MARKET_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/rental_market.db".into());
        let env_storage =
            env::var("RENTAL_MARKET_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_bucket = env::var("RENTAL_MARKET_BUCKET").unwrap_or_else(|_| "item-media".into());
        let region = env::var("RENTAL_MARKET_REGION").unwrap_or_else(|_| "local".into());
        let public_scheme =
            env::var("RENTAL_MARKET_PUBLIC_SCHEME").unwrap_or_else(|_| "http".into());
        let public_endpoint =
            env::var("RENTAL_MARKET_PUBLIC_ENDPOINT").unwrap_or_else(|_| "localhost".into());
        let public_port = read_port("RENTAL_MARKET_PUBLIC_PORT", 3000)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            bucket: args.bucket.unwrap_or(env_bucket),
            region,
            public_scheme,
            public_endpoint,
            public_port,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn read_port(var: &str, default: u16) -> Result<u16> {
    match env::var(var) {
        Ok(value) => value
            .parse::<u16>()
            .with_context(|| format!("parsing {} value `{}`", var, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", var)),
    }
}
