// Runtime settings, loaded with the 'config' crate and '.env' support

use std::time::Duration;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::session::SessionTiming;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_address: String,
    /// Base address of the dealership REST API, e.g. `http://localhost:5000/api`
    pub api_base_url: String,
    /// Vehicles per results page (`limit` on the backend)
    pub page_size: u32,
    pub request_timeout_secs: u64,
    pub search_debounce_ms: u64,
    pub range_settle_ms: u64,
    /// How long option catalogs (brands, body types, ...) are reused before refetching
    pub catalog_ttl_secs: u64,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Config::builder()
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("api_base_url", "http://localhost:5000/api")?
            .set_default("page_size", 12)?
            .set_default("request_timeout_secs", 12)?
            .set_default("search_debounce_ms", 400)?
            .set_default("range_settle_ms", 250)?
            .set_default("catalog_ttl_secs", 300)?
            // Load from a configuration file (e.g., config.toml)
            .add_source(File::with_name("config").required(false))
            // Load from environment variables (e.g., APP_API_BASE_URL)
            .add_source(Environment::with_prefix("APP").try_parsing(true));

        let settings: Settings = builder.build()?.try_deserialize()?;
        if settings.page_size == 0 {
            anyhow::bail!("page_size must be at least 1");
        }
        Ok(settings)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }

    pub fn timing(&self) -> SessionTiming {
        SessionTiming {
            page_size: self.page_size,
            request_timeout: self.request_timeout(),
            search_debounce: Duration::from_millis(self.search_debounce_ms),
            range_settle: Duration::from_millis(self.range_settle_ms),
        }
    }
}
