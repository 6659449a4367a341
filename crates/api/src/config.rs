//! Process configuration.
//!
//! Read from the environment once at startup and passed into constructors;
//! nothing below this point touches env vars.

use std::time::Duration;

/// Configuration for the API process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HS256 secret used to verify bearer tokens.
    pub jwt_secret: String,
    /// Listen address for the HTTP server.
    pub bind_addr: String,
    /// How often the expiry sweep runs; `None` disables the background task.
    pub sweep_interval: Option<Duration>,
    /// Postgres connection string for the permission ledger; `None` keeps
    /// every store in memory (dev/test).
    pub database_url: Option<String>,
}

impl AppConfig {
    /// Read configuration from the environment.
    pub fn from_env() -> Self {
        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            "dev-secret".to_string()
        });

        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        // SWEEP_INTERVAL_SECS=0 disables the background sweep.
        let sweep_interval = std::env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(300);
        let sweep_interval = (sweep_interval > 0).then(|| Duration::from_secs(sweep_interval));

        let use_persistent = std::env::var("USE_PERSISTENT_STORES")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let database_url = if use_persistent {
            std::env::var("DATABASE_URL").ok()
        } else {
            None
        };

        Self {
            jwt_secret,
            bind_addr,
            sweep_interval,
            database_url,
        }
    }

    /// In-memory configuration for tests: no Postgres, no background sweep.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            bind_addr: "127.0.0.1:0".to_string(),
            sweep_interval: None,
            database_url: None,
        }
    }
}
