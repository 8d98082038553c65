use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    /// When unset the server runs with the in-process cache backend.
    pub redis_url: Option<String>,
    pub search_ttl_seconds: u64,
    pub analytics_ttl_seconds: u64,
    pub hll_precision: u8,
    pub seed_demo: bool,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("RUST_PORT", "1111"),
            redis_url: env::var("REDIS_URL").ok(),
            search_ttl_seconds: try_load("SEARCH_TTL_SECONDS", "300"),
            analytics_ttl_seconds: try_load("ANALYTICS_TTL_SECONDS", "60"),
            hll_precision: try_load("HLL_PRECISION", "14"),
            seed_demo: try_load("SEED_DEMO", "false"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
