//! # Query result cache
//!
//! Get/set-with-TTL/prefix-invalidate over string keys and JSON-serialized
//! values. Two backends: Redis (shared between replicas) and an in-process
//! map for development and tests.
//!
//! A miss and a transport failure look identical to callers — both come back
//! as `None` — so with the cache entirely down every query degrades to
//! "always recompute" instead of erroring.
//!
//! A single upload invalidates an unpredictable set of derived results (every
//! filter/pagination combination that would include it), so invalidation is
//! by key prefix rather than by exact key. Over-invalidation is fine;
//! missing an affected key is not.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands, Client,
};
use tracing::{debug, warn};

/// Deterministic cache key: query name, then every resolved parameter
/// (defaults included) sorted by name. Supply order never changes the key.
pub fn build_key(query_name: &str, params: &[(&str, String)]) -> String {
    let mut resolved: Vec<(&str, String)> = params.to_vec();
    resolved.sort_by(|a, b| a.0.cmp(b.0));

    let joined = resolved
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("|");

    format!("{query_name}:{joined}")
}

#[async_trait]
pub trait Cache: Send + Sync {
    /// `None` on miss, expiry, or backend failure.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store a value, overwriting any existing entry. Best effort.
    async fn set(&self, key: &str, value: &str, ttl: Duration);

    /// Delete every key starting with `prefix`. Best effort.
    async fn invalidate_prefix(&self, prefix: &str);
}

// ---------- in-process backend ----------

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// Process-local cache with lazy expiry on read.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove(key);
        }
        None
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    async fn invalidate_prefix(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }
}

// ---------- redis backend ----------

/// Redis-backed cache over the connection manager (bounded connect timeout,
/// one retry). Every Redis error is logged and swallowed.
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Self {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(100));

        let client = Client::open(redis_url).unwrap();
        let connection = client
            .get_connection_manager_with_config(config)
            .await
            .unwrap();

        Self { connection }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.connection.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("cache get failed for {key}: {e}");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) {
        let mut conn = self.connection.clone();
        let seconds = ttl.as_secs().max(1);
        if let Err(e) = conn.set_ex::<_, _, ()>(key, value, seconds).await {
            warn!("cache set failed for {key}: {e}");
        }
    }

    async fn invalidate_prefix(&self, prefix: &str) {
        let mut conn = self.connection.clone();
        let pattern = format!("{prefix}*");

        let keys: Vec<String> = {
            match conn.scan_match::<_, String>(pattern).await {
                Ok(mut iter) => {
                    let mut keys = Vec::new();
                    while let Some(key) = iter.next_item().await {
                        keys.push(key);
                    }
                    keys
                }
                Err(e) => {
                    warn!("cache scan failed for prefix {prefix}: {e}");
                    return;
                }
            }
        };

        if keys.is_empty() {
            return;
        }

        debug!("invalidating {} keys under {prefix}", keys.len());
        if let Err(e) = conn.del::<_, ()>(keys).await {
            warn!("cache invalidation failed for prefix {prefix}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_parameter_supply_order() {
        let a = build_key(
            "analytics:byCourse",
            &[
                ("limit", "10".into()),
                ("skip", "0".into()),
                ("term", "1º".into()),
            ],
        );
        let b = build_key(
            "analytics:byCourse",
            &[
                ("term", "1º".into()),
                ("skip", "0".into()),
                ("limit", "10".into()),
            ],
        );

        assert_eq!(a, b);
        assert_eq!(a, "analytics:byCourse:limit=10|skip=0|term=1º");
    }

    #[test]
    fn key_separates_query_names() {
        let a = build_key("search", &[("limit", "20".into())]);
        let b = build_key("analytics:topContributors", &[("limit", "20".into())]);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn memory_cache_round_trip() {
        let cache = MemoryCache::new();
        cache.set("search:a=1", "[1,2]", Duration::from_secs(60)).await;

        assert_eq!(cache.get("search:a=1").await.as_deref(), Some("[1,2]"));
        assert_eq!(cache.get("search:a=2").await, None);
    }

    #[tokio::test]
    async fn memory_cache_overwrites() {
        let cache = MemoryCache::new();
        cache.set("k", "old", Duration::from_secs(60)).await;
        cache.set("k", "new", Duration::from_secs(60)).await;

        assert_eq!(cache.get("k").await.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn memory_cache_expires() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_millis(30)).await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn prefix_invalidation_only_hits_prefix() {
        let cache = MemoryCache::new();
        cache.set("search:a=1", "x", Duration::from_secs(60)).await;
        cache.set("search:a=2", "y", Duration::from_secs(60)).await;
        cache
            .set("analytics:byCourse:limit=10", "z", Duration::from_secs(60))
            .await;

        cache.invalidate_prefix("search:").await;

        assert_eq!(cache.get("search:a=1").await, None);
        assert_eq!(cache.get("search:a=2").await, None);
        assert_eq!(
            cache.get("analytics:byCourse:limit=10").await.as_deref(),
            Some("z")
        );
    }
}
