use std::{sync::Arc, time::Duration};

use tracing::info;

use crate::analytics::Analytics;
use crate::cache::{Cache, MemoryCache, RedisCache};
use crate::config::Config;
use crate::counter::DistinctCounter;
use crate::store::Store;

pub struct AppState {
    pub config: Config,
    pub store: Arc<Store>,
    pub analytics: Analytics,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let store = Arc::new(Store::new());
        let cache: Arc<dyn Cache> = match config.redis_url.as_deref() {
            Some(url) => Arc::new(RedisCache::connect(url).await),
            None => {
                info!("REDIS_URL not set, using the in-process cache");
                Arc::new(MemoryCache::new())
            }
        };
        let counter = Arc::new(DistinctCounter::new(config.hll_precision));

        let analytics = Analytics::new(
            store.clone(),
            cache,
            counter,
            Duration::from_secs(config.search_ttl_seconds),
            Duration::from_secs(config.analytics_ttl_seconds),
        );

        Arc::new(Self {
            config,
            store,
            analytics,
        })
    }
}
