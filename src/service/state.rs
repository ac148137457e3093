//! Shared service state handed to every route.

use std::sync::Arc;

use crate::config::Config;
use crate::ingest::ApiKeyCache;
use crate::runtime::Runtime;
use crate::store::Store;

/// Everything a route handler needs: the store, process config, the
/// ApiKey validation cache, and the worker runtime's queue handles.
pub struct AppState {
    /// Persistence backend, either Postgres or in-memory.
    pub store: Arc<dyn Store>,
    /// Immutable process configuration.
    pub config: Arc<Config>,
    /// Short-TTL ingest authentication cache.
    pub api_key_cache: ApiKeyCache,
    /// Background worker runtime; routes enqueue work onto it.
    pub runtime: Runtime,
}

impl AppState {
    /// Build service state, starting the worker runtime against `store`.
    pub fn new(config: Arc<Config>, store: Arc<dyn Store>) -> Self {
        let api_key_cache = ApiKeyCache::new(config.api_key_cache_ttl);
        let runtime = Runtime::start(Arc::clone(&config), Arc::clone(&store));
        Self { store, config, api_key_cache, runtime }
    }
}
