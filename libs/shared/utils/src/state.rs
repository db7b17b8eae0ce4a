use std::sync::Arc;

use shared_config::{AppConfig, StoreBackend};
use shared_database::{DocumentStore, MemoryStore, SupabaseStore};

use crate::clock::{Clock, SystemClock};

/// Shared handles every cell router receives.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { config, store, clock }
    }

    /// Picks the store backend named by the configuration.
    pub fn from_config(config: AppConfig) -> Self {
        let store: Arc<dyn DocumentStore> = match config.store_backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::Supabase => Arc::new(SupabaseStore::new(&config)),
        };

        Self::new(Arc::new(config), store, Arc::new(SystemClock))
    }

    pub fn in_memory(config: AppConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(Arc::new(config), Arc::new(MemoryStore::new()), clock)
    }
}
