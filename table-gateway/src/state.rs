//! Application state for the table gateway.

use std::sync::Arc;

use common::config::AppConfig;
use common::models::TableCatalog;

use crate::store::{PgTableStore, TableStore};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub catalog: Arc<TableCatalog>,
    pub store: Arc<dyn TableStore>,
}

impl AppState {
    /// Creates the state with a PostgreSQL-backed store.
    pub fn new(config: AppConfig) -> Self {
        let store = Arc::new(PgTableStore::new(&config));
        Self::with_store(config, store)
    }

    /// Creates the state around an existing store.
    pub fn with_store(config: AppConfig, store: Arc<dyn TableStore>) -> Self {
        Self {
            config: Arc::new(config),
            catalog: Arc::new(TableCatalog::default()),
            store,
        }
    }
}
