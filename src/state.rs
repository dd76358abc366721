use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::cache::{CacheStore, MemoryCache};
use crate::models::StructuredResult;
use crate::service::PredictionService;

// app's shared state
pub struct AppState {
    pub service: PredictionService,
    pub cache: Arc<MemoryCache<StructuredResult>>, // same store the service reads and writes
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: PredictionService, cache: Arc<MemoryCache<StructuredResult>>) -> Self {
        Self {
            service,
            cache,
            started_at: Utc::now(),
        }
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}
