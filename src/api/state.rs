use std::sync::Arc;

use tokio::sync::Mutex;

use crate::models::FilterState;
use crate::report::ReportCache;
use crate::sync::{ArenaClient, AthleteLoader};

#[derive(Clone)]
pub struct AppState {
    pub loader: AthleteLoader,
    pub arena: Arc<ArenaClient>,
    pub reports: Arc<Mutex<ReportCache>>,
    /// Applied when a report request sets no filter parameters
    pub default_filter: FilterState,
    pub cors_origin: String,
}

impl AppState {
    pub fn new(loader: AthleteLoader, arena: ArenaClient, default_filter: FilterState) -> Self {
        Self {
            loader,
            arena: Arc::new(arena),
            reports: Arc::new(Mutex::new(ReportCache::new())),
            default_filter,
            cors_origin: "*".to_string(),
        }
    }

    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origin = origin.into();
        self
    }
}
