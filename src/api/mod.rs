pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::cache::DistributedModelCache;
use crate::flow::FlowRegistry;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub flows: Arc<FlowRegistry>,
    pub cache: Arc<DistributedModelCache>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(flows: Arc<FlowRegistry>, cache: Arc<DistributedModelCache>) -> Self {
        Self {
            flows,
            cache,
            started_at: Instant::now(),
        }
    }
}
