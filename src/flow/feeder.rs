use crate::engine::IncrementalClassifierEngine;
use crate::error::{AppError, Result};
use crate::models::{CombinerResult, FeedRequest, Operation};
use std::sync::Arc;
use tracing::debug;

/// Turns a decoded event into an engine call
#[derive(Clone)]
pub struct ModelFeeder {
    engine: Arc<IncrementalClassifierEngine>,
}

impl ModelFeeder {
    pub fn new(engine: Arc<IncrementalClassifierEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<IncrementalClassifierEngine> {
        &self.engine
    }

    /// Run the request; errors returned here fail the flow
    pub async fn feed(&self, request: &FeedRequest) -> Result<CombinerResult> {
        debug!(
            event_id = %request.event_id,
            model_id = %request.model_id,
            operation = %request.operation,
            "Feeding instance"
        );

        match request.operation {
            Operation::Train => {
                match self.engine.train(&request.model_id, &request.instance).await {
                    Ok(updated) => Ok(CombinerResult::trained(updated.model_id, updated.version)),
                    Err(AppError::Validation(msg)) => {
                        Ok(CombinerResult::rejected(&request.model_id, msg))
                    }
                    Err(e) => Err(e),
                }
            }
            Operation::Predict => {
                self.engine
                    .predict(&request.model_id, &request.instance)
                    .await
            }
        }
    }
}
