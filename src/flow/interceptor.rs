use crate::error::{AppError, Result};
use crate::models::{Event, EventPayload, FeedRequest, Instance, Operation};
use validator::Validate;

/// Unwraps and checks inbound events before anything reaches the engine
#[derive(Debug, Clone)]
pub struct MessageInterceptor {
    flow: String,
}

impl MessageInterceptor {
    pub fn new(flow: impl Into<String>) -> Self {
        Self { flow: flow.into() }
    }

    /// Decode an event into a feed request; every failure is a `Validation` error
    pub fn intercept(&self, event: &Event) -> Result<FeedRequest> {
        if event.channel != self.flow {
            return Err(AppError::Validation(format!(
                "event addressed to '{}' arrived on flow '{}'",
                event.channel, self.flow
            )));
        }
        if !event.payload.is_object() {
            return Err(AppError::Validation(
                "payload must be a JSON object".to_string(),
            ));
        }

        let payload: EventPayload = serde_json::from_value(event.payload.clone())
            .map_err(|e| AppError::Validation(format!("malformed payload: {}", e)))?;
        payload.validate()?;

        if payload.features.iter().any(|f| !f.is_finite()) {
            return Err(AppError::Validation(
                "features must be finite numbers".to_string(),
            ));
        }
        if payload.operation == Operation::Train && payload.label.is_none() {
            return Err(AppError::Validation(
                "train events require a label".to_string(),
            ));
        }

        Ok(FeedRequest {
            event_id: event.id,
            model_id: payload.model_id,
            operation: payload.operation,
            instance: Instance {
                features: payload.features,
                label: payload.label,
            },
        })
    }
}
