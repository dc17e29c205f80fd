use crate::error::{AppError, Result};
use crate::models::Event;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Entry point of one flow; events are queued for the flow's workers
#[derive(Clone)]
pub struct InboundChannel {
    flow: String,
    sender: mpsc::Sender<Event>,
}

impl InboundChannel {
    pub fn new(flow: impl Into<String>, sender: mpsc::Sender<Event>) -> Self {
        Self {
            flow: flow.into(),
            sender,
        }
    }

    /// Wrap a payload in an event addressed to this flow and queue it
    pub async fn submit(&self, payload: serde_json::Value) -> Result<Uuid> {
        self.send(Event::new(&self.flow, payload)).await
    }

    /// Queue an event, waiting while the queue is full
    pub async fn send(&self, event: Event) -> Result<Uuid> {
        let id = event.id;
        self.sender.send(event).await.map_err(|_| {
            AppError::Internal(format!("flow '{}' is no longer accepting events", self.flow))
        })?;
        Ok(id)
    }
}
