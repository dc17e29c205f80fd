use crate::error::Result;
use crate::models::CombinerResult;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Pluggable sink for published results
#[async_trait]
pub trait OutboundFeeder: Send + Sync {
    /// Feeder name, used in logs
    fn name(&self) -> &str;

    async fn feed(&self, flow: &str, result: &CombinerResult) -> Result<()>;
}

/// Writes every result to the log
pub struct LoggingFeeder;

#[async_trait]
impl OutboundFeeder for LoggingFeeder {
    fn name(&self) -> &str {
        "log"
    }

    async fn feed(&self, flow: &str, result: &CombinerResult) -> Result<()> {
        info!(
            flow,
            model_id = result.model_id(),
            result = %result.result(),
            version = ?result.version(),
            label = ?result.label(),
            "Flow result"
        );
        Ok(())
    }
}

/// Fan-out point for one flow's results
///
/// Subscribers get every result published after they subscribe; a subscriber that
/// falls more than the channel capacity behind loses the oldest results.
pub struct OutboundChannel {
    flow: String,
    sender: broadcast::Sender<CombinerResult>,
    feeders: Vec<Arc<dyn OutboundFeeder>>,
}

impl OutboundChannel {
    pub fn new(flow: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            flow: flow.into(),
            sender,
            feeders: Vec::new(),
        }
    }

    pub fn with_feeder(mut self, feeder: Arc<dyn OutboundFeeder>) -> Self {
        self.feeders.push(feeder);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CombinerResult> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Deliver a result to subscribers and feeders
    ///
    /// A failing feeder is logged and skipped; the other sinks still receive the result.
    pub async fn publish(&self, result: &CombinerResult) {
        if self.sender.send(result.clone()).is_err() {
            debug!(flow = %self.flow, "No subscribers for flow result");
        }

        for feeder in &self.feeders {
            if let Err(e) = feeder.feed(&self.flow, result).await {
                warn!(
                    flow = %self.flow,
                    feeder = feeder.name(),
                    error = %e,
                    "Outbound feeder failed"
                );
            }
        }
    }
}
