use crate::error::{AppError, Result};
use crate::flow::{
    FlowState, FlowStats, InboundChannel, MessageInterceptor, ModelFeeder, OutboundChannel,
};
use crate::metrics::{FLOW_EVENTS_TOTAL, FLOW_EVENT_DURATION_SECONDS, FLOW_RESULTS_TOTAL};
use crate::models::{CombinerResult, Event};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What happened to one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowOutcome {
    pub event_id: Uuid,
    pub flow: String,
    /// Terminal state: `PUBLISHED` or `FAILED`
    pub state: FlowState,
    /// State the event was in when it failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_in: Option<FlowState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CombinerResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FlowOutcome {
    pub fn is_published(&self) -> bool {
        self.state == FlowState::Published
    }
}

/// One named flow: interceptor → feeder → engine → outbound channel
pub struct ChannelMultiplexer {
    name: String,
    interceptor: MessageInterceptor,
    feeder: ModelFeeder,
    outbound: OutboundChannel,
    stats: FlowStats,
}

impl ChannelMultiplexer {
    pub fn new(name: impl Into<String>, feeder: ModelFeeder, outbound: OutboundChannel) -> Self {
        let name = name.into();
        Self {
            interceptor: MessageInterceptor::new(name.clone()),
            name,
            feeder,
            outbound,
            stats: FlowStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> &FlowStats {
        &self.stats
    }

    pub fn outbound(&self) -> &OutboundChannel {
        &self.outbound
    }

    pub fn feeder(&self) -> &ModelFeeder {
        &self.feeder
    }

    /// Take one event through the flow
    ///
    /// Never fails: every error ends the event in `FAILED` and is reported in the
    /// outcome, logged and counted.
    pub async fn process(&self, event: Event) -> FlowOutcome {
        let start = Instant::now();
        self.stats.record_received();
        FLOW_EVENTS_TOTAL
            .with_label_values(&[self.name.as_str(), "received"])
            .inc();

        let mut state = FlowState::Received;
        let outcome = match self.traverse(&event, &mut state).await {
            Ok(result) => {
                self.stats.record_published();
                FLOW_EVENTS_TOTAL
                    .with_label_values(&[self.name.as_str(), "published"])
                    .inc();
                FLOW_RESULTS_TOTAL
                    .with_label_values(&[self.name.as_str(), &result.result().to_string()])
                    .inc();
                debug!(
                    flow = %self.name,
                    event_id = %event.id,
                    model_id = result.model_id(),
                    result = %result.result(),
                    "Event published"
                );

                FlowOutcome {
                    event_id: event.id,
                    flow: self.name.clone(),
                    state,
                    failed_in: None,
                    result: Some(result),
                    error: None,
                }
            }
            Err(e) => {
                let invalid = matches!(e, AppError::Validation(_));
                self.stats.record_failed(invalid);
                let label = if invalid { "invalid" } else { "failed" };
                FLOW_EVENTS_TOTAL
                    .with_label_values(&[self.name.as_str(), label])
                    .inc();

                if invalid {
                    warn!(flow = %self.name, event_id = %event.id, error = %e, "Dropping invalid event");
                } else {
                    error!(
                        flow = %self.name,
                        event_id = %event.id,
                        failed_in = %state,
                        error = %e,
                        "Event failed"
                    );
                }

                FlowOutcome {
                    event_id: event.id,
                    flow: self.name.clone(),
                    state: FlowState::Failed,
                    failed_in: Some(state),
                    result: None,
                    error: Some(e.to_string()),
                }
            }
        };

        FLOW_EVENT_DURATION_SECONDS
            .with_label_values(&[self.name.as_str()])
            .observe(start.elapsed().as_secs_f64());
        outcome
    }

    async fn traverse(&self, event: &Event, state: &mut FlowState) -> Result<CombinerResult> {
        let request = self.interceptor.intercept(event)?;
        *state = state.transition(FlowState::Validated)?;

        *state = state.transition(FlowState::Fed)?;
        let result = self.feeder.feed(&request).await?;
        *state = state.transition(FlowState::Resulted)?;

        self.outbound.publish(&result).await;
        *state = state.transition(FlowState::Published)?;
        Ok(result)
    }

    /// Spawn the flow's worker pool and return its inbound channel
    ///
    /// At most `workers` events are processed at once; the inbound queue holds
    /// `queue_size` more before `submit` waits. The pool stops once every clone of
    /// the returned channel is dropped and the queue has drained.
    pub fn start(self: Arc<Self>, workers: usize, queue_size: usize) -> (InboundChannel, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Event>(queue_size.max(1));
        let permits = Arc::new(Semaphore::new(workers.max(1)));
        let flow = self.clone();

        let handle = tokio::spawn(async move {
            info!(flow = %flow.name, workers, queue_size, "Flow started");

            while let Some(event) = rx.recv().await {
                let permit = match permits.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let flow = flow.clone();
                tokio::spawn(async move {
                    flow.process(event).await;
                    drop(permit);
                });
            }

            // Wait for in-flight events before reporting the pool stopped
            let _ = permits.acquire_many(workers.max(1) as u32).await;
            info!(flow = %flow.name, "Flow stopped");
        });

        (InboundChannel::new(self.name.clone(), tx), handle)
    }
}
