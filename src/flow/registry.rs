//! Registry of the named flows running in this process.

use crate::cache::DistributedModelCache;
use crate::config::FlowConfig;
use crate::engine::IncrementalClassifierEngine;
use crate::error::{AppError, Result};
use crate::flow::{
    ChannelMultiplexer, FlowOutcome, FlowStatsSnapshot, InboundChannel, LoggingFeeder,
    ModelFeeder, OutboundChannel, OutboundFeeder,
};
use crate::models::{CombinerResult, Event};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

/// A running flow: its pipeline, inbound queue and worker pool
pub struct FlowHandle {
    multiplexer: Arc<ChannelMultiplexer>,
    inbound: Mutex<Option<InboundChannel>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FlowHandle {
    /// Build the flow's pipeline and start its workers
    pub fn spawn(
        config: &FlowConfig,
        cache: Arc<DistributedModelCache>,
        feeders: Vec<Arc<dyn OutboundFeeder>>,
    ) -> Result<Self> {
        let engine = IncrementalClassifierEngine::new(&config.classifier, &config.options, cache)
            .map_err(|e| match e {
                AppError::Configuration(msg) => {
                    AppError::Configuration(format!("flow '{}': {}", config.name, msg))
                }
                other => other,
            })?;

        let outbound = feeders.into_iter().fold(
            OutboundChannel::new(&config.name, config.queue_size),
            OutboundChannel::with_feeder,
        );
        let multiplexer = Arc::new(ChannelMultiplexer::new(
            &config.name,
            ModelFeeder::new(Arc::new(engine)),
            outbound,
        ));
        let (inbound, worker) = multiplexer
            .clone()
            .start(config.workers, config.queue_size);

        Ok(Self {
            multiplexer,
            inbound: Mutex::new(Some(inbound)),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn name(&self) -> &str {
        self.multiplexer.name()
    }

    pub fn multiplexer(&self) -> &Arc<ChannelMultiplexer> {
        &self.multiplexer
    }

    /// Queue a payload for asynchronous processing
    pub async fn submit(&self, payload: serde_json::Value) -> Result<Uuid> {
        let inbound = self.inbound.lock().clone().ok_or_else(|| {
            AppError::Internal(format!("flow '{}' is shut down", self.name()))
        })?;
        inbound.submit(payload).await
    }

    /// Process a payload on the caller's task and return its outcome
    pub async fn process(&self, payload: serde_json::Value) -> FlowOutcome {
        self.multiplexer
            .process(Event::new(self.name(), payload))
            .await
    }

    /// Results published by this flow from now on
    pub fn subscribe(&self) -> broadcast::Receiver<CombinerResult> {
        self.multiplexer.outbound().subscribe()
    }

    pub fn stats(&self) -> FlowStatsSnapshot {
        self.multiplexer.stats().snapshot(self.name())
    }

    /// Stop accepting events and hand back the worker pool to wait on
    ///
    /// Queued events are still processed. Later calls return `None`.
    pub fn close(&self) -> Option<JoinHandle<()>> {
        drop(self.inbound.lock().take());
        self.worker.lock().take()
    }
}

/// All flows in the process, keyed by name
#[derive(Default)]
pub struct FlowRegistry {
    flows: DashMap<String, Arc<FlowHandle>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start every configured flow over a shared model cache
    ///
    /// Must be called inside a Tokio runtime. Any flow with a bad classifier
    /// configuration fails the whole call.
    pub fn from_config(flows: &[FlowConfig], cache: Arc<DistributedModelCache>) -> Result<Self> {
        let registry = Self::new();
        for config in flows {
            registry.spawn(config, cache.clone(), vec![Arc::new(LoggingFeeder)])?;
        }
        Ok(registry)
    }

    /// Start a flow and add it to the registry
    pub fn spawn(
        &self,
        config: &FlowConfig,
        cache: Arc<DistributedModelCache>,
        feeders: Vec<Arc<dyn OutboundFeeder>>,
    ) -> Result<Arc<FlowHandle>> {
        if self.flows.contains_key(&config.name) {
            return Err(AppError::Configuration(format!(
                "flow '{}' is already registered",
                config.name
            )));
        }

        let handle = Arc::new(FlowHandle::spawn(config, cache, feeders)?);
        self.flows.insert(config.name.clone(), handle.clone());
        info!(
            flow = %config.name,
            classifier = %config.classifier,
            workers = config.workers,
            "Registered flow"
        );
        Ok(handle)
    }

    pub fn get(&self, name: &str) -> Result<Arc<FlowHandle>> {
        self.flows
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("flow '{}'", name)))
    }

    pub async fn submit(&self, flow: &str, payload: serde_json::Value) -> Result<Uuid> {
        self.get(flow)?.submit(payload).await
    }

    pub async fn process(&self, flow: &str, payload: serde_json::Value) -> Result<FlowOutcome> {
        Ok(self.get(flow)?.process(payload).await)
    }

    pub fn subscribe(&self, flow: &str) -> Result<broadcast::Receiver<CombinerResult>> {
        Ok(self.get(flow)?.subscribe())
    }

    /// Flow names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.flows.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Statistics for every flow, sorted by name
    pub fn stats(&self) -> Vec<FlowStatsSnapshot> {
        let mut stats: Vec<FlowStatsSnapshot> =
            self.flows.iter().map(|e| e.value().stats()).collect();
        stats.sort_by(|a, b| a.flow.cmp(&b.flow));
        stats
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Close every inbound queue and wait for queued events to finish
    pub async fn shutdown(&self) {
        let names = self.names();
        let mut workers = Vec::new();
        for name in names {
            if let Some((_, handle)) = self.flows.remove(&name) {
                workers.extend(handle.close());
            }
        }

        for worker in workers {
            let _ = worker.await;
        }
        info!("All flows stopped");
    }
}
