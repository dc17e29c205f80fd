use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

/// Inbound event: an opaque JSON payload addressed to a flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event id, assigned on receipt
    pub id: Uuid,

    /// Flow (channel) name
    pub channel: String,

    /// Raw payload
    pub payload: serde_json::Value,

    /// Receipt timestamp
    pub received_at: DateTime<Utc>,
}

impl Event {
    pub fn new(channel: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            payload,
            received_at: Utc::now(),
        }
    }
}

/// What the engine should do with an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    Train,
    Predict,
}

/// One feature row, labelled when used for training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub features: Vec<f64>,
    #[serde(default)]
    pub label: Option<String>,
}

impl Instance {
    pub fn new(features: Vec<f64>) -> Self {
        Self {
            features,
            label: None,
        }
    }

    pub fn labelled(features: Vec<f64>, label: impl Into<String>) -> Self {
        Self {
            features,
            label: Some(label.into()),
        }
    }

    pub fn dimension(&self) -> usize {
        self.features.len()
    }
}

/// Wire shape of an inbound payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EventPayload {
    #[validate(length(min = 1, max = 255))]
    pub model_id: String,

    pub operation: Operation,

    #[validate(length(min = 1))]
    pub features: Vec<f64>,

    #[serde(default)]
    pub label: Option<String>,
}

/// Decoded event, ready for the feeder
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRequest {
    pub event_id: Uuid,
    pub model_id: String,
    pub operation: Operation,
    pub instance: Instance,
}
