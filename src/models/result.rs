use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Outcome of processing one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultKind {
    /// Update applied or prediction produced
    Accepted,
    /// Instance is incompatible with the stored model
    Rejected,
    /// Model missing or processing failed
    Error,
}

/// Outcome record emitted once per processed event
///
/// Fields are private so a result cannot change after it has been built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinerResult {
    result: ResultKind,
    model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl CombinerResult {
    /// Successful training update
    pub fn trained(model_id: impl Into<String>, version: u64) -> Self {
        Self {
            result: ResultKind::Accepted,
            model_id: model_id.into(),
            label: None,
            confidence: None,
            version: Some(version),
            message: None,
        }
    }

    /// Successful prediction
    pub fn predicted(
        model_id: impl Into<String>,
        label: impl Into<String>,
        confidence: f64,
        version: u64,
    ) -> Self {
        Self {
            result: ResultKind::Accepted,
            model_id: model_id.into(),
            label: Some(label.into()),
            confidence: Some(confidence),
            version: Some(version),
            message: None,
        }
    }

    pub fn rejected(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            result: ResultKind::Rejected,
            model_id: model_id.into(),
            label: None,
            confidence: None,
            version: None,
            message: Some(message.into()),
        }
    }

    pub fn error(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            result: ResultKind::Error,
            model_id: model_id.into(),
            label: None,
            confidence: None,
            version: None,
            message: Some(message.into()),
        }
    }

    pub fn result(&self) -> ResultKind {
        self.result
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn confidence(&self) -> Option<f64> {
        self.confidence
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_accepted(&self) -> bool {
        self.result == ResultKind::Accepted
    }
}
