use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable snapshot of one learned model
///
/// `version` is monotonic per id: the first durable write is version 1 and every
/// later write must be exactly one above the stored version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Model id (primary key)
    pub id: String,

    /// Serialized classifier state
    pub state: Vec<u8>,

    /// Write counter
    pub version: u64,

    /// Time of the last durable write
    pub updated_at: DateTime<Utc>,
}

impl ModelRecord {
    /// Create the first record for a model id
    pub fn initial(id: impl Into<String>, state: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            state,
            version: 1,
            updated_at: Utc::now(),
        }
    }

    /// Build the record that follows this one
    pub fn next(&self, state: Vec<u8>) -> Self {
        Self {
            id: self.id.clone(),
            state,
            version: self.version + 1,
            updated_at: Utc::now(),
        }
    }

    /// Version the store must currently hold for this record to be accepted
    pub fn expected_stored_version(&self) -> u64 {
        self.version.saturating_sub(1)
    }

    /// Metadata view without the state blob
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            id: self.id.clone(),
            version: self.version,
            updated_at: self.updated_at,
            state_bytes: self.state.len(),
        }
    }
}

/// Model metadata returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    pub id: String,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub state_bytes: usize,
}
