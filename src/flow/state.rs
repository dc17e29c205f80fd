//! Per-event flow state machine.
//!
//! ```text
//! RECEIVED ──▶ VALIDATED ──▶ FED ──▶ RESULTED ──▶ PUBLISHED
//!     │            │          │          │
//!     └────────────┴──────────┴──────────┴──────▶ FAILED
//! ```

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Where an event is in its traversal of a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowState {
    /// Accepted from the inbound channel
    Received,
    /// Payload decoded and checked
    Validated,
    /// Handed to the engine
    Fed,
    /// Engine produced a result
    Resulted,
    /// Result delivered to the outbound channel
    Published,
    /// Dropped; the event will not produce a published result
    Failed,
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Published | FlowState::Failed)
    }

    /// The forward successor, if any
    pub fn next(&self) -> Option<FlowState> {
        match self {
            FlowState::Received => Some(FlowState::Validated),
            FlowState::Validated => Some(FlowState::Fed),
            FlowState::Fed => Some(FlowState::Resulted),
            FlowState::Resulted => Some(FlowState::Published),
            FlowState::Published | FlowState::Failed => None,
        }
    }

    pub fn can_transition_to(&self, to: FlowState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == FlowState::Failed || self.next() == Some(to)
    }

    /// Move to `to`, refusing anything the state machine does not allow
    pub fn transition(self, to: FlowState) -> Result<FlowState> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(AppError::Internal(format!(
                "illegal flow transition {} -> {}",
                self, to
            )))
        }
    }
}
