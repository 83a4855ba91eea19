//! Slot state published to observers.

use crate::models::OutcomeKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a slot is in its lifecycle.
///
/// `Idle -> Sending -> Completed | Cancelled`, and back to `Sending` on the
/// next send. Executions are numbered per slot, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SlotState {
    /// Nothing has been sent yet.
    #[default]
    Idle,
    Sending { execution: u64 },
    /// The execution finished with any outcome other than `Cancelled`.
    Completed { execution: u64, outcome: OutcomeKind },
    Cancelled { execution: u64 },
}

impl SlotState {
    /// True while an execution is in flight.
    pub fn is_sending(&self) -> bool {
        matches!(self, SlotState::Sending { .. })
    }

    /// The execution this state refers to, if any.
    pub fn execution(&self) -> Option<u64> {
        match self {
            SlotState::Idle => None,
            SlotState::Sending { execution }
            | SlotState::Completed { execution, .. }
            | SlotState::Cancelled { execution } => Some(*execution),
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotState::Idle => write!(f, "idle"),
            SlotState::Sending { execution } => write!(f, "sending #{}", execution),
            SlotState::Completed { execution, outcome } => {
                write!(f, "completed #{} ({:?})", execution, outcome)
            }
            SlotState::Cancelled { execution } => write!(f, "cancelled #{}", execution),
        }
    }
}
