//! Workflow state machine
//!
//! A project moves strictly forward through the planning phases. Any
//! non-terminal state may drop to `Error`; `Completed` and `Error` are final.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Idle,
    Planning,
    Validation,
    Refinement,
    Finalization,
    Completed,
    Error,
}

impl WorkflowState {
    /// The phases of a successful run, in order.
    pub const HAPPY_PATH: [WorkflowState; 5] = [
        WorkflowState::Planning,
        WorkflowState::Validation,
        WorkflowState::Refinement,
        WorkflowState::Finalization,
        WorkflowState::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Planning => "PLANNING",
            Self::Validation => "VALIDATION",
            Self::Refinement => "REFINEMENT",
            Self::Finalization => "FINALIZATION",
            Self::Completed => "COMPLETED",
            Self::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// The state a successful phase leads to.
    pub fn successor(&self) -> Option<WorkflowState> {
        match self {
            Self::Idle => Some(Self::Planning),
            Self::Planning => Some(Self::Validation),
            Self::Validation => Some(Self::Refinement),
            Self::Refinement => Some(Self::Finalization),
            Self::Finalization => Some(Self::Completed),
            Self::Completed | Self::Error => None,
        }
    }

    pub fn can_transition_to(&self, next: WorkflowState) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Self::Error || self.successor() == Some(next)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [WorkflowState; 7] = [
        WorkflowState::Idle,
        WorkflowState::Planning,
        WorkflowState::Validation,
        WorkflowState::Refinement,
        WorkflowState::Finalization,
        WorkflowState::Completed,
        WorkflowState::Error,
    ];

    #[test]
    fn only_forward_steps_are_allowed() {
        for from in ALL {
            for to in ALL {
                let allowed = from.can_transition_to(to);
                if allowed && to != WorkflowState::Error {
                    assert!(to > from, "{from} -> {to} moves backwards");
                }
            }
        }
        assert!(!WorkflowState::Planning.can_transition_to(WorkflowState::Refinement));
        assert!(!WorkflowState::Validation.can_transition_to(WorkflowState::Validation));
    }

    #[test]
    fn terminal_states_are_final() {
        for to in ALL {
            assert!(!WorkflowState::Completed.can_transition_to(to));
            assert!(!WorkflowState::Error.can_transition_to(to));
        }
    }

    #[test]
    fn every_live_state_can_fail() {
        for from in ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(from.can_transition_to(WorkflowState::Error));
        }
    }

    #[test]
    fn serializes_in_upper_case() {
        assert_eq!(
            serde_json::to_string(&WorkflowState::Finalization).unwrap(),
            "\"FINALIZATION\""
        );
    }
}
