//! Domain errors raised by the state machines and status parsing

use thiserror::Error;

/// An action was attempted from a status that does not permit it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action} from status '{from}'")]
pub struct TransitionError {
    pub from: &'static str,
    pub action: &'static str,
}

impl TransitionError {
    pub fn new(from: &'static str, action: &'static str) -> Self {
        Self { from, action }
    }
}

/// A stored status string did not match any known variant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} status '{value}'")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}
