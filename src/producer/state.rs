//! Producer lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle stage of a producer; stages only ever advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProducerState {
    /// Freshly constructed, no content
    New,
    /// Doc-tag graph built
    Content,
    /// Document and tag scores inferred
    Scores,
    /// Relation arcs attached; the producer is final
    Arc,
}

impl fmt::Display for ProducerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProducerState::New => "NEW",
            ProducerState::Content => "CONTENT",
            ProducerState::Scores => "SCORES",
            ProducerState::Arc => "ARC",
        };
        f.write_str(name)
    }
}

/// An operation was called outside the lifecycle states it accepts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{msg} (state: {state})")]
pub struct StateError {
    pub state: ProducerState,
    pub msg: String,
}

/// Fail with `msg` unless `state` is one of `allowed`
pub(crate) fn require(state: ProducerState, allowed: &[ProducerState], msg: &str) -> Result<(), StateError> {
    if allowed.contains(&state) {
        Ok(())
    } else {
        Err(StateError { state, msg: msg.to_string() })
    }
}
