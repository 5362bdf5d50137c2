//! Per-Node outcomes and their aggregation across a batch.
use crate::error::EvacuationError;

use std::fmt;

/// The terminal state of a single Node's evacuation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NodeState {
    /// Every targeted Pod was handled without error.
    Success,
    /// The Node was processed, but some Pods failed to delete or were skipped as unsafe.
    PartialFailure,
    /// Processing stopped before any Pod was handled.
    Aborted,
}

#[derive(Debug)]
pub struct NodeOutcome {
    pub node_name: String,
    pub state: NodeState,
    /// Pods printed by a dry run or a listing.
    pub listed: usize,
    pub deleted: usize,
    /// Standalone Pods left in place because `force` was not set.
    pub skipped_unsafe: usize,
    pub errors: Vec<EvacuationError>,
}

impl NodeOutcome {
    pub(crate) fn new(node_name: &str) -> Self {
        NodeOutcome {
            node_name: node_name.to_string(),
            state: NodeState::Success,
            listed: 0,
            deleted: 0,
            skipped_unsafe: 0,
            errors: Vec::new(),
        }
    }

    pub(crate) fn abort(mut self, error: EvacuationError) -> Self {
        self.errors.push(error);
        self.state = NodeState::Aborted;
        self
    }

    pub(crate) fn finish(mut self) -> Self {
        self.state = if self.errors.is_empty() {
            NodeState::Success
        } else {
            NodeState::PartialFailure
        };
        self
    }

    pub fn is_success(&self) -> bool {
        self.state == NodeState::Success
    }
}

/// The outcomes of every Node in a batch, in the order they were processed.
#[derive(Debug, Default)]
pub struct EvacuationReport {
    outcomes: Vec<NodeOutcome>,
}

impl EvacuationReport {
    pub(crate) fn push(&mut self, outcome: NodeOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[NodeOutcome] {
        &self.outcomes
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(NodeOutcome::is_success)
    }

    pub fn deleted(&self) -> usize {
        self.outcomes.iter().map(|outcome| outcome.deleted).sum()
    }

    pub fn skipped_unsafe(&self) -> usize {
        self.outcomes.iter().map(|outcome| outcome.skipped_unsafe).sum()
    }

    /// Merges every collected error into one `AggregateError`, or returns the report if there were none.
    pub fn into_result(self) -> std::result::Result<Self, AggregateError> {
        if self.is_success() {
            return Ok(self);
        }

        let errors = self
            .outcomes
            .into_iter()
            .flat_map(|outcome| outcome.errors)
            .collect();
        Err(AggregateError { errors })
    }
}

/// Every error collected across an evacuation batch, reported as one.
#[derive(Debug)]
pub struct AggregateError {
    errors: Vec<EvacuationError>,
}

impl AggregateError {
    pub fn errors(&self) -> &[EvacuationError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<EvacuationError> {
        self.errors
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [error] = self.errors.as_slice() {
            return write!(f, "{}", error);
        }

        write!(f, "[")?;
        for (index, error) in self.errors.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", error)?;
        }
        write!(f, "]")
    }
}

impl std::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.errors.as_slice() {
            [error] => Some(error as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}
