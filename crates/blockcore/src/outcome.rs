use crate::{BlockError, Value, WorkflowError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Why a block ended in the failed state
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// The behavior itself returned an error
    Behavior(BlockError),
    /// The graph was found to be broken while resolving
    Structural(WorkflowError),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Behavior(e) => write!(f, "{}", e),
            Failure::Structural(e) => write!(f, "structural: {}", e),
        }
    }
}

/// Terminal state of one block in one run
#[derive(Debug, Clone, PartialEq)]
pub enum BlockOutcome {
    Completed(HashMap<String, Value>),
    Failed(Failure),
    /// Not executed because a required input never arrived. Not an error.
    Skipped { reason: String },
    Cancelled,
}

impl BlockOutcome {
    pub fn status(&self) -> BlockStatus {
        match self {
            BlockOutcome::Completed(_) => BlockStatus::Completed,
            BlockOutcome::Failed(_) => BlockStatus::Failed,
            BlockOutcome::Skipped { .. } => BlockStatus::Skipped,
            BlockOutcome::Cancelled => BlockStatus::Cancelled,
        }
    }

    pub fn outputs(&self) -> Option<&HashMap<String, Value>> {
        match self {
            BlockOutcome::Completed(outputs) => Some(outputs),
            _ => None,
        }
    }

    /// Value on one output socket, if the block completed and took that branch
    pub fn output(&self, socket: &str) -> Option<&Value> {
        self.outputs().and_then(|o| o.get(socket))
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, BlockOutcome::Completed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, BlockOutcome::Skipped { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BlockOutcome::Cancelled)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, BlockOutcome::Failed(_))
    }

    pub fn structural_error(&self) -> Option<&WorkflowError> {
        match self {
            BlockOutcome::Failed(Failure::Structural(e)) => Some(e),
            _ => None,
        }
    }
}

/// Per-block state machine: pending -> running -> terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

impl BlockStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BlockStatus::Pending | BlockStatus::Running)
    }
}

impl fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlockStatus::Pending => "pending",
            BlockStatus::Running => "running",
            BlockStatus::Completed => "completed",
            BlockStatus::Failed => "failed",
            BlockStatus::Skipped => "skipped",
            BlockStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}
