// SPDX-License-Identifier: Apache-2.0

use crate::partition::WorkRange;
use crate::storage::StorageError;

/// A single worker failure recorded while running a parallel stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    pub range: WorkRange,
    pub message: String,
}

#[derive(Debug)]
pub enum CleanupError {
    /// A netlist row could not be parsed; `line` is 1-based.
    MalformedNetlist { line: usize, reason: String },
    MalformedSignature { signature: String, reason: String },
    Storage(StorageError),
    /// One or more workers of a parallel stage failed. Partial results of the
    /// sibling workers remain committed.
    StageFailed {
        stage: String,
        failures: Vec<WorkerFailure>,
    },
    /// The cleaned library holds functions that the reference library lacks.
    PreconditionViolation { missing: Vec<String> },
}

impl std::fmt::Display for CleanupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleanupError::MalformedNetlist { line, reason } => {
                write!(f, "malformed netlist at line {}: {}", line, reason)
            }
            CleanupError::MalformedSignature { signature, reason } => {
                write!(f, "malformed signature '{}': {}", signature, reason)
            }
            CleanupError::Storage(e) => write!(f, "storage error: {}", e),
            CleanupError::StageFailed { stage, failures } => {
                write!(
                    f,
                    "stage '{}' failed in {} worker(s)",
                    stage,
                    failures.len()
                )?;
                for failure in failures {
                    write!(
                        f,
                        "; [{}, +{}): {}",
                        failure.range.start, failure.range.size, failure.message
                    )?;
                }
                Ok(())
            }
            CleanupError::PreconditionViolation { missing } => write!(
                f,
                "cleaned library is not a subset of the reference library; {} signature(s) missing from the reference: {:?}",
                missing.len(),
                missing
            ),
        }
    }
}

impl std::error::Error for CleanupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CleanupError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for CleanupError {
    fn from(e: StorageError) -> Self {
        CleanupError::Storage(e)
    }
}

pub type CleanupResult<T> = std::result::Result<T, CleanupError>;
