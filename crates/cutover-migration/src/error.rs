//! Errors surfaced by the migration engine.

use std::path::PathBuf;

use thiserror::Error;

use crate::state::{MigrationEvent, MigrationPhase};

/// Error returned by [`crate::Migration`] and the state store
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A workflow step failed; the migration stays in its previous state
    #[error("failed during {step}: {source}")]
    Step {
        /// Human name of the step (e.g. "checking lags")
        step: &'static str,
        /// What went wrong
        #[source]
        source: cutover_common::Error,
    },

    /// A transition's side effects were applied but the new state could not
    /// be written. The process must stop.
    #[error("migration {migration_id} reached {state} but the state file could not be written: {message}")]
    Persistence {
        /// Migration whose progress is unrecorded
        migration_id: String,
        /// State that was reached in memory
        state: MigrationPhase,
        /// Last store error
        message: String,
    },

    /// Reading or writing the state file failed
    #[error("state store error at {}: {message}", .path.display())]
    Store {
        /// State file path
        path: PathBuf,
        /// Description of what failed
        message: String,
    },

    /// No migration with this id in the state file
    #[error("migration {0} not found")]
    NotFound(String),

    /// A migration with this id already exists
    #[error("migration {0} already exists")]
    AlreadyExists(String),

    /// The event cannot fire from the current state
    #[error("cannot {event} from state {from}")]
    InvalidTransition {
        /// Current state
        from: MigrationPhase,
        /// Rejected event
        event: MigrationEvent,
    },

    /// Execute options are unusable
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl MigrationError {
    /// Build a store error for `path`
    pub fn store(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Store {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether the process must stop instead of continuing or retrying
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }

    /// Whether the failure came from the caller cancelling
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Step { source, .. } if source.is_cancelled())
    }
}
