//! Migration engine for the gateway cutover
//!
//! A migration moves through a fixed chain of states:
//!
//! ```text
//! uninitialized -> initialized -> lags_ok -> fenced -> promoting -> promoted -> switched
//! ```
//!
//! Leaving each state runs one step (validation, lag wait, fence, promotion,
//! promotion wait, gateway switchover). The state only advances when the step
//! succeeds, and every advance is written to the state store before the next
//! step starts. A transition whose side effects are applied but can't be
//! persisted ends in [`MigrationError::Persistence`], which callers must
//! treat as fatal.

#![deny(missing_docs)]

pub mod error;
pub mod migration;
pub mod record;
pub mod state;
pub mod steps;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use error::MigrationError;
pub use migration::{ExecuteOptions, Migration};
pub use record::{MigrationConfig, MigrationRecord};
pub use state::{transition, MigrationEvent, MigrationPhase};
pub use steps::Steps;
pub use store::{save_with_retry, BuildInfo, JsonFileStore, MigrationState, StateStore};
