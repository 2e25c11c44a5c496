//! Durable migration state.
//!
//! The whole set of migrations lives in one JSON document. Every write goes
//! to a temp file in the same directory which is then renamed over the
//! target, so readers see either the old document or the new one.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use cutover_common::retry::{retry_with_backoff, RetryConfig};

use crate::error::MigrationError;
use crate::record::MigrationRecord;

/// Version of the tool that last wrote the document
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Crate version
    #[serde(default)]
    pub version: String,
}

/// Top-level state document
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationState {
    /// Migrations in creation order
    #[serde(default)]
    pub migrations: Vec<MigrationRecord>,
    /// Who wrote the document
    #[serde(default)]
    pub build_info: BuildInfo,
    /// When the document was last written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl MigrationState {
    /// Insert `record`, or replace the existing record with the same id in
    /// place
    pub fn upsert(&mut self, record: MigrationRecord) {
        match self
            .migrations
            .iter_mut()
            .find(|m| m.migration_id == record.migration_id)
        {
            Some(existing) => *existing = record,
            None => self.migrations.push(record),
        }
    }

    /// Look up a migration by id
    pub fn get(&self, migration_id: &str) -> Option<&MigrationRecord> {
        self.migrations
            .iter()
            .find(|m| m.migration_id == migration_id)
    }

    /// All migrations in creation order
    pub fn list(&self) -> &[MigrationRecord] {
        &self.migrations
    }

    /// Record the writer's version and the current time
    pub fn stamp(&mut self) {
        self.build_info.version = env!("CARGO_PKG_VERSION").to_string();
        self.timestamp = Some(Utc::now());
    }
}

/// Where migration state is kept
pub trait StateStore: Send + Sync {
    /// Read the document; a store that was never written yields an empty one
    fn load(&self) -> Result<MigrationState, MigrationError>;

    /// Replace the document atomically
    fn save(&self, state: &MigrationState) -> Result<(), MigrationError>;
}

/// Save with bounded retries and backoff.
///
/// Not cancellable: once a transition's side effects are applied the only
/// acceptable outcomes are "written" or a fatal error.
pub async fn save_with_retry(
    store: &dyn StateStore,
    state: &MigrationState,
    retry: &RetryConfig,
) -> Result<(), MigrationError> {
    retry_with_backoff(retry, "save migration state", || async move { store.save(state) }).await
}

/// [`StateStore`] backed by a JSON file
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store at `path`; the file is created on first save
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    fn err(&self, message: impl Into<String>) -> MigrationError {
        MigrationError::store(&self.path, message)
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<MigrationState, MigrationError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file yet");
                return Ok(MigrationState::default());
            }
            Err(e) => return Err(self.err(format!("read failed: {e}"))),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(MigrationState::default());
        }

        serde_json::from_slice(&bytes).map_err(|e| self.err(format!("invalid state file: {e}")))
    }

    fn save(&self, state: &MigrationState) -> Result<(), MigrationError> {
        let mut tmp = NamedTempFile::new_in(self.dir())
            .map_err(|e| self.err(format!("temp file creation failed: {e}")))?;

        serde_json::to_writer_pretty(&mut tmp, state)
            .map_err(|e| self.err(format!("serialization failed: {e}")))?;
        tmp.write_all(b"\n")
            .map_err(|e| self.err(format!("write failed: {e}")))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| self.err(format!("sync failed: {e}")))?;

        tmp.persist(&self.path)
            .map_err(|e| self.err(format!("rename failed: {}", e.error)))?;

        debug!(path = %self.path.display(), migrations = state.migrations.len(), "state saved");
        Ok(())
    }
}
