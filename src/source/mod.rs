//! Snapshot source abstraction.
//!
//! This module provides a trait-based abstraction for obtaining rocm-smi
//! snapshots, either from the live command or from a fixture file during
//! local development without GPU hardware.

mod command;
mod file;
mod snapshot;

pub use command::{CommandSource, ROCM_SMI_ARGS, ROCM_SMI_PROGRAM};
pub use file::{FileSource, DEFAULT_FIXTURE_PATH};
pub use snapshot::{devices, parse_snapshot, system, DeviceFields, Snapshot, SYSTEM_KEY};

use std::fmt::Debug;

use async_trait::async_trait;

use crate::config::Settings;
use crate::error::Result;

/// Trait for fetching telemetry snapshots.
///
/// Both implementations produce the same structure, so the poll loop never
/// needs to know which one it is talking to.
///
/// # Example
///
/// ```
/// use rocm_exporter::{FileSource, SnapshotSource};
///
/// # tokio_test::block_on(async {
/// let mut source = FileSource::new("does-not-exist.json");
/// assert!(source.fetch().await.is_err());
/// # });
/// ```
#[async_trait]
pub trait SnapshotSource: Send + Debug {
    /// Fetch one snapshot.
    ///
    /// Fails with [`SourceUnavailable`](crate::ExporterError::SourceUnavailable)
    /// when the data cannot be obtained or parsed.
    async fn fetch(&mut self) -> Result<Snapshot>;

    /// Returns a human-readable description of the source, used in logs.
    fn description(&self) -> &str;
}

/// Select the source for the configured mode: the fixture file in
/// development mode, the live `rocm-smi` command otherwise.
pub fn source_for(settings: &Settings) -> Box<dyn SnapshotSource> {
    if settings.dev {
        Box::new(FileSource::new(DEFAULT_FIXTURE_PATH))
    } else {
        Box::new(CommandSource::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_for_dev_mode() {
        let settings = Settings {
            dev: true,
            ..Settings::default()
        };
        let source = source_for(&settings);
        assert_eq!(source.description(), format!("file: {}", DEFAULT_FIXTURE_PATH));
    }

    #[test]
    fn test_source_for_live_mode() {
        let source = source_for(&Settings::default());
        assert!(source.description().starts_with("command: rocm-smi"));
    }
}
