//! File-based snapshot source.
//!
//! Reads a JSON fixture in the shape `rocm-smi --json` prints.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{parse_snapshot, Snapshot, SnapshotSource};
use crate::error::{ExporterError, Result};

/// Fixture read in development mode, relative to the working directory.
pub const DEFAULT_FIXTURE_PATH: &str = "fixtures/rocm-smi.json";

/// A snapshot source that reads a fixed JSON file.
///
/// The file is re-read on every fetch, so editing the fixture while the
/// exporter runs changes the exported values on the next poll.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    description: String,
}

impl FileSource {
    /// Create a new file source for the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self { path, description }
    }

    /// Returns the fixture path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotSource for FileSource {
    async fn fetch(&mut self) -> Result<Snapshot> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ExporterError::SourceUnavailable(format!(
                "cannot read {}: {}",
                self.path.display(),
                e
            ))
        })?;
        parse_snapshot(&content)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, Write};
    use tempfile::NamedTempFile;

    fn sample_json() -> &'static str {
        r#"{
            "card0": {
                "Temperature (Sensor edge) (C)": "52.0",
                "Serial Number": "abc123"
            },
            "system": {
                "Driver version": "5.18.13"
            }
        }"#
    }

    #[test]
    fn test_file_source_new() {
        let source = FileSource::new("/tmp/rocm-smi.json");
        assert_eq!(source.path(), Path::new("/tmp/rocm-smi.json"));
        assert_eq!(source.description(), "file: /tmp/rocm-smi.json");
    }

    #[tokio::test]
    async fn test_file_source_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", sample_json()).unwrap();

        let mut source = FileSource::new(file.path());
        let snapshot = source.fetch().await.unwrap();
        assert!(snapshot.contains_key("card0"));
        assert!(snapshot.contains_key("system"));
    }

    #[tokio::test]
    async fn test_file_source_rereads_on_every_fetch() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", sample_json()).unwrap();

        let mut source = FileSource::new(file.path());
        let first = source.fetch().await.unwrap();
        let second = source.fetch().await.unwrap();
        assert_eq!(first, second);

        file.as_file().set_len(0).unwrap();
        file.rewind().unwrap();
        writeln!(file, r#"{{"card1": {{"Fan RPM": "900"}}}}"#).unwrap();
        file.flush().unwrap();

        let third = source.fetch().await.unwrap();
        assert!(third.contains_key("card1"));
        assert!(!third.contains_key("card0"));
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let mut source = FileSource::new("/nonexistent/path/rocm-smi.json");

        match source.fetch().await {
            Err(ExporterError::SourceUnavailable(msg)) => assert!(msg.contains("cannot read")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_file_source_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let mut source = FileSource::new(file.path());
        match source.fetch().await {
            Err(ExporterError::SourceUnavailable(msg)) => {
                assert!(msg.contains("invalid snapshot JSON"))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bundled_fixture_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/", "fixtures/rocm-smi.json");
        let mut source = FileSource::new(path);
        let snapshot = source.fetch().await.unwrap();
        assert!(snapshot.contains_key("card0"));
        assert!(snapshot.contains_key("system"));
    }
}
