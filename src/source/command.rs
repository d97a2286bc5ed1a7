//! Command-based snapshot source.
//!
//! Runs `rocm-smi` and parses its JSON output.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{parse_snapshot, Snapshot, SnapshotSource};
use crate::error::{ExporterError, Result};

/// Hardware query binary, resolved through `PATH`.
pub const ROCM_SMI_PROGRAM: &str = "rocm-smi";

/// All devices, JSON output, the hardware categories and the all-info superset.
pub const ROCM_SMI_ARGS: &[&str] = &[
    "--alldevices",
    "--json",
    "--showfan",
    "--showpower",
    "--showtemp",
    "--showuse",
    "--showmemuse",
    "--showvoltage",
    "--showallinfo",
];

/// Longest a single `rocm-smi` run may take before the fetch fails.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// A snapshot source that runs an external command once per fetch.
#[derive(Debug)]
pub struct CommandSource {
    program: String,
    args: Vec<String>,
    description: String,
    timeout: Duration,
}

impl CommandSource {
    /// Create a source running `program` with `args`.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let program = program.into();
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let description = format!("command: {} {}", program, args.join(" "));
        Self {
            program,
            args,
            description,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Override the per-run timeout. The child is killed when it expires.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Default for CommandSource {
    fn default() -> Self {
        Self::new(ROCM_SMI_PROGRAM, ROCM_SMI_ARGS.iter().copied())
    }
}

#[async_trait]
impl SnapshotSource for CommandSource {
    async fn fetch(&mut self) -> Result<Snapshot> {
        let run = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                ExporterError::SourceUnavailable(format!(
                    "{} timed out after {:?}",
                    self.program, self.timeout
                ))
            })?
            .map_err(|e| {
                ExporterError::SourceUnavailable(format!("failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExporterError::SourceUnavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_snapshot(&stdout)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_line() {
        let source = CommandSource::default();
        assert_eq!(source.program(), "rocm-smi");
        assert!(source.args().iter().any(|a| a == "--json"));
        assert!(source.args().iter().any(|a| a == "--alldevices"));
        assert!(source.args().iter().any(|a| a == "--showallinfo"));
        assert!(source.description().starts_with("command: rocm-smi --alldevices --json"));
        assert_eq!(source.timeout(), DEFAULT_COMMAND_TIMEOUT);
    }

    #[tokio::test]
    async fn test_missing_program() {
        let mut source = CommandSource::new("rocm-smi-definitely-not-installed", ["--json"]);
        match source.fetch().await {
            Err(ExporterError::SourceUnavailable(msg)) => assert!(msg.contains("failed to run")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_parses_stdout() {
        let mut source = CommandSource::new(
            "sh",
            ["-c", r#"echo '{"card0": {"Fan RPM": "1200"}, "system": {}}'"#],
        );
        let snapshot = source.fetch().await.unwrap();
        assert_eq!(snapshot["card0"]["Fan RPM"], "1200");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit() {
        let mut source = CommandSource::new("sh", ["-c", "echo 'no GPUs found' >&2; exit 2"]);
        match source.fetch().await {
            Err(ExporterError::SourceUnavailable(msg)) => assert!(msg.contains("no GPUs found")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_json_output() {
        let mut source = CommandSource::new("sh", ["-c", "echo WARNING: nothing to see"]);
        assert!(matches!(
            source.fetch().await,
            Err(ExporterError::SourceUnavailable(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_command_times_out() {
        let mut source = CommandSource::new("sh", ["-c", "exec sleep 5"])
            .with_timeout(Duration::from_millis(100));

        let started = std::time::Instant::now();
        match source.fetch().await {
            Err(ExporterError::SourceUnavailable(msg)) => assert!(msg.contains("timed out")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
