//! Error types for the exporter.

use thiserror::Error;

/// Errors that can occur while collecting and exporting GPU telemetry.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// The snapshot could not be fetched or did not have the expected shape.
    #[error("snapshot source unavailable: {0}")]
    SourceUnavailable(String),

    /// A device entry lacks a field the curated label list expects.
    #[error("device {device} has no {field:?} field")]
    MissingLabelField { device: String, field: String },

    /// A curated metric field could not be parsed as a number.
    #[error("device {device}: {field:?} has non-numeric value {value:?}")]
    UnparseableMetricValue {
        device: String,
        field: String,
        value: String,
    },

    /// Two instruments would be registered under the same name.
    #[error("metrics {first:?} and {second:?} both map to instrument {canonical}")]
    DuplicateInstrumentName {
        canonical: String,
        first: String,
        second: String,
    },

    /// Two label dimensions would share the same name.
    #[error("labels {first:?} and {second:?} both map to label {canonical}")]
    DuplicateLabelName {
        canonical: String,
        first: String,
        second: String,
    },

    /// A curated field name has no characters left after sanitizing.
    #[error("field {0:?} sanitizes to an empty name")]
    EmptyCanonicalName(String),

    /// The metrics library rejected an instrument or failed to encode.
    #[error("metrics registry error: {0}")]
    Registry(#[from] prometheus::Error),

    /// Environment configuration could not be read.
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O failure outside the snapshot source (binding the listener).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T, E = ExporterError> = std::result::Result<T, E>;
