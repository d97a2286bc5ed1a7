//! # rocm-exporter
//!
//! A Prometheus exporter for AMD GPU telemetry reported by `rocm-smi`.
//!
//! Every poll interval the exporter fetches a snapshot of all devices,
//! translates the loosely typed string fields into gauges with a stable
//! label set, and serves the result over HTTP for scraping.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   Snapshot   ┌──────────┐  set_value  ┌────────────────┐
//! │    source    │─────────────▶│ exporter │────────────▶│    registry    │
//! │ Command|File │              │ (Poller) │             │ (GaugeVec × N) │
//! └──────────────┘              └────┬─────┘             └───────┬────────┘
//!                                    │ label values              │ render
//!                               ┌────┴─────┐                ┌────┴─────┐
//!                               │  fields  │                │  server  │◀── scrape
//!                               │  names   │                └──────────┘
//!                               └──────────┘
//! ```
//!
//! - **[`source`]**: the [`SnapshotSource`] trait with the live
//!   [`CommandSource`] and the development [`FileSource`]
//! - **[`names`]**: [`sanitize`], raw field name → canonical metric/label name
//! - **[`fields`]**: the curated [`FieldCatalog`] of metric and label fields
//! - **[`registry`]**: [`MetricRegistry`], one gauge per curated metric
//! - **[`server`]**: [`MetricsServer`], the HTTP scrape endpoint
//! - **[`exporter`]**: [`Exporter`] initialization and the [`Poller`] loop
//!
//! ## Usage
//!
//! ```bash
//! # Live mode: runs rocm-smi every second, serves on :9101
//! rocm-exporter
//!
//! # Development mode: reads fixtures/rocm-smi.json, serves on :9400
//! DEV=1 PORT=9400 rocm-exporter
//! ```
//!
//! ### As a library
//!
//! ```
//! use std::sync::Arc;
//! use rocm_exporter::{parse_snapshot, FieldCatalog, FileSource, MetricRegistry, Poller};
//!
//! let catalog = FieldCatalog::new(["Temperature (Sensor edge) (C)"], ["Serial Number"]);
//! let labels = catalog.label_dict().unwrap();
//! let registry = Arc::new(MetricRegistry::build(catalog.metrics(), &labels).unwrap());
//! let poller = Poller::new(
//!     Box::new(FileSource::new("fixtures/rocm-smi.json")),
//!     &catalog,
//!     labels,
//!     registry.clone(),
//! );
//!
//! let snapshot = parse_snapshot(
//!     r#"{"card0": {"Temperature (Sensor edge) (C)": "52.0", "Serial Number": "abc123"}}"#,
//! )
//! .unwrap();
//! poller.apply(&snapshot);
//!
//! let labels = [("gpu", "card0"), ("serial_number", "abc123")];
//! assert_eq!(registry.gauge_value("temperature_sensor_edge_c", &labels), Some(52.0));
//! ```

pub mod config;
pub mod error;
pub mod exporter;
pub mod fields;
pub mod names;
pub mod registry;
pub mod server;
pub mod source;

// Re-export main types for convenience
pub use config::Settings;
pub use error::{ExporterError, Result};
pub use exporter::{CycleReport, Exporter, Poller};
pub use fields::{FieldCatalog, FieldKind, LabelDict};
pub use names::sanitize;
pub use registry::MetricRegistry;
pub use server::{MetricsServer, ServerConfig};
pub use source::{
    parse_snapshot, source_for, CommandSource, DeviceFields, FileSource, Snapshot, SnapshotSource,
};
