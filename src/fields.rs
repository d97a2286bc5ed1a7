//! Static classification of rocm-smi fields into metrics and labels.
//!
//! Classification is by list membership only. A field that sometimes reads
//! `"N/A"` stays a metric; a field in neither list is ignored.

use std::collections::HashMap;

use crate::error::{ExporterError, Result};
use crate::names::sanitize;
use crate::source::DeviceFields;

/// Label carrying the device key (`card0`, `card1`, ...).
pub const DEVICE_LABEL: &str = "gpu";

/// Numeric rocm-smi fields exported as gauges.
pub const METRIC_NAMES: &[&str] = &[
    "Temperature (Sensor edge) (C)",
    "Temperature (Sensor junction) (C)",
    "Temperature (Sensor memory) (C)",
    "Fan speed (level)",
    "Fan speed (%)",
    "Fan RPM",
    "Average Graphics Package Power (W)",
    "Max Graphics Package Power (W)",
    "GPU use (%)",
    "GPU memory use (%)",
    "Voltage (mV)",
    "VRAM Total Memory (B)",
    "VRAM Total Used Memory (B)",
    "Accumulated Energy (uJ)",
];

/// Stable string attributes attached to every gauge as labels.
pub const LABEL_NAMES: &[&str] = &[
    "GPU ID",
    "Unique ID",
    "Serial Number",
    "Card series",
    "Card model",
    "Card vendor",
    "Card SKU",
    "PCI Bus",
    "VBIOS version",
];

/// How a raw field is treated by the exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Metric,
    Label,
    Ignored,
}

/// The curated metric and label lists, fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCatalog {
    metrics: Vec<String>,
    labels: Vec<String>,
}

impl FieldCatalog {
    /// Create a catalog from explicit lists.
    pub fn new<M, L>(metrics: M, labels: L) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        L: IntoIterator,
        L::Item: Into<String>,
    {
        Self {
            metrics: metrics.into_iter().map(Into::into).collect(),
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// The catalog for `rocm-smi --showallinfo` output.
    pub fn rocm_smi() -> Self {
        Self::new(METRIC_NAMES.iter().copied(), LABEL_NAMES.iter().copied())
    }

    /// Raw names of the curated metrics, in declaration order.
    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    /// Raw names of the curated labels, in declaration order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Classify a raw field name.
    pub fn classify(&self, raw: &str) -> FieldKind {
        if self.metrics.iter().any(|m| m == raw) {
            FieldKind::Metric
        } else if self.labels.iter().any(|l| l == raw) {
            FieldKind::Label
        } else {
            FieldKind::Ignored
        }
    }

    /// Build the raw → canonical label mapping used on every poll.
    ///
    /// Fails when a label sanitizes to nothing, or when two labels (or a
    /// label and [`DEVICE_LABEL`]) share a canonical name.
    pub fn label_dict(&self) -> Result<LabelDict> {
        let mut seen: HashMap<String, String> = HashMap::new();
        seen.insert(DEVICE_LABEL.to_string(), DEVICE_LABEL.to_string());

        let mut entries = Vec::with_capacity(self.labels.len());
        for raw in &self.labels {
            let canonical = sanitize(raw);
            if canonical.is_empty() {
                return Err(ExporterError::EmptyCanonicalName(raw.clone()));
            }
            if let Some(first) = seen.get(&canonical) {
                return Err(ExporterError::DuplicateLabelName {
                    canonical,
                    first: first.clone(),
                    second: raw.clone(),
                });
            }
            seen.insert(canonical.clone(), raw.clone());
            entries.push((raw.clone(), canonical));
        }

        Ok(LabelDict { entries })
    }
}

impl Default for FieldCatalog {
    fn default() -> Self {
        Self::rocm_smi()
    }
}

/// Ordered mapping of raw label field → canonical label name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDict {
    entries: Vec<(String, String)>,
}

impl LabelDict {
    /// `(raw, canonical)` pairs in catalog order.
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Full label schema of every gauge: [`DEVICE_LABEL`] followed by the
    /// canonical label names.
    pub fn schema(&self) -> Vec<&str> {
        std::iter::once(DEVICE_LABEL)
            .chain(self.entries.iter().map(|(_, canonical)| canonical.as_str()))
            .collect()
    }

    /// Label values for one device, in [`schema`](Self::schema) order.
    pub fn values<'a>(&self, device: &'a str, fields: &'a DeviceFields) -> Result<Vec<&'a str>> {
        let mut values = Vec::with_capacity(self.entries.len() + 1);
        values.push(device);
        for (raw, _) in &self.entries {
            let value = fields
                .get(raw)
                .ok_or_else(|| ExporterError::MissingLabelField {
                    device: device.to_string(),
                    field: raw.clone(),
                })?;
            values.push(value.as_str());
        }
        Ok(values)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
