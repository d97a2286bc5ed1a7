//! Gauge instruments for the curated metrics.
//!
//! One `GaugeVec` per curated metric, created once before the first poll and
//! kept for the life of the process. Coordinates are only ever overwritten;
//! a device that stops reporting keeps its last value.

use std::collections::HashMap;
use std::fmt;

use prometheus::{Encoder, GaugeVec, IntCounter, Opts, Registry, TextEncoder};

use crate::error::{ExporterError, Result};
use crate::fields::LabelDict;
use crate::names::sanitize;

/// Counter incremented on every poll cycle.
pub const POLLS_TOTAL: &str = "rocm_exporter_polls_total";
/// Counter incremented when a poll cycle could not fetch a snapshot.
pub const POLL_FAILURES_TOTAL: &str = "rocm_exporter_poll_failures_total";

/// A registered gauge and the raw field it tracks.
#[derive(Clone)]
struct Instrument {
    canonical: String,
    gauge: GaugeVec,
}

/// Registry of gauge instruments shared by the poll loop and the endpoint.
///
/// Each coordinate write is atomic; there is no consistency across metrics,
/// so a scrape may see some values from the current cycle and some from the
/// previous one.
pub struct MetricRegistry {
    registry: Registry,
    /// Raw metric name → instrument.
    instruments: HashMap<String, Instrument>,
    /// Canonical names in catalog order.
    names: Vec<String>,
    polls: IntCounter,
    poll_failures: IntCounter,
}

impl MetricRegistry {
    /// Create one gauge per raw metric name, labelled with the schema of
    /// `labels`.
    ///
    /// Fails if a name sanitizes to nothing, if two names share a canonical
    /// name, or if the metrics library rejects a name.
    pub fn build<S: AsRef<str>>(metrics: &[S], labels: &LabelDict) -> Result<Self> {
        let registry = Registry::new();
        let schema = labels.schema();

        let polls = IntCounter::new(POLLS_TOTAL, "Number of rocm-smi poll cycles")?;
        let poll_failures = IntCounter::new(
            POLL_FAILURES_TOTAL,
            "Number of poll cycles where no snapshot could be fetched",
        )?;
        registry.register(Box::new(polls.clone()))?;
        registry.register(Box::new(poll_failures.clone()))?;

        let mut owners: HashMap<String, String> = HashMap::new();
        owners.insert(POLLS_TOTAL.to_string(), POLLS_TOTAL.to_string());
        owners.insert(POLL_FAILURES_TOTAL.to_string(), POLL_FAILURES_TOTAL.to_string());

        let mut instruments = HashMap::with_capacity(metrics.len());
        let mut names = Vec::with_capacity(metrics.len());

        for raw in metrics {
            let raw = raw.as_ref();
            let canonical = sanitize(raw);
            if canonical.is_empty() {
                return Err(ExporterError::EmptyCanonicalName(raw.to_string()));
            }
            if let Some(first) = owners.get(&canonical) {
                return Err(ExporterError::DuplicateInstrumentName {
                    canonical,
                    first: first.clone(),
                    second: raw.to_string(),
                });
            }

            let gauge = GaugeVec::new(Opts::new(canonical.clone(), raw), &schema)?;
            registry.register(Box::new(gauge.clone())).map_err(|e| match e {
                prometheus::Error::AlreadyReg => ExporterError::DuplicateInstrumentName {
                    canonical: canonical.clone(),
                    first: canonical.clone(),
                    second: raw.to_string(),
                },
                other => ExporterError::Registry(other),
            })?;

            owners.insert(canonical.clone(), raw.to_string());
            names.push(canonical.clone());
            instruments.insert(raw.to_string(), Instrument { canonical, gauge });
        }

        Ok(Self {
            registry,
            instruments,
            names,
            polls,
            poll_failures,
        })
    }

    /// Set the gauge for `metric` (raw name) at the coordinate given by
    /// `label_values`, which must be in [`LabelDict::schema`] order with the
    /// device key first.
    ///
    /// Returns `Ok(false)` if `metric` has no instrument.
    pub fn set_value(&self, metric: &str, label_values: &[&str], value: f64) -> Result<bool> {
        let Some(instrument) = self.instruments.get(metric) else {
            return Ok(false);
        };
        instrument
            .gauge
            .get_metric_with_label_values(label_values)?
            .set(value);
        Ok(true)
    }

    /// Canonical instrument names, in catalog order.
    pub fn instrument_names(&self) -> &[String] {
        &self.names
    }

    /// Number of gauge instruments (self-metrics excluded).
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Canonical name of the instrument tracking a raw metric.
    pub fn canonical_name(&self, metric: &str) -> Option<&str> {
        self.instruments.get(metric).map(|i| i.canonical.as_str())
    }

    /// Current value of a gauge coordinate, without creating it.
    ///
    /// `labels` must list every label of the coordinate; order is irrelevant.
    pub fn gauge_value(&self, canonical: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let families = self.registry.gather();
        let family = families.iter().find(|f| f.get_name() == canonical)?;
        family
            .get_metric()
            .iter()
            .find(|metric| {
                let pairs = metric.get_label();
                pairs.len() == labels.len()
                    && labels.iter().all(|(name, value)| {
                        pairs
                            .iter()
                            .any(|p| p.get_name() == *name && p.get_value() == *value)
                    })
            })
            .map(|metric| metric.get_gauge().get_value())
    }

    /// Number of coordinates currently exposed by an instrument.
    pub fn coordinate_count(&self, canonical: &str) -> usize {
        self.registry
            .gather()
            .iter()
            .find(|f| f.get_name() == canonical)
            .map(|f| f.get_metric().len())
            .unwrap_or(0)
    }

    /// Record the outcome of a poll cycle.
    pub fn record_poll(&self, fetched: bool) {
        self.polls.inc();
        if !fetched {
            self.poll_failures.inc();
        }
    }

    /// Render every instrument in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| ExporterError::Registry(prometheus::Error::Msg(e.to_string())))
    }
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("instruments", &self.names)
            .finish_non_exhaustive()
    }
}
