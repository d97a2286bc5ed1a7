//! The poll loop: fetch a snapshot, write every curated metric, sleep.
//!
//! [`Exporter::initialize`] runs once and fails fast: the first fetch, the
//! label dictionary, the registry and the endpoint bind must all succeed.
//! [`Exporter::run`] then polls forever; failures inside a cycle are logged
//! and leave the previously exported values in place.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{ExporterError, Result};
use crate::fields::{FieldCatalog, FieldKind, LabelDict};
use crate::registry::MetricRegistry;
use crate::server::{MetricsServer, ServerConfig};
use crate::source::{devices, system, Snapshot, SnapshotSource};

/// Time between the end of one poll cycle and the start of the next.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome counts for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Devices whose label set was complete.
    pub devices_updated: usize,
    /// Devices skipped because a curated label field was missing.
    pub devices_skipped: usize,
    /// Gauge coordinates written.
    pub values_set: usize,
    /// Curated metric fields present but not written.
    pub values_skipped: usize,
    /// Device fields that are neither curated metrics nor labels.
    pub fields_ignored: usize,
}

/// Writes snapshots into the registry on a fixed cadence.
#[derive(Debug)]
pub struct Poller {
    source: Box<dyn SnapshotSource>,
    catalog: FieldCatalog,
    labels: LabelDict,
    registry: Arc<MetricRegistry>,
    interval: Duration,
}

impl Poller {
    pub fn new(
        source: Box<dyn SnapshotSource>,
        catalog: &FieldCatalog,
        labels: LabelDict,
        registry: Arc<MetricRegistry>,
    ) -> Self {
        Self {
            source,
            catalog: catalog.clone(),
            labels,
            registry,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the poll interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Write one snapshot into the registry.
    ///
    /// The `system` entry is never treated as a device. A device missing a
    /// label field is skipped entirely; a non-numeric metric value skips only
    /// that coordinate.
    pub fn apply(&self, snapshot: &Snapshot) -> CycleReport {
        let mut report = CycleReport::default();

        for (device, fields) in devices(snapshot) {
            let label_values = match self.labels.values(device, fields) {
                Ok(values) => values,
                Err(e) => {
                    warn!(error = %e, "skipping device this cycle");
                    report.devices_skipped += 1;
                    continue;
                }
            };
            report.devices_updated += 1;

            for (field, raw) in fields {
                let metric = field.as_str();
                match self.catalog.classify(metric) {
                    FieldKind::Metric => {}
                    FieldKind::Label => continue,
                    FieldKind::Ignored => {
                        report.fields_ignored += 1;
                        continue;
                    }
                }

                let value = match parse_value(device, metric, raw) {
                    Ok(value) => value,
                    Err(e) => {
                        debug!(error = %e, "skipping metric value");
                        report.values_skipped += 1;
                        continue;
                    }
                };

                match self.registry.set_value(metric, &label_values, value) {
                    Ok(true) => report.values_set += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!(error = %e, device, metric, "failed to set gauge");
                        report.values_skipped += 1;
                    }
                }
            }
        }

        report
    }

    /// Fetch a snapshot and apply it.
    ///
    /// On fetch failure nothing is written and the error is returned.
    pub async fn poll_once(&mut self) -> Result<CycleReport> {
        match self.source.fetch().await {
            Ok(snapshot) => {
                self.registry.record_poll(true);
                Ok(self.apply(&snapshot))
            }
            Err(e) => {
                self.registry.record_poll(false);
                Err(e)
            }
        }
    }

    /// Poll forever. Cycles never overlap.
    ///
    /// Starts with a sleep: the snapshot fetched during initialization has
    /// already been applied.
    pub async fn run(mut self) {
        loop {
            tokio::time::sleep(self.interval).await;

            match self.poll_once().await {
                Ok(report) => debug!(?report, "poll cycle complete"),
                Err(e) => warn!(
                    error = %e,
                    source = self.source.description(),
                    "poll cycle failed; keeping previous values"
                ),
            }
        }
    }
}

/// Parse a raw metric value as a float.
fn parse_value(device: &str, metric: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ExporterError::UnparseableMetricValue {
            device: device.to_string(),
            field: metric.to_string(),
            value: raw.to_string(),
        })
}

/// A fully initialized exporter: registry built, endpoint serving, first
/// snapshot applied.
#[derive(Debug)]
pub struct Exporter {
    poller: Poller,
    server: tokio::task::JoinHandle<()>,
    local_addr: SocketAddr,
}

impl Exporter {
    /// Run the initialization sequence.
    ///
    /// Any failure here is fatal: the source must deliver a first snapshot,
    /// the curated lists must produce a valid registry, and the listen
    /// address must be bindable.
    pub async fn initialize(
        settings: &Settings,
        catalog: FieldCatalog,
        mut source: Box<dyn SnapshotSource>,
    ) -> Result<Self> {
        info!(source = source.description(), "fetching initial snapshot");
        let first = source.fetch().await?;

        if let Some(host) = system(&first) {
            for (key, value) in host {
                info!(field = key.as_str(), value = value.as_str(), "host");
            }
        }

        let labels = catalog.label_dict()?;
        let registry = Arc::new(MetricRegistry::build(catalog.metrics(), &labels)?);
        info!(
            instruments = registry.len(),
            labels = labels.len() + 1,
            "metric registry built"
        );

        let config = ServerConfig::builder()
            .listen_addr(settings.listen_addr())
            .build();
        let server = MetricsServer::bind(config, registry.clone()).await?;
        let local_addr = server.local_addr()?;
        let server = server.spawn();
        info!(%local_addr, "serving metrics");

        let poller = Poller::new(source, &catalog, labels, registry);
        poller.registry.record_poll(true);
        let report = poller.apply(&first);
        info!(
            devices = report.devices_updated,
            skipped = report.devices_skipped,
            values = report.values_set,
            "initial snapshot applied"
        );

        Ok(Self {
            poller,
            server,
            local_addr,
        })
    }

    /// Override the poll interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.poller = self.poller.with_interval(interval);
        self
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        self.poller.registry()
    }

    /// Address the metrics endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Poll until the process is terminated.
    ///
    /// Only returns if the metrics endpoint stops accepting connections.
    pub async fn run(self) -> Result<()> {
        let Self { poller, server, .. } = self;

        tokio::select! {
            _ = poller.run() => Ok(()),
            _ = server => Err(ExporterError::Io(std::io::Error::other(
                "metrics endpoint stopped",
            ))),
        }
    }
}
