//! Shared types for rocm-smi snapshots.
//!
//! These types match the JSON printed by `rocm-smi --json`: one object per
//! device keyed by card name, plus an optional `system` object carrying
//! host-level metadata.

use std::collections::BTreeMap;

use crate::error::{ExporterError, Result};

/// Reserved top-level key for host metadata. Never treated as a device.
pub const SYSTEM_KEY: &str = "system";

/// Raw fields of a single device: field name → field value, both as printed.
pub type DeviceFields = BTreeMap<String, String>;

/// A complete snapshot: device key (or [`SYSTEM_KEY`]) → raw fields.
pub type Snapshot = BTreeMap<String, DeviceFields>;

/// Parse a snapshot from JSON text.
///
/// Anything other than an object of objects of strings is rejected.
pub fn parse_snapshot(json: &str) -> Result<Snapshot> {
    serde_json::from_str(json)
        .map_err(|e| ExporterError::SourceUnavailable(format!("invalid snapshot JSON: {}", e)))
}

/// Iterate over the device entries of a snapshot, skipping [`SYSTEM_KEY`].
pub fn devices(snapshot: &Snapshot) -> impl Iterator<Item = (&str, &DeviceFields)> {
    snapshot
        .iter()
        .filter(|(key, _)| key.as_str() != SYSTEM_KEY)
        .map(|(key, fields)| (key.as_str(), fields))
}

/// The host metadata entry, if present.
pub fn system(snapshot: &Snapshot) -> Option<&DeviceFields> {
    snapshot.get(SYSTEM_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snapshot() {
        let json = r#"{
            "card0": {
                "Temperature (Sensor edge) (C)": "52.0",
                "Serial Number": "abc123"
            },
            "system": {
                "Driver version": "5.18.13"
            }
        }"#;

        let snapshot = parse_snapshot(json).unwrap();
        assert_eq!(snapshot.len(), 2);

        let card = snapshot.get("card0").unwrap();
        assert_eq!(card.get("Serial Number").unwrap(), "abc123");

        let system = system(&snapshot).unwrap();
        assert_eq!(system.get("Driver version").unwrap(), "5.18.13");
    }

    #[test]
    fn test_devices_skips_system() {
        let snapshot = parse_snapshot(
            r#"{"card1": {}, "system": {"Driver version": "6.1"}, "card0": {}}"#,
        )
        .unwrap();

        let keys: Vec<&str> = devices(&snapshot).map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["card0", "card1"]);
    }

    #[test]
    fn test_system_is_optional() {
        let snapshot = parse_snapshot(r#"{"card0": {"GPU ID": "0x740f"}}"#).unwrap();
        assert!(system(&snapshot).is_none());
        assert_eq!(devices(&snapshot).count(), 1);
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        for json in [
            "not json",
            "[]",
            r#"{"card0": "52.0"}"#,
            r#"{"card0": {"Fan RPM": 1200}}"#,
        ] {
            match parse_snapshot(json) {
                Err(ExporterError::SourceUnavailable(msg)) => {
                    assert!(msg.contains("invalid snapshot JSON"), "{msg}")
                }
                other => panic!("{json}: unexpected result {other:?}"),
            }
        }
    }
}
