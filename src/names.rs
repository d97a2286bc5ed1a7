//! Canonical names for raw rocm-smi field names.

/// Map a raw field name to an identifier usable as a metric or label name.
///
/// Every character outside `[A-Za-z0-9_]` becomes `_`, the result is
/// lowercased, runs of `_` collapse to one and leading/trailing `_` are
/// stripped. The output may be empty when the input has no ASCII
/// alphanumerics; callers registering instruments must reject that.
///
/// ```
/// use rocm_exporter::sanitize;
///
/// assert_eq!(sanitize("Temperature (Sensor edge) (C)"), "temperature_sensor_edge_c");
/// assert_eq!(sanitize("GPU use (%)"), "gpu_use");
/// ```
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_underscore = false;

    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            // Only emit a separator between two kept characters.
            if pending_underscore && !out.is_empty() {
                out.push('_');
            }
            pending_underscore = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_underscore = true;
        }
    }

    out
}
