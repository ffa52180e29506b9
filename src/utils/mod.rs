pub mod setting;

/// Renders a byte count as megabytes with two decimals, the unit used in
/// every progress and summary line.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// ETags come back from the object store wrapped in double quotes.
pub fn strip_etag_quotes(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}
