// Build-time identity reported by GET /version

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name, `fitbit-exporter`.
pub const NAME: &str = env!("CARGO_PKG_NAME");
