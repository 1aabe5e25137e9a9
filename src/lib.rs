pub mod analyzer;
pub mod anthropometry;
pub mod config;
pub mod pose;
pub mod scanner;

#[cfg(test)]
mod fixtures;

/// Recording file extension we read
pub const RECORDING_EXTENSION: &str = "json";

/// Suffix of the result files written by `batch`; never read back as input
pub const OUTPUT_SUFFIX: &str = "swing.json";

/// Application name for XDG paths
pub const APP_NAME: &str = "swingtrace";
