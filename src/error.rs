//! Engine error types.
//!
//! Only construction-time problems surface as hard errors: a configuration
//! that cannot be read or a malformed lookup-table asset. Everything that
//! happens during streaming (worker failures, out-of-bounds edits, NaN
//! samples) is absorbed inside the manager and reported through logging or
//! boolean results instead.

use thiserror::Error;

/// Errors surfaced while constructing or configuring the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A configuration file could not be read.
    #[error("failed to read config file: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// A configuration file could not be parsed.
    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A configuration value is outside its valid range.
    #[error("invalid config value for {field}: {reason}")]
    InvalidConfig {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The embedded marching-cubes tables failed load-time validation.
    #[error("malformed triangle table entry {configuration}: {reason}")]
    InvalidTables {
        /// The 8-bit cube configuration whose entry is malformed.
        configuration: usize,
        /// Why the entry was rejected.
        reason: String,
    },
}
