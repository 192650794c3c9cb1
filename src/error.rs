//! Top-level error type for the provenance checker.
//!
//! Module-local error enums ([`DumpError`](crate::dump::DumpError),
//! [`FetchError`](crate::fetch::FetchError) and friends) describe what went
//! wrong inside one component; this enum is the surface the binary maps to
//! an exit code. Only conditions that abort a run appear here — per-crate
//! soft failures are reported as verdicts, not errors.

use thiserror::Error;

/// Errors that abort a verification run.
#[derive(Debug, Error)]
pub enum ProvenanceError {
    /// The registry database dump could not be loaded.
    #[error("failed to load registry dump: {0}")]
    Dump(#[from] crate::dump::DumpError),

    /// A crate download failed for a reason other than a permission denial.
    ///
    /// A hard download failure implies the registry itself is unreachable,
    /// so the whole batch stops rather than misreporting every remaining
    /// crate.
    #[error("crate download failed: {0}")]
    Fetch(#[from] crate::fetch::FetchError),

    /// No crate with the requested name exists in the dump.
    #[error("no crate named \"{name}\" in the registry dump")]
    UnknownCrate {
        /// The name that was looked up.
        name: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`ProvenanceError`].
pub type Result<T> = std::result::Result<T, ProvenanceError>;
