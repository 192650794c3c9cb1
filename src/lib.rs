//! Provenance checking for crates.io packages.
//!
//! This crate decides whether a published `.crate` archive is provably
//! derived from the git repository its metadata claims as origin. Two
//! complementary techniques are used: correlating the recorded commit with
//! release tags, and checking that every packaged source file exists as a
//! blob in the repository's object store. A cheap shallow clone is tried
//! first; a full clone is the fallback when the shallow evidence is
//! inconclusive.
//!
//! # Modules
//!
//! - [`archive`] - Crate tarball reading and embedded provenance metadata
//! - [`cli`] - Command-line argument definitions
//! - [`dump`] - Registry database dump parsing and crate ranking
//! - [`error`] - Top-level semantic error type
//! - [`fetch`] - Crate archive download from the registry CDN
//! - [`git`] - Ephemeral repository clones and blob addressing
//! - [`report`] - Human-readable per-crate status output
//! - [`verify`] - The per-crate verification state machine
//! - [`version`] - Lenient semver parsing and latest-version selection

pub mod archive;
pub mod cli;
pub mod dump;
pub mod error;
pub mod fetch;
pub mod git;
pub mod report;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod verify;
pub mod version;
