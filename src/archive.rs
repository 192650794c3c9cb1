//! Crate tarball reading and embedded provenance metadata.
//!
//! A published `.crate` file is a gzip-compressed tar archive. This module
//! wraps the raw bytes, validates them up front, and exposes the two
//! operations verification needs: extracting the `.cargo_vcs_info.json`
//! provenance record and collecting source files by extension.

use flate2::read::GzDecoder;
use serde::Deserialize;
use std::io::{Cursor, Read};
use thiserror::Error;

/// Filename suffix of the provenance metadata member cargo embeds.
pub const VCS_INFO_SUFFIX: &str = ".cargo_vcs_info.json";

/// Errors arising from crate archive handling.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The bytes are not a readable gzip-compressed tar archive.
    #[error("invalid crate archive: {reason}")]
    Invalid {
        /// Description of the decode failure.
        reason: String,
    },
}

impl ArchiveError {
    fn invalid(err: &std::io::Error) -> Self {
        Self::Invalid {
            reason: err.to_string(),
        }
    }
}

/// The provenance record cargo embeds when packaging from a git checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct VcsInfo {
    git: GitReference,
}

#[derive(Debug, Clone, Deserialize)]
struct GitReference {
    sha1: String,
}

impl VcsInfo {
    /// The commit the publisher claims to have packaged from.
    #[must_use]
    pub fn commit_sha(&self) -> &str {
        &self.git.sha1
    }
}

/// A source file extracted from a crate archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Member path inside the archive (includes the `name-version/` prefix).
    pub path: String,
    /// Raw file contents.
    pub contents: Vec<u8>,
}

/// In-memory handle over a crate's decompressed contents.
///
/// Owns the raw gzip bytes and opens a fresh tar stream per operation,
/// since tar readers are single-pass. Construction walks the archive once
/// so malformed input fails immediately rather than mid-verification.
pub struct SourceArchive {
    data: Vec<u8>,
}

impl SourceArchive {
    /// Wrap raw `.crate` bytes, validating that they decode as gzip + tar.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Invalid`] if the bytes cannot be walked as a
    /// gzip-compressed tar archive.
    pub fn new(data: Vec<u8>) -> Result<Self, ArchiveError> {
        let archive = Self { data };
        archive.validate()?;
        Ok(archive)
    }

    fn open(&self) -> tar::Archive<GzDecoder<Cursor<&[u8]>>> {
        tar::Archive::new(GzDecoder::new(Cursor::new(self.data.as_slice())))
    }

    fn validate(&self) -> Result<(), ArchiveError> {
        let mut archive = self.open();
        let entries = archive.entries().map_err(|e| ArchiveError::invalid(&e))?;
        for entry in entries {
            entry.map_err(|e| ArchiveError::invalid(&e))?;
        }
        Ok(())
    }

    /// Extract the embedded provenance metadata, if any.
    ///
    /// Returns `Ok(None)` when no member name ends with
    /// [`VCS_INFO_SUFFIX`], and also when the member exists but does not
    /// parse — a crate packaged outside a git checkout, or with mangled
    /// metadata, is a signal for the caller, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Invalid`] only if the archive itself fails
    /// to decode while scanning.
    pub fn vcs_info(&self) -> Result<Option<VcsInfo>, ArchiveError> {
        let mut archive = self.open();
        let entries = archive.entries().map_err(|e| ArchiveError::invalid(&e))?;
        for entry in entries {
            let mut entry = entry.map_err(|e| ArchiveError::invalid(&e))?;
            let path = entry.path().map_err(|e| ArchiveError::invalid(&e))?;
            if !path.to_string_lossy().ends_with(VCS_INFO_SUFFIX) {
                continue;
            }
            let mut json = String::new();
            entry
                .read_to_string(&mut json)
                .map_err(|e| ArchiveError::invalid(&e))?;
            return match serde_json::from_str::<VcsInfo>(&json) {
                Ok(info) => Ok(Some(info)),
                Err(err) => {
                    log::warn!("malformed {VCS_INFO_SUFFIX}: {err}");
                    Ok(None)
                }
            };
        }
        Ok(None)
    }

    /// Collect the regular-file members whose path ends with `suffix`.
    ///
    /// Used to select source files by extension (e.g. `".rs"`). Member
    /// order follows the archive.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Invalid`] if the archive fails to decode
    /// while scanning.
    pub fn source_files(&self, suffix: &str) -> Result<Vec<SourceFile>, ArchiveError> {
        let mut archive = self.open();
        let entries = archive.entries().map_err(|e| ArchiveError::invalid(&e))?;
        let mut files = Vec::new();
        for entry in entries {
            let mut entry = entry.map_err(|e| ArchiveError::invalid(&e))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let path = entry
                .path()
                .map_err(|e| ArchiveError::invalid(&e))?
                .to_string_lossy()
                .into_owned();
            if !path.ends_with(suffix) {
                continue;
            }
            let mut contents = Vec::new();
            entry
                .read_to_end(&mut contents)
                .map_err(|e| ArchiveError::invalid(&e))?;
            files.push(SourceFile { path, contents });
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{crate_tarball, gzip_tarball};

    #[test]
    fn rejects_bytes_that_are_not_gzip() {
        let result = SourceArchive::new(b"definitely not a tarball".to_vec());
        assert!(matches!(result, Err(ArchiveError::Invalid { .. })));
    }

    #[test]
    fn rejects_gzip_of_non_tar_data() {
        use flate2::{Compression, write::GzEncoder};
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"short").expect("write");
        let data = encoder.finish().expect("finish");

        let result = SourceArchive::new(data);
        assert!(matches!(result, Err(ArchiveError::Invalid { .. })));
    }

    #[test]
    fn extracts_commit_from_vcs_info() {
        let data = crate_tarball(
            "serde",
            "1.0.0",
            Some("0123456789abcdef0123456789abcdef01234567"),
            &[("src/lib.rs", b"pub fn hello() {}\n")],
        );
        let archive = SourceArchive::new(data).expect("valid archive");
        let info = archive
            .vcs_info()
            .expect("readable archive")
            .expect("metadata present");
        assert_eq!(
            info.commit_sha(),
            "0123456789abcdef0123456789abcdef01234567"
        );
    }

    #[test]
    fn missing_vcs_info_is_none_not_an_error() {
        let data = crate_tarball("serde", "1.0.0", None, &[("src/lib.rs", b"")]);
        let archive = SourceArchive::new(data).expect("valid archive");
        assert!(archive.vcs_info().expect("readable archive").is_none());
    }

    #[test]
    fn malformed_vcs_info_is_none_not_an_error() {
        let data = gzip_tarball(&[
            ("serde-1.0.0/.cargo_vcs_info.json", b"{\"git\": 42}".as_slice()),
            ("serde-1.0.0/src/lib.rs", b"".as_slice()),
        ]);
        let archive = SourceArchive::new(data).expect("valid archive");
        assert!(archive.vcs_info().expect("readable archive").is_none());
    }

    #[test]
    fn source_files_filters_by_suffix() {
        let data = crate_tarball(
            "demo",
            "0.1.0",
            None,
            &[
                ("src/lib.rs", b"fn a() {}\n".as_slice()),
                ("src/main.rs", b"fn main() {}\n".as_slice()),
                ("README.md", b"# demo\n".as_slice()),
            ],
        );
        let archive = SourceArchive::new(data).expect("valid archive");
        let files = archive.source_files(".rs").expect("readable archive");
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["demo-0.1.0/src/lib.rs", "demo-0.1.0/src/main.rs"]);
        assert_eq!(files[0].contents, b"fn a() {}\n");
    }

    #[test]
    fn source_files_of_empty_selection_is_empty() {
        let data = crate_tarball("demo", "0.1.0", None, &[("README.md", b"hi".as_slice())]);
        let archive = SourceArchive::new(data).expect("valid archive");
        let files = archive.source_files(".rs").expect("readable archive");
        assert!(files.is_empty());
    }
}
