//! The per-crate verification state machine.
//!
//! For one [`PackageTarget`], the engine downloads the published archive,
//! extracts the claimed commit, and decides whether the packaged source is
//! provably derived from the claimed repository. The cheap path is a
//! shallow clone of the claimed commit; when that is inconclusive — the
//! commit reference is missing, the shallow clone fails, or some blob is
//! absent — the engine escalates to a full clone and repeats the blob scan
//! against the complete object store.
//!
//! The blob scan result is an explicit value the engine branches on;
//! expected outcomes never travel as errors.

use crate::archive::{ArchiveError, SourceArchive, SourceFile};
use crate::dump::PackageTarget;
use crate::error::{ProvenanceError, Result};
use crate::fetch::{CrateFetcher, FetchError};
use crate::git::{GitError, RepoQuery, RepoSource, hash_candidates};

/// Filename suffix selecting the source files to match against the
/// repository.
pub const SOURCE_FILE_SUFFIX: &str = ".rs";

/// How many unmatched filenames to carry as a sample on a negative
/// verdict.
const MISSING_SAMPLE_LIMIT: usize = 5;

/// Which clone the deciding blob scan ran against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneDepth {
    /// The minimal single-commit fetch.
    Shallow,
    /// The complete bare clone spanning all commits and branches.
    Full,
}

/// Outcome of correlating the claimed commit with release tags.
///
/// A tag mismatch is a weak signal: it is recorded and reported but never
/// terminal and never triggers the full-clone fallback on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOutcome {
    /// One of the candidate tag names points at the claimed commit.
    Matched {
        /// The tag name that matched.
        tag: String,
    },
    /// No candidate matched; the tags actually found ride along.
    Unmatched {
        /// Tags pointing at the commit, possibly empty.
        tags: Vec<String>,
    },
    /// Tag correlation never ran (no commit reference, or the shallow
    /// clone failed).
    NotChecked,
}

/// The terminal status of one crate's verification.
///
/// Exactly one verdict is produced per crate per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The claimed repository URL is empty or missing; nothing to verify
    /// against.
    UrlMissing,
    /// The registry denied the archive download for this crate.
    FetchDenied,
    /// The downloaded bytes were not a readable crate archive.
    ArchiveInvalid {
        /// Description of the decode failure.
        reason: String,
    },
    /// The repository could not be cloned at the full-clone stage; no
    /// further recourse exists.
    RepoCloneFailed {
        /// Description of the clone failure.
        reason: String,
    },
    /// Every packaged source file exists in the repository object store.
    BlobsAllPresent {
        /// Which clone supplied the evidence.
        depth: CloneDepth,
    },
    /// At least one packaged source file has no matching blob, even in the
    /// full clone.
    BlobsMissing {
        /// How many source files were checked.
        checked: usize,
        /// How many had no matching blob.
        missing: usize,
        /// Up to the first few unmatched member paths.
        sample: Vec<String>,
    },
}

/// One crate's verification outcome plus supporting detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Crate name.
    pub name: String,
    /// Version that was verified.
    pub version: String,
    /// The commit the archive claims to have been packaged from; `None`
    /// when the provenance metadata was absent or malformed.
    pub commit: Option<String>,
    /// Tag correlation outcome.
    pub tag: TagOutcome,
    /// The terminal status.
    pub verdict: Verdict,
}

/// Result of scanning every packaged source file against one object store.
///
/// Always fully computed: the scan never short-circuits, so `missing` is
/// the complete list of unmatched member paths.
struct BlobScan {
    checked: usize,
    missing: Vec<String>,
}

impl BlobScan {
    fn all_present(&self) -> bool {
        self.missing.is_empty()
    }
}

/// The verification engine, parameterized over its collaborators so tests
/// can run it without network or subprocess access.
pub struct Verifier<'a> {
    fetcher: &'a dyn CrateFetcher,
    repos: &'a dyn RepoSource,
}

impl<'a> Verifier<'a> {
    /// Build an engine over the given fetcher and repository source.
    #[must_use]
    pub fn new(fetcher: &'a dyn CrateFetcher, repos: &'a dyn RepoSource) -> Self {
        Self { fetcher, repos }
    }

    /// Verify one crate end to end, producing exactly one terminal
    /// verdict.
    ///
    /// # Errors
    ///
    /// Returns [`ProvenanceError::Fetch`] only for a hard download failure
    /// (anything other than a permission denial), which aborts the whole
    /// batch: it implies the registry itself is unreachable.
    pub fn verify(&self, target: &PackageTarget) -> Result<Report> {
        let report = |commit: Option<String>, tag: TagOutcome, verdict: Verdict| Report {
            name: target.name.clone(),
            version: target.version.clone(),
            commit,
            tag,
            verdict,
        };

        // Step 1: without a repository URL there is nothing to verify
        // against, and no network call is made.
        let Some(url) = target.repository.as_deref().filter(|u| !u.is_empty()) else {
            return Ok(report(None, TagOutcome::NotChecked, Verdict::UrlMissing));
        };

        // Step 2: fetch and open the published archive.
        let bytes = match self.fetcher.fetch(&target.name, &target.version) {
            Ok(bytes) => bytes,
            Err(FetchError::Forbidden { url }) => {
                log::warn!("{} {}: download forbidden: {url}", target.name, target.version);
                return Ok(report(None, TagOutcome::NotChecked, Verdict::FetchDenied));
            }
            Err(fatal) => return Err(ProvenanceError::Fetch(fatal)),
        };
        let archive = match SourceArchive::new(bytes) {
            Ok(archive) => archive,
            Err(ArchiveError::Invalid { reason }) => {
                return Ok(report(
                    None,
                    TagOutcome::NotChecked,
                    Verdict::ArchiveInvalid { reason },
                ));
            }
        };

        // Step 3: extract the claimed commit. Absent or malformed
        // metadata makes commit-based matching impossible, so the shallow
        // path is skipped entirely.
        let commit = match archive.vcs_info() {
            Ok(info) => info.map(|i| i.commit_sha().to_owned()),
            Err(ArchiveError::Invalid { reason }) => {
                return Ok(report(
                    None,
                    TagOutcome::NotChecked,
                    Verdict::ArchiveInvalid { reason },
                ));
            }
        };

        // The file set is fixed for both scan phases.
        let files = match archive.source_files(SOURCE_FILE_SUFFIX) {
            Ok(files) => files,
            Err(ArchiveError::Invalid { reason }) => {
                return Ok(report(
                    commit,
                    TagOutcome::NotChecked,
                    Verdict::ArchiveInvalid { reason },
                ));
            }
        };

        // Steps 4-5: shallow clone, tag correlation, shallow blob scan.
        let mut tag = TagOutcome::NotChecked;
        if let Some(commit_sha) = commit.as_deref() {
            match self.repos.clone_shallow(url, commit_sha) {
                Ok(repo) => {
                    tag = match_tags(repo.as_ref(), commit_sha, &target.name, &target.version);
                    match scan_blobs(&files, repo.as_ref()) {
                        Ok(scan) if scan.all_present() => {
                            // Strong, cheap evidence: accept without ever
                            // touching the full clone.
                            return Ok(report(
                                commit,
                                tag,
                                Verdict::BlobsAllPresent {
                                    depth: CloneDepth::Shallow,
                                },
                            ));
                        }
                        Ok(scan) => {
                            log::info!(
                                "{} {}: {} of {} files unmatched in shallow clone, escalating",
                                target.name,
                                target.version,
                                scan.missing.len(),
                                scan.checked
                            );
                        }
                        Err(err) => {
                            log::warn!(
                                "{} {}: shallow scan failed ({err}), escalating",
                                target.name,
                                target.version
                            );
                        }
                    }
                }
                Err(err) => {
                    log::warn!(
                        "{} {}: shallow clone failed ({err}), escalating",
                        target.name,
                        target.version
                    );
                }
            }
        }

        // Step 6: full-clone fallback. A failure here is the end of the
        // line.
        let repo = match self.repos.clone_full(url) {
            Ok(repo) => repo,
            Err(err) => {
                return Ok(report(
                    commit,
                    tag,
                    Verdict::RepoCloneFailed {
                        reason: err.to_string(),
                    },
                ));
            }
        };
        let verdict = match scan_blobs(&files, repo.as_ref()) {
            Ok(scan) if scan.all_present() => Verdict::BlobsAllPresent {
                depth: CloneDepth::Full,
            },
            Ok(scan) => {
                let missing = scan.missing.len();
                let mut sample = scan.missing;
                sample.truncate(MISSING_SAMPLE_LIMIT);
                Verdict::BlobsMissing {
                    checked: scan.checked,
                    missing,
                    sample,
                }
            }
            Err(err) => Verdict::RepoCloneFailed {
                reason: err.to_string(),
            },
        };
        Ok(report(commit, tag, verdict))
    }
}

/// The tag names that conventionally label a release, in match priority
/// order.
#[must_use]
pub fn tag_candidates(name: &str, version: &str) -> [String; 4] {
    [
        version.to_owned(),
        format!("v{version}"),
        format!("{name}-{version}"),
        format!("{name}-v{version}"),
    ]
}

/// Correlate the claimed commit with release tags.
///
/// A listing failure is logged and treated as no match; tag correlation is
/// a weak signal and must never fail a crate on its own.
fn match_tags(repo: &dyn RepoQuery, commit: &str, name: &str, version: &str) -> TagOutcome {
    let tags = match repo.tags_at(commit) {
        Ok(tags) => tags,
        Err(err) => {
            log::warn!("{name} {version}: failed to read tags: {err}");
            return TagOutcome::Unmatched { tags: Vec::new() };
        }
    };
    for candidate in tag_candidates(name, version) {
        if tags.contains(&candidate) {
            return TagOutcome::Matched { tag: candidate };
        }
    }
    TagOutcome::Unmatched { tags }
}

/// Check every source file's blob candidates against one object store.
///
/// A file counts as present when any of its candidate hashes resolves to
/// an object. The scan visits every file regardless of earlier misses so
/// the missing list is complete.
fn scan_blobs(files: &[SourceFile], repo: &dyn RepoQuery) -> std::result::Result<BlobScan, GitError> {
    let mut missing = Vec::new();
    for file in files {
        let mut found = false;
        for hash in hash_candidates(&file.contents) {
            if repo.object_exists(&hash)? {
                found = true;
                break;
            }
        }
        if !found {
            missing.push(file.path.clone());
        }
    }
    Ok(BlobScan {
        checked: files.len(),
        missing,
    })
}

#[cfg(test)]
#[path = "verify_tests.rs"]
mod tests;
