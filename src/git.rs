//! Ephemeral repository clones and git blob addressing.
//!
//! Each [`GitRepo`] owns a temporary directory holding one clone of a
//! remote repository. The handle is only constructible through a
//! successful clone, so every query runs against a populated object store,
//! and dropping the handle removes the storage on every exit path.
//!
//! Git itself is invoked as a subprocess with interactive credential
//! prompts disabled, so private or unreachable repositories fail fast
//! instead of hanging on a password prompt.

use sha1::{Digest, Sha1};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;
use thiserror::Error;

/// Errors arising from repository operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// A git invocation exited unsuccessfully.
    #[error("git {operation} failed: {message}")]
    Command {
        /// The git operation that failed (clone, fetch, etc.).
        operation: &'static str,
        /// Description of the failure, taken from git's stderr.
        message: String,
    },

    /// Git could not be spawned or its temporary storage allocated.
    #[error("I/O error running git: {0}")]
    Io(#[from] std::io::Error),
}

/// A queryable local object store, however it was obtained.
///
/// Shallow and full clones are capability-equivalent for querying; this
/// trait is the single interface over both construction paths.
#[cfg_attr(test, mockall::automock)]
pub trait RepoQuery {
    /// Return the tag names pointing exactly at `commit` (not ancestors).
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if the tag listing cannot be run.
    fn tags_at(&self, commit: &str) -> Result<Vec<String>, GitError>;

    /// Return whether an object with the given hash exists locally.
    ///
    /// A well-formed but absent hash is `Ok(false)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] only if git itself cannot be invoked.
    fn object_exists(&self, hash: &str) -> Result<bool, GitError>;
}

/// Trait for obtaining a queryable clone of a remote repository.
///
/// Two construction paths, one query interface: a minimal single-commit
/// fetch for the cheap path, and a full bare clone for the fallback.
#[cfg_attr(test, mockall::automock)]
pub trait RepoSource {
    /// Fetch only the history needed to make `commit` resolvable.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if the remote is unreachable, the URL is not
    /// clone-able, or the commit is absent from the remote.
    fn clone_shallow(&self, url: &str, commit: &str) -> Result<Box<dyn RepoQuery>, GitError>;

    /// Perform a complete bare clone of the remote.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] under the same conditions as
    /// [`clone_shallow`](RepoSource::clone_shallow).
    fn clone_full(&self, url: &str) -> Result<Box<dyn RepoQuery>, GitError>;
}

/// Production [`RepoSource`] backed by the `git` binary.
pub struct GitCli;

impl RepoSource for GitCli {
    fn clone_shallow(&self, url: &str, commit: &str) -> Result<Box<dyn RepoQuery>, GitError> {
        Ok(Box::new(GitRepo::clone_shallow(url, commit)?))
    }

    fn clone_full(&self, url: &str) -> Result<Box<dyn RepoQuery>, GitError> {
        Ok(Box::new(GitRepo::clone_full(url)?))
    }
}

/// One ephemeral local clone bound to a temporary directory.
///
/// The storage is exclusive to one verification and is removed when the
/// handle is dropped, whether verification succeeded, soft-failed, or
/// errored.
pub struct GitRepo {
    workdir: TempDir,
}

impl GitRepo {
    fn create() -> Result<Self, GitError> {
        Ok(Self {
            workdir: tempfile::tempdir()?,
        })
    }

    /// Shallow-clone `url`, fetching just enough history to resolve
    /// `commit`.
    ///
    /// Initializes an empty repository, registers the remote, and fetches
    /// the single commit (with tags) at depth 1.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if any of the underlying git invocations fail.
    pub fn clone_shallow(url: &str, commit: &str) -> Result<Self, GitError> {
        let repo = Self::create()?;
        let url = normalize_clone_url(url);
        repo.run("init", &["init", "-q", "."])?;
        repo.run("remote", &["remote", "add", "origin", &url])?;
        repo.run(
            "fetch",
            &["fetch", "-q", "-t", "--depth=1", "origin", commit],
        )?;
        Ok(repo)
    }

    /// Fully clone `url` as a bare repository, fetching all reachable
    /// history and refs.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if the clone fails.
    pub fn clone_full(url: &str) -> Result<Self, GitError> {
        let repo = Self::create()?;
        let url = normalize_clone_url(url);
        repo.run("clone", &["clone", "-q", "--bare", &url, "."])?;
        Ok(repo)
    }

    /// Run a git command in the clone directory, requiring success.
    fn run(&self, operation: &'static str, args: &[&str]) -> Result<Output, GitError> {
        let output = self.run_unchecked(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::Command {
                operation,
                message: stderr.trim().to_owned(),
            });
        }
        Ok(output)
    }

    /// Run a git command without checking its exit status.
    fn run_unchecked(&self, args: &[&str]) -> Result<Output, GitError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.workdir.path())
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output()?;
        Ok(output)
    }
}

impl RepoQuery for GitRepo {
    fn tags_at(&self, commit: &str) -> Result<Vec<String>, GitError> {
        let output = self.run("tag", &["tag", "--points-at", commit])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.split_whitespace().map(str::to_owned).collect())
    }

    fn object_exists(&self, hash: &str) -> Result<bool, GitError> {
        let output = self.run_unchecked(&["cat-file", "-e", hash])?;
        Ok(output.status.success())
    }
}

/// Compute the git-style blob hash candidates for a file's bytes.
///
/// Git hashes a blob as `sha1("blob " + length + NUL + bytes)`. Because a
/// repository may store the file with either line-ending convention, the
/// raw bytes are hashed first, and a second hash over the CRLF-normalized
/// bytes is appended only when the bytes contain at least one `\r\n`. The
/// order is stable: raw first.
///
/// # Examples
///
/// ```
/// use provcheck::git::hash_candidates;
///
/// // `echo "hello world" | git hash-object --stdin`
/// let hashes = hash_candidates(b"hello world\n");
/// assert_eq!(hashes, vec!["3b18e512dba79e4c8300dd08aeb37f8e728b8dad".to_owned()]);
/// ```
#[must_use]
pub fn hash_candidates(data: &[u8]) -> Vec<String> {
    let mut hashes = vec![blob_sha1(data)];
    if data.windows(2).any(|pair| pair == b"\r\n") {
        hashes.push(blob_sha1(&normalize_crlf(data)));
    }
    hashes
}

/// Hash bytes under git's blob addressing scheme.
fn blob_sha1(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(b"blob ");
    hasher.update(data.len().to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Collapse every CRLF sequence to a bare LF.
fn normalize_crlf(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut rest = data;
    while let Some(pos) = rest.windows(2).position(|pair| pair == b"\r\n") {
        out.extend_from_slice(&rest[..pos]);
        out.push(b'\n');
        rest = &rest[pos + 2..];
    }
    out.extend_from_slice(rest);
    out
}

/// Derive a clone-able URL from a claimed repository URL.
///
/// Some crates record a GitHub URL that only works in a web browser, such
/// as `https://github.com/owner/repo/tree/main/some/dir`. Stripping the
/// `/tree/...` suffix recovers the clone-able repository URL. Anything
/// else passes through unchanged.
///
/// # Examples
///
/// ```
/// use provcheck::git::normalize_clone_url;
///
/// let url = normalize_clone_url("https://github.com/serde-rs/serde/tree/master/serde");
/// assert_eq!(url, "https://github.com/serde-rs/serde");
/// ```
#[must_use]
pub fn normalize_clone_url(url: &str) -> String {
    const GITHUB_PREFIX: &str = "https://github.com/";

    let Some(rest) = url.strip_prefix(GITHUB_PREFIX) else {
        return url.to_owned();
    };
    let mut segments = rest.splitn(3, '/');
    let (Some(owner), Some(repo), Some(tail)) =
        (segments.next(), segments.next(), segments.next())
    else {
        return url.to_owned();
    };
    if owner.is_empty() || repo.is_empty() {
        return url.to_owned();
    }
    if tail == "tree" || tail.starts_with("tree/") {
        return format!("{GITHUB_PREFIX}{owner}/{repo}");
    }
    url.to_owned()
}
