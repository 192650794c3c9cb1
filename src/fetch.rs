//! Crate archive download from the registry CDN.
//!
//! Provides a trait-based abstraction for fetching published `.crate`
//! archives, enabling dependency injection for testing. The production
//! implementation downloads from the static crates.io mirror, which is the
//! endpoint the crates.io crawling policy directs bulk consumers to.

use std::io::Read;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Base URL of the static crates.io download mirror.
const CRATES_MIRROR: &str = "https://static.crates.io/crates";

/// Network timeout for crate downloads.
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Trait for downloading a crate's published archive bytes.
///
/// Abstraction allows tests to exercise the verification engine without
/// network access.
#[cfg_attr(test, mockall::automock)]
pub trait CrateFetcher {
    /// Download the `.crate` archive for `name` at `version`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Forbidden`] when the registry denies access to
    /// this crate (a per-crate condition), or another [`FetchError`] when
    /// the download fails outright.
    fn fetch(&self, name: &str, version: &str) -> Result<Vec<u8>, FetchError>;
}

/// Errors arising from crate downloads.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The registry answered HTTP 403 for this crate.
    ///
    /// Distinguished because a denial affects only the one crate; any
    /// other failure implies the registry is unreachable.
    #[error("download forbidden: {url}")]
    Forbidden {
        /// The URL that was denied.
        url: String,
    },

    /// HTTP request failed.
    #[error("download failed for {url}: {reason}")]
    Http {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// I/O error reading the response body.
    #[error("I/O error reading download: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP-based fetcher using `ureq`.
pub struct HttpFetcher;

impl HttpFetcher {
    /// Construct the mirror URL for a crate archive.
    ///
    /// # Examples
    ///
    /// ```
    /// use provcheck::fetch::HttpFetcher;
    ///
    /// let url = HttpFetcher::crate_url("serde", "1.0.0");
    /// assert_eq!(url, "https://static.crates.io/crates/serde/serde-1.0.0.crate");
    /// ```
    #[must_use]
    pub fn crate_url(name: &str, version: &str) -> String {
        format!("{CRATES_MIRROR}/{name}/{name}-{version}.crate")
    }
}

impl CrateFetcher for HttpFetcher {
    fn fetch(&self, name: &str, version: &str) -> Result<Vec<u8>, FetchError> {
        let url = Self::crate_url(name, version);
        let response = http_agent()
            .get(&url)
            .call()
            .map_err(|e| map_ureq_error(&url, &e))?;
        let mut bytes = Vec::new();
        response
            .into_body()
            .as_reader()
            .read_to_end(&mut bytes)
            .map_err(FetchError::Io)?;
        Ok(bytes)
    }
}

/// Shared `ureq` agent with request timeout configuration.
fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(FETCH_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a ureq error to a [`FetchError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> FetchError {
    match err {
        ureq::Error::StatusCode(403) => FetchError::Forbidden {
            url: url.to_owned(),
        },
        other => FetchError::Http {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
