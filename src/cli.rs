//! CLI argument definitions for the provenance checker.
//!
//! This module defines the command-line interface using clap. It is
//! separated from the main entrypoint to keep the binary focused on
//! orchestration.

use camino::Utf8PathBuf;
use clap::Parser;
use std::str::FromStr;
use thiserror::Error;

/// Verify crates.io packages against their claimed git repositories.
#[derive(Parser, Debug)]
#[command(name = "provcheck")]
#[command(version, about)]
#[command(long_about = concat!(
    "Verify crates.io packages against their claimed git repositories.\n\n",
    "For each selected crate, provcheck downloads the published .crate ",
    "archive, reads the commit recorded in its .cargo_vcs_info.json, and ",
    "checks that the commit carries a matching release tag and that every ",
    "packaged .rs file exists as a blob in the repository. A shallow clone ",
    "of the recorded commit is tried first; a full clone is the fallback ",
    "when the shallow evidence is inconclusive.\n\n",
    "Crates are selected by popularity rank from a crates.io database dump ",
    "(download from https://static.crates.io/db-dump.tar.gz), or by exact ",
    "name with --crate-name.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Verify the hundred most-downloaded crates:\n",
    "    $ provcheck\n\n",
    "  Verify ranks 10 through 19 of a specific dump:\n",
    "    $ provcheck --dump-file /tmp/db-dump.tar.gz --rank 10-19\n\n",
    "  Verify one crate by name:\n",
    "    $ provcheck --crate-name serde\n",
))]
pub struct Cli {
    /// Path to the crates.io database dump archive.
    #[arg(long, value_name = "FILE", default_value = "db-dump.tar.gz")]
    pub dump_file: Utf8PathBuf,

    /// Popularity rank or inclusive rank range to verify (e.g. 7 or 0-99).
    #[arg(long, value_name = "N[-M]", default_value = "0-99")]
    pub rank: RankRange,

    /// Verify a single crate by name, bypassing the ranking.
    #[arg(long, value_name = "NAME")]
    pub crate_name: Option<String>,
}

/// An inclusive range of popularity ranks.
///
/// Parses either a single index (`"7"` covers exactly rank 7) or a
/// `start-end` pair (`"0-99"` covers both endpoints).
///
/// # Examples
///
/// ```
/// use provcheck::cli::RankRange;
///
/// let range: RankRange = "3-5".parse().unwrap();
/// assert_eq!(range.iter().collect::<Vec<_>>(), vec![3, 4, 5]);
///
/// let single: RankRange = "7".parse().unwrap();
/// assert_eq!(single.iter().collect::<Vec<_>>(), vec![7]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankRange {
    start: usize,
    end: usize,
}

impl RankRange {
    /// First rank covered by the range.
    #[must_use]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Last rank covered by the range (inclusive).
    #[must_use]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Iterate the covered ranks in ascending order.
    pub fn iter(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// Error produced when a rank range fails to parse.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RankRangeError {
    /// A bound was not a non-negative integer.
    #[error("invalid rank \"{value}\": expected a non-negative integer")]
    InvalidBound {
        /// The offending text.
        value: String,
    },

    /// The range was inverted (start greater than end).
    #[error("invalid rank range: start {start} is greater than end {end}")]
    Inverted {
        /// The parsed lower bound.
        start: usize,
        /// The parsed upper bound.
        end: usize,
    },
}

impl FromStr for RankRange {
    type Err = RankRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_bound = |text: &str| {
            text.parse::<usize>()
                .map_err(|_| RankRangeError::InvalidBound {
                    value: text.to_owned(),
                })
        };

        match s.split_once('-') {
            None => {
                let rank = parse_bound(s)?;
                Ok(Self {
                    start: rank,
                    end: rank,
                })
            }
            Some((start_text, end_text)) => {
                let start = parse_bound(start_text)?;
                let end = parse_bound(end_text)?;
                if start > end {
                    return Err(RankRangeError::Inverted { start, end });
                }
                Ok(Self { start, end })
            }
        }
    }
}

impl std::fmt::Display for RankRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}
