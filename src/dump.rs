//! Registry database dump parsing and crate ranking.
//!
//! The crates.io database dump is a gzip-compressed tar archive containing
//! (among much else) `crates.csv` and `versions.csv`. This module extracts
//! a popularity-ranked crate listing and the version strings per crate,
//! which is all the verification engine needs to pick its targets.

use crate::version::latest_version;
use camino::Utf8Path;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

/// Errors arising from registry dump handling.
#[derive(Debug, Error)]
pub enum DumpError {
    /// The dump file could not be opened or read.
    #[error("I/O error reading dump: {0}")]
    Io(#[from] std::io::Error),

    /// A CSV table inside the dump failed to parse.
    #[error("invalid {file} in dump: {source}")]
    Table {
        /// Which table failed.
        file: &'static str,
        /// The underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// The dump archive did not contain a required table.
    #[error("dump archive is missing {file}")]
    MissingTable {
        /// The table that was not found.
        file: &'static str,
    },
}

/// One crate selected for verification.
///
/// Immutable once built: the version string is the latest one according to
/// the version resolver, and the repository URL is carried as claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageTarget {
    /// Crate name.
    pub name: String,
    /// The raw string of the crate's highest published version.
    pub version: String,
    /// The repository URL the crate claims as its origin, if any.
    pub repository: Option<String>,
    /// Total download count, the popularity metric used for ranking.
    pub downloads: u64,
}

/// Row shape for `crates.csv`; columns are matched by header name and the
/// many unused columns are ignored.
#[derive(Debug, Deserialize)]
struct CrateRecord {
    downloads: u64,
    id: i64,
    name: String,
    repository: Option<String>,
}

/// Row shape for `versions.csv`.
#[derive(Debug, Deserialize)]
struct VersionRecord {
    crate_id: i64,
    num: String,
}

/// Sortable form of a crates.csv row. Field order matters: the derived
/// ordering compares downloads first, then id, name, repository, matching
/// the ranking the dump consumers expect.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct CrateRow {
    downloads: u64,
    id: i64,
    name: String,
    repository: Option<String>,
}

/// A parsed registry dump: crates ranked by popularity, and the version
/// strings published for each crate id.
pub struct RegistryDump {
    crates: Vec<CrateRow>,
    versions: HashMap<i64, Vec<String>>,
}

impl RegistryDump {
    /// Load and index a `db-dump.tar.gz` archive.
    ///
    /// The two tables are located by name suffix wherever they sit in the
    /// member tree (dumps nest them under a dated directory).
    ///
    /// # Errors
    ///
    /// Returns [`DumpError`] if the archive cannot be read, a table fails
    /// to parse, or either table is absent.
    pub fn load(path: &Utf8Path) -> Result<Self, DumpError> {
        let file = std::fs::File::open(path)?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));

        let mut crates: Option<Vec<CrateRow>> = None;
        let mut versions: Option<HashMap<i64, Vec<String>>> = None;

        for entry in archive.entries()? {
            let entry = entry?;
            let path = entry.path()?.to_string_lossy().into_owned();
            if path.ends_with("crates.csv") {
                crates = Some(load_crates(entry)?);
            } else if path.ends_with("versions.csv") {
                versions = Some(load_versions(entry)?);
            }
        }

        let crates = crates.ok_or(DumpError::MissingTable {
            file: "crates.csv",
        })?;
        let versions = versions.ok_or(DumpError::MissingTable {
            file: "versions.csv",
        })?;

        Ok(Self { crates, versions })
    }

    /// Number of crates in the dump.
    #[must_use]
    pub fn len(&self) -> usize {
        self.crates.len()
    }

    /// Whether the dump contains no crates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.crates.is_empty()
    }

    /// The crate at popularity rank `rank` (0 is the most downloaded).
    ///
    /// Returns `None` past the end of the listing, or for a crate with no
    /// published versions.
    #[must_use]
    pub fn target_at(&self, rank: usize) -> Option<PackageTarget> {
        self.crates.get(rank).and_then(|row| self.target_for(row))
    }

    /// Look up a crate by exact name, bypassing the ranking.
    #[must_use]
    pub fn target_named(&self, name: &str) -> Option<PackageTarget> {
        self.crates
            .iter()
            .find(|row| row.name == name)
            .and_then(|row| self.target_for(row))
    }

    fn target_for(&self, row: &CrateRow) -> Option<PackageTarget> {
        let versions = self.versions.get(&row.id)?;
        let latest = latest_version(versions.iter().map(String::as_str))?;
        let repository = row
            .repository
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(str::to_owned);
        Some(PackageTarget {
            name: row.name.clone(),
            version: latest.to_owned(),
            repository,
            downloads: row.downloads,
        })
    }
}

fn load_crates(reader: impl std::io::Read) -> Result<Vec<CrateRow>, DumpError> {
    let mut rows = Vec::new();
    for record in csv::Reader::from_reader(reader).deserialize() {
        let record: CrateRecord = record.map_err(|source| DumpError::Table {
            file: "crates.csv",
            source,
        })?;
        rows.push(CrateRow {
            downloads: record.downloads,
            id: record.id,
            name: record.name,
            repository: record.repository,
        });
    }
    // Most popular first.
    rows.sort_unstable_by(|a, b| b.cmp(a));
    Ok(rows)
}

fn load_versions(reader: impl std::io::Read) -> Result<HashMap<i64, Vec<String>>, DumpError> {
    let mut versions: HashMap<i64, Vec<String>> = HashMap::new();
    for record in csv::Reader::from_reader(reader).deserialize() {
        let record: VersionRecord = record.map_err(|source| DumpError::Table {
            file: "versions.csv",
            source,
        })?;
        versions.entry(record.crate_id).or_default().push(record.num);
    }
    Ok(versions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{dump_tarball, write_temp_file};

    const CRATES_CSV: &str = "\
created_at,description,downloads,homepage,id,name,repository\n\
2015,Serialization framework,900,,1,serde,https://github.com/serde-rs/serde\n\
2016,Async runtime,500,,2,tokio,https://github.com/tokio-rs/tokio\n\
2017,No repo crate,100,,3,mystery,\n";

    const VERSIONS_CSV: &str = "\
crate_id,created_at,num,yanked\n\
1,2020,1.0.0,f\n\
1,2021,1.0.100,f\n\
1,2019,bogus,f\n\
2,2021,1.8.0,f\n\
3,2022,0.1.0,f\n";

    fn sample_dump() -> (tempfile::TempDir, RegistryDump) {
        let data = dump_tarball(CRATES_CSV, VERSIONS_CSV);
        let (dir, path) = write_temp_file("db-dump.tar.gz", &data);
        let dump = RegistryDump::load(&path).expect("dump should load");
        (dir, dump)
    }

    #[test]
    fn crates_are_ranked_by_downloads_descending() {
        let (_dir, dump) = sample_dump();
        assert_eq!(dump.len(), 3);
        let first = dump.target_at(0).expect("rank 0");
        let second = dump.target_at(1).expect("rank 1");
        assert_eq!(first.name, "serde");
        assert_eq!(second.name, "tokio");
    }

    #[test]
    fn target_carries_latest_version_and_repository() {
        let (_dir, dump) = sample_dump();
        let serde = dump.target_named("serde").expect("serde present");
        assert_eq!(serde.version, "1.0.100");
        assert_eq!(
            serde.repository.as_deref(),
            Some("https://github.com/serde-rs/serde")
        );
        assert_eq!(serde.downloads, 900);
    }

    #[test]
    fn empty_repository_column_becomes_none() {
        let (_dir, dump) = sample_dump();
        let mystery = dump.target_named("mystery").expect("mystery present");
        assert!(mystery.repository.is_none());
    }

    #[test]
    fn rank_past_the_end_is_none() {
        let (_dir, dump) = sample_dump();
        assert!(dump.target_at(3).is_none());
    }

    #[test]
    fn unknown_name_is_none() {
        let (_dir, dump) = sample_dump();
        assert!(dump.target_named("no_such_crate").is_none());
    }

    #[test]
    fn missing_versions_table_is_an_error() {
        let data = crate::test_utils::gzip_tarball(&[(
            "2026-01-01/data/crates.csv",
            CRATES_CSV.as_bytes(),
        )]);
        let (_dir, path) = write_temp_file("db-dump.tar.gz", &data);
        let result = RegistryDump::load(&path);
        assert!(matches!(
            result,
            Err(DumpError::MissingTable {
                file: "versions.csv"
            })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = RegistryDump::load(camino::Utf8Path::new("/no/such/dump.tar.gz"));
        assert!(matches!(result, Err(DumpError::Io(_))));
    }
}
