//! Shared test fixtures: in-memory archive builders.
//!
//! Gated behind the `test-support` feature so the binary's own tests (a
//! separate compilation unit) can reuse them. Not part of the public API
//! surface and not covered by semver guarantees.

use camino::Utf8PathBuf;
use flate2::{Compression, write::GzEncoder};

/// Build a gzip-compressed tar archive from `(member name, contents)`
/// pairs, in order.
///
/// # Panics
///
/// Panics on fixture construction failure; this is test support code.
#[must_use]
pub fn gzip_tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, *contents)
            .expect("append tar entry");
    }
    let encoder = builder.into_inner().expect("finish tar");
    encoder.finish().expect("finish gzip")
}

/// Build a `.crate`-shaped archive for `name` at `version`.
///
/// Member paths are prefixed with `name-version/` the way cargo packages
/// them. When `commit` is given, a `.cargo_vcs_info.json` member is
/// included ahead of the files.
#[must_use]
pub fn crate_tarball(
    name: &str,
    version: &str,
    commit: Option<&str>,
    files: &[(&str, &[u8])],
) -> Vec<u8> {
    let prefix = format!("{name}-{version}");
    let vcs_info = commit.map(|sha| {
        format!("{{\"git\": {{\"sha1\": \"{sha}\"}}, \"path_in_vcs\": \"\"}}")
    });

    let mut entries: Vec<(String, &[u8])> = Vec::new();
    if let Some(json) = vcs_info.as_deref() {
        entries.push((format!("{prefix}/.cargo_vcs_info.json"), json.as_bytes()));
    }
    for (path, contents) in files {
        entries.push((format!("{prefix}/{path}"), contents));
    }

    let borrowed: Vec<(&str, &[u8])> = entries
        .iter()
        .map(|(path, contents)| (path.as_str(), *contents))
        .collect();
    gzip_tarball(&borrowed)
}

/// Build a registry dump archive holding the two CSV tables under a dated
/// directory, the way real dumps are laid out.
#[must_use]
pub fn dump_tarball(crates_csv: &str, versions_csv: &str) -> Vec<u8> {
    gzip_tarball(&[
        ("2026-01-01-020123/data/crates.csv", crates_csv.as_bytes()),
        (
            "2026-01-01-020123/data/versions.csv",
            versions_csv.as_bytes(),
        ),
    ])
}

/// Write `data` to `name` inside a fresh temporary directory.
///
/// Returns the directory guard alongside the file path; dropping the
/// guard removes the file.
///
/// # Panics
///
/// Panics on fixture construction failure; this is test support code.
#[must_use]
pub fn write_temp_file(name: &str, data: &[u8]) -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = Utf8PathBuf::try_from(dir.path().to_path_buf())
        .expect("UTF-8 temp path")
        .join(name);
    std::fs::write(&path, data).expect("write fixture file");
    (dir, path)
}
