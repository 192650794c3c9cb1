//! Human-readable per-crate status output.
//!
//! Every crate produces exactly one status line plus supporting detail
//! (the matched tag, or a sample of unmatched files). Output goes through
//! an injected writer so tests can capture it; write failures are
//! swallowed, as losing a status line must not abort a batch.

use crate::dump::PackageTarget;
use crate::verify::{CloneDepth, Report, TagOutcome, Verdict};
use std::io::Write;

/// Write one line, ignoring write failures.
pub fn write_line(out: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(out, "{message}").is_err() {
        // Best-effort output; nothing sensible to do on failure.
    }
}

/// Write the pre-verification banner for one ranked target.
pub fn write_target_banner(out: &mut dyn Write, rank: usize, target: &PackageTarget) {
    write_line(out, format!("ranking: {rank}"));
    write_line(
        out,
        format!(
            "{} {} has {} downloads",
            target.name, target.version, target.downloads
        ),
    );
}

/// Write a crate's verification report: one verdict line plus supporting
/// detail.
pub fn write_report(out: &mut dyn Write, report: &Report) {
    let prefix = format!("{} {}", report.name, report.version);

    if let Some(commit) = &report.commit {
        write_line(out, format!("{prefix} claims commit {commit}"));
    }

    match &report.tag {
        TagOutcome::Matched { tag } => {
            write_line(out, format!("{prefix} commit matches tag \"{tag}\""));
        }
        TagOutcome::Unmatched { tags } => {
            write_line(
                out,
                format!("{prefix} no release tag matches (tags at commit: {tags:?})"),
            );
        }
        TagOutcome::NotChecked => {}
    }

    match &report.verdict {
        Verdict::UrlMissing => {
            write_line(out, format!("{prefix} ERROR: no repository URL"));
        }
        Verdict::FetchDenied => {
            write_line(out, format!("{prefix} ERROR: registry denied the download"));
        }
        Verdict::ArchiveInvalid { reason } => {
            write_line(out, format!("{prefix} ERROR: unreadable crate archive: {reason}"));
        }
        Verdict::RepoCloneFailed { reason } => {
            write_line(out, format!("{prefix} ERROR: failed to clone repo: {reason}"));
        }
        Verdict::BlobsAllPresent { depth } => {
            let source = match depth {
                CloneDepth::Shallow => "shallow clone",
                CloneDepth::Full => "full clone",
            };
            write_line(
                out,
                format!("{prefix} all source files present in repository ({source})"),
            );
        }
        Verdict::BlobsMissing {
            checked,
            missing,
            sample,
        } => {
            write_line(
                out,
                format!("{prefix} ERROR: {missing} of {checked} source files not in repo"),
            );
            for path in sample {
                write_line(out, format!("{prefix} ERROR: file not in repo: {path}"));
            }
        }
    }
}
