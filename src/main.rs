//! Provenance checker CLI entrypoint.
//!
//! Loads the registry dump, selects targets by rank or explicit name, and
//! verifies each one sequentially, printing one status per crate. The
//! process exits zero regardless of individual verdicts; only an unknown
//! crate name or a hard registry failure is fatal.

use clap::Parser;
use provcheck::cli::Cli;
use provcheck::dump::RegistryDump;
use provcheck::error::{ProvenanceError, Result};
use provcheck::fetch::{CrateFetcher, HttpFetcher};
use provcheck::git::{GitCli, RepoSource};
use provcheck::report::{write_line, write_report, write_target_banner};
use provcheck::verify::Verifier;
use std::io::Write;
use std::time::Duration;

/// Fixed delay between successive crates in a batch, honoring the
/// crates.io crawling policy. Applied between targets, not between the
/// sub-steps of one verification.
const CRAWL_DELAY: Duration = Duration::from_secs(2);

fn main() {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let fetcher = HttpFetcher;
    let repos = GitCli;
    run_with(cli, &fetcher, &repos, out)
}

/// Testable inner function with injected collaborators.
///
/// The production entry point [`run`] delegates here with the real HTTP
/// fetcher and git subprocess backend; tests inject stubs.
fn run_with(
    cli: &Cli,
    fetcher: &dyn CrateFetcher,
    repos: &dyn RepoSource,
    out: &mut dyn Write,
) -> Result<()> {
    let dump = RegistryDump::load(&cli.dump_file)?;
    write_line(
        out,
        format!("There are {} crates in this database dump.", dump.len()),
    );

    let verifier = Verifier::new(fetcher, repos);

    // Explicit name lookup bypasses the ranking entirely.
    if let Some(name) = &cli.crate_name {
        let target = dump
            .target_named(name)
            .ok_or_else(|| ProvenanceError::UnknownCrate { name: name.clone() })?;
        let report = verifier.verify(&target)?;
        write_report(out, &report);
        return Ok(());
    }

    for rank in cli.rank.iter() {
        let Some(target) = dump.target_at(rank) else {
            // Ran off the end of the listing.
            break;
        };

        if rank > cli.rank.start() {
            std::thread::sleep(CRAWL_DELAY);
        }

        write_target_banner(out, rank, &target);
        // A hard fetch failure propagates here and aborts the remaining
        // targets; everything else is a per-crate verdict.
        let report = verifier.verify(&target)?;
        write_report(out, &report);
    }

    Ok(())
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_line(stderr, err);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provcheck::fetch::FetchError;
    use provcheck::git::{GitError, RepoQuery};
    use provcheck::test_utils::{crate_tarball, dump_tarball, write_temp_file};

    const CRATES_CSV: &str = "\
created_at,description,downloads,homepage,id,name,repository\n\
2015,Demo crate,900,,1,demo,https://github.com/example/demo\n\
2016,No repo crate,500,,2,mystery,\n";

    const VERSIONS_CSV: &str = "\
crate_id,created_at,num,yanked\n\
1,2021,1.2.3,f\n\
2,2022,0.1.0,f\n";

    /// Serves one fixed archive for every crate.
    struct StubFetcher {
        data: Vec<u8>,
    }

    impl CrateFetcher for StubFetcher {
        fn fetch(&self, _name: &str, _version: &str) -> std::result::Result<Vec<u8>, FetchError> {
            Ok(self.data.clone())
        }
    }

    /// A repository in which every blob exists and nothing is tagged.
    struct AllPresentQuery;

    impl RepoQuery for AllPresentQuery {
        fn tags_at(&self, _commit: &str) -> std::result::Result<Vec<String>, GitError> {
            Ok(Vec::new())
        }

        fn object_exists(&self, _hash: &str) -> std::result::Result<bool, GitError> {
            Ok(true)
        }
    }

    struct StubRepos;

    impl RepoSource for StubRepos {
        fn clone_shallow(
            &self,
            _url: &str,
            _commit: &str,
        ) -> std::result::Result<Box<dyn RepoQuery>, GitError> {
            Ok(Box::new(AllPresentQuery))
        }

        fn clone_full(&self, _url: &str) -> std::result::Result<Box<dyn RepoQuery>, GitError> {
            Ok(Box::new(AllPresentQuery))
        }
    }

    fn demo_archive() -> Vec<u8> {
        crate_tarball(
            "demo",
            "1.2.3",
            Some("0123456789abcdef0123456789abcdef01234567"),
            &[("src/lib.rs", b"pub fn demo() {}\n")],
        )
    }

    fn cli_for(dump_path: &camino::Utf8Path, extra: &[&str]) -> Cli {
        let mut args = vec!["provcheck", "--dump-file", dump_path.as_str()];
        args.extend_from_slice(extra);
        Cli::parse_from(args)
    }

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(()), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_one() {
        let err = ProvenanceError::UnknownCrate {
            name: "no_such_crate".to_owned(),
        };
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 1);

        let text = String::from_utf8(stderr).expect("stderr is UTF-8");
        assert!(text.contains("no_such_crate"));
    }

    #[test]
    fn explicit_name_lookup_verifies_one_crate() {
        let (_dir, dump_path) = write_temp_file(
            "db-dump.tar.gz",
            &dump_tarball(CRATES_CSV, VERSIONS_CSV),
        );
        let cli = cli_for(&dump_path, &["--crate-name", "demo"]);
        let fetcher = StubFetcher {
            data: demo_archive(),
        };

        let mut out = Vec::new();
        run_with(&cli, &fetcher, &StubRepos, &mut out).expect("run succeeds");

        let text = String::from_utf8(out).expect("output is UTF-8");
        assert!(text.contains("There are 2 crates in this database dump."));
        assert!(text.contains("demo 1.2.3 all source files present"));
    }

    #[test]
    fn unknown_explicit_name_is_an_error() {
        let (_dir, dump_path) = write_temp_file(
            "db-dump.tar.gz",
            &dump_tarball(CRATES_CSV, VERSIONS_CSV),
        );
        let cli = cli_for(&dump_path, &["--crate-name", "absent"]);
        let fetcher = StubFetcher { data: Vec::new() };

        let mut out = Vec::new();
        let result = run_with(&cli, &fetcher, &StubRepos, &mut out);
        assert!(matches!(
            result,
            Err(ProvenanceError::UnknownCrate { name }) if name == "absent"
        ));
    }

    #[test]
    fn ranked_flow_reports_url_missing_without_failing_the_run() {
        let (_dir, dump_path) = write_temp_file(
            "db-dump.tar.gz",
            &dump_tarball(CRATES_CSV, VERSIONS_CSV),
        );
        // Rank 1 is the crate with the empty repository column.
        let cli = cli_for(&dump_path, &["--rank", "1"]);
        let fetcher = StubFetcher { data: Vec::new() };

        let mut out = Vec::new();
        run_with(&cli, &fetcher, &StubRepos, &mut out).expect("run succeeds");

        let text = String::from_utf8(out).expect("output is UTF-8");
        assert!(text.contains("ranking: 1"));
        assert!(text.contains("mystery 0.1.0 ERROR: no repository URL"));
    }

    #[test]
    fn rank_range_past_the_listing_end_stops_quietly() {
        let (_dir, dump_path) = write_temp_file(
            "db-dump.tar.gz",
            &dump_tarball(CRATES_CSV, VERSIONS_CSV),
        );
        let cli = cli_for(&dump_path, &["--rank", "5-9"]);
        let fetcher = StubFetcher { data: Vec::new() };

        let mut out = Vec::new();
        run_with(&cli, &fetcher, &StubRepos, &mut out).expect("run succeeds");

        let text = String::from_utf8(out).expect("output is UTF-8");
        assert!(!text.contains("ranking:"));
    }

    #[test]
    fn missing_dump_file_is_fatal() {
        let cli = cli_for(camino::Utf8Path::new("/no/such/dump.tar.gz"), &[]);
        let fetcher = StubFetcher { data: Vec::new() };

        let mut out = Vec::new();
        let result = run_with(&cli, &fetcher, &StubRepos, &mut out);
        assert!(matches!(result, Err(ProvenanceError::Dump(_))));
    }
}
