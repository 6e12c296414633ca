//! Next-version resolution from release tags and commit history.
//!
//! The resolver coerces the last release tag to its three-component release
//! core, derives a bump recommendation from the commits made since that tag,
//! and applies the bump. There is no default first version: a missing or
//! unparseable tag is always an error.

use crate::error::{Result, VersionError};
use regex::Regex;
use semver::Version;
use std::sync::OnceLock;

/// Which semver component a release increments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bump {
    /// Breaking change
    Major,
    /// Backwards-compatible feature
    Minor,
    /// Backwards-compatible fix
    Patch,
}

impl Bump {
    /// Apply this bump to a version, zeroing the lower components
    pub fn apply(&self, current: &Version) -> Version {
        match self {
            Bump::Major => Version::new(current.major + 1, 0, 0),
            Bump::Minor => Version::new(current.major, current.minor + 1, 0),
            Bump::Patch => Version::new(current.major, current.minor, current.patch + 1),
        }
    }
}

impl std::fmt::Display for Bump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bump::Major => write!(f, "major"),
            Bump::Minor => write!(f, "minor"),
            Bump::Patch => write!(f, "patch"),
        }
    }
}

/// Outcome of next-version computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    /// Version the release will carry
    pub version: Version,
    /// Release core of the previous tag
    pub last_version: Version,
}

/// Coerce a tag string to its three-component release core.
///
/// Tolerates a leading `v`, pre-release/build suffixes ("4.12.13-8" keeps
/// the 4.12.13 core) and over-long dotted versions ("3.2.5.8" keeps 3.2.5).
/// Coercing an already-clean release version yields it unchanged.
pub fn coerce_version(tag: &str) -> Result<Version> {
    let trimmed = tag.trim().trim_start_matches('v');

    if let Ok(parsed) = Version::parse(trimmed) {
        // Drop pre-release/build metadata down to the release core.
        return Ok(Version::new(parsed.major, parsed.minor, parsed.patch));
    }

    // Not valid semver: accept a dotted numeric prefix of at least three
    // components and ignore the rest. A component like "13-8" contributes
    // its numeric prefix and ends the scan.
    let mut components: Vec<u64> = Vec::new();
    for part in trimmed.split('.') {
        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        let Ok(value) = digits.parse() else {
            break;
        };
        components.push(value);
        if digits.len() != part.len() {
            break;
        }
    }

    if components.len() >= 3 {
        return Ok(Version::new(components[0], components[1], components[2]));
    }

    Err(VersionError::Unparseable {
        tag: tag.to_string(),
    }
    .into())
}

/// Compute the next version from the last release tag and a recommendation.
///
/// Fails when `last_tag` is absent or cannot be coerced; the caller treats
/// that as fatal for the whole run.
pub fn compute_next_version(last_tag: Option<&str>, recommendation: Bump) -> Result<ResolvedVersion> {
    let tag = match last_tag {
        Some(tag) if !tag.trim().is_empty() => tag,
        _ => return Err(VersionError::NoPriorTag.into()),
    };

    let last_version = coerce_version(tag)?;
    let version = recommendation.apply(&last_version);

    Ok(ResolvedVersion {
        version,
        last_version,
    })
}

static BREAKING_RE: OnceLock<Regex> = OnceLock::new();
static FEAT_RE: OnceLock<Regex> = OnceLock::new();

/// Derive a bump recommendation from conventional commit messages.
///
/// A breaking-change marker (`feat!:`, `fix(scope)!:`, or a
/// `BREAKING CHANGE:` footer) recommends a major bump, any feature commit a
/// minor bump, and everything else a patch. An empty history still
/// recommends a patch: the operator may confirm a no-change release.
pub fn recommend_bump(commits: &[String]) -> Bump {
    let breaking = BREAKING_RE.get_or_init(|| {
        Regex::new(r"(?m)^[a-zA-Z]+(\([^)]*\))?!:|^BREAKING[ -]CHANGE:").expect("static regex")
    });
    let feat = FEAT_RE
        .get_or_init(|| Regex::new(r"(?m)^feat(\([^)]*\))?:").expect("static regex"));

    let mut bump = Bump::Patch;
    for message in commits {
        if breaking.is_match(message) {
            return Bump::Major;
        }
        if feat.is_match(message) {
            bump = Bump::Minor;
        }
    }
    bump
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_bump_of_clean_tag() {
        let resolved = compute_next_version(Some("1.2.3"), Bump::Minor).unwrap();
        assert_eq!(resolved.version.to_string(), "1.3.0");
        assert_eq!(resolved.last_version.to_string(), "1.2.3");
    }

    #[test]
    fn four_component_tag_drops_trailing_component() {
        let resolved = compute_next_version(Some("3.2.5.8"), Bump::Minor).unwrap();
        assert_eq!(resolved.version.to_string(), "3.3.0");
        assert_eq!(resolved.last_version.to_string(), "3.2.5");
    }

    #[test]
    fn prerelease_suffix_is_dropped_before_bump() {
        let resolved = compute_next_version(Some("4.12.13-8"), Bump::Minor).unwrap();
        assert_eq!(resolved.version.to_string(), "4.13.0");
        assert_eq!(resolved.last_version.to_string(), "4.12.13");
    }

    #[test]
    fn v_prefixed_tag_is_accepted() {
        let resolved = compute_next_version(Some("v1.2.3"), Bump::Patch).unwrap();
        assert_eq!(resolved.version.to_string(), "1.2.4");
    }

    #[test]
    fn garbage_tag_fails() {
        let err = compute_next_version(Some("foo"), Bump::Minor).unwrap_err();
        assert!(matches!(
            err,
            crate::error::WorkflowError::Version(VersionError::Unparseable { .. })
        ));
    }

    #[test]
    fn missing_tag_fails() {
        let err = compute_next_version(None, Bump::Minor).unwrap_err();
        assert!(matches!(
            err,
            crate::error::WorkflowError::Version(VersionError::NoPriorTag)
        ));

        let err = compute_next_version(Some("  "), Bump::Minor).unwrap_err();
        assert!(matches!(
            err,
            crate::error::WorkflowError::Version(VersionError::NoPriorTag)
        ));
    }

    #[test]
    fn coercion_of_release_core_is_idempotent() {
        let once = coerce_version("2.7.1").unwrap();
        let twice = coerce_version(&once.to_string()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn bump_law_zeroes_lower_components() {
        let base = Version::new(1, 2, 3);
        assert_eq!(Bump::Major.apply(&base), Version::new(2, 0, 0));
        assert_eq!(Bump::Minor.apply(&base), Version::new(1, 3, 0));
        assert_eq!(Bump::Patch.apply(&base), Version::new(1, 2, 4));
    }

    #[test]
    fn recommendation_from_conventional_commits() {
        let history = vec![
            "fix: correct tag parsing".to_string(),
            "chore: bump deps".to_string(),
        ];
        assert_eq!(recommend_bump(&history), Bump::Patch);

        let history = vec![
            "fix: correct tag parsing".to_string(),
            "feat(cli): add --comment".to_string(),
        ];
        assert_eq!(recommend_bump(&history), Bump::Minor);

        let history = vec!["feat!: drop legacy manifest format".to_string()];
        assert_eq!(recommend_bump(&history), Bump::Major);

        let history =
            vec!["refactor: split gateway\n\nBREAKING CHANGE: trait renamed".to_string()];
        assert_eq!(recommend_bump(&history), Bump::Major);
    }

    #[test]
    fn empty_history_recommends_patch() {
        assert_eq!(recommend_bump(&[]), Bump::Patch);
    }
}
