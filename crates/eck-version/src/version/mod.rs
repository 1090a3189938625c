use std::{cmp::Ordering, fmt::Display, num::ParseIntError, str::FromStr, sync::LazyLock};

use regex::Regex;
use semver::Prerelease;
use snafu::{OptionExt, ResultExt, Snafu};

#[cfg(feature = "serde")]
mod serde;

static VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+)(?:-(?P<pre>[0-9A-Za-z.-]+))?$",
    )
    .expect("failed to compile version regex")
});

/// Error variants which can be encountered when creating a new [`Version`] from
/// unparsed input.
#[derive(Debug, Snafu)]
pub enum ParseVersionError {
    #[snafu(display("No Major.Minor.Patch elements found"))]
    InvalidFormat,

    #[snafu(display("failed to parse major version"))]
    ParseMajorVersion { source: ParseIntError },

    #[snafu(display("failed to parse minor version"))]
    ParseMinorVersion { source: ParseIntError },

    #[snafu(display("failed to parse patch version"))]
    ParsePatchVersion { source: ParseIntError },

    #[snafu(display("invalid pre-release label {label:?}"))]
    ParsePrerelease { source: semver::Error, label: String },
}

/// An Elastic Stack product version, following the
/// `<MAJOR>.<MINOR>.<PATCH>(-<PRE>)` format.
///
/// Versions are totally ordered according to the semantic versioning
/// precedence rules: the numeric triple is compared first, then a release
/// sorts above any pre-release of the same triple (`8.0.0-SNAPSHOT < 8.0.0`),
/// and pre-release labels compare identifier by identifier.
///
/// ### See
///
/// - <https://semver.org/#spec-item-11>
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Prerelease,
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let captures = VERSION_REGEX.captures(input).context(InvalidFormatSnafu)?;

        let major = captures["major"]
            .parse::<u64>()
            .context(ParseMajorVersionSnafu)?;
        let minor = captures["minor"]
            .parse::<u64>()
            .context(ParseMinorVersionSnafu)?;
        let patch = captures["patch"]
            .parse::<u64>()
            .context(ParsePatchVersionSnafu)?;

        let pre = match captures.name("pre") {
            Some(label) => Prerelease::new(label.as_str()).context(ParsePrereleaseSnafu {
                label: label.as_str(),
            })?,
            None => Prerelease::EMPTY,
        };

        Ok(Self {
            major,
            minor,
            patch,
            pre,
        })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch)) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // The empty pre-release sorts above every non-empty one.
        self.pre.cmp(&other.pre)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{major}.{minor}.{patch}",
            major = self.major,
            minor = self.minor,
            patch = self.patch
        )?;

        if !self.pre.is_empty() {
            write!(f, "-{pre}", pre = self.pre)?;
        }

        Ok(())
    }
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: Prerelease::EMPTY,
        }
    }

    /// Returns a copy of this version with the given pre-release label.
    pub fn with_pre(self, label: &str) -> Result<Self, ParseVersionError> {
        let pre = Prerelease::new(label).context(ParsePrereleaseSnafu { label })?;
        Ok(Self { pre, ..self })
    }

    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// Returns the version without its pre-release label.
    pub fn finalized(&self) -> Self {
        Self::new(self.major, self.minor, self.patch)
    }
}
