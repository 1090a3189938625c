use std::fmt::Display;

use snafu::Snafu;

use crate::Version;

/// Reports on which side of a [`VersionRange`] a version falls out.
#[derive(Clone, Debug, PartialEq, Eq, Snafu)]
pub enum OutOfRange {
    #[snafu(display("version {version} is lower than the lowest supported version of {min}"))]
    Lower { version: Version, min: Version },

    #[snafu(display("version {version} is higher than the highest supported version of {max}"))]
    Higher { version: Version, max: Version },
}

/// A closed interval `[min, max]` of [`Version`]s.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct VersionRange {
    pub min: Version,
    pub max: Version,
}

impl Display for VersionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{min}, {max}]", min = self.min, max = self.max)
    }
}

impl VersionRange {
    pub const fn new(min: Version, max: Version) -> Self {
        Self { min, max }
    }

    /// Checks that `version` lies within `[min, max]`.
    pub fn within(&self, version: &Version) -> Result<(), OutOfRange> {
        if version < &self.min {
            return LowerSnafu {
                version: version.clone(),
                min: self.min.clone(),
            }
            .fail();
        }

        if version > &self.max {
            return HigherSnafu {
                version: version.clone(),
                max: self.max.clone(),
            }
            .fail();
        }

        Ok(())
    }

    /// Returns the range with its lower bound raised to `floor` if the floor
    /// is the higher of the two.
    pub fn with_floor(&self, floor: &Version) -> Self {
        Self {
            min: std::cmp::max(&self.min, floor).clone(),
            max: self.max.clone(),
        }
    }

    /// Checks `version` against the range, using `max(floor, min)` as the
    /// effective lower bound.
    pub fn supported_with_floor(
        &self,
        version: &Version,
        floor: &Version,
    ) -> Result<(), OutOfRange> {
        self.with_floor(floor).within(version)
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.within(version).is_ok()
    }
}
