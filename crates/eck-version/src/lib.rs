//! This library provides strongly-typed Elastic Stack product versions and
//! closed version ranges. Versions follow the `<MAJOR>.<MINOR>.<PATCH>` format
//! with an optional pre-release label, for example `8.15.0` or
//! `9.0.0-SNAPSHOT`.
//!
//! ## Usage
//!
//! Versions can be parsed and validated from [`str`] using Rust's standard
//! [`FromStr`](std::str::FromStr) trait.
//!
//! ```
//! use eck_version::Version;
//!
//! let version: Version = "8.15.0".parse().expect("valid version");
//! let snapshot: Version = "8.15.0-SNAPSHOT".parse().expect("valid version");
//!
//! assert!(snapshot < version);
//! ```
//!
//! Ranges are closed intervals which report on which side a version falls out.
//!
//! ```
//! use eck_version::{OutOfRange, Version, VersionRange};
//!
//! let range = VersionRange::new(Version::new(7, 17, 0), Version::new(8, 99, 99));
//!
//! assert_eq!(range.within(&Version::new(8, 1, 0)), Ok(()));
//! assert!(matches!(
//!     range.within(&Version::new(7, 10, 0)),
//!     Err(OutOfRange::Lower { .. })
//! ));
//! ```

// NOTE: Fixed in https://github.com/la10736/rstest/pull/244 but not yet
// released.
#[cfg(test)]
use rstest_reuse::{self};

mod range;
mod version;

pub use range::*;
pub use version::*;
