//! The product versions the operator supports.
//!
//! Built-in defaults can be extended and overridden by a YAML file:
//!
//! ```yaml
//! stackFloor: 7.17.0
//! products:
//!   kibana:
//!     min: 7.17.0
//!     max: 9.99.99
//!     deprecatedBelow: 8.0.0
//! ```
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use eck_version::{OutOfRange, Version, VersionRange};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum LoadSupportedVersionsError {
    #[snafu(display("failed to read supported versions file {path:?}"))]
    ReadFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse supported versions"))]
    Parse { source: serde_yaml::Error },
}

/// A product with its own version support window. Agent has two, its fleet
/// mode requires a more recent version.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "camelCase")]
pub enum Product {
    Elasticsearch,
    Kibana,

    #[strum(to_string = "APM Server")]
    ApmServer,

    #[strum(to_string = "Enterprise Search")]
    EnterpriseSearch,

    Beat,

    #[strum(to_string = "Elastic Agent")]
    AgentStandalone,

    #[strum(to_string = "Elastic Agent in Fleet mode")]
    AgentFleet,

    Logstash,

    #[strum(to_string = "Elastic Maps Server")]
    Maps,

    #[strum(to_string = "Elastic Package Registry")]
    PackageRegistry,

    #[strum(to_string = "AutoOps Agent")]
    AutoOps,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVersions {
    #[serde(flatten)]
    pub range: VersionRange,

    /// Versions in `[min, deprecated_below)` are accepted with a warning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated_below: Option<Version>,
}

impl ProductVersions {
    fn new(min: Version, max: Version) -> Self {
        Self {
            range: VersionRange::new(min, max),
            deprecated_below: None,
        }
    }

    fn deprecated_below(mut self, version: Version) -> Self {
        self.deprecated_below = Some(version);
        self
    }
}

/// The versions supported per product plus the version thresholds of
/// individual features.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedVersions {
    /// Applies to every product on top of its own lower bound.
    pub stack_floor: Version,
    pub products: BTreeMap<Product, ProductVersions>,

    /// Agents from this version on must reference a policy.
    pub policy_id_mandatory_from: Version,
    pub stack_monitoring_min: Version,

    /// Minimum APM Server version able to associate with Kibana.
    pub apm_kibana_association_min: Version,

    /// The versions an Elasticsearch cluster can be upgraded from, by target
    /// major version.
    pub elasticsearch_upgrade_paths: BTreeMap<u64, VersionRange>,
}

/// On-disk shape of [`SupportedVersions`]: every field is optional and
/// overrides the built-in default. Products are merged one by one.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SupportedVersionsFile {
    stack_floor: Option<Version>,

    #[serde(default)]
    products: BTreeMap<Product, ProductVersions>,
    policy_id_mandatory_from: Option<Version>,
    stack_monitoring_min: Option<Version>,
    apm_kibana_association_min: Option<Version>,

    #[serde(default)]
    elasticsearch_upgrade_paths: BTreeMap<u64, VersionRange>,
}

const MAX_SUPPORTED: Version = Version::new(9, 99, 99);

impl Default for SupportedVersions {
    fn default() -> Self {
        let products = BTreeMap::from([
            (
                Product::Elasticsearch,
                ProductVersions::new(Version::new(6, 8, 0), MAX_SUPPORTED)
                    .deprecated_below(Version::new(7, 17, 0)),
            ),
            (
                Product::Kibana,
                ProductVersions::new(Version::new(6, 8, 0), MAX_SUPPORTED)
                    .deprecated_below(Version::new(7, 17, 0)),
            ),
            (
                Product::ApmServer,
                ProductVersions::new(Version::new(6, 2, 0), MAX_SUPPORTED),
            ),
            (
                Product::EnterpriseSearch,
                ProductVersions::new(Version::new(7, 7, 0), Version::new(8, 99, 99)),
            ),
            (
                Product::Beat,
                ProductVersions::new(Version::new(7, 0, 0), MAX_SUPPORTED),
            ),
            (
                Product::AgentStandalone,
                ProductVersions::new(Version::new(7, 10, 0), MAX_SUPPORTED),
            ),
            (
                Product::AgentFleet,
                ProductVersions::new(Version::new(7, 14, 0), MAX_SUPPORTED),
            ),
            (
                Product::Logstash,
                ProductVersions::new(Version::new(8, 12, 0), MAX_SUPPORTED),
            ),
            (
                Product::Maps,
                ProductVersions::new(Version::new(7, 11, 0), MAX_SUPPORTED),
            ),
            (
                Product::PackageRegistry,
                ProductVersions::new(Version::new(7, 17, 0), MAX_SUPPORTED),
            ),
            (
                Product::AutoOps,
                ProductVersions::new(Version::new(9, 1, 0), MAX_SUPPORTED),
            ),
        ]);

        let elasticsearch_upgrade_paths = BTreeMap::from([
            (6, VersionRange::new(Version::new(6, 8, 0), Version::new(6, 99, 99))),
            (7, VersionRange::new(Version::new(6, 8, 0), Version::new(7, 99, 99))),
            (8, VersionRange::new(Version::new(7, 17, 0), Version::new(8, 99, 99))),
            (9, VersionRange::new(Version::new(8, 18, 0), Version::new(9, 99, 99))),
        ]);

        Self {
            stack_floor: Version::new(0, 0, 0),
            products,
            policy_id_mandatory_from: Version::new(9, 0, 0)
                .with_pre("SNAPSHOT")
                .unwrap_or_else(|_| Version::new(9, 0, 0)),
            stack_monitoring_min: Version::new(7, 14, 0),
            apm_kibana_association_min: Version::new(7, 5, 1),
            elasticsearch_upgrade_paths,
        }
    }
}

impl SupportedVersions {
    /// Parses YAML overrides and applies them on top of the defaults.
    pub fn from_yaml_str(input: &str) -> Result<Self, LoadSupportedVersionsError> {
        let file: SupportedVersionsFile = serde_yaml::from_str(input).context(ParseSnafu)?;
        Ok(Self::default().merge(file))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadSupportedVersionsError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
        let supported_versions = Self::from_yaml_str(&input)?;

        tracing::info!(
            path = %path.display(),
            products = supported_versions.products.len(),
            "loaded supported versions"
        );

        Ok(supported_versions)
    }

    fn merge(mut self, file: SupportedVersionsFile) -> Self {
        if let Some(stack_floor) = file.stack_floor {
            self.stack_floor = stack_floor;
        }
        if let Some(version) = file.policy_id_mandatory_from {
            self.policy_id_mandatory_from = version;
        }
        if let Some(version) = file.stack_monitoring_min {
            self.stack_monitoring_min = version;
        }
        if let Some(version) = file.apm_kibana_association_min {
            self.apm_kibana_association_min = version;
        }
        self.products.extend(file.products);
        self.elasticsearch_upgrade_paths
            .extend(file.elasticsearch_upgrade_paths);
        self
    }

    /// The effective range of `product`, with the stack floor applied.
    pub fn range(&self, product: Product) -> Option<VersionRange> {
        self.products
            .get(&product)
            .map(|versions| versions.range.with_floor(&self.stack_floor))
    }

    /// Checks `version` against the effective range of `product`. Products
    /// without a configured range accept every version.
    pub fn check(&self, product: Product, version: &Version) -> Result<(), OutOfRange> {
        match self.range(product) {
            Some(range) => range.within(version),
            None => Ok(()),
        }
    }

    /// Returns a warning if `version` is supported but deprecated.
    pub fn deprecation_warning(&self, product: Product, version: &Version) -> Option<String> {
        let deprecated_below = self.products.get(&product)?.deprecated_below.as_ref()?;

        (self.check(product, version).is_ok() && version < deprecated_below).then(|| {
            format!(
                "{product} version {version} is deprecated and support for it will be removed in a future release"
            )
        })
    }

    /// The versions an Elasticsearch cluster can be upgraded from to reach
    /// `target`.
    pub fn elasticsearch_upgrade_path(&self, target: &Version) -> Option<&VersionRange> {
        self.elasticsearch_upgrade_paths.get(&target.major)
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, str::FromStr};

    use indoc::indoc;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;

    fn v(input: &str) -> Version {
        Version::from_str(input).expect("valid version")
    }

    #[test]
    fn defaults_cover_every_product() {
        let supported_versions = SupportedVersions::default();
        for product in Product::iter() {
            assert!(
                supported_versions.range(product).is_some(),
                "no default range for {product}"
            );
        }
    }

    #[rstest]
    #[case(Product::AgentStandalone, "7.10.0", true)]
    #[case(Product::AgentFleet, "7.13.2", false)]
    #[case(Product::AgentFleet, "7.14.0", true)]
    #[case(Product::Elasticsearch, "6.8.0", true)]
    #[case(Product::Elasticsearch, "10.0.0", false)]
    #[case(Product::EnterpriseSearch, "9.0.0", false)]
    #[case(Product::AutoOps, "9.0.0", false)]
    fn check(#[case] product: Product, #[case] version: &str, #[case] supported: bool) {
        let supported_versions = SupportedVersions::default();
        assert_eq!(
            supported_versions.check(product, &v(version)).is_ok(),
            supported
        );
    }

    #[rstest]
    #[case(Product::Kibana, "7.16.3", true)]
    #[case(Product::Kibana, "7.17.0", false)]
    #[case(Product::Kibana, "6.7.0", false)]
    #[case(Product::Beat, "7.0.0", false)]
    fn deprecation_warning(#[case] product: Product, #[case] version: &str, #[case] warns: bool) {
        let warning = SupportedVersions::default().deprecation_warning(product, &v(version));
        assert_eq!(warning.is_some(), warns);
    }

    #[test]
    fn deprecation_warning_message() {
        let warning = SupportedVersions::default()
            .deprecation_warning(Product::Elasticsearch, &v("7.10.0"))
            .expect("deprecated version");
        assert_eq!(
            warning,
            "Elasticsearch version 7.10.0 is deprecated and support for it will be removed in a future release"
        );
    }

    #[test]
    fn stack_floor_raises_lower_bounds() {
        let supported_versions = SupportedVersions::from_yaml_str("stackFloor: 8.0.0")
            .expect("valid overrides");

        assert!(
            supported_versions
                .check(Product::Beat, &v("7.17.0"))
                .is_err()
        );
        assert!(
            supported_versions
                .check(Product::Beat, &v("8.0.0"))
                .is_ok()
        );
    }

    #[test]
    fn overrides_merge_with_defaults() {
        let input = indoc! {"
            products:
              kibana:
                min: 7.17.0
                max: 9.99.99
                deprecatedBelow: 8.0.0
            elasticsearchUpgradePaths:
              10:
                min: 9.3.0
                max: 10.99.99
        "};
        let supported_versions = SupportedVersions::from_yaml_str(input).expect("valid overrides");

        let kibana = &supported_versions.products[&Product::Kibana];
        assert_eq!(kibana.range.min, v("7.17.0"));
        assert_eq!(kibana.deprecated_below, Some(v("8.0.0")));
        assert_eq!(
            supported_versions.products[&Product::Elasticsearch].range.min,
            v("6.8.0")
        );
        assert_eq!(
            supported_versions.elasticsearch_upgrade_path(&v("10.0.0")),
            Some(&VersionRange::new(v("9.3.0"), v("10.99.99")))
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = SupportedVersions::from_yaml_str("stackfloor: 8.0.0");
        assert!(matches!(result, Err(LoadSupportedVersionsError::Parse { .. })));
    }

    #[test]
    fn from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temporary file");
        writeln!(file, "stackMonitoringMin: 8.0.0").expect("writable file");

        let supported_versions =
            SupportedVersions::from_file(file.path()).expect("valid overrides");
        assert_eq!(supported_versions.stack_monitoring_min, v("8.0.0"));
    }

    #[test]
    fn from_missing_file() {
        let result = SupportedVersions::from_file("/does/not/exist.yaml");
        assert!(matches!(
            result,
            Err(LoadSupportedVersionsError::ReadFile { .. })
        ));
    }

    #[test]
    fn policy_id_threshold_includes_snapshots() {
        let supported_versions = SupportedVersions::default();
        assert!(v("9.0.0-SNAPSHOT") >= supported_versions.policy_id_mandatory_from);
        assert!(v("8.99.0") < supported_versions.policy_id_mandatory_from);
    }
}
