//! Stack monitoring ships the metrics and logs of a product to dedicated
//! Elasticsearch clusters.
use std::str::FromStr;

use eck_version::Version;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    commons::{
        association::{AssociationRef, AssociationType},
        selector::ObjectSelector,
    },
    field::{ErrorList, FieldError, FieldPath},
};

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitoring {
    /// Clusters receiving monitoring data.
    #[serde(default)]
    pub metrics: MonitoringRefs,

    /// Clusters receiving log data.
    #[serde(default)]
    pub logs: MonitoringRefs,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringRefs {
    /// Only a single cluster is currently supported.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elasticsearch_refs: Vec<ObjectSelector>,
}

impl MonitoringRefs {
    pub fn is_defined(&self) -> bool {
        self.elasticsearch_refs.iter().any(ObjectSelector::is_defined)
    }
}

impl Monitoring {
    pub fn is_defined(&self) -> bool {
        self.metrics.is_defined() || self.logs.is_defined()
    }

    /// Stack monitoring references, each one stored under its own annotation.
    pub fn association_refs(&self) -> Vec<AssociationRef> {
        let path = FieldPath::new("spec").child("monitoring");

        [("metrics", &self.metrics), ("logs", &self.logs)]
            .into_iter()
            .flat_map(|(name, refs)| {
                let path = path.child(name);
                refs.elasticsearch_refs.iter().map(move |selector| {
                    AssociationRef::new(AssociationType::Elasticsearch, path.clone(), selector)
                        .monitoring()
                })
            })
            .collect()
    }

    /// Checks that the product `version` supports stack monitoring and that at
    /// most one cluster is referenced per data type.
    pub fn validate(&self, version: &str, min_version: &Version) -> ErrorList {
        let mut errors = ErrorList::new();
        let path = FieldPath::new("spec").child("monitoring");

        if self.is_defined() {
            let supported =
                Version::from_str(version).is_ok_and(|version| &version.finalized() >= min_version);
            if !supported {
                errors.push(FieldError::invalid(
                    FieldPath::new("spec").child("version"),
                    version,
                    format!(
                        "Unsupported version for Stack Monitoring. Required >= {min}.",
                        min = min_version.finalized()
                    ),
                ));
            }
        }

        for (name, title, refs) in [
            ("metrics", "Metrics", &self.metrics),
            ("logs", "Logs", &self.logs),
        ] {
            if refs.is_defined() && refs.elasticsearch_refs.len() != 1 {
                errors.push(FieldError::invalid(
                    path.child(name).child("elasticsearchRefs"),
                    &refs.elasticsearch_refs,
                    format!("Only one {title} Elasticsearch reference is supported"),
                ));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;

    const MIN: Version = Version::new(7, 14, 0);

    fn monitoring(input: &str) -> Monitoring {
        serde_yaml::from_str(input).expect("valid monitoring spec")
    }

    #[rstest]
    #[case("8.0.0", true)]
    #[case("7.14.0", true)]
    #[case("7.14.0-SNAPSHOT", true)]
    #[case("7.13.4", false)]
    #[case("not-a-version", false)]
    fn version_support(#[case] version: &str, #[case] supported: bool) {
        let spec = monitoring("metrics: {elasticsearchRefs: [{name: monitoring}]}");
        let errors = spec.validate(version, &MIN);

        assert_eq!(errors.is_empty(), supported);
        if !supported {
            assert_eq!(
                errors[0].to_string(),
                format!(
                    r#"spec.version: Invalid value: "{version}": Unsupported version for Stack Monitoring. Required >= 7.14.0."#
                )
            );
        }
    }

    #[test]
    fn undefined_monitoring_skips_the_version_check() {
        assert!(Monitoring::default().validate("6.8.0", &MIN).is_empty());
    }

    #[test]
    fn at_most_one_ref_per_type() {
        let spec = monitoring(indoc! {"
            metrics:
              elasticsearchRefs:
                - name: a
                - name: b
            logs:
              elasticsearchRefs:
                - name: c
        "});
        let errors = spec.validate("8.0.0", &MIN);

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].path.to_string(),
            "spec.monitoring.metrics.elasticsearchRefs"
        );
        assert!(
            errors[0]
                .detail
                .contains("Only one Metrics Elasticsearch reference is supported")
        );
    }

    #[test]
    fn refs_are_monitoring_associations() {
        let spec = monitoring("logs: {elasticsearchRefs: [{name: logs, namespace: obs}]}");
        let refs = spec.association_refs();

        assert_eq!(refs.len(), 1);
        assert!(refs[0].monitoring);
        assert_eq!(refs[0].path.to_string(), "spec.monitoring.logs");
        assert!(refs[0].annotation_name("default").ends_with("-sm"));
    }
}
