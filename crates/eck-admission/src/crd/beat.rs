//! Beats, lightweight shippers deployed as a DaemonSet or a Deployment.
use std::sync::LazyLock;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::JSONSchemaProps;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    commons::{
        association::{Associated, AssociationRef, AssociationType},
        config::{ConfigSource, SecretSource},
        monitoring::Monitoring,
        selector::ObjectSelector,
        status::DeploymentStatus,
        workload::{DaemonSetSpec, DeploymentSpec},
    },
    field::{ErrorList, FieldError, FieldPath},
    supported_versions::Product,
    utils::raw_object_schema,
    validation::{
        Check, UpdateCheck, Validate, ValidationContext,
        rules::{self, Configurable, Monitored, Versioned},
        schema_of,
    },
};

/// Beat types with a default image. Any other type needs `spec.image`.
pub const KNOWN_TYPES: [&str; 6] = [
    "filebeat",
    "metricbeat",
    "heartbeat",
    "auditbeat",
    "journalbeat",
    "packetbeat",
];

#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "beat.k8s.elastic.co",
    version = "v1beta1",
    kind = "Beat",
    namespaced,
    status = "DeploymentStatus",
    shortname = "beat"
)]
#[serde(rename_all = "camelCase")]
pub struct BeatSpec {
    /// The Beat to deploy, for example `filebeat`.
    #[serde(rename = "type")]
    pub beat_type: String,

    pub version: String,

    #[serde(default)]
    pub elasticsearch_ref: ObjectSelector,

    /// Kibana the Beat sets up its dashboards in.
    #[serde(default)]
    pub kibana_ref: ObjectSelector,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub config: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_ref: Option<ConfigSource>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secure_settings: Vec<SecretSource>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemon_set: Option<DaemonSetSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<Monitoring>,
}

impl Versioned for Beat {
    fn version(&self) -> &str {
        &self.spec.version
    }

    fn product(&self) -> Product {
        Product::Beat
    }
}

impl Configurable for Beat {
    fn config(&self) -> Option<&Value> {
        self.spec.config.as_ref()
    }

    fn config_ref(&self) -> Option<&ConfigSource> {
        self.spec.config_ref.as_ref()
    }
}

impl Monitored for Beat {
    fn monitoring(&self) -> Option<&Monitoring> {
        self.spec.monitoring.as_ref()
    }
}

impl Associated for Beat {
    fn association_refs(&self) -> Vec<AssociationRef> {
        let spec = FieldPath::new("spec");
        let mut refs = vec![
            AssociationRef::new(
                AssociationType::Elasticsearch,
                spec.child("elasticsearchRef"),
                &self.spec.elasticsearch_ref,
            ),
            AssociationRef::new(
                AssociationType::Kibana,
                spec.child("kibanaRef"),
                &self.spec.kibana_ref,
            ),
        ];
        if let Some(monitoring) = &self.spec.monitoring {
            refs.extend(monitoring.association_refs());
        }
        refs
    }
}

impl Validate for Beat {
    fn base_checks() -> &'static [Check<Self>] {
        &[
            rules::no_unknown_fields::<Self>,
            rules::name_length::<Self>,
            rules::supported_version::<Self>,
            check_at_most_one_deployment_option,
            check_exactly_one_deployment_option,
            check_image_for_unknown_type,
            rules::single_config_source::<Self>,
            rules::associations::<Self>,
            rules::monitoring::<Self>,
        ]
    }

    fn update_checks() -> &'static [UpdateCheck<Self>] {
        &[rules::no_downgrade::<Self>]
    }

    fn open_api_schema() -> &'static JSONSchemaProps {
        static SCHEMA: LazyLock<JSONSchemaProps> = LazyLock::new(schema_of::<Beat>);
        &SCHEMA
    }

    fn warnings(&self, ctx: &ValidationContext) -> Vec<String> {
        rules::deprecation_warnings(ctx, self)
    }
}

fn deployment_options(spec: &BeatSpec) -> [(&'static str, bool); 2] {
    [
        ("daemonSet", spec.daemon_set.is_some()),
        ("deployment", spec.deployment.is_some()),
    ]
}

fn check_at_most_one_deployment_option(_ctx: &ValidationContext, beat: &Beat) -> ErrorList {
    rules::at_most_one_of(&FieldPath::new("spec"), &deployment_options(&beat.spec))
}

fn check_exactly_one_deployment_option(_ctx: &ValidationContext, beat: &Beat) -> ErrorList {
    let enabled = deployment_options(&beat.spec)
        .iter()
        .filter(|(_, enabled)| *enabled)
        .count();

    if enabled != 1 {
        return vec![FieldError::invalid_omit_value(
            FieldPath::new("spec"),
            "either daemonSet or deployment must be specified",
        )];
    }
    ErrorList::new()
}

fn check_image_for_unknown_type(_ctx: &ValidationContext, beat: &Beat) -> ErrorList {
    if beat.spec.image.is_empty() && !KNOWN_TYPES.contains(&beat.spec.beat_type.as_str()) {
        return vec![FieldError::required(
            FieldPath::new("spec").child("image"),
            format!(
                "Image is required if Beat type is not one of [{types}]",
                types = KNOWN_TYPES.join(", ")
            ),
        )];
    }
    ErrorList::new()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::crd::test_utils::{create_errors, resource};

    fn beat(spec: &str) -> Beat {
        resource("beat.k8s.elastic.co/v1beta1", "Beat", spec)
    }

    #[rstest]
    #[case::filebeat("{type: filebeat, version: 8.5.0, daemonSet: {}}")]
    #[case::custom_with_image("{type: mybeat, version: 8.5.0, image: registry/mybeat:8.5.0, deployment: {}}")]
    #[case::config_ref("{type: metricbeat, version: 8.5.0, deployment: {}, configRef: {secretName: config}}")]
    fn valid(#[case] spec: &str) {
        assert_eq!(create_errors(&beat(spec)), Vec::<String>::new());
    }

    #[rstest]
    #[case::no_deployment_option(
        "{type: filebeat, version: 8.5.0}",
        &["spec: Invalid value: either daemonSet or deployment must be specified"]
    )]
    #[case::both_deployment_options(
        "{type: filebeat, version: 8.5.0, daemonSet: {}, deployment: {}}",
        &[
            "spec.daemonSet: Forbidden: Specify at most one of [daemonSet, deployment]",
            "spec.deployment: Forbidden: Specify at most one of [daemonSet, deployment]",
            "spec: Invalid value: either daemonSet or deployment must be specified",
        ]
    )]
    #[case::unknown_type_without_image(
        "{type: mybeat, version: 8.5.0, daemonSet: {}}",
        &["spec.image: Required value: Image is required if Beat type is not one of [filebeat, metricbeat, heartbeat, auditbeat, journalbeat, packetbeat]"]
    )]
    #[case::config_and_config_ref(
        "{type: filebeat, version: 8.5.0, daemonSet: {}, config: {a: b}, configRef: {secretName: config}}",
        &[
            "spec.config: Forbidden: Specify at most one of [`config`, `configRef`], not both",
            "spec.configRef: Forbidden: Specify at most one of [`config`, `configRef`], not both",
        ]
    )]
    #[case::monitoring_too_old(
        "{type: filebeat, version: 7.13.0, daemonSet: {}, monitoring: {metrics: {elasticsearchRefs: [{name: monitoring}]}}}",
        &[r#"spec.version: Invalid value: "7.13.0": Unsupported version for Stack Monitoring. Required >= 7.14.0."#]
    )]
    fn invalid(#[case] spec: &str, #[case] expected: &[&str]) {
        assert_eq!(create_errors(&beat(spec)), expected);
    }
}
