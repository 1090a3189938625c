use std::sync::LazyLock;

use k8s_openapi::{
    api::core::v1::PodTemplateSpec,
    apiextensions_apiserver::pkg::apis::apiextensions::v1::JSONSchemaProps,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    commons::{
        association::{Associated, AssociationRef, AssociationType},
        config::SecretSource,
        http::HttpConfig,
        monitoring::Monitoring,
        selector::ObjectSelector,
        status::DeploymentStatus,
    },
    field::FieldPath,
    supported_versions::Product,
    utils::raw_object_schema,
    validation::{
        Check, UpdateCheck, Validate, ValidationContext,
        rules::{self, Monitored, Versioned},
        schema_of,
    },
};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "kibana.k8s.elastic.co",
    version = "v1",
    kind = "Kibana",
    namespaced,
    status = "DeploymentStatus",
    shortname = "kb"
)]
#[serde(rename_all = "camelCase")]
pub struct KibanaSpec {
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i32>,

    #[serde(default)]
    pub elasticsearch_ref: ObjectSelector,

    #[serde(default)]
    pub enterprise_search_ref: ObjectSelector,

    /// Kibana settings, as in `kibana.yml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub config: Option<Value>,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub pod_template: Option<PodTemplateSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secure_settings: Vec<SecretSource>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<Monitoring>,
}

impl Versioned for Kibana {
    fn version(&self) -> &str {
        &self.spec.version
    }

    fn product(&self) -> Product {
        Product::Kibana
    }
}

impl Monitored for Kibana {
    fn monitoring(&self) -> Option<&Monitoring> {
        self.spec.monitoring.as_ref()
    }
}

impl Associated for Kibana {
    fn association_refs(&self) -> Vec<AssociationRef> {
        let spec = FieldPath::new("spec");
        let mut refs = vec![
            AssociationRef::new(
                AssociationType::Elasticsearch,
                spec.child("elasticsearchRef"),
                &self.spec.elasticsearch_ref,
            ),
            AssociationRef::new(
                AssociationType::EnterpriseSearch,
                spec.child("enterpriseSearchRef"),
                &self.spec.enterprise_search_ref,
            ),
        ];
        if let Some(monitoring) = &self.spec.monitoring {
            refs.extend(monitoring.association_refs());
        }
        refs
    }
}

impl Validate for Kibana {
    fn base_checks() -> &'static [Check<Self>] {
        &[
            rules::no_unknown_fields::<Self>,
            rules::name_length::<Self>,
            rules::supported_version::<Self>,
            rules::associations::<Self>,
            rules::monitoring::<Self>,
        ]
    }

    fn update_checks() -> &'static [UpdateCheck<Self>] {
        &[rules::no_downgrade::<Self>]
    }

    fn open_api_schema() -> &'static JSONSchemaProps {
        static SCHEMA: LazyLock<JSONSchemaProps> = LazyLock::new(schema_of::<Kibana>);
        &SCHEMA
    }

    fn warnings(&self, ctx: &ValidationContext) -> Vec<String> {
        rules::deprecation_warnings(ctx, self)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{
        constants::LAST_APPLIED_CONFIGURATION_ANNOTATION,
        crd::test_utils::{create_errors, resource, update_errors},
        validation::{Admission, Outcome, validate},
    };

    fn kibana(spec: &str) -> Kibana {
        resource("kibana.k8s.elastic.co/v1", "Kibana", spec)
    }

    #[rstest]
    #[case::minimal("{version: 8.5.0}", &[])]
    #[case::too_old(
        "{version: 6.7.0}",
        &[r#"spec.version: Invalid value: "6.7.0": Unsupported version: version 6.7.0 is lower than the lowest supported version of 6.8.0"#]
    )]
    #[case::monitoring_secret_ref_with_namespace(
        "{version: 8.5.0, monitoring: {logs: {elasticsearchRefs: [{secretName: monitoring, namespace: ns}]}}}",
        &["spec.monitoring.logs: Forbidden: Invalid association reference: serviceName or namespace can only be used in combination with name, not with secretName"]
    )]
    #[case::two_metrics_clusters(
        "{version: 8.5.0, monitoring: {metrics: {elasticsearchRefs: [{name: m1}, {name: m2}]}}}",
        &[r#"spec.monitoring.metrics.elasticsearchRefs: Invalid value: [{"name":"m1"},{"name":"m2"}]: Only one Metrics Elasticsearch reference is supported"#]
    )]
    fn create(#[case] spec: &str, #[case] expected: &[&str]) {
        assert_eq!(create_errors(&kibana(spec)), expected);
    }

    #[test]
    fn deprecated_version_warns() {
        let kibana = kibana("{version: 7.10.0}");
        let outcome = validate(&ValidationContext::default(), Admission::Create(&kibana));

        assert!(
            matches!(&outcome, Outcome::Accepted { warnings } if warnings.len() == 1),
            "{outcome:?}"
        );
    }

    #[test]
    fn unknown_fields() {
        let mut kibana = kibana("{version: 8.5.0}");
        kibana.metadata.annotations = Some(
            [(
                LAST_APPLIED_CONFIGURATION_ANNOTATION.to_owned(),
                r#"{"spec":{"version":"8.5.0","nodeSets":[]}}"#.to_owned(),
            )]
            .into(),
        );

        let errors = create_errors(&kibana);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with(r#"spec.nodeSets: Invalid value: "nodeSets""#), "{errors:?}");
    }

    #[test]
    fn upgrade() {
        let errors = update_errors(&kibana("{version: 8.4.0}"), &kibana("{version: 8.5.0}"));
        assert!(errors.is_empty(), "{errors:?}");
    }
}
