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
        selector::ObjectSelector,
        status::DeploymentStatus,
    },
    field::{ErrorList, FieldError, FieldPath},
    supported_versions::Product,
    utils::raw_object_schema,
    validation::{
        Check, UpdateCheck, Validate, ValidationContext,
        rules::{self, Versioned},
        schema_of,
    },
};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "apm.k8s.elastic.co",
    version = "v1",
    kind = "ApmServer",
    namespaced,
    status = "DeploymentStatus",
    shortname = "apm"
)]
#[serde(rename_all = "camelCase")]
pub struct ApmServerSpec {
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i32>,

    /// APM Server settings, as in `apm-server.yml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub config: Option<Value>,

    #[serde(default)]
    pub http: HttpConfig,

    /// Cluster the APM data is stored in.
    #[serde(default)]
    pub elasticsearch_ref: ObjectSelector,

    /// Kibana the APM agent central configuration is read from.
    #[serde(default)]
    pub kibana_ref: ObjectSelector,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub pod_template: Option<PodTemplateSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secure_settings: Vec<SecretSource>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account_name: String,
}

impl Versioned for ApmServer {
    fn version(&self) -> &str {
        &self.spec.version
    }

    fn product(&self) -> Product {
        Product::ApmServer
    }
}

impl Associated for ApmServer {
    fn association_refs(&self) -> Vec<AssociationRef> {
        let spec = FieldPath::new("spec");
        vec![
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
        ]
    }
}

impl Validate for ApmServer {
    fn base_checks() -> &'static [Check<Self>] {
        &[
            rules::no_unknown_fields::<Self>,
            rules::name_length::<Self>,
            rules::supported_version::<Self>,
            rules::associations::<Self>,
            check_kibana_ref_min_version,
        ]
    }

    fn update_checks() -> &'static [UpdateCheck<Self>] {
        &[rules::no_downgrade::<Self>]
    }

    fn open_api_schema() -> &'static JSONSchemaProps {
        static SCHEMA: LazyLock<JSONSchemaProps> = LazyLock::new(schema_of::<ApmServer>);
        &SCHEMA
    }

    fn warnings(&self, ctx: &ValidationContext) -> Vec<String> {
        rules::deprecation_warnings(ctx, self)
    }
}

/// Agent central configuration through Kibana needs a recent enough APM Server.
fn check_kibana_ref_min_version(ctx: &ValidationContext, apm: &ApmServer) -> ErrorList {
    if !apm.spec.kibana_ref.is_defined() {
        return ErrorList::new();
    }

    // An unparsable version is already reported by the version check.
    let Ok(version) = rules::parse_version(&apm.spec.version) else {
        return ErrorList::new();
    };

    let min = &ctx.supported_versions.apm_kibana_association_min;
    if version < *min {
        return vec![FieldError::forbidden(
            FieldPath::new("spec").child("kibanaRef"),
            format!(
                "minimum required version for Kibana association is {min} but desired version is {version}"
            ),
        )];
    }
    ErrorList::new()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::crd::test_utils::{create_errors, resource, update_errors};

    fn apm(spec: &str) -> ApmServer {
        resource("apm.k8s.elastic.co/v1", "ApmServer", spec)
    }

    #[rstest]
    #[case::no_kibana_ref("{version: 7.4.0}", &[])]
    #[case::kibana_ref_supported("{version: 7.5.1, kibanaRef: {name: kb}}", &[])]
    #[case::kibana_ref_too_old(
        "{version: 7.4.0, kibanaRef: {name: kbname, namespace: kbns}}",
        &["spec.kibanaRef: Forbidden: minimum required version for Kibana association is 7.5.1 but desired version is 7.4.0"]
    )]
    #[case::invalid_version(
        "{version: 7.x}",
        &[r#"spec.version: Invalid value: "7.x": Invalid version: No Major.Minor.Patch elements found"#]
    )]
    #[case::secret_and_name(
        "{version: 7.6.1, elasticsearchRef: {name: es, secretName: es-secret}}",
        &["spec.elasticsearchRef: Forbidden: Invalid association reference: specify name or secretName, not both"]
    )]
    fn create(#[case] spec: &str, #[case] expected: &[&str]) {
        assert_eq!(create_errors(&apm(spec)), expected);
    }

    #[test]
    fn downgrade() {
        let errors = update_errors(&apm("{version: 7.6.1}"), &apm("{version: 7.5.1}"));
        assert_eq!(
            errors,
            ["spec.version: Forbidden: Version downgrades are not supported"]
        );
    }
}
