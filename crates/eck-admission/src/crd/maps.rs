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
        config::ConfigSource,
        http::HttpConfig,
        selector::ObjectSelector,
        status::DeploymentStatus,
    },
    field::FieldPath,
    supported_versions::Product,
    utils::raw_object_schema,
    validation::{
        Check, UpdateCheck, Validate, ValidationContext,
        rules::{self, Configurable, Versioned},
        schema_of,
    },
};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "maps.k8s.elastic.co",
    version = "v1alpha1",
    kind = "ElasticMapsServer",
    namespaced,
    status = "DeploymentStatus",
    shortname = "ems"
)]
#[serde(rename_all = "camelCase")]
pub struct ElasticMapsServerSpec {
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i32>,

    #[serde(default)]
    pub elasticsearch_ref: ObjectSelector,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub config: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_ref: Option<ConfigSource>,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub pod_template: Option<PodTemplateSpec>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account_name: String,
}

impl Versioned for ElasticMapsServer {
    fn version(&self) -> &str {
        &self.spec.version
    }

    fn product(&self) -> Product {
        Product::Maps
    }
}

impl Configurable for ElasticMapsServer {
    fn config(&self) -> Option<&Value> {
        self.spec.config.as_ref()
    }

    fn config_ref(&self) -> Option<&ConfigSource> {
        self.spec.config_ref.as_ref()
    }
}

impl Associated for ElasticMapsServer {
    fn association_refs(&self) -> Vec<AssociationRef> {
        vec![AssociationRef::new(
            AssociationType::Elasticsearch,
            FieldPath::new("spec").child("elasticsearchRef"),
            &self.spec.elasticsearch_ref,
        )]
    }
}

impl Validate for ElasticMapsServer {
    fn base_checks() -> &'static [Check<Self>] {
        &[
            rules::no_unknown_fields::<Self>,
            rules::name_length::<Self>,
            rules::supported_version::<Self>,
            rules::single_config_source::<Self>,
            rules::associations::<Self>,
        ]
    }

    fn update_checks() -> &'static [UpdateCheck<Self>] {
        &[rules::no_downgrade::<Self>]
    }

    fn open_api_schema() -> &'static JSONSchemaProps {
        static SCHEMA: LazyLock<JSONSchemaProps> = LazyLock::new(schema_of::<ElasticMapsServer>);
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
    use crate::crd::test_utils::{create_errors, resource};

    fn maps(spec: &str) -> ElasticMapsServer {
        resource("maps.k8s.elastic.co/v1alpha1", "ElasticMapsServer", spec)
    }

    #[rstest]
    #[case::minimal("{version: 8.5.0}", &[])]
    #[case::too_old(
        "{version: 7.10.0}",
        &[r#"spec.version: Invalid value: "7.10.0": Unsupported version: version 7.10.0 is lower than the lowest supported version of 7.11.0"#]
    )]
    #[case::config_and_config_ref(
        "{version: 8.5.0, config: {a: b}, configRef: {secretName: c}}",
        &[
            "spec.config: Forbidden: Specify at most one of [`config`, `configRef`], not both",
            "spec.configRef: Forbidden: Specify at most one of [`config`, `configRef`], not both",
        ]
    )]
    fn create(#[case] spec: &str, #[case] expected: &[&str]) {
        assert_eq!(create_errors(&maps(spec)), expected);
    }

    #[test]
    fn too_long_name() {
        let mut maps = maps("{version: 8.5.0}");
        maps.metadata.name = Some("a".repeat(37));

        assert_eq!(
            create_errors(&maps),
            ["metadata.name: Too long: must have at most 36 bytes"]
        );
    }
}
