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
    commons::{config::ConfigSource, http::HttpConfig, status::DeploymentStatus},
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
    group = "packageregistry.k8s.elastic.co",
    version = "v1alpha1",
    kind = "PackageRegistry",
    namespaced,
    status = "DeploymentStatus",
    shortname = "epr"
)]
#[serde(rename_all = "camelCase")]
pub struct PackageRegistrySpec {
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i32>,

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

impl Versioned for PackageRegistry {
    fn version(&self) -> &str {
        &self.spec.version
    }

    fn product(&self) -> Product {
        Product::PackageRegistry
    }
}

impl Configurable for PackageRegistry {
    fn config(&self) -> Option<&Value> {
        self.spec.config.as_ref()
    }

    fn config_ref(&self) -> Option<&ConfigSource> {
        self.spec.config_ref.as_ref()
    }
}

impl Validate for PackageRegistry {
    fn base_checks() -> &'static [Check<Self>] {
        &[
            rules::no_unknown_fields::<Self>,
            rules::name_length::<Self>,
            rules::supported_version::<Self>,
            rules::single_config_source::<Self>,
        ]
    }

    fn update_checks() -> &'static [UpdateCheck<Self>] {
        &[rules::no_downgrade::<Self>]
    }

    fn open_api_schema() -> &'static JSONSchemaProps {
        static SCHEMA: LazyLock<JSONSchemaProps> = LazyLock::new(schema_of::<PackageRegistry>);
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
        constants::DISABLE_DOWNGRADE_VALIDATION_ANNOTATION,
        crd::test_utils::{create_errors, resource, update_errors},
    };

    fn registry(spec: &str) -> PackageRegistry {
        resource("packageregistry.k8s.elastic.co/v1alpha1", "PackageRegistry", spec)
    }

    #[rstest]
    #[case::minimal("{version: 8.15.0}", &[])]
    #[case::snapshot("{version: 9.1.0-SNAPSHOT}", &[])]
    #[case::too_old(
        "{version: 7.16.3}",
        &[r#"spec.version: Invalid value: "7.16.3": Unsupported version: version 7.16.3 is lower than the lowest supported version of 7.17.0"#]
    )]
    fn create(#[case] spec: &str, #[case] expected: &[&str]) {
        assert_eq!(create_errors(&registry(spec)), expected);
    }

    #[rstest]
    #[case::upgrade("8.15.0", "8.16.0", None, true)]
    #[case::downgrade("8.16.0", "8.15.0", None, false)]
    #[case::downgrade_allowed("8.16.0", "8.15.0", Some("true"), true)]
    #[case::override_must_be_true("8.16.0", "8.15.0", Some("yes"), false)]
    fn downgrades(
        #[case] old: &str,
        #[case] new: &str,
        #[case] annotation: Option<&str>,
        #[case] accepted: bool,
    ) {
        let old = registry(&format!("{{version: {old}}}"));
        let mut new = registry(&format!("{{version: {new}}}"));
        if let Some(value) = annotation {
            new.metadata.annotations = Some(
                [(
                    DISABLE_DOWNGRADE_VALIDATION_ANNOTATION.to_owned(),
                    value.to_owned(),
                )]
                .into(),
            );
        }

        assert_eq!(update_errors(&old, &new).is_empty(), accepted);
    }
}
