//! AutoOps agent policies, deploying AutoOps agents for the Elasticsearch
//! clusters matching a selector.
use std::sync::LazyLock;

use k8s_openapi::{
    api::core::v1::PodTemplateSpec,
    apiextensions_apiserver::pkg::apis::apiextensions::v1::JSONSchemaProps,
    apimachinery::pkg::apis::meta::v1::LabelSelector,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    commons::status::DeploymentStatus,
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
    group = "autoops.k8s.elastic.co",
    version = "v1alpha1",
    kind = "AutoOpsAgentPolicy",
    namespaced,
    status = "DeploymentStatus",
    shortname = "aop"
)]
#[serde(rename_all = "camelCase")]
pub struct AutoOpsAgentPolicySpec {
    pub version: String,

    /// Secret holding the AutoOps connection settings.
    #[serde(default)]
    pub auto_ops_ref: AutoOpsRef,

    /// Elasticsearch clusters to monitor.
    #[serde(default)]
    pub resource_selector: LabelSelector,

    /// Namespaces to look for Elasticsearch clusters in. All namespaces if
    /// empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_selector: Option<LabelSelector>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub pod_template: Option<PodTemplateSpec>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account_name: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoOpsRef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_name: String,
}

impl Versioned for AutoOpsAgentPolicy {
    fn version(&self) -> &str {
        &self.spec.version
    }

    fn product(&self) -> Product {
        Product::AutoOps
    }
}

impl Validate for AutoOpsAgentPolicy {
    fn base_checks() -> &'static [Check<Self>] {
        &[
            rules::no_unknown_fields::<Self>,
            rules::name_length::<Self>,
            rules::supported_version::<Self>,
            check_auto_ops_ref,
            check_resource_selector,
        ]
    }

    fn update_checks() -> &'static [UpdateCheck<Self>] {
        &[rules::no_downgrade::<Self>]
    }

    fn open_api_schema() -> &'static JSONSchemaProps {
        static SCHEMA: LazyLock<JSONSchemaProps> = LazyLock::new(schema_of::<AutoOpsAgentPolicy>);
        &SCHEMA
    }

    fn warnings(&self, ctx: &ValidationContext) -> Vec<String> {
        rules::deprecation_warnings(ctx, self)
    }
}

fn check_auto_ops_ref(_ctx: &ValidationContext, policy: &AutoOpsAgentPolicy) -> ErrorList {
    if policy.spec.auto_ops_ref.secret_name.is_empty() {
        return vec![FieldError::required(
            FieldPath::new("spec").child("autoOpsRef").child("secretName"),
            "autoOpsRef.secretName is mandatory",
        )];
    }
    ErrorList::new()
}

fn check_resource_selector(_ctx: &ValidationContext, policy: &AutoOpsAgentPolicy) -> ErrorList {
    let selector = &policy.spec.resource_selector;
    let has_labels = selector.match_labels.as_ref().is_some_and(|labels| !labels.is_empty());
    let has_expressions = selector
        .match_expressions
        .as_ref()
        .is_some_and(|expressions| !expressions.is_empty());

    if !has_labels && !has_expressions {
        return vec![FieldError::required(
            FieldPath::new("spec").child("resourceSelector"),
            "ResourceSelector must be specified with either matchLabels or matchExpressions",
        )];
    }
    ErrorList::new()
}
