//! The legacy Elasticsearch API, still accepted for clusters created before
//! `v1`. It knows nothing about `node.roles`.
use std::sync::LazyLock;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::JSONSchemaProps;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CONFIG_INVALID_MSG, MASTER_REQUIRED_MSG, NodeRoles, NodeSet, matching_node_sets, node_sets_path};
use crate::{
    commons::{config::SecretSource, http::HttpConfig, status::DeploymentStatus},
    field::{ErrorList, FieldError},
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
    group = "elasticsearch.k8s.elastic.co",
    version = "v1beta1",
    kind = "Elasticsearch",
    namespaced,
    status = "DeploymentStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchSpec {
    #[serde(default)]
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub node_sets: Vec<NodeSet>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub update_strategy: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub pod_disruption_budget: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secure_settings: Vec<SecretSource>,
}

impl Versioned for Elasticsearch {
    fn version(&self) -> &str {
        &self.spec.version
    }

    fn product(&self) -> Product {
        Product::Elasticsearch
    }
}

impl Validate for Elasticsearch {
    fn base_checks() -> &'static [Check<Self>] {
        &[
            rules::no_unknown_fields::<Self>,
            check_valid_name,
            check_has_master,
            check_supported_version,
            check_san_ips,
            check_node_set_names_unique,
        ]
    }

    fn update_checks() -> &'static [UpdateCheck<Self>] {
        &[rules::no_downgrade::<Self>, check_pvc_modification]
    }

    fn open_api_schema() -> &'static JSONSchemaProps {
        static SCHEMA: LazyLock<JSONSchemaProps> = LazyLock::new(schema_of::<Elasticsearch>);
        &SCHEMA
    }

    fn warnings(&self, ctx: &ValidationContext) -> Vec<String> {
        rules::deprecation_warnings(ctx, self)
    }
}

fn check_valid_name(_ctx: &ValidationContext, es: &Elasticsearch) -> ErrorList {
    super::valid_name(&es.name_any(), &es.spec.node_sets)
}

fn check_has_master(_ctx: &ValidationContext, es: &Elasticsearch) -> ErrorList {
    let mut errors = ErrorList::new();
    let mut has_master = false;

    for (index, node_set) in es.spec.node_sets.iter().enumerate() {
        match NodeRoles::from_config(node_set.config.as_ref()) {
            Ok(roles) => has_master |= roles.master_setting() && node_set.count > 0,
            Err(_) => errors.push(FieldError::invalid(
                node_sets_path().index(index),
                &node_set.config,
                CONFIG_INVALID_MSG,
            )),
        }
    }

    if !has_master {
        errors.push(FieldError::invalid(
            node_sets_path(),
            &es.spec.node_sets,
            MASTER_REQUIRED_MSG,
        ));
    }
    errors
}

fn check_supported_version(ctx: &ValidationContext, es: &Elasticsearch) -> ErrorList {
    super::supported_version(ctx, &es.spec.version)
}

fn check_san_ips(_ctx: &ValidationContext, es: &Elasticsearch) -> ErrorList {
    super::valid_san_ips(&es.spec.http)
}

fn check_node_set_names_unique(_ctx: &ValidationContext, es: &Elasticsearch) -> ErrorList {
    super::unique_node_set_names(&es.spec.node_sets)
}

/// Volume claim templates of existing node sets are immutable.
fn check_pvc_modification(
    _ctx: &ValidationContext,
    old: &Elasticsearch,
    new: &Elasticsearch,
) -> ErrorList {
    matching_node_sets(&old.spec.node_sets, &new.spec.node_sets)
        .flat_map(|(index, previous, node_set)| {
            rules::claims_unchanged(
                node_sets_path().index(index).child("volumeClaimTemplates"),
                &previous.volume_claim_templates,
                &node_set.volume_claim_templates,
            )
        })
        .collect()
}
