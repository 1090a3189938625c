use std::{str::FromStr, sync::LazyLock};

use eck_version::Version;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::JSONSchemaProps;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    CONFIG_INVALID_MSG, MASTER_REQUIRED_MSG, NodeRoles, NodeSet, PARSE_STORED_VERSION_MSG,
    UNSUPPORTED_UPGRADE_MSG, UNSUPPORTED_VERSION_MSG, matching_node_sets, node_sets_path,
};
use crate::{
    commons::{
        config::SecretSource, http::HttpConfig, monitoring::Monitoring,
        status::DeploymentStatus,
    },
    field::{ErrorList, ErrorType, FieldError, FieldPath},
    supported_versions::Product,
    utils::{raw_object_list_schema, raw_object_schema},
    validation::{
        Check, UpdateCheck, Validate, ValidationContext,
        rules::{self, Monitored, Versioned},
        schema_of,
    },
};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "elasticsearch.k8s.elastic.co",
    version = "v1",
    kind = "Elasticsearch",
    namespaced,
    status = "DeploymentStatus",
    shortname = "es"
)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchSpec {
    /// Version of Elasticsearch.
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub transport: Option<Value>,

    /// Groups of nodes, each one deployed as a StatefulSet.
    #[serde(default)]
    pub node_sets: Vec<NodeSet>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub update_strategy: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub pod_disruption_budget: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub auth: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secure_settings: Vec<SecretSource>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "raw_object_list_schema")]
    pub remote_clusters: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_claim_delete_policy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<Monitoring>,
}

impl Versioned for Elasticsearch {
    fn version(&self) -> &str {
        &self.spec.version
    }

    fn product(&self) -> Product {
        Product::Elasticsearch
    }
}

impl Monitored for Elasticsearch {
    fn monitoring(&self) -> Option<&Monitoring> {
        self.spec.monitoring.as_ref()
    }
}

impl Validate for Elasticsearch {
    fn base_checks() -> &'static [Check<Self>] {
        &[
            rules::no_unknown_fields::<Self>,
            check_valid_name,
            check_node_roles,
            check_supported_version,
            check_san_ips,
            rules::monitoring::<Self>,
            check_node_set_names_unique,
        ]
    }

    fn update_checks() -> &'static [UpdateCheck<Self>] {
        &[rules::no_downgrade::<Self>, check_upgrade_path, check_pvc_modification]
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

/// At least one master node, and no mix of `node.roles` with the settings it
/// replaces.
fn check_node_roles(_ctx: &ValidationContext, es: &Elasticsearch) -> ErrorList {
    let version = match super::parse_version(&es.spec.version) {
        Ok(version) => version,
        Err(err) => return vec![err],
    };

    let mut errors = ErrorList::new();
    let mut seen_master = false;

    for (index, node_set) in es.spec.node_sets.iter().enumerate() {
        let path = node_sets_path().index(index).child("config");
        let config = node_set.config.as_ref();

        let roles = match NodeRoles::from_config(config) {
            Ok(roles) => roles,
            Err(err) => {
                tracing::debug!(error = %err, node_set = %node_set.name, "invalid node set configuration");
                errors.push(FieldError::invalid(path, config, CONFIG_INVALID_MSG));
                continue;
            }
        };

        if let Some(err) = super::node_roles_error(&path, config, &roles, &version) {
            let fatal = err.error_type == ErrorType::Invalid;
            errors.push(err);
            if fatal {
                continue;
            }
        }

        seen_master |= roles.is_master_eligible() && node_set.count > 0;
    }

    if !seen_master {
        errors.push(FieldError::required(node_sets_path(), MASTER_REQUIRED_MSG));
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

/// The running version can be upgraded to the new one. The version in the
/// status is the lowest one running, it takes precedence over the old spec.
fn check_upgrade_path(ctx: &ValidationContext, old: &Elasticsearch, new: &Elasticsearch) -> ErrorList {
    let current = match old.status.as_ref().filter(|status| !status.version.is_empty()) {
        Some(status) => Version::from_str(&status.version).map_err(|_| {
            FieldError::invalid(
                FieldPath::new("status").child("version"),
                &status.version,
                PARSE_STORED_VERSION_MSG,
            )
        }),
        None => Version::from_str(&old.spec.version).map_err(|_| {
            FieldError::invalid(
                super::version_path(),
                &old.spec.version,
                PARSE_STORED_VERSION_MSG,
            )
        }),
    };
    let proposed = super::parse_version(&new.spec.version);

    let (current, proposed) = match (current, proposed) {
        (Ok(current), Ok(proposed)) => (current, proposed),
        (current, proposed) => {
            return current.err().into_iter().chain(proposed.err()).collect();
        }
    };

    let Some(range) = ctx.supported_versions.elasticsearch_upgrade_path(&proposed) else {
        return vec![FieldError::invalid(
            super::version_path(),
            &new.spec.version,
            UNSUPPORTED_VERSION_MSG,
        )];
    };

    match range.within(&current) {
        Ok(()) => ErrorList::new(),
        Err(err) => {
            tracing::debug!(
                current.version = %current,
                proposed.version = %proposed,
                error = %err,
                "rejecting Elasticsearch upgrade"
            );
            vec![FieldError::invalid(
                super::version_path(),
                &new.spec.version,
                UNSUPPORTED_UPGRADE_MSG,
            )]
        }
    }
}

fn check_pvc_modification(
    _ctx: &ValidationContext,
    old: &Elasticsearch,
    new: &Elasticsearch,
) -> ErrorList {
    matching_node_sets(&old.spec.node_sets, &new.spec.node_sets)
        .filter(|(_, previous, node_set)| {
            !super::claims_expanded_only(
                &previous.volume_claim_templates,
                &node_set.volume_claim_templates,
            )
        })
        .map(|(index, _, node_set)| {
            FieldError::invalid(
                node_sets_path().index(index).child("volumeClaimTemplates"),
                &node_set.volume_claim_templates,
                "volume claim templates can only have their storage requests increased, if the storage class allows volume expansion. Any other change is forbidden",
            )
        })
        .collect()
}
