//! Logstash, run as a StatefulSet and shipping to any number of Elasticsearch
//! clusters.
use std::sync::LazyLock;

use k8s_openapi::{
    api::core::v1::{PersistentVolumeClaim, PodTemplateSpec},
    apiextensions_apiserver::pkg::apis::apiextensions::v1::JSONSchemaProps,
};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    commons::{
        association::{Associated, AssociationRef, AssociationType},
        config::{ConfigSource, SecretSource},
        http::{ServiceTemplate, TlsOptions},
        monitoring::Monitoring,
        selector::ObjectSelector,
        status::DeploymentStatus,
    },
    field::{ErrorList, FieldError, FieldPath},
    supported_versions::Product,
    utils::{raw_object_list_schema, raw_object_schema},
    validation::{
        Check, UpdateCheck, Validate, ValidationContext,
        rules::{self, Configurable, Monitored, Versioned},
        schema_of,
    },
};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "logstash.k8s.elastic.co",
    version = "v1alpha1",
    kind = "Logstash",
    namespaced,
    status = "DeploymentStatus",
    shortname = "ls"
)]
#[serde(rename_all = "camelCase")]
pub struct LogstashSpec {
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i32>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elasticsearch_refs: Vec<ElasticsearchCluster>,

    /// Logstash settings, as in `logstash.yml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub config: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_ref: Option<ConfigSource>,

    /// Pipelines, as in `pipelines.yml`. An empty list still counts as set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_list_schema")]
    pub pipelines: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipelines_ref: Option<ConfigSource>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<LogstashService>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<Monitoring>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub pod_template: Option<PodTemplateSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_history_limit: Option<i32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secure_settings: Vec<SecretSource>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub update_strategy: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "raw_object_list_schema")]
    pub volume_claim_templates: Vec<PersistentVolumeClaim>,
}

/// An Elasticsearch cluster Logstash pipelines can send events to.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchCluster {
    #[serde(flatten)]
    pub selector: ObjectSelector,

    /// Referenced from the pipeline configuration as `<clusterName>`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_name: String,
}

/// A Service exposing a Logstash input plugin.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogstashService {
    pub name: String,

    #[serde(default)]
    pub service: ServiceTemplate,

    #[serde(default)]
    pub tls: TlsOptions,
}

impl Versioned for Logstash {
    fn version(&self) -> &str {
        &self.spec.version
    }

    fn product(&self) -> Product {
        Product::Logstash
    }
}

impl Configurable for Logstash {
    fn config(&self) -> Option<&Value> {
        self.spec.config.as_ref()
    }

    fn config_ref(&self) -> Option<&ConfigSource> {
        self.spec.config_ref.as_ref()
    }
}

impl Monitored for Logstash {
    fn monitoring(&self) -> Option<&Monitoring> {
        self.spec.monitoring.as_ref()
    }
}

impl Associated for Logstash {
    fn association_refs(&self) -> Vec<AssociationRef> {
        let path = FieldPath::new("spec").child("elasticsearchRefs");
        let mut refs: Vec<AssociationRef> = self
            .spec
            .elasticsearch_refs
            .iter()
            .map(|cluster| {
                AssociationRef::new(AssociationType::Elasticsearch, path.clone(), &cluster.selector)
                    .multi()
            })
            .collect();
        if let Some(monitoring) = &self.spec.monitoring {
            refs.extend(monitoring.association_refs());
        }
        refs
    }
}

impl Validate for Logstash {
    fn base_checks() -> &'static [Check<Self>] {
        &[
            rules::no_unknown_fields::<Self>,
            rules::name_length::<Self>,
            rules::supported_version::<Self>,
            rules::single_config_source::<Self>,
            check_single_pipeline_source,
            check_es_refs_have_cluster_name,
            rules::associations::<Self>,
            rules::monitoring::<Self>,
        ]
    }

    fn update_checks() -> &'static [UpdateCheck<Self>] {
        &[rules::no_downgrade::<Self>, check_pvc_changes]
    }

    fn open_api_schema() -> &'static JSONSchemaProps {
        static SCHEMA: LazyLock<JSONSchemaProps> = LazyLock::new(schema_of::<Logstash>);
        &SCHEMA
    }

    fn warnings(&self, ctx: &ValidationContext) -> Vec<String> {
        rules::deprecation_warnings(ctx, self)
    }
}

fn check_single_pipeline_source(_ctx: &ValidationContext, logstash: &Logstash) -> ErrorList {
    let spec = FieldPath::new("spec");
    rules::at_most_one_of_both(
        (spec.child("pipelines"), logstash.spec.pipelines.is_some()),
        (spec.child("pipelinesRef"), logstash.spec.pipelines_ref.is_some()),
        "Specify at most one of [`pipelines`, `pipelinesRef`], not both",
    )
}

fn check_es_refs_have_cluster_name(_ctx: &ValidationContext, logstash: &Logstash) -> ErrorList {
    let namespace = logstash.namespace().unwrap_or_default();
    let unnamed: Vec<String> = logstash
        .spec
        .elasticsearch_refs
        .iter()
        .filter(|cluster| cluster.cluster_name.is_empty())
        .map(|cluster| cluster.selector.with_default_namespace(&namespace).to_string())
        .collect();

    if unnamed.is_empty() {
        return ErrorList::new();
    }

    vec![FieldError::required(
        FieldPath::new("spec").child("elasticsearchRefs"),
        format!(
            "all elasticsearchRefs must have a clusterName, missing clusterName on [{unnamed}]",
            unnamed = unnamed.join(", ")
        ),
    )]
}

fn check_pvc_changes(_ctx: &ValidationContext, old: &Logstash, new: &Logstash) -> ErrorList {
    rules::claims_unchanged(
        FieldPath::new("spec").child("volumeClaimTemplates"),
        &old.spec.volume_claim_templates,
        &new.spec.volume_claim_templates,
    )
}
