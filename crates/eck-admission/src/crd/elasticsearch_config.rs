//! Elasticsearch API requests applied to a cluster, for example to register
//! snapshot repositories or index templates.
use std::sync::LazyLock;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::JSONSchemaProps;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu, ensure};
use url::Url;

use crate::{
    commons::{
        association::{Associated, AssociationRef, AssociationType},
        selector::ObjectSelector,
    },
    field::{ErrorList, FieldError, FieldPath},
    validation::{Check, Validate, ValidationContext, rules, schema_of},
};

/// Operation URLs are paths relative to the cluster endpoint.
const BASE_URL: &str = "http://localhost:9200/";

#[derive(Debug, Snafu)]
pub enum InvalidUrl {
    #[snafu(display("invalid control character in URL"))]
    ControlCharacter,

    #[snafu(display("{source}"))]
    Parse { source: url::ParseError },
}

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "elasticsearchconfig.k8s.elastic.co",
    version = "v1alpha1",
    kind = "ElasticsearchConfig",
    namespaced,
    shortname = "esconfig"
)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchConfigSpec {
    /// The cluster the operations are run against.
    #[serde(default)]
    pub elasticsearch_ref: ObjectSelector,

    /// Run in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<Operation>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Path and query of the request, for example `/_snapshot/my_repository`.
    pub url: String,

    /// JSON request body, sent as is.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
}

impl Operation {
    /// Resolves the URL against a cluster endpoint the way an HTTP client would.
    pub fn parse_url(&self) -> Result<Url, InvalidUrl> {
        ensure!(
            !self.url.chars().any(|c| c.is_ascii_control()),
            ControlCharacterSnafu
        );

        Url::parse(BASE_URL)
            .and_then(|base| base.join(&self.url))
            .context(ParseSnafu)
    }
}

impl Associated for ElasticsearchConfig {
    fn association_refs(&self) -> Vec<AssociationRef> {
        vec![AssociationRef::new(
            AssociationType::Elasticsearch,
            FieldPath::new("spec").child("elasticsearchRef"),
            &self.spec.elasticsearch_ref,
        )]
    }
}

impl Validate for ElasticsearchConfig {
    fn base_checks() -> &'static [Check<Self>] {
        &[
            rules::no_unknown_fields::<Self>,
            rules::name_length::<Self>,
            rules::associations::<Self>,
            check_operations,
        ]
    }

    fn open_api_schema() -> &'static JSONSchemaProps {
        static SCHEMA: LazyLock<JSONSchemaProps> = LazyLock::new(schema_of::<ElasticsearchConfig>);
        &SCHEMA
    }
}

/// URLs must parse and bodies, if any, must be JSON. What the requests do is
/// up to Elasticsearch.
fn check_operations(_ctx: &ValidationContext, config: &ElasticsearchConfig) -> ErrorList {
    let path = FieldPath::new("spec").child("operations");
    let mut errors = ErrorList::new();

    for (index, operation) in config.spec.operations.iter().enumerate() {
        if let Err(err) = operation.parse_url() {
            errors.push(FieldError::invalid(
                path.index(index),
                &operation.url,
                format!("url is invalid: {err}"),
            ));
        }

        let body_error = match operation.body.as_str() {
            "" => None,
            body => serde_json::from_str::<serde_json::Value>(body).err(),
        };
        if let Some(err) = body_error {
            errors.push(FieldError::invalid(
                path.index(index),
                &operation.body,
                format!("body is invalid JSON: {err}"),
            ));
        }
    }

    errors
}
