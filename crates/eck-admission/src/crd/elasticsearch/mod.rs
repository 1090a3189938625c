//! Elasticsearch clusters, served as `v1` and the legacy `v1beta1`.
//!
//! Elasticsearch predates the checks shared by the other kinds and keeps most
//! of its own messages. Both versions share the helpers in this module.
use std::{net::IpAddr, str::FromStr};

use eck_version::Version;
use itertools::Itertools;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, PodTemplateSpec};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::{OptionExt, Snafu};

use crate::{
    commons::http::HttpConfig,
    constants::NAME_MAX_LENGTH,
    field::{ErrorList, FieldError, FieldPath},
    names,
    quantity::Quantity,
    supported_versions::Product,
    utils::{raw_object_list_schema, raw_object_schema},
    validation::{ValidationContext, rules},
};

pub mod v1;
pub mod v1beta1;

pub const CONFIG_INVALID_MSG: &str = "Configuration invalid";
pub const DUPLICATE_NODE_SETS_MSG: &str = "NodeSet names must be unique";
pub const INVALID_NAMES_MSG: &str =
    "Elasticsearch configuration would generate resources with invalid names";
pub const INVALID_SAN_IP_MSG: &str = "Invalid SAN IP address. Must be a valid IPv4 address";
pub const MASTER_REQUIRED_MSG: &str = "Elasticsearch needs to have at least one master node";
pub const NODE_ROLES_IN_OLD_VERSION_MSG: &str =
    "node.roles setting is not available in this version of Elasticsearch";
pub const PARSE_STORED_VERSION_MSG: &str = "Cannot parse current Elasticsearch version. String format must be {major}.{minor}.{patch}[-{label}]";
pub const PARSE_VERSION_MSG: &str =
    "Cannot parse Elasticsearch version. String format must be {major}.{minor}.{patch}[-{label}]";
pub const UNSUPPORTED_UPGRADE_MSG: &str = "Unsupported version upgrade path. Check the Elasticsearch documentation for supported upgrade paths.";
pub const UNSUPPORTED_VERSION_MSG: &str = "Unsupported version";

/// First version accepting `node.roles`.
const NODE_ROLES_MIN_VERSION: Version = Version::new(7, 9, 0);

/// Role settings superseded by `node.roles`, in the order they are reported.
const LEGACY_ROLE_SETTINGS: [&str; 7] = [
    "node.data",
    "node.ingest",
    "node.master",
    "node.ml",
    "node.remote_cluster_client",
    "node.transform",
    "node.voting_only",
];

/// A group of Elasticsearch nodes sharing the same configuration.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSet {
    /// Used to derive the name of the StatefulSet running the nodes.
    pub name: String,

    /// Elasticsearch settings of the nodes, as in `elasticsearch.yml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub config: Option<Value>,

    #[serde(default)]
    pub count: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "raw_object_schema")]
    pub pod_template: Option<PodTemplateSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "raw_object_list_schema")]
    pub volume_claim_templates: Vec<PersistentVolumeClaim>,
}

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum InvalidNodeConfig {
    #[snafu(display("configuration must be an object"))]
    NotAnObject,

    #[snafu(display("node.roles must be a list of role names"))]
    InvalidRoles,

    #[snafu(display("{setting} must be a boolean"))]
    InvalidRoleSetting { setting: &'static str },
}

/// The role related settings of a node set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeRoles {
    /// `node.roles`, if set.
    pub roles: Option<Vec<String>>,

    /// Legacy role settings which are set, with their value.
    pub legacy: Vec<(&'static str, bool)>,
}

impl NodeRoles {
    /// Reads the role settings from a node set configuration. Settings may be
    /// nested (`node: {master: true}`) or dotted (`node.master: true`).
    pub fn from_config(config: Option<&Value>) -> Result<Self, InvalidNodeConfig> {
        let settings = match config {
            None | Some(Value::Null) => return Ok(Self::default()),
            Some(config) => config.as_object().context(NotAnObjectSnafu)?,
        };

        let roles = setting(settings, "node.roles")
            .map(|roles| {
                roles
                    .as_array()
                    .context(InvalidRolesSnafu)?
                    .iter()
                    .map(|role| role.as_str().map(str::to_owned).context(InvalidRolesSnafu))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let legacy = LEGACY_ROLE_SETTINGS
            .iter()
            .filter_map(|name| setting(settings, name).map(|value| (*name, value)))
            .map(|(name, value)| {
                as_bool(value)
                    .map(|enabled| (name, enabled))
                    .context(InvalidRoleSettingSnafu { setting: name })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { roles, legacy })
    }

    fn legacy_setting(&self, name: &str) -> Option<bool> {
        self.legacy
            .iter()
            .find(|(setting, _)| *setting == name)
            .map(|(_, enabled)| *enabled)
    }

    fn has_role(&self, role: &str) -> bool {
        self.roles
            .as_ref()
            .is_some_and(|roles| roles.iter().any(|configured| configured == role))
    }

    /// Whether `node.master` is set or defaulted to `true`.
    pub fn master_setting(&self) -> bool {
        self.legacy_setting("node.master").unwrap_or(true)
    }

    /// Whether the nodes can be elected master. Voting-only nodes cannot.
    pub fn is_master_eligible(&self) -> bool {
        match &self.roles {
            Some(_) => self.has_role("master") && !self.has_role("voting_only"),
            None => {
                self.master_setting() && !self.legacy_setting("node.voting_only").unwrap_or(false)
            }
        }
    }
}

/// Looks up a dotted setting, following any mix of nested and dotted keys.
fn setting<'a>(settings: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    settings.iter().find_map(|(name, value)| {
        if name == key {
            return Some(value);
        }
        let rest = key.strip_prefix(name.as_str())?.strip_prefix('.')?;
        setting(value.as_object()?, rest)
    })
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(enabled) => Some(*enabled),
        Value::String(enabled) => enabled.parse().ok(),
        _ => None,
    }
}

pub fn version_path() -> FieldPath {
    FieldPath::new("spec").child("version")
}

pub fn node_sets_path() -> FieldPath {
    FieldPath::new("spec").child("nodeSets")
}

pub fn parse_version(version: &str) -> Result<Version, FieldError> {
    Version::from_str(version)
        .map_err(|_| FieldError::invalid(version_path(), version, PARSE_VERSION_MSG))
}

/// `metadata.name` is short enough and every StatefulSet name derived from it
/// is a valid DNS label.
pub fn valid_name<'a>(name: &str, node_sets: impl IntoIterator<Item = &'a NodeSet>) -> ErrorList {
    match validate_names(name, node_sets) {
        Ok(()) => ErrorList::new(),
        Err(reason) => vec![FieldError::invalid(
            FieldPath::new("metadata").child("name"),
            name,
            format!("{INVALID_NAMES_MSG}: {reason}"),
        )],
    }
}

fn validate_names<'a>(
    name: &str,
    node_sets: impl IntoIterator<Item = &'a NodeSet>,
) -> Result<(), String> {
    if name.len() > NAME_MAX_LENGTH {
        return Err(format!(
            "name exceeds maximum allowed length of {NAME_MAX_LENGTH}"
        ));
    }

    for node_set in node_sets {
        if let Err(errors) = names::is_dns_1123_subdomain(&node_set.name) {
            return Err(format!(
                "invalid nodeSet name '{node_set}': [{errors}]",
                node_set = node_set.name
            ));
        }

        let stateful_set = stateful_set_name(name, &node_set.name);
        if let Err(errors) = names::is_dns_1123_label(&stateful_set) {
            return Err(format!(
                "derived resource name '{stateful_set}' would be invalid: [{errors}]"
            ));
        }
    }

    Ok(())
}

/// Name of the StatefulSet running a node set.
pub fn stateful_set_name(cluster: &str, node_set: &str) -> String {
    format!("{cluster}-es-{node_set}")
}

pub fn supported_version(ctx: &ValidationContext, version: &str) -> ErrorList {
    let parsed = match parse_version(version) {
        Ok(parsed) => parsed,
        Err(err) => return vec![err],
    };

    match ctx
        .supported_versions
        .check(Product::Elasticsearch, &parsed)
    {
        Ok(()) => ErrorList::new(),
        Err(err) => vec![FieldError::invalid(
            version_path(),
            version,
            format!("{UNSUPPORTED_VERSION_MSG}: {err}"),
        )],
    }
}

/// Every subject alternative name IP of the self-signed certificate parses.
pub fn valid_san_ips(http: &HttpConfig) -> ErrorList {
    let path = FieldPath::new("spec")
        .child("http")
        .child("tls")
        .child("selfSignedCertificate")
        .child("subjectAltNames");

    http.tls
        .subject_alt_names()
        .iter()
        .filter(|san| !san.ip.is_empty() && IpAddr::from_str(&san.ip).is_err())
        .map(|san| FieldError::invalid(path.clone(), &san.ip, INVALID_SAN_IP_MSG))
        .collect()
}

pub fn unique_node_set_names<'a>(node_sets: impl IntoIterator<Item = &'a NodeSet>) -> ErrorList {
    node_sets
        .into_iter()
        .map(|node_set| node_set.name.as_str())
        .duplicates()
        .map(|name| FieldError::invalid(node_sets_path(), name, DUPLICATE_NODE_SETS_MSG))
        .collect()
}

/// Whether a volume claim template can be updated from `old` to `new`: only
/// the storage request may change, and only grow.
pub fn claim_expanded_only(old: &PersistentVolumeClaim, new: &PersistentVolumeClaim) -> bool {
    let grown = match (storage_request(old), storage_request(new)) {
        (None, None) => true,
        (Some(old), Some(new)) => match (Quantity::try_from(old), Quantity::try_from(new)) {
            (Ok(old), Ok(new)) => new.as_base_units() >= old.as_base_units(),
            _ => old == new,
        },
        _ => false,
    };

    grown
        && rules::normalized_claims(&[without_storage_request(old)])
            == rules::normalized_claims(&[without_storage_request(new)])
}

/// Whether all templates were kept and at most expanded.
pub fn claims_expanded_only(old: &[PersistentVolumeClaim], new: &[PersistentVolumeClaim]) -> bool {
    old.len() == new.len()
        && new.iter().all(|claim| {
            old.iter()
                .find(|previous| previous.metadata.name == claim.metadata.name)
                .is_some_and(|previous| claim_expanded_only(previous, claim))
        })
}

fn storage_request(
    claim: &PersistentVolumeClaim,
) -> Option<&k8s_openapi::apimachinery::pkg::api::resource::Quantity> {
    claim
        .spec
        .as_ref()?
        .resources
        .as_ref()?
        .requests
        .as_ref()?
        .get("storage")
}

fn without_storage_request(claim: &PersistentVolumeClaim) -> PersistentVolumeClaim {
    let mut claim = claim.clone();
    if let Some(requests) = claim
        .spec
        .as_mut()
        .and_then(|spec| spec.resources.as_mut())
        .and_then(|resources| resources.requests.as_mut())
    {
        requests.remove("storage");
    }
    claim
}

/// Pairs each node set of `new` with the node set of the same name in `old`.
/// Node sets new in `new` are skipped.
pub fn matching_node_sets<'a>(
    old: &'a [NodeSet],
    new: &'a [NodeSet],
) -> impl Iterator<Item = (usize, &'a NodeSet, &'a NodeSet)> {
    new.iter().enumerate().filter_map(|(index, node_set)| {
        old.iter()
            .find(|previous| previous.name == node_set.name)
            .map(|previous| (index, previous, node_set))
    })
}

/// Checks that `node.roles` is only used by versions supporting it and not
/// mixed with the legacy role settings.
pub fn node_roles_error(
    path: &FieldPath,
    config: Option<&Value>,
    roles: &NodeRoles,
    version: &Version,
) -> Option<FieldError> {
    if roles.roles.is_some() && version < &NODE_ROLES_MIN_VERSION {
        return Some(FieldError::invalid(
            path.clone(),
            config,
            NODE_ROLES_IN_OLD_VERSION_MSG,
        ));
    }

    let mixed = roles.roles.as_ref().is_some_and(|roles| !roles.is_empty()) && !roles.legacy.is_empty();
    mixed.then(|| {
        let settings = roles.legacy.iter().map(|(name, _)| *name).join(",");
        FieldError::forbidden(
            path.clone(),
            format!("Detected a combination of node.roles and {settings}. Use only node.roles"),
        )
    })
}
