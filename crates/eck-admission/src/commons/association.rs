//! Associations link one Elastic resource to another, for example a Kibana to
//! the Elasticsearch cluster it stores its data in.
//!
//! Controllers persist the connection details of an association as a JSON
//! [`AssociationConf`] in an annotation on the associated resource. The
//! annotation name is derived from the [`ObjectSelector`] of the reference
//! with a 32-bit FNV-1a hash. Existing resources carry these annotations, so
//! the naming scheme must never change.
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::{commons::selector::ObjectSelector, field::FieldPath};

/// Prefix shared by all association annotations.
pub const ASSOCIATION_ANNOTATION_PREFIX: &str = "association.k8s.elastic.co/";

/// Suffix appended to the annotation name of stack monitoring references.
pub const MONITORING_SUFFIX: &str = "-sm";

/// `authSecretName` value telling that the referenced resource does not
/// require authentication.
pub const NO_AUTH_REQUIRED: &str = "-";

/// Upper bound of the name segment of an annotation key (after the `/`).
pub const ANNOTATION_NAME_MAX_LENGTH: usize = 63;

/// Upper bound of the prefix segment of an annotation key (before the `/`).
pub const ANNOTATION_PREFIX_MAX_LENGTH: usize = 253;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

#[derive(Debug, Snafu)]
pub enum ReadAssociationConfError {
    #[snafu(display("failed to decode the association configuration from annotation {annotation:?}"))]
    DecodeAnnotation {
        source: serde_json::Error,
        annotation: String,
    },
}

/// The type of the resource on the other end of an association.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum AssociationType {
    #[strum(to_string = "elasticsearch")]
    Elasticsearch,

    #[strum(to_string = "kibana")]
    Kibana,

    #[strum(to_string = "ent")]
    EnterpriseSearch,

    #[strum(to_string = "fleet-server")]
    FleetServer,

    #[strum(to_string = "package-registry")]
    PackageRegistry,
}

impl AssociationType {
    /// The annotation name used when a resource has a single association of
    /// this type, for example `association.k8s.elastic.co/es-conf`.
    pub fn annotation_base(self) -> String {
        let short = match self {
            Self::Elasticsearch => "es",
            Self::Kibana => "kb",
            Self::EnterpriseSearch => "ent",
            Self::FleetServer => "fs",
            Self::PackageRegistry => "epr",
        };
        format!("{ASSOCIATION_ANNOTATION_PREFIX}{short}-conf")
    }
}

/// 32-bit FNV-1a over `bytes`.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Hashes the four fields of a selector in declaration order.
pub fn selector_hash(selector: &ObjectSelector) -> u32 {
    let concatenated = [
        selector.namespace.as_str(),
        selector.name.as_str(),
        selector.service_name.as_str(),
        selector.secret_name.as_str(),
    ]
    .concat();

    fnv1a_32(concatenated.as_bytes())
}

/// `<base>-<fnv1a_32(selector)>`, the annotation name of one of several
/// associations of the same type.
pub fn annotation_key(base: &str, selector: &ObjectSelector) -> String {
    format!("{base}-{hash}", hash = selector_hash(selector))
}

/// Annotation name of a stack monitoring reference, which always points to an
/// Elasticsearch cluster.
pub fn monitoring_annotation_key(selector: &ObjectSelector) -> String {
    format!(
        "{key}{MONITORING_SUFFIX}",
        key = annotation_key(&AssociationType::Elasticsearch.annotation_base(), selector)
    )
}

/// A reference declared in the spec of a resource, together with where it is
/// declared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssociationRef {
    pub association_type: AssociationType,
    pub path: FieldPath,
    pub selector: ObjectSelector,

    /// `true` if the resource can only have one association of this type, in
    /// which case the annotation name does not carry a hash.
    pub singleton: bool,
    pub monitoring: bool,
}

impl AssociationRef {
    pub fn new(association_type: AssociationType, path: FieldPath, selector: &ObjectSelector) -> Self {
        Self {
            association_type,
            path,
            selector: selector.clone(),
            singleton: true,
            monitoring: false,
        }
    }

    /// One of several references of the same type.
    pub fn multi(mut self) -> Self {
        self.singleton = false;
        self
    }

    /// A stack monitoring reference.
    pub fn monitoring(mut self) -> Self {
        self.singleton = false;
        self.monitoring = true;
        self
    }

    /// The name of the annotation the association configuration is stored
    /// under. `namespace` is the namespace of the referencing resource.
    pub fn annotation_name(&self, namespace: &str) -> String {
        let selector = self.selector.with_default_namespace(namespace);
        if self.monitoring {
            monitoring_annotation_key(&selector)
        } else if self.singleton {
            self.association_type.annotation_base()
        } else {
            annotation_key(&self.association_type.annotation_base(), &selector)
        }
    }
}

/// Implemented by resources which reference other resources.
pub trait Associated {
    /// All references in the spec, in declaration order. Unset references are
    /// included so that their shape can be validated.
    fn association_refs(&self) -> Vec<AssociationRef>;
}

/// How to reach the resource on the other end of an association.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssociationConf {
    pub auth_secret_name: String,
    pub auth_secret_key: String,
    pub is_service_account: bool,
    pub ca_cert_provided: bool,
    pub ca_secret_name: String,
    pub url: String,
    pub version: String,
}

impl AssociationConf {
    /// Reads the configuration stored in the annotation `key`. A missing or
    /// empty annotation is `None`.
    pub fn read(
        annotations: &BTreeMap<String, String>,
        key: &str,
    ) -> Result<Option<Self>, ReadAssociationConfError> {
        match annotations.get(key) {
            None => Ok(None),
            Some(serialized) if serialized.is_empty() => Ok(None),
            Some(serialized) => serde_json::from_str(serialized)
                .map(Some)
                .context(DecodeAnnotationSnafu { annotation: key }),
        }
    }

    pub fn no_auth_required(&self) -> bool {
        self.auth_secret_name == NO_AUTH_REQUIRED
    }

    pub fn auth_is_configured(&self) -> bool {
        self.no_auth_required()
            || (!self.auth_secret_name.is_empty() && !self.auth_secret_key.is_empty())
    }

    pub fn ca_is_configured(&self) -> bool {
        !self.ca_cert_provided || !self.ca_secret_name.is_empty()
    }

    /// An association is usable once the URL and the credentials are known,
    /// and the CA if the remote end uses a custom one.
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && self.auth_is_configured() && self.ca_is_configured()
    }
}

/// Memoizes decoded [`AssociationConf`]s of a single resource, keyed by
/// reference.
///
/// Entries are never invalidated individually: owners call
/// [`AssociationConfCache::clear`] whenever the parent resource changes.
#[derive(Clone, Debug, Default)]
pub struct AssociationConfCache {
    confs: HashMap<ObjectSelector, AssociationConf>,
}

impl AssociationConfCache {
    /// Returns the cached configuration of `selector`, falling back to the
    /// annotation `key` and caching what it holds.
    pub fn get_or_load(
        &mut self,
        annotations: &BTreeMap<String, String>,
        key: &str,
        selector: &ObjectSelector,
    ) -> Result<Option<AssociationConf>, ReadAssociationConfError> {
        if let Some(conf) = self.confs.get(selector) {
            return Ok(Some(conf.clone()));
        }

        let conf = AssociationConf::read(annotations, key)?;
        if let Some(conf) = &conf {
            tracing::trace!(
                association.id = selector.association_id(),
                annotation = key,
                "caching association configuration"
            );
            self.confs.insert(selector.clone(), conf.clone());
        }

        Ok(conf)
    }

    pub fn set(&mut self, selector: ObjectSelector, conf: AssociationConf) {
        self.confs.insert(selector, conf);
    }

    pub fn clear(&mut self) {
        self.confs.clear();
    }

    pub fn len(&self) -> usize {
        self.confs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.confs.is_empty()
    }
}
