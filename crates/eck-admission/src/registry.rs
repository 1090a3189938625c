//! Maps the group, version and kind of an admission request to the custom
//! resource type validating it.
use kube::{
    Resource,
    core::{DynamicObject, GroupVersionKind},
};
use serde_json::Value;
use snafu::{ResultExt, Snafu};
use strum::IntoEnumIterator;

use crate::{
    crd::{
        agent::Agent, apm::ApmServer, autoops::AutoOpsAgentPolicy, beat::Beat,
        elasticsearch, elasticsearch_config::ElasticsearchConfig,
        enterprise_search::EnterpriseSearch, kibana::Kibana, logstash::Logstash,
        maps::ElasticMapsServer, package_registry::PackageRegistry,
    },
    validation::{Admission, Outcome, Validate, ValidationContext, validate},
};

#[derive(Debug, Snafu)]
pub enum DecodeError {
    #[snafu(display("failed to decode {kind} object"))]
    Decode {
        source: serde_json::Error,
        kind: Kind,
    },
}

/// Every served version of every validated kind. Each API version is
/// validated on its own, with its own list of checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum Kind {
    #[strum(to_string = "Agent.v1alpha1")]
    AgentV1alpha1,

    #[strum(to_string = "ApmServer.v1")]
    ApmServerV1,

    #[strum(to_string = "Beat.v1beta1")]
    BeatV1beta1,

    #[strum(to_string = "Elasticsearch.v1")]
    ElasticsearchV1,

    #[strum(to_string = "Elasticsearch.v1beta1")]
    ElasticsearchV1beta1,

    #[strum(to_string = "Kibana.v1")]
    KibanaV1,

    #[strum(to_string = "EnterpriseSearch.v1")]
    EnterpriseSearchV1,

    #[strum(to_string = "Logstash.v1alpha1")]
    LogstashV1alpha1,

    #[strum(to_string = "ElasticMapsServer.v1alpha1")]
    ElasticMapsServerV1alpha1,

    #[strum(to_string = "ElasticsearchConfig.v1alpha1")]
    ElasticsearchConfigV1alpha1,

    #[strum(to_string = "AutoOpsAgentPolicy.v1alpha1")]
    AutoOpsAgentPolicyV1alpha1,

    #[strum(to_string = "PackageRegistry.v1alpha1")]
    PackageRegistryV1alpha1,
}

impl Kind {
    /// Returns `None` for kinds the webhook does not know, which are
    /// admitted without validation.
    pub fn from_gvk(gvk: &GroupVersionKind) -> Option<Self> {
        Self::iter().find(|kind| &kind.gvk() == gvk)
    }

    pub fn gvk(self) -> GroupVersionKind {
        match self {
            Self::AgentV1alpha1 => gvk_of::<Agent>(),
            Self::ApmServerV1 => gvk_of::<ApmServer>(),
            Self::BeatV1beta1 => gvk_of::<Beat>(),
            Self::ElasticsearchV1 => gvk_of::<elasticsearch::v1::Elasticsearch>(),
            Self::ElasticsearchV1beta1 => gvk_of::<elasticsearch::v1beta1::Elasticsearch>(),
            Self::KibanaV1 => gvk_of::<Kibana>(),
            Self::EnterpriseSearchV1 => gvk_of::<EnterpriseSearch>(),
            Self::LogstashV1alpha1 => gvk_of::<Logstash>(),
            Self::ElasticMapsServerV1alpha1 => gvk_of::<ElasticMapsServer>(),
            Self::ElasticsearchConfigV1alpha1 => gvk_of::<ElasticsearchConfig>(),
            Self::AutoOpsAgentPolicyV1alpha1 => gvk_of::<AutoOpsAgentPolicy>(),
            Self::PackageRegistryV1alpha1 => gvk_of::<PackageRegistry>(),
        }
    }

    /// The HTTP path the kind is validated under, for example
    /// `/validate-agent-k8s-elastic-co-v1alpha1-agent`.
    pub fn webhook_path(self) -> String {
        let gvk = self.gvk();
        format!(
            "/validate-{group}-{version}-{kind}",
            group = gvk.group.replace('.', "-"),
            version = gvk.version,
            kind = gvk.kind.to_lowercase()
        )
    }

    /// Decodes the objects of `admission` into the typed resource of this
    /// kind and validates them.
    pub fn validate(
        self,
        ctx: &ValidationContext,
        admission: Admission<'_, DynamicObject>,
    ) -> Result<Outcome, DecodeError> {
        match self {
            Self::AgentV1alpha1 => validate_as::<Agent>(self, ctx, admission),
            Self::ApmServerV1 => validate_as::<ApmServer>(self, ctx, admission),
            Self::BeatV1beta1 => validate_as::<Beat>(self, ctx, admission),
            Self::ElasticsearchV1 => {
                validate_as::<elasticsearch::v1::Elasticsearch>(self, ctx, admission)
            }
            Self::ElasticsearchV1beta1 => {
                validate_as::<elasticsearch::v1beta1::Elasticsearch>(self, ctx, admission)
            }
            Self::KibanaV1 => validate_as::<Kibana>(self, ctx, admission),
            Self::EnterpriseSearchV1 => validate_as::<EnterpriseSearch>(self, ctx, admission),
            Self::LogstashV1alpha1 => validate_as::<Logstash>(self, ctx, admission),
            Self::ElasticMapsServerV1alpha1 => {
                validate_as::<ElasticMapsServer>(self, ctx, admission)
            }
            Self::ElasticsearchConfigV1alpha1 => {
                validate_as::<ElasticsearchConfig>(self, ctx, admission)
            }
            Self::AutoOpsAgentPolicyV1alpha1 => {
                validate_as::<AutoOpsAgentPolicy>(self, ctx, admission)
            }
            Self::PackageRegistryV1alpha1 => validate_as::<PackageRegistry>(self, ctx, admission),
        }
    }
}

fn gvk_of<R: Resource<DynamicType = ()>>() -> GroupVersionKind {
    GroupVersionKind::gvk(&R::group(&()), &R::version(&()), &R::kind(&()))
}

fn validate_as<R: Validate>(
    kind: Kind,
    ctx: &ValidationContext,
    admission: Admission<'_, DynamicObject>,
) -> Result<Outcome, DecodeError> {
    let outcome = match admission {
        Admission::Create(object) => {
            let new: R = decode(kind, object)?;
            validate(ctx, Admission::Create(&new))
        }
        Admission::Update { old, new } => {
            let old: R = decode(kind, old)?;
            let new: R = decode(kind, new)?;
            validate(ctx, Admission::Update {
                old: &old,
                new: &new,
            })
        }
        Admission::Delete => validate::<R>(ctx, Admission::Delete),
    };
    Ok(outcome)
}

/// Objects embedded in admission requests may lack their type information,
/// it is filled in from the kind.
fn decode<R: Validate>(kind: Kind, object: &DynamicObject) -> Result<R, DecodeError> {
    let mut value = serde_json::to_value(object).context(DecodeSnafu { kind })?;

    if let Value::Object(fields) = &mut value {
        fields
            .entry("apiVersion")
            .or_insert_with(|| R::api_version(&()).into());
        fields
            .entry("kind")
            .or_insert_with(|| R::kind(&()).into());
    }

    serde_json::from_value(value).context(DecodeSnafu { kind })
}
