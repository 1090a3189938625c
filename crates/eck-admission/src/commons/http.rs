use k8s_openapi::{api::core::v1::ServiceSpec, apimachinery::pkg::apis::meta::v1::ObjectMeta};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::commons::config::SecretRef;

/// HTTP layer settings of a product: the Service exposing it and TLS.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    #[serde(default)]
    pub service: ServiceTemplate,

    #[serde(default)]
    pub tls: TlsOptions,
}

impl HttpConfig {
    /// Returns `true` if nothing deviates from the defaults.
    pub fn is_zero(&self) -> bool {
        self == &Self::default()
    }
}

/// Template for the Service of a product. Name and namespace are managed by the
/// operator.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTemplate {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: ServiceSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_signed_certificate: Option<SelfSignedCertificate>,

    /// Secret holding `tls.crt`, `tls.key` and optionally `ca.crt`.
    #[serde(default)]
    pub certificate: SecretRef,
}

impl TlsOptions {
    pub fn enabled(&self) -> bool {
        self.self_signed_certificate
            .as_ref()
            .is_none_or(|certificate| !certificate.disabled)
            || self.certificate.is_defined()
    }

    /// SANs of the self-signed certificate, if any.
    pub fn subject_alt_names(&self) -> &[SubjectAlternativeName] {
        self.self_signed_certificate
            .as_ref()
            .map_or(&[][..], |certificate| certificate.subject_alt_names.as_slice())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfSignedCertificate {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subject_alt_names: Vec<SubjectAlternativeName>,

    #[serde(default)]
    pub disabled: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct SubjectAlternativeName {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dns: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip: String,
}
