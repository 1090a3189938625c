use std::fmt::Display;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::{Snafu, ensure};

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum InvalidSelector {
    #[snafu(display("specify name or secretName, not both"))]
    NameAndSecretName,

    #[snafu(display(
        "serviceName or namespace can only be used in combination with name, not with secretName"
    ))]
    SecretNameWithNameOnlyFields,

    #[snafu(display("serviceName can only be used in combination with name"))]
    ServiceNameWithoutName,

    #[snafu(display("namespace can only be used in combination with name"))]
    NamespaceWithoutName,
}

/// A reference to another Elastic resource.
///
/// The reference either points to a resource managed by the operator (by
/// `name`, with an optional `namespace` and `serviceName`), or to a Secret
/// describing an external resource (by `secretName`). An empty selector means
/// the reference is unset.
#[derive(
    Clone, Debug, Default, Deserialize, Eq, Hash, JsonSchema, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSelector {
    /// Namespace of the referenced object. If empty, defaults to the namespace of the referencing object.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Name of an existing object corresponding to an Elastic resource managed by the operator.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Name of an existing Service used to reach the referenced object. Defaults to its HTTP service.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_name: String,

    /// Name of a Secret containing the connection information of an Elastic resource not managed
    /// by the operator. Cannot be combined with `name`, `namespace` or `serviceName`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_name: String,
}

impl ObjectSelector {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn secret(secret_name: impl Into<String>) -> Self {
        Self {
            secret_name: secret_name.into(),
            ..Self::default()
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_service(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    /// Returns `true` if no field is set at all.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Returns `true` if the selector has a name or a secret name. The namespace
    /// is not required as it can be inherited from the referencing object.
    pub fn is_defined(&self) -> bool {
        !self.name_or_secret_name().is_empty()
    }

    /// Returns `true` if the selector references a Secret describing an
    /// external resource not managed by the operator.
    pub fn is_external(&self) -> bool {
        self.is_defined() && !self.secret_name.is_empty()
    }

    pub fn is_valid(&self) -> Result<(), InvalidSelector> {
        ensure!(
            self.name.is_empty() || self.secret_name.is_empty(),
            NameAndSecretNameSnafu
        );
        ensure!(
            self.secret_name.is_empty()
                || (self.service_name.is_empty() && self.namespace.is_empty()),
            SecretNameWithNameOnlyFieldsSnafu
        );
        ensure!(
            !self.name.is_empty() || self.service_name.is_empty(),
            ServiceNameWithoutNameSnafu
        );
        ensure!(
            !self.name.is_empty() || self.namespace.is_empty(),
            NamespaceWithoutNameSnafu
        );

        Ok(())
    }

    /// Name and secret name are mutually exclusive, this returns whichever is set.
    pub fn name_or_secret_name(&self) -> &str {
        if self.secret_name.is_empty() {
            &self.name
        } else {
            &self.secret_name
        }
    }

    /// Fills in `namespace` if it is empty and the selector does not point to a
    /// Secret.
    pub fn with_default_namespace(&self, namespace: &str) -> Self {
        let mut selector = self.clone();
        if selector.namespace.is_empty() && selector.secret_name.is_empty() {
            selector.namespace = namespace.to_owned();
        }
        selector
    }

    /// A namespace qualified identifier, `<namespace>-<name>` or just `<name>`.
    pub fn to_id(&self) -> String {
        if self.namespace.is_empty() {
            self.name_or_secret_name().to_owned()
        } else {
            format!(
                "{namespace}-{name}",
                namespace = self.namespace,
                name = self.name_or_secret_name()
            )
        }
    }

    /// Identifier used in logs and user facing messages, `<namespace>/<name>`.
    pub fn association_id(&self) -> String {
        self.to_string()
    }
}

impl Display for ObjectSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{namespace}/{name}",
            namespace = self.namespace,
            name = self.name_or_secret_name()
        )
    }
}
