use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// References a Secret in the namespace of the resource which holds the
/// configuration settings of the product.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_name: String,
}

/// A Secret whose entries are projected into the product's keystore or
/// filesystem.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSource {
    pub secret_name: String,

    /// Projects only the listed keys. All keys are projected when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<KeyToPath>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyToPath {
    pub key: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

/// A named reference to a Secret.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_name: String,
}

impl SecretRef {
    pub fn is_defined(&self) -> bool {
        !self.secret_name.is_empty()
    }
}
