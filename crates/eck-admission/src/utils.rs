//! Schema helpers for free-form fields in the custom resources.
use schemars::{Schema, SchemaGenerator, json_schema};

/// Schema for fields which accept an arbitrary object, for example user
/// provided product configuration or pod templates. The API server keeps all
/// nested keys and the unknown field check does not descend into them.
pub fn raw_object_schema(_: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true,
    })
}

/// Like [`raw_object_schema`], for a list of arbitrary objects.
pub fn raw_object_list_schema(_: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "array",
        "items": {
            "type": "object",
            "x-kubernetes-preserve-unknown-fields": true,
        }
    })
}
