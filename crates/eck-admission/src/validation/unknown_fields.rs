//! Detects fields the user applied which are not part of the schema of a
//! kind.
//!
//! The API server silently prunes unknown fields, so a typo in a spec would
//! go unnoticed. When the object was created with `kubectl apply` the
//! annotation holding the last applied configuration still contains them:
//! its keys are compared against the OpenAPI schema of the kind. Schemas
//! without properties or marked `x-kubernetes-preserve-unknown-fields`
//! accept anything below them.
use std::collections::BTreeMap;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    JSONSchemaProps, JSONSchemaPropsOrArray, JSONSchemaPropsOrBool,
};
use serde_json::Value;

use crate::{
    constants::LAST_APPLIED_CONFIGURATION_ANNOTATION,
    field::{ErrorList, FieldError, FieldPath},
};

/// Top-level keys every object may carry, whatever its schema says.
const OBJECT_KEYS: [&str; 3] = ["apiVersion", "kind", "metadata"];

const UNKNOWN_FIELD_DETAIL: &str = "unknown field found in the kubectl.kubernetes.io/last-applied-configuration annotation is unknown";

/// Returns one error per unknown field in the last applied configuration.
/// Objects without the annotation are not checked.
pub fn check(annotations: &BTreeMap<String, String>, schema: &JSONSchemaProps) -> ErrorList {
    let Some(last_applied) = annotations.get(LAST_APPLIED_CONFIGURATION_ANNOTATION) else {
        return ErrorList::new();
    };

    let value = match serde_json::from_str::<Value>(last_applied) {
        Ok(value) => value,
        Err(err) => {
            return vec![FieldError::internal(
                FieldPath::new("metadata")
                    .child("annotations")
                    .key(LAST_APPLIED_CONFIGURATION_ANNOTATION),
                format!("failed to decode the last applied configuration: {err}"),
            )];
        }
    };

    let mut errors = ErrorList::new();
    let Value::Object(object) = &value else {
        return errors;
    };

    if preserves_unknown_fields(schema) {
        return errors;
    }

    let properties = schema.properties.as_ref();
    for (key, value) in object {
        let path = FieldPath::new(key);
        match properties.and_then(|properties| properties.get(key)) {
            Some(property) => walk(value, property, &path, &mut errors),
            None if OBJECT_KEYS.contains(&key.as_str()) => {}
            None if properties.is_none() => {}
            None => errors.push(unknown_field(path, key)),
        }
    }

    if !errors.is_empty() {
        tracing::debug!(
            unknown_fields = errors.len(),
            "found unknown fields in the last applied configuration"
        );
    }

    errors
}

fn walk(value: &Value, schema: &JSONSchemaProps, path: &FieldPath, errors: &mut ErrorList) {
    if preserves_unknown_fields(schema) {
        return;
    }

    match value {
        Value::Object(object) => {
            let properties = schema.properties.as_ref().filter(|p| !p.is_empty());
            let additional = match &schema.additional_properties {
                Some(JSONSchemaPropsOrBool::Schema(additional)) => Some(additional.as_ref()),
                _ => None,
            };
            let allows_additional = matches!(
                schema.additional_properties,
                Some(JSONSchemaPropsOrBool::Bool(true))
            );

            if properties.is_none() && additional.is_none() {
                return;
            }

            for (key, value) in object {
                let child = path.child(key);
                match (properties.and_then(|p| p.get(key)), additional) {
                    (Some(property), _) => walk(value, property, &child, errors),
                    (None, Some(additional)) => walk(value, additional, &path.key(key), errors),
                    (None, None) if allows_additional => {}
                    (None, None) => errors.push(unknown_field(child, key)),
                }
            }
        }
        Value::Array(items) => {
            if let Some(JSONSchemaPropsOrArray::Schema(item_schema)) = &schema.items {
                for (index, item) in items.iter().enumerate() {
                    walk(item, item_schema, &path.index(index), errors);
                }
            }
        }
        _ => {}
    }
}

fn preserves_unknown_fields(schema: &JSONSchemaProps) -> bool {
    schema.x_kubernetes_preserve_unknown_fields == Some(true)
}

fn unknown_field(path: FieldPath, key: &str) -> FieldError {
    FieldError::invalid(path, key, UNKNOWN_FIELD_DETAIL)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    fn schema() -> JSONSchemaProps {
        serde_yaml::from_str(indoc! {"
            type: object
            properties:
              spec:
                type: object
                properties:
                  version:
                    type: string
                  config:
                    type: object
                    x-kubernetes-preserve-unknown-fields: true
                  nodeSets:
                    type: array
                    items:
                      type: object
                      properties:
                        name:
                          type: string
                        count:
                          type: integer
                  labels:
                    type: object
                    additionalProperties:
                      type: string
                  selector:
                    type: object
              status:
                type: object
                properties:
                  phase:
                    type: string
        "})
        .expect("valid schema")
    }

    fn last_applied(json: &str) -> BTreeMap<String, String> {
        BTreeMap::from([(
            LAST_APPLIED_CONFIGURATION_ANNOTATION.to_owned(),
            json.to_owned(),
        )])
    }

    #[test]
    fn no_annotation() {
        assert!(check(&BTreeMap::new(), &schema()).is_empty());
    }

    #[test]
    fn known_fields() {
        let annotations = last_applied(
            r#"{
                "apiVersion": "elasticsearch.k8s.elastic.co/v1",
                "kind": "Elasticsearch",
                "metadata": {"name": "es", "labels": {"a": "b"}},
                "spec": {
                    "version": "8.0.0",
                    "config": {"anything": {"goes": true}},
                    "nodeSets": [{"name": "default", "count": 3}],
                    "labels": {"free": "form"},
                    "selector": {"unstructured": 1}
                }
            }"#,
        );
        assert_eq!(check(&annotations, &schema()), ErrorList::new());
    }

    #[test]
    fn unknown_fields_report_their_path() {
        let annotations = last_applied(
            r#"{
                "spek": {},
                "spec": {
                    "versoin": "8.0.0",
                    "nodeSets": [{"name": "default"}, {"name": "hot", "cuont": 3}]
                }
            }"#,
        );
        let errors = check(&annotations, &schema());
        let mut paths: Vec<String> = errors.iter().map(|error| error.path.to_string()).collect();
        paths.sort();

        assert_eq!(paths, ["spec.nodeSets[1].cuont", "spec.versoin", "spek"]);
        let spek = errors
            .iter()
            .find(|error| error.path == FieldPath::new("spek"))
            .expect("unknown top-level field");
        assert_eq!(
            spek.to_string(),
            r#"spek: Invalid value: "spek": unknown field found in the kubectl.kubernetes.io/last-applied-configuration annotation is unknown"#
        );
    }

    #[test]
    fn schema_without_properties_accepts_everything() {
        let annotations = last_applied(r#"{"spec": {"whatever": 1}}"#);
        assert!(check(&annotations, &JSONSchemaProps::default()).is_empty());
    }

    #[test]
    fn malformed_annotation() {
        let errors = check(&last_applied("{"), &schema());

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_type, crate::field::ErrorType::InternalError);
    }
}
