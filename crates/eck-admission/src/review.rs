//! Turns Kubernetes admission requests into admission responses.
use kube::core::{
    DynamicObject, Status,
    admission::{AdmissionRequest, AdmissionResponse, Operation},
    response::{StatusCause, StatusDetails},
};
use tracing::instrument;

use crate::{
    registry::{DecodeError, Kind},
    validation::{Admission, InvalidResource, Outcome, ValidationContext},
};

/// HTTP status code of a rejected resource, like the API server uses for
/// its own validation errors.
pub const INVALID_STATUS_CODE: u16 = 422;

/// Reviews one admission request.
///
/// Requests for kinds the webhook does not know are admitted, so that a
/// broader webhook configuration than necessary never blocks unrelated
/// resources.
#[instrument(
    skip_all,
    fields(
        admission.uid = %request.uid,
        admission.operation = ?request.operation,
        k8s.object.kind = %request.kind.kind,
        k8s.object.name = %request.name,
    )
)]
pub fn review(ctx: &ValidationContext, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);

    let Some(kind) = Kind::from_gvk(&request.kind) else {
        tracing::debug!(
            k8s.object.group = %request.kind.group,
            k8s.object.version = %request.kind.version,
            "admitting unknown kind"
        );
        return response;
    };

    let admission = match (&request.operation, &request.object, &request.old_object) {
        (Operation::Delete | Operation::Connect, _, _) => return response,
        (Operation::Create, Some(object), _) => Admission::Create(object),
        (Operation::Update, Some(new), Some(old)) => Admission::Update { old, new },
        (Operation::Update, Some(_), None) => {
            return response.deny(format!("update of {kind} carries no old object"));
        }
        (Operation::Create | Operation::Update, None, _) => {
            return response.deny(format!("admission request for {kind} carries no object"));
        }
    };

    match kind.validate(ctx, admission) {
        Ok(Outcome::Accepted { warnings }) => {
            tracing::debug!(warning.count = warnings.len(), "admitted resource");
            accept(response, warnings)
        }
        Ok(Outcome::Rejected(invalid)) => {
            tracing::info!(error.count = invalid.errors.len(), "rejected invalid resource");
            reject(response, &invalid)
        }
        Err(DecodeError::Decode { source, kind }) => {
            tracing::warn!(error = %source, "failed to decode object");
            response.deny(format!("failed to decode {kind} object: {source}"))
        }
    }
}

fn accept(mut response: AdmissionResponse, warnings: Vec<String>) -> AdmissionResponse {
    if !warnings.is_empty() {
        response.warnings = Some(warnings);
    }
    response
}

fn reject(mut response: AdmissionResponse, invalid: &InvalidResource) -> AdmissionResponse {
    response.allowed = false;
    response.result = invalid_status(invalid);
    response
}

/// Builds the `Invalid` status the API server returns for resources failing
/// its own validation, one cause per field error.
pub fn invalid_status(invalid: &InvalidResource) -> Status {
    let causes = invalid
        .errors
        .iter()
        .map(|error| StatusCause {
            reason: error.error_type.cause_reason().to_owned(),
            message: error.body(),
            field: error.path.to_string(),
        })
        .collect();

    let mut status = Status::failure(&invalid.to_string(), "Invalid").with_code(INVALID_STATUS_CODE);
    status.details = Some(StatusDetails {
        name: invalid.name.clone(),
        group: invalid.group.clone(),
        kind: invalid.kind.clone(),
        uid: String::new(),
        causes,
        retry_after_seconds: 0,
    });
    status
}

#[cfg(test)]
mod tests {
    use kube::core::admission::AdmissionReview;
    use serde_json::{Value, json};

    use super::*;

    fn request(
        operation: &str,
        (group, version, kind): (&str, &str, &str),
        object: Option<Value>,
        old_object: Option<Value>,
    ) -> AdmissionRequest<DynamicObject> {
        let review: AdmissionReview<DynamicObject> = serde_json::from_value(json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "3fd1c7b1-8f0c-4a40-9cd5-4b3a5e7f0a11",
                "kind": {"group": group, "version": version, "kind": kind},
                "resource": {"group": group, "version": version, "resource": format!("{}s", kind.to_lowercase())},
                "name": "test",
                "namespace": "default",
                "operation": operation,
                "userInfo": {},
                "object": object,
                "oldObject": old_object,
                "dryRun": false,
            }
        }))
        .expect("valid admission review");

        review.try_into().expect("review carries a request")
    }

    fn kibana(version: &str) -> Value {
        json!({
            "apiVersion": "kibana.k8s.elastic.co/v1",
            "kind": "Kibana",
            "metadata": {"name": "test", "namespace": "default"},
            "spec": {"version": version},
        })
    }

    const KIBANA: (&str, &str, &str) = ("kibana.k8s.elastic.co", "v1", "Kibana");

    #[test]
    fn unknown_kinds_are_admitted() {
        let request = request(
            "CREATE",
            ("", "v1", "ConfigMap"),
            Some(json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "test"}})),
            None,
        );

        let response = review(&ValidationContext::default(), &request);
        assert!(response.allowed);
        assert_eq!(response.uid, request.uid);
    }

    #[test]
    fn deletes_are_admitted() {
        let request = request("DELETE", KIBANA, None, Some(kibana("1.0.0")));

        assert!(review(&ValidationContext::default(), &request).allowed);
    }

    #[test]
    fn accepted() {
        let request = request("CREATE", KIBANA, Some(kibana("8.5.0")), None);

        let response = review(&ValidationContext::default(), &request);
        assert!(response.allowed);
        assert_eq!(response.warnings, None);
    }

    #[test]
    fn accepted_with_warnings() {
        let request = request("CREATE", KIBANA, Some(kibana("7.10.0")), None);

        let response = review(&ValidationContext::default(), &request);
        assert!(response.allowed);
        assert_eq!(response.warnings.map(|warnings| warnings.len()), Some(1));
    }

    #[test]
    fn rejected_with_causes() {
        let request = request("UPDATE", KIBANA, Some(kibana("8.4.0")), Some(kibana("8.5.0")));

        let response = review(&ValidationContext::default(), &request);
        assert!(!response.allowed);
        assert_eq!(response.result.code, INVALID_STATUS_CODE);
        assert_eq!(response.result.reason, "Invalid");
        assert!(
            response
                .result
                .message
                .starts_with(r#"Kibana.kibana.k8s.elastic.co "test" is invalid: spec.version: "#),
            "{}",
            response.result.message
        );

        let details = response.result.details.expect("rejections carry details");
        assert_eq!(details.name, "test");
        assert_eq!(details.kind, "Kibana");
        assert_eq!(details.group, "kibana.k8s.elastic.co");
        assert_eq!(details.causes.len(), 1);
        assert_eq!(details.causes[0].field, "spec.version");
        assert_eq!(details.causes[0].reason, "FieldValueForbidden");
    }

    #[test]
    fn update_without_old_object_is_denied() {
        let request = request("UPDATE", KIBANA, Some(kibana("8.5.0")), None);

        let response = review(&ValidationContext::default(), &request);
        assert!(!response.allowed);
        assert_eq!(
            response.result.message,
            "update of Kibana.v1 carries no old object"
        );
    }

    #[test]
    fn undecodable_objects_are_denied() {
        let mut object = kibana("8.5.0");
        object["spec"]["count"] = json!("three");
        let request = request("CREATE", KIBANA, Some(object), None);

        let response = review(&ValidationContext::default(), &request);
        assert!(!response.allowed);
        assert!(
            response
                .result
                .message
                .starts_with("failed to decode Kibana.v1 object: "),
            "{}",
            response.result.message
        );
    }
}
