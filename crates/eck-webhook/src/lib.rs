//! The validating admission webhook server for Elastic Stack custom
//! resources.
//!
//! Every validated kind is served under its own path, for example
//! `/validate-kibana-k8s-elastic-co-v1-kibana`, which is what existing webhook
//! configurations point to. `/validate` accepts reviews of any kind. Both
//! dispatch on the kind carried by the review itself.
//!
//! The server speaks plain HTTP. TLS is terminated in front of it.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use eck_admission::validation::ValidationContext;
//! use eck_webhook::{WebhookServer, constants::DEFAULT_SOCKET_ADDR};
//!
//! # async fn run() -> Result<(), eck_webhook::WebhookError> {
//! let server = WebhookServer::new(DEFAULT_SOCKET_ADDR, Arc::new(ValidationContext::default()));
//! server.run().await
//! # }
//! ```
use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use eck_admission::{registry::Kind, review::review, validation::ValidationContext};
use kube::core::{
    DynamicObject,
    admission::{AdmissionRequest, AdmissionResponse, AdmissionReview},
};
use snafu::{ResultExt, Snafu};
use strum::IntoEnumIterator;
use tokio::{
    net::TcpListener,
    signal::unix::{SignalKind, signal},
};
use tower_http::trace::TraceLayer;

use crate::constants::{HEALTH_PATH, VALIDATE_PATH};

pub mod constants;
pub mod logging;
pub mod options;

pub use crate::options::Options;

/// A result type alias with the [`WebhookError`] type as the default error type.
pub type Result<T, E = WebhookError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum WebhookError {
    #[snafu(display("failed to bind TCP listener to {socket_addr}"))]
    BindTcpListener {
        source: std::io::Error,
        socket_addr: SocketAddr,
    },

    #[snafu(display("failed to create {signal} listener"))]
    CreateSignalListener {
        source: std::io::Error,
        signal: &'static str,
    },

    #[snafu(display("failed to run HTTP server"))]
    RunServer { source: std::io::Error },
}

/// Builds the router serving admission reviews and the health check.
pub fn router(ctx: Arc<ValidationContext>) -> Router {
    let validating = Kind::iter()
        .map(Kind::webhook_path)
        .chain([VALIDATE_PATH.to_owned()])
        .fold(Router::new(), |router, path| {
            router.route(&path, post(validate))
        })
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Not traced, it is polled by the kubelet.
    validating.route(HEALTH_PATH, get(|| async { "ok" }))
}

async fn validate(
    State(ctx): State<Arc<ValidationContext>>,
    Json(admission_review): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<DynamicObject> = match admission_review.try_into() {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(error = %err, "received admission review without request");
            return Json(
                AdmissionResponse::invalid(format!("failed to convert to request: {err}"))
                    .into_review(),
            );
        }
    };

    Json(review(&ctx, &request).into_review())
}

/// The webhook HTTP server.
pub struct WebhookServer {
    socket_addr: SocketAddr,
    router: Router,
}

impl WebhookServer {
    pub fn new(socket_addr: SocketAddr, ctx: Arc<ValidationContext>) -> Self {
        Self {
            socket_addr,
            router: router(ctx),
        }
    }

    /// Serves admission reviews until SIGINT or SIGTERM is received. Reviews
    /// in flight are completed before returning.
    pub async fn run(self) -> Result<()> {
        let mut sigint = signal(SignalKind::interrupt())
            .context(CreateSignalListenerSnafu { signal: "SIGINT" })?;
        let mut sigterm = signal(SignalKind::terminate())
            .context(CreateSignalListenerSnafu { signal: "SIGTERM" })?;

        let listener = TcpListener::bind(self.socket_addr)
            .await
            .context(BindTcpListenerSnafu {
                socket_addr: self.socket_addr,
            })?;
        tracing::info!(server.address = %self.socket_addr, "serving admission reviews");

        let shutdown = async move {
            tokio::select! {
                _ = sigint.recv() => tracing::debug!("received SIGINT"),
                _ = sigterm.recv() => tracing::debug!("received SIGTERM"),
            }
        };

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .context(RunServerSnafu)
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use std::io::Write;

    use eck_admission::supported_versions::SupportedVersions;
    use indoc::indoc;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    fn admission_review(kind: (&str, &str, &str), spec: &Value) -> Value {
        let (group, version, kind) = kind;
        json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "0df28fbd-5f5f-11e8-bc74-36e6bb280816",
                "kind": {"group": group, "version": version, "kind": kind},
                "resource": {"group": group, "version": version, "resource": format!("{}s", kind.to_lowercase())},
                "name": "test",
                "namespace": "default",
                "operation": "CREATE",
                "userInfo": {},
                "object": {
                    "apiVersion": format!("{group}/{version}"),
                    "kind": kind,
                    "metadata": {"name": "test", "namespace": "default"},
                    "spec": spec,
                },
            }
        })
    }

    async fn post_review(path: &str, body: &Value) -> (StatusCode, Value) {
        post_review_with(Arc::default(), path, body).await
    }

    async fn post_review_with(
        ctx: Arc<ValidationContext>,
        path: &str,
        body: &Value,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("valid request");

        let response = router(ctx)
            .oneshot(request)
            .await
            .expect("infallible router");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");

        (status, serde_json::from_slice(&body).expect("JSON response"))
    }

    const KIBANA: (&str, &str, &str) = ("kibana.k8s.elastic.co", "v1", "Kibana");

    #[tokio::test]
    async fn health() {
        let request = Request::builder()
            .uri(HEALTH_PATH)
            .body(Body::empty())
            .expect("valid request");

        let response = router(Arc::default())
            .oneshot(request)
            .await
            .expect("infallible router");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn accepts_valid_resource() {
        let (status, body) = post_review(
            "/validate-kibana-k8s-elastic-co-v1-kibana",
            &admission_review(KIBANA, &json!({"version": "8.5.0"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"]["uid"], "0df28fbd-5f5f-11e8-bc74-36e6bb280816");
        assert_eq!(body["response"]["allowed"], true);
    }

    #[tokio::test]
    async fn rejects_invalid_resource() {
        let (status, body) = post_review(
            VALIDATE_PATH,
            &admission_review(KIBANA, &json!({"version": "8.5.0", "count": "three"})),
        )
        .await;

        // Admission webhooks answer with 200 and report the rejection in the
        // review.
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"]["allowed"], false);
        assert!(
            body["response"]["status"]["message"]
                .as_str()
                .is_some_and(|message| message.starts_with("failed to decode Kibana.v1 object")),
            "{body}"
        );
    }

    #[tokio::test]
    async fn rejects_with_field_causes() {
        let (_, body) = post_review(
            VALIDATE_PATH,
            &admission_review(KIBANA, &json!({"version": "6.0.0"})),
        )
        .await;

        let status = &body["response"]["status"];
        assert_eq!(body["response"]["allowed"], false);
        assert_eq!(status["reason"], "Invalid");
        assert_eq!(status["code"], 422);
        assert_eq!(status["details"]["causes"][0]["field"], "spec.version");
        assert_eq!(status["details"]["causes"][0]["reason"], "FieldValueInvalid");
    }

    #[tokio::test]
    async fn supported_versions_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temporary file");
        write!(file, "{}", indoc! {"
            products:
              kibana:
                min: 8.10.0
                max: 8.99.99
        "})
        .expect("writable file");
        let supported_versions =
            SupportedVersions::from_file(file.path()).expect("valid supported versions");

        let (_, body) = post_review_with(
            Arc::new(ValidationContext::new(supported_versions)),
            VALIDATE_PATH,
            &admission_review(KIBANA, &json!({"version": "8.5.0"})),
        )
        .await;

        assert_eq!(body["response"]["allowed"], false);
        assert_eq!(
            body["response"]["status"]["details"]["causes"][0]["message"],
            r#"Invalid value: "8.5.0": Unsupported version: version 8.5.0 is lower than the lowest supported version of 8.10.0"#
        );
    }

    #[tokio::test]
    async fn review_without_request() {
        let (status, body) = post_review(
            VALIDATE_PATH,
            &json!({"apiVersion": "admission.k8s.io/v1", "kind": "AdmissionReview"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"]["allowed"], false);
    }

    #[tokio::test]
    async fn unknown_path() {
        let request = Request::builder()
            .method("POST")
            .uri("/validate-unknown")
            .body(Body::empty())
            .expect("valid request");

        let response = router(Arc::default())
            .oneshot(request)
            .await
            .expect("infallible router");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
