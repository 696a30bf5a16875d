//! Health check
//!
//! Answers requests whose path ends with the configured suffix without touching the GraphQL
//! pipeline. An optional probe decides between pass and fail.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use http::StatusCode;
use serde::Serialize;
use tower::BoxError;

use crate::event::HostResponse;
use crate::event::LambdaEvent;
use crate::request::Request;

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum HealthStatus {
    Pass,
    Fail,
}

#[derive(Debug, Serialize)]
struct Health {
    status: HealthStatus,
}

/// Computes the CORS headers attached to responses the handler produces itself.
pub trait CorsHeaders: Send + Sync + 'static {
    fn headers(&self, request: &Request) -> Vec<(String, String)>;
}

type ProbeFn = dyn Fn(Request, LambdaEvent) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync;

/// A readiness probe: the check fails when it returns an error.
#[derive(Clone)]
pub struct HealthProbe(Arc<ProbeFn>);

impl HealthProbe {
    pub fn new<F, Fut>(probe: F) -> Self
    where
        F: Fn(Request, LambdaEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self(Arc::new(move |request, event| Box::pin(probe(request, event))))
    }
}

impl std::fmt::Debug for HealthProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthProbe").finish_non_exhaustive()
    }
}

pub fn is_health_check_request(path: &str, suffix: &str) -> bool {
    !suffix.is_empty() && path.ends_with(suffix)
}

pub async fn handle_health_check(
    request: &Request,
    event: &LambdaEvent,
    probe: Option<&HealthProbe>,
    cors: Option<&dyn CorsHeaders>,
) -> HostResponse {
    let outcome = match probe {
        Some(probe) => (probe.0)(request.clone(), event.clone()).await,
        None => Ok(()),
    };

    let (status_code, health) = match outcome {
        Ok(()) => (
            StatusCode::OK,
            Health {
                status: HealthStatus::Pass,
            },
        ),
        Err(error) => {
            tracing::warn!(%error, "health probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Health {
                    status: HealthStatus::Fail,
                },
            )
        }
    };

    let body = match serde_json::to_string(&health) {
        Ok(body) => body,
        Err(error) => {
            tracing::error!(%error, "cannot serialize health status");
            String::new()
        }
    };
    let response = HostResponse::new(status_code, body);
    match cors {
        Some(cors) => response.with_headers(cors.headers(request)),
        None => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AllowAll;

    impl CorsHeaders for AllowAll {
        fn headers(&self, _request: &Request) -> Vec<(String, String)> {
            vec![(
                "access-control-allow-origin".to_string(),
                "*".to_string(),
            )]
        }
    }

    #[test]
    fn matches_suffix() {
        assert!(is_health_check_request("/prod/graphql/health", "/health"));
        assert!(!is_health_check_request("/prod/graphql", "/health"));
        assert!(!is_health_check_request("/prod/graphql", ""));
    }

    #[tokio::test]
    async fn passes_without_probe() {
        let response =
            handle_health_check(&Request::default(), &LambdaEvent::default(), None, None).await;
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, r#"{"status":"pass"}"#);
    }

    #[tokio::test]
    async fn failing_probe_answers_503_with_cors() {
        let probe = HealthProbe::new(|_, _| async { Err::<(), BoxError>("db down".into()) });
        let response = handle_health_check(
            &Request::default(),
            &LambdaEvent::default(),
            Some(&probe),
            Some(&AllowAll),
        )
        .await;

        assert_eq!(response.status_code, 503);
        assert_eq!(response.body, r#"{"status":"fail"}"#);
        assert_eq!(
            response.headers.unwrap()["access-control-allow-origin"],
            "*"
        );
    }
}
