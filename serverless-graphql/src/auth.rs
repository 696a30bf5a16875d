//! Authentication seam.
//!
//! An [`AuthResolver`] inspects the normalized request and yields an [`AuthPayload`] when the
//! caller presented credentials. [`HeaderAuthResolver`] covers the common case of an
//! `auth-provider` header paired with an `Authorization: <scheme> <token>` header and delegates
//! token verification to an [`AuthDecoder`].

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::json;
use tower::BoxError;

use crate::event::HostContext;
use crate::json_ext::Value;
use crate::request::Request;

pub(crate) const AUTH_PROVIDER_HEADER: &str = "auth-provider";
pub(crate) const AUTHORIZATION_HEADER: &str = "authorization";

/// What an authentication resolver learned about the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    /// The verified claims, as produced by the decoder.
    pub decoded: Value,
    /// The credentials as presented.
    pub raw: Value,
    /// The request the credentials came from.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_request: Option<Request>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthResolver: Send + Sync + 'static {
    /// Resolve the caller's credentials. `Ok(None)` means no credentials were presented.
    async fn resolve(
        &self,
        request: &Request,
        host: &HostContext,
    ) -> Result<Option<AuthPayload>, BoxError>;
}

/// A resolver for deployments without authentication: never yields a payload.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAuthentication;

#[async_trait]
impl AuthResolver for NoAuthentication {
    async fn resolve(
        &self,
        _request: &Request,
        _host: &HostContext,
    ) -> Result<Option<AuthPayload>, BoxError> {
        Ok(None)
    }
}

/// Verifies a bearer token for one auth provider.
#[async_trait]
pub trait AuthDecoder: Send + Sync + 'static {
    async fn decode(
        &self,
        token: &str,
        provider: &str,
        request: &Request,
    ) -> Result<Value, BoxError>;
}

/// Reads `auth-provider` and `Authorization` headers and hands the token to an [`AuthDecoder`].
///
/// Requests missing either header carry no credentials.
pub struct HeaderAuthResolver<D> {
    decoder: D,
}

impl<D: AuthDecoder> HeaderAuthResolver<D> {
    pub fn new(decoder: D) -> Self {
        Self { decoder }
    }
}

#[async_trait]
impl<D: AuthDecoder> AuthResolver for HeaderAuthResolver<D> {
    async fn resolve(
        &self,
        request: &Request,
        _host: &HostContext,
    ) -> Result<Option<AuthPayload>, BoxError> {
        let Some(provider) = request.header(AUTH_PROVIDER_HEADER) else {
            return Ok(None);
        };
        let Some(authorization) = request.header(AUTHORIZATION_HEADER) else {
            return Ok(None);
        };
        let Some((scheme, token)) = parse_authorization(authorization) else {
            tracing::debug!(
                provider,
                "authorization header is not formatted as '<scheme> <token>'"
            );
            return Ok(None);
        };

        let decoded = self.decoder.decode(token, provider, request).await?;
        Ok(Some(AuthPayload {
            decoded,
            raw: json!({
                "type": provider,
                "schema": scheme,
                "token": token,
            }),
            source_request: Some(request.clone()),
        }))
    }
}

fn parse_authorization(value: &str) -> Option<(&str, &str)> {
    let (scheme, token) = value.trim().split_once(char::is_whitespace)?;
    let token = token.trim();
    if scheme.is_empty() || token.is_empty() {
        return None;
    }
    Some((scheme, token))
}

/// Derives the current user from an [`AuthPayload`].
#[derive(Clone)]
pub struct CurrentUserMapper(
    Arc<dyn Fn(AuthPayload) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync>,
);

impl CurrentUserMapper {
    pub fn new<F, Fut>(mapper: F) -> Self
    where
        F: Fn(AuthPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        Self(Arc::new(move |payload| Box::pin(mapper(payload))))
    }

    pub(crate) async fn map(&self, payload: AuthPayload) -> Result<Value, BoxError> {
        (self.0)(payload).await
    }
}

impl std::fmt::Debug for CurrentUserMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentUserMapper").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct EchoDecoder;

    #[async_trait]
    impl AuthDecoder for EchoDecoder {
        async fn decode(
            &self,
            token: &str,
            provider: &str,
            _request: &Request,
        ) -> Result<Value, BoxError> {
            if token == "invalid" {
                return Err("token signature mismatch".into());
            }
            Ok(json!({ "sub": token, "iss": provider }))
        }
    }

    fn request_with(headers: &[(&str, &str)]) -> Request {
        Request {
            method: "POST".to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_headers_yield_no_payload() {
        let resolver = HeaderAuthResolver::new(EchoDecoder);
        let host = HostContext::default();

        for headers in [
            vec![],
            vec![("auth-provider", "custom")],
            vec![("authorization", "Bearer abc")],
            vec![("auth-provider", "custom"), ("authorization", "Bearer")],
        ] {
            let payload = resolver.resolve(&request_with(&headers), &host).await.unwrap();
            assert!(payload.is_none(), "{headers:?}");
        }
    }

    #[tokio::test]
    async fn token_is_decoded() {
        let resolver = HeaderAuthResolver::new(EchoDecoder);
        let request = request_with(&[("auth-provider", "custom"), ("authorization", "Bearer abc")]);

        let payload = resolver
            .resolve(&request, &HostContext::default())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(payload.decoded, json!({ "sub": "abc", "iss": "custom" }));
        assert_eq!(
            payload.raw,
            json!({ "type": "custom", "schema": "Bearer", "token": "abc" })
        );
        assert_eq!(payload.source_request, Some(request));
    }

    #[tokio::test]
    async fn decoder_failures_propagate() {
        let resolver = HeaderAuthResolver::new(EchoDecoder);
        let request =
            request_with(&[("auth-provider", "custom"), ("authorization", "Bearer invalid")]);

        assert!(resolver.resolve(&request, &HostContext::default()).await.is_err());
    }
}
