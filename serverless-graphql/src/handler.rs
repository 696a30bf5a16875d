//! The host entry point.

use std::any::Any;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::Poll;

use futures::FutureExt;
use futures::future::BoxFuture;
use http::StatusCode;
use tracing::Instrument;

use crate::configuration::ExceptionHook;
use crate::configuration::HandlerConfig;
use crate::context::scope::PropagationScope;
use crate::dispatcher::Dispatcher;
use crate::error::HandlerError;
use crate::event::HostContext;
use crate::event::HostResponse;
use crate::event::LambdaEvent;
use crate::health::CorsHeaders;
use crate::health::HealthProbe;
use crate::health::handle_health_check;
use crate::health::is_health_check_request;
use crate::request::Request;
use crate::response::EXECUTION_FAILED;
use crate::response::error_response;
use crate::response::to_host_response;

/// Handles HTTP-shaped function events with GraphQL.
///
/// Cloning a [`Handler`] is cheap; clones share the same configuration and pipeline.
#[derive(Clone)]
pub struct Handler {
    inner: Arc<Inner>,
}

struct Inner {
    dispatcher: Dispatcher,
    scope: PropagationScope,
    health_check_path: String,
    health_probe: Option<HealthProbe>,
    cors: Option<Arc<dyn CorsHeaders>>,
    on_exception: Option<ExceptionHook>,
}

impl Handler {
    pub fn new(config: HandlerConfig) -> Self {
        let scope = PropagationScope::new(config.settings.context_isolation);
        tracing::debug!(
            mode = ?config.settings.mode,
            isolation = ?scope.mode(),
            "building GraphQL handler"
        );
        Self {
            inner: Arc::new(Inner {
                dispatcher: Dispatcher::new(&config, scope),
                scope,
                health_check_path: config.settings.health_check_path.clone(),
                health_probe: config.health_probe,
                cors: config.cors,
                on_exception: config.on_exception,
            }),
        }
    }

    /// The propagation scope requests run in.
    pub fn scope(&self) -> PropagationScope {
        self.inner.scope
    }

    /// Handle one event. Resolves once handling has completed; failures are answered with a
    /// generic 500 response.
    pub async fn handle(&self, event: LambdaEvent, host: HostContext) -> HostResponse {
        let request = Request::from_event(&event);
        let span = tracing::info_span!(
            "graphql_request",
            method = %request.method,
            path = %request.path,
            request_id = host.aws_request_id.as_deref().unwrap_or_default(),
        );
        self.inner
            .handle(request, event, host)
            .instrument(span)
            .await
    }
}

impl Inner {
    async fn handle(&self, request: Request, event: LambdaEvent, host: HostContext) -> HostResponse {
        if is_health_check_request(&request.path, &self.health_check_path) {
            return handle_health_check(
                &request,
                &event,
                self.health_probe.as_ref(),
                self.cors.as_deref(),
            )
            .await;
        }

        let execution = self.scope.run_scoped(self.execute(&request, &host));
        match AssertUnwindSafe(execution).catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => self.failed(error),
            Err(panic) => self.failed(HandlerError::Panicked(panic_message(panic))),
        }
    }

    async fn execute(&self, request: &Request, host: &HostContext) -> Result<HostResponse, HandlerError> {
        let result = self.dispatcher.dispatch(request, host).await?;
        to_host_response(result)
    }

    fn failed(&self, error: HandlerError) -> HostResponse {
        tracing::error!(%error, "GraphQL request failed");
        if let Some(hook) = &self.on_exception {
            hook.invoke();
        }
        error_response(StatusCode::INTERNAL_SERVER_ERROR, EXECUTION_FAILED)
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(message) => *message,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(message) => message.to_string(),
            Err(_) => "unknown panic payload".to_string(),
        },
    }
}

impl tower::Service<(LambdaEvent, HostContext)> for Handler {
    type Response = HostResponse;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, (event, host): (LambdaEvent, HostContext)) -> Self::Future {
        let handler = self.clone();
        Box::pin(async move { Ok(handler.handle(event, host).await) })
    }
}
