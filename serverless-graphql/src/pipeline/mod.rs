//! The context pipeline.
//!
//! A [`ContextPipeline`] turns one request into the [`Context`] handed to the engine. Its stages
//! run one after another over the same context, in the order fixed when the handler is built:
//!
//! 1. schema binding
//! 2. authentication
//! 3. global context publication
//! 4. caller context extension
//! 5. diagnostics observers (development only)

use std::sync::Arc;

use apollo_compiler::Schema;
use apollo_compiler::validation::Valid;
use async_trait::async_trait;
use tower::BoxError;

use crate::configuration::ContextExtension;
use crate::configuration::HandlerConfig;
use crate::context::Context;
use crate::context::scope::PropagationScope;
use crate::error::HandlerError;
use crate::event::HostContext;
use crate::json_ext::Object;
use crate::request::Request;

mod authentication;
mod diagnostics;

use authentication::Authentication;
pub use diagnostics::TracingObserver;

/// What every stage sees of the request.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StageInput<'a> {
    pub(crate) request: &'a Request,
    pub(crate) host: &'a HostContext,
}

/// A stage that adds to the context.
#[async_trait]
pub(crate) trait ContextStage: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn contribute(&self, input: &StageInput<'_>, context: &Context) -> Result<(), BoxError>;
}

/// Receives a snapshot of the context once it is built. Observers never change the context and
/// their failures are logged and otherwise ignored.
#[async_trait]
pub trait ContextObserver: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn observe(&self, snapshot: &Object) -> Result<(), BoxError>;
}

enum Stage {
    Contributor(Box<dyn ContextStage>),
    Observer(Arc<dyn ContextObserver>),
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Contributor(stage) => stage.name(),
            Stage::Observer(observer) => observer.name(),
        }
    }
}

pub(crate) struct ContextPipeline {
    stages: Vec<Stage>,
}

impl ContextPipeline {
    pub(crate) fn new(config: &HandlerConfig, scope: PropagationScope) -> Self {
        let mut stages = vec![
            Stage::Contributor(Box::new(SchemaBinding {
                schema: config.schema.clone(),
            })),
            Stage::Contributor(Box::new(Authentication::new(
                config.auth_resolver.clone(),
                config.get_current_user.clone(),
            ))),
            Stage::Contributor(Box::new(GlobalContextPublication { scope })),
        ];
        if let Some(extension) = &config.context {
            stages.push(Stage::Contributor(Box::new(CallerContextExtension {
                extension: extension.clone(),
            })));
        }
        if !config.settings.mode.is_production() {
            stages.push(Stage::Observer(Arc::new(TracingObserver)));
            stages.extend(config.observers.iter().cloned().map(Stage::Observer));
        }
        Self { stages }
    }

    pub(crate) fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    pub(crate) async fn build(&self, input: &StageInput<'_>) -> Result<Context, BoxError> {
        let context = Context::new();
        for stage in &self.stages {
            match stage {
                Stage::Contributor(stage) => {
                    tracing::trace!(stage = stage.name(), "running context stage");
                    stage
                        .contribute(input, &context)
                        .await
                        .map_err(|source| HandlerError::Stage {
                            stage: stage.name(),
                            source,
                        })?;
                }
                Stage::Observer(observer) => {
                    if let Err(error) = observer.observe(&context.snapshot()).await {
                        tracing::debug!(observer = observer.name(), %error, "context observer failed");
                    }
                }
            }
        }
        Ok(context)
    }
}

/// Attaches the schema, and the host context for later stages, as typed extensions.
struct SchemaBinding {
    schema: Arc<Valid<Schema>>,
}

#[async_trait]
impl ContextStage for SchemaBinding {
    fn name(&self) -> &'static str {
        "schema_binding"
    }

    async fn contribute(&self, input: &StageInput<'_>, context: &Context) -> Result<(), BoxError> {
        let extensions = context.extensions();
        extensions.insert(self.schema.clone());
        extensions.insert(input.host.clone());
        Ok(())
    }
}

struct GlobalContextPublication {
    scope: PropagationScope,
}

#[async_trait]
impl ContextStage for GlobalContextPublication {
    fn name(&self) -> &'static str {
        "global_context_publication"
    }

    async fn contribute(&self, _input: &StageInput<'_>, context: &Context) -> Result<(), BoxError> {
        self.scope.publish(context)?;
        Ok(())
    }
}

struct CallerContextExtension {
    extension: ContextExtension,
}

#[async_trait]
impl ContextStage for CallerContextExtension {
    fn name(&self) -> &'static str {
        "context_extension"
    }

    async fn contribute(&self, input: &StageInput<'_>, context: &Context) -> Result<(), BoxError> {
        let entries = self.extension.resolve(input.request, context).await?;
        context.extend(entries);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json_bytes::json;

    use super::*;
    use crate::auth::AuthPayload;
    use crate::auth::AuthResolver;
    use crate::auth::CurrentUserMapper;
    use crate::auth::MockAuthResolver;
    use crate::configuration::RuntimeMode;
    use crate::configuration::Settings;
    use crate::context::CURRENT_USER;
    use crate::context::scope;
    use crate::context::scope::PropagationMode;
    use crate::engine::Engine;
    use crate::engine::Invocation;
    use crate::engine::Outcome;

    pub(crate) struct UnusedEngine;

    #[async_trait]
    impl Engine for UnusedEngine {
        async fn execute(&self, _invocation: Invocation<'_>) -> Result<Outcome, BoxError> {
            Err("the engine is not part of this test".into())
        }
    }

    pub(crate) fn schema() -> Arc<Valid<Schema>> {
        Arc::new(
            Schema::parse_and_validate("type Query { me: String }", "schema.graphql").unwrap(),
        )
    }

    fn payload() -> AuthPayload {
        AuthPayload {
            decoded: json!({ "sub": "user-1" }),
            raw: json!({ "type": "custom", "schema": "Bearer", "token": "abc" }),
            source_request: None,
        }
    }

    fn resolver_returning(payload: Option<AuthPayload>) -> Arc<dyn AuthResolver> {
        let mut resolver = MockAuthResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(move |_, _| Ok(payload.clone()));
        Arc::new(resolver)
    }

    struct RecordingObserver(Arc<Mutex<Vec<Object>>>);

    #[async_trait]
    impl ContextObserver for RecordingObserver {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn observe(&self, snapshot: &Object) -> Result<(), BoxError> {
            self.0.lock().push(snapshot.clone());
            Ok(())
        }
    }

    struct FailingObserver(Arc<AtomicUsize>);

    #[async_trait]
    impl ContextObserver for FailingObserver {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn observe(&self, _snapshot: &Object) -> Result<(), BoxError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err("observer exploded".into())
        }
    }

    fn development() -> Settings {
        Settings {
            mode: RuntimeMode::Development,
            ..Default::default()
        }
    }

    async fn build(config: &HandlerConfig) -> Result<Context, BoxError> {
        let scope = PropagationScope::new(PropagationMode::Scoped);
        let pipeline = ContextPipeline::new(config, scope);
        let request = Request::default();
        let host = HostContext::default();
        scope
            .run_scoped(pipeline.build(&StageInput {
                request: &request,
                host: &host,
            }))
            .await
    }

    #[tokio::test]
    async fn current_user_is_absent_without_credentials() {
        let config = HandlerConfig::builder()
            .schema(schema())
            .engine(Arc::new(UnusedEngine) as Arc<dyn Engine>)
            .auth_resolver(resolver_returning(None))
            .build();

        let context = build(&config).await.unwrap();

        assert!(!context.contains_key(CURRENT_USER));
        assert!(context.extensions().get::<Arc<Valid<Schema>>>().is_some());
    }

    #[tokio::test]
    async fn payload_is_the_default_current_user() {
        let config = HandlerConfig::builder()
            .schema(schema())
            .engine(Arc::new(UnusedEngine) as Arc<dyn Engine>)
            .auth_resolver(resolver_returning(Some(payload())))
            .build();

        let context = build(&config).await.unwrap();

        assert_eq!(
            context.get_json_value(CURRENT_USER),
            Some(json!({
                "decoded": { "sub": "user-1" },
                "raw": { "type": "custom", "schema": "Bearer", "token": "abc" }
            }))
        );
    }

    #[tokio::test]
    async fn mapped_current_user_is_used() {
        let config = HandlerConfig::builder()
            .schema(schema())
            .engine(Arc::new(UnusedEngine) as Arc<dyn Engine>)
            .auth_resolver(resolver_returning(Some(payload())))
            .get_current_user(CurrentUserMapper::new(|payload: AuthPayload| async move {
                let sub = payload.decoded.as_object().and_then(|claims| claims.get("sub")).cloned();
                Ok(json!({ "id": sub }))
            }))
            .build();

        let context = build(&config).await.unwrap();

        assert_eq!(
            context.get_json_value(CURRENT_USER),
            Some(json!({ "id": "user-1" }))
        );
    }

    #[tokio::test]
    async fn caller_context_overrides_authentication() {
        let config = HandlerConfig::builder()
            .schema(schema())
            .engine(Arc::new(UnusedEngine) as Arc<dyn Engine>)
            .auth_resolver(resolver_returning(Some(payload())))
            .context(ContextExtension::derive(|_request, context: Context| async move {
                let mut entries = Object::new();
                entries.insert("sawUser", json!(context.contains_key(CURRENT_USER)));
                entries.insert(CURRENT_USER, json!("override"));
                Ok(entries)
            }))
            .build();

        let context = build(&config).await.unwrap();

        assert_eq!(context.get_json_value(CURRENT_USER), Some(json!("override")));
        assert_eq!(context.get_json_value("sawUser"), Some(json!(true)));
        assert_eq!(context.keys(), vec!["currentUser", "sawUser"]);
    }

    #[tokio::test]
    async fn published_context_is_the_built_context() {
        let config = HandlerConfig::builder()
            .schema(schema())
            .engine(Arc::new(UnusedEngine) as Arc<dyn Engine>)
            .context(ContextExtension::Static(
                json!({ "tenant": "acme" }).as_object().cloned().unwrap(),
            ))
            .build();
        let scope = PropagationScope::new(PropagationMode::Scoped);
        let pipeline = ContextPipeline::new(&config, scope);
        let request = Request::default();
        let host = HostContext::default();

        let ambient = scope
            .run_scoped(async {
                pipeline
                    .build(&StageInput {
                        request: &request,
                        host: &host,
                    })
                    .await
                    .unwrap();
                scope::current()
            })
            .await
            .unwrap();

        assert_eq!(ambient.get_json_value("tenant"), Some(json!("acme")));
    }

    #[test]
    fn stages_follow_the_runtime_mode() {
        let production = HandlerConfig::builder()
            .schema(schema())
            .engine(Arc::new(UnusedEngine) as Arc<dyn Engine>)
            .context(ContextExtension::Static(Object::new()))
            .observer(Arc::new(FailingObserver(Default::default())) as Arc<dyn ContextObserver>)
            .build();
        let development = HandlerConfig {
            settings: development(),
            ..production.clone()
        };
        let scope = PropagationScope::default();

        assert_eq!(
            ContextPipeline::new(&production, scope).stage_names(),
            vec![
                "schema_binding",
                "authentication",
                "global_context_publication",
                "context_extension",
            ]
        );
        assert_eq!(
            ContextPipeline::new(&development, scope).stage_names(),
            vec![
                "schema_binding",
                "authentication",
                "global_context_publication",
                "context_extension",
                "tracing",
                "failing",
            ]
        );
    }

    #[tokio::test]
    async fn observer_failures_are_swallowed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let config = HandlerConfig::builder()
            .schema(schema())
            .engine(Arc::new(UnusedEngine) as Arc<dyn Engine>)
            .auth_resolver(resolver_returning(Some(payload())))
            .observer(Arc::new(FailingObserver(calls.clone())) as Arc<dyn ContextObserver>)
            .observer(Arc::new(RecordingObserver(snapshots.clone())) as Arc<dyn ContextObserver>)
            .settings(development())
            .build();

        let context = build(&config).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(snapshots.lock().len(), 1);
        assert_eq!(snapshots.lock()[0], context.snapshot());
    }

    #[tokio::test]
    async fn resolver_errors_abort_the_pipeline() {
        let mut resolver = MockAuthResolver::new();
        resolver
            .expect_resolve()
            .returning(|_, _| Err("identity provider unreachable".into()));
        let extended = Arc::new(AtomicUsize::new(0));
        let counter = extended.clone();
        let config = HandlerConfig::builder()
            .schema(schema())
            .engine(Arc::new(UnusedEngine) as Arc<dyn Engine>)
            .auth_resolver(Arc::new(resolver) as Arc<dyn AuthResolver>)
            .context(ContextExtension::derive(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(Object::new()) }
            }))
            .build();

        let error = build(&config).await.unwrap_err();

        assert_eq!(extended.load(Ordering::SeqCst), 0);
        assert_eq!(
            error.to_string(),
            "context pipeline stage 'authentication' failed: identity provider unreachable"
        );
    }

    #[tokio::test]
    async fn publication_requires_a_scoped_region() {
        let config = HandlerConfig::builder()
            .schema(schema())
            .engine(Arc::new(UnusedEngine) as Arc<dyn Engine>)
            .build();
        let pipeline = ContextPipeline::new(&config, PropagationScope::new(PropagationMode::Scoped));
        let request = Request::default();
        let host = HostContext::default();

        let error = pipeline
            .build(&StageInput {
                request: &request,
                host: &host,
            })
            .await
            .unwrap_err();

        assert!(error.to_string().contains("global_context_publication"));
    }
}
