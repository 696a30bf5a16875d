//! Handler configuration.
//!
//! [`Settings`] carries the plain values that may come from a YAML file or the environment.
//! [`HandlerConfig`] adds the collaborators (schema, engine, resolvers, hooks) and is fixed for
//! the lifetime of a [`crate::Handler`].

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use apollo_compiler::Schema;
use apollo_compiler::validation::Valid;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde::Serialize;
use tower::BoxError;

use crate::auth::AuthResolver;
use crate::auth::CurrentUserMapper;
use crate::auth::NoAuthentication;
use crate::context::Context;
use crate::context::scope::PropagationMode;
use crate::engine::Engine;
use crate::error::ConfigurationError;
use crate::health::CorsHeaders;
use crate::health::HealthProbe;
use crate::json_ext::Object;
use crate::pipeline::ContextObserver;
use crate::request::Request;

pub(crate) const RUNTIME_MODE_ENV: &str = "GRAPHQL_RUNTIME_MODE";
pub(crate) const DISABLE_CONTEXT_ISOLATION_ENV: &str = "DISABLE_CONTEXT_ISOLATION";

/// Whether the handler runs in production. Selects validation rules and diagnostics stages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    #[default]
    Production,
    Development,
}

impl RuntimeMode {
    pub fn is_production(self) -> bool {
        self == RuntimeMode::Production
    }
}

impl std::str::FromStr for RuntimeMode {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(RuntimeMode::Production),
            "development" | "dev" | "test" => Ok(RuntimeMode::Development),
            _ => Err(ConfigurationError::InvalidEnvironment {
                name: RUNTIME_MODE_ENV,
                value: value.to_string(),
            }),
        }
    }
}

/// Plain handler settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Settings {
    /// Runtime mode (default: production)
    pub mode: RuntimeMode,

    /// How the request context is propagated ambiently (default: scoped)
    pub context_isolation: PropagationMode,

    /// Requests whose path ends with this suffix are answered by the health check
    /// (default: /health)
    pub health_check_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: RuntimeMode::default(),
            context_isolation: PropagationMode::default(),
            health_check_path: default_health_check_path(),
        }
    }
}

fn default_health_check_path() -> String {
    "/health".to_string()
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    /// Settings from the process environment, on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::default().with_env_overrides(|name| std::env::var(name).ok())
    }

    /// Apply `GRAPHQL_RUNTIME_MODE` and `DISABLE_CONTEXT_ISOLATION` as read by `var`.
    pub fn with_env_overrides(
        mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        if let Some(mode) = var(RUNTIME_MODE_ENV) {
            self.mode = mode.parse()?;
        }
        match var(DISABLE_CONTEXT_ISOLATION_ENV).as_deref() {
            Some("1") | Some("true") => self.context_isolation = PropagationMode::PerProcess,
            Some("0") | Some("false") | None => {}
            Some(other) => {
                return Err(ConfigurationError::InvalidEnvironment {
                    name: DISABLE_CONTEXT_ISOLATION_ENV,
                    value: other.to_string(),
                });
            }
        }
        Ok(self)
    }
}

type DeriveContextFn =
    dyn Fn(Request, Context) -> BoxFuture<'static, Result<Object, BoxError>> + Send + Sync;

/// Caller-supplied context entries, merged after authentication.
#[derive(Clone)]
pub enum ContextExtension {
    /// Entries merged as they are.
    Static(Object),
    /// Entries computed per request from the request and the context built so far.
    Derive(Arc<DeriveContextFn>),
}

impl ContextExtension {
    pub fn derive<F, Fut>(derive: F) -> Self
    where
        F: Fn(Request, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Object, BoxError>> + Send + 'static,
    {
        ContextExtension::Derive(Arc::new(move |request, context| {
            Box::pin(derive(request, context))
        }))
    }

    pub(crate) async fn resolve(
        &self,
        request: &Request,
        context: &Context,
    ) -> Result<Object, BoxError> {
        match self {
            ContextExtension::Static(entries) => Ok(entries.clone()),
            ContextExtension::Derive(derive) => derive(request.clone(), context.clone()).await,
        }
    }
}

impl From<Object> for ContextExtension {
    fn from(entries: Object) -> Self {
        ContextExtension::Static(entries)
    }
}

impl std::fmt::Debug for ContextExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextExtension::Static(entries) => f.debug_tuple("Static").field(entries).finish(),
            ContextExtension::Derive(_) => f.write_str("Derive(..)"),
        }
    }
}

/// Invoked once when handling a request failed, to release held resources.
#[derive(Clone)]
pub struct ExceptionHook(Arc<dyn Fn() + Send + Sync>);

impl ExceptionHook {
    pub fn new(hook: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(hook))
    }

    pub(crate) fn invoke(&self) {
        (self.0)()
    }
}

impl std::fmt::Debug for ExceptionHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionHook").finish_non_exhaustive()
    }
}

/// Everything a [`crate::Handler`] is built from.
#[derive(Clone)]
pub struct HandlerConfig {
    pub(crate) schema: Arc<Valid<Schema>>,
    pub(crate) engine: Arc<dyn Engine>,
    pub(crate) auth_resolver: Arc<dyn AuthResolver>,
    pub(crate) context: Option<ContextExtension>,
    pub(crate) get_current_user: Option<CurrentUserMapper>,
    pub(crate) on_exception: Option<ExceptionHook>,
    pub(crate) observers: Vec<Arc<dyn ContextObserver>>,
    pub(crate) health_probe: Option<HealthProbe>,
    pub(crate) cors: Option<Arc<dyn CorsHeaders>>,
    pub(crate) settings: Settings,
}

#[buildstructor::buildstructor]
impl HandlerConfig {
    /// Returns a builder for a [`HandlerConfig`].
    ///
    /// `schema` and `engine` are required. Without an `auth_resolver` no request is
    /// authenticated; without `settings` the defaults apply.
    #[builder(visibility = "pub")]
    #[allow(clippy::too_many_arguments)]
    fn new(
        schema: Arc<Valid<Schema>>,
        engine: Arc<dyn Engine>,
        auth_resolver: Option<Arc<dyn AuthResolver>>,
        context: Option<ContextExtension>,
        get_current_user: Option<CurrentUserMapper>,
        on_exception: Option<ExceptionHook>,
        observers: Vec<Arc<dyn ContextObserver>>,
        health_probe: Option<HealthProbe>,
        cors: Option<Arc<dyn CorsHeaders>>,
        settings: Option<Settings>,
    ) -> Self {
        Self {
            schema,
            engine,
            auth_resolver: auth_resolver.unwrap_or_else(|| Arc::new(NoAuthentication)),
            context,
            get_current_user,
            on_exception,
            observers,
            health_probe,
            cors,
            settings: settings.unwrap_or_default(),
        }
    }
}
