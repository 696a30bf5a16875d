//! Execution dispatch: from a normalized request to a classified engine outcome.

use std::sync::Arc;

use crate::configuration::HandlerConfig;
use crate::configuration::RuntimeMode;
use crate::context::scope::PropagationScope;
use crate::engine::ContextFactory;
use crate::engine::Engine;
use crate::engine::Invocation;
use crate::engine::Outcome;
use crate::error::HandlerError;
use crate::event::HostContext;
use crate::graphql;
use crate::graphql::ERROR_CODE_BAD_REQUEST;
use crate::pipeline::ContextPipeline;
use crate::pipeline::StageInput;
use crate::request::Request;
use crate::validation::NoIntrospection;
use crate::validation::ValidationRule;

/// The classified result of one engine invocation.
#[derive(Debug)]
pub(crate) enum ExecutionResult {
    Response {
        payload: graphql::Response,
        headers: Vec<(String, String)>,
    },
    MultipartResponse,
    Push,
    Unexpected {
        shape: String,
    },
}

impl From<Outcome> for ExecutionResult {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Single { response, headers } => ExecutionResult::Response {
                payload: response,
                headers,
            },
            Outcome::Incremental(_) => ExecutionResult::MultipartResponse,
            Outcome::Subscription(_) => ExecutionResult::Push,
            Outcome::Other(shape) => ExecutionResult::Unexpected { shape },
        }
    }
}

/// The extra rules every operation is validated against in `mode`.
pub(crate) fn validation_rules(mode: RuntimeMode) -> Vec<Arc<dyn ValidationRule>> {
    match mode {
        RuntimeMode::Production => vec![Arc::new(NoIntrospection)],
        RuntimeMode::Development => Vec::new(),
    }
}

/// Read the GraphQL parameters: from the query string for `GET`, from the JSON body otherwise.
pub(crate) fn extract_parameters(request: &Request) -> Result<graphql::Request, serde_json::Error> {
    if request.method == http::Method::GET.as_str() {
        graphql::Request::from_query_parameters(&request.query)
    } else {
        graphql::Request::from_body(&request.body)
    }
}

pub(crate) struct Dispatcher {
    engine: Arc<dyn Engine>,
    pipeline: ContextPipeline,
    validation_rules: Vec<Arc<dyn ValidationRule>>,
}

impl Dispatcher {
    pub(crate) fn new(config: &HandlerConfig, scope: PropagationScope) -> Self {
        Self {
            engine: config.engine.clone(),
            pipeline: ContextPipeline::new(config, scope),
            validation_rules: validation_rules(config.settings.mode),
        }
    }

    pub(crate) async fn dispatch(
        &self,
        request: &Request,
        host: &HostContext,
    ) -> Result<ExecutionResult, HandlerError> {
        let parameters = match extract_parameters(request) {
            Ok(parameters) => parameters,
            Err(error) => {
                tracing::debug!(%error, "request does not carry valid GraphQL parameters");
                return Ok(ExecutionResult::Response {
                    payload: graphql::Response::from_errors(vec![
                        graphql::Error::builder()
                            .message(format!("Invalid GraphQL request: {error}"))
                            .extension_code(ERROR_CODE_BAD_REQUEST)
                            .build(),
                    ]),
                    headers: vec![("content-type".to_string(), "application/json".to_string())],
                });
            }
        };
        tracing::debug!(
            operation_name = parameters.operation_name.as_deref(),
            "parameters extracted"
        );

        let invocation = Invocation {
            operation_name: parameters.operation_name,
            query: parameters.query,
            variables: parameters.variables,
            extensions: parameters.extensions,
            request,
            validation_rules: &self.validation_rules,
            context_factory: ContextFactory::new(&self.pipeline, StageInput { request, host }),
        };
        let outcome = self
            .engine
            .execute(invocation)
            .await
            .map_err(HandlerError::Engine)?;
        tracing::debug!(?outcome, "engine invoked");

        Ok(outcome.into())
    }
}
