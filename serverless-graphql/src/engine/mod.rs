//! The GraphQL engine seam.
//!
//! The dispatcher hands an [`Invocation`] to an [`Engine`]. The engine is responsible for
//! parsing, validating and executing the operation, and builds the request [`Context`] itself
//! through the [`ContextFactory`] when it is about to execute.

use std::sync::Arc;

use async_trait::async_trait;
use tower::BoxError;

use crate::context::Context;
use crate::graphql;
use crate::graphql::ResponseStream;
use crate::json_ext::Object;
use crate::pipeline::ContextPipeline;
use crate::pipeline::StageInput;
use crate::request::Request;
use crate::validation::ValidationRule;

mod compiler;

pub use compiler::CompilerEngine;
pub use compiler::OperationExecutor;

/// Everything the engine needs to process one operation.
#[non_exhaustive]
pub struct Invocation<'a> {
    pub operation_name: Option<String>,
    pub query: Option<String>,
    pub variables: Object,
    pub extensions: Object,
    pub request: &'a Request,
    pub validation_rules: &'a [Arc<dyn ValidationRule>],
    pub context_factory: ContextFactory<'a>,
}

/// Runs the context pipeline for the invocation's original event.
pub struct ContextFactory<'a> {
    pipeline: &'a ContextPipeline,
    input: StageInput<'a>,
}

impl<'a> ContextFactory<'a> {
    pub(crate) fn new(pipeline: &'a ContextPipeline, input: StageInput<'a>) -> Self {
        Self { pipeline, input }
    }

    /// Build the request context. Failures must be propagated, not recovered from.
    pub async fn build(&self) -> Result<Context, BoxError> {
        self.pipeline.build(&self.input).await
    }
}

/// What an engine produced, before the dispatcher classifies it.
#[non_exhaustive]
pub enum Outcome {
    /// A single, complete response and its headers in emission order.
    Single {
        response: graphql::Response,
        headers: Vec<(String, String)>,
    },
    /// Incremental delivery (`@defer`/`@stream`).
    Incremental(ResponseStream),
    /// A subscription event stream.
    Subscription(ResponseStream),
    /// Any other shape, named for diagnostics.
    Other(String),
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Single { response, headers } => f
                .debug_struct("Single")
                .field("response", response)
                .field("headers", headers)
                .finish(),
            Outcome::Incremental(_) => f.write_str("Incremental(..)"),
            Outcome::Subscription(_) => f.write_str("Subscription(..)"),
            Outcome::Other(shape) => f.debug_tuple("Other").field(shape).finish(),
        }
    }
}

#[async_trait]
pub trait Engine: Send + Sync + 'static {
    async fn execute(&self, invocation: Invocation<'_>) -> Result<Outcome, BoxError>;
}
