//! An [`Engine`] built on `apollo-compiler`.
//!
//! Parsing and validation happen here; resolving fields is left to an [`OperationExecutor`].

use std::sync::Arc;

use apollo_compiler::ExecutableDocument;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::ast::OperationType;
use apollo_compiler::validation::DiagnosticList;
use apollo_compiler::validation::Valid;
use async_trait::async_trait;
use tower::BoxError;

use super::Engine;
use super::Invocation;
use super::Outcome;
use crate::context::Context;
use crate::graphql;
use crate::graphql::ERROR_CODE_BAD_REQUEST;
use crate::graphql::ERROR_CODE_PARSING_FAILED;
use crate::graphql::ERROR_CODE_VALIDATION_FAILED;
use crate::json_ext::Object;
use crate::validation::requests_incremental_delivery;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Resolves a validated operation.
#[async_trait]
pub trait OperationExecutor: Send + Sync + 'static {
    async fn execute(
        &self,
        document: &Valid<ExecutableDocument>,
        operation_name: Option<&str>,
        variables: &Object,
        context: &Context,
    ) -> Result<graphql::Response, BoxError>;
}

pub struct CompilerEngine<E> {
    schema: Arc<Valid<Schema>>,
    executor: E,
}

impl<E: OperationExecutor> CompilerEngine<E> {
    pub fn new(schema: Arc<Valid<Schema>>, executor: E) -> Self {
        Self { schema, executor }
    }
}

fn single(response: graphql::Response) -> Outcome {
    Outcome::Single {
        response,
        headers: vec![("content-type".to_string(), JSON_CONTENT_TYPE.to_string())],
    }
}

fn rejected(errors: Vec<graphql::Error>) -> Outcome {
    single(graphql::Response::from_errors(errors))
}

fn bad_request(message: impl Into<String>) -> Outcome {
    rejected(vec![
        graphql::Error::builder()
            .message(message)
            .extension_code(ERROR_CODE_BAD_REQUEST)
            .build(),
    ])
}

fn diagnostics_to_errors(diagnostics: &DiagnosticList, code: &str) -> Vec<graphql::Error> {
    diagnostics
        .iter()
        .map(|diagnostic| graphql::Error::from_diagnostic(diagnostic.to_json(), code))
        .collect()
}

#[async_trait]
impl<E: OperationExecutor> Engine for CompilerEngine<E> {
    async fn execute(&self, invocation: Invocation<'_>) -> Result<Outcome, BoxError> {
        let Invocation {
            operation_name,
            query,
            variables,
            validation_rules,
            context_factory,
            ..
        } = invocation;

        let Some(query) = query.filter(|query| !query.trim().is_empty()) else {
            return Ok(bad_request("Must provide query string."));
        };

        let ast = match ast::Document::parse(query.as_str(), "query.graphql") {
            Ok(ast) => ast,
            Err(with_errors) => {
                tracing::debug!("operation could not be parsed");
                return Ok(rejected(diagnostics_to_errors(
                    &with_errors.errors,
                    ERROR_CODE_PARSING_FAILED,
                )));
            }
        };

        let validated = ExecutableDocument::parse_and_validate(&self.schema, query, "query.graphql");
        let (document, mut errors) = match validated {
            Ok(document) => (Some(document), Vec::new()),
            Err(with_errors) => (
                None,
                diagnostics_to_errors(&with_errors.errors, ERROR_CODE_VALIDATION_FAILED),
            ),
        };
        for rule in validation_rules {
            let violations = rule.validate(&ast);
            if !violations.is_empty() {
                tracing::debug!(rule = rule.name(), "validation rule rejected the operation");
                errors.extend(violations);
            }
        }
        let document = match document {
            Some(document) if errors.is_empty() => document,
            _ => return Ok(rejected(errors)),
        };

        let operation = match document.operations.get(operation_name.as_deref()) {
            Ok(operation) => operation,
            Err(_) => {
                return Ok(bad_request(match &operation_name {
                    Some(name) => format!("Unknown operation named \"{name}\"."),
                    None => "Must provide operation name if query contains multiple operations."
                        .to_string(),
                }));
            }
        };
        if operation.operation_type == OperationType::Subscription {
            return Ok(Outcome::Subscription(Box::pin(futures::stream::empty())));
        }
        if requests_incremental_delivery(&document, operation) {
            return Ok(Outcome::Incremental(Box::pin(futures::stream::empty())));
        }

        let context = context_factory.build().await?;
        let response = self
            .executor
            .execute(&document, operation_name.as_deref(), &variables, &context)
            .await?;
        Ok(single(response))
    }
}
