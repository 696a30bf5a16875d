//! Mapping classified execution results to host responses.

use http::StatusCode;
use serde_json::json;

use crate::dispatcher::ExecutionResult;
use crate::error::HandlerError;
use crate::event::HostResponse;

pub(crate) const STREAMING_NOT_SUPPORTED: &str = "Streaming is not supported yet!";
pub(crate) const SUBSCRIPTIONS_NOT_SUPPORTED: &str = "Subscriptions is not supported yet!";
pub(crate) const UNEXPECTED_FLOW: &str = "Unexpected flow";
pub(crate) const EXECUTION_FAILED: &str = "GraphQL execution failed";

/// A `{"error": message}` response.
pub(crate) fn error_response(status: StatusCode, message: &str) -> HostResponse {
    HostResponse::new(status, json!({ "error": message }).to_string())
}

pub(crate) fn to_host_response(result: ExecutionResult) -> Result<HostResponse, HandlerError> {
    match result {
        ExecutionResult::Response { payload, headers } => {
            Ok(HostResponse::new(StatusCode::OK, serde_json::to_string(&payload)?)
                .with_headers(headers))
        }
        ExecutionResult::MultipartResponse => Ok(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            STREAMING_NOT_SUPPORTED,
        )),
        ExecutionResult::Push => Ok(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            SUBSCRIPTIONS_NOT_SUPPORTED,
        )),
        ExecutionResult::Unexpected { shape } => {
            tracing::warn!(%shape, "engine produced an unexpected result");
            Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                UNEXPECTED_FLOW,
            ))
        }
    }
}
