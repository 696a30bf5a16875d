//! Types related to GraphQL requests, responses, etc.

mod request;
mod response;

use std::pin::Pin;

use futures::Stream;
pub use request::Request;
pub use response::Response;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

use crate::json_ext::Object;

/// An asynchronous [`Stream`] of GraphQL [`Response`]s.
///
/// Incremental delivery and subscriptions produce several responses over time. Neither is
/// delivered by this crate, but engines report them as streams so the shape can be recognized.
pub type ResponseStream = Pin<Box<dyn Stream<Item = Response> + Send>>;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
/// The error location
pub struct Location {
    /// The line number
    pub line: u32,
    /// The column number
    pub column: u32,
}

/// One segment of the path to a field in [`Response::data`].
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(untagged)]
pub enum PathElement {
    /// An index into a list.
    Index(usize),
    /// A response key.
    Key(String),
}

/// A [GraphQL error](https://spec.graphql.org/October2021/#sec-Errors)
/// as may be found in the `errors` field of a GraphQL [`Response`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[non_exhaustive]
pub struct Error {
    /// The error message.
    pub message: String,

    /// The locations of the error in the GraphQL document of the originating request.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,

    /// If this is a field error, the JSON path to that field in [`Response::data`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathElement>>,

    /// The optional GraphQL extensions for this error.
    #[serde(skip_serializing_if = "Object::is_empty")]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Error {
    /// Returns a builder that builds a GraphQL [`Error`] from its components.
    ///
    /// `.message()` is required. `.extension_code()` sets the `code` extension unless
    /// `.extensions()` already carries one.
    #[builder(visibility = "pub")]
    fn new(
        message: String,
        locations: Vec<Location>,
        path: Option<Vec<PathElement>>,
        extension_code: Option<String>,
        // Skip the `Object` type alias in order to use buildstructor's map special-casing
        mut extensions: JsonMap<ByteString, Value>,
    ) -> Self {
        if let Some(code) = extension_code {
            extensions
                .entry("code")
                .or_insert(Value::String(ByteString::from(code)));
        }
        Self {
            message,
            locations,
            path,
            extensions,
        }
    }

    /// Extract the error code from [`Error::extensions`] as a String if it is set.
    pub fn extension_code(&self) -> Option<String> {
        self.extensions.get("code").and_then(|c| match c {
            Value::String(s) => Some(s.as_str().to_owned()),
            Value::Bool(b) => Some(format!("{b}")),
            Value::Number(n) => Some(n.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        })
    }
}

impl Error {
    /// A compiler diagnostic, with `code` as its extension code.
    pub(crate) fn from_diagnostic(
        error: apollo_compiler::response::GraphQLError,
        code: &str,
    ) -> Self {
        Error::builder()
            .message(error.message)
            .locations(
                error
                    .locations
                    .iter()
                    .map(|location| Location {
                        line: location.line as u32,
                        column: location.column as u32,
                    })
                    .collect::<Vec<_>>(),
            )
            .extension_code(code)
            .build()
    }
}

/// Extension code for documents that are not syntactically valid GraphQL.
pub const ERROR_CODE_PARSING_FAILED: &str = "GRAPHQL_PARSE_FAILED";

/// Extension code for documents rejected by schema validation or a validation rule.
pub const ERROR_CODE_VALIDATION_FAILED: &str = "GRAPHQL_VALIDATION_FAILED";

/// Extension code for requests that carry no usable GraphQL parameters.
pub const ERROR_CODE_BAD_REQUEST: &str = "BAD_REQUEST";

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn extension_code_does_not_override_existing_code() {
        let error = Error::builder()
            .message("boom")
            .extension("code", "ORIGINAL")
            .extension_code("IGNORED")
            .build();

        assert_eq!(error.extension_code().as_deref(), Some("ORIGINAL"));
    }

    #[test]
    fn diagnostics_keep_their_locations() {
        let schema = apollo_compiler::Schema::parse_and_validate(
            "type Query { me: String }",
            "schema.graphql",
        )
        .unwrap();
        let invalid = apollo_compiler::ExecutableDocument::parse_and_validate(
            &schema,
            "{\n  nope\n}",
            "query.graphql",
        )
        .unwrap_err();
        let diagnostic = invalid.errors.iter().next().unwrap();

        let error = Error::from_diagnostic(diagnostic.to_json(), ERROR_CODE_VALIDATION_FAILED);

        assert!(error.message.contains("nope"));
        assert_eq!(error.locations, vec![Location { line: 2, column: 3 }]);
        assert_eq!(
            error.extension_code().as_deref(),
            Some(ERROR_CODE_VALIDATION_FAILED)
        );
    }

    #[test]
    fn serializes_without_empty_fields() {
        let error = Error::builder()
            .message("Must provide query string.")
            .extension_code(ERROR_CODE_BAD_REQUEST)
            .build();

        assert_eq!(
            serde_json_bytes::to_value(&error).unwrap(),
            json!({
                "message": "Must provide query string.",
                "extensions": { "code": "BAD_REQUEST" }
            })
        );
    }
}
