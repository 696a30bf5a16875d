//! Host-facing shapes: the inbound function event, the host's invocation context and the
//! outbound response.

use std::collections::HashMap;

use http::StatusCode;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

/// An HTTP-shaped function invocation as delivered by the host.
///
/// Every field is optional on the wire; the normalizer turns absent values into empty ones.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LambdaEvent {
    pub headers: Option<HashMap<String, String>>,
    pub http_method: String,
    pub query_string_parameters: Option<HashMap<String, String>>,
    pub body: Option<String>,
    pub path: Option<String>,
    pub raw_path: Option<String>,
    pub is_base64_encoded: bool,
}

/// The host's native invocation context, handed to the authentication resolver untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostContext {
    pub aws_request_id: Option<String>,
    pub function_name: Option<String>,
}

/// The response handed back to the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostResponse {
    pub status_code: u16,
    /// JSON encoded body.
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub headers: Option<IndexMap<String, String>>,
}

impl HostResponse {
    pub(crate) fn new(status: StatusCode, body: String) -> Self {
        Self {
            status_code: status.as_u16(),
            body,
            headers: None,
        }
    }

    /// Flatten ordered `(name, value)` pairs into the header map; a later pair wins over an
    /// earlier one with the same name.
    pub(crate) fn with_headers<I>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let map = self.headers.get_or_insert_with(IndexMap::new);
        for (name, value) in headers {
            map.insert(name, value);
        }
        self
    }
}
