use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde::Serialize;

use crate::event::LambdaEvent;

/// The canonical form of an inbound request, independent of the host that delivered it.
///
/// Header names are lower-cased. Built once by [`Request::from_event`] and never mutated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: String,
}

impl Request {
    /// Normalize a host event. Absent headers, query parameters and body become empty.
    pub fn from_event(event: &LambdaEvent) -> Self {
        let headers = event
            .headers
            .iter()
            .flatten()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
            .collect();
        let query = event.query_string_parameters.clone().unwrap_or_default();
        let path = event
            .raw_path
            .clone()
            .or_else(|| event.path.clone())
            .unwrap_or_default();

        Self {
            method: event.http_method.to_ascii_uppercase(),
            path,
            headers,
            query,
            body: decode_body(event),
        }
    }

    /// Look a header up by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

fn decode_body(event: &LambdaEvent) -> String {
    let Some(body) = event.body.as_deref() else {
        return String::new();
    };
    if !event.is_base64_encoded {
        return body.to_string();
    }
    match STANDARD
        .decode(body)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
    {
        Some(decoded) => decoded,
        None => {
            tracing::debug!("request body is flagged as base64 but does not decode, keeping it verbatim");
            body.to_string()
        }
    }
}
