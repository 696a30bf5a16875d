use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

use crate::json_ext::Object;

/// The GraphQL parameters of an incoming request: operation, operation name, variables and
/// extensions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Request {
    /// The GraphQL operation (e.g., query, mutation) string.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub query: Option<String>,

    /// The (optional) GraphQL operation name.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub operation_name: Option<String>,

    /// The (optional) GraphQL variables in the form of a JSON object.
    #[serde(
        skip_serializing_if = "Object::is_empty",
        default,
        deserialize_with = "deserialize_null_default"
    )]
    pub variables: Object,

    /// The (optional) GraphQL `extensions` of a GraphQL request.
    #[serde(
        skip_serializing_if = "Object::is_empty",
        default,
        deserialize_with = "deserialize_null_default"
    )]
    pub extensions: Object,
}

// NOTE: this deserialize helper is used to transform `null` to Default::default()
fn deserialize_null_default<'de, D, T: Default + Deserialize<'de>>(
    deserializer: D,
) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
{
    <Option<T>>::deserialize(deserializer).map(|x| x.unwrap_or_default())
}

#[buildstructor::buildstructor]
impl Request {
    #[builder(visibility = "pub")]
    fn new(
        query: Option<String>,
        operation_name: Option<String>,
        // Skip the `Object` type alias in order to use buildstructor’s map special-casing
        variables: JsonMap<ByteString, Value>,
        extensions: JsonMap<ByteString, Value>,
    ) -> Self {
        Self {
            query,
            operation_name,
            variables,
            extensions,
        }
    }

    /// Read GraphQL parameters from already decoded query string parameters, as sent with `GET`.
    ///
    /// `variables` and `extensions` are JSON documents embedded in their parameter.
    pub fn from_query_parameters(
        parameters: &HashMap<String, String>,
    ) -> Result<Request, serde_json::Error> {
        let variables: Object = get_json_parameter(parameters, "variables")?.unwrap_or_default();
        let extensions: Object = get_json_parameter(parameters, "extensions")?.unwrap_or_default();

        Ok(Self::builder()
            .and_query(parameters.get("query").cloned())
            .and_operation_name(parameters.get("operationName").cloned())
            .variables(variables)
            .extensions(extensions)
            .build())
    }

    /// Read GraphQL parameters from a JSON request body. An empty body carries no parameters.
    pub fn from_body(body: &str) -> Result<Request, serde_json::Error> {
        if body.trim().is_empty() {
            return Ok(Request::default());
        }
        serde_json::from_str(body)
    }
}

fn get_json_parameter<T: for<'de> Deserialize<'de>>(
    parameters: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, serde_json::Error> {
    parameters
        .get(key)
        .filter(|raw| !raw.is_empty())
        .map(|raw| serde_json::from_str(raw))
        .transpose()
}
