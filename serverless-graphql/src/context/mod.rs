//! Provide a [`Context`] for the request pipeline.
//!
//! Every pipeline stage and the engine share one [`Context`] per request. It holds an ordered
//! map of JSON entries that resolvers can read, plus typed [`Extensions`] for values that are not
//! serializable, such as the schema handle.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json_bytes::ByteString;

use crate::error::ContextError;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::json_ext::merge_shallow;

pub(crate) mod extensions;
pub mod scope;

pub use extensions::Extensions;

/// Key under which the authenticated identity is published.
pub const CURRENT_USER: &str = "currentUser";

/// The per-request execution context.
///
/// Cloning a [`Context`] is cheap and yields a handle to the same entries.
#[derive(Clone, Debug, Default)]
pub struct Context {
    entries: Arc<RwLock<Object>>,
    extensions: Extensions,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed, non-serializable values attached to this request.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Returns true if the context contains a value for the specified key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Get a value from the context using the provided key.
    ///
    /// Semantics:
    ///  - If the operation fails, the error is returned.
    ///  - If the operation succeeds, the value is an [`Option`].
    pub fn get<V>(&self, key: &str) -> Result<Option<V>, ContextError>
    where
        V: DeserializeOwned,
    {
        self.get_json_value(key)
            .map(serde_json_bytes::from_value)
            .transpose()
            .map_err(|source| ContextError::Conversion {
                key: key.to_string(),
                source,
            })
    }

    /// Get a raw JSON value from the context.
    pub fn get_json_value(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    /// Insert a value into the context using the provided key and value.
    ///
    /// The previous raw value for the key, if any, is returned.
    pub fn insert<K, V>(&self, key: K, value: V) -> Result<Option<Value>, ContextError>
    where
        K: Into<String>,
        V: Serialize,
    {
        let key = key.into();
        let value = serde_json_bytes::to_value(value).map_err(|source| {
            ContextError::Conversion {
                key: key.clone(),
                source,
            }
        })?;
        Ok(self.insert_json_value(key, value))
    }

    /// Insert a raw JSON value into the context.
    pub fn insert_json_value(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.write().insert(ByteString::from(key.into()), value)
    }

    /// Upsert a value in the context using the provided key and resolving function.
    ///
    /// The resolving function must yield a value to be used in the context. It is provided with
    /// the current value to update, or the default if there was none.
    pub fn upsert<V>(
        &self,
        key: &str,
        upsert: impl FnOnce(V) -> V,
        default: impl FnOnce() -> V,
    ) -> Result<(), ContextError>
    where
        V: DeserializeOwned + Serialize,
    {
        let conversion = |source: serde_json::Error| ContextError::Conversion {
            key: key.to_string(),
            source,
        };
        let mut entries = self.entries.write();
        let current = match entries.get(key) {
            Some(value) => serde_json_bytes::from_value(value.clone()).map_err(conversion)?,
            None => default(),
        };
        let updated = serde_json_bytes::to_value(upsert(current)).map_err(conversion)?;
        entries.insert(ByteString::from(key), updated);
        Ok(())
    }

    /// Merge `other` into the context. Keys of `other` override existing keys; nested values are
    /// replaced, never merged recursively.
    pub fn extend(&self, other: Object) {
        merge_shallow(&mut self.entries.write(), other);
    }

    /// A copy of the entries as they are now.
    pub fn snapshot(&self) -> Object {
        self.entries.read().clone()
    }

    /// The keys currently present, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .keys()
            .map(|key| key.as_str().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
