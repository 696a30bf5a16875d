//! Handler errors.
use displaydoc::Display;
use thiserror::Error;
use tower::BoxError;

/// Errors raised while handling a single request.
///
/// None of these are returned to the client: the exception guard turns every one of them into
/// the same generic response.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum HandlerError {
    /// context pipeline stage '{stage}' failed: {source}
    Stage {
        /// The stage that failed.
        stage: &'static str,
        /// The underlying failure.
        source: BoxError,
    },

    /// GraphQL engine invocation failed: {0}
    Engine(BoxError),

    /// cannot serialize the response: {0}
    Serialization(#[from] serde_json::Error),

    /// request handling panicked: {0}
    Panicked(String),
}

/// Errors raised by [`crate::Context`] accessors.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum ContextError {
    /// cannot convert context entry '{key}': {source}
    Conversion {
        /// The context key.
        key: String,
        /// The serde failure.
        source: serde_json::Error,
    },

    /// the context was published outside of a propagation scope
    OutsideScope,
}

/// Errors raised while loading handler settings.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// could not parse settings: {0}
    InvalidSettings(#[from] serde_yaml::Error),

    /// unknown value '{value}' for environment variable {name}
    InvalidEnvironment {
        /// The variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },

    /// could not read settings file: {0}
    Io(#[from] std::io::Error),
}
