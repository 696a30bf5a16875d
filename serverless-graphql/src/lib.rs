//! Serve GraphQL from HTTP-shaped serverless function events.
//!
//! A [`Handler`] normalizes the event, answers health checks, builds a per-request [`Context`]
//! through a fixed pipeline of stages and hands the operation to an [`engine::Engine`]. Whatever
//! the engine produces is mapped back to a [`HostResponse`].

pub mod auth;
mod configuration;
pub mod context;
mod dispatcher;
pub mod engine;
mod error;
mod event;
pub mod graphql;
mod handler;
pub mod health;
pub mod json_ext;
pub mod pipeline;
mod request;
mod response;
pub mod telemetry;
pub mod validation;

pub use configuration::ContextExtension;
pub use configuration::ExceptionHook;
pub use configuration::HandlerConfig;
pub use configuration::RuntimeMode;
pub use configuration::Settings;
pub use context::Context;
pub use error::ConfigurationError;
pub use error::ContextError;
pub use error::HandlerError;
pub use event::HostContext;
pub use event::HostResponse;
pub use event::LambdaEvent;
pub use handler::Handler;
pub use request::Request;
