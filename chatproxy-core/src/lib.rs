//! Core library for the chat streaming proxy.
//!
//! The server side ([`relay`]) exposes `POST /api/chat-openai` and forwards
//! the provider's line-delimited event stream verbatim. The client side
//! ([`session`]) consumes that stream, tracks the conversation continuation
//! id, and treats user aborts as successful outcomes.

pub mod auth;
pub mod config;
pub mod decode;
pub mod envelope;
pub mod error;
pub mod event;
pub mod http_client;
pub mod relay;
pub mod session;
pub mod titles;
pub mod upstream;
pub mod validate;

pub use error::{ChatProxyError, CoreResult};
