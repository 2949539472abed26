//! Container engine client adapters for Berth.
//!
//! This crate is the only place that talks to a container engine. It exposes the
//! `EngineClient` trait with one method per engine primitive (list, create, start,
//! stop, remove, inspect, list images) and three backends: `docker`, built on
//! `bollard` and reaching the engine over its local socket or TCP; `http`, a
//! lean TCP-only client of the same API on `ureq`; and an in-memory mock engine
//! with the same semantics for tests and demos. Transport failures are converted
//! into typed `EngineError` values here so callers never see client errors.

pub mod backend;
pub mod config;
pub mod docker;
pub mod filter;
pub mod http;
pub mod mock;
pub mod types;

#[cfg(test)]
mod stub;

pub use backend::{select_engine, EngineClient};
pub use config::{Endpoint, EngineConfig};
pub use docker::DockerEngine;
pub use filter::{Anchor, ImageFilter};
pub use http::HttpEngine;
pub use mock::MockEngine;
pub use types::{ContainerSummary, EngineState, ImageSummary};

use thiserror::Error;

/// Longest identifier accepted before any engine call is made.
pub const MAX_ID_LEN: usize = 128;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no such container or image: {0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("engine unavailable: {0}")]
    TransportUnavailable(String),
    #[error("container '{0}' is already in the requested state")]
    NotModified(String),
    #[error("engine conflict: {0}")]
    Conflict(String),
    #[error("engine error: {0}")]
    Engine(String),
    #[error("failed to decode engine response: {0}")]
    Decode(String),
    #[error("engine config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Decode(e.to_string())
    }
}

/// Map an engine status code to an error. `subject` names the container or
/// image the call was about.
pub(crate) fn status_error(code: u16, subject: &str, message: String) -> EngineError {
    match code {
        304 => EngineError::NotModified(subject.to_owned()),
        400 => EngineError::InvalidArgument(message),
        404 => EngineError::NotFound(subject.to_owned()),
        409 => EngineError::Conflict(message),
        503 => EngineError::TransportUnavailable(message),
        _ => EngineError::Engine(format!("HTTP {code} for {subject}: {message}")),
    }
}

/// Reject identifiers that could not name a container.
///
/// Accepts full or short hex ids as well as container names: 1 to
/// [`MAX_ID_LEN`] characters, leading ASCII alphanumeric, then ASCII
/// alphanumerics or `_`, `.`, `-`. Anything else would escape the URL path
/// segment it is interpolated into.
pub fn validate_id(id: &str) -> Result<(), EngineError> {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return Err(EngineError::InvalidArgument(format!(
            "container id must be 1-{MAX_ID_LEN} characters, got {}",
            id.len()
        )));
    }
    let mut chars = id.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if first_ok && rest_ok {
        Ok(())
    } else {
        Err(EngineError::InvalidArgument(format!(
            "container id '{id}' contains invalid characters"
        )))
    }
}
