//! Lifecycle service for Berth containers.
//!
//! This crate sits between the HTTP router and the engine adapter. It validates
//! requests, enforces the container state machine (created -> running <-> stopped
//! -> removed), coordinates multi-step operations such as create-then-start, and
//! maps every `EngineError` onto the service error taxonomy. It holds no state of
//! its own: the engine is the source of truth and is injected as an
//! `Arc<dyn EngineClient>`.

pub mod lifecycle;
pub mod model;
pub mod service;

pub use berth_engine::{Anchor, ImageFilter};
pub use lifecycle::validate_transition;
pub use model::{ContainerRef, ContainerState, ImageRef};
pub use service::LifecycleService;

use berth_engine::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("container engine unavailable: {0}")]
    TransportUnavailable(String),
    #[error("container engine error: {0}")]
    Engine(String),
}

impl CoreError {
    /// Stable name of the error kind, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::InvalidArgument(_) => "InvalidArgument",
            CoreError::NotFound(_) => "NotFound",
            CoreError::InvalidState(_) => "InvalidState",
            CoreError::TransportUnavailable(_) => "TransportUnavailable",
            CoreError::Engine(_) => "EngineError",
        }
    }

    /// Whether a caller may retry the same request later with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::TransportUnavailable(_))
    }
}

impl From<EngineError> for CoreError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotFound(what) => CoreError::NotFound(what),
            EngineError::InvalidArgument(msg) => CoreError::InvalidArgument(msg),
            EngineError::TransportUnavailable(msg) => CoreError::TransportUnavailable(msg),
            EngineError::NotModified(id) => {
                CoreError::InvalidState(format!("container '{id}' is already in that state"))
            }
            EngineError::Conflict(msg) => CoreError::InvalidState(msg),
            e @ (EngineError::Engine(_) | EngineError::Decode(_) | EngineError::Config(_)) => {
                CoreError::Engine(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_service_taxonomy() {
        let cases = [
            (EngineError::NotFound("x".into()), "NotFound"),
            (EngineError::InvalidArgument("x".into()), "InvalidArgument"),
            (EngineError::TransportUnavailable("x".into()), "TransportUnavailable"),
            (EngineError::NotModified("x".into()), "InvalidState"),
            (EngineError::Conflict("x".into()), "InvalidState"),
            (EngineError::Engine("x".into()), "EngineError"),
            (EngineError::Decode("x".into()), "EngineError"),
        ];
        for (engine_err, kind) in cases {
            assert_eq!(CoreError::from(engine_err).kind(), kind);
        }
    }

    #[test]
    fn only_transport_failures_are_retryable() {
        assert!(CoreError::TransportUnavailable("down".into()).is_retryable());
        assert!(!CoreError::NotFound("x".into()).is_retryable());
        assert!(!CoreError::InvalidState("x".into()).is_retryable());
    }
}
