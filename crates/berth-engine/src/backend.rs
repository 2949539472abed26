use crate::config::EngineConfig;
use crate::filter::ImageFilter;
use crate::types::{ContainerSummary, ImageSummary};
use crate::EngineError;

/// One method per engine primitive.
///
/// Calls block until the engine answers or the configured timeout expires.
/// Implementations never retry and never swallow errors: an unknown id is
/// `NotFound`, an unreachable engine is `TransportUnavailable`, a malformed id
/// is `InvalidArgument` and is rejected before any engine call.
pub trait EngineClient: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap reachability check.
    fn ping(&self) -> Result<(), EngineError>;

    /// List containers. With `all == false` only running containers are returned.
    fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, EngineError>;

    fn inspect_container(&self, id: &str) -> Result<ContainerSummary, EngineError>;

    /// Create a container from `image` and return its engine-assigned id.
    fn create_container(&self, image: &str) -> Result<String, EngineError>;

    fn start_container(&self, id: &str) -> Result<(), EngineError>;

    fn stop_container(&self, id: &str) -> Result<(), EngineError>;

    fn remove_container(&self, id: &str, force: bool) -> Result<(), EngineError>;

    fn list_images(&self) -> Result<Vec<ImageSummary>, EngineError>;

    fn list_images_filtered(&self, filter: &ImageFilter) -> Result<Vec<ImageSummary>, EngineError> {
        Ok(filter.apply(self.list_images()?))
    }
}

pub fn select_engine(config: &EngineConfig) -> Result<Box<dyn EngineClient>, EngineError> {
    config.validate()?;
    match config.backend.as_str() {
        "docker" => Ok(Box::new(crate::docker::DockerEngine::new(config)?)),
        "http" => Ok(Box::new(crate::http::HttpEngine::new(config)?)),
        "mock" => Ok(Box::new(crate::mock::MockEngine::new())),
        other => Err(EngineError::Config(format!(
            "unknown engine backend '{other}' (expected docker, http or mock)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_valid_engines() {
        // connecting is deferred, so no engine has to be listening
        assert_eq!(select_engine(&EngineConfig::default()).unwrap().name(), "docker");
        let tcp = EngineConfig::new("tcp://127.0.0.1:2375").unwrap();
        assert_eq!(select_engine(&tcp).unwrap().name(), "http");
        assert_eq!(select_engine(&EngineConfig::mock()).unwrap().name(), "mock");
    }

    #[test]
    fn select_invalid_engine_fails() {
        let config = EngineConfig {
            backend: "podman-socket".to_owned(),
            ..EngineConfig::default()
        };
        assert!(matches!(select_engine(&config), Err(EngineError::Config(_))));
    }

    #[test]
    fn http_backend_rejects_socket_url() {
        let config = EngineConfig {
            backend: "http".to_owned(),
            url: "unix:///var/run/docker.sock".to_owned(),
            ..EngineConfig::default()
        };
        assert!(select_engine(&config).is_err());
    }
}
