use crate::lifecycle::validate_transition;
use crate::model::{ContainerRef, ContainerState, ImageRef};
use crate::CoreError;
use berth_engine::{validate_id, EngineClient, ImageFilter};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Container and image lifecycle on top of an injected engine client.
///
/// Every operation inspects the engine first, checks the requested
/// transition, then issues exactly one mutating engine call. Engine failures
/// are always re-signalled as a mapped `CoreError`, never discarded.
///
/// Two concurrent requests on the same container are not serialized here:
/// the engine arbitrates, and the loser sees `InvalidState` or `NotFound`.
#[derive(Clone)]
pub struct LifecycleService {
    engine: Arc<dyn EngineClient>,
}

impl LifecycleService {
    pub fn new(engine: Arc<dyn EngineClient>) -> Self {
        Self { engine }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn health(&self) -> Result<(), CoreError> {
        self.engine.ping().map_err(CoreError::from)
    }

    /// All engine-reported containers; stopped and never-started ones only
    /// when `include_stopped` is set.
    pub fn list_containers(&self, include_stopped: bool) -> Result<Vec<ContainerRef>, CoreError> {
        let containers: Vec<ContainerRef> = self
            .engine
            .list_containers(include_stopped)?
            .into_iter()
            .map(ContainerRef::from)
            .filter(|c| include_stopped || c.state == ContainerState::Running)
            .collect();
        debug!(
            "listed {} containers (include_stopped={include_stopped})",
            containers.len()
        );
        Ok(containers)
    }

    pub fn inspect_container(&self, id: &str) -> Result<ContainerRef, CoreError> {
        validate_id(id)?;
        Ok(self.engine.inspect_container(id)?.into())
    }

    /// Create a container from `image`. The container is left in `Created`.
    pub fn create_container(&self, image: &str) -> Result<ContainerRef, CoreError> {
        let image = image.trim();
        if image.is_empty() {
            return Err(CoreError::InvalidArgument(
                "image name must not be empty".to_owned(),
            ));
        }
        let id = self.engine.create_container(image)?;
        info!("created container {id} from {image}");
        // Names and creation time are assigned by the engine.
        match self.engine.inspect_container(&id) {
            Ok(summary) => Ok(summary.into()),
            Err(e) => {
                warn!("created container {id} but could not inspect it: {e}");
                Ok(ContainerRef {
                    id,
                    state: ContainerState::Created,
                    image: image.to_owned(),
                    names: Vec::new(),
                    created: None,
                })
            }
        }
    }

    /// Start a created or stopped container. Starting a running container
    /// fails with `InvalidState`.
    pub fn start_container(&self, id: &str) -> Result<ContainerRef, CoreError> {
        let current = self.inspect_container(id)?;
        validate_transition(current.state, ContainerState::Running)?;
        self.engine.start_container(&current.id)?;
        info!("started container {}", current.id);
        Ok(current.with_state(ContainerState::Running))
    }

    /// Stop a running container. Stopping a created or stopped container
    /// fails with `InvalidState`.
    pub fn stop_container(&self, id: &str) -> Result<ContainerRef, CoreError> {
        let current = self.inspect_container(id)?;
        validate_transition(current.state, ContainerState::Stopped)?;
        self.engine.stop_container(&current.id)?;
        info!("stopped container {}", current.id);
        Ok(current.with_state(ContainerState::Stopped))
    }

    /// Remove a container. A running container is only removed with `force`.
    pub fn remove_container(&self, id: &str, force: bool) -> Result<ContainerRef, CoreError> {
        let current = self.inspect_container(id)?;
        if current.state == ContainerState::Running {
            if !force {
                return Err(CoreError::InvalidState(format!(
                    "container {} is running; stop it first or force the removal",
                    current.id
                )));
            }
            warn!("force-removing running container {}", current.id);
        } else {
            validate_transition(current.state, ContainerState::Removed)?;
        }
        self.engine.remove_container(&current.id, force)?;
        info!("removed container {}", current.id);
        Ok(current.with_state(ContainerState::Removed))
    }

    /// Create a container and start it. If the start fails the fresh
    /// container is removed again and the start error is returned.
    pub fn run_container(&self, image: &str) -> Result<ContainerRef, CoreError> {
        let created = self.create_container(image)?;
        match self.engine.start_container(&created.id) {
            Ok(()) => {
                info!("started container {}", created.id);
                Ok(created.with_state(ContainerState::Running))
            }
            Err(start_err) => {
                warn!("start of new container {} failed: {start_err}", created.id);
                if let Err(cleanup_err) = self.engine.remove_container(&created.id, true) {
                    error!(
                        "failed to remove container {} after failed start: {cleanup_err}",
                        created.id
                    );
                }
                Err(start_err.into())
            }
        }
    }

    pub fn list_images(&self) -> Result<Vec<ImageRef>, CoreError> {
        let images: Vec<ImageRef> = self
            .engine
            .list_images()?
            .into_iter()
            .map(ImageRef::from)
            .collect();
        debug!("listed {} images", images.len());
        Ok(images)
    }

    /// Images with a reference matching `filter`. The empty filter yields the
    /// same set as [`Self::list_images`].
    pub fn filter_images_by_name(&self, filter: &ImageFilter) -> Result<Vec<ImageRef>, CoreError> {
        if filter.is_empty() {
            return self.list_images();
        }
        let images: Vec<ImageRef> = self
            .engine
            .list_images_filtered(filter)?
            .into_iter()
            .map(ImageRef::from)
            .collect();
        debug!(
            "filter '{}' ({:?}) matched {} images",
            filter.pattern,
            filter.anchor,
            images.len()
        );
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use berth_engine::{ContainerSummary, EngineError, EngineState, ImageSummary, MockEngine};

    fn service() -> (Arc<MockEngine>, LifecycleService) {
        let engine = Arc::new(MockEngine::with_images(&["nginx:latest", "redis:7"]));
        let svc = LifecycleService::new(engine.clone());
        (engine, svc)
    }

    #[test]
    fn create_starts_in_created_state() {
        let (_, svc) = service();
        let c = svc.create_container("  nginx:latest ").unwrap();
        assert_eq!(c.state, ContainerState::Created);
        assert_eq!(c.image, "nginx:latest");
    }

    #[test]
    fn create_reports_engine_assigned_name_and_time() {
        let (_, svc) = service();
        let c = svc.create_container("nginx:latest").unwrap();
        let inspected = svc.inspect_container(&c.id).unwrap();
        assert_eq!(c.names, inspected.names);
        assert!(c.names[0].starts_with("berth_mock_"));
        assert!(c.created.is_some());
        assert_eq!(c.created, inspected.created);
    }

    /// Mock engine whose inspect always fails.
    struct BlindEngine(MockEngine);

    impl EngineClient for BlindEngine {
        fn name(&self) -> &str {
            "blind"
        }
        fn ping(&self) -> Result<(), EngineError> {
            self.0.ping()
        }
        fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, EngineError> {
            self.0.list_containers(all)
        }
        fn inspect_container(&self, _id: &str) -> Result<ContainerSummary, EngineError> {
            Err(EngineError::TransportUnavailable("connection reset".to_owned()))
        }
        fn create_container(&self, image: &str) -> Result<String, EngineError> {
            self.0.create_container(image)
        }
        fn start_container(&self, id: &str) -> Result<(), EngineError> {
            self.0.start_container(id)
        }
        fn stop_container(&self, id: &str) -> Result<(), EngineError> {
            self.0.stop_container(id)
        }
        fn remove_container(&self, id: &str, force: bool) -> Result<(), EngineError> {
            self.0.remove_container(id, force)
        }
        fn list_images(&self) -> Result<Vec<ImageSummary>, EngineError> {
            self.0.list_images()
        }
    }

    #[test]
    fn create_survives_failed_follow_up_inspect() {
        let svc = LifecycleService::new(Arc::new(BlindEngine(MockEngine::new())));
        let c = svc.create_container("redis:7").unwrap();
        assert_eq!(c.id.len(), 64);
        assert_eq!(c.state, ContainerState::Created);
        assert_eq!(c.image, "redis:7");
        assert!(c.names.is_empty());
        assert!(c.created.is_none());
    }

    #[test]
    fn create_with_blank_image_makes_no_engine_call() {
        let (engine, svc) = service();
        assert!(matches!(
            svc.create_container("   "),
            Err(CoreError::InvalidArgument(_))
        ));
        assert_eq!(engine.call_count(), 0);
    }

    #[test]
    fn stop_created_container_is_invalid_state() {
        let (_, svc) = service();
        let c = svc.create_container("nginx:latest").unwrap();
        assert!(matches!(
            svc.stop_container(&c.id),
            Err(CoreError::InvalidState(_))
        ));
    }

    #[test]
    fn remove_running_needs_force() {
        let (_, svc) = service();
        let c = svc.run_container("nginx:latest").unwrap();
        assert!(matches!(
            svc.remove_container(&c.id, false),
            Err(CoreError::InvalidState(_))
        ));
        let removed = svc.remove_container(&c.id, true).unwrap();
        assert_eq!(removed.state, ContainerState::Removed);
        assert!(svc.list_containers(true).unwrap().is_empty());
    }

    #[test]
    fn paused_container_counts_as_running() {
        let (engine, svc) = service();
        let c = svc.create_container("nginx:latest").unwrap();
        engine.force_state(&c.id, EngineState::Paused).unwrap();
        assert!(matches!(
            svc.start_container(&c.id),
            Err(CoreError::InvalidState(_))
        ));
        assert_eq!(svc.stop_container(&c.id).unwrap().state, ContainerState::Stopped);
    }

    #[test]
    fn container_being_removed_accepts_nothing() {
        let (engine, svc) = service();
        let c = svc.create_container("nginx:latest").unwrap();
        engine.force_state(&c.id, EngineState::Removing).unwrap();
        assert!(matches!(
            svc.start_container(&c.id),
            Err(CoreError::InvalidState(_))
        ));
        assert!(matches!(
            svc.remove_container(&c.id, false),
            Err(CoreError::InvalidState(_))
        ));
    }

    #[test]
    fn unreachable_engine_surfaces_as_transport_unavailable() {
        let (engine, svc) = service();
        engine.set_unreachable(true);
        let err = svc.list_containers(false).unwrap_err();
        assert!(matches!(err, CoreError::TransportUnavailable(_)));
        assert!(err.is_retryable());
        assert!(svc.health().is_err());
    }

    #[test]
    fn malformed_id_is_invalid_argument() {
        let (engine, svc) = service();
        assert!(matches!(
            svc.start_container("a/b"),
            Err(CoreError::InvalidArgument(_))
        ));
        assert_eq!(engine.call_count(), 0);
    }
}
