use crate::backend::EngineClient;
use crate::types::{ContainerSummary, EngineState, ImageSummary};
use crate::{validate_id, EngineError};
use chrono::Utc;
use std::sync::{Mutex, MutexGuard};

/// In-memory engine that follows Docker's answers for each primitive:
/// 304-style `NotModified` on redundant start/stop, `Conflict` when removing
/// a running container without force, `NotFound` for unknown ids.
pub struct MockEngine {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    containers: Vec<ContainerSummary>,
    images: Vec<ImageSummary>,
    next_id: u64,
    calls: usize,
    unreachable: bool,
}

impl MockState {
    /// Resolve an id the way the engine does: exact id, name, then unique prefix.
    fn position(&self, id: &str) -> Result<usize, EngineError> {
        if let Some(i) = self
            .containers
            .iter()
            .position(|c| c.id == id || c.names.iter().any(|n| n == id))
        {
            return Ok(i);
        }
        let mut prefixed = self
            .containers
            .iter()
            .enumerate()
            .filter(|(_, c)| c.id.starts_with(id));
        match (prefixed.next(), prefixed.next()) {
            (Some((i, _)), None) => Ok(i),
            (Some(_), Some(_)) => Err(EngineError::InvalidArgument(format!(
                "id prefix '{id}' is ambiguous"
            ))),
            _ => Err(EngineError::NotFound(id.to_owned())),
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the image list with one image per `name:tag` reference.
    pub fn with_images(tags: &[&str]) -> Self {
        let engine = Self::new();
        for tag in tags {
            engine.add_image(tag);
        }
        engine
    }

    pub fn add_image(&self, tag: &str) {
        if let Ok(mut state) = self.state.lock() {
            let n = state.images.len() + 1;
            state.images.push(ImageSummary {
                id: format!("sha256:{n:064x}"),
                repo_tags: vec![tag.to_owned()],
                size: 1024 * n as i64,
                created_at: Some(Utc::now()),
            });
        }
    }

    /// Number of engine primitives invoked so far.
    pub fn call_count(&self) -> usize {
        self.state.lock().map(|s| s.calls).unwrap_or(0)
    }

    /// Make every subsequent call fail as if the engine were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.unreachable = unreachable;
        }
    }

    /// Change a container's state behind the service's back, as another
    /// engine client would.
    pub fn force_state(&self, id: &str, engine_state: EngineState) -> Result<(), EngineError> {
        let mut state = self.lock()?;
        let i = state.position(id)?;
        state.containers[i].state = engine_state;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>, EngineError> {
        self.state
            .lock()
            .map_err(|e| EngineError::Engine(format!("mutex poisoned: {e}")))
    }

    /// Lock, count the call and fail if the engine is marked unreachable.
    fn enter(&self) -> Result<MutexGuard<'_, MockState>, EngineError> {
        let mut state = self.lock()?;
        state.calls += 1;
        if state.unreachable {
            return Err(EngineError::TransportUnavailable(
                "mock engine is unreachable".to_owned(),
            ));
        }
        Ok(state)
    }
}

impl EngineClient for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn ping(&self) -> Result<(), EngineError> {
        self.enter().map(|_| ())
    }

    fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, EngineError> {
        let state = self.enter()?;
        Ok(state
            .containers
            .iter()
            .filter(|c| all || c.state.is_running())
            .cloned()
            .collect())
    }

    fn inspect_container(&self, id: &str) -> Result<ContainerSummary, EngineError> {
        validate_id(id)?;
        let state = self.enter()?;
        let i = state.position(id)?;
        Ok(state.containers[i].clone())
    }

    fn create_container(&self, image: &str) -> Result<String, EngineError> {
        if image.trim().is_empty() {
            return Err(EngineError::InvalidArgument("image name is empty".to_owned()));
        }
        let mut state = self.enter()?;
        state.next_id += 1;
        let n = state.next_id;
        let id = format!("{n:064x}");
        state.containers.push(ContainerSummary {
            id: id.clone(),
            names: vec![format!("berth_mock_{n}")],
            image: image.to_owned(),
            state: EngineState::Created,
            created_at: Some(Utc::now()),
        });
        Ok(id)
    }

    fn start_container(&self, id: &str) -> Result<(), EngineError> {
        validate_id(id)?;
        let mut state = self.enter()?;
        let i = state.position(id)?;
        let container = &mut state.containers[i];
        if container.state.is_running() {
            return Err(EngineError::NotModified(container.id.clone()));
        }
        container.state = EngineState::Running;
        Ok(())
    }

    fn stop_container(&self, id: &str) -> Result<(), EngineError> {
        validate_id(id)?;
        let mut state = self.enter()?;
        let i = state.position(id)?;
        let container = &mut state.containers[i];
        if !container.state.is_running() {
            return Err(EngineError::NotModified(container.id.clone()));
        }
        container.state = EngineState::Exited;
        Ok(())
    }

    fn remove_container(&self, id: &str, force: bool) -> Result<(), EngineError> {
        validate_id(id)?;
        let mut state = self.enter()?;
        let i = state.position(id)?;
        if state.containers[i].state.is_running() && !force {
            return Err(EngineError::Conflict(format!(
                "cannot remove running container {id}: stop it first or force the removal"
            )));
        }
        state.containers.remove(i);
        Ok(())
    }

    fn list_images(&self) -> Result<Vec<ImageSummary>, EngineError> {
        let state = self.enter()?;
        Ok(state.images.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ImageFilter;

    #[test]
    fn mock_lifecycle() {
        let engine = MockEngine::new();
        let id = engine.create_container("nginx:latest").unwrap();
        assert_eq!(id.len(), 64);
        let created = engine.inspect_container(&id).unwrap();
        assert_eq!(created.state, EngineState::Created);
        assert!(created.created_at.is_some());

        engine.start_container(&id).unwrap();
        assert_eq!(
            engine.inspect_container(&id).unwrap().state,
            EngineState::Running
        );
        assert!(matches!(
            engine.start_container(&id),
            Err(EngineError::NotModified(_))
        ));

        engine.stop_container(&id).unwrap();
        assert!(matches!(
            engine.stop_container(&id),
            Err(EngineError::NotModified(_))
        ));

        engine.remove_container(&id, false).unwrap();
        assert!(matches!(
            engine.inspect_container(&id),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn remove_running_requires_force() {
        let engine = MockEngine::new();
        let id = engine.create_container("redis:7").unwrap();
        engine.start_container(&id).unwrap();
        assert!(matches!(
            engine.remove_container(&id, false),
            Err(EngineError::Conflict(_))
        ));
        engine.remove_container(&id, true).unwrap();
        assert!(engine.list_containers(true).unwrap().is_empty());
    }

    #[test]
    fn list_without_all_shows_only_running() {
        let engine = MockEngine::new();
        let a = engine.create_container("nginx:latest").unwrap();
        let b = engine.create_container("nginx:latest").unwrap();
        engine.start_container(&a).unwrap();

        let running = engine.list_containers(false).unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, a);

        let all: Vec<String> = engine
            .list_containers(true)
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(all, vec![a, b]);
    }

    #[test]
    fn resolves_names_and_unique_prefixes() {
        let engine = MockEngine::new();
        let id = engine.create_container("nginx:latest").unwrap();
        assert_eq!(engine.inspect_container("berth_mock_1").unwrap().id, id);

        engine.create_container("nginx:latest").unwrap();
        // both ids share the zero-padded prefix
        assert!(matches!(
            engine.inspect_container("0000"),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unreachable_engine_fails_every_call() {
        let engine = MockEngine::new();
        engine.set_unreachable(true);
        assert!(matches!(
            engine.ping(),
            Err(EngineError::TransportUnavailable(_))
        ));
        assert!(matches!(
            engine.list_images(),
            Err(EngineError::TransportUnavailable(_))
        ));
        engine.set_unreachable(false);
        assert!(engine.ping().is_ok());
    }

    #[test]
    fn invalid_id_is_rejected_without_a_call() {
        let engine = MockEngine::new();
        assert!(matches!(
            engine.start_container("../x"),
            Err(EngineError::InvalidArgument(_))
        ));
        assert_eq!(engine.call_count(), 0);
    }

    #[test]
    fn filtered_listing_uses_default_trait_filtering() {
        let engine = MockEngine::with_images(&["nginx:latest", "redis:7", "nginx:stable"]);
        let nginx = engine
            .list_images_filtered(&ImageFilter::new("nginx"))
            .unwrap();
        assert_eq!(nginx.len(), 2);
        assert_eq!(
            engine.list_images_filtered(&ImageFilter::default()).unwrap(),
            engine.list_images().unwrap()
        );
    }
}
