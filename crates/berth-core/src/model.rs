use berth_engine::{ContainerSummary, EngineState, ImageSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a container as the service sees it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Stopped,
    Removed,
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerState::Created => write!(f, "created"),
            ContainerState::Running => write!(f, "running"),
            ContainerState::Stopped => write!(f, "stopped"),
            ContainerState::Removed => write!(f, "removed"),
        }
    }
}

impl From<EngineState> for ContainerState {
    fn from(s: EngineState) -> Self {
        match s {
            EngineState::Created => ContainerState::Created,
            EngineState::Running | EngineState::Paused | EngineState::Restarting => {
                ContainerState::Running
            }
            EngineState::Exited | EngineState::Dead => ContainerState::Stopped,
            EngineState::Removing => ContainerState::Removed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerRef {
    pub id: String,
    pub state: ContainerState,
    pub image: String,
    #[serde(default)]
    pub names: Vec<String>,
    /// Creation time reported by the engine, when known.
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

impl ContainerRef {
    #[must_use]
    pub fn with_state(mut self, state: ContainerState) -> Self {
        self.state = state;
        self
    }
}

impl From<ContainerSummary> for ContainerRef {
    fn from(c: ContainerSummary) -> Self {
        Self {
            id: c.id,
            state: c.state.into(),
            image: c.image,
            names: c.names,
            created: c.created_at,
        }
    }
}

/// An engine image. Read-only: the service never creates or deletes images.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageRef {
    pub id: String,
    pub tags: Vec<String>,
    pub size: i64,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

impl From<ImageSummary> for ImageRef {
    fn from(i: ImageSummary) -> Self {
        Self {
            id: i.id,
            tags: i.repo_tags,
            size: i.size,
            created: i.created_at,
        }
    }
}
