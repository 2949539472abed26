use crate::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Container state in the engine's own vocabulary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}

impl EngineState {
    pub fn is_running(self) -> bool {
        matches!(
            self,
            EngineState::Running | EngineState::Paused | EngineState::Restarting
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngineState::Created => "created",
            EngineState::Running => "running",
            EngineState::Paused => "paused",
            EngineState::Restarting => "restarting",
            EngineState::Removing => "removing",
            EngineState::Exited => "exited",
            EngineState::Dead => "dead",
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineState {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "created" => Ok(EngineState::Created),
            "running" => Ok(EngineState::Running),
            "paused" => Ok(EngineState::Paused),
            "restarting" => Ok(EngineState::Restarting),
            "removing" => Ok(EngineState::Removing),
            "exited" => Ok(EngineState::Exited),
            "dead" => Ok(EngineState::Dead),
            other => Err(EngineError::Decode(format!(
                "unknown container state '{other}'"
            ))),
        }
    }
}

/// One container as reported by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    /// Names without the leading `/` the engine prefixes them with.
    pub names: Vec<String>,
    pub image: String,
    pub state: EngineState,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// One image as reported by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageSummary {
    pub id: String,
    /// `name:tag` references; empty for dangling images.
    pub repo_tags: Vec<String>,
    pub size: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

pub(crate) fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}

pub(crate) fn rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

pub(crate) fn strip_name(name: &str) -> String {
    name.trim_start_matches('/').to_owned()
}
