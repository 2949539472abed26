use crate::EngineError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BACKEND: &str = "docker";
pub const DEFAULT_ENGINE_URL: &str = "unix:///var/run/docker.sock";
/// Where the TCP-only `http` backend looks when no address is configured.
pub const DEFAULT_TCP_URL: &str = "http://127.0.0.1:2375";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How to reach the container engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Backend name understood by [`crate::select_engine`]: `docker`, `http` or `mock`.
    pub backend: String,
    /// `unix://` or `npipe://` socket, or a TCP address (`tcp://`, `http://`, `host:port`).
    /// The `http` backend only accepts TCP addresses.
    pub url: String,
    /// Optional API version, e.g. `v1.43`.
    pub api_version: Option<String>,
    /// Per-call timeout covering connect, send and receive.
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_owned(),
            url: DEFAULT_ENGINE_URL.to_owned(),
            api_version: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Where an engine listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Local socket, scheme included (`unix:///run/docker.sock`).
    Socket(String),
    /// HTTP base URL.
    Tcp(String),
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Socket(s) | Endpoint::Tcp(s) => f.write_str(s),
        }
    }
}

impl EngineConfig {
    /// Config for the TCP-only `http` backend.
    pub fn new(url: &str) -> Result<Self, EngineError> {
        Ok(Self {
            backend: "http".to_owned(),
            url: normalize_url(url)?,
            ..Self::default()
        })
    }

    /// Config for the `docker` backend, socket or TCP.
    pub fn docker(url: &str) -> Result<Self, EngineError> {
        Ok(Self {
            url: parse_endpoint(url)?.to_string(),
            ..Self::default()
        })
    }

    pub fn mock() -> Self {
        Self {
            backend: "mock".to_owned(),
            ..Self::default()
        }
    }

    /// Switch backend. The `http` backend cannot use the default socket, so
    /// it moves to [`DEFAULT_TCP_URL`] unless an address was configured.
    pub fn set_backend(&mut self, backend: &str) {
        backend.trim().clone_into(&mut self.backend);
        if self.backend == "http" && self.url == DEFAULT_ENGINE_URL {
            DEFAULT_TCP_URL.clone_into(&mut self.url);
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    #[must_use]
    pub fn with_api_version(mut self, version: &str) -> Self {
        self.api_version = Some(version.trim_matches('/').to_owned());
        self
    }

    /// Point the engine at a `DOCKER_HOST` value if the backend can use it.
    ///
    /// The mock backend ignores it, and the `http` backend ignores socket
    /// addresses. Returns whether the address was taken.
    pub fn apply_docker_host(&mut self, host: &str) -> bool {
        let host = host.trim();
        let usable = !host.is_empty()
            && match self.backend.as_str() {
                "docker" => parse_endpoint(host).is_ok(),
                "http" => normalize_url(host).is_ok(),
                _ => false,
            };
        if usable {
            host.clone_into(&mut self.url);
        }
        usable
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Root URL every `http` backend path is appended to.
    pub fn base_url(&self) -> String {
        match self.api_version.as_deref() {
            Some(v) if !v.is_empty() => format!("{}/{v}", self.url),
            _ => self.url.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.timeout_secs == 0 {
            return Err(EngineError::Config(
                "timeout_secs must be greater than zero".to_owned(),
            ));
        }
        match self.backend.as_str() {
            "docker" => parse_endpoint(&self.url).map(|_| ()),
            "http" => normalize_url(&self.url).map(|_| ()),
            "mock" => Ok(()),
            other => Err(EngineError::Config(format!(
                "unknown engine backend '{other}' (expected docker, http or mock)"
            ))),
        }
    }
}

/// Classify a `DOCKER_HOST`-style address.
///
/// `unix://` and `npipe://` are sockets, as is a bare absolute path.
/// Everything else must be a TCP address, see [`normalize_url`].
pub fn parse_endpoint(raw: &str) -> Result<Endpoint, EngineError> {
    let raw = raw.trim();
    if let Some(path) = raw.strip_prefix("unix://") {
        if path.is_empty() {
            return Err(EngineError::Config("socket path is empty".to_owned()));
        }
        return Ok(Endpoint::Socket(raw.to_owned()));
    }
    if raw.starts_with("npipe://") {
        return Ok(Endpoint::Socket(raw.to_owned()));
    }
    if raw.starts_with('/') {
        return Ok(Endpoint::Socket(format!("unix://{raw}")));
    }
    normalize_url(raw).map(Endpoint::Tcp)
}

/// Turn a TCP engine address into an HTTP base URL.
///
/// `tcp://` becomes `http://`, a bare `host:port` gets `http://`, trailing
/// slashes are dropped. Socket addresses are rejected.
pub fn normalize_url(raw: &str) -> Result<String, EngineError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(EngineError::Config("engine url is empty".to_owned()));
    }
    if raw.starts_with("unix://") || raw.starts_with("npipe://") || raw.starts_with('/') {
        return Err(EngineError::Config(format!(
            "socket endpoint '{raw}' needs the docker backend"
        )));
    }
    let url = if let Some(rest) = raw.strip_prefix("tcp://") {
        format!("http://{rest}")
    } else if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_owned()
    } else if raw.contains("://") {
        return Err(EngineError::Config(format!(
            "unsupported engine url scheme in '{raw}'"
        )));
    } else {
        format!("http://{raw}")
    };
    Ok(url.trim_end_matches('/').to_owned())
}
