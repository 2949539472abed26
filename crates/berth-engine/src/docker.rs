use crate::backend::EngineClient;
use crate::config::{parse_endpoint, Endpoint, EngineConfig};
use crate::types::{rfc3339, strip_name, timestamp, ContainerSummary, EngineState, ImageSummary};
use crate::{status_error, validate_id, EngineError};
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions,
};
use bollard::image::ListImagesOptions;
use bollard::{ClientVersion, Docker, API_DEFAULT_VERSION};
use std::future::Future;
use std::sync::Mutex;
use tokio::runtime::Runtime;
use tracing::debug;

/// Docker Engine backend built on `bollard`.
///
/// Reaches the engine over its local socket (`unix://`, `npipe://`) or TCP.
/// Every call is driven to completion on a private tokio runtime, so the
/// `EngineClient` surface stays blocking. The client connects on first use
/// and retries the connection on later calls until it succeeds, so the
/// service can come up before the engine does.
pub struct DockerEngine {
    endpoint: Endpoint,
    timeout_secs: u64,
    version: Option<(usize, usize)>,
    runtime: Runtime,
    client: Mutex<Option<Docker>>,
}

impl DockerEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let endpoint = parse_endpoint(&config.url)?;
        let version = match config.api_version.as_deref() {
            Some(v) if !v.is_empty() => Some(parse_api_version(v)?),
            _ => None,
        };
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("berth-engine")
            .enable_all()
            .build()
            .map_err(|e| EngineError::Config(format!("failed to start engine runtime: {e}")))?;
        Ok(Self {
            endpoint,
            timeout_secs: config.timeout_secs,
            version,
            runtime,
            client: Mutex::new(None),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn connect(&self) -> Result<Docker, EngineError> {
        let mut slot = self
            .client
            .lock()
            .map_err(|e| EngineError::Engine(format!("mutex poisoned: {e}")))?;
        if let Some(docker) = slot.as_ref() {
            return Ok(docker.clone());
        }

        let pinned = self.version.map(|(major_version, minor_version)| ClientVersion {
            major_version,
            minor_version,
        });
        let version = pinned.as_ref().unwrap_or(API_DEFAULT_VERSION);
        let _guard = self.runtime.enter();
        let docker = match &self.endpoint {
            Endpoint::Socket(path) => {
                let path = path.strip_prefix("unix://").unwrap_or(path);
                Docker::connect_with_socket(path, self.timeout_secs, version)
            }
            Endpoint::Tcp(url) => Docker::connect_with_http(url, self.timeout_secs, version),
        }
        .map_err(|e| EngineError::TransportUnavailable(format!("{}: {e}", self.endpoint)))?;
        debug!("connected to docker engine at {}", self.endpoint);
        *slot = Some(docker.clone());
        Ok(docker)
    }

    /// Run one bollard call to completion and map its error.
    fn call<T, F>(
        &self,
        subject: &str,
        request: impl FnOnce(Docker) -> F,
    ) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, bollard::errors::Error>>,
    {
        let docker = self.connect()?;
        self.runtime
            .block_on(request(docker))
            .map_err(|e| docker_error(e, subject))
    }
}

impl EngineClient for DockerEngine {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn ping(&self) -> Result<(), EngineError> {
        self.call("engine", |docker| async move { docker.ping().await })
            .map(|_| ())
    }

    fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, EngineError> {
        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };
        let wire = self.call("containers", |docker| async move {
            docker.list_containers(Some(options)).await
        })?;
        wire.into_iter()
            .map(|c| -> Result<ContainerSummary, EngineError> {
                Ok(ContainerSummary {
                    id: c.id.unwrap_or_default(),
                    names: c
                        .names
                        .unwrap_or_default()
                        .iter()
                        .map(|n| strip_name(n))
                        .collect(),
                    image: c.image.unwrap_or_default(),
                    state: c.state.unwrap_or_default().parse()?,
                    created_at: c.created.and_then(timestamp),
                })
            })
            .collect()
    }

    fn inspect_container(&self, id: &str) -> Result<ContainerSummary, EngineError> {
        validate_id(id)?;
        let details = self.call(id, |docker| async move {
            docker.inspect_container(id, None).await
        })?;

        let status = details
            .state
            .and_then(|s| s.status)
            .ok_or_else(|| EngineError::Decode(format!("no state reported for {id}")))?;
        let state: EngineState = serde_json::to_value(status)?
            .as_str()
            .unwrap_or_default()
            .parse()?;
        let image = details
            .config
            .and_then(|c| c.image)
            .or(details.image)
            .unwrap_or_default();
        let names = details
            .name
            .filter(|n| !n.is_empty())
            .map(|n| vec![strip_name(&n)])
            .unwrap_or_default();
        Ok(ContainerSummary {
            id: details.id.unwrap_or_else(|| id.to_owned()),
            names,
            image,
            state,
            created_at: details.created.as_deref().and_then(rfc3339),
        })
    }

    fn create_container(&self, image: &str) -> Result<String, EngineError> {
        if image.trim().is_empty() {
            return Err(EngineError::InvalidArgument("image name is empty".to_owned()));
        }
        let config = Config {
            image: Some(image.to_owned()),
            ..Default::default()
        };
        let created = self.call(image, |docker| async move {
            docker
                .create_container(None::<CreateContainerOptions<String>>, config)
                .await
        })?;
        Ok(created.id)
    }

    fn start_container(&self, id: &str) -> Result<(), EngineError> {
        validate_id(id)?;
        self.call(id, |docker| async move {
            docker
                .start_container(id, None::<StartContainerOptions<String>>)
                .await
        })
    }

    fn stop_container(&self, id: &str) -> Result<(), EngineError> {
        validate_id(id)?;
        self.call(id, |docker| async move { docker.stop_container(id, None).await })
    }

    fn remove_container(&self, id: &str, force: bool) -> Result<(), EngineError> {
        validate_id(id)?;
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        self.call(id, |docker| async move {
            docker.remove_container(id, Some(options)).await
        })
    }

    fn list_images(&self) -> Result<Vec<ImageSummary>, EngineError> {
        let options = ListImagesOptions::<String> {
            all: false,
            ..Default::default()
        };
        let wire = self.call("images", |docker| async move {
            docker.list_images(Some(options)).await
        })?;
        Ok(wire
            .into_iter()
            .map(|i| ImageSummary {
                id: i.id,
                repo_tags: i
                    .repo_tags
                    .into_iter()
                    .filter(|t| t != "<none>:<none>")
                    .collect(),
                size: i.size,
                created_at: timestamp(i.created),
            })
            .collect())
    }
}

/// `v1.43` or `1.43` to `(1, 43)`.
fn parse_api_version(raw: &str) -> Result<(usize, usize), EngineError> {
    let invalid = || EngineError::Config(format!("invalid api_version '{raw}', expected v1.NN"));
    let digits = raw.trim_start_matches('v');
    let (major, minor) = digits.split_once('.').ok_or_else(invalid)?;
    Ok((
        major.parse().map_err(|_| invalid())?,
        minor.parse().map_err(|_| invalid())?,
    ))
}

fn docker_error(e: bollard::errors::Error, subject: &str) -> EngineError {
    use bollard::errors::Error;
    match e {
        Error::DockerResponseServerError {
            status_code,
            message,
        } => status_error(status_code, subject, message),
        Error::JsonDataError { .. } | Error::JsonSerdeError { .. } => {
            EngineError::Decode(e.to_string())
        }
        other => EngineError::TransportUnavailable(format!("{subject}: {other}")),
    }
}
