use crate::backend::EngineClient;
use crate::config::{normalize_url, EngineConfig};
use crate::types::{rfc3339, strip_name, timestamp, ContainerSummary, EngineState, ImageSummary};
use crate::{status_error, validate_id, EngineError};
use serde::Deserialize;
use std::io::Read;
use tracing::debug;

/// Docker Engine API backend over plain TCP.
///
/// Speaks the subset of the API the lifecycle needs:
/// - `GET    /_ping`
/// - `GET    /containers/json?all=<bool>`
/// - `GET    /containers/<id>/json`
/// - `POST   /containers/create`        body `{"Image": "<name>"}`
/// - `POST   /containers/<id>/start`    204, 304 when already running
/// - `POST   /containers/<id>/stop`     204, 304 when already stopped
/// - `DELETE /containers/<id>?force=<bool>`
/// - `GET    /images/json`
///
/// Every call is bounded by the configured timeout; expiry and connection
/// failures surface as `TransportUnavailable`.
pub struct HttpEngine {
    base: String,
    agent: ureq::Agent,
}

enum Verb {
    Get,
    Post(Option<Vec<u8>>),
    Delete,
}

struct Reply {
    status: u16,
    body: Vec<u8>,
}

impl Reply {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireContainer {
    id: String,
    #[serde(default)]
    names: Option<Vec<String>>,
    #[serde(default)]
    image: String,
    state: String,
    #[serde(default)]
    created: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireInspect {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    created: Option<String>,
    state: WireInspectState,
    #[serde(default)]
    config: Option<WireConfig>,
    #[serde(default)]
    image: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireInspectState {
    status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireConfig {
    #[serde(default)]
    image: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireImage {
    id: String,
    #[serde(default)]
    repo_tags: Option<Vec<String>>,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    created: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireCreated {
    id: String,
}

#[derive(Deserialize)]
struct WireMessage {
    message: String,
}

impl HttpEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut config = config.clone();
        config.url = normalize_url(&config.url)?;
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout()))
            .http_status_as_error(false)
            .build()
            .into();
        Ok(Self {
            base: config.base_url(),
            agent,
        })
    }

    fn call(&self, verb: Verb, path: &str) -> Result<Reply, EngineError> {
        let url = format!("{}{path}", self.base);
        let result = match verb {
            Verb::Get => {
                debug!("GET {url}");
                self.agent.get(url.as_str()).call()
            }
            Verb::Delete => {
                debug!("DELETE {url}");
                self.agent.delete(url.as_str()).call()
            }
            Verb::Post(None) => {
                debug!("POST {url}");
                self.agent.post(url.as_str()).send_empty()
            }
            Verb::Post(Some(body)) => {
                debug!("POST {url} ({} bytes)", body.len());
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&body[..])
            }
        };
        let resp = result.map_err(|e| transport_error(&url, e))?;
        let status = resp.status().as_u16();

        let mut body = Vec::new();
        resp.into_body()
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| EngineError::TransportUnavailable(format!("{url}: {e}")))?;
        debug!("{url} -> HTTP {status}");
        Ok(Reply { status, body })
    }

    /// Run a call whose only interesting outcome is success or a status error.
    fn expect_empty(&self, verb: Verb, path: &str, subject: &str) -> Result<(), EngineError> {
        let reply = self.call(verb, path)?;
        if reply.is_success() {
            Ok(())
        } else {
            Err(reply_error(reply.status, subject, &reply.body))
        }
    }

    fn fetch<T: for<'de> Deserialize<'de>>(&self, path: &str, subject: &str) -> Result<T, EngineError> {
        let reply = self.call(Verb::Get, path)?;
        if !reply.is_success() {
            return Err(reply_error(reply.status, subject, &reply.body));
        }
        Ok(serde_json::from_slice(&reply.body)?)
    }
}

impl EngineClient for HttpEngine {
    fn name(&self) -> &'static str {
        "http"
    }

    fn ping(&self) -> Result<(), EngineError> {
        self.expect_empty(Verb::Get, "/_ping", "engine")
    }

    fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, EngineError> {
        let wire: Vec<WireContainer> =
            self.fetch(&format!("/containers/json?all={all}"), "containers")?;
        wire.into_iter()
            .map(|c| -> Result<ContainerSummary, EngineError> {
                Ok(ContainerSummary {
                    id: c.id,
                    names: c
                        .names
                        .unwrap_or_default()
                        .iter()
                        .map(|n| strip_name(n))
                        .collect(),
                    image: c.image,
                    state: c.state.parse()?,
                    created_at: timestamp(c.created),
                })
            })
            .collect()
    }

    fn inspect_container(&self, id: &str) -> Result<ContainerSummary, EngineError> {
        validate_id(id)?;
        let wire: WireInspect = self.fetch(&format!("/containers/{id}/json"), id)?;
        let state: EngineState = wire.state.status.parse()?;
        let image = wire
            .config
            .and_then(|c| c.image)
            .unwrap_or(wire.image);
        let created_at = wire.created.as_deref().and_then(rfc3339);
        let names = if wire.name.is_empty() {
            Vec::new()
        } else {
            vec![strip_name(&wire.name)]
        };
        Ok(ContainerSummary {
            id: wire.id,
            names,
            image,
            state,
            created_at,
        })
    }

    fn create_container(&self, image: &str) -> Result<String, EngineError> {
        if image.trim().is_empty() {
            return Err(EngineError::InvalidArgument("image name is empty".to_owned()));
        }
        let body = serde_json::to_vec(&serde_json::json!({ "Image": image }))?;
        let reply = self.call(Verb::Post(Some(body)), "/containers/create")?;
        if !reply.is_success() {
            return Err(reply_error(reply.status, image, &reply.body));
        }
        let created: WireCreated = serde_json::from_slice(&reply.body)?;
        Ok(created.id)
    }

    fn start_container(&self, id: &str) -> Result<(), EngineError> {
        validate_id(id)?;
        self.expect_empty(Verb::Post(None), &format!("/containers/{id}/start"), id)
    }

    fn stop_container(&self, id: &str) -> Result<(), EngineError> {
        validate_id(id)?;
        self.expect_empty(Verb::Post(None), &format!("/containers/{id}/stop"), id)
    }

    fn remove_container(&self, id: &str, force: bool) -> Result<(), EngineError> {
        validate_id(id)?;
        self.expect_empty(Verb::Delete, &format!("/containers/{id}?force={force}"), id)
    }

    fn list_images(&self) -> Result<Vec<ImageSummary>, EngineError> {
        let wire: Vec<WireImage> = self.fetch("/images/json", "images")?;
        Ok(wire
            .into_iter()
            .map(|i| ImageSummary {
                id: i.id,
                repo_tags: i
                    .repo_tags
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|t| t != "<none>:<none>")
                    .collect(),
                size: i.size,
                created_at: timestamp(i.created),
            })
            .collect())
    }
}

fn transport_error(url: &str, e: ureq::Error) -> EngineError {
    match e {
        ureq::Error::StatusCode(code) => status_error(code, url, format!("HTTP {code}")),
        ureq::Error::BadUri(msg) => EngineError::Config(format!("bad engine url {url}: {msg}")),
        other => EngineError::TransportUnavailable(format!("{url}: {other}")),
    }
}

/// Error for a non-2xx reply, with the engine's `message` when it sent one.
fn reply_error(code: u16, subject: &str, body: &[u8]) -> EngineError {
    let message = serde_json::from_slice::<WireMessage>(body)
        .map(|m| m.message)
        .unwrap_or_else(|_| format!("HTTP {code}"));
    status_error(code, subject, message)
}
