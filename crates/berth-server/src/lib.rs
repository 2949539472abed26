//! HTTP front end for the Berth lifecycle service.
//!
//! Routes (also accepted under an `/api` prefix):
//! - `GET    /containers?showAll=<bool>`        list containers (default: running only)
//! - `POST   /containers?imageName=<name>`      create a container
//! - `POST   /containers/run?imageName=<name>`  create and start
//! - `GET    /containers/{id}`                  inspect
//! - `POST   /containers/{id}/start`            start
//! - `POST   /containers/{id}/stop`             stop
//! - `DELETE /containers/{id}?force=<bool>`     remove
//! - `GET    /images`                           list images
//! - `GET    /images/filter?filterName=<s>&anchor=<a>`  filter images by name
//! - `GET    /health`                           engine reachability
//!
//! The [`TestServer`] helper starts a server on a random port for integration testing.

pub mod config;
pub mod query;
pub mod router;

pub use config::{BerthConfig, ConfigError, RouterConfig, ServerSection};
pub use router::{dispatch, handle_request, parse_route, status_for, ApiError, Route};

use berth_core::LifecycleService;
use berth_engine::EngineClient;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tiny_http::Server;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A bound listener plus its worker pool.
///
/// Each worker pulls requests from the shared listener and runs them to
/// completion, so a slow engine call only occupies one worker.
pub struct BerthServer {
    http: Arc<Server>,
    workers: Vec<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

/// Stops a running [`BerthServer`] from another thread (e.g. a signal handler).
#[derive(Clone)]
pub struct ShutdownHandle {
    http: Arc<Server>,
    workers: usize,
}

impl ShutdownHandle {
    /// Wake every worker so its request loop ends. In-flight requests finish.
    pub fn shutdown(&self) {
        for _ in 0..self.workers {
            self.http.unblock();
        }
    }
}

impl BerthServer {
    pub fn bind(
        addr: &str,
        service: LifecycleService,
        router: RouterConfig,
        workers: usize,
    ) -> Result<Self, ServerError> {
        let http = Server::http(addr).map_err(|e| ServerError::Bind {
            addr: addr.to_owned(),
            reason: e.to_string(),
        })?;
        let http = Arc::new(http);
        let local_addr = http.server_addr().to_ip();
        let router = Arc::new(router);

        let workers = (0..workers.max(1))
            .map(|n| {
                let http = Arc::clone(&http);
                let service = service.clone();
                let router = Arc::clone(&router);
                std::thread::spawn(move || {
                    debug!("worker {n} ready");
                    for request in http.incoming_requests() {
                        handle_request(&service, &router, request);
                    }
                    debug!("worker {n} exiting");
                })
            })
            .collect();

        Ok(Self {
            http,
            workers,
            local_addr,
        })
    }

    /// Bind using a loaded config and an already selected engine.
    pub fn from_config(
        config: &BerthConfig,
        engine: Arc<dyn EngineClient>,
    ) -> Result<Self, ServerError> {
        config.validate()?;
        let service = LifecycleService::new(engine);
        Self::bind(
            &config.server.addr(),
            service,
            config.router(),
            config.server.workers,
        )
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            http: Arc::clone(&self.http),
            workers: self.workers.len(),
        }
    }

    /// Block until every worker has exited.
    pub fn join(self) {
        for worker in self.workers {
            let _ = worker.join();
        }
        info!("server stopped");
    }
}

/// A test helper that starts a berth-server on a random port with the given engine.
///
/// The server listens on `127.0.0.1:{port}`. Drop the `TestServer` to stop it.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    shutdown: ShutdownHandle,
    _server: BerthServer,
}

impl TestServer {
    pub fn start(engine: Arc<dyn EngineClient>) -> Self {
        Self::start_with(engine, RouterConfig::default())
    }

    pub fn start_with(engine: Arc<dyn EngineClient>, router: RouterConfig) -> Self {
        let server = BerthServer::bind("127.0.0.1:0", LifecycleService::new(engine), router, 4)
            .expect("failed to bind test HTTP server");
        let port = server.local_addr().expect("not an IP addr").port();
        let url = format!("http://127.0.0.1:{port}");
        Self {
            url,
            port,
            shutdown: server.shutdown_handle(),
            _server: server,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.shutdown();
    }
}
