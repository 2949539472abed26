use berth_engine::{select_engine, EngineClient};
use berth_server::{BerthConfig, BerthServer};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Parser)]
#[command(
    name = "berth-server",
    version,
    about = "HTTP lifecycle service for containers and images"
)]
struct Cli {
    /// TOML config file with [server] and [engine] tables.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind.
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Number of worker threads serving requests.
    #[arg(long)]
    workers: Option<usize>,

    /// Engine backend: docker (socket or TCP), http (TCP only) or mock.
    #[arg(long)]
    engine: Option<String>,

    /// Engine address (unix:///path, tcp://host:port or http://host:port).
    /// Defaults to DOCKER_HOST, then the local Docker socket.
    #[arg(long)]
    engine_url: Option<String>,

    /// Per-call engine timeout in seconds.
    #[arg(long)]
    engine_timeout: Option<u64>,

    /// Filter pattern applied by /images/filter when filterName is absent.
    #[arg(long)]
    default_image_filter: Option<String>,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Cli {
    /// Effective config: the `--config` file or the defaults, then CLI
    /// flags, then `DOCKER_HOST` when neither a file nor `--engine-url`
    /// named the engine. Validation runs last.
    fn resolve_config(&self, docker_host: Option<&str>) -> Result<BerthConfig, String> {
        let mut config = match &self.config {
            Some(path) => BerthConfig::load(path)
                .map_err(|e| format!("{}: {e}", path.display()))?,
            None => BerthConfig::default(),
        };
        if let Some(bind) = &self.bind {
            config.server.bind.clone_from(bind);
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(workers) = self.workers {
            config.server.workers = workers;
        }
        if let Some(filter) = &self.default_image_filter {
            config.server.default_image_filter.clone_from(filter);
        }
        if let Some(backend) = &self.engine {
            config.engine.set_backend(backend);
        }
        if let Some(url) = &self.engine_url {
            url.trim().clone_into(&mut config.engine.url);
        }
        if let Some(secs) = self.engine_timeout {
            config.engine.timeout_secs = secs;
        }
        if self.config.is_none() && self.engine_url.is_none() {
            if let Some(host) = docker_host {
                if !config.engine.apply_docker_host(host) {
                    debug!(
                        "DOCKER_HOST={host} not used by the {} backend",
                        config.engine.backend
                    );
                }
            }
        }
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let docker_host = std::env::var("DOCKER_HOST").ok();
    let config = match cli.resolve_config(docker_host.as_deref()) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("error: {msg}");
            return ExitCode::FAILURE;
        }
    };

    let engine = match select_engine(&config.engine) {
        Ok(e) => Arc::<dyn EngineClient>::from(e),
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = engine.ping() {
        // The service still starts; requests report 503 until the engine is back.
        error!("engine at {} not reachable: {e}", config.engine.url);
    }

    let addr = config.server.addr();
    let server = match BerthServer::from_config(&config, engine) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        "berth-server listening on {addr} ({} workers, engine {} at {})",
        config.server.workers, config.engine.backend, config.engine.url
    );

    let shutdown = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("shutdown requested, finishing in-flight requests...");
        shutdown.shutdown();
    }) {
        error!("failed to install signal handler: {e}");
    }

    server.join();
    ExitCode::SUCCESS
}
