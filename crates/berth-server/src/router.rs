//! Request routing: URL parsing, parameter defaulting, status mapping.

use crate::config::RouterConfig;
use crate::query::{split_url, Query};
use berth_core::{Anchor, CoreError, ImageFilter, LifecycleService};
use serde::Serialize;
use thiserror::Error;
use tiny_http::{Header, Method, Response, StatusCode};
use tracing::{debug, warn};

/// Seconds a client should wait before retrying a request the engine could
/// not serve.
pub const RETRY_AFTER_SECS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Health,
    Containers,
    Container(&'a str),
    ContainerAction(&'a str, Action),
    Images,
    ImagesFilter,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("no route for {0}")]
    NoRoute(String),
    #[error("method {method} not allowed on {path}")]
    MethodNotAllowed { method: String, path: String },
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Core(e) => status_for(e),
            ApiError::NoRoute(_) => 404,
            ApiError::MethodNotAllowed { .. } => 405,
            ApiError::Encode(_) => 500,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Core(e) => e.kind(),
            ApiError::NoRoute(_) => "NoRoute",
            ApiError::MethodNotAllowed { .. } => "MethodNotAllowed",
            ApiError::Encode(_) => "Internal",
        }
    }

    /// `Retry-After` value for failures worth retrying unchanged.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            ApiError::Core(e) if e.is_retryable() => Some(RETRY_AFTER_SECS),
            _ => None,
        }
    }
}

/// HTTP status for a service failure.
pub fn status_for(e: &CoreError) -> u16 {
    match e {
        CoreError::InvalidArgument(_) => 400,
        CoreError::NotFound(_) => 404,
        CoreError::InvalidState(_) => 409,
        CoreError::Engine(_) => 502,
        CoreError::TransportUnavailable(_) => 503,
    }
}

/// Parse a request path (query already removed) into a route.
///
/// Routes are accepted bare (`/containers`) and under `/api`
/// (`/api/containers`). A trailing slash is ignored.
pub fn parse_route(path: &str) -> Option<Route<'_>> {
    let path = path
        .strip_prefix("/api")
        .filter(|p| p.is_empty() || p.starts_with('/'))
        .unwrap_or(path);
    let path = path.trim_end_matches('/');
    let segments: Vec<&str> = path.split('/').skip(1).collect();
    match segments.as_slice() {
        ["health"] => Some(Route::Health),
        ["containers"] => Some(Route::Containers),
        ["containers", id] if !id.is_empty() => Some(Route::Container(id)),
        ["containers", id, "start"] if !id.is_empty() => {
            Some(Route::ContainerAction(id, Action::Start))
        }
        ["containers", id, "stop"] if !id.is_empty() => {
            Some(Route::ContainerAction(id, Action::Stop))
        }
        ["images"] => Some(Route::Images),
        ["images", "filter"] => Some(Route::ImagesFilter),
        _ => None,
    }
}

/// A successful response: status plus JSON body.
pub struct Reply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Reply {
    fn ok<T: Serialize>(value: &T) -> Result<Self, ApiError> {
        Ok(Self {
            status: 200,
            body: serde_json::to_vec(value)?,
        })
    }
}

/// Resolve a request to a service call. Pure apart from the service call,
/// so it is testable without a socket.
pub fn dispatch(
    service: &LifecycleService,
    config: &RouterConfig,
    method: &Method,
    url: &str,
) -> Result<Reply, ApiError> {
    let (path, query) = split_url(url)?;
    let route = parse_route(path).ok_or_else(|| ApiError::NoRoute(format!("{method} {path}")))?;
    let not_allowed = || ApiError::MethodNotAllowed {
        method: method.to_string(),
        path: path.to_owned(),
    };

    match (route, method) {
        (Route::Health, Method::Get) => {
            service.health()?;
            Reply::ok(&serde_json::json!({
                "status": "ok",
                "engine": service.engine_name(),
            }))
        }
        (Route::Containers, Method::Get) => {
            let show_all = query.bool_or("showAll", false)?;
            Reply::ok(&service.list_containers(show_all)?)
        }
        (Route::Containers, Method::Post) => {
            let image = required(&query, "imageName")?;
            Reply::ok(&service.create_container(&image)?)
        }
        (Route::Container("run"), Method::Post) => {
            let image = required(&query, "imageName")?;
            Reply::ok(&service.run_container(&image)?)
        }
        (Route::Container(id), Method::Get) => Reply::ok(&service.inspect_container(id)?),
        (Route::Container(id), Method::Delete) => {
            let force = query.bool_or("force", false)?;
            Reply::ok(&service.remove_container(id, force)?)
        }
        (Route::ContainerAction(id, Action::Start), Method::Post) => {
            Reply::ok(&service.start_container(id)?)
        }
        (Route::ContainerAction(id, Action::Stop), Method::Post) => {
            Reply::ok(&service.stop_container(id)?)
        }
        (Route::Images, Method::Get) => Reply::ok(&service.list_images()?),
        (Route::ImagesFilter, Method::Get) => {
            let pattern = query.string_or("filterName", &config.default_image_filter);
            let anchor: Anchor = query
                .get("anchor")
                .unwrap_or_default()
                .parse()
                .map_err(CoreError::from)?;
            let filter = ImageFilter::new(pattern).anchored(anchor);
            Reply::ok(&service.filter_images_by_name(&filter)?)
        }
        _ => Err(not_allowed()),
    }
}

fn required(query: &Query, key: &str) -> Result<String, CoreError> {
    match query.get(key).map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_owned()),
        _ => Err(CoreError::InvalidArgument(format!(
            "query parameter '{key}' is required"
        ))),
    }
}

fn error_body(e: &ApiError) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "error": e.kind(),
        "message": e.to_string(),
    }))
    .unwrap_or_default()
}

fn respond(req: tiny_http::Request, status: u16, body: Vec<u8>, retry_after: Option<u64>) {
    let mut response = Response::from_data(body).with_status_code(StatusCode(status));
    if let Ok(header) = Header::from_bytes("Content-Type", "application/json") {
        response.add_header(header);
    }
    if let Some(secs) = retry_after {
        if let Ok(header) = Header::from_bytes("Retry-After", secs.to_string()) {
            response.add_header(header);
        }
    }
    if let Err(e) = req.respond(response) {
        debug!("client went away before the response was sent: {e}");
    }
}

/// Handle a single HTTP request end to end.
pub fn handle_request(service: &LifecycleService, config: &RouterConfig, req: tiny_http::Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    match dispatch(service, config, &method, &url) {
        Ok(reply) => {
            debug!("{method} {url} -> {}", reply.status);
            respond(req, reply.status, reply.body, None);
        }
        Err(e) => {
            let status = e.status();
            if status >= 500 {
                warn!("{method} {url} -> {status}: {e}");
            } else {
                debug!("{method} {url} -> {status}: {e}");
            }
            respond(req, status, error_body(&e), e.retry_after());
        }
    }
}
