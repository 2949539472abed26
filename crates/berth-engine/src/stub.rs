//! Canned Docker Engine for backend tests.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

type Routes = Arc<HashMap<String, (u16, String)>>;
type Captured = Arc<Mutex<Vec<CapturedRequest>>>;

/// Answers `METHOD /path` with a fixed status and body, optionally after a
/// delay. The query is ignored when matching, and so is a leading
/// `/v1.NN` API version segment.
pub struct StubEngine {
    pub url: String,
    requests: Captured,
    _handle: std::thread::JoinHandle<()>,
}

impl StubEngine {
    pub fn start(routes: &[(&str, u16, &str)], delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let (routes, requests) = tables(routes);

        let reqs = Arc::clone(&requests);
        let handle = std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let routes = Arc::clone(&routes);
                let reqs = Arc::clone(&reqs);
                std::thread::spawn(move || serve(stream, &routes, &reqs, delay));
            }
        });

        Self {
            url,
            requests,
            _handle: handle,
        }
    }

    /// Same as [`Self::start`] but listening on a unix socket at `path`.
    #[cfg(unix)]
    pub fn start_unix(path: &std::path::Path, routes: &[(&str, u16, &str)]) -> Self {
        let listener = std::os::unix::net::UnixListener::bind(path).unwrap();
        let url = format!("unix://{}", path.display());
        let (routes, requests) = tables(routes);

        let reqs = Arc::clone(&requests);
        let handle = std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let routes = Arc::clone(&routes);
                let reqs = Arc::clone(&reqs);
                std::thread::spawn(move || serve(stream, &routes, &reqs, Duration::ZERO));
            }
        });

        Self {
            url,
            requests,
            _handle: handle,
        }
    }

    pub fn captured(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn tables(routes: &[(&str, u16, &str)]) -> (Routes, Captured) {
    let routes: HashMap<String, (u16, String)> = routes
        .iter()
        .map(|(k, s, b)| ((*k).to_owned(), (*s, (*b).to_owned())))
        .collect();
    (Arc::new(routes), Arc::new(Mutex::new(Vec::new())))
}

/// Drop a leading `/v<major>.<minor>` segment.
fn unversioned(path: &str) -> &str {
    let Some(rest) = path.strip_prefix("/v") else {
        return path;
    };
    let end = rest.find('/').unwrap_or(rest.len());
    let version = &rest[..end];
    let is_version = version.split('.').count() == 2
        && version.split('.').all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
    if is_version {
        &rest[end..]
    } else {
        path
    }
}

fn serve<S: Read + Write>(mut stream: S, routes: &Routes, reqs: &Captured, delay: Duration) {
    let (method, path, body) = {
        let mut reader = BufReader::new(&mut stream);
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).is_err() {
            return;
        }
        let parts: Vec<&str> = request_line.trim().splitn(3, ' ').collect();
        if parts.len() < 2 {
            return;
        }
        let method = parts[0].to_owned();
        let path = parts[1].to_owned();

        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).is_err() || line.trim().is_empty() {
                break;
            }
            let lower = line.to_lowercase();
            if let Some(val) = lower.strip_prefix("content-length: ") {
                content_length = val.trim().parse().unwrap_or(0);
            }
        }
        let mut body = vec![0u8; content_length];
        if content_length > 0 {
            let _ = reader.read_exact(&mut body);
        }
        (method, path, body)
    };
    reqs.lock().unwrap().push(CapturedRequest {
        method: method.clone(),
        path: path.clone(),
        body,
    });

    std::thread::sleep(delay);

    let route = path.split('?').next().unwrap_or_default();
    let (status, payload) = routes
        .get(&format!("{method} {route}"))
        .or_else(|| routes.get(&format!("{method} {}", unversioned(route))))
        .cloned()
        .unwrap_or((404, r#"{"message":"page not found"}"#.to_owned()));
    let response = format!(
        "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        payload.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

#[test]
fn version_segment_is_stripped() {
    assert_eq!(unversioned("/v1.47/containers/json"), "/containers/json");
    assert_eq!(unversioned("/v1.43"), "");
    assert_eq!(unversioned("/volumes"), "/volumes");
    assert_eq!(unversioned("/_ping"), "/_ping");
}
