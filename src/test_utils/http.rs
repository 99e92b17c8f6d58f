//! Local release server for exercising the fetcher and the release lookups.
//!
//! Files are registered at any time with [`TestHttpServer::serve`] and answered
//! by mocks for `GET` and `HEAD`. `Range: bytes=N-` is honoured on `GET` unless
//! disabled with [`TestHttpServer::ignore_ranges`].

use anyhow::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{header_exists, method};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[derive(Default)]
struct ServerState {
    routes: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
    ignore_ranges: AtomicBool,
}

/// A local HTTP server serving in-memory files.
///
/// The server stops when the value is dropped.
pub struct TestHttpServer {
    server: MockServer,
    state: Arc<ServerState>,
}

impl TestHttpServer {
    /// Start on an ephemeral localhost port.
    pub async fn start() -> Result<Self> {
        let server = MockServer::start().await;
        let state = Arc::new(ServerState::default());

        // first mounted match wins: ranged GETs before plain ones
        let ranged = Arc::clone(&state);
        Mock::given(method("GET"))
            .and(header_exists("range"))
            .respond_with(move |request: &Request| ranged.respond_ranged(request))
            .mount(&server)
            .await;
        let plain = Arc::clone(&state);
        Mock::given(method("GET"))
            .respond_with(move |request: &Request| plain.respond_whole(request))
            .mount(&server)
            .await;
        let head = Arc::clone(&state);
        Mock::given(method("HEAD"))
            .respond_with(move |request: &Request| head.respond_head(request))
            .mount(&server)
            .await;

        Ok(Self { server, state })
    }

    /// Serve `body` at `path` (which starts with `/`), replacing any previous body.
    pub fn serve(&self, path: &str, body: impl Into<Vec<u8>>) {
        if let Ok(mut routes) = self.state.routes.lock() {
            routes.insert(path.to_string(), body.into());
        }
    }

    /// Answer ranged requests with the whole body and status 200.
    pub fn ignore_ranges(&self) {
        self.state.ignore_ranges.store(true, Ordering::SeqCst);
    }

    /// Absolute URL of `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    /// Requests received so far, as `"METHOD /path"` with ` bytes=N-` appended
    /// for ranged requests.
    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
    }
}

/// Start offset of a `bytes=N-` range header.
fn range_start(request: &Request) -> Option<usize> {
    let value = request.headers.get("range")?.to_str().ok()?;
    value.trim().strip_prefix("bytes=")?.strip_suffix('-')?.parse().ok()
}

impl ServerState {
    /// Log `request` and look up the body of its path.
    fn lookup(&self, request: &Request, range: Option<usize>) -> Option<Vec<u8>> {
        let path = request.url.path();
        if let Ok(mut requests) = self.requests.lock() {
            let mut entry = format!("{} {path}", request.method);
            if let Some(start) = range {
                entry.push_str(&format!(" bytes={start}-"));
            }
            requests.push(entry);
        }
        self.routes.lock().ok().and_then(|routes| routes.get(path).cloned())
    }

    fn respond_whole(&self, request: &Request) -> ResponseTemplate {
        match self.lookup(request, None) {
            Some(body) => ResponseTemplate::new(200).set_body_bytes(body),
            None => ResponseTemplate::new(404),
        }
    }

    /// The length of the body without the body itself.
    fn respond_head(&self, request: &Request) -> ResponseTemplate {
        match self.lookup(request, None) {
            Some(body) => ResponseTemplate::new(200)
                .insert_header("Content-Length", body.len().to_string())
                .set_body_bytes(body),
            None => ResponseTemplate::new(404),
        }
    }

    fn respond_ranged(&self, request: &Request) -> ResponseTemplate {
        let start = range_start(request);
        let Some(body) = self.lookup(request, start) else {
            return ResponseTemplate::new(404);
        };
        let total = body.len();
        match start {
            Some(start) if !self.ignore_ranges.load(Ordering::SeqCst) => {
                if start >= total {
                    ResponseTemplate::new(416)
                        .insert_header("Content-Range", format!("bytes */{total}"))
                } else {
                    ResponseTemplate::new(206)
                        .insert_header(
                            "Content-Range",
                            format!("bytes {}-{}/{}", start, total - 1, total),
                        )
                        .set_body_bytes(body[start..].to_vec())
                }
            }
            // ignored, or a range form other than `bytes=N-`
            _ => ResponseTemplate::new(200).set_body_bytes(body),
        }
    }
}
