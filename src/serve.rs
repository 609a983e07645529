//! HTTP serving layer.
//!
//! Built on `tiny_http`: a fixed pool of worker threads pull requests from
//! one shared listener. Routing is a pure function of the request so it can
//! be tested without sockets.
//!
//! # Routes
//!
//! | Route             | Source                                         |
//! |-------------------|------------------------------------------------|
//! | `/`               | `<generated>/index.html`, placeholder before it |
//! | `/about`          | `[paths] about` fragment, or built-in page     |
//! | `/static/<path>`  | files under the static directory               |
//! | `/<slug>`         | [`RouteRegistry`] handler                      |
//!
//! ```text
//!              ┌──────────┐
//! listener ──► │ worker 1 │──┐
//!     │        ├──────────┤  │    dispatch()    ┌───────────────┐
//!     ├──────► │ worker 2 │──┼────────────────► │ RouteRegistry │ (read lock)
//!     │        ├──────────┤  │                  └───────────────┘
//!     └──────► │ worker N │──┘
//!              └──────────┘
//! ```

use crate::{
    config::{PathsConfig, ServeConfig},
    layout::Layout,
    log,
    registry::RouteRegistry,
};
use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    io::{self, ErrorKind},
    net::{IpAddr, SocketAddr},
    path::{Component, Path, PathBuf},
    sync::{
        Arc,
        mpsc::{self, Receiver, RecvTimeoutError},
    },
    thread,
    time::Duration,
};
use tiny_http::{Header, Method, Request, Response, Server};

/// Built-in `/about` fragment (embedded at compile time)
const ABOUT_TEMPLATE: &str = include_str!("embed/about.html");

/// Shown at `/` until the first index is written
const WELCOME_TEMPLATE: &str = include_str!("embed/welcome.html");

const HTML: &str = "text/html; charset=utf-8";
const TEXT: &str = "text/plain; charset=utf-8";

// ============================================================================
// Routing
// ============================================================================

/// Everything request dispatch reads.
pub struct Router {
    registry: Arc<RouteRegistry>,
    index_file: PathBuf,
    about: Option<PathBuf>,
    static_dir: PathBuf,
    layout: Arc<Layout>,
}

impl Router {
    pub fn new(registry: Arc<RouteRegistry>, paths: &PathsConfig, layout: Arc<Layout>) -> Self {
        Self {
            registry,
            index_file: paths.index_file(),
            about: paths.about.clone(),
            static_dir: paths.static_dir.clone(),
            layout,
        }
    }
}

/// A response, before it is handed to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    fn ok(content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type,
            body,
        }
    }

    fn html(body: String) -> Self {
        Self::ok(HTML, body.into_bytes())
    }

    fn status(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: TEXT,
            body: format!("{status} {message}").into_bytes(),
        }
    }

    fn not_found() -> Self {
        Self::status(404, "Not Found")
    }

    fn internal_error() -> Self {
        Self::status(500, "Internal Server Error")
    }
}

/// Resolve a request to a reply.
///
/// Fixed routes win over registered slugs.
pub fn dispatch(router: &Router, method: &Method, url: &str) -> Reply {
    if !matches!(method, Method::Get | Method::Head) {
        return Reply::status(405, "Method Not Allowed");
    }

    // Strip the query string before decoding so an encoded `?` stays in the path
    let raw_path = url.split(['?', '#']).next().unwrap_or(url);
    let Ok(decoded) = urlencoding::decode(raw_path) else {
        return Reply::status(400, "Bad Request");
    };
    let path = decoded.trim_matches('/');

    match path {
        "" => serve_index(router),
        "about" => serve_about(router),
        _ => match path.strip_prefix("static/") {
            Some(rel) => serve_static(&router.static_dir, rel),
            None if path == "static" => Reply::not_found(),
            None => serve_slug(&router.registry, path),
        },
    }
}

fn serve_index(router: &Router) -> Reply {
    match fs::read(&router.index_file) {
        Ok(body) => Reply::ok(HTML, body),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            Reply::html(router.layout.render("index", WELCOME_TEMPLATE))
        }
        Err(err) => {
            log!("serve"; "failed to read {}: {err}", router.index_file.display());
            Reply::internal_error()
        }
    }
}

fn serve_about(router: &Router) -> Reply {
    let fragment = match &router.about {
        Some(path) => match fs::read_to_string(path) {
            Ok(fragment) => fragment,
            Err(err) => {
                log!("serve"; "failed to read {}: {err}", path.display());
                return Reply::internal_error();
            }
        },
        None => ABOUT_TEMPLATE.to_owned(),
    };
    Reply::html(router.layout.render("about", &fragment))
}

fn serve_static(root: &Path, rel: &str) -> Reply {
    let rel = Path::new(rel);
    // Only plain names: no `..`, no root, no prefixes
    if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
        return Reply::not_found();
    }

    let path = root.join(rel);
    if !path.is_file() {
        return Reply::not_found();
    }
    match fs::read(&path) {
        Ok(body) => Reply::ok(guess_content_type(&path), body),
        Err(err) => {
            log!("serve"; "failed to read {}: {err}", path.display());
            Reply::internal_error()
        }
    }
}

fn serve_slug(registry: &RouteRegistry, slug: &str) -> Reply {
    let Some(entry) = registry.get(slug) else {
        return Reply::not_found();
    };
    match entry.handler.render() {
        Ok(body) => Reply::ok(HTML, body),
        Err(err) => {
            log!("serve"; "failed to render /{}: {err}", entry.slug);
            Reply::internal_error()
        }
    }
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => HTML,
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => TEXT,

        _ => "application/octet-stream",
    }
}

// ============================================================================
// Server
// ============================================================================

pub struct HttpServer {
    server: Arc<Server>,
    router: Arc<Router>,
    workers: usize,
    addr: SocketAddr,
}

/// Unblocks every worker so [`HttpServer::run`] returns.
#[derive(Clone)]
pub struct ServerStopper {
    server: Arc<Server>,
    workers: usize,
}

impl ServerStopper {
    pub fn stop(&self) {
        for _ in 0..self.workers {
            self.server.unblock();
        }
    }
}

/// A server running on its own thread.
pub struct ServerHandle {
    stopper: ServerStopper,
    done: Receiver<()>,
}

impl ServerHandle {
    /// Stop accepting requests and give in-flight ones up to `timeout` to finish.
    ///
    /// Returns `false` if the workers were still busy when time ran out. The
    /// thread is then left detached; a worker writing to a client that never
    /// reads would otherwise hold shutdown forever.
    pub fn stop_within(&self, timeout: Duration) -> bool {
        self.stopper.stop();
        match self.done.recv_timeout(timeout) {
            // The sender is dropped when `run` returns, panics included
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

impl HttpServer {
    /// Bind the listener. Failure is fatal: there is no port retry.
    pub fn bind(config: &ServeConfig, router: Router) -> Result<Self> {
        let interface: IpAddr = config
            .interface
            .parse()
            .with_context(|| format!("invalid interface `{}`", config.interface))?;
        let addr = SocketAddr::new(interface, config.port);
        let server = Server::http(addr).map_err(|e| anyhow!("failed to bind {addr}: {e}"))?;

        Ok(Self {
            server: Arc::new(server),
            router: Arc::new(router),
            workers: config.workers.max(1),
            addr,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.server
            .server_addr()
            .to_ip()
            .unwrap_or(self.addr)
    }

    pub fn stopper(&self) -> ServerStopper {
        ServerStopper {
            server: Arc::clone(&self.server),
            workers: self.workers,
        }
    }

    /// Serve until stopped. Blocks the calling thread.
    pub fn run(self) {
        log!("serve"; "http://{} ({} workers)", self.addr(), self.workers);

        thread::scope(|s| {
            for _ in 0..self.workers {
                s.spawn(|| {
                    for request in self.server.incoming_requests() {
                        handle_request(request, &self.router);
                    }
                });
            }
        });
    }

    /// Run on a named thread and return a handle for a bounded stop.
    pub fn spawn(self) -> io::Result<ServerHandle> {
        let stopper = self.stopper();
        let (done_tx, done) = mpsc::channel();
        thread::Builder::new().name("http".into()).spawn(move || {
            self.run();
            let _ = done_tx.send(());
        })?;
        Ok(ServerHandle { stopper, done })
    }
}

fn handle_request(request: Request, router: &Router) {
    let reply = dispatch(router, request.method(), request.url());

    let mut response = Response::from_data(reply.body).with_status_code(reply.status);
    if let Ok(header) = Header::from_bytes("Content-Type", reply.content_type) {
        response = response.with_header(header);
    }
    if let Err(e) = request.respond(response) {
        log!("serve"; "request error: {e}");
    }
}
