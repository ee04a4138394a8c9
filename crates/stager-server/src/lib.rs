//! HTTP front end for the stager.
//!
//! Two routes drive a staging: the controller posts a staging request to
//! `/v1/staging/{guid}`, which becomes a task recipe submitted to the
//! scheduler; the scheduler later posts the finished task to
//! `/v1/staging/{guid}/completed`, which becomes a staging response forwarded
//! to the controller.
//!
//! The [`TestServer`] helper starts a server on a random port for integration testing.

pub mod client;
pub mod config;

pub use client::{CompletionForwarder, HttpControllerClient, HttpSchedulerClient, TaskSubmitter};
pub use config::{parse_lifecycles, ServerConfig, DEFAULT_LISTEN_ADDR};

use stager_backend::{lifecycle_of_result, select_backend, BackendError, Config};
use stager_schema::{
    parse_staging_request, parse_task_result, Lifecycle, StagingGuid, StagingResponse,
    TaskRecipe,
};
use std::sync::Arc;
use thiserror::Error;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("stager config error: {0}")]
    Config(String),
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Status reported to the caller: its own input is at fault (400), a peer
    /// is unavailable (503), or the stager itself is (500).
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Backend(BackendError::Serialization(_)) => 500,
            Self::Backend(_) | Self::BadRequest(_) => 400,
            Self::Http(_) => 503,
            Self::Serialization(_) | Self::Config(_) | Self::Bind { .. } | Self::Io(_) => 500,
        }
    }
}

/// Couples the translation core with the scheduler and controller clients.
pub struct Stager {
    config: Config,
    scheduler: Box<dyn TaskSubmitter>,
    controller: Box<dyn CompletionForwarder>,
}

impl Stager {
    pub fn new(
        config: Config,
        scheduler: Box<dyn TaskSubmitter>,
        controller: Box<dyn CompletionForwarder>,
    ) -> Self {
        Self {
            config,
            scheduler,
            controller,
        }
    }

    /// Wire up the HTTP clients described by `server_config`.
    pub fn from_server_config(server_config: &ServerConfig) -> Self {
        Self::new(
            server_config.backend_config(),
            Box::new(HttpSchedulerClient::new(&server_config.diego_api_url)),
            Box::new(HttpControllerClient::new(&server_config.cc_base_url)),
        )
    }

    /// Build the recipe for a staging request and submit it.
    pub fn stage(
        &self,
        staging_guid: &StagingGuid,
        body: &[u8],
    ) -> Result<TaskRecipe, ServerError> {
        let request = parse_staging_request(body)
            .map_err(|e| ServerError::BadRequest(format!("invalid staging request: {e}")))?;
        let lifecycle = Lifecycle::from_name(&request.lifecycle);
        let recipe = select_backend(lifecycle, &self.config).build_recipe(staging_guid, &request)?;
        debug!(
            "recipe for {staging_guid}: {} root action, rootfs {}",
            recipe.action.kind(),
            recipe.rootfs
        );
        self.scheduler.submit_task(&recipe)?;
        info!("submitted {lifecycle} staging task {staging_guid} for app {}", request.app_id);
        Ok(recipe)
    }

    /// Translate a completed task and forward the result to the controller.
    /// Nothing is forwarded unless translation succeeds.
    pub fn complete(
        &self,
        staging_guid: &StagingGuid,
        body: &[u8],
    ) -> Result<StagingResponse, ServerError> {
        let task_result = parse_task_result(body)
            .map_err(|e| ServerError::BadRequest(format!("invalid task result: {e}")))?;
        let lifecycle = lifecycle_of_result(&task_result)?;
        let response =
            select_backend(lifecycle, &self.config).build_staging_response(&task_result)?;
        self.controller.forward_completion(staging_guid, &response)?;
        match &response.error {
            Some(err) => info!("staging {staging_guid} failed: {}", err.message),
            None => info!("staging {staging_guid} completed"),
        }
        Ok(response)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Stage(&'a str),
    Completed(&'a str),
    Health,
}

/// Parse a request path (query string ignored) into a route.
pub fn parse_route(url: &str) -> Option<Route<'_>> {
    let path = url.split_once('?').map_or(url, |(path, _)| path);
    if path == "/health" {
        return Some(Route::Health);
    }
    let rest = path.strip_prefix("/v1/staging/")?;
    match rest.split_once('/') {
        None if !rest.is_empty() => Some(Route::Stage(rest)),
        Some((guid, "completed")) if !guid.is_empty() => Some(Route::Completed(guid)),
        _ => None,
    }
}

fn respond_json(req: tiny_http::Request, code: u16, body: impl Into<Vec<u8>>) {
    let mut response = Response::from_data(body.into()).with_status_code(StatusCode(code));
    if let Ok(header) = Header::from_bytes("Content-Type", "application/json") {
        response.add_header(header);
    }
    let _ = req.respond(response);
}

fn respond_err(req: tiny_http::Request, err: &ServerError) {
    let code = err.status_code();
    if code >= 500 {
        error!("{err}");
    } else {
        warn!("{err}");
    }
    let body = serde_json::json!({ "error": err.to_string() }).to_string();
    respond_json(req, code, body);
}

fn read_body(req: &mut tiny_http::Request) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    if req.as_reader().read_to_end(&mut body).is_ok() {
        Some(body)
    } else {
        None
    }
}

/// Handle a single HTTP request, dispatching to the appropriate route handler.
pub fn handle_request(stager: &Stager, mut req: tiny_http::Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    let Some(route) = parse_route(&url) else {
        respond_json(req, 404, r#"{"error":"not found"}"#);
        return;
    };

    match (route, &method) {
        (Route::Health, Method::Get) => respond_json(req, 200, r#"{"status":"ok"}"#),
        (Route::Stage(guid), Method::Post) => {
            let Some(body) = read_body(&mut req) else {
                respond_err(req, &ServerError::BadRequest("unreadable body".to_owned()));
                return;
            };
            match stager.stage(&StagingGuid::from(guid), &body) {
                Ok(_) => respond_json(req, 202, "{}"),
                Err(e) => respond_err(req, &e),
            }
        }
        (Route::Completed(guid), Method::Post) => {
            let Some(body) = read_body(&mut req) else {
                respond_err(req, &ServerError::BadRequest("unreadable body".to_owned()));
                return;
            };
            match stager.complete(&StagingGuid::from(guid), &body) {
                Ok(_) => respond_json(req, 200, "{}"),
                Err(e) => respond_err(req, &e),
            }
        }
        _ => respond_json(req, 405, r#"{"error":"method not allowed"}"#),
    }
}

/// Start the server loop, blocking the current thread.
pub fn run_server(stager: &Stager, addr: &str) -> Result<(), ServerError> {
    let server = Server::http(addr).map_err(|e| ServerError::Bind {
        addr: addr.to_owned(),
        reason: e.to_string(),
    })?;
    info!("listening on {addr}");
    for request in server.incoming_requests() {
        handle_request(stager, request);
    }
    Ok(())
}

/// A test helper that starts a stager on a random port in a background thread.
///
/// Drop the `TestServer` to stop accepting requests (via `Server::unblock`).
pub struct TestServer {
    pub url: String,
    pub port: u16,
    server: Arc<Server>,
    _handle: std::thread::JoinHandle<()>,
}

impl TestServer {
    /// Binds to `127.0.0.1:0` (random port).
    pub fn start(stager: Stager) -> Self {
        let server =
            Arc::new(Server::http("127.0.0.1:0").expect("failed to bind test HTTP server"));
        let port = server.server_addr().to_ip().expect("not an IP addr").port();
        let url = format!("http://127.0.0.1:{port}");

        let srv = Arc::clone(&server);
        let handle = std::thread::spawn(move || {
            for request in srv.incoming_requests() {
                handle_request(&stager, request);
            }
        });

        Self {
            url,
            port,
            server,
            _handle: handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}
