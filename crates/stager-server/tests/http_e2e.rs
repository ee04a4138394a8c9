//! HTTP end-to-end tests: a real stager in-process on a random port, with
//! recording fake scheduler and controller endpoints behind real HTTP clients.

use stager_schema::{StagingTaskAnnotation, TaskRecipe};
use stager_server::{ServerConfig, Stager, TestServer};
use std::sync::{Arc, Mutex};
use tiny_http::{Response, Server};

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    content_type: Option<String>,
    body: Vec<u8>,
}

impl Recorded {
    fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Answers every request with a fixed status and remembers what it saw.
struct FakeEndpoint {
    url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    server: Arc<Server>,
    _handle: std::thread::JoinHandle<()>,
}

impl FakeEndpoint {
    fn start(status: u16) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let port = server.server_addr().to_ip().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let srv = Arc::clone(&server);
        let reqs = Arc::clone(&requests);
        let handle = std::thread::spawn(move || {
            for mut request in srv.incoming_requests() {
                let mut body = Vec::new();
                request.as_reader().read_to_end(&mut body).unwrap();
                let content_type = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Content-Type"))
                    .map(|h| h.value.as_str().to_owned());
                reqs.lock().unwrap().push(Recorded {
                    method: request.method().to_string(),
                    path: request.url().to_owned(),
                    content_type,
                    body,
                });
                let _ = request.respond(Response::empty(status));
            }
        });

        Self {
            url: format!("http://127.0.0.1:{port}"),
            requests,
            server,
            _handle: handle,
        }
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for FakeEndpoint {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

struct Harness {
    stager: TestServer,
    scheduler: FakeEndpoint,
    controller: FakeEndpoint,
}

fn start_with(scheduler_status: u16, controller_status: u16) -> Harness {
    let scheduler = FakeEndpoint::start(scheduler_status);
    let controller = FakeEndpoint::start(controller_status);
    let config = ServerConfig::new("http://stager.example.com", &scheduler.url, &controller.url)
        .with_file_server_url("http://file-server.example.com")
        .with_docker_staging_stack("cflinuxfs2")
        .with_lifecycles(stager_server::parse_lifecycles(
            r#"{"lucid64":"lifecycle.zip","docker":"docker_app_lifecycle.zip"}"#,
        )
        .unwrap());
    let stager = TestServer::start(Stager::from_server_config(&config));
    Harness {
        stager,
        scheduler,
        controller,
    }
}

fn start() -> Harness {
    start_with(202, 200)
}

fn post(url: &str, body: &str) -> (u16, String) {
    let result = ureq::post(url)
        .header("Content-Type", "application/json")
        .send(body.as_bytes());
    match result {
        Ok(resp) => {
            let code = resp.status().as_u16();
            (code, resp.into_body().read_to_string().unwrap())
        }
        Err(ureq::Error::StatusCode(code)) => (code, String::new()),
        Err(e) => panic!("request to {url} failed: {e}"),
    }
}

const BUILDPACK_REQUEST: &str = r#"{
    "app_id": "my-app-guid",
    "task_id": "my-task-guid",
    "stack": "lucid64",
    "file_descriptors": 3,
    "memory_mb": 1024,
    "disk_mb": 128,
    "environment": [],
    "lifecycle": "buildpack",
    "lifecycle_data": {
        "buildpacks": [],
        "app_bits_download_uri": "http://example.com/app_bits"
    }
}"#;

const DOCKER_REQUEST: &str = r#"{
    "app_id": "my-app-guid",
    "task_id": "my-task-guid",
    "file_descriptors": 3,
    "memory_mb": 1024,
    "disk_mb": 128,
    "environment": [],
    "lifecycle": "docker",
    "lifecycle_data": {
        "docker_image": "http://docker.docker/docker"
    }
}"#;

fn annotation(lifecycle: &str) -> String {
    serde_json::to_string(&StagingTaskAnnotation {
        lifecycle: lifecycle.to_owned(),
        app_id: Some("app-id".to_owned()),
        task_id: Some("task-id".to_owned()),
        build_artifacts_cache_download_uri: None,
    })
    .unwrap()
}

// --- staging start ---

#[test]
fn buildpack_staging_submits_task_to_scheduler() {
    let h = start();
    let (code, _) = post(&format!("{}/v1/staging/app-task", h.stager.url), BUILDPACK_REQUEST);
    assert_eq!(code, 202);

    let requests = h.scheduler.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/v1/tasks");
    assert_eq!(requests[0].content_type.as_deref(), Some("application/json"));

    let recipe: TaskRecipe = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(recipe.task_guid, "app-task");
    assert_eq!(recipe.memory_mb, 1024);
    assert_eq!(recipe.disk_mb, 128 + stager_backend::STAGING_DISK_OVERHEAD_MB);
    assert_eq!(
        recipe.completion_callback_url,
        "http://stager.example.com/v1/staging/app-task/completed"
    );
    assert!(h.controller.requests().is_empty());
}

#[test]
fn docker_staging_submits_task_to_scheduler() {
    let h = start();
    let (code, _) = post(&format!("{}/v1/staging/docker-task", h.stager.url), DOCKER_REQUEST);
    assert_eq!(code, 202);

    let requests = h.scheduler.requests();
    assert_eq!(requests.len(), 1);
    let recipe: TaskRecipe = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(recipe.privileged);
    assert_eq!(recipe.rootfs, "preloaded:cflinuxfs2");
}

#[test]
fn invalid_staging_request_is_rejected() {
    let h = start();
    let (code, _) = post(&format!("{}/v1/staging/app-task", h.stager.url), "not json");
    assert_eq!(code, 400);
    assert!(h.scheduler.requests().is_empty());
}

#[test]
fn unknown_stack_is_rejected_without_submitting() {
    let h = start();
    let body = BUILDPACK_REQUEST.replace("lucid64", "rabbit_hole");
    let (code, _) = post(&format!("{}/v1/staging/app-task", h.stager.url), &body);
    assert_eq!(code, 400);
    assert!(h.scheduler.requests().is_empty());
}

#[test]
fn scheduler_failure_reports_unavailable() {
    let h = start_with(500, 200);
    let (code, _) = post(&format!("{}/v1/staging/app-task", h.stager.url), BUILDPACK_REQUEST);
    assert_eq!(code, 503);
    assert_eq!(h.scheduler.requests().len(), 1);
}

// --- staging completion ---

#[test]
fn buildpack_completion_is_forwarded_to_controller() {
    let h = start();
    let task = serde_json::json!({
        "task_guid": "the-task-guid",
        "domain": "cf-app-staging",
        "annotation": annotation("buildpack"),
        "result": r#"{
            "buildpack_key": "buildpack-key",
            "detected_buildpack": "detected-buildpack",
            "execution_metadata": "metadata",
            "detected_start_command": {"a": "b"}
        }"#,
    });
    let (code, _) = post(
        &format!("{}/v1/staging/the-task-guid/completed", h.stager.url),
        &task.to_string(),
    );
    assert_eq!(code, 200);

    let requests = h.controller.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/internal/staging/the-task-guid/completed");
    assert_eq!(requests[0].content_type.as_deref(), Some("application/json"));
    assert_eq!(
        requests[0].json(),
        serde_json::json!({
            "app_id": "app-id",
            "task_id": "task-id",
            "execution_metadata": "metadata",
            "detected_start_command": {"a": "b"},
            "lifecycle_data": {
                "buildpack_key": "buildpack-key",
                "detected_buildpack": "detected-buildpack"
            }
        })
    );
}

#[test]
fn docker_completion_is_forwarded_to_controller() {
    let h = start();
    let task = serde_json::json!({
        "task_guid": "the-task-guid",
        "annotation": annotation("docker"),
        "result": r#"{
            "execution_metadata": "metadata",
            "detected_start_command": {"a": "b"},
            "docker_image": "cloudfoundry/diego-docker-app"
        }"#,
    });
    let (code, _) = post(
        &format!("{}/v1/staging/the-task-guid/completed", h.stager.url),
        &task.to_string(),
    );
    assert_eq!(code, 200);

    let requests = h.controller.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].json(),
        serde_json::json!({
            "app_id": "app-id",
            "task_id": "task-id",
            "execution_metadata": "metadata",
            "detected_start_command": {"a": "b"},
            "lifecycle_data": {"docker_image": "cloudfoundry/diego-docker-app"}
        })
    );
}

#[test]
fn completion_without_lifecycle_tag_is_forwarded() {
    let h = start();
    let task = serde_json::json!({
        "task_guid": "the-task-guid",
        "action": {"run": {"path": "ls", "user": ""}},
        "annotation": r#"{
            "app_id": "app-id",
            "task_id": "task-id"
        }"#,
        "result": r#"{
            "execution_metadata": "metadata",
            "detected_start_command": {"a": "b"}
        }"#,
    });
    let (code, _) = post(
        &format!("{}/v1/staging/the-task-guid/completed", h.stager.url),
        &task.to_string(),
    );
    assert_eq!(code, 200);

    let requests = h.controller.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].json(),
        serde_json::json!({
            "app_id": "app-id",
            "task_id": "task-id",
            "execution_metadata": "metadata",
            "detected_start_command": {"a": "b"}
        })
    );
}

#[test]
fn buildpack_completion_without_lifecycle_tag_keeps_buildpack_fields() {
    let h = start();
    let task = serde_json::json!({
        "task_guid": "the-task-guid",
        "annotation": r#"{
            "app_id": "app-id",
            "task_id": "task-id"
        }"#,
        "result": r#"{
            "buildpack_key": "buildpack-key",
            "detected_buildpack": "detected-buildpack",
            "execution_metadata": "metadata",
            "detected_start_command": {"a": "b"}
        }"#,
    });
    let (code, _) = post(
        &format!("{}/v1/staging/the-task-guid/completed", h.stager.url),
        &task.to_string(),
    );
    assert_eq!(code, 200);
    assert_eq!(
        h.controller.requests()[0].json(),
        serde_json::json!({
            "app_id": "app-id",
            "task_id": "task-id",
            "execution_metadata": "metadata",
            "detected_start_command": {"a": "b"},
            "lifecycle_data": {
                "buildpack_key": "buildpack-key",
                "detected_buildpack": "detected-buildpack"
            }
        })
    );
}

#[test]
fn failed_task_forwards_sanitized_error() {
    let h = start();
    let task = serde_json::json!({
        "task_guid": "the-task-guid",
        "failed": true,
        "failure_reason": "insufficient resources",
        "annotation": annotation("buildpack"),
    });
    let (code, _) = post(
        &format!("{}/v1/staging/the-task-guid/completed", h.stager.url),
        &task.to_string(),
    );
    assert_eq!(code, 200);

    let requests = h.controller.requests();
    assert_eq!(
        requests[0].json(),
        serde_json::json!({
            "error": {"id": "InsufficientResources", "message": "insufficient resources"}
        })
    );
}

#[test]
fn malformed_completion_is_not_forwarded() {
    let h = start();
    let task = serde_json::json!({
        "task_guid": "the-task-guid",
        "annotation": "invalid-json",
        "result": "{}",
    });
    let (code, _) = post(
        &format!("{}/v1/staging/the-task-guid/completed", h.stager.url),
        &task.to_string(),
    );
    assert_eq!(code, 400);
    assert!(h.controller.requests().is_empty());
}

#[test]
fn controller_failure_reports_unavailable() {
    let h = start_with(202, 500);
    let task = serde_json::json!({
        "task_guid": "the-task-guid",
        "failed": true,
        "failure_reason": "boom",
        "annotation": annotation("docker"),
    });
    let (code, _) = post(
        &format!("{}/v1/staging/the-task-guid/completed", h.stager.url),
        &task.to_string(),
    );
    assert_eq!(code, 503);
}

// --- misc routes ---

#[test]
fn health_reports_ok() {
    let h = start();
    let resp = ureq::get(&format!("{}/health", h.stager.url)).call().unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body = resp.into_body().read_to_string().unwrap();
    assert_eq!(body, r#"{"status":"ok"}"#);
}

#[test]
fn unknown_route_is_not_found() {
    let h = start();
    let (code, _) = post(&format!("{}/v2/nothing", h.stager.url), "{}");
    assert_eq!(code, 404);
}

#[test]
fn wrong_method_is_rejected() {
    let h = start();
    let result = ureq::get(&format!("{}/v1/staging/app-task", h.stager.url)).call();
    assert!(matches!(result, Err(ureq::Error::StatusCode(405))));
}
