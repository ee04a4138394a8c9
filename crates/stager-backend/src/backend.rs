use crate::{BackendError, BuildpackBackend, Config, DockerBackend};
use crate::{DEFAULT_STAGING_TIMEOUT, STAGING_DISK_OVERHEAD_MB};
use stager_schema::{
    Lifecycle, StagingGuid, StagingRequest, StagingResponse, StagingTaskAnnotation, TaskRecipe,
    TaskResult,
};
use std::time::Duration;

/// One staging strategy: builds the recipe for a request and translates the
/// scheduler's result back into a controller response.
pub trait Backend: Send + Sync {
    fn lifecycle(&self) -> Lifecycle;

    fn build_recipe(
        &self,
        staging_guid: &StagingGuid,
        request: &StagingRequest,
    ) -> Result<TaskRecipe, BackendError>;

    fn build_staging_response(
        &self,
        task_result: &TaskResult,
    ) -> Result<StagingResponse, BackendError>;
}

pub fn select_backend(lifecycle: Lifecycle, config: &Config) -> Box<dyn Backend> {
    match lifecycle {
        Lifecycle::Buildpack => Box::new(BuildpackBackend::new(config.clone())),
        Lifecycle::Docker => Box::new(DockerBackend::new(config.clone())),
    }
}

/// Positive request timeouts are honored to the second; anything else gets
/// [`DEFAULT_STAGING_TIMEOUT`].
pub fn effective_timeout(seconds: i64) -> Duration {
    match u64::try_from(seconds) {
        Ok(secs) if secs > 0 => Duration::from_secs(secs),
        _ => DEFAULT_STAGING_TIMEOUT,
    }
}

pub fn decode_annotation(raw: &str) -> Result<StagingTaskAnnotation, BackendError> {
    serde_json::from_str(raw).map_err(BackendError::MalformedAnnotation)
}

/// Which backend produced the task, read from the echoed annotation. An
/// annotation without a lifecycle selects the buildpack backend.
pub fn lifecycle_of_result(task_result: &TaskResult) -> Result<Lifecycle, BackendError> {
    let annotation = decode_annotation(&task_result.annotation)?;
    Ok(Lifecycle::from_name(&annotation.lifecycle))
}

pub(crate) fn encode_annotation(
    annotation: &StagingTaskAnnotation,
) -> Result<String, BackendError> {
    serde_json::to_string(annotation).map_err(BackendError::Serialization)
}

pub(crate) fn completion_callback_url(config: &Config, staging_guid: &StagingGuid) -> String {
    format!("{}/v1/staging/{staging_guid}/completed", config.stager_url)
}

pub(crate) fn staging_disk_mb(requested: i32) -> i32 {
    requested.saturating_add(STAGING_DISK_OVERHEAD_MB)
}

pub(crate) fn decode_lifecycle_data<T: serde::de::DeserializeOwned>(
    request: &StagingRequest,
) -> Result<T, BackendError> {
    request
        .lifecycle_data()
        .map_err(|source| BackendError::MalformedLifecycleData {
            lifecycle: request.lifecycle.clone(),
            source,
        })
}

/// Shared failure path: only the sanitized reason survives.
pub(crate) fn failed_response(config: &Config, task_result: &TaskResult) -> StagingResponse {
    StagingResponse::failed(config.sanitizer.sanitize(&task_result.failure_reason))
}
