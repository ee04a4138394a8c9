//! Buildpack staging: detect, compile and release an app with the buildpack
//! lifecycle builder, then upload the droplet.

use crate::backend::{
    completion_callback_url, decode_annotation, decode_lifecycle_data, effective_timeout,
    encode_annotation, failed_response, staging_disk_mb, Backend,
};
use crate::lifecycle::lifecycle_download_url;
use crate::{BackendError, Config};
use crate::{STAGING_TASK_CPU_WEIGHT, STAGING_USER, TASK_LOG_SOURCE};
use stager_schema::{
    emit_progress_for, parallel, serial, timeout, try_action, Action, BuildpackResultData,
    BuildpackStagingData, BuildpackStagingResult, DownloadAction, EnvironmentVariable, Lifecycle,
    ResourceLimits, RunAction, StackName, StagingGuid, StagingRequest, StagingResponse,
    StagingResultData, StagingTaskAnnotation, TaskRecipe, TaskResult, UploadAction,
    CUSTOM_BUILDPACK,
};
use md5::{Digest, Md5};
use tracing::{debug, info};
use url::Url;

const LIFECYCLE_DIR: &str = "/tmp/lifecycle";
const BUILDER_PATH: &str = "/tmp/lifecycle/builder";
const BUILD_DIR: &str = "/tmp/app";
const BUILDPACKS_DIR: &str = "/tmp/buildpacks";
const BUILD_ARTIFACTS_CACHE_DIR: &str = "/tmp/cache";
const OUTPUT_BUILD_ARTIFACTS_CACHE: &str = "/tmp/output-cache";
const OUTPUT_DROPLET: &str = "/tmp/droplet";
const OUTPUT_METADATA: &str = "/tmp/result.json";

/// Command line for the buildpack lifecycle builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderConfig {
    pub buildpack_order: Vec<String>,
    pub skip_detect: bool,
}

impl BuilderConfig {
    /// Detection is skipped only when exactly one buildpack asks for it.
    pub fn for_buildpacks(data: &BuildpackStagingData) -> Self {
        let skip_detect = matches!(data.buildpacks.as_slice(), [only] if only.skip_detect);
        Self {
            buildpack_order: data.buildpacks.iter().map(|b| b.key.clone()).collect(),
            skip_detect,
        }
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            format!("-buildArtifactsCacheDir={BUILD_ARTIFACTS_CACHE_DIR}"),
            format!("-buildDir={BUILD_DIR}"),
            format!("-buildpackOrder={}", self.buildpack_order.join(",")),
            format!("-buildpacksDir={BUILDPACKS_DIR}"),
            format!("-outputBuildArtifactsCache={OUTPUT_BUILD_ARTIFACTS_CACHE}"),
            format!("-outputDroplet={OUTPUT_DROPLET}"),
            format!("-outputMetadata={OUTPUT_METADATA}"),
            format!("-skipDetect={}", self.skip_detect),
        ]
    }

    /// Where the builder expects the buildpack registered under `key`: the
    /// builder derives the directory from the md5 hex digest of the key.
    pub fn buildpack_path(key: &str) -> String {
        format!("{BUILDPACKS_DIR}/{:x}", Md5::digest(key.as_bytes()))
    }
}

pub struct BuildpackBackend {
    config: Config,
}

impl BuildpackBackend {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn stack(&self, request: &StagingRequest) -> Result<StackName, BackendError> {
        let stack = request
            .stack
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.config.default_stack.trim());
        if stack.is_empty() {
            return Err(BackendError::MissingStack);
        }
        Ok(StackName::from(stack))
    }

    fn download_actions(
        &self,
        stack: &StackName,
        data: &BuildpackStagingData,
    ) -> Result<Vec<Action>, BackendError> {
        let lifecycle_url = lifecycle_download_url(stack, &self.config)?;

        let mut downloads: Vec<Action> = vec![
            DownloadAction {
                from: data.app_bits_download_uri.clone(),
                to: BUILD_DIR.to_owned(),
                cache_key: None,
                user: STAGING_USER.to_owned(),
            }
            .into(),
            emit_progress_for(
                DownloadAction {
                    from: lifecycle_url,
                    to: LIFECYCLE_DIR.to_owned(),
                    cache_key: Some(format!("buildpack-{stack}-lifecycle")),
                    user: STAGING_USER.to_owned(),
                },
                "",
                "",
                "Failed to set up staging environment",
            ),
        ];

        for buildpack in &data.buildpacks {
            if buildpack.name == CUSTOM_BUILDPACK {
                continue;
            }
            downloads.push(
                DownloadAction {
                    from: buildpack.url.clone(),
                    to: BuilderConfig::buildpack_path(&buildpack.key),
                    cache_key: Some(buildpack.key.clone()),
                    user: STAGING_USER.to_owned(),
                }
                .into(),
            );
        }

        // A cold or broken cache must not fail staging.
        if let Some(cache_uri) = non_empty(data.build_artifacts_cache_download_uri.as_deref()) {
            downloads.push(try_action(DownloadAction {
                from: cache_uri.to_owned(),
                to: BUILD_ARTIFACTS_CACHE_DIR.to_owned(),
                cache_key: None,
                user: STAGING_USER.to_owned(),
            }));
        }

        Ok(downloads)
    }

    fn upload_action(data: &BuildpackStagingData) -> Option<Action> {
        let mut uploads: Vec<Action> = Vec::new();
        if let Some(droplet_uri) = non_empty(data.droplet_upload_uri.as_deref()) {
            uploads.push(
                UploadAction {
                    from: OUTPUT_DROPLET.to_owned(),
                    to: droplet_uri.to_owned(),
                    user: STAGING_USER.to_owned(),
                }
                .into(),
            );
        }
        if let Some(cache_uri) = non_empty(data.build_artifacts_cache_upload_uri.as_deref()) {
            uploads.push(try_action(UploadAction {
                from: OUTPUT_BUILD_ARTIFACTS_CACHE.to_owned(),
                to: cache_uri.to_owned(),
                user: STAGING_USER.to_owned(),
            }));
        }
        if uploads.is_empty() {
            return None;
        }
        Some(emit_progress_for(
            parallel(uploads),
            "Uploading droplet, build artifacts cache...",
            "Uploading complete",
            "Uploading failed",
        ))
    }
}

impl Backend for BuildpackBackend {
    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::Buildpack
    }

    fn build_recipe(
        &self,
        staging_guid: &StagingGuid,
        request: &StagingRequest,
    ) -> Result<TaskRecipe, BackendError> {
        debug!("building buildpack staging recipe for {staging_guid}");

        let data: BuildpackStagingData = decode_lifecycle_data(request)?;
        let stack = self.stack(request)?;
        if Url::parse(&data.app_bits_download_uri).is_err() {
            return Err(BackendError::MissingAppBitsDownloadUri);
        }

        let downloads = self.download_actions(&stack, &data)?;

        let builder = BuilderConfig::for_buildpacks(&data);
        let mut env = request.environment.clone();
        env.push(EnvironmentVariable::new("CF_STACK", stack.as_str()));
        let run = emit_progress_for(
            RunAction {
                path: BUILDER_PATH.to_owned(),
                args: builder.args(),
                env,
                resource_limits: ResourceLimits {
                    nofile: Some(request.file_descriptors),
                },
                user: STAGING_USER.to_owned(),
            },
            "Staging...",
            "Staging Complete",
            "Staging Failed",
        );

        let mut steps = vec![parallel(downloads), run];
        if let Some(upload) = Self::upload_action(&data) {
            steps.push(upload);
        }

        let annotation = encode_annotation(&StagingTaskAnnotation {
            lifecycle: Lifecycle::Buildpack.as_str().to_owned(),
            app_id: Some(request.app_id.clone()),
            task_id: Some(
                request
                    .task_id
                    .clone()
                    .unwrap_or_else(|| staging_guid.to_string()),
            ),
            build_artifacts_cache_download_uri: data.build_artifacts_cache_download_uri.clone(),
        })?;

        let task_timeout = effective_timeout(request.timeout);
        info!(
            "staging {staging_guid} on stack {stack} with {} buildpack(s), timeout {}s",
            data.buildpacks.len(),
            task_timeout.as_secs()
        );

        Ok(TaskRecipe {
            task_guid: staging_guid.to_string(),
            domain: self.config.task_domain.clone(),
            log_guid: request.log_guid.clone(),
            log_source: TASK_LOG_SOURCE.to_owned(),
            completion_callback_url: completion_callback_url(&self.config, staging_guid),
            memory_mb: request.memory_mb,
            disk_mb: staging_disk_mb(request.disk_mb),
            cpu_weight: STAGING_TASK_CPU_WEIGHT,
            rootfs: stack.preloaded_rootfs(),
            privileged: false,
            egress_rules: request.egress_rules.clone(),
            result_file: OUTPUT_METADATA.to_owned(),
            annotation,
            action: timeout(serial(steps), task_timeout),
        })
    }

    fn build_staging_response(
        &self,
        task_result: &TaskResult,
    ) -> Result<StagingResponse, BackendError> {
        let annotation = decode_annotation(&task_result.annotation)?;

        if task_result.failed {
            debug!(
                "buildpack staging task {} failed: {}",
                task_result.task_guid, task_result.failure_reason
            );
            return Ok(failed_response(&self.config, task_result));
        }

        let result: BuildpackStagingResult =
            serde_json::from_str(&task_result.result).map_err(BackendError::MalformedResult)?;

        Ok(StagingResponse {
            app_id: annotation.app_id,
            task_id: annotation.task_id,
            execution_metadata: Some(result.execution_metadata),
            detected_start_command: Some(result.detected_start_command),
            lifecycle_data: buildpack_result_data(
                result.buildpack_key,
                result.detected_buildpack,
            ),
            error: None,
        })
    }
}

/// Absent when the builder reported neither field.
fn buildpack_result_data(
    buildpack_key: Option<String>,
    detected_buildpack: Option<String>,
) -> Option<StagingResultData> {
    if buildpack_key.is_none() && detected_buildpack.is_none() {
        return None;
    }
    Some(StagingResultData::Buildpack(BuildpackResultData {
        buildpack_key,
        detected_buildpack,
    }))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
