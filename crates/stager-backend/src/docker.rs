//! Docker staging: run the docker lifecycle builder against an image
//! reference to extract its start command and metadata.

use crate::backend::{
    completion_callback_url, decode_annotation, decode_lifecycle_data, effective_timeout,
    encode_annotation, failed_response, staging_disk_mb, Backend,
};
use crate::lifecycle::lifecycle_download_url;
use crate::{BackendError, Config};
use crate::{STAGING_TASK_CPU_WEIGHT, STAGING_USER, TASK_LOG_SOURCE};
use stager_schema::{
    emit_progress_for, serial, timeout, DockerResultData, DockerStagingData, DockerStagingResult,
    DownloadAction, Lifecycle, ResourceLimits, RunAction, StackName, StagingGuid, StagingRequest,
    StagingResponse, StagingResultData, StagingTaskAnnotation, TaskRecipe, TaskResult,
};
use tracing::{debug, info};

const DOCKER_LIFECYCLE_KEY: &str = "docker";
const DOCKER_LIFECYCLE_DIR: &str = "/tmp/docker_app_lifecycle";
const DOCKER_BUILDER_PATH: &str = "/tmp/docker_app_lifecycle/builder";
const DOCKER_LIFECYCLE_CACHE_KEY: &str = "docker-lifecycle";
const DOCKER_RESULT_FILE: &str = "/tmp/docker-result/result.json";

/// Private registry login passed to the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryCredentials<'a> {
    pub login_server: &'a str,
    pub user: &'a str,
    pub password: &'a str,
    pub email: &'a str,
}

impl<'a> RegistryCredentials<'a> {
    /// All four fields or none: a partial set is rejected whichever subset
    /// is present.
    pub fn from_staging_data(
        data: &'a DockerStagingData,
    ) -> Result<Option<Self>, BackendError> {
        let fields = [
            data.docker_login_server.as_str(),
            data.docker_user.as_str(),
            data.docker_password.as_str(),
            data.docker_email.as_str(),
        ];
        match fields.iter().filter(|f| !f.is_empty()).count() {
            0 => Ok(None),
            4 => Ok(Some(Self {
                login_server: fields[0],
                user: fields[1],
                password: fields[2],
                email: fields[3],
            })),
            _ => Err(BackendError::MissingDockerCredentials),
        }
    }

    fn push_args(&self, args: &mut Vec<String>) {
        args.extend([
            "-dockerLoginServer".to_owned(),
            self.login_server.to_owned(),
            "-dockerUser".to_owned(),
            self.user.to_owned(),
            "-dockerPassword".to_owned(),
            self.password.to_owned(),
            "-dockerEmail".to_owned(),
            self.email.to_owned(),
        ]);
    }
}

pub struct DockerBackend {
    config: Config,
}

impl DockerBackend {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn staging_stack(&self) -> Result<StackName, BackendError> {
        let stack = self.config.docker_staging_stack.trim();
        if stack.is_empty() {
            return Err(BackendError::MissingStack);
        }
        Ok(StackName::from(stack))
    }
}

impl Backend for DockerBackend {
    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::Docker
    }

    fn build_recipe(
        &self,
        staging_guid: &StagingGuid,
        request: &StagingRequest,
    ) -> Result<TaskRecipe, BackendError> {
        debug!("building docker staging recipe for {staging_guid}");

        let data: DockerStagingData = decode_lifecycle_data(request)?;
        let stack = self.staging_stack()?;
        if data.docker_image.trim().is_empty() {
            return Err(BackendError::MissingDockerImageUrl);
        }
        let credentials = RegistryCredentials::from_staging_data(&data)?;
        let lifecycle_url = lifecycle_download_url(DOCKER_LIFECYCLE_KEY, &self.config)?;

        let download = emit_progress_for(
            DownloadAction {
                from: lifecycle_url,
                to: DOCKER_LIFECYCLE_DIR.to_owned(),
                cache_key: Some(DOCKER_LIFECYCLE_CACHE_KEY.to_owned()),
                user: STAGING_USER.to_owned(),
            },
            "",
            "",
            "Failed to set up docker environment",
        );

        let mut args = vec![
            "-outputMetadataJSONFilename".to_owned(),
            DOCKER_RESULT_FILE.to_owned(),
            "-dockerRef".to_owned(),
            data.docker_image.clone(),
        ];
        if let Some(credentials) = &credentials {
            credentials.push_args(&mut args);
        }

        let run = emit_progress_for(
            RunAction {
                path: DOCKER_BUILDER_PATH.to_owned(),
                args,
                env: request.environment.clone(),
                resource_limits: ResourceLimits {
                    nofile: Some(request.file_descriptors),
                },
                user: STAGING_USER.to_owned(),
            },
            "Staging...",
            "Staging Complete",
            "Staging Failed",
        );

        let annotation = encode_annotation(&StagingTaskAnnotation {
            lifecycle: Lifecycle::Docker.as_str().to_owned(),
            ..StagingTaskAnnotation::default()
        })?;

        let task_timeout = effective_timeout(request.timeout);
        info!(
            "staging {staging_guid} from image {} (private registry: {}), timeout {}s",
            data.docker_image,
            credentials.is_some(),
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
            privileged: true,
            egress_rules: request.egress_rules.clone(),
            result_file: DOCKER_RESULT_FILE.to_owned(),
            annotation,
            action: timeout(serial(vec![download, run]), task_timeout),
        })
    }

    fn build_staging_response(
        &self,
        task_result: &TaskResult,
    ) -> Result<StagingResponse, BackendError> {
        let annotation = decode_annotation(&task_result.annotation)?;

        if task_result.failed {
            debug!(
                "docker staging task {} failed: {}",
                task_result.task_guid, task_result.failure_reason
            );
            return Ok(failed_response(&self.config, task_result));
        }

        let result: DockerStagingResult =
            serde_json::from_str(&task_result.result).map_err(BackendError::MalformedResult)?;

        Ok(StagingResponse {
            app_id: annotation.app_id,
            task_id: annotation.task_id,
            execution_metadata: Some(result.execution_metadata),
            detected_start_command: Some(result.detected_start_command),
            lifecycle_data: (!result.docker_image.is_empty()).then(|| {
                StagingResultData::Docker(DockerResultData {
                    docker_image: result.docker_image,
                })
            }),
            error: None,
        })
    }
}
