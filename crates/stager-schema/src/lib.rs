//! Wire documents exchanged by the stager.
//!
//! This crate defines the schema layer: the controller's staging request and
//! its lifecycle-specific payloads (`StagingRequest`, `BuildpackStagingData`,
//! `DockerStagingData`), the scheduler task recipe and its executable action
//! tree (`TaskRecipe`, `Action`), the scheduler completion document
//! (`TaskResult`), the correlation annotation, and the staging response
//! forwarded back to the controller.

pub mod action;
pub mod request;
pub mod response;
pub mod task;
pub mod types;

pub use action::{
    emit_progress_for, parallel, serial, timeout, try_action, Action, DownloadAction,
    EmitProgressAction, EnvironmentVariable, ParallelAction, ResourceLimits, RunAction,
    SerialAction, TimeoutAction, TryAction, UploadAction,
};
pub use request::{
    parse_staging_request, Buildpack, BuildpackStagingData, DockerStagingData, IcmpInfo,
    Lifecycle, PortRange, SecurityGroupRule, StagingRequest, CUSTOM_BUILDPACK,
};
pub use response::{
    BuildpackResultData, BuildpackStagingResult, DockerResultData, DockerStagingResult,
    StagingError, StagingResponse, StagingResultData, StagingTaskAnnotation,
};
pub use task::{parse_task_result, TaskRecipe, TaskResult};
pub use types::{StackName, StagingGuid};
