use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Correlation payload embedded in a recipe and echoed back by the scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StagingTaskAnnotation {
    /// Empty when the task predates lifecycle tagging.
    #[serde(default)]
    pub lifecycle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_artifacts_cache_download_uri: Option<String>,
}

/// Result file written by the buildpack builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildpackStagingResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buildpack_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_buildpack: Option<String>,
    #[serde(default)]
    pub execution_metadata: String,
    #[serde(default)]
    pub detected_start_command: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_types: Option<BTreeMap<String, String>>,
}

/// Result file written by the docker builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DockerStagingResult {
    #[serde(default)]
    pub execution_metadata: String,
    #[serde(default)]
    pub detected_start_command: BTreeMap<String, String>,
    #[serde(default)]
    pub docker_image: String,
}

/// Staging-completed document forwarded to the controller.
///
/// Either `error` is set and every other result field is absent, or `error`
/// is absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StagingResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_metadata: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_start_command: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_data: Option<StagingResultData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StagingError>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StagingResultData {
    Docker(DockerResultData),
    Buildpack(BuildpackResultData),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildpackResultData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buildpack_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_buildpack: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DockerResultData {
    pub docker_image: String,
}

/// Controller-facing error. The message has already been sanitized.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StagingError {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub message: String,
}

impl StagingError {
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
        }
    }
}

impl StagingResponse {
    pub fn failed(error: StagingError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}
