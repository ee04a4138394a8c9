use crate::action::EnvironmentVariable;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Staging-start document sent by the controller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StagingRequest {
    pub app_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub log_guid: String,
    /// Buildpack stack. Falls back to the configured default when empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default)]
    pub file_descriptors: u64,
    #[serde(default)]
    pub memory_mb: i32,
    #[serde(default)]
    pub disk_mb: i32,
    #[serde(default)]
    pub environment: Vec<EnvironmentVariable>,
    #[serde(default)]
    pub egress_rules: Vec<SecurityGroupRule>,
    /// Seconds. Zero or negative selects the default staging timeout.
    #[serde(default)]
    pub timeout: i64,
    pub lifecycle: String,
    /// Lifecycle-specific payload; decoded by the backend that owns `lifecycle`.
    #[serde(default)]
    pub lifecycle_data: serde_json::Value,
}

impl StagingRequest {
    pub fn lifecycle_data<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.lifecycle_data)
    }
}

pub fn parse_staging_request(input: &[u8]) -> Result<StagingRequest, serde_json::Error> {
    serde_json::from_slice(input)
}

/// The closed set of staging strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Buildpack,
    Docker,
}

impl Lifecycle {
    /// `"docker"` selects docker staging; every other name (including stack
    /// names used by older controllers) is a buildpack lifecycle.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("docker") {
            Lifecycle::Docker
        } else {
            Lifecycle::Buildpack
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Lifecycle::Buildpack => "buildpack",
            Lifecycle::Docker => "docker",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network egress rule copied verbatim into the recipe.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityGroupRule {
    pub protocol: String,
    #[serde(default)]
    pub destinations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<u16>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range: Option<PortRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icmp_info: Option<IcmpInfo>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub log: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IcmpInfo {
    #[serde(rename = "type")]
    pub icmp_type: i32,
    pub code: i32,
}

/// `lifecycle_data` for buildpack staging.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildpackStagingData {
    #[serde(default)]
    pub buildpacks: Vec<Buildpack>,
    #[serde(default)]
    pub app_bits_download_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_artifacts_cache_download_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_artifacts_cache_upload_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub droplet_upload_uri: Option<String>,
}

/// Name the controller gives to a user-supplied buildpack URL. Those are
/// fetched by the builder itself, not by a download step.
pub const CUSTOM_BUILDPACK: &str = "custom";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Buildpack {
    #[serde(default)]
    pub name: String,
    pub key: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub skip_detect: bool,
}

/// `lifecycle_data` for docker staging.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DockerStagingData {
    #[serde(default)]
    pub docker_image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub docker_login_server: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub docker_user: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub docker_password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub docker_email: String,
}
