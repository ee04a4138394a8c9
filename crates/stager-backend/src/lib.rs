//! Staging backends: the translation core of the stager.
//!
//! This crate turns a controller `StagingRequest` into a scheduler `TaskRecipe`
//! and turns the scheduler's `TaskResult` back into a controller
//! `StagingResponse`. There are exactly two backends behind the [`Backend`]
//! trait: buildpack staging and docker staging. Everything here is pure and
//! synchronous; the shared [`Config`] is read-only.

pub mod backend;
pub mod buildpack;
pub mod config;
pub mod docker;
pub mod lifecycle;
pub mod sanitize;

pub use backend::{
    decode_annotation, effective_timeout, lifecycle_of_result, select_backend, Backend,
};
pub use buildpack::BuildpackBackend;
pub use config::{Config, Sanitizer};
pub use docker::DockerBackend;
pub use lifecycle::lifecycle_download_url;
pub use sanitize::sanitize_error_message;

use std::time::Duration;
use thiserror::Error;

/// Used when the request carries no positive timeout.
pub const DEFAULT_STAGING_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Added to the requested disk to leave room for the lifecycle and its output.
pub const STAGING_DISK_OVERHEAD_MB: i32 = 1024;

pub const TASK_LOG_SOURCE: &str = "STG";

pub const STAGING_TASK_CPU_WEIGHT: u32 = 50;

/// Unprivileged user every staging step runs as.
pub const STAGING_USER: &str = "vcap";

pub const DEFAULT_TASK_DOMAIN: &str = "cf-app-staging";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no stack specified for staging")]
    MissingStack,
    #[error("missing or malformed app bits download URI")]
    MissingAppBitsDownloadUri,
    #[error("missing docker image URL")]
    MissingDockerImageUrl,
    #[error("docker registry credentials must include login server, user, password and email")]
    MissingDockerCredentials,
    #[error("no compiler defined for requested stack")]
    NoCompilerDefined,
    #[error("lifecycle '{key}' uses unsupported URL scheme '{scheme}'")]
    UnsupportedLifecycleScheme { key: String, scheme: String },
    #[error("lifecycle '{key}' does not resolve to a valid URL: {reason}")]
    MalformedLifecycleUrl { key: String, reason: String },
    #[error("malformed lifecycle data for '{lifecycle}': {source}")]
    MalformedLifecycleData {
        lifecycle: String,
        source: serde_json::Error,
    },
    #[error("malformed task annotation: {0}")]
    MalformedAnnotation(serde_json::Error),
    #[error("malformed staging result: {0}")]
    MalformedResult(serde_json::Error),
    #[error("serialization error: {0}")]
    Serialization(serde_json::Error),
}
