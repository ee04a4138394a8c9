//! Executable step tree embedded in a task recipe.
//!
//! Every node serializes as a single-key JSON object named after its kind
//! (`{"download": {...}}`, `{"timeout": {...}}`, ...), which is the shape the
//! scheduler expects. Composition happens through the free constructors at the
//! bottom of this module; nodes are never mutated in place.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Download(DownloadAction),
    Upload(UploadAction),
    Run(RunAction),
    EmitProgress(EmitProgressAction),
    Try(TryAction),
    Timeout(TimeoutAction),
    Serial(SerialAction),
    Parallel(ParallelAction),
}

/// Fetch an archive and extract it to `to`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadAction {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    pub user: String,
}

/// Upload a file produced inside the container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadAction {
    pub from: String,
    pub to: String,
    pub user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunAction {
    pub path: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<EnvironmentVariable>,
    #[serde(default)]
    pub resource_limits: ResourceLimits,
    pub user: String,
}

/// A `name=value` pair. Order is preserved end to end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
}

impl EnvironmentVariable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nofile: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmitProgressAction {
    pub action: Box<Action>,
    #[serde(default)]
    pub start_message: String,
    #[serde(default)]
    pub success_message: String,
    #[serde(default)]
    pub failure_message_prefix: String,
}

/// Runs the inner action and swallows its failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TryAction {
    pub action: Box<Action>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeoutAction {
    pub action: Box<Action>,
    /// Encoded as integer nanoseconds on the wire.
    #[serde(with = "duration_nanos")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SerialAction {
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParallelAction {
    pub actions: Vec<Action>,
}

impl Action {
    /// Short symbolic name of the node kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Download(_) => "download",
            Action::Upload(_) => "upload",
            Action::Run(_) => "run",
            Action::EmitProgress(_) => "emit_progress",
            Action::Try(_) => "try",
            Action::Timeout(_) => "timeout",
            Action::Serial(_) => "serial",
            Action::Parallel(_) => "parallel",
        }
    }

    pub fn as_timeout(&self) -> Option<&TimeoutAction> {
        match self {
            Action::Timeout(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_serial(&self) -> Option<&SerialAction> {
        match self {
            Action::Serial(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_parallel(&self) -> Option<&ParallelAction> {
        match self {
            Action::Parallel(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_emit_progress(&self) -> Option<&EmitProgressAction> {
        match self {
            Action::EmitProgress(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_try(&self) -> Option<&TryAction> {
        match self {
            Action::Try(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_download(&self) -> Option<&DownloadAction> {
        match self {
            Action::Download(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_upload(&self) -> Option<&UploadAction> {
        match self {
            Action::Upload(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_run(&self) -> Option<&RunAction> {
        match self {
            Action::Run(r) => Some(r),
            _ => None,
        }
    }
}

impl From<DownloadAction> for Action {
    fn from(a: DownloadAction) -> Self {
        Action::Download(a)
    }
}

impl From<UploadAction> for Action {
    fn from(a: UploadAction) -> Self {
        Action::Upload(a)
    }
}

impl From<RunAction> for Action {
    fn from(a: RunAction) -> Self {
        Action::Run(a)
    }
}

/// Wrap `action` with start/success/failure progress messages.
pub fn emit_progress_for(
    action: impl Into<Action>,
    start_message: &str,
    success_message: &str,
    failure_message_prefix: &str,
) -> Action {
    Action::EmitProgress(EmitProgressAction {
        action: Box::new(action.into()),
        start_message: start_message.to_owned(),
        success_message: success_message.to_owned(),
        failure_message_prefix: failure_message_prefix.to_owned(),
    })
}

pub fn timeout(action: impl Into<Action>, timeout: Duration) -> Action {
    Action::Timeout(TimeoutAction {
        action: Box::new(action.into()),
        timeout,
    })
}

pub fn try_action(action: impl Into<Action>) -> Action {
    Action::Try(TryAction {
        action: Box::new(action.into()),
    })
}

pub fn serial(actions: Vec<Action>) -> Action {
    Action::Serial(SerialAction { actions })
}

pub fn parallel(actions: Vec<Action>) -> Action {
    Action::Parallel(ParallelAction { actions })
}

mod duration_nanos {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        let nanos = i64::try_from(d.as_nanos()).unwrap_or(i64::MAX);
        nanos.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let nanos = i64::deserialize(d)?;
        Ok(Duration::from_nanos(u64::try_from(nanos).unwrap_or(0)))
    }
}
