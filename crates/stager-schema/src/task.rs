use crate::action::Action;
use crate::request::SecurityGroupRule;
use serde::{Deserialize, Serialize};

/// Task creation document submitted to the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRecipe {
    pub task_guid: String,
    pub domain: String,
    pub log_guid: String,
    pub log_source: String,
    pub completion_callback_url: String,
    pub memory_mb: i32,
    pub disk_mb: i32,
    pub cpu_weight: u32,
    pub rootfs: String,
    pub privileged: bool,
    #[serde(default)]
    pub egress_rules: Vec<SecurityGroupRule>,
    pub result_file: String,
    /// Opaque to the scheduler; echoed back in the [`TaskResult`].
    pub annotation: String,
    pub action: Action,
}

/// Completion callback document posted by the scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskResult {
    #[serde(default)]
    pub task_guid: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub failure_reason: String,
    #[serde(default)]
    pub annotation: String,
    #[serde(default)]
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

pub fn parse_task_result(input: &[u8]) -> Result<TaskResult, serde_json::Error> {
    serde_json::from_slice(input)
}
