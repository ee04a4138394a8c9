use crate::ServerError;
use stager_schema::{StagingGuid, StagingResponse, TaskRecipe};
use tracing::debug;

/// Hands a finished recipe to the task scheduler.
pub trait TaskSubmitter: Send + Sync {
    fn submit_task(&self, recipe: &TaskRecipe) -> Result<(), ServerError>;
}

/// Delivers a staging response to the controller.
pub trait CompletionForwarder: Send + Sync {
    fn forward_completion(
        &self,
        staging_guid: &StagingGuid,
        response: &StagingResponse,
    ) -> Result<(), ServerError>;
}

/// Scheduler API client: `POST <base>/v1/tasks`.
pub struct HttpSchedulerClient {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpSchedulerClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    fn tasks_url(&self) -> String {
        format!("{}/v1/tasks", self.base_url)
    }
}

impl TaskSubmitter for HttpSchedulerClient {
    fn submit_task(&self, recipe: &TaskRecipe) -> Result<(), ServerError> {
        let url = self.tasks_url();
        let body =
            serde_json::to_vec(recipe).map_err(|e| ServerError::Serialization(e.to_string()))?;
        debug!("POST {url} ({} bytes) for task {}", body.len(), recipe.task_guid);
        post_json(&self.agent, &url, &body)
    }
}

/// Controller client: `POST <base>/internal/staging/<guid>/completed`.
pub struct HttpControllerClient {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpControllerClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    fn completion_url(&self, staging_guid: &StagingGuid) -> String {
        format!("{}/internal/staging/{staging_guid}/completed", self.base_url)
    }
}

impl CompletionForwarder for HttpControllerClient {
    fn forward_completion(
        &self,
        staging_guid: &StagingGuid,
        response: &StagingResponse,
    ) -> Result<(), ServerError> {
        let url = self.completion_url(staging_guid);
        let body =
            serde_json::to_vec(response).map_err(|e| ServerError::Serialization(e.to_string()))?;
        debug!("POST {url} ({} bytes)", body.len());
        post_json(&self.agent, &url, &body)
    }
}

fn post_json(agent: &ureq::Agent, url: &str, body: &[u8]) -> Result<(), ServerError> {
    match agent
        .post(url)
        .header("Content-Type", "application/json")
        .send(body)
    {
        Ok(_) => Ok(()),
        Err(ureq::Error::StatusCode(code)) => {
            Err(ServerError::Http(format!("HTTP {code} for POST {url}")))
        }
        Err(e) => Err(ServerError::Http(e.to_string())),
    }
}
