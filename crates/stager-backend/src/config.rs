use crate::sanitize::sanitize_error_message;
use crate::DEFAULT_TASK_DOMAIN;
use stager_schema::StagingError;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Turns a raw scheduler failure reason into a controller-safe error.
#[derive(Clone)]
pub struct Sanitizer(Arc<dyn Fn(&str) -> StagingError + Send + Sync>);

impl Sanitizer {
    pub fn new(f: impl Fn(&str) -> StagingError + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn sanitize(&self, message: &str) -> StagingError {
        (self.0)(message)
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(sanitize_error_message)
    }
}

impl fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sanitizer(..)")
    }
}

/// Process-wide backend settings. Built once at startup, then only read.
#[derive(Debug, Clone)]
pub struct Config {
    pub task_domain: String,
    /// Base URL the scheduler calls back on task completion.
    pub stager_url: String,
    /// Base URL of the artifact server hosting relative lifecycle bundles.
    pub file_server_url: String,
    /// Lifecycle key (stack name or `docker`) to bundle URL or relative path.
    pub lifecycles: BTreeMap<String, String>,
    /// Stack used when a buildpack request names none.
    pub default_stack: String,
    /// Root filesystem every docker staging task runs on.
    pub docker_staging_stack: String,
    pub sanitizer: Sanitizer,
}

impl Config {
    pub fn new(stager_url: &str, file_server_url: &str) -> Self {
        Self {
            task_domain: DEFAULT_TASK_DOMAIN.to_owned(),
            stager_url: stager_url.trim_end_matches('/').to_owned(),
            file_server_url: file_server_url.trim_end_matches('/').to_owned(),
            lifecycles: BTreeMap::new(),
            default_stack: String::new(),
            docker_staging_stack: String::new(),
            sanitizer: Sanitizer::default(),
        }
    }

    #[must_use]
    pub fn with_task_domain(mut self, domain: &str) -> Self {
        domain.clone_into(&mut self.task_domain);
        self
    }

    #[must_use]
    pub fn with_lifecycle(mut self, key: &str, location: &str) -> Self {
        self.lifecycles.insert(key.to_owned(), location.to_owned());
        self
    }

    #[must_use]
    pub fn with_default_stack(mut self, stack: &str) -> Self {
        stack.clone_into(&mut self.default_stack);
        self
    }

    #[must_use]
    pub fn with_docker_staging_stack(mut self, stack: &str) -> Self {
        stack.clone_into(&mut self.docker_staging_stack);
        self
    }

    #[must_use]
    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }
}
