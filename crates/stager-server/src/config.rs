use crate::ServerError;
use serde::{Deserialize, Serialize};
use stager_backend::{Config, DEFAULT_TASK_DOMAIN};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8888";

/// Everything the stager process needs at startup. Stored as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Public base URL of this stager, used for task completion callbacks.
    pub stager_url: String,
    pub diego_api_url: String,
    pub cc_base_url: String,
    #[serde(default)]
    pub file_server_url: String,
    #[serde(default = "default_task_domain")]
    pub task_domain: String,
    #[serde(default)]
    pub default_stack: String,
    #[serde(default)]
    pub docker_staging_stack: String,
    #[serde(default)]
    pub lifecycles: BTreeMap<String, String>,
}

fn default_listen() -> String {
    DEFAULT_LISTEN_ADDR.to_owned()
}

fn default_task_domain() -> String {
    DEFAULT_TASK_DOMAIN.to_owned()
}

impl ServerConfig {
    pub fn new(stager_url: &str, diego_api_url: &str, cc_base_url: &str) -> Self {
        Self {
            listen: default_listen(),
            stager_url: stager_url.trim_end_matches('/').to_owned(),
            diego_api_url: diego_api_url.trim_end_matches('/').to_owned(),
            cc_base_url: cc_base_url.trim_end_matches('/').to_owned(),
            file_server_url: String::new(),
            task_domain: default_task_domain(),
            default_stack: String::new(),
            docker_staging_stack: String::new(),
            lifecycles: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_listen(mut self, addr: &str) -> Self {
        addr.clone_into(&mut self.listen);
        self
    }

    #[must_use]
    pub fn with_file_server_url(mut self, url: &str) -> Self {
        url.trim_end_matches('/').clone_into(&mut self.file_server_url);
        self
    }

    #[must_use]
    pub fn with_task_domain(mut self, domain: &str) -> Self {
        domain.clone_into(&mut self.task_domain);
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
    pub fn with_lifecycles(mut self, lifecycles: BTreeMap<String, String>) -> Self {
        self.lifecycles = lifecycles;
        self
    }

    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| ServerError::Config(format!("invalid stager config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// The three peer URLs are required; everything else has a usable default.
    pub fn validate(&self) -> Result<(), ServerError> {
        for (name, value) in [
            ("stager_url", &self.stager_url),
            ("diego_api_url", &self.diego_api_url),
            ("cc_base_url", &self.cc_base_url),
        ] {
            if value.trim().is_empty() {
                return Err(ServerError::Config(format!("{name} must be set")));
            }
        }
        Ok(())
    }

    pub fn backend_config(&self) -> Config {
        let mut config = Config::new(&self.stager_url, &self.file_server_url)
            .with_task_domain(&self.task_domain)
            .with_default_stack(&self.default_stack)
            .with_docker_staging_stack(&self.docker_staging_stack);
        for (key, location) in &self.lifecycles {
            config = config.with_lifecycle(key, location);
        }
        config
    }
}

/// Parse the `--lifecycles` flag: a JSON object of lifecycle key to location.
pub fn parse_lifecycles(raw: &str) -> Result<BTreeMap<String, String>, ServerError> {
    serde_json::from_str(raw)
        .map_err(|e| ServerError::Config(format!("invalid lifecycles map: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_loads_full_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stager.json");
        std::fs::write(
            &path,
            r#"{
                "listen": "127.0.0.1:9000",
                "stager_url": "http://stager",
                "diego_api_url": "http://diego",
                "cc_base_url": "http://cc",
                "file_server_url": "http://fs",
                "default_stack": "cflinuxfs2",
                "lifecycles": {"cflinuxfs2": "lifecycle.zip"}
            }"#,
        )
        .unwrap();

        let expected = ServerConfig::new("http://stager", "http://diego", "http://cc")
            .with_listen("127.0.0.1:9000")
            .with_file_server_url("http://fs/")
            .with_default_stack("cflinuxfs2")
            .with_lifecycles(parse_lifecycles(r#"{"cflinuxfs2":"lifecycle.zip"}"#).unwrap());
        assert_eq!(ServerConfig::load(&path).unwrap(), expected);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(matches!(ServerConfig::load(&path), Err(ServerError::Io(_))));
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stager.json");
        std::fs::write(
            &path,
            r#"{"stager_url":"http://s","diego_api_url":"http://d","cc_base_url":"http://c"}"#,
        )
        .unwrap();

        let loaded = ServerConfig::load(&path).unwrap();
        assert_eq!(loaded.listen, DEFAULT_LISTEN_ADDR);
        assert_eq!(loaded.task_domain, DEFAULT_TASK_DOMAIN);
        assert!(loaded.lifecycles.is_empty());
    }

    #[test]
    fn empty_peer_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stager.json");
        std::fs::write(
            &path,
            r#"{"stager_url":"http://s","diego_api_url":"","cc_base_url":"http://c"}"#,
        )
        .unwrap();

        let err = ServerConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("diego_api_url"));
    }

    #[test]
    fn invalid_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stager.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(ServerConfig::load(&path), Err(ServerError::Config(_))));
    }

    #[test]
    fn backend_config_carries_settings() {
        let config = ServerConfig::new("http://stager/", "http://diego", "http://cc")
            .with_file_server_url("http://fs")
            .with_task_domain("custom-domain")
            .with_docker_staging_stack("cflinuxfs2")
            .with_lifecycles(BTreeMap::from([("docker".to_owned(), "docker.zip".to_owned())]));

        let backend = config.backend_config();
        assert_eq!(backend.stager_url, "http://stager");
        assert_eq!(backend.file_server_url, "http://fs");
        assert_eq!(backend.task_domain, "custom-domain");
        assert_eq!(backend.docker_staging_stack, "cflinuxfs2");
        assert_eq!(backend.lifecycles.get("docker").map(String::as_str), Some("docker.zip"));
    }

    #[test]
    fn lifecycles_flag_must_be_a_string_map() {
        assert!(parse_lifecycles(r#"{"lucid64":"lifecycle.zip"}"#).is_ok());
        assert!(parse_lifecycles(r#"["lifecycle.zip"]"#).is_err());
    }
}
