use clap::Parser;
use stager_server::{parse_lifecycles, ServerConfig, ServerError, Stager};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "stager", about = "Translates staging requests into scheduler tasks")]
struct Cli {
    /// JSON config file. Flags given on the command line override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long)]
    listen: Option<String>,

    /// Public URL of this stager, used for task completion callbacks.
    #[arg(long)]
    stager_url: Option<String>,

    /// Scheduler API base URL.
    #[arg(long)]
    diego_api_url: Option<String>,

    /// Cloud controller base URL.
    #[arg(long)]
    cc_base_url: Option<String>,

    /// Base URL serving relative lifecycle bundles.
    #[arg(long)]
    file_server_url: Option<String>,

    /// Scheduler domain for staging tasks.
    #[arg(long)]
    task_domain: Option<String>,

    /// Stack used when a buildpack request names none.
    #[arg(long)]
    default_stack: Option<String>,

    /// Root filesystem for docker staging tasks.
    #[arg(long)]
    docker_staging_stack: Option<String>,

    /// JSON object mapping stack (or `docker`) to lifecycle bundle location.
    #[arg(long)]
    lifecycles: Option<String>,
}

impl Cli {
    fn into_server_config(self) -> Result<ServerConfig, ServerError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::new(
                self.stager_url.as_deref().unwrap_or_default(),
                self.diego_api_url.as_deref().unwrap_or_default(),
                self.cc_base_url.as_deref().unwrap_or_default(),
            ),
        };

        if let Some(listen) = self.listen {
            config = config.with_listen(&listen);
        }
        if let Some(url) = self.stager_url {
            config.stager_url = url.trim_end_matches('/').to_owned();
        }
        if let Some(url) = self.diego_api_url {
            config.diego_api_url = url.trim_end_matches('/').to_owned();
        }
        if let Some(url) = self.cc_base_url {
            config.cc_base_url = url.trim_end_matches('/').to_owned();
        }
        if let Some(url) = self.file_server_url {
            config = config.with_file_server_url(&url);
        }
        if let Some(domain) = self.task_domain {
            config = config.with_task_domain(&domain);
        }
        if let Some(stack) = self.default_stack {
            config = config.with_default_stack(&stack);
        }
        if let Some(stack) = self.docker_staging_stack {
            config = config.with_docker_staging_stack(&stack);
        }
        if let Some(raw) = self.lifecycles {
            config = config.with_lifecycles(parse_lifecycles(&raw)?);
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match Cli::parse().into_server_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    info!("starting stager on {}", config.listen);
    info!("scheduler: {}, controller: {}", config.diego_api_url, config.cc_base_url);
    info!("lifecycles: {:?}", config.lifecycles.keys().collect::<Vec<_>>());

    let stager = Stager::from_server_config(&config);
    match stager_server::run_server(&stager, &config.listen) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
