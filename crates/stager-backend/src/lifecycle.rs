use crate::{BackendError, Config};
use url::Url;

/// Artifact-server namespace for relative lifecycle paths.
const STATIC_ROUTE: &str = "/v1/static/";

/// Resolve the download URL of the lifecycle bundle registered under `key`.
///
/// Absolute `http(s)` locations are returned verbatim; relative paths are
/// served by the artifact server under [`STATIC_ROUTE`].
pub fn lifecycle_download_url(key: &str, config: &Config) -> Result<String, BackendError> {
    let location = config
        .lifecycles
        .get(key)
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .ok_or(BackendError::NoCompilerDefined)?;

    match Url::parse(location) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(location.to_owned()),
            scheme => Err(BackendError::UnsupportedLifecycleScheme {
                key: key.to_owned(),
                scheme: scheme.to_owned(),
            }),
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => static_url(key, config, location),
        Err(e) => Err(BackendError::MalformedLifecycleUrl {
            key: key.to_owned(),
            reason: e.to_string(),
        }),
    }
}

fn static_url(key: &str, config: &Config, path: &str) -> Result<String, BackendError> {
    let joined = format!(
        "{}{STATIC_ROUTE}{}",
        config.file_server_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let url = Url::parse(&joined).map_err(|e| BackendError::MalformedLifecycleUrl {
        key: key.to_owned(),
        reason: e.to_string(),
    })?;
    Ok(url.into())
}
