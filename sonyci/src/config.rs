//! Client credentials and configuration loading.

use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, ErrorKind};

/// Credentials for the Ci account plus an optional default workspace.
///
/// Build one directly, or load it from a TOML file with
/// [`Config::from_file`]. File values may reference environment variables
/// as `${VAR}`, which are expanded before parsing:
///
/// ```toml
/// username = "ingest@example.com"
/// password = "${CI_PASSWORD}"
/// client_id = "f00f"
/// client_secret = "${CI_CLIENT_SECRET}"
/// workspace_id = "9a3e"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub workspace_id: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file, expanding `${VAR}` references
    /// against the environment. Any read, expansion, or parse failure
    /// comes back as an [`ErrorKind::InvalidConfig`] error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| {
            Error::with_source(
                ErrorKind::InvalidConfig,
                format!("cannot read config file {}", path.display()),
                source,
            )
        })?;
        let expanded = expand_env(&raw)?;
        let config: Config = toml::from_str(&expanded).map_err(|source| {
            Error::with_source(
                ErrorKind::InvalidConfig,
                format!("cannot parse config file {}", path.display()),
                source,
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        let fields = [
            ("username", &self.username),
            ("password", &self.password),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(Error::new(
                    ErrorKind::InvalidConfig,
                    format!("config field {name} must not be empty"),
                ));
            }
        }
        Ok(())
    }
}

fn expand_env(raw: &str) -> Result<String, Error> {
    let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").map_err(|source| {
        Error::with_source(ErrorKind::InvalidConfig, "invalid expansion pattern", source)
    })?;

    let mut out = String::with_capacity(raw.len());
    let mut last = 0;
    for caps in pattern.captures_iter(raw) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&raw[last..whole.start()]);
        let value = std::env::var(name.as_str()).map_err(|_| {
            Error::new(
                ErrorKind::InvalidConfig,
                format!(
                    "config references environment variable {} which is not set",
                    name.as_str()
                ),
            )
        })?;
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&raw[last..]);
    Ok(out)
}
