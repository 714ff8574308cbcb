use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::tree::RootInsertion;
use crate::{DatasourceError, Result};

/// Backend API generation; decides which paths and envelopes the client uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiVersion {
    #[default]
    V2,
    V3,
}

impl FromStr for ApiVersion {
    type Err = DatasourceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v2" => Ok(ApiVersion::V2),
            "v3" => Ok(ApiVersion::V3),
            other => Err(DatasourceError::Config(format!(
                "unknown backend version {:?}, expected v2 or v3",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub version: ApiVersion,
    pub timeout: Duration,
    pub root_insertion: RootInsertion,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".to_string(),
            version: ApiVersion::V2,
            timeout: Duration::from_secs(30),
            root_insertion: RootInsertion::Idempotent,
            port: 8080,
        }
    }
}

impl Config {
    /// Reads the adapter configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let backend_url = lookup("DATASOURCE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.backend_url);
        if backend_url.is_empty() {
            return Err(DatasourceError::Config("DATASOURCE_URL is empty".to_string()));
        }

        let version = match lookup("DATASOURCE_VERSION") {
            Some(v) => v.parse()?,
            None => defaults.version,
        };

        let timeout = match lookup("DATASOURCE_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_var("DATASOURCE_TIMEOUT_SECS", &v)?),
            None => defaults.timeout,
        };

        let root_insertion = match lookup("TREE_ROOTS_FIRST_PASS_ONLY") {
            Some(v) if parse_var::<bool>("TREE_ROOTS_FIRST_PASS_ONLY", &v)? => {
                RootInsertion::FirstPassOnly
            }
            _ => defaults.root_insertion,
        };

        let port = match lookup("PORT") {
            Some(v) => parse_var("PORT", &v)?,
            None => defaults.port,
        };

        Ok(Config {
            backend_url,
            version,
            timeout,
            root_insertion,
            port,
        })
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| DatasourceError::Config(format!("invalid value {:?} for {}", value, key)))
}
