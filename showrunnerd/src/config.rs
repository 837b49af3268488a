//! Daemon configuration, read from the environment.

use std::env;
use std::net::SocketAddr;

use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_OBS_HOST: &str = "localhost";
const DEFAULT_OBS_PORT: u16 = 4455;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Everything the daemon needs to come up.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the control surface listens on.
    pub bind_addr: SocketAddr,

    /// Key callers must present in the `x-api-key` header.
    pub api_key: String,

    /// Broadcast backend endpoint.
    pub obs_host: String,
    pub obs_port: u16,
    pub obs_password: Option<String>,

    /// Content directory endpoint.
    pub directory_url: String,
    pub directory_api_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = optional("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr.parse().map_err(|_| ConfigError::Invalid {
            name: "BIND_ADDR",
            value: bind_addr,
        })?;

        let obs_port = match optional("OBS_PORT") {
            None => DEFAULT_OBS_PORT,
            Some(port) => port.parse().map_err(|_| ConfigError::Invalid {
                name: "OBS_PORT",
                value: port,
            })?,
        };

        Ok(Self {
            bind_addr,
            api_key: required("API_KEY")?,
            obs_host: optional("OBS_HOST").unwrap_or_else(|| DEFAULT_OBS_HOST.to_string()),
            obs_port,
            obs_password: optional("OBS_PASSWORD"),
            directory_url: required("DIRECTORY_URL")?,
            directory_api_key: required("DIRECTORY_API_KEY")?,
        })
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}
