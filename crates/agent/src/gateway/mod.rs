//! Remote tool gateway.
//!
//! The gateway publishes tools from several targets (relational catalog,
//! key-value order store) behind one MCP endpoint. Tool names carry their
//! target as a prefix: `PostgreSQLMCPTarget___query`.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub mod auth;
pub mod loader;
pub mod session;

pub use auth::{EnvSecretResolver, SecretResolver};
pub use loader::{GatewayTool, ToolFilter, ToolLoader};
pub use session::{
    GatewayConnector, GatewaySession, HttpGatewayConnector, ToolCallResult, ToolPage, ToolSource,
};

const TARGET_SEPARATOR: &str = "___";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("tool gateway is not configured: {0}")]
    NotConfigured(String),
    #[error("invalid gateway configuration `{path}`: {message}")]
    InvalidConfig { path: PathBuf, message: String },
    #[error("gateway client credentials unavailable: {0}")]
    MissingCredentials(String),
    #[error("access token exchange failed: {0}")]
    TokenExchange(String),
    #[error("gateway transport failure: {0}")]
    Transport(String),
    #[error("gateway protocol violation: {0}")]
    Protocol(String),
    #[error("gateway rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
}

impl GatewayError {
    pub fn is_not_configured(&self) -> bool {
        matches!(self, Self::NotConfigured(_))
    }
}

/// Contents of `gateway_config.json`.
#[derive(Clone, Debug, Deserialize)]
pub struct GatewayFile {
    pub gateway_url: String,
    pub gateway_id: String,
    pub region: String,
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

impl GatewayFile {
    pub async fn load(path: &Path) -> Result<Self, GatewayError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(GatewayError::NotConfigured(format!(
                    "`{}` not found",
                    path.display()
                )));
            }
            Err(error) => {
                return Err(GatewayError::InvalidConfig {
                    path: path.to_path_buf(),
                    message: error.to_string(),
                });
            }
        };

        Self::parse(path, &raw)
    }

    pub fn parse(path: &Path, raw: &str) -> Result<Self, GatewayError> {
        let file: Self = serde_json::from_str(raw).map_err(|error| GatewayError::InvalidConfig {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;

        for (field, value) in
            [("gateway_url", &file.gateway_url), ("gateway_id", &file.gateway_id), ("region", &file.region)]
        {
            if value.trim().is_empty() {
                return Err(GatewayError::InvalidConfig {
                    path: path.to_path_buf(),
                    message: format!("`{field}` must not be empty"),
                });
            }
        }

        Ok(file)
    }

    /// Secret-store name holding the client credentials for this gateway.
    pub fn secret_name(&self) -> String {
        format!("agentcore/gateway/{}/client-info", self.gateway_id)
    }
}

/// OAuth client identity used for the client-credentials exchange.
///
/// Secrets may name the identity `client_id`/`client_secret` or
/// `username`/`password`; when both are present the `client_*` value wins.
#[derive(Clone, Debug, Deserialize)]
#[serde(try_from = "RawClientInfo")]
pub struct ClientInfo {
    pub client_id: String,
    pub client_secret: SecretString,
    pub token_endpoint: Option<String>,
    pub scope: Option<String>,
    pub domain_prefix: Option<String>,
    pub user_pool_id: Option<String>,
}

#[derive(Deserialize)]
struct RawClientInfo {
    client_id: Option<String>,
    username: Option<String>,
    client_secret: Option<SecretString>,
    password: Option<SecretString>,
    token_endpoint: Option<String>,
    scope: Option<String>,
    domain_prefix: Option<String>,
    user_pool_id: Option<String>,
}

impl TryFrom<RawClientInfo> for ClientInfo {
    type Error = String;

    fn try_from(raw: RawClientInfo) -> Result<Self, Self::Error> {
        let client_id = raw
            .client_id
            .filter(|id| !id.trim().is_empty())
            .or(raw.username.filter(|name| !name.trim().is_empty()))
            .ok_or_else(|| "client info is missing `client_id` (or `username`)".to_string())?;
        let client_secret = raw
            .client_secret
            .filter(|secret| !secret.expose_secret().is_empty())
            .or(raw.password.filter(|secret| !secret.expose_secret().is_empty()))
            .ok_or_else(|| "client info is missing `client_secret` (or `password`)".to_string())?;

        Ok(Self {
            client_id,
            client_secret,
            token_endpoint: raw.token_endpoint,
            scope: raw.scope,
            domain_prefix: raw.domain_prefix,
            user_pool_id: raw.user_pool_id,
        })
    }
}

impl ClientInfo {
    pub fn token_url(&self, region: &str) -> Result<String, GatewayError> {
        if let Some(endpoint) = self.token_endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
            return Ok(endpoint.to_string());
        }
        if let Some(prefix) = self.domain_prefix.as_deref().filter(|p| !p.trim().is_empty()) {
            return Ok(format!("https://{prefix}.auth.{region}.amazoncognito.com/oauth2/token"));
        }
        Err(GatewayError::MissingCredentials(
            "client_info needs either `token_endpoint` or `domain_prefix`".to_string(),
        ))
    }
}

/// One tool published by the gateway.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub target: Option<String>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        let name = name.into();
        let target = name
            .split_once(TARGET_SEPARATOR)
            .map(|(target, _)| target.to_string())
            .filter(|target| !target.is_empty());
        Self { name, description: description.into(), input_schema, target }
    }
}
