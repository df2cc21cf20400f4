use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MODEL_ID: &str = "apac.anthropic.claude-sonnet-4-20250514-v1:0";
pub const DEFAULT_REGION: &str = "ap-southeast-2";

pub const DEFAULT_CATALOG_TOOL_PREFIXES: &[&str] = &[
    "PostgreSQLMCPTarget___query",
    "PostgreSQLMCPTarget___execute",
    "PostgreSQLMCPTarget___list_tables",
    "PostgreSQLMCPTarget___describe_table",
];

pub const DEFAULT_ORDER_TOOL_PREFIXES: &[&str] = &[
    "DynamoDBMCPTarget___scan_table",
    "DynamoDBMCPTarget___query_table",
    "DynamoDBMCPTarget___get_item",
    "DynamoDBMCPTarget___batch_get_items",
];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub agent: AgentConfig,
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub model_id: String,
    pub region: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub api_key: Option<SecretString>,
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub prompts_dir: Option<PathBuf>,
    pub max_tool_rounds: u32,
    pub catalog_tool_prefixes: Vec<String>,
    pub order_tool_prefixes: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub config_path: PathBuf,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub endpoint: Option<String>,
    pub root: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// SigV4-signed reads with the default AWS credential chain.
    S3,
    /// Unsigned path-style GETs. Only works against endpoints that serve the
    /// bucket without credentials (public buckets, local S3 emulators, signing
    /// proxies); private AWS buckets answer 403.
    Http,
    /// Buckets are directories under `storage.root`.
    Local,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub model_id: Option<String>,
    pub model_region: Option<String>,
    pub model_api_key: Option<String>,
    pub gateway_config_path: Option<PathBuf>,
    pub prompts_dir: Option<PathBuf>,
    pub storage_backend: Option<StorageBackend>,
    pub storage_root: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig {
                model_id: DEFAULT_MODEL_ID.to_string(),
                region: DEFAULT_REGION.to_string(),
                temperature: 0.1,
                max_tokens: 4000,
                api_key: None,
                endpoint: None,
                timeout_secs: 120,
            },
            agent: AgentConfig {
                prompts_dir: None,
                max_tool_rounds: 12,
                catalog_tool_prefixes: owned(DEFAULT_CATALOG_TOOL_PREFIXES),
                order_tool_prefixes: owned(DEFAULT_ORDER_TOOL_PREFIXES),
            },
            gateway: GatewayConfig {
                config_path: PathBuf::from("gateway_config.json"),
                timeout_secs: 30,
            },
            storage: StorageConfig { backend: StorageBackend::S3, endpoint: None, root: None },
            database: DatabaseConfig {
                url: "sqlite://grocer.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "http" => Ok(Self::Http),
            "local" => Ok(Self::Local),
            other => Err(ConfigError::Validation(format!(
                "unsupported storage backend `{other}` (expected s3|http|local)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl ModelConfig {
    /// Converse endpoint base; an explicit endpoint wins over the regional default.
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", self.region),
        }
    }
}

impl StorageConfig {
    pub fn endpoint_url(&self, region: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://s3.{region}.amazonaws.com"),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("grocer.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(model) = patch.model {
            if let Some(model_id) = model.model_id {
                self.model.model_id = model_id;
            }
            if let Some(region) = model.region {
                self.model.region = region;
            }
            if let Some(temperature) = model.temperature {
                self.model.temperature = temperature;
            }
            if let Some(max_tokens) = model.max_tokens {
                self.model.max_tokens = max_tokens;
            }
            if let Some(api_key) = model.api_key {
                self.model.api_key = Some(secret_value(api_key));
            }
            if let Some(endpoint) = model.endpoint {
                self.model.endpoint = Some(endpoint);
            }
            if let Some(timeout_secs) = model.timeout_secs {
                self.model.timeout_secs = timeout_secs;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(prompts_dir) = agent.prompts_dir {
                self.agent.prompts_dir = Some(prompts_dir);
            }
            if let Some(max_tool_rounds) = agent.max_tool_rounds {
                self.agent.max_tool_rounds = max_tool_rounds;
            }
            if let Some(prefixes) = agent.catalog_tool_prefixes {
                self.agent.catalog_tool_prefixes = prefixes;
            }
            if let Some(prefixes) = agent.order_tool_prefixes {
                self.agent.order_tool_prefixes = prefixes;
            }
        }

        if let Some(gateway) = patch.gateway {
            if let Some(config_path) = gateway.config_path {
                self.gateway.config_path = config_path;
            }
            if let Some(timeout_secs) = gateway.timeout_secs {
                self.gateway.timeout_secs = timeout_secs;
            }
        }

        if let Some(storage) = patch.storage {
            if let Some(backend) = storage.backend {
                self.storage.backend = backend;
            }
            if let Some(endpoint) = storage.endpoint {
                self.storage.endpoint = Some(endpoint);
            }
            if let Some(root) = storage.root {
                self.storage.root = Some(root);
            }
        }

        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Platform-provided names first so GROCER_* can still override them.
        if let Some(value) = read_env("BEDROCK_MODEL_ID") {
            self.model.model_id = value;
        }
        if let Some(value) = read_env("AWS_REGION") {
            self.model.region = value;
        }
        if let Some(value) = read_env("AWS_BEARER_TOKEN_BEDROCK") {
            self.model.api_key = Some(secret_value(value));
        }

        if let Some(value) = read_env("GROCER_MODEL_ID") {
            self.model.model_id = value;
        }
        if let Some(value) = read_env("GROCER_MODEL_REGION") {
            self.model.region = value;
        }
        if let Some(value) = read_env("GROCER_MODEL_TEMPERATURE") {
            self.model.temperature = parse_f32("GROCER_MODEL_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("GROCER_MODEL_MAX_TOKENS") {
            self.model.max_tokens = parse_u32("GROCER_MODEL_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("GROCER_MODEL_API_KEY") {
            self.model.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("GROCER_MODEL_ENDPOINT") {
            self.model.endpoint = Some(value);
        }
        if let Some(value) = read_env("GROCER_MODEL_TIMEOUT_SECS") {
            self.model.timeout_secs = parse_u64("GROCER_MODEL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GROCER_AGENT_PROMPTS_DIR") {
            self.agent.prompts_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("GROCER_AGENT_MAX_TOOL_ROUNDS") {
            self.agent.max_tool_rounds = parse_u32("GROCER_AGENT_MAX_TOOL_ROUNDS", &value)?;
        }
        if let Some(value) = read_env("GROCER_AGENT_CATALOG_TOOL_PREFIXES") {
            self.agent.catalog_tool_prefixes = parse_list(&value);
        }
        if let Some(value) = read_env("GROCER_AGENT_ORDER_TOOL_PREFIXES") {
            self.agent.order_tool_prefixes = parse_list(&value);
        }

        if let Some(value) = read_env("GROCER_GATEWAY_CONFIG_PATH") {
            self.gateway.config_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("GROCER_GATEWAY_TIMEOUT_SECS") {
            self.gateway.timeout_secs = parse_u64("GROCER_GATEWAY_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GROCER_STORAGE_BACKEND") {
            self.storage.backend = value.parse()?;
        }
        if let Some(value) = read_env("GROCER_STORAGE_ENDPOINT") {
            self.storage.endpoint = Some(value);
        }
        if let Some(value) = read_env("GROCER_STORAGE_ROOT") {
            self.storage.root = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("GROCER_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("GROCER_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("GROCER_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("GROCER_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("GROCER_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GROCER_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("GROCER_SERVER_PORT") {
            self.server.port = parse_u16("GROCER_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("GROCER_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("GROCER_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("GROCER_LOGGING_LEVEL").or_else(|| read_env("GROCER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("GROCER_LOGGING_FORMAT").or_else(|| read_env("GROCER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(model_id) = overrides.model_id {
            self.model.model_id = model_id;
        }
        if let Some(region) = overrides.model_region {
            self.model.region = region;
        }
        if let Some(api_key) = overrides.model_api_key {
            self.model.api_key = Some(secret_value(api_key));
        }
        if let Some(config_path) = overrides.gateway_config_path {
            self.gateway.config_path = config_path;
        }
        if let Some(prompts_dir) = overrides.prompts_dir {
            self.agent.prompts_dir = Some(prompts_dir);
        }
        if let Some(backend) = overrides.storage_backend {
            self.storage.backend = backend;
        }
        if let Some(root) = overrides.storage_root {
            self.storage.root = Some(root);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_model(&self.model)?;
        validate_agent(&self.agent)?;
        validate_gateway(&self.gateway)?;
        validate_storage(&self.storage)?;
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("grocer.toml"), PathBuf::from("config/grocer.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_model(model: &ModelConfig) -> Result<(), ConfigError> {
    if model.model_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "model.model_id is required (set GROCER_MODEL_ID or BEDROCK_MODEL_ID)".to_string(),
        ));
    }
    if model.region.trim().is_empty() {
        return Err(ConfigError::Validation(
            "model.region is required (set GROCER_MODEL_REGION or AWS_REGION)".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&model.temperature) {
        return Err(ConfigError::Validation(
            "model.temperature must be in range 0.0..=1.0".to_string(),
        ));
    }
    if model.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "model.max_tokens must be greater than zero".to_string(),
        ));
    }
    if model.timeout_secs == 0 || model.timeout_secs > 900 {
        return Err(ConfigError::Validation(
            "model.timeout_secs must be in range 1..=900".to_string(),
        ));
    }
    if let Some(api_key) = &model.api_key {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "model.api_key must not be blank when set".to_string(),
            ));
        }
    }
    if let Some(endpoint) = &model.endpoint {
        validate_http_url("model.endpoint", endpoint)?;
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.max_tool_rounds == 0 {
        return Err(ConfigError::Validation(
            "agent.max_tool_rounds must be greater than zero".to_string(),
        ));
    }
    if agent.catalog_tool_prefixes.iter().any(|prefix| prefix.trim().is_empty())
        || agent.order_tool_prefixes.iter().any(|prefix| prefix.trim().is_empty())
    {
        return Err(ConfigError::Validation(
            "agent tool prefixes must not contain blank entries".to_string(),
        ));
    }

    Ok(())
}

fn validate_gateway(gateway: &GatewayConfig) -> Result<(), ConfigError> {
    if gateway.config_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("gateway.config_path must not be empty".to_string()));
    }
    if gateway.timeout_secs == 0 || gateway.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "gateway.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_storage(storage: &StorageConfig) -> Result<(), ConfigError> {
    match storage.backend {
        StorageBackend::Local => {
            if storage.root.is_none() {
                return Err(ConfigError::Validation(
                    "storage.root is required for the local storage backend".to_string(),
                ));
            }
        }
        StorageBackend::S3 | StorageBackend::Http => {
            if let Some(endpoint) = &storage.endpoint {
                validate_http_url("storage.endpoint", endpoint)?;
            }
        }
    }

    Ok(())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    model: Option<ModelPatch>,
    agent: Option<AgentPatch>,
    gateway: Option<GatewayPatch>,
    storage: Option<StoragePatch>,
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelPatch {
    model_id: Option<String>,
    region: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    api_key: Option<String>,
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    prompts_dir: Option<PathBuf>,
    max_tool_rounds: Option<u32>,
    catalog_tool_prefixes: Option<Vec<String>>,
    order_tool_prefixes: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayPatch {
    config_path: Option<PathBuf>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    backend: Option<StorageBackend>,
    endpoint: Option<String>,
    root: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, StorageBackend,
        DEFAULT_MODEL_ID,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const MANAGED_VARS: &[&str] = &[
        "BEDROCK_MODEL_ID",
        "AWS_REGION",
        "AWS_BEARER_TOKEN_BEDROCK",
        "GROCER_MODEL_ID",
        "GROCER_MODEL_REGION",
        "GROCER_MODEL_API_KEY",
        "GROCER_MODEL_TEMPERATURE",
        "GROCER_DATABASE_URL",
        "GROCER_STORAGE_BACKEND",
        "GROCER_STORAGE_ROOT",
        "GROCER_AGENT_CATALOG_TOOL_PREFIXES",
        "GROCER_LOG_LEVEL",
        "GROCER_LOG_FORMAT",
        "TEST_GROCER_MODEL_KEY",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars() {
        for var in MANAGED_VARS {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_hosted_model_settings() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.model.model_id == DEFAULT_MODEL_ID, "default model id expected")?;
        ensure(config.model.region == "ap-southeast-2", "default region expected")?;
        ensure((config.model.temperature - 0.1).abs() < f32::EPSILON, "temperature 0.1")?;
        ensure(config.model.max_tokens == 4000, "max tokens 4000")?;
        ensure(config.agent.catalog_tool_prefixes.len() == 4, "four catalog prefixes")?;
        ensure(config.agent.order_tool_prefixes.len() == 4, "four order prefixes")?;
        ensure(config.storage.backend == StorageBackend::S3, "signed s3 storage by default")?;
        ensure(
            "S3".parse::<StorageBackend>().ok() == Some(StorageBackend::S3),
            "storage backend names are case-insensitive",
        )?;
        ensure(
            config.gateway.config_path == PathBuf::from("gateway_config.json"),
            "gateway config file defaults to gateway_config.json",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("TEST_GROCER_MODEL_KEY", "bedrock-key-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("grocer.toml");
            fs::write(
                &path,
                r#"
[model]
api_key = "${TEST_GROCER_MODEL_KEY}"
max_tokens = 2048

[agent]
catalog_tool_prefixes = ["CatalogTarget___"]
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let api_key = config.model.api_key.as_ref().map(|key| key.expose_secret().to_string());
            ensure(
                api_key.as_deref() == Some("bedrock-key-from-env"),
                "api key should be interpolated from environment",
            )?;
            ensure(config.model.max_tokens == 2048, "max tokens should come from the file")?;
            ensure(
                config.agent.catalog_tool_prefixes == vec!["CatalogTarget___".to_string()],
                "catalog prefixes should come from the file",
            )
        })();

        clear_vars();
        result
    }

    #[test]
    fn platform_env_names_are_honored_and_grocer_names_win() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("AWS_REGION", "us-west-2");
        env::set_var("BEDROCK_MODEL_ID", "platform-model");
        env::set_var("GROCER_MODEL_ID", "grocer-model");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.model.region == "us-west-2", "AWS_REGION should set the region")?;
            ensure(config.model.model_id == "grocer-model", "GROCER_MODEL_ID should win")
        })();

        clear_vars();
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("GROCER_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("GROCER_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("grocer.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[logging]
level = "warn"
format = "pretty"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "warn", "file log level should apply")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "env log format should win over file",
            )
        })();

        clear_vars();
        result
    }

    #[test]
    fn local_storage_requires_root() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("GROCER_STORAGE_BACKEND", "local");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected validation failure for local storage".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::Validation(ref message) if message.contains("storage.root")),
                "validation failure should mention storage.root",
            )?;

            let config = AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    storage_root: Some(PathBuf::from("/tmp/grocer-images")),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.storage.backend == StorageBackend::Local, "local backend expected")
        })();

        clear_vars();
        result
    }

    #[test]
    fn invalid_numeric_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("GROCER_MODEL_TEMPERATURE", "warm");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected invalid override failure".to_string()),
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "GROCER_MODEL_TEMPERATURE", "override key should be reported")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
        };

        clear_vars();
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("GROCER_MODEL_API_KEY", "bedrock-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("bedrock-secret-value"), "debug output should not leak key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )
        })();

        clear_vars();
        result
    }
}
