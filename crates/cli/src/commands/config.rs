use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use grocer_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let api_key = config
        .model
        .api_key
        .as_ref()
        .map(|key| redact_secret(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    let prompts_dir = config
        .agent
        .prompts_dir
        .as_ref()
        .map(|dir| dir.display().to_string())
        .unwrap_or_else(|| "<embedded>".to_string());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    let mut push = |key: &str, value: String, env_keys: &[&str]| {
        lines.push(render_line(key, &value, source(key, env_keys)));
    };

    push("model.model_id", config.model.model_id.clone(), &["GROCER_MODEL_ID", "BEDROCK_MODEL_ID"]);
    push("model.region", config.model.region.clone(), &["GROCER_MODEL_REGION", "AWS_REGION"]);
    push("model.temperature", config.model.temperature.to_string(), &["GROCER_MODEL_TEMPERATURE"]);
    push("model.max_tokens", config.model.max_tokens.to_string(), &["GROCER_MODEL_MAX_TOKENS"]);
    push("model.endpoint", config.model.endpoint_url(), &["GROCER_MODEL_ENDPOINT"]);
    push("model.api_key", api_key, &["GROCER_MODEL_API_KEY", "AWS_BEARER_TOKEN_BEDROCK"]);
    push("agent.prompts_dir", prompts_dir, &["GROCER_AGENT_PROMPTS_DIR"]);
    push(
        "agent.max_tool_rounds",
        config.agent.max_tool_rounds.to_string(),
        &["GROCER_AGENT_MAX_TOOL_ROUNDS"],
    );
    push(
        "agent.catalog_tool_prefixes",
        config.agent.catalog_tool_prefixes.join(","),
        &["GROCER_AGENT_CATALOG_TOOL_PREFIXES"],
    );
    push(
        "agent.order_tool_prefixes",
        config.agent.order_tool_prefixes.join(","),
        &["GROCER_AGENT_ORDER_TOOL_PREFIXES"],
    );
    push(
        "gateway.config_path",
        config.gateway.config_path.display().to_string(),
        &["GROCER_GATEWAY_CONFIG_PATH"],
    );
    push("storage.backend", format!("{:?}", config.storage.backend), &["GROCER_STORAGE_BACKEND"]);
    push(
        "storage.endpoint",
        config.storage.endpoint_url(&config.model.region),
        &["GROCER_STORAGE_ENDPOINT"],
    );
    push("database.url", config.database.url.clone(), &["GROCER_DATABASE_URL"]);
    push(
        "database.max_connections",
        config.database.max_connections.to_string(),
        &["GROCER_DATABASE_MAX_CONNECTIONS"],
    );
    push(
        "server.bind_address",
        config.server.bind_address.clone(),
        &["GROCER_SERVER_BIND_ADDRESS"],
    );
    push("server.port", config.server.port.to_string(), &["GROCER_SERVER_PORT"]);
    push(
        "logging.level",
        config.logging.level.clone(),
        &["GROCER_LOGGING_LEVEL", "GROCER_LOG_LEVEL"],
    );
    push(
        "logging.format",
        format!("{:?}", config.logging.format),
        &["GROCER_LOGGING_FORMAT", "GROCER_LOG_FORMAT"],
    );

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("grocer.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/grocer.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the last four characters of long secrets.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= 8 {
        return "<redacted>".to_string();
    }

    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{tail}")
}
