use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;

use grocer_core::config::ModelConfig;

use crate::conversation::Message;
use crate::tools::ToolSpec;

/// Connection and inference parameters shared by every agent in a context.
#[derive(Clone, Debug)]
pub struct ModelSettings {
    pub model_id: String,
    pub region: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub endpoint: String,
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
}

impl ModelSettings {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            model_id: config.model_id.clone(),
            region: config.region.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            endpoint: config.endpoint_url(),
            api_key: config.api_key.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ConverseRequest<'a> {
    pub system: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [ToolSpec],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    Other(String),
}

impl StopReason {
    pub fn parse(value: &str) -> Self {
        match value {
            "end_turn" => Self::EndTurn,
            "tool_use" => Self::ToolUse,
            "max_tokens" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelTurn {
    pub message: Message,
    pub stop_reason: StopReason,
    pub usage: Option<TokenUsage>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn model_id(&self) -> &str;
    async fn converse(&self, request: ConverseRequest<'_>) -> Result<ModelTurn>;
}

/// Builds the shared model handle; called at most once per agent context.
pub trait ModelProvider: Send + Sync {
    fn create(&self, settings: &ModelSettings) -> Result<Arc<dyn LlmClient>>;
}
