//! Bedrock Converse binding.
//!
//! Requests are sent to `{endpoint}/model/{model_id}/converse` with a bearer
//! API key (`AWS_BEARER_TOKEN_BEDROCK`). Message and tool payloads follow the
//! Converse wire shape: camelCase keys, content blocks keyed by their kind.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Url;
use secrecy::ExposeSecret;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::conversation::{
    ContentBlock, ImageFormat, Message, Role, ToolResultContent, ToolUse,
};
use crate::llm::{
    ConverseRequest, LlmClient, ModelProvider, ModelSettings, ModelTurn, StopReason, TokenUsage,
};
use crate::tools::ToolSpec;

pub struct BedrockConverseClient {
    http: reqwest::Client,
    settings: ModelSettings,
    url: Url,
}

impl BedrockConverseClient {
    pub fn new(settings: ModelSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("failed to build Bedrock HTTP client")?;
        let url = converse_url(&settings.endpoint, &settings.model_id)?;

        Ok(Self { http, settings, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

fn converse_url(endpoint: &str, model_id: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint)
        .with_context(|| format!("invalid Bedrock endpoint `{endpoint}`"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("Bedrock endpoint `{endpoint}` cannot carry a path"))?
        .pop_if_empty()
        .extend(["model", model_id, "converse"]);
    Ok(url)
}

#[async_trait]
impl LlmClient for BedrockConverseClient {
    fn model_id(&self) -> &str {
        &self.settings.model_id
    }

    async fn converse(&self, request: ConverseRequest<'_>) -> Result<ModelTurn> {
        let body = encode_request(&request, &self.settings);
        debug!(
            event_name = "model.converse.request",
            model_id = %self.settings.model_id,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending converse request"
        );

        let mut builder = self.http.post(self.url.clone()).json(&body);
        if let Some(api_key) = &self.settings.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response = builder.send().await.context("failed to send Bedrock converse request")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Bedrock converse error {status}: {body}"));
        }

        let payload: Value =
            response.json().await.context("failed to parse Bedrock converse response")?;
        decode_response(&payload)
    }
}

/// Default provider: one Converse client per settings value.
#[derive(Clone, Copy, Debug, Default)]
pub struct BedrockModelProvider;

impl ModelProvider for BedrockModelProvider {
    fn create(&self, settings: &ModelSettings) -> Result<Arc<dyn LlmClient>> {
        Ok(Arc::new(BedrockConverseClient::new(settings.clone())?))
    }
}

pub fn encode_request(request: &ConverseRequest<'_>, settings: &ModelSettings) -> Value {
    let mut body = Map::new();
    if !request.system.trim().is_empty() {
        body.insert("system".into(), json!([{ "text": request.system }]));
    }
    body.insert(
        "messages".into(),
        Value::Array(request.messages.iter().map(encode_message).collect()),
    );
    body.insert(
        "inferenceConfig".into(),
        json!({ "maxTokens": settings.max_tokens, "temperature": settings.temperature }),
    );
    if !request.tools.is_empty() {
        body.insert(
            "toolConfig".into(),
            json!({ "tools": request.tools.iter().map(encode_tool_spec).collect::<Vec<_>>() }),
        );
    }
    Value::Object(body)
}

fn encode_tool_spec(spec: &ToolSpec) -> Value {
    json!({
        "toolSpec": {
            "name": spec.name,
            "description": spec.description,
            "inputSchema": { "json": spec.input_schema },
        }
    })
}

fn encode_message(message: &Message) -> Value {
    json!({
        "role": message.role.as_str(),
        "content": message.content.iter().map(encode_block).collect::<Vec<_>>(),
    })
}

fn encode_image(format: ImageFormat, bytes: &[u8]) -> Value {
    json!({
        "format": format.as_str(),
        "source": { "bytes": base64::engine::general_purpose::STANDARD.encode(bytes) },
    })
}

fn encode_block(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text(text) => json!({ "text": text }),
        ContentBlock::Image { format, bytes } => json!({ "image": encode_image(*format, bytes) }),
        ContentBlock::ToolUse(tool_use) => json!({
            "toolUse": {
                "toolUseId": tool_use.id,
                "name": tool_use.name,
                "input": tool_use.input,
            }
        }),
        ContentBlock::ToolResult { tool_use_id, content, is_error } => {
            let content: Vec<Value> = content
                .iter()
                .map(|item| match item {
                    ToolResultContent::Text(text) => json!({ "text": text }),
                    ToolResultContent::Json(value) => json!({ "json": value }),
                    ToolResultContent::Image { format, bytes } => {
                        json!({ "image": encode_image(*format, bytes) })
                    }
                })
                .collect();
            json!({
                "toolResult": {
                    "toolUseId": tool_use_id,
                    "content": content,
                    "status": if *is_error { "error" } else { "success" },
                }
            })
        }
    }
}

pub fn decode_response(payload: &Value) -> Result<ModelTurn> {
    let message = payload
        .pointer("/output/message")
        .ok_or_else(|| anyhow!("Bedrock response is missing output.message"))?;

    let role = match message.get("role").and_then(Value::as_str) {
        Some("user") => Role::User,
        _ => Role::Assistant,
    };

    let mut content = Vec::new();
    for block in message.get("content").and_then(Value::as_array).into_iter().flatten() {
        if let Some(text) = block.get("text").and_then(Value::as_str) {
            content.push(ContentBlock::Text(text.to_string()));
        } else if let Some(tool_use) = block.get("toolUse") {
            content.push(ContentBlock::ToolUse(decode_tool_use(tool_use)?));
        }
    }

    let stop_reason = payload
        .get("stopReason")
        .and_then(Value::as_str)
        .map(StopReason::parse)
        .unwrap_or(StopReason::EndTurn);

    let usage = payload.get("usage").map(|usage| TokenUsage {
        input_tokens: read_u32(usage, "inputTokens"),
        output_tokens: read_u32(usage, "outputTokens"),
    });

    Ok(ModelTurn { message: Message { role, content }, stop_reason, usage })
}

fn decode_tool_use(value: &Value) -> Result<ToolUse> {
    let id = value
        .get("toolUseId")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("toolUse block is missing toolUseId"))?;
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("toolUse block is missing name"))?;
    let input = value.get("input").cloned().unwrap_or_else(|| json!({}));

    Ok(ToolUse { id: id.to_string(), name: name.to_string(), input })
}

fn read_u32(value: &Value, key: &str) -> u32 {
    value.get(key).and_then(Value::as_u64).and_then(|n| u32::try_from(n).ok()).unwrap_or(0)
}
