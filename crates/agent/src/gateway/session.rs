use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::auth::{exchange_client_credentials, resolve_client_info, SecretResolver};
use super::{GatewayError, GatewayFile, ToolDescriptor};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
const SESSION_HEADER: &str = "mcp-session-id";
const ACCEPT_STREAMABLE: &str = "application/json, text/event-stream";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolPage {
    pub tools: Vec<ToolDescriptor>,
    pub next_cursor: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolCallResult {
    pub text: String,
    pub structured: Option<Value>,
    pub is_error: bool,
}

/// A live connection that can page through and invoke gateway tools.
#[async_trait]
pub trait ToolSource: Send + Sync {
    async fn list_page(&self, cursor: Option<&str>) -> Result<ToolPage, GatewayError>;
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, GatewayError>;
}

/// Opens the gateway session: configuration, credentials, token, handshake.
#[async_trait]
pub trait GatewayConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ToolSource>, GatewayError>;
}

pub struct HttpGatewayConnector {
    config_path: PathBuf,
    timeout: Duration,
    secrets: Arc<dyn SecretResolver>,
}

impl HttpGatewayConnector {
    pub fn new(config_path: PathBuf, timeout: Duration, secrets: Arc<dyn SecretResolver>) -> Self {
        Self { config_path, timeout, secrets }
    }
}

#[async_trait]
impl GatewayConnector for HttpGatewayConnector {
    async fn connect(&self) -> Result<Arc<dyn ToolSource>, GatewayError> {
        let file = GatewayFile::load(&self.config_path).await?;
        let client_info = resolve_client_info(self.secrets.as_ref(), &file).await?;

        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|error| GatewayError::Transport(error.to_string()))?;

        let token = exchange_client_credentials(&http, &client_info, &file.region).await?;
        info!(event_name = "gateway.token.obtained", gateway_id = %file.gateway_id, "access token obtained");

        let session = GatewaySession::open(http, file.gateway_url.clone(), token.value).await?;
        info!(
            event_name = "gateway.session.opened",
            gateway_url = %file.gateway_url,
            session_id = session.session_id().unwrap_or("none"),
            "connected to tool gateway"
        );
        Ok(Arc::new(session))
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListedTool {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    input_schema: Option<Value>,
}

/// MCP session over streamable HTTP (JSON-RPC 2.0 POSTs, JSON or SSE replies).
pub struct GatewaySession {
    http: reqwest::Client,
    url: String,
    token: SecretString,
    session_id: Option<String>,
    next_id: AtomicU64,
}

impl GatewaySession {
    pub async fn open(
        http: reqwest::Client,
        url: String,
        token: SecretString,
    ) -> Result<Self, GatewayError> {
        let mut session = Self { http, url, token, session_id: None, next_id: AtomicU64::new(1) };

        let id = session.next_request_id();
        let initialize = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "initialize",
            "params": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": { "name": "grocer-agent", "version": env!("CARGO_PKG_VERSION") },
            },
        });
        let response = session.post(&initialize).await?;
        session.session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);
        let result = read_rpc_result(response, id).await?;
        debug!(server = ?result.get("serverInfo"), "gateway initialize complete");

        let initialized = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
        session.post(&initialized).await?;

        Ok(session)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, GatewayError> {
        let mut request = self
            .http
            .post(&self.url)
            .bearer_auth(self.token.expose_secret())
            .header(ACCEPT, HeaderValue::from_static(ACCEPT_STREAMABLE))
            .json(body);
        if let Some(session_id) = &self.session_id {
            request = request.header(SESSION_HEADER, session_id);
        }

        let response = request
            .send()
            .await
            .map_err(|error| GatewayError::Transport(format!("{}: {error}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Transport(format!("{} returned {status}: {body}", self.url)));
        }
        Ok(response)
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let id = self.next_request_id();
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let response = self.post(&body).await?;
        read_rpc_result(response, id).await
    }
}

#[async_trait]
impl ToolSource for GatewaySession {
    async fn list_page(&self, cursor: Option<&str>) -> Result<ToolPage, GatewayError> {
        let params = match cursor {
            Some(cursor) => json!({ "cursor": cursor }),
            None => json!({}),
        };
        let result = self.rpc("tools/list", params).await?;
        parse_tool_page(result)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, GatewayError> {
        let result = self.rpc("tools/call", json!({ "name": name, "arguments": arguments })).await?;
        Ok(parse_call_result(&result))
    }
}

async fn read_rpc_result(response: reqwest::Response, id: u64) -> Result<Value, GatewayError> {
    let is_event_stream = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/event-stream"));
    let body = response
        .text()
        .await
        .map_err(|error| GatewayError::Transport(format!("failed to read response: {error}")))?;

    let candidates: Vec<Value> = if is_event_stream {
        sse_data_events(&body)
            .iter()
            .filter_map(|data| serde_json::from_str::<Value>(data).ok())
            .collect()
    } else {
        let value = serde_json::from_str::<Value>(&body)
            .map_err(|error| GatewayError::Protocol(format!("response is not JSON: {error}")))?;
        vec![value]
    };

    let expected = json!(id);
    let response = candidates
        .into_iter()
        .filter_map(|value| serde_json::from_value::<RpcResponse>(value).ok())
        .find(|response| response.id.as_ref() == Some(&expected))
        .ok_or_else(|| GatewayError::Protocol(format!("no response for request id {id}")))?;

    if let Some(error) = response.error {
        return Err(GatewayError::Rpc { code: error.code, message: error.message });
    }
    response
        .result
        .ok_or_else(|| GatewayError::Protocol(format!("response {id} has neither result nor error")))
}

/// Joined `data:` payloads of each server-sent event in `body`.
pub(crate) fn sse_data_events(body: &str) -> Vec<String> {
    let mut events = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in body.lines() {
        if line.is_empty() {
            if !current.is_empty() {
                events.push(current.join("\n"));
                current.clear();
            }
            continue;
        }
        if let Some(data) = line.strip_prefix("data:") {
            current.push(data.strip_prefix(' ').unwrap_or(data));
        }
    }
    if !current.is_empty() {
        events.push(current.join("\n"));
    }

    events
}

fn parse_tool_page(result: Value) -> Result<ToolPage, GatewayError> {
    let tools = match result.get("tools") {
        Some(tools) => serde_json::from_value::<Vec<ListedTool>>(tools.clone())
            .map_err(|error| GatewayError::Protocol(format!("invalid tools/list result: {error}")))?,
        None => return Err(GatewayError::Protocol("tools/list result has no `tools`".to_string())),
    };

    let next_cursor = result
        .get("nextCursor")
        .and_then(Value::as_str)
        .filter(|cursor| !cursor.is_empty())
        .map(ToString::to_string);

    Ok(ToolPage {
        tools: tools
            .into_iter()
            .map(|tool| {
                ToolDescriptor::new(
                    tool.name,
                    tool.description.unwrap_or_default(),
                    tool.input_schema.unwrap_or_else(|| json!({ "type": "object" })),
                )
            })
            .collect(),
        next_cursor,
    })
}

fn parse_call_result(result: &Value) -> ToolCallResult {
    let text = result
        .get("content")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n");

    ToolCallResult {
        text,
        structured: result.get("structuredContent").cloned(),
        is_error: result.get("isError").and_then(Value::as_bool).unwrap_or(false),
    }
}
