use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::{json, Value};

use grocer_agent::bedrock::BedrockModelProvider;
use grocer_agent::gateway::{
    GatewayError, HttpGatewayConnector, SecretResolver, ToolFilter, ToolLoader,
};
use grocer_agent::image::{DownloadImageTool, LocalObjectStore, S3ObjectStore};
use grocer_agent::llm::ModelSettings;
use grocer_agent::prompts::PromptLibrary;
use grocer_agent::tools::{Tool, ToolOutput};
use grocer_agent::{AgentContext, AgentSettings};

const GATEWAY_TOKEN: &str = "gw-token-123";
const BEDROCK_KEY: &str = "bedrock-key";
const SESSION_ID: &str = "session-abc";
const MILK_ROW: &str = "MILK001 | Full Cream Milk 2L | 3.50 | stock 0";

#[derive(Default)]
struct Counters {
    token_requests: AtomicUsize,
    list_calls: AtomicUsize,
    converse_calls: AtomicUsize,
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

async fn token(State(counters): State<Arc<Counters>>, headers: HeaderMap, body: String) -> Response {
    counters.token_requests.fetch_add(1, Ordering::SeqCst);
    let basic = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("Basic "));
    if !basic || !body.contains("grant_type=client_credentials") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({"access_token": GATEWAY_TOKEN, "token_type": "Bearer", "expires_in": 3600}))
        .into_response()
}

fn tool(name: &str) -> Value {
    json!({"name": name, "description": format!("{name} tool"), "inputSchema": {"type": "object"}})
}

async fn mcp(
    State(counters): State<Arc<Counters>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if bearer(&headers) != Some(GATEWAY_TOKEN) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let id = body["id"].clone();
    let session = headers.get("mcp-session-id").and_then(|value| value.to_str().ok());

    match body["method"].as_str().unwrap_or_default() {
        "initialize" => (
            [("mcp-session-id", SESSION_ID)],
            Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "fake-gateway", "version": "0.0.1"}
                }
            })),
        )
            .into_response(),
        "notifications/initialized" => StatusCode::ACCEPTED.into_response(),
        _ if session != Some(SESSION_ID) => StatusCode::BAD_REQUEST.into_response(),
        "tools/list" => {
            counters.list_calls.fetch_add(1, Ordering::SeqCst);
            match body["params"]["cursor"].as_str() {
                None => {
                    let payload = json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "result": {
                            "tools": [tool("PostgreSQLMCPTarget___query"), tool("DynamoDBMCPTarget___get_item")],
                            "nextCursor": "page-2"
                        }
                    });
                    (
                        [(header::CONTENT_TYPE, "text/event-stream")],
                        format!("event: message\ndata: {payload}\n\n"),
                    )
                        .into_response()
                }
                Some(_) => Json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {
                        "tools": [tool("PostgreSQLMCPTarget___list_tables"), tool("Other___noise")]
                    }
                }))
                .into_response(),
            }
        }
        "tools/call" => {
            let (text, is_error) = match body["params"]["name"].as_str() {
                Some("PostgreSQLMCPTarget___query") => (MILK_ROW, false),
                _ => ("permission denied", true),
            };
            Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {"content": [{"type": "text", "text": text}], "isError": is_error}
            }))
            .into_response()
        }
        _ => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32601, "message": "method not found"}
        }))
        .into_response(),
    }
}

fn tool_use_reply(id: &str, name: &str, input: Value) -> Value {
    json!({
        "output": {"message": {"role": "assistant", "content": [
            {"toolUse": {"toolUseId": id, "name": name, "input": input}}
        ]}},
        "stopReason": "tool_use",
        "usage": {"inputTokens": 10, "outputTokens": 5}
    })
}

fn text_reply(text: String) -> Value {
    json!({
        "output": {"message": {"role": "assistant", "content": [{"text": text}]}},
        "stopReason": "end_turn"
    })
}

/// Plays both the orchestrator and the catalog specialist, keyed on the system prompt.
async fn converse(
    State(counters): State<Arc<Counters>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if bearer(&headers) != Some(BEDROCK_KEY) {
        return StatusCode::FORBIDDEN.into_response();
    }
    counters.converse_calls.fetch_add(1, Ordering::SeqCst);

    let system = body["system"][0]["text"].as_str().unwrap_or_default();
    let last = body["messages"].as_array().and_then(|messages| messages.last()).cloned();
    let tool_result = last
        .as_ref()
        .and_then(|message| message["content"][0]["toolResult"]["content"][0]["text"].as_str())
        .map(ToString::to_string);

    let reply = match (system.contains("coordinator"), tool_result) {
        (true, None) => tool_use_reply("o-1", "catalog_specialist", json!({"query": "2 Milk"})),
        (true, Some(answer)) => text_reply(format!("Proposal: {answer}")),
        (false, None) => tool_use_reply(
            "c-1",
            "PostgreSQLMCPTarget___query",
            json!({"sql": "SELECT * FROM products WHERE product_name LIKE '%milk%'"}),
        ),
        (false, Some(rows)) => text_reply(format!("Found {rows}")),
    };
    Json(reply).into_response()
}

async fn spawn_fake_services(counters: Arc<Counters>) -> SocketAddr {
    let app = Router::new()
        .route("/oauth2/token", post(token))
        .route("/mcp", post(mcp))
        .route("/model/{model_id}/converse", post(converse))
        .with_state(counters);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake services");
    });
    address
}

struct NoSecrets;

#[async_trait]
impl SecretResolver for NoSecrets {
    async fn resolve(&self, _name: &str) -> Result<Option<String>, GatewayError> {
        Ok(None)
    }
}

fn write_gateway_config(dir: &Path, address: SocketAddr) -> PathBuf {
    let path = dir.join("gateway_config.json");
    let config = json!({
        "gateway_url": format!("http://{address}/mcp"),
        "gateway_id": "gw-test",
        "region": "ap-southeast-2",
        "client_info": {
            "client_id": "grocer-client",
            "client_secret": "grocer-secret",
            "token_endpoint": format!("http://{address}/oauth2/token")
        }
    });
    std::fs::write(&path, config.to_string()).expect("write gateway config");
    path
}

fn connector(path: PathBuf) -> Arc<HttpGatewayConnector> {
    Arc::new(HttpGatewayConnector::new(path, Duration::from_secs(5), Arc::new(NoSecrets)))
}

#[tokio::test]
async fn loader_pages_through_the_gateway_once() {
    let counters = Arc::new(Counters::default());
    let address = spawn_fake_services(Arc::clone(&counters)).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let loader = ToolLoader::new(connector(write_gateway_config(dir.path(), address)));

    let all = loader.load_tools(None).await.expect("load tools");
    let names: Vec<&str> = all.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "PostgreSQLMCPTarget___query",
            "DynamoDBMCPTarget___get_item",
            "PostgreSQLMCPTarget___list_tables",
            "Other___noise"
        ]
    );

    let catalog = ToolFilter::new(["PostgreSQLMCPTarget___query", "PostgreSQLMCPTarget___list_tables"]);
    let tools = loader.tools_or_empty(Some(&catalog)).await;
    assert_eq!(tools.len(), 2);
    assert_eq!(counters.list_calls.load(Ordering::SeqCst), 2);
    assert_eq!(counters.token_requests.load(Ordering::SeqCst), 1);

    let output = tools[0].call(json!({"sql": "SELECT 1"})).await.expect("query");
    assert_eq!(output, ToolOutput::Text(MILK_ROW.to_string()));
    let denied = tools[1].call(json!({})).await.expect_err("tool error");
    assert!(denied.to_string().contains("permission denied"));
}

#[tokio::test]
async fn orchestrator_routes_through_catalog_specialist() {
    let counters = Arc::new(Counters::default());
    let address = spawn_fake_services(Arc::clone(&counters)).await;
    let dir = tempfile::tempdir().expect("tempdir");

    let settings = AgentSettings {
        model: ModelSettings {
            model_id: "test-model".to_string(),
            region: "ap-southeast-2".to_string(),
            temperature: 0.1,
            max_tokens: 4000,
            endpoint: format!("http://{address}"),
            api_key: Some(SecretString::from(BEDROCK_KEY.to_string())),
            timeout: Duration::from_secs(5),
        },
        catalog_prefixes: vec!["PostgreSQLMCPTarget___query".to_string()],
        order_prefixes: vec!["DynamoDBMCPTarget___get_item".to_string()],
        max_tool_rounds: 4,
    };
    let context = AgentContext::new(
        settings,
        Arc::new(BedrockModelProvider),
        connector(write_gateway_config(dir.path(), address)),
        PromptLibrary::default(),
        Arc::new(LocalObjectStore::new(dir.path())),
    );

    let answer = context.process(&["2 Milk".to_string()]).await;

    assert_eq!(answer, format!("Proposal: Found {MILK_ROW}"));
    assert_eq!(counters.converse_calls.load(Ordering::SeqCst), 4);
    let readiness = context.readiness();
    assert!(readiness.orchestrator_ready && readiness.tools_loaded);
    assert_eq!(readiness.tool_count, 4);
}

#[tokio::test]
async fn missing_gateway_file_leaves_specialists_without_remote_tools() {
    let dir = tempfile::tempdir().expect("tempdir");
    let loader = ToolLoader::new(connector(dir.path().join("gateway_config.json")));

    let error = loader.load_tools(None).await.expect_err("not configured");
    assert!(error.is_not_configured());
    assert!(loader.tools_or_empty(None).await.is_empty());
    assert!(!loader.is_loaded());
}

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Default)]
struct ObjectRequests {
    seen: Mutex<Vec<(String, Option<String>)>>,
}

async fn object(
    State(requests): State<Arc<ObjectRequests>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);
    requests.seen.lock().expect("requests lock").push((uri.path().to_string(), authorization));

    ([(header::CONTENT_TYPE, "image/png")], PNG.to_vec()).into_response()
}

#[tokio::test]
async fn s3_store_signs_object_reads() {
    let requests = Arc::new(ObjectRequests::default());
    let app = Router::new().fallback(object).with_state(requests.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake object store");
    });

    let config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("ap-southeast-2"))
        .credentials_provider(Credentials::new("AKIDGROCER", "grocer-secret", None, None, "test"))
        .endpoint_url(format!("http://{address}"))
        .force_path_style(true)
        .build();
    let store = Arc::new(S3ObjectStore::new(aws_sdk_s3::Client::from_conf(config)));
    let tool = DownloadImageTool::new(store);

    let output = tool
        .call(json!({"s3_bucket": "grocery-uploads", "s3_key": "lists/weekly.png"}))
        .await
        .expect("download");

    let ToolOutput::Json(body) = output else {
        panic!("expected json output");
    };
    assert_eq!(body["content_type"], "image/png");
    assert_eq!(body["size"], PNG.len());

    let seen = requests.seen.lock().expect("requests lock");
    let (path, authorization) = seen.first().expect("one object request");
    assert_eq!(path, "/grocery-uploads/lists/weekly.png");
    let authorization = authorization.as_deref().expect("signed request");
    assert!(authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDGROCER/"));
    assert!(authorization.contains("/ap-southeast-2/s3/aws4_request"));
}
