use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use grocer_core::payload::InvocationPayload;
use grocer_handlers::upload_events;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::routes::AppState;

pub const INVALID_PAYLOAD: &str = "Error: Invalid payload format";
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Runs one payload through the orchestrator. The body is read as raw text so
/// non-JSON input still reaches the agent as a literal instruction.
pub async fn invoke(State(state): State<AppState>, body: String) -> Json<String> {
    let payload = InvocationPayload::from_text(&body);
    let instructions = payload.instructions();

    if instructions.is_empty() {
        warn!(
            event_name = "server.invocation.invalid_payload",
            shape = payload.shape(),
            "payload carried no instructions"
        );
        return Json(INVALID_PAYLOAD.to_string());
    }

    info!(
        event_name = "server.invocation.received",
        shape = payload.shape(),
        instructions = instructions.len(),
        action = payload.action().unwrap_or("none"),
        customer_id = payload.customer_id().unwrap_or("unknown"),
        "processing invocation"
    );
    Json(state.agents.process(&instructions).await)
}

pub async fn object_created(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let invocation = match upload_events::prepare(&event, &request_id) {
        Ok(invocation) => invocation,
        Err(details) => {
            warn!(event_name = "server.upload.rejected", request_id = %request_id, %details, "malformed upload notification");
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": details })));
        }
    };

    let instructions = InvocationPayload::from_value(&invocation.object.payload()).instructions();
    let response = state.agents.process(&instructions).await;
    info!(
        event_name = "server.upload.processed",
        session_id = %invocation.session_id,
        "agent response received"
    );

    (StatusCode::OK, Json(json!({ "session_id": invocation.session_id, "response": response })))
}

#[cfg(test)]
mod tests {
    use axum::{
        extract::State,
        http::{HeaderMap, HeaderValue, StatusCode},
        Json,
    };
    use serde_json::json;

    use super::{invoke, object_created, INVALID_PAYLOAD};
    use crate::routes::testing;

    #[tokio::test]
    async fn empty_payloads_are_rejected_as_text() {
        let state = testing::state().await;

        let Json(answer) = invoke(State(state.clone()), r#"{"unexpected": true}"#.to_string()).await;
        assert_eq!(answer, INVALID_PAYLOAD);

        let Json(blank) = invoke(State(state), "   ".to_string()).await;
        assert_eq!(blank, INVALID_PAYLOAD);
    }

    #[tokio::test]
    async fn plain_text_is_a_literal_instruction() {
        let state = testing::state().await;
        let Json(answer) = invoke(State(state), "add oat milk".to_string()).await;
        assert_eq!(answer, "ADD OAT MILK");
    }

    #[tokio::test]
    async fn json_string_bodies_lose_their_quotes() {
        let state = testing::state().await;

        let Json(bare) = invoke(State(state.clone()), r#""2 Milk""#.to_string()).await;
        assert_eq!(bare, "2 MILK");

        let body = r#""{\"grocery_items\": [\"2 Milk\", \"1 Bread\"]}""#;
        let Json(items) = invoke(State(state), body.to_string()).await;
        assert_eq!(items, "2 MILK\n1 BREAD");
    }

    #[tokio::test]
    async fn upload_notification_runs_the_image_instruction() {
        let state = testing::state().await;
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("abc-123"));
        let event = json!({
            "Records": [{"s3": {"bucket": {"name": "uploads"}, "object": {"key": "list.png"}}}]
        });

        let (status, Json(body)) = object_created(State(state), headers, Json(event)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_id"], "session-abc-123");
        assert_eq!(
            body["response"],
            "EXTRACT THE GROCERY LIST FROM THE IMAGE AT S3://UPLOADS/LIST.PNG"
        );
    }

    #[tokio::test]
    async fn malformed_notification_is_a_bad_request() {
        let state = testing::state().await;
        let (status, Json(body)) =
            object_created(State(state), HeaderMap::new(), Json(json!({"Records": []}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().expect("error").contains("Records"));
    }
}
