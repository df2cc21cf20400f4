use grocer_agent::AgentContext;
use grocer_core::payload::InvocationPayload;
use serde_json::json;

use crate::commands::{build_runtime, load_config, CommandResult};

/// Exit codes: 2 config or empty payload, 3 runtime, 6 agent error.
pub fn run(raw_payload: &str) -> CommandResult {
    let payload = InvocationPayload::from_text(raw_payload);
    let instructions = payload.instructions();
    if instructions.is_empty() {
        return CommandResult::failure_with_data(
            "invoke",
            "invalid_payload",
            "Error: Invalid payload format",
            2,
            Some(json!({ "shape": payload.shape() })),
        );
    }

    let config = match load_config("invoke") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("invoke") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let agents = AgentContext::from_config(&config).await.map_err(|error| {
            CommandResult::failure("invoke", "agent_setup", format!("{error:#}"), 6)
        })?;
        let answer = agents.process(&instructions).await;
        Ok::<_, CommandResult>((answer, agents.readiness()))
    });

    let (answer, readiness) = match result {
        Ok(outcome) => outcome,
        Err(failure) => return failure,
    };
    let data = Some(json!({
        "shape": payload.shape(),
        "instructions": instructions.len(),
        "tool_count": readiness.tool_count,
    }));

    if answer.starts_with("Error:") {
        CommandResult::failure_with_data("invoke", "agent", answer, 6, data)
    } else {
        CommandResult::success_with_data("invoke", answer, data)
    }
}
