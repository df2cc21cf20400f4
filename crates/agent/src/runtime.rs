use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::conversation::{ContentBlock, Message, Role, ToolResultContent, ToolUse};
use crate::llm::{ConverseRequest, LlmClient, StopReason};
use crate::tools::ToolRegistry;

/// Anything that turns one text request into one text answer.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, input: &str) -> Result<String>;
}

/// A system prompt, a tool set and a model, driven in a tool-use loop.
pub struct Agent {
    name: String,
    system_prompt: String,
    tools: ToolRegistry,
    model: Arc<dyn LlmClient>,
    max_rounds: usize,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        tools: ToolRegistry,
        model: Arc<dyn LlmClient>,
        max_rounds: usize,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            tools,
            model,
            max_rounds: max_rounds.max(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.names()
    }

    /// Runs the conversation until the model answers without requesting tools.
    pub async fn run(&self, input: &str) -> Result<String> {
        if input.trim().is_empty() {
            bail!("{}: no instructions to process", self.name);
        }

        let specs = self.tools.specs();
        let mut messages = vec![Message::user_text(input)];

        for round in 1..=self.max_rounds {
            let turn = self
                .model
                .converse(ConverseRequest {
                    system: &self.system_prompt,
                    messages: &messages,
                    tools: &specs,
                })
                .await?;

            if let Some(usage) = turn.usage {
                debug!(
                    agent = %self.name,
                    round,
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    "model turn"
                );
            }

            let requested: Vec<ToolUse> = turn.message.tool_uses().into_iter().cloned().collect();
            if requested.is_empty() {
                if turn.stop_reason == StopReason::MaxTokens {
                    warn!(agent = %self.name, "model answer truncated at max tokens");
                }
                return Ok(turn.message.text());
            }

            let mut results = Vec::with_capacity(requested.len());
            for tool_use in &requested {
                results.push(self.execute(tool_use).await);
            }
            messages.push(turn.message);
            messages.push(Message { role: Role::User, content: results });
        }

        bail!("{} did not finish within {} tool rounds", self.name, self.max_rounds)
    }

    async fn execute(&self, tool_use: &ToolUse) -> ContentBlock {
        let Some(tool) = self.tools.get(&tool_use.name) else {
            warn!(agent = %self.name, tool = %tool_use.name, "model requested an unknown tool");
            return tool_result(tool_use, ToolResultContent::Text(format!("unknown tool `{}`", tool_use.name)), true);
        };

        info!(event_name = "agent.tool.call", agent = %self.name, tool = %tool_use.name, "calling tool");
        match tool.call(tool_use.input.clone()).await {
            Ok(output) => tool_result(tool_use, output.into(), false),
            Err(error) => {
                warn!(
                    event_name = "agent.tool.failed",
                    agent = %self.name,
                    tool = %tool_use.name,
                    error = %format!("{error:#}"),
                    "tool call failed"
                );
                tool_result(tool_use, ToolResultContent::Text(format!("{error:#}")), true)
            }
        }
    }
}

fn tool_result(tool_use: &ToolUse, content: ToolResultContent, is_error: bool) -> ContentBlock {
    ContentBlock::ToolResult { tool_use_id: tool_use.id.clone(), content: vec![content], is_error }
}

#[async_trait]
impl Responder for Agent {
    async fn respond(&self, input: &str) -> Result<String> {
        self.run(input).await
    }
}
