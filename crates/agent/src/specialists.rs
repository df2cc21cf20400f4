use std::fmt;
use std::sync::Weak;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::context::AgentContext;
use crate::tools::{Tool, ToolOutput, ToolSpec};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpecialistKind {
    Catalog,
    Order,
    Warehouse,
    ImageProcessor,
}

impl SpecialistKind {
    pub const ALL: [Self; 4] = [Self::Catalog, Self::Order, Self::Warehouse, Self::ImageProcessor];

    /// Name the orchestrator calls the specialist by.
    pub fn tool_name(self) -> &'static str {
        match self {
            Self::Catalog => "catalog_specialist",
            Self::Order => "order_specialist",
            Self::Warehouse => "wm_specialist",
            Self::ImageProcessor => "image_processor_specialist",
        }
    }

    pub fn agent_name(self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Order => "order",
            Self::Warehouse => "wm",
            Self::ImageProcessor => "image_processor",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Catalog => "Search product catalog and suggest items",
            Self::Order => "Place order and send confirmation",
            Self::Warehouse => "Get available delivery slots from warehouse",
            Self::ImageProcessor => {
                "Extract grocery list from image in S3. Pass the s3://bucket/key reference."
            }
        }
    }

    pub fn input_field(self) -> &'static str {
        match self {
            Self::Catalog => "query",
            Self::Order => "order_details",
            Self::Warehouse => "delivery_request",
            Self::ImageProcessor => "request",
        }
    }
}

impl fmt::Display for SpecialistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.agent_name())
    }
}

/// Exposes one specialist to the orchestrator as a `(string) -> string` tool.
pub struct SpecialistTool {
    kind: SpecialistKind,
    context: Weak<AgentContext>,
}

impl SpecialistTool {
    pub fn new(kind: SpecialistKind, context: Weak<AgentContext>) -> Self {
        Self { kind, context }
    }

    pub fn kind(&self) -> SpecialistKind {
        self.kind
    }

    fn request_text(&self, input: &Value) -> Result<String> {
        let text = match input {
            Value::String(text) => Some(text.as_str()),
            Value::Object(fields) => fields.get(self.kind.input_field()).and_then(Value::as_str),
            _ => None,
        };
        text.map(ToString::to_string)
            .ok_or_else(|| anyhow!("`{}` must be a string", self.kind.input_field()))
    }
}

#[async_trait]
impl Tool for SpecialistTool {
    fn spec(&self) -> ToolSpec {
        let field = self.kind.input_field();
        ToolSpec {
            name: self.kind.tool_name().to_string(),
            description: self.kind.description().to_string(),
            input_schema: json!({
                "type": "object",
                "properties": { field: { "type": "string" } },
                "required": [field],
            }),
        }
    }

    async fn call(&self, input: Value) -> Result<ToolOutput> {
        let request = self.request_text(&input)?;
        let context = self
            .context
            .upgrade()
            .ok_or_else(|| anyhow!("agent context for {} was dropped", self.kind.tool_name()))?;

        let specialist = context.specialist(self.kind).await?;
        info!(event_name = "agent.specialist.call", specialist = %self.kind, "delegating to specialist");
        let answer = specialist.run(&request).await?;
        Ok(ToolOutput::Text(answer))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Weak;

    use serde_json::json;

    use super::{SpecialistKind, SpecialistTool};
    use crate::tools::Tool;

    #[test]
    fn tool_names_are_unique() {
        let names: HashSet<_> = SpecialistKind::ALL.iter().map(|kind| kind.tool_name()).collect();
        assert_eq!(names.len(), 4);
        assert!(names.contains("wm_specialist"));
    }

    #[test]
    fn schema_requires_the_single_string_field() {
        let tool = SpecialistTool::new(SpecialistKind::Order, Weak::new());
        let spec = tool.spec();
        assert_eq!(spec.input_schema["required"], json!(["order_details"]));
        assert_eq!(spec.input_schema["properties"]["order_details"]["type"], "string");
    }

    #[test]
    fn request_text_accepts_field_or_bare_string() {
        let tool = SpecialistTool::new(SpecialistKind::Catalog, Weak::new());
        assert_eq!(tool.request_text(&json!({"query": "milk"})).expect("text"), "milk");
        assert_eq!(tool.request_text(&json!("bread")).expect("text"), "bread");
        assert!(tool.request_text(&json!({"query": 3})).is_err());
    }

    #[tokio::test]
    async fn dropped_context_is_an_error() {
        let tool = SpecialistTool::new(SpecialistKind::Warehouse, Weak::new());
        assert!(tool.call(json!({"delivery_request": "tomorrow"})).await.is_err());
    }
}
