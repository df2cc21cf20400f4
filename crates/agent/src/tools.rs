use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::conversation::{ImageFormat, ToolResultContent};

/// What the model sees for a tool: name, description and JSON input schema.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Json(Value),
    Image { format: ImageFormat, bytes: Vec<u8> },
}

impl From<ToolOutput> for ToolResultContent {
    fn from(output: ToolOutput) -> Self {
        match output {
            ToolOutput::Text(text) => Self::Text(text),
            ToolOutput::Json(value) => Self::Json(value),
            ToolOutput::Image { format, bytes } => Self::Image { format, bytes },
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;
    async fn call(&self, input: Value) -> Result<ToolOutput>;
}

/// Ordered tool set; registering a name twice replaces the earlier tool in place.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.spec().name;
        match self.index.get(&name) {
            Some(&position) => self.tools[position] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn extend<I>(&mut self, tools: I)
    where
        I: IntoIterator<Item = Arc<dyn Tool>>,
    {
        for tool in tools {
            self.register(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&position| Arc::clone(&self.tools[position]))
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|tool| tool.spec()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.spec().name).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::{Tool, ToolOutput, ToolRegistry, ToolSpec};

    struct Named(&'static str, &'static str);

    #[async_trait]
    impl Tool for Named {
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: self.0.to_string(),
                description: self.1.to_string(),
                input_schema: json!({"type": "object"}),
            }
        }

        async fn call(&self, _input: Value) -> Result<ToolOutput> {
            Ok(ToolOutput::Text(self.1.to_string()))
        }
    }

    #[tokio::test]
    async fn registry_preserves_order_and_replaces_duplicates() {
        let mut registry = ToolRegistry::default();
        registry.register(Arc::new(Named("b", "first b")));
        registry.register(Arc::new(Named("a", "a")));
        registry.register(Arc::new(Named("b", "second b")));

        assert_eq!(registry.names(), vec!["b", "a"]);
        assert_eq!(registry.len(), 2);

        let tool = registry.get("b").expect("b registered");
        let output = tool.call(json!({})).await.expect("call");
        assert_eq!(output, ToolOutput::Text("second b".to_string()));
        assert!(registry.get("missing").is_none());
    }
}
