use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use super::session::{GatewayConnector, ToolSource};
use super::{GatewayError, ToolDescriptor};
use crate::tools::{Tool, ToolOutput, ToolSpec};

/// Name-prefix filter over the gateway tool list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolFilter {
    prefixes: Vec<String>,
}

impl ToolFilter {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { prefixes: prefixes.into_iter().map(Into::into).collect() }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn matches(&self, name: &str) -> bool {
        self.prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }

    pub fn apply(&self, tools: &[ToolDescriptor]) -> Vec<ToolDescriptor> {
        tools.iter().filter(|tool| self.matches(&tool.name)).cloned().collect()
    }
}

/// Process-wide gateway tool cache.
///
/// The session and the full tool list are each established at most once;
/// a failed attempt leaves the cell empty so the next call retries.
pub struct ToolLoader {
    connector: Arc<dyn GatewayConnector>,
    session: OnceCell<Arc<dyn ToolSource>>,
    tools: OnceCell<Vec<ToolDescriptor>>,
}

impl ToolLoader {
    pub fn new(connector: Arc<dyn GatewayConnector>) -> Self {
        Self { connector, session: OnceCell::new(), tools: OnceCell::new() }
    }

    pub fn is_loaded(&self) -> bool {
        self.tools.initialized()
    }

    pub fn loaded_count(&self) -> usize {
        self.tools.get().map_or(0, Vec::len)
    }

    async fn source(&self) -> Result<&Arc<dyn ToolSource>, GatewayError> {
        self.session.get_or_try_init(|| self.connector.connect()).await
    }

    pub async fn load_tools(
        &self,
        filter: Option<&ToolFilter>,
    ) -> Result<Vec<ToolDescriptor>, GatewayError> {
        let all = self
            .tools
            .get_or_try_init(|| async {
                let source = self.source().await?;
                let tools = fetch_all(source.as_ref()).await?;
                info!(
                    event_name = "gateway.tools.loaded",
                    count = tools.len(),
                    tools = ?tools.iter().map(|tool| tool.name.as_str()).collect::<Vec<_>>(),
                    "loaded gateway tools"
                );
                Ok::<_, GatewayError>(tools)
            })
            .await?;

        Ok(match filter {
            Some(filter) => filter.apply(all),
            None => all.clone(),
        })
    }

    /// Callable tools for `filter`; any gateway failure degrades to no tools.
    pub async fn tools_or_empty(&self, filter: Option<&ToolFilter>) -> Vec<Arc<dyn Tool>> {
        let descriptors = match self.load_tools(filter).await {
            Ok(descriptors) => descriptors,
            Err(error) if error.is_not_configured() => {
                warn!(
                    event_name = "gateway.not_configured",
                    error = %error,
                    "gateway tools unavailable, continuing without them"
                );
                return Vec::new();
            }
            Err(error) => {
                error!(event_name = "gateway.load_failed", error = %error, "failed to load gateway tools");
                return Vec::new();
            }
        };

        let Some(source) = self.session.get() else {
            return Vec::new();
        };
        descriptors
            .into_iter()
            .map(|descriptor| {
                Arc::new(GatewayTool::new(descriptor, Arc::clone(source))) as Arc<dyn Tool>
            })
            .collect()
    }
}

async fn fetch_all(source: &dyn ToolSource) -> Result<Vec<ToolDescriptor>, GatewayError> {
    let mut tools = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = source.list_page(cursor.as_deref()).await?;
        tools.extend(page.tools);

        match page.next_cursor {
            Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                return Err(GatewayError::Protocol(format!(
                    "tools/list returned the same cursor `{next}` twice"
                )));
            }
            Some(next) => cursor = Some(next),
            None => return Ok(tools),
        }
    }
}

/// A gateway tool exposed to an agent.
pub struct GatewayTool {
    descriptor: ToolDescriptor,
    source: Arc<dyn ToolSource>,
}

impl GatewayTool {
    pub fn new(descriptor: ToolDescriptor, source: Arc<dyn ToolSource>) -> Self {
        Self { descriptor, source }
    }
}

#[async_trait]
impl Tool for GatewayTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.descriptor.name.clone(),
            description: self.descriptor.description.clone(),
            input_schema: self.descriptor.input_schema.clone(),
        }
    }

    async fn call(&self, input: Value) -> Result<ToolOutput> {
        let result = self.source.call_tool(&self.descriptor.name, input).await?;
        if result.is_error {
            return Err(anyhow!("{} reported an error: {}", self.descriptor.name, result.text));
        }
        Ok(match result.structured {
            Some(structured) if result.text.is_empty() => ToolOutput::Json(structured),
            _ => ToolOutput::Text(result.text),
        })
    }
}
