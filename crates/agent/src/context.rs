use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{error, info};

use grocer_core::config::AppConfig;

use crate::bedrock::BedrockModelProvider;
use crate::gateway::{EnvSecretResolver, GatewayConnector, HttpGatewayConnector, ToolFilter, ToolLoader};
use crate::image::{object_store_from_config, DownloadImageTool, ImageReaderTool, ObjectStore};
use crate::llm::{LlmClient, ModelProvider, ModelSettings};
use crate::prompts::PromptLibrary;
use crate::runtime::{Agent, Responder};
use crate::specialists::{SpecialistKind, SpecialistTool};
use crate::tools::{Tool, ToolRegistry};

const ORCHESTRATOR_NAME: &str = "orchestrator";

#[derive(Clone, Debug)]
pub struct AgentSettings {
    pub model: ModelSettings,
    pub catalog_prefixes: Vec<String>,
    pub order_prefixes: Vec<String>,
    pub max_tool_rounds: usize,
}

impl AgentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: ModelSettings::from_config(&config.model),
            catalog_prefixes: config.agent.catalog_tool_prefixes.clone(),
            order_prefixes: config.agent.order_tool_prefixes.clone(),
            max_tool_rounds: usize::try_from(config.agent.max_tool_rounds).unwrap_or(usize::MAX),
        }
    }
}

struct Specialists {
    catalog: Arc<Agent>,
    order: Arc<Agent>,
    wm: Arc<Agent>,
    image_processor: Arc<Agent>,
}

impl Specialists {
    fn get(&self, kind: SpecialistKind) -> &Arc<Agent> {
        match kind {
            SpecialistKind::Catalog => &self.catalog,
            SpecialistKind::Order => &self.order,
            SpecialistKind::Warehouse => &self.wm,
            SpecialistKind::ImageProcessor => &self.image_processor,
        }
    }
}

/// Readiness flags reported by the health endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub orchestrator_ready: bool,
    pub catalog_ready: bool,
    pub order_ready: bool,
    pub wm_ready: bool,
    pub image_processor_ready: bool,
    pub bedrock_model_ready: bool,
    pub tools_loaded: bool,
    pub tool_count: usize,
    pub aws_region: String,
}

/// Owns the shared model handle, the gateway tool cache, the specialists and
/// the orchestrator. Every piece is built lazily, once, on first use.
pub struct AgentContext {
    settings: AgentSettings,
    provider: Arc<dyn ModelProvider>,
    tools: ToolLoader,
    prompts: PromptLibrary,
    object_store: Arc<dyn ObjectStore>,
    model: OnceCell<Arc<dyn LlmClient>>,
    specialists: OnceCell<Specialists>,
    orchestrator: OnceCell<Arc<Agent>>,
}

impl AgentContext {
    pub fn new(
        settings: AgentSettings,
        provider: Arc<dyn ModelProvider>,
        connector: Arc<dyn GatewayConnector>,
        prompts: PromptLibrary,
        object_store: Arc<dyn ObjectStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            settings,
            provider,
            tools: ToolLoader::new(connector),
            prompts,
            object_store,
            model: OnceCell::new(),
            specialists: OnceCell::new(),
            orchestrator: OnceCell::new(),
        })
    }

    /// Production wiring: Bedrock model, HTTP gateway with env-backed
    /// secrets, prompts from the configured directory, configured object store.
    pub async fn from_config(config: &AppConfig) -> Result<Arc<Self>> {
        let connector = HttpGatewayConnector::new(
            config.gateway.config_path.clone(),
            Duration::from_secs(config.gateway.timeout_secs),
            Arc::new(EnvSecretResolver),
        );
        let prompts = PromptLibrary::load(config.agent.prompts_dir.as_deref())
            .await
            .context("failed to load agent prompts")?;
        let object_store = object_store_from_config(
            &config.storage,
            &config.model.region,
            Duration::from_secs(config.gateway.timeout_secs),
        )
        .await?;

        Ok(Self::new(
            AgentSettings::from_config(config),
            Arc::new(BedrockModelProvider),
            Arc::new(connector),
            prompts,
            object_store,
        ))
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn tool_loader(&self) -> &ToolLoader {
        &self.tools
    }

    async fn model(&self) -> Result<Arc<dyn LlmClient>> {
        let model = self
            .model
            .get_or_try_init(|| async {
                let model = self.provider.create(&self.settings.model)?;
                info!(
                    event_name = "agent.model.created",
                    model_id = %model.model_id(),
                    region = %self.settings.model.region,
                    "model handle created"
                );
                Ok::<_, anyhow::Error>(model)
            })
            .await?;
        Ok(Arc::clone(model))
    }

    /// Builds the model handle and the four specialists. Concurrent first
    /// callers wait on the same initialization.
    pub async fn ensure_agents_initialized(&self) -> Result<()> {
        self.specialists().await.map(|_| ())
    }

    async fn specialists(&self) -> Result<&Specialists> {
        self.specialists.get_or_try_init(|| self.build_specialists()).await
    }

    async fn build_specialists(&self) -> Result<Specialists> {
        let model = self.model().await?;

        let catalog_filter = ToolFilter::new(self.settings.catalog_prefixes.iter().cloned());
        let order_filter = ToolFilter::new(self.settings.order_prefixes.iter().cloned());
        let catalog_tools = self.tools.tools_or_empty(Some(&catalog_filter)).await;
        let order_tools = self.tools.tools_or_empty(Some(&order_filter)).await;
        let image_tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(DownloadImageTool::new(Arc::clone(&self.object_store))),
            Arc::new(ImageReaderTool::new(Arc::clone(&self.object_store))),
        ];

        let build = |kind: SpecialistKind, tools: Vec<Arc<dyn Tool>>| {
            let mut registry = ToolRegistry::default();
            registry.extend(tools);
            info!(
                event_name = "agent.specialist.ready",
                specialist = %kind,
                tools = ?registry.names(),
                "specialist initialized"
            );
            Arc::new(Agent::new(
                kind.agent_name(),
                self.prompts.for_specialist(kind),
                registry,
                Arc::clone(&model),
                self.settings.max_tool_rounds,
            ))
        };

        Ok(Specialists {
            catalog: build(SpecialistKind::Catalog, catalog_tools),
            order: build(SpecialistKind::Order, order_tools.clone()),
            wm: build(SpecialistKind::Warehouse, order_tools),
            image_processor: build(SpecialistKind::ImageProcessor, image_tools),
        })
    }

    pub async fn specialist(&self, kind: SpecialistKind) -> Result<Arc<Agent>> {
        let specialists = self.specialists().await?;
        Ok(Arc::clone(specialists.get(kind)))
    }

    /// The orchestrator, whose tools are the four specialists.
    pub async fn orchestrator(self: &Arc<Self>) -> Result<Arc<Agent>> {
        let orchestrator = self
            .orchestrator
            .get_or_try_init(|| async {
                self.ensure_agents_initialized().await?;
                let model = self.model().await?;

                let mut registry = ToolRegistry::default();
                for kind in SpecialistKind::ALL {
                    registry.register(Arc::new(SpecialistTool::new(kind, Arc::downgrade(self))));
                }
                info!(event_name = "agent.orchestrator.ready", tools = ?registry.names(), "orchestrator initialized");

                Ok::<_, anyhow::Error>(Arc::new(Agent::new(
                    ORCHESTRATOR_NAME,
                    self.prompts.orchestrator(),
                    registry,
                    model,
                    self.settings.max_tool_rounds,
                )))
            })
            .await?;
        Ok(Arc::clone(orchestrator))
    }

    /// Runs one instruction list through the orchestrator. Never fails:
    /// errors come back as `"Error: <message>"`.
    pub async fn process(self: &Arc<Self>, instructions: &[String]) -> String {
        match self.orchestrator().await {
            Ok(orchestrator) => process_with(orchestrator.as_ref(), instructions).await,
            Err(error) => {
                error!(event_name = "agent.orchestrator.unavailable", error = %format!("{error:#}"), "failed to initialize orchestrator");
                format!("Error: {error:#}")
            }
        }
    }

    pub fn readiness(&self) -> Readiness {
        let specialists_ready = self.specialists.initialized();
        Readiness {
            orchestrator_ready: self.orchestrator.initialized(),
            catalog_ready: specialists_ready,
            order_ready: specialists_ready,
            wm_ready: specialists_ready,
            image_processor_ready: specialists_ready,
            bedrock_model_ready: self.model.initialized(),
            tools_loaded: self.tools.is_loaded(),
            tool_count: self.tools.loaded_count(),
            aws_region: self.settings.model.region.clone(),
        }
    }
}

pub async fn process_with(responder: &dyn Responder, instructions: &[String]) -> String {
    let prompt = instructions.join("\n");
    match responder.respond(&prompt).await {
        Ok(answer) => answer,
        Err(error) => {
            error!(
                event_name = "agent.process.failed",
                instructions = instructions.len(),
                error = %format!("{error:#}"),
                "error processing grocery request"
            );
            format!("Error: {error:#}")
        }
    }
}
