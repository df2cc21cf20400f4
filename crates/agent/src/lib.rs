//! Agent runtime for the grocery assistant.
//!
//! An orchestrator agent routes each request to four specialists (catalog,
//! order, warehouse, image processor). Specialists call tools published by the
//! remote tool gateway, or the local image tools, through a shared Bedrock
//! model handle.
//!
//! - [`context::AgentContext`] owns every lazily-built piece and runs requests.
//! - [`runtime::Agent`] is the tool-use loop.
//! - [`gateway::ToolLoader`] fetches and caches the gateway tool list.

pub mod bedrock;
pub mod context;
pub mod conversation;
pub mod gateway;
pub mod image;
pub mod llm;
pub mod prompts;
pub mod runtime;
pub mod specialists;
pub mod tools;

pub use context::{process_with, AgentContext, AgentSettings, Readiness};
pub use runtime::{Agent, Responder};
pub use specialists::SpecialistKind;
