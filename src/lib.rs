//! A thin HTTP front end over Amazon Bedrock with a single-turn tool loop.
//!
//! The crate provides:
//! - A language model abstraction (`LanguageModel`) with Bedrock SDK, Bedrock REST and stub
//!   clients.
//! - A tool-call parser that recognizes `{"tool": ..., "args": {...}}` answers.
//! - A fixed `ToolRegistry` (`get_time`, `calc`, `explain_element`) and its dispatcher.
//! - An `Agent` that runs one model call per message and at most one tool.
//! - An axum server exposing the agent over HTTP (`server` feature).

mod agent;
mod config;
mod error;
mod llm;
mod parser;
#[cfg(feature = "server")]
mod server;
mod telemetry;
mod tool;
pub mod tools;

pub use agent::{build_system_prompt, Agent, Reply, ToolTrace, FALLBACK_REPLY};
pub use config::{
    AppConfig, ModelConfig, ModelProvider, SecurityConfig, ServerConfig, TelemetryConfig,
};
pub use error::{AgentError, Result};
#[cfg(feature = "aws")]
pub use llm::BedrockClient;
pub use llm::{
    build_model, decode_response, encode_request, BedrockRestClient, GenerationParams,
    LanguageModel, ModelFamily, StubModel, StubReply,
};
pub use parser::{parse_invocation, Arguments, Invocation};
#[cfg(feature = "server")]
pub use server::{cors_layer, AgentServer, ModelInfo};
pub use telemetry::init_tracing;
pub use tool::{run_tool, Tool, ToolDescription, ToolKind, ToolRegistry, ToolResult};
