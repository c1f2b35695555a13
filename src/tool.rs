use std::any::Any;
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;

use crate::error::Result;
use crate::llm::LanguageModel;
use crate::parser::{Arguments, Invocation};
use crate::tools::{Calculator, Clock, ElementExplainer};

pub const TRACING_TARGET_TOOLS: &str = "bedrock_agent::tools";

/// A local capability the model may ask for.
///
/// Raw model arguments are coerced into `Args` before `call` runs, so each
/// tool works with typed input. `Output` is rendered to text only once the
/// result leaves the dispatcher.
#[async_trait]
pub trait Tool: Send + Sync {
    type Args: Send;
    type Output: Display + Send;

    fn name(&self) -> &'static str;

    /// Call shape shown to the model, e.g. `calc(op, a, b)`.
    fn signature(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn parse_args(&self, arguments: &Arguments) -> Result<Self::Args>;

    async fn call(&self, args: Self::Args) -> Result<Self::Output>;

    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: self.name(),
            signature: self.signature(),
            description: self.description(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescription {
    pub name: &'static str,
    pub signature: &'static str,
    pub description: &'static str,
}

/// Outcome of one dispatched invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResult {
    Success(String),
    Failure(String),
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success(_))
    }

    pub fn text(&self) -> &str {
        match self {
            ToolResult::Success(text) | ToolResult::Failure(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            ToolResult::Success(text) | ToolResult::Failure(text) => text,
        }
    }
}

/// The fixed set of tools, matched case-sensitively by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    GetTime,
    Calc,
    ExplainElement,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::GetTime, ToolKind::Calc, ToolKind::ExplainElement];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "get_time" => Some(ToolKind::GetTime),
            "calc" => Some(ToolKind::Calc),
            "explain_element" => Some(ToolKind::ExplainElement),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::GetTime => "get_time",
            ToolKind::Calc => "calc",
            ToolKind::ExplainElement => "explain_element",
        }
    }
}

/// Coerces arguments and runs `tool`, folding every failure into a `ToolResult`.
///
/// Errors from coercion or execution, and panics inside the tool future,
/// become `Failure("Tool error: ...")`.
pub async fn run_tool<T: Tool>(tool: &T, arguments: &Arguments) -> ToolResult {
    let outcome = AssertUnwindSafe(async {
        let args = tool.parse_args(arguments)?;
        tool.call(args).await
    })
    .catch_unwind()
    .await;

    match outcome {
        Ok(Ok(output)) => ToolResult::Success(output.to_string()),
        Ok(Err(err)) => ToolResult::Failure(format!("Tool error: {err}")),
        Err(panic) => ToolResult::Failure(format!("Tool error: {}", panic_message(panic.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "tool panicked".to_string()
    }
}

/// Immutable registry built once at startup and shared by every turn.
pub struct ToolRegistry {
    clock: Clock,
    calculator: Calculator,
    explainer: ElementExplainer,
}

impl ToolRegistry {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            clock: Clock,
            calculator: Calculator,
            explainer: ElementExplainer::new(model),
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        ToolKind::ALL.iter().map(ToolKind::name).collect()
    }

    pub fn describe(&self) -> Vec<ToolDescription> {
        ToolKind::ALL
            .iter()
            .map(|kind| match kind {
                ToolKind::GetTime => self.clock.describe(),
                ToolKind::Calc => self.calculator.describe(),
                ToolKind::ExplainElement => self.explainer.describe(),
            })
            .collect()
    }

    pub fn explainer(&self) -> &ElementExplainer {
        &self.explainer
    }

    /// Resolves `invocation` to a tool and runs it. Never fails.
    pub async fn dispatch(&self, invocation: &Invocation) -> ToolResult {
        let Some(kind) = ToolKind::from_name(&invocation.name) else {
            tracing::info!(
                target: TRACING_TARGET_TOOLS,
                tool = %invocation.name,
                "model requested an unknown tool"
            );
            return ToolResult::Failure(format!("Unknown tool: {}", invocation.name));
        };

        let args = &invocation.arguments;
        let result = match kind {
            ToolKind::GetTime => run_tool(&self.clock, args).await,
            ToolKind::Calc => run_tool(&self.calculator, args).await,
            ToolKind::ExplainElement => run_tool(&self.explainer, args).await,
        };

        if result.is_success() {
            tracing::info!(target: TRACING_TARGET_TOOLS, tool = kind.name(), "tool succeeded");
        } else {
            tracing::warn!(
                target: TRACING_TARGET_TOOLS,
                tool = kind.name(),
                error = result.text(),
                "tool failed"
            );
        }
        result
    }
}
