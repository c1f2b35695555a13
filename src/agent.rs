use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::llm::LanguageModel;
use crate::parser::parse_invocation;
use crate::tool::{ToolRegistry, ToolResult};
use crate::tools::ElementRequest;

pub const TRACING_TARGET_AGENT: &str = "bedrock_agent::agent";

/// Reply used when the model produced no text.
pub const FALLBACK_REPLY: &str = "I had trouble generating a response.";

const SYSTEM_PREAMBLE: &str = "You are a web element analysis agent powered by Bedrock.\n\
IMPORTANT: When you see JSON data describing a web element, you MUST use the explain_element tool.\n\
If a tool is needed, respond with ONLY this JSON (no extra text):\n\
{\"tool\":\"<name>\",\"args\":{...}}";

const SYSTEM_CLOSING: &str = "If no tool is needed, just answer normally (no JSON). Be concise.";

/// The reply for one turn. Only `text` goes over the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub text: String,
    #[serde(skip)]
    pub tool_call: Option<ToolTrace>,
}

/// Which tool a turn dispatched to and how it went.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolTrace {
    pub tool: String,
    pub result: ToolResult,
}

/// Single-turn conversation entry point.
///
/// Each message gets one model call; if the model answers with a tool
/// request, exactly one tool runs and its result becomes the reply.
pub struct Agent {
    system_prompt: String,
    model: Arc<dyn LanguageModel>,
    tools: ToolRegistry,
}

impl Agent {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        let tools = ToolRegistry::new(Arc::clone(&model));
        Self {
            system_prompt: build_system_prompt(&tools),
            model,
            tools,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub async fn credentials_configured(&self) -> bool {
        self.model.credentials_configured().await
    }

    fn build_prompt(&self, message: &str) -> String {
        format!("{}\n\nUser: {}", self.system_prompt, message)
    }

    /// Runs one turn for `message`.
    ///
    /// Only an empty message is an error. A failed model call is treated as
    /// an empty answer and tool failures are part of the reply text.
    pub async fn handle(&self, message: &str) -> Result<Reply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AgentError::InvalidInput("message required".into()));
        }

        let raw = match self.model.invoke(&self.build_prompt(message)).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(
                    target: TRACING_TARGET_AGENT,
                    error = %err,
                    "model call failed; replying with fallback"
                );
                String::new()
            }
        };

        let Some(invocation) = parse_invocation(&raw) else {
            tracing::debug!(target: TRACING_TARGET_AGENT, "model answered directly");
            let text = if raw.is_empty() {
                FALLBACK_REPLY.to_string()
            } else {
                raw
            };
            return Ok(Reply {
                text,
                tool_call: None,
            });
        };

        tracing::debug!(
            target: TRACING_TARGET_AGENT,
            tool = %invocation.name,
            arguments = invocation.arguments.len(),
            "model requested a tool"
        );
        let result = self.tools.dispatch(&invocation).await;
        Ok(Reply {
            text: result.text().to_string(),
            tool_call: Some(ToolTrace {
                tool: invocation.name,
                result,
            }),
        })
    }

    /// Explains a console element directly, without the conversational model call.
    pub async fn explain_element(&self, element: &Value) -> Result<String> {
        if is_blank(element) {
            return Err(AgentError::InvalidInput("Missing 'element' field".into()));
        }
        Ok(self
            .tools
            .explainer()
            .explain(ElementRequest::from_value(Some(element)))
            .await)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::String(text) => text.is_empty(),
        Value::Object(object) => object.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Number(number) => number.as_f64() == Some(0.0),
    }
}

/// Instruction block listing every registered tool in the model's call syntax.
pub fn build_system_prompt(tools: &ToolRegistry) -> String {
    let mut prompt = String::from(SYSTEM_PREAMBLE);
    prompt.push_str("\nAvailable tools:\n");
    for tool in tools.describe() {
        prompt.push_str(&format!("- {} -> {}\n", tool.signature, tool.description));
    }
    prompt.push_str(SYSTEM_CLOSING);
    prompt.push('\n');
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StubModel;
    use serde_json::json;

    #[tokio::test]
    async fn rejects_blank_messages_without_calling_the_model() {
        let model = StubModel::new(vec!["unused".into()]);
        let agent = Agent::new(model.clone());

        for message in ["", "   \n\t"] {
            let err = agent.handle(message).await.unwrap_err();
            assert!(err.is_invalid_input());
            assert_eq!(err.to_string(), "message required");
        }
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn prose_is_the_reply() {
        let model = StubModel::new(vec!["Hi there!".into()]);
        let agent = Agent::new(model.clone());

        let reply = agent.handle("  Hello ").await.unwrap();

        assert_eq!(reply.text, "Hi there!");
        assert_eq!(reply.tool_call, None);
        let prompt = &model.prompts()[0];
        assert!(prompt.starts_with(agent.system_prompt()));
        assert!(prompt.ends_with("\n\nUser: Hello"));
    }

    #[tokio::test]
    async fn dispatches_tool_requests() {
        let model =
            StubModel::new(vec![r#"{"tool":"calc","args":{"op":"add","a":2,"b":3}}"#.into()]);
        let agent = Agent::new(model);

        let reply = agent.handle("what is 2 + 3?").await.unwrap();

        assert_eq!(reply.text, "5.0");
        let trace = reply.tool_call.unwrap();
        assert_eq!(trace.tool, "calc");
        assert!(trace.result.is_success());
    }

    #[tokio::test]
    async fn model_failure_yields_fallback_reply() {
        let agent = Agent::new(StubModel::failing("ExpiredTokenException"));
        let reply = agent.handle("Hello").await.unwrap();
        assert_eq!(reply.text, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn empty_model_text_yields_fallback_reply() {
        let agent = Agent::new(StubModel::new(vec!["   ".into()]));
        let reply = agent.handle("Hello").await.unwrap();
        assert_eq!(reply.text, FALLBACK_REPLY);
    }

    #[test]
    fn system_prompt_lists_tools() {
        let agent = Agent::new(StubModel::new(Vec::new()));
        let prompt = agent.system_prompt();

        assert!(prompt.contains("{\"tool\":\"<name>\",\"args\":{...}}"));
        assert!(prompt.contains("- get_time(zone?) -> returns current time"));
        assert!(prompt.contains("- calc(op, a, b) -> op in [add, sub, mul, div]"));
        assert!(prompt.contains("- explain_element(element_json) -> explains a web page element"));
    }

    #[tokio::test]
    async fn explain_element_requires_an_element() {
        let model = StubModel::new(Vec::new());
        let agent = Agent::new(model.clone());

        for blank in [json!(null), json!(""), json!({})] {
            let err = agent.explain_element(&blank).await.unwrap_err();
            assert!(err.is_invalid_input());
        }
        assert_eq!(model.calls(), 0);
    }
}
