//! `explain_element(element_json)`: asks the model to explain an AWS Console
//! element captured by the browser extension.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::llm::LanguageModel;
use crate::parser::Arguments;
use crate::tool::{Tool, TRACING_TARGET_TOOLS};

/// Explanations shorter than this (after trimming) are replaced by the fallback.
pub const MIN_EXPLANATION_CHARS: usize = 10;

const DESTRUCTIVE_WORDS: [&str; 3] = ["delete", "terminate", "remove"];

const DESTRUCTIVE_WARNING: &str =
    " ⚠️ WARNING: This appears to be a destructive action - proceed with caution.";

/// Snapshot of a UI element, normalized for prompting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDescriptor {
    /// Lower-cased; `unknown` when absent.
    pub tag_name: String,
    pub id: String,
    pub class_name: String,
    /// Trimmed.
    pub text_content: String,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawElement {
    tag_name: Option<String>,
    id: Option<String>,
    class_name: Option<String>,
    text_content: Option<String>,
    attributes: Option<BTreeMap<String, Value>>,
}

impl ElementDescriptor {
    /// Accepts the element either as an object or as a JSON-encoded string.
    pub fn from_value(value: &Value) -> Result<Self> {
        let raw: RawElement = match value {
            Value::Null => {
                return Err(AgentError::InvalidInput("no element data provided".into()))
            }
            Value::String(encoded) => serde_json::from_str(encoded)?,
            other => RawElement::deserialize(other)?,
        };
        Ok(raw.into())
    }

    pub fn is_destructive(&self) -> bool {
        let text = self.text_content.to_lowercase();
        DESTRUCTIVE_WORDS.iter().any(|word| text.contains(word))
    }

    fn attributes_line(&self) -> String {
        if self.attributes.is_empty() {
            return "none".into();
        }
        self.attributes
            .iter()
            .map(|(key, value)| format!("{key}=\"{value}\""))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl From<RawElement> for ElementDescriptor {
    fn from(raw: RawElement) -> Self {
        let attributes = raw
            .attributes
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(text) => (key, text),
                other => (key, other.to_string()),
            })
            .collect();
        Self {
            tag_name: raw
                .tag_name
                .unwrap_or_else(|| "unknown".into())
                .to_lowercase(),
            id: raw.id.unwrap_or_default(),
            class_name: raw.class_name.unwrap_or_default(),
            text_content: raw.text_content.unwrap_or_default().trim().to_string(),
            attributes,
        }
    }
}

pub fn build_prompt(element: &ElementDescriptor) -> String {
    format!(
        "You are an AWS expert reviewing a web element taken from the AWS Management Console.\n\
         \n\
         Element details:\n\
         - Tag: {tag}\n\
         - ID: {id}\n\
         - CSS classes: {classes}\n\
         - Text: \"{text}\"\n\
         - Attributes: {attributes}\n\
         \n\
         Explain this element for someone navigating the console. Cover:\n\
         1. Which AWS service or console area it belongs to\n\
         2. What the element does when used\n\
         3. Warnings about risky, destructive or cost-incurring actions it can trigger\n\
         4. Practical tips for using it well\n\
         \n\
         Keep the explanation clear and concise.",
        tag = element.tag_name,
        id = element.id,
        classes = element.class_name,
        text = element.text_content,
        attributes = element.attributes_line(),
    )
}

/// Deterministic explanation used when the model gives nothing usable.
pub fn fallback_explanation(element: &ElementDescriptor) -> String {
    let mut explanation = format!("This is a {} element", element.tag_name);
    if !element.text_content.is_empty() {
        explanation.push_str(&format!(" displaying '{}'", element.text_content));
    }
    explanation.push_str(
        " in the AWS Console. This element is part of the AWS management interface.",
    );
    if element.is_destructive() {
        explanation.push_str(DESTRUCTIVE_WARNING);
    }
    explanation
}

/// Element input after coercion; decoding problems are kept for the reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementRequest {
    Described(ElementDescriptor),
    Malformed(String),
}

impl ElementRequest {
    pub fn from_value(value: Option<&Value>) -> Self {
        match ElementDescriptor::from_value(value.unwrap_or(&Value::Null)) {
            Ok(element) => ElementRequest::Described(element),
            Err(err) => ElementRequest::Malformed(err.to_string()),
        }
    }
}

pub struct ElementExplainer {
    model: Arc<dyn LanguageModel>,
}

impl ElementExplainer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Explains `request`, never failing: decoding problems become an
    /// analysis error message and a failed model call falls back to a canned sentence.
    pub async fn explain(&self, request: ElementRequest) -> String {
        let element = match request {
            ElementRequest::Described(element) => element,
            ElementRequest::Malformed(detail) => {
                return format!("AWS element analysis error: {detail}")
            }
        };

        let explanation = match self.model.invoke(&build_prompt(&element)).await {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                tracing::warn!(
                    target: TRACING_TARGET_TOOLS,
                    error = %err,
                    tag = %element.tag_name,
                    "element explanation call failed"
                );
                String::new()
            }
        };

        if explanation.chars().count() < MIN_EXPLANATION_CHARS {
            tracing::debug!(
                target: TRACING_TARGET_TOOLS,
                tag = %element.tag_name,
                "using fallback element explanation"
            );
            return fallback_explanation(&element);
        }
        explanation
    }
}

#[async_trait]
impl Tool for ElementExplainer {
    type Args = ElementRequest;
    type Output = String;

    fn name(&self) -> &'static str {
        "explain_element"
    }

    fn signature(&self) -> &'static str {
        "explain_element(element_json)"
    }

    fn description(&self) -> &'static str {
        "explains a web page element from JSON data"
    }

    fn parse_args(&self, arguments: &Arguments) -> Result<ElementRequest> {
        Ok(ElementRequest::from_value(arguments.get("element_json")))
    }

    async fn call(&self, request: ElementRequest) -> Result<String> {
        Ok(self.explain(request).await)
    }
}
