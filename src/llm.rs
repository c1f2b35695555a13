//! Language model clients for Amazon Bedrock.
//!
//! Every client speaks the same text-in/text-out contract. The request and
//! response bodies depend on the model family, which is derived from the
//! model id.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ModelConfig, ModelProvider};
use crate::error::{AgentError, Result};

pub const TRACING_TARGET_LLM: &str = "bedrock_agent::llm";

const ANTHROPIC_BEDROCK_VERSION: &str = "bedrock-2023-05-31";

/// Geographies used by cross-region inference profile ids.
const INFERENCE_PROFILE_GEOS: &[&str] =
    &["us", "us-gov", "eu", "apac", "ca", "jp", "au", "global"];

/// A single request/response exchange with a hosted model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Sends `prompt` and returns the generated text, trimmed.
    async fn invoke(&self, prompt: &str) -> Result<String>;

    /// Whether the client can currently sign requests.
    async fn credentials_configured(&self) -> bool {
        true
    }
}

/// Body layout expected by a Bedrock model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// Amazon Titan text models (`inputText` / `results[].outputText`).
    Titan,
    /// Anthropic messages API as hosted on Bedrock.
    Anthropic,
}

impl ModelFamily {
    pub fn from_model_id(model_id: &str) -> Self {
        // Cross-region inference profiles prefix the id with a geography, e.g. `us.anthropic.`.
        let base = model_id
            .split_once('.')
            .filter(|(prefix, _)| INFERENCE_PROFILE_GEOS.contains(prefix))
            .map(|(_, rest)| rest)
            .unwrap_or(model_id);
        if base.starts_with("anthropic.") {
            ModelFamily::Anthropic
        } else {
            ModelFamily::Titan
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl From<&ModelConfig> for GenerationParams {
    fn from(cfg: &ModelConfig) -> Self {
        Self {
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            top_p: cfg.top_p,
        }
    }
}

pub fn encode_request(
    family: ModelFamily,
    prompt: &str,
    params: &GenerationParams,
) -> Result<Vec<u8>> {
    let body = match family {
        ModelFamily::Titan => serde_json::to_vec(&TitanRequest {
            input_text: prompt,
            text_generation_config: TitanGenerationConfig {
                max_token_count: params.max_tokens,
                temperature: params.temperature,
                top_p: params.top_p,
            },
        })?,
        ModelFamily::Anthropic => serde_json::to_vec(&AnthropicRequest {
            anthropic_version: ANTHROPIC_BEDROCK_VERSION,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        })?,
    };
    Ok(body)
}

pub fn decode_response(family: ModelFamily, body: &[u8]) -> Result<String> {
    let text = match family {
        ModelFamily::Titan => {
            let parsed: TitanResponse = serde_json::from_slice(body).map_err(|err| {
                AgentError::LanguageModel(format!("Titan response parse error: {err}"))
            })?;
            parsed
                .results
                .into_iter()
                .next()
                .map(|result| result.output_text)
                .unwrap_or_default()
        }
        ModelFamily::Anthropic => {
            let parsed: AnthropicResponse = serde_json::from_slice(body).map_err(|err| {
                AgentError::LanguageModel(format!("Anthropic response parse error: {err}"))
            })?;
            parsed
                .content
                .into_iter()
                .filter(|block| block.kind == "text")
                .filter_map(|block| block.text)
                .collect::<Vec<_>>()
                .join("")
        }
    };
    Ok(text.trim().to_string())
}

fn coalesce_error(status: reqwest::StatusCode, body: &str) -> AgentError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return AgentError::LanguageModel(format!("Bedrock rate limit exceeded: {body}"));
    }
    AgentError::LanguageModel(format!("Bedrock API error: {status} - {body}"))
}

/// Bedrock runtime over plain HTTPS, authenticated with a Bedrock API key.
#[derive(Clone)]
pub struct BedrockRestClient {
    http: reqwest::Client,
    endpoint: String,
    model_id: String,
    api_key: String,
    family: ModelFamily,
    params: GenerationParams,
}

impl BedrockRestClient {
    pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
        let api_key = cfg.api_key.clone().ok_or_else(|| {
            AgentError::Config(
                "missing Bedrock API key; set AWS_BEARER_TOKEN_BEDROCK or model.api_key".into(),
            )
        })?;
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(cfg.timeout_secs))
                .build()
                .map_err(|err| AgentError::LanguageModel(format!("http client error: {err}")))?,
            endpoint: cfg.rest_endpoint(),
            model_id: cfg.model_id.clone(),
            api_key,
            family: ModelFamily::from_model_id(&cfg.model_id),
            params: GenerationParams::from(cfg),
        })
    }

    pub fn invoke_url(&self) -> String {
        format!(
            "{}/model/{}/invoke",
            self.endpoint.trim_end_matches('/'),
            urlencoding::encode(&self.model_id)
        )
    }
}

#[async_trait]
impl LanguageModel for BedrockRestClient {
    async fn invoke(&self, prompt: &str) -> Result<String> {
        let body = encode_request(self.family, prompt, &self.params)?;
        tracing::debug!(
            target: TRACING_TARGET_LLM,
            model = %self.model_id,
            prompt_len = prompt.len(),
            "invoking bedrock over https"
        );

        let resp = self
            .http
            .post(self.invoke_url())
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| AgentError::LanguageModel(format!("Bedrock request error: {err}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(coalesce_error(status, &body));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|err| AgentError::LanguageModel(format!("Bedrock response error: {err}")))?;
        decode_response(self.family, &bytes)
    }

    async fn credentials_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[cfg(feature = "aws")]
pub use sdk::BedrockClient;

#[cfg(feature = "aws")]
mod sdk {
    use async_trait::async_trait;
    use aws_config::SdkConfig;
    use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
    use aws_sdk_bedrockruntime::error::DisplayErrorContext;
    use aws_sdk_bedrockruntime::primitives::Blob;

    use super::{decode_response, encode_request, GenerationParams, LanguageModel, ModelFamily};
    use crate::config::ModelConfig;
    use crate::error::{AgentError, Result};

    /// Bedrock runtime through the AWS SDK, signed with the default credential chain.
    #[derive(Clone)]
    pub struct BedrockClient {
        client: aws_sdk_bedrockruntime::Client,
        credentials: Option<SharedCredentialsProvider>,
        model_id: String,
        family: ModelFamily,
        params: GenerationParams,
    }

    impl BedrockClient {
        pub async fn from_config(cfg: &ModelConfig) -> Self {
            let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(aws_config::Region::new(cfg.region.clone()))
                .load()
                .await;
            Self::new(&shared, cfg)
        }

        pub fn new(shared: &SdkConfig, cfg: &ModelConfig) -> Self {
            Self {
                client: aws_sdk_bedrockruntime::Client::new(shared),
                credentials: shared.credentials_provider(),
                model_id: cfg.model_id.clone(),
                family: ModelFamily::from_model_id(&cfg.model_id),
                params: GenerationParams::from(cfg),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for BedrockClient {
        async fn invoke(&self, prompt: &str) -> Result<String> {
            let body = encode_request(self.family, prompt, &self.params)?;
            tracing::debug!(
                target: super::TRACING_TARGET_LLM,
                model = %self.model_id,
                prompt_len = prompt.len(),
                "invoking bedrock via sdk"
            );

            let output = self
                .client
                .invoke_model()
                .model_id(&self.model_id)
                .content_type("application/json")
                .accept("application/json")
                .body(Blob::new(body))
                .send()
                .await
                .map_err(|err| {
                    AgentError::LanguageModel(format!(
                        "Bedrock invoke error: {}",
                        DisplayErrorContext(&err)
                    ))
                })?;

            decode_response(self.family, output.body().as_ref())
        }

        async fn credentials_configured(&self) -> bool {
            let Some(provider) = &self.credentials else {
                return false;
            };
            match provider.provide_credentials().await {
                Ok(_) => true,
                Err(err) => {
                    tracing::debug!(
                        target: super::TRACING_TARGET_LLM,
                        error = %DisplayErrorContext(&err),
                        "no credentials from the default chain"
                    );
                    false
                }
            }
        }
    }
}

/// Builds the client selected by `cfg.provider`.
pub async fn build_model(cfg: &ModelConfig) -> Result<Arc<dyn LanguageModel>> {
    match cfg.provider {
        #[cfg(feature = "aws")]
        ModelProvider::Bedrock => Ok(Arc::new(BedrockClient::from_config(cfg).await)),
        #[cfg(not(feature = "aws"))]
        ModelProvider::Bedrock => Err(AgentError::Config(
            "provider `bedrock` requires the `aws` feature; use `bedrock-rest`".into(),
        )),
        ModelProvider::BedrockRest => Ok(Arc::new(BedrockRestClient::from_config(cfg)?)),
        ModelProvider::Stub => {
            let stub: Arc<dyn LanguageModel> = StubModel::new(Vec::new());
            Ok(stub)
        }
    }
}

/// One scripted outcome for [`StubModel`].
#[derive(Debug, Clone, PartialEq)]
pub enum StubReply {
    Text(String),
    Failure(String),
}

/// A deterministic model used for tests and offline runs.
///
/// Replies are consumed in order; once the script is exhausted every call fails.
pub struct StubModel {
    replies: Mutex<VecDeque<StubReply>>,
    prompts: Mutex<Vec<String>>,
}

impl StubModel {
    pub fn new(responses: Vec<String>) -> Arc<Self> {
        Self::scripted(responses.into_iter().map(StubReply::Text).collect())
    }

    pub fn scripted(replies: Vec<StubReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: impl Into<String>) -> Arc<Self> {
        Self::scripted(vec![StubReply::Failure(message.into())])
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|prompts| prompts.len()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn invoke(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let next = self
            .replies
            .lock()
            .map_err(|_| AgentError::LanguageModel("StubModel poisoned".into()))?
            .pop_front();
        match next {
            Some(StubReply::Text(text)) => Ok(text.trim().to_string()),
            Some(StubReply::Failure(message)) => Err(AgentError::LanguageModel(message)),
            None => Err(AgentError::LanguageModel(
                "StubModel ran out of scripted responses".into(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TitanRequest<'a> {
    input_text: &'a str,
    text_generation_config: TitanGenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TitanGenerationConfig {
    max_token_count: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct TitanResponse {
    #[serde(default)]
    results: Vec<TitanResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitanResult {
    #[serde(default)]
    output_text: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    anthropic_version: &'static str,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}
