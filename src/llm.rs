//! Model provider abstraction and the OpenAI-backed client.
//!
//! We only call chat.completions and always request a strict JSON object.
//! Calls are instrumented and log model names, latencies, and response sizes
//! (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Which provider tier serves the request. Essays get the high-reasoning
/// route; everything else takes the standard route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelRoute {
  Standard,
  DeepReasoning,
}

#[derive(Clone, Copy, Debug)]
pub struct ModelParams {
  pub route: ModelRoute,
  pub temperature: f32,
  pub max_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct ModelReply {
  /// Raw response text, handed to the feedback parser as-is.
  pub text: String,
  /// Model identifier the provider reports (or the configured name).
  pub model: String,
}

/// One capability interface over the external model providers, so the
/// orchestrator stays provider-agnostic and tests can inject a fake.
#[async_trait]
pub trait FeedbackModel: Send + Sync {
  async fn generate(&self, system: &str, user: &str, params: &ModelParams) -> Result<ModelReply, String>;
}

#[derive(Clone)]
pub struct OpenAi {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
}

impl OpenAi {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model =
      std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model =
      std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());

    // The timeout doubles as the caller-visible latency bound: a hung
    // provider surfaces as a transport error, never as an unhandled wait.
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, fast_model, strong_model })
  }

  fn model_for(&self, route: ModelRoute) -> &str {
    match route {
      ModelRoute::Standard => &self.fast_model,
      ModelRoute::DeepReasoning => &self.strong_model,
    }
  }

  /// JSON-object chat completion returning the raw text plus model id.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_json_raw(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
    max_tokens: u32,
  ) -> Result<ModelReply, String> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      max_tokens: Some(max_tokens),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "aula-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or_else(|| body);
      return Err(format!("OpenAI HTTP {}: {}", status, msg));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let reported_model = body.model.clone().unwrap_or_else(|| model.to_string());
    let text = body.choices.get(0)
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();

    Ok(ModelReply { text, model: reported_model })
  }
}

#[async_trait]
impl FeedbackModel for OpenAi {
  #[instrument(level = "info", skip(self, system, user), fields(route = ?params.route))]
  async fn generate(&self, system: &str, user: &str, params: &ModelParams) -> Result<ModelReply, String> {
    let model = self.model_for(params.route).to_string();
    self
      .chat_json_raw(&model, system, user, params.temperature, params.max_tokens)
      .await
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] model: Option<String>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
