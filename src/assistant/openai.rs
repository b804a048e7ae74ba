//! OpenAI-compatible chat completions adapter.
//!
//! The model is asked to answer with a JSON object carrying its explanation
//! and any buffers it rewrote; replies that are not JSON are kept as plain
//! text and leave the buffers alone.

use crate::assistant::{Assistant, AssistantError, AssistantReply, GenerationOutcome};
use crate::chat::{ChatMessage, Role};
use crate::config::AppConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You help the user build a single web page made of three files: HTML, CSS and JavaScript.
Every user message includes the current contents of the three files.
Always answer with one JSON object and nothing else, using these keys:
- \"text\": a short explanation for the user (required)
- \"html\": the complete new HTML body markup, only if it changes
- \"css\": the complete new stylesheet, only if it changes
- \"js\": the complete new script, only if it changes
Omit a key when that file should stay as it is. Never return partial files.";

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub price_per_1k_tokens: Decimal,
    pub request_timeout: Duration,
}

impl OpenAiConfig {
    pub fn from_app_config(config: &AppConfig, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            price_per_1k_tokens: config.price_per_1k_tokens,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

#[derive(Clone)]
pub struct OpenAiAssistant {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl std::fmt::Debug for OpenAiAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAssistant")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Debug, Default, PartialEq, Deserialize)]
struct ReplyPayload {
    #[serde(default)]
    text: String,
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    css: Option<String>,
    #[serde(default)]
    js: Option<String>,
}

impl OpenAiAssistant {
    pub fn new(config: OpenAiConfig) -> Result<Self, AssistantError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key)).map_err(|error| {
                AssistantError::Configuration(format!("invalid API key header: {error}"))
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|error| AssistantError::Network(error.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn cost_for(&self, tokens: u64) -> Decimal {
        Decimal::from(tokens) * self.config.price_per_1k_tokens / Decimal::from(1000)
    }
}

#[async_trait]
impl Assistant for OpenAiAssistant {
    async fn generate(&self, transcript: &[ChatMessage]) -> GenerationOutcome {
        let body = build_request_body(&self.config.model, transcript);
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .json(&body)
            .send()
            .await
            .map_err(|error| AssistantError::Network(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let raw = response.text().await.unwrap_or_default();
            return Err(provider_error(status, &raw));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|error| AssistantError::InvalidResponse(error.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AssistantError::InvalidResponse("response had no content".to_string()))?;
        let tokens = parsed.usage.map(|usage| usage.total_tokens).unwrap_or(0);
        let payload = parse_reply_content(&content);

        tracing::debug!(tokens, "assistant reply received");
        Ok(AssistantReply {
            text: payload.text,
            markup: payload.html,
            style: payload.css,
            script: payload.js,
            consumed_units: tokens,
            cost: self.cost_for(tokens),
        })
    }

    async fn verify(&self) -> Result<(), AssistantError> {
        let response = self
            .client
            .get(self.endpoint("models"))
            .send()
            .await
            .map_err(|error| AssistantError::Network(error.to_string()))?;
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status().as_u16();
        let raw = response.text().await.unwrap_or_default();
        Err(provider_error(status, &raw))
    }
}

fn build_request_body(model: &str, transcript: &[ChatMessage]) -> Value {
    let mut messages = vec![json!({ "role": "system", "content": SYSTEM_PROMPT })];
    for message in transcript {
        let project = &message.project_at_send;
        let content = match message.role {
            Role::User => format!(
                "{}\n\nCurrent HTML:\n```html\n{}\n```\n\nCurrent CSS:\n```css\n{}\n```\n\nCurrent JavaScript:\n```javascript\n{}\n```",
                message.text, project.markup, project.style, project.script
            ),
            Role::Assistant => json!({
                "text": message.text,
                "html": project.markup,
                "css": project.style,
                "js": project.script,
            })
            .to_string(),
        };
        messages.push(json!({ "role": message.role.as_str(), "content": content }));
    }

    json!({
        "model": model,
        "messages": messages,
    })
}

fn parse_reply_content(content: &str) -> ReplyPayload {
    let trimmed = strip_code_fence(content.trim());
    match serde_json::from_str::<ReplyPayload>(trimmed) {
        Ok(payload) => payload,
        Err(_) => ReplyPayload {
            text: content.trim().to_string(),
            ..ReplyPayload::default()
        },
    }
}

fn strip_code_fence(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn provider_error(status: u16, raw: &str) -> AssistantError {
    let message = serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| raw.trim().to_string());
    AssistantError::Provider { status, message }
}
