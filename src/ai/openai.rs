//! OpenAI implementation of the selector generator.
//!
//! Works against any chat-completions-compatible endpoint. The model's
//! reply is treated as untrusted text: JSON is dug out of markdown
//! fences when present, unknown fields are dropped, and the caller
//! validates every proposed selector against the live DOM anyway.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};
use crate::traits::generator::{
    CandidateMapping, GenerationFeedback, SelectorGenerator, StructureSummary,
};
use crate::types::schema::FieldSchema;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Sentinel the model is told to use for a field it cannot locate.
const NOT_FOUND: &str = "NOT_FOUND";

const SYSTEM_PROMPT: &str = r#"You are a web scraping assistant. Given the HTML structure of a page and a list of fields to extract, respond with a CSS selector for each field.

Output a JSON object mapping each field name to either:
- a single CSS selector string, or
- an array of candidate CSS selector strings ordered from most to least specific, or
- the string "NOT_FOUND" if the field does not appear on the page.

Prefer selectors with classes, ids, or attributes over bare tag names. For the content field, choose a selector that matches the body paragraphs, not a single wrapper. Output only the JSON object."#;

/// [`SelectorGenerator`] backed by an OpenAI-compatible chat API.
///
/// # Example
///
/// ```rust,ignore
/// let generator = OpenAiGenerator::from_env()?.with_model("gpt-4o");
/// ```
pub struct OpenAiGenerator {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OpenAiGenerator {
    /// Create a generator with the given API key.
    pub fn new(api_key: SecretString) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: OPENAI_API_URL.to_string(),
        }
    }

    /// Create from environment variable `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ScrapeError::validation("OPENAI_API_KEY not set"))?;
        Ok(Self::new(api_key.into()))
    }

    /// Set the chat model (default: gpt-4o-mini).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL (Azure, proxies, local models).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn chat(&self, user: String) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user,
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|err| ScrapeError::SelectorGeneration(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ScrapeError::SelectorGeneration(format!(
                "API error: {status} - {text}"
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|err| ScrapeError::SelectorGeneration(err.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ScrapeError::SelectorGeneration("no choices in response".to_string()))
    }
}

#[async_trait]
impl SelectorGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        summary: &StructureSummary,
        schema: &FieldSchema,
    ) -> Result<CandidateMapping> {
        let response = self.chat(build_user_prompt(summary, schema)).await?;
        parse_mapping(&response)
    }

    async fn refine(
        &self,
        summary: &StructureSummary,
        schema: &FieldSchema,
        feedback: &GenerationFeedback,
    ) -> Result<CandidateMapping> {
        let response = self
            .chat(build_refine_prompt(summary, schema, feedback))
            .await?;
        parse_mapping(&response)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

fn build_user_prompt(summary: &StructureSummary, schema: &FieldSchema) -> String {
    let fields: Vec<String> = schema
        .iter()
        .map(|(name, field_type)| format!("- {name} ({field_type:?})"))
        .collect();

    format!(
        "URL: {}\n\nFields to extract:\n{}\n\nHTML structure:\n{}",
        summary.url,
        fields.join("\n"),
        summary.outline
    )
}

/// Follow-up prompt after validation rejected some candidates: the
/// model sees what it proposed and what failed, and is asked for
/// different selectors for just those fields.
fn build_refine_prompt(
    summary: &StructureSummary,
    schema: &FieldSchema,
    feedback: &GenerationFeedback,
) -> String {
    let mut prompt = build_user_prompt(summary, schema);
    prompt.push_str("\n\nThese selectors were checked against the live page and matched nothing:\n");
    for field in &feedback.unresolved {
        let tried = feedback
            .rejected
            .get(field)
            .map(|selectors| selectors.join(", "))
            .unwrap_or_else(|| "none proposed".to_string());
        prompt.push_str(&format!("- {field}: tried [{tried}]\n"));
    }
    prompt.push_str("Propose different selectors for the failed fields.");
    prompt
}

/// Parse the model's reply into a candidate mapping.
///
/// Tolerates markdown fences and prose around the JSON object. Values
/// may be a selector string or an array of them; `NOT_FOUND` and empty
/// strings are dropped.
fn parse_mapping(content: &str) -> Result<CandidateMapping> {
    let json = extract_json(content).ok_or_else(|| {
        ScrapeError::SelectorGeneration("no JSON object in response".to_string())
    })?;

    let value: serde_json::Value = serde_json::from_str(&json)
        .map_err(|err| ScrapeError::SelectorGeneration(format!("malformed JSON: {err}")))?;

    let object = value.as_object().ok_or_else(|| {
        ScrapeError::SelectorGeneration("response JSON is not an object".to_string())
    })?;

    let mut mapping = CandidateMapping::new();
    for (field, value) in object {
        match value {
            serde_json::Value::String(selector) => {
                if is_usable_selector(selector) {
                    mapping = mapping.with_selector(field, selector);
                }
            }
            serde_json::Value::Array(items) => {
                let selectors: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.as_str())
                    .filter(|s| is_usable_selector(s))
                    .collect();
                if !selectors.is_empty() {
                    mapping = mapping.with_alternatives(field, selectors);
                }
            }
            _ => {}
        }
    }

    Ok(mapping)
}

fn is_usable_selector(selector: &str) -> bool {
    let selector = selector.trim();
    !selector.is_empty() && selector != NOT_FOUND
}

/// Pull a JSON object out of a reply that may wrap it in markdown
/// fences or surrounding prose.
fn extract_json(content: &str) -> Option<String> {
    let fence = regex::Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap();
    if let Some(captures) = fence.captures(content) {
        return Some(captures[1].to_string());
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| content[start..=end].to_string())
}
