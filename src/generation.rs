//! Text-generation provider abstraction and implementations.
//!
//! Defines the [`GenerationClient`] trait and concrete implementations:
//! - **[`DisabledGenerator`]** — returns errors; used when generation is
//!   not configured.
//! - **[`OpenAiGenerator`]** — calls an OpenAI-compatible chat completions
//!   endpoint with a request timeout.
//!
//! The pipeline sends two prompts per session. The draft prompt asks for
//! an initial answer plus a `;`-separated list of knowledge gaps; the
//! final prompt asks for a comprehensive answer citing sources with
//! `[Source i]` markers, where `i` is the chunk's position in the supplied
//! context (remapped to stable numbers afterwards by the citation mapper).
//!
//! Responses are free text, so parsing is defensive: a reply without the
//! expected section headers becomes an answer with zero gaps, never an
//! error. Gap lists are clamped to a bounded set of short strings.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::GenerationError;

/// Most gap questions considered per draft.
pub const MAX_GAP_QUESTIONS: usize = 5;
/// Longest accepted gap question, in characters.
pub const MAX_GAP_CHARS: usize = 200;

/// A chunk handed to the generation provider, referenced by position.
#[derive(Debug, Clone)]
pub struct ContextChunk {
    pub id: String,
    pub filename: String,
    pub text: String,
}

/// Parsed output of the draft round.
#[derive(Debug, Clone, Default)]
pub struct DraftOutput {
    pub answer: String,
    pub gap_questions: Vec<String>,
}

/// Black-box text-generation collaborator.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Produce a draft answer and the knowledge gaps it leaves open.
    async fn generate_draft(
        &self,
        query: &str,
        chunks: &[ContextChunk],
    ) -> Result<DraftOutput, GenerationError>;

    /// Produce the final cited answer from the combined context.
    async fn generate_final(
        &self,
        query: &str,
        chunks: &[ContextChunk],
        draft: &str,
        gaps: &[String],
    ) -> Result<String, GenerationError>;
}

/// Create the appropriate [`GenerationClient`] based on configuration.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn GenerationClient>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "openai" => Ok(Box::new(OpenAiGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

// ============ Disabled Provider ============

/// A no-op generator that always fails; used when generation is not
/// configured. Document ingest and the zero-document fast-fail path still
/// work without a provider.
pub struct DisabledGenerator;

#[async_trait]
impl GenerationClient for DisabledGenerator {
    async fn generate_draft(
        &self,
        _query: &str,
        _chunks: &[ContextChunk],
    ) -> Result<DraftOutput, GenerationError> {
        Err(GenerationError::Disabled)
    }

    async fn generate_final(
        &self,
        _query: &str,
        _chunks: &[ContextChunk],
        _draft: &str,
        _gaps: &[String],
    ) -> Result<String, GenerationError> {
        Err(GenerationError::Disabled)
    }
}

// ============ OpenAI-compatible Provider ============

/// Generator backed by an OpenAI-compatible `POST /chat/completions`
/// endpoint. Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        })
    }

    async fn complete(&self, prompt: String, max_tokens: u32) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.7,
            "max_tokens": max_tokens,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                GenerationError::Malformed("missing choices[0].message.content".to_string())
            })
    }
}

#[async_trait]
impl GenerationClient for OpenAiGenerator {
    async fn generate_draft(
        &self,
        query: &str,
        chunks: &[ContextChunk],
    ) -> Result<DraftOutput, GenerationError> {
        let text = self.complete(draft_prompt(query, chunks), 1000).await?;
        Ok(parse_draft(&text))
    }

    async fn generate_final(
        &self,
        query: &str,
        chunks: &[ContextChunk],
        draft: &str,
        gaps: &[String],
    ) -> Result<String, GenerationError> {
        let text = self
            .complete(final_prompt(query, chunks, draft, gaps), 1500)
            .await?;
        Ok(parse_final(&text))
    }
}

// ============ Prompts and parsing ============

fn render_context(chunks: &[ContextChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| format!("Source {} ({}): {}", i + 1, c.filename, c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn draft_prompt(query: &str, chunks: &[ContextChunk]) -> String {
    format!(
        "Query: {query}\n\n\
         Context from retrieved documents:\n{context}\n\n\
         Based on the provided context, provide an initial answer to the query. \
         Then, identify any gaps or unclear points that need more information to \
         provide a complete answer.\n\n\
         Format your response as:\n\
         INITIAL_ANSWER: [Your initial answer here]\n\n\
         GAP_QUESTIONS: [List specific questions or topics that need more \
         information, separated by semicolons]",
        context = render_context(chunks),
    )
}

fn final_prompt(query: &str, chunks: &[ContextChunk], draft: &str, gaps: &[String]) -> String {
    format!(
        "Original Query: {query}\n\n\
         Initial Answer: {draft}\n\n\
         Open questions: {gaps}\n\n\
         Context from comprehensive search:\n{context}\n\n\
         Based on the original query, initial answer, and comprehensive context, \
         provide a refined, complete answer with proper citations.\n\n\
         Format your response as:\n\
         FINAL_ANSWER: [Your comprehensive final answer with [Source X] citations throughout]\n\n\
         Use [Source X] format to cite sources, where X corresponds to the source \
         number in the context above.",
        gaps = gaps.join("; "),
        context = render_context(chunks),
    )
}

/// Parse the draft response into an answer and a bounded gap list.
///
/// A response without the expected headers is treated as an answer with
/// zero gaps, not a failure.
pub fn parse_draft(text: &str) -> DraftOutput {
    let (answer_part, gaps_part) = match text.split_once("GAP_QUESTIONS:") {
        Some((a, g)) => (a, Some(g)),
        None => (text, None),
    };

    let answer = answer_part
        .trim()
        .strip_prefix("INITIAL_ANSWER:")
        .unwrap_or(answer_part)
        .trim()
        .to_string();

    let gap_questions = gaps_part
        .map(|g| clamp_gaps(g.split(';')))
        .unwrap_or_default();

    DraftOutput {
        answer,
        gap_questions,
    }
}

/// Enforce the bounded gap contract: trimmed, non-empty, at most
/// [`MAX_GAP_QUESTIONS`] entries of at most [`MAX_GAP_CHARS`] characters.
fn clamp_gaps<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    raw.map(str::trim)
        .filter(|g| !g.is_empty())
        .map(|g| g.chars().take(MAX_GAP_CHARS).collect::<String>())
        .take(MAX_GAP_QUESTIONS)
        .collect()
}

/// Strip the `FINAL_ANSWER:` header if the model included it.
pub fn parse_final(text: &str) -> String {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("FINAL_ANSWER:")
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}
