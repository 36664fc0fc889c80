//! Translation collaborator used to produce the localized copy of posts.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{Config, TranslateConfig};

/// Translates free text into the configured target language.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String>;
}

/// Translator backed by an OpenAI-compatible chat completions endpoint.
pub struct ChatTranslator {
    http: reqwest::Client,
    config: TranslateConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl ChatTranslator {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: TranslateConfig, timeout: std::time::Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build translation HTTP client")?;
        Ok(Self { http, config })
    }

    /// Translator for `config`, or `None` when translation is not configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        config
            .translate
            .clone()
            .map(|t| Self::new(t, config.upstream_timeout))
            .transpose()
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are a professional translator for the game Path of Exile. Translate the \
             user's text into {}, using the game's official terminology for items, skills \
             and mechanics. Output only the translation.",
            self.config.target_language
        )
    }
}

#[async_trait]
impl Translator for ChatTranslator {
    async fn translate(&self, text: &str) -> Result<String> {
        let prompt = self.system_prompt();
        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            stream: false,
        };

        let response = self
            .http
            .post(format!(
                "{}/chat/completions",
                self.config.api_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .context("Translation request failed")?
            .error_for_status()
            .context("Translation endpoint returned an error")?;

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to decode translation response")?;

        let translated = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .context("Translation response had no content")?;

        Ok(translated)
    }
}
