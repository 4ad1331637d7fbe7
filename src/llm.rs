//! Completion API client.
//!
//! Two interchangeable providers in a fixed preference order: Groq is the
//! primary, Gemini is attempted only when no Groq key is configured. A
//! configured provider that fails surfaces its error verbatim — there is
//! no silent fallback, so a persistent primary outage stays visible.

use serde_json::Value;

use crate::config::{ProviderConfig, ProviderKind, ProvidersConfig};
use crate::error::{Error, Result};

const GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// One completion request: prompt plus a token/temperature budget.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens: 400,
            temperature: 0.7,
        }
    }

    pub fn with_budget(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }
}

/// Completed text with the provider/model that produced it (recorded as
/// cache metadata).
#[derive(Debug, Clone)]
pub struct Completed {
    pub text: String,
    pub provider: String,
    pub model: String,
}

/// Seam for the completion API; tests substitute a counting mock.
#[allow(async_fn_in_trait)]
pub trait Completion {
    /// Whether any provider key is configured.
    fn is_configured(&self) -> bool;

    async fn complete(&self, req: &CompletionRequest) -> Result<Completed>;
}

/// HTTP-backed completion client.
pub struct CompletionClient {
    http: reqwest::Client,
    active: Option<ProviderConfig>,
}

impl CompletionClient {
    /// Resolve the active provider from configuration. Groq wins when both
    /// keys are present.
    pub fn from_config(providers: &ProvidersConfig) -> Self {
        let active = if let Some(key) = providers.groq_api_key.as_deref().filter(|k| !k.is_empty())
        {
            Some(ProviderConfig {
                kind: ProviderKind::Groq,
                api_key: key.to_string(),
                model: providers.groq_model.clone(),
            })
        } else if let Some(key) = providers.gemini_api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(ProviderConfig {
                kind: ProviderKind::Gemini,
                api_key: key.to_string(),
                model: providers.gemini_model.clone(),
            })
        } else {
            None
        };

        Self {
            http: reqwest::Client::new(),
            active,
        }
    }

    async fn complete_groq(&self, provider: &ProviderConfig, req: &CompletionRequest) -> Result<String> {
        let body = serde_json::json!({
            "model": provider.model,
            "messages": [
                { "role": "system", "content": req.system },
                { "role": "user", "content": req.prompt },
            ],
            "max_tokens": req.max_tokens,
            "temperature": req.temperature,
        });

        let resp = self
            .http
            .post(GROQ_ENDPOINT)
            .bearer_auth(&provider.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Provider {
                provider: "groq".to_string(),
                message: format!("{status}: {}", text.trim()),
            });
        }

        let json: Value = serde_json::from_str(&text)?;
        Ok(json["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .unwrap_or("")
            .trim()
            .to_string())
    }

    async fn complete_gemini(&self, provider: &ProviderConfig, req: &CompletionRequest) -> Result<String> {
        let url = format!(
            "{GEMINI_ENDPOINT}/{}:generateContent?key={}",
            provider.model, provider.api_key
        );
        let body = serde_json::json!({
            "contents": [
                { "parts": [ { "text": format!("{}\n\n{}", req.system, req.prompt) } ] }
            ],
            "generationConfig": {
                "maxOutputTokens": req.max_tokens,
                "temperature": req.temperature,
            },
        });

        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Provider {
                provider: "gemini".to_string(),
                message: format!("{status}: {}", text.trim()),
            });
        }

        let json: Value = serde_json::from_str(&text)?;
        Ok(json["candidates"]
            .get(0)
            .and_then(|c| c["content"]["parts"].get(0))
            .and_then(|p| p["text"].as_str())
            .unwrap_or("")
            .trim()
            .to_string())
    }
}

impl Completion for CompletionClient {
    fn is_configured(&self) -> bool {
        self.active.is_some()
    }

    async fn complete(&self, req: &CompletionRequest) -> Result<Completed> {
        let provider = self.active.as_ref().ok_or_else(|| {
            Error::config(
                "no completion API key configured; set GROQ_API_KEY or GEMINI_API_KEY",
            )
        })?;

        tracing::debug!(provider = %provider.kind, model = %provider.model, "completion request");

        let text = match provider.kind {
            ProviderKind::Groq => self.complete_groq(provider, req).await?,
            ProviderKind::Gemini => self.complete_gemini(provider, req).await?,
        };

        if text.is_empty() {
            return Err(Error::Provider {
                provider: provider.kind.to_string(),
                message: "empty completion response".to_string(),
            });
        }

        Ok(Completed {
            text,
            provider: provider.kind.to_string(),
            model: provider.model.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groq_preferred_over_gemini() {
        let providers = ProvidersConfig {
            groq_api_key: Some("gsk_x".to_string()),
            gemini_api_key: Some("gm_y".to_string()),
            ..ProvidersConfig::default()
        };
        let client = CompletionClient::from_config(&providers);
        assert!(client.is_configured());
        assert_eq!(client.active.as_ref().unwrap().kind, ProviderKind::Groq);
    }

    #[test]
    fn test_gemini_only_when_groq_absent() {
        let providers = ProvidersConfig {
            gemini_api_key: Some("gm_y".to_string()),
            ..ProvidersConfig::default()
        };
        let client = CompletionClient::from_config(&providers);
        assert_eq!(client.active.as_ref().unwrap().kind, ProviderKind::Gemini);
    }

    #[tokio::test]
    async fn test_unconfigured_client_is_config_error() {
        let client = CompletionClient::from_config(&ProvidersConfig::default());
        assert!(!client.is_configured());
        let req = CompletionRequest::new("coach", "prompt");
        assert!(matches!(client.complete(&req).await, Err(Error::Config(_))));
    }
}
