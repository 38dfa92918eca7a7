//! Remote inference: the single seam between the pipeline and a hosted model.
//!
//! The vision call that describes the FBD and the text call that writes the
//! script both go through [`InferenceService`]. The
//! production implementation, [`LlmInferenceService`], forwards to an
//! edgequake-llm provider; tests substitute an in-process fake.
//!
//! A request is one stateless exchange: no conversation history, no
//! streaming, no retry. Whatever the provider reports is classified into a
//! [`RemoteInferenceError`] and handed back unchanged in meaning.

use crate::config::GeneratorConfig;
use crate::error::{Fbd2ApdlError, RemoteInferenceError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// One single-turn request to a remote model.
#[derive(Clone)]
pub struct InferenceRequest {
    /// Optional system instruction.
    pub system: Option<String>,
    /// User instruction text.
    pub prompt: String,
    /// Image attached to the user turn (vision requests only).
    pub image: Option<ImageData>,
    /// Output-length ceiling.
    pub max_tokens: usize,
    /// Sampling temperature; `None` leaves the provider default.
    pub temperature: Option<f32>,
}

impl InferenceRequest {
    /// Text-only request with no system instruction.
    pub fn text(prompt: impl Into<String>, max_tokens: usize) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            image: None,
            max_tokens,
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_image(mut self, image: ImageData) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Build the chat messages sent to the provider.
    ///
    /// Vision requests put the instruction and the image in the same user
    /// turn, after the system message.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = self.system {
            messages.push(ChatMessage::system(system.as_str()));
        }
        match self.image {
            Some(ref image) => messages.push(ChatMessage::user_with_images(
                self.prompt.as_str(),
                vec![image.clone()],
            )),
            None => messages.push(ChatMessage::user(self.prompt.as_str())),
        }
        messages
    }

    /// Build `CompletionOptions` for this request.
    pub fn to_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

impl fmt::Debug for InferenceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceRequest")
            .field("system", &self.system)
            .field("prompt_len", &self.prompt.len())
            .field("image", &self.image.as_ref().map(|i| i.mime_type.clone()))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// The single textual answer of a remote model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceResponse {
    /// Response text, verbatim.
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// A remote model endpoint answering one request with one text.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Short provider label used in errors and logs.
    fn provider_label(&self) -> &str;

    /// Send one request; exactly one attempt.
    async fn infer(
        &self,
        request: InferenceRequest,
    ) -> Result<InferenceResponse, RemoteInferenceError>;
}

/// [`InferenceService`] backed by an edgequake-llm provider.
pub struct LlmInferenceService {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl LlmInferenceService {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

#[async_trait]
impl InferenceService for LlmInferenceService {
    fn provider_label(&self) -> &str {
        &self.label
    }

    async fn infer(
        &self,
        request: InferenceRequest,
    ) -> Result<InferenceResponse, RemoteInferenceError> {
        let messages = request.to_messages();
        let options = request.to_options();

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| classify_llm_error(&self.label, &e.to_string()))?;

        if response.content.trim().is_empty() {
            return Err(RemoteInferenceError::MalformedResponse {
                provider: self.label.clone(),
                detail: "response contained no text".into(),
            });
        }

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );

        Ok(InferenceResponse {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

/// Map a provider error message onto the remote failure taxonomy.
///
/// edgequake-llm reports HTTP failures as formatted messages, so the
/// classification keys on status codes and well-known phrases.
pub fn classify_llm_error(provider: &str, message: &str) -> RemoteInferenceError {
    let lower = message.to_lowercase();
    let provider = provider.to_string();
    let detail = message.to_string();

    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["401", "403", "unauthorized", "forbidden", "api key", "api_key", "authentication"]) {
        RemoteInferenceError::Auth { provider, detail }
    } else if has(&["429", "rate limit", "rate_limit", "quota", "insufficient_quota"]) {
        RemoteInferenceError::QuotaExceeded { provider, detail }
    } else if has(&["timed out", "timeout", "connection", "connect", "dns", "network"]) {
        RemoteInferenceError::Network { provider, detail }
    } else if has(&[
        "parse",
        "deserializ",
        "invalid json",
        "unexpected response",
        "empty response",
    ]) {
        RemoteInferenceError::MalformedResponse { provider, detail }
    } else {
        RemoteInferenceError::Api { provider, detail }
    }
}

/// Resolve the services for the vision and text calls.
///
/// Precedence, most specific first:
///
/// 1. **Injected service** (`config.inference`) — used for both calls.
/// 2. **Pre-built provider** (`config.provider`) — wrapped for both calls.
/// 3. **Named provider** (`config.provider_name`) — one provider per model.
/// 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 5. **OpenAI key present** (`OPENAI_API_KEY`) — OpenAI with the configured models.
/// 6. **Full auto-detection** (`ProviderFactory::from_env`).
///
/// Returns `(vision, text)`.
pub fn resolve_services(
    config: &GeneratorConfig,
) -> Result<(Arc<dyn InferenceService>, Arc<dyn InferenceService>), Fbd2ApdlError> {
    if let Some(ref service) = config.inference {
        return Ok((Arc::clone(service), Arc::clone(service)));
    }

    if let Some(ref provider) = config.provider {
        let service: Arc<dyn InferenceService> =
            Arc::new(LlmInferenceService::new(Arc::clone(provider), "custom"));
        return Ok((Arc::clone(&service), service));
    }

    if let Some(ref name) = config.provider_name {
        return provider_pair(name, config.image_model(), config.text_model());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return provider_pair(&prov, &model, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return provider_pair("openai", config.image_model(), config.text_model());
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Fbd2ApdlError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    info!("Auto-detected LLM provider from environment");
    let service: Arc<dyn InferenceService> =
        Arc::new(LlmInferenceService::new(llm_provider, "auto"));
    Ok((Arc::clone(&service), service))
}

fn provider_pair(
    provider_name: &str,
    vision_model: &str,
    text_model: &str,
) -> Result<(Arc<dyn InferenceService>, Arc<dyn InferenceService>), Fbd2ApdlError> {
    let text = create_service(provider_name, text_model)?;
    if vision_model == text_model {
        return Ok((Arc::clone(&text), text));
    }
    let vision = create_service(provider_name, vision_model)?;
    Ok((vision, text))
}

fn create_service(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn InferenceService>, Fbd2ApdlError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Fbd2ApdlError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    info!("Using provider '{}' with model '{}'", provider_name, model);
    Ok(Arc::new(LlmInferenceService::new(
        provider,
        format!("{provider_name}/{model}"),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_auth() {
        let e = classify_llm_error("openai", "HTTP 401 Unauthorized: invalid api key");
        assert!(matches!(e, RemoteInferenceError::Auth { .. }));
    }

    #[test]
    fn classify_quota() {
        let e = classify_llm_error("openai", "429 Too Many Requests: insufficient_quota");
        assert!(matches!(e, RemoteInferenceError::QuotaExceeded { .. }));
    }

    #[test]
    fn classify_network() {
        let e = classify_llm_error("ollama", "error sending request: connection refused");
        assert!(matches!(e, RemoteInferenceError::Network { .. }));
    }

    #[test]
    fn classify_malformed() {
        let e = classify_llm_error("gemini", "failed to parse response body");
        assert!(matches!(e, RemoteInferenceError::MalformedResponse { .. }));
    }

    #[test]
    fn classify_fallback_is_api() {
        let e = classify_llm_error("anthropic", "model overloaded");
        match e {
            RemoteInferenceError::Api { provider, detail } => {
                assert_eq!(provider, "anthropic");
                assert_eq!(detail, "model overloaded");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn options_carry_ceiling_and_temperature() {
        let req = InferenceRequest::text("write a script", 1000).with_temperature(Some(0.5));
        let opts = req.to_options();
        assert_eq!(opts.max_tokens, Some(1000));
        assert_eq!(opts.temperature, Some(0.5));

        let vision = InferenceRequest::text("describe", 500);
        assert_eq!(vision.to_options().temperature, None);
    }

    #[test]
    fn text_request_has_single_user_message() {
        let req = InferenceRequest::text("prompt", 10);
        assert_eq!(req.to_messages().len(), 1);

        let req = req.with_system("system");
        assert_eq!(req.to_messages().len(), 2);
    }

    #[test]
    fn injected_service_wins() {
        struct Fixed;

        #[async_trait]
        impl InferenceService for Fixed {
            fn provider_label(&self) -> &str {
                "fixed"
            }

            async fn infer(
                &self,
                _request: InferenceRequest,
            ) -> Result<InferenceResponse, RemoteInferenceError> {
                Ok(InferenceResponse {
                    text: "ok".into(),
                    input_tokens: 0,
                    output_tokens: 0,
                })
            }
        }

        let config = GeneratorConfig::builder()
            .inference_service(Arc::new(Fixed))
            .build()
            .unwrap();
        let (vision, text) = resolve_services(&config).unwrap();
        assert_eq!(vision.provider_label(), "fixed");
        assert_eq!(text.provider_label(), "fixed");
    }
}
