//! Configuration types for script generation.
//!
//! All generation behaviour is controlled through [`GeneratorConfig`], built
//! via its [`GeneratorConfigBuilder`]. The same config drives the one-shot
//! [`crate::generate::generate`] entry point and the event-driven
//! [`crate::session::Session`].

use crate::error::Fbd2ApdlError;
use crate::pipeline::inference::InferenceService;
use crate::progress::ObserverHandle;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Model used for both remote services when nothing else is configured.
pub const DEFAULT_MODEL: &str = "gpt-4-turbo";

/// Configuration for one generation run or one interactive session.
///
/// # Example
/// ```rust
/// use edgequake_fbd2apdl::{GeneratorConfig, ImageRequirement};
///
/// let config = GeneratorConfig::builder()
///     .model("gpt-4.1")
///     .temperature(0.3)
///     .image_requirement(ImageRequirement::Required)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GeneratorConfig {
    /// Model for script synthesis, e.g. "gpt-4-turbo". If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Model for FBD interpretation. Must be vision-capable. If None, uses `model`.
    pub vision_model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed inference service used for both remote calls.
    /// Takes precedence over every provider setting.
    pub inference: Option<Arc<dyn InferenceService>>,

    /// Sampling temperature for script synthesis. Default: 0.5.
    ///
    /// Moderate on purpose: low enough that the script keeps to APDL syntax,
    /// high enough that the model still fills gaps the problem text leaves.
    pub temperature: f32,

    /// Output-length ceiling for the synthesized script. Default: 1000.
    pub max_tokens: usize,

    /// Output-length ceiling for the FBD description. Default: 500.
    pub vision_max_tokens: usize,

    /// Sampling temperature for FBD interpretation. Default: None (provider default).
    pub vision_temperature: Option<f32>,

    /// Whether an FBD image must accompany the problem statement. Default: Optional.
    pub image_requirement: ImageRequirement,

    /// When the session starts the pipeline. Default: Manual.
    pub trigger: TriggerMode,

    /// What the session does after a successful run. Default: AllowRegenerate.
    pub regeneration: RegenerationPolicy,

    /// Continue without the FBD description when interpretation fails. Default: false.
    pub continue_without_image: bool,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Stage event observer (spinner, logging, UI bridge).
    pub observer: Option<ObserverHandle>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: None,
            vision_model: None,
            provider_name: None,
            provider: None,
            inference: None,
            temperature: 0.5,
            max_tokens: 1000,
            vision_max_tokens: 500,
            vision_temperature: None,
            image_requirement: ImageRequirement::default(),
            trigger: TriggerMode::default(),
            regeneration: RegenerationPolicy::default(),
            continue_without_image: false,
            password: None,
            download_timeout_secs: 120,
            observer: None,
        }
    }
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("model", &self.model)
            .field("vision_model", &self.vision_model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field(
                "inference",
                &self.inference.as_ref().map(|_| "<dyn InferenceService>"),
            )
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("vision_max_tokens", &self.vision_max_tokens)
            .field("vision_temperature", &self.vision_temperature)
            .field("image_requirement", &self.image_requirement)
            .field("trigger", &self.trigger)
            .field("regeneration", &self.regeneration)
            .field("continue_without_image", &self.continue_without_image)
            .finish()
    }
}

impl GeneratorConfig {
    /// Create a new builder for `GeneratorConfig`.
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder {
            config: Self::default(),
        }
    }

    /// Model used for script synthesis.
    pub fn text_model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Model used for FBD interpretation.
    pub fn image_model(&self) -> &str {
        self.vision_model
            .as_deref()
            .unwrap_or_else(|| self.text_model())
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Debug)]
pub struct GeneratorConfigBuilder {
    config: GeneratorConfig,
}

impl GeneratorConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn inference_service(mut self, service: Arc<dyn InferenceService>) -> Self {
        self.config.inference = Some(service);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn vision_max_tokens(mut self, n: usize) -> Self {
        self.config.vision_max_tokens = n;
        self
    }

    pub fn vision_temperature(mut self, t: f32) -> Self {
        self.config.vision_temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn image_requirement(mut self, requirement: ImageRequirement) -> Self {
        self.config.image_requirement = requirement;
        self
    }

    pub fn trigger(mut self, trigger: TriggerMode) -> Self {
        self.config.trigger = trigger;
        self
    }

    pub fn regeneration(mut self, policy: RegenerationPolicy) -> Self {
        self.config.regeneration = policy;
        self
    }

    pub fn continue_without_image(mut self, v: bool) -> Self {
        self.config.continue_without_image = v;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn observer(mut self, observer: ObserverHandle) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GeneratorConfig, Fbd2ApdlError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(Fbd2ApdlError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.vision_max_tokens == 0 {
            return Err(Fbd2ApdlError::InvalidConfig(
                "vision_max_tokens must be ≥ 1".into(),
            ));
        }
        if c.temperature == 0.0 {
            return Err(Fbd2ApdlError::InvalidConfig(
                "temperature must be non-zero for script synthesis".into(),
            ));
        }
        if matches!(c.model.as_deref(), Some("")) {
            return Err(Fbd2ApdlError::InvalidConfig("model must not be empty".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Whether a Free Body Diagram image must be supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageRequirement {
    /// The image is optional; without it the prompt carries no FBD section. (default)
    #[default]
    Optional,
    /// Generation is refused until an image is supplied.
    Required,
}

/// When an interactive session starts the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerMode {
    /// Only an explicit generate request runs the pipeline. (default)
    #[default]
    Manual,
    /// The pipeline runs as soon as every required upload is present.
    Auto,
}

/// What an interactive session does once a script has been generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegenerationPolicy {
    /// Each generate request runs the pipeline again; new uploads clear the
    /// previous script. (default)
    #[default]
    AllowRegenerate,
    /// After the first success the session only re-offers the script.
    /// Uploads and generate requests are ignored until a reset.
    LockAfterSuccess,
}
