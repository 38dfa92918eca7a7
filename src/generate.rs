//! Pipeline orchestration and one-shot generation entry points.
//!
//! [`Pipeline`] runs the three stages in a straight line:
//! extract → (interpret) → synthesize. Each stage runs at most once per
//! call and the first failure ends the run; nothing is retried and nothing
//! partial is returned. The event-driven [`crate::session::Session`] wraps
//! the same `Pipeline`.

use crate::config::{GeneratorConfig, ImageRequirement};
use crate::error::{Fbd2ApdlError, RemoteInferenceError};
use crate::output::{GenerationOutput, GenerationStats, ScriptArtifact};
use crate::pipeline::inference::{resolve_services, InferenceService};
use crate::pipeline::{extract, input, interpret, lint, synthesize};
use crate::progress::{ObserverHandle, PipelineObserver, Stage};
use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// `(vision, text)` services.
type ServicePair = (Arc<dyn InferenceService>, Arc<dyn InferenceService>);

/// The extract → interpret → synthesize pipeline bound to its services.
///
/// Services named by the config are resolved on the first remote call, so
/// a missing credential surfaces as that call's authentication failure and
/// never hides a document error.
#[derive(Clone)]
pub struct Pipeline {
    services: Arc<OnceCell<ServicePair>>,
    config: GeneratorConfig,
}

impl Pipeline {
    /// Build a pipeline whose services are resolved from `config` on first use.
    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self {
            services: Arc::new(OnceCell::new()),
            config: config.clone(),
        }
    }

    /// Build a pipeline around explicit services.
    pub fn with_services(
        config: GeneratorConfig,
        vision: Arc<dyn InferenceService>,
        text: Arc<dyn InferenceService>,
    ) -> Self {
        Self {
            services: Arc::new(OnceCell::with_value((vision, text))),
            config,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Replace the stage observer.
    pub fn with_observer(mut self, observer: ObserverHandle) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Service for `stage`, resolving the pair on first use.
    ///
    /// A resolution failure is reported as an authentication failure of the
    /// call that needed the service.
    fn service(&self, stage: Stage) -> Result<Arc<dyn InferenceService>, Fbd2ApdlError> {
        let (vision, text) = self
            .services
            .get_or_try_init(|| resolve_services(&self.config))
            .map_err(|e| {
                let (provider, detail) = match e {
                    Fbd2ApdlError::ProviderNotConfigured { provider, hint } => (provider, hint),
                    other => ("auto".to_string(), other.to_string()),
                };
                Fbd2ApdlError::RemoteInference {
                    stage,
                    source: RemoteInferenceError::Auth { provider, detail },
                }
            })?;
        Ok(match stage {
            Stage::Interpreting => Arc::clone(vision),
            _ => Arc::clone(text),
        })
    }

    /// Run the full pipeline over in-memory inputs.
    ///
    /// # Errors
    /// - [`Fbd2ApdlError::ImageRequired`] in image-required mode without an image
    /// - [`Fbd2ApdlError::UnreadableDocument`] when the PDF cannot be parsed;
    ///   no remote call is made
    /// - [`Fbd2ApdlError::UnsupportedImage`] for anything but JPEG/PNG
    /// - [`Fbd2ApdlError::RemoteInference`] when a remote call fails
    pub async fn run(
        &self,
        document: &[u8],
        image: Option<&[u8]>,
    ) -> Result<GenerationOutput, Fbd2ApdlError> {
        let total_start = Instant::now();

        if image.is_none() && self.config.image_requirement == ImageRequirement::Required {
            return Err(Fbd2ApdlError::ImageRequired);
        }

        let mut stats = GenerationStats::default();

        // ── Step 1: Extract problem text ─────────────────────────────────────
        self.notify(|o| o.on_stage_start(Stage::Extracting));
        let start = Instant::now();
        let extracted = extract::extract_document(document, self.config.password.as_deref())
            .await
            .map_err(|e| self.fail(Stage::Extracting, e))?;
        stats.extract_duration_ms = start.elapsed().as_millis() as u64;
        stats.page_count = extracted.page_count;
        stats.text_pages = extracted.text_pages;
        info!(
            "Extracted {} chars from {}/{} pages",
            extracted.text.len(),
            extracted.text_pages,
            extracted.page_count
        );
        if extracted.text.is_empty() {
            warn!("Problem statement has no extractable text");
        }
        self.notify(|o| o.on_stage_complete(Stage::Extracting, extracted.text.len()));

        // ── Step 2: Interpret FBD image ──────────────────────────────────────
        let mut fbd_description: Option<String> = None;
        if let Some(image) = image {
            self.notify(|o| o.on_stage_start(Stage::Interpreting));
            let start = Instant::now();
            let result = match self.service(Stage::Interpreting) {
                Ok(vision) => {
                    let result =
                        interpret::interpret_fbd(vision.as_ref(), image, &self.config).await;
                    if matches!(result, Ok(_) | Err(Fbd2ApdlError::RemoteInference { .. })) {
                        stats.remote_calls += 1;
                    }
                    result
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(response) => {
                    stats.total_input_tokens += response.input_tokens as u64;
                    stats.total_output_tokens += response.output_tokens as u64;
                    self.notify(|o| o.on_stage_complete(Stage::Interpreting, response.text.len()));
                    fbd_description = Some(response.text);
                }
                Err(e) if e.is_remote() && self.config.continue_without_image => {
                    warn!("FBD interpretation failed, continuing without it: {}", e);
                    self.notify(|o| o.on_stage_error(Stage::Interpreting, &e.to_string()));
                }
                Err(e) => return Err(self.fail(Stage::Interpreting, e)),
            }
            stats.interpret_duration_ms = start.elapsed().as_millis() as u64;
        }

        // ── Step 3: Synthesize script ────────────────────────────────────────
        self.notify(|o| o.on_stage_start(Stage::Synthesizing));
        let start = Instant::now();
        let text = self
            .service(Stage::Synthesizing)
            .map_err(|e| self.fail(Stage::Synthesizing, e))?;
        let response = synthesize::synthesize_script(
            text.as_ref(),
            &extracted.text,
            fbd_description.as_deref(),
            &self.config,
        )
        .await
        .map_err(|e| self.fail(Stage::Synthesizing, e))?;
        stats.remote_calls += 1;
        stats.total_input_tokens += response.input_tokens as u64;
        stats.total_output_tokens += response.output_tokens as u64;
        stats.synthesize_duration_ms = start.elapsed().as_millis() as u64;
        self.notify(|o| o.on_stage_complete(Stage::Synthesizing, response.text.len()));

        // ── Step 4: Diagnostics ──────────────────────────────────────────────
        let warnings = lint::lint_script(&response.text);
        for w in &warnings {
            warn!("Generated script: {}", w);
        }

        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        info!(
            "Generation complete: {} remote calls, {}ms total",
            stats.remote_calls, stats.total_duration_ms
        );
        self.notify(|o| o.on_pipeline_complete(response.text.len()));

        Ok(GenerationOutput {
            problem_text: extracted.text,
            fbd_description,
            script: response.text,
            warnings,
            stats,
        })
    }

    fn notify(&self, f: impl FnOnce(&dyn PipelineObserver)) {
        if let Some(ref observer) = self.config.observer {
            f(observer.as_ref());
        }
    }

    fn fail(&self, stage: Stage, error: Fbd2ApdlError) -> Fbd2ApdlError {
        warn!("{} failed: {}", stage, error);
        self.notify(|o| o.on_stage_error(stage, &error.to_string()));
        error
    }
}

/// Generate a script from a PDF and an optional FBD image.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `document` — local path or HTTP/HTTPS URL of the problem-statement PDF
/// * `image`    — local path or URL of the FBD image (JPEG/PNG)
/// * `config`   — generation configuration
pub async fn generate(
    document: impl AsRef<str>,
    image: Option<&str>,
    config: &GeneratorConfig,
) -> Result<GenerationOutput, Fbd2ApdlError> {
    let document = document.as_ref();
    info!("Starting generation: {}", document);

    let pdf = input::load_source(document, config.download_timeout_secs).await?;
    let fbd = match image {
        Some(src) => Some(input::load_source(src, config.download_timeout_secs).await?),
        None => None,
    };

    generate_from_bytes(&pdf.bytes, fbd.as_ref().map(|u| u.bytes.as_slice()), config).await
}

/// Generate a script from in-memory uploads.
pub async fn generate_from_bytes(
    document: &[u8],
    image: Option<&[u8]>,
    config: &GeneratorConfig,
) -> Result<GenerationOutput, Fbd2ApdlError> {
    Pipeline::from_config(config).run(document, image).await
}

/// Generate a script and write it to `output_path`.
pub async fn generate_to_file(
    document: impl AsRef<str>,
    image: Option<&str>,
    output_path: impl AsRef<Path>,
    config: &GeneratorConfig,
) -> Result<GenerationOutput, Fbd2ApdlError> {
    let output = generate(document, image, config).await?;
    write_script(output_path, &output.artifact()).await?;
    Ok(output)
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    document: impl AsRef<str>,
    image: Option<&str>,
    config: &GeneratorConfig,
) -> Result<GenerationOutput, Fbd2ApdlError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Fbd2ApdlError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate(document, image, config))
}

/// Write a script artifact to disk.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_script(
    path: impl AsRef<Path>,
    artifact: &ScriptArtifact,
) -> Result<(), Fbd2ApdlError> {
    let path = path.as_ref();
    let write_err = |e: std::io::Error| Fbd2ApdlError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("inp.tmp");
    tokio::fs::write(&tmp_path, artifact.contents.as_bytes())
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    info!("Wrote {} ({} bytes)", path.display(), artifact.contents.len());
    Ok(())
}
