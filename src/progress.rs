//! Observer trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn PipelineObserver>`] via
//! [`crate::config::GeneratorConfigBuilder::observer`] to receive events as
//! the pipeline moves through its stages. Every remote call blocks the run
//! for as long as the provider takes to answer, so the CLI uses these events
//! to drive a busy spinner.
//!
//! # Example
//!
//! ```rust
//! use edgequake_fbd2apdl::{GeneratorConfig, PipelineObserver, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl PipelineObserver for Printer {
//!     fn on_stage_start(&self, stage: Stage) {
//!         eprintln!("{stage}…");
//!     }
//! }
//!
//! let config = GeneratorConfig::builder()
//!     .observer(Arc::new(Printer) as Arc<dyn PipelineObserver>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One step of the generation pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Reading page text out of the problem-statement PDF.
    Extracting,
    /// Asking the vision model to describe the FBD image.
    Interpreting,
    /// Asking the text model to write the APDL script.
    Synthesizing,
}

impl Stage {
    /// Human-readable label used in logs, errors and the CLI spinner.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Extracting => "Text extraction",
            Stage::Interpreting => "FBD interpretation",
            Stage::Synthesizing => "Script synthesis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Called by the pipeline as it enters and leaves each stage.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait PipelineObserver: Send + Sync {
    /// Called right before a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes.
    ///
    /// # Arguments
    /// * `stage`      — the finished stage
    /// * `output_len` — byte length of the text the stage produced
    fn on_stage_complete(&self, stage: Stage, output_len: usize) {
        let _ = (stage, output_len);
    }

    /// Called when a stage fails. No further stage runs after this.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once after a successful run with the script length.
    fn on_pipeline_complete(&self, script_len: usize) {
        let _ = script_len;
    }
}

/// A no-op implementation for callers that don't need stage events.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::GeneratorConfig`].
pub type ObserverHandle = Arc<dyn PipelineObserver>;
