//! # edgequake-fbd2apdl
//!
//! Generate ANSYS APDL finite-element scripts from a PDF problem statement
//! and, optionally, an image of its Free Body Diagram (FBD).
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF ─┐
//!      ├─ 1. Extract     page text via lopdf, pages joined in order
//! FBD ─┤
//!      ├─ 2. Interpret   one vision call: forces, dimensions, constraints
//!      ├─ 3. Synthesize  one text call: material, nodes/elements, BCs, loads
//!      └─ 4. Output      generated_apdl_script.inp (text/plain) + diagnostics
//! ```
//!
//! Every remote call is attempted exactly once. A failed run produces no
//! script.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_fbd2apdl::{generate_to_file, GeneratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = GeneratorConfig::default();
//!     let output = generate_to_file(
//!         "problem.pdf",
//!         Some("fbd.png"),
//!         "generated_apdl_script.inp",
//!         &config,
//!     )
//!     .await?;
//!     eprintln!("{} remote calls", output.stats.remote_calls);
//!     Ok(())
//! }
//! ```
//!
//! ## Interactive front ends
//!
//! [`Session`] turns user actions into [`SessionEvent`]s and decides from
//! its own state whether the pipeline runs. Re-renders never issue remote
//! calls.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `fbd2apdl` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    GeneratorConfig, GeneratorConfigBuilder, ImageRequirement, RegenerationPolicy, TriggerMode,
};
pub use error::{Fbd2ApdlError, RemoteInferenceError};
pub use generate::{
    generate, generate_from_bytes, generate_sync, generate_to_file, write_script, Pipeline,
};
pub use output::{
    GenerationOutput, GenerationStats, ScriptArtifact, SCRIPT_FILE_NAME, SCRIPT_MIME_TYPE,
};
pub use pipeline::extract::{extract_text, ExtractedDocument};
pub use pipeline::inference::{InferenceRequest, InferenceResponse, InferenceService};
pub use pipeline::input::Upload;
pub use pipeline::lint::ScriptWarning;
pub use progress::{NoopObserver, ObserverHandle, PipelineObserver, Stage};
pub use prompts::ScriptSection;
pub use session::{Dispatch, Session, SessionEvent, SessionState, SessionView};
