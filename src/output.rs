//! Output types returned by a successful generation run.

use crate::pipeline::lint::ScriptWarning;
use serde::{Deserialize, Serialize};

/// File name offered for the generated script.
pub const SCRIPT_FILE_NAME: &str = "generated_apdl_script.inp";

/// MIME type of the generated script.
pub const SCRIPT_MIME_TYPE: &str = "text/plain";

/// Everything one pipeline run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// Trimmed text extracted from the problem-statement PDF.
    pub problem_text: String,
    /// Vision model's description of the FBD, when an image was interpreted.
    pub fbd_description: Option<String>,
    /// Script text exactly as the model returned it.
    pub script: String,
    /// Read-only diagnostics on `script`.
    pub warnings: Vec<ScriptWarning>,
    pub stats: GenerationStats,
}

impl GenerationOutput {
    /// The downloadable artifact for this run.
    pub fn artifact(&self) -> ScriptArtifact {
        ScriptArtifact::new(self.script.clone())
    }
}

/// Timing and usage figures for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Pages in the problem-statement PDF.
    pub page_count: usize,
    /// Pages that contributed text.
    pub text_pages: usize,
    /// Remote calls issued during the run (1 or 2).
    pub remote_calls: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub extract_duration_ms: u64,
    pub interpret_duration_ms: u64,
    pub synthesize_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// A downloadable plain-text file holding the generated script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptArtifact {
    pub file_name: String,
    pub mime_type: String,
    pub contents: String,
}

impl ScriptArtifact {
    pub fn new(contents: impl Into<String>) -> Self {
        Self {
            file_name: SCRIPT_FILE_NAME.to_string(),
            mime_type: SCRIPT_MIME_TYPE.to_string(),
            contents: contents.into(),
        }
    }
}
