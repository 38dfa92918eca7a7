//! Error types for the edgequake-fbd2apdl library.
//!
//! Two error types reflect two layers of failure:
//!
//! * [`Fbd2ApdlError`] — **Fatal**: the run cannot produce a script (bad
//!   document, missing image in required mode, provider not configured, a
//!   remote call failed). Returned from every public entry point.
//!
//! * [`RemoteInferenceError`] — the classified reason a single remote model
//!   call failed. It always travels inside
//!   [`Fbd2ApdlError::RemoteInference`] together with the [`Stage`] that
//!   issued the call, so callers can tell a failed image interpretation
//!   from a failed script synthesis.
//!
//! There is no retry layer: every remote call is attempted exactly once and
//! its failure is surfaced as-is.

use crate::progress::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-fbd2apdl library.
#[derive(Debug, Error)]
pub enum Fbd2ApdlError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// Generation was requested before a problem statement was uploaded.
    #[error("No problem statement uploaded. Provide a PDF first.")]
    MissingDocument,

    /// The pipeline runs in image-required mode and no FBD image was given.
    #[error("A Free Body Diagram image is required in this mode.\nProvide it with --image <PATH>.")]
    ImageRequired,

    /// The FBD upload is not a JPEG or PNG image.
    #[error("Unsupported FBD image: {detail}\nOnly JPEG and PNG images are accepted.")]
    UnsupportedImage { detail: String },

    // ── Document errors ───────────────────────────────────────────────────
    /// The bytes are not a readable PDF structure.
    #[error("Unreadable PDF document: {detail}")]
    UnreadableDocument { detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired,

    /// A password was provided but it is wrong.
    #[error("Wrong password for encrypted PDF")]
    WrongPassword,

    // ── Remote inference errors ───────────────────────────────────────────
    /// The configured provider could not be created (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A remote model call failed; the remaining stages were not run.
    #[error("{stage} failed: {source}")]
    RemoteInference {
        stage: Stage,
        #[source]
        source: RemoteInferenceError,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output script file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Fbd2ApdlError {
    /// Whether this error came from a remote model call.
    pub fn is_remote(&self) -> bool {
        matches!(self, Fbd2ApdlError::RemoteInference { .. })
    }
}

/// Why a single remote model call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum RemoteInferenceError {
    /// The provider rejected the credential (401/403, missing key).
    #[error("authentication failed for provider '{provider}': {detail}")]
    Auth { provider: String, detail: String },

    /// Rate limit or billing quota exhausted (429).
    #[error("quota or rate limit exceeded for provider '{provider}': {detail}")]
    QuotaExceeded { provider: String, detail: String },

    /// The request never got a response (DNS, TLS, connection reset, timeout).
    #[error("network failure talking to provider '{provider}': {detail}")]
    Network { provider: String, detail: String },

    /// The provider answered but the answer carried no usable text.
    #[error("malformed response from provider '{provider}': {detail}")]
    MalformedResponse { provider: String, detail: String },

    /// Any other error reported by the provider API.
    #[error("provider '{provider}' returned an error: {detail}")]
    Api { provider: String, detail: String },
}
