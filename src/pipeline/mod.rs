//! Pipeline stages for APDL script generation.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the orchestration in [`crate::generate`] stays a straight line.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──────────────────────┐
//! (path/URL) (lopdf)                      ▼
//! input ──▶ encode ──▶ interpret ──▶ synthesize ──▶ lint
//! (FBD)     (base64)   (vision call)  (text call)   (diagnostics)
//! ```
//!
//! 1. [`input`]      — read a local file or download a URL into memory
//! 2. [`extract`]    — page text of the problem statement, in document order
//! 3. [`encode`]     — detect JPEG/PNG and base64-wrap the FBD image
//! 4. [`interpret`]  — one vision call describing the diagram
//! 5. [`synthesize`] — one text call producing the script
//! 6. [`lint`]       — read-only checks on the script
//!
//! [`inference`] is the seam every remote call goes through.

pub mod encode;
pub mod extract;
pub mod inference;
pub mod input;
pub mod interpret;
pub mod lint;
pub mod synthesize;
