//! Event-driven session controller for interactive front ends.
//!
//! A UI re-renders far more often than the user asks for anything new. The
//! session therefore never runs the pipeline because it was *called*; it
//! runs it because an event says so, and only when its current state allows.
//! Once a script exists, re-renders only re-offer it: no remote call is
//! issued again until the user uploads new inputs, asks to regenerate (when
//! the policy permits) or resets the session.
//!
//! ```text
//!                 upload / clear           generate (or auto-trigger when ready)
//!  AwaitingInputs ───────────────▶ AwaitingInputs ─────────────▶ Extracting
//!        ▲                                                            │
//!        │ failure                                                    ▼
//!        ├──────────────────────────────────────────────── (Interpreting)
//!        │                                                            │
//!        │ reset (always) / upload (AllowRegenerate)                  ▼
//!        └─────────────────────── Done ◀─────────────────────── Synthesizing
//! ```

use crate::config::{ImageRequirement, RegenerationPolicy, TriggerMode};
use crate::error::Fbd2ApdlError;
use crate::generate::Pipeline;
use crate::output::{GenerationOutput, ScriptArtifact};
use crate::pipeline::input::Upload;
use crate::progress::{ObserverHandle, PipelineObserver, Stage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Banner shown after a successful automatic run.
pub const SUCCESS_BANNER: &str = "APDL script generated successfully!";

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    AwaitingInputs,
    Extracting,
    Interpreting,
    Synthesizing,
    Done,
}

impl From<Stage> for SessionState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Extracting => SessionState::Extracting,
            Stage::Interpreting => SessionState::Interpreting,
            Stage::Synthesizing => SessionState::Synthesizing,
        }
    }
}

/// A user action delivered to the session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A problem-statement PDF was uploaded (replaces any previous one).
    DocumentUploaded(Upload),
    /// An FBD image was uploaded (replaces any previous one).
    ImageUploaded(Upload),
    /// The FBD image was removed.
    ImageCleared,
    /// The user pressed "generate".
    GenerateRequested,
    /// The front end redrew without new user intent.
    Rerender,
    /// Start over: drop inputs, output and lock.
    Reset,
}

/// What a dispatched event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The pipeline ran and produced a script.
    Generated,
    /// Inputs changed; nothing ran.
    InputsUpdated,
    /// The event was ignored; the reason is attached.
    Ignored(String),
    /// Nothing changed; the current view is still valid.
    Rerendered,
    /// The session was cleared.
    Reset,
}

/// Everything a front end needs to draw the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub state: SessionState,
    pub document_name: Option<String>,
    pub image_name: Option<String>,
    pub extracted_text: Option<String>,
    pub fbd_description: Option<String>,
    pub script: Option<String>,
    pub download: Option<ScriptArtifact>,
    pub banner: Option<String>,
    pub error: Option<String>,
}

/// Observer that mirrors stage events into the session state and forwards
/// them to the caller's observer.
struct StateTracker {
    state: Arc<Mutex<SessionState>>,
    inner: Option<ObserverHandle>,
}

impl PipelineObserver for StateTracker {
    fn on_stage_start(&self, stage: Stage) {
        set_state(&self.state, stage.into());
        if let Some(ref inner) = self.inner {
            inner.on_stage_start(stage);
        }
    }

    fn on_stage_complete(&self, stage: Stage, output_len: usize) {
        if let Some(ref inner) = self.inner {
            inner.on_stage_complete(stage, output_len);
        }
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        if let Some(ref inner) = self.inner {
            inner.on_stage_error(stage, error);
        }
    }

    fn on_pipeline_complete(&self, script_len: usize) {
        if let Some(ref inner) = self.inner {
            inner.on_pipeline_complete(script_len);
        }
    }
}

fn set_state(cell: &Mutex<SessionState>, state: SessionState) {
    *cell.lock().unwrap_or_else(|e| e.into_inner()) = state;
}

fn get_state(cell: &Mutex<SessionState>) -> SessionState {
    *cell.lock().unwrap_or_else(|e| e.into_inner())
}

/// One user's interactive session.
pub struct Session {
    pipeline: Pipeline,
    state: Arc<Mutex<SessionState>>,
    document: Option<Upload>,
    image: Option<Upload>,
    output: Option<GenerationOutput>,
    last_error: Option<String>,
    runs: usize,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("document", &self.document)
            .field("image", &self.image)
            .field("has_output", &self.output.is_some())
            .field("runs", &self.runs)
            .finish()
    }
}

impl Session {
    /// Start a session in `AwaitingInputs` around `pipeline`.
    pub fn new(pipeline: Pipeline) -> Self {
        let state = Arc::new(Mutex::new(SessionState::AwaitingInputs));
        let tracker = StateTracker {
            state: Arc::clone(&state),
            inner: pipeline.config().observer.clone(),
        };
        let pipeline = pipeline.with_observer(Arc::new(tracker));

        Self {
            pipeline,
            state,
            document: None,
            image: None,
            output: None,
            last_error: None,
            runs: 0,
        }
    }

    /// Current state. Readable from other threads through [`Self::state_handle`].
    pub fn state(&self) -> SessionState {
        get_state(&self.state)
    }

    /// Shared handle on the state, updated live while the pipeline runs.
    pub fn state_handle(&self) -> Arc<Mutex<SessionState>> {
        Arc::clone(&self.state)
    }

    /// Number of pipeline runs started in this session.
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Output of the last successful run, if still current.
    pub fn output(&self) -> Option<&GenerationOutput> {
        self.output.as_ref()
    }

    /// Whether every required upload is present.
    pub fn ready(&self) -> bool {
        self.document.is_some()
            && (self.image.is_some()
                || self.pipeline.config().image_requirement == ImageRequirement::Optional)
    }

    fn locked(&self) -> bool {
        self.state() == SessionState::Done
            && self.pipeline.config().regeneration == RegenerationPolicy::LockAfterSuccess
    }

    /// Apply one user event.
    ///
    /// Only `GenerateRequested` (or an upload completing the inputs in
    /// [`TriggerMode::Auto`]) can start the pipeline. Pipeline errors are
    /// returned and also kept for [`Self::view`].
    pub async fn dispatch(&mut self, event: SessionEvent) -> Result<Dispatch, Fbd2ApdlError> {
        debug!("Session event in {:?}: {:?}", self.state(), event);

        match event {
            SessionEvent::Rerender => Ok(Dispatch::Rerendered),
            SessionEvent::Reset => {
                self.document = None;
                self.image = None;
                self.invalidate();
                info!("Session reset");
                Ok(Dispatch::Reset)
            }
            SessionEvent::DocumentUploaded(upload) => {
                if self.locked() {
                    return Ok(self.ignore("session is locked after a successful run"));
                }
                self.document = Some(upload);
                self.inputs_changed().await
            }
            SessionEvent::ImageUploaded(upload) => {
                if self.locked() {
                    return Ok(self.ignore("session is locked after a successful run"));
                }
                self.image = Some(upload);
                self.inputs_changed().await
            }
            SessionEvent::ImageCleared => {
                if self.locked() {
                    return Ok(self.ignore("session is locked after a successful run"));
                }
                self.image = None;
                self.inputs_changed().await
            }
            SessionEvent::GenerateRequested => {
                if self.locked() {
                    return Ok(self.ignore("script already generated; reset to start over"));
                }
                self.run().await
            }
        }
    }

    /// Snapshot of everything a front end draws.
    pub fn view(&self) -> SessionView {
        let state = self.state();
        let out = self.output.as_ref();
        let banner = (state == SessionState::Done
            && self.pipeline.config().trigger == TriggerMode::Auto)
            .then(|| SUCCESS_BANNER.to_string());

        SessionView {
            state,
            document_name: self.document.as_ref().map(|u| u.name.clone()),
            image_name: self.image.as_ref().map(|u| u.name.clone()),
            extracted_text: out.map(|o| o.problem_text.clone()),
            fbd_description: out.and_then(|o| o.fbd_description.clone()),
            script: out.map(|o| o.script.clone()),
            download: out.map(|o| o.artifact()),
            banner,
            error: self.last_error.clone(),
        }
    }

    fn ignore(&self, reason: &str) -> Dispatch {
        info!("Event ignored: {}", reason);
        Dispatch::Ignored(reason.to_string())
    }

    fn invalidate(&mut self) {
        self.output = None;
        self.last_error = None;
        set_state(&self.state, SessionState::AwaitingInputs);
    }

    async fn inputs_changed(&mut self) -> Result<Dispatch, Fbd2ApdlError> {
        self.invalidate();
        if self.pipeline.config().trigger == TriggerMode::Auto && self.ready() {
            return self.run().await;
        }
        Ok(Dispatch::InputsUpdated)
    }

    async fn run(&mut self) -> Result<Dispatch, Fbd2ApdlError> {
        let document = match self.document {
            Some(ref upload) => upload,
            None => return Err(Fbd2ApdlError::MissingDocument),
        };

        self.output = None;
        self.last_error = None;
        self.runs += 1;
        info!("Session run #{} for '{}'", self.runs, document.name);

        let image = self.image.as_ref().map(|u| u.bytes.as_slice());
        match self.pipeline.run(&document.bytes, image).await {
            Ok(output) => {
                self.output = Some(output);
                set_state(&self.state, SessionState::Done);
                Ok(Dispatch::Generated)
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                set_state(&self.state, SessionState::AwaitingInputs);
                Err(e)
            }
        }
    }
}
