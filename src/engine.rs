//! Engine Controller
//!
//! Long-lived per edit session. Input changes are debounced on a tokio task:
//! every change re-arms the timer, and only the latest input is built when it
//! fires. A superseded input is dropped before it is ever built, so an older
//! payload can never replace a newer one.
//!
//! ```text
//! Idle ──change──▶ (debounce) ──▶ Building ──ok──▶ Ready ──change──▶ ...
//!                                    │
//!                                    └──compile error──▶ Error
//! any ──runtime error reported by the sandbox──▶ Error
//! ```
//!
//! Runtime errors tagged with a build fingerprint only apply while that
//! build is the one shown.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

use crate::bundle::{BuildRequest, PreviewBuilder};
use crate::config::EngineConfig;
use crate::error::{ConfigError, EngineClosed, SurfaceError};
use crate::preview_window::PreviewMessage;
use crate::sandbox::BuildPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnginePhase {
    Idle,
    Building,
    Ready,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub phase: EnginePhase,
    /// True from the moment a build is scheduled until it settles.
    pub is_loading: bool,
    pub error: Option<String>,
    /// Number of builds started so far.
    pub build_id: u64,
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self {
            phase: EnginePhase::Idle,
            is_loading: false,
            error: None,
            build_id: 0,
        }
    }
}

/// Whatever shows the payload: an iframe bridge, a test double, a file.
pub trait PreviewSurface: Send + 'static {
    fn load(&mut self, payload: &BuildPayload) -> Result<(), SurfaceError>;
}

enum Command {
    Update(BuildRequest),
    RuntimeError {
        message: String,
        stack: String,
        build: Option<String>,
    },
}

pub struct EngineController {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<EngineStatus>,
    payload: watch::Receiver<Option<Arc<BuildPayload>>>,
    task: JoinHandle<()>,
}

impl EngineController {
    /// Start the engine task. Must be called from within a tokio runtime.
    pub fn spawn<S: PreviewSurface>(config: EngineConfig, surface: S) -> Result<Self, ConfigError> {
        let debounce = config.debounce();
        let builder = PreviewBuilder::new(config)?;
        let (commands, receiver) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(EngineStatus::default());
        let (payload_tx, payload) = watch::channel(None);

        let task = EngineTask {
            builder,
            surface,
            debounce,
            status: status_tx,
            payload: payload_tx,
            pending: None,
            last_fingerprint: None,
            shown: None,
            build_id: 0,
        };
        let task = tokio::spawn(task.run(receiver));

        Ok(Self {
            commands,
            status,
            payload,
            task,
        })
    }

    /// Schedule a rebuild with new input. Identical input is ignored.
    pub fn update(&self, request: BuildRequest) -> Result<(), EngineClosed> {
        self.commands
            .send(Command::Update(request))
            .map_err(|_| EngineClosed)
    }

    /// Out-of-band error raised inside the sandbox after hand-off. It is
    /// applied to whatever build is currently shown.
    pub fn report_runtime_error(
        &self,
        message: impl Into<String>,
        stack: impl Into<String>,
    ) -> Result<(), EngineClosed> {
        self.send_runtime_error(message.into(), stack.into(), None)
    }

    fn send_runtime_error(
        &self,
        message: String,
        stack: String,
        build: Option<String>,
    ) -> Result<(), EngineClosed> {
        self.commands
            .send(Command::RuntimeError {
                message,
                stack,
                build,
            })
            .map_err(|_| EngineClosed)
    }

    /// Answer a message from the iframe or the detached window.
    pub fn handle_preview_message(
        &self,
        message: PreviewMessage,
    ) -> Result<Option<PreviewMessage>, EngineClosed> {
        match message {
            PreviewMessage::RequestCode => {
                let payload = self.payload.borrow();
                Ok(Some(PreviewMessage::code_update(payload.as_deref())))
            }
            PreviewMessage::RuntimeError {
                message,
                stack,
                build,
            } => {
                self.send_runtime_error(message, stack, build)?;
                Ok(None)
            }
            PreviewMessage::Rendered => {
                tracing::debug!("preview rendered");
                Ok(None)
            }
            PreviewMessage::CodeUpdate { .. } => Ok(None),
        }
    }

    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    /// Payload of the last build the surface accepted.
    pub fn latest_payload(&self) -> Option<Arc<BuildPayload>> {
        self.payload.borrow().clone()
    }

    /// Stop accepting input and wait for the task to finish. A pending,
    /// not yet started build is dropped.
    pub async fn shutdown(self) {
        drop(self.commands);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "engine task failed");
        }
    }
}

struct EngineTask<S> {
    builder: PreviewBuilder,
    surface: S,
    debounce: Duration,
    status: watch::Sender<EngineStatus>,
    payload: watch::Sender<Option<Arc<BuildPayload>>>,
    pending: Option<BuildRequest>,
    last_fingerprint: Option<String>,
    /// Fingerprint of the payload the latest build put on the surface.
    shown: Option<String>,
    build_id: u64,
}

impl<S: PreviewSurface> EngineTask<S> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let sleep = tokio::time::sleep(self.debounce);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep, if self.pending.is_some() => {
                    if let Some(request) = self.pending.take() {
                        self.build(&request);
                    }
                }
                command = commands.recv() => match command {
                    Some(Command::Update(request)) => {
                        if self.schedule(request) {
                            sleep.as_mut().reset(Instant::now() + self.debounce);
                        }
                    }
                    Some(Command::RuntimeError { message, stack, build }) => {
                        self.runtime_error(message, stack, build);
                    }
                    None => break,
                },
            }
        }
        tracing::debug!("engine task stopped");
    }

    fn set_status(&self, phase: EnginePhase, is_loading: bool, error: Option<String>) {
        self.status.send_replace(EngineStatus {
            phase,
            is_loading,
            error,
            build_id: self.build_id,
        });
    }

    /// Returns whether the debounce timer must be re-armed.
    fn schedule(&mut self, request: BuildRequest) -> bool {
        let fingerprint = request.fingerprint();
        if self.last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            return false;
        }
        self.last_fingerprint = Some(fingerprint);

        if request.entry_source.trim().is_empty() {
            self.pending = None;
            self.shown = None;
            self.set_status(EnginePhase::Idle, false, None);
            return false;
        }

        self.pending = Some(request);
        let current = self.status.borrow().clone();
        self.set_status(current.phase, true, current.error);
        true
    }

    fn build(&mut self, request: &BuildRequest) {
        self.build_id += 1;
        self.set_status(EnginePhase::Building, true, None);

        let output = match self.builder.build(request) {
            Ok(output) => output,
            Err(e) => {
                self.shown = None;
                tracing::warn!(build = self.build_id, error = %e, "entry failed to compile");
                self.set_status(EnginePhase::Error, false, Some(e.user_message()));
                return;
            }
        };

        match self.surface.load(&output.payload) {
            Ok(()) => {
                self.shown = Some(output.payload.fingerprint.clone());
                self.payload.send_replace(Some(Arc::new(output.payload)));
                self.set_status(EnginePhase::Ready, false, None);
            }
            Err(e) => {
                self.shown = None;
                tracing::warn!(build = self.build_id, error = %e, "preview surface rejected payload");
                self.set_status(EnginePhase::Error, false, Some(e.to_string()));
            }
        }
    }

    /// A tagged report only counts when it comes from the payload currently
    /// shown; a window still running an older build is ignored.
    fn runtime_error(&mut self, message: String, stack: String, build: Option<String>) {
        if let Some(build) = &build {
            if self.shown.as_deref() != Some(build.as_str()) {
                tracing::debug!(build = %build, message = %message, "ignoring runtime error from a superseded build");
                return;
            }
        }
        tracing::warn!(build = self.build_id, message = %message, stack = %stack, "runtime error in preview");
        let is_loading = self.pending.is_some();
        self.set_status(
            EnginePhase::Error,
            is_loading,
            Some(format!("Runtime Error: {}", message)),
        );
    }
}
