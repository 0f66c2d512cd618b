//! The autopilot orchestrator.
//!
//! One [`Autopilot`] serves every request. Each call to [`Autopilot::run`]
//! spawns a request task that walks
//! `INIT → STREAMING → FLUSH → DONE` (or `→ ERROR`) and pushes commands into
//! a single-slot channel, so the pipeline never races ahead of its consumer.
//! Dropping the receiver cancels the request and, through the provider's
//! token stream, the upstream HTTP call.

use std::sync::Arc;

use marionette_config::AppConfig;
use marionette_core::history::{HistoryStore, SessionId};
use marionette_core::message::Message;
use marionette_core::provider::ProviderRequest;
use marionette_core::{Command, Error};
use marionette_providers::ProviderRouter;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::normalize::{self, MalformedLine};
use crate::prompt;
use crate::reassembler::LineReassembler;
use crate::spatial::{self, NavDetector, StagePosition};

/// Commands buffered ahead of the consumer.
const OUTPUT_BUFFER: usize = 1;

/// One instruction for the avatar.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AutopilotRequest {
    pub instruction: String,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub position: Option<StagePosition>,
    /// Yaw in radians; only used together with `position`.
    #[serde(default)]
    pub rotation: Option<f64>,
    /// Provider name; the configured default when absent.
    #[serde(default)]
    pub provider: Option<String>,
}

impl AutopilotRequest {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session_id = Some(SessionId::new(session));
        self
    }

    pub fn with_position(mut self, x: f64, z: f64, rotation: Option<f64>) -> Self {
        self.position = Some(StagePosition::new(x, z));
        self.rotation = rotation;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

/// How a request's stream ended, short of an error.
enum Outcome {
    Completed,
    /// The consumer went away.
    Abandoned,
}

/// Drives instructions through a provider and emits validated commands.
pub struct Autopilot {
    router: Arc<ProviderRouter>,
    history: Arc<dyn HistoryStore>,
    nav: NavDetector,
    system_prompt: String,
    default_session: SessionId,
    /// Prior turns replayed into each prompt.
    history_window: usize,
    temperature: f32,
}

impl Autopilot {
    pub fn new(router: Arc<ProviderRouter>, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            router,
            history,
            nav: NavDetector::new(),
            system_prompt: prompt::system_prompt(),
            default_session: SessionId::new("default"),
            history_window: 20,
            temperature: 0.7,
        }
    }

    /// Apply the `[autopilot]` section and the default temperature.
    pub fn configured(mut self, config: &AppConfig) -> Self {
        self.default_session = SessionId::new(config.autopilot.default_session.clone());
        self.history_window = config.autopilot.history_capacity();
        self.temperature = config.default_temperature;
        if let Some(prompt) = &config.autopilot.system_prompt_override {
            self.system_prompt = prompt.clone();
        }
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_history_window(mut self, turns: usize) -> Self {
        self.history_window = turns;
        self
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    pub fn router(&self) -> &Arc<ProviderRouter> {
        &self.router
    }

    pub fn default_session(&self) -> &SessionId {
        &self.default_session
    }

    /// Start a request. The receiver yields commands ending in exactly one
    /// `Done` or `Error`, unless it is dropped first.
    pub fn run(self: &Arc<Self>, request: AutopilotRequest) -> mpsc::Receiver<Command> {
        let (tx, rx) = mpsc::channel(OUTPUT_BUFFER);
        let this = Arc::clone(self);
        tokio::spawn(async move { this.drive(request, tx).await });
        rx
    }

    async fn drive(&self, request: AutopilotRequest, tx: mpsc::Sender<Command>) {
        let session = request
            .session_id
            .clone()
            .unwrap_or_else(|| self.default_session.clone());
        info!(
            session = %session,
            provider = request.provider.as_deref().unwrap_or(self.router.default_provider()),
            positioned = request.position.is_some(),
            "Autopilot request"
        );

        // Navigation the model must not get wrong goes out before the model is asked
        if let Some(intent) = self.nav.detect(&request.instruction) {
            debug!(session = %session, ?intent, "Deterministic navigation");
            if tx.send(intent.command()).await.is_err() {
                return;
            }
        }

        let terminal = match self.stream(&session, &request, &tx).await {
            Ok(Outcome::Completed) => Command::Done,
            Ok(Outcome::Abandoned) => {
                debug!(session = %session, "Consumer disconnected, request cancelled");
                return;
            }
            Err(e) => {
                warn!(session = %session, error = %e, "Autopilot request failed");
                Command::Error(e.to_string())
            }
        };
        let _ = tx.send(terminal).await;
    }

    async fn stream(
        &self,
        session: &SessionId,
        request: &AutopilotRequest,
        tx: &mpsc::Sender<Command>,
    ) -> Result<Outcome, Error> {
        let prior = self.history.get(session).await?;
        let route = self.router.resolve(request.provider.as_deref())?;

        let mut messages = Vec::with_capacity(prior.len().min(self.history_window) + 2);
        messages.push(Message::system(&self.system_prompt));
        messages.extend(prior.into_iter().rev().take(self.history_window).rev());
        messages.push(Message::user(spatial::augment(
            &request.instruction,
            request.position,
            request.rotation,
        )));

        let mut provider_request = ProviderRequest::new(route.model.clone(), messages);
        provider_request.temperature = self.temperature;

        debug!(session = %session, provider = route.provider.name(), model = %route.model, "Opening token stream");
        // The consumer may leave while the upstream is still connecting.
        let mut fragments = tokio::select! {
            _ = tx.closed() => return Ok(Outcome::Abandoned),
            opened = route.provider.stream(provider_request) => opened?,
        };

        let mut reassembler = LineReassembler::new();
        let mut raw = String::new();
        let mut emitted = 0usize;

        loop {
            let next = tokio::select! {
                _ = tx.closed() => return Ok(Outcome::Abandoned),
                next = fragments.recv() => next,
            };

            match next {
                Some(Ok(fragment)) => {
                    raw.push_str(&fragment);
                    for line in reassembler.push(&fragment) {
                        match self.emit_line(&line, tx).await {
                            Some(true) => emitted += 1,
                            Some(false) => {}
                            None => return Ok(Outcome::Abandoned),
                        }
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => break,
            }
        }

        if let Some(line) = reassembler.finish() {
            match self.emit_line(&line, tx).await {
                Some(true) => emitted += 1,
                Some(false) => {}
                None => return Ok(Outcome::Abandoned),
            }
        }

        self.history
            .append_exchange(
                session,
                Message::user(&request.instruction),
                Message::assistant(raw),
            )
            .await?;

        info!(session = %session, commands = emitted, "Autopilot request complete");
        Ok(Outcome::Completed)
    }

    /// Normalize one line and send its command.
    ///
    /// `Some(true)` sent a command, `Some(false)` dropped the line, and
    /// `None` means the consumer is gone.
    async fn emit_line(&self, line: &str, tx: &mpsc::Sender<Command>) -> Option<bool> {
        match normalize::parse_line(line) {
            Ok(Some(command)) => {
                debug!(kind = command.kind(), "Emitting command");
                tx.send(command).await.ok().map(|()| true)
            }
            Ok(None) => {
                debug!(line, "Line carries no command");
                Some(false)
            }
            Err(MalformedLine::Blank) => Some(false),
            Err(reason) => {
                debug!(%reason, line, "Dropping malformed line");
                Some(false)
            }
        }
    }
}
