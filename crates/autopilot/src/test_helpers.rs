//! Shared test helpers for orchestrator tests.

use marionette_core::Command;
use marionette_core::error::ProviderError;
use marionette_core::provider::{Provider, ProviderRequest, TokenStream};
use marionette_memory::InMemoryHistory;
use marionette_providers::ProviderRouter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::orchestrator::Autopilot;

/// What one `stream` call does.
pub enum Script {
    /// Send these fragments, then end normally.
    Fragments(Vec<String>),
    /// Send these fragments, then fail.
    FailAfter(Vec<String>, ProviderError),
    /// Fail before any fragment.
    Refuse(ProviderError),
    /// Repeat one fragment until the receiver is dropped.
    Endless(&'static str),
    /// Never finish opening the stream, like an upstream that sends no headers.
    Stall,
}

impl Script {
    pub fn fragments(parts: &[&str]) -> Self {
        Script::Fragments(parts.iter().map(|p| p.to_string()).collect())
    }
}

/// Sets the flag when dropped.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// A mock provider that plays one script per call, in order.
///
/// Panics if more calls are made than scripts provided.
pub struct ScriptedProvider {
    scripts: Mutex<Vec<Script>>,
    requests: Mutex<Vec<ProviderRequest>>,
    cancelled: Arc<AtomicBool>,
}

impl ScriptedProvider {
    pub fn new(mut scripts: Vec<Script>) -> Self {
        scripts.reverse();
        Self {
            scripts: Mutex::new(scripts),
            requests: Mutex::new(Vec::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Whether an endless or stalled script saw its caller go away.
    pub fn cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<TokenStream, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop()
            .expect("ScriptedProvider: no more scripts");

        if let Script::Stall = script {
            let _guard = CancelOnDrop(self.cancelled.clone());
            return std::future::pending().await;
        }

        let (tx, rx) = mpsc::channel(4);
        match script {
            Script::Stall => unreachable!("handled above"),
            Script::Refuse(err) => return Err(err),
            Script::Fragments(parts) => {
                tokio::spawn(async move {
                    for part in parts {
                        if tx.send(Ok(part)).await.is_err() {
                            return;
                        }
                    }
                });
            }
            Script::FailAfter(parts, err) => {
                tokio::spawn(async move {
                    for part in parts {
                        if tx.send(Ok(part)).await.is_err() {
                            return;
                        }
                    }
                    let _ = tx.send(Err(err)).await;
                });
            }
            Script::Endless(part) => {
                let cancelled = self.cancelled.clone();
                tokio::spawn(async move {
                    while tx.send(Ok(part.to_string())).await.is_ok() {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    }
                    cancelled.store(true, Ordering::SeqCst);
                });
            }
        }
        Ok(rx)
    }
}

/// An autopilot over `provider` (registered as the default) and a fresh history.
pub fn autopilot_with(provider: ScriptedProvider) -> (Arc<Autopilot>, Arc<ScriptedProvider>) {
    let provider = Arc::new(provider);
    let mut router = ProviderRouter::new("scripted");
    router.register("scripted", provider.clone(), "test-model");

    let history = Arc::new(InMemoryHistory::with_exchanges(10));
    let autopilot = Autopilot::new(Arc::new(router), history);
    (Arc::new(autopilot), provider)
}

/// Drain a command stream to its end.
pub async fn collect(mut rx: mpsc::Receiver<Command>) -> Vec<Command> {
    let mut commands = Vec::new();
    while let Some(command) = rx.recv().await {
        commands.push(command);
    }
    commands
}
