//! `marionette run`: Send one instruction through the autopilot and print
//! each command as a JSON line on stdout.

use std::io::Write;
use std::sync::Arc;

use clap::Args;
use marionette_autopilot::{Autopilot, AutopilotRequest};
use marionette_config::AppConfig;
use marionette_core::Command;
use marionette_memory::InMemoryHistory;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// What the avatar should do
    pub instruction: String,

    /// Session to read and extend
    #[arg(short, long)]
    pub session: Option<String>,

    /// Current stage x (negative is stage left)
    #[arg(long, requires = "z", allow_negative_numbers = true)]
    pub x: Option<f64>,

    /// Current stage z (positive is toward the audience)
    #[arg(long, requires = "x", allow_negative_numbers = true)]
    pub z: Option<f64>,

    /// Current yaw in radians
    #[arg(long, requires = "x", allow_negative_numbers = true)]
    pub rotation: Option<f64>,

    /// Provider name from config (defaults to `default_provider`)
    #[arg(short, long)]
    pub provider: Option<String>,
}

impl RunArgs {
    fn into_request(self) -> AutopilotRequest {
        let mut request = AutopilotRequest::new(self.instruction);
        if let Some(session) = self.session {
            request = request.with_session(session);
        }
        if let (Some(x), Some(z)) = (self.x, self.z) {
            request = request.with_position(x, z, self.rotation);
        }
        if let Some(provider) = self.provider {
            request = request.with_provider(provider);
        }
        request
    }
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let router = marionette_providers::router::build_from_config(&config)?;
    let history = Arc::new(InMemoryHistory::with_exchanges(config.autopilot.max_history));
    let autopilot = Arc::new(Autopilot::new(Arc::new(router), history).configured(&config));

    let request = args.into_request();
    debug!(
        provider = request.provider.as_deref().unwrap_or(&config.default_provider),
        positioned = request.position.is_some(),
        "Running single instruction"
    );
    let rx = autopilot.run(request);
    let stdout = std::io::stdout();
    let failure = print_stream(rx, &mut stdout.lock()).await?;

    match failure {
        Some(message) => Err(message.into()),
        None => Ok(()),
    }
}

/// Write every command as a line; returns the error message if the stream
/// ended in one.
async fn print_stream(
    mut rx: mpsc::Receiver<Command>,
    out: &mut impl Write,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let mut failure = None;
    while let Some(command) = rx.recv().await {
        out.write_all(command.to_line()?.as_bytes())?;
        out.flush()?;
        if let Command::Error(message) = command {
            failure = Some(message);
        }
    }
    Ok(failure)
}
