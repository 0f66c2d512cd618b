//! Marionette CLI: the main entry point.
//!
//! Commands:
//! - `serve`: Start the HTTP gateway
//! - `run`: Send one instruction and print the command stream
//! - `doctor`: Diagnose config and provider health
//! - `init`: Write the default config file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "marionette",
    about = "Marionette — language-model autopilot for a 3D stage avatar",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "MARIONETTE_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one instruction and print commands as NDJSON
    Run(commands::run::RunArgs),

    /// Diagnose configuration and provider health
    Doctor,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so `run` output stays pipeable.
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Run(args) => commands::run::run(args).await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Init { force } => commands::init::run(force).await?,
    }

    Ok(())
}
