use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use rmad::daemon::dispatch;
use rmad::{
    build_controller, init_telemetry, RmadCommand, RmadConfig, RmadResponse, RmadService,
    RmadState,
};

#[derive(Parser)]
#[command(name = "rmad")]
#[command(about = "Resumable RMA repair workflow daemon")]
#[command(long_about = "rmad walks a technician through the repair of a device. Every step is \
                       checkpointed to a JSON state file, so the workflow resumes where it left \
                       off after a reboot. Replies are printed as JSON.")]
struct Cli {
    /// Configuration file (defaults to ./rmad.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the in-memory fake device
    #[arg(long, global = true)]
    test_mode: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current state and its payload
    State,
    /// Submit the payload of the current state and advance
    Next {
        /// Tagged state payload, e.g. '{"state":"welcome","payload":{"choice":"finalize_repair"}}'
        #[arg(long)]
        payload: String,
    },
    /// Go back to the previous state when allowed
    Previous,
    /// Abort the RMA and delete the session
    Abort,
    /// Print the event journal
    Log,
    /// Save the event journal plus diagnostics text to the log directory
    SaveLog {
        #[arg(long, default_value = "")]
        diagnostics: String,
    },
    /// Record that the technician opened diagnostics or an OS update in the browser
    BrowserAction {
        #[arg(long, default_value_t = false)]
        diagnostics: bool,
        #[arg(long, default_value_t = false)]
        os_update: bool,
    },
    /// Serve JSON-lines requests on stdin, one reply per line on stdout
    Serve,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    RmadConfig::load_env_file()?;
    let mut config = RmadConfig::load(cli.config.as_deref())?;
    if cli.test_mode {
        config.test_mode = true;
    }
    init_telemetry(&config.log_level)?;

    let command = match cli.command {
        Commands::Serve => {
            return tokio::runtime::Runtime::new()?.block_on(async { serve_command(config).await });
        }
        Commands::State => RmadCommand::GetCurrentState,
        Commands::Next { payload } => {
            let state: RmadState =
                serde_json::from_str(&payload).context("Payload is not a valid tagged state")?;
            RmadCommand::TransitionNextState { state }
        }
        Commands::Previous => RmadCommand::TransitionPreviousState,
        Commands::Abort => RmadCommand::AbortRma,
        Commands::Log => RmadCommand::GetLog,
        Commands::SaveLog { diagnostics } => RmadCommand::SaveLog {
            diagnostics_log: diagnostics,
        },
        Commands::BrowserAction {
            diagnostics,
            os_update,
        } => RmadCommand::RecordBrowserActionMetric {
            diagnostics,
            os_update,
        },
    };

    let mut controller = build_controller(&config).context("Failed to resume the RMA session")?;
    let response = dispatch(&mut controller, command);
    print_response(&response)
}

fn print_response(response: &RmadResponse) -> Result<()> {
    if let RmadResponse::Log(reply) = response {
        print!("{}", reply.log);
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}

async fn serve_command(config: RmadConfig) -> Result<()> {
    let controller = build_controller(&config).context("Failed to resume the RMA session")?;
    let (service, handle) = RmadService::new(controller);
    let worker = service.spawn();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    info!("Serving JSON-lines requests on stdin");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<RmadCommand>(&line) {
            Ok(command) => serde_json::to_string(&handle.call(command).await?)?,
            Err(e) => {
                warn!(error = %e, "Rejected malformed request");
                serde_json::json!({ "error": "REQUEST_INVALID", "message": e.to_string() }).to_string()
            }
        };
        stdout.write_all(reply.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    drop(handle);
    worker.await?;
    info!("Input closed, rmad stopped");
    Ok(())
}
