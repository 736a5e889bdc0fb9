//! Herd Monitor - operator CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use herd_monitor::commands;
use herd_monitor::config::DashboardConfig;
use herd_monitor::error::{AppError, ErrorResponse};
use herd_monitor::models::HorseStatus;
use herd_monitor::services::AssignmentForm;
use herd_monitor::state::Dashboard;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "herd-monitor")]
#[command(about = "Herd Monitor - live horse telemetry dashboard", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to herd-monitor.toml (overrides $HERD_MONITOR_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the backend and log the herd summary
    Watch {
        /// Exit after the first completed cycle
        #[arg(long)]
        once: bool,
    },

    /// Register a horse against an unassigned device
    Assign {
        #[arg(long)]
        device: String,

        #[arg(long)]
        name: String,

        /// Free-text location label
        #[arg(long, default_value = "")]
        location: String,

        /// normal, attention or critical
        #[arg(long)]
        status: Option<HorseStatus>,
    },

    /// Behavioural notes kept on this machine
    Insights {
        #[command(subcommand)]
        action: InsightsCommands,
    },
}

#[derive(Subcommand)]
enum InsightsCommands {
    /// Print saved notes
    Get { horse_id: String },

    /// Save notes, replacing any existing ones
    Set { horse_id: String, text: String },

    /// Remove saved notes
    Clear { horse_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = DashboardConfig::load_or_default(cli.config.as_deref());
    herd_monitor::init_tracing(&config.logging.filter);
    tracing::info!("Starting Herd Monitor...");
    config.log_summary();

    let dashboard = Dashboard::new(config).context("failed to initialize dashboard")?;

    let outcome = run(&dashboard, cli.command).await;
    drop(dashboard);

    if let Err(e) = outcome {
        let response = ErrorResponse::from(&e);
        eprintln!("{}", serde_json::to_string(&response)?);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(dashboard: &Dashboard, command: Commands) -> Result<(), AppError> {
    match command {
        Commands::Watch { once } => commands::watch::watch(dashboard, once).await,
        Commands::Assign {
            device,
            name,
            location,
            status,
        } => {
            let form = AssignmentForm {
                device_id: device,
                name,
                location,
                status,
            };
            let result = commands::assign::assign_horse(dashboard, form).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Commands::Insights { action } => {
            let output = match action {
                InsightsCommands::Get { horse_id } => {
                    serde_json::to_string_pretty(&commands::insights::get_insights(dashboard, &horse_id)?)?
                }
                InsightsCommands::Set { horse_id, text } => serde_json::to_string_pretty(
                    &commands::insights::save_insights(dashboard, &horse_id, &text)?,
                )?,
                InsightsCommands::Clear { horse_id } => {
                    let existed = commands::insights::clear_insights(dashboard, &horse_id)?;
                    serde_json::to_string_pretty(&serde_json::json!({
                        "horseId": horse_id,
                        "cleared": existed,
                    }))?
                }
            };
            println!("{}", output);
            Ok(())
        }
    }
}
