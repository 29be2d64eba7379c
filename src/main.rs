mod api;
mod config;
mod controller;
mod error;
mod form;
mod logging;
mod models;
mod poller;
mod tui;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result, anyhow};
use api::{Backend, HttpBackend};
use clap::{Parser, Subcommand};
use config::PanelConfig;
use controller::{Applied, Controller};
use form::{FilterForm, SettingsForm};
use logging::LogTarget;
use models::RuntimeSettings;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "applydash")]
#[command(about = "Operator panel for the EasyApply automation backend")]
struct Cli {
    /// Backend base URL [default: $APPLYDASH_API_URL, $NEXT_PUBLIC_API_URL, http://localhost:8000]
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Seconds between dashboard refreshes
    #[arg(long, global = true, default_value_t = config::DEFAULT_REFRESH_SECS)]
    interval: u64,

    /// Maximum number of recent applications to fetch
    #[arg(long, global = true)]
    jobs_limit: Option<u32>,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the live dashboard (default)
    Dash {
        /// Initial comma-separated positions
        #[arg(long)]
        positions: Option<String>,

        /// Initial comma-separated locations
        #[arg(long)]
        locations: Option<String>,

        /// Initial remote-only toggle
        #[arg(long)]
        remote_only: Option<bool>,

        /// OpenAI model shown until the backend reports one
        #[arg(long)]
        model: Option<String>,
    },

    /// Print counters and recent applications once
    Status,

    /// Inspect or update runtime settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },

    /// Ask the backend to start an automation run
    Run {
        /// Comma-separated positions
        #[arg(short, long, default_value = "Software Engineer,Backend Engineer")]
        positions: String,

        /// Comma-separated locations
        #[arg(short, long, default_value = "United States,Remote")]
        locations: String,

        /// Only remote jobs
        #[arg(long)]
        remote_only: bool,
    },

    /// Check backend health and whether a run is in progress
    Health,
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show settings (secrets are never shown, only whether they are stored)
    Show,

    /// Update settings; fields not given keep their current value
    Set {
        /// LinkedIn login email
        #[arg(long)]
        email: Option<String>,

        /// OpenAI model name
        #[arg(long)]
        model: Option<String>,

        /// Backend database URL
        #[arg(long)]
        database_url: Option<String>,

        /// File containing the LinkedIn password
        #[arg(long)]
        password_file: Option<String>,

        /// File containing the OpenAI API key
        #[arg(long)]
        api_key_file: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut panel = PanelConfig::new(cli.api_url.as_deref(), cli.interval, cli.jobs_limit);
    let command = cli.command.unwrap_or(Commands::Dash {
        positions: None,
        locations: None,
        remote_only: None,
        model: None,
    });

    match &command {
        Commands::Dash { .. } => {
            logging::init(cli.verbose, LogTarget::File(&config::log_file_path()))?
        }
        _ => logging::init(cli.verbose, LogTarget::Stderr)?,
    }

    let backend = Arc::new(
        HttpBackend::new(&panel.api_url, panel.jobs_limit)
            .context("Failed to build HTTP client")?,
    );
    info!("Using backend at {}", backend.base_url());

    match command {
        Commands::Dash {
            positions,
            locations,
            remote_only,
            model,
        } => {
            if let Some(positions) = positions {
                panel.defaults.positions = positions;
            }
            if let Some(locations) = locations {
                panel.defaults.locations = locations;
            }
            if let Some(remote_only) = remote_only {
                panel.defaults.remote_only = remote_only;
            }
            if let Some(model) = model {
                panel.defaults.openai_model = model;
            }
            tui::run_dashboard(backend, &panel).await?;
        }

        Commands::Status => {
            let mut controller = Controller::new(backend, &panel);
            if controller.refresh().await != Applied::Fresh {
                let reason = controller.state().refresh_error.clone().unwrap_or_default();
                return Err(anyhow!("Refresh failed: {}", reason));
            }
            print_status(controller.state());
        }

        Commands::Settings { command } => match command {
            SettingsCommands::Show => {
                let settings = backend.fetch_settings().await?;
                print_settings(&settings);
            }

            SettingsCommands::Set {
                email,
                model,
                database_url,
                password_file,
                api_key_file,
            } => {
                // Start from the server's values so every field is sent.
                let current = backend.fetch_settings().await?;
                let mut form = SettingsForm::new(&panel.defaults.openai_model);
                form.sync_from(&current);

                if let Some(email) = email {
                    form.linkedin_email = email;
                }
                if let Some(model) = model {
                    form.openai_model = model;
                }
                if let Some(url) = database_url {
                    form.database_url = url;
                }
                if let Some(path) = password_file {
                    form.linkedin_password = read_secret_file(&expand_home(&path))?;
                }
                if let Some(path) = api_key_file {
                    form.openai_api_key = read_secret_file(&expand_home(&path))?;
                }

                let saved = backend.save_settings(&form.to_update()).await?;
                println!("{}", controller::SETTINGS_SAVED);
                print_settings(&saved);
            }
        },

        Commands::Run {
            positions,
            locations,
            remote_only,
        } => {
            let filters = FilterForm {
                positions,
                locations,
                remote_only,
            }
            .to_filters();
            if filters.positions.is_empty() {
                return Err(anyhow!("No positions given. Use --positions \"Title A,Title B\""));
            }

            backend.start_run(&filters).await?;
            println!("Run started.");
            println!("  Positions:  {}", filters.positions.join(", "));
            if !filters.locations.is_empty() {
                println!("  Locations:  {}", filters.locations.join(", "));
            }
            println!("  Remote only: {}", if filters.remote_only { "yes" } else { "no" });
            println!(
                "  Up to {} jobs posted in the last {} hours",
                filters.max_jobs_per_run, filters.posted_within_hours
            );
        }

        Commands::Health => {
            let health = backend.fetch_health().await?;
            println!("Backend: {}", if health.ok { "ok" } else { "unhealthy" });
            println!("Run in progress: {}", if health.running { "yes" } else { "no" });
        }
    }

    Ok(())
}

fn print_status(state: &controller::ViewState) {
    if let Some(dashboard) = &state.dashboard {
        println!("Dashboard for {}", dashboard.date);
    }
    for card in state.cards() {
        println!("  {:<14} {:>6}", card.label, card.value);
    }
    println!();

    let rows = state.job_rows();
    if rows.is_empty() {
        println!("No applications yet.");
        return;
    }
    println!("{:<30} {:<20} {:<11} {:<30}", "ROLE", "COMPANY", "STATUS", "NOTES");
    println!("{}", "-".repeat(94));
    for row in rows {
        println!(
            "{:<30} {:<20} {:<11} {:<30}",
            truncate(row.title, 28),
            truncate(row.company, 18),
            row.status,
            truncate(row.notes, 30)
        );
    }
}

fn print_settings(settings: &RuntimeSettings) {
    let stored = |set: bool| if set { "stored" } else { "not set" };
    println!("LinkedIn email:    {}", settings.linkedin_email);
    println!("LinkedIn password: {}", stored(settings.linkedin_password.is_stored()));
    println!("OpenAI API key:    {}", stored(settings.openai_api_key.is_stored()));
    println!("OpenAI model:      {}", settings.openai_model);
    println!("Database URL:      {}", settings.database_url);
}

fn read_secret_file(path: &Path) -> Result<String> {
    let secret = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read secret file: {}", path.display()))?;
    let secret = secret.trim().to_string();
    if secret.is_empty() {
        return Err(anyhow!("Secret file is empty: {}", path.display()));
    }
    Ok(secret)
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => PathBuf::from(path),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
