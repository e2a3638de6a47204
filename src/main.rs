use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use droidscope::client::{HttpJobClient, JobBackend};
use droidscope::report::{self, render_report, Report};
use droidscope::session::{ControllerConfig, SessionController, SessionOutcome};
use droidscope::ui::ConsoleDashboard;
use droidscope::utils::Config;

#[derive(Parser)]
#[command(name = "droidscope")]
#[command(version = "0.1.0")]
#[command(about = "Drive automated mobile UX analysis runs", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a UX test and follow it until the report is ready
    Run {
        /// Application name as installed on the device
        #[arg(short, long)]
        app: String,

        /// App category
        #[arg(short, long)]
        category: String,

        /// Maximum exploration depth
        #[arg(short, long)]
        max_depth: Option<u32>,

        /// Backend URL
        #[arg(long)]
        server: Option<String>,

        /// Answer yes to the stop confirmation
        #[arg(short, long, default_value = "false")]
        yes: bool,

        /// Save the report JSON (file or directory, default: current directory)
        #[arg(long, num_args = 0..=1, default_missing_value = ".")]
        save_report: Option<PathBuf>,
    },

    /// Fetch and show the results of the last test
    Results {
        /// Backend URL
        #[arg(long)]
        server: Option<String>,

        /// Save the report JSON to this file or directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the configured app categories
    Categories,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            app,
            category,
            max_depth,
            server,
            yes,
            save_report,
        } => {
            let config = config.with_server_url(server);
            let max_depth = max_depth.unwrap_or(config.default_max_depth);

            println!("{} UX test for: {}", "▶".green().bold(), app.white().bold());
            println!("  Category: {}", category.cyan());
            println!("  Max depth: {}", max_depth.to_string().cyan());
            println!("  Server: {}", config.server_url.cyan());

            let backend: Arc<dyn JobBackend> = Arc::new(HttpJobClient::new(&config)?);
            let mut controller = SessionController::new(
                backend,
                ConsoleDashboard::new(yes),
                ControllerConfig::from_config(&config),
            );

            // First Ctrl+C asks the agent to stop, a second one exits
            let stop = controller.stop_handle();
            let presses = AtomicUsize::new(0);
            ctrlc::set_handler(move || {
                if presses.fetch_add(1, Ordering::SeqCst) == 0 {
                    stop.request();
                } else {
                    eprintln!("\n{} Interrupted", "⏹".yellow());
                    std::process::exit(130);
                }
            })?;

            if controller.start_test(&app, &category, max_depth).await.is_err() {
                // Already alerted and logged by the dashboard
                std::process::exit(1);
            }

            match controller.run_until_settled().await {
                Some(SessionOutcome::Completed(report)) => {
                    if let Some(output) = save_report {
                        save(&report, &output)?;
                    }
                }
                Some(SessionOutcome::Stopped) => {
                    println!("{} Agent stopped", "⏹".yellow());
                    std::process::exit(130);
                }
                Some(SessionOutcome::Failed(_)) | None => std::process::exit(1),
            }
        }

        Commands::Results { server, output } => {
            let config = config.with_server_url(server);
            let client = HttpJobClient::new(&config)?;

            let value = client.fetch_results().await?;
            let report = Report::from_value(value)?;
            println!("{} {}", "■".blue().bold(), "UX Analysis Report".white().bold());
            print!("{}", render_report(&report));

            if let Some(output) = output {
                save(&report, &output)?;
            }
        }

        Commands::Categories => {
            if config.categories.is_empty() {
                println!("Any non-empty category is accepted (none configured)");
            }
            for category in &config.categories {
                println!("{}", category);
            }
        }
    }

    Ok(())
}

fn save(report: &Report, output: &std::path::Path) -> anyhow::Result<()> {
    let path = report::json::save(report, output)?;
    println!("{} Report saved: {}", "✓".green(), path.display().to_string().cyan());
    Ok(())
}
