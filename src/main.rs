use algorhythm::adapters::{DiscordPublisher, DryRunPublisher, Publisher, StatsPageClient};
use algorhythm::agent::{ClaudeClient, ClaudeConfig, SonarClient, SonarConfig};
use algorhythm::cli::{self, Cli, Commands};
use algorhythm::config::{AppConfig, LoggingConfig, SynthesizerKind};
use algorhythm::domain::Sport;
use algorhythm::error::{PicksError, Result};
use algorhythm::persistence::ResultsLedger;
use algorhythm::pipeline::{EngineServices, PickEngine, RunOverrides, Schedule};
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Scrapes of the stats page give up after this long
const STATS_TIMEOUT_SECS: u64 = 30;

struct RunArgs {
    sport: Sport,
    week: u32,
    today_only: bool,
    experts: Option<usize>,
    dry_run: bool,
    testing: bool,
    synthesizer: Option<SynthesizerKind>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            sport,
            week,
            today_only,
            experts,
            dry_run,
            testing,
            synthesizer,
        } => {
            let config = load_config(&cli.config)?;
            init_logging(&config.logging);
            let args = RunArgs {
                sport,
                week,
                today_only,
                experts,
                dry_run,
                testing,
                synthesizer,
            };
            run_picks(&config, args).await?;
        }
        Commands::Ledger { sport, week } => {
            init_logging_simple();
            let config = load_config(&cli.config)?;
            let ledger = ResultsLedger::load(config.ledger_path(sport, week))?;
            cli::show_ledger(&ledger);
        }
    }

    Ok(())
}

fn load_config(dir: &str) -> Result<AppConfig> {
    let config = AppConfig::load_from(dir)?;
    if let Err(errors) = config.validate() {
        return Err(PicksError::Validation(errors.join("; ")));
    }
    Ok(config)
}

async fn run_picks(config: &AppConfig, args: RunArgs) -> Result<()> {
    if let Some(n) = args.experts {
        if !(3..=5).contains(&n) {
            return Err(PicksError::Validation(format!(
                "--experts must be between 3 and 5, got {}",
                n
            )));
        }
    }

    let schedule_path = config.schedule_path(args.sport, args.week);
    let schedule = Schedule::load(&schedule_path)?;
    let today = args.today_only.then(|| chrono::Local::now().date_naive());
    let games = schedule.games_to_run(today);
    info!(
        sport = %args.sport,
        week = args.week,
        schedule = %schedule_path.display(),
        games = games.len(),
        "schedule loaded"
    );
    if games.is_empty() {
        warn!("no games to run");
        return Ok(());
    }

    let mut ledger = ResultsLedger::load(config.ledger_path(args.sport, args.week))?;

    let credentials = config.credentials(!args.dry_run)?;
    debug!(?credentials, "credentials loaded");

    let publisher: Arc<dyn Publisher> = match credentials.discord_token {
        Some(token) => Arc::new(DiscordPublisher::new(
            &config.discord.api_base,
            token,
            &config.discord.guild,
        )?),
        None => {
            info!("dry run: messages will be logged, not posted");
            Arc::new(DryRunPublisher::new())
        }
    };

    let services = EngineServices {
        reasoning: Arc::new(ClaudeClient::new(ClaudeConfig::from_settings(
            &config.anthropic,
            credentials.anthropic_key,
        ))?),
        search: Arc::new(SonarClient::new(SonarConfig::from_settings(
            &config.search,
            credentials.search_key,
        ))?),
        stats: Arc::new(StatsPageClient::new(STATS_TIMEOUT_SECS)?),
        publisher,
    };
    let overrides = RunOverrides {
        expert_count: args.experts,
        synthesizer: args.synthesizer,
        testing: args.testing,
    };

    let engine = PickEngine::from_config(config, args.sport, services, &overrides);
    let report = engine.run(&games, &mut ledger).await;
    cli::print_report(&report);

    if report.is_clean() {
        Ok(())
    } else {
        error!(failed = report.failed.len(), "run finished with failed games");
        Err(PicksError::Internal(format!(
            "{} of {} games failed",
            report.failed.len(),
            games.len()
        )))
    }
}

fn init_logging(settings: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},algorhythm=debug", settings.level))
    });

    let log_dir = std::env::var("ALGO_LOG_DIR")
        .or_else(|_| std::env::var("LOG_DIR"))
        .unwrap_or_else(|_| "logs".to_string());

    // `rolling::daily` panics if it cannot create the first file, so preflight writability.
    let file_layer = if std::fs::create_dir_all(&log_dir).is_ok() {
        let test_path = std::path::Path::new(&log_dir).join(".algorhythm_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);

                let file_appender = tracing_appender::rolling::daily(&log_dir, "algorhythm.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                Box::leak(Box::new(guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    log_dir, e
                );
                None
            }
        }
    } else {
        eprintln!(
            "Warning: Could not create log directory {}, file logging disabled",
            log_dir
        );
        None
    };

    let console_layer = if settings.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if file_logging_enabled {
        eprintln!("Logging to: {}/algorhythm.log", log_dir);
    }
}

fn init_logging_simple() {
    // Minimal logging for CLI commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
