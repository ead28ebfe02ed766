mod logging;
mod topics;

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use dl_core::{Config, Error, ScheduleConfig};
use dl_pipeline::{LearningPipeline, Scheduler};
use dl_storage::{DatabaseStats, LearningDatabase};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Daily learning feed: curate articles into summaries, quizzes and flashcards")]
struct Cli {
    /// Run without writing to the database
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, summarize, generate and save (the default)
    Run(RunArgs),
    /// Show database statistics
    Stats,
    /// Add or update the learning properties on the database
    SetupDb,
    /// Run on the configured schedule until interrupted
    Schedule,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Comma-separated topics, e.g. "python,machine learning"
    #[arg(long, short)]
    topics: Option<String>,

    /// Pick topics interactively
    #[arg(long, short, conflicts_with = "topics")]
    interactive: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!(error = ?e, "unexpected error");
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(Error::Config(errors)) => {
            report_config_errors(&errors);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };
    logging::init(&config.log_level, config.log_file.as_deref())?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting daily learning feed");

    let errors = config.validate();
    if !errors.is_empty() {
        for problem in &errors {
            error!(problem = %problem, "configuration error");
        }
        report_config_errors(&errors);
        return Ok(ExitCode::FAILURE);
    }

    match cli.command.unwrap_or_else(|| Command::Run(RunArgs::default())) {
        Command::Run(args) => run_once(&config, args, cli.dry_run).await,
        Command::Stats => show_stats(&config).await,
        Command::SetupDb => setup_db(&config).await,
        Command::Schedule => run_scheduler(&config, cli.dry_run).await,
    }
}

fn report_config_errors(errors: &[String]) {
    eprintln!("Configuration errors:");
    for problem in errors {
        eprintln!("  - {}", problem);
    }
}

async fn run_once(config: &Config, args: RunArgs, dry_run: bool) -> anyhow::Result<ExitCode> {
    let pipeline = LearningPipeline::from_config(config, dry_run)?;
    if let Err(e) = pipeline.verify().await {
        error!(error = %e, "setup validation failed, check your configuration");
        return Ok(ExitCode::FAILURE);
    }
    if dry_run {
        info!("dry run, nothing will be saved to the database");
    }

    let topics = match (args.topics, args.interactive) {
        (Some(list), _) => Some(topics::parse_topic_list(&list)),
        (None, true) => Some(topics::prompt_topics(&config.default_topics)?),
        (None, false) => None,
    };

    match pipeline.run(topics.as_deref()).await {
        Ok(report) => {
            if report.wrote_nothing() {
                warn!(materials = report.materials, "no entries could be saved");
            }
            info!(entries_created = report.created.len(), "daily learning feed generation completed");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "daily learning feed generation failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn show_stats(config: &Config) -> anyhow::Result<ExitCode> {
    let database = LearningDatabase::from_config(config)?;
    database.verify_connection().await?;

    match database.get_stats().await {
        Ok(stats) => {
            print_stats(&stats);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "failed to fetch database statistics");
            println!("Unable to fetch database statistics");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_stats(stats: &DatabaseStats) {
    println!("\nDatabase Statistics:");
    println!("{}", "=".repeat(30));
    println!("Total Entries: {}", stats.total_entries);
    println!("Recent Entries (7 days): {}", stats.recent_entries);
    println!("\nBy Topic:");
    for (topic, count) in &stats.topics {
        println!("  {}: {}", topic, count);
    }
    println!("\nBy Status:");
    for (status, count) in &stats.statuses {
        println!("  {}: {}", status, count);
    }
}

async fn setup_db(config: &Config) -> anyhow::Result<ExitCode> {
    let database = LearningDatabase::from_config(config)?;
    database.verify_connection().await?;

    match database.setup_schema().await {
        Ok(()) => {
            println!("Database schema setup successful!");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "schema update failed");
            println!("Database schema setup failed!");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_scheduler(config: &Config, dry_run: bool) -> anyhow::Result<ExitCode> {
    let schedule = match ScheduleConfig::from_env() {
        Ok(schedule) => schedule,
        Err(Error::Config(errors)) => {
            report_config_errors(&errors);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    let pipeline = LearningPipeline::from_config(config, dry_run)?;
    if let Err(e) = pipeline.verify().await {
        error!(error = %e, "setup validation failed, check your configuration");
        return Ok(ExitCode::FAILURE);
    }

    let scheduler = Scheduler::new(schedule, Arc::new(pipeline));
    let info = scheduler.schedule_info();
    if !info.enabled {
        println!("Scheduler is disabled. Set SCHEDULER_ENABLED=true to run on a schedule.");
        return Ok(ExitCode::FAILURE);
    }

    let handle = scheduler.start()?;
    let info = scheduler.schedule_info();
    println!("Daily Learning Feed Scheduler");
    println!("{}", "=".repeat(40));
    println!("Enabled: {}", info.enabled);
    println!("Run Time: {} ({})", info.run_time.format("%H:%M"), info.timezone);
    println!("Weekdays Only: {}", info.weekdays_only);
    match &info.topics {
        Some(topics) => println!("Topics: {}", topics.join(", ")),
        None => println!("Topics: Default topics"),
    }
    match info.next_run {
        Some(next) => println!("Next Run: {}", next.to_rfc3339()),
        None => println!("Next Run: Not scheduled"),
    }
    println!("Rules: {}", info.rule_count);
    println!("\nScheduler is running. Press Ctrl+C to stop.");

    shutdown_signal().await;
    info!("shutdown signal received, stopping scheduler");
    handle.stop().await?;

    let health = scheduler.health().await;
    info!(
        status = %health.status,
        consecutive_failures = health.consecutive_failures,
        issues = ?health.issues,
        "final health"
    );
    println!("Scheduler stopped");
    Ok(ExitCode::SUCCESS)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
