//! Timefill CLI
//!
//! Fills one week of the corporate timesheet through a WebDriver server.
//!
//! Usage:
//!   timefill publish-credentials --username jdupont   # prints the run id
//!   timefill --run-id <id> run                        # consumes and erases the segments
//!   timefill run                                      # prompts and runs in one process
//!   timefill --run-id <id> erase                      # removes leftover segments

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use timefill::config::ENV_RUN_ID;
use timefill::credentials::{generate_run_id, Zeroizing};
use timefill::orchestrator::{AutoConfirm, OperatorPrompt, TerminalPrompt};
use timefill::{
    AbortReason, AutomationContext, BrowserSession, CredentialHandoff, Orchestrator, RunOutcome,
    RunReport,
};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const EXIT_DATE_CONFLICT: u8 = 2;

#[derive(Parser)]
#[command(name = "timefill")]
#[command(about = "Fill a weekly timesheet through WebDriver")]
#[command(version)]
struct Cli {
    /// Path to the TOML run configuration
    #[clap(
        long,
        short = 'c',
        env = "TIMEFILL_CONFIG",
        default_value = "timefill.toml",
        global = true
    )]
    config: PathBuf,

    /// Identifier shared between the credential producer and the run
    #[clap(long, env = ENV_RUN_ID, global = true)]
    run_id: Option<String>,

    /// Also write logs to a daily rolling file in this directory
    #[clap(long, env = "TIMEFILL_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt credentials into shared memory for a later run
    PublishCredentials {
        /// Portal login; prompted for when absent
        #[clap(long, short = 'u', env = "TIMEFILL_USERNAME")]
        username: Option<String>,
    },
    /// Log in, fill the configured week and save it as a draft
    Run {
        /// Validate the configuration and exit
        #[clap(long)]
        check: bool,
    },
    /// Erase every credential segment of a run
    Erase,
}

fn main() -> ExitCode {
    // .env is optional
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_dir.as_deref());

    match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::PublishCredentials { username } => {
            let run_id = cli.run_id.unwrap_or_else(generate_run_id);
            publish_credentials(&run_id, username)?;
            // Only the run id goes to stdout so callers can capture it.
            println!("{run_id}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { check } => {
            let context = load_context(&cli.config, cli.run_id.as_deref())?;
            if check {
                let warnings = context.validate()?;
                println!("✅ {} is valid ({} warnings)", cli.config.display(), warnings.len());
                return Ok(ExitCode::SUCCESS);
            }
            run(context)
        }
        Commands::Erase => {
            let Some(run_id) = cli.run_id else {
                bail!("erase needs --run-id or {ENV_RUN_ID}");
            };
            CredentialHandoff::new(run_id.as_str())?
                .erase_all()
                .with_context(|| format!("Failed to erase segments of run {run_id}"))?;
            info!("Erased credential segments of run {run_id}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(log_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_level = env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            "trace" => Level::TRACE,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_filter(EnvFilter::from_default_env().add_directive(log_level.into()));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "timefill.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::from_default_env().add_directive(log_level.into()));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
    guard
}

fn load_context(path: &Path, run_id: Option<&str>) -> Result<AutomationContext> {
    let mut context = AutomationContext::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    if let Some(run_id) = run_id {
        context.settings.run_id = Some(run_id.to_string());
    }
    Ok(context)
}

fn publish_credentials(run_id: &str, username: Option<String>) -> Result<CredentialHandoff> {
    let username = match username {
        Some(username) => username,
        None => prompt_line("Login: ").context("Failed to read the login")?,
    };
    if username.trim().is_empty() {
        bail!("The login must not be empty");
    }
    let password = Zeroizing::new(
        rpassword::prompt_password("Password: ").context("Failed to read the password")?,
    );

    let handoff = CredentialHandoff::new(run_id)?;
    let segments = handoff.publish_credentials(username.trim(), &password)?;
    info!(
        "Published {} credential segments for run {}",
        segments.len(),
        handoff.run_id()
    );
    Ok(handoff)
}

fn prompt_line(label: &str) -> std::io::Result<String> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{label}")?;
    stderr.flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn run(context: AutomationContext) -> Result<ExitCode> {
    let handoff = match context.settings.run_id.as_deref() {
        Some(run_id) => CredentialHandoff::new(run_id)?,
        None => {
            warn!("No run id given; prompting for credentials in this process");
            publish_credentials(&generate_run_id(), None)?
        }
    };
    // Segments are erased however the run ends.
    let _erasure = handoff.erasure_guard();

    let session = BrowserSession::open(&context.driver_config())
        .context("Failed to open a WebDriver session")?;
    let prompt: Box<dyn OperatorPrompt> = if context.settings.pause_on_warnings {
        Box::new(TerminalPrompt)
    } else {
        Box::new(AutoConfirm)
    };

    let report = Orchestrator::new(session.driver(), context)
        .with_prompt(prompt)
        .run(&handoff)
        .context("Timesheet run failed")?;
    print_summary(&report);

    Ok(match &report.outcome {
        RunOutcome::Completed => ExitCode::SUCCESS,
        RunOutcome::Aborted(AbortReason::DateConflict { .. }) => ExitCode::from(EXIT_DATE_CONFLICT),
        RunOutcome::Aborted(_) => ExitCode::FAILURE,
    })
}

fn print_summary(report: &RunReport) {
    match &report.outcome {
        RunOutcome::Completed => println!(
            "✅ Week ending {} saved as draft",
            report.period_end.as_deref().unwrap_or("?")
        ),
        RunOutcome::Aborted(reason) => println!("⚠️  Run aborted: {reason}"),
    }
    let filled: Vec<String> = report.schedule.filled().map(|d| format!("{d:?}")).collect();
    if !filled.is_empty() {
        println!("   filled: {}", filled.join(", "));
    }
    for (day, outcome) in report.schedule.failed() {
        println!("   failed: {day:?} ({outcome:?})");
    }
    for day in &report.schedule.unplaced {
        println!("   no free row for {day:?}");
    }
    for dialog in &report.save_dialogs {
        println!("   [{}] {}", dialog.kind, dialog.message);
    }
    for warning in &report.warnings {
        println!("   warning: {warning}");
    }
}
