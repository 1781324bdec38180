// SPDX-License-Identifier: Apache-2.0

use clap::{Parser, ValueEnum};
use std::fs::OpenOptions;
use std::process::ExitCode;
use std::time::Duration;
use tokio::select;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::metadata::LevelFilter;
use tracing::{error, info, warn};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use logmon::bounded_channel::bounded;
use logmon::init::agent::Agent;
use logmon::init::args::{AgentRun, CheckConfig};
use logmon::init::check::check_monitors;
use logmon::init::wait;

// Used when daemonized
static WORKING_DIR: &str = "/";

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Run agent
    Start(Box<AgentRun>),

    /// Validate a monitors file without starting the agent
    CheckConfig(CheckConfig),

    /// Return version
    Version,
}

#[derive(Debug, Parser)]
#[command(name = "logmon")]
#[command(bin_name = "logmon")]
#[command(version, about, long_about = None)]
#[command(subcommand_required = true)]
struct Arguments {
    #[arg(
        value_enum,
        long,
        global = true,
        env = "LOGMON_LOG_FORMAT",
        default_value = "text"
    )]
    /// Log format
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

fn main() -> ExitCode {
    let opt = Arguments::parse();

    match opt.command {
        Some(Commands::Version) => {
            println!("{}", get_version())
        }
        Some(Commands::CheckConfig(check)) => match check_monitors(&check.monitors_file) {
            Ok(problems) if problems.is_empty() => {
                println!("{}: OK", check.monitors_file.display());
            }
            Ok(problems) => {
                for problem in problems {
                    eprintln!("ERROR: {}", problem);
                }
                return ExitCode::from(1);
            }
            Err(e) => {
                eprintln!("ERROR: {}", e);
                return ExitCode::from(1);
            }
        },
        Some(Commands::Start(agent)) => {
            if agent.daemon {
                match daemonize(&agent.pid_file, &agent.log_file) {
                    Ok(Some(exitcode)) => return exitcode,
                    Err(e) => {
                        eprintln!("ERROR: failed to daemonize: {:?}", e);
                        return ExitCode::from(1);
                    }
                    _ => {}
                }
            }

            let _guard = match setup_logging(&opt.log_format) {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("ERROR: failed to setup logging: {}", e);
                    return ExitCode::from(1);
                }
            };

            if let Err(e) = run_agent(agent) {
                error!(error = %e, "Failed to run agent.");
                return ExitCode::from(1);
            }
        }
        _ => {
            // it shouldn't be possible to get here since we mark a subcommand as
            // required
            eprintln!("Must specify a command");
            return ExitCode::from(2);
        }
    }

    ExitCode::SUCCESS
}

#[tokio::main]
async fn run_agent(agent_args: Box<AgentRun>) -> Result<(), BoxError> {
    let mut agent_join_set = JoinSet::new();

    let (drain_tx, drain_rx) = bounded::<()>(1);

    let cancel_token = CancellationToken::new();
    {
        let token = cancel_token.clone();
        let agent = Agent::new(agent_args).with_drain_requests(drain_rx);
        agent_join_set.spawn(async move { agent.run(token).await });
    };

    let mut sig_usr1 = sig(SignalKind::user_defined1())?;
    let mut sig_term = sig(SignalKind::terminate())?;
    let mut sig_int = sig(SignalKind::interrupt())?;
    loop {
        select! {
            _ = sig_term.recv() => {
                info!("Shutdown signal received.");
                cancel_token.cancel();
                break;
            },
            _ = sig_int.recv() => {
                info!("Shutdown signal received.");
                cancel_token.cancel();
                break;
            },
            _ = sig_usr1.recv() => {
                info!("Signal SIGUSR1 received, draining forwarder");
                // A drain already pending covers this request
                let _ = drain_tx.try_send(());
            },
            e = wait::wait_for_any_task(&mut agent_join_set) => {
                match e {
                    Ok(()) => warn!("Unexpected early exit of agent."),
                    Err(e) => return Err(e),
                }
                break;
            },
        }
    }

    // Wait for tasks to complete, we use a large timeout here because the agent
    // enforces lower timeouts.
    wait::wait_for_tasks_with_timeout(&mut agent_join_set, Duration::from_secs(10)).await?;

    Ok(())
}

type LoggerGuard = tracing_appender::non_blocking::WorkerGuard;

fn setup_logging(log_format: &LogFormatArg) -> Result<LoggerGuard, BoxError> {
    LogTracer::init()?;

    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;

    if *log_format == LogFormatArg::Json {
        let app_name = format!("{}-{}", env!("CARGO_PKG_NAME"), get_version());
        let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);

        let subscriber = Registry::default()
            .with(filter)
            .with(JsonStorageLayer)
            .with(bunyan_formatting_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        use std::io;
        use std::io::IsTerminal;

        // Skip color codes when not in a terminal
        let use_ansi = io::stdout().is_terminal();

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_target(false)
            .with_level(true)
            .with_ansi(use_ansi)
            .compact();

        let subscriber = Registry::default().with(filter).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(guard)
}

fn daemonize(pid_file: &String, log_file: &String) -> Result<Option<ExitCode>, BoxError> {
    // Do not using tracing logging functions in here, it is not setup until after we daemonize
    let stdout_file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(log_file)
        .map_err(|e| format!("failed to open log file: {}: {}", log_file, e))?;
    let stderr_file = stdout_file.try_clone()?;

    let daemonize = daemonize::Daemonize::new()
        .pid_file(pid_file)
        .working_directory(WORKING_DIR)
        .stdout(stdout_file)
        .stderr(stderr_file);

    match daemonize.start() {
        Ok(_) => Ok(None),
        Err(e) => match e.kind {
            daemonize::ErrorKind::LockPidfile(_) => {
                println!(
                    "Detected existing agent running, if not remove: {}",
                    pid_file
                );
                Ok(Some(ExitCode::SUCCESS))
            }
            _ => Err(e.into()),
        },
    }
}

fn get_version() -> String {
    // Set during CI
    let version_build = option_env!("BUILD_SHORT_SHA").unwrap_or("dev");

    format!("{}-{}", env!("CARGO_PKG_VERSION"), version_build)
}

fn sig(kind: SignalKind) -> Result<tokio::signal::unix::Signal, BoxError> {
    Ok(signal(kind)?)
}
