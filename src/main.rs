use anyhow::Context;
use clap::{Parser, Subcommand};
use orglog::{LogLevel, LogRecord, Logger, RestConnection, SetupOutcome, StoredLog};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "orglog",
    version,
    about = "Write and read application logs stored in a Salesforce org"
)]
struct Cli {
    /// Mirror written records to stdout as JSON lines
    #[arg(long, env = "ORGLOG_ECHO", global = true)]
    echo: bool,

    /// Default system value (detected hostname if not provided)
    #[arg(long, env = "ORGLOG_SYSTEM", global = true)]
    system: Option<String>,

    /// Default user value (detected OS username if not provided)
    #[arg(long, env = "ORGLOG_USER", global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify the org schema, deploying and granting access where missing
    Setup,
    /// Print stored logs, newest first
    Tail {
        /// Maximum number of records to fetch
        #[arg(long)]
        limit: Option<u32>,
        /// Print raw JSON records instead of formatted lines
        #[arg(long)]
        json: bool,
    },
    /// Write a single log record and print its assigned id
    Send {
        /// Severity: trace, debug, info, warn, error, fatal
        #[arg(long, default_value = "info")]
        level: String,
        #[arg(long)]
        message: String,
        #[arg(long)]
        stack: Option<String>,
        #[arg(long)]
        system: Option<String>,
        #[arg(long)]
        user: Option<String>,
    },
}

/// Tracing goes to stderr so it never interleaves with record output on
/// stdout. `RUST_LOG_FORMAT=json` switches to structured lines.
fn init_tracing() {
    let use_json = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
            .init();
    }
}

fn format_line(log: &StoredLog) -> String {
    let mut line = format!("{} [{}] {}", log.timestamp, log.level, log.message);
    if let Some(system) = &log.system {
        line.push_str(&format!(" system={system}"));
    }
    if let Some(user) = &log.user {
        line.push_str(&format!(" user={user}"));
    }
    line
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let conn = Arc::new(RestConnection::from_env().context("building Salesforce connection")?);
    let mut builder = Logger::builder(conn).echo(cli.echo);
    if let Some(system) = cli.system {
        builder = builder.system(system);
    }
    if let Some(user) = cli.user {
        builder = builder.user(user);
    }
    let logger = builder.build();

    match cli.command {
        Command::Setup => match logger.setup().await? {
            SetupOutcome::AlreadyProvisioned => println!("schema already provisioned"),
            SetupOutcome::Provisioned => println!("schema deployed and access granted"),
        },
        Command::Tail { limit, json } => {
            for log in logger.get_logs(limit).await? {
                if json {
                    println!("{}", serde_json::to_string(&log)?);
                } else {
                    println!("{}", format_line(&log));
                }
            }
        }
        Command::Send {
            level,
            message,
            stack,
            system,
            user,
        } => {
            let level: LogLevel = level.parse()?;
            let mut record = LogRecord::new(level, message);
            record.stack = stack;
            record.system = system;
            record.user = user;
            let id = logger.log(record).await?;
            println!("{id}");
        }
    }
    Ok(())
}
