//! Threadbot CLI entry point.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use threadbot::config::{BotConfig, Config, InferenceConfig};
use threadbot::github::GithubGateway;
use threadbot::handler::EventHandler;
use threadbot::llm::TogetherClient;
use threadbot::monitor::Monitor;
use threadbot::{ProcessingEvent, terminal};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[derive(Parser)]
#[command(name = "threadbot")]
#[command(about = "AI reply bot for GitHub Discussions")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Webhook event type for one-shot processing ("discussion" or
    /// "discussion_comment").
    #[arg(long, requires = "event_payload")]
    github_event: Option<String>,

    /// Webhook event payload as JSON, paired with --github-event.
    #[arg(long, requires = "github_event")]
    event_payload: Option<String>,

    /// Repository in owner/name form (or set REPOSITORY).
    #[arg(long)]
    repo: Option<String>,

    /// GitHub token (or set GITHUB_TOKEN).
    #[arg(long)]
    token: Option<String>,

    /// Polling interval in seconds.
    #[arg(long)]
    interval: Option<u64>,

    /// Enable debug logging.
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Chat with the model interactively in the terminal.
    Chat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.debug);

    if let Some(Command::Chat) = cli.command {
        let inference = InferenceConfig::load().context("chat mode configuration")?;
        terminal::run(inference, BotConfig::default()).await?;
        return Ok(());
    }

    let config = Config::load(cli.repo, cli.token, cli.interval).context("configuration")?;
    let gateway = GithubGateway::new(&config.github_token).context("building API client")?;
    let llm = TogetherClient::new(config.inference.clone()).context("building inference client")?;
    let handler = EventHandler::new(gateway.clone(), llm, config.bot.clone());

    match (cli.github_event, cli.event_payload) {
        (Some(event_type), Some(payload)) => {
            let Some(event) =
                ProcessingEvent::from_webhook(&event_type, &payload, &config.repository)?
            else {
                tracing::info!(%event_type, "event requires no response");
                return Ok(());
            };
            let mut handler = handler;
            handler.handle(&event).await?;
        }
        _ => {
            let mut monitor = Monitor::new(gateway, handler, &config);
            monitor.run().await?;
        }
    }

    Ok(())
}

/// Initialize stderr and file logging. The returned guard must live for the
/// process lifetime so buffered log lines are flushed.
fn init_tracing(debug: bool) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::never(".", "threadbot.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = if debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    guard
}
