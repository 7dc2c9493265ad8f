//! Live-chat trivia bot.
//!
//! Serves trivia questions to allowed chat users, generating fresh batches
//! from the current stream topic when today's queue runs dry.
//!
//! ```bash
//! CHANNEL_NAME=devops_live ALLOWED_TO_QUESTION=alice,bob \
//! STREAM_TOPIC="Containers in production" OPENAI_API_KEY=... \
//! cargo run -p trivia-bot
//! ```
//!
//! Then type chat lines such as `alice: !pergunta`.

mod console;

use console::{run_console, ConsoleChat, StaticTopic};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use trivia_core::{BotConfig, Dispatcher, EventHandler, TriviaError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries chat replies.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if std::env::args().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = BotConfig::from_env()?;
    let topic = std::env::var("STREAM_TOPIC")
        .ok()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| TriviaError::Config("STREAM_TOPIC must be set".to_string()))?;
    let client = completions::Client::from_env()?;

    tracing::info!(
        data_dir = %config.data_dir.display(),
        command = %format!("{}{}", config.command_prefix, config.trivia_command),
        model = client.model(),
        "starting trivia bot"
    );

    let chat = Arc::new(ConsoleChat::new(config.channel.clone()));
    let dispatcher = Arc::new(Dispatcher::from_config(
        config,
        Arc::new(client),
        chat,
        Arc::new(StaticTopic(topic)),
    ));

    dispatcher.on_ready().await;
    run_console(dispatcher).await?;

    tracing::info!("shutting down");
    Ok(())
}

fn print_help() {
    println!("trivia-bot - live-chat trivia questions");
    println!();
    println!("Reads chat lines from stdin as `sender: message` (`#quit` to stop).");
    println!();
    println!("Environment:");
    println!("  CHANNEL_NAME                    channel to serve (required)");
    println!("  ALLOWED_TO_QUESTION             comma-separated senders (required)");
    println!("  STREAM_TOPIC                    current stream title (required)");
    println!("  OPENAI_API_KEY                  completion service key (required)");
    println!("  OPENAI_MODEL, OPENAI_BASE_URL   completion service overrides");
    println!("  TWITCH_USERNAME                 bot login name");
    println!("  TRIVIA_DATA_DIR                 where daily question files live");
    println!("  TRIVIA_COMMAND                  command name (default: pergunta)");
    println!("  TRIVIA_REPLY_PREFIX             text prepended to replies");
    println!("  TRIVIA_COMPLETION_TIMEOUT_SECS  completion call bound (default: 30)");
    println!("  RUST_LOG                        log filter (default: info)");
}
