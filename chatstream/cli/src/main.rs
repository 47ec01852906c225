//! Chatstream - Terminal Client for Streaming Chat Completions
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint, prints the
//! reply as it streams, and keeps the last 20 conversations on disk.
//!
//! # Usage
//!
//! ```bash
//! # Interactive chat (default)
//! chatstream
//!
//! # One-shot message
//! chatstream send "What is a monad?"
//!
//! # Custom endpoint and model
//! chatstream --endpoint http://gpu-box:8000/v1/chat/completions --model qwen2.5 chat
//!
//! # History management
//! chatstream list
//! chatstream delete <id>
//!
//! # Verbose logging
//! RUST_LOG=debug chatstream
//! ```
//!
//! # Environment Variables
//!
//! - `CHATSTREAM_ENDPOINT`, `CHATSTREAM_MODEL`, `CHATSTREAM_DATA_DIR`
//! - `CHATSTREAM_CONNECT_TIMEOUT` (ms), `CHATSTREAM_REQUEST_TIMEOUT` (s, 0 = none)
//! - `CHATSTREAM_CONFIG`: Configuration file path
//! - `RUST_LOG`: Log filter (logs go to stderr)
//!
//! # Signals
//!
//! - `SIGINT` (Ctrl-C): Cancel the response being streamed; at the prompt, exit

mod chat;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use chat::Terminal;

use chatstream_core::config::{default_config_path, load_config_from_path};
use chatstream_core::{
    ChatConfig, ChatTransport, ConfigOverrides, ControllerConfig, ConversationController,
    ConversationStore, FileKeyValueStore, HttpTransport, StreamState,
};

/// Chatstream - Streaming chat-completion client
#[derive(Parser, Debug)]
#[command(name = "chatstream")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Chat-completion endpoint URL
    #[arg(short = 'e', long, global = true, value_name = "URL")]
    endpoint: Option<String>,

    /// Model identifier, or `auto` to let the server choose
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    model: Option<String>,

    /// Directory holding conversation history
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long, global = true, env = "CHATSTREAM_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat (default)
    Chat,

    /// Send one message and print the reply
    Send {
        /// Message text
        #[arg(required = true)]
        text: Vec<String>,

        /// Continue the active conversation instead of starting a new one
        #[arg(long = "continue")]
        resume: bool,
    },

    /// List stored conversations
    List,

    /// Delete a stored conversation
    Delete {
        /// Conversation id or list number
        id: String,
    },

    /// List models offered by the server
    Models,

    /// Check if the server is reachable
    Health,
}

/// Initialize logging with the specified level
///
/// Logs go to stderr so they never interleave with streamed replies.
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("chatstream={level},chatstream_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Load configuration and apply command-line overrides
fn resolve_config(args: &Args) -> Result<ChatConfig> {
    let path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(ref endpoint) = args.endpoint {
        overrides = overrides.with_endpoint(endpoint.clone());
    }
    if let Some(ref model) = args.model {
        overrides = overrides.with_model(model.clone());
    }
    if let Some(ref dir) = args.data_dir {
        overrides = overrides.with_data_dir(dir.clone());
    }
    overrides.apply(&mut config);

    config.validate()?;
    info!(
        endpoint = %config.endpoint,
        model = %config.model,
        data_dir = ?config.data_dir,
        source = %config.source(),
        "Configuration resolved"
    );
    Ok(config)
}

async fn build_controller(config: &ChatConfig) -> Result<ConversationController<HttpTransport>> {
    let transport = HttpTransport::from_config(config).context("Failed to create HTTP client")?;
    let store = ConversationStore::open(FileKeyValueStore::new(config.data_dir.clone())).await;
    Ok(ConversationController::new(
        Arc::new(transport),
        store,
        ControllerConfig::from(config),
    ))
}

async fn run(command: Command, config: ChatConfig) -> Result<()> {
    let mut controller = build_controller(&config).await?;
    let mut term = Terminal::new();

    let result = run_command(command, &config, &mut controller, &mut term).await;
    controller.flush().await;
    result
}

async fn run_command(
    command: Command,
    config: &ChatConfig,
    controller: &mut ConversationController<HttpTransport>,
    term: &mut Terminal,
) -> Result<()> {
    match command {
        Command::Chat => chat::run_interactive(term, controller, config).await,
        Command::Send { text, resume } => {
            if !resume {
                controller.new_conversation();
            }
            if !controller.send_message(&text.join(" ")) {
                anyhow::bail!("Nothing to send");
            }
            let state = chat::stream_reply(term, controller).await?;
            match (state, controller.error()) {
                (StreamState::Failed, Some(error)) => anyhow::bail!("{error}"),
                (StreamState::Cancelled, _) => anyhow::bail!("Cancelled"),
                _ => Ok(()),
            }
        }
        Command::List => chat::print_conversations(term, controller).await,
        Command::Delete { id } => {
            let id = chat::resolve_conversation(controller, &id);
            if !controller.delete_conversation(&id) {
                anyhow::bail!("No conversation with id {id}");
            }
            term.line(format!("Deleted {id}")).await
        }
        Command::Models => {
            let models = controller
                .transport()
                .list_models()
                .await
                .context("Failed to list models")?;
            if models.is_empty() {
                term.line("Server reported no models").await?;
            }
            for model in models {
                match model.owned_by {
                    Some(owner) => term.line(format!("{}  ({owner})", model.id)).await?,
                    None => term.line(&model.id).await?,
                }
            }
            Ok(())
        }
        Command::Health => {
            let transport = controller.transport();
            if transport.health_check().await {
                term.line(format!("{} is reachable", transport.endpoint())).await
            } else {
                anyhow::bail!("{} is not reachable", transport.endpoint())
            }
        }
    }
}

/// Configuration is read before the runtime starts; everything after runs on it.
fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;
    let config = resolve_config(&args)?;
    let command = args.command.unwrap_or(Command::Chat);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?
        .block_on(run(command, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_to_chat() {
        let args = Args::try_parse_from(["chatstream"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.log_level, "warn");
    }

    #[test]
    fn test_send_args() {
        let args = Args::try_parse_from([
            "chatstream",
            "send",
            "--model",
            "tiny",
            "hello",
            "world",
        ])
        .unwrap();
        assert_eq!(args.model.as_deref(), Some("tiny"));
        match args.command {
            Some(Command::Send { text, resume }) => {
                assert_eq!(text, vec!["hello".to_string(), "world".to_string()]);
                assert!(!resume);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_send_requires_text() {
        assert!(Args::try_parse_from(["chatstream", "send"]).is_err());
    }

    #[test]
    fn test_overrides_applied() {
        let args = Args::try_parse_from([
            "chatstream",
            "--config",
            "/nonexistent/chatstream.toml",
            "--endpoint",
            "http://example.test/v1/chat/completions",
            "--data-dir",
            "/tmp/chatstream-test",
            "list",
        ])
        .unwrap();
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.endpoint, "http://example.test/v1/chat/completions");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/chatstream-test"));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let args = Args::try_parse_from([
            "chatstream",
            "--config",
            "/nonexistent/chatstream.toml",
            "--endpoint",
            "ftp://nope",
        ])
        .unwrap();
        assert!(resolve_config(&args).is_err());
    }
}
