//! Interactive chat loop and terminal rendering

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use chatstream_core::{
    ChatConfig, ChatTransport, Conversation, ConversationController, ConversationId, MessageRole,
    ModelSelector, StreamState,
};

const HELP: &str = "\
Commands:
  /new              Start a fresh conversation
  /list             Show stored conversations
  /switch <n|id>    Open a stored conversation
  /delete <n|id>    Delete a stored conversation
  /model [id|auto]  Show or change the model
  /help             Show this help
  /quit             Exit
Ctrl-C cancels a reply in progress.";

/// A line typed at the prompt
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Message(&'a str),
    New,
    List,
    Switch(&'a str),
    Delete(&'a str),
    Model(Option<&'a str>),
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return Input::Message(line);
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (command, None),
    };

    match (name, arg) {
        ("new", _) => Input::New,
        ("list" | "ls", _) => Input::List,
        ("switch", Some(arg)) => Input::Switch(arg),
        ("delete" | "rm", Some(arg)) => Input::Delete(arg),
        ("model", arg) => Input::Model(arg),
        ("help" | "?", _) => Input::Help,
        ("quit" | "exit" | "q", _) => Input::Quit,
        _ => Input::Unknown(line),
    }
}

/// Resolve a list number (1-based) or a raw id
pub fn resolve_conversation<T>(controller: &ConversationController<T>, arg: &str) -> ConversationId
where
    T: ChatTransport + ?Sized + 'static,
{
    if let Ok(n) = arg.parse::<usize>() {
        if let Some(conversation) = n
            .checked_sub(1)
            .and_then(|i| controller.conversations().into_iter().nth(i))
        {
            return conversation.id;
        }
    }
    ConversationId::from(arg)
}

fn format_timestamp(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|| "-".to_string())
}

fn format_conversation(
    index: usize,
    conversation: &Conversation,
    active: Option<&ConversationId>,
) -> String {
    let marker = if active == Some(&conversation.id) { '*' } else { ' ' };
    format!(
        "{marker}{:>3}. {}  {:>3} msgs  {}  [{}]",
        index + 1,
        format_timestamp(conversation.updated_at),
        conversation.message_count,
        conversation.preview,
        conversation.id,
    )
}

/// Terminal output
///
/// Every line the client shows goes through one buffered stdout handle.
#[derive(Debug)]
pub struct Terminal {
    out: tokio::io::Stdout,
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal {
    /// Handle on process stdout
    pub fn new() -> Self {
        Self {
            out: tokio::io::stdout(),
        }
    }

    /// Write text as is and flush
    pub async fn write(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }

    /// Write one line
    pub async fn line(&mut self, text: impl AsRef<str>) -> Result<()> {
        self.out.write_all(text.as_ref().as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await?;
        Ok(())
    }

    async fn lines(&mut self, lines: &[String]) -> Result<()> {
        for line in lines {
            self.out.write_all(line.as_bytes()).await?;
            self.out.write_all(b"\n").await?;
        }
        self.out.flush().await?;
        Ok(())
    }
}

/// Stored conversations, newest first, one line each
pub fn conversation_lines<T>(controller: &ConversationController<T>) -> Vec<String>
where
    T: ChatTransport + ?Sized + 'static,
{
    let conversations = controller.conversations();
    if conversations.is_empty() {
        return vec!["No stored conversations".to_string()];
    }

    let active = controller.active_conversation_id();
    conversations
        .iter()
        .enumerate()
        .map(|(i, conversation)| format_conversation(i, conversation, active))
        .collect()
}

fn transcript_lines<T>(controller: &ConversationController<T>) -> Vec<String>
where
    T: ChatTransport + ?Sized + 'static,
{
    controller
        .messages()
        .iter()
        .map(|message| match message.role {
            MessageRole::User => format!("> {}", message.content),
            MessageRole::Assistant => format!("{}\n", message.content),
        })
        .collect()
}

/// Print stored conversations, newest first
pub async fn print_conversations<T>(
    term: &mut Terminal,
    controller: &ConversationController<T>,
) -> Result<()>
where
    T: ChatTransport + ?Sized + 'static,
{
    term.lines(&conversation_lines(controller)).await
}

/// Stream the pending reply until it ends
///
/// Ctrl-C cancels the reply. Returns the final state.
pub async fn stream_reply<T>(
    term: &mut Terminal,
    controller: &mut ConversationController<T>,
) -> Result<StreamState>
where
    T: ChatTransport + ?Sized + 'static,
{
    // The assistant slot lands right after the user message just sent.
    let reply_index = controller.messages().len();
    let mut printed = 0;

    loop {
        let update = tokio::select! {
            update = controller.next_update() => Some(update),
            _ = tokio::signal::ctrl_c() => None,
        };

        let Some(update) = update else {
            controller.cancel();
            term.write("\n[cancelled]").await?;
            break;
        };

        if let Some(reply) = controller.messages().get(reply_index) {
            let content = reply.content.as_str();
            if reply.role == MessageRole::Assistant
                && content.len() > printed
                && content.is_char_boundary(printed)
            {
                term.write(&content[printed..]).await?;
                printed = content.len();
            }
        }

        match update {
            Some(state) if !state.is_terminal() => continue,
            _ => break,
        }
    }

    term.write("\n").await?;

    // A failure after the reply started is appended below the partial reply.
    if controller.state() == StreamState::Failed && controller.messages().len() > reply_index + 1 {
        if let Some(notice) = controller.messages().last() {
            term.line(&notice.content).await?;
        }
    }
    Ok(controller.state())
}

/// Run the interactive prompt until `/quit`, end of input, or Ctrl-C
pub async fn run_interactive<T>(
    term: &mut Terminal,
    controller: &mut ConversationController<T>,
    config: &ChatConfig,
) -> Result<()>
where
    T: ChatTransport + ?Sized + 'static,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    term.line(format!(
        "chatstream {} | {} | model: {}",
        env!("CARGO_PKG_VERSION"),
        config.endpoint,
        controller.model()
    ))
    .await?;
    term.line("Type /help for commands.\n").await?;
    term.lines(&transcript_lines(controller)).await?;

    loop {
        term.write("> ").await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            term.line("").await?;
            break;
        };

        match parse_input(&line) {
            Input::Message(text) => {
                if controller.send_message(text) {
                    stream_reply(term, controller).await?;
                    term.line("").await?;
                }
            }
            Input::New => {
                controller.new_conversation();
                term.lines(&transcript_lines(controller)).await?;
            }
            Input::List => print_conversations(term, controller).await?,
            Input::Switch(arg) => {
                let id = resolve_conversation(controller, arg);
                if controller.switch_conversation(&id) {
                    term.lines(&transcript_lines(controller)).await?;
                } else {
                    term.line(format!("No conversation {arg}")).await?;
                }
            }
            Input::Delete(arg) => {
                let id = resolve_conversation(controller, arg);
                if controller.delete_conversation(&id) {
                    term.line(format!("Deleted {id}")).await?;
                } else {
                    term.line(format!("No conversation {arg}")).await?;
                }
            }
            Input::Model(None) => term.line(format!("model: {}", controller.model())).await?,
            Input::Model(Some(model)) => {
                controller.set_model(ModelSelector::parse(model));
                term.line(format!("model: {}", controller.model())).await?;
            }
            Input::Help => term.line(HELP).await?,
            Input::Quit => break,
            Input::Unknown(line) => term.line(format!("Unknown command {line}; try /help")).await?,
        }
    }

    Ok(())
}
