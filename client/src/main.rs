use std::io::{self, Write};

use chat_relay_client::api::DEFAULT_BASE_URL;
use chat_relay_client::{ChatSession, ConversationEntry, RelayClient, Role};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Terminal chat over the relay's SSE endpoint.
#[derive(Debug, Parser)]
#[command(name = "chat-relay", version)]
struct Args {
    /// Base URL of the relay server.
    #[arg(long, env = "CHAT_RELAY_URL", default_value = DEFAULT_BASE_URL)]
    url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let session = ChatSession::new(RelayClient::new(&args.url));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!(
        "Chatting via {}. /quit or Ctrl-C at the prompt exits, Ctrl-C while answering stops the answer.",
        args.url
    );
    loop {
        print!("> ");
        io::stdout().flush()?;

        // once a ctrl_c listener exists SIGINT no longer terminates the process
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                // the blocking stdin read cannot be cancelled, so runtime
                // shutdown would wait for the next line
                println!();
                std::process::exit(130);
            }
        };
        let Some(line) = line else {
            break;
        };
        if line.trim() == "/quit" {
            break;
        }

        let mut changes = session.subscribe();
        if session.send_message(&line).is_none() {
            continue;
        }
        stream_answer(&session, &mut changes).await?;
    }
    Ok(())
}

/// Prints the assistant's answer as it grows until the turn ends.
async fn stream_answer(session: &ChatSession, changes: &mut watch::Receiver<u64>) -> io::Result<()> {
    let mut printer = AnswerPrinter::default();
    loop {
        printer.print(&session.messages())?;
        if !session.is_streaming() {
            break;
        }
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                session.stop_conversation();
                println!("\n[stopped]");
                return Ok(());
            }
        }
    }
    println!();
    Ok(())
}

/// Writes only the part of the latest assistant entry not yet on screen.
#[derive(Default)]
struct AnswerPrinter {
    mid: Option<Uuid>,
    shown: String,
}

impl AnswerPrinter {
    fn print(&mut self, entries: &[ConversationEntry]) -> io::Result<()> {
        let Some(entry) = entries.last().filter(|e| e.role == Role::Assistant) else {
            return Ok(());
        };
        if self.mid != Some(entry.mid) {
            self.mid = Some(entry.mid);
            self.shown.clear();
        }

        let mut out = io::stdout().lock();
        match entry.content.strip_prefix(self.shown.as_str()) {
            Some(rest) => write!(out, "{rest}")?,
            // replaced wholesale, e.g. by an error message
            None => write!(out, "\n{}", entry.content)?,
        }
        self.shown.clone_from(&entry.content);
        out.flush()
    }
}
