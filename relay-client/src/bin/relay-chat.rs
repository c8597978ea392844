//! relay-chat – terminal chat against a running relay-server.
//!
//! Reads one prompt per line from stdin and prints the assistant's reply as
//! it streams in. Diagnostics go to stderr, filtered by `RUST_LOG`.

use std::io::Write;

use anyhow::{bail, Context};
use clap::Parser;
use relay_client::{refresh_models, run_exchange, Phase, RelayClient, SessionState};
use relay_types::Role;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "relay-chat", version, about = "Chat with an Ollama model through relay-server")]
struct Args {
    /// Base URL of relay-server.
    #[arg(long, env = "RELAY_URL", default_value = "http://127.0.0.1:3000")]
    relay_url: String,

    /// Model to use; defaults to the first one listed.
    #[arg(short, long)]
    model: Option<String>,

    /// System prompt placed at the start of the conversation.
    #[arg(short, long)]
    system: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let client = RelayClient::new(&args.relay_url)?;

    let mut state = refresh_models(&client, &SessionState::new())
        .await
        .with_context(|| format!("failed to list models from {}", client.base_url()))?;

    if let Some(name) = args.model.as_deref() {
        state = match state.select_model(name) {
            Some(s) => s,
            None => {
                let available: Vec<&str> = state.models().iter().map(|m| m.name.as_str()).collect();
                bail!("model '{name}' is not available (have: {})", available.join(", "))
            }
        };
    }
    let Some(model) = state.selected_model() else {
        bail!("no models available; pull one with `ollama pull <model>` first");
    };
    info!(model, relay = client.base_url(), "session ready");
    eprintln!("chatting with {model}; Ctrl-D to quit");

    if let Some(system) = args.system {
        state = state.with_message(Role::System, system);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let mut printed = 0usize;
        state = run_exchange(&client, &state, &line, |snapshot| {
            if let Err(e) = print_progress(snapshot, &mut printed) {
                warn!(error = %e, "failed to write reply to stdout");
            }
        })
        .await;

        if let Some(error) = state.error() {
            eprintln!("error: {error}");
            state = state.acknowledge_error();
        }
    }
    Ok(())
}

/// Print the part of the streaming reply not yet shown.
fn print_progress(snapshot: &SessionState, printed: &mut usize) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    match snapshot.phase() {
        Phase::StreamingResponse => {
            if let Some(last) = snapshot.messages().last().filter(|m| m.role == Role::Assistant) {
                if let Some(fresh) = last.content.get(*printed..) {
                    stdout.write_all(fresh.as_bytes())?;
                    *printed = last.content.len();
                }
            }
        }
        Phase::Idle | Phase::Error(_) if *printed > 0 => {
            stdout.write_all(b"\n")?;
        }
        _ => {}
    }
    stdout.flush()
}
