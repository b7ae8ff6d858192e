use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ludobot::assistant::services::{ConversationSession, OpenAiBackend, RenderEvent};
use ludobot::assistant::tools::{ShufflePicksTool, ToolRegistry};
use ludobot::config::{AppConfig, Cli};
use ludobot::presets::Preset;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env(&cli).context("incomplete configuration")?;

    let backend = match &config.base_url {
        Some(base_url) => OpenAiBackend::with_base_url(&config.api_key, base_url),
        None => OpenAiBackend::new(&config.api_key),
    }
    .context("failed to initialize the assistant backend")?;

    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(ShufflePicksTool));

    let (mut session, mut render_rx) =
        ConversationSession::new(Arc::new(backend), tools, config.session_config());
    info!(assistant = %config.assistant_id, "session ready");

    // Print sealed entries (and live logs, when enabled) as they arrive.
    // Intermediate snapshot updates are dropped: a plain terminal has no
    // in-place redraw to feed them to.
    tokio::spawn(async move {
        while let Some(event) = render_rx.recv().await {
            match event {
                RenderEvent::MessageSealed { text } => println!("\nassistant:\n{text}\n"),
                RenderEvent::LogChunk { text } => print!("{text}"),
                _ => {}
            }
        }
    });

    println!("{}", config.title);
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = if let Some(command) = line.strip_prefix('/') {
            match command {
                "quit" => break,
                "help" => {
                    print_help();
                    continue;
                }
                "reset" => session.reset().await,
                other => match Preset::from_command(other) {
                    Some(preset) => session.submit_preset(preset).await,
                    None => {
                        println!("unknown command: /{other}");
                        continue;
                    }
                },
            }
        } else {
            session.submit(line).await
        };

        if let Err(err) = result {
            eprintln!("turn failed: {err}");
        }
    }

    Ok(())
}

fn print_help() {
    println!("Ask a question, or use a starter:");
    for preset in Preset::ALL {
        println!("  /{:<8} {}", preset.command(), preset.label());
    }
    println!("  /reset    start over");
    println!("  /quit     exit");
}
