//! `voxagent chat`: Interactive or single-message chat mode.

use std::io::Write;
use std::pin::pin;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use voxagent_agent::{AgentService, StreamFrame};
use voxagent_config::AppConfig;

pub async fn run(
    session: String,
    message: Option<String>,
    stream: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let provider = voxagent_providers::build_from_config(&config).map_err(|e| {
        format!(
            "{e}\n  Edit {} or run `voxagent doctor` for details.",
            AppConfig::config_path().display()
        )
    })?;
    let tools = Arc::new(voxagent_tools::default_registry(&config));
    let tool_names = tools.names().join(", ");
    let service = AgentService::from_config(provider, tools, &config);

    if let Some(msg) = message {
        // Single message mode
        return respond(&service, &session, &msg, stream)
            .await
            .map_err(Into::into);
    }

    // Interactive mode
    println!();
    println!("  voxagent - interactive mode");
    println!();
    println!("  Provider:  {}", config.model.provider);
    println!("  Model:     {}", config.model.name);
    println!("  Tools:     {tool_names}");
    println!("  Session:   {session}");
    println!();
    println!("  Commands: clear (or /clear) resets the conversation, /history shows it.");
    println!("  Type 'exit', 'bye' or Ctrl+D to quit. Ctrl+C stops a reply, or quits at the prompt.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        match Input::parse(&line) {
            Input::Empty => continue,
            Input::Exit => break,
            Input::Clear => {
                service.clear(&session).await?;
                println!("  (conversation cleared)");
            }
            Input::History => match service.history(&session).await {
                Ok(history) => {
                    for message in history.iter().skip(1) {
                        println!("  [{}] {}", message.role(), message.content());
                    }
                }
                Err(_) => println!("  (no history yet)"),
            },
            Input::Message(text) => {
                if let Err(e) = respond(&service, &session, text, stream).await {
                    eprintln!("  [Error] {e}");
                }
            }
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

/// One line typed at the interactive prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Exit,
    Clear,
    History,
    Message(&'a str),
}

impl<'a> Input<'a> {
    fn parse(line: &'a str) -> Self {
        let text = line.trim();
        match text.to_lowercase().as_str() {
            "" => Self::Empty,
            "exit" | "quit" | "bye" | "goodbye" => Self::Exit,
            "clear" | "/clear" => Self::Clear,
            "/history" => Self::History,
            _ => Self::Message(text),
        }
    }
}

async fn respond(
    service: &AgentService,
    session: &str,
    text: &str,
    stream: bool,
) -> Result<(), String> {
    if !stream {
        let reply = service.run_turn(session, text).await.map_err(|e| e.to_string())?;
        println!("  Assistant > {reply}");
        return Ok(());
    }

    let mut frames = pin!(service.stream_turn(session, text));
    let mut printed = String::new();
    print!("  Assistant > ");

    loop {
        let frame = tokio::select! {
            frame = frames.next() => frame,
            _ = tokio::signal::ctrl_c() => {
                // Dropping the stream cancels the turn
                println!();
                return Err("interrupted".into());
            }
        };

        match frame {
            Some(StreamFrame::Delta { delta }) => {
                print!("{delta}");
                printed.push_str(&delta);
                let _ = std::io::stdout().flush();
            }
            Some(StreamFrame::Done { full }) => {
                if !printed.ends_with(full.as_str()) {
                    print!("{full}");
                }
                println!();
                return Ok(());
            }
            Some(StreamFrame::Error { message }) => {
                println!();
                return Err(message);
            }
            None => {
                println!();
                return Err("stream ended without a reply".into());
            }
        }
    }
}
