//! Interactive chat against a local llama.cpp server.
//!
//! Start `llama-server` with the model first, then:
//!
//! ```text
//! PARLEY_MODEL_PATH=./Meta-Llama-3-8B-Instruct.Q2_K.gguf cargo run --example chat
//! ```
//!
//! Each reply streams to the terminal as it is generated. Replies are kept as
//! history, trimmed to the most recent words so the context window holds.

use futures::StreamExt;
use parley::prelude::*;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;

const HISTORY_WORDS: usize = 400;

fn runtime_from_env() -> parley::Result<LlamaServerRuntime> {
    let mut builder = LlamaServerRuntime::builder();
    if let Ok(path) = std::env::var("PARLEY_MODEL_PATH") {
        builder = builder.model_path(path);
    }
    if let Ok(base) = std::env::var("PARLEY_API_BASE") {
        builder = builder.api_base(base);
    }
    builder.build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let gateway = CompletionGateway::builder(runtime_from_env()?)
        .layer(QueueLayer::new())
        .layer(LoggingLayer::new())
        .finish();

    let system = std::env::var("PARLEY_SYSTEM").ok();
    let mut history: Vec<Turn> = Vec::new();
    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());

    print!("> ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next().await {
        let line = line?;
        if line.trim().is_empty() {
            print!("> ");
            std::io::stdout().flush()?;
            continue;
        }

        let mut request = ChatRequest::new(line.clone())
            .with_history(history.clone())
            .with_history_word_budget(HISTORY_WORDS);
        if let Some(system) = &system {
            request = request.with_system(system.clone());
        }

        let events = gateway.chat(request)?.inspect(|event| {
            print!("{}", event.render());
            let _ = std::io::stdout().flush();
        });
        let reply = collect_text(events).await;

        history.push(Turn::user(line));
        if !reply.trim().is_empty() {
            history.push(Turn::assistant(reply));
        }

        print!("\n> ");
        std::io::stdout().flush()?;
    }

    Ok(())
}
