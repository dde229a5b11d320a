//! Short children's story from a one-line prompt.
//!
//! The model is primed with a fixed author persona before it sees the prompt.
//! Pass your own prompt as the first argument.

use parley::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut builder = LlamaServerRuntime::builder();
    if let Ok(path) = std::env::var("PARLEY_MODEL_PATH") {
        builder = builder.model_path(path);
    }

    let gateway = CompletionGateway::builder(builder.build()?)
        .layer(LoggingLayer::new())
        .finish();

    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "A hedgehog who is afraid of the dark".to_string());

    let completion = gateway.story(StoryRequest::new(prompt)).await?;
    if completion.is_failure() {
        eprintln!("{}", completion.text());
        return Ok(());
    }

    match completion.parse_json::<serde_json::Value>() {
        Ok(value) => match value.get("story").and_then(|s| s.as_str()) {
            Some(story) => println!("{}", story),
            None => println!("{}", value),
        },
        Err(_) => println!("{}", completion.text()),
    }

    Ok(())
}
