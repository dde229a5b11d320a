//! Movie suggestions with a response contract derived from a Rust type.
//!
//! The default suggestion contract asks for a short answer plus three movie
//! names. Here the contract is replaced with one generated by schemars, and
//! the answer is parsed back into the same type.

use parley::prelude::*;
use parley::schemars::{schema_for, JsonSchema};
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
struct Suggestions {
    /// One or two sentences addressed to the user
    general_response: String,
    /// Suggested movies, best match first
    movies: Vec<Movie>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct Movie {
    /// Title as released
    title: String,
    /// Release year
    year: u16,
}

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

    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Something like Alien, but I want to laugh".to_string());

    // Default contract first
    let completion = gateway.suggest(SuggestionRequest::new(query.clone())).await?;
    println!("default contract:\n{}\n", completion.text());

    // Then a derived one
    let schema = ResponseSchema::json_object(serde_json::to_value(schema_for!(Suggestions))?);
    let completion = gateway
        .suggest(SuggestionRequest::new(query).with_schema(schema))
        .await?;

    match completion.parse_json::<Suggestions>() {
        Ok(suggestions) => {
            println!("{}", suggestions.general_response);
            for movie in suggestions.movies {
                println!("  - {} ({})", movie.title, movie.year);
            }
        }
        Err(e) => println!("model did not follow the contract ({}):\n{}", e, completion.text()),
    }

    Ok(())
}
