pub mod cli;
pub mod config;
pub mod console;
pub mod input;
pub mod interpreter;
pub mod llm;
pub mod models;
pub mod presentation;
pub mod server;
pub mod session;

use cli::Args;
use log::info;
use server::state::AppState;
use server::Server;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Mode: {}", if args.console { "console" } else { "server" });
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("(provider default)"));
    info!("Stream Responses: {}", args.stream_responses);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("(built-in)"));
    info!("Transcription Model: {}", args.transcription_model);
    info!("Transcription Language: {}", args.transcription_language);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let state = AppState::from_args(&args)?;

    if args.console {
        return console::run_console(state, &args).await;
    }

    let server = Server::new(state, args);
    server.run().await?;

    Ok(())
}
