use log::{ info, warn };
use std::error::Error;
use std::path::PathBuf;
use tokio::io::{ AsyncBufReadExt, AsyncWriteExt, BufReader };

use crate::cli::Args;
use crate::input::{ select_input, TextInput };
use crate::server::state::AppState;
use crate::session::ChatSession;

const EXIT_WORDS: [&str; 2] = ["exit", "quit"];

/// Terminal front end: one conversation per run, typed lines from stdin, and
/// optionally one audio file transcribed as the opening message.
pub async fn run_console(state: AppState, args: &Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let client = state.chat_client
        .clone()
        .ok_or_else(|| format!("Missing {} environment variable", state.chat_credential))?;
    let mut session = ChatSession::new(client, state.prompts.clone());
    let mut stdout = tokio::io::stdout();

    if let Some(audio) = &args.audio {
        if state.transcriber.is_none() {
            warn!("Missing {} environment variable; ignoring --audio", state.transcription_credential);
        }
        if let Some(input) = select_input(None, Some(PathBuf::from(audio)), state.transcriber.clone()) {
            match input.obtain_text().await {
                Ok(Some(text)) => {
                    stdout.write_all(format!("🎤 {}\n", text).as_bytes()).await?;
                    exchange(&mut session, input.as_ref(), &text, &mut stdout).await?;
                }
                Ok(None) => warn!("Transcription of {} was empty", audio),
                Err(e) => warn!("Could not use {}: {}", audio, e),
            }
        }
    }

    info!("Console session started; type a transaction, or 'exit' to quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all("> ".as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if EXIT_WORDS.contains(&line.trim().to_lowercase().as_str()) {
            break;
        }

        let input = match select_input(Some(line), None, None) {
            Some(input) => input,
            None => continue,
        };
        if let Some(text) = input.obtain_text().await? {
            exchange(&mut session, input.as_ref(), &text, &mut stdout).await?;
        }
    }

    if session.conversation().is_empty() {
        info!("Console session ended without any exchange");
    } else {
        info!("Console session ended after {} messages", session.conversation().len());
    }
    Ok(())
}

async fn exchange(
    session: &mut ChatSession,
    source: &dyn TextInput,
    text: &str,
    stdout: &mut tokio::io::Stdout,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("Sending {} input ({} chars)", source.describe(), text.chars().count());
    match session.send(text, |_| {}).await {
        Ok(view) => stdout.write_all(format!("{}\n", view).as_bytes()).await?,
        Err(e) => {
            warn!("Completion failed: {}", e);
            stdout.write_all(format!("⚠ {}\n", e).as_bytes()).await?;
        }
    }
    Ok(())
}
