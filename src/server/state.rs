use log::{ info, warn };
use std::sync::Arc;

use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig };
use crate::llm::chat::{ BoxError, ChatClient, new_client as new_chat_client };
use crate::llm::transcription::{ TranscriptionClient, WhisperClient };
use crate::llm::{ LlmConfig, LlmType };

const TRANSCRIPTION_CREDENTIAL: &str = "OPENAI_API_KEY";

/// Immutable per-process state. A provider without a credential is `None`
/// and every request that needs it fails with a configuration error.
#[derive(Clone)]
pub struct AppState {
    pub chat_client: Option<Arc<dyn ChatClient>>,
    pub chat_credential: &'static str,
    pub transcriber: Option<Arc<dyn TranscriptionClient>>,
    pub transcription_credential: &'static str,
    pub prompts: Arc<PromptConfig>,
    pub stream_responses: bool,
}

impl AppState {
    pub fn from_args(args: &Args) -> Result<Self, BoxError> {
        let llm_type: LlmType = args.chat_llm_type.parse()?;
        let chat_key = match llm_type {
            LlmType::Gemini => args.google_key(),
            LlmType::OpenAI => args.openai_key(),
        };

        let chat_client = match chat_key {
            Some(api_key) => {
                let config = LlmConfig {
                    llm_type,
                    api_key: Some(api_key),
                    completion_model: args.chat_model.clone(),
                    base_url: args.chat_base_url.clone(),
                };
                let client = new_chat_client(&config)?;
                info!("Chat provider {} ready (model {})", llm_type, client.get_model());
                Some(client)
            }
            None => {
                warn!("{} is not set; /api/chat will answer 500", llm_type.credential_env());
                None
            }
        };

        let transcriber: Option<Arc<dyn TranscriptionClient>> = match args.openai_key() {
            Some(api_key) => Some(Arc::new(WhisperClient::new(
                api_key,
                args.transcription_base_url.clone(),
                Some(args.transcription_model.clone()),
                Some(args.transcription_language.clone()),
            ))),
            None => {
                warn!("{} is not set; /api/whisper will answer 500", TRANSCRIPTION_CREDENTIAL);
                None
            }
        };

        Ok(Self {
            chat_client,
            chat_credential: llm_type.credential_env(),
            transcriber,
            transcription_credential: TRANSCRIPTION_CREDENTIAL,
            prompts: prompt::resolve_prompts(args.prompts_path.as_deref())?,
            stream_responses: args.stream_responses,
        })
    }
}
