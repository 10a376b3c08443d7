use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Moni: natural-language finance assistant relay", long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (gemini, openai)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "gemini")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., https://generativelanguage.googleapis.com/v1beta)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// Model name for chat completion (e.g., gemini-2.5-flash-preview-05-20, gpt-4o-mini)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Google Generative AI key, used when CHAT_LLM_TYPE is gemini
    #[arg(long, env = "GOOGLE_GENERATIVE_AI_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,

    /// OpenAI key, used for transcription and when CHAT_LLM_TYPE is openai
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Stream completion output to the client instead of returning one JSON body
    #[arg(long, env = "STREAM_RESPONSES", default_value = "true", action = clap::ArgAction::Set)]
    pub stream_responses: bool,

    /// Optional JSON file overriding the built-in system prompt ({"system_prompt": "..."})
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    // --- Transcription Args ---
    /// Base URL for the speech-to-text API
    #[arg(long, env = "TRANSCRIPTION_BASE_URL")]
    pub transcription_base_url: Option<String>,

    /// Speech-to-text model name
    #[arg(long, env = "TRANSCRIPTION_MODEL", default_value = "whisper-1")]
    pub transcription_model: String,

    /// Spoken language passed to the speech-to-text model
    #[arg(long, env = "TRANSCRIPTION_LANGUAGE", default_value = "vi")]
    pub transcription_language: String,

    // --- General App Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    /// Run an interactive terminal session instead of the HTTP server.
    #[arg(long, default_value = "false")]
    pub console: bool,

    /// Audio file to transcribe as the first console message (requires --console).
    #[arg(long, requires = "console")]
    pub audio: Option<String>,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    pub fn google_key(&self) -> Option<String> {
        non_empty(&self.google_api_key)
    }

    pub fn openai_key(&self) -> Option<String> {
        non_empty(&self.openai_api_key)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
