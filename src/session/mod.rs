use futures::StreamExt;
use log::debug;
use std::sync::Arc;

use crate::config::prompt::PromptConfig;
use crate::llm::chat::{ BoxError, ChatClient };
use crate::models::chat::{ ChatMessage, Conversation };
use crate::presentation::{ render, MessageView };

/// Follows one assistant message from its first streamed byte to completion.
///
/// The view is recomputed from the whole accumulated text on every chunk, so
/// a failed parse of an earlier prefix leaves nothing behind.
#[derive(Debug, Clone)]
pub struct ReplyTracker {
    text: String,
    view: MessageView,
    finished: bool,
}

impl Default for ReplyTracker {
    fn default() -> Self {
        Self {
            text: String::new(),
            view: MessageView::Pending,
            finished: false,
        }
    }
}

impl ReplyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) -> &MessageView {
        if !self.finished {
            self.text.push_str(chunk);
            self.view = render(&self.text, false);
        }
        &self.view
    }

    pub fn finish(&mut self) -> &MessageView {
        if !self.finished {
            self.finished = true;
            self.view = render(&self.text, true);
        }
        &self.view
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

pub struct ChatSession {
    client: Arc<dyn ChatClient>,
    prompts: Arc<PromptConfig>,
    conversation: Conversation,
}

impl ChatSession {
    pub fn new(client: Arc<dyn ChatClient>, prompts: Arc<PromptConfig>) -> Self {
        Self {
            client,
            prompts,
            conversation: Conversation::new(),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Sends one user turn and streams the reply, calling `on_update` with the
    /// current view after every chunk. Both turns are recorded together once
    /// the stream completes, so a failed exchange leaves no unanswered user turn.
    pub async fn send<F>(&mut self, text: &str, mut on_update: F) -> Result<MessageView, BoxError>
    where
        F: FnMut(&MessageView),
    {
        let user = ChatMessage::user(text);
        let mut history = self.conversation.messages().to_vec();
        history.push(user.clone());
        let messages = self.prompts.with_history(&history);

        let mut stream = self.client.stream_completion(&messages).await?;
        let mut tracker = ReplyTracker::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            debug!("received {} bytes of reply", chunk.len());
            on_update(tracker.push(&chunk));
        }

        let view = tracker.finish().clone();
        self.conversation.push(user);
        self.conversation.push(ChatMessage::assistant(tracker.text()));
        Ok(view)
    }
}
