use crate::error::ChatError;
use crate::models::chat::{ Message, Role, TranscriptEntry };

/// Ordered user/assistant transcript for a single session.
///
/// The system prompt never lives here; it is added to each outgoing payload.
/// Messages are only ever appended, except that the newest user message may be
/// swapped for its image-augmented form through [`ConversationStore::replace_latest`].
#[derive(Debug, Default, Clone)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.messages.push(Message::assistant(text));
    }

    /// Replaces the newest entry, which must be a user message, with `message`.
    pub fn replace_latest(&mut self, message: Message) -> Result<(), ChatError> {
        if message.role != Role::User {
            return Err(
                ChatError::InvalidState(
                    format!("latest entry can only be replaced by a user message, got {}", message.role)
                )
            );
        }
        match self.messages.last_mut() {
            Some(latest) if latest.role == Role::User => {
                *latest = message;
                Ok(())
            }
            Some(latest) =>
                Err(
                    ChatError::InvalidState(
                        format!("latest entry is a {} message, expected user", latest.role)
                    )
                ),
            None => Err(ChatError::InvalidState("conversation is empty".to_string())),
        }
    }

    /// The last `k` messages, oldest first.
    pub fn recent(&self, k: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(k);
        &self.messages[start..]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn latest(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.messages.iter().map(TranscriptEntry::from).collect()
    }
}
