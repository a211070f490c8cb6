use log::{ error, info };
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ChatError;
use crate::history::ConversationStore;
use crate::image::ImageUpload;
use crate::llm::catalog::ModelCatalog;
use crate::llm::chat::CompletionClient;
use crate::models::chat::TranscriptEntry;
use crate::payload::PayloadBuilder;
use crate::stream::{ assemble, SnapshotSink };

/// Collaborators shared by every session: the completion client, prompt and model catalog.
pub struct ChatService {
    client: Arc<dyn CompletionClient>,
    builder: PayloadBuilder,
    catalog: Arc<ModelCatalog>,
    default_model: String,
}

impl ChatService {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        builder: PayloadBuilder,
        catalog: Arc<ModelCatalog>,
        default_model: impl Into<String>
    ) -> Self {
        Self {
            client,
            builder,
            catalog,
            default_model: default_model.into(),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn catalog(&self) -> &Arc<ModelCatalog> {
        &self.catalog
    }

    pub fn new_session(&self) -> Session {
        Session::new(self.default_model.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Sending,
    Streaming,
    Committed,
    Failed,
}

/// One user's conversation. Never shared between connections.
pub struct Session {
    id: String,
    store: ConversationStore,
    attachment: Option<ImageUpload>,
    model: String,
    state: TurnState,
}

impl Session {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            store: ConversationStore::new(),
            attachment: None,
            model: model.into(),
            state: TurnState::Idle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.store.transcript()
    }

    pub fn attachment(&self) -> Option<&ImageUpload> {
        self.attachment.as_ref()
    }

    /// The image stays attached to every following turn until cleared or replaced.
    pub fn attach_image(&mut self, upload: ImageUpload) {
        info!("Session {}: attached {} ({} bytes)", self.id, upload.filename(), upload.size());
        self.attachment = Some(upload);
    }

    pub fn clear_image(&mut self) -> bool {
        self.attachment.take().is_some()
    }

    pub fn select_model(&mut self, model: &str) -> Result<(), ChatError> {
        let model = model.trim();
        if model.is_empty() {
            return Err(ChatError::InvalidState("model id is empty".to_string()));
        }
        info!("Session {}: model switched to {}", self.id, model);
        self.model = model.to_string();
        Ok(())
    }

    /// Runs one turn and returns the committed assistant text.
    ///
    /// On failure the user message stays in the transcript, no assistant message is
    /// recorded and the session remains usable.
    pub async fn submit(
        &mut self,
        service: &ChatService,
        text: &str,
        sink: &mut dyn SnapshotSink
    ) -> Result<String, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        self.state = TurnState::Idle;
        self.store.push_user(text);

        let payload = match service.builder.build(&mut self.store, text, self.attachment.as_ref()) {
            Ok(p) => p,
            Err(e) => {
                self.state = TurnState::Failed;
                return Err(e);
            }
        };

        self.state = TurnState::Sending;
        let fragments = match service.client.stream_chat(&self.model, &payload).await {
            Ok(s) => s,
            Err(e) => {
                error!("Session {}: could not start completion: {}", self.id, e);
                self.state = TurnState::Failed;
                return Err(e);
            }
        };

        self.state = TurnState::Streaming;
        match assemble(fragments, sink).await {
            Ok(answer) => {
                self.store.push_assistant(answer.clone());
                self.state = TurnState::Committed;
                info!(
                    "Session {}: turn committed ({} chars, {} messages stored)",
                    self.id,
                    answer.len(),
                    self.store.len()
                );
                Ok(answer)
            }
            Err(failure) => {
                error!("Session {}: stream failed with model {}: {}", self.id, self.model, failure);
                self.state = TurnState::Failed;
                Err(ChatError::Stream(failure))
            }
        }
    }
}
