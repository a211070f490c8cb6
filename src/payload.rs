use log::debug;

use crate::error::ChatError;
use crate::history::ConversationStore;
use crate::image::ImageUpload;
use crate::models::chat::{ Message, Role };

pub const DEFAULT_HISTORY_WINDOW: usize = 4;

/// Messages for one request: the system prompt followed by recent history.
#[derive(Clone, Debug, PartialEq)]
pub struct Payload {
    messages: Vec<Message>,
}

impl Payload {
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

#[derive(Clone, Debug)]
pub struct PayloadBuilder {
    system_prompt: String,
    history_window: usize,
}

impl PayloadBuilder {
    pub fn new(system_prompt: impl Into<String>, history_window: usize) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            history_window,
        }
    }

    /// Builds the request for the turn whose user message was just pushed onto `store`.
    ///
    /// With an image, that message is first replaced in the store by its text + image form,
    /// so later turns see the same history that was sent.
    pub fn build(
        &self,
        store: &mut ConversationStore,
        latest_user_text: &str,
        image: Option<&ImageUpload>
    ) -> Result<Payload, ChatError> {
        if let Some(image) = image {
            match store.latest() {
                Some(latest) if latest.role == Role::User => {}
                _ => {
                    return Err(
                        ChatError::InvalidState(
                            "an image can only be attached to a pending user message".to_string()
                        )
                    );
                }
            }
            debug!("Attaching {} ({} bytes) to the latest user message", image.filename(), image.size());
            store.replace_latest(Message::user_with_image(latest_user_text, image.data_uri()))?;
        }

        let mut messages = Vec::with_capacity(self.history_window + 1);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend(store.recent(self.history_window).iter().cloned());
        Ok(Payload { messages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::MessageContent;

    fn builder() -> PayloadBuilder {
        PayloadBuilder::new("persona", DEFAULT_HISTORY_WINDOW)
    }

    fn count_system(payload: &Payload) -> usize {
        payload.messages().iter().filter(|m| m.role == Role::System).count()
    }

    #[test]
    fn single_message_gives_system_plus_one() {
        let mut store = ConversationStore::new();
        store.push_user("printer jammed");
        let payload = builder().build(&mut store, "printer jammed", None).unwrap();
        assert_eq!(payload.messages().len(), 2);
        assert_eq!(payload.messages()[0], Message::system("persona"));
        assert_eq!(payload.messages()[1], Message::user("printer jammed"));
    }

    #[test]
    fn long_history_is_capped_at_window() {
        let mut store = ConversationStore::new();
        for i in 0..5 {
            store.push_user(format!("q{}", i));
            store.push_assistant(format!("a{}", i));
        }
        store.push_user("latest");
        let payload = builder().build(&mut store, "latest", None).unwrap();
        assert_eq!(payload.messages().len(), DEFAULT_HISTORY_WINDOW + 1);
        assert_eq!(count_system(&payload), 1);
        assert_eq!(payload.messages()[0].role, Role::System);
        assert_eq!(payload.messages()[1], Message::assistant("a3"));
        assert_eq!(payload.messages()[4], Message::user("latest"));
    }

    #[test]
    fn system_prompt_is_not_stored() {
        let mut store = ConversationStore::new();
        store.push_user("hello");
        builder().build(&mut store, "hello", None).unwrap();
        builder().build(&mut store, "hello", None).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.messages().iter().all(|m| m.role != Role::System));
    }

    #[test]
    fn image_replaces_latest_user_message_in_store_and_payload() {
        let mut store = ConversationStore::new();
        store.push_user("earlier");
        store.push_assistant("answer");
        store.push_user("what does this mean?");
        let image = ImageUpload::new("error.png", vec![1, 2, 3]).unwrap();

        let payload = builder().build(&mut store, "what does this mean?", Some(&image)).unwrap();

        let expected = Message::user_with_image("what does this mean?", "data:image/jpeg;base64,AQID");
        assert_eq!(store.len(), 3);
        assert_eq!(store.latest(), Some(&expected));
        assert_eq!(payload.messages().last(), Some(&expected));
        assert_eq!(payload.messages()[1], Message::user("earlier"));
        let plain_copies = store
            .messages()
            .iter()
            .filter(|m| m.content == MessageContent::Text("what does this mean?".into()))
            .count();
        assert_eq!(plain_copies, 0);
    }

    #[test]
    fn image_without_pending_user_message_is_rejected() {
        let mut store = ConversationStore::new();
        store.push_user("q");
        store.push_assistant("a");
        let image = ImageUpload::new("error.png", vec![1]).unwrap();
        assert!(builder().build(&mut store, "q", Some(&image)).is_err());
        assert_eq!(store.latest(), Some(&Message::assistant("a")));
    }
}
