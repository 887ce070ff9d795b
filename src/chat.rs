//! Multi-turn chat session over the non-retried transport path.

use crate::{
    client::Client,
    errors::Result,
    types::{ensure_not_blocked, ChatMessage, ChatRole},
    wire::Content,
};

/// A fresh conversation context.
///
/// The session owns the authoritative transcript: every sent message and
/// every model reply is appended in order, and [`ChatSession::transcript`]
/// labels turns by position alone (even index = user, odd = model).
pub struct ChatSession {
    client: Client,
    history: Vec<Content>,
}

impl ChatSession {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            history: Vec::new(),
        }
    }

    /// Send one user message with the accumulated history and return the
    /// model's reply text.
    ///
    /// A failed send leaves the pending user turn out of the transcript, so
    /// the session stays replayable.
    pub async fn send_message(&mut self, text: &str) -> Result<String> {
        let mut contents = self.history.clone();
        contents.push(Content::user(text));

        let response = self.client.generate_once(&contents).await?;
        ensure_not_blocked(&response)?;
        let reply = response.primary_text();

        self.history.push(Content::user(text));
        self.history.push(Content::model(reply.clone()));
        Ok(reply)
    }

    /// Number of turns accumulated so far.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// The session's transcript with roles assigned by position.
    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.history
            .iter()
            .enumerate()
            .map(|(index, turn)| ChatMessage {
                role: if index % 2 == 0 {
                    ChatRole::User
                } else {
                    ChatRole::Model
                },
                content: turn.first_part_text(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeminiConfig;

    fn session_with_turns(turns: &[&str]) -> ChatSession {
        let client =
            Client::with_base_url(GeminiConfig::new("key"), "http://localhost:1").unwrap();
        let mut session = ChatSession::new(client);
        for (index, text) in turns.iter().enumerate() {
            session.history.push(if index % 2 == 0 {
                Content::user(*text)
            } else {
                Content::model(*text)
            });
        }
        session
    }

    #[test]
    fn transcript_alternates_roles_by_position() {
        let session = session_with_turns(&["hi", "hello!", "how are you", "fine"]);
        let transcript = session.transcript();
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[0].role, ChatRole::User);
        assert_eq!(transcript[1].role, ChatRole::Model);
        assert_eq!(transcript[2].role, ChatRole::User);
        assert_eq!(transcript[3].role, ChatRole::Model);
        assert_eq!(transcript[2].content, "how are you");
    }

    #[test]
    fn fresh_session_is_empty() {
        let session = session_with_turns(&[]);
        assert!(session.is_empty());
        assert!(session.transcript().is_empty());
    }
}
