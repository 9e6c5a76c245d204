//! Conversation state for the wellbeing chat.
//!
//! Owns the mood, the ordered turn log and the chat state machine:
//! - NoMood -> MoodSelected (mood picked, welcome turn added)
//! - MoodSelected -> Submitting (user turn appended, request sent)
//! - Submitting -> MoodSelected (reply appended, or failure recorded)
//! - any -> NoMood (reset)
//! - any -> MoodSelected (new mood picked: fresh conversation)

use std::sync::Arc;

use reflectify_core::{Mood, Turn};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{EngineError, ErrorKind};
use crate::prompt::welcome_message;

// =============================================================================
// Conversation
// =============================================================================

/// Turns and mood of one conversation, identified by a fresh id.
#[derive(Debug, Clone)]
pub struct Conversation {
    id: Uuid,
    mood: Mood,
    turns: Arc<Vec<Turn>>,
}

impl Conversation {
    /// Start a conversation opened by the welcome turn for `mood`.
    pub fn start(mood: Mood) -> Self {
        Self {
            id: Uuid::new_v4(),
            mood,
            turns: Arc::new(vec![Turn::assistant(welcome_message(mood))]),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Shared handle to the current turn log.
    pub fn history(&self) -> Arc<Vec<Turn>> {
        Arc::clone(&self.turns)
    }

    /// Append a turn. Snapshots taken earlier keep their own copy.
    fn push(&mut self, turn: Turn) {
        Arc::make_mut(&mut self.turns).push(turn);
    }
}

// =============================================================================
// State
// =============================================================================

#[derive(Debug)]
enum ChatSession {
    NoMood,
    Ready(Conversation),
    Submitting(Conversation),
}

/// Chat state as seen by front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "mood", rename_all = "snake_case")]
pub enum ChatState {
    NoMood,
    MoodSelected(Mood),
    Submitting(Mood),
}

impl ChatState {
    pub fn mood(&self) -> Mood {
        match self {
            ChatState::NoMood => Mood::Unset,
            ChatState::MoodSelected(mood) | ChatState::Submitting(mood) => *mood,
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, ChatState::Submitting(_))
    }
}

/// A chat turn in flight.
///
/// Carries the conversation it belongs to and the history as it was before
/// the new user message, which is what the prompt is built from.
#[must_use = "a chat ticket must be settled with complete_turn()"]
#[derive(Debug, Clone)]
pub struct ChatTicket {
    conversation_id: Uuid,
    mood: Mood,
    history: Arc<Vec<Turn>>,
    text: String,
}

impl ChatTicket {
    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Read-only copy of the chat state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationView {
    pub conversation_id: Option<Uuid>,
    pub state: ChatState,
    pub turns: Arc<Vec<Turn>>,
    pub last_error: Option<ErrorKind>,
}

impl ConversationView {
    pub fn mood(&self) -> Mood {
        self.state.mood()
    }

    pub fn is_submitting(&self) -> bool {
        self.state.is_submitting()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

// =============================================================================
// ConversationStore
// =============================================================================

/// In-memory owner of the current conversation.
#[derive(Debug)]
pub struct ConversationStore {
    session: ChatSession,
    last_error: Option<ErrorKind>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            session: ChatSession::NoMood,
            last_error: None,
        }
    }

    pub fn state(&self) -> ChatState {
        match &self.session {
            ChatSession::NoMood => ChatState::NoMood,
            ChatSession::Ready(c) => ChatState::MoodSelected(c.mood()),
            ChatSession::Submitting(c) => ChatState::Submitting(c.mood()),
        }
    }

    /// Replace whatever conversation exists with a fresh one for `mood`.
    ///
    /// A turn in flight for the old conversation will be discarded when it
    /// settles.
    pub fn select_mood(&mut self, mood: Mood) -> Result<(), EngineError> {
        if !mood.is_set() {
            return Err(EngineError::UnsetMood);
        }
        let conversation = Conversation::start(mood);
        tracing::debug!(
            conversation_id = %conversation.id(),
            mood = %mood,
            "Chat state: {:?} -> MoodSelected",
            self.state()
        );
        self.last_error = None;
        self.session = ChatSession::Ready(conversation);
        Ok(())
    }

    /// Append the user's turn and hand out a ticket for the request.
    ///
    /// `text` must already be trimmed and non-empty.
    pub fn begin_turn(&mut self, text: &str) -> Result<ChatTicket, EngineError> {
        let session = std::mem::replace(&mut self.session, ChatSession::NoMood);
        let mut conversation = match session {
            ChatSession::Ready(conversation) => conversation,
            other => {
                let err = match &other {
                    ChatSession::NoMood => EngineError::NoMood,
                    _ => EngineError::Busy,
                };
                self.session = other;
                return Err(err);
            }
        };

        let ticket = ChatTicket {
            conversation_id: conversation.id(),
            mood: conversation.mood(),
            history: conversation.history(),
            text: text.to_string(),
        };
        conversation.push(Turn::user(text));
        tracing::debug!(
            conversation_id = %conversation.id(),
            turns = conversation.turns().len(),
            "Chat state: MoodSelected -> Submitting"
        );
        self.session = ChatSession::Submitting(conversation);
        Ok(ticket)
    }

    /// Settle a turn started with [`begin_turn`](Self::begin_turn).
    ///
    /// On success the assistant turn is appended and returned. On failure
    /// the user turn stays, no assistant turn is added and the error is
    /// recorded and returned. A ticket for a conversation that has since
    /// been reset or replaced yields `Superseded` and changes nothing.
    pub fn complete_turn(
        &mut self,
        ticket: ChatTicket,
        outcome: Result<String, EngineError>,
    ) -> Result<Turn, EngineError> {
        let mut conversation = match std::mem::replace(&mut self.session, ChatSession::NoMood) {
            ChatSession::Submitting(c) if c.id() == ticket.conversation_id => c,
            other => {
                self.session = other;
                tracing::debug!(
                    conversation_id = %ticket.conversation_id,
                    "Discarding chat reply for a replaced conversation"
                );
                return Err(EngineError::Superseded);
            }
        };

        let result = match outcome {
            Ok(reply) => {
                let turn = Turn::assistant(reply);
                conversation.push(turn.clone());
                self.last_error = None;
                Ok(turn)
            }
            Err(err) => {
                self.last_error = err.kind();
                Err(err)
            }
        };
        tracing::debug!(
            conversation_id = %conversation.id(),
            turns = conversation.turns().len(),
            ok = result.is_ok(),
            "Chat state: Submitting -> MoodSelected"
        );
        self.session = ChatSession::Ready(conversation);
        result
    }

    /// Discard the conversation and return to `NoMood`.
    pub fn reset(&mut self) {
        tracing::debug!("Chat state: {:?} -> NoMood", self.state());
        self.session = ChatSession::NoMood;
        self.last_error = None;
    }

    pub fn view(&self) -> ConversationView {
        let (conversation_id, turns) = match &self.session {
            ChatSession::NoMood => (None, Arc::new(Vec::new())),
            ChatSession::Ready(c) | ChatSession::Submitting(c) => (Some(c.id()), c.history()),
        };
        ConversationView {
            conversation_id,
            state: self.state(),
            turns,
            last_error: self.last_error,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
