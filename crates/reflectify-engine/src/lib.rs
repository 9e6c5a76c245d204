//! Interaction engine for Reflectify.
//!
//! Builds task prompts, keeps the chat conversation, calls a
//! [`TextGenerator`](reflectify_client::TextGenerator) and turns replies
//! into free text or validated analysis records.

pub mod context;
pub mod error;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod state;
pub mod validator;

pub use context::{ChatState, ChatTicket, Conversation, ConversationStore, ConversationView};
pub use error::{EngineError, ErrorKind, ExtractionError, SchemaError, SchemaViolation, UserNotice};
pub use orchestrator::InteractionEngine;
pub use parser::ResponseExtractor;
pub use state::{InFlight, TaskPhase, TaskSlot, TaskSnapshot};
pub use validator::AnalysisValidator;
