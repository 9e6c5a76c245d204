//! Error types for the interaction engine.

use std::fmt;

use reflectify_client::ClientError;
use serde::Serialize;

/// Errors from the interaction engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("input cannot be empty")]
    EmptyInput,
    #[error("a request for this task is already in flight")]
    Busy,
    #[error("select a mood before chatting")]
    NoMood,
    #[error("mood `unset` cannot be selected")]
    UnsetMood,
    #[error("result discarded: the task was reset while the request was in flight")]
    Superseded,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("service error: {0}")]
    Service(String),
    #[error("service returned an empty reply")]
    EmptyReply,
    #[error("could not extract analysis: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("analysis failed validation: {0}")]
    Schema(#[from] SchemaError),
    #[error("state lock poisoned: {0}")]
    StateLock(String),
}

impl From<ClientError> for EngineError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Transport(msg) => EngineError::Transport(msg),
            ClientError::Status { status, .. } => {
                EngineError::Transport(format!("HTTP status {}", status))
            }
            ClientError::Service(msg) => EngineError::Service(msg),
        }
    }
}

impl EngineError {
    /// Failure kind recorded on a task, for errors that settle a request.
    ///
    /// Local conditions (`Busy`, `NoMood`, ...) never change task state and
    /// return `None`.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            EngineError::EmptyInput => Some(ErrorKind::EmptyInput),
            EngineError::Transport(_) => Some(ErrorKind::Transport),
            EngineError::Service(_) => Some(ErrorKind::Service),
            EngineError::EmptyReply => Some(ErrorKind::EmptyReply),
            EngineError::Extraction(_) => Some(ErrorKind::Extraction),
            EngineError::Schema(_) => Some(ErrorKind::Schema),
            EngineError::Busy
            | EngineError::NoMood
            | EngineError::UnsetMood
            | EngineError::Superseded
            | EngineError::StateLock(_) => None,
        }
    }

    /// Short message for the person using the app. Never includes payloads.
    pub fn notice(&self) -> UserNotice {
        match self.kind() {
            Some(kind) => kind.notice(),
            None => match self {
                EngineError::Busy => UserNotice {
                    title: "Still working",
                    description: "Please wait for the current response to finish.",
                },
                EngineError::NoMood | EngineError::UnsetMood => UserNotice {
                    title: "Choose a mood",
                    description: "Pick how you are feeling to start the conversation.",
                },
                EngineError::Superseded => UserNotice {
                    title: "Request discarded",
                    description: "This was cleared or restarted before the response arrived.",
                },
                _ => UserNotice {
                    title: "Internal error",
                    description: "Reflectify hit an unexpected problem. Please restart it.",
                },
            },
        }
    }
}

/// Why a task request failed, as recorded in the task's `Failed` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyInput,
    Transport,
    Service,
    EmptyReply,
    Extraction,
    Schema,
}

impl ErrorKind {
    /// The service could not be reached or refused the request.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ErrorKind::Transport | ErrorKind::Service)
    }

    /// The service answered, but in a shape we could not use.
    pub fn is_unusable_reply(&self) -> bool {
        matches!(
            self,
            ErrorKind::EmptyReply | ErrorKind::Extraction | ErrorKind::Schema
        )
    }

    pub fn notice(&self) -> UserNotice {
        match self {
            ErrorKind::EmptyInput => UserNotice {
                title: "Empty content",
                description: "Please enter some content first.",
            },
            ErrorKind::Transport | ErrorKind::Service => UserNotice {
                title: "Failed to get a response",
                description: "Please try again or check your connection.",
            },
            ErrorKind::EmptyReply | ErrorKind::Extraction | ErrorKind::Schema => UserNotice {
                title: "Parse error",
                description: "Could not interpret the AI response.",
            },
        }
    }
}

/// Title and body of a user-facing failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserNotice {
    pub title: &'static str,
    pub description: &'static str,
}

impl fmt::Display for UserNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

// =============================================================================
// Extraction
// =============================================================================

/// Why no analysis object could be pulled out of a reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("reply contains no JSON object")]
    NoObject,
    #[error("reply contains {count} candidate JSON objects")]
    Ambiguous { count: usize },
    #[error("reply is {len} bytes, scan limit is {limit}")]
    TooLarge { len: usize, limit: usize },
    #[error("object nesting exceeds depth {limit}")]
    TooDeep { limit: usize },
    #[error("embedded object is not valid JSON: {0}")]
    Malformed(String),
}

// =============================================================================
// Schema
// =============================================================================

/// How a field broke the analysis schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaViolation {
    Missing,
    NotANumber,
    OutOfRange(f64),
    NotAString,
    UnknownCategory(String),
}

/// The first field of a candidate analysis that broke the schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("field `{field}` {violation}")]
pub struct SchemaError {
    pub field: &'static str,
    pub violation: SchemaViolation,
}

impl SchemaError {
    pub fn new(field: &'static str, violation: SchemaViolation) -> Self {
        Self { field, violation }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaViolation::Missing => write!(f, "is missing"),
            SchemaViolation::NotANumber => write!(f, "is not a number"),
            SchemaViolation::OutOfRange(v) => write!(f, "is out of range [0, 1]: {}", v),
            SchemaViolation::NotAString => write!(f, "is not a string"),
            SchemaViolation::UnknownCategory(v) => {
                write!(f, "has unknown category `{}` (expected safe, caution or toxic)", v)
            }
        }
    }
}
