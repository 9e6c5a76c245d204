pub mod config;
pub mod error;
pub mod types;

pub use config::ReflectifyConfig;
pub use error::{ReflectifyError, Result};
pub use types::*;
