//! chatrelay - streaming chat backend
//!
//! Relays OpenAI-compatible streaming completions to callers as
//! Server-Sent Events and keeps chat history in SQLite.

pub mod api;
pub mod config;
pub mod error;
pub mod relay;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
