//! Message module - chat message types
//!
//! Shared message types used across the system.

mod content;

pub use content::{ChatMessage, Citation, Role};
