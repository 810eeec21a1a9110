//! chat_core - Core types and configuration for the chat client
//!
//! This crate provides the foundational types used across all chat-related crates:
//! - `message` - ChatMessage, Role and Citation
//! - `config` - layered client configuration (file + environment)
//! - `paths` - application directory helpers

pub mod config;
pub mod message;
pub mod paths;

// Re-export commonly used types
pub use config::{Config, ProxyAuth};
pub use message::{ChatMessage, Citation, Role};
