pub mod board;
pub mod config;
pub mod core;
pub mod listen;
pub mod services;

// Re-export commonly used items for convenience
pub use board::IssueBoard;
pub use config::{ConfigError, VoiceConfig};
pub use core::*;
pub use services::{HttpIssueService, InMemoryIssueService, IssueService, IssueServiceError};
