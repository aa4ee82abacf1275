pub mod issue;
pub mod realtime;

pub use issue::{DRAFT_ISSUE_ID, Issue, IssueStatus, IssueUpdate};

// Re-export commonly used types for convenience
pub use realtime::{
    DispatchHandle, IssueActions, RealtimeError, RealtimeResult, SessionComponents, SessionState,
    ViewSnapshot, VoiceSession, VoiceSessionConfig,
};
