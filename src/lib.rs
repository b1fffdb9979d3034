pub mod compose;
pub mod config;
pub mod decode;
pub mod error;
pub mod mailbox;
pub mod message;
pub mod submit;

// Re-export commonly used types
pub use config::Config;
pub use error::{ArchivalWarning, ConnectError, ProtocolError, SelectError, SendError};
pub use mailbox::{MailboxSession, SessionState};
pub use message::{FetchedMessage, MessageSummary, OutgoingMessage};
pub use submit::SubmissionSession;
