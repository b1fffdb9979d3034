use std::fmt;

use thiserror::Error;

/// Failures while establishing a session, before any operation ran.
/// Fatal to the session; retrying is the caller's business.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("no usable connection strategy configured")]
    NoStrategyAvailable,
}

/// A folder could not be selected. The session keeps its previous state.
#[derive(Error, Debug)]
#[error("cannot select folder '{folder}': {reason}")]
pub struct SelectError {
    pub folder: String,
    pub reason: String,
}

impl SelectError {
    pub fn new(folder: &str, reason: impl fmt::Display) -> Self {
        Self {
            folder: folder.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A single operation failed against an otherwise healthy session.
/// The session stays usable; the caller may retry or move on.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("session is not connected")]
    NotConnected,

    #[error("no folder is selected")]
    NoFolderSelected,

    #[error("no message with UID {0} in the selected folder")]
    NotFound(u32),

    #[error("IMAP error: {0}")]
    Imap(String),
}

/// The submission server rejected a message.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("session is not connected")]
    NotConnected,

    #[error("authentication expired: {0}")]
    AuthExpired(String),

    #[error("submission rejected: {0}")]
    Rejected(String),

    #[error("invalid outgoing message: {0}")]
    InvalidMessage(String),
}

/// Non-fatal: the message was sent but the copy could not be archived.
#[derive(Debug, Clone)]
pub struct ArchivalWarning {
    pub folder: String,
    pub reason: String,
}

impl fmt::Display for ArchivalWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sent copy could not be stored in '{}': {}",
            self.folder, self.reason
        )
    }
}
