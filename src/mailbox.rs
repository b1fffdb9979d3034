use std::collections::HashSet;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use imap::Session;
use native_tls::{TlsConnector, TlsStream};

use crate::config::{AuthConfig, ImapConfig};
use crate::error::{ConnectError, ProtocolError, SelectError};
use crate::message::{FetchedMessage, MessageSummary};

/// Where a mailbox session currently stands. Operations that need a later
/// state fail with a state error instead of connecting on their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Authenticated,
    Selected(String),
}

/// One authenticated, stateful connection to the mailbox store over
/// implicit TLS. Owns its transport exclusively; not safe to share across
/// threads without external serialization.
pub struct MailboxSession {
    host: String,
    port: u16,
    user: String,
    password: String,
    timeout: Option<Duration>,
    session: Option<Session<TlsStream<TcpStream>>>,
    state: SessionState,
}

impl MailboxSession {
    pub fn new(imap: &ImapConfig, auth: &AuthConfig, timeout: Option<Duration>) -> Self {
        Self {
            host: imap.host.clone(),
            port: imap.port,
            user: auth.user.clone(),
            password: auth.password.clone(),
            timeout,
            session: None,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn selected_folder(&self) -> Option<&str> {
        match &self.state {
            SessionState::Selected(folder) => Some(folder),
            _ => None,
        }
    }

    /// Establishes the encrypted transport with the platform trust store
    /// and authenticates. There is no plaintext fallback for the mailbox
    /// store.
    pub fn connect(&mut self) -> Result<(), ConnectError> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| ConnectError::Transport(e.to_string()))?
            .next()
            .ok_or_else(|| {
                ConnectError::Transport(format!("no address found for {}", self.host))
            })?;

        let tcp = match self.timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        }
        .map_err(|e| ConnectError::Transport(e.to_string()))?;
        // Timeout expiry on an established stream surfaces as an I/O error
        // on the operation, the same channel as any other transport fault.
        tcp.set_read_timeout(self.timeout)
            .map_err(|e| ConnectError::Transport(e.to_string()))?;
        tcp.set_write_timeout(self.timeout)
            .map_err(|e| ConnectError::Transport(e.to_string()))?;

        let tls = TlsConnector::builder()
            .build()
            .map_err(|e| ConnectError::Transport(e.to_string()))?;
        let stream = tls
            .connect(&self.host, tcp)
            .map_err(|e| ConnectError::Transport(e.to_string()))?;

        let mut client = imap::Client::new(stream);
        client
            .read_greeting()
            .map_err(|e| ConnectError::Transport(e.to_string()))?;
        let session = client
            .login(&self.user, &self.password)
            .map_err(|(e, _)| ConnectError::Auth(e.to_string()))?;

        log::info!(
            "mailbox session authenticated as {} on {}:{}",
            self.user,
            self.host,
            self.port
        );
        self.session = Some(session);
        self.state = SessionState::Authenticated;
        Ok(())
    }

    /// Lists all folder names: deduplicated case-insensitively, sorted
    /// case-insensitively, original casing preserved. Malformed listing
    /// lines are skipped, never fatal.
    pub fn list_folders(&mut self) -> Result<Vec<String>, ProtocolError> {
        let session = self.session_mut()?;
        let response = session
            .run_command_and_read_response("LIST \"\" \"*\"")
            .map_err(|e| ProtocolError::Imap(e.to_string()))?;
        Ok(folder_names_from_response(&String::from_utf8_lossy(
            &response,
        )))
    }

    /// Selects `folder` read-write. On failure the tracked state keeps its
    /// previous value.
    pub fn select_folder(&mut self, folder: &str) -> Result<(), SelectError> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| SelectError::new(folder, "session is not connected"))?;
        session
            .select(folder)
            .map_err(|e| SelectError::new(folder, e))?;
        log::debug!("selected folder '{}'", folder);
        self.state = SessionState::Selected(folder.to_string());
        Ok(())
    }

    /// All message UIDs in the selected folder, in server order. An empty
    /// folder is an empty list, not an error.
    pub fn search_all(&mut self) -> Result<Vec<u32>, ProtocolError> {
        self.require_selected()?;
        let response = self
            .session_mut()?
            .run_command_and_read_response("UID SEARCH ALL")
            .map_err(|e| ProtocolError::Imap(e.to_string()))?;
        Ok(parse_search_response(&String::from_utf8_lossy(&response)))
    }

    /// Fetches only the From/Subject/Date headers of one message. Fields
    /// the server omits come back as empty strings.
    pub fn fetch_summary(&mut self, uid: u32) -> Result<MessageSummary, ProtocolError> {
        self.require_selected()?;
        let fetches = self
            .session_mut()?
            .uid_fetch(
                uid.to_string(),
                "(UID BODY.PEEK[HEADER.FIELDS (FROM SUBJECT DATE)])",
            )
            .map_err(|e| ProtocolError::Imap(e.to_string()))?;
        Ok(fetches
            .iter()
            .find_map(|fetch| fetch.header())
            .map(MessageSummary::from_header_bytes)
            .unwrap_or_default())
    }

    /// Fetches and parses the complete message.
    pub fn fetch_full(&mut self, uid: u32) -> Result<FetchedMessage, ProtocolError> {
        self.require_selected()?;
        let fetches = self
            .session_mut()?
            .uid_fetch(uid.to_string(), "RFC822")
            .map_err(|e| ProtocolError::Imap(e.to_string()))?;
        let raw = fetches
            .iter()
            .find_map(|fetch| fetch.body())
            .ok_or(ProtocolError::NotFound(uid))?;
        FetchedMessage::parse(raw)
            .ok_or_else(|| ProtocolError::Imap(format!("message {} is not parseable", uid)))
    }

    /// Stores a raw message into `folder` without selecting it. Used for
    /// archiving sent copies; callers treat failures as non-fatal.
    pub fn append(&mut self, folder: &str, raw: &[u8]) -> Result<(), ProtocolError> {
        self.session_mut()?
            .append(folder, raw)
            .map_err(|e| ProtocolError::Imap(e.to_string()))
    }

    /// Best-effort sign-off. The connection is released regardless; a
    /// failed LOGOUT is handed back for the caller to log, not to act on.
    pub fn close(&mut self) -> Option<ProtocolError> {
        self.state = SessionState::Disconnected;
        let mut session = self.session.take()?;
        session
            .logout()
            .err()
            .map(|e| ProtocolError::Imap(e.to_string()))
    }

    fn session_mut(
        &mut self,
    ) -> Result<&mut Session<TlsStream<TcpStream>>, ProtocolError> {
        self.session.as_mut().ok_or(ProtocolError::NotConnected)
    }

    fn require_selected(&self) -> Result<(), ProtocolError> {
        match self.state {
            SessionState::Selected(_) => Ok(()),
            SessionState::Authenticated => Err(ProtocolError::NoFolderSelected),
            SessionState::Disconnected => Err(ProtocolError::NotConnected),
        }
    }
}

/// Extracts the folder name from one LIST reply line.
///
/// The listing grammar quotes the hierarchy delimiter and usually the
/// name: `* LIST (\HasNoChildren) "/" "INBOX.Trash"`. The name is the
/// final quoted token when the line ends quoted, otherwise the last bare
/// token. Delimiter-only sentinel entries and anything unrecognizable are
/// dropped.
fn parse_list_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let body = match trimmed.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("* LIST") => trimmed[6..].trim_end(),
        _ => return None,
    };

    let name = if body.ends_with('"') {
        quoted_tokens(body)
            .into_iter()
            .filter(|token| !token.is_empty())
            .last()?
            .to_string()
    } else {
        body.split_whitespace().last()?.trim_matches('"').to_string()
    };

    if name.is_empty() || name == "." || name == "/" {
        return None;
    }
    Some(name)
}

fn quoted_tokens(s: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = s;
    while let Some(start) = rest.find('"') {
        let after = &rest[start + 1..];
        match after.find('"') {
            Some(end) => {
                tokens.push(&after[..end]);
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    tokens
}

fn folder_names_from_response(response: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names: Vec<String> = Vec::new();
    for line in response.lines() {
        if let Some(name) = parse_list_line(line) {
            if seen.insert(name.to_lowercase()) {
                names.push(name);
            }
        }
    }
    names.sort_by_key(|name| name.to_lowercase());
    names
}

/// Collects UIDs from `* SEARCH` reply lines, preserving server order.
fn parse_search_response(response: &str) -> Vec<u32> {
    let mut uids = Vec::new();
    for line in response.lines() {
        let trimmed = line.trim();
        match trimmed.get(..8) {
            Some(prefix) if prefix.eq_ignore_ascii_case("* SEARCH") => {}
            _ => continue,
        }
        uids.extend(
            trimmed[8..]
                .split_whitespace()
                .filter_map(|token| token.parse::<u32>().ok()),
        );
    }
    uids
}
