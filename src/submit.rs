use std::time::Duration;

use lettre::message::{Mailbox, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};

use crate::config::{AuthConfig, SmtpConfig};
use crate::error::{ArchivalWarning, ConnectError, SendError};
use crate::mailbox::MailboxSession;
use crate::message::OutgoingMessage;

/// Standard submission port for the opportunistic-upgrade fallback.
const SUBMISSION_PORT: u16 = 587;

/// One authenticated connection to the submission server. The connection
/// strategy is fixed: implicit TLS on the configured port when that is
/// primary, then a plaintext connection on port 587 upgraded via STARTTLS,
/// but only when the configuration allows the fallback.
pub struct SubmissionSession {
    config: SmtpConfig,
    user: String,
    password: String,
    timeout: Option<Duration>,
    transport: Option<SmtpTransport>,
}

impl SubmissionSession {
    pub fn new(smtp: &SmtpConfig, auth: &AuthConfig, timeout: Option<Duration>) -> Self {
        Self {
            config: smtp.clone(),
            user: auth.user.clone(),
            password: auth.password.clone(),
            timeout,
            transport: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Runs the connection strategy in its fixed order; the first
    /// successful attempt wins.
    pub fn connect(&mut self) -> Result<(), ConnectError> {
        let transport = connect_with(
            self.config.ssl,
            self.config.starttls_fallback,
            || self.open_implicit(),
            || self.open_starttls(),
        )?;
        self.transport = Some(transport);
        Ok(())
    }

    /// Transmits a composed message. After a successful transmission an
    /// optional archiver stores a copy into the given folder; a failure
    /// there is returned as a warning, never as an error, because the
    /// send itself already happened.
    pub fn send(
        &mut self,
        message: &OutgoingMessage,
        archive: Option<(&mut MailboxSession, &str)>,
    ) -> Result<Option<ArchivalWarning>, SendError> {
        let transport = self.transport.as_ref().ok_or(SendError::NotConnected)?;
        let wire = build_wire_message(message)?;
        transport.send(&wire).map_err(map_send_error)?;
        log::info!(
            "submission: message accepted for {} recipient(s)",
            message.to.len()
        );

        let warning = match archive {
            Some((mailbox, folder)) => archive_copy(mailbox, folder, &wire.formatted())
                .err()
                .map(|reason| ArchivalWarning {
                    folder: folder.to_string(),
                    reason,
                }),
            None => None,
        };
        if let Some(warning) = &warning {
            log::warn!("{}", warning);
        }
        Ok(warning)
    }

    /// Releases the connection. Pooled connections close on drop; no
    /// sign-off reply is observable, so there is nothing to report.
    pub fn close(&mut self) {
        self.transport = None;
    }

    fn credentials(&self) -> Credentials {
        Credentials::new(self.user.clone(), self.password.clone())
    }

    fn open_implicit(&self) -> Result<SmtpTransport, ConnectError> {
        log::debug!(
            "submission: implicit TLS connect to {}:{}",
            self.config.host,
            self.config.port
        );
        let tls = TlsParameters::new(self.config.host.clone())
            .map_err(|e| ConnectError::Transport(e.to_string()))?;
        let transport = SmtpTransport::relay(&self.config.host)
            .map_err(|e| ConnectError::Transport(e.to_string()))?
            .credentials(self.credentials())
            .port(self.config.port)
            .tls(Tls::Wrapper(tls))
            .timeout(self.timeout)
            .build();
        verify_connection(transport)
    }

    fn open_starttls(&self) -> Result<SmtpTransport, ConnectError> {
        log::debug!(
            "submission: STARTTLS connect to {}:{}",
            self.config.host,
            SUBMISSION_PORT
        );
        let tls = TlsParameters::new(self.config.host.clone())
            .map_err(|e| ConnectError::Transport(e.to_string()))?;
        let transport = SmtpTransport::relay(&self.config.host)
            .map_err(|e| ConnectError::Transport(e.to_string()))?
            .credentials(self.credentials())
            .port(SUBMISSION_PORT)
            .tls(Tls::Required(tls))
            .timeout(self.timeout)
            .build();
        verify_connection(transport)
    }
}

/// The strategy order and its gating, separated from the dialing so the
/// decision itself is testable.
fn connect_with<T>(
    implicit_first: bool,
    fallback_allowed: bool,
    implicit: impl FnOnce() -> Result<T, ConnectError>,
    starttls: impl FnOnce() -> Result<T, ConnectError>,
) -> Result<T, ConnectError> {
    if implicit_first {
        match implicit() {
            Ok(transport) => return Ok(transport),
            Err(err) if fallback_allowed => {
                log::warn!("implicit TLS connect failed, trying STARTTLS: {}", err);
            }
            Err(err) => return Err(err),
        }
    } else if !fallback_allowed {
        return Err(ConnectError::NoStrategyAvailable);
    }
    starttls()
}

/// Opens a connection, authenticates, and probes it with NOOP so
/// connection and credential problems surface at connect time.
fn verify_connection(transport: SmtpTransport) -> Result<SmtpTransport, ConnectError> {
    match transport.test_connection() {
        Ok(true) => Ok(transport),
        Ok(false) => Err(ConnectError::Transport(
            "server did not accept the connection check".to_string(),
        )),
        Err(e) if e.is_permanent() => Err(ConnectError::Auth(e.to_string())),
        Err(e) => Err(ConnectError::Transport(e.to_string())),
    }
}

fn archive_copy(
    mailbox: &mut MailboxSession,
    folder: &str,
    raw: &[u8],
) -> Result<(), String> {
    mailbox
        .select_folder(folder)
        .map_err(|e| e.to_string())?;
    mailbox.append(folder, raw).map_err(|e| e.to_string())?;
    log::info!("archived sent copy to '{}'", folder);
    Ok(())
}

fn build_wire_message(message: &OutgoingMessage) -> Result<Message, SendError> {
    let mut builder = Message::builder()
        .from(parse_mailbox(&message.from)?)
        .subject(&message.subject);
    for recipient in &message.to {
        builder = builder.to(parse_mailbox(recipient)?);
    }
    builder
        .singlepart(SinglePart::plain(message.body.clone()))
        .map_err(|e| SendError::InvalidMessage(e.to_string()))
}

fn parse_mailbox(addr: &str) -> Result<Mailbox, SendError> {
    addr.trim()
        .parse::<Mailbox>()
        .map_err(|e| SendError::InvalidMessage(format!("bad address '{}': {}", addr.trim(), e)))
}

fn map_send_error(err: lettre::transport::smtp::Error) -> SendError {
    let text = err.to_string();
    if err.is_permanent() && text.to_lowercase().contains("auth") {
        SendError::AuthExpired(text)
    } else {
        SendError::Rejected(text)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::config::ImapConfig;

    #[test]
    fn implicit_success_never_touches_fallback() {
        let starttls_calls = Cell::new(0u32);
        let result = connect_with(
            true,
            true,
            || Ok("implicit"),
            || {
                starttls_calls.set(starttls_calls.get() + 1);
                Ok("starttls")
            },
        );
        assert_eq!(result.unwrap(), "implicit");
        assert_eq!(starttls_calls.get(), 0);
    }

    #[test]
    fn implicit_failure_falls_back_exactly_once_when_allowed() {
        let starttls_calls = Cell::new(0u32);
        let result = connect_with(
            true,
            true,
            || Err::<&str, _>(ConnectError::Transport("refused".to_string())),
            || {
                starttls_calls.set(starttls_calls.get() + 1);
                Ok("starttls")
            },
        );
        assert_eq!(result.unwrap(), "starttls");
        assert_eq!(starttls_calls.get(), 1);
    }

    #[test]
    fn implicit_failure_without_fallback_keeps_original_error() {
        let starttls_calls = Cell::new(0u32);
        let result = connect_with(
            true,
            false,
            || Err::<&str, _>(ConnectError::Transport("refused".to_string())),
            || {
                starttls_calls.set(starttls_calls.get() + 1);
                Ok("starttls")
            },
        );
        assert!(matches!(
            result,
            Err(ConnectError::Transport(reason)) if reason == "refused"
        ));
        assert_eq!(starttls_calls.get(), 0);
    }

    #[test]
    fn starttls_only_configuration_skips_implicit() {
        let implicit_calls = Cell::new(0u32);
        let result = connect_with(
            false,
            true,
            || {
                implicit_calls.set(implicit_calls.get() + 1);
                Ok("implicit")
            },
            || Ok("starttls"),
        );
        assert_eq!(result.unwrap(), "starttls");
        assert_eq!(implicit_calls.get(), 0);
    }

    #[test]
    fn no_strategy_configured_is_an_error() {
        let result = connect_with(
            false,
            false,
            || Ok("implicit"),
            || Ok("starttls"),
        );
        assert!(matches!(result, Err(ConnectError::NoStrategyAvailable)));
    }

    #[test]
    fn send_requires_a_connection() {
        let mut session = SubmissionSession::new(
            &SmtpConfig::default(),
            &AuthConfig::default(),
            None,
        );
        let message = OutgoingMessage {
            from: "me@example.org".to_string(),
            to: vec!["you@example.org".to_string()],
            subject: "hello".to_string(),
            body: "body".to_string(),
        };
        assert!(matches!(
            session.send(&message, None),
            Err(SendError::NotConnected)
        ));
    }

    #[test]
    fn archival_failure_becomes_a_warning_value() {
        let mut mailbox =
            MailboxSession::new(&ImapConfig::default(), &AuthConfig::default(), None);
        let reason = archive_copy(&mut mailbox, "INBOX.Sent", b"raw message").unwrap_err();
        let warning = ArchivalWarning {
            folder: "INBOX.Sent".to_string(),
            reason,
        };
        let rendered = warning.to_string();
        assert!(rendered.contains("INBOX.Sent"));
        assert!(rendered.contains("not connected"));
    }

    #[test]
    fn wire_message_rejects_unparseable_addresses() {
        let message = OutgoingMessage {
            from: "not an address".to_string(),
            to: vec!["you@example.org".to_string()],
            subject: "hello".to_string(),
            body: "body".to_string(),
        };
        assert!(matches!(
            build_wire_message(&message),
            Err(SendError::InvalidMessage(_))
        ));
    }

    #[test]
    fn wire_message_builds_for_valid_input() {
        let message = OutgoingMessage {
            from: "Pietro <pietro@example.org>".to_string(),
            to: vec!["jana@example.cz".to_string(), "karel@example.cz".to_string()],
            subject: "Pozvánka".to_string(),
            body: "Ahoj!".to_string(),
        };
        let wire = build_wire_message(&message).unwrap();
        let rendered = String::from_utf8_lossy(&wire.formatted()).into_owned();
        assert!(rendered.contains("To: jana@example.cz, karel@example.cz"));
        assert!(rendered.contains("Ahoj!"));
    }
}
