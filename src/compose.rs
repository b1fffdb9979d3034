//! Connection-free construction of outgoing messages, either from fresh
//! input or derived from a fetched message (reply, forward).

use crate::decode;
use crate::message::{FetchedMessage, OutgoingMessage};

/// Direct construction. Recipients must already be validated non-empty by
/// the caller.
pub fn new_message(
    from: &str,
    to: Vec<String>,
    subject: &str,
    body: &str,
) -> OutgoingMessage {
    OutgoingMessage {
        from: from.to_string(),
        to,
        subject: subject.to_string(),
        body: body.to_string(),
    }
}

/// Builds a reply to `original`: the recipient is the bare address of the
/// original sender (display name stripped), and the subject gains a single
/// "Re: " prefix.
pub fn reply(original: &FetchedMessage, from: &str, body: &str) -> OutgoingMessage {
    let to = original
        .from
        .first()
        .map(|addr| addr.address.clone())
        .unwrap_or_default();
    OutgoingMessage {
        from: from.to_string(),
        to: vec![to],
        subject: prefixed_subject(&original.subject, "Re: ", "re:"),
        body: body.to_string(),
    }
}

/// Builds a forward of `original`: a quoted header block plus the original
/// plain text, with the caller's commentary (if any) above it.
///
/// The existing-prefix test deliberately checks "fw:" while the added
/// prefix is "Fwd: "; a subject already reading "Fwd: ..." therefore gains
/// another prefix.
pub fn forward(
    original: &FetchedMessage,
    from: &str,
    to: Vec<String>,
    body: &str,
) -> OutgoingMessage {
    let quoted = quoted_original(original);
    let body = if body.trim().is_empty() {
        quoted
    } else {
        format!("{}\n\n{}", body, quoted)
    };
    OutgoingMessage {
        from: from.to_string(),
        to,
        subject: prefixed_subject(&original.subject, "Fwd: ", "fw:"),
        body,
    }
}

fn prefixed_subject(subject: &str, prefix: &str, marker: &str) -> String {
    if subject.to_lowercase().starts_with(marker) {
        subject.to_string()
    } else {
        format!("{}{}", prefix, subject)
    }
}

fn quoted_original(original: &FetchedMessage) -> String {
    format!(
        "---------- Original message ----------\n\
         From: {}\n\
         Date: {}\n\
         Subject: {}\n\
         To: {}\n\
         \n\
         {}",
        original.from_line(),
        original.date,
        original.subject,
        original.to_line(),
        decode::extract_plain_text(original)
    )
}
