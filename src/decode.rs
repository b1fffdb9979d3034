//! Best-effort text decoding for display. Nothing here ever returns an
//! error: a malformed or foreign-encoded field degrades to a lossy
//! rendition or a fixed placeholder, because reading mail must not be
//! blocked by one bad header.

use mail_parser::Message;

use crate::message::{FetchedMessage, MessageBody, PartPayload};

/// Shown when a multipart message has no non-attachment text/plain part.
pub const NO_TEXT_PART: &str = "(No readable text part.)";
/// Shown when a single-part message is not of a textual type.
pub const NOT_TEXT: &str = "(Message is not of a textual type.)";

/// Decodes a raw header value that may contain RFC 2047 encoded-words,
/// concatenating all segments into one string. Anything that fails to
/// decode falls back to lossy UTF-8 with replacement characters.
pub fn decode_header_text(raw: &[u8]) -> String {
    let lossy = String::from_utf8_lossy(raw);
    if !lossy.contains("=?") {
        return lossy.into_owned();
    }
    // Wrap the value in a synthetic header so the parser's encoded-word
    // machinery handles charset and transfer encoding per segment.
    let synthetic = format!("Subject: {}\r\n\r\n", lossy);
    match Message::parse(synthetic.as_bytes()) {
        Some(parsed) => match parsed.subject() {
            Some(decoded) => decoded.to_string(),
            None => lossy.into_owned(),
        },
        None => lossy.into_owned(),
    }
}

/// Extracts a displayable plain-text body.
///
/// Multipart: the first part in document order whose content type is
/// text/plain and whose disposition is not "attachment". Single-part: the
/// text itself when the top-level type is textual. Everything else maps to
/// a fixed placeholder.
pub fn extract_plain_text(message: &FetchedMessage) -> String {
    match &message.body {
        MessageBody::Multi(parts) => {
            for part in parts {
                if part.is_plain_text() && !part.is_attachment() {
                    if let PartPayload::Text(text) = &part.payload {
                        return text.clone();
                    }
                }
            }
            NO_TEXT_PART.to_string()
        }
        MessageBody::Single(part) => {
            if part.is_textual() {
                match &part.payload {
                    PartPayload::Text(text) => text.clone(),
                    PartPayload::Binary(data) => String::from_utf8_lossy(data).into_owned(),
                }
            } else {
                NOT_TEXT.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ascii_passes_through() {
        assert_eq!(decode_header_text(b"Weekly report"), "Weekly report");
    }

    #[test]
    fn decodes_base64_encoded_word() {
        // "Pozvánka na schůzi"
        let raw = b"=?UTF-8?B?UG96dsOhbmthIG5hIHNjaMWvemk=?=";
        let decoded = decode_header_text(raw);
        assert_eq!(decoded, "Pozvánka na schůzi");
        assert!(!decoded.contains("=?"));
    }

    #[test]
    fn decodes_quoted_printable_encoded_word() {
        let raw = b"=?ISO-8859-1?Q?caf=E9?=";
        assert_eq!(decode_header_text(raw), "café");
    }

    #[test]
    fn concatenates_mixed_segments() {
        let raw = b"=?UTF-8?B?xI1hc3Q=?= one =?UTF-8?Q?two?=";
        let decoded = decode_header_text(raw);
        assert!(decoded.contains("část"));
        assert!(decoded.contains("one"));
        assert!(decoded.contains("two"));
        assert!(!decoded.contains("=?"));
    }

    #[test]
    fn malformed_encoded_word_degrades_without_error() {
        let decoded = decode_header_text(b"=?bogus-charset?X?!!?=");
        assert!(!decoded.is_empty());
    }

    #[test]
    fn invalid_utf8_is_substituted() {
        let decoded = decode_header_text(b"caf\xff");
        assert!(decoded.starts_with("caf"));
        assert!(decoded.contains('\u{FFFD}'));
    }

    fn parse(raw: &[u8]) -> FetchedMessage {
        FetchedMessage::parse(raw).expect("fixture should parse")
    }

    #[test]
    fn picks_first_plain_part_skipping_attachments() {
        let raw = b"From: a@example.com\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"b\"\r\n\
\r\n\
--b\r\n\
Content-Type: text/plain; name=\"notes.txt\"\r\n\
Content-Disposition: attachment; filename=\"notes.txt\"\r\n\
\r\n\
attached notes\r\n\
--b\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>html body</p>\r\n\
--b\r\n\
Content-Type: text/plain\r\n\
\r\n\
the real body\r\n\
--b--\r\n";
        let text = extract_plain_text(&parse(raw));
        assert!(text.contains("the real body"));
        assert!(!text.contains("attached notes"));
    }

    #[test]
    fn multipart_without_plain_text_yields_placeholder() {
        let raw = b"From: a@example.com\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"b\"\r\n\
\r\n\
--b\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>only html</p>\r\n\
--b--\r\n";
        assert_eq!(extract_plain_text(&parse(raw)), NO_TEXT_PART);
    }

    #[test]
    fn single_part_text_is_returned() {
        let raw = b"From: a@example.com\r\n\r\njust a body\r\n";
        assert!(extract_plain_text(&parse(raw)).contains("just a body"));
    }

    #[test]
    fn single_part_non_text_yields_placeholder() {
        let raw = b"From: a@example.com\r\n\
Content-Type: application/octet-stream\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
AAECAw==\r\n";
        assert_eq!(extract_plain_text(&parse(raw)), NOT_TEXT);
    }
}
