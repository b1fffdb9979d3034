use std::fmt;

use mail_parser::{HeaderValue, Message, MessagePart, PartType};

/// A single mailbox address with an optional display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailAddress {
    pub name: Option<String>,
    pub address: String,
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) if !name.is_empty() => write!(f, "{} <{}>", name, self.address),
            _ => write!(f, "{}", self.address),
        }
    }
}

/// Decoded From/Subject/Date of a message, for listings. Fields the server
/// omitted are empty strings rather than errors.
#[derive(Debug, Clone, Default)]
pub struct MessageSummary {
    pub from: String,
    pub subject: String,
    pub date: String,
}

impl MessageSummary {
    /// Builds a summary from raw header bytes as returned by a
    /// `HEADER.FIELDS` fetch. Unparseable input yields an empty summary.
    pub fn from_header_bytes(raw: &[u8]) -> Self {
        let parsed = match Message::parse(raw) {
            Some(parsed) => parsed,
            None => return Self::default(),
        };
        Self {
            from: address_header_line(&parsed, parsed.from(), "From"),
            subject: parsed.subject().unwrap_or_default().to_string(),
            date: date_line(&parsed),
        }
    }
}

#[derive(Debug, Clone)]
pub enum PartPayload {
    Text(String),
    Binary(Vec<u8>),
}

/// One leaf part of a message body.
#[derive(Debug, Clone)]
pub struct BodyPart {
    pub content_type: String,
    pub disposition: Option<String>,
    pub payload: PartPayload,
}

impl BodyPart {
    pub fn is_plain_text(&self) -> bool {
        self.content_type.eq_ignore_ascii_case("text/plain")
    }

    pub fn is_textual(&self) -> bool {
        let ct = self.content_type.to_ascii_lowercase();
        ct.starts_with("text/")
    }

    pub fn is_attachment(&self) -> bool {
        self.disposition
            .as_deref()
            .map_or(false, |d| d.eq_ignore_ascii_case("attachment"))
    }
}

#[derive(Debug, Clone)]
pub enum MessageBody {
    Single(BodyPart),
    Multi(Vec<BodyPart>),
}

/// A fully fetched message: decoded headers plus the structured body.
/// A plain value with no tie to the session that produced it.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    pub from: Vec<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub subject: String,
    pub date: String,
    /// All headers in arrival order, values decoded.
    pub headers: Vec<(String, String)>,
    pub body: MessageBody,
}

impl FetchedMessage {
    /// Parses raw RFC 822 bytes into the structured form. Returns `None`
    /// only when the input is not recognizable as a message at all.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let parsed = Message::parse(raw)?;

        let headers = parsed
            .headers()
            .iter()
            .filter_map(|h| header_display(h.value()).map(|v| (h.name().to_string(), v)))
            .collect();

        Some(Self {
            from: addresses(parsed.from()),
            to: addresses(parsed.to()),
            subject: parsed.subject().unwrap_or_default().to_string(),
            date: date_line(&parsed),
            headers,
            body: build_body(&parsed),
        })
    }

    pub fn from_line(&self) -> String {
        join_addresses(&self.from)
    }

    pub fn to_line(&self) -> String {
        join_addresses(&self.to)
    }
}

/// An outgoing message: one sender, at least one recipient, a plain-text
/// body. Outgoing mail is never multipart here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

fn addresses(value: &HeaderValue) -> Vec<EmailAddress> {
    fn convert(addr: &mail_parser::Addr) -> Option<EmailAddress> {
        let address = addr.address.as_ref()?.to_string();
        if address.is_empty() {
            return None;
        }
        Some(EmailAddress {
            name: addr.name.as_ref().map(|n| n.to_string()),
            address,
        })
    }

    match value {
        HeaderValue::Address(addr) => convert(addr).into_iter().collect(),
        HeaderValue::AddressList(list) => list.iter().filter_map(convert).collect(),
        HeaderValue::Group(group) => group.addresses.iter().filter_map(convert).collect(),
        HeaderValue::GroupList(groups) => groups
            .iter()
            .flat_map(|g| g.addresses.iter())
            .filter_map(convert)
            .collect(),
        _ => Vec::new(),
    }
}

fn join_addresses(addrs: &[EmailAddress]) -> String {
    addrs
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders any decoded header value as display text.
fn header_display(value: &HeaderValue) -> Option<String> {
    match value {
        HeaderValue::Text(text) => Some(text.to_string()),
        HeaderValue::TextList(list) => Some(
            list.iter()
                .map(|s| s.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
        ),
        HeaderValue::Address(_) | HeaderValue::AddressList(_) => {
            Some(join_addresses(&addresses(value)))
        }
        HeaderValue::Group(_) | HeaderValue::GroupList(_) => {
            Some(join_addresses(&addresses(value)))
        }
        HeaderValue::DateTime(dt) => Some(format!("{}", dt)),
        HeaderValue::ContentType(ct) => Some(match ct.subtype() {
            Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
            None => ct.ctype().to_string(),
        }),
        _ => None,
    }
}

/// Address-shaped header as one display line, falling back to the raw
/// decoded text when the value did not parse as addresses.
fn address_header_line(parsed: &Message, value: &HeaderValue, name: &str) -> String {
    let addrs = addresses(value);
    if addrs.is_empty() {
        header_text(parsed, name)
    } else {
        join_addresses(&addrs)
    }
}

fn header_text(parsed: &Message, name: &str) -> String {
    parsed
        .headers()
        .iter()
        .find(|h| h.name().to_string().eq_ignore_ascii_case(name))
        .and_then(|h| header_display(h.value()))
        .unwrap_or_default()
}

fn date_line(parsed: &Message) -> String {
    match parsed.date() {
        Some(date) => format!("{}", date),
        None => header_text(parsed, "Date"),
    }
}

fn build_body(parsed: &Message) -> MessageBody {
    let leaves: Vec<BodyPart> = parsed.parts.iter().filter_map(leaf_part).collect();
    if parsed.parts.len() <= 1 {
        MessageBody::Single(leaves.into_iter().next().unwrap_or(BodyPart {
            content_type: "text/plain".to_string(),
            disposition: None,
            payload: PartPayload::Text(String::new()),
        }))
    } else {
        MessageBody::Multi(leaves)
    }
}

/// Maps a MIME part onto the body model; container parts yield `None`.
fn leaf_part(part: &MessagePart) -> Option<BodyPart> {
    let payload = match &part.body {
        PartType::Text(text) => PartPayload::Text(text.to_string()),
        PartType::Html(html) => PartPayload::Text(html.to_string()),
        PartType::Binary(data) | PartType::InlineBinary(data) => {
            PartPayload::Binary(data.to_vec())
        }
        PartType::Message(_) | PartType::Multipart(_) => return None,
    };

    let mut content_type = None;
    let mut disposition = None;
    for header in &part.headers {
        let name = header.name().to_string().to_ascii_lowercase();
        match &header.value {
            HeaderValue::ContentType(ct) => {
                let rendered = match ct.subtype() {
                    Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
                    None => ct.ctype().to_string(),
                };
                match name.as_str() {
                    "content-type" => content_type = Some(rendered),
                    "content-disposition" => disposition = Some(ct.ctype().to_string()),
                    _ => {}
                }
            }
            // Some parts surface these headers as undecoded text.
            HeaderValue::Text(text) => {
                let main = text
                    .split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_ascii_lowercase();
                match name.as_str() {
                    "content-type" if content_type.is_none() => content_type = Some(main),
                    "content-disposition" if disposition.is_none() => disposition = Some(main),
                    _ => {}
                }
            }
            _ => {}
        }
    }

    let content_type = content_type.unwrap_or_else(|| {
        match &part.body {
            PartType::Html(_) => "text/html",
            PartType::Text(_) => "text/plain",
            _ => "application/octet-stream",
        }
        .to_string()
    });

    Some(BodyPart {
        content_type,
        disposition,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIPART: &[u8] = b"From: \"Jana Nov\xc3\xa1kov\xc3\xa1\" <jana@example.cz>\r\n\
To: pietro@example.org\r\n\
Subject: =?UTF-8?B?UG96dsOhbmth?=\r\n\
Date: Tue, 4 Aug 2026 10:12:00 +0200\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Ahoj, posilam pozvanku.\r\n\
--b1\r\n\
Content-Type: application/pdf; name=\"pozvanka.pdf\"\r\n\
Content-Disposition: attachment; filename=\"pozvanka.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQ=\r\n\
--b1--\r\n";

    #[test]
    fn parses_multipart_into_model() {
        let msg = FetchedMessage::parse(MULTIPART).unwrap();
        assert_eq!(msg.subject, "Pozvánka");
        assert_eq!(msg.from.len(), 1);
        assert_eq!(msg.from[0].address, "jana@example.cz");
        assert_eq!(msg.from[0].name.as_deref(), Some("Jana Nováková"));
        match &msg.body {
            MessageBody::Multi(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(parts[0].is_plain_text());
                assert!(!parts[0].is_attachment());
                assert_eq!(parts[1].content_type, "application/pdf");
                assert!(parts[1].is_attachment());
            }
            MessageBody::Single(_) => panic!("expected multipart body"),
        }
    }

    #[test]
    fn parses_single_part_text() {
        let raw = b"From: a@example.com\r\nSubject: hello\r\n\r\nplain body\r\n";
        let msg = FetchedMessage::parse(raw).unwrap();
        match &msg.body {
            MessageBody::Single(part) => {
                assert!(part.is_plain_text());
                match &part.payload {
                    PartPayload::Text(text) => assert!(text.contains("plain body")),
                    PartPayload::Binary(_) => panic!("expected text payload"),
                }
            }
            MessageBody::Multi(_) => panic!("expected single-part body"),
        }
    }

    #[test]
    fn summary_from_header_fields_only() {
        let raw = b"From: Karel <karel@example.cz>\r\n\
Subject: =?ISO-8859-2?Q?P=F8edm=ECt?=\r\n\
Date: Mon, 3 Aug 2026 09:00:00 +0200\r\n\r\n";
        let summary = MessageSummary::from_header_bytes(raw);
        assert_eq!(summary.from, "Karel <karel@example.cz>");
        assert_eq!(summary.subject, "Předmět");
        assert!(!summary.date.is_empty());
    }

    #[test]
    fn summary_missing_fields_are_empty() {
        let summary = MessageSummary::from_header_bytes(b"Subject: only this\r\n\r\n");
        assert_eq!(summary.subject, "only this");
        assert_eq!(summary.from, "");
        assert_eq!(summary.date, "");
    }

    #[test]
    fn address_display_includes_name_when_present() {
        let named = EmailAddress {
            name: Some("Jana".to_string()),
            address: "jana@example.cz".to_string(),
        };
        let bare = EmailAddress {
            name: None,
            address: "jana@example.cz".to_string(),
        };
        assert_eq!(named.to_string(), "Jana <jana@example.cz>");
        assert_eq!(bare.to_string(), "jana@example.cz");
    }
}
