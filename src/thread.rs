//! Heuristic reconstruction of quoted/forwarded reply chains embedded as
//! plain text inside a mail body.
//!
//! This layer works on free-form text, not on the MIME tree: segments are
//! located with positional marker tokens, fields are sliced between ordered
//! marker pairs, and dates are normalized through a locale word table before
//! parsing. No field is mandatory here; extraction misses leave fields
//! absent.

use crate::types::{Body, Content, ContentNode, EmailAddress, Header, Mail, Thread};
use chrono::NaiveDateTime;
use regex::Regex;
use tracing::debug;

/// Marker tokens that open a quoted-message segment, across both locales
const SEGMENT_MARKERS: &[&str] = &["Da:", "From:"];

/// Boilerplate footer stripped from reconstructed bodies
const CONFIDENTIAL_FOOTER: &str = "C1 Confidential";

const PRIMARY_DATE_FORMAT: &str = "%A %d %B %Y %H:%M";
const FALLBACK_DATE_FORMAT: &str = "%A, %B %d, %Y %I:%M:%S %p";

/// An open/close marker pair bounding one field; `None` means start or end
/// of the scanned text
type BoundPair = (Option<&'static str>, Option<&'static str>);

/// Ordered field-boundary markers for one locale. Fallback pairs are tried
/// in order until one produces a non-empty slice. Adding a locale is a data
/// change, not a code change.
struct LocaleBounds {
    from: &'static [BoundPair],
    received: &'static [BoundPair],
    to: &'static [BoundPair],
    cc: &'static [BoundPair],
    sub_body: &'static [BoundPair],
    subject: &'static [BoundPair],
    body: &'static [BoundPair],
}

static ENGLISH: LocaleBounds = LocaleBounds {
    from: &[(Some("From: "), Some("Sent: "))],
    received: &[(Some("Sent: "), Some("To: "))],
    to: &[(Some("To: "), Some("Cc")), (Some("To: "), Some("Subject: "))],
    cc: &[(Some("Cc"), Some("Subject: "))],
    sub_body: &[(Some("Subject: "), None)],
    subject: &[(None, Some("\n"))],
    body: &[(Some("\n"), None)],
};

static ITALIAN: LocaleBounds = LocaleBounds {
    from: &[(Some("Da: "), Some("Inviato: "))],
    received: &[(Some("Inviato: "), Some("A: "))],
    to: &[(Some("A: "), Some("Cc")), (Some("A: "), Some("Oggetto: "))],
    cc: &[(Some("Cc"), Some("Oggetto: "))],
    sub_body: &[(Some("Oggetto: "), None)],
    subject: &[(None, Some("\n"))],
    body: &[(Some("\n"), None)],
};

/// Italian-to-English substitutions applied before date parsing
const WEEKDAYS: &[(&str, &str)] = &[
    ("lunedì", "monday"),
    ("martedì", "tuesday"),
    ("mercoledì", "wednesday"),
    ("giovedì", "thursday"),
    ("venerdì", "friday"),
    ("sabato", "saturday"),
    ("domenica", "sunday"),
];

const MONTHS: &[(&str, &str)] = &[
    ("gennaio", "january"),
    ("febbraio", "february"),
    ("marzo", "march"),
    ("aprile", "april"),
    ("maggio", "may"),
    ("giugno", "june"),
    ("luglio", "july"),
    ("agosto", "august"),
    ("settembre", "september"),
    ("ottobre", "october"),
    ("novembre", "november"),
    ("dicembre", "december"),
];

static ANGLE_ADDRESS: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"^\s*(.*?)\s*<\s*([^<>]+?)\s*>\s*$").unwrap());

/// Supported marker locales. The choice is closed and made from the text
/// itself, not configurable at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThreadLocale {
    English,
    Italian,
}

impl ThreadLocale {
    /// English when the text opens with the English marker, Italian otherwise
    fn detect(text: &str) -> Self {
        if text.starts_with("From:") {
            Self::English
        } else {
            Self::Italian
        }
    }

    fn bounds(self) -> &'static LocaleBounds {
        match self {
            Self::English => &ENGLISH,
            Self::Italian => &ITALIAN,
        }
    }
}

/// Reconstruct a thread from free-form reply text.
///
/// Returns `None` when no segment marker occurs anywhere: text without
/// markers is not a thread, which is not an error.
#[must_use]
pub fn thread_from_text(text: &str) -> Option<Thread> {
    let segments = split_segments(text)?;
    let mut thread = Thread::new();
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        thread.add_mail(mail_from_text(segment));
    }

    debug!("Reconstructed {} quoted segment(s)", thread.len());
    Some(thread)
}

/// Reconstruct one thread from a mail and the nested mails carried by its
/// attachments (one level only). All entries are stamped with the thread's
/// identifier.
#[must_use]
pub fn thread_from_mail(mail: &Mail) -> Thread {
    let mut thread = Thread::new();

    let mut sources: Vec<&Mail> = mail.body.mails();
    sources.push(mail);

    for source in sources {
        thread.add_mail(source.clone());
        if let Some(text) = source.body.plain_text()
            && let Some(quoted) = thread_from_text(text)
        {
            thread.add_mails(quoted.entries);
        }
    }

    thread
}

/// Build one synthetic mail from a single quoted segment.
///
/// Every field is extracted leniently: a missing closing marker leaves the
/// field absent, and a segment without a resolvable sender is still a valid
/// result.
#[must_use]
pub fn mail_from_text(text: &str) -> Mail {
    let bounds = ThreadLocale::detect(text).bounds();

    let from = bounded_value(text, bounds.from)
        .and_then(|raw| parse_loose_addresses(&raw).into_iter().next());

    let received = bounded_value(text, bounds.received)
        .and_then(|raw| parse_locale_date(raw.trim()))
        .map(|naive| naive.and_utc().fixed_offset());

    let to = bounded_value(text, bounds.to)
        .map(|raw| parse_loose_addresses(&raw))
        .unwrap_or_default();

    let cc = bounded_value(text, bounds.cc)
        .map(|raw| parse_loose_addresses(&raw))
        .unwrap_or_default();

    let sub_body = bounded_value(text, bounds.sub_body);

    let subject = sub_body
        .as_deref()
        .and_then(|sb| bounded_value(sb, bounds.subject))
        .map(|s| s.trim().to_string());

    let body_text = sub_body
        .as_deref()
        .and_then(|sb| bounded_value(sb, bounds.body))
        .map(|b| b.replace(CONFIDENTIAL_FOOTER, "").trim().to_string())
        .unwrap_or_default();

    Mail {
        header: Header {
            from,
            to,
            cc,
            subject,
            received,
        },
        body: Body::Structured {
            content: vec![ContentNode::Leaf {
                content_type: "text/plain".to_string(),
                content: Content::Text(body_text),
            }],
            attachments: Vec::new(),
        },
        thread_id: None,
    }
}

/// Split reply text into per-message segments at every marker occurrence.
///
/// Each segment spans from one marker to the character before the next; the
/// last runs to end of text. `None` when no marker occurs at all.
fn split_segments(text: &str) -> Option<Vec<&str>> {
    let first = SEGMENT_MARKERS
        .iter()
        .filter_map(|marker| text.find(marker))
        .min()?;

    let mut segments = Vec::new();
    let mut i = first + 1;
    while i < text.len() {
        let next = SEGMENT_MARKERS
            .iter()
            .filter_map(|marker| text[i..].find(marker).map(|j| j + i))
            .min()
            .unwrap_or(text.len());
        segments.push(&text[i - 1..next]);
        i = next + 1;
    }

    Some(segments)
}

/// Slice `text` between an opening and a closing marker; `None` markers mean
/// start/end of text. A missing marker yields `None` (silent miss).
fn substring_between<'a>(
    text: &'a str,
    open: Option<&str>,
    close: Option<&str>,
) -> Option<&'a str> {
    let rest = match open {
        Some(marker) => {
            let at = text.find(marker)?;
            &text[at + marker.len()..]
        }
        None => text,
    };
    match close {
        Some(marker) => rest.find(marker).map(|at| &rest[..at]),
        None => Some(rest),
    }
}

/// Try each fallback pair in order until one yields a non-empty slice
fn bounded_value(text: &str, bounds: &[BoundPair]) -> Option<String> {
    for (open, close) in bounds {
        if let Some(value) = substring_between(text, *open, *close)
            && !value.is_empty()
        {
            return Some(value.to_string());
        }
    }
    None
}

/// Split an address field on `;` and decompose each token leniently.
///
/// HTML-entity-escaped angle brackets are un-escaped first. Unlike the MIME
/// header path, tokens without an `@` are kept as bare addresses: nothing is
/// mandatory at this layer.
fn parse_loose_addresses(raw: &str) -> Vec<EmailAddress> {
    let unescaped = raw.trim().replace("&lt;", "<").replace("&gt;", ">");
    unescaped
        .split(';')
        .filter_map(parse_loose_address)
        .collect()
}

fn parse_loose_address(token: &str) -> Option<EmailAddress> {
    // A leading colon survives slicing when the opening marker is a bare
    // field name ("Cc" rather than "Cc: ")
    let token = token.trim().trim_start_matches(':').trim();
    if token.is_empty() {
        return None;
    }

    if let Some(caps) = ANGLE_ADDRESS.captures(token) {
        let name = caps[1].trim_matches('"').trim().to_string();
        return Some(EmailAddress {
            name: if name.is_empty() { None } else { Some(name) },
            address: caps[2].to_string(),
        });
    }

    Some(EmailAddress {
        name: None,
        address: token.to_string(),
    })
}

/// Parse a locale date: substitute localized weekday/month words with their
/// English equivalents, then try the default pattern and one fallback.
/// Failure of both leaves the date absent.
fn parse_locale_date(raw: &str) -> Option<NaiveDateTime> {
    let normalized = normalize_locale_words(raw);
    NaiveDateTime::parse_from_str(&normalized, PRIMARY_DATE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(&normalized, FALLBACK_DATE_FORMAT))
        .ok()
}

fn normalize_locale_words(raw: &str) -> String {
    let mut normalized = raw.to_string();
    for (localized, english) in MONTHS.iter().chain(WEEKDAYS) {
        normalized = normalized.replace(localized, english);
    }
    normalized
}
