//! Core data model for dissected mail

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Extension marking a file as a nested mail message
pub const EXT_MAIL: &str = ".eml";

/// Extension marking a file as a zip archive
pub const EXT_ARCHIVE: &str = ".zip";

/// Extension marking a file as a PKCS#7 signed envelope
pub const EXT_ENVELOPE: &str = ".p7m";

/// Body representation selected by the caller
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ParseMode {
    /// Keep the non-attachment content subtree as nested nodes
    #[default]
    Structured,
    /// Merge text/html leaves by type and separate inline files
    Flattened,
}

/// Email address with optional display name.
///
/// Equality and display consider the address only; the display name is
/// carried but never compared.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe")
    pub name: Option<String>,

    /// Address (e.g., "john@example.com")
    pub address: String,
}

impl EmailAddress {
    /// Parse an address from a raw header token.
    ///
    /// Accepts `Name <addr@domain>` and bare `addr@domain`; anything without
    /// an `@` is rejected.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();

        if let Some(start) = s.find('<')
            && let Some(end) = s.find('>')
            && start < end
        {
            let name_part = s[..start].trim().trim_matches('"').trim();
            let address = s[start + 1..end].trim().to_string();
            if address.contains('@') {
                return Some(Self {
                    name: if name_part.is_empty() {
                        None
                    } else {
                        Some(name_part.to_string())
                    },
                    address,
                });
            }
        }

        if s.contains('@') && !s.contains(char::is_whitespace) {
            return Some(Self {
                name: None,
                address: s.to_string(),
            });
        }

        None
    }
}

impl PartialEq for EmailAddress {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// Decoded payload of a part or file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Content {
    /// Textual payload, already charset-decoded
    Text(String),
    /// Raw binary payload
    Binary(Vec<u8>),
}

impl Content {
    /// Textual view, if this payload is text
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(_) => None,
        }
    }

    /// Byte view of the payload regardless of variant
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary(b) => b,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl Default for Content {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

/// A named attachment payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct File {
    /// Filename as carried by the part or archive member
    pub filename: String,

    /// Decoded content
    pub content: Content,

    /// Content-Transfer-Encoding of the originating part, if any
    pub encoding: Option<String>,
}

impl File {
    /// Derived extension: the lower-cased suffix of the filename including
    /// the leading dot, or the empty string when there is none.
    ///
    /// Leading dots of the basename do not count (`".bashrc"` has no
    /// extension), matching `splitext` semantics.
    #[must_use]
    pub fn extension(&self) -> String {
        extension_of(&self.filename)
    }
}

/// Extension of a filename, `splitext`-style
#[must_use]
pub fn extension_of(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let stem = base.trim_start_matches('.');
    match stem.rfind('.') {
        Some(idx) => {
            let dot = base.len() - stem.len() + idx;
            base[dot..].to_lowercase()
        }
        None => String::new(),
    }
}

/// A file whose decoded content is itself a full mail
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MailFile {
    /// The carrying file (raw inner message bytes, filename, encoding)
    pub file: File,

    /// The parsed inner mail
    pub mail: Mail,
}

/// One attachment slot of a body.
///
/// `Failed` makes partial success explicit: an attachment whose unwrapping
/// failed is carried with an error note instead of aborting the whole parse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Attachment {
    /// A flat unwrapped file
    File(File),
    /// A file proven to embed a full mail
    Mail(MailFile),
    /// A file whose unwrapping failed
    Failed {
        file: File,
        error: String,
    },
}

impl Attachment {
    #[must_use]
    pub fn filename(&self) -> &str {
        match self {
            Self::File(f) | Self::Failed { file: f, .. } => &f.filename,
            Self::Mail(mf) => &mf.file.filename,
        }
    }

    /// Derived extension of the underlying file
    #[must_use]
    pub fn extension(&self) -> String {
        match self {
            Self::File(f) | Self::Failed { file: f, .. } => f.extension(),
            Self::Mail(mf) => mf.file.extension(),
        }
    }
}

/// One node of the non-attachment content subtree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ContentNode {
    /// A body fragment with its MIME content-type
    Leaf {
        content_type: String,
        content: Content,
    },
    /// A multipart section that is not itself an attachment
    Container {
        content_type: String,
        children: Vec<BodyChild>,
    },
}

impl ContentNode {
    #[must_use]
    pub fn content_type(&self) -> &str {
        match self {
            Self::Leaf { content_type, .. } | Self::Container { content_type, .. } => content_type,
        }
    }
}

/// Child slot of a container node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum BodyChild {
    Node(ContentNode),
    Attachment(Attachment),
}

/// Body of a mail, in the representation the caller selected
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Body {
    /// Ordered content nodes plus the attachment list
    Structured {
        content: Vec<ContentNode>,
        attachments: Vec<Attachment>,
    },
    /// Concatenated text/html with inline files kept apart from attachments
    Flattened {
        text: String,
        html: String,
        inline: Vec<Attachment>,
        attachments: Vec<Attachment>,
    },
}

impl Body {
    /// All attachments of this body
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        match self {
            Self::Structured { attachments, .. } | Self::Flattened { attachments, .. } => {
                attachments
            }
        }
    }

    /// Attachments whose derived extension matches `extension`
    #[must_use]
    pub fn attachments_with_extension(&self, extension: &str) -> Vec<&Attachment> {
        self.attachments()
            .iter()
            .filter(|att| att.extension() == extension)
            .collect()
    }

    /// Parsed mails carried by `.eml` attachments
    #[must_use]
    pub fn mails(&self) -> Vec<&Mail> {
        self.attachments_with_extension(EXT_MAIL)
            .into_iter()
            .filter_map(|att| match att {
                Attachment::Mail(mf) => Some(&mf.mail),
                Attachment::File(_) | Attachment::Failed { .. } => None,
            })
            .collect()
    }

    /// First text/plain fragment of the body, depth-first
    #[must_use]
    pub fn plain_text(&self) -> Option<&str> {
        match self {
            Self::Flattened { text, .. } => Some(text),
            Self::Structured { content, .. } => content.iter().find_map(find_plain_text),
        }
    }
}

fn find_plain_text(node: &ContentNode) -> Option<&str> {
    match node {
        ContentNode::Leaf {
            content_type,
            content,
        } if content_type == "text/plain" => content.as_text(),
        ContentNode::Container { children, .. } => children.iter().find_map(|child| match child {
            BodyChild::Node(inner) => find_plain_text(inner),
            BodyChild::Attachment(_) => None,
        }),
        ContentNode::Leaf { .. } => None,
    }
}

/// Typed header fields of a mail.
///
/// The MIME path guarantees `from` is present and `to` is non-empty (a
/// missing sender or recipient is a `HeaderDefect`, not a valid state). The
/// thread reconstructor builds headers leniently and may leave any field
/// absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Header {
    /// Sender address
    pub from: Option<EmailAddress>,

    /// Primary recipients
    pub to: Vec<EmailAddress>,

    /// CC recipients
    pub cc: Vec<EmailAddress>,

    /// Decoded subject line
    pub subject: Option<String>,

    /// Received timestamp; a parse failure yields absent, never an error
    pub received: Option<DateTime<FixedOffset>>,
}

/// A parsed mail: header, body, and the thread it was assigned to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mail {
    pub header: Header,
    pub body: Body,

    /// Identifier of the thread this mail was added to, if any
    pub thread_id: Option<String>,
}

/// An ordered sequence of mails reconstructed from one conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Thread {
    /// Entries in discovery order until sorted
    pub entries: Vec<Mail>,

    /// Thread identifier stamped onto every entry
    pub id: Option<String>,

    /// Set once a caller explicitly sorts by received time
    pub ordered: bool,
}

impl Thread {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Assign an identifier and restamp every entry already added
    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        for mail in &mut self.entries {
            mail.thread_id = Some(id.clone());
        }
        self.id = Some(id);
    }

    /// Append a mail, stamping it with this thread's identifier
    pub fn add_mail(&mut self, mut mail: Mail) {
        mail.thread_id = self.id.clone();
        self.entries.push(mail);
    }

    /// Append several mails, stamping each
    pub fn add_mails(&mut self, mails: impl IntoIterator<Item = Mail>) {
        for mail in mails {
            self.add_mail(mail);
        }
    }

    /// Sort entries by received timestamp (absent timestamps first) and mark
    /// the thread as ordered
    pub fn sort(&mut self, descending: bool) {
        self.entries
            .sort_by(|a, b| a.header.received.cmp(&b.header.received));
        if descending {
            self.entries.reverse();
        }
        self.ordered = true;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
