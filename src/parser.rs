//! MIME tree transducer: walks the decoded part tree and produces the mail
//! data model, invoking the unwrapping pipeline on attachments.

use crate::error::{ParseError, Result};
use crate::types::{
    Attachment, Body, BodyChild, Content, ContentNode, EmailAddress, File, Header, Mail, MailFile,
    ParseMode, EXT_MAIL,
};
use crate::unwrap::unwrap_file;
use chrono::DateTime;
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use tracing::{debug, warn};

/// Defensive cap on nested-message/container recursion
const MAX_DEPTH: usize = 32;

/// Filename assigned to nested messages that carry none
const DEFAULT_MAIL_FILENAME: &str = "email.eml";

/// Parse raw message bytes into a structured Mail.
///
/// A missing or unparsable From/To header at the top level is a
/// [`ParseError::HeaderDefect`]; a failed attachment unwrap is recorded on
/// that attachment and never aborts the parse.
pub fn parse_mail(raw: &[u8], mode: ParseMode) -> Result<Mail> {
    let parsed = mailparse::parse_mail(raw).map_err(|e| ParseError::Structure(e.to_string()))?;
    let mail = build_mail(&parsed, mode, 0)?;

    debug!(
        "Parsed mail: {:?} from {}",
        mail.header.subject,
        mail.header
            .from
            .as_ref()
            .map_or("<unknown>", |a| a.address.as_str())
    );

    Ok(mail)
}

/// Parse a message given as a string
pub fn parse_mail_str(raw: &str, mode: ParseMode) -> Result<Mail> {
    parse_mail(raw.as_bytes(), mode)
}

fn build_mail(part: &ParsedMail, mode: ParseMode, depth: usize) -> Result<Mail> {
    if depth > MAX_DEPTH {
        return Err(ParseError::NestingTooDeep(MAX_DEPTH));
    }

    let header = parse_header(part)?;
    let mut content = Vec::new();
    let mut attachments = Vec::new();
    collect_parts(part, mode, depth, &mut content, &mut attachments)?;

    Ok(Mail {
        header,
        body: assemble_body(content, attachments, mode),
        thread_id: None,
    })
}

/// Extract the typed header fields.
///
/// From is mandatory and reduced to its first address; To is mandatory with a
/// Delivered-To fallback; Cc, Subject and Date are optional. A Date that does
/// not parse yields an absent timestamp, never an error.
fn parse_header(part: &ParsedMail) -> Result<Header> {
    let from_raw =
        header_value(part, "From").ok_or_else(|| ParseError::HeaderDefect("From".into()))?;
    let from = parse_address_list(&from_raw)
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::HeaderDefect("From".into()))?;

    let to_raw = header_value(part, "To")
        .or_else(|| header_value(part, "Delivered-To"))
        .ok_or_else(|| ParseError::HeaderDefect("To".into()))?;
    let to = parse_address_list(&to_raw);
    if to.is_empty() {
        return Err(ParseError::HeaderDefect("To".into()));
    }

    let cc = header_value(part, "Cc")
        .map(|raw| parse_address_list(&raw))
        .unwrap_or_default();

    let subject = header_value(part, "Subject");

    let received = header_value(part, "Date")
        .and_then(|raw| DateTime::parse_from_rfc2822(raw.trim()).ok());

    Ok(Header {
        from: Some(from),
        to,
        cc,
        subject,
        received,
    })
}

fn collect_parts(
    part: &ParsedMail,
    mode: ParseMode,
    depth: usize,
    content: &mut Vec<BodyChild>,
    attachments: &mut Vec<Attachment>,
) -> Result<()> {
    if part.subparts.is_empty() {
        if is_attachment(part) {
            attachments.extend(transduce_attachment(part, depth)?);
        } else {
            content.push(BodyChild::Node(leaf_node(part)?));
        }
        return Ok(());
    }

    for child in &part.subparts {
        if let Some(nested) = try_parse_nested_message(child, depth)? {
            attachments.push(Attachment::Mail(nested));
        } else if is_attachment(child) {
            attachments.extend(transduce_attachment(child, depth)?);
        } else if child.subparts.is_empty() {
            content.push(BodyChild::Node(leaf_node(child)?));
        } else {
            match mode {
                ParseMode::Structured => {
                    content.push(BodyChild::Node(container_node(child, depth + 1)?));
                }
                ParseMode::Flattened => flatten_container(child, depth + 1, content)?,
            }
        }
    }

    Ok(())
}

/// Probe a part for a nested message.
///
/// A part qualifies when its content-type is message/rfc822 or its filename
/// suggests a message container, and its inner payload extracts a valid
/// header. Header-extraction failure is the discriminator between "is a
/// mail" and "is an opaque blob": on failure this returns `None` and the part
/// falls through to the attachment/leaf rules.
fn try_parse_nested_message(part: &ParsedMail, depth: usize) -> Result<Option<MailFile>> {
    let filename = part_filename(part);
    let named_as_message = filename
        .as_deref()
        .is_some_and(|f| f.to_lowercase().contains("eml"));
    if !part.ctype.mimetype.eq_ignore_ascii_case("message/rfc822") && !named_as_message {
        return Ok(None);
    }

    let inner_bytes = part
        .get_body_raw()
        .map_err(|e| ParseError::Decode(e.to_string()))?;
    let Ok(inner) = mailparse::parse_mail(&inner_bytes) else {
        return Ok(None);
    };

    match build_mail(&inner, ParseMode::Structured, depth + 1) {
        Ok(mail) => Ok(Some(MailFile {
            file: File {
                filename: filename.unwrap_or_else(|| DEFAULT_MAIL_FILENAME.to_string()),
                content: Content::Binary(inner_bytes),
                encoding: header_value(part, "Content-Transfer-Encoding"),
            },
            mail,
        })),
        Err(ParseError::HeaderDefect(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Wrap a non-attachment multipart section as a container node
fn container_node(part: &ParsedMail, depth: usize) -> Result<ContentNode> {
    if depth > MAX_DEPTH {
        return Err(ParseError::NestingTooDeep(MAX_DEPTH));
    }

    let mut children = Vec::new();
    for child in &part.subparts {
        transduce_child(child, depth, &mut children)?;
    }

    Ok(ContentNode::Container {
        content_type: part.ctype.mimetype.clone(),
        children,
    })
}

fn transduce_child(part: &ParsedMail, depth: usize, out: &mut Vec<BodyChild>) -> Result<()> {
    if let Some(nested) = try_parse_nested_message(part, depth)? {
        out.push(BodyChild::Attachment(Attachment::Mail(nested)));
        return Ok(());
    }
    // An attachment disposition wins over multipart at every nesting level
    if is_attachment(part) {
        for att in transduce_attachment(part, depth)? {
            out.push(BodyChild::Attachment(att));
        }
        return Ok(());
    }
    if !part.subparts.is_empty() {
        out.push(BodyChild::Node(container_node(part, depth + 1)?));
        return Ok(());
    }
    out.push(BodyChild::Node(leaf_node(part)?));
    Ok(())
}

/// Splice a multipart section directly into the caller's accumulator,
/// skipping the container layer (flattened mode)
fn flatten_container(part: &ParsedMail, depth: usize, out: &mut Vec<BodyChild>) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(ParseError::NestingTooDeep(MAX_DEPTH));
    }

    for child in &part.subparts {
        if let Some(nested) = try_parse_nested_message(child, depth)? {
            out.push(BodyChild::Attachment(Attachment::Mail(nested)));
        } else if !child.subparts.is_empty() && !is_attachment(child) {
            flatten_container(child, depth + 1, out)?;
        } else {
            transduce_child(child, depth, out)?;
        }
    }

    Ok(())
}

/// Build a File from an attachment part and run it through the unwrapping
/// pipeline. Unwrap failure is fatal for this attachment only: it is carried
/// as [`Attachment::Failed`] and siblings are unaffected.
fn transduce_attachment(part: &ParsedMail, depth: usize) -> Result<Vec<Attachment>> {
    let file = File {
        filename: part_filename(part).unwrap_or_default(),
        content: decoded_content(part)?,
        encoding: header_value(part, "Content-Transfer-Encoding"),
    };

    match unwrap_file(file.clone()) {
        Ok(files) => {
            let mut out = Vec::with_capacity(files.len());
            for unwrapped in files {
                out.push(promote_mail_file(unwrapped, depth)?);
            }
            Ok(out)
        }
        Err(err) => {
            warn!("Attachment {} could not be unwrapped: {err}", file.filename);
            Ok(vec![Attachment::Failed {
                file,
                error: err.to_string(),
            }])
        }
    }
}

/// Re-enter the transducer on unwrapped files that are themselves messages.
/// A `.eml` file whose content is not a well-formed message stays an opaque
/// File.
fn promote_mail_file(file: File, depth: usize) -> Result<Attachment> {
    if file.extension() == EXT_MAIL {
        match parse_nested_bytes(file.content.as_bytes(), depth + 1) {
            Ok(mail) => return Ok(Attachment::Mail(MailFile { file, mail })),
            Err(e @ ParseError::NestingTooDeep(_)) => return Err(e),
            Err(_) => {}
        }
    }
    Ok(Attachment::File(file))
}

fn parse_nested_bytes(raw: &[u8], depth: usize) -> Result<Mail> {
    let parsed = mailparse::parse_mail(raw).map_err(|e| ParseError::Structure(e.to_string()))?;
    build_mail(&parsed, ParseMode::Structured, depth)
}

fn assemble_body(content: Vec<BodyChild>, attachments: Vec<Attachment>, mode: ParseMode) -> Body {
    match mode {
        ParseMode::Structured => {
            let mut nodes = Vec::with_capacity(content.len());
            let mut attachments = attachments;
            for child in content {
                match child {
                    BodyChild::Node(node) => nodes.push(node),
                    BodyChild::Attachment(att) => attachments.push(att),
                }
            }
            Body::Structured {
                content: nodes,
                attachments,
            }
        }
        ParseMode::Flattened => {
            let mut text = String::new();
            let mut html = String::new();
            let mut inline = Vec::new();
            for child in content {
                match child {
                    BodyChild::Attachment(att) => inline.push(att),
                    BodyChild::Node(ContentNode::Leaf {
                        content_type,
                        content,
                    }) => {
                        if content_type == "text/plain" {
                            if let Some(t) = content.as_text() {
                                text.push_str(t);
                            }
                        } else if content_type == "text/html" {
                            if let Some(t) = content.as_text() {
                                html.push_str(t);
                            }
                        }
                    }
                    BodyChild::Node(ContentNode::Container { .. }) => {}
                }
            }
            Body::Flattened {
                text,
                html,
                inline,
                attachments,
            }
        }
    }
}

fn leaf_node(part: &ParsedMail) -> Result<ContentNode> {
    Ok(ContentNode::Leaf {
        content_type: part.ctype.mimetype.clone(),
        content: decoded_content(part)?,
    })
}

/// Decode a part's payload: charset-decoded text for text/* parts, raw bytes
/// otherwise. An empty body yields empty content, never an error.
fn decoded_content(part: &ParsedMail) -> Result<Content> {
    if part.ctype.mimetype.starts_with("text/") {
        Ok(Content::Text(
            part.get_body()
                .map_err(|e| ParseError::Decode(e.to_string()))?,
        ))
    } else {
        Ok(Content::Binary(
            part.get_body_raw()
                .map_err(|e| ParseError::Decode(e.to_string()))?,
        ))
    }
}

/// A part counts as an attachment when it carries an attachment disposition
/// or any filename
fn is_attachment(part: &ParsedMail) -> bool {
    part.get_content_disposition().disposition == DispositionType::Attachment
        || part_filename(part).is_some()
}

fn part_filename(part: &ParsedMail) -> Option<String> {
    let disposition = part.get_content_disposition();
    disposition
        .params
        .get("filename")
        .cloned()
        .or_else(|| part.ctype.params.get("name").cloned())
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
}

fn header_value(part: &ParsedMail, name: &str) -> Option<String> {
    part.headers
        .get_first_value(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split a raw address header on commas and keep every token that parses
fn parse_address_list(raw: &str) -> Vec<EmailAddress> {
    raw.split(',').filter_map(EmailAddress::parse).collect()
}
