//! Attachment unwrapping pipeline: archives are exploded into their member
//! files, signed envelopes are opened, text-like blobs are decoded, and
//! everything else passes through unchanged.

use crate::error::UnwrapError;
use crate::types::{extension_of, Content, File, EXT_ARCHIVE, EXT_ENVELOPE};
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

/// Extensions whose content is decoded to text and otherwise left alone
const TEXT_EXTENSIONS: &[&str] = &[".txt", ".xml"];

/// Defensive cap on archive-in-archive nesting
const MAX_UNWRAP_DEPTH: usize = 16;

/// Options for the unwrapping pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct UnwrapOptions {
    /// Strip directory prefixes from archive member filenames. Off by
    /// default: members keep their full archive path, and directory entries
    /// themselves are skipped either way.
    pub flatten_directories: bool,
}

/// Unwrap a file with default options.
///
/// Dispatch is by derived extension and repeats until a fixed point: every
/// produced file that is itself unwrappable is unwrapped again. Files with an
/// unrecognized extension come back unchanged, so re-unwrapping an already
/// unwrapped file is a no-op.
///
/// A failure is fatal for this one file; callers processing several
/// attachments handle the error per attachment.
pub fn unwrap_file(file: File) -> Result<Vec<File>, UnwrapError> {
    unwrap_file_with(file, &UnwrapOptions::default())
}

/// Unwrap a file with explicit options
pub fn unwrap_file_with(file: File, options: &UnwrapOptions) -> Result<Vec<File>, UnwrapError> {
    unwrap_at(file, options, 0)
}

fn unwrap_at(file: File, options: &UnwrapOptions, depth: usize) -> Result<Vec<File>, UnwrapError> {
    if depth > MAX_UNWRAP_DEPTH {
        return Err(UnwrapError::NestingLimit {
            filename: file.filename,
            limit: MAX_UNWRAP_DEPTH,
        });
    }

    let extension = file.extension();

    if TEXT_EXTENSIONS.contains(&extension.as_str()) {
        return Ok(vec![into_text(file)]);
    }

    match extension.as_str() {
        EXT_ARCHIVE => {
            debug!("Extracting archive {}", file.filename);
            let members = extract_archive(&file, options)?;
            let mut out = Vec::with_capacity(members.len());
            for member in members {
                out.extend(unwrap_at(member, options, depth + 1)?);
            }
            Ok(out)
        }
        EXT_ENVELOPE => {
            debug!("Opening signed envelope {}", file.filename);
            let payload = open_envelope(&file)?;
            let unwrapped = File {
                filename: strip_extension(&file.filename),
                content: Content::Binary(payload),
                encoding: None,
            };
            unwrap_at(unwrapped, options, depth + 1)
        }
        _ => Ok(vec![file]),
    }
}

/// Decode a binary text-like payload to a string, best-effort
fn into_text(mut file: File) -> File {
    if let Content::Binary(bytes) = &file.content {
        file.content = Content::Text(String::from_utf8_lossy(bytes).into_owned());
    }
    file
}

/// Enumerate archive members in memory.
///
/// Directory entries are skipped; member files keep their full archive path
/// as filename unless `flatten_directories` is set. Directory trees inside
/// the archive are not traversed as such.
fn extract_archive(file: &File, options: &UnwrapOptions) -> Result<Vec<File>, UnwrapError> {
    let archive_error = |details: String| UnwrapError::Archive {
        filename: file.filename.clone(),
        details,
    };

    let cursor = Cursor::new(file.content.as_bytes());
    let mut archive = ZipArchive::new(cursor).map_err(|e| archive_error(e.to_string()))?;

    let mut members = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| archive_error(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }

        let mut bytes = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| archive_error(e.to_string()))?;

        let name = entry.name();
        let filename = if options.flatten_directories {
            name.rsplit('/').next().unwrap_or(name).to_string()
        } else {
            name.to_string()
        };

        members.push(File {
            filename,
            content: Content::Binary(bytes),
            encoding: None,
        });
    }

    Ok(members)
}

/// Extract the payload embedded in a DER PKCS#7 signed envelope.
///
/// The signature and the signer chain are deliberately not validated: this
/// step only recovers content, it does not assert trust.
fn open_envelope(file: &File) -> Result<Vec<u8>, UnwrapError> {
    let envelope_error = |details: String| UnwrapError::Envelope {
        filename: file.filename.clone(),
        details,
    };

    let pkcs7 =
        Pkcs7::from_der(file.content.as_bytes()).map_err(|e| envelope_error(e.to_string()))?;
    let certs = Stack::new().map_err(|e| envelope_error(e.to_string()))?;
    let store = X509StoreBuilder::new()
        .map_err(|e| envelope_error(e.to_string()))?
        .build();

    let mut payload = Vec::new();
    pkcs7
        .verify(
            &certs,
            &store,
            None,
            Some(&mut payload),
            Pkcs7Flags::NOVERIFY | Pkcs7Flags::NOSIGS,
        )
        .map_err(|e| envelope_error(e.to_string()))?;

    Ok(payload)
}

/// Filename minus its derived extension (`invoice.xml.p7m` -> `invoice.xml`)
fn strip_extension(filename: &str) -> String {
    let extension = extension_of(filename);
    filename[..filename.len() - extension.len()].to_string()
}
