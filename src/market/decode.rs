//! Decoding of `ContentResponse` payloads: base64 text wrapping a zip
//! archive that holds one JSON (occasionally XML) document.

use std::io::{self, Cursor, Read, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use thiserror::Error;
use zip::ZipArchive;
use zip::write::{FileOptions, ZipWriter};

/// Failure to unpack a content payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to read archive entry: {0}")]
    Io(#[from] io::Error),
}

/// Decoded archive content.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    /// Non-JSON entry (e.g. XML), returned verbatim.
    Raw(Vec<u8>),
}

impl Payload {
    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(v) => Some(v),
            Self::Raw(_) => None,
        }
    }
}

/// Decodes a base64 zip payload.
///
/// The first `.json` entry is preferred, otherwise the first entry. Entries
/// that do not parse as JSON come back as [`Payload::Raw`]. An empty string
/// or an empty archive yields `Ok(None)`.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the text is not base64 or the bytes are not
/// a readable zip archive.
pub fn decode_content(b64: &str) -> Result<Option<Payload>, DecodeError> {
    let b64 = b64.trim();
    if b64.is_empty() {
        return Ok(None);
    }
    let bytes = STANDARD.decode(b64)?;
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    if archive.len() == 0 {
        return Ok(None);
    }

    let mut index = 0;
    for i in 0..archive.len() {
        if archive.by_index(i)?.name().to_ascii_lowercase().ends_with(".json") {
            index = i;
            break;
        }
    }

    let mut content = Vec::new();
    archive.by_index(index)?.read_to_end(&mut content)?;
    Ok(Some(match serde_json::from_slice(&content) {
        Ok(value) => Payload::Json(value),
        Err(_) => Payload::Raw(content),
    }))
}

/// Packs `content` as a single deflated zip entry named `name` and encodes
/// it as base64, producing the same shape as a remote `ContentResponse`.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the archive cannot be written.
pub fn encode_content(name: &str, content: &[u8]) -> Result<String, DecodeError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    writer.start_file(name, options)?;
    writer.write_all(content)?;
    let cursor = writer.finish()?;
    Ok(STANDARD.encode(cursor.into_inner()))
}
