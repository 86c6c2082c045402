//! JSON serialization for page annotation records.
//!
//! Each page is stored as one pretty-printed JSON document named
//! `<image_id>.json`. Writes go through a uniquely named sibling temporary
//! file followed by a rename, so a failed write never leaves a truncated
//! record behind.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use super::model::ImageAnnotation;
use crate::error::MangalabelError;

/// Reads a page record from a JSON file.
///
/// # Errors
/// Returns [`MangalabelError::Storage`] if the file cannot be opened and
/// [`MangalabelError::CorruptRecord`] if it does not parse.
pub fn read_record(path: &Path) -> Result<ImageAnnotation, MangalabelError> {
    let file = File::open(path).map_err(|source| MangalabelError::Storage {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).map_err(|source| MangalabelError::CorruptRecord {
        path: path.to_path_buf(),
        message: source.to_string(),
    })
}

/// Writes a page record to a JSON file, replacing any previous content.
///
/// The record is written to a uniquely named temporary file in the same
/// directory and renamed over `path`. Concurrent writers never share a
/// temporary file, and the temporary file is removed if any step fails.
///
/// # Errors
/// Returns [`MangalabelError::Storage`] on I/O failure and
/// [`MangalabelError::RecordWrite`] if serialization fails.
pub fn write_record(path: &Path, record: &ImageAnnotation) -> Result<(), MangalabelError> {
    let storage = |source| MangalabelError::Storage {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(storage)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(storage)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, record).map_err(|source| {
            MangalabelError::RecordWrite {
                path: path.to_path_buf(),
                source,
            }
        })?;
        writer.write_all(b"\n").map_err(storage)?;
        writer.flush().map_err(storage)?;
    }
    tmp.persist(path).map_err(|e| storage(e.error))?;
    Ok(())
}

/// Reads a page record from a JSON string.
///
/// Useful for testing without file I/O.
pub fn from_json_str(json: &str) -> Result<ImageAnnotation, serde_json::Error> {
    serde_json::from_str(json)
}

/// Reads a page record from raw bytes.
pub fn from_json_slice(bytes: &[u8]) -> Result<ImageAnnotation, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Writes a page record to a pretty-printed JSON string.
pub fn to_json_string(record: &ImageAnnotation) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(record)
}
