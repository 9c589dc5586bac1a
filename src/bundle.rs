//! Aggregate the `.json` files of a directory into one filename-keyed bundle
//!
//! Only direct children are scanned. Some producers serialize their payload
//! twice, so a file whose top-level value is a JSON string gets decoded a
//! second time.

use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

use crate::error::{ZipError, ZipResult};

/// File name (with extension) -> parsed value
pub type JsonBundle = Map<String, Value>;

/// Extension that marks a structured-data file
pub const JSON_EXTENSION: &str = "json";

/// Read every `.json` file directly inside `directory`.
///
/// Any read or parse failure aborts the whole scan; no partial bundle is returned.
/// Duplicate keys cannot occur within one directory listing, but if they did the
/// later entry would win.
pub fn read_json_files_from_directory(directory: &Path) -> ZipResult<JsonBundle> {
    debug!(path = %directory.display(), "Reading JSON files from directory");

    let read_error = |source| ZipError::DirectoryRead {
        path: directory.to_path_buf(),
        source,
    };

    let mut bundle = JsonBundle::new();
    for entry in fs::read_dir(directory).map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        let path = entry.path();

        if path.extension().and_then(|e| e.to_str()) != Some(JSON_EXTENSION) {
            continue;
        }
        if !path.is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().to_string();
        let raw = fs::read_to_string(&path).map_err(|source| ZipError::DirectoryRead {
            path: path.clone(),
            source,
        })?;

        let value = parse_json_content(&raw)?;
        trace!(file = %file_name, "Parsed JSON file");
        bundle.insert(file_name, value);
    }

    debug!(path = %directory.display(), files = bundle.len(), "JSON bundle assembled");
    Ok(bundle)
}

/// Parse file content, unwrapping one extra layer when the top-level value is a string
pub fn parse_json_content(raw: &str) -> ZipResult<Value> {
    match serde_json::from_str::<Value>(raw)? {
        Value::String(inner) => decode_nested(&inner),
        value => Ok(value),
    }
}

fn decode_nested(inner: &str) -> ZipResult<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(inner) {
        return Ok(value);
    }

    // Newlines first, then every backslash (including the ones just added), so a
    // raw newline comes back as the two characters `\` and `n`
    let escaped = inner
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\\', "\\\\");

    serde_json::from_str::<Value>(&escaped).map_err(|e| ZipError::JsonParse {
        message: e.to_string(),
    })
}
