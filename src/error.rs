//! Error types for archive build/extract operations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for zip operations
pub type ZipResult<T> = Result<T, ZipError>;

/// Tag prepended to failures surfaced by the archive builder
pub const BUILD_ERROR_TAG: &str = "[Error creating zip file]";

/// Tag prepended to failures surfaced by the archive extractor
pub const EXTRACT_ERROR_TAG: &str = "[Error unzip]";

/// Errors that can occur while staging, archiving, downloading or extracting
#[derive(Debug)]
pub enum ZipError {
    /// Affix declaration was neither a string nor an options object
    InvalidAffix(String),
    /// Directory could not be created
    DirectoryCreate { path: PathBuf, source: io::Error },
    /// Archiver process could not be spawned
    ArchiveSpawn { program: String, source: io::Error },
    /// Archiver exited with a nonzero code
    ArchiveProcess { exit_code: i32 },
    /// Download answered with a non-200 status
    Download { status_code: u16 },
    /// Download failed before or while streaming the body
    DownloadTransport(String),
    /// Extractor process could not be spawned
    ExtractSpawn { program: String, source: io::Error },
    /// Extractor exited with a nonzero code
    ExtractProcess { exit_code: i32 },
    /// Child process did not exit before the deadline
    ProcessTimeout { program: String, after: Duration },
    /// Directory listing or file read failed during aggregation
    DirectoryRead { path: PathBuf, source: io::Error },
    /// Structured data could not be parsed
    JsonParse { message: String },
    /// Payload could not be serialized or written to the staging directory
    Staging(String),
    /// Invalid configuration value
    Config(String),
}

impl fmt::Display for ZipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZipError::InvalidAffix(e) => write!(f, "Unknown affix declaration: {}", e),
            ZipError::DirectoryCreate { path, source } => {
                write!(f, "Failed to create directory {}: {}", path.display(), source)
            }
            ZipError::ArchiveSpawn { program, source } => {
                write!(f, "Failed to start {}: {}", program, source)
            }
            ZipError::ArchiveProcess { exit_code } => write!(f, "zip failed with code: {}", exit_code),
            ZipError::Download { status_code } => {
                write!(f, "Failed to download stream. error code is : {}", status_code)
            }
            ZipError::DownloadTransport(e) => write!(f, "Download error: {}", e),
            ZipError::ExtractSpawn { program, source } => {
                write!(f, "Failed to start {}: {}", program, source)
            }
            ZipError::ExtractProcess { exit_code } => write!(f, "Unzip failed with code: {}", exit_code),
            ZipError::ProcessTimeout { program, after } => {
                write!(f, "{} did not exit within {:?}", program, after)
            }
            ZipError::DirectoryRead { path, source } => {
                write!(f, "[JSON converting error] - {}: {}", path.display(), source)
            }
            ZipError::JsonParse { message } => write!(f, "[JSON parsing error] - {}", message),
            ZipError::Staging(e) => write!(f, "Failed to stage payload: {}", e),
            ZipError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl std::error::Error for ZipError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ZipError::DirectoryCreate { source, .. } => Some(source),
            ZipError::ArchiveSpawn { source, .. } => Some(source),
            ZipError::ExtractSpawn { source, .. } => Some(source),
            ZipError::DirectoryRead { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ZipError {
    fn from(err: serde_json::Error) -> Self {
        ZipError::JsonParse {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ZipError {
    fn from(err: reqwest::Error) -> Self {
        ZipError::DownloadTransport(err.to_string())
    }
}

/// Uniform failure value handed back to callers instead of a raw error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureResult {
    pub success: bool,
    pub error: String,
}

impl FailureResult {
    /// Wrap an error with the phase tag, e.g. `[Error unzip] - Unzip failed with code: 82`
    pub fn from_error(tag: &str, err: &ZipError) -> Self {
        Self {
            success: false,
            error: format!("{} - {}", tag, err),
        }
    }
}

impl fmt::Display for FailureResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.error)
    }
}

impl std::error::Error for FailureResult {}
