//! Temporary path naming and tracked directory cleanup
//!
//! Names are synthesized from the current date, the process id and a random
//! token, so two calls practically never collide. Nothing probes the
//! filesystem before a name is handed out: a collision surfaces later as a
//! failed `mkdir` or write.
//!
//! ```text
//! <dir>/<prefix><YYYY><month0><day>-<pid>-<random11><suffix>
//! ```

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{ZipError, ZipResult};

/// Length of the random token embedded in synthesized names
pub const RANDOM_TOKEN_LEN: usize = 11;

/// Structured naming recipe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffixOptions {
    pub dir: Option<PathBuf>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// Used verbatim as the file name when present
    pub default_name: Option<String>,
}

/// How to name a temporary path: a bare prefix or a full recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Affix {
    Prefix(String),
    Options(AffixOptions),
}

impl Affix {
    /// Affix with a directory and suffix, the shape used for archive output paths
    pub fn in_dir(dir: impl Into<PathBuf>, suffix: &str) -> Self {
        Affix::Options(AffixOptions {
            dir: Some(dir.into()),
            suffix: Some(suffix.to_string()),
            ..Default::default()
        })
    }

    /// Affix that resolves to `dir/name` exactly
    pub fn named(dir: impl Into<PathBuf>, name: &str) -> Self {
        Affix::Options(AffixOptions {
            dir: Some(dir.into()),
            default_name: Some(name.to_string()),
            ..Default::default()
        })
    }

    /// Decode an affix from loosely typed JSON.
    ///
    /// Strings are prefixes, objects are options, `null` means no affix.
    pub fn from_value(value: &Value) -> ZipResult<Option<Affix>> {
        match value {
            Value::Null => Ok(None),
            Value::String(prefix) => Ok(Some(Affix::Prefix(prefix.clone()))),
            Value::Object(_) => serde_json::from_value::<AffixOptions>(value.clone())
                .map(|options| Some(Affix::Options(options)))
                .map_err(|e| ZipError::InvalidAffix(format!("{}: {}", value, e))),
            other => Err(ZipError::InvalidAffix(other.to_string())),
        }
    }

    fn options(&self) -> AffixOptions {
        match self {
            Affix::Prefix(prefix) => AffixOptions {
                prefix: Some(prefix.clone()),
                ..Default::default()
            },
            Affix::Options(options) => options.clone(),
        }
    }
}

impl From<&str> for Affix {
    fn from(prefix: &str) -> Self {
        Affix::Prefix(prefix.to_string())
    }
}

impl From<AffixOptions> for Affix {
    fn from(options: AffixOptions) -> Self {
        Affix::Options(options)
    }
}

/// Random lowercase alphanumeric token
fn random_token() -> String {
    let mut token = uuid::Uuid::new_v4().simple().to_string();
    token.truncate(RANDOM_TOKEN_LEN);
    token
}

/// Creates uniquely named paths and removes the directories it made.
///
/// The tracked list is guarded by a mutex so a single manager can be shared
/// between concurrent builds. Dropping the manager runs [`TempPathManager::clean`].
#[derive(Debug)]
pub struct TempPathManager {
    root: PathBuf,
    dirs_to_delete: Mutex<VecDeque<PathBuf>>,
}

impl Default for TempPathManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TempPathManager {
    /// Manager rooted at the system temp directory
    pub fn new() -> Self {
        Self::with_root(std::env::temp_dir())
    }

    /// Manager rooted at `root` for affixes without their own `dir`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dirs_to_delete: Mutex::new(VecDeque::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Synthesize a path. Never touches the filesystem.
    pub fn path(&self, affix: Option<&Affix>) -> PathBuf {
        let options = affix.map(Affix::options).unwrap_or_default();

        let name = match options.default_name {
            Some(name) => name,
            None => {
                let now = chrono::Local::now();
                format!(
                    "{}{}{}{}-{}-{}{}",
                    options.prefix.as_deref().unwrap_or(""),
                    now.year(),
                    now.month0(),
                    now.day(),
                    std::process::id(),
                    random_token(),
                    options.suffix.as_deref().unwrap_or(""),
                )
            }
        };

        let dir = options.dir.unwrap_or_else(|| self.root.clone());
        trace!(dir = %dir.display(), name = %name, "Synthesized temp path");
        dir.join(name)
    }

    /// Create a fresh directory and remember it for [`TempPathManager::clean`]
    pub fn mkdir(&self, prefix: Option<&str>) -> ZipResult<PathBuf> {
        let affix = prefix.map(Affix::from);
        let dir_path = self.path(affix.as_ref());

        fs::create_dir(&dir_path).map_err(|source| ZipError::DirectoryCreate {
            path: dir_path.clone(),
            source,
        })?;

        self.lock().push_back(dir_path.clone());
        debug!(path = %dir_path.display(), "Created tracked temp directory");
        Ok(dir_path)
    }

    /// Snapshot of the directories awaiting cleanup, oldest first
    pub fn tracked(&self) -> Vec<PathBuf> {
        self.lock().iter().cloned().collect()
    }

    /// Delete every tracked directory, oldest first.
    ///
    /// A directory that is already gone or fails to delete is logged and
    /// skipped; the rest of the queue is still processed.
    pub fn clean(&self) {
        loop {
            // Pop under the lock, delete outside it
            let Some(target) = self.lock().pop_front() else {
                break;
            };
            match delete_directory_recursively(&target) {
                Ok(()) => debug!(path = %target.display(), "Removed temp directory"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %target.display(), "Temp directory already gone")
                }
                Err(e) => warn!(path = %target.display(), error = %e, "Failed to remove temp directory"),
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<PathBuf>> {
        // A panic while holding the lock leaves the queue itself intact
        self.dirs_to_delete
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for TempPathManager {
    fn drop(&mut self) {
        self.clean();
    }
}

/// Depth-first removal: files individually, subdirectories recursively, then the directory
fn delete_directory_recursively(dir_path: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dir_path)? {
        let entry = entry?;
        let full_path = entry.path();
        if entry.file_type()?.is_dir() {
            delete_directory_recursively(&full_path)?;
        } else {
            fs::remove_file(&full_path)?;
        }
    }
    fs::remove_dir(dir_path)
}
