//! Archive creation
//!
//! JSON payloads are staged as files next to the archive, the archiver runs
//! over them, and the staged files are removed again whatever the outcome.

use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use super::process::{self, password_args, ProcessFailure};
use super::types::{ArchiveBuildJob, ArchiveBuildResult, FilesArchiveJob, JsonArchiveJob};
use crate::config::ZipConfig;
use crate::error::{ZipError, ZipResult};
use crate::temp::{Affix, TempPathManager};

/// Staged payload files, removed exactly once when the build is over
struct StagedFiles {
    files: Vec<PathBuf>,
}

impl StagedFiles {
    fn new() -> Self {
        Self { files: Vec::new() }
    }

    fn push(&mut self, path: PathBuf) {
        self.files.push(path);
    }

    async fn remove_all(&mut self) {
        for path in self.files.drain(..) {
            let removed = tokio::fs::remove_file(&path).await;
            log_removal(&path, removed);
        }
    }
}

/// Early returns skip `remove_all`; the guard removes what is left
impl Drop for StagedFiles {
    fn drop(&mut self) {
        for path in self.files.drain(..) {
            let removed = fs::remove_file(&path);
            log_removal(&path, removed);
        }
    }
}

fn log_removal(path: &Path, removed: std::io::Result<()>) {
    match removed {
        Ok(()) => debug!(path = %path.display(), "Removed staged payload"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove staged payload"),
    }
}

/// What the archiver needs: names relative to `cwd`
struct ArchiveInputs {
    names: Vec<OsString>,
    cwd: PathBuf,
}

/// Builds archives by driving the external `zip` process
#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    config: ZipConfig,
}

impl ArchiveBuilder {
    pub fn new(config: ZipConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ZipConfig {
        &self.config
    }

    /// Build an archive inside `job.dir_path`.
    ///
    /// Staged payload files are deleted after the archiver exits, on success
    /// and on failure alike.
    #[instrument(skip_all, fields(dir = %job.dir_path().display()))]
    pub async fn build(&self, job: &ArchiveBuildJob) -> ZipResult<ArchiveBuildResult> {
        let requested_dir = job.dir_path();
        let dir_path = absolutize(requested_dir)?;
        if !dir_path.exists() {
            tokio::fs::create_dir_all(&dir_path)
                .await
                .map_err(|source| ZipError::DirectoryCreate {
                    path: dir_path.clone(),
                    source,
                })?;
            debug!(path = %dir_path.display(), "Created output directory");
        }

        let temp = self.config.temp_manager();
        let zip_path = temp.path(Some(&Affix::in_dir(&dir_path, ".zip")));

        let mut staged = StagedFiles::new();
        let inputs = match job {
            ArchiveBuildJob::Json(job) => stage_payloads(&temp, &dir_path, job, &mut staged).await?,
            ArchiveBuildJob::Files(job) => file_inputs(&dir_path, job),
        };

        let input_count = inputs.names.len();
        let mut args = password_args(job.zip_password());
        args.push("-r".into());
        args.push(zip_path.clone().into_os_string());
        args.extend(inputs.names);

        info!(
            zip_path = %zip_path.display(),
            inputs = input_count,
            encrypted = job.zip_password().is_some_and(|p| !p.is_empty()),
            "Creating archive"
        );

        let outcome = process::run(
            &self.config.zip_program,
            &args,
            Some(&inputs.cwd),
            self.config.process_timeout(),
        )
        .await;

        // The archiver is done with the staged payloads either way
        staged.remove_all().await;

        let outcome = outcome.map_err(|failure| match failure {
            ProcessFailure::Spawn(source) => ZipError::ArchiveSpawn {
                program: self.config.zip_program.clone(),
                source,
            },
            ProcessFailure::TimedOut(after) => ZipError::ProcessTimeout {
                program: self.config.zip_program.clone(),
                after,
            },
        })?;

        if !outcome.success() {
            warn!(exit_code = outcome.exit_code, stderr = %outcome.stderr.trim(), "Archiver failed");
            return Err(ZipError::ArchiveProcess {
                exit_code: outcome.exit_code,
            });
        }

        info!(zip_path = %zip_path.display(), "Archive created");
        Ok(ArchiveBuildResult {
            success: true,
            dir_path: requested_dir.to_path_buf(),
            zip_path,
        })
    }
}

/// Write each payload into `dir_path`, recording it for cleanup
async fn stage_payloads(
    temp: &TempPathManager,
    dir_path: &Path,
    job: &JsonArchiveJob,
    staged: &mut StagedFiles,
) -> ZipResult<ArchiveInputs> {
    let mut names = Vec::with_capacity(job.data.len());

    for entry in &job.data {
        let json_path = match &entry.json_name {
            Some(name) if is_contained_name(name) => temp.path(Some(&Affix::named(dir_path, name))),
            Some(name) => {
                warn!(name = %name, "Payload name escapes the output directory");
                return Err(ZipError::Staging(format!("Invalid payload name: {}", name)));
            }
            None => temp.path(Some(&Affix::in_dir(dir_path, ".json"))),
        };
        let name = json_path
            .strip_prefix(dir_path)
            .map(|relative| relative.as_os_str().to_os_string())
            .map_err(|_| ZipError::Staging(format!("Invalid payload name: {}", json_path.display())))?;

        let bytes = serde_json::to_vec(&entry.json_data)
            .map_err(|e| ZipError::Staging(format!("{}: {}", json_path.display(), e)))?;
        tokio::fs::write(&json_path, bytes)
            .await
            .map_err(|e| ZipError::Staging(format!("{}: {}", json_path.display(), e)))?;

        debug!(path = %json_path.display(), "Staged payload");
        staged.push(json_path);
        names.push(name);
    }

    Ok(ArchiveInputs {
        names,
        cwd: dir_path.to_path_buf(),
    })
}

/// Relative name that stays inside the output directory: no `..`, no root or
/// prefix, ending in a file name
fn is_contained_name(name: &str) -> bool {
    let path = Path::new(name);
    let contained = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    contained && path.file_name().is_some() && !name.contains('\0')
}

/// Base names of existing files; the first file's folder is the working directory
fn file_inputs(dir_path: &Path, job: &FilesArchiveJob) -> ArchiveInputs {
    let names = job
        .files_path
        .iter()
        .filter_map(|path| path.file_name().map(|n| n.to_os_string()))
        .collect();

    let cwd = job
        .files_path
        .first()
        .and_then(|first| first.parent())
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dir_path.to_path_buf());

    ArchiveInputs { names, cwd }
}

/// Anchor a relative path at the current directory; the archiver runs elsewhere
fn absolutize(path: &Path) -> ZipResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|source| ZipError::DirectoryCreate {
            path: path.to_path_buf(),
            source,
        })
}
