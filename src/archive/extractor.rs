//! Archive extraction
//!
//! Per call the extractor walks through
//! `Resolving -> Downloading (URL jobs) -> Extracting -> Aggregating (if asked) -> Done`.
//! Any stage can fail the call; nothing is retried.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::process::{self, password_args, ProcessFailure};
use super::types::{ArchiveExtractJob, ArchiveExtractResult};
use crate::bundle::{read_json_files_from_directory, JsonBundle};
use crate::config::ZipConfig;
use crate::download::{Downloader, HttpDownloader};
use crate::error::{ZipError, ZipResult};
use crate::temp::Affix;

/// Progress of one extract call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStage {
    Resolving,
    Downloading,
    Extracting,
    Aggregating,
    Done,
}

impl fmt::Display for ExtractStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractStage::Resolving => write!(f, "resolving"),
            ExtractStage::Downloading => write!(f, "downloading"),
            ExtractStage::Extracting => write!(f, "extracting"),
            ExtractStage::Aggregating => write!(f, "aggregating"),
            ExtractStage::Done => write!(f, "done"),
        }
    }
}

/// Resolved archive location and extraction target
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedArchive {
    zip_path: PathBuf,
    destination: PathBuf,
}

/// Extracts archives by driving the external `unzip` process
#[derive(Clone)]
pub struct ArchiveExtractor {
    config: ZipConfig,
    downloader: Arc<dyn Downloader>,
}

impl fmt::Debug for ArchiveExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveExtractor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ArchiveExtractor {
    /// Extractor that downloads over HTTP
    pub fn new(config: ZipConfig) -> ZipResult<Self> {
        let downloader = HttpDownloader::new(&config)?;
        Ok(Self::with_downloader(config, Arc::new(downloader)))
    }

    /// Extractor with a caller-supplied download capability
    pub fn with_downloader(config: ZipConfig, downloader: Arc<dyn Downloader>) -> Self {
        Self { config, downloader }
    }

    pub fn config(&self) -> &ZipConfig {
        &self.config
    }

    /// Fetch or locate the archive, extract it, and optionally bundle its `.json` files.
    #[instrument(skip_all, fields(dir = %job.dir_path().display()))]
    pub async fn extract(&self, job: &ArchiveExtractJob) -> ZipResult<ArchiveExtractResult> {
        enter(ExtractStage::Resolving);
        let resolved = self.resolve(job).await?;

        enter(ExtractStage::Extracting);
        tokio::fs::create_dir_all(&resolved.destination)
            .await
            .map_err(|source| ZipError::DirectoryCreate {
                path: resolved.destination.clone(),
                source,
            })?;

        let mut args: Vec<OsString> = password_args(job.zip_password());
        args.push("-d".into());
        args.push(resolved.destination.clone().into_os_string());
        args.push(resolved.zip_path.clone().into_os_string());

        info!(
            zip_path = %resolved.zip_path.display(),
            destination = %resolved.destination.display(),
            "Extracting archive"
        );

        let outcome = process::run(
            &self.config.unzip_program,
            &args,
            None,
            self.config.process_timeout(),
        )
        .await
        .map_err(|failure| match failure {
            ProcessFailure::Spawn(source) => ZipError::ExtractSpawn {
                program: self.config.unzip_program.clone(),
                source,
            },
            ProcessFailure::TimedOut(after) => ZipError::ProcessTimeout {
                program: self.config.unzip_program.clone(),
                after,
            },
        })?;

        if !outcome.success() {
            warn!(exit_code = outcome.exit_code, stderr = %outcome.stderr.trim(), "Extractor failed");
            return Err(ZipError::ExtractProcess {
                exit_code: outcome.exit_code,
            });
        }

        let json_data = if job.return_json() {
            enter(ExtractStage::Aggregating);
            Some(aggregate(resolved.destination.clone()).await?)
        } else {
            None
        };

        enter(ExtractStage::Done);
        info!(
            destination = %resolved.destination.display(),
            json_files = json_data.as_ref().map(|bundle| bundle.len()),
            "Archive extracted"
        );

        Ok(ArchiveExtractResult {
            success: true,
            json_data,
        })
    }

    async fn resolve(&self, job: &ArchiveExtractJob) -> ZipResult<ResolvedArchive> {
        match job {
            ArchiveExtractJob::Url(job) => {
                if !job.dir_path.exists() {
                    tokio::fs::create_dir_all(&job.dir_path)
                        .await
                        .map_err(|source| ZipError::DirectoryCreate {
                            path: job.dir_path.clone(),
                            source,
                        })?;
                }

                let temp = self.config.temp_manager();
                let zip_path = temp.path(Some(&Affix::in_dir(&job.dir_path, ".zip")));

                enter(ExtractStage::Downloading);
                let bytes = self
                    .downloader
                    .download(&job.url, &job.headers, &zip_path)
                    .await?;
                debug!(zip_path = %zip_path.display(), bytes, "Archive downloaded");

                Ok(ResolvedArchive {
                    zip_path,
                    destination: job.dir_path.clone(),
                })
            }
            ArchiveExtractJob::Path(job) => Ok(ResolvedArchive {
                destination: local_destination(&job.dir_path, &job.zip_path),
                zip_path: job.zip_path.clone(),
            }),
        }
    }
}

/// `dir_path/<archive stem>`, or `dir_path` itself for a stem-less path
fn local_destination(dir_path: &Path, zip_path: &Path) -> PathBuf {
    match zip_path.file_stem() {
        Some(stem) => dir_path.join(stem),
        None => dir_path.to_path_buf(),
    }
}

/// Scan the extracted tree on the blocking pool
async fn aggregate(destination: PathBuf) -> ZipResult<JsonBundle> {
    let scanned = destination.clone();
    tokio::task::spawn_blocking(move || read_json_files_from_directory(&scanned))
        .await
        .map_err(|e| ZipError::DirectoryRead {
            path: destination,
            source: io::Error::new(io::ErrorKind::Other, e),
        })?
}

fn enter(stage: ExtractStage) {
    debug!(stage = %stage, "Extract stage");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::types::{PathExtractJob, UrlExtractJob};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records requests and writes fixed bytes, or refuses with a status
    struct FakeDownloader {
        status: Option<u16>,
        requests: Mutex<Vec<(String, HashMap<String, String>, PathBuf)>>,
    }

    impl FakeDownloader {
        fn serving() -> Self {
            Self {
                status: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn refusing(status: u16) -> Self {
            Self {
                status: Some(status),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Downloader for FakeDownloader {
        async fn download(
            &self,
            url: &str,
            headers: &HashMap<String, String>,
            dest: &Path,
        ) -> ZipResult<u64> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), headers.clone(), dest.to_path_buf()));
            if let Some(status_code) = self.status {
                return Err(ZipError::Download { status_code });
            }
            std::fs::write(dest, b"not really a zip").unwrap();
            Ok(16)
        }
    }

    fn config_with_unzip(program: &str) -> ZipConfig {
        ZipConfig {
            unzip_program: program.to_string(),
            ..Default::default()
        }
    }

    fn url_job(dir: &Path, return_json: bool) -> ArchiveExtractJob {
        ArchiveExtractJob::Url(UrlExtractJob {
            url: "https://example.com/archive.zip".to_string(),
            dir_path: dir.to_path_buf(),
            zip_password: Some("pw".to_string()),
            return_json_yn: return_json,
            headers: [("Authorization".to_string(), "Bearer t".to_string())]
                .into_iter()
                .collect(),
        })
    }

    #[test]
    fn test_local_destination_uses_archive_stem() {
        assert_eq!(
            local_destination(Path::new("/work"), Path::new("/in/report.zip")),
            PathBuf::from("/work/report")
        );
        assert_eq!(local_destination(Path::new("/work"), Path::new("/")), PathBuf::from("/work"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_url_job_downloads_then_bundles() {
        let dir = TempDir::new().unwrap();
        let work = dir.path().join("work");
        std::fs::create_dir(&work).unwrap();
        std::fs::write(work.join("a.json"), r#"{"x":1}"#).unwrap();

        let downloader = Arc::new(FakeDownloader::serving());
        let extractor = ArchiveExtractor::with_downloader(config_with_unzip("true"), downloader.clone());

        let result = extractor.extract(&url_job(&work, true)).await.unwrap();

        assert!(result.success);
        assert_eq!(result.json_data.unwrap()["a.json"], json!({"x": 1}));

        let requests = downloader.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "https://example.com/archive.zip");
        assert_eq!(requests[0].1["Authorization"], "Bearer t");
        assert!(requests[0].2.starts_with(&work));
        assert_eq!(requests[0].2.extension().unwrap(), "zip");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_aggregate_off_the_runtime_thread() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.json"), r#"{"y":2}"#).unwrap();

        let bundle = aggregate(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(bundle["b.json"], json!({"y": 2}));

        let missing = aggregate(dir.path().join("absent")).await;
        assert!(matches!(missing, Err(ZipError::DirectoryRead { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_url_job_without_bundle() {
        let dir = TempDir::new().unwrap();
        let extractor = ArchiveExtractor::with_downloader(
            config_with_unzip("true"),
            Arc::new(FakeDownloader::serving()),
        );

        let result = extractor.extract(&url_job(dir.path(), false)).await.unwrap();
        assert!(result.success);
        assert!(result.json_data.is_none());
    }

    #[tokio::test]
    async fn test_download_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let extractor = ArchiveExtractor::with_downloader(
            config_with_unzip("zip-relay-missing-extractor"),
            Arc::new(FakeDownloader::refusing(503)),
        );

        let result = extractor.extract(&url_job(&dir.path().join("new"), true)).await;
        assert!(matches!(result, Err(ZipError::Download { status_code: 503 })));
        assert!(dir.path().join("new").is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_extract_process_error() {
        let dir = TempDir::new().unwrap();
        let extractor = ArchiveExtractor::with_downloader(
            config_with_unzip("false"),
            Arc::new(FakeDownloader::serving()),
        );
        let job = ArchiveExtractJob::Path(PathExtractJob {
            zip_path: dir.path().join("in.zip"),
            dir_path: dir.path().to_path_buf(),
            zip_password: None,
            return_json_yn: true,
        });

        let result = extractor.extract(&job).await;
        assert!(matches!(result, Err(ZipError::ExtractProcess { exit_code: 1 })));
    }

    #[tokio::test]
    async fn test_missing_extractor_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let extractor = ArchiveExtractor::with_downloader(
            config_with_unzip("zip-relay-missing-extractor"),
            Arc::new(FakeDownloader::serving()),
        );
        let job = ArchiveExtractJob::Path(PathExtractJob {
            zip_path: dir.path().join("in.zip"),
            dir_path: dir.path().to_path_buf(),
            zip_password: None,
            return_json_yn: false,
        });

        let result = extractor.extract(&job).await;
        assert!(matches!(result, Err(ZipError::ExtractSpawn { .. })));
    }
}
