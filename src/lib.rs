//! zip-relay: archive lifecycle for JSON payloads
//!
//! - [`make_zip`] stages JSON payloads (or takes existing files) and builds a zip,
//!   optionally password protected.
//! - [`un_zip`] downloads or locates a zip, extracts it and optionally returns
//!   every `.json` file inside as one bundle keyed by file name.
//!
//! Both return the uniform [`FailureResult`] on error so hosts get the same
//! `{ success, error }` shape whatever went wrong.

pub mod archive;
pub mod bundle;
pub mod config;
pub mod download;
pub mod error;
pub mod logging;
pub mod temp;

pub use archive::{
    ArchiveBuildJob, ArchiveBuildResult, ArchiveBuilder, ArchiveExtractJob, ArchiveExtractResult,
    ArchiveExtractor,
};
pub use bundle::{read_json_files_from_directory, JsonBundle};
pub use config::ZipConfig;
pub use download::{Downloader, HttpDownloader};
pub use error::{FailureResult, ZipError, ZipResult, BUILD_ERROR_TAG, EXTRACT_ERROR_TAG};
pub use temp::{Affix, AffixOptions, TempPathManager};

use tracing::error;

/// Build an archive with `config`
pub async fn make_zip(
    config: &ZipConfig,
    job: &ArchiveBuildJob,
) -> Result<ArchiveBuildResult, FailureResult> {
    ArchiveBuilder::new(config.clone())
        .build(job)
        .await
        .map_err(|e| {
            error!(error = %e, "Archive build failed");
            FailureResult::from_error(BUILD_ERROR_TAG, &e)
        })
}

/// Extract an archive with `config`, downloading over HTTP for URL jobs
pub async fn un_zip(
    config: &ZipConfig,
    job: &ArchiveExtractJob,
) -> Result<ArchiveExtractResult, FailureResult> {
    let extract = async {
        let extractor = ArchiveExtractor::new(config.clone())?;
        extractor.extract(job).await
    };
    extract.await.map_err(|e| {
        error!(error = %e, "Archive extraction failed");
        FailureResult::from_error(EXTRACT_ERROR_TAG, &e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{JsonArchiveJob, PathExtractJob, ZipJsonEntry};
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_make_zip_failure_is_tagged() {
        let dir = TempDir::new().unwrap();
        let config = ZipConfig {
            zip_program: "zip-relay-missing-archiver".to_string(),
            ..Default::default()
        };
        let job = ArchiveBuildJob::Json(JsonArchiveJob {
            dir_path: dir.path().to_path_buf(),
            zip_password: None,
            data: vec![ZipJsonEntry {
                json_name: Some("a.json".to_string()),
                json_data: json!({"x": 1}),
            }],
        });

        let failure = make_zip(&config, &job).await.unwrap_err();
        assert!(!failure.success);
        assert!(failure.error.starts_with("[Error creating zip file] - "));
        assert!(!dir.path().join("a.json").exists());
    }

    #[tokio::test]
    async fn test_un_zip_failure_is_tagged() {
        let dir = TempDir::new().unwrap();
        let config = ZipConfig {
            unzip_program: "zip-relay-missing-extractor".to_string(),
            ..Default::default()
        };
        let job = ArchiveExtractJob::Path(PathExtractJob {
            zip_path: dir.path().join("missing.zip"),
            dir_path: dir.path().to_path_buf(),
            zip_password: None,
            return_json_yn: false,
        });

        let failure = un_zip(&config, &job).await.unwrap_err();
        assert!(failure.error.starts_with("[Error unzip] - "));
    }
}
