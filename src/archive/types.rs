//! Job and result types for archive build/extract
//!
//! All types serialize as camelCase JSON so a host can hand jobs over verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::bundle::JsonBundle;

/// One payload to stage as a file before archiving
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ZipJsonEntry {
    /// File name inside the archive; generated when absent
    #[serde(default)]
    pub json_name: Option<String>,
    pub json_data: Value,
}

/// Archive in-memory JSON payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JsonArchiveJob {
    /// Folder that receives the archive (created if missing)
    pub dir_path: PathBuf,
    /// Archive password; no password when absent
    #[serde(default)]
    pub zip_password: Option<String>,
    pub data: Vec<ZipJsonEntry>,
}

/// Archive existing files; all inputs are expected to share one directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FilesArchiveJob {
    pub dir_path: PathBuf,
    #[serde(default)]
    pub zip_password: Option<String>,
    pub files_path: Vec<PathBuf>,
}

/// What to put into an archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArchiveBuildJob {
    Json(JsonArchiveJob),
    Files(FilesArchiveJob),
}

impl ArchiveBuildJob {
    pub fn dir_path(&self) -> &Path {
        match self {
            ArchiveBuildJob::Json(job) => &job.dir_path,
            ArchiveBuildJob::Files(job) => &job.dir_path,
        }
    }

    pub fn zip_password(&self) -> Option<&str> {
        match self {
            ArchiveBuildJob::Json(job) => job.zip_password.as_deref(),
            ArchiveBuildJob::Files(job) => job.zip_password.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveBuildResult {
    pub success: bool,
    /// Folder holding the archive
    pub dir_path: PathBuf,
    /// The archive itself
    pub zip_path: PathBuf,
}

/// Download an archive, then extract it into `dir_path`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UrlExtractJob {
    pub url: String,
    pub dir_path: PathBuf,
    #[serde(default)]
    pub zip_password: Option<String>,
    /// Return the parsed `.json` files of the extracted tree
    #[serde(default)]
    pub return_json_yn: bool,
    /// Extra request headers for the download
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Extract an archive already on disk into `dir_path/<archive stem>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PathExtractJob {
    pub zip_path: PathBuf,
    pub dir_path: PathBuf,
    #[serde(default)]
    pub zip_password: Option<String>,
    #[serde(default)]
    pub return_json_yn: bool,
}

/// Where the archive to extract comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArchiveExtractJob {
    Url(UrlExtractJob),
    Path(PathExtractJob),
}

impl ArchiveExtractJob {
    pub fn dir_path(&self) -> &Path {
        match self {
            ArchiveExtractJob::Url(job) => &job.dir_path,
            ArchiveExtractJob::Path(job) => &job.dir_path,
        }
    }

    pub fn zip_password(&self) -> Option<&str> {
        match self {
            ArchiveExtractJob::Url(job) => job.zip_password.as_deref(),
            ArchiveExtractJob::Path(job) => job.zip_password.as_deref(),
        }
    }

    pub fn return_json(&self) -> bool {
        match self {
            ArchiveExtractJob::Url(job) => job.return_json_yn,
            ArchiveExtractJob::Path(job) => job.return_json_yn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveExtractResult {
    pub success: bool,
    /// Present only when the job asked for it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_data: Option<JsonBundle>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_job_shapes() {
        let job: ArchiveBuildJob = serde_json::from_value(json!({
            "dirPath": "/out",
            "zipPassword": "pw",
            "data": [{"jsonName": "a.json", "jsonData": {"x": 1}}]
        }))
        .unwrap();
        assert!(matches!(job, ArchiveBuildJob::Json(_)));
        assert_eq!(job.zip_password(), Some("pw"));

        let job: ArchiveBuildJob = serde_json::from_value(json!({
            "dirPath": "/out",
            "filesPath": ["/in/a.txt", "/in/b.txt"]
        }))
        .unwrap();
        assert!(matches!(job, ArchiveBuildJob::Files(_)));
        assert_eq!(job.dir_path(), Path::new("/out"));
        assert_eq!(job.zip_password(), None);
    }

    #[test]
    fn test_build_job_rejects_both_payload_kinds() {
        let result = serde_json::from_value::<ArchiveBuildJob>(json!({
            "dirPath": "/out",
            "data": [],
            "filesPath": []
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_job_shapes() {
        let job: ArchiveExtractJob = serde_json::from_value(json!({
            "url": "https://example.com/a.zip",
            "dirPath": "/work",
            "returnJsonYn": true,
            "headers": {"Authorization": "Bearer t"}
        }))
        .unwrap();
        assert!(job.return_json());
        assert!(matches!(job, ArchiveExtractJob::Url(ref j) if j.headers.len() == 1));

        let job: ArchiveExtractJob = serde_json::from_value(json!({
            "zipPath": "/work/a.zip",
            "dirPath": "/work"
        }))
        .unwrap();
        assert!(matches!(job, ArchiveExtractJob::Path(_)));
        assert!(!job.return_json());
    }

    #[test]
    fn test_extract_result_omits_absent_bundle() {
        let result = ArchiveExtractResult {
            success: true,
            json_data: None,
        };
        assert_eq!(serde_json::to_value(&result).unwrap(), json!({"success": true}));
    }
}
