//! `zip-relay` command line
//!
//! ```text
//! zip-relay make  <job.json>   build an archive
//! zip-relay unzip <job.json>   extract an archive
//! ```
//!
//! The job file holds the camelCase JSON job. The JSON result (success or
//! failure shape) is printed on stdout. Exit status: 0 success, 1 failure,
//! 2 usage error.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use zip_relay::config::CONFIG_PATH_ENV;
use zip_relay::{ArchiveBuildJob, ArchiveExtractJob, FailureResult, ZipConfig};

const USAGE: &str = "usage: zip-relay <make|unzip> <job.json>";

#[tokio::main]
async fn main() -> ExitCode {
    // Control log level with RUST_LOG env var:
    //   RUST_LOG=debug zip-relay make job.json
    zip_relay::logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, job_path) = match args.as_slice() {
        [command, job_path] => (command.as_str(), PathBuf::from(job_path)),
        _ => {
            eprintln!("{}", USAGE);
            return ExitCode::from(2);
        }
    };

    let config = match load_config() {
        Ok(config) => config,
        Err(failure) => return report::<()>(Err(failure)),
    };

    match command {
        "make" => match read_job::<ArchiveBuildJob>(&job_path) {
            Ok(job) => report(zip_relay::make_zip(&config, &job).await),
            Err(failure) => report::<()>(Err(failure)),
        },
        "unzip" => match read_job::<ArchiveExtractJob>(&job_path) {
            Ok(job) => report(zip_relay::un_zip(&config, &job).await),
            Err(failure) => report::<()>(Err(failure)),
        },
        other => {
            eprintln!("unknown command: {}\n{}", other, USAGE);
            ExitCode::from(2)
        }
    }
}

/// Config file from `ZIP_RELAY_CONFIG` (if set), then environment overrides
fn load_config() -> Result<ZipConfig, FailureResult> {
    let config = match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => ZipConfig::load(Path::new(&path))
            .and_then(|config| config.with_overrides(|key| std::env::var(key).ok())),
        None => ZipConfig::from_env(),
    };
    config.map_err(|e| FailureResult::from_error("[Configuration error]", &e))
}

fn read_job<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, FailureResult> {
    let invalid = |message: String| FailureResult {
        success: false,
        error: format!("[Invalid job] - {}", message),
    };
    let json = std::fs::read_to_string(path)
        .map_err(|e| invalid(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&json).map_err(|e| invalid(format!("Failed to parse {}: {}", path.display(), e)))
}

fn report<T: Serialize>(result: Result<T, FailureResult>) -> ExitCode {
    let (rendered, code) = match &result {
        Ok(value) => (serde_json::to_string_pretty(value), ExitCode::SUCCESS),
        Err(failure) => (serde_json::to_string_pretty(failure), ExitCode::FAILURE),
    };
    match rendered {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize result: {}", e),
    }
    code
}
