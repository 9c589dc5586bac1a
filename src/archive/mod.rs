//! Archive build and extract orchestration
//!
//! The compression itself is delegated to the external `zip` / `unzip`
//! programs; this module stages inputs, builds their argument vectors and
//! interprets exit codes.
//!
//! ## Process contracts
//! ```text
//! zip   [-P <password>] -r <archivePath> <inputName>...   (cwd = inputs' folder)
//! unzip [-P <password>] -d <destinationDir> <archivePath>
//! ```
//! Exit code 0 is success; any other code is kept in the error.
//!
//! ## Module Structure
//! ```text
//! archive/
//! ├── mod.rs        - Re-exports, end-to-end tests
//! ├── types.rs      - Jobs and results (camelCase JSON)
//! ├── process.rs    - Child-process runner with optional deadline
//! ├── builder.rs    - Payload staging + zip
//! └── extractor.rs  - Download/locate + unzip + JSON bundle
//! ```

pub mod builder;
pub mod extractor;
pub mod process;
pub mod types;

// Re-exports for convenience
pub use builder::ArchiveBuilder;
pub use extractor::{ArchiveExtractor, ExtractStage};
pub use types::{
    ArchiveBuildJob, ArchiveBuildResult, ArchiveExtractJob, ArchiveExtractResult, FilesArchiveJob,
    JsonArchiveJob, PathExtractJob, UrlExtractJob, ZipJsonEntry,
};
