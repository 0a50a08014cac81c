//! Error types shared across the pipeline.
//!
//! Copy failures carry the operation that issued them plus both endpoints, so
//! a run report can say exactly which routing step broke and where.

use crate::cleaner::CleanTarget;
use crate::copier::PathCheck;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while installing or cleaning a single package.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Package is missing its '{field}' root")]
    MissingRoot { field: &'static str },

    #[error("Failed to list packages in {}: {source}", .path.display())]
    ListPackages {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to walk {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("Failed to extract {} into {}: {source}", .archive.display(), .destination.display())]
    Extract {
        archive: PathBuf,
        destination: PathBuf,
        source: ArchiveError,
    },

    #[error("{operation}: failed to copy {} to {}: {source}", .src.display(), .dst.display())]
    Copy {
        operation: &'static str,
        src: PathBuf,
        dst: PathBuf,
        source: CopyError,
    },

    #[error("Failed to clean {target} root {}: {source}", .path.display())]
    Clean {
        target: CleanTarget,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

/// Result type for package installation steps.
pub type InstallResult<T> = Result<T, InstallError>;

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("{} is a protected location ({check})", .path.display())]
    Denied { path: PathBuf, check: PathCheck },

    #[error("Source {} does not exist", .0.display())]
    MissingSource(PathBuf),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to walk source tree: {0}")]
    Walk(#[from] walkdir::Error),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archiver program {} was not found", .program.display())]
    ProgramNotFound { program: PathBuf },

    #[error("Archiver {} exited with status {}", .program.display(), status_label(.code))]
    Failed { program: PathBuf, code: Option<i32> },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid or corrupt ZIP: {0}")]
    Zip(#[from] zip::result::ZipError),
}

fn status_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Marker '{marker}' not found in {}", .path.display())]
    MarkerNotFound { marker: String, path: PathBuf },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Cannot start {requested}: {active} is already in progress")]
    Busy {
        requested: &'static str,
        active: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_error_message_names_operation() {
        let err = InstallError::Copy {
            operation: "expects",
            src: PathBuf::from("extract/pkg1"),
            dst: PathBuf::from("output/pkg1"),
            source: CopyError::MissingSource(PathBuf::from("extract/pkg1")),
        };
        let message = err.to_string();
        assert!(message.starts_with("expects:"));
        assert!(message.contains("extract/pkg1"));
        assert!(message.contains("output/pkg1"));
    }

    #[test]
    fn test_archive_failed_without_code() {
        let err = ArchiveError::Failed {
            program: PathBuf::from("7z"),
            code: None,
        };
        assert_eq!(err.to_string(), "Archiver 7z exited with status unknown");
    }

    #[test]
    fn test_busy_message() {
        let err = OrchestratorError::Busy {
            requested: "run",
            active: "clean",
        };
        assert_eq!(
            err.to_string(),
            "Cannot start run: clean is already in progress"
        );
    }
}
