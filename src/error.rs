use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepairError {
    #[error("nothing found: {0}")]
    NotFound(String),
    #[error("malformed manifest {}: {reason}", path.display())]
    MalformedManifest { path: PathBuf, reason: String },
    #[error("refusing to overwrite {}: {reason}", path.display())]
    FilesystemConflict { path: PathBuf, reason: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unexpected archive layout at {}: {reason}", path.display())]
    UnexpectedLayout { path: PathBuf, reason: String },
}

impl RepairError {
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedManifest {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn conflict(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FilesystemConflict {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn layout(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnexpectedLayout {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> RepairErrorCode {
        match self {
            Self::NotFound(_) => RepairErrorCode::E001NotFound,
            Self::MalformedManifest { .. } => RepairErrorCode::E002MalformedManifest,
            Self::FilesystemConflict { .. } => RepairErrorCode::E003FilesystemConflict,
            Self::InvalidInput(_) => RepairErrorCode::E004InvalidInput,
            Self::UnexpectedLayout { .. } => RepairErrorCode::E005UnexpectedLayout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairErrorCode {
    E001NotFound,
    E002MalformedManifest,
    E003FilesystemConflict,
    E004InvalidInput,
    E005UnexpectedLayout,
}

impl RepairErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001NotFound => "E001_NOT_FOUND",
            Self::E002MalformedManifest => "E002_MALFORMED_MANIFEST",
            Self::E003FilesystemConflict => "E003_FILESYSTEM_CONFLICT",
            Self::E004InvalidInput => "E004_INVALID_INPUT",
            Self::E005UnexpectedLayout => "E005_UNEXPECTED_LAYOUT",
        }
    }
}

/// Find the first `RepairError` in an error chain, if any.
pub fn repair_error_code(err: &anyhow::Error) -> Option<RepairErrorCode> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<RepairError>())
        .map(RepairError::code)
}
