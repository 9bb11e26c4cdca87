//! Error taxonomy for catalog operations.
//!
//! Lookups never produce an error for "nothing matched"; they return `None`
//! and leave the fatal/non-fatal decision to the caller. The variants below
//! cover everything else. The binary maps each variant to a process exit code
//! through [`CatalogError::exit_code`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`CatalogError`].
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors produced by profile resolution, transports and registration.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The local path does not exist.
    #[error("Path not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// No catalog file matched a lookup.
    #[error("No file matches '{query}'")]
    FileNotFound { query: String },

    /// The local path exists but could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No profile matched the requested name (or no home profile exists).
    #[error("{}", profile_not_found_message(name.as_deref()))]
    ProfileNotFound { name: Option<String> },

    /// A profile record could not be parsed.
    #[error("Invalid profile {}: {reason}", path.display())]
    InvalidProfile { path: PathBuf, reason: String },

    /// Two profile records share the same name.
    #[error("Profile '{name}' is defined more than once")]
    DuplicateProfile { name: String },

    /// More than one profile claims to be the home server.
    #[error("Profiles '{first}' and '{second}' are both marked as home; only one may be")]
    MultipleHomeProfiles { first: String, second: String },

    /// The requested section does not exist on the server.
    #[error("Failed to find section: {name}")]
    SectionNotFound { name: String },

    /// The file's detected type is not accepted by the section.
    #[error("Cannot register file with type {file_type} in section with type {section_type}")]
    TypeMismatch {
        file_type: String,
        section_type: String,
    },

    /// A different file already occupies the remote location.
    #[error("{location} is already registered with SHA-256 {existing_sha}")]
    DuplicateLocation {
        location: String,
        existing_sha: String,
    },

    /// The caller passed an argument the operation cannot work with.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// An unrecognised media type name.
    #[error("Unknown media type '{name}'. Expected one of: video, document, game, audio, other")]
    UnknownMediaType { name: String },

    /// The direct transport was used before `connect()`.
    #[error("Direct connection used before connect()")]
    NotConnected,

    /// The REST server answered with an error response.
    #[error("Server returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn profile_not_found_message(name: Option<&str>) -> String {
    match name {
        Some(name) => format!("Failed to find server profile '{}'", name),
        None => "Failed to find home server. Use --server to specify one".to_string(),
    }
}

impl CatalogError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        CatalogError::NotFound { path: path.into() }
    }

    /// Create an Io error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CatalogError::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        CatalogError::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create an InvalidProfile error.
    pub fn invalid_profile(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CatalogError::InvalidProfile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a TypeMismatch error.
    pub fn type_mismatch(file_type: impl ToString, section_type: impl ToString) -> Self {
        CatalogError::TypeMismatch {
            file_type: file_type.to_string(),
            section_type: section_type.to_string(),
        }
    }

    /// Map an I/O error on `path`, keeping "not found" distinct from other failures.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            CatalogError::NotFound { path: path.into() }
        } else {
            CatalogError::io(path, source)
        }
    }

    /// Configuration problems that no retry can fix.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CatalogError::ProfileNotFound { .. }
                | CatalogError::InvalidProfile { .. }
                | CatalogError::DuplicateProfile { .. }
                | CatalogError::MultipleHomeProfiles { .. }
                | CatalogError::SectionNotFound { .. }
        )
    }

    /// Process exit code for the top-level handler.
    pub fn exit_code(&self) -> u8 {
        match self {
            CatalogError::InvalidArgument { .. } | CatalogError::UnknownMediaType { .. } => 2,
            CatalogError::NotFound { .. } | CatalogError::FileNotFound { .. } => 3,
            CatalogError::Io { .. } => 4,
            CatalogError::ProfileNotFound { .. }
            | CatalogError::InvalidProfile { .. }
            | CatalogError::DuplicateProfile { .. }
            | CatalogError::MultipleHomeProfiles { .. } => 5,
            CatalogError::SectionNotFound { .. } => 6,
            CatalogError::TypeMismatch { .. } => 7,
            CatalogError::DuplicateLocation { .. } => 8,
            CatalogError::NotConnected
            | CatalogError::Remote { .. }
            | CatalogError::Http(_)
            | CatalogError::Database(_)
            | CatalogError::Json(_) => 10,
        }
    }
}
