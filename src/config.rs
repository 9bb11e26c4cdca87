//! Runtime settings.
//!
//! [`Settings`] is built once at process entry from CLI flags and the
//! caller's home directory, then passed down explicitly. Nothing below the
//! binary reads the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CatalogError, Result};

/// Uploader recorded when no `--username` override is given.
pub const DEFAULT_UPLOADER: &str = "default-user";

/// Concurrent registrations in bulk mode when not overridden.
pub const DEFAULT_BULK_CONCURRENCY: usize = 4;

/// Profile directory relative to the home directory.
const PROFILE_DIR_SUFFIX: &str = ".config/bifrost/servers";

#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding one TOML record per server profile.
    pub profile_dir: PathBuf,
    /// Profile to select; `None` selects the home profile.
    pub profile_name: Option<String>,
    /// Identity recorded as `uploaded_by` on registrations.
    pub uploader: String,
    /// Talk to the metadata store directly instead of the REST API.
    pub direct: bool,
    /// Upper bound on in-flight registrations during bulk registration.
    pub bulk_concurrency: usize,
    /// Descend into subdirectories during bulk registration.
    pub recursive: bool,
    /// Glob patterns (relative to the bulk root) to leave out of bulk registration.
    pub exclude_globs: Vec<String>,
    /// Deadline for each REST request. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Settings {
    /// Settings rooted at an explicit profile directory, everything else default.
    pub fn new(profile_dir: impl Into<PathBuf>) -> Self {
        Self {
            profile_dir: profile_dir.into(),
            profile_name: None,
            uploader: DEFAULT_UPLOADER.to_string(),
            direct: false,
            bulk_concurrency: DEFAULT_BULK_CONCURRENCY,
            recursive: false,
            exclude_globs: Vec::new(),
            request_timeout: None,
        }
    }

    /// Check values that clap cannot check for us.
    pub fn validate(&self) -> Result<()> {
        if self.bulk_concurrency == 0 {
            return Err(CatalogError::invalid_argument(
                "bulk concurrency must be >= 1",
            ));
        }
        if self.request_timeout == Some(Duration::ZERO) {
            return Err(CatalogError::invalid_argument("timeout must be at least one second"));
        }
        if self.uploader.trim().is_empty() {
            return Err(CatalogError::invalid_argument("uploader must not be empty"));
        }
        Ok(())
    }
}

/// Default profile directory under `home`.
pub fn default_profile_dir(home: &Path) -> PathBuf {
    home.join(PROFILE_DIR_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::new("/tmp/profiles");
        assert_eq!(settings.uploader, "default-user");
        assert_eq!(settings.bulk_concurrency, 4);
        assert!(!settings.direct);
        assert!(settings.profile_name.is_none());
        assert!(settings.request_timeout.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut settings = Settings::new("/tmp/profiles");
        settings.bulk_concurrency = 0;
        assert!(matches!(
            settings.validate(),
            Err(CatalogError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut settings = Settings::new("/tmp/profiles");
        settings.request_timeout = Some(Duration::ZERO);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_blank_uploader_rejected() {
        let mut settings = Settings::new("/tmp/profiles");
        settings.uploader = "  ".into();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_default_profile_dir() {
        assert_eq!(
            default_profile_dir(Path::new("/home/ana")),
            PathBuf::from("/home/ana/.config/bifrost/servers")
        );
    }
}
