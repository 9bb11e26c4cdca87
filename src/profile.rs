//! Server profiles.
//!
//! A profile directory holds one TOML record per reachable catalog server.
//! The set is validated as a whole when it is loaded: names must be unique
//! and at most one profile may be flagged as home, so selecting a profile
//! never depends on directory iteration order.
//!
//! ```toml
//! name = "home1"
//! home = true
//! token = "secret"
//!
//! [rest]
//! host = "127.0.0.1"
//! port = 7340
//!
//! [direct]
//! database = "/srv/bifrost/catalog.sqlite"
//!
//! [direct.media_index]
//! host = "127.0.0.1"
//! port = 32400
//! ```

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CatalogError, Result};

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DirectEndpoint {
    /// Path of the SQLite metadata store.
    pub database: PathBuf,
    #[serde(default)]
    pub media_index: Option<Endpoint>,
}

/// One reachable catalog server.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerProfile {
    pub name: String,
    #[serde(default)]
    pub home: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub rest: Option<Endpoint>,
    #[serde(default)]
    pub direct: Option<DirectEndpoint>,
}

impl ServerProfile {
    pub fn rest_endpoint(&self) -> Result<&Endpoint> {
        self.rest.as_ref().ok_or_else(|| {
            CatalogError::invalid_argument(format!(
                "profile '{}' has no [rest] endpoint",
                self.name
            ))
        })
    }

    pub fn direct_endpoint(&self) -> Result<&DirectEndpoint> {
        self.direct.as_ref().ok_or_else(|| {
            CatalogError::invalid_argument(format!(
                "profile '{}' has no [direct] endpoint",
                self.name
            ))
        })
    }
}

fn parse_profile(path: &Path) -> Result<ServerProfile> {
    let content = fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
    let profile: ServerProfile =
        toml::from_str(&content).map_err(|e| CatalogError::invalid_profile(path, e.to_string()))?;

    if profile.name.trim().is_empty() {
        return Err(CatalogError::invalid_profile(path, "name must not be empty"));
    }
    Ok(profile)
}

fn profile_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| CatalogError::from_io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CatalogError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load and validate every profile in `dir`, creating `dir` if it is missing.
pub fn load_profiles(dir: &Path) -> Result<Vec<ServerProfile>> {
    if !dir.exists() {
        tracing::info!(path = %dir.display(), "profile directory not found, creating it");
        fs::create_dir_all(dir).map_err(|e| CatalogError::io(dir, e))?;
    }

    let mut profiles: Vec<ServerProfile> = Vec::new();
    for path in profile_files(dir)? {
        let profile = parse_profile(&path)?;

        if profiles.iter().any(|p| p.name == profile.name) {
            return Err(CatalogError::DuplicateProfile { name: profile.name });
        }
        if profile.home {
            if let Some(existing) = profiles.iter().find(|p| p.home) {
                return Err(CatalogError::MultipleHomeProfiles {
                    first: existing.name.clone(),
                    second: profile.name,
                });
            }
        }

        tracing::debug!(path = %path.display(), name = %profile.name, "loaded profile");
        profiles.push(profile);
    }

    Ok(profiles)
}

/// Pick one profile: by name when given, otherwise the home profile.
pub fn select_profile(profiles: Vec<ServerProfile>, name: Option<&str>) -> Result<ServerProfile> {
    let found = match name {
        Some(name) => profiles.into_iter().find(|p| p.name == name),
        None => profiles.into_iter().find(|p| p.home),
    };

    found.ok_or_else(|| CatalogError::ProfileNotFound {
        name: name.map(str::to_string),
    })
}

/// Load the profile set in `dir` and select one from it.
pub fn resolve_profile(dir: &Path, name: Option<&str>) -> Result<ServerProfile> {
    let profiles = load_profiles(dir)?;
    select_profile(profiles, name)
}
