//! The transport-independent connection interface.
//!
//! Both transports implement [`Connection`] with identical behaviour:
//!
//! | Method | On "nothing matched" |
//! |--------|----------------------|
//! | [`get_section`](Connection::get_section) | `Ok(None)` |
//! | [`get_file`](Connection::get_file) | `Ok(None)` |
//! | [`create_section`](Connection::create_section) | `Ok(None)` if the name is taken |
//! | [`register_file`](Connection::register_file) | `Ok(None)` if the file type does not match the section type |
//! | [`create_file`](Connection::create_file) | `Ok(None)` if the file type does not match the section type |
//!
//! Deciding whether an absent result is fatal is the caller's job.
//!
//! ```text
//! ┌──────────────┐         ┌──────────────────┐
//! │  RestClient  │──HTTP──▶│  bifrost serve   │──┐
//! └──────────────┘         └──────────────────┘  │   ┌──────────┐
//!                                                ├──▶│  SQLite  │
//! ┌──────────────────┐                           │   └──────────┘
//! │ DirectConnection │───────────────────────────┘
//! └──────────────────┘
//! ```

use async_trait::async_trait;

use crate::client::RestClient;
use crate::config::Settings;
use crate::direct::DirectConnection;
use crate::error::{CatalogError, Result};
use crate::identity::LocalPath;
use crate::media;
use crate::models::{CatalogFile, IndexKey, MediaType, Section};
use crate::profile::ServerProfile;

/// Operations every catalog transport exposes.
///
/// Implementations must be `Send + Sync`; bulk registration drives several
/// calls against one connection concurrently.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Short transport label for logs (`"rest"`, `"direct"`).
    fn transport(&self) -> &str;

    async fn get_section(&self, name: &str) -> Result<Option<Section>>;

    async fn get_sections(&self) -> Result<Vec<Section>>;

    /// Look up one file by SHA-256, id or file name.
    async fn get_file(&self, query: &str, section: Option<&Section>)
        -> Result<Option<CatalogFile>>;

    /// Values of `key` for every file, optionally scoped to a section.
    async fn index(&self, section: Option<&Section>, key: IndexKey) -> Result<Vec<String>>;

    /// Values of `key` for files whose name contains `query`.
    async fn search(
        &self,
        query: &str,
        section: Option<&Section>,
        key: IndexKey,
    ) -> Result<Vec<String>>;

    async fn create_section(
        &self,
        name: &str,
        remote_path: &str,
        section_type: MediaType,
    ) -> Result<Option<Section>>;

    /// Build a draft record from a local file whose identity is computed.
    ///
    /// Type sniffing and metadata extraction read the file, so they run on
    /// the blocking pool.
    async fn build_record_from_local(&self, local: &LocalPath) -> Result<CatalogFile> {
        let local = local.clone();
        let path = local.path().to_path_buf();
        tokio::task::spawn_blocking(move || media::build_record(&local))
            .await
            .map_err(|e| CatalogError::io(path, std::io::Error::other(e)))?
    }

    /// Insert `record` into `section` after checking for an existing record
    /// at the same location.
    async fn register_file(
        &self,
        record: &CatalogFile,
        section: &Section,
    ) -> Result<Option<CatalogFile>>;

    /// Insert `record` into `section`, relying on the store's uniqueness
    /// constraint instead of a prior existence check.
    async fn create_file(&self, record: &CatalogFile, section: &Section)
        -> Result<Option<CatalogFile>>;
}

/// Open the transport `settings` selects for `profile`.
///
/// The direct transport is connected before it is returned, so callers can
/// treat both transports the same from here on. `settings.request_timeout`
/// only bounds REST requests.
pub async fn open_connection(
    profile: &ServerProfile,
    settings: &Settings,
) -> Result<Box<dyn Connection>> {
    if settings.direct {
        let mut connection = DirectConnection::new(profile.direct_endpoint()?.clone());
        connection.connect().await?;
        Ok(Box::new(connection))
    } else {
        Ok(Box::new(RestClient::new(profile, settings.request_timeout)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::DirectEndpoint;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_record_built_off_the_runtime() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, b"plain text").unwrap();

        let mut local = LocalPath::new(&path).unwrap();
        let digest = local.content_identity().unwrap();

        // Building a record needs no store, so an unconnected transport will do.
        let conn = DirectConnection::new(DirectEndpoint {
            database: tmp.path().join("unused.sqlite"),
            media_index: None,
        });
        let record = conn.build_record_from_local(&local).await.unwrap();
        assert_eq!(record.file_name, "notes.txt");
        assert_eq!(record.file_sha, digest.to_hex());
        assert_eq!(record.file_type(), MediaType::Document);
    }

    #[tokio::test]
    async fn test_record_needs_computed_identity() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("clip.mp4");
        std::fs::write(&path, b"bytes").unwrap();

        let conn = DirectConnection::new(DirectEndpoint {
            database: tmp.path().join("unused.sqlite"),
            media_index: None,
        });
        let local = LocalPath::new(&path).unwrap();
        assert!(matches!(
            conn.build_record_from_local(&local).await,
            Err(CatalogError::InvalidArgument { .. })
        ));
    }
}
