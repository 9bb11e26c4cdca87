//! Section resolution.

use crate::connection::Connection;
use crate::error::{CatalogError, Result};
use crate::models::Section;

/// Look up `name` on `conn`; a missing section is fatal.
///
/// Everything downstream of this call (search scoping, registration) takes a
/// resolved [`Section`] and does not re-check it.
pub async fn resolve_section(conn: &dyn Connection, name: &str) -> Result<Section> {
    match conn.get_section(name).await? {
        Some(section) => {
            tracing::debug!(section = %section.name, transport = conn.transport(), "resolved section");
            Ok(section)
        }
        None => Err(CatalogError::SectionNotFound {
            name: name.to_string(),
        }),
    }
}

/// Resolve an optional section name; `None` means "all sections".
pub async fn resolve_optional(conn: &dyn Connection, name: Option<&str>) -> Result<Option<Section>> {
    match name {
        Some(name) => resolve_section(conn, name).await.map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direct::DirectConnection;
    use crate::models::MediaType;
    use crate::profile::DirectEndpoint;
    use tempfile::TempDir;

    async fn connection(tmp: &TempDir) -> DirectConnection {
        let mut conn = DirectConnection::new(DirectEndpoint {
            database: tmp.path().join("catalog.sqlite"),
            media_index: None,
        });
        conn.connect().await.unwrap();
        conn
    }

    #[tokio::test]
    async fn test_existing_section_resolves() {
        let tmp = TempDir::new().unwrap();
        let conn = connection(&tmp).await;
        conn.create_section("movies", "/mnt/movies", MediaType::Video)
            .await
            .unwrap();

        let section = resolve_section(&conn, "movies").await.unwrap();
        assert_eq!(section.name, "movies");
        assert_eq!(section.section_type, MediaType::Video);
    }

    #[tokio::test]
    async fn test_missing_section_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let conn = connection(&tmp).await;

        let err = resolve_section(&conn, "nope").await.unwrap_err();
        assert!(err.is_configuration());
        match err {
            CatalogError::SectionNotFound { name } => assert_eq!(name, "nope"),
            other => panic!("expected SectionNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_optional_none_is_unscoped() {
        let tmp = TempDir::new().unwrap();
        let conn = connection(&tmp).await;
        assert!(resolve_optional(&conn, None).await.unwrap().is_none());
        assert!(resolve_optional(&conn, Some("nope")).await.is_err());
    }
}
