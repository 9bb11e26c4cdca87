//! Direct transport: talks straight to the SQLite metadata store.
//!
//! Unlike the REST transport this one has an explicit setup step:
//! [`DirectConnection::connect`] opens the pool and applies the schema, and
//! every [`Connection`] method fails with `NotConnected` until it has run.
//!
//! Registration is where the store enforces its invariants:
//!
//! - the section's declared type (as stored, not as passed in) must equal the
//!   record's file type, otherwise the insert is rejected with `Ok(None)`;
//! - `(section, file_location)` is unique; a repeat registration of the same
//!   content returns the existing record, different content at the same
//!   location is a `DuplicateLocation` error;
//! - the section's `size` and `total_uploads` are updated in the same
//!   transaction as the insert.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::connection::Connection;
use crate::db;
use crate::error::{CatalogError, Result};
use crate::migrate;
use crate::models::{CatalogFile, IndexKey, MediaMetadata, MediaType, Section};
use crate::profile::{DirectEndpoint, Endpoint};

const FILE_COLUMNS: &str = "id, section, file_name, file_location, file_size, file_sha, \
     metadata_json, creation_date, uploaded_date, uploaded_by, download_count";

const SECTION_COLUMNS: &str = "name, remote_path, section_type, size, total_downloads, \
     total_uploads, collection, media_index_section";

/// Direct connection to the metadata store.
pub struct DirectConnection {
    endpoint: DirectEndpoint,
    pool: Option<SqlitePool>,
    // Held for every write; SQLite has a single writer.
    write_lock: Mutex<()>,
}

impl DirectConnection {
    pub fn new(endpoint: DirectEndpoint) -> Self {
        Self {
            endpoint,
            pool: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Open the metadata store and apply the schema. Idempotent.
    pub async fn connect(&mut self) -> Result<()> {
        if self.pool.is_some() {
            return Ok(());
        }
        let pool = db::connect(&self.endpoint.database).await?;
        migrate::run_migrations(&pool).await?;
        tracing::debug!(database = %self.endpoint.database.display(), "direct connection ready");
        self.pool = Some(pool);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.pool.is_some()
    }

    /// The integrated media index, if the profile configures one.
    pub fn media_index(&self) -> Option<&Endpoint> {
        self.endpoint.media_index.as_ref()
    }

    fn pool(&self) -> Result<&SqlitePool> {
        self.pool.as_ref().ok_or(CatalogError::NotConnected)
    }

    async fn insert_file(
        &self,
        record: &CatalogFile,
        section: &Section,
        check_existing: bool,
    ) -> Result<Option<CatalogFile>> {
        let pool = self.pool()?;
        let _guard = self.write_lock.lock().await;
        let mut tx = pool.begin().await?;

        let stored_section = fetch_section(&mut *tx, &section.name)
            .await?
            .ok_or_else(|| CatalogError::SectionNotFound {
                name: section.name.clone(),
            })?;

        if !stored_section.accepts(record.file_type()) {
            tracing::debug!(
                file = %record.file_name,
                file_type = %record.file_type(),
                section_type = %stored_section.section_type,
                "rejecting registration: type mismatch"
            );
            return Ok(None);
        }

        if check_existing {
            if let Some(existing) =
                fetch_file_at(&mut *tx, &section.name, &record.file_location).await?
            {
                return same_content(existing, record).map(Some);
            }
        }

        let id = Uuid::new_v4().to_string();
        let metadata_json = serde_json::to_string(&record.metadata)?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO files (id, section, file_name, file_location, file_size, file_sha,
                               file_type, metadata_json, creation_date, uploaded_date,
                               uploaded_by, download_count)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(section, file_location) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(&section.name)
        .bind(&record.file_name)
        .bind(&record.file_location)
        .bind(record.file_size as i64)
        .bind(&record.file_sha)
        .bind(record.file_type().as_str())
        .bind(&metadata_json)
        .bind(record.creation_date.timestamp())
        .bind(record.uploaded_date.map(|d| d.timestamp()))
        .bind(&record.uploaded_by)
        .bind(record.download_count as i64)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            let existing = fetch_file_at(&mut *tx, &section.name, &record.file_location)
                .await?
                .ok_or_else(|| CatalogError::invalid_argument("conflicting record disappeared"))?;
            return same_content(existing, record).map(Some);
        }

        sqlx::query(
            "UPDATE sections SET size = size + ?, total_uploads = total_uploads + 1 WHERE name = ?",
        )
        .bind(record.file_size as i64)
        .bind(&section.name)
        .execute(&mut *tx)
        .await?;

        let stored = fetch_file_by_id(&mut *tx, &id).await?;
        tx.commit().await?;

        tracing::debug!(id = %id, location = %record.file_location, "inserted file record");
        Ok(stored)
    }
}

/// Resolve a location conflict: same content is a no-op, anything else is an error.
fn same_content(existing: CatalogFile, record: &CatalogFile) -> Result<CatalogFile> {
    if existing.file_sha == record.file_sha {
        tracing::info!(location = %existing.file_location, "file already registered");
        Ok(existing)
    } else {
        Err(CatalogError::DuplicateLocation {
            location: existing.file_location,
            existing_sha: existing.file_sha,
        })
    }
}

fn to_u64(value: i64) -> u64 {
    value.max(0) as u64
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_default()
}

fn row_to_section(row: &SqliteRow) -> Result<Section> {
    let section_type: String = row.try_get("section_type")?;
    Ok(Section {
        name: row.try_get("name")?,
        remote_path: row.try_get("remote_path")?,
        section_type: section_type.parse()?,
        size: to_u64(row.try_get("size")?),
        total_downloads: to_u64(row.try_get("total_downloads")?),
        total_uploads: to_u64(row.try_get("total_uploads")?),
        collection: row.try_get("collection")?,
        media_index_section: row.try_get("media_index_section")?,
    })
}

fn row_to_file(row: &SqliteRow) -> Result<CatalogFile> {
    let metadata_json: String = row.try_get("metadata_json")?;
    let metadata: MediaMetadata = serde_json::from_str(&metadata_json)?;
    let uploaded_date: Option<i64> = row.try_get("uploaded_date")?;

    Ok(CatalogFile {
        id: Some(row.try_get("id")?),
        section: Some(row.try_get("section")?),
        file_name: row.try_get("file_name")?,
        file_location: row.try_get("file_location")?,
        file_size: to_u64(row.try_get("file_size")?),
        file_sha: row.try_get("file_sha")?,
        metadata,
        creation_date: from_ts(row.try_get("creation_date")?),
        uploaded_date: uploaded_date.map(from_ts),
        uploaded_by: row.try_get("uploaded_by")?,
        download_count: to_u64(row.try_get("download_count")?),
    })
}

async fn fetch_section<'e, E>(executor: E, name: &str) -> Result<Option<Section>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "SELECT {} FROM sections WHERE name = ?",
        SECTION_COLUMNS
    ))
    .bind(name)
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(row_to_section).transpose()
}

async fn fetch_file_at<'e, E>(executor: E, section: &str, location: &str) -> Result<Option<CatalogFile>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "SELECT {} FROM files WHERE section = ? AND file_location = ?",
        FILE_COLUMNS
    ))
    .bind(section)
    .bind(location)
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(row_to_file).transpose()
}

async fn fetch_file_by_id<'e, E>(executor: E, id: &str) -> Result<Option<CatalogFile>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("SELECT {} FROM files WHERE id = ?", FILE_COLUMNS))
        .bind(id)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(row_to_file).transpose()
}

#[async_trait]
impl Connection for DirectConnection {
    fn transport(&self) -> &str {
        "direct"
    }

    async fn get_section(&self, name: &str) -> Result<Option<Section>> {
        fetch_section(self.pool()?, name).await
    }

    async fn get_sections(&self) -> Result<Vec<Section>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM sections ORDER BY name",
            SECTION_COLUMNS
        ))
        .fetch_all(self.pool()?)
        .await?;
        rows.iter().map(row_to_section).collect()
    }

    async fn get_file(
        &self,
        query: &str,
        section: Option<&Section>,
    ) -> Result<Option<CatalogFile>> {
        let section_name = section.map(|s| s.name.as_str());
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM files
            WHERE (file_sha = ? OR id = ? OR file_name = ?)
              AND (? IS NULL OR section = ?)
            ORDER BY file_name, file_location
            LIMIT 1
            "#,
            FILE_COLUMNS
        ))
        .bind(query)
        .bind(query)
        .bind(query)
        .bind(section_name)
        .bind(section_name)
        .fetch_optional(self.pool()?)
        .await?;
        row.as_ref().map(row_to_file).transpose()
    }

    async fn index(&self, section: Option<&Section>, key: IndexKey) -> Result<Vec<String>> {
        let section_name = section.map(|s| s.name.as_str());
        let rows = sqlx::query(&format!(
            "SELECT {} FROM files WHERE (? IS NULL OR section = ?) ORDER BY file_name, file_location",
            FILE_COLUMNS
        ))
        .bind(section_name)
        .bind(section_name)
        .fetch_all(self.pool()?)
        .await?;

        rows.iter()
            .map(|row| row_to_file(row).map(|f| f.project(key)))
            .collect()
    }

    async fn search(
        &self,
        query: &str,
        section: Option<&Section>,
        key: IndexKey,
    ) -> Result<Vec<String>> {
        let section_name = section.map(|s| s.name.as_str());
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM files
            WHERE instr(lower(file_name), lower(?)) > 0
              AND (? IS NULL OR section = ?)
            ORDER BY file_name, file_location
            "#,
            FILE_COLUMNS
        ))
        .bind(query)
        .bind(section_name)
        .bind(section_name)
        .fetch_all(self.pool()?)
        .await?;

        rows.iter()
            .map(|row| row_to_file(row).map(|f| f.project(key)))
            .collect()
    }

    async fn create_section(
        &self,
        name: &str,
        remote_path: &str,
        section_type: MediaType,
    ) -> Result<Option<Section>> {
        if name.trim().is_empty() {
            return Err(CatalogError::invalid_argument("section name must not be empty"));
        }
        let pool = self.pool()?;
        let _guard = self.write_lock.lock().await;
        let media_index_section = self.media_index().map(|_| name.to_string());

        let inserted = sqlx::query(
            r#"
            INSERT INTO sections (name, remote_path, section_type, collection,
                                  media_index_section, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(remote_path.trim_end_matches('/'))
        .bind(section_type.as_str())
        .bind(format!("files_{}", name))
        .bind(&media_index_section)
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await?;

        if inserted.rows_affected() == 0 {
            tracing::debug!(section = %name, "section already exists");
            return Ok(None);
        }
        fetch_section(pool, name).await
    }

    async fn register_file(
        &self,
        record: &CatalogFile,
        section: &Section,
    ) -> Result<Option<CatalogFile>> {
        self.insert_file(record, section, true).await
    }

    async fn create_file(
        &self,
        record: &CatalogFile,
        section: &Section,
    ) -> Result<Option<CatalogFile>> {
        self.insert_file(record, section, false).await
    }
}
