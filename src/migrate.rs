//! Metadata store schema. Every statement is idempotent.

use sqlx::SqlitePool;

use crate::error::Result;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sections (
            name TEXT PRIMARY KEY,
            remote_path TEXT NOT NULL,
            section_type TEXT NOT NULL,
            size INTEGER NOT NULL DEFAULT 0,
            total_downloads INTEGER NOT NULL DEFAULT 0,
            total_uploads INTEGER NOT NULL DEFAULT 0,
            collection TEXT NOT NULL,
            media_index_section TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id TEXT PRIMARY KEY,
            section TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_location TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            file_sha TEXT NOT NULL,
            file_type TEXT NOT NULL,
            metadata_json TEXT NOT NULL,
            creation_date INTEGER NOT NULL,
            uploaded_date INTEGER,
            uploaded_by TEXT,
            download_count INTEGER NOT NULL DEFAULT 0,
            UNIQUE(section, file_location),
            FOREIGN KEY (section) REFERENCES sections(name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_sha ON files(file_sha)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_name ON files(file_name)")
        .execute(pool)
        .await?;

    Ok(())
}
