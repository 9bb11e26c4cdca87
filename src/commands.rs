//! Command bodies for the `bifrost` binary.
//!
//! Each `run_*` function resolves what it needs from [`Settings`], talks to
//! the selected transport and prints its result to stdout. Errors are
//! returned, never printed here; `main` owns the exit code.

use anyhow::Result;
use futures_util::StreamExt;
use std::path::Path;
use std::sync::Arc;

use crate::config::Settings;
use crate::connection::{open_connection, Connection};
use crate::direct::DirectConnection;
use crate::error::CatalogError;
use crate::models::{CatalogFile, IndexKey, MediaMetadata, MediaType, Section};
use crate::profile::{self, ServerProfile};
use crate::register::{self, BulkOptions};
use crate::section::{resolve_optional, resolve_section};
use crate::server;

async fn open(settings: &Settings) -> Result<(ServerProfile, Box<dyn Connection>)> {
    let profile = profile::resolve_profile(&settings.profile_dir, settings.profile_name.as_deref())?;
    let conn = open_connection(&profile, settings).await?;
    tracing::debug!(profile = %profile.name, transport = conn.transport(), "connected");
    Ok((profile, conn))
}

fn required_section(section: Option<&str>) -> Result<&str> {
    section.ok_or_else(|| CatalogError::invalid_argument("--section is required for this command").into())
}

// ============ profiles ============

pub fn run_profiles(settings: &Settings) -> Result<()> {
    let profiles = profile::load_profiles(&settings.profile_dir)?;
    if profiles.is_empty() {
        println!("No profiles in {}", settings.profile_dir.display());
        return Ok(());
    }

    println!("{:<16} {:<5} {:<22} {:<40} MEDIA_INDEX", "NAME", "HOME", "REST", "DIRECT");
    for p in &profiles {
        let rest = p.rest.as_ref().map(|e| e.to_string()).unwrap_or_else(|| "-".into());
        let direct = p
            .direct
            .as_ref()
            .map(|d| d.database.display().to_string())
            .unwrap_or_else(|| "-".into());
        let media_index = p
            .direct
            .as_ref()
            .and_then(|d| d.media_index.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "-".into());
        let home = if p.home { "*" } else { "" };
        println!("{:<16} {:<5} {:<22} {:<40} {}", p.name, home, rest, direct, media_index);
    }
    Ok(())
}

// ============ sections ============

fn print_section_detail(section: &Section) {
    println!("--- Section ---");
    println!("name:            {}", section.name);
    println!("type:            {}", section.section_type);
    println!("remote_path:     {}", section.remote_path);
    println!("collection:      {}", section.collection);
    println!("size:            {} bytes", section.size);
    println!("total_uploads:   {}", section.total_uploads);
    println!("total_downloads: {}", section.total_downloads);
    if let Some(index) = &section.media_index_section {
        println!("media_index:     {}", index);
    }
}

pub async fn run_sections(settings: &Settings, section: Option<&str>) -> Result<()> {
    let (_, conn) = open(settings).await?;

    if let Some(name) = section {
        let section = resolve_section(conn.as_ref(), name).await?;
        print_section_detail(&section);
        return Ok(());
    }

    let sections = conn.get_sections().await?;
    if sections.is_empty() {
        println!("No sections.");
        return Ok(());
    }
    println!("{:<20} {:<10} {:>8} {:>14}  REMOTE_PATH", "NAME", "TYPE", "UPLOADS", "SIZE");
    for s in &sections {
        println!(
            "{:<20} {:<10} {:>8} {:>14}  {}",
            s.name, s.section_type, s.total_uploads, s.size, s.remote_path
        );
    }
    Ok(())
}

pub async fn run_create_section(
    settings: &Settings,
    name: &str,
    remote_path: &str,
    section_type: MediaType,
) -> Result<()> {
    let (_, conn) = open(settings).await?;
    match conn.create_section(name, remote_path, section_type).await? {
        Some(section) => {
            println!("Created section '{}' ({})", section.name, section.section_type);
            print_section_detail(&section);
            Ok(())
        }
        None => Err(CatalogError::invalid_argument(format!("section '{}' already exists", name)).into()),
    }
}

// ============ file / index / search ============

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

/// Lines describing `file`, including its type-specific block.
pub fn file_lines(file: &CatalogFile) -> Vec<String> {
    let mut lines = vec![
        "--- File ---".to_string(),
        format!("id:             {}", opt(&file.id)),
        format!("section:        {}", opt(&file.section)),
        format!("file_name:      {}", file.file_name),
        format!("file_location:  {}", file.file_location),
        format!("file_size:      {}", file.file_size),
        format!("file_sha:       {}", file.file_sha),
        format!("file_type:      {}", file.file_type()),
        format!("creation_date:  {}", file.creation_date.to_rfc3339()),
        format!(
            "uploaded_date:  {}",
            file.uploaded_date.map(|d| d.to_rfc3339()).unwrap_or_else(|| "-".into())
        ),
        format!("uploaded_by:    {}", opt(&file.uploaded_by)),
        format!("download_count: {}", file.download_count),
    ];

    match &file.metadata {
        MediaMetadata::Video(v) => {
            lines.push("--- Video ---".to_string());
            lines.push(format!(
                "duration:       {}",
                v.duration_secs.map(|d| format!("{:.0}s", d)).unwrap_or_else(|| "-".into())
            ));
            lines.push(format!("format:         {}", opt(&v.format)));
            lines.push(format!("resolution:     {}", opt(&v.resolution)));
            lines.push(format!("video_codec:    {}", opt(&v.video_codec)));
            lines.push(format!("audio_codec:    {}", opt(&v.audio_codec)));
            if !v.languages.is_empty() {
                lines.push(format!("languages:      {}", v.languages.join(", ")));
            }
        }
        MediaMetadata::Document(d) => {
            lines.push("--- Document ---".to_string());
            lines.push(format!("title:          {}", opt(&d.title)));
            lines.push(format!("author:         {}", opt(&d.author)));
            lines.push(format!(
                "page_count:     {}",
                d.page_count.map(|p| p.to_string()).unwrap_or_else(|| "-".into())
            ));
            lines.push(format!("format:         {}", opt(&d.format)));
        }
        MediaMetadata::Game(g) => {
            lines.push("--- Game ---".to_string());
            lines.push(format!("console:        {}", opt(&g.console)));
            lines.push(format!("region:         {}", opt(&g.region)));
        }
        MediaMetadata::Audio(a) => {
            lines.push("--- Audio ---".to_string());
            lines.push(format!("format:         {}", opt(&a.format)));
        }
        MediaMetadata::Other => {}
    }
    lines
}

pub async fn run_file(settings: &Settings, query: &str, section: Option<&str>) -> Result<()> {
    let (_, conn) = open(settings).await?;
    let section = resolve_optional(conn.as_ref(), section).await?;

    let file = conn
        .get_file(query, section.as_ref())
        .await?
        .ok_or_else(|| CatalogError::FileNotFound {
            query: query.to_string(),
        })?;
    for line in file_lines(&file) {
        println!("{}", line);
    }
    Ok(())
}

pub async fn run_index(settings: &Settings, section: Option<&str>, key: IndexKey) -> Result<()> {
    let (_, conn) = open(settings).await?;
    let section = resolve_optional(conn.as_ref(), section).await?;
    for value in conn.index(section.as_ref(), key).await? {
        println!("{}", value);
    }
    Ok(())
}

pub async fn run_search(
    settings: &Settings,
    query: &str,
    section: Option<&str>,
    key: IndexKey,
) -> Result<()> {
    let (_, conn) = open(settings).await?;
    let section = resolve_optional(conn.as_ref(), section).await?;
    let results = conn.search(query, section.as_ref(), key).await?;
    if results.is_empty() {
        println!("No results.");
    }
    for value in results {
        println!("{}", value);
    }
    Ok(())
}

// ============ register / migrate ============

pub async fn run_register(settings: &Settings, section: Option<&str>, path: &Path) -> Result<()> {
    let name = required_section(section)?;
    let (_, conn) = open(settings).await?;
    let section = resolve_section(conn.as_ref(), name).await?;

    let stored = register::register_single(conn.as_ref(), &section, path, &settings.uploader).await?;
    println!("Registered {} -> {}", path.display(), stored.file_location);
    println!("  sha256: {}", stored.file_sha);
    println!("  id:     {}", opt(&stored.id));
    Ok(())
}

pub async fn run_migrate(settings: &Settings, section: Option<&str>, dir: &Path) -> Result<()> {
    let name = required_section(section)?;
    let (_, conn) = open(settings).await?;
    let section = resolve_section(conn.as_ref(), name).await?;

    let options = BulkOptions::from_settings(settings);
    let outcomes = register::register_bulk(conn.as_ref(), &section, dir, options).await?;
    let mut outcomes = std::pin::pin!(outcomes);

    let mut ok = 0usize;
    let mut failed = 0usize;
    while let Some(outcome) = outcomes.next().await {
        match &outcome.result {
            Ok(stored) => {
                ok += 1;
                println!("ok      {} -> {}", outcome.path.display(), stored.file_location);
            }
            Err(e) => {
                failed += 1;
                println!("failed  {}: {}", outcome.path.display(), e);
            }
        }
    }

    println!("{} registered, {} failed", ok, failed);
    Ok(())
}

// ============ serve ============

pub async fn run_serve(settings: &Settings, bind: &str) -> Result<()> {
    let profile = profile::resolve_profile(&settings.profile_dir, settings.profile_name.as_deref())?;
    let mut conn = DirectConnection::new(profile.direct_endpoint()?.clone());
    conn.connect().await?;
    if let Some(index) = conn.media_index() {
        tracing::info!(media_index = %index, "media index configured");
    }
    server::run_server(Arc::new(conn), bind).await
}
