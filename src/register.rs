//! Registration engine.
//!
//! Single registration runs the full pipeline for one file:
//!
//! ```text
//! LocalPath ─▶ content identity ─▶ draft record ─▶ location + provenance ─▶ register_file
//! ```
//!
//! Bulk registration enumerates a directory and runs the same pipeline per
//! entry through `create_file`, with up to `bulk_concurrency` entries in
//! flight. Each entry yields exactly one [`BulkOutcome`]; a failing entry
//! never cancels its siblings. There is no checkpointing: re-running a batch
//! relies on the store's location uniqueness to no-op repeats.

use futures_util::stream::{self, Stream, StreamExt};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Settings;
use crate::connection::Connection;
use crate::error::{CatalogError, Result};
use crate::identity::LocalPath;
use crate::models::{CatalogFile, Section};

/// Result of registering one directory entry.
#[derive(Debug)]
pub struct BulkOutcome {
    pub path: PathBuf,
    pub result: Result<CatalogFile>,
}

impl BulkOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Options for [`register_bulk`], usually taken from [`Settings`].
#[derive(Debug, Clone)]
pub struct BulkOptions {
    pub uploader: String,
    pub concurrency: usize,
    pub recursive: bool,
    pub exclude: Vec<String>,
}

impl BulkOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            uploader: settings.uploader.clone(),
            concurrency: settings.bulk_concurrency,
            recursive: settings.recursive,
            exclude: settings.exclude_globs.clone(),
        }
    }
}

/// Hash `path` off the async runtime.
async fn identify(path: PathBuf) -> Result<LocalPath> {
    let fallback = path.clone();
    tokio::task::spawn_blocking(move || -> Result<LocalPath> {
        let mut local = LocalPath::new(&path)?;
        local.content_identity()?;
        Ok(local)
    })
    .await
    .map_err(|e| CatalogError::io(fallback, std::io::Error::other(e)))?
}

/// Build the record to submit for `path`: draft, section location, provenance.
async fn prepare(
    conn: &dyn Connection,
    section: &Section,
    path: PathBuf,
    uploader: &str,
) -> Result<CatalogFile> {
    let local = identify(path).await?;
    let mut record = conn.build_record_from_local(&local).await?;
    record.file_location = section.location_for(local.file_name());
    record.set_upload_info(uploader);
    Ok(record)
}

fn rejected(record: &CatalogFile, section: &Section) -> CatalogError {
    CatalogError::type_mismatch(record.file_type(), section.section_type)
}

/// Register one local file into `section`.
pub async fn register_single(
    conn: &dyn Connection,
    section: &Section,
    path: impl AsRef<Path>,
    uploader: &str,
) -> Result<CatalogFile> {
    let record = prepare(conn, section, path.as_ref().to_path_buf(), uploader).await?;

    match conn.register_file(&record, section).await? {
        Some(stored) => {
            tracing::info!(
                file = %stored.file_name,
                location = %stored.file_location,
                sha = %stored.file_sha,
                transport = conn.transport(),
                "registered file"
            );
            Ok(stored)
        }
        None => Err(rejected(&record, section)),
    }
}

async fn register_entry(
    conn: &dyn Connection,
    section: &Section,
    path: PathBuf,
    uploader: &str,
) -> Result<CatalogFile> {
    let record = prepare(conn, section, path, uploader).await?;
    conn.create_file(&record, section)
        .await?
        .ok_or_else(|| rejected(&record, section))
}

fn build_excludes(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            CatalogError::invalid_argument(format!("invalid exclude pattern '{}': {}", pattern, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| CatalogError::invalid_argument(format!("invalid exclude patterns: {}", e)))
}

fn excluded(root: &Path, path: &Path, excludes: &GlobSet) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    excludes.is_match(relative)
}

/// Lazily enumerated entries of a bulk root.
type Entries = Box<dyn Iterator<Item = Result<PathBuf>> + Send>;

/// Outcome error for an entry the walker could not read.
fn walk_error(root: &Path, err: walkdir::Error) -> CatalogError {
    let path = err.path().unwrap_or(root).to_path_buf();
    CatalogError::io(path, err.into())
}

/// Entries to register under `root`, read as the stream pulls them.
/// Enumeration failures become entries too, so they surface as outcomes
/// instead of aborting the batch.
///
/// Recursive walks follow symlinks; a link that loops back into the tree
/// is reported as an `Io` entry.
fn enumerate(root: &Path, recursive: bool, excludes: GlobSet) -> Result<Entries> {
    let root = root.to_path_buf();

    if recursive {
        let walker = WalkDir::new(&root)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();
        return Ok(Box::new(walker.filter_map(move |entry| match entry {
            Ok(entry) => {
                let path = entry.into_path();
                if path.is_dir() || excluded(&root, &path, &excludes) {
                    None
                } else {
                    Some(Ok(path))
                }
            }
            Err(e) => Some(Err(walk_error(&root, e))),
        })));
    }

    let dir = fs::read_dir(&root).map_err(|e| CatalogError::from_io(&root, e))?;
    Ok(Box::new(dir.filter_map(move |entry| match entry {
        Ok(entry) => {
            let path = entry.path();
            if path.is_dir() || excluded(&root, &path, &excludes) {
                None
            } else {
                Some(Ok(path))
            }
        }
        Err(e) => Some(Err(CatalogError::io(&root, e))),
    })))
}

/// Register every file in `root` into `section`.
///
/// Fails fast if `root` is missing or not a directory; after that, every
/// entry produces exactly one [`BulkOutcome`], in completion order.
pub async fn register_bulk<'a>(
    conn: &'a dyn Connection,
    section: &'a Section,
    root: &Path,
    options: BulkOptions,
) -> Result<impl Stream<Item = BulkOutcome> + 'a> {
    let metadata = fs::metadata(root).map_err(|e| CatalogError::from_io(root, e))?;
    if !metadata.is_dir() {
        return Err(CatalogError::invalid_argument(format!(
            "{} is not a directory; register it as a single file instead",
            root.display()
        )));
    }
    if options.concurrency == 0 {
        return Err(CatalogError::invalid_argument("bulk concurrency must be >= 1"));
    }

    let excludes = build_excludes(&options.exclude)?;
    let entries = enumerate(root, options.recursive, excludes)?;
    tracing::info!(
        dir = %root.display(),
        recursive = options.recursive,
        section = %section.name,
        concurrency = options.concurrency,
        "starting bulk registration"
    );

    let uploader = options.uploader;
    let outcomes = stream::iter(entries)
        .map(move |entry| {
            let uploader = uploader.clone();
            async move {
                match entry {
                    Ok(path) => {
                        let result = register_entry(conn, section, path.clone(), &uploader).await;
                        match &result {
                            Ok(stored) => tracing::info!(location = %stored.file_location, "registered file"),
                            Err(e) => tracing::warn!(path = %path.display(), error = %e, "registration failed"),
                        }
                        BulkOutcome { path, result }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "could not read directory entry");
                        let path = match &e {
                            CatalogError::Io { path, .. } => path.clone(),
                            _ => PathBuf::new(),
                        };
                        BulkOutcome {
                            path,
                            result: Err(e),
                        }
                    }
                }
            }
        })
        .buffer_unordered(options.concurrency);

    Ok(outcomes)
}
