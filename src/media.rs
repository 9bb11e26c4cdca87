//! File type detection and draft record construction.
//!
//! Detection sniffs the first bytes of the file with `infer` and falls back
//! to the extension table below. Metadata extraction is best effort: a field
//! that cannot be determined is left empty rather than failing the draft.

use chrono::{DateTime, Utc};
use std::fs;
use std::io::Read;
use std::path::Path;

use crate::error::{CatalogError, Result};
use crate::identity::LocalPath;
use crate::models::{
    AudioMetadata, CatalogFile, DocumentMetadata, GameMetadata, MediaMetadata, MediaType,
    VideoMetadata,
};

const SNIFF_LEN: u64 = 8 * 1024;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "mkv", "avi", "mov", "webm", "wmv", "mpg", "mpeg", "ts"];
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "epub", "mobi", "doc", "docx", "odt", "rtf", "txt", "md"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "wav", "m4a", "aac", "opus"];

/// ROM extensions and the console they belong to.
const GAME_EXTENSIONS: &[(&str, &str)] = &[
    ("nes", "NES"),
    ("sfc", "SNES"),
    ("smc", "SNES"),
    ("gb", "Game Boy"),
    ("gbc", "Game Boy Color"),
    ("gba", "Game Boy Advance"),
    ("n64", "Nintendo 64"),
    ("z64", "Nintendo 64"),
    ("v64", "Nintendo 64"),
    ("nds", "Nintendo DS"),
    ("md", "Genesis"),
    ("gen", "Genesis"),
    ("sms", "Master System"),
    ("iso", "Disc Image"),
];

/// Region tags as they appear in conventional ROM file names.
const REGION_TAGS: &[(&str, &str)] = &[
    ("(usa)", "USA"),
    ("(u)", "USA"),
    ("(europe)", "Europe"),
    ("(e)", "Europe"),
    ("(japan)", "Japan"),
    ("(j)", "Japan"),
    ("(world)", "World"),
];

const DOCUMENT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/epub+zip",
    "application/x-mobipocket-ebook",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.oasis.opendocument.text",
    "application/rtf",
];

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

fn game_console(ext: &str) -> Option<&'static str> {
    GAME_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, console)| *console)
}

/// Classify by MIME type, if the sniffed type is conclusive.
fn classify_mime(mime: &str) -> Option<MediaType> {
    if mime.starts_with("video/") {
        Some(MediaType::Video)
    } else if mime.starts_with("audio/") {
        Some(MediaType::Audio)
    } else if DOCUMENT_MIME_TYPES.contains(&mime) {
        Some(MediaType::Document)
    } else {
        None
    }
}

/// Classify by file extension.
pub fn classify_extension(ext: &str) -> MediaType {
    let ext = ext.to_ascii_lowercase();
    let ext = ext.as_str();
    // `md` is both Markdown and a Genesis ROM; documents win.
    if VIDEO_EXTENSIONS.contains(&ext) {
        MediaType::Video
    } else if DOCUMENT_EXTENSIONS.contains(&ext) {
        MediaType::Document
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        MediaType::Audio
    } else if game_console(ext).is_some() {
        MediaType::Game
    } else {
        MediaType::Other
    }
}

fn sniff(path: &Path) -> Result<Vec<u8>> {
    let file = fs::File::open(path).map_err(|e| CatalogError::from_io(path, e))?;
    let mut buffer = Vec::new();
    file.take(SNIFF_LEN)
        .read_to_end(&mut buffer)
        .map_err(|e| CatalogError::io(path, e))?;
    Ok(buffer)
}

/// Detect the media type of a file and return the sniffed MIME type, if any.
pub fn detect(path: &Path) -> Result<(MediaType, Option<String>)> {
    let head = sniff(path)?;
    let mime = infer::get(&head).map(|kind| kind.mime_type().to_string());

    if let Some(media_type) = mime.as_deref().and_then(classify_mime) {
        return Ok((media_type, mime));
    }

    let media_type = extension_of(path)
        .map(|ext| classify_extension(&ext))
        .unwrap_or(MediaType::Other);
    Ok((media_type, mime))
}

fn parse_region(file_name: &str) -> Option<String> {
    let lower = file_name.to_ascii_lowercase();
    REGION_TAGS
        .iter()
        .find(|(tag, _)| lower.contains(tag))
        .map(|(_, region)| region.to_string())
}

fn pdf_page_count(path: &Path) -> Option<u32> {
    match lopdf::Document::load(path) {
        Ok(doc) => Some(doc.get_pages().len() as u32),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "could not read PDF page count");
            None
        }
    }
}

fn format_from(ext: Option<&str>, mime: Option<&str>) -> Option<String> {
    ext.map(str::to_string)
        .or_else(|| mime.and_then(|m| m.split('/').nth(1)).map(str::to_string))
}

fn extract_metadata(
    path: &Path,
    file_name: &str,
    media_type: MediaType,
    mime: Option<&str>,
) -> MediaMetadata {
    let ext = extension_of(path);
    let ext = ext.as_deref();

    match media_type {
        MediaType::Video => MediaMetadata::Video(VideoMetadata {
            format: format_from(ext, mime),
            ..VideoMetadata::default()
        }),
        MediaType::Document => {
            let is_pdf = ext == Some("pdf") || mime == Some("application/pdf");
            MediaMetadata::Document(DocumentMetadata {
                title: path.file_stem().map(|s| s.to_string_lossy().to_string()),
                author: None,
                page_count: if is_pdf { pdf_page_count(path) } else { None },
                format: format_from(ext, mime),
            })
        }
        MediaType::Game => MediaMetadata::Game(GameMetadata {
            console: ext.and_then(game_console).map(str::to_string),
            region: parse_region(file_name),
        }),
        MediaType::Audio => MediaMetadata::Audio(AudioMetadata {
            format: format_from(ext, mime),
        }),
        MediaType::Other => MediaMetadata::Other,
    }
}

fn creation_date(metadata: &fs::Metadata) -> DateTime<Utc> {
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

/// Build a draft [`CatalogFile`] from a local file.
///
/// The content identity must already have been computed on `local`; this
/// function never hashes. The draft's `file_location` is just the file name;
/// the registration engine replaces it with the section location.
pub fn build_record(local: &LocalPath) -> Result<CatalogFile> {
    let digest = local.digest().ok_or_else(|| {
        CatalogError::invalid_argument(format!(
            "content identity of {} has not been computed",
            local.path().display()
        ))
    })?;

    let path = local.path();
    let fs_metadata = fs::metadata(path).map_err(|e| CatalogError::from_io(path, e))?;
    let (media_type, mime) = detect(path)?;
    let metadata = extract_metadata(path, local.file_name(), media_type, mime.as_deref());

    tracing::debug!(
        path = %path.display(),
        file_type = %media_type,
        mime = mime.as_deref().unwrap_or("-"),
        "built draft record"
    );

    Ok(CatalogFile {
        id: None,
        section: None,
        file_name: local.file_name().to_string(),
        file_location: local.file_name().to_string(),
        file_size: local.size(),
        file_sha: digest.to_hex(),
        metadata,
        creation_date: creation_date(&fs_metadata),
        uploaded_date: None,
        uploaded_by: None,
        download_count: 0,
    })
}
