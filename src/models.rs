//! Core data models shared by both transports and the registration engine.
//!
//! [`Section`]s are typed collections; [`CatalogFile`]s are the registered
//! records. Type-specific metadata is a sum type ([`MediaMetadata`]) with one
//! variant per [`MediaType`], so a record can never carry, say, a page count
//! and a video codec at the same time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CatalogError;

/// The declared type of a section, and the detected type of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Document,
    Game,
    Audio,
    Other,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Document => "document",
            MediaType::Game => "game",
            MediaType::Audio => "audio",
            MediaType::Other => "other",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(MediaType::Video),
            "document" => Ok(MediaType::Document),
            "game" => Ok(MediaType::Game),
            "audio" => Ok(MediaType::Audio),
            "other" => Ok(MediaType::Other),
            _ => Err(CatalogError::UnknownMediaType {
                name: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub duration_secs: Option<f64>,
    pub format: Option<String>,
    pub resolution: Option<String>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub page_count: Option<u32>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub console: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioMetadata {
    pub format: Option<String>,
}

/// Type-specific metadata, tagged by `file_type` when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "file_type", rename_all = "lowercase")]
pub enum MediaMetadata {
    Video(VideoMetadata),
    Document(DocumentMetadata),
    Game(GameMetadata),
    Audio(AudioMetadata),
    Other,
}

impl MediaMetadata {
    pub fn media_type(&self) -> MediaType {
        match self {
            MediaMetadata::Video(_) => MediaType::Video,
            MediaMetadata::Document(_) => MediaType::Document,
            MediaMetadata::Game(_) => MediaType::Game,
            MediaMetadata::Audio(_) => MediaType::Audio,
            MediaMetadata::Other => MediaType::Other,
        }
    }

    /// Empty metadata of the given type.
    pub fn empty(media_type: MediaType) -> Self {
        match media_type {
            MediaType::Video => MediaMetadata::Video(VideoMetadata::default()),
            MediaType::Document => MediaMetadata::Document(DocumentMetadata::default()),
            MediaType::Game => MediaMetadata::Game(GameMetadata::default()),
            MediaType::Audio => MediaMetadata::Audio(AudioMetadata::default()),
            MediaType::Other => MediaMetadata::Other,
        }
    }
}

/// A named, typed collection of catalog files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    /// Remote base path; registered files live at `remote_path/<file name>`.
    pub remote_path: String,
    pub section_type: MediaType,
    /// Aggregate size in bytes, maintained by the backing store.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub total_downloads: u64,
    #[serde(default)]
    pub total_uploads: u64,
    /// Backing-store collection identifier.
    pub collection: String,
    /// Section identifier in the integrated media index, if any.
    #[serde(default)]
    pub media_index_section: Option<String>,
}

impl Section {
    /// Whether a file of `file_type` may be registered here.
    pub fn accepts(&self, file_type: MediaType) -> bool {
        self.section_type == file_type
    }

    /// Remote location of `file_name` inside this section.
    pub fn location_for(&self, file_name: &str) -> String {
        format!("{}/{}", self.remote_path.trim_end_matches('/'), file_name)
    }
}

/// A registered file record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogFile {
    /// Server-assigned identity; absent on drafts.
    #[serde(default)]
    pub id: Option<String>,
    /// Name of the owning section; absent on drafts.
    #[serde(default)]
    pub section: Option<String>,
    pub file_name: String,
    pub file_location: String,
    pub file_size: u64,
    /// Hex-encoded SHA-256 of the file contents.
    pub file_sha: String,
    pub metadata: MediaMetadata,
    pub creation_date: DateTime<Utc>,
    #[serde(default)]
    pub uploaded_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub uploaded_by: Option<String>,
    #[serde(default)]
    pub download_count: u64,
}

impl CatalogFile {
    pub fn file_type(&self) -> MediaType {
        self.metadata.media_type()
    }

    /// Record who uploaded the file and when; resets the download counter.
    pub fn set_upload_info(&mut self, uploader: &str) {
        self.uploaded_by = Some(uploader.to_string());
        self.uploaded_date = Some(Utc::now());
        self.download_count = 0;
    }

    /// The value of `key` for this record, as used by `index` and `search`.
    pub fn project(&self, key: IndexKey) -> String {
        match key {
            IndexKey::FileName => self.file_name.clone(),
            IndexKey::FileLocation => self.file_location.clone(),
            IndexKey::FileSha => self.file_sha.clone(),
            IndexKey::FileType => self.file_type().to_string(),
            IndexKey::UploadedBy => self.uploaded_by.clone().unwrap_or_default(),
        }
    }
}

/// Record fields that `index` and `search` can project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKey {
    #[default]
    FileName,
    FileLocation,
    FileSha,
    FileType,
    UploadedBy,
}

impl IndexKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKey::FileName => "file_name",
            IndexKey::FileLocation => "file_location",
            IndexKey::FileSha => "file_sha",
            IndexKey::FileType => "file_type",
            IndexKey::UploadedBy => "uploaded_by",
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexKey {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file_name" => Ok(IndexKey::FileName),
            "file_location" => Ok(IndexKey::FileLocation),
            "file_sha" => Ok(IndexKey::FileSha),
            "file_type" => Ok(IndexKey::FileType),
            "uploaded_by" => Ok(IndexKey::UploadedBy),
            other => Err(CatalogError::invalid_argument(format!(
                "unknown index key '{}'",
                other
            ))),
        }
    }
}
