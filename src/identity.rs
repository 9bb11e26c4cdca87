//! Content identity for local files.
//!
//! A file's identity is the SHA-256 digest of its full byte stream. The
//! digest is computed at most once per [`LocalPath`] and cached on it; a read
//! failure part-way through fails the whole computation, so a partial digest
//! is never observable.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{CatalogError, Result};

/// Digest size in bytes.
pub const DIGEST_SIZE: usize = 32;

/// A 256-bit SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; DIGEST_SIZE]);

impl ContentDigest {
    /// Parse a 64-character hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        if hex_str.len() != DIGEST_SIZE * 2 {
            return Err(CatalogError::invalid_argument(format!(
                "expected {} hex characters, got {}",
                DIGEST_SIZE * 2,
                hex_str.len()
            )));
        }
        let bytes = hex::decode(hex_str)
            .map_err(|e| CatalogError::invalid_argument(format!("invalid hex digest: {}", e)))?;
        let mut digest = [0u8; DIGEST_SIZE];
        digest.copy_from_slice(&bytes);
        Ok(ContentDigest(digest))
    }

    /// Lowercase hex encoding used for interchange and storage.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn digest_bytes(data: &[u8]) -> Self {
        ContentDigest(Sha256::digest(data).into())
    }

    /// Digest everything a reader yields. Any read error aborts the digest.
    pub fn digest_reader<R: Read>(mut reader: R) -> std::io::Result<Self> {
        let mut hasher = Sha256::new();
        std::io::copy(&mut reader, &mut hasher)?;
        Ok(ContentDigest(hasher.finalize().into()))
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

/// What a [`LocalPath`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
}

/// A file or directory on the caller's filesystem.
#[derive(Debug, Clone)]
pub struct LocalPath {
    path: PathBuf,
    file_name: String,
    size: u64,
    kind: PathKind,
    digest: Option<ContentDigest>,
}

impl LocalPath {
    /// Inspect `path` without reading its contents.
    ///
    /// Fails with `NotFound` when there is no directory entry at `path`, and
    /// with `Io` when the entry exists but its metadata cannot be read (for
    /// example a dangling symlink).
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let absolute = std::path::absolute(path).map_err(|e| CatalogError::io(path, e))?;

        fs::symlink_metadata(&absolute).map_err(|e| CatalogError::from_io(&absolute, e))?;
        let metadata = fs::metadata(&absolute).map_err(|e| CatalogError::io(&absolute, e))?;

        let file_name = absolute
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let kind = if metadata.is_dir() {
            PathKind::Directory
        } else {
            PathKind::File
        };

        Ok(Self {
            path: absolute,
            file_name,
            size: metadata.len(),
            kind,
            digest: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn kind(&self) -> PathKind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == PathKind::Directory
    }

    /// The cached digest, if [`content_identity`](Self::content_identity) has run.
    pub fn digest(&self) -> Option<ContentDigest> {
        self.digest
    }

    /// Compute (once) and return the SHA-256 content identity.
    pub fn content_identity(&mut self) -> Result<ContentDigest> {
        if let Some(digest) = self.digest {
            return Ok(digest);
        }
        if self.is_dir() {
            return Err(CatalogError::invalid_argument(format!(
                "{} is a directory, not a file",
                self.path.display()
            )));
        }

        let file = fs::File::open(&self.path).map_err(|e| CatalogError::from_io(&self.path, e))?;
        self.digest_from(file)
    }

    /// Digest `reader` as this path's content. Only a complete read is cached.
    fn digest_from<R: Read>(&mut self, reader: R) -> Result<ContentDigest> {
        let digest =
            ContentDigest::digest_reader(reader).map_err(|e| CatalogError::io(&self.path, e))?;

        tracing::debug!(path = %self.path.display(), sha256 = %digest, "computed content identity");
        self.digest = Some(digest);
        Ok(digest)
    }
}
