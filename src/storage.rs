//! Directory-backed storage for listing images
//!
//! Uploaded images are written under a configured directory with random,
//! opaque keys. Listings store only the keys; the public URL is resolved at
//! display time. Keys are validated on read so the store can never serve a
//! path outside its directory.

use rand::{distr::Alphanumeric, Rng};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid image key")]
    InvalidKey,
}

/// Object store for listing images.
pub struct ImageStore {
    root: PathBuf,
    /// Base of the public URLs, e.g. "http://localhost:8080/images".
    public_base: String,
}

impl ImageStore {
    pub fn new(root: PathBuf, public_base: String) -> Self {
        ImageStore { root, public_base }
    }

    /// Stores one image and returns its opaque key.
    ///
    /// The key is a random 16-character id plus the (sanitized) extension of
    /// the uploaded file name, defaulting to "jpg".
    pub async fn save(&self, file_name: Option<&str>, bytes: &[u8]) -> Result<String, ImageError> {
        let ext = file_name
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| "jpg".to_string());

        let id: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        let key = format!("{}.{}", id, ext);

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(&key), bytes).await?;

        Ok(key)
    }

    /// Reads an image back; `Ok(None)` when the key is unknown.
    pub async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, ImageError> {
        if !Self::is_valid_key(key) {
            return Err(ImageError::InvalidKey);
        }

        match tokio::fs::read(self.root.join(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Public URL a client can fetch the image from.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }

    /// Content type derived from the key extension.
    pub fn content_type(key: &str) -> &'static str {
        match key.rsplit_once('.').map(|(_, ext)| ext) {
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            Some("svg") => "image/svg+xml",
            _ => "image/jpeg",
        }
    }

    // Keys are flat file names; anything that could traverse is rejected.
    fn is_valid_key(key: &str) -> bool {
        !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
            && !key.contains("..")
    }
}
