//! Local asset storage: uploaded source images and retrieved videos.
//!
//! Videos are streamed into a uniquely named `.part` file next to their final path and
//! renamed into place only once every byte has been written, so `<task_id>.mp4` is
//! either absent or complete.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::config::StorageConfig;
use crate::error::{Error, ProviderError, Result, ValidationError};
use crate::provider::AssetStream;
use crate::types::TaskId;

/// Accepted source image extensions
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

const VIDEO_EXTENSION: &str = "mp4";

/// Upload and output directories
pub struct AssetStorage {
    upload_dir: PathBuf,
    output_dir: PathBuf,
    max_file_size: u64,
}

impl AssetStorage {
    /// Storage rooted at the configured directories
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            output_dir: config.output_dir.clone(),
            max_file_size: config.max_file_size,
        }
    }

    /// Create the upload and output directories if needed
    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.upload_dir, &self.output_dir] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create directory '{}': {}", dir.display(), e),
                ))
            })?;
        }
        Ok(())
    }

    /// Directory for uploaded images
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Directory for retrieved videos
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Configured upload size limit in bytes
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Final location of a task's video
    pub fn output_path_for(&self, id: &TaskId) -> PathBuf {
        self.output_dir.join(format!("{id}.{VIDEO_EXTENSION}"))
    }

    /// Store an uploaded image under a unique, sanitized name
    pub async fn save_upload(&self, original_name: &str, data: &[u8]) -> Result<PathBuf> {
        if original_name.trim().is_empty() {
            return Err(ValidationError::MissingImage.into());
        }
        if image_extension(Path::new(original_name)).is_none() {
            return Err(ValidationError::UnsupportedImage(original_name.to_string()).into());
        }
        let size = data.len() as u64;
        if size > self.max_file_size {
            return Err(ValidationError::ImageTooLarge {
                size,
                limit: self.max_file_size,
            }
            .into());
        }

        // Two uploads with the same name must not overwrite each other
        let file_name = format!("{}_{}", uuid::Uuid::new_v4().simple(), sanitize_filename(original_name));
        let path = self.upload_dir.join(file_name);
        tokio::fs::write(&path, data).await?;

        tracing::debug!(path = %path.display(), size, "Stored upload");
        Ok(path)
    }

    /// Check that a stored image can be submitted
    pub async fn validate_image(&self, path: &Path) -> std::result::Result<(), ValidationError> {
        if image_extension(path).is_none() {
            return Err(ValidationError::UnsupportedImage(path.display().to_string()));
        }
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            _ => Err(ValidationError::ImageNotFound(path.to_path_buf())),
        }
    }

    /// Read an image and inline it as a base64 `data:` URL
    pub async fn image_data_url(&self, path: &Path) -> Result<String> {
        let mime = image_extension(path)
            .map(mime_for_extension)
            .ok_or_else(|| ValidationError::UnsupportedImage(path.display().to_string()))?;
        let bytes = tokio::fs::read(path).await?;
        Ok(format!("data:{};base64,{}", mime, BASE64.encode(bytes)))
    }

    /// Stream a task's video to its final location.
    ///
    /// Returns the final path once the file is complete. On any error, or if the
    /// returned future is dropped mid-write, this call's partial file is removed and
    /// nothing appears at the final path.
    pub async fn write_output(
        &self,
        id: &TaskId,
        mut stream: AssetStream,
    ) -> std::result::Result<PathBuf, ProviderError> {
        let final_path = self.output_path_for(id);
        let mut partial = PartialFile::new(self.output_dir.join(format!(
            "{id}.{VIDEO_EXTENSION}.{}.part",
            uuid::Uuid::new_v4().simple()
        )));

        let mut file = tokio::fs::File::create(partial.path()).await?;
        let mut bytes = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            bytes += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(partial.path(), &final_path).await?;
        partial.keep();

        tracing::debug!(task_id = %id, path = %final_path.display(), bytes, "Stored result asset");
        Ok(final_path)
    }
}

/// A `.part` file owned by one in-flight write; removed on drop unless kept
struct PartialFile {
    path: PathBuf,
    keep: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// The file was renamed into place
    fn keep(&mut self) {
        self.keep = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::debug!(error = %e, file = %self.path.display(), "Could not remove partial asset");
        }
    }
}

/// Lower-cased extension if it is an accepted image type
fn image_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_IMAGE_EXTENSIONS
        .contains(&ext.as_str())
        .then_some(ext)
}

fn mime_for_extension(ext: String) -> &'static str {
    match ext.as_str() {
        "png" => "image/png",
        _ => "image/jpeg",
    }
}

/// Reduce a client-supplied file name to a safe ASCII basename
pub fn sanitize_filename(name: &str) -> String {
    // Only the last path component counts, whichever separator the client used
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
