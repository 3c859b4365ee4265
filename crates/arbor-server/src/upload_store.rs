//! Filesystem storage for images attached to trees.
//!
//! Files live at `{root}/{tree_id}/{token}.{ext}` where `token` is 32 random
//! bytes in hex.  Nothing about an upload is recorded in the database; the
//! file on disk is the whole record.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use rand::rngs::OsRng;
use rand::RngCore;
use tokio::fs;
use tracing::{debug, info};

use crate::error::ServerError;

/// Accepted (lower-case) file extensions.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// Random bytes per generated file name.
const TOKEN_BYTES: usize = 32;

/// Return the lower-cased extension of `file_name` if it is on the allow-list.
///
/// The extension is whatever follows the last `.`; names without a dot have
/// none.
pub fn allowed_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Content type served for a stored upload, derived from its extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    match allowed_extension(file_name).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Whether `data` starts with the magic bytes of the format named by `ext`.
fn matches_signature(ext: &str, data: &[u8]) -> bool {
    match ext {
        "png" => data.starts_with(b"\x89PNG\r\n\x1a\n"),
        "jpg" | "jpeg" => data.starts_with(&[0xFF, 0xD8, 0xFF]),
        "gif" => data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a"),
        "webp" => data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP",
        _ => false,
    }
}

/// Reject anything that is not a single plain path component.
fn safe_segment(segment: &str) -> Result<&str, ServerError> {
    let mut components = Path::new(segment).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );

    if !single || segment.contains(['/', '\\', '\0']) || segment.contains("..") {
        return Err(ServerError::BadRequest(
            "Path traversal detected".to_string(),
        ));
    }
    Ok(segment)
}

/// Public URL under which an upload is served.
pub fn upload_url(tree_id: &str, file_name: &str) -> String {
    format!("/uploads/{tree_id}/{file_name}")
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    max_size: usize,
    verify_content: bool,
}

impl UploadStore {
    pub async fn new(
        root: PathBuf,
        max_size: usize,
        verify_content: bool,
    ) -> Result<Self, ServerError> {
        fs::create_dir_all(&root).await.map_err(|e| {
            ServerError::UploadStorage(format!(
                "Failed to create upload directory '{}': {}",
                root.display(),
                e
            ))
        })?;

        info!(path = %root.display(), verify_content, "Upload store initialized");

        Ok(Self {
            root,
            max_size,
            verify_content,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate and write an upload for `tree_id`, returning its URL.
    ///
    /// The caller is responsible for checking that the tree exists.
    pub async fn store(
        &self,
        tree_id: &str,
        file_name: &str,
        data: &[u8],
    ) -> Result<String, ServerError> {
        let ext = allowed_extension(file_name)
            .ok_or_else(|| ServerError::BadRequest("Invalid file type".to_string()))?;

        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty file".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::PayloadTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }
        if self.verify_content && !matches_signature(&ext, data) {
            return Err(ServerError::BadRequest(
                "File content does not match its extension".to_string(),
            ));
        }

        let dir = self.tree_dir(tree_id)?;
        fs::create_dir_all(&dir).await.map_err(|e| {
            ServerError::UploadStorage(format!("Failed to create directory for {tree_id}: {e}"))
        })?;

        let mut token = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut token);
        let stored_name = format!("{}.{ext}", hex::encode(token));

        fs::write(dir.join(&stored_name), data).await.map_err(|e| {
            ServerError::UploadStorage(format!("Failed to write {stored_name}: {e}"))
        })?;

        info!(
            tree_id,
            original = file_name,
            stored = %stored_name,
            size = data.len(),
            "Stored upload"
        );
        Ok(upload_url(tree_id, &stored_name))
    }

    /// Read back a stored upload.
    pub async fn read(&self, tree_id: &str, file_name: &str) -> Result<Vec<u8>, ServerError> {
        let path = self.tree_dir(tree_id)?.join(safe_segment(file_name)?);

        let data = fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ServerError::UploadNotFound,
            _ => ServerError::UploadStorage(format!("Failed to read {}: {e}", path.display())),
        })?;

        debug!(tree_id, file = file_name, size = data.len(), "Served upload");
        Ok(data)
    }

    /// Remove every upload belonging to `tree_id`.  Returns `false` if the
    /// tree never had any.
    pub async fn purge_tree(&self, tree_id: &str) -> Result<bool, ServerError> {
        let dir = self.tree_dir(tree_id)?;

        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(tree_id, "Purged uploads");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ServerError::UploadStorage(format!(
                "Failed to purge uploads for {tree_id}: {e}"
            ))),
        }
    }

    fn tree_dir(&self, tree_id: &str) -> Result<PathBuf, ServerError> {
        Ok(self.root.join(safe_segment(tree_id)?))
    }
}
