use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};

/// Lowercase hex SHA-256 of an in-memory buffer.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Layout: `<base>/<first_2_hex_chars>/<full_hex>.<ext>`
pub fn attachment_path(attachments_dir: &Path, hash_hex: &str, ext: &str) -> PathBuf {
    let prefix = hash_hex.get(..2).unwrap_or("00");
    attachments_dir.join(prefix).join(format!("{hash_hex}.{ext}"))
}

fn extension_of(file_name: &str) -> &str {
    Path::new(file_name).extension().and_then(|e| e.to_str()).unwrap_or("bin")
}

/// Content-addressed store for generated report files.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

/// A stored blob, identified by its content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAttachment {
    pub sha256: String,
    pub size_bytes: i64,
    pub path: PathBuf,
}

impl AttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` unless identical content is already stored.
    pub async fn put(&self, file_name: &str, bytes: &[u8]) -> io::Result<StoredAttachment> {
        let sha256 = sha256_hex(bytes);
        let path = attachment_path(&self.root, &sha256, extension_of(file_name));

        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(%sha256, "Attachment already stored");
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, bytes).await?;
            tracing::info!(%sha256, size = bytes.len(), "Attachment stored");
        }

        Ok(StoredAttachment { sha256, size_bytes: bytes.len() as i64, path })
    }

    pub async fn get(&self, file_name: &str, sha256: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(attachment_path(&self.root, sha256, extension_of(file_name))).await
    }
}
