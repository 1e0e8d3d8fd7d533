use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Where the bytes of a candidate file come from.
#[derive(Debug, Clone)]
pub enum FileContent {
    /// Already in memory
    Bytes(Bytes),
    /// On disk; streamed when transferred
    Path(PathBuf),
}

/// A file selected by the host for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Filename as presented to the backend (no directory components)
    pub name: String,
    pub size_bytes: u64,
    /// MIME type declared by the host, if known
    pub content_type: Option<String>,
    pub content: FileContent,
}

impl UploadFile {
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size_bytes: data.len() as u64,
            content_type: None,
            content: FileContent::Bytes(data),
        }
    }

    /// Describe a file on disk. Only metadata is read here.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Not a regular file: {}", path.display()),
            ));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(String::from)
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        Ok(Self {
            name,
            size_bytes: metadata.len(),
            content_type: None,
            content: FileContent::Path(path.to_path_buf()),
        })
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Hex-encoded SHA-256 of the file content.
    pub async fn sha256_hex(&self) -> std::io::Result<String> {
        let mut hasher = Sha256::new();
        match &self.content {
            FileContent::Bytes(data) => hasher.update(data),
            FileContent::Path(path) => {
                let mut file = tokio::fs::File::open(path).await?;
                let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
                loop {
                    let read = file.read(&mut buffer).await?;
                    if read == 0 {
                        break;
                    }
                    hasher.update(&buffer[..read]);
                }
            }
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // sha256("abc")
    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[tokio::test]
    async fn checksum_of_bytes() {
        let file = UploadFile::from_bytes("model.3dm", &b"abc"[..]);
        assert_eq!(file.size_bytes, 3);
        assert_eq!(file.sha256_hex().await.unwrap(), ABC_SHA256);
    }

    #[tokio::test]
    async fn from_path_reads_metadata_and_hashes_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.3dm");
        let mut handle = std::fs::File::create(&path).unwrap();
        handle.write_all(b"abc").unwrap();
        drop(handle);

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "bridge.3dm");
        assert_eq!(file.size_bytes, 3);
        assert!(matches!(file.content, FileContent::Path(_)));
        assert_eq!(file.sha256_hex().await.unwrap(), ABC_SHA256);
    }

    #[tokio::test]
    async fn from_path_rejects_directories() {
        let dir = tempfile::tempdir().unwrap();
        let err = UploadFile::from_path(dir.path()).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }
}
