//! A plain local filesystem [`super::FsClient`], backing `FileProduct`.

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;

use super::FsClient;

#[derive(Debug, Clone, Default)]
pub struct LocalFsClient;

impl LocalFsClient {
    pub fn new() -> Self {
        LocalFsClient
    }
}

#[async_trait]
impl FsClient for LocalFsClient {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        debug!(path, "reading file");
        Ok(tokio::fs::read(path).await?)
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        debug!(path, bytes = bytes.len(), "writing file");
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b.txt");
        let client = LocalFsClient::new();
        client
            .write(path.to_str().unwrap(), b"hello")
            .await
            .unwrap();
        assert!(client.exists(path.to_str().unwrap()).await.unwrap());
        let bytes = client.read(path.to_str().unwrap()).await.unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn delete_missing_path_is_not_an_error() {
        let client = LocalFsClient::new();
        client.delete("/does/not/exist.txt").await.unwrap();
    }
}
