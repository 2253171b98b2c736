//! A Product materialized as a plain file, with metadata kept in a JSON
//! sidecar (`<path>.meta.json`) alongside it (§4.3).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::client::{FsClient, LocalFsClient};
use crate::error::Result;
use crate::identifier::Identifier;

use super::{Metadata, Product};

pub struct FileProduct {
    identifier: Identifier,
    client: Arc<dyn FsClient>,
}

impl FileProduct {
    /// A file product backed by the default local filesystem client.
    pub fn new(path: impl Into<String>) -> Self {
        FileProduct::with_client(path, Arc::new(LocalFsClient::new()))
    }

    pub fn with_client(path: impl Into<String>, client: Arc<dyn FsClient>) -> Self {
        FileProduct {
            identifier: Identifier::file_path(path),
            client,
        }
    }

    fn path(&self) -> Result<String> {
        Ok(self.identifier.rendered_text()?)
    }

    fn sidecar_path(&self) -> Result<String> {
        Ok(format!("{}.meta.json", self.path()?))
    }
}

#[async_trait]
impl Product for FileProduct {
    fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    fn identifier_mut(&mut self) -> &mut Identifier {
        &mut self.identifier
    }

    async fn exists(&self) -> Result<bool> {
        self.client.exists(&self.path()?).await
    }

    async fn fetch_metadata(&self) -> Result<Metadata> {
        let sidecar = self.sidecar_path()?;
        if !self.client.exists(&sidecar).await? {
            return Ok(Metadata::default());
        }
        let bytes = self.client.read(&sidecar).await?;
        Ok(serde_json::from_slice(&bytes).unwrap_or_default())
    }

    async fn save_metadata(&self, metadata: &Metadata) -> Result<()> {
        let sidecar = self.sidecar_path()?;
        let bytes = serde_json::to_vec_pretty(metadata)?;
        debug!(sidecar, "saving file product metadata");
        self.client.write(&sidecar, &bytes).await
    }

    async fn delete(&self, _force: bool) -> Result<()> {
        let path = self.path()?;
        let sidecar = self.sidecar_path()?;
        self.client.delete(&path).await?;
        self.client.delete(&sidecar).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use std::collections::HashMap;

    #[tokio::test]
    async fn round_trips_metadata_through_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut product = FileProduct::new(path.to_str().unwrap());
        let mut params = Params::new("t", HashMap::new());
        product.render(&mut params).unwrap();

        assert!(!product.exists().await.unwrap());
        assert!(product.fetch_metadata().await.unwrap().is_empty());

        let meta = Metadata {
            timestamp: Some(42.0),
            stored_source_code: Some("echo hi".to_string()),
        };
        // save_metadata alone does not create the product's own file.
        product.save_metadata(&meta).await.unwrap();
        let fetched = product.fetch_metadata().await.unwrap();
        assert_eq!(fetched, meta);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.csv");
        let mut product = FileProduct::new(path.to_str().unwrap());
        let mut params = Params::new("t", HashMap::new());
        product.render(&mut params).unwrap();
        product.delete(false).await.unwrap();
        product.delete(false).await.unwrap();
    }
}
