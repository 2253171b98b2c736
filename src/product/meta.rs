//! A facade over several Products owned by one Task, so a Task that
//! materializes more than one file or relation can still be treated as a
//! single Product by the rest of the engine (§4.5).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{PipelineError, Result, ValidationWarning};
use crate::identifier::Identifier;
use crate::params::Params;

use super::{Metadata, Product};

pub struct MetaProduct {
    task: String,
    names: Vec<String>,
    products: Vec<Arc<dyn Product>>,
}

impl MetaProduct {
    pub fn new(task: impl Into<String>, members: Vec<(String, Arc<dyn Product>)>) -> Self {
        let mut names = Vec::with_capacity(members.len());
        let mut products = Vec::with_capacity(members.len());
        for (name, product) in members {
            names.push(name);
            products.push(product);
        }
        MetaProduct {
            task: task.into(),
            names,
            products,
        }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Product> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.products[i].as_ref())
    }

    pub fn get_index(&self, index: usize) -> Option<&dyn Product> {
        self.products.get(index).map(|p| p.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Product)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.products.iter().map(|p| p.as_ref()))
    }
}

#[async_trait]
impl Product for MetaProduct {
    fn identifier(&self) -> &Identifier {
        // A MetaProduct has no identifier of its own; callers needing a
        // single identifier should index into a member instead. Panics
        // only if misused — every call site in this crate goes through
        // `iter`/`get` for MetaProducts.
        self.products[0].identifier()
    }

    fn identifier_mut(&mut self) -> &mut Identifier {
        Arc::get_mut(&mut self.products[0])
            .expect("MetaProduct member shared before its own render pass")
            .identifier_mut()
    }

    async fn exists(&self) -> Result<bool> {
        for product in &self.products {
            if !product.exists().await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// The combined timestamp is the latest member timestamp, or `None` if
    /// any member has never been built. The combined source is the members'
    /// common stored source, or `None` (with a warning) if they disagree —
    /// divergence here means the members were built by different task runs
    /// and the group's code-outdatedness can no longer be judged as one.
    async fn fetch_metadata(&self) -> Result<Metadata> {
        let mut timestamp: Option<f64> = Some(f64::MIN);
        let mut source: Option<Option<String>> = None;
        let mut divergent = false;

        for product in &self.products {
            let meta = product.fetch_metadata().await?;
            match (timestamp, meta.timestamp) {
                (Some(acc), Some(t)) => timestamp = Some(acc.max(t)),
                _ => timestamp = None,
            }
            match &source {
                None => source = Some(meta.stored_source_code.clone()),
                Some(existing) if *existing != meta.stored_source_code => divergent = true,
                Some(_) => {}
            }
        }

        if divergent {
            warn!(
                task = %self.task,
                "{}",
                ValidationWarning::DivergentStoredSource {
                    task: self.task.clone()
                }
            );
        }

        Ok(Metadata {
            timestamp: if timestamp == Some(f64::MIN) {
                None
            } else {
                timestamp
            },
            stored_source_code: if divergent {
                None
            } else {
                source.flatten()
            },
        })
    }

    async fn save_metadata(&self, metadata: &Metadata) -> Result<()> {
        for product in &self.products {
            product.save_metadata(metadata).await?;
        }
        Ok(())
    }

    async fn delete(&self, force: bool) -> Result<()> {
        for product in &self.products {
            product.delete(force).await?;
        }
        Ok(())
    }

    fn render(&mut self, params: &mut Params) -> Result<()> {
        for product in &mut self.products {
            Arc::get_mut(product)
                .expect("MetaProduct member shared before its own render pass")
                .render(params)?;
        }
        Ok(())
    }
}

impl MetaProduct {
    /// Renders a single member by name, returning its literal identifier
    /// text. Used by upstream templates referencing one file out of a
    /// multi-product task (glossary: MetaProduct indexing).
    pub fn rendered_text(&self, name: &str) -> Result<String> {
        self.get(name)
            .ok_or_else(|| PipelineError::Internal(format!("no such product member: {name}")))?
            .identifier()
            .rendered_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::FileProduct;
    use std::collections::HashMap;

    fn file(path: &str) -> Arc<dyn Product> {
        Arc::new(FileProduct::new(path))
    }

    #[tokio::test]
    async fn exists_requires_all_members() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        tokio::fs::write(&a, b"x").await.unwrap();

        let mut meta = MetaProduct::new(
            "t",
            vec![
                ("a".to_string(), file(a.to_str().unwrap())),
                ("b".to_string(), file(b.to_str().unwrap())),
            ],
        );
        let mut params = Params::new("t", HashMap::new());
        meta.render(&mut params).unwrap();
        assert!(!meta.exists().await.unwrap());

        tokio::fs::write(&b, b"y").await.unwrap();
        assert!(meta.exists().await.unwrap());
    }

    #[tokio::test]
    async fn metadata_timestamp_is_max_of_members() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");

        let mut meta = MetaProduct::new(
            "t",
            vec![
                ("a".to_string(), file(a.to_str().unwrap())),
                ("b".to_string(), file(b.to_str().unwrap())),
            ],
        );
        let mut params = Params::new("t", HashMap::new());
        meta.render(&mut params).unwrap();

        meta.get("a")
            .unwrap()
            .save_metadata(&Metadata {
                timestamp: Some(1.0),
                stored_source_code: Some("same".into()),
            })
            .await
            .unwrap();
        meta.get("b")
            .unwrap()
            .save_metadata(&Metadata {
                timestamp: Some(5.0),
                stored_source_code: Some("same".into()),
            })
            .await
            .unwrap();

        let combined = meta.fetch_metadata().await.unwrap();
        assert_eq!(combined.timestamp, Some(5.0));
        assert_eq!(combined.stored_source_code.as_deref(), Some("same"));
    }
}
