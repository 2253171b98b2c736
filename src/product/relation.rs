//! A Product materialized as a Postgres table or view. Metadata travels as
//! base64-encoded JSON in the relation's `COMMENT`, since a relational
//! backend has no sidecar file to write (§4.3).

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::debug;

use crate::client::SqlClient;
use crate::error::Result;
use crate::identifier::{Identifier, RelationKind};

use super::{Metadata, Product};

pub struct RelationProduct {
    identifier: Identifier,
    client: Arc<dyn SqlClient>,
}

impl RelationProduct {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        kind: RelationKind,
        client: Arc<dyn SqlClient>,
    ) -> Self {
        RelationProduct {
            identifier: Identifier::relation(schema, name, kind),
            client,
        }
    }

    fn rendered(&self) -> Result<(&str, &str, RelationKind)> {
        let (schema, name, kind) = self
            .identifier
            .as_relation()
            .expect("RelationProduct always wraps a relation identifier");
        Ok((schema, name?, kind))
    }

    fn qualified(&self) -> Result<String> {
        self.identifier.rendered_text()
    }
}

#[async_trait]
impl Product for RelationProduct {
    fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    fn identifier_mut(&mut self) -> &mut Identifier {
        &mut self.identifier
    }

    async fn exists(&self) -> Result<bool> {
        let qualified = self.qualified()?;
        let sql = format!("SELECT to_regclass('{qualified}')::text AS value");
        Ok(self.client.fetch_one(&sql).await?.is_some())
    }

    async fn fetch_metadata(&self) -> Result<Metadata> {
        let qualified = self.qualified()?;
        let sql = format!(
            "SELECT obj_description('{qualified}'::regclass::oid, 'pg_class') AS value"
        );
        match self.client.fetch_one(&sql).await? {
            Some(encoded) if !encoded.is_empty() => {
                let bytes = BASE64.decode(encoded)?;
                Ok(serde_json::from_slice(&bytes).unwrap_or_default())
            }
            _ => Ok(Metadata::default()),
        }
    }

    async fn save_metadata(&self, metadata: &Metadata) -> Result<()> {
        let qualified = self.qualified()?;
        let json = serde_json::to_vec(metadata)?;
        let encoded = BASE64.encode(json);
        debug!(qualified, "saving relation product metadata as COMMENT");
        let sql = format!("COMMENT ON {} {qualified} IS '{encoded}'", self.rendered()?.2.as_sql());
        self.client.execute(&sql).await
    }

    async fn delete(&self, force: bool) -> Result<()> {
        let qualified = self.qualified()?;
        let kind = self.rendered()?.2.as_sql();
        let sql = if force {
            format!("DROP {kind} IF EXISTS {qualified} CASCADE")
        } else {
            format!("DROP {kind} IF EXISTS {qualified}")
        };
        self.client.execute(&sql).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSql {
        executed: Mutex<Vec<String>>,
        comment: Mutex<Option<String>>,
        relclass: Mutex<Option<String>>,
    }

    #[async_trait]
    impl SqlClient for FakeSql {
        async fn execute(&self, sql: &str) -> Result<()> {
            if sql.starts_with("COMMENT") {
                let start = sql.find("IS '").unwrap() + 4;
                let encoded = &sql[start..sql.len() - 1];
                *self.comment.lock().unwrap() = Some(encoded.to_string());
            }
            if sql.starts_with("DROP") {
                *self.relclass.lock().unwrap() = None;
            }
            self.executed.lock().unwrap().push(sql.to_string());
            Ok(())
        }
        async fn fetch_one(&self, sql: &str) -> Result<Option<String>> {
            if sql.contains("to_regclass") {
                return Ok(self.relclass.lock().unwrap().clone());
            }
            if sql.contains("obj_description") {
                return Ok(self.comment.lock().unwrap().clone());
            }
            Ok(None)
        }
        async fn commit(&self) -> Result<()> {
            Ok(())
        }
        async fn rollback(&self) -> Result<()> {
            Ok(())
        }
        fn dialect(&self) -> &str {
            "fake"
        }
    }

    #[tokio::test]
    async fn metadata_round_trips_through_comment() {
        let fake = Arc::new(FakeSql::default());
        *fake.relclass.lock().unwrap() = Some("12345".to_string());
        let mut product = RelationProduct::new("public", "wine", RelationKind::Table, fake);
        let mut params = Params::new("t", HashMap::new());
        product.render(&mut params).unwrap();

        assert!(product.exists().await.unwrap());
        assert!(product.fetch_metadata().await.unwrap().is_empty());

        let meta = Metadata {
            timestamp: Some(10.0),
            stored_source_code: Some("CREATE TABLE wine AS SELECT 1".to_string()),
        };
        product.save_metadata(&meta).await.unwrap();
        let fetched = product.fetch_metadata().await.unwrap();
        assert_eq!(fetched, meta);
    }
}
