//! A [`super::SqlClient`] backed by `diesel-async` over a `bb8` connection
//! pool.

use async_trait::async_trait;
use diesel::sql_types::Nullable;
use diesel::sql_types::Text;
use diesel::QueryableByName;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::debug;

use crate::error::Result;

use super::SqlClient;

/// A single text column aliased as `value`. Every query run through
/// [`PostgresClient::fetch_one`] must alias its one column this way.
/// Nullable: `to_regclass(...)::text` and `obj_description(...)` both
/// return exactly one row whose `value` is SQL NULL when there's nothing
/// to report.
#[derive(QueryableByName)]
struct TextRow {
    #[diesel(sql_type = Nullable<Text>)]
    value: Option<String>,
}

pub struct PostgresClient {
    pool: Pool<AsyncPgConnection>,
}

impl PostgresClient {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder().build(manager).await?;
        Ok(PostgresClient { pool })
    }

    async fn conn(&self) -> Result<PooledConnection<'_, AsyncPgConnection>> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl SqlClient for PostgresClient {
    async fn execute(&self, sql: &str) -> Result<()> {
        debug!(sql, "executing statement");
        let mut conn = self.conn().await?;
        diesel::sql_query(sql).execute(&mut conn).await?;
        Ok(())
    }

    async fn fetch_one(&self, sql: &str) -> Result<Option<String>> {
        debug!(sql, "fetching one row");
        let mut conn = self.conn().await?;
        let row = diesel::sql_query(sql)
            .get_result::<TextRow>(&mut conn)
            .await;
        match row {
            Ok(row) => Ok(row.value),
            Err(diesel::result::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn commit(&self) -> Result<()> {
        // Each statement above runs on its own pooled connection and
        // transaction-per-statement semantics, so there is nothing to
        // commit explicitly; kept as a contract method for clients backed
        // by an explicit transaction (§6).
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        Ok(())
    }

    fn dialect(&self) -> &str {
        "postgres"
    }
}
