//! Handles to the external systems Products and Tasks talk to: a
//! filesystem, a SQL database, a shell. Concrete backends live in the
//! sibling modules; the traits here are the contracts Products/Tasks are
//! written against, and what a [`crate::dag::Dag`]'s client registry holds.

pub mod fs;
pub mod postgres;
pub mod shell;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

pub use fs::LocalFsClient;
pub use postgres::PostgresClient;
pub use shell::LocalShellClient;

/// The kind of backend a [`crate::product::Product`] is stored in. Used as
/// the key into a DAG's client registry (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    Fs,
    Sql,
    Shell,
}

#[async_trait]
pub trait FsClient: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>>;
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<()>;
    async fn exists(&self, path: &str) -> Result<bool>;
    /// Idempotent: deleting a path that doesn't exist is not an error.
    async fn delete(&self, path: &str) -> Result<()>;
}

#[async_trait]
pub trait SqlClient: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<()>;
    /// Runs `sql` and returns its single text column from the first row.
    /// `Ok(None)` covers both "no row" and "row present but the column is
    /// SQL NULL" — callers (existence probes, `COMMENT` retrieval) treat
    /// both the same way, as absence. Deliberately narrowed to a single
    /// text column because every backend this crate ships only ever needs
    /// one — see DESIGN.md.
    async fn fetch_one(&self, sql: &str) -> Result<Option<String>>;
    async fn commit(&self) -> Result<()>;
    async fn rollback(&self) -> Result<()>;
    fn dialect(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

#[async_trait]
pub trait ShellClient: Send + Sync {
    async fn run(
        &self,
        command: &str,
        cwd: Option<&str>,
        env: &HashMap<String, String>,
    ) -> Result<ShellOutput>;
}

/// A handle stashed in a [`crate::dag::Dag`]'s client registry, resolved by
/// a Task's Product kind when the Task itself wasn't given a client
/// explicitly.
#[derive(Clone)]
pub enum Client {
    Fs(std::sync::Arc<dyn FsClient>),
    Sql(std::sync::Arc<dyn SqlClient>),
    Shell(std::sync::Arc<dyn ShellClient>),
}

impl Client {
    pub fn kind(&self) -> ClientKind {
        match self {
            Client::Fs(_) => ClientKind::Fs,
            Client::Sql(_) => ClientKind::Sql,
            Client::Shell(_) => ClientKind::Shell,
        }
    }

    pub fn as_fs(&self) -> Option<&std::sync::Arc<dyn FsClient>> {
        match self {
            Client::Fs(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> Option<&std::sync::Arc<dyn SqlClient>> {
        match self {
            Client::Sql(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_shell(&self) -> Option<&std::sync::Arc<dyn ShellClient>> {
        match self {
            Client::Shell(c) => Some(c),
            _ => None,
        }
    }
}
