//! kiln: a DAG-based build orchestrator for data pipelines. Tasks
//! materialize Products (files or relations) and are rebuilt only when
//! their data or their own source code has gone stale.

pub mod client;
pub mod code_differ;
pub mod config;
pub mod dag;
pub mod error;
pub mod identifier;
pub mod params;
pub mod product;
pub mod source;
pub mod task;
pub mod task_group;
pub mod template;

pub use dag::{BuildStats, Dag, RenderReport};
pub use error::{PipelineError, Result, ValidationWarning};
pub use identifier::{Identifier, RelationKind};
pub use params::Params;
pub use product::{FileProduct, MetaProduct, Metadata, Product, RelationProduct};
pub use source::Source;
pub use task::Task;
pub use task_group::TaskGroup;
pub use template::{RenderMode, Template};
