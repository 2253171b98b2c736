//! A Task: one node in the DAG. Owns the [`Source`] that builds its
//! [`Product`](crate::product::Product), the upstream task names it reads
//! from, and the declared params visible while rendering (§4.6).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::client::{Client, ClientKind, ShellOutput};
use crate::code_differ;
use crate::error::{PipelineError, Result};
use crate::params::Params;
use crate::product::{Metadata, Product};
use crate::source::Source;

/// A post-run hook invoked after a Task's `run()` succeeds and before its
/// metadata is saved — an assertion that the produced data looks right.
/// Failing a check behaves like a failed run: metadata is not saved.
pub type Check = Arc<dyn Fn() -> Result<()> + Send + Sync>;

pub struct Task {
    name: String,
    doc: Option<String>,
    source: Source,
    product: Arc<dyn Product>,
    upstream: Vec<String>,
    declared_params: HashMap<String, Value>,
    client: Option<Client>,
    checks: Vec<Check>,
}

impl Task {
    pub fn new(name: impl Into<String>, source: Source, product: Arc<dyn Product>) -> Self {
        Task {
            name: name.into(),
            doc: None,
            source,
            product,
            upstream: Vec::new(),
            declared_params: HashMap::new(),
            client: None,
            checks: Vec::new(),
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_params(mut self, params: HashMap<String, Value>) -> Self {
        self.declared_params = params;
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    pub fn depends_on(mut self, upstream: impl Into<String>) -> Self {
        self.upstream.push(upstream.into());
        self
    }

    /// Adds one more upstream name after construction, used by
    /// [`crate::dag::Dag::attach_group`] to fan a TaskGroup's members in.
    pub fn add_upstream(&mut self, upstream: impl Into<String>) {
        self.upstream.push(upstream.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn upstream(&self) -> &[String] {
        &self.upstream
    }

    pub fn product(&self) -> &dyn Product {
        self.product.as_ref()
    }

    pub fn product_mut(&mut self) -> &mut dyn Product {
        Arc::get_mut(&mut self.product)
            .expect("task's product shared before its own render pass")
    }

    /// A shared handle to this task's product, used to build a
    /// [`crate::product::MetaProduct`] view over several tasks' products
    /// (e.g. a Dag's terminal tasks) without cloning the underlying data.
    pub fn product_arc(&self) -> Arc<dyn Product> {
        Arc::clone(&self.product)
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Builds this task's params for one render pass: the declared params
    /// plus the well-known `product` (this task's rendered identifier, once
    /// known) and `upstream` (a map of upstream task name to its rendered
    /// identifier) keys.
    pub fn build_params(
        &self,
        product_identifier: Option<&str>,
        upstream_identifiers: &HashMap<String, String>,
    ) -> Params {
        let mut values = self.declared_params.clone();
        if let Some(product) = product_identifier {
            values.insert("product".to_string(), Value::String(product.to_string()));
        }
        if !upstream_identifiers.is_empty() {
            let upstream_map: serde_json::Map<String, Value> = upstream_identifiers
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            values.insert("upstream".to_string(), Value::Object(upstream_map));
        }
        Params::new(self.name.clone(), values)
    }

    /// Renders this task's product identifier. Done before `render_source`
    /// because the source's params may reference the product's own
    /// rendered identifier via the well-known `product` key, which is only
    /// known once this step completes.
    pub fn render_product(&mut self, params: &mut Params) -> Result<()> {
        debug!(task = %self.name, "rendering product identifier");
        self.product_mut().render(params)
    }

    pub fn render_source(&mut self, params: &mut Params) -> Result<()> {
        debug!(task = %self.name, "rendering source");
        if self.source.needs_render() {
            self.source.render(params)?;
        }
        Ok(())
    }

    /// True if this task's current rendered source differs from what was
    /// stored in its product's metadata at the last successful run.
    pub fn is_code_outdated(&self, stored_source: Option<&str>) -> Result<bool> {
        let current = self.source.rendered()?;
        Ok(match stored_source {
            None => true,
            Some(stored) => code_differ::code_changed(self.source.language(), stored, current),
        })
    }

    /// Executes this task's source against whatever client it was given,
    /// falling back to `registry` (a Dag's client registry, keyed by the
    /// kind of backend the task's source needs to run against) when the
    /// task wasn't handed one of its own via `with_client`. Returns the
    /// resulting [`ShellOutput`] for shell tasks (useful to callers wanting
    /// to inspect stdout), or `None` for SQL/callable tasks.
    pub async fn run(
        &self,
        registry: &HashMap<ClientKind, Client>,
    ) -> Result<Option<ShellOutput>> {
        let rendered = self.source.rendered()?;
        info!(task = %self.name, "running");

        match &self.source {
            s if matches!(s.language(), code_differ::Language::Shell) => {
                let shell = self
                    .client
                    .as_ref()
                    .and_then(Client::as_shell)
                    .or_else(|| registry.get(&ClientKind::Shell).and_then(Client::as_shell))
                    .ok_or_else(|| {
                        PipelineError::Internal(format!(
                            "task '{}' runs a shell command but was given no shell client and none is registered",
                            self.name
                        ))
                    })?;
                let output = shell.run(rendered, None, &HashMap::new()).await?;
                if !output.success() {
                    return Err(PipelineError::TaskRunFailed {
                        task: self.name.clone(),
                        reason: format!("exit code {}: {}", output.status, output.stderr),
                    });
                }
                Ok(Some(output))
            }
            s if matches!(s.language(), code_differ::Language::Sql) => {
                let sql = self
                    .client
                    .as_ref()
                    .and_then(Client::as_sql)
                    .or_else(|| registry.get(&ClientKind::Sql).and_then(Client::as_sql))
                    .ok_or_else(|| {
                        PipelineError::Internal(format!(
                            "task '{}' runs SQL but was given no SQL client and none is registered",
                            self.name
                        ))
                    })?;
                sql.execute(rendered).await.map_err(|e| PipelineError::TaskRunFailed {
                    task: self.name.clone(),
                    reason: e.to_string(),
                })?;
                Ok(None)
            }
            _ => {
                if let Some(callable) = self.source.callable() {
                    let params = Params::new(self.name.clone(), HashMap::new());
                    callable(&params).map_err(|e| PipelineError::TaskRunFailed {
                        task: self.name.clone(),
                        reason: e.to_string(),
                    })?;
                }
                Ok(None)
            }
        }
    }

    /// Runs every registered check; the first failure short-circuits.
    pub fn run_checks(&self) -> Result<()> {
        for check in &self.checks {
            check()?;
        }
        Ok(())
    }

    pub fn metadata_from_now(&self, now: f64) -> Result<Metadata> {
        Ok(Metadata {
            timestamp: Some(now),
            stored_source_code: Some(self.source.rendered()?.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::FileProduct;

    fn task() -> Task {
        let source = Source::generic("print('hi')", "inline");
        let product = Arc::new(FileProduct::new("out.txt"));
        Task::new("t1", source, product)
    }

    #[test]
    fn build_params_includes_well_known_keys() {
        let t = task().with_params(HashMap::from([(
            "greeting".to_string(),
            Value::String("hi".to_string()),
        )]));
        let mut upstream = HashMap::new();
        upstream.insert("a".to_string(), "out/a.csv".to_string());
        let params = t.build_params(Some("out/t1.csv"), &upstream);
        assert_eq!(
            params.get("product"),
            Some(&Value::String("out/t1.csv".to_string()))
        );
        assert!(params.get("upstream").is_some());
        assert_eq!(params.get("greeting"), Some(&Value::String("hi".to_string())));
    }

    #[test]
    fn code_outdated_when_no_prior_source() {
        let t = task();
        assert!(t.is_code_outdated(None).unwrap());
    }
}
