//! The DAG: holds every Task, orders them topologically, and runs the
//! two-phase render-then-build pipeline (§4.8).

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::client::{Client, ClientKind};
use crate::error::{PipelineError, Result, ValidationWarning};
use crate::product::MetaProduct;
use crate::task::Task;
use crate::task_group::TaskGroup;

/// Warnings collected while rendering; never fatal.
#[derive(Debug, Default)]
pub struct RenderReport {
    pub warnings: Vec<ValidationWarning>,
}

/// What `Dag::build` did with each task, including how long each attempt
/// took.
#[derive(Debug, Default)]
pub struct BuildStats {
    pub ran: Vec<(String, f64)>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String, f64)>,
}

impl BuildStats {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Dag {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
    rendered: bool,
    clients: HashMap<ClientKind, Client>,
}

impl Default for Dag {
    fn default() -> Self {
        Self::new()
    }
}

impl Dag {
    pub fn new() -> Self {
        Dag {
            tasks: Vec::new(),
            index: HashMap::new(),
            rendered: false,
            clients: HashMap::new(),
        }
    }

    /// Registers `client` in this Dag's client registry, keyed by its kind.
    /// A Task that wasn't given a client of its own via `with_client` falls
    /// back to whatever this registry holds for the kind its source needs
    /// (§4.8). Registering a second client of the same kind replaces the
    /// first.
    pub fn register_client(&mut self, client: Client) -> &mut Self {
        self.clients.insert(client.kind(), client);
        self
    }

    /// Adds `task` to the DAG. Every name the task declares as upstream
    /// (via `depends_on`) must already have been added.
    pub fn add_task(&mut self, task: Task) -> Result<&mut Self> {
        if self.index.contains_key(task.name()) {
            return Err(PipelineError::Internal(format!(
                "task '{}' was already added to this dag",
                task.name()
            )));
        }
        for upstream in task.upstream() {
            if !self.index.contains_key(upstream) {
                return Err(PipelineError::Internal(format!(
                    "task '{}' depends on unknown upstream task '{upstream}'",
                    task.name()
                )));
            }
        }
        let idx = self.tasks.len();
        self.index.insert(task.name().to_string(), idx);
        self.tasks.push(task);
        self.rendered = false;
        Ok(self)
    }

    /// Attaches every member of `group` as upstream of `task_name`.
    pub fn attach_group(&mut self, task_name: &str, group: &TaskGroup) -> Result<()> {
        for member in group.members() {
            if !self.index.contains_key(member) {
                return Err(PipelineError::Internal(format!(
                    "task group '{}' references unknown task '{member}'",
                    group.name()
                )));
            }
        }
        let idx = *self.index.get(task_name).ok_or_else(|| {
            PipelineError::Internal(format!("cannot attach group to unknown task '{task_name}'"))
        })?;
        for member in group.members() {
            self.tasks[idx].add_upstream(member.clone());
        }
        self.rendered = false;
        Ok(())
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.index.get(name).map(|&i| &self.tasks[i])
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Names of the tasks nothing else in this Dag depends on.
    fn terminal_task_names(&self) -> Vec<&str> {
        let mut depended_on: HashSet<&str> = HashSet::new();
        for task in &self.tasks {
            for upstream in task.upstream() {
                depended_on.insert(upstream.as_str());
            }
        }
        self.tasks
            .iter()
            .map(|t| t.name())
            .filter(|name| !depended_on.contains(name))
            .collect()
    }

    /// A read-only view over this Dag's terminal tasks' products as one
    /// Product, so a whole Dag can be used as a single upstream input
    /// elsewhere (§4.8). Panics if the Dag has no tasks — an empty Dag has
    /// no product to expose.
    pub fn as_product(&self) -> MetaProduct {
        let members: Vec<(String, std::sync::Arc<dyn crate::product::Product>)> = self
            .terminal_task_names()
            .into_iter()
            .map(|name| {
                let task = self.task(name).expect("terminal task name came from this dag");
                (name.to_string(), task.product_arc())
            })
            .collect();
        assert!(!members.is_empty(), "cannot view an empty dag as a product");
        MetaProduct::new("dag", members)
    }

    fn topological_order(&self) -> Result<Vec<usize>> {
        let n = self.tasks.len();
        let mut indegree = vec![0usize; n];
        let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (idx, task) in self.tasks.iter().enumerate() {
            for upstream in task.upstream() {
                let upstream_idx = *self
                    .index
                    .get(upstream)
                    .expect("add_task validated upstream names exist");
                downstream[upstream_idx].push(idx);
                indegree[idx] += 1;
            }
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            for &next in &downstream[idx] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() != n {
            let stuck: Vec<String> = (0..n)
                .filter(|&i| indegree[i] != 0)
                .map(|i| self.tasks[i].name().to_string())
                .collect();
            return Err(PipelineError::CycleDetected(stuck));
        }
        Ok(order)
    }

    /// Renders every task's product identifier then its source, in
    /// topological order, and returns the warnings observed along the way.
    /// Does not run anything.
    pub fn render(&mut self) -> Result<RenderReport> {
        let order = self.topological_order()?;
        let mut report = RenderReport::default();
        let mut upstream_identifiers: HashMap<String, String> = HashMap::new();

        for idx in order {
            let task_name = self.tasks[idx].name().to_string();
            let upstream_names = self.tasks[idx].upstream().to_vec();
            let this_upstream: HashMap<String, String> = upstream_names
                .iter()
                .filter_map(|u| upstream_identifiers.get(u).map(|v| (u.clone(), v.clone())))
                .collect();

            let mut product_params = self.tasks[idx].build_params(None, &this_upstream);
            self.tasks[idx].render_product(&mut product_params)?;
            for key in product_params.warn_unused() {
                report.warnings.push(ValidationWarning::UnusedParam {
                    task: task_name.clone(),
                    key,
                });
            }

            let product_identifier = self.tasks[idx].product().identifier().rendered_text()?;

            let mut source_params =
                self.tasks[idx].build_params(Some(&product_identifier), &this_upstream);
            self.tasks[idx].render_source(&mut source_params)?;
            for key in source_params.warn_unused() {
                report.warnings.push(ValidationWarning::UnusedParam {
                    task: task_name.clone(),
                    key,
                });
            }

            if let Some((schema, name, kind)) = self.tasks[idx].source().declared_relation() {
                if let Some((product_schema, product_name, product_kind)) =
                    self.tasks[idx].product().identifier().as_relation()
                {
                    let product_name = product_name?;
                    let schema_matches = schema.as_deref().map_or(true, |s| s == product_schema);
                    let kind_matches = kind == product_kind.as_sql();
                    if !schema_matches || name != product_name || !kind_matches {
                        let found = format!("{kind} {name}");
                        let expected = format!("{} {product_schema}.{product_name}", product_kind.as_sql());
                        warn!(task = %task_name, found, expected, "sql script declares a different relation than its product");
                        report.warnings.push(ValidationWarning::RelationMismatch {
                            task: task_name.clone(),
                            expected,
                            found,
                        });
                    }
                }
            }

            upstream_identifiers.insert(task_name, product_identifier);
        }

        self.rendered = true;
        Ok(report)
    }

    /// Runs every outdated task in topological order, skipping any task
    /// downstream of a failure while letting independent branches proceed
    /// (§4.8, §8 scenario 4).
    pub async fn build(&mut self) -> Result<BuildStats> {
        if !self.rendered {
            self.render()?;
        }
        let order = self.topological_order()?;
        let mut stats = BuildStats::default();
        let mut blocked: HashSet<usize> = HashSet::new();
        let mut timestamps: HashMap<usize, Option<f64>> = HashMap::new();

        for idx in order {
            let name = self.tasks[idx].name().to_string();

            let upstream_blocked = self.tasks[idx]
                .upstream()
                .iter()
                .any(|u| blocked.contains(self.index.get(u).unwrap()));
            if upstream_blocked {
                blocked.insert(idx);
                stats.skipped.push(name);
                continue;
            }

            let start = Instant::now();
            match self.build_one(idx, &timestamps).await {
                Ok(BuildOutcome::Ran(ts)) => {
                    timestamps.insert(idx, Some(ts));
                    stats.ran.push((name, start.elapsed().as_secs_f64()));
                }
                Ok(BuildOutcome::Skipped(ts)) => {
                    timestamps.insert(idx, ts);
                    stats.skipped.push(name);
                }
                Err(e) => {
                    blocked.insert(idx);
                    timestamps.insert(idx, None);
                    stats.failed.push((name, e.to_string(), start.elapsed().as_secs_f64()));
                }
            }
        }

        Ok(stats)
    }

    async fn build_one(
        &mut self,
        idx: usize,
        timestamps: &HashMap<usize, Option<f64>>,
    ) -> Result<BuildOutcome> {
        let task = &self.tasks[idx];
        let product = task.product();
        let exists = product.exists().await?;
        let metadata = product.fetch_metadata().await?;

        let upstream_newer = task.upstream().iter().any(|u| {
            let upstream_idx = *self.index.get(u).unwrap();
            match (timestamps.get(&upstream_idx), metadata.timestamp) {
                (Some(Some(upstream_ts)), Some(own_ts)) => upstream_ts > &own_ts,
                (Some(Some(_)), None) => true,
                (Some(None), _) => true,
                (None, _) => false,
            }
        });

        let data_outdated = !exists || metadata.timestamp.is_none() || upstream_newer;
        let code_outdated = task.is_code_outdated(metadata.stored_source_code.as_deref())?;

        if !data_outdated && !code_outdated {
            info!(task = task.name(), "up to date, skipping");
            return Ok(BuildOutcome::Skipped(metadata.timestamp));
        }

        info!(task = task.name(), data_outdated, code_outdated, "running");
        let registry = &self.clients;
        let task = &mut self.tasks[idx];
        task.run(registry).await?;
        task.run_checks()?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        let new_metadata = task.metadata_from_now(now)?;
        task.product().save_metadata(&new_metadata).await?;

        Ok(BuildOutcome::Ran(now))
    }
}

enum BuildOutcome {
    Ran(f64),
    Skipped(Option<f64>),
}
