//! Tunables that govern how a [`crate::dag::Dag`] runs, as opposed to what it
//! builds. Unlike the environment-driven settings of a deployed service, this
//! crate never reads the process environment itself: the embedding
//! application constructs [`BuildOptions`] explicitly.

/// Options controlling a single `Dag::build` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// When true, tasks with no directed path between them may run
    /// concurrently. Default: false, i.e. strict sequential topological
    /// execution.
    pub parallel: bool,
    /// Upper bound on concurrently running tasks when `parallel` is set.
    /// Ignored when `parallel` is false.
    pub max_concurrency: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            parallel: false,
            max_concurrency: 4,
        }
    }
}

impl BuildOptions {
    pub fn sequential() -> Self {
        Self::default()
    }

    pub fn parallel(max_concurrency: usize) -> Self {
        BuildOptions {
            parallel: true,
            max_concurrency,
        }
    }
}
