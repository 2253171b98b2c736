//! The bag of parameters visible to a task while it renders its source and
//! product identifier. [`Template::render`](crate::template::Template::render)
//! reports which top-level keys a template actually referenced; [`Params`]
//! tallies those against what was declared so a task can warn about
//! parameters that were never used once its render pass is complete.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::warn;

/// Names every task's params mapping always carries, regardless of what the
/// user declared. These are never reported as "unused".
const WELL_KNOWN_KEYS: &[&str] = &["product", "upstream"];

/// An observed params mapping for one task's render pass.
#[derive(Debug, Clone)]
pub struct Params {
    task: String,
    values: HashMap<String, Value>,
    consumed: HashSet<String>,
}

impl Params {
    pub fn new(task: impl Into<String>, values: HashMap<String, Value>) -> Self {
        Params {
            task: task.into(),
            values,
            consumed: HashSet::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key) || WELL_KNOWN_KEYS.contains(&key)
    }

    /// The full mapping, used as the render context passed to the template
    /// engine.
    pub fn as_map(&self) -> &HashMap<String, Value> {
        &self.values
    }

    /// Records that `key` was read by a render pass.
    pub fn mark_used(&mut self, key: &str) {
        self.consumed.insert(key.to_string());
    }

    /// Returns the declared keys that were never marked used via
    /// [`Params::mark_used`], logging a warning for each one. Intended to be
    /// called once, after a task has finished rendering all of its sources.
    pub fn warn_unused(&self) -> Vec<String> {
        let unused: Vec<String> = self
            .values
            .keys()
            .filter(|k| !WELL_KNOWN_KEYS.contains(&k.as_str()) && !self.consumed.contains(*k))
            .cloned()
            .collect();
        for key in &unused {
            warn!(task = %self.task, param = %key, "param declared but never used while rendering");
        }
        unused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_param_is_reported() {
        let mut values = HashMap::new();
        values.insert("greeting".to_string(), Value::from("hi"));
        values.insert("unused".to_string(), Value::from("nope"));
        let mut params = Params::new("t1", values);

        params.mark_used("greeting");

        assert_eq!(params.warn_unused(), vec!["unused".to_string()]);
    }

    #[test]
    fn well_known_keys_never_reported() {
        let mut values = HashMap::new();
        values.insert("product".to_string(), Value::from("x"));
        values.insert("upstream".to_string(), Value::from("y"));
        let params = Params::new("t1", values);
        assert!(params.warn_unused().is_empty());
    }
}
