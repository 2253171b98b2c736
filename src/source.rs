//! A Placeholder wraps one piece of executable content — a shell command, a
//! SQL query or script, or a reference to a callable living in this process
//! — together with enough metadata (language, doc, location) for the engine
//! to decide whether it needs rendering and, later, whether it changed.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::code_differ::Language;
use crate::error::Result;
use crate::params::Params;
use crate::template::{RenderMode, Template};

/// A callable living in the host process, invoked by a `RustCallable` task.
pub type Callable = Arc<dyn Fn(&Params) -> Result<()> + Send + Sync>;

#[derive(Clone)]
enum Repr {
    /// A templated shell command (`StringPlaceholder` / `BashCommand` body).
    Shell(Template),
    /// A templated single SQL statement that does not necessarily declare a
    /// persistent relation (`SQLQuerySource`).
    SqlQuery(Template),
    /// A templated SQL script expected to declare exactly one persistent
    /// relation matching the owning product (`SQLScriptSource`).
    SqlScript(Template),
    /// References another product's identifier as a literal SQL relation
    /// reference once rendered (`SQLRelationPlaceholder`).
    SqlRelationRef(Template),
    /// A reference to a callable in this process. `needs_render` is always
    /// false: there is no template text to substitute into.
    RustCallable {
        callable: Callable,
        source_text: String,
    },
    /// Literal text, never validated or rendered (`GenericSource`).
    Generic(String),
}

impl fmt::Debug for Repr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Repr::Shell(t) => f.debug_tuple("Shell").field(t).finish(),
            Repr::SqlQuery(t) => f.debug_tuple("SqlQuery").field(t).finish(),
            Repr::SqlScript(t) => f.debug_tuple("SqlScript").field(t).finish(),
            Repr::SqlRelationRef(t) => f.debug_tuple("SqlRelationRef").field(t).finish(),
            Repr::RustCallable { source_text, .. } => {
                f.debug_struct("RustCallable").field("source_text", source_text).finish()
            }
            Repr::Generic(s) => f.debug_tuple("Generic").field(s).finish(),
        }
    }
}

/// A piece of executable content owned by a [`crate::task::Task`].
#[derive(Debug, Clone)]
pub struct Source {
    repr: Repr,
    doc: Option<String>,
    loc: String,
}

impl Source {
    pub fn shell(command: impl Into<String>, loc: impl Into<String>) -> Self {
        Source {
            repr: Repr::Shell(Template::new(command.into(), RenderMode::Strict)),
            doc: None,
            loc: loc.into(),
        }
    }

    pub fn sql_query(sql: impl Into<String>, loc: impl Into<String>) -> Self {
        Source {
            repr: Repr::SqlQuery(Template::new(sql.into(), RenderMode::Strict)),
            doc: None,
            loc: loc.into(),
        }
    }

    pub fn sql_script(sql: impl Into<String>, loc: impl Into<String>) -> Self {
        Source {
            repr: Repr::SqlScript(Template::new(sql.into(), RenderMode::Strict)),
            doc: None,
            loc: loc.into(),
        }
    }

    pub fn sql_relation_ref(identifier_text: impl Into<String>, loc: impl Into<String>) -> Self {
        Source {
            repr: Repr::SqlRelationRef(Template::new(identifier_text.into(), RenderMode::Strict)),
            doc: None,
            loc: loc.into(),
        }
    }

    pub fn rust_callable(
        callable: Callable,
        source_text: impl Into<String>,
        loc: impl Into<String>,
    ) -> Self {
        Source {
            repr: Repr::RustCallable {
                callable,
                source_text: source_text.into(),
            },
            doc: None,
            loc: loc.into(),
        }
    }

    pub fn generic(text: impl Into<String>, loc: impl Into<String>) -> Self {
        Source {
            repr: Repr::Generic(text.into()),
            doc: None,
            loc: loc.into(),
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn language(&self) -> Language {
        match &self.repr {
            Repr::Shell(_) => Language::Shell,
            Repr::SqlQuery(_) | Repr::SqlScript(_) | Repr::SqlRelationRef(_) => Language::Sql,
            Repr::RustCallable { .. } => Language::Python,
            Repr::Generic(_) => Language::Generic,
        }
    }

    pub fn needs_render(&self) -> bool {
        !matches!(self.repr, Repr::RustCallable { .. } | Repr::Generic(_))
    }

    pub fn raw(&self) -> &str {
        match &self.repr {
            Repr::Shell(t) | Repr::SqlQuery(t) | Repr::SqlScript(t) | Repr::SqlRelationRef(t) => {
                t.raw()
            }
            Repr::RustCallable { source_text, .. } => source_text,
            Repr::Generic(s) => s,
        }
    }

    pub fn rendered(&self) -> Result<&str> {
        match &self.repr {
            Repr::Shell(t) | Repr::SqlQuery(t) | Repr::SqlScript(t) | Repr::SqlRelationRef(t) => {
                t.rendered()
            }
            Repr::RustCallable { source_text, .. } => Ok(source_text),
            Repr::Generic(s) => Ok(s),
        }
    }

    pub fn render(&mut self, params: &mut Params) -> Result<&str> {
        match &mut self.repr {
            Repr::Shell(t) | Repr::SqlQuery(t) | Repr::SqlScript(t) | Repr::SqlRelationRef(t) => {
                t.render(params)
            }
            Repr::RustCallable { source_text, .. } => Ok(source_text.as_str()),
            Repr::Generic(s) => Ok(s.as_str()),
        }
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn doc_short(&self) -> Option<String> {
        self.doc.as_ref().map(|d| match d.split_once('\n') {
            Some((first, _)) => first.to_string(),
            None => d.clone(),
        })
    }

    pub fn loc(&self) -> &str {
        &self.loc
    }

    pub fn callable(&self) -> Option<&Callable> {
        match &self.repr {
            Repr::RustCallable { callable, .. } => Some(callable),
            _ => None,
        }
    }

    /// For a `SqlScript` source, parses the rendered text for a single
    /// `CREATE TABLE|VIEW [IF NOT EXISTS] [schema.]name` statement. Returns
    /// `None` if the source is not a SQL script, hasn't been rendered yet,
    /// or the statement shape isn't recognized (in which case validation is
    /// simply skipped — see §4.2).
    pub fn declared_relation(&self) -> Option<(Option<String>, String, &'static str)> {
        if !matches!(self.repr, Repr::SqlScript(_)) {
            return None;
        }
        let rendered = self.rendered().ok()?;
        declared_relation_pattern()
            .captures(rendered)
            .map(|c| {
                let kind = if c["kind"].eq_ignore_ascii_case("table") {
                    "TABLE"
                } else {
                    "VIEW"
                };
                let schema = c.name("schema").map(|m| m.as_str().to_string());
                let name = c["name"].to_string();
                (schema, name, kind)
            })
    }
}

fn declared_relation_pattern() -> &'static Regex {
    use std::sync::OnceLock;
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?is)create\s+(?:or\s+replace\s+)?(?P<kind>table|view)\s+(?:if\s+not\s+exists\s+)?(?:(?P<schema>[A-Za-z_][A-Za-z0-9_]*)\.)?(?P<name>[A-Za-z_][A-Za-z0-9_]*)",
        )
        .unwrap()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn generic_needs_no_render() {
        let src = Source::generic("literal text", "inline");
        assert!(!src.needs_render());
        assert_eq!(src.rendered().unwrap(), "literal text");
    }

    #[test]
    fn shell_renders_placeholders() {
        let mut src = Source::shell("cat {{ a }}", "pipeline.rs:1");
        let mut values = HashMap::new();
        values.insert("a".to_string(), serde_json::Value::String("a.txt".into()));
        let mut params = Params::new("t", values);
        assert_eq!(src.render(&mut params).unwrap(), "cat a.txt");
        assert_eq!(src.language(), Language::Shell);
    }

    #[test]
    fn sql_script_declared_relation_is_parsed() {
        let mut src = Source::sql_script("CREATE TABLE public.wine AS SELECT 1", "pipeline.rs:1");
        let mut params = Params::new("t", HashMap::new());
        src.render(&mut params).unwrap();
        let (schema, name, kind) = src.declared_relation().unwrap();
        assert_eq!(schema.as_deref(), Some("public"));
        assert_eq!(name, "wine");
        assert_eq!(kind, "TABLE");
    }

    #[test]
    fn doc_short_takes_first_line() {
        let src = Source::generic("x", "loc").with_doc("line one\nline two");
        assert_eq!(src.doc_short().unwrap(), "line one");
    }
}
