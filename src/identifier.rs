//! The unique, possibly-templated name of a [`crate::product::Product`].

use crate::error::{PipelineError, Result};
use crate::params::Params;
use crate::template::{RenderMode, Template};

/// Relation name length limit shared by Postgres and most relational
/// backends (`NAMEDATALEN` - 1).
pub const MAX_RELATION_NAME_LEN: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Table,
    View,
}

impl RelationKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            RelationKind::Table => "TABLE",
            RelationKind::View => "VIEW",
        }
    }
}

#[derive(Debug, Clone)]
enum Repr {
    FilePath(Template),
    Relation {
        schema: String,
        name: Template,
        kind: RelationKind,
    },
    Generic(Template),
}

/// A Product's identifier: a filesystem path, a `(schema, name, kind)`
/// relation triple, or an opaque generic string. Holds raw (possibly
/// templated) content until `render` produces a pure literal.
#[derive(Debug, Clone)]
pub struct Identifier {
    repr: Repr,
}

impl Identifier {
    pub fn file_path(path: impl Into<String>) -> Self {
        Identifier {
            repr: Repr::FilePath(Template::new(path.into(), RenderMode::Strict)),
        }
    }

    pub fn relation(
        schema: impl Into<String>,
        name: impl Into<String>,
        kind: RelationKind,
    ) -> Self {
        Identifier {
            repr: Repr::Relation {
                schema: schema.into(),
                name: Template::new(name.into(), RenderMode::Strict),
                kind,
            },
        }
    }

    pub fn generic(value: impl Into<String>) -> Self {
        Identifier {
            repr: Repr::Generic(Template::new(value.into(), RenderMode::Strict)),
        }
    }

    pub fn is_rendered(&self) -> bool {
        match &self.repr {
            Repr::FilePath(t) => t.is_rendered(),
            Repr::Relation { name, .. } => name.is_rendered(),
            Repr::Generic(t) => t.is_rendered(),
        }
    }

    /// Renders at most once; a second call is a no-op.
    pub fn render(&mut self, params: &mut Params) -> Result<()> {
        match &mut self.repr {
            Repr::FilePath(t) => {
                t.render(params)?;
            }
            Repr::Relation { name, .. } => {
                name.render(params)?;
                self.validate_relation_name()?;
            }
            Repr::Generic(t) => {
                t.render(params)?;
            }
        }
        Ok(())
    }

    fn validate_relation_name(&self) -> Result<()> {
        if let Repr::Relation { name, .. } = &self.repr {
            let rendered = name.rendered()?;
            if rendered.len() > MAX_RELATION_NAME_LEN {
                return Err(PipelineError::InvalidIdentifier(format!(
                    "relation name '{rendered}' is {} characters, exceeds the {MAX_RELATION_NAME_LEN} character limit",
                    rendered.len()
                )));
            }
        }
        Ok(())
    }

    /// The final literal form. For a file path, the path string; for a
    /// relation, `"schema"."name"`; for a generic identifier, its text.
    pub fn rendered_text(&self) -> Result<String> {
        match &self.repr {
            Repr::FilePath(t) => Ok(t.rendered()?.to_string()),
            Repr::Relation { schema, name, .. } => {
                let rendered_name = name.rendered()?;
                Ok(format!("\"{schema}\".\"{rendered_name}\""))
            }
            Repr::Generic(t) => Ok(t.rendered()?.to_string()),
        }
    }

    pub fn as_relation(&self) -> Option<(&str, Result<&str>, RelationKind)> {
        match &self.repr {
            Repr::Relation { schema, name, kind } => Some((schema.as_str(), name.rendered(), *kind)),
            _ => None,
        }
    }

    pub fn as_file_path(&self) -> Option<Result<&str>> {
        match &self.repr {
            Repr::FilePath(t) => Some(t.rendered()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn empty_params() -> Params {
        Params::new("t", HashMap::new())
    }

    #[test]
    fn reading_before_render_fails() {
        let id = Identifier::file_path("out/{{ name }}.txt");
        assert!(id.rendered_text().is_err());
    }

    #[test]
    fn relation_renders_to_quoted_pair() {
        let mut id = Identifier::relation("public", "wine", RelationKind::Table);
        let mut params = empty_params();
        id.render(&mut params).unwrap();
        assert_eq!(id.rendered_text().unwrap(), "\"public\".\"wine\"");
    }

    #[test]
    fn relation_name_over_limit_is_rejected() {
        let long_name = "a".repeat(MAX_RELATION_NAME_LEN + 1);
        let mut id = Identifier::relation("public", long_name, RelationKind::Table);
        let mut params = empty_params();
        let err = id.render(&mut params).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidIdentifier(_)));
    }

    #[test]
    fn file_path_renders_literal_path() {
        let mut id = Identifier::file_path("a.txt");
        let mut params = empty_params();
        id.render(&mut params).unwrap();
        assert_eq!(id.rendered_text().unwrap(), "a.txt");
    }
}
