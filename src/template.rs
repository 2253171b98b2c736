//! `{{var}}` placeholder rendering. A [`Template`] is a thin wrapper around a
//! source string: it can tell you whether it has any placeholders at all
//! (a *literal*), which top-level names it references, and render itself
//! exactly once against a [`Params`] mapping.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::error::{PipelineError, Result};
use crate::params::Params;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)").unwrap())
}

/// Whether unknown variables referenced by a template abort the render
/// (`Strict`) or are tolerated and render as empty text (`Lax`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Strict,
    Lax,
}

#[derive(Debug, Clone)]
struct Rendered {
    text: String,
    params_signature: String,
}

/// A `{{…}}` template over a source string, rendered at most once.
#[derive(Debug, Clone)]
pub struct Template {
    raw: String,
    mode: RenderMode,
    rendered: Option<Rendered>,
}

impl Template {
    pub fn new(raw: impl Into<String>, mode: RenderMode) -> Self {
        let raw = raw.into();
        let mut tmpl = Template {
            raw,
            mode,
            rendered: None,
        };
        // Literals may be rendered eagerly with empty params (§4.1).
        if tmpl.is_literal() {
            let text = tmpl.raw.clone();
            tmpl.rendered = Some(Rendered {
                text,
                params_signature: String::new(),
            });
        }
        tmpl
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// A template is literal iff it contains no `{{…}}` placeholders.
    pub fn is_literal(&self) -> bool {
        !self.raw.contains("{{")
    }

    pub fn is_rendered(&self) -> bool {
        self.rendered.is_some()
    }

    /// The top-level variable names this template references, e.g. a
    /// template containing `{{ upstream.ta }} and {{ x }}` references
    /// `["upstream", "x"]`.
    pub fn referenced_names(&self) -> Vec<String> {
        placeholder_pattern()
            .captures_iter(&self.raw)
            .map(|c| c[1].to_string())
            .collect()
    }

    pub fn rendered(&self) -> Result<&str> {
        match &self.rendered {
            Some(r) => Ok(&r.text),
            None => Err(PipelineError::NotRendered(self.raw.clone())),
        }
    }

    /// Renders the template against `params`, marking every referenced
    /// top-level name as used. A second render is a no-op (idempotent) if
    /// the params signature is unchanged; otherwise it logs
    /// [`crate::error::ValidationWarning::DuplicateRender`] and keeps the
    /// first render.
    pub fn render(&mut self, params: &mut Params) -> Result<&str> {
        let signature = params_signature(params);

        if let Some(existing) = &self.rendered {
            if existing.params_signature == signature || self.is_literal() {
                return Ok(&self.rendered.as_ref().unwrap().text);
            }
            warn!(
                raw = %self.raw,
                "template rendered a second time with different params; keeping first render"
            );
            return Ok(&self.rendered.as_ref().unwrap().text);
        }

        let names = self.referenced_names();
        if self.mode == RenderMode::Strict {
            for name in &names {
                if !params.contains_key(name) {
                    return Err(PipelineError::RenderFailed {
                        template: self.raw.clone(),
                        missing: name.clone(),
                    });
                }
            }
        }
        for name in &names {
            params.mark_used(name);
        }

        let env = minijinja::Environment::new();
        let text = env.render_str(&self.raw, params.as_map())?;

        self.rendered = Some(Rendered {
            text,
            params_signature: signature,
        });
        Ok(&self.rendered.as_ref().unwrap().text)
    }
}

fn params_signature(params: &Params) -> String {
    let mut entries: Vec<(&String, String)> = params
        .as_map()
        .iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn params_with(pairs: &[(&str, &str)]) -> Params {
        let mut values = HashMap::new();
        for (k, v) in pairs {
            values.insert(k.to_string(), serde_json::Value::String(v.to_string()));
        }
        Params::new("t", values)
    }

    #[test]
    fn literal_has_no_placeholders_and_renders_eagerly() {
        let tmpl = Template::new("echo hello", RenderMode::Strict);
        assert!(tmpl.is_literal());
        assert!(tmpl.is_rendered());
        assert_eq!(tmpl.rendered().unwrap(), "echo hello");
    }

    #[test]
    fn strict_mode_fails_on_missing_variable() {
        let mut tmpl = Template::new("echo {{ undeclared }}", RenderMode::Strict);
        let mut params = params_with(&[]);
        let err = tmpl.render(&mut params).unwrap_err();
        match err {
            PipelineError::RenderFailed { missing, .. } => assert_eq!(missing, "undeclared"),
            other => panic!("expected RenderFailed, got {other:?}"),
        }
    }

    #[test]
    fn lax_mode_tolerates_missing_variable() {
        let mut tmpl = Template::new("echo [{{ undeclared }}]", RenderMode::Lax);
        let mut params = params_with(&[]);
        let out = tmpl.render(&mut params).unwrap();
        assert_eq!(out, "echo []");
    }

    #[test]
    fn render_substitutes_and_marks_used() {
        let mut tmpl = Template::new("cat {{ upstream_a }} > out", RenderMode::Strict);
        let mut params = params_with(&[("upstream_a", "a.txt")]);
        let out = tmpl.render(&mut params).unwrap();
        assert_eq!(out, "cat a.txt > out");
        assert!(params.warn_unused().is_empty());
    }

    #[test]
    fn second_render_with_same_params_is_noop() {
        let mut tmpl = Template::new("cat {{ a }}", RenderMode::Strict);
        let mut params = params_with(&[("a", "x")]);
        let first = tmpl.render(&mut params).unwrap().to_string();
        let second = tmpl.render(&mut params).unwrap().to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn second_render_with_different_params_keeps_first() {
        let mut tmpl = Template::new("cat {{ a }}", RenderMode::Strict);
        let mut params1 = params_with(&[("a", "x")]);
        let first = tmpl.render(&mut params1).unwrap().to_string();

        let mut params2 = params_with(&[("a", "y")]);
        let second = tmpl.render(&mut params2).unwrap().to_string();
        assert_eq!(first, second);
        assert_eq!(second, "cat x");
    }
}
