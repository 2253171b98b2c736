//! Normalizes and compares task source code across versions, so a
//! reformatted-but-unchanged task is not mistaken for a code change.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Shell,
    Sql,
    Python,
    Generic,
}

/// Returns true iff `previous` and `current` differ once normalized for
/// `language`. Never errors: an unparsable input simply compares as
/// byte-for-byte (post-trim) text.
pub fn code_changed(language: Language, previous: &str, current: &str) -> bool {
    normalize(language, previous) != normalize(language, current)
}

fn normalize(language: Language, source: &str) -> String {
    match language {
        Language::Python => normalize_python(source),
        Language::Sql => normalize_sql(source),
        Language::Shell | Language::Generic => normalize_trim_trailing(source),
    }
}

fn normalize_trim_trailing(source: &str) -> String {
    source
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

/// Strips trailing whitespace per line and drops comment-only lines, while
/// keeping docstrings (triple-quoted strings are never comment lines, so
/// they naturally survive this line-oriented pass).
fn normalize_python(source: &str) -> String {
    source
        .lines()
        .map(|line| line.trim_end())
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

/// Collapses whitespace runs to a single space and lower-cases the result so
/// comparisons are case-insensitive on keywords (and everything else, which
/// is a reasonable trade-off for a normalizer that never errors).
fn normalize_sql(source: &str) -> String {
    let collapsed = source.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_ignores_trailing_whitespace() {
        assert!(!code_changed(Language::Shell, "echo hi   \n", "echo hi"));
    }

    #[test]
    fn shell_detects_real_change() {
        assert!(code_changed(Language::Shell, "echo a", "echo b"));
    }

    #[test]
    fn sql_is_whitespace_and_case_insensitive() {
        assert!(!code_changed(
            Language::Sql,
            "SELECT  *\nFROM foo",
            "select * from foo"
        ));
    }

    #[test]
    fn sql_detects_real_change() {
        assert!(code_changed(Language::Sql, "select * from foo", "select * from bar"));
    }

    #[test]
    fn python_ignores_comment_only_lines() {
        let a = "x = 1\n# a comment\ny = 2\n";
        let b = "x = 1\ny = 2\n";
        assert!(!code_changed(Language::Python, a, b));
    }

    #[test]
    fn python_preserves_docstrings() {
        let a = "\"\"\"doc\"\"\"\nx = 1\n";
        let b = "x = 1\n";
        assert!(code_changed(Language::Python, a, b));
    }
}
