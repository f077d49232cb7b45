//! Orthogonal statement splitter (spec §4.1): splits a multi-statement
//! script on lines matching `^\s*--;; *(.*)$`, each opening a new named
//! statement (default name `Query #k`). Empty trailing statements are
//! discarded.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub name: String,
    pub text: String,
}

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*--;; *(.*)$").unwrap())
}

pub fn split_statements(script: &str) -> Vec<Statement> {
    let re = marker_re();
    let matches: Vec<(usize, usize, String)> = re
        .captures_iter(script)
        .map(|c| {
            let m = c.get(0).unwrap();
            let name = c.get(1).map(|g| g.as_str().trim().to_string()).unwrap_or_default();
            (m.start(), m.end(), name)
        })
        .collect();

    let mut statements = Vec::new();
    let mut counter = 1usize;

    if matches.is_empty() {
        let text = script.trim();
        if !text.is_empty() {
            statements.push(Statement {
                name: format!("Query #{counter}"),
                text: text.to_string(),
            });
        }
        return statements;
    }

    let prefix = script[..matches[0].0].trim();
    if !prefix.is_empty() {
        statements.push(Statement {
            name: format!("Query #{counter}"),
            text: prefix.to_string(),
        });
        counter += 1;
    }

    for (i, (_, end, name)) in matches.iter().enumerate() {
        let body_end = matches.get(i + 1).map(|(s, _, _)| *s).unwrap_or(script.len());
        let text = script[*end..body_end].trim().to_string();
        if text.is_empty() {
            continue;
        }
        let stmt_name = if name.is_empty() {
            format!("Query #{counter}")
        } else {
            name.clone()
        };
        statements.push(Statement { name: stmt_name, text });
        counter += 1;
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_markers_yields_one_default_statement() {
        let stmts = split_statements("select 1");
        assert_eq!(stmts, vec![Statement { name: "Query #1".into(), text: "select 1".into() }]);
    }

    #[test]
    fn named_markers_split_and_name_statements() {
        let script = "--;; first\nselect 1;\n--;; second\nselect 2;\n";
        let stmts = split_statements(script);
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].name, "first");
        assert_eq!(stmts[0].text, "select 1;");
        assert_eq!(stmts[1].name, "second");
        assert_eq!(stmts[1].text, "select 2;");
    }

    #[test]
    fn unnamed_marker_gets_default_name() {
        let script = "--;;\nselect 1;\n";
        let stmts = split_statements(script);
        assert_eq!(stmts[0].name, "Query #1");
    }

    #[test]
    fn empty_trailing_statement_is_discarded() {
        let script = "--;; a\nselect 1;\n--;; b\n   \n";
        let stmts = split_statements(script);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].name, "a");
    }
}
