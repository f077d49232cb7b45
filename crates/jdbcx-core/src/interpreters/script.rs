//! `script` interpreter (spec §4.4). Grounded on the teacher's
//! `blocks/script.rs` engine-selection + helper-object pattern: `language`
//! selects the embeddable engine (currently `rhai`, the only one the
//! dependency ledger carries), context variables are pre-bound into its
//! scope, and a `helper` object exposes the utility methods spec.md lists.

use super::{post_process, Interpreter, InvocationContext};
use crate::error::{Error, Result};
use crate::field::Field;
use crate::result::{QueryResult, VecRowStream};
use crate::row::Row;
use crate::value::Value;
use async_trait::async_trait;
use jdbcx_templates::PropertyBag;
use rhai::{Dynamic, Engine, Scope};
use std::process::Command;

/// Bound into script scope as `helper`; methods are registered on the engine
/// as instance methods so scripts call `helper.encode("base64", x)` etc.
#[derive(Clone)]
struct Helper;

impl Helper {
    fn escape_single_quote(&mut self, s: &str) -> String {
        s.replace('\'', "''")
    }

    fn encode(&mut self, target: &str, s: &str) -> String {
        match target {
            "base64" => base64::Engine::encode(&base64::engine::general_purpose::STANDARD, s),
            "url" => url::form_urlencoded::byte_serialize(s.as_bytes()).collect(),
            "json" => serde_json::to_string(s).unwrap_or_default(),
            "xml" => s
                .replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;")
                .replace('"', "&quot;")
                .replace('\'', "&apos;"),
            other => {
                tracing::warn!(target = other, "unknown helper.encode target, passthrough");
                s.to_string()
            }
        }
    }

    fn format(&mut self, template: &str, args: rhai::Array) -> String {
        let mut out = template.to_string();
        for (i, a) in args.iter().enumerate() {
            out = out.replace(&format!("{{{i}}}"), &a.to_string());
        }
        out
    }

    fn read(&mut self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            match reqwest::blocking::get(location).and_then(|r| r.text()) {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(error = %e, "helper.read: request failed");
                    String::new()
                }
            }
        } else {
            std::fs::read_to_string(shellexpand::tilde(location).into_owned()).unwrap_or_default()
        }
    }

    fn shell(&mut self, command: &str) -> String {
        let output = if cfg!(windows) {
            Command::new("cmd").arg("/c").arg(command).output()
        } else {
            Command::new("sh").arg("-c").arg(command).output()
        };
        match output {
            Ok(o) => String::from_utf8_lossy(&o.stdout).into_owned(),
            Err(e) => {
                tracing::warn!(error = %e, "helper.shell: spawn failed");
                String::new()
            }
        }
    }

    fn cli(&mut self, args: &str) -> String {
        self.shell(args)
    }

    fn table(&mut self, fields: rhai::Array, rows: rhai::Array) -> String {
        let header: Vec<String> = fields.into_iter().map(|f| f.to_string()).collect();
        let mut out = header.join("\t");
        out.push('\n');
        for row in rows {
            if let Ok(cols) = row.into_array() {
                let rendered: Vec<String> = cols.into_iter().map(|c| c.to_string()).collect();
                out.push_str(&rendered.join("\t"));
                out.push('\n');
            }
        }
        out
    }
}

pub struct ScriptInterpreter;

#[async_trait]
impl Interpreter for ScriptInterpreter {
    async fn interpret(
        &self,
        content: &str,
        props: &PropertyBag,
        ctx: &InvocationContext<'_>,
    ) -> Result<QueryResult> {
        let language = props.get("language").map(String::as_str).unwrap_or("rhai");
        if language != "rhai" {
            return Err(Error::config(format!("unsupported script language: {language}")));
        }

        let mut engine = Engine::new();
        engine
            .register_type_with_name::<Helper>("Helper")
            .register_fn("escapeSingleQuote", Helper::escape_single_quote)
            .register_fn("encode", Helper::encode)
            .register_fn("format", Helper::format)
            .register_fn("read", Helper::read)
            .register_fn("shell", Helper::shell)
            .register_fn("cli", Helper::cli)
            .register_fn("table", Helper::table);

        let mut scope = Scope::new();
        scope.push("helper", Helper);
        scope.push("tag", ctx.tag.clone());
        for (name, value) in ctx.store.snapshot(props) {
            scope.push(name, value);
        }

        tracing::debug!(extension = "script", language, "evaluating script block");
        let evaluated: Dynamic = engine
            .eval_with_scope(&mut scope, content)
            .map_err(|e| Error::backend(format!("script evaluation failed: {e}")))?;

        dynamic_to_result(evaluated, props)
    }
}

/// A returned Rhai array becomes a row sequence — one value per element —
/// feeding the query builder's cartesian product directly (spec §8, seed
/// scenarios 2/3: `select {{ script: [1,2,3] }} as a`); anything else is
/// stringified and run through the shared post-processing pipeline.
fn dynamic_to_result(value: Dynamic, props: &PropertyBag) -> Result<QueryResult> {
    if value.is_array() {
        let array = value
            .into_array()
            .map_err(|e| Error::backend(format!("script returned malformed array: {e}")))?;
        let rows: Vec<Row> = array
            .into_iter()
            .map(|item| Row::synthetic("string", vec![Value::string(item.to_string())]))
            .collect();
        let fields = rows
            .first()
            .map(|r| r.fields().to_vec())
            .unwrap_or_else(|| vec![Field::synthetic(0, 1, "string")]);
        return Ok(QueryResult::stream(Box::new(VecRowStream::new(fields, rows))));
    }
    post_process(&value.to_string(), props)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn array_result_yields_one_row_per_element() {
        let engine = Engine::new();
        let value: Dynamic = engine.eval("[1, 2, 3]").unwrap();
        let props = PropertyBag::new();
        let result = dynamic_to_result(value, &props).unwrap();
        let mut stream = match result.take_body().unwrap() {
            crate::result::Body::Stream(s) => s,
            _ => panic!("expected stream"),
        };
        let mut seen = Vec::new();
        while let Some(row) = stream.next().await.unwrap() {
            seen.push(row.value(0).as_string(crate::value::Charset::Utf8));
        }
        assert_eq!(seen, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn scalar_result_falls_through_to_post_process() {
        let engine = Engine::new();
        let value: Dynamic = engine.eval("\"hi\"").unwrap();
        let props = PropertyBag::new();
        let result = dynamic_to_result(value, &props).unwrap();
        match result.take_body().unwrap() {
            crate::result::Body::Scalar(s) => assert_eq!(s, "hi"),
            _ => panic!("expected scalar"),
        }
    }
}
