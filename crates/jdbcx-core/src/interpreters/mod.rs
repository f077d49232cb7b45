//! Interpreter contract (spec §4.4) and the nine built-in interpreters.
//! Grounded module-for-module on the teacher's `blocks/*.rs` — see
//! `DESIGN.md` for the full per-module ledger.

pub mod codeql;
pub mod mcp;
#[cfg(test)]
pub mod mock;
pub mod prql;
pub mod script;
pub mod shell;
pub mod sql;
pub mod var;
pub mod web;

use crate::cancel::CancellationToken;
use crate::connection::ConnectionManager;
use crate::error::{Error, ErrorKind, Result, Warning};
use crate::field::Field;
use crate::result::QueryResult;
use crate::row::Row;
use crate::value::Value;
use async_trait::async_trait;
use jdbcx_templates::{BlockInfo, PropertyBag, TagStyle, VariableStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    Ignore,
    Warn,
    Return,
    Throw,
}

impl ErrorPolicy {
    pub fn parse(s: &str) -> Self {
        match s {
            "ignore" => ErrorPolicy::Ignore,
            "warn" => ErrorPolicy::Warn,
            "return" => ErrorPolicy::Return,
            _ => ErrorPolicy::Throw,
        }
    }
}

/// Everything an interpreter invocation needs beyond its own content/props:
/// the statement's variable store, ambient property bag, active tag style,
/// and cancellation token.
pub struct InvocationContext<'a> {
    pub store: &'a VariableStore,
    pub bag: &'a PropertyBag,
    pub tag: TagStyle,
    pub cancel: CancellationToken,
    pub manager: &'a ConnectionManager,
    /// Context-supplied side-channel keys (spec.md:53), e.g. injected HTTP
    /// headers the `web` interpreter merges into every request it makes.
    pub headers: &'a BTreeMap<String, String>,
}

impl<'a> InvocationContext<'a> {
    /// Renders `content` against the statement's variable store for
    /// interpreters that opt into pre-interpretation substitution (spec
    /// §4.3: "performed on each block's content before interpretation for
    /// extensions that opt into it").
    pub fn render_content(&self, content: &str, extension_name: &str, properties: &PropertyBag) -> String {
        let block = BlockInfo {
            extension_name,
            properties,
        };
        jdbcx_templates::render(content, self.store, self.bag, self.tag, Some(&block))
            .unwrap_or_else(|_| content.to_string())
    }
}

#[async_trait]
pub trait Interpreter: Send + Sync {
    async fn interpret(
        &self,
        content: &str,
        props: &PropertyBag,
        ctx: &InvocationContext<'_>,
    ) -> Result<QueryResult>;

    /// Whether this extension wants its content pre-substituted before
    /// `interpret` sees it (spec §4.3). Defaults to true; the `sql`/`jdbc`
    /// interpreter and others that forward raw text to a downstream parser
    /// with its own notion of `${...}` (e.g. PRQL) may opt out.
    fn substitutes_content(&self) -> bool {
        true
    }

    /// Interpreter-specific `exec.dryrun=true` description (spec §8, seed
    /// scenario 6). `None` falls back to the generic content+properties
    /// table every other extension is happy with.
    fn dry_run(&self, _content: &str, _props: &PropertyBag, _ctx: &InvocationContext<'_>) -> Option<QueryResult> {
        None
    }
}

fn parse_timeout(props: &PropertyBag) -> Option<Duration> {
    let raw = props.get("exec.timeout").map(String::as_str).unwrap_or("0");
    let millis: i64 = raw.trim().parse().unwrap_or(0);
    if millis <= 0 {
        None
    } else {
        Some(Duration::from_millis(millis as u64))
    }
}

fn parse_dryrun(props: &PropertyBag) -> bool {
    props
        .get("exec.dryrun")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn parse_error_policy(props: &PropertyBag) -> ErrorPolicy {
    ErrorPolicy::parse(props.get("exec.error").map(String::as_str).unwrap_or("throw"))
}

/// Wraps any interpreter invocation with the shared `exec.timeout` /
/// `exec.dryrun` / `exec.error` policy (spec §4.4, §4.8). Grounded on
/// `QueryBlockBehavior::do_execute`'s `tokio::select!` timeout/cancel
/// pattern.
pub async fn invoke_with_policy(
    interpreter: &(dyn Interpreter),
    extension_name: &str,
    content: &str,
    props: &PropertyBag,
    ctx: &InvocationContext<'_>,
) -> (Result<QueryResult>, Option<Warning>) {
    if parse_dryrun(props) {
        let result = interpreter
            .dry_run(content, props, ctx)
            .unwrap_or_else(|| dry_run_description(content, props));
        return (Ok(result), None);
    }

    let rendered;
    let content = if interpreter.substitutes_content() {
        rendered = ctx.render_content(content, extension_name, props);
        rendered.as_str()
    } else {
        content
    };

    let timeout = parse_timeout(props);
    let outcome = run_with_cancel_and_timeout(interpreter, content, props, ctx, timeout).await;

    match outcome {
        Ok(result) => (Ok(result), None),
        Err(err) => apply_error_policy(err, content, props),
    }
}

async fn run_with_cancel_and_timeout(
    interpreter: &(dyn Interpreter),
    content: &str,
    props: &PropertyBag,
    ctx: &InvocationContext<'_>,
    timeout: Option<Duration>,
) -> Result<QueryResult> {
    let work = interpreter.interpret(content, props, ctx);
    match timeout {
        Some(d) => {
            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => Err(Error::Cancelled),
                _ = tokio::time::sleep(d) => Err(Error::Timeout(d)),
                res = work => res,
            }
        }
        None => {
            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => Err(Error::Cancelled),
                res = work => res,
            }
        }
    }
}

fn apply_error_policy(
    err: Error,
    content: &str,
    props: &PropertyBag,
) -> (Result<QueryResult>, Option<Warning>) {
    if matches!(err, Error::Cancelled) {
        return (Err(err), None);
    }
    let policy = parse_error_policy(props);
    let message = format!("{err} while evaluating: {content}");
    match policy {
        ErrorPolicy::Throw => (Err(err), None),
        ErrorPolicy::Warn => (Ok(QueryResult::empty()), Some(Warning::new(err.kind(), message))),
        ErrorPolicy::Return => (Ok(QueryResult::scalar(message)), None),
        ErrorPolicy::Ignore => (Ok(QueryResult::empty()), None),
    }
}

fn dry_run_description(content: &str, props: &PropertyBag) -> QueryResult {
    let mut fields = vec![Field::builder()
        .name("content".to_string())
        .type_code(0)
        .type_name("string".to_string())
        .nullable(false)
        .build()];
    let mut values = vec![Value::string(content)];
    for (k, v) in props.iter() {
        fields.push(
            Field::builder()
                .name(k.clone())
                .type_code(0)
                .type_name("string".to_string())
                .nullable(false)
                .build(),
        );
        values.push(Value::string(v.clone()));
    }
    QueryResult::row(Row::new(fields, values))
}

/// Post-processing pipeline applied to any byte/char stream result (spec
/// §4.4): JSONPath extraction, else string split, else trim, else
/// pass-through.
pub fn post_process(raw: &str, props: &PropertyBag) -> Result<QueryResult> {
    if let Some(path) = props.get("result.json.path") {
        return post_process_json_path(raw, path, props);
    }
    if props
        .get("result.string.split")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
    {
        let sep = props.get("result.string.split.char").map(String::as_str).unwrap_or("\n");
        let keep_blank = props
            .get("result.string.line.blank")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);
        let parts: Vec<&str> = raw.split(sep).filter(|p| keep_blank || !p.is_empty()).collect();
        let rows: Vec<Row> = parts
            .into_iter()
            .map(|p| Row::synthetic("string", vec![Value::string(p)]))
            .collect();
        let fields = rows.first().map(|r| r.fields().to_vec()).unwrap_or_else(|| {
            vec![Field::synthetic(0, 1, "string")]
        });
        return Ok(QueryResult::stream(Box::new(crate::result::VecRowStream::new(fields, rows))));
    }
    if props
        .get("result.string.trim")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
    {
        return Ok(QueryResult::scalar(raw.trim().to_string()));
    }
    Ok(QueryResult::scalar(raw.to_string()))
}

fn post_process_json_path(raw: &str, path: &str, props: &PropertyBag) -> Result<QueryResult> {
    let json: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| Error::backend(format!("invalid JSON for result.json.path: {e}")))?;
    let selected = jsonpath_lib::select(&json, path).map_err(|e| Error::backend(e.to_string()))?;

    // Open Question #1: a selected JSON object renders as one row of the
    // serialized object by default; `result.json.path.mode=entries` renders
    // one row per top-level key instead.
    let entries_mode = props
        .get("result.json.path.mode")
        .map(|m| m == "entries")
        .unwrap_or(false);

    let mut rows = Vec::new();
    for value in selected {
        match value {
            serde_json::Value::Object(map) if entries_mode => {
                for (k, v) in map {
                    rows.push(Row::synthetic("json", vec![Value::string(k), Value::Object(v)]));
                }
            }
            other => rows.push(Row::synthetic("json", vec![Value::Object(other.clone())])),
        }
    }
    let fields = rows.first().map(|r| r.fields().to_vec()).unwrap_or_else(|| {
        vec![Field::synthetic(0, 1, "json")]
    });
    Ok(QueryResult::stream(Box::new(crate::result::VecRowStream::new(fields, rows))))
}

/// Registers the nine built-in interpreters the connection manager must
/// always know about (spec §4.6).
pub fn register_builtins(manager: &Arc<ConnectionManager>) {
    manager.register_interpreter("sql", Arc::new(sql::SqlInterpreter));
    manager.register_interpreter("jdbc", Arc::new(sql::SqlInterpreter));
    manager.register_interpreter("shell", Arc::new(shell::ShellInterpreter));
    manager.register_interpreter("script", Arc::new(script::ScriptInterpreter));
    manager.register_interpreter("web", Arc::new(web::WebInterpreter));
    manager.register_interpreter("prql", Arc::new(prql::PrqlInterpreter));
    manager.register_interpreter("codeql", Arc::new(codeql::CodeqlInterpreter));
    manager.register_interpreter("var", Arc::new(var::VarInterpreter));
    manager.register_interpreter("mcp", Arc::new(mcp::McpInterpreter));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(
        store: &'a VariableStore,
        bag: &'a PropertyBag,
        manager: &'a ConnectionManager,
        headers: &'a BTreeMap<String, String>,
    ) -> InvocationContext<'a> {
        InvocationContext {
            store,
            bag,
            tag: TagStyle::Brace,
            cancel: CancellationToken::new(),
            manager,
            headers,
        }
    }

    struct Always<T>(T);

    #[async_trait]
    impl Interpreter for Always<&'static str> {
        async fn interpret(&self, _: &str, _: &PropertyBag, _: &InvocationContext<'_>) -> Result<QueryResult> {
            Ok(QueryResult::scalar(self.0))
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl Interpreter for AlwaysFails {
        async fn interpret(&self, _: &str, _: &PropertyBag, _: &InvocationContext<'_>) -> Result<QueryResult> {
            Err(Error::backend("boom"))
        }
    }

    #[tokio::test]
    async fn dryrun_short_circuits_before_interpretation() {
        let store = VariableStore::new();
        let bag = PropertyBag::new();
        let manager = ConnectionManager::new();
        let headers = BTreeMap::new();
        let mut props = PropertyBag::new();
        props.insert("exec.dryrun".into(), "true".into());
        let (result, warning) =
            invoke_with_policy(&Always("x"), "web", "content", &props, &ctx(&store, &bag, &manager, &headers)).await;
        assert!(result.is_ok());
        assert!(warning.is_none());
    }

    #[tokio::test]
    async fn error_policy_warn_returns_empty_with_warning() {
        let store = VariableStore::new();
        let bag = PropertyBag::new();
        let manager = ConnectionManager::new();
        let headers = BTreeMap::new();
        let mut props = PropertyBag::new();
        props.insert("exec.error".into(), "warn".into());
        let (result, warning) =
            invoke_with_policy(&AlwaysFails, "sql", "content", &props, &ctx(&store, &bag, &manager, &headers)).await;
        assert!(result.is_ok());
        assert!(warning.is_some());
    }

    #[tokio::test]
    async fn error_policy_throw_is_default() {
        let store = VariableStore::new();
        let bag = PropertyBag::new();
        let manager = ConnectionManager::new();
        let headers = BTreeMap::new();
        let props = PropertyBag::new();
        let (result, _) =
            invoke_with_policy(&AlwaysFails, "sql", "content", &props, &ctx(&store, &bag, &manager, &headers)).await;
        assert!(result.is_err());
    }

    #[test]
    fn post_process_trims_when_requested() {
        let mut props = PropertyBag::new();
        props.insert("result.string.trim".into(), "true".into());
        let result = post_process("  hi  ", &props).unwrap();
        let body = result.take_body().unwrap();
        match body {
            crate::result::Body::Scalar(s) => assert_eq!(s, "hi"),
            _ => panic!("expected scalar"),
        }
    }
}
