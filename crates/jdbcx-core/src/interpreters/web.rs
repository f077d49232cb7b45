//! `web` interpreter (spec §4.4, §8). Grounded on the teacher's HTTP client
//! usage in `client/mod.rs`: GET when `content` is blank (content supplies a
//! query or path instead), POST with `content` — or a rendered
//! `request.template` — as the body otherwise. `url.template`/
//! `request.template` are *not* substituted upstream: only a block's
//! `content` goes through the parser's `${...}` pass
//! ([`InvocationContext::render_content`]), so this interpreter renders its
//! own `${_}` = content substitution into both templates, then merges
//! headers from `request.headers`, bearer/basic auth options, and the
//! context's side-channel header map (spec.md:53).

use super::{post_process, Interpreter, InvocationContext};
use crate::error::{Error, Result};
use crate::field::Field;
use crate::result::QueryResult;
use crate::row::Row;
use crate::value::Value;
use async_trait::async_trait;
use jdbcx_templates::PropertyBag;
use reqwest::Client;

pub struct WebInterpreter;

/// The concrete request a `web` block resolves to, computed once and shared
/// between the real dispatch path and the `exec.dryrun` description (spec
/// §8, seed scenario 6) so the two can never disagree.
struct RequestPlan {
    url: String,
    method: &'static str,
    body: Option<String>,
    headers: Vec<(String, String)>,
}

impl RequestPlan {
    fn build(content: &str, props: &PropertyBag, ctx: &InvocationContext<'_>) -> Result<Self> {
        let url_template = props
            .get("url.template")
            .or_else(|| props.get("url"))
            .ok_or_else(|| Error::config("web block requires a `url` property"))?;
        let url = render_template(url_template, content, None);

        let method = if content.trim().is_empty() { "GET" } else { "POST" };

        let body = if method == "GET" {
            None
        } else if let Some(request_template) = props.get("request.template") {
            Some(render_template(
                request_template,
                content,
                props.get("request.encode").map(String::as_str),
            ))
        } else {
            Some(content.to_string())
        };

        let mut headers = Vec::new();
        if let Some(raw) = props.get("request.headers") {
            for pair in raw.split(',') {
                if let Some((name, value)) = pair.split_once('=') {
                    headers.push((name.trim().to_string(), value.trim().to_string()));
                }
            }
        }
        for (name, value) in ctx.headers.iter() {
            headers.push((name.clone(), value.clone()));
        }

        Ok(Self { url, method, body, headers })
    }
}

/// Replaces the literal `${_}` placeholder with `content`, optionally
/// pre-encoded per `encode` (spec.md:136: "optionally pre-encoded per
/// `request.encode`").
fn render_template(template: &str, content: &str, encode: Option<&str>) -> String {
    let substituted = match encode {
        Some("base64") => base64::Engine::encode(&base64::engine::general_purpose::STANDARD, content),
        Some("url") => url::form_urlencoded::byte_serialize(content.as_bytes()).collect(),
        Some("json") => serde_json::to_string(content).unwrap_or_default(),
        _ => content.to_string(),
    };
    template.replace("${_}", &substituted)
}

#[async_trait]
impl Interpreter for WebInterpreter {
    async fn interpret(
        &self,
        content: &str,
        props: &PropertyBag,
        ctx: &InvocationContext<'_>,
    ) -> Result<QueryResult> {
        let plan = RequestPlan::build(content, props, ctx)?;

        let client = Client::new();
        let mut builder = match plan.method {
            "GET" => client.get(&plan.url),
            _ => client.post(&plan.url),
        };
        if let Some(body) = &plan.body {
            builder = builder.body(body.clone());
        }
        for (name, value) in &plan.headers {
            builder = builder.header(name, value);
        }

        if let Some(token) = props.get("auth.bearer") {
            builder = builder.bearer_auth(token);
        } else if let (Some(user), Some(pass)) = (props.get("auth.user"), props.get("auth.password")) {
            builder = builder.basic_auth(user, Some(pass));
        }

        if let Some(ms) = props.get("exec.timeout").and_then(|v| v.parse::<u64>().ok()) {
            builder = builder.timeout(std::time::Duration::from_millis(ms));
        }

        tracing::debug!(extension = "web", url = %plan.url, method = plan.method, "dispatching HTTP request");
        let response = builder
            .send()
            .await
            .map_err(|e| Error::backend(format!("web request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::backend(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            let throws = props.get("exec.error").map(String::as_str) == Some("throw");
            if throws {
                return Err(Error::backend(format!("web request returned {status}: {body}")));
            }
            tracing::warn!(%status, "web request returned a non-success status");
        }

        post_process(&body, props)
    }

    fn dry_run(&self, content: &str, props: &PropertyBag, ctx: &InvocationContext<'_>) -> Option<QueryResult> {
        let plan = RequestPlan::build(content, props, ctx).ok()?;
        let fields = vec![
            Field::builder().name("url".to_string()).type_code(0).type_name("string".to_string()).nullable(false).build(),
            Field::builder().name("method".to_string()).type_code(0).type_name("string".to_string()).nullable(false).build(),
            Field::builder().name("request".to_string()).type_code(0).type_name("string".to_string()).nullable(true).build(),
            Field::builder().name("headers".to_string()).type_code(0).type_name("string".to_string()).nullable(true).build(),
        ];
        let headers = plan
            .headers
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        let values = vec![
            Value::string(plan.url),
            Value::string(plan.method),
            Value::string(plan.body.unwrap_or_default()),
            Value::string(headers),
        ];
        Some(QueryResult::row(Row::new(fields, values)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::connection::ConnectionManager;
    use jdbcx_templates::{TagStyle, VariableStore};
    use std::collections::BTreeMap;

    fn invocation<'a>(
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

    #[test]
    fn dry_run_renders_templates_and_reports_method() {
        let store = VariableStore::new();
        let bag = PropertyBag::new();
        let manager = ConnectionManager::new();
        let mut headers = BTreeMap::new();
        headers.insert("X-Trace".to_string(), "abc".to_string());

        let mut props = PropertyBag::new();
        props.insert("url.template".to_string(), "http://h/q".to_string());
        props.insert("request.template".to_string(), "{\"q\":\"${_}\"}".to_string());

        let interpreter = WebInterpreter;
        let result = interpreter
            .dry_run("mycontent", &props, &invocation(&store, &bag, &manager, &headers))
            .unwrap();
        let row = match result.take_body().unwrap() {
            crate::result::Body::Row(row) => row,
            _ => panic!("expected row"),
        };
        assert_eq!(row.value(0).as_string(crate::value::Charset::Utf8), "http://h/q");
        assert_eq!(row.value(1).as_string(crate::value::Charset::Utf8), "POST");
        assert_eq!(row.value(2).as_string(crate::value::Charset::Utf8), "{\"q\":\"mycontent\"}");
        assert_eq!(row.value(3).as_string(crate::value::Charset::Utf8), "X-Trace=abc");
    }

    #[test]
    fn blank_content_resolves_to_get_with_no_body() {
        let store = VariableStore::new();
        let bag = PropertyBag::new();
        let manager = ConnectionManager::new();
        let headers = BTreeMap::new();

        let mut props = PropertyBag::new();
        props.insert("url".to_string(), "http://h/q".to_string());

        let plan = RequestPlan::build("", &props, &invocation(&store, &bag, &manager, &headers)).unwrap();
        assert_eq!(plan.method, "GET");
        assert!(plan.body.is_none());
    }
}
