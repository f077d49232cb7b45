//! `mcp` interpreter (spec §4.4). Grounded on `web.rs`'s request shape: an
//! MCP tool call is a JSON-RPC request POSTed to the server's endpoint, so
//! this wraps `content` (the tool call parameters) into a JSON-RPC envelope
//! and reuses the same response handling.

use super::{post_process, Interpreter, InvocationContext};
use crate::error::{Error, Result};
use crate::result::QueryResult;
use async_trait::async_trait;
use jdbcx_templates::PropertyBag;
use reqwest::Client;
use serde_json::{json, Value as Json};

pub struct McpInterpreter;

#[async_trait]
impl Interpreter for McpInterpreter {
    async fn interpret(
        &self,
        content: &str,
        props: &PropertyBag,
        _ctx: &InvocationContext<'_>,
    ) -> Result<QueryResult> {
        let endpoint = props
            .get("endpoint")
            .ok_or_else(|| Error::config("mcp block requires an `endpoint` property"))?;
        let tool = props
            .get("tool")
            .ok_or_else(|| Error::config("mcp block requires a `tool` property"))?;

        let params: Json = if content.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(content)
                .map_err(|e| Error::config(format!("mcp block content must be JSON params: {e}")))?
        };

        let envelope = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": tool, "arguments": params },
        });

        tracing::debug!(extension = "mcp", endpoint, tool, "dispatching MCP tool call");
        let response = Client::new()
            .post(endpoint)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| Error::backend(format!("mcp request failed: {e}")))?;

        let status = response.status();
        let body: Json = response
            .json()
            .await
            .map_err(|e| Error::backend(format!("mcp response was not JSON: {e}")))?;

        if !status.is_success() {
            return Err(Error::backend(format!("mcp server returned {status}: {body}")));
        }
        if let Some(error) = body.get("error") {
            return Err(Error::backend(format!("mcp tool call failed: {error}")));
        }

        let result = body.get("result").cloned().unwrap_or(Json::Null);
        post_process(&result.to_string(), props)
    }
}
