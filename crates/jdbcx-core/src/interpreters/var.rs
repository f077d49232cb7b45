//! `var` interpreter (spec §4.4, §5). Grounded on `crate::options`'s
//! descriptor-registry pattern and [`jdbcx_templates::VariableStore`]'s
//! scope API: parses comma-separated `k=v` pairs out of `content` and writes
//! each into the store at the scope the block targets, optionally under a
//! shared prefix.

use super::{Interpreter, InvocationContext};
use crate::error::Result;
use crate::result::QueryResult;
use async_trait::async_trait;
use jdbcx_templates::{PropertyBag, Scope};

pub struct VarInterpreter;

#[async_trait]
impl Interpreter for VarInterpreter {
    async fn interpret(
        &self,
        content: &str,
        props: &PropertyBag,
        ctx: &InvocationContext<'_>,
    ) -> Result<QueryResult> {
        let scope = match props.get("scope").map(String::as_str) {
            Some("thread") => Scope::Thread,
            Some("global") => Scope::Global,
            _ => Scope::Query,
        };
        let prefix = props.get("prefix").cloned().unwrap_or_default();

        let mut names = Vec::new();
        for pair in content.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let Some((key, value)) = pair.split_once('=') else {
                tracing::warn!(pair, "var block: skipping entry with no `=`");
                continue;
            };
            let name = format!("{prefix}{}", key.trim());
            ctx.store.set(scope, &name, value.trim());
            names.push(name);
        }

        tracing::debug!(extension = "var", count = names.len(), "bound variables");
        Ok(QueryResult::scalar(names.join(",")))
    }
}
