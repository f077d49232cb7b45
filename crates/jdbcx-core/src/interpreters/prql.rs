//! `prql` interpreter (spec §4.4). Grounded on the teacher's `shell.rs`
//! process-spawn shape: compiles `content` via the external `prqlc` compiler
//! (no in-process PRQL crate in the dependency ledger) and feeds the
//! resulting SQL to the `sql` interpreter's connection-dispatch path.

use super::{Interpreter, InvocationContext};
use crate::error::{Error, Result};
use crate::result::QueryResult;
use async_trait::async_trait;
use jdbcx_templates::PropertyBag;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub struct PrqlInterpreter;

#[async_trait]
impl Interpreter for PrqlInterpreter {
    async fn interpret(
        &self,
        content: &str,
        props: &PropertyBag,
        ctx: &InvocationContext<'_>,
    ) -> Result<QueryResult> {
        let mut command = Command::new("prqlc");
        command.arg("compile").kill_on_drop(true);
        if let Some(target) = props.get("compile.target") {
            command.arg("-t").arg(format!("sql.{target}"));
        }
        command.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());

        tracing::debug!(extension = "prql", "spawning prqlc");
        let mut child = command
            .spawn()
            .map_err(|e| Error::backend(format!("failed to spawn prqlc: {e}")))?;

        child
            .stdin
            .take()
            .expect("piped stdin")
            .write_all(content.as_bytes())
            .await
            .map_err(|e| Error::backend(format!("failed to write to prqlc stdin: {e}")))?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::backend(format!("prqlc execution failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::backend(format!("prqlc compile failed: {stderr}")));
        }

        let sql = String::from_utf8_lossy(&output.stdout).into_owned();
        let conn = ctx.manager.connection_for(props, Some(ctx.bag)).await?;
        conn.execute(&sql).await
    }
}
