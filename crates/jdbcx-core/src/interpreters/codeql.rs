//! `codeql` interpreter (spec §4.4, §8). Grounded on the teacher's
//! `blocks/terminal.rs` spawn shape plus its temp-file-hygiene invariant:
//! `content` is written to a scratch `<uuid>.ql` file beside the target
//! qlpack, run through `codeql query run`, and optionally decoded from BQRS.
//! The scratch file and its BQRS sibling are removed on every exit path.

use super::{Interpreter, InvocationContext};
use crate::error::{Error, Result};
use crate::result::QueryResult;
use async_trait::async_trait;
use jdbcx_templates::PropertyBag;
use tokio::process::Command;
use uuid::Uuid;

pub struct CodeqlInterpreter;

#[async_trait]
impl Interpreter for CodeqlInterpreter {
    async fn interpret(
        &self,
        content: &str,
        props: &PropertyBag,
        _ctx: &InvocationContext<'_>,
    ) -> Result<QueryResult> {
        let database = props
            .get("database")
            .ok_or_else(|| Error::config("codeql block requires a `database` property"))?;
        let work_dir = props
            .get("work.dir")
            .map(|d| shellexpand::tilde(d).into_owned())
            .unwrap_or_else(|| ".".to_string());

        let name = format!("{}.ql", Uuid::new_v4());
        let ql_path = std::path::Path::new(&work_dir).join(&name);
        let bqrs_path = ql_path.with_extension("bqrs");

        let outcome = run(content, props, database, &work_dir, &ql_path, &bqrs_path).await;

        let _ = tokio::fs::remove_file(&ql_path).await;
        let _ = tokio::fs::remove_file(&bqrs_path).await;

        outcome
    }
}

async fn run(
    content: &str,
    props: &PropertyBag,
    database: &str,
    work_dir: &str,
    ql_path: &std::path::Path,
    bqrs_path: &std::path::Path,
) -> Result<QueryResult> {
    tokio::fs::write(ql_path, content)
        .await
        .map_err(|e| Error::backend(format!("failed to write scratch query: {e}")))?;

    let timeout = props.get("exec.timeout").map(String::as_str).unwrap_or("0");
    tracing::debug!(extension = "codeql", database, "running codeql query");
    let run_output = Command::new("codeql")
        .current_dir(work_dir)
        .kill_on_drop(true)
        .arg("query")
        .arg("run")
        .arg("--database")
        .arg(database)
        .arg("--timeout")
        .arg(timeout)
        .arg("-o")
        .arg(bqrs_path)
        .arg(ql_path)
        .output()
        .await
        .map_err(|e| Error::backend(format!("failed to spawn codeql: {e}")))?;

    if !run_output.status.success() {
        let stderr = String::from_utf8_lossy(&run_output.stderr);
        return Err(Error::backend(format!("codeql query run failed: {stderr}")));
    }

    let format = props.get("bqrs.format").map(String::as_str).unwrap_or("csv");
    let decode_output = Command::new("codeql")
        .kill_on_drop(true)
        .arg("bqrs")
        .arg("decode")
        .arg("--format")
        .arg(format)
        .arg(bqrs_path)
        .output()
        .await
        .map_err(|e| Error::backend(format!("failed to spawn codeql bqrs decode: {e}")))?;

    if !decode_output.status.success() {
        let stderr = String::from_utf8_lossy(&decode_output.stderr);
        return Err(Error::backend(format!("codeql bqrs decode failed: {stderr}")));
    }

    let decoded = String::from_utf8_lossy(&decode_output.stdout).into_owned();
    super::post_process(&decoded, props)
}
