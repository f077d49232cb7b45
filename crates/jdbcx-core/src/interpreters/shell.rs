//! `shell` interpreter (spec §4.4, §6). Grounded on the teacher's
//! `blocks/terminal.rs` process-spawn shape, trimmed to non-interactive
//! capture (no PTY viewport) since this gateway has no terminal block type.

use super::{post_process, Interpreter, InvocationContext};
use crate::error::{Error, Result};
use crate::result::QueryResult;
use async_trait::async_trait;
use jdbcx_templates::PropertyBag;
use tokio::process::Command;

pub struct ShellInterpreter;

#[async_trait]
impl Interpreter for ShellInterpreter {
    async fn interpret(
        &self,
        content: &str,
        props: &PropertyBag,
        _ctx: &InvocationContext<'_>,
    ) -> Result<QueryResult> {
        let mut command = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/c").arg(content);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(content);
            c
        };
        command.kill_on_drop(true);

        if let Some(dir) = props.get("work.dir") {
            command.current_dir(shellexpand::tilde(dir).into_owned());
        }

        tracing::debug!(extension = "shell", "spawning process");
        let output = command
            .output()
            .await
            .map_err(|e| Error::backend(format!("failed to spawn shell: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let throws = props.get("exec.error").map(String::as_str) == Some("throw");
            if throws {
                return Err(Error::backend(format!(
                    "shell exited with {}: {stderr}",
                    output.status
                )));
            }
            tracing::warn!(stderr = %stderr, "shell command exited non-zero");
        }

        post_process(&stdout, props)
    }
}
