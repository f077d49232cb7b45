//! `sql`/`jdbc` interpreter (spec §4.4). Grounded on `blocks/sql_block.rs`:
//! resolves a downstream connection — by `id`, by `url`, or by inheriting
//! the façade's ambient connection when the block gives neither — executes
//! `content` verbatim, and lets
//! [`crate::connection::DownstreamConnection::execute`] tell query-shaped
//! statements from update-shaped ones via `sqlparser`.

use super::{Interpreter, InvocationContext};
use crate::error::Result;
use crate::result::QueryResult;
use async_trait::async_trait;
use jdbcx_templates::PropertyBag;

pub struct SqlInterpreter;

#[async_trait]
impl Interpreter for SqlInterpreter {
    async fn interpret(
        &self,
        content: &str,
        props: &PropertyBag,
        ctx: &InvocationContext<'_>,
    ) -> Result<QueryResult> {
        let conn = ctx.manager.connection_for(props, Some(ctx.bag)).await?;
        tracing::debug!(extension = "sql", "dispatching to downstream connection");
        conn.execute(content).await
    }

    fn substitutes_content(&self) -> bool {
        // Downstream SQL dialects have their own placeholder syntax; content
        // is sent verbatim and only block properties get substituted.
        false
    }
}
