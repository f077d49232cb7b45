use jdbcx_core::{Connection, Field, Row};

pub type Result<T> = std::result::Result<T, ExecutorError>;

#[derive(thiserror::Error, Debug)]
pub enum ExecutorError {
    #[error(transparent)]
    Core(#[from] jdbcx_core::Error),

    #[error("failed to read query: {0}")]
    Io(#[from] std::io::Error),
}

/// Drives one statement to completion against a façade [`Connection`] and
/// renders the combined result set as a tab-separated table on stdout —
/// the CLI's equivalent of `atuin-run::executor::Executor::execute`, minus
/// the interactive viewport this gateway has no terminal block type to
/// drive.
pub struct Executor<'c> {
    connection: &'c Connection,
}

impl<'c> Executor<'c> {
    pub fn new(connection: &'c Connection) -> Self {
        Self { connection }
    }

    pub async fn execute(&self, text: &str) -> Result<()> {
        let mut result = self.connection.execute(text).await?;
        let mut printed_header = false;
        let mut rows = 0usize;

        loop {
            match result.next().await? {
                Some(row) => {
                    if !printed_header {
                        print_header(row.fields());
                        printed_header = true;
                    }
                    println!("{}", render_row(&row));
                    rows += 1;
                }
                None => break,
            }
        }
        result.close().await;

        if let Some(err) = result.take_first_error() {
            return Err(err.into());
        }
        if !printed_header && !result.fields().is_empty() {
            print_header(result.fields());
        }
        tracing::info!(rows, "query finished");
        Ok(())
    }
}

fn print_header(fields: &[Field]) {
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    println!("{}", names.join("\t"));
}

fn render_row(row: &Row) -> String {
    row.values()
        .iter()
        .map(|v| v.as_string(jdbcx_core::Charset::Utf8))
        .collect::<Vec<_>>()
        .join("\t")
}
