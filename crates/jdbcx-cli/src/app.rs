use clap::{Parser, ValueEnum};
use jdbcx_core::TagStyle;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "jdbcx", about = "Polyglot query gateway CLI")]
pub struct Args {
    /// Query file to execute; reads from stdin if omitted
    pub query: Option<PathBuf>,

    /// Downstream connection URL (sqlx-style), e.g. `sqlite::memory:`
    #[arg(short, long)]
    pub url: Option<String>,

    /// Query-scope variable as NAME=VALUE (repeatable)
    #[arg(short = 'D', long = "var", value_name = "NAME=VALUE")]
    pub vars: Vec<String>,

    /// Tag delimiter style for `${...}` / block markers
    #[arg(long, value_enum, default_value = "brace")]
    pub tag: TagArg,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum TagArg {
    Brace,
    Angle,
    Square,
}

impl From<TagArg> for TagStyle {
    fn from(value: TagArg) -> Self {
        match value {
            TagArg::Brace => TagStyle::Brace,
            TagArg::Angle => TagStyle::Angle,
            TagArg::Square => TagStyle::Square,
        }
    }
}

impl Args {
    /// Splits each `--var NAME=VALUE` into a pair, skipping (with a warning)
    /// any entry missing the `=`.
    pub fn parsed_vars(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .filter_map(|entry| match entry.split_once('=') {
                Some((k, v)) => Some((k.to_string(), v.to_string())),
                None => {
                    tracing::warn!(entry, "ignoring --var with no `=`");
                    None
                }
            })
            .collect()
    }
}
