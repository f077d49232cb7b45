use std::io::Read as _;

use clap::Parser;
use eyre::Result;
use jdbcx_core::{Connection, ConnectionManager, PropertyBag, QueryContext};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{app::Args, executor::Executor};

mod app;
mod executor;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args = Args::parse();
    let text = read_query(&args)?;

    let mut bag = PropertyBag::new();
    if let Some(url) = &args.url {
        bag.insert("url".to_string(), url.clone());
    }

    let context = QueryContext::new().with_bag(bag).with_tag(args.tag.into());
    for (name, value) in args.parsed_vars() {
        context.store.set(jdbcx_core::Scope::Query, &name, &value);
    }

    let manager = ConnectionManager::bootstrap();
    let connection = Connection::with_context(manager, context);

    match Executor::new(&connection).execute(&text).await {
        Ok(()) => Ok(()),
        Err(e) => Err(eyre::eyre!(e)),
    }
}

fn read_query(args: &Args) -> std::io::Result<String> {
    match &args.query {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
