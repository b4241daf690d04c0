mod commands;
mod config;
mod error;
mod prompt;

use std::sync::Arc;

use store::{FileStorage, Stores};

use crate::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let (config, command) = config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "dinerito={level},store={level}",
            level = config.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let storage = Arc::new(FileStorage::open(&config.state_path)?);
    tracing::debug!(path = %storage.path().display(), "loaded local state");
    let stores = Stores::new(&config.base_url, storage)?;

    commands::run(&stores, command).await
}
