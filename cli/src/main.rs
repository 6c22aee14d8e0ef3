use anyhow::Context;
use clap::Parser;
use cli::config::STORE_FILE;
use cli::{fetch_suggestions, lookup_items, render_items, Config, DictTranslator};
use std::path::PathBuf;
use tracing::{debug, info};
use wordcache::Datastore;

async fn run(store: &Datastore, config: &Config) -> anyhow::Result<String> {
    let client = reqwest::Client::new();
    let word = config.word();
    let suggestions = fetch_suggestions(&client, &word)
        .await
        .context("fetching suggestions")?;
    debug!("{} suggestions for {word:?}", suggestions.len());

    let translator = DictTranslator::new(client);
    let items = lookup_items(store, &translator, &suggestions, config.preview_options()).await;
    Ok(render_items(&items))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the XML, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let dir = config
        .store_dir(home.as_deref())
        .context("HOME is not set; pass --cache-dir")?;
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;

    let store = Datastore::open(dir.join(STORE_FILE)).await?;
    info!("cache at {}", store.path().display());

    // Close even when the lookup fails, so fetched previews are kept
    let result = run(&store, &config).await;
    let closed = store.close().await;
    let xml = result?;
    closed?;

    print!("{xml}");
    Ok(())
}
