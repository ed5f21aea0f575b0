//! Tagstore demo
//!
//! Seeds an in-memory store, opens a live cache over it and logs the cache
//! as store-side updates flow in.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tagstore::cache::{CacheChange, EventCache};
use tagstore::config::Config;
use tagstore::storage::{BackingStore, MemoryStore, Sample, StorageResult};
use tagstore::tagset::Tagset;

#[derive(Parser, Debug)]
#[command(name = "tagstore", version, about = "Tag-indexed event store demo")]
struct Args {
    /// Config file (default search path when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cache filter, overrides the config
    #[arg(short, long)]
    filter: Option<String>,

    /// Newest samples kept per timeseries, overrides the config
    #[arg(short, long)]
    max_samples: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(filter) = args.filter {
        config.cache.filter = filter;
    }
    if args.max_samples.is_some() {
        config.cache.max_samples = args.max_samples;
    }
    config.validate()?;

    tagstore::logging::init(&config.logging)?;
    tracing::info!("Tagstore v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(MemoryStore::new((&config.store).into()));
    seed(&store).await?;
    let stats = store.stats().await;
    tracing::info!("Store stats: {}", stats);

    let mut builder = EventCache::builder(store.clone(), config.cache.parse_filter()?)
        .change_capacity(config.cache.channel_capacity);
    if let Some(max) = config.cache.max_samples {
        builder = builder.max_samples(max);
    }
    let cache = builder.build();
    cache.init().await?;
    let records = cache.len().await?;
    tracing::info!(filter = %cache.filter(), records, "Cache ready");

    let mut changes = cache.subscribe_changes();
    let applied = demo_updates(&store).await?;

    for _ in 0..applied {
        match tokio::time::timeout(Duration::from_secs(1), changes.recv()).await {
            Ok(Ok(change)) => log_change(&cache, change).await?,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Change stream interrupted");
                break;
            }
            // Updates outside the cache filter produce no change
            Err(_) => break,
        }
    }

    let stats = cache.stats().await?;
    tracing::info!("Cache stats: {}", stats);
    cache.disconnect().await;
    tracing::info!("Tagstore demo complete");
    Ok(())
}

async fn seed(store: &MemoryStore) -> Result<(), Box<dyn std::error::Error>> {
    for (room, temperature) in [("kitchen", 21.5), ("cellar", 12.0), ("attic", 27.25)] {
        let tags = Tagset::new().tag("kind", "temperature").tag("room", room);
        let id = store
            .create_timeseries(0.0, f64::INFINITY, tags, 1)
            .await?;
        let samples = (0..10)
            .map(|i| Sample::scalar(i as f64 * 60.0, temperature + i as f64 * 0.1))
            .collect();
        store.append_samples(id, samples).await?;
    }

    store
        .create_event(0.0, 300.0, Tagset::parse("kind=door,room=kitchen,state=open")?)
        .await?;
    Ok(())
}

/// Apply a few store-side changes, returning how many were made
async fn demo_updates(store: &MemoryStore) -> StorageResult<usize> {
    let mut applied = 0;

    let ids: Vec<_> = store
        .query(&tagstore::storage::Filter::new(), Some(0))
        .await?
        .into_iter()
        .filter(|r| r.is_timeseries())
        .map(|r| r.id())
        .collect();

    for &id in &ids {
        store
            .append_samples(id, vec![Sample::scalar(600.0, 20.0)])
            .await?;
        applied += 1;
    }

    if let Some(&first) = ids.first() {
        store.set_end(first, 300.0).await?;
        applied += 1;
    }

    store
        .create_event(
            400.0,
            f64::INFINITY,
            Tagset::new().tag("kind", "door").tag("room", "cellar").tag("state", "open"),
        )
        .await?;
    applied += 1;

    Ok(applied)
}

async fn log_change(cache: &EventCache, change: CacheChange) -> Result<(), Box<dyn std::error::Error>> {
    match change {
        CacheChange::Inserted(id) | CacheChange::Updated(id) => {
            if let Some(record) = cache.get(id).await? {
                let tags = record.tagset().await;
                let samples = record.samples().await.len();
                tracing::info!(event_id = %id, tags = %tags, samples, "{:?}", change);
            }
        }
        CacheChange::Removed(id) => tracing::info!(event_id = %id, "Removed"),
    }
    Ok(())
}
