//! Loading bundles from disk through a Tokio-spawned file transport
//!
//! Run with: `cargo run --example async_fetch --features runtime-tokio -- <dir>`
//! where `<dir>/<platform>/` holds a JSON manifest bundle named after the
//! platform and raw bundle files named as in the manifest.

use std::sync::Arc;
use std::time::Duration;

use archetype_bundle::{
    decode_with, platform_name, BundleManager, Manifest, MockBundle, MockSceneLoader, SpawnedFetcher, TokioFileFetch,
    TokioSpawner, MANIFEST_ITEM_NAME,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let root = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());
    let root = std::fs::canonicalize(root)?;

    let decoder = decode_with(|name, bytes| {
        if name == platform_name() {
            let manifest = Manifest::from_json_slice(&bytes).ok()?;
            Some(Arc::new(MockBundle::new().with_item(MANIFEST_ITEM_NAME, manifest)))
        } else {
            let size = bytes.len();
            Some(Arc::new(MockBundle::new().with_payload(bytes).with_item("size", size)))
        }
    });

    let fetcher = SpawnedFetcher::new(TokioSpawner::new(), TokioFileFetch, decoder);
    let mut manager = BundleManager::new(fetcher, MockSceneLoader::new());
    manager.set_source_url(&format!("file://{}/", root.display()))?;

    let manifest = manager.initialize_manifest()?;
    while !manifest.is_done() {
        manager.tick();
        tokio::time::sleep(Duration::from_millis(16)).await;
    }

    let Some(manifest) = manifest.manifest() else {
        anyhow::bail!("manifest failed: {}", manifest.error().unwrap_or_default());
    };

    let names: Vec<String> = manifest.bundle_names().map(str::to_string).collect();
    let operations = names
        .iter()
        .map(|name| manager.load_asset::<usize>(name, "size"))
        .collect::<archetype_bundle::Result<Vec<_>>>()?;

    while manager.active_operations() > 0 {
        manager.tick();
        tokio::time::sleep(Duration::from_millis(16)).await;
    }

    for operation in &operations {
        match operation.asset() {
            Some(size) => println!("{}: {size} bytes", operation.bundle_name()),
            None => println!("{}: {}", operation.bundle_name(), operation.error().unwrap_or_default()),
        }
    }
    println!("Dedup hit rate: {:.1}%", manager.metrics().dedup_hit_rate());
    Ok(())
}
