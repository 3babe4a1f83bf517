//! Basic loading example for archetype_bundle
//!
//! Initializes the manifest, loads one asset with its dependency and
//! unloads it again, ticking the manager like a frame loop would.

use archetype_bundle::{BundleManager, Manifest, MockBundle, MockFetcher, MockSceneLoader, MANIFEST_ITEM_NAME};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let hash = MockBundle::new().hash();
    let manifest = Manifest::builder()
        .bundle_with_dependencies("heroes", hash, ["materials"])
        .bundle("materials", hash)
        .build();

    // Mock transport: every fetch takes three ticks
    let fetcher = MockFetcher::new()
        .with_latency(3)
        .with_bundle(archetype_bundle::platform_name(), MockBundle::new().with_item(MANIFEST_ITEM_NAME, manifest))
        .with_bundle("heroes", MockBundle::new().with_item("knight", String::from("knight prefab")))
        .with_bundle("materials", MockBundle::new());

    let mut manager = BundleManager::new(fetcher, MockSceneLoader::new());
    manager.set_base_url("mock://bundles/");

    println!("archetype_bundle v{}", archetype_bundle::VERSION);

    let manifest = manager.initialize_manifest()?;
    let mut frame = 0;
    while !manifest.is_done() {
        manager.tick();
        frame += 1;
    }
    println!("Manifest ready after {frame} frames");

    let knight = manager.load_asset::<String>("heroes", "knight")?;
    knight.on_complete(|asset| println!("Callback received: {asset:?}"));
    while !knight.is_done() {
        println!("frame {frame}: heroes {:.0}%", manager.fetch_progress("heroes").unwrap_or(0.0) * 100.0);
        manager.tick();
        frame += 1;
    }

    match knight.asset() {
        Some(asset) => println!("Loaded knight: {asset}"),
        None => println!("Knight failed: {:?}", knight.error()),
    }

    manager.unload(knight.bundle_name());
    let metrics = manager.metrics();
    println!(
        "Resident bundles: {:?}, fetches: {}, released: {}",
        manager.registry().resident_names(),
        metrics.fetches_started(),
        metrics.bundles_released()
    );
    Ok(())
}
