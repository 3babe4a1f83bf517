//! Scene loading example with variants and a failing dependency

use archetype_bundle::{
    BundleManager, BundleStatus, DependencyFailurePolicy, Manifest, MockBundle, MockFetcher, MockSceneLoader,
    MANIFEST_ITEM_NAME,
};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let hash = MockBundle::new().hash();
    let manifest = Manifest::builder()
        .bundle_with_dependencies("forest", hash, ["trees", "music"])
        .bundle("trees.sd", hash)
        .bundle("trees.hd", hash)
        .bundle("music", hash)
        .build();

    let fetcher = MockFetcher::new()
        .with_latency(1)
        .with_bundle(archetype_bundle::platform_name(), MockBundle::new().with_item(MANIFEST_ITEM_NAME, manifest))
        .with_bundle("forest", MockBundle::new())
        .with_bundle("trees.sd", MockBundle::new())
        .with_bundle("trees.hd", MockBundle::new())
        .with_failure("music", "503 Service Unavailable");

    let mut manager = BundleManager::new(fetcher, MockSceneLoader::new().with_latency(2));
    manager.set_active_variants(["hd", "sd"]);

    let manifest = manager.initialize_manifest()?;
    while !manifest.is_done() {
        manager.tick();
    }

    for policy in [DependencyFailurePolicy::Dispatch, DependencyFailurePolicy::Fail] {
        manager.set_dependency_failure_policy(policy);

        let scene = manager.load_scene("forest", "Forest", true)?;
        scene.on_complete(move |success| println!("{policy:?}: scene loaded = {success}"));
        while !scene.is_done() {
            manager.tick();
        }

        if let BundleStatus::Degraded { error, .. } = manager.status("forest") {
            println!("forest is usable with a failed dependency: {error}");
        }
        manager.unload(scene.bundle_name());
    }

    // Retry the failed dependency once the server is back
    manager.fetcher().insert_bundle("music", MockBundle::new());
    if manager.retry("music")? {
        while manager.registry().is_pending("music") {
            manager.tick();
        }
    }

    println!("Scenes requested: {:?}", manager.scenes().loaded_scenes());
    println!("Resident: {:?}", manager.registry().resident_names());
    Ok(())
}
