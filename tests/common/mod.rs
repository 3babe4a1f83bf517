//! Shared fixtures for integration tests

#![allow(dead_code)]

use archetype_bundle::{
    BundleConfig, BundleFetcher, BundleManager, Manifest, MockBundle, MockFetcher, MockSceneLoader,
    SceneLoader, MANIFEST_ITEM_NAME,
};

pub const MANIFEST_BUNDLE: &str = "Manifest";

/// `a -> [b, c]`, `d -> [b]`, `heroes -> [shared]`, `levels -> [shared]`,
/// and `tex` in two variants
pub fn manifest() -> Manifest {
    let hash = MockBundle::new().hash();
    Manifest::builder()
        .bundle_with_dependencies("a", hash, ["b", "c"])
        .bundle("b", hash)
        .bundle("c", hash)
        .bundle_with_dependencies("d", hash, ["b"])
        .bundle_with_dependencies("heroes", hash, ["shared"])
        .bundle_with_dependencies("levels", hash, ["shared"])
        .bundle("shared", hash)
        .bundle("tex.sd", hash)
        .bundle("tex.hd", hash)
        .build()
}

/// Transport serving every bundle the manifest lists, plus the manifest itself
pub fn fetcher() -> MockFetcher {
    MockFetcher::new()
        .with_bundle(MANIFEST_BUNDLE, MockBundle::new().with_item(MANIFEST_ITEM_NAME, manifest()))
        .with_bundle("a", MockBundle::new())
        .with_bundle("b", MockBundle::new())
        .with_bundle("c", MockBundle::new())
        .with_bundle("d", MockBundle::new())
        .with_bundle(
            "heroes",
            MockBundle::new().with_item("knight", String::from("knight prefab")),
        )
        .with_bundle("levels", MockBundle::new().with_item("forest", ()))
        .with_bundle("shared", MockBundle::new())
        .with_bundle("tex.sd", MockBundle::new())
        .with_bundle("tex.hd", MockBundle::new())
}

pub fn config() -> BundleConfig {
    BundleConfig {
        manifest_bundle: MANIFEST_BUNDLE.to_string(),
        ..BundleConfig::default()
    }
}

/// Tick until `done` holds, failing the test after a bounded number of ticks
pub fn tick_until<F: BundleFetcher, S: SceneLoader>(
    manager: &mut BundleManager<F, S>,
    done: impl Fn() -> bool,
) -> usize {
    for ticks in 0..64 {
        if done() {
            return ticks;
        }
        manager.tick();
    }
    panic!("condition not reached after 64 ticks");
}

/// A manager with the manifest already published
pub fn ready_manager_with(fetcher: MockFetcher, scenes: MockSceneLoader, config: BundleConfig) -> BundleManager {
    let mut manager = BundleManager::with_config(fetcher, scenes, config);
    let operation = manager.initialize_manifest().unwrap();
    tick_until(&mut manager, || operation.is_done());
    assert!(operation.manifest().is_some(), "manifest failed: {:?}", operation.error());
    manager
}

pub fn ready_manager(fetcher: MockFetcher) -> BundleManager {
    ready_manager_with(fetcher, MockSceneLoader::new(), config())
}
