//! Bundle manifest: the dependency graph and content hash table
//!
//! The manifest is shipped as a bundle of its own. Once that bundle has been
//! fetched and its manifest item decoded, the resulting [`Manifest`] is
//! published into the loader exactly once and never mutated afterwards.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use xxhash_rust::xxh3::xxh3_128;

use crate::error::Result;

/// 128-bit content hash used by the fetch transport for cache validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct BundleHash(pub u128);

impl BundleHash {
    /// Hash a bundle payload
    pub fn of(bytes: &[u8]) -> Self {
        Self(xxh3_128(bytes))
    }

    /// Parse up to 32 hex digits, nothing else
    pub fn from_hex(text: &str) -> Option<Self> {
        if text.is_empty() || text.len() > 32 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u128::from_str_radix(text, 16).ok().map(Self)
    }
}

impl fmt::Display for BundleHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl Serialize for BundleHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BundleHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        BundleHash::from_hex(&text)
            .ok_or_else(|| de::Error::custom(format!("invalid bundle hash: {text:?}")))
    }
}

/// One bundle as declared by the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    #[serde(default)]
    pub hash: BundleHash,
    /// Full dependency closure, already transitively complete
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Deserialize)]
struct ManifestDocument {
    bundles: Vec<ManifestEntry>,
}

/// Read-only dependency graph for all bundles
///
/// Enumeration order is declaration order, which is what variant
/// resolution falls back to when no active variant matches.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
    index: HashMap<String, usize>,
}

impl Manifest {
    /// Start building a manifest in code
    pub fn builder() -> ManifestBuilder {
        ManifestBuilder::default()
    }

    /// Build a manifest from entries; a repeated name replaces the earlier entry in place
    pub fn from_entries(entries: impl IntoIterator<Item = ManifestEntry>) -> Self {
        let mut manifest = Self::default();
        for entry in entries {
            if let Some(&slot) = manifest.index.get(&entry.name) {
                log::warn!("Manifest declares bundle {} more than once", entry.name);
                manifest.entries[slot] = entry;
            } else {
                manifest.index.insert(entry.name.clone(), manifest.entries.len());
                manifest.entries.push(entry);
            }
        }
        manifest
    }

    /// Decode the JSON manifest document
    ///
    /// ```json
    /// {"bundles": [{"name": "a", "hash": "00ff", "dependencies": ["b"]}]}
    /// ```
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let document: ManifestDocument = serde_json::from_slice(bytes)?;
        Ok(Self::from_entries(document.bundles))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::from_json_slice(text.as_bytes())
    }

    /// Direct dependencies of `name`; empty for leaves and unknown bundles
    pub fn dependencies(&self, name: &str) -> &[String] {
        self.entry(name)
            .map(|entry| entry.dependencies.as_slice())
            .unwrap_or(&[])
    }

    pub fn hash(&self, name: &str) -> Option<BundleHash> {
        self.entry(name).map(|entry| entry.hash)
    }

    /// All bundle names carrying a `.variant` suffix, in declaration order
    pub fn bundles_with_variant(&self) -> impl Iterator<Item = &str> {
        self.bundle_names().filter(|name| name.contains('.'))
    }

    pub fn bundle_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> Option<&ManifestEntry> {
        self.index.get(name).map(|&slot| &self.entries[slot])
    }
}

/// Builder for manifests assembled in code (tests, tools, embedded catalogs)
#[derive(Debug, Default)]
pub struct ManifestBuilder {
    entries: Vec<ManifestEntry>,
}

impl ManifestBuilder {
    /// Declare a leaf bundle
    pub fn bundle(self, name: impl Into<String>, hash: BundleHash) -> Self {
        self.bundle_with_dependencies(name, hash, std::iter::empty::<String>())
    }

    /// Declare a bundle together with its dependency closure
    pub fn bundle_with_dependencies<I, S>(mut self, name: impl Into<String>, hash: BundleHash, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.push(ManifestEntry {
            name: name.into(),
            hash,
            dependencies: dependencies.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn build(self) -> Manifest {
        Manifest::from_entries(self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_display_round_trip() {
        let hash = BundleHash::of(b"payload");
        let text = hash.to_string();
        assert_eq!(text.len(), 32);
        assert_eq!(BundleHash::from_hex(&text), Some(hash));
    }

    #[test]
    fn test_hash_rejects_garbage() {
        assert_eq!(BundleHash::from_hex(""), None);
        assert_eq!(BundleHash::from_hex("xyz"), None);
        assert_eq!(BundleHash::from_hex(&"f".repeat(33)), None);
    }

    #[test]
    fn test_hash_rejects_sign_and_whitespace() {
        assert_eq!(BundleHash::from_hex("+ff"), None);
        assert_eq!(BundleHash::from_hex("-1"), None);
        assert_eq!(BundleHash::from_hex(" ff"), None);
        assert_eq!(BundleHash::from_hex("FF"), Some(BundleHash(255)));
    }

    #[test]
    fn test_dependencies_of_unknown_bundle_are_empty() {
        let manifest = Manifest::builder().bundle("a", BundleHash(1)).build();
        assert!(manifest.dependencies("a").is_empty());
        assert!(manifest.dependencies("missing").is_empty());
        assert_eq!(manifest.hash("missing"), None);
    }

    #[test]
    fn test_variants_keep_declaration_order() {
        let manifest = Manifest::builder()
            .bundle("x.low", BundleHash(1))
            .bundle("plain", BundleHash(2))
            .bundle("x.high", BundleHash(3))
            .build();

        let variants: Vec<_> = manifest.bundles_with_variant().collect();
        assert_eq!(variants, vec!["x.low", "x.high"]);
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "bundles": [
                {"name": "a", "hash": "0a", "dependencies": ["b", "c"]},
                {"name": "b", "hash": "0b"},
                {"name": "c"}
            ]
        }"#;

        let manifest = Manifest::from_json_str(json).unwrap();
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest.dependencies("a"), ["b".to_string(), "c".to_string()]);
        assert_eq!(manifest.hash("b"), Some(BundleHash(0x0b)));
        assert_eq!(manifest.hash("c"), Some(BundleHash::default()));
    }

    #[test]
    fn test_from_json_invalid_hash() {
        let json = r#"{"bundles": [{"name": "a", "hash": "nope"}]}"#;
        assert!(Manifest::from_json_str(json).is_err());
    }

    #[test]
    fn test_duplicate_entry_replaces() {
        let manifest = Manifest::builder()
            .bundle("a", BundleHash(1))
            .bundle_with_dependencies("a", BundleHash(2), ["b"])
            .build();

        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.hash("a"), Some(BundleHash(2)));
        assert_eq!(manifest.dependencies("a").len(), 1);
    }
}
