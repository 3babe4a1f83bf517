//! Variant selection among `base.variant` bundle names

use crate::manifest::Manifest;

/// Outcome of resolving a requested bundle name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantChoice {
    /// No variant-bearing bundle shares the base name; the request is used as-is
    Unchanged(String),
    /// A candidate whose variant is in the active list
    Preferred(String),
    /// No candidate variant is active; the first candidate in manifest order was taken
    Fallback(String),
}

impl VariantChoice {
    pub fn name(&self) -> &str {
        match self {
            Self::Unchanged(name) | Self::Preferred(name) | Self::Fallback(name) => name,
        }
    }

    pub fn into_name(self) -> String {
        match self {
            Self::Unchanged(name) | Self::Preferred(name) | Self::Fallback(name) => name,
        }
    }
}

/// Split a bundle name on its first `.` into base and optional variant
pub fn split_variant(name: &str) -> (&str, Option<&str>) {
    match name.split_once('.') {
        Some((base, variant)) => (base, Some(variant)),
        None => (name, None),
    }
}

/// Picks the best-matching bundle for a name given prioritized active variants
///
/// Among manifest bundles with a variant whose base matches, the one whose
/// variant appears earliest in `active_variants` wins. Ties between
/// candidates that are not active go to the first one in manifest order.
#[derive(Debug, Clone, Copy)]
pub struct VariantResolver<'a> {
    manifest: &'a Manifest,
    active_variants: &'a [String],
}

impl<'a> VariantResolver<'a> {
    pub fn new(manifest: &'a Manifest, active_variants: &'a [String]) -> Self {
        Self {
            manifest,
            active_variants,
        }
    }

    /// Resolve to a physical bundle name, warning on an ambiguous fallback
    pub fn resolve(&self, name: &str) -> String {
        let choice = self.choose(name);
        if let VariantChoice::Fallback(chosen) = &choice {
            log::warn!(
                "Ambiguous bundle variant chosen because there was no matching active variant: {chosen}"
            );
        }
        choice.into_name()
    }

    /// Resolve without logging, reporting how the choice was made
    pub fn choose(&self, name: &str) -> VariantChoice {
        let (base, _) = split_variant(name);

        let mut best: Option<(usize, &str)> = None;
        for candidate in self.manifest.bundles_with_variant() {
            let (candidate_base, candidate_variant) = split_variant(candidate);
            if candidate_base != base {
                continue;
            }

            let rank = candidate_variant
                .and_then(|variant| self.active_variants.iter().position(|active| active == variant))
                .unwrap_or(usize::MAX);

            // Strictly lower rank only, so the first candidate keeps ties
            if best.map_or(true, |(best_rank, _)| rank < best_rank) {
                best = Some((rank, candidate));
            }
        }

        match best {
            None => VariantChoice::Unchanged(name.to_string()),
            Some((usize::MAX, chosen)) => VariantChoice::Fallback(chosen.to_string()),
            Some((_, chosen)) => VariantChoice::Preferred(chosen.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::BundleHash;

    fn manifest() -> Manifest {
        Manifest::builder()
            .bundle("x.low", BundleHash(1))
            .bundle("x.high", BundleHash(2))
            .bundle("y", BundleHash(3))
            .bundle("xy.high", BundleHash(4))
            .build()
    }

    fn variants(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_variant() {
        assert_eq!(split_variant("x.high"), ("x", Some("high")));
        assert_eq!(split_variant("x"), ("x", None));
        assert_eq!(split_variant("x.a.b"), ("x", Some("a.b")));
    }

    #[test]
    fn test_preferred_variant_wins() {
        let manifest = manifest();
        let active = variants(&["high"]);
        let resolver = VariantResolver::new(&manifest, &active);

        assert_eq!(resolver.resolve("x"), "x.high");
        assert_eq!(resolver.choose("x"), VariantChoice::Preferred("x.high".into()));
    }

    #[test]
    fn test_priority_order_between_active_variants() {
        let manifest = manifest();
        let active = variants(&["low", "high"]);
        let resolver = VariantResolver::new(&manifest, &active);

        assert_eq!(resolver.resolve("x.high"), "x.low");
    }

    #[test]
    fn test_fallback_to_first_candidate() {
        let manifest = manifest();
        let active = Vec::new();
        let resolver = VariantResolver::new(&manifest, &active);

        assert_eq!(resolver.choose("x"), VariantChoice::Fallback("x.low".into()));
        assert_eq!(resolver.resolve("x"), "x.low");
    }

    #[test]
    fn test_name_without_candidates_is_unchanged() {
        let manifest = manifest();
        let active = variants(&["high"]);
        let resolver = VariantResolver::new(&manifest, &active);

        assert_eq!(resolver.choose("y"), VariantChoice::Unchanged("y".into()));
        assert_eq!(resolver.resolve("missing.high"), "missing.high");
    }

    #[test]
    fn test_base_must_match_exactly() {
        let manifest = manifest();
        let active = variants(&["high"]);
        let resolver = VariantResolver::new(&manifest, &active);

        // "xy.high" shares a prefix with "x" but not the base
        assert_eq!(resolver.resolve("xy"), "xy.high");
        assert_eq!(resolver.resolve("x"), "x.high");
    }
}
