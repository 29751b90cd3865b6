use std::collections::HashMap;

/// A loaded resource, addressable by name from stage construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Asset {
    /// Flat color, RGBA in linear space.
    Color([f32; 4]),
}

/// Named resources produced by the loading phase.
///
/// Readiness is a one-shot signal: whoever performs the actual loading
/// (the host page, or the native bootstrap) hands a finished catalog to
/// `LifecycleController::assets_ready` exactly once. A loader that never
/// signals leaves the application in `Loading` indefinitely.
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    entries: HashMap<String, Asset>,
}

impl AssetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in procedural asset set. No decoding or I/O involved, so
    /// it is ready the moment it is constructed.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.insert("sky", Asset::Color([0.44, 0.85, 1.0, 1.0]));
        catalog.insert("ground", Asset::Color([0.42, 0.48, 0.36, 1.0]));
        catalog.insert("ball", Asset::Color([0.93, 0.93, 0.93, 1.0]));
        catalog.insert("crate", Asset::Color([0.75, 0.13, 0.13, 1.0]));
        catalog
    }

    pub fn insert(&mut self, name: &str, asset: Asset) {
        self.entries.insert(name.to_string(), asset);
    }

    pub fn get(&self, name: &str) -> Option<&Asset> {
        self.entries.get(name)
    }

    /// Convenience accessor for color assets, falling back to magenta so a
    /// missing entry is visible rather than fatal.
    pub fn color(&self, name: &str) -> [f32; 4] {
        match self.entries.get(name) {
            Some(Asset::Color(c)) => *c,
            None => {
                tracing::warn!(name, "missing color asset, using placeholder");
                [1.0, 0.0, 1.0, 1.0]
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_stage_colors() {
        let catalog = AssetCatalog::builtin();
        for name in ["sky", "ground", "ball", "crate"] {
            assert!(catalog.get(name).is_some(), "missing builtin asset {name}");
        }
    }

    #[test]
    fn missing_color_falls_back_to_placeholder() {
        let catalog = AssetCatalog::new();
        assert_eq!(catalog.color("nope"), [1.0, 0.0, 1.0, 1.0]);
    }
}
