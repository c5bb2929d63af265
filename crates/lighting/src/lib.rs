//! Lighting: per-cell light levels and point-light presets.
//!
//! # Invariants
//! - Light levels never exceed [`MAX_LIGHT_LEVEL`] and never increase with hop distance
//!   from the nearest source.
//! - Blocked cells receive a level but never pass light on.
//! - Queries outside the map degrade to the darkest level.

mod propagation;
mod tiers;

pub use propagation::{BrightnessTable, LIGHT_DIVISIONS, LightMap, MAX_LIGHT_LEVEL, WARM_WHITE};
pub use tiers::{INTENSITY_THRESHOLD, Light, LightPreset, attenuation_radius, tier_for_symbol};

pub fn crate_info() -> &'static str {
    "crawl-lighting v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("lighting"));
    }
}
