use crawl_common::{CUBE_SIZE, CellCoord, Grid};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Intensity below which a light no longer contributes.
pub const INTENSITY_THRESHOLD: f32 = 0.1;

/// Height of a light above the cell center.
const LIGHT_HEIGHT: f32 = CUBE_SIZE / 4.0;

/// Lowest tier that casts real-time shadows.
const SHADOW_TIER: u8 = 2;

const AMBIENT: Vec3 = Vec3::splat(0.01);
const WARM_WHITE: Vec3 = Vec3::new(1.0, 0.9, 0.8);
const TORCH: Vec3 = Vec3::new(1.0, 222.0 / 255.0, 156.0 / 255.0);

/// Color and attenuation for one light tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightPreset {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub linear: f32,
    pub quadratic: f32,
}

impl LightPreset {
    /// Preset for a tier in `0..=9`; unknown tiers use the tier-1 preset.
    pub fn for_tier(tier: u8) -> Self {
        let (linear, quadratic) = match tier {
            1 => (0.7, 1.8),
            2 => (0.35, 0.44),
            3 => (0.22, 0.20),
            4 => (0.14, 0.07),
            5 => (0.09, 0.032),
            6 => (0.07, 0.017),
            7 => (0.045, 0.0075),
            8 => (0.027, 0.0028),
            9 => (0.022, 0.0019),
            0 => (0.0014, 0.0007),
            _ => (0.7, 1.8),
        };
        let (diffuse, specular) = match tier {
            4 | 7 => (TORCH, Vec3::ONE),
            _ => (WARM_WHITE, WARM_WHITE),
        };
        Self {
            ambient: AMBIENT,
            diffuse,
            specular,
            linear,
            quadratic,
        }
    }
}

/// A point light placed in the level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub position: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub linear: f32,
    pub quadratic: f32,
    pub shadow_enabled: bool,
    pub tier: u8,
}

impl Light {
    pub fn new(position: Vec3, tier: u8) -> Self {
        let preset = LightPreset::for_tier(tier);
        Self {
            position,
            ambient: preset.ambient,
            diffuse: preset.diffuse,
            specular: preset.specular,
            linear: preset.linear,
            quadratic: preset.quadratic,
            shadow_enabled: tier >= SHADOW_TIER,
            tier,
        }
    }

    /// Light hovering above the center of `cell`.
    pub fn at_cell(cell: CellCoord, tier: u8) -> Self {
        let mut position = cell.world_center();
        position.y = LIGHT_HEIGHT;
        Self::new(position, tier)
    }

    /// One light per digit cell, in row-major order.
    pub fn scan(grid: &Grid) -> Vec<Light> {
        grid.iter()
            .filter_map(|(c, s)| tier_for_symbol(s).map(|tier| Self::at_cell(c, tier)))
            .collect()
    }

    /// Radius of the sphere outside which this light falls below [`INTENSITY_THRESHOLD`].
    pub fn bounding_radius(&self) -> Option<f32> {
        attenuation_radius(self.linear, self.quadratic, INTENSITY_THRESHOLD)
    }
}

/// Tier encoded by a map symbol, if it is a digit.
pub fn tier_for_symbol(symbol: u8) -> Option<u8> {
    symbol.is_ascii_digit().then(|| symbol - b'0')
}

/// Distance at which `1 / (1 + l*d + q*d^2)` drops to `threshold`.
///
/// Solves `q*d^2 + l*d + (1 - 1/threshold) = 0` for its positive root.
/// `None` when the equation has no real root.
pub fn attenuation_radius(linear: f32, quadratic: f32, threshold: f32) -> Option<f32> {
    let c = 1.0 - 1.0 / threshold;
    if quadratic.abs() <= f32::EPSILON {
        return (linear > 0.0).then(|| -c / linear);
    }
    let discriminant = linear * linear - 4.0 * quadratic * c;
    if discriminant < 0.0 {
        return None;
    }
    Some((-linear + discriminant.sqrt()) / (2.0 * quadratic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_table_values() {
        let p = LightPreset::for_tier(4);
        assert_eq!((p.linear, p.quadratic), (0.14, 0.07));
        assert_eq!(p.diffuse, TORCH);
        assert_eq!(p.specular, Vec3::ONE);

        let p = LightPreset::for_tier(0);
        assert_eq!((p.linear, p.quadratic), (0.0014, 0.0007));
        assert_eq!(LightPreset::for_tier(42), LightPreset::for_tier(1));
    }

    #[test]
    fn shadow_eligibility_from_tier() {
        assert!(!Light::new(Vec3::ZERO, 1).shadow_enabled);
        assert!(!Light::new(Vec3::ZERO, 0).shadow_enabled);
        assert!(Light::new(Vec3::ZERO, 2).shadow_enabled);
        assert!(Light::new(Vec3::ZERO, 9).shadow_enabled);
    }

    #[test]
    fn light_sits_above_cell() {
        let l = Light::at_cell(CellCoord::new(3, 7), 4);
        assert_eq!(l.position, Vec3::new(9.0, 0.75, 21.0));
        assert_eq!(l.tier, 4);
    }

    #[test]
    fn radius_hits_threshold() {
        for tier in 0..=9 {
            let l = Light::new(Vec3::ZERO, tier);
            let r = l.bounding_radius().unwrap();
            assert!(r > 0.0);
            let intensity = 1.0 / (1.0 + l.linear * r + l.quadratic * r * r);
            assert!((intensity - INTENSITY_THRESHOLD).abs() < 1e-3, "tier {tier}");
        }
    }

    #[test]
    fn brighter_tiers_reach_further() {
        let r1 = Light::new(Vec3::ZERO, 1).bounding_radius().unwrap();
        let r4 = Light::new(Vec3::ZERO, 4).bounding_radius().unwrap();
        let r9 = Light::new(Vec3::ZERO, 9).bounding_radius().unwrap();
        assert!(r1 < r4 && r4 < r9);
    }

    #[test]
    fn no_real_root() {
        assert_eq!(attenuation_radius(0.0, -1.0, INTENSITY_THRESHOLD), None);
        assert_eq!(attenuation_radius(0.0, 0.0, INTENSITY_THRESHOLD), None);
        let linear_only = attenuation_radius(0.5, 0.0, INTENSITY_THRESHOLD).unwrap();
        assert!((linear_only - 18.0).abs() < 1e-4);
    }

    #[test]
    fn scan_finds_digits() {
        let g = Grid::from_rows(&["#1#", "# 9"]).unwrap();
        let lights = Light::scan(&g);
        assert_eq!(lights.len(), 2);
        assert_eq!(lights[0].tier, 1);
        assert_eq!(lights[1].tier, 9);
        assert_eq!(lights[1].position.x, 6.0);
    }
}
