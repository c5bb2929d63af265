use std::cmp::Ordering;

use crawl_lighting::Light;
use glam::Vec3;

use crate::frustum::{Containment, Frustum};

/// Lights considered per frame.
pub const MAX_RENDER_LIGHTS: usize = 8;
/// Lights that receive a shadow cube map.
pub const MAX_SHADOW_LIGHTS: usize = 4;
/// Lights uploaded to the lit shaders.
pub const MAX_SHADER_LIGHTS: usize = 7;

/// A light selected for this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderLight {
    /// Index into the level's light list.
    pub light: usize,
    pub distance: f32,
    pub shadow: bool,
    pub tier: u8,
}

/// A light's bounding sphere is at least partly in view. Lights without a
/// finite radius are never visible.
pub fn light_visible(frustum: &Frustum, light: &Light) -> bool {
    light
        .bounding_radius()
        .is_some_and(|r| frustum.sphere(light.position, r) != Containment::Outside)
}

/// Pick and order the lights for this frame.
///
/// Visible lights come first, nearest first; the first eight are then ordered
/// shadow-casting first, higher tier first, nearer first. Only the first four
/// keep their shadow flag.
pub fn assign_render_lights(lights: &[Light], frustum: &Frustum, camera: Vec3) -> Vec<RenderLight> {
    let mut candidates: Vec<(bool, RenderLight)> = lights
        .iter()
        .enumerate()
        .map(|(i, l)| {
            (
                light_visible(frustum, l),
                RenderLight {
                    light: i,
                    distance: l.position.distance(camera),
                    shadow: l.shadow_enabled,
                    tier: l.tier,
                },
            )
        })
        .collect();
    candidates.sort_by(|(va, a), (vb, b)| {
        vb.cmp(va).then_with(|| a.distance.total_cmp(&b.distance))
    });

    let mut selected: Vec<RenderLight> = candidates
        .into_iter()
        .take(MAX_RENDER_LIGHTS)
        .map(|(_, rl)| rl)
        .collect();
    selected.sort_by(render_order);
    for rl in selected.iter_mut().skip(MAX_SHADOW_LIGHTS) {
        rl.shadow = false;
    }

    tracing::trace!(
        total = lights.len(),
        selected = selected.len(),
        shadowed = selected.iter().filter(|l| l.shadow).count(),
        "render lights assigned"
    );
    selected
}

fn render_order(a: &RenderLight, b: &RenderLight) -> Ordering {
    b.shadow
        .cmp(&a.shadow)
        .then_with(|| b.tier.cmp(&a.tier))
        .then_with(|| a.distance.total_cmp(&b.distance))
}

/// Per-light data handed to the lit shaders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaderLight {
    pub position: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub linear: f32,
    pub quadratic: f32,
    pub shadow: bool,
    /// Shadow cube map slot, for the first four render lights.
    pub shadow_slot: Option<usize>,
}

/// Resolve the first seven render lights into shader data, skipping stale indices.
pub fn shader_lights(render_lights: &[RenderLight], lights: &[Light]) -> Vec<ShaderLight> {
    render_lights
        .iter()
        .take(MAX_SHADER_LIGHTS)
        .enumerate()
        .filter_map(|(i, rl)| {
            let Some(l) = lights.get(rl.light) else {
                tracing::warn!(index = rl.light, "render light refers to a missing light");
                return None;
            };
            Some(ShaderLight {
                position: l.position,
                ambient: l.ambient,
                diffuse: l.diffuse,
                specular: l.specular,
                linear: l.linear,
                quadratic: l.quadratic,
                shadow: rl.shadow,
                shadow_slot: (i < MAX_SHADOW_LIGHTS).then_some(i),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frustum() -> Frustum {
        let mut f = Frustum::new();
        f.set_internals(60.0, 16.0 / 9.0, 0.5, 100.0);
        f.set_view(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        f
    }

    #[test]
    fn budget_caps_lights_and_shadows() {
        let lights: Vec<Light> = (0..12)
            .map(|i| Light::new(Vec3::new(0.0, 0.75, -3.0 * (i as f32 + 1.0)), 4))
            .collect();
        let selected = assign_render_lights(&lights, &frustum(), Vec3::ZERO);
        assert_eq!(selected.len(), MAX_RENDER_LIGHTS);
        assert_eq!(selected.iter().filter(|l| l.shadow).count(), MAX_SHADOW_LIGHTS);
        assert!(selected.iter().skip(MAX_SHADOW_LIGHTS).all(|l| !l.shadow));
        // Nearest eight, nearest first within equal tier.
        assert_eq!(selected[0].light, 0);
        assert!(selected.iter().all(|l| l.light < 8));
    }

    #[test]
    fn fewer_lights_than_budget() {
        let lights = vec![
            Light::new(Vec3::new(0.0, 0.0, -5.0), 1),
            Light::new(Vec3::new(0.0, 0.0, -9.0), 7),
        ];
        let selected = assign_render_lights(&lights, &frustum(), Vec3::ZERO);
        assert_eq!(selected.len(), 2);
        // Tier 1 never casts shadows, so the tier 7 light sorts first.
        assert_eq!(selected[0].light, 1);
        assert!(selected[0].shadow);
        assert!(!selected[1].shadow);
    }

    #[test]
    fn visible_lights_win_over_nearer_hidden_ones() {
        let mut lights: Vec<Light> = (0..8)
            .map(|i| Light::new(Vec3::new(0.0, 0.0, 40.0 + i as f32 * 3.0), 2))
            .collect();
        lights.push(Light::new(Vec3::new(0.0, 0.0, -60.0), 2));
        let selected = assign_render_lights(&lights, &frustum(), Vec3::ZERO);
        assert_eq!(selected.len(), 8);
        assert!(selected.iter().any(|l| l.light == 8));
        assert!(!selected.iter().any(|l| l.light == 7));
    }

    #[test]
    fn shader_lights_take_seven() {
        let lights: Vec<Light> = (0..9)
            .map(|i| Light::new(Vec3::new(0.0, 0.0, -2.0 * (i as f32 + 1.0)), 3))
            .collect();
        let selected = assign_render_lights(&lights, &frustum(), Vec3::ZERO);
        let shader = shader_lights(&selected, &lights);
        assert_eq!(shader.len(), MAX_SHADER_LIGHTS);
        assert_eq!(shader[3].shadow_slot, Some(3));
        assert_eq!(shader[4].shadow_slot, None);
    }
}
