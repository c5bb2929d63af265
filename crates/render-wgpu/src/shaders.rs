//! WGSL sources for every pipeline.
//!
//! Bind group layout shared by the lit shaders:
//! - group 0: frame uniforms (camera, features, lights)
//! - group 1: per-draw uniforms, dynamic offset
//! - group 2: material (diffuse, normal, specular, sampler)
//! - group 3: shadow cube maps and their sampler

macro_rules! draw_prelude {
    () => {
        r#"
struct Draw {
    model: mat4x4<f32>,
    // shininess, billboard, material ambient, unused
    params: vec4<f32>,
    // fixed sprite normal in xyz
    extra: vec4<f32>,
};
"#
    };
}

macro_rules! frame_prelude {
    () => {
        r#"
struct Light {
    position: vec4<f32>,
    ambient: vec4<f32>,
    diffuse: vec4<f32>,
    specular: vec4<f32>,
    // linear, quadratic, casts shadow, shadow slot (-1 when none)
    params: vec4<f32>,
};

struct Frame {
    view_proj: mat4x4<f32>,
    eye: vec4<f32>,
    right: vec4<f32>,
    up: vec4<f32>,
    // light count, shadows, normal mapping, specular mapping
    flags: vec4<u32>,
    lights: array<Light, 7>,
};

@group(0) @binding(0)
var<uniform> frame: Frame;
"#
    };
}

macro_rules! lighting_prelude {
    () => {
        r#"
@group(3) @binding(0) var shadow_cube_0: texture_cube<f32>;
@group(3) @binding(1) var shadow_cube_1: texture_cube<f32>;
@group(3) @binding(2) var shadow_cube_2: texture_cube<f32>;
@group(3) @binding(3) var shadow_cube_3: texture_cube<f32>;
@group(3) @binding(4) var shadow_sampler: sampler;

const SHADOW_BIAS: f32 = 0.05;
const DEFAULT_SPECULAR: f32 = 0.3;

fn shadow_distance(slot: i32, dir: vec3<f32>) -> f32 {
    switch slot {
        case 0: { return textureSampleLevel(shadow_cube_0, shadow_sampler, dir, 0.0).r; }
        case 1: { return textureSampleLevel(shadow_cube_1, shadow_sampler, dir, 0.0).r; }
        case 2: { return textureSampleLevel(shadow_cube_2, shadow_sampler, dir, 0.0).r; }
        case 3: { return textureSampleLevel(shadow_cube_3, shadow_sampler, dir, 0.0).r; }
        default: { return 1.0e30; }
    }
}

fn shadow_factor(light: Light, frag: vec3<f32>) -> f32 {
    if frame.flags.y == 0u || light.params.z < 0.5 || light.params.w < 0.0 {
        return 0.0;
    }
    let to_frag = frag - light.position.xyz;
    let closest = shadow_distance(i32(light.params.w), to_frag);
    return select(0.0, 1.0, length(to_frag) - SHADOW_BIAS > closest);
}

fn perturb_normal(n: vec3<f32>, t: vec3<f32>, mapped: vec3<f32>) -> vec3<f32> {
    let tangent = normalize(t - dot(t, n) * n);
    let bitangent = cross(n, tangent);
    return normalize(mat3x3<f32>(tangent, bitangent, n) * (mapped * 2.0 - 1.0));
}

fn shade(
    n: vec3<f32>,
    frag: vec3<f32>,
    albedo: vec3<f32>,
    spec_color: vec3<f32>,
    shininess: f32,
) -> vec3<f32> {
    let view_dir = normalize(frame.eye.xyz - frag);
    var total = vec3<f32>(0.0);
    for (var i = 0u; i < frame.flags.x; i = i + 1u) {
        let light = frame.lights[i];
        let to_light = light.position.xyz - frag;
        let dist = length(to_light);
        let l = to_light / max(dist, 1.0e-4);
        let h = normalize(l + view_dir);
        let diff = max(dot(n, l), 0.0);
        let spec = pow(max(dot(n, h), 0.0), shininess);
        let attenuation = 1.0 / (1.0 + light.params.x * dist + light.params.y * dist * dist);
        let lit = 1.0 - shadow_factor(light, frag);
        let ambient = light.ambient.rgb * albedo;
        let diffuse = light.diffuse.rgb * diff * albedo;
        let specular = light.specular.rgb * spec * spec_color;
        total = total + (ambient + lit * (diffuse + specular)) * attenuation;
    }
    return total;
}

fn specular_color(sampled: vec3<f32>) -> vec3<f32> {
    if frame.flags.w != 0u {
        return sampled;
    }
    return vec3<f32>(DEFAULT_SPECULAR);
}
"#
    };
}

/// Depth-only prepass for geometry and models.
///
/// The main pass tests against this depth with `LessEqual`, so every shader
/// drawn after it computes `view_proj * (model * p)` into an `@invariant`
/// position.
pub const DEPTH_SHADER: &str = concat!(
    frame_prelude!(),
    draw_prelude!(),
    r#"
@group(1) @binding(0)
var<uniform> draw: Draw;

@vertex
fn vs_depth(@location(0) position: vec3<f32>) -> @builtin(position) @invariant vec4<f32> {
    let world = draw.model * vec4<f32>(position, 1.0);
    return frame.view_proj * world;
}
"#
);

/// Writes the distance from the light into one face of a cube map.
pub const SHADOW_SHADER: &str = concat!(
    draw_prelude!(),
    r#"
struct ShadowView {
    view_proj: mat4x4<f32>,
    // light position in xyz, far plane in w
    light: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> shadow_view: ShadowView;

@group(1) @binding(0)
var<uniform> draw: Draw;

struct ShadowOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world: vec3<f32>,
};

@vertex
fn vs_shadow(@location(0) position: vec3<f32>) -> ShadowOut {
    let world = draw.model * vec4<f32>(position, 1.0);
    var out: ShadowOut;
    out.clip_position = shadow_view.view_proj * world;
    out.world = world.xyz;
    return out;
}

@fragment
fn fs_shadow(in: ShadowOut) -> @location(0) vec4<f32> {
    let dist = min(length(in.world - shadow_view.light.xyz), shadow_view.light.w);
    return vec4<f32>(dist, 0.0, 0.0, 1.0);
}
"#
);

/// Level cubes: array-textured, light-map tinted.
pub const GEOMETRY_SHADER: &str = concat!(
    frame_prelude!(),
    draw_prelude!(),
    lighting_prelude!(),
    r#"
@group(1) @binding(0)
var<uniform> draw: Draw;

@group(2) @binding(0) var diffuse_map: texture_2d_array<f32>;
@group(2) @binding(1) var normal_map: texture_2d_array<f32>;
@group(2) @binding(2) var specular_map: texture_2d_array<f32>;
@group(2) @binding(3) var material_sampler: sampler;

struct GeometryIn {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec3<f32>,
    @location(2) normal: vec3<f32>,
    @location(3) tangent: vec3<f32>,
    @location(4) color: vec3<f32>,
};

struct GeometryOut {
    @builtin(position) @invariant clip_position: vec4<f32>,
    @location(0) world: vec3<f32>,
    @location(1) uv: vec3<f32>,
    @location(2) normal: vec3<f32>,
    @location(3) tangent: vec3<f32>,
    @location(4) color: vec3<f32>,
};

@vertex
fn vs_geometry(in: GeometryIn) -> GeometryOut {
    let world = draw.model * vec4<f32>(in.position, 1.0);
    var out: GeometryOut;
    out.clip_position = frame.view_proj * world;
    out.world = world.xyz;
    out.uv = in.uv;
    out.normal = (draw.model * vec4<f32>(in.normal, 0.0)).xyz;
    out.tangent = (draw.model * vec4<f32>(in.tangent, 0.0)).xyz;
    out.color = in.color;
    return out;
}

@fragment
fn fs_geometry(in: GeometryOut) -> @location(0) vec4<f32> {
    let layer = i32(in.uv.z + 0.5);
    let albedo = textureSample(diffuse_map, material_sampler, in.uv.xy, layer);
    let mapped = textureSample(normal_map, material_sampler, in.uv.xy, layer).xyz;
    let spec = textureSample(specular_map, material_sampler, in.uv.xy, layer).rgb;

    var n = normalize(in.normal);
    if frame.flags.z != 0u {
        n = perturb_normal(n, in.tangent, mapped);
    }
    let lit = shade(n, in.world, albedo.rgb, specular_color(spec), draw.params.x);
    let color = in.color * albedo.rgb + lit;
    return vec4<f32>(color, 1.0);
}
"#
);

macro_rules! textured_prelude {
    () => {
        r#"
@group(1) @binding(0)
var<uniform> draw: Draw;

@group(2) @binding(0) var diffuse_map: texture_2d<f32>;
@group(2) @binding(1) var normal_map: texture_2d<f32>;
@group(2) @binding(2) var specular_map: texture_2d<f32>;
@group(2) @binding(3) var material_sampler: sampler;

struct TexturedIn {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) normal: vec3<f32>,
    @location(3) tangent: vec3<f32>,
};

struct TexturedOut {
    @builtin(position) @invariant clip_position: vec4<f32>,
    @location(0) world: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) normal: vec3<f32>,
    @location(3) tangent: vec3<f32>,
};
"#
    };
}

/// Camera-facing (or fixed) alpha-blended sprite quads.
pub const SPRITE_SHADER: &str = concat!(
    frame_prelude!(),
    draw_prelude!(),
    lighting_prelude!(),
    textured_prelude!(),
    r#"
@vertex
fn vs_sprite(in: TexturedIn) -> TexturedOut {
    let center = draw.model[3].xyz;
    var world: vec3<f32>;
    var normal: vec3<f32>;
    if draw.params.y > 0.5 {
        world = center + frame.right.xyz * in.position.x + vec3<f32>(0.0, in.position.y, 0.0);
        normal = normalize(frame.eye.xyz - center);
    } else {
        world = (draw.model * vec4<f32>(in.position, 1.0)).xyz;
        normal = draw.extra.xyz;
    }
    var out: TexturedOut;
    out.clip_position = frame.view_proj * vec4<f32>(world, 1.0);
    out.world = world;
    out.uv = in.uv;
    out.normal = normal;
    out.tangent = frame.right.xyz;
    return out;
}

@fragment
fn fs_sprite(in: TexturedOut) -> @location(0) vec4<f32> {
    let albedo = textureSample(diffuse_map, material_sampler, in.uv);
    let spec = textureSample(specular_map, material_sampler, in.uv).rgb;
    if albedo.a < 0.1 {
        discard;
    }
    let n = normalize(in.normal);
    let lit = shade(n, in.world, albedo.rgb, specular_color(spec), draw.params.x);
    let color = albedo.rgb * draw.params.z + lit;
    return vec4<f32>(color, albedo.a);
}
"#
);

/// Loaded models with optional normal and specular maps.
pub const MODEL_SHADER: &str = concat!(
    frame_prelude!(),
    draw_prelude!(),
    lighting_prelude!(),
    textured_prelude!(),
    r#"
@vertex
fn vs_model(in: TexturedIn) -> TexturedOut {
    let world = draw.model * vec4<f32>(in.position, 1.0);
    var out: TexturedOut;
    out.clip_position = frame.view_proj * world;
    out.world = world.xyz;
    out.uv = in.uv;
    out.normal = (draw.model * vec4<f32>(in.normal, 0.0)).xyz;
    out.tangent = (draw.model * vec4<f32>(in.tangent, 0.0)).xyz;
    return out;
}

@fragment
fn fs_model(in: TexturedOut) -> @location(0) vec4<f32> {
    let albedo = textureSample(diffuse_map, material_sampler, in.uv);
    let mapped = textureSample(normal_map, material_sampler, in.uv).xyz;
    let spec = textureSample(specular_map, material_sampler, in.uv).rgb;

    var n = normalize(in.normal);
    if frame.flags.z != 0u {
        n = perturb_normal(n, in.tangent, mapped);
    }
    let lit = shade(n, in.world, albedo.rgb, specular_color(spec), draw.params.x);
    let color = albedo.rgb * draw.params.z + lit;
    return vec4<f32>(color, albedo.a);
}
"#
);

/// Fullscreen triangle sampling the offscreen target.
pub const PRESENT_SHADER: &str = r#"
@group(0) @binding(0) var scene: texture_2d<f32>;
@group(0) @binding(1) var scene_sampler: sampler;

struct PresentOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_present(@builtin(vertex_index) index: u32) -> PresentOut {
    let corner = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: PresentOut;
    out.clip_position = vec4<f32>(corner * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(corner.x, 1.0 - corner.y);
    return out;
}

@fragment
fn fs_present(in: PresentOut) -> @location(0) vec4<f32> {
    return textureSample(scene, scene_sampler, in.uv);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_points_present() {
        let cases = [
            (DEPTH_SHADER, &["fn vs_depth"][..]),
            (SHADOW_SHADER, &["fn vs_shadow", "fn fs_shadow"]),
            (GEOMETRY_SHADER, &["fn vs_geometry", "fn fs_geometry"]),
            (SPRITE_SHADER, &["fn vs_sprite", "fn fs_sprite"]),
            (MODEL_SHADER, &["fn vs_model", "fn fs_model"]),
            (PRESENT_SHADER, &["fn vs_present", "fn fs_present"]),
        ];
        for (source, entries) in cases {
            for entry in entries {
                assert!(source.contains(entry), "missing {entry}");
            }
        }
    }

    #[test]
    fn lit_shaders_share_light_array() {
        for source in [GEOMETRY_SHADER, SPRITE_SHADER, MODEL_SHADER] {
            assert!(source.contains("lights: array<Light, 7>"));
            assert!(source.contains("fn shade("));
            assert!(source.contains("@group(3) @binding(4) var shadow_sampler"));
        }
        assert!(!DEPTH_SHADER.contains("fn shade("));
    }

    #[test]
    fn depth_tested_positions_match_prepass() {
        for source in [DEPTH_SHADER, GEOMETRY_SHADER, MODEL_SHADER] {
            assert!(source.contains("@builtin(position) @invariant"));
            assert!(source.contains("let world = draw.model * vec4<f32>("));
            assert!(source.contains("frame.view_proj * world;"));
            assert!(!source.contains("frame.view_proj * draw.model"));
        }
        assert!(SPRITE_SHADER.contains("@builtin(position) @invariant"));
    }
}
