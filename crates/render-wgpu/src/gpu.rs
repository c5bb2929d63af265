use std::num::NonZeroU64;

use bytemuck::Zeroable;
use crawl_assets::{ModelData, RgbaImage, flat_normal_map, solid};
use crawl_common::{MeshVertex, TexturedVertex};
use crawl_level::Level;
use crawl_render::lights::MAX_SHADOW_LIGHTS;
use crawl_render::{FramePlan, LevelRenderer, PassCommand, RenderBatch, RenderSettings, Renderer};
use wgpu::util::DeviceExt;

use crate::GpuError;
use crate::context::GpuContext;
use crate::shaders;
use crate::textures::{
    DEPTH_FORMAT, GpuTexture, SCENE_FORMAT, SHADOW_FORMAT, ShadowCube, render_target,
    upload_image, upload_layers,
};
use crate::uniforms::{
    DrawUniforms, FrameUniforms, ShadowUniforms, align_to, pack_slots,
};

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Float32x3,
    3 => Float32x3,
    4 => Float32x3,
];

const TEXTURED_ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x2,
    2 => Float32x3,
    3 => Float32x3,
];

/// Depth and shadow passes only read the position.
const POSITION_ATTRIBUTE: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

const SHADOW_FACE_COUNT: usize = 6;

fn mesh_layout(attributes: &[wgpu::VertexAttribute]) -> wgpu::VertexBufferLayout<'_> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<MeshVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}

fn textured_layout(attributes: &[wgpu::VertexAttribute]) -> wgpu::VertexBufferLayout<'_> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<TexturedVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}

fn uniform_entry(dynamic: bool, size: usize) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: NonZeroU64::new(size as u64),
        },
        count: None,
    }
}

fn texture_entry(
    binding: u32,
    view_dimension: wgpu::TextureViewDimension,
    filterable: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32, ty: wgpu::SamplerBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(ty),
        count: None,
    }
}

fn material_layout(
    device: &wgpu::Device,
    label: &str,
    dimension: wgpu::TextureViewDimension,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[
            texture_entry(0, dimension, true),
            texture_entry(1, dimension, true),
            texture_entry(2, dimension, true),
            sampler_entry(3, wgpu::SamplerBindingType::Filtering),
        ],
    })
}

struct Layouts {
    frame: wgpu::BindGroupLayout,
    draw: wgpu::BindGroupLayout,
    shadow_view: wgpu::BindGroupLayout,
    wall_material: wgpu::BindGroupLayout,
    material: wgpu::BindGroupLayout,
    shadow_maps: wgpu::BindGroupLayout,
    present: wgpu::BindGroupLayout,
}

impl Layouts {
    fn new(device: &wgpu::Device) -> Self {
        let uniform = |label: &str, dynamic: bool, size: usize| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[uniform_entry(dynamic, size)],
            })
        };
        let shadow_maps = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow_maps_layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::Cube, false),
                texture_entry(1, wgpu::TextureViewDimension::Cube, false),
                texture_entry(2, wgpu::TextureViewDimension::Cube, false),
                texture_entry(3, wgpu::TextureViewDimension::Cube, false),
                sampler_entry(4, wgpu::SamplerBindingType::NonFiltering),
            ],
        });
        let present = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("present_layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D2, true),
                sampler_entry(1, wgpu::SamplerBindingType::Filtering),
            ],
        });
        Self {
            frame: uniform("frame_layout", false, std::mem::size_of::<FrameUniforms>()),
            draw: uniform("draw_layout", true, std::mem::size_of::<DrawUniforms>()),
            shadow_view: uniform("shadow_view_layout", true, std::mem::size_of::<ShadowUniforms>()),
            wall_material: material_layout(
                device,
                "wall_material_layout",
                wgpu::TextureViewDimension::D2Array,
            ),
            material: material_layout(device, "material_layout", wgpu::TextureViewDimension::D2),
            shadow_maps,
            present,
        }
    }
}

struct PipelineSpec<'a> {
    label: &'a str,
    layout: &'a wgpu::PipelineLayout,
    module: &'a wgpu::ShaderModule,
    vertex_entry: &'a str,
    fragment_entry: Option<&'a str>,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    color: Option<wgpu::ColorTargetState>,
    depth: Option<wgpu::DepthStencilState>,
    cull_mode: Option<wgpu::Face>,
}

fn build_pipeline(device: &wgpu::Device, spec: PipelineSpec<'_>) -> wgpu::RenderPipeline {
    let targets = [spec.color];
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(spec.label),
        layout: Some(spec.layout),
        vertex: wgpu::VertexState {
            module: spec.module,
            entry_point: Some(spec.vertex_entry),
            compilation_options: Default::default(),
            buffers: spec.buffers,
        },
        fragment: spec.fragment_entry.map(|entry| wgpu::FragmentState {
            module: spec.module,
            entry_point: Some(entry),
            compilation_options: Default::default(),
            targets: &targets,
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: spec.cull_mode,
            ..Default::default()
        },
        depth_stencil: spec.depth,
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

fn depth_state(write: bool, compare: wgpu::CompareFunction) -> Option<wgpu::DepthStencilState> {
    Some(wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: write,
        depth_compare: compare,
        stencil: Default::default(),
        bias: Default::default(),
    })
}

fn color_state(
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
) -> Option<wgpu::ColorTargetState> {
    Some(wgpu::ColorTargetState {
        format,
        blend,
        write_mask: wgpu::ColorWrites::ALL,
    })
}

struct Pipelines {
    depth_geometry: wgpu::RenderPipeline,
    depth_model: wgpu::RenderPipeline,
    shadow_geometry: wgpu::RenderPipeline,
    shadow_model: wgpu::RenderPipeline,
    geometry: wgpu::RenderPipeline,
    sprite: wgpu::RenderPipeline,
    model: wgpu::RenderPipeline,
    present: wgpu::RenderPipeline,
}

impl Pipelines {
    fn new(device: &wgpu::Device, layouts: &Layouts, surface_format: wgpu::TextureFormat) -> Self {
        let module = |label: &str, source: &'static str| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        };
        let pipeline_layout = |label: &str, groups: &[&wgpu::BindGroupLayout]| {
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: groups,
                push_constant_ranges: &[],
            })
        };

        let depth_shader = module("depth_shader", shaders::DEPTH_SHADER);
        let shadow_shader = module("shadow_shader", shaders::SHADOW_SHADER);
        let geometry_shader = module("geometry_shader", shaders::GEOMETRY_SHADER);
        let sprite_shader = module("sprite_shader", shaders::SPRITE_SHADER);
        let model_shader = module("model_shader", shaders::MODEL_SHADER);
        let present_shader = module("present_shader", shaders::PRESENT_SHADER);

        let depth_layout =
            pipeline_layout("depth_pipeline_layout", &[&layouts.frame, &layouts.draw]);
        let shadow_layout =
            pipeline_layout("shadow_pipeline_layout", &[&layouts.shadow_view, &layouts.draw]);
        let geometry_layout = pipeline_layout(
            "geometry_pipeline_layout",
            &[&layouts.frame, &layouts.draw, &layouts.wall_material, &layouts.shadow_maps],
        );
        let lit_textured_layout = pipeline_layout(
            "textured_pipeline_layout",
            &[&layouts.frame, &layouts.draw, &layouts.material, &layouts.shadow_maps],
        );
        let present_layout = pipeline_layout("present_pipeline_layout", &[&layouts.present]);

        let less = wgpu::CompareFunction::Less;
        let less_equal = wgpu::CompareFunction::LessEqual;

        Self {
            depth_geometry: build_pipeline(device, PipelineSpec {
                label: "depth_geometry_pipeline",
                layout: &depth_layout,
                module: &depth_shader,
                vertex_entry: "vs_depth",
                fragment_entry: None,
                buffers: &[mesh_layout(&POSITION_ATTRIBUTE)],
                color: None,
                depth: depth_state(true, less),
                cull_mode: Some(wgpu::Face::Back),
            }),
            depth_model: build_pipeline(device, PipelineSpec {
                label: "depth_model_pipeline",
                layout: &depth_layout,
                module: &depth_shader,
                vertex_entry: "vs_depth",
                fragment_entry: None,
                buffers: &[textured_layout(&POSITION_ATTRIBUTE)],
                color: None,
                depth: depth_state(true, less),
                cull_mode: None,
            }),
            shadow_geometry: build_pipeline(device, PipelineSpec {
                label: "shadow_geometry_pipeline",
                layout: &shadow_layout,
                module: &shadow_shader,
                vertex_entry: "vs_shadow",
                fragment_entry: Some("fs_shadow"),
                buffers: &[mesh_layout(&POSITION_ATTRIBUTE)],
                color: color_state(SHADOW_FORMAT, None),
                depth: depth_state(true, less),
                cull_mode: None,
            }),
            shadow_model: build_pipeline(device, PipelineSpec {
                label: "shadow_model_pipeline",
                layout: &shadow_layout,
                module: &shadow_shader,
                vertex_entry: "vs_shadow",
                fragment_entry: Some("fs_shadow"),
                buffers: &[textured_layout(&POSITION_ATTRIBUTE)],
                color: color_state(SHADOW_FORMAT, None),
                depth: depth_state(true, less),
                cull_mode: None,
            }),
            geometry: build_pipeline(device, PipelineSpec {
                label: "geometry_pipeline",
                layout: &geometry_layout,
                module: &geometry_shader,
                vertex_entry: "vs_geometry",
                fragment_entry: Some("fs_geometry"),
                buffers: &[mesh_layout(&MESH_ATTRIBUTES)],
                color: color_state(SCENE_FORMAT, Some(wgpu::BlendState::REPLACE)),
                depth: depth_state(false, less_equal),
                cull_mode: Some(wgpu::Face::Back),
            }),
            sprite: build_pipeline(device, PipelineSpec {
                label: "sprite_pipeline",
                layout: &lit_textured_layout,
                module: &sprite_shader,
                vertex_entry: "vs_sprite",
                fragment_entry: Some("fs_sprite"),
                buffers: &[textured_layout(&TEXTURED_ATTRIBUTES)],
                color: color_state(SCENE_FORMAT, Some(wgpu::BlendState::ALPHA_BLENDING)),
                depth: depth_state(false, less_equal),
                cull_mode: None,
            }),
            model: build_pipeline(device, PipelineSpec {
                label: "model_pipeline",
                layout: &lit_textured_layout,
                module: &model_shader,
                vertex_entry: "vs_model",
                fragment_entry: Some("fs_model"),
                buffers: &[textured_layout(&TEXTURED_ATTRIBUTES)],
                color: color_state(SCENE_FORMAT, Some(wgpu::BlendState::REPLACE)),
                depth: depth_state(true, less_equal),
                cull_mode: None,
            }),
            present: build_pipeline(device, PipelineSpec {
                label: "present_pipeline",
                layout: &present_layout,
                module: &present_shader,
                vertex_entry: "vs_present",
                fragment_entry: Some("fs_present"),
                buffers: &[],
                color: color_state(surface_format, Some(wgpu::BlendState::REPLACE)),
                depth: None,
                cull_mode: None,
            }),
        }
    }
}

struct Samplers {
    material: wgpu::Sampler,
    sprite: wgpu::Sampler,
    shadow: wgpu::Sampler,
    present: wgpu::Sampler,
}

impl Samplers {
    fn new(device: &wgpu::Device) -> Self {
        use wgpu::AddressMode::{ClampToEdge, Repeat};
        use wgpu::FilterMode::{Linear, Nearest};

        let sampler = |label: &str, filter: wgpu::FilterMode, address: wgpu::AddressMode| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: address,
                address_mode_v: address,
                address_mode_w: address,
                mag_filter: filter,
                min_filter: filter,
                ..Default::default()
            })
        };
        Self {
            material: sampler("material_sampler", Linear, Repeat),
            sprite: sampler("sprite_sampler", Nearest, ClampToEdge),
            shadow: sampler("shadow_sampler", Nearest, ClampToEdge),
            present: sampler("present_sampler", Linear, ClampToEdge),
        }
    }
}

/// Buffer rewritten every frame; grows to the next power of two when too small.
struct StreamBuffer {
    label: &'static str,
    usage: wgpu::BufferUsages,
    buffer: wgpu::Buffer,
    capacity: u64,
}

impl StreamBuffer {
    fn new(
        device: &wgpu::Device,
        label: &'static str,
        usage: wgpu::BufferUsages,
        capacity: u64,
    ) -> Self {
        let usage = usage | wgpu::BufferUsages::COPY_DST;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity,
            usage,
            mapped_at_creation: false,
        });
        Self {
            label,
            usage,
            buffer,
            capacity,
        }
    }

    /// Returns `true` when the buffer was reallocated.
    fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, bytes: &[u8]) -> bool {
        let needed = bytes.len() as u64;
        let grown = needed > self.capacity;
        if grown {
            self.capacity = needed.next_power_of_two();
            self.buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(self.label),
                size: self.capacity,
                usage: self.usage,
                mapped_at_creation: false,
            });
            tracing::debug!(buffer = self.label, capacity = self.capacity, "stream buffer grown");
        }
        if !bytes.is_empty() {
            queue.write_buffer(&self.buffer, 0, bytes);
        }
        grown
    }
}

fn uniform_group(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    binding_size: Option<usize>,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: binding_size.and_then(|s| NonZeroU64::new(s as u64)),
            }),
        }],
    })
}

fn material_group(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    views: [&wgpu::TextureView; 3],
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(views[0]),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(views[1]),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(views[2]),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

fn shadow_maps_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    cubes: &[ShadowCube],
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    let mut entries: Vec<wgpu::BindGroupEntry<'_>> = cubes
        .iter()
        .enumerate()
        .map(|(i, cube)| wgpu::BindGroupEntry {
            binding: i as u32,
            resource: wgpu::BindingResource::TextureView(&cube.cube.view),
        })
        .collect();
    entries.push(wgpu::BindGroupEntry {
        binding: MAX_SHADOW_LIGHTS as u32,
        resource: wgpu::BindingResource::Sampler(sampler),
    });
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("shadow_maps_group"),
        layout,
        entries: &entries,
    })
}

fn present_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    scene: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("present_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(scene),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// Shadow cubes are kept at 1x1 while shadows are off.
fn shadow_map_size(settings: &RenderSettings) -> u32 {
    if settings.shadows {
        settings.shadow_map_size.max(1)
    } else {
        1
    }
}

struct ShadowTargets {
    cubes: Vec<ShadowCube>,
    depth: GpuTexture,
    group: wgpu::BindGroup,
}

impl ShadowTargets {
    fn new(device: &wgpu::Device, layouts: &Layouts, samplers: &Samplers, size: u32) -> Self {
        let cubes: Vec<ShadowCube> = (0..MAX_SHADOW_LIGHTS)
            .map(|slot| ShadowCube::new(device, slot, size))
            .collect();
        let depth = render_target(device, "shadow_depth", size, size, DEPTH_FORMAT);
        let group = shadow_maps_group(device, &layouts.shadow_maps, &cubes, &samplers.shadow);
        Self { cubes, depth, group }
    }

    fn size(&self) -> u32 {
        self.depth.texture.width()
    }
}

struct SceneTargets {
    color: GpuTexture,
    depth: GpuTexture,
    present: wgpu::BindGroup,
}

impl SceneTargets {
    fn new(
        device: &wgpu::Device,
        layouts: &Layouts,
        samplers: &Samplers,
        width: u32,
        height: u32,
    ) -> Self {
        let color = render_target(device, "scene_color", width, height, SCENE_FORMAT);
        let depth = render_target(device, "scene_depth", width, height, DEPTH_FORMAT);
        let present = present_group(device, &layouts.present, &color.view, &samplers.present);
        Self {
            color,
            depth,
            present,
        }
    }

    fn size(&self) -> (u32, u32) {
        (self.color.texture.width(), self.color.texture.height())
    }
}

struct GpuModel {
    vertices: wgpu::Buffer,
    material: wgpu::BindGroup,
}

impl GpuModel {
    fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layouts: &Layouts,
        samplers: &Samplers,
        index: usize,
        model: &ModelData,
    ) -> Self {
        let placeholder = [TexturedVertex::default()];
        let vertices: &[TexturedVertex] = if model.mesh.vertices.is_empty() {
            &placeholder
        } else {
            &model.mesh.vertices
        };
        let label = format!("model_{index}");
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&label),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let flat = flat_normal_map(1, 1);
        let black = black_pixel();
        let diffuse = upload_image(
            device,
            queue,
            &label,
            &model.diffuse,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        );
        let normal = upload_image(
            device,
            queue,
            &label,
            model.normal.as_ref().unwrap_or(&flat),
            wgpu::TextureFormat::Rgba8Unorm,
        );
        let specular = upload_image(
            device,
            queue,
            &label,
            model.specular.as_ref().unwrap_or(&black),
            wgpu::TextureFormat::Rgba8Unorm,
        );
        let material = material_group(
            device,
            &label,
            &layouts.material,
            [&diffuse.view, &normal.view, &specular.view],
            &samplers.material,
        );
        Self { vertices, material }
    }
}

/// Executes [`FramePlan`]s on the GPU.
///
/// Textures and models are uploaded once from the [`LevelRenderer`] passed to
/// [`WgpuRenderer::new`]; vertex and uniform data is rewritten every frame.
pub struct WgpuRenderer {
    ctx: GpuContext,
    layouts: Layouts,
    pipelines: Pipelines,
    samplers: Samplers,
    uniform_stride: u64,
    frame_buffer: wgpu::Buffer,
    frame_group: wgpu::BindGroup,
    draws: StreamBuffer,
    draw_group: wgpu::BindGroup,
    shadow_views: wgpu::Buffer,
    shadow_view_group: wgpu::BindGroup,
    geometry_vertices: StreamBuffer,
    sprite_vertices: StreamBuffer,
    wall_material: wgpu::BindGroup,
    sprite_material: wgpu::BindGroup,
    models: Vec<GpuModel>,
    shadow: ShadowTargets,
    scene: SceneTargets,
}

impl WgpuRenderer {
    pub async fn new(ctx: GpuContext, renderer: &LevelRenderer) -> Result<Self, GpuError> {
        let device = &ctx.device;
        let queue = &ctx.queue;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let layouts = Layouts::new(device);
        let pipelines = Pipelines::new(device, &layouts, ctx.format());
        let samplers = Samplers::new(device);

        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let uniform_stride = align_to(std::mem::size_of::<DrawUniforms>() as u64, alignment);

        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("frame_uniforms"),
            contents: bytemuck::bytes_of(&FrameUniforms::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let frame_group = uniform_group(device, "frame_group", &layouts.frame, &frame_buffer, None);

        let draws = StreamBuffer::new(
            device,
            "draw_uniforms",
            wgpu::BufferUsages::UNIFORM,
            uniform_stride * 64,
        );
        let draw_group = uniform_group(
            device,
            "draw_group",
            &layouts.draw,
            &draws.buffer,
            Some(std::mem::size_of::<DrawUniforms>()),
        );

        let shadow_views = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shadow_view_uniforms"),
            size: uniform_stride * (MAX_SHADOW_LIGHTS * SHADOW_FACE_COUNT) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let shadow_view_group = uniform_group(
            device,
            "shadow_view_group",
            &layouts.shadow_view,
            &shadow_views,
            Some(std::mem::size_of::<ShadowUniforms>()),
        );

        let vertex_capacity = 64 * 1024;
        let vertex = wgpu::BufferUsages::VERTEX;
        let geometry_vertices =
            StreamBuffer::new(device, "geometry_vertices", vertex, vertex_capacity);
        let sprite_vertices = StreamBuffer::new(device, "sprite_vertices", vertex, vertex_capacity);

        let walls = renderer.walls();
        let srgb = wgpu::TextureFormat::Rgba8UnormSrgb;
        let linear = wgpu::TextureFormat::Rgba8Unorm;
        let wall_diffuse = upload_layers(device, queue, "wall_diffuse", &walls.diffuse, srgb)?;
        let wall_normal = upload_layers(device, queue, "wall_normal", &walls.normal, linear)?;
        let wall_specular =
            upload_layers(device, queue, "wall_specular", &walls.specular, linear)?;
        let wall_material = material_group(
            device,
            "wall_material",
            &layouts.wall_material,
            [&wall_diffuse.view, &wall_normal.view, &wall_specular.view],
            &samplers.material,
        );

        let atlas = upload_image(
            device,
            queue,
            "sprite_atlas",
            &renderer.sprite_atlas().image,
            srgb,
        );
        let sprite_normal =
            upload_image(device, queue, "sprite_normal", &flat_normal_map(1, 1), linear);
        let sprite_specular =
            upload_image(device, queue, "sprite_specular", &black_pixel(), linear);
        let sprite_material = material_group(
            device,
            "sprite_material",
            &layouts.material,
            [&atlas.view, &sprite_normal.view, &sprite_specular.view],
            &samplers.sprite,
        );

        let models: Vec<GpuModel> = renderer
            .models()
            .iter()
            .enumerate()
            .map(|(i, m)| GpuModel::upload(device, queue, &layouts, &samplers, i, m))
            .collect();

        let settings = &renderer.settings;
        let shadow = ShadowTargets::new(device, &layouts, &samplers, shadow_map_size(settings));
        let scene = SceneTargets::new(
            device,
            &layouts,
            &samplers,
            settings.render_width.max(1),
            settings.render_height.max(1),
        );

        if let Some(err) = device.pop_error_scope().await {
            return Err(GpuError::Validation {
                stage: "creating pipelines and resources",
                message: err.to_string(),
            });
        }

        tracing::info!(
            models = models.len(),
            atlas = ?renderer.sprite_atlas().image.dimensions(),
            stride = uniform_stride,
            "GPU renderer ready"
        );

        Ok(Self {
            layouts,
            pipelines,
            samplers,
            uniform_stride,
            frame_buffer,
            frame_group,
            draws,
            draw_group,
            shadow_views,
            shadow_view_group,
            geometry_vertices,
            sprite_vertices,
            wall_material,
            sprite_material,
            models,
            shadow,
            scene,
            ctx,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    /// Resize the surface. The offscreen target follows the render settings, not the window.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
    }

    fn draw_offset(&self, slot: usize) -> u32 {
        (slot as u64 * self.uniform_stride) as u32
    }

    fn shadow_offset(&self, slot: usize, face: usize) -> u32 {
        self.draw_offset(slot * SHADOW_FACE_COUNT + face)
    }

    fn ensure_targets(&mut self, settings: &RenderSettings) {
        let device = &self.ctx.device;
        let size = (settings.render_width.max(1), settings.render_height.max(1));
        if self.scene.size() != size {
            self.scene = SceneTargets::new(device, &self.layouts, &self.samplers, size.0, size.1);
            tracing::debug!(width = size.0, height = size.1, "offscreen target resized");
        }
        let shadow_size = shadow_map_size(settings);
        if self.shadow.size() != shadow_size {
            self.shadow = ShadowTargets::new(device, &self.layouts, &self.samplers, shadow_size);
            tracing::debug!(size = shadow_size, "shadow cubes resized");
        }
    }

    fn upload_frame(&mut self, renderer: &LevelRenderer, plan: &FramePlan) {
        let device = &self.ctx.device;
        let queue = &self.ctx.queue;

        let frame = FrameUniforms::from_plan(plan);
        queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&frame));

        let draws: Vec<DrawUniforms> = std::iter::once(DrawUniforms::identity())
            .chain(renderer.batches().iter().map(DrawUniforms::for_batch))
            .collect();
        if self.draws.write(device, queue, &pack_slots(&draws, self.uniform_stride)) {
            self.draw_group = uniform_group(
                device,
                "draw_group",
                &self.layouts.draw,
                &self.draws.buffer,
                Some(std::mem::size_of::<DrawUniforms>()),
            );
        }

        let mut views = vec![ShadowUniforms::zeroed(); MAX_SHADOW_LIGHTS * SHADOW_FACE_COUNT];
        for cmd in &plan.commands {
            if let PassCommand::Shadow {
                slot,
                position,
                faces,
                ..
            } = cmd
            {
                for (face, view_proj) in faces.iter().enumerate() {
                    if let Some(v) = views.get_mut(slot * SHADOW_FACE_COUNT + face) {
                        *v = ShadowUniforms::new(*view_proj, *position);
                    }
                }
            }
        }
        queue.write_buffer(&self.shadow_views, 0, &pack_slots(&views, self.uniform_stride));

        self.geometry_vertices
            .write(device, queue, bytemuck::cast_slice(renderer.geometry_mesh()));
        self.sprite_vertices
            .write(device, queue, bytemuck::cast_slice(renderer.sprite_mesh()));
    }

    /// Draw one model batch. `material` is the bind group index for its textures, if the
    /// pipeline samples them.
    fn draw_model(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        renderer: &LevelRenderer,
        index: usize,
        material: Option<u32>,
    ) {
        let Some(RenderBatch::Model(batch)) = renderer.batches().get(index) else {
            return;
        };
        let Some(range) = renderer.resolve_model_draw(batch) else {
            return;
        };
        let Some(model) = self.models.get(batch.model.index()) else {
            tracing::warn!(handle = batch.model.0, "model was never uploaded");
            return;
        };
        if range.is_empty() {
            return;
        }
        pass.set_bind_group(1, &self.draw_group, &[self.draw_offset(index + 1)]);
        if let Some(group) = material {
            pass.set_bind_group(group, &model.material, &[]);
        }
        pass.set_vertex_buffer(0, model.vertices.slice(..));
        pass.draw(range, 0..1);
    }

    fn encode_depth_prepass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        renderer: &LevelRenderer,
        geometry: &[usize],
        models: &[usize],
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("depth_prepass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.scene.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
        pass.set_bind_group(0, &self.frame_group, &[]);

        let batches = renderer.batches();
        pass.set_pipeline(&self.pipelines.depth_geometry);
        pass.set_vertex_buffer(0, self.geometry_vertices.buffer.slice(..));
        pass.set_bind_group(1, &self.draw_group, &[self.draw_offset(0)]);
        for &i in geometry {
            if let Some(RenderBatch::Geometry { offset, count, .. }) = batches.get(i) {
                if *count > 0 {
                    pass.draw(*offset..offset + count, 0..1);
                }
            }
        }

        pass.set_pipeline(&self.pipelines.depth_model);
        for &i in models {
            self.draw_model(&mut pass, renderer, i, None);
        }
    }

    fn encode_shadow(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        renderer: &LevelRenderer,
        slot: usize,
        models: &[usize],
    ) {
        let Some(cube) = self.shadow.cubes.get(slot) else {
            tracing::warn!(slot, "shadow pass for a missing slot");
            return;
        };
        let geometry_count = renderer.geometry_mesh().len() as u32;
        for (face, target) in cube.faces.iter().enumerate() {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: f64::from(f32::MAX),
                            g: 0.0,
                            b: 0.0,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.shadow.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            pass.set_bind_group(0, &self.shadow_view_group, &[self.shadow_offset(slot, face)]);
            if geometry_count > 0 {
                pass.set_pipeline(&self.pipelines.shadow_geometry);
                pass.set_bind_group(1, &self.draw_group, &[self.draw_offset(0)]);
                pass.set_vertex_buffer(0, self.geometry_vertices.buffer.slice(..));
                pass.draw(0..geometry_count, 0..1);
            }
            pass.set_pipeline(&self.pipelines.shadow_model);
            for &i in models {
                self.draw_model(&mut pass, renderer, i, None);
            }
        }
    }

    fn encode_main(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        renderer: &LevelRenderer,
        draws: &[usize],
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("main_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.scene.color.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.scene.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
        pass.set_bind_group(0, &self.frame_group, &[]);
        pass.set_bind_group(3, &self.shadow.group, &[]);

        let batches = renderer.batches();
        for &i in draws {
            match batches.get(i) {
                Some(RenderBatch::Geometry { offset, count, .. }) if *count > 0 => {
                    pass.set_pipeline(&self.pipelines.geometry);
                    pass.set_bind_group(1, &self.draw_group, &[self.draw_offset(i + 1)]);
                    pass.set_bind_group(2, &self.wall_material, &[]);
                    pass.set_vertex_buffer(0, self.geometry_vertices.buffer.slice(..));
                    pass.draw(*offset..offset + count, 0..1);
                }
                Some(RenderBatch::Sprite { offset, count, .. }) if *count > 0 => {
                    pass.set_pipeline(&self.pipelines.sprite);
                    pass.set_bind_group(1, &self.draw_group, &[self.draw_offset(i + 1)]);
                    pass.set_bind_group(2, &self.sprite_material, &[]);
                    pass.set_vertex_buffer(0, self.sprite_vertices.buffer.slice(..));
                    pass.draw(*offset..offset + count, 0..1);
                }
                Some(RenderBatch::Model(_)) => {
                    pass.set_pipeline(&self.pipelines.model);
                    self.draw_model(&mut pass, renderer, i, Some(2));
                }
                Some(_) => {}
                None => tracing::warn!(index = i, "draw refers to a missing batch"),
            }
        }
    }

    fn encode_present(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("present_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            ..Default::default()
        });
        pass.set_pipeline(&self.pipelines.present);
        pass.set_bind_group(0, &self.scene.present, &[]);
        pass.draw(0..3, 0..1);
    }
}

fn black_pixel() -> RgbaImage {
    solid(1, 1, [0, 0, 0, 255])
}

impl Renderer for WgpuRenderer {
    type Output = Result<(), GpuError>;

    fn render(
        &mut self,
        _level: &Level,
        renderer: &LevelRenderer,
        plan: &FramePlan,
    ) -> Self::Output {
        let output = match self.ctx.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::debug!("surface lost, reconfiguring");
                self.ctx.reconfigure();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let target = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.ensure_targets(&renderer.settings);
        self.upload_frame(renderer, plan);

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        for cmd in &plan.commands {
            match cmd {
                PassCommand::DepthPrePass { geometry, models } => {
                    self.encode_depth_prepass(&mut encoder, renderer, geometry, models)
                }
                PassCommand::Shadow { slot, models, .. } => {
                    self.encode_shadow(&mut encoder, renderer, *slot, models)
                }
                PassCommand::Main { draws } => self.encode_main(&mut encoder, renderer, draws),
                PassCommand::Present => self.encode_present(&mut encoder, &target),
            }
        }
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
