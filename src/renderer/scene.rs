//! egui_wgpu integration for the 3D scene
//!
//! Renders offscreen with a depth buffer (earth sphere plus instanced
//! satellite billboards), then blits into egui's render pass. The satellite
//! instance storage is shared with the point collection; the scene only
//! reads it at upload time.

use std::sync::Arc;

use glam::{Mat4, Vec3};
use parking_lot::RwLock;
use wgpu::util::DeviceExt;

use super::camera::{CameraUniform, OrbitCamera};
use super::earth::{generate_earth_sphere, EarthVertex};
use super::points::PointInstance;

/// Per-frame data pushed by the app before painting
#[derive(Clone)]
pub struct SceneRenderData {
    pub camera: OrbitCamera,
    pub aspect_ratio: f32,
    pub sun_direction: Vec3,
    /// Uniform transform applied to the whole point collection
    pub points_model: Mat4,
    pub instances: Arc<RwLock<Vec<PointInstance>>>,
}

impl Default for SceneRenderData {
    fn default() -> Self {
        Self {
            camera: OrbitCamera::default(),
            aspect_ratio: 16.0 / 9.0,
            sun_direction: Vec3::new(1.0, 0.3, 0.5).normalize(),
            points_model: Mat4::IDENTITY,
            instances: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct EarthUniforms {
    sun_direction: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct PointsUniforms {
    model: [[f32; 4]; 4],
}

/// GPU resources for the scene, stored in egui's callback resources
pub struct SceneResources {
    offscreen_texture: wgpu::Texture,
    offscreen_view: wgpu::TextureView,
    offscreen_size: (u32, u32),
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    target_format: wgpu::TextureFormat,

    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,

    earth_vertex_buffer: wgpu::Buffer,
    earth_index_buffer: wgpu::Buffer,
    earth_index_count: u32,
    earth_pipeline: wgpu::RenderPipeline,
    earth_bind_group: wgpu::BindGroup,
    earth_uniform_buffer: wgpu::Buffer,

    points_pipeline: wgpu::RenderPipeline,
    points_buffer: wgpu::Buffer,
    points_capacity: u32,
    points_bind_group: wgpu::BindGroup,
    points_uniform_buffer: wgpu::Buffer,

    blit_pipeline: wgpu::RenderPipeline,
    blit_bind_group_layout: wgpu::BindGroupLayout,
    blit_bind_group: wgpu::BindGroup,
    blit_sampler: wgpu::Sampler,

    render_data: RwLock<SceneRenderData>,
}

impl SceneResources {
    pub fn new(
        device: &wgpu::Device,
        target_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        points_capacity: u32,
    ) -> Self {
        log::info!("Initializing scene resources ({}x{})", width, height);

        let (offscreen_texture, offscreen_view) =
            Self::create_offscreen_texture(device, width, height, target_format);
        let (depth_texture, depth_view) = Self::create_depth_texture(device, width, height);

        // Camera
        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Buffer"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Camera Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        // Earth
        let (earth_vertices, earth_indices) = generate_earth_sphere(64, 32);

        let earth_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Earth Vertex Buffer"),
            contents: bytemuck::cast_slice(&earth_vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let earth_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Earth Index Buffer"),
            contents: bytemuck::cast_slice(&earth_indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let earth_uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Earth Uniform Buffer"),
            size: std::mem::size_of::<EarthUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_layout_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let earth_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Earth Bind Group Layout"),
                entries: &[uniform_layout_entry(0)],
            });

        let earth_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Earth Bind Group"),
            layout: &earth_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: earth_uniform_buffer.as_entire_binding(),
            }],
        });

        let earth_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Earth Shader"),
            source: wgpu::ShaderSource::Wgsl(EARTH_SHADER.into()),
        });

        let earth_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Earth Pipeline Layout"),
                bind_group_layouts: &[&camera_bind_group_layout, &earth_bind_group_layout],
                push_constant_ranges: &[],
            });

        let earth_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Earth Pipeline"),
            layout: Some(&earth_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &earth_shader,
                entry_point: Some("vs_main"),
                buffers: &[EarthVertex::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &earth_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                front_face: wgpu::FrontFace::Ccw,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        // Satellite points (instanced billboards with a shared model matrix)
        let points_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Point Instance Buffer"),
            size: (points_capacity as usize * std::mem::size_of::<PointInstance>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let points_uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Points Uniform Buffer"),
            size: std::mem::size_of::<PointsUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let points_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Points Bind Group Layout"),
                entries: &[uniform_layout_entry(0)],
            });

        let points_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Points Bind Group"),
            layout: &points_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: points_uniform_buffer.as_entire_binding(),
            }],
        });

        let points_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Points Shader"),
            source: wgpu::ShaderSource::Wgsl(POINTS_SHADER.into()),
        });

        let points_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Points Pipeline Layout"),
                bind_group_layouts: &[&camera_bind_group_layout, &points_bind_group_layout],
                push_constant_ranges: &[],
            });

        let points_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Points Pipeline"),
            layout: Some(&points_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &points_shader,
                entry_point: Some("vs_main"),
                buffers: &[PointInstance::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &points_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        // Blit (offscreen texture into egui's pass)
        let blit_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(BLIT_SHADER.into()),
        });

        let blit_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Blit Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let blit_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Blit Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let blit_bind_group = Self::create_blit_bind_group(
            device,
            &blit_bind_group_layout,
            &offscreen_view,
            &blit_sampler,
        );

        let blit_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blit Pipeline Layout"),
            bind_group_layouts: &[&blit_bind_group_layout],
            push_constant_ranges: &[],
        });

        let blit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Blit Pipeline"),
            layout: Some(&blit_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &blit_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &blit_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            offscreen_texture,
            offscreen_view,
            offscreen_size: (width, height),
            depth_texture,
            depth_view,
            target_format,
            camera_buffer,
            camera_bind_group,
            earth_vertex_buffer,
            earth_index_buffer,
            earth_index_count: earth_indices.len() as u32,
            earth_pipeline,
            earth_bind_group,
            earth_uniform_buffer,
            points_pipeline,
            points_buffer,
            points_capacity,
            points_bind_group,
            points_uniform_buffer,
            blit_pipeline,
            blit_bind_group_layout,
            blit_bind_group,
            blit_sampler,
            render_data: RwLock::new(SceneRenderData::default()),
        }
    }

    fn create_offscreen_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    fn create_depth_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    fn create_blit_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        offscreen_view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Blit Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(offscreen_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    /// Update render data (called from the app each frame)
    pub fn set_render_data(&self, data: SceneRenderData) {
        *self.render_data.write() = data;
    }

    /// Resize offscreen buffers if needed
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if self.offscreen_size != (width, height) && width > 0 && height > 0 {
            let (offscreen_texture, offscreen_view) =
                Self::create_offscreen_texture(device, width, height, self.target_format);
            let (depth_texture, depth_view) = Self::create_depth_texture(device, width, height);

            self.blit_bind_group = Self::create_blit_bind_group(
                device,
                &self.blit_bind_group_layout,
                &offscreen_view,
                &self.blit_sampler,
            );

            self.offscreen_texture = offscreen_texture;
            self.offscreen_view = offscreen_view;
            self.depth_texture = depth_texture;
            self.depth_view = depth_view;
            self.offscreen_size = (width, height);
        }
    }

    /// Render the scene into the offscreen buffer
    pub fn render_offscreen(&self, queue: &wgpu::Queue, encoder: &mut wgpu::CommandEncoder) {
        let data = self.render_data.read();

        let camera_uniform = CameraUniform::from_camera(&data.camera, data.aspect_ratio);
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&camera_uniform));

        let earth_uniforms = EarthUniforms {
            sun_direction: [
                data.sun_direction.x,
                data.sun_direction.y,
                data.sun_direction.z,
                0.0,
            ],
        };
        queue.write_buffer(
            &self.earth_uniform_buffer,
            0,
            bytemuck::bytes_of(&earth_uniforms),
        );

        let points_uniforms = PointsUniforms {
            model: data.points_model.to_cols_array_2d(),
        };
        queue.write_buffer(
            &self.points_uniform_buffer,
            0,
            bytemuck::bytes_of(&points_uniforms),
        );

        let point_count = {
            let instances = data.instances.read();
            let count = instances.len().min(self.points_capacity as usize);
            if count > 0 {
                queue.write_buffer(
                    &self.points_buffer,
                    0,
                    bytemuck::cast_slice(&instances[..count]),
                );
            }
            count
        };

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Offscreen Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.offscreen_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.02,
                            g: 0.02,
                            b: 0.05,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            render_pass.set_pipeline(&self.earth_pipeline);
            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
            render_pass.set_bind_group(1, &self.earth_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.earth_vertex_buffer.slice(..));
            render_pass
                .set_index_buffer(self.earth_index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..self.earth_index_count, 0, 0..1);

            if point_count > 0 {
                render_pass.set_pipeline(&self.points_pipeline);
                render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
                render_pass.set_bind_group(1, &self.points_bind_group, &[]);
                render_pass.set_vertex_buffer(0, self.points_buffer.slice(..));
                // Two triangles per billboard
                render_pass.draw(0..6, 0..point_count as u32);
            }
        }
    }

    pub fn blit(&self, render_pass: &mut wgpu::RenderPass<'static>) {
        render_pass.set_pipeline(&self.blit_pipeline);
        render_pass.set_bind_group(0, &self.blit_bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}

/// The callback egui_wgpu invokes per frame
pub struct SceneCallback {
    pub viewport_size: (u32, u32),
}

impl egui_wgpu::CallbackTrait for SceneCallback {
    fn prepare(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        _screen_descriptor: &egui_wgpu::ScreenDescriptor,
        egui_encoder: &mut wgpu::CommandEncoder,
        callback_resources: &mut egui_wgpu::CallbackResources,
    ) -> Vec<wgpu::CommandBuffer> {
        if let Some(resources) = callback_resources.get_mut::<SceneResources>() {
            resources.resize(device, self.viewport_size.0, self.viewport_size.1);
            resources.render_offscreen(queue, egui_encoder);
        }
        Vec::new()
    }

    fn paint(
        &self,
        _info: egui::PaintCallbackInfo,
        render_pass: &mut wgpu::RenderPass<'static>,
        callback_resources: &egui_wgpu::CallbackResources,
    ) {
        if let Some(resources) = callback_resources.get::<SceneResources>() {
            resources.blit(render_pass);
        }
    }
}

// Shader sources

const EARTH_SHADER: &str = r#"
struct CameraUniform {
    view_proj: mat4x4<f32>,
    view: mat4x4<f32>,
    camera_pos: vec4<f32>,
};

struct EarthUniforms {
    sun_direction: vec4<f32>,
};

@group(0) @binding(0) var<uniform> camera: CameraUniform;
@group(1) @binding(0) var<uniform> earth: EarthUniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = camera.view_proj * vec4<f32>(in.position, 1.0);
    out.world_pos = in.position;
    out.normal = in.normal;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let sun_dir = normalize(earth.sun_direction.xyz);
    let normal = normalize(in.normal);

    // Day/night blending based on sun angle
    let sun_dot = dot(normal, sun_dir);
    let day_factor = smoothstep(-0.1, 0.3, sun_dot);

    // Procedural surface: ocean base with faint latitude banding
    let band = 0.04 * sin(normal.y * 18.0);
    let day_color = vec3<f32>(0.10 + band, 0.24 + band, 0.47);
    let night_color = day_color * 0.12;

    var color = mix(night_color, day_color, day_factor);

    // Atmospheric rim lighting
    let view_dir = normalize(camera.camera_pos.xyz - in.world_pos);
    let rim = 1.0 - max(dot(view_dir, normal), 0.0);
    let atmosphere = vec3<f32>(0.3, 0.5, 1.0) * pow(rim, 4.0) * 0.6;
    color += atmosphere;

    return vec4<f32>(color, 1.0);
}
"#;

const POINTS_SHADER: &str = r#"
struct CameraUniform {
    view_proj: mat4x4<f32>,
    view: mat4x4<f32>,
    camera_pos: vec4<f32>,
};

struct PointsUniforms {
    model: mat4x4<f32>,
};

@group(0) @binding(0) var<uniform> camera: CameraUniform;
@group(1) @binding(0) var<uniform> points: PointsUniforms;

struct InstanceInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
    @location(2) size: f32,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) uv: vec2<f32>,
};

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    instance: InstanceInput,
) -> VertexOutput {
    var offsets = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(-1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0)
    );

    let offset = offsets[vertex_index];

    // One shared transform for the whole collection
    let world_center = (points.model * vec4<f32>(instance.position, 1.0)).xyz;

    let dist = length(camera.camera_pos.xyz - world_center);
    let base_size = instance.size * 0.008;
    let screen_size = clamp(base_size / dist, 0.0008, 0.02);

    let right = vec3<f32>(camera.view[0][0], camera.view[1][0], camera.view[2][0]);
    let up = vec3<f32>(camera.view[0][1], camera.view[1][1], camera.view[2][1]);

    let billboard_pos = world_center +
        right * offset.x * screen_size * dist +
        up * offset.y * screen_size * dist;

    var out: VertexOutput;
    out.clip_position = camera.view_proj * vec4<f32>(billboard_pos, 1.0);
    out.color = instance.color;
    out.uv = offset * 0.5 + 0.5;

    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let dist = length(in.uv - vec2<f32>(0.5));
    let alpha = 1.0 - smoothstep(0.35, 0.5, dist);

    if (alpha < 0.01) {
        discard;
    }

    return vec4<f32>(in.color.rgb, in.color.a * alpha);
}
"#;

const BLIT_SHADER: &str = r#"
@group(0) @binding(0) var blit_texture: texture_2d<f32>;
@group(0) @binding(1) var blit_sampler: sampler;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0)
    );

    var out: VertexOutput;
    let pos = positions[vertex_index];
    out.clip_position = vec4<f32>(pos, 0.0, 1.0);
    out.uv = pos * 0.5 + 0.5;
    out.uv.y = 1.0 - out.uv.y;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(blit_texture, blit_sampler, in.uv);
}
"#;
