#![cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]

use bytemuck::NoUninit;
use glam::{Mat4, Vec3};
use wgpu::*;

use crate::controller::RenderSink;
use crate::model::{Camera, ProxyShape, Scene};
use crate::view::gpu_init::GpuContext;
use crate::view::mesh::{
    create_unit_cube, create_unit_plane, create_unit_sphere, MeshBuffer, Vertex,
};

const INITIAL_PROXY_CAPACITY: u32 = 16;

#[repr(C)]
#[derive(Debug, Clone, Copy, NoUninit)]
struct LightingUniform {
    sun_direction: [f32; 3],
    sun_intensity: f32,
    ambient_intensity: f32,
    _pad: [f32; 3],
}

/// Per-proxy uniform, bound at a dynamic offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, NoUninit)]
struct ModelUniform {
    model: [[f32; 4]; 4],
    color: [f32; 4],
}

const MODEL_UNIFORM_SIZE: u64 = std::mem::size_of::<ModelUniform>() as u64;

pub fn create_depth_texture(
    device: &wgpu::Device,
    width: u32,
    height: u32,
) -> (wgpu::Texture, wgpu::TextureView) {
    let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
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
    let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());
    (depth_texture, depth_view)
}

/// Renderer for the proxy scene: one pipeline, one unit mesh per shape,
/// per-proxy model uniforms packed into a single dynamic-offset buffer.
pub struct ProxyRenderer {
    gpu: GpuContext,
    depth_view: TextureView,

    pipeline: RenderPipeline,
    camera_buffer: Buffer,
    lighting_buffer: Buffer,
    camera_bind_group: BindGroup,

    model_bind_group_layout: BindGroupLayout,
    model_buffer: Buffer,
    model_bind_group: BindGroup,
    model_stride: u64,
    model_capacity: u32,

    sphere_mesh: MeshBuffer,
    cube_mesh: MeshBuffer,
    plane_mesh: MeshBuffer,
}

impl ProxyRenderer {
    pub fn new(gpu: GpuContext) -> Self {
        let device = &gpu.device;

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("camera_buffer"),
            size: 64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let lighting_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lighting_buffer"),
            size: 32,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("camera_bind_group_layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera_bind_group"),
            layout: &camera_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lighting_buffer.as_entire_binding(),
                },
            ],
        });

        let model_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("model_bind_group_layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(MODEL_UNIFORM_SIZE),
                    },
                    count: None,
                }],
            });

        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let model_stride = MODEL_UNIFORM_SIZE.div_ceil(alignment) * alignment;
        let (model_buffer, model_bind_group) = Self::create_model_buffer(
            device,
            &model_bind_group_layout,
            model_stride,
            INITIAL_PROXY_CAPACITY,
        );

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("proxy_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/proxy.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pipeline_layout"),
            bind_group_layouts: &[&camera_bind_group_layout, &model_bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("proxy_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x3,
                        },
                        wgpu::VertexAttribute {
                            offset: 12,
                            shader_location: 1,
                            format: wgpu::VertexFormat::Float32x3,
                        },
                    ],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let (_, depth_view) = create_depth_texture(device, gpu.config.width, gpu.config.height);

        let sphere_mesh = create_unit_sphere(16, 24).upload(device);
        let cube_mesh = create_unit_cube().upload(device);
        let plane_mesh = create_unit_plane().upload(device);

        Self {
            gpu,
            depth_view,
            pipeline,
            camera_buffer,
            lighting_buffer,
            camera_bind_group,
            model_bind_group_layout,
            model_buffer,
            model_bind_group,
            model_stride,
            model_capacity: INITIAL_PROXY_CAPACITY,
            sphere_mesh,
            cube_mesh,
            plane_mesh,
        }
    }

    fn create_model_buffer(
        device: &Device,
        layout: &BindGroupLayout,
        stride: u64,
        capacity: u32,
    ) -> (Buffer, BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("model_buffer"),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("model_bind_group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(MODEL_UNIFORM_SIZE),
                }),
            }],
        });
        (buffer, bind_group)
    }

    fn ensure_model_capacity(&mut self, needed: u32) {
        if needed <= self.model_capacity {
            return;
        }
        let capacity = needed.next_power_of_two();
        let (buffer, bind_group) = Self::create_model_buffer(
            &self.gpu.device,
            &self.model_bind_group_layout,
            self.model_stride,
            capacity,
        );
        self.model_buffer = buffer;
        self.model_bind_group = bind_group;
        self.model_capacity = capacity;
    }

    fn mesh_for(&self, shape: ProxyShape) -> &MeshBuffer {
        match shape {
            ProxyShape::Sphere { .. } => &self.sphere_mesh,
            ProxyShape::Cuboid { .. } => &self.cube_mesh,
            ProxyShape::Plane { .. } => &self.plane_mesh,
        }
    }

    fn acquire_frame(&self) -> SurfaceTexture {
        match self.gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Lost) => {
                self.gpu.surface.configure(&self.gpu.device, &self.gpu.config);
                self.gpu
                    .surface
                    .get_current_texture()
                    .expect("Failed to acquire frame after reconfigure")
            }
            Err(e) => panic!("Surface error: {e:?}"),
        }
    }
}

fn shape_scale(shape: ProxyShape) -> Vec3 {
    match shape {
        ProxyShape::Sphere { radius } => Vec3::splat(radius),
        ProxyShape::Cuboid { half_extents } => half_extents,
        ProxyShape::Plane { extent } => Vec3::new(extent, 1.0, extent),
    }
}

impl RenderSink for ProxyRenderer {
    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.gpu.config.width = width;
        self.gpu.config.height = height;
        self.gpu.surface.configure(&self.gpu.device, &self.gpu.config);
        let (_, depth_view) = create_depth_texture(&self.gpu.device, width, height);
        self.depth_view = depth_view;
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) {
        self.gpu.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&camera.view_proj().to_cols_array()),
        );
        self.gpu.queue.write_buffer(
            &self.lighting_buffer,
            0,
            bytemuck::bytes_of(&LightingUniform {
                sun_direction: scene.sun.direction.to_array(),
                sun_intensity: scene.sun.intensity,
                ambient_intensity: scene.ambient_intensity,
                _pad: [0.0; 3],
            }),
        );

        // Upload per-proxy transforms; the shape picked per draw below
        let draws: Vec<ProxyShape> = scene
            .iter()
            .filter(|(_, p)| p.visible)
            .map(|(_, p)| p.shape)
            .collect();
        self.ensure_model_capacity(draws.len() as u32);
        for (i, (_, proxy)) in scene.iter().filter(|(_, p)| p.visible).enumerate() {
            let model = Mat4::from_scale_rotation_translation(
                shape_scale(proxy.shape),
                proxy.orientation,
                proxy.position,
            );
            self.gpu.queue.write_buffer(
                &self.model_buffer,
                i as u64 * self.model_stride,
                bytemuck::bytes_of(&ModelUniform {
                    model: model.to_cols_array_2d(),
                    color: proxy.color,
                }),
            );
        }

        let frame = self.acquire_frame();
        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("encoder"),
            });

        {
            let [r, g, b, a] = scene.background;
            let mut rp = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("proxy_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: a as f64,
                        }),
                        store: StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if scene.visible {
                rp.set_pipeline(&self.pipeline);
                rp.set_bind_group(0, &self.camera_bind_group, &[]);

                for (i, shape) in draws.iter().enumerate() {
                    let mesh = self.mesh_for(*shape);
                    let offset = (i as u64 * self.model_stride) as u32;
                    rp.set_bind_group(1, &self.model_bind_group, &[offset]);
                    rp.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    rp.set_index_buffer(mesh.index_buffer.slice(..), IndexFormat::Uint32);
                    rp.draw_indexed(0..mesh.index_count, 0, 0..1);
                }
            }
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
    }
}
