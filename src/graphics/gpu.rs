use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use glam::Vec4;
use log::{debug, error, info, warn};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::error::RenderError;
use crate::graphics::backend::{
    BlendMode, CubemapHandle, FramebufferDesc, FramebufferHandle, LutHandle, MeshHandle,
    MorphFrame, ParticleInstance, RenderBackend, ShaderHandle, ShaderSource, ShaderStage,
    TextureBinding, TextureHandle, TextureSlotKind, UniformKind, UniformValue,
};
use crate::graphics::mesh::{MeshData, Vertex};
use crate::graphics::texture::{CubemapData, LutData, LutPreset, TextureData};

const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

// ── GPU-side records ─────────────────────────────────────────────────────────

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct GpuFramebuffer {
    desc: FramebufferDesc,
    colors: Vec<GpuTexture>,
    depth: Option<GpuTexture>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    color_format: wgpu::TextureFormat,
    color_count: u32,
    depth: bool,
}

struct GpuShader {
    source: ShaderSource,
    module: wgpu::ShaderModule,
    texture_layout: wgpu::BindGroupLayout,
    uniform_layout: Option<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    uniform_offsets: HashMap<String, (UniformKind, usize)>,
    uniform_data: Vec<[f32; 4]>,
}

struct GpuMesh {
    frames: Vec<wgpu::Buffer>,
    indices: wgpu::Buffer,
    index_count: u32,
}

struct Frame {
    surface_texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

enum DrawCall<'a> {
    Fullscreen,
    Mesh(&'a GpuMesh, MorphFrame),
    Particles(&'a GpuMesh, wgpu::Buffer, u32),
}

// ── WgpuBackend ──────────────────────────────────────────────────────────────

/// [`RenderBackend`] on wgpu. Each draw records its own render pass that
/// loads the target, so draw order across targets is preserved within the
/// frame's single command encoder.
pub struct WgpuBackend {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    frame: Option<Frame>,
    next_id: u32,
    framebuffers: HashMap<FramebufferHandle, GpuFramebuffer>,
    shaders: HashMap<ShaderHandle, GpuShader>,
    textures: HashMap<TextureHandle, GpuTexture>,
    luts: HashMap<LutHandle, GpuTexture>,
    cubemaps: HashMap<CubemapHandle, GpuTexture>,
    meshes: HashMap<MeshHandle, GpuMesh>,
    fallback_texture: GpuTexture,
    fallback_lut: GpuTexture,
    fallback_cube: GpuTexture,
    fallback_depth: GpuTexture,
    linear_sampler: wgpu::Sampler,
    depth_sampler: wgpu::Sampler,
    bound_framebuffer: Option<FramebufferHandle>,
    bound_shader: Option<ShaderHandle>,
    bound_textures: BTreeMap<u32, TextureBinding>,
}

impl WgpuBackend {
    pub async fn new(window: Arc<Window>) -> Result<Self, RenderError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(Arc::clone(&window))
            .map_err(|e| RenderError::Surface(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                compatible_surface: Some(&surface),
                ..Default::default()
            })
            .await
            .map_err(|_| RenderError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .map_err(|e| RenderError::Device(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| RenderError::Surface("surface reports no formats".to_string()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!("wgpu surface {}x{} ({format:?})", config.width, config.height);

        let fallback_texture = upload_2d(&device, &queue, &TextureData::solid([255; 4]), "fallback_white");
        let fallback_lut = upload_3d(&device, &queue, &LutData::preset(LutPreset::Identity, 2), "fallback_lut");
        let fallback_cube = upload_cube(
            &device,
            &queue,
            &CubemapData::sky_gradient(1, [128, 128, 128, 255], [128, 128, 128, 255], [128, 128, 128, 255]),
            "fallback_cube",
        );
        let fallback_depth = create_target(&device, 1, 1, DEPTH_FORMAT, "fallback_depth");

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });
        let depth_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            frame: None,
            next_id: 1,
            framebuffers: HashMap::new(),
            shaders: HashMap::new(),
            textures: HashMap::new(),
            luts: HashMap::new(),
            cubemaps: HashMap::new(),
            meshes: HashMap::new(),
            fallback_texture,
            fallback_lut,
            fallback_cube,
            fallback_depth,
            linear_sampler,
            depth_sampler,
            bound_framebuffer: None,
            bound_shader: None,
            bound_textures: BTreeMap::new(),
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    fn alloc(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn build_framebuffer(&self, desc: &FramebufferDesc) -> GpuFramebuffer {
        let colors = (0..desc.color_attachments)
            .map(|i| create_target(&self.device, desc.width, desc.height, OFFSCREEN_FORMAT, &format!("fb_color_{i}")))
            .collect();
        let depth = desc
            .depth
            .then(|| create_target(&self.device, desc.width, desc.height, DEPTH_FORMAT, "fb_depth"));
        GpuFramebuffer { desc: *desc, colors, depth }
    }

    fn target_key(&self) -> PipelineKey {
        match self.bound_framebuffer.and_then(|fb| self.framebuffers.get(&fb)) {
            Some(fb) => PipelineKey {
                color_format: OFFSCREEN_FORMAT,
                color_count: fb.desc.color_attachments.max(1),
                depth: fb.depth.is_some(),
            },
            None => PipelineKey { color_format: self.config.format, color_count: 1, depth: false },
        }
    }

    fn resolve_view(&self, kind: TextureSlotKind, binding: Option<&TextureBinding>) -> &wgpu::TextureView {
        let view = match (kind, binding) {
            (TextureSlotKind::Color2D, Some(TextureBinding::Color { framebuffer, attachment })) => self
                .framebuffers
                .get(framebuffer)
                .and_then(|fb| fb.colors.get(*attachment as usize))
                .map(|t| &t.view),
            (TextureSlotKind::Color2D, Some(TextureBinding::Texture(Some(t)))) => {
                self.textures.get(t).map(|t| &t.view)
            }
            (TextureSlotKind::Depth2D, Some(TextureBinding::Depth { framebuffer })) => self
                .framebuffers
                .get(framebuffer)
                .and_then(|fb| fb.depth.as_ref())
                .map(|t| &t.view),
            (TextureSlotKind::Lut3D, Some(TextureBinding::Lut(Some(l)))) => self.luts.get(l).map(|t| &t.view),
            (TextureSlotKind::Cube, Some(TextureBinding::Cubemap(Some(c)))) => {
                self.cubemaps.get(c).map(|t| &t.view)
            }
            _ => None,
        };
        view.unwrap_or(match kind {
            TextureSlotKind::Color2D => &self.fallback_texture.view,
            TextureSlotKind::Depth2D => &self.fallback_depth.view,
            TextureSlotKind::Lut3D => &self.fallback_lut.view,
            TextureSlotKind::Cube => &self.fallback_cube.view,
        })
    }

    fn ensure_pipeline(&mut self, shader: ShaderHandle, key: PipelineKey) {
        let Some(rec) = self.shaders.get_mut(&shader) else {
            return;
        };
        if rec.pipelines.contains_key(&key) {
            return;
        }
        let pipeline = create_pipeline(&self.device, rec, key);
        rec.pipelines.insert(key, pipeline);
    }

    fn draw(&mut self, call: DrawKindRequest<'_>) {
        if self.frame.is_none() {
            return;
        }
        let Some(shader) = self.bound_shader else {
            warn!("draw with no shader bound");
            return;
        };
        let key = self.target_key();
        self.ensure_pipeline(shader, key);

        let Some(rec) = self.shaders.get(&shader) else {
            return;
        };
        let Some(pipeline) = rec.pipelines.get(&key) else {
            return;
        };

        let call = match call {
            DrawKindRequest::Fullscreen => DrawCall::Fullscreen,
            DrawKindRequest::Mesh(mesh, morph) => match self.meshes.get(&mesh) {
                Some(m) => DrawCall::Mesh(m, morph),
                None => return,
            },
            DrawKindRequest::Particles(mesh, instances) => match self.meshes.get(&mesh) {
                Some(m) => {
                    let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("particle_instances"),
                        contents: bytemuck::cast_slice(instances),
                        usage: wgpu::BufferUsages::VERTEX,
                    });
                    DrawCall::Particles(m, buffer, instances.len() as u32)
                }
                None => return,
            },
        };

        let texture_entries: Vec<wgpu::BindGroupEntry<'_>> = rec
            .source
            .textures
            .iter()
            .enumerate()
            .flat_map(|(i, &kind)| {
                let view = self.resolve_view(kind, self.bound_textures.get(&(i as u32)));
                let sampler = if kind == TextureSlotKind::Depth2D { &self.depth_sampler } else { &self.linear_sampler };
                [
                    wgpu::BindGroupEntry { binding: 2 * i as u32, resource: wgpu::BindingResource::TextureView(view) },
                    wgpu::BindGroupEntry { binding: 2 * i as u32 + 1, resource: wgpu::BindingResource::Sampler(sampler) },
                ]
            })
            .collect();
        let texture_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("textures_bg"),
            layout: &rec.texture_layout,
            entries: &texture_entries,
        });

        let uniform_group = rec.uniform_layout.as_ref().map(|layout| {
            let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("uniforms"),
                contents: bytemuck::cast_slice(&rec.uniform_data),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("uniforms_bg"),
                layout,
                entries: &[wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() }],
            })
        });

        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        let target = self.bound_framebuffer.and_then(|fb| self.framebuffers.get(&fb));
        let color_views: Vec<&wgpu::TextureView> = match target {
            Some(fb) => fb.colors.iter().map(|c| &c.view).collect(),
            None => vec![&frame.view],
        };
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = color_views
            .iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
                })
            })
            .collect();
        let depth_attachment = target.and_then(|fb| fb.depth.as_ref()).map(|d| wgpu::RenderPassDepthStencilAttachment {
            view: &d.view,
            depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store }),
            stencil_ops: None,
        });

        let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(rec.source.label.as_str()),
            color_attachments: &color_attachments,
            depth_stencil_attachment: depth_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &texture_group, &[]);
        if let Some(group) = &uniform_group {
            pass.set_bind_group(1, group, &[]);
        }

        match call {
            DrawCall::Fullscreen => pass.draw(0..6, 0..1),
            DrawCall::Mesh(mesh, morph) => {
                let last = mesh.frames.len().saturating_sub(1);
                let a = &mesh.frames[(morph.frame as usize).min(last)];
                let b = &mesh.frames[(morph.next as usize).min(last)];
                pass.set_vertex_buffer(0, a.slice(..));
                pass.set_vertex_buffer(1, b.slice(..));
                pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
            DrawCall::Particles(mesh, instances, count) => {
                pass.set_vertex_buffer(0, mesh.frames[0].slice(..));
                pass.set_vertex_buffer(1, instances.slice(..));
                pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, 0..count);
            }
        }
    }
}

enum DrawKindRequest<'a> {
    Fullscreen,
    Mesh(MeshHandle, MorphFrame),
    Particles(MeshHandle, &'a [ParticleInstance]),
}

impl RenderBackend for WgpuBackend {
    fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = self.window.inner_size();
                self.resize_surface(size.width, size.height);
                self.surface
                    .get_current_texture()
                    .map_err(|e| RenderError::Surface(e.to_string()))?
            }
            Err(e) => return Err(RenderError::Surface(e.to_string())),
        };
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("frame") });
        self.frame = Some(Frame { surface_texture, view, encoder });
        Ok(())
    }

    fn end_frame(&mut self) {
        let Some(frame) = self.frame.take() else {
            return;
        };
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        frame.surface_texture.present();
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferHandle, RenderError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RenderError::InvalidFramebufferSize { width: desc.width, height: desc.height });
        }
        let fb = self.build_framebuffer(desc);
        let handle = FramebufferHandle(self.alloc());
        self.framebuffers.insert(handle, fb);
        Ok(handle)
    }

    fn resize_framebuffer(&mut self, fb: FramebufferHandle, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidFramebufferSize { width, height });
        }
        let Some(desc) = self.framebuffers.get(&fb).map(|f| f.desc) else {
            return Ok(());
        };
        let rebuilt = self.build_framebuffer(&FramebufferDesc { width, height, ..desc });
        self.framebuffers.insert(fb, rebuilt);
        Ok(())
    }

    fn destroy_framebuffer(&mut self, fb: FramebufferHandle) {
        if self.bound_framebuffer == Some(fb) {
            self.bound_framebuffer = None;
        }
        self.framebuffers.remove(&fb);
    }

    fn clear_framebuffer(&mut self, fb: Option<FramebufferHandle>, color: Vec4) {
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        let clear = wgpu::Color {
            r: color.x as f64,
            g: color.y as f64,
            b: color.z as f64,
            a: color.w as f64,
        };
        let target = fb.and_then(|fb| self.framebuffers.get(&fb));
        let color_views: Vec<&wgpu::TextureView> = match target {
            Some(t) => t.colors.iter().map(|c| &c.view).collect(),
            None => vec![&frame.view],
        };
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = color_views
            .iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Clear(clear), store: wgpu::StoreOp::Store },
                })
            })
            .collect();
        let depth_attachment = target.and_then(|t| t.depth.as_ref()).map(|d| wgpu::RenderPassDepthStencilAttachment {
            view: &d.view,
            depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Clear(1.0), store: wgpu::StoreOp::Store }),
            stencil_ops: None,
        });
        let _pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: depth_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }

    fn bind_framebuffer(&mut self, fb: Option<FramebufferHandle>) {
        self.bound_framebuffer = fb.filter(|h| self.framebuffers.contains_key(h));
    }

    fn compile_shader(&mut self, source: &ShaderSource) -> Result<ShaderHandle, RenderError> {
        if !source.wgsl.contains("fn vs_main") || !source.wgsl.contains("fn fs_main") {
            return Err(RenderError::ShaderCompile {
                label: source.label.clone(),
                message: "missing vs_main or fs_main entry point".to_string(),
            });
        }

        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(source.label.as_str()),
            source: wgpu::ShaderSource::Wgsl(source.wgsl.as_str().into()),
        });

        let texture_entries: Vec<wgpu::BindGroupLayoutEntry> = source
            .textures
            .iter()
            .enumerate()
            .flat_map(|(i, &kind)| {
                let (sample_type, view_dimension, sampler) = match kind {
                    TextureSlotKind::Color2D => (
                        wgpu::TextureSampleType::Float { filterable: true },
                        wgpu::TextureViewDimension::D2,
                        wgpu::SamplerBindingType::Filtering,
                    ),
                    TextureSlotKind::Depth2D => (
                        wgpu::TextureSampleType::Depth,
                        wgpu::TextureViewDimension::D2,
                        wgpu::SamplerBindingType::NonFiltering,
                    ),
                    TextureSlotKind::Lut3D => (
                        wgpu::TextureSampleType::Float { filterable: true },
                        wgpu::TextureViewDimension::D3,
                        wgpu::SamplerBindingType::Filtering,
                    ),
                    TextureSlotKind::Cube => (
                        wgpu::TextureSampleType::Float { filterable: true },
                        wgpu::TextureViewDimension::Cube,
                        wgpu::SamplerBindingType::Filtering,
                    ),
                };
                [
                    wgpu::BindGroupLayoutEntry {
                        binding: 2 * i as u32,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture { sample_type, view_dimension, multisampled: false },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2 * i as u32 + 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(sampler),
                        count: None,
                    },
                ]
            })
            .collect();
        let texture_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(format!("{}_textures_bgl", source.label).as_str()),
            entries: &texture_entries,
        });

        let uniform_layout = (!source.uniforms.is_empty()).then(|| {
            self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(format!("{}_uniforms_bgl", source.label).as_str()),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            })
        });

        let mut layouts = vec![&texture_layout];
        if let Some(u) = &uniform_layout {
            layouts.push(u);
        }
        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(format!("{}_layout", source.label).as_str()),
            bind_group_layouts: &layouts,
            ..Default::default()
        });

        let uniform_offsets = source
            .uniform_layout()
            .into_iter()
            .map(|(name, kind, offset)| (name, (kind, offset)))
            .collect();

        let rec = GpuShader {
            source: source.clone(),
            module,
            texture_layout,
            uniform_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
            uniform_offsets,
            uniform_data: vec![[0.0; 4]; source.uniform_slot_count().max(1)],
        };
        let handle = ShaderHandle(self.alloc());
        self.shaders.insert(handle, rec);
        debug!("compiled shader '{}' as {handle:?}", source.label);
        Ok(handle)
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) {
        if self.bound_shader == Some(shader) {
            self.bound_shader = None;
        }
        self.shaders.remove(&shader);
    }

    fn bind_shader(&mut self, shader: Option<ShaderHandle>) {
        self.bound_shader = shader.filter(|h| self.shaders.contains_key(h));
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) -> bool {
        let Some(rec) = self.bound_shader.and_then(|s| self.shaders.get_mut(&s)) else {
            return false;
        };
        match rec.uniform_offsets.get(name) {
            Some(&(kind, offset)) if kind == value.kind() => {
                value.write_slots(&mut rec.uniform_data[offset..offset + kind.slots()]);
                true
            }
            _ => false,
        }
    }

    fn bind_texture(&mut self, slot: u32, binding: TextureBinding) {
        self.bound_textures.insert(slot, binding);
    }

    fn unbind_texture(&mut self, slot: u32) {
        self.bound_textures.remove(&slot);
    }

    fn draw_fullscreen_quad(&mut self) {
        self.draw(DrawKindRequest::Fullscreen);
    }

    fn draw_mesh(&mut self, mesh: MeshHandle, morph: MorphFrame) {
        self.draw(DrawKindRequest::Mesh(mesh, morph));
    }

    fn draw_particles(&mut self, mesh: MeshHandle, instances: &[ParticleInstance]) {
        if instances.is_empty() {
            return;
        }
        self.draw(DrawKindRequest::Particles(mesh, instances));
    }

    fn upload_mesh(&mut self, mesh: &MeshData) -> MeshHandle {
        let frames = mesh
            .frames
            .iter()
            .enumerate()
            .map(|(i, verts)| {
                self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(format!("mesh_frame_{i}").as_str()),
                    contents: bytemuck::cast_slice(verts),
                    usage: wgpu::BufferUsages::VERTEX,
                })
            })
            .collect();
        let indices = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_indices"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let handle = MeshHandle(self.alloc());
        self.meshes.insert(handle, GpuMesh { frames, indices, index_count: mesh.indices.len() as u32 });
        handle
    }

    fn upload_texture(&mut self, texture: &TextureData) -> TextureHandle {
        let gpu = upload_2d(&self.device, &self.queue, texture, "texture_2d");
        let handle = TextureHandle(self.alloc());
        self.textures.insert(handle, gpu);
        handle
    }

    fn upload_lut(&mut self, lut: &LutData) -> LutHandle {
        let gpu = upload_3d(&self.device, &self.queue, lut, "lut");
        let handle = LutHandle(self.alloc());
        self.luts.insert(handle, gpu);
        handle
    }

    fn upload_cubemap(&mut self, cubemap: &CubemapData) -> CubemapHandle {
        let gpu = upload_cube(&self.device, &self.queue, cubemap, "cubemap");
        let handle = CubemapHandle(self.alloc());
        self.cubemaps.insert(handle, gpu);
        handle
    }

    fn destroy_mesh(&mut self, mesh: MeshHandle) {
        self.meshes.remove(&mesh);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
    }

    fn destroy_lut(&mut self, lut: LutHandle) {
        self.luts.remove(&lut);
    }

    fn destroy_cubemap(&mut self, cubemap: CubemapHandle) {
        self.cubemaps.remove(&cubemap);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn create_target(device: &wgpu::Device, width: u32, height: u32, format: wgpu::TextureFormat, label: &str) -> GpuTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture { _texture: texture, view }
}

fn upload_2d(device: &wgpu::Device, queue: &wgpu::Queue, data: &TextureData, label: &str) -> GpuTexture {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d { width: data.width, height: data.height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &data.pixels,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture { _texture: texture, view }
}

fn upload_3d(device: &wgpu::Device, queue: &wgpu::Queue, data: &LutData, label: &str) -> GpuTexture {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d { width: data.size, height: data.size, depth_or_array_layers: data.size },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &data.texels,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture { _texture: texture, view }
}

fn upload_cube(device: &wgpu::Device, queue: &wgpu::Queue, data: &CubemapData, label: &str) -> GpuTexture {
    let bytes: Vec<u8> = data.faces.iter().flatten().copied().collect();
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d { width: data.size, height: data.size, depth_or_array_layers: 6 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &bytes,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        dimension: Some(wgpu::TextureViewDimension::Cube),
        ..Default::default()
    });
    GpuTexture { _texture: texture, view }
}

const VERTEX_ATTRIBS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
    0 => Float32x3,  // position
    1 => Float32x3,  // normal
    2 => Float32x2,  // uv
];

const NEXT_VERTEX_ATTRIBS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
    3 => Float32x3,
    4 => Float32x3,
    5 => Float32x2,
];

const INSTANCE_ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
    3 => Float32x4,  // position_size
    4 => Float32x4,  // color
];

fn create_pipeline(device: &wgpu::Device, rec: &GpuShader, key: PipelineKey) -> wgpu::RenderPipeline {
    let vertex_layout = |attributes: &'static [wgpu::VertexAttribute]| wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    };
    let buffers: Vec<wgpu::VertexBufferLayout<'static>> = match rec.source.stage {
        ShaderStage::FullscreenQuad => vec![],
        ShaderStage::Mesh => vec![vertex_layout(&VERTEX_ATTRIBS), vertex_layout(&NEXT_VERTEX_ATTRIBS)],
        ShaderStage::Particles => vec![
            vertex_layout(&VERTEX_ATTRIBS),
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<ParticleInstance>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &INSTANCE_ATTRIBS,
            },
        ],
    };

    let blend = match rec.source.blend {
        BlendMode::Opaque => None,
        BlendMode::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
        BlendMode::Additive => Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent::OVER,
        }),
    };
    let targets: Vec<Option<wgpu::ColorTargetState>> = (0..key.color_count)
        .map(|_| {
            Some(wgpu::ColorTargetState {
                format: key.color_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();

    let depth_stencil = key.depth.then(|| wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: rec.source.stage == ShaderStage::Mesh && rec.source.blend == BlendMode::Opaque,
        depth_compare: match rec.source.stage {
            ShaderStage::FullscreenQuad => wgpu::CompareFunction::Always,
            _ => wgpu::CompareFunction::LessEqual,
        },
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(rec.source.label.as_str()),
        layout: Some(&rec.pipeline_layout),
        vertex: wgpu::VertexState {
            module: &rec.module,
            entry_point: Some("vs_main"),
            buffers: &buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &rec.module,
            entry_point: Some("fs_main"),
            targets: &targets,
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

impl Drop for WgpuBackend {
    fn drop(&mut self) {
        if self.frame.is_some() {
            error!("WgpuBackend dropped mid-frame; the frame is discarded");
        }
    }
}
