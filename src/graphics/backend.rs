use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::error::RenderError;
use crate::graphics::mesh::MeshData;
use crate::graphics::texture::{CubemapData, LutData, TextureData};

// ── Handles ──────────────────────────────────────────────────────────────────

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// Offscreen render target owned by the backend.
    FramebufferHandle
);
handle!(ShaderHandle);
handle!(TextureHandle);
handle!(LutHandle);
handle!(CubemapHandle);
handle!(MeshHandle);

// ── Shader description ───────────────────────────────────────────────────────

/// Which vertex input a shader program consumes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// No vertex buffers; six vertices cover the target.
    FullscreenQuad,
    /// Morph-blended mesh: the current and next frame as two vertex streams.
    Mesh,
    /// Instanced billboard quads built from a mesh plus per-instance data.
    Particles,
}

/// Kind of texture a shader samples at a given slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlotKind {
    Color2D,
    Depth2D,
    Lut3D,
    Cube,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Int,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

impl UniformKind {
    /// Number of 16-byte slots the value occupies in the uniform block.
    pub fn slots(self) -> usize {
        match self {
            UniformKind::Mat3 => 3,
            UniformKind::Mat4 => 4,
            _ => 1,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Bool(_) => UniformKind::Bool,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat3(_) => UniformKind::Mat3,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    /// Pack into 16-byte slots. Scalars land in `.x`; matrices are column-major.
    pub fn write_slots(&self, out: &mut [[f32; 4]]) {
        match *self {
            UniformValue::Float(v) => out[0] = [v, 0.0, 0.0, 0.0],
            UniformValue::Int(v) => out[0] = [v as f32, 0.0, 0.0, 0.0],
            UniformValue::Bool(v) => out[0] = [if v { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
            UniformValue::Vec2(v) => out[0] = [v.x, v.y, 0.0, 0.0],
            UniformValue::Vec3(v) => out[0] = v.extend(0.0).to_array(),
            UniformValue::Vec4(v) => out[0] = v.to_array(),
            UniformValue::Mat3(m) => {
                for (i, col) in m.to_cols_array_2d().iter().enumerate() {
                    out[i] = [col[0], col[1], col[2], 0.0];
                }
            }
            UniformValue::Mat4(m) => {
                for (i, col) in m.to_cols_array_2d().iter().enumerate() {
                    out[i] = *col;
                }
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    #[default]
    Opaque,
    Alpha,
    Additive,
}

/// Everything a backend needs to build a program.
///
/// `wgsl` is a complete module with `vs_main` and `fs_main`. Textures bind in
/// group 0 (slot `i` at bindings `2i` and `2i + 1`); uniforms are a single
/// block in group 1 laid out in the order of `uniforms`, one 16-byte slot per
/// scalar or vector and one per matrix column.
#[derive(Clone, Debug)]
pub struct ShaderSource {
    pub label: String,
    pub wgsl: String,
    pub stage: ShaderStage,
    pub textures: Vec<TextureSlotKind>,
    pub uniforms: Vec<(String, UniformKind)>,
    pub blend: BlendMode,
}

impl ShaderSource {
    pub fn new(label: impl Into<String>, stage: ShaderStage, wgsl: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            wgsl: wgsl.into(),
            stage,
            textures: Vec::new(),
            uniforms: Vec::new(),
            blend: BlendMode::Opaque,
        }
    }

    pub fn texture(mut self, kind: TextureSlotKind) -> Self {
        self.textures.push(kind);
        self
    }

    pub fn uniform(mut self, name: &str, kind: UniformKind) -> Self {
        self.uniforms.push((name.to_string(), kind));
        self
    }

    pub fn blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    /// Offset in 16-byte slots of every uniform, in declaration order.
    pub fn uniform_layout(&self) -> Vec<(String, UniformKind, usize)> {
        let mut offset = 0;
        self.uniforms
            .iter()
            .map(|(name, kind)| {
                let entry = (name.clone(), *kind, offset);
                offset += kind.slots();
                entry
            })
            .collect()
    }

    pub fn uniform_slot_count(&self) -> usize {
        self.uniforms.iter().map(|(_, k)| k.slots()).sum()
    }
}

// ── Draw inputs ──────────────────────────────────────────────────────────────

/// What a texture slot samples from.
///
/// `None` on the asset variants selects the backend's fallback: opaque white
/// for 2D textures, the identity table for LUTs, a neutral grey cubemap.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureBinding {
    Color { framebuffer: FramebufferHandle, attachment: u32 },
    Depth { framebuffer: FramebufferHandle },
    Texture(Option<TextureHandle>),
    Lut(Option<LutHandle>),
    Cubemap(Option<CubemapHandle>),
}

impl TextureBinding {
    pub fn framebuffer(&self) -> Option<FramebufferHandle> {
        match *self {
            TextureBinding::Color { framebuffer, .. } | TextureBinding::Depth { framebuffer } => {
                Some(framebuffer)
            }
            _ => None,
        }
    }
}

/// Morph blend between two frames of a mesh.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct MorphFrame {
    pub frame: u32,
    pub next: u32,
    pub blend: f32,
}

/// Per-instance data for one particle billboard.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParticleInstance {
    /// xyz = world position, w = size.
    pub position_size: [f32; 4],
    pub color: [f32; 4],
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FramebufferDesc {
    pub width: u32,
    pub height: u32,
    pub color_attachments: u32,
    pub depth: bool,
}

// ── RenderBackend ────────────────────────────────────────────────────────────

/// Stateful GPU command surface.
///
/// Binding follows the usual bind, draw, unbind discipline: a bound
/// framebuffer receives draws (`None` is the window surface), a bound shader
/// receives `set_uniform` calls and draws, bound texture slots are sampled.
pub trait RenderBackend {
    fn surface_size(&self) -> (u32, u32);
    fn resize_surface(&mut self, width: u32, height: u32);

    /// Acquire the frame. Draw calls outside `begin_frame`/`end_frame` are dropped.
    fn begin_frame(&mut self) -> Result<(), RenderError>;
    fn end_frame(&mut self);

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferHandle, RenderError>;
    fn resize_framebuffer(&mut self, fb: FramebufferHandle, width: u32, height: u32) -> Result<(), RenderError>;
    fn destroy_framebuffer(&mut self, fb: FramebufferHandle);
    fn clear_framebuffer(&mut self, fb: Option<FramebufferHandle>, color: Vec4);
    fn bind_framebuffer(&mut self, fb: Option<FramebufferHandle>);

    fn compile_shader(&mut self, source: &ShaderSource) -> Result<ShaderHandle, RenderError>;
    fn destroy_shader(&mut self, shader: ShaderHandle);
    fn bind_shader(&mut self, shader: Option<ShaderHandle>);
    /// Set a uniform on the bound shader. Returns `false` when no shader is
    /// bound or the shader declares no uniform of that name and kind.
    fn set_uniform(&mut self, name: &str, value: UniformValue) -> bool;

    fn bind_texture(&mut self, slot: u32, binding: TextureBinding);
    fn unbind_texture(&mut self, slot: u32);

    fn draw_fullscreen_quad(&mut self);
    fn draw_mesh(&mut self, mesh: MeshHandle, morph: MorphFrame);
    fn draw_particles(&mut self, mesh: MeshHandle, instances: &[ParticleInstance]);

    fn upload_mesh(&mut self, mesh: &MeshData) -> MeshHandle;
    fn upload_texture(&mut self, texture: &TextureData) -> TextureHandle;
    fn upload_lut(&mut self, lut: &LutData) -> LutHandle;
    fn upload_cubemap(&mut self, cubemap: &CubemapData) -> CubemapHandle;

    fn destroy_mesh(&mut self, mesh: MeshHandle);
    fn destroy_texture(&mut self, texture: TextureHandle);
    fn destroy_lut(&mut self, lut: LutHandle);
    fn destroy_cubemap(&mut self, cubemap: CubemapHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layout_packs_matrices_as_columns() {
        let source = ShaderSource::new("lit", ShaderStage::Mesh, "")
            .uniform("u_model", UniformKind::Mat4)
            .uniform("u_shininess", UniformKind::Float)
            .uniform("u_normal", UniformKind::Mat3)
            .uniform("u_tint", UniformKind::Vec4);
        let layout = source.uniform_layout();
        let offsets: Vec<usize> = layout.iter().map(|(_, _, o)| *o).collect();
        assert_eq!(offsets, vec![0, 4, 5, 8]);
        assert_eq!(source.uniform_slot_count(), 9);
    }

    #[test]
    fn mat4_writes_column_major() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let mut slots = [[0.0; 4]; 4];
        UniformValue::Mat4(m).write_slots(&mut slots);
        assert_eq!(slots[3], [1.0, 2.0, 3.0, 1.0]);
    }
}
