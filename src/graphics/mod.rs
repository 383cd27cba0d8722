//! Rendering: the backend seam, GPU resources, post-effects and materials.

pub mod backend;
pub mod color_correct;
pub mod framebuffer;
pub mod gpu;
pub mod headless;
pub mod material;
pub mod mesh;
pub mod post_effect;
pub mod shader;
pub mod shaders;
pub mod texture;

pub use backend::{
    BlendMode, CubemapHandle, FramebufferHandle, LutHandle, MeshHandle, MorphFrame, ParticleInstance,
    RenderBackend, ShaderHandle, ShaderSource, TextureBinding, TextureHandle, UniformValue,
};
pub use color_correct::ColorCorrect;
pub use framebuffer::Framebuffer;
pub use gpu::WgpuBackend;
pub use headless::HeadlessBackend;
pub use material::{Material, ShadingMode, SharedMaterial};
pub use mesh::MeshData;
pub use post_effect::{BasePostEffect, Pass, PassChain, PostEffect, PostEffectChain};
pub use shader::Shader;
pub use texture::{CubemapData, LutData, LutPreset, TextureData};
