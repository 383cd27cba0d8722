use std::collections::{BTreeMap, HashMap, HashSet};

use glam::Vec4;
use log::debug;

use crate::error::RenderError;
use crate::graphics::backend::{
    CubemapHandle, FramebufferDesc, FramebufferHandle, LutHandle, MeshHandle, MorphFrame,
    ParticleInstance, RenderBackend, ShaderHandle, ShaderSource, TextureBinding, TextureHandle,
    UniformValue,
};
use crate::graphics::mesh::MeshData;
use crate::graphics::texture::{CubemapData, LutData, TextureData};

/// What a recorded draw consumed.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawKind {
    FullscreenQuad,
    Mesh { mesh: MeshHandle, morph: MorphFrame },
    Particles { mesh: MeshHandle, count: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Clear {
        target: Option<FramebufferHandle>,
    },
    Draw {
        /// `None` is the window surface.
        target: Option<FramebufferHandle>,
        target_size: (u32, u32),
        shader: ShaderHandle,
        shader_label: String,
        kind: DrawKind,
        textures: Vec<(u32, TextureBinding)>,
    },
}

struct ShaderRecord {
    source: ShaderSource,
    uniforms: HashMap<String, UniformValue>,
}

/// Backend that keeps GPU state in plain maps and records every command.
///
/// Used by tests and by the engine when no adapter is available. Misuse of
/// the bind/unbind discipline is collected in [`HeadlessBackend::violations`]
/// instead of panicking, so a test can assert the whole frame was clean.
pub struct HeadlessBackend {
    surface: (u32, u32),
    next_id: u32,
    framebuffers: HashMap<FramebufferHandle, FramebufferDesc>,
    shaders: HashMap<ShaderHandle, ShaderRecord>,
    textures: HashSet<TextureHandle>,
    luts: HashSet<LutHandle>,
    cubemaps: HashSet<CubemapHandle>,
    meshes: HashMap<MeshHandle, usize>,
    bound_framebuffer: Option<FramebufferHandle>,
    bound_shader: Option<ShaderHandle>,
    bound_textures: BTreeMap<u32, TextureBinding>,
    in_frame: bool,
    frames: u64,
    commands: Vec<Command>,
    violations: Vec<String>,
    failing_shaders: HashSet<String>,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: (width, height),
            next_id: 1,
            framebuffers: HashMap::new(),
            shaders: HashMap::new(),
            textures: HashSet::new(),
            luts: HashSet::new(),
            cubemaps: HashSet::new(),
            meshes: HashMap::new(),
            bound_framebuffer: None,
            bound_shader: None,
            bound_textures: BTreeMap::new(),
            in_frame: false,
            frames: 0,
            commands: Vec::new(),
            violations: Vec::new(),
            failing_shaders: HashSet::new(),
        }
    }

    /// Make every later compile of `label` fail, to exercise startup errors.
    pub fn fail_shader_compile(&mut self, label: &str) {
        self.failing_shaders.insert(label.to_string());
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn draws(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter().filter(|c| matches!(c, Command::Draw { .. }))
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn frames_completed(&self) -> u64 {
        self.frames
    }

    pub fn framebuffer_size(&self, fb: FramebufferHandle) -> Option<(u32, u32)> {
        self.framebuffers.get(&fb).map(|d| (d.width, d.height))
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    /// Every GPU object currently alive, of any kind.
    pub fn live_handles(&self) -> usize {
        self.framebuffers.len()
            + self.shaders.len()
            + self.textures.len()
            + self.luts.len()
            + self.cubemaps.len()
            + self.meshes.len()
    }

    pub fn is_shader_live(&self, shader: ShaderHandle) -> bool {
        self.shaders.contains_key(&shader)
    }

    pub fn bound_shader(&self) -> Option<ShaderHandle> {
        self.bound_shader
    }

    pub fn bound_framebuffer(&self) -> Option<FramebufferHandle> {
        self.bound_framebuffer
    }

    pub fn bound_textures(&self) -> impl Iterator<Item = (u32, TextureBinding)> + '_ {
        self.bound_textures.iter().map(|(&s, &b)| (s, b))
    }

    /// Last value written to `name` on `shader`.
    pub fn uniform(&self, shader: ShaderHandle, name: &str) -> Option<UniformValue> {
        self.shaders.get(&shader)?.uniforms.get(name).copied()
    }

    pub fn shader_label(&self, shader: ShaderHandle) -> Option<&str> {
        self.shaders.get(&shader).map(|s| s.source.label.as_str())
    }

    fn alloc(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn violation(&mut self, message: String) {
        debug!("render discipline violation: {message}");
        self.violations.push(message);
    }

    fn binding_is_live(&self, binding: &TextureBinding) -> bool {
        match *binding {
            TextureBinding::Color { framebuffer, attachment } => self
                .framebuffers
                .get(&framebuffer)
                .is_some_and(|d| attachment < d.color_attachments),
            TextureBinding::Depth { framebuffer } => {
                self.framebuffers.get(&framebuffer).is_some_and(|d| d.depth)
            }
            TextureBinding::Texture(t) => t.is_none_or(|t| self.textures.contains(&t)),
            TextureBinding::Lut(l) => l.is_none_or(|l| self.luts.contains(&l)),
            TextureBinding::Cubemap(c) => c.is_none_or(|c| self.cubemaps.contains(&c)),
        }
    }

    fn record_draw(&mut self, kind: DrawKind) {
        let Some(shader) = self.bound_shader else {
            self.violation(format!("draw {kind:?} with no shader bound"));
            return;
        };
        let target = self.bound_framebuffer;
        let target_size = match target {
            Some(fb) => self.framebuffer_size(fb).unwrap_or((0, 0)),
            None => self.surface,
        };

        let (declared, label) = match self.shaders.get(&shader) {
            Some(rec) => (rec.source.textures.len() as u32, rec.source.label.clone()),
            None => (0, String::new()),
        };
        let textures: Vec<(u32, TextureBinding)> = self.bound_textures().collect();

        for &(slot, binding) in &textures {
            if slot >= declared {
                self.violation(format!(
                    "'{label}' drawn with leaked binding {binding:?} at slot {slot}"
                ));
            }
            if target.is_some() && binding.framebuffer() == target {
                self.violation(format!("'{label}' samples its own render target"));
            }
        }

        self.commands.push(Command::Draw {
            target,
            target_size,
            shader,
            shader_label: label,
            kind,
            textures,
        });
    }
}

impl RenderBackend for HeadlessBackend {
    fn surface_size(&self) -> (u32, u32) {
        self.surface
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.surface = (width, height);
    }

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        if self.in_frame {
            self.violation("begin_frame called twice".to_string());
        }
        self.in_frame = true;
        Ok(())
    }

    fn end_frame(&mut self) {
        if !self.in_frame {
            self.violation("end_frame without begin_frame".to_string());
        }
        if let Some(shader) = self.bound_shader {
            self.violation(format!("shader {shader:?} still bound at end of frame"));
        }
        if let Some(fb) = self.bound_framebuffer {
            self.violation(format!("framebuffer {fb:?} still bound at end of frame"));
        }
        let leaked: Vec<u32> = self.bound_textures.keys().copied().collect();
        for slot in leaked {
            self.violation(format!("texture slot {slot} still bound at end of frame"));
        }
        self.in_frame = false;
        self.frames += 1;
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferHandle, RenderError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RenderError::InvalidFramebufferSize {
                width: desc.width,
                height: desc.height,
            });
        }
        let fb = FramebufferHandle(self.alloc());
        self.framebuffers.insert(fb, *desc);
        Ok(fb)
    }

    fn resize_framebuffer(&mut self, fb: FramebufferHandle, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidFramebufferSize { width, height });
        }
        match self.framebuffers.get_mut(&fb) {
            Some(desc) => {
                desc.width = width;
                desc.height = height;
            }
            None => self.violation(format!("resize of unknown framebuffer {fb:?}")),
        }
        Ok(())
    }

    fn destroy_framebuffer(&mut self, fb: FramebufferHandle) {
        if self.bound_framebuffer == Some(fb) {
            self.violation(format!("destroyed framebuffer {fb:?} while bound"));
            self.bound_framebuffer = None;
        }
        if self.framebuffers.remove(&fb).is_none() {
            self.violation(format!("double destroy of framebuffer {fb:?}"));
        }
    }

    fn clear_framebuffer(&mut self, fb: Option<FramebufferHandle>, _color: Vec4) {
        if let Some(fb) = fb {
            if !self.framebuffers.contains_key(&fb) {
                self.violation(format!("clear of unknown framebuffer {fb:?}"));
                return;
            }
        }
        self.commands.push(Command::Clear { target: fb });
    }

    fn bind_framebuffer(&mut self, fb: Option<FramebufferHandle>) {
        if let Some(fb) = fb {
            if !self.framebuffers.contains_key(&fb) {
                self.violation(format!("bind of unknown framebuffer {fb:?}"));
                return;
            }
        }
        self.bound_framebuffer = fb;
    }

    fn compile_shader(&mut self, source: &ShaderSource) -> Result<ShaderHandle, RenderError> {
        if self.failing_shaders.contains(&source.label) {
            return Err(RenderError::ShaderCompile {
                label: source.label.clone(),
                message: "compilation forced to fail".to_string(),
            });
        }
        let shader = ShaderHandle(self.alloc());
        self.shaders.insert(
            shader,
            ShaderRecord { source: source.clone(), uniforms: HashMap::new() },
        );
        Ok(shader)
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) {
        if self.bound_shader == Some(shader) {
            self.violation(format!("destroyed shader {shader:?} while bound"));
            self.bound_shader = None;
        }
        if self.shaders.remove(&shader).is_none() {
            self.violation(format!("double destroy of shader {shader:?}"));
        }
    }

    fn bind_shader(&mut self, shader: Option<ShaderHandle>) {
        if let Some(s) = shader {
            if !self.shaders.contains_key(&s) {
                self.violation(format!("bind of unknown shader {s:?}"));
                return;
            }
        }
        self.bound_shader = shader;
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) -> bool {
        let Some(shader) = self.bound_shader else {
            return false;
        };
        let Some(rec) = self.shaders.get_mut(&shader) else {
            return false;
        };
        let declared = rec
            .source
            .uniforms
            .iter()
            .any(|(n, k)| n == name && *k == value.kind());
        if declared {
            rec.uniforms.insert(name.to_string(), value);
        }
        declared
    }

    fn bind_texture(&mut self, slot: u32, binding: TextureBinding) {
        if !self.binding_is_live(&binding) {
            self.violation(format!("bind of dead texture {binding:?} at slot {slot}"));
            return;
        }
        self.bound_textures.insert(slot, binding);
    }

    fn unbind_texture(&mut self, slot: u32) {
        self.bound_textures.remove(&slot);
    }

    fn draw_fullscreen_quad(&mut self) {
        self.record_draw(DrawKind::FullscreenQuad);
    }

    fn draw_mesh(&mut self, mesh: MeshHandle, morph: MorphFrame) {
        match self.meshes.get(&mesh) {
            Some(&frames) if (morph.frame as usize) < frames && (morph.next as usize) < frames => {}
            Some(_) => self.violation(format!("morph frame {morph:?} out of range for {mesh:?}")),
            None => self.violation(format!("draw of unknown mesh {mesh:?}")),
        }
        self.record_draw(DrawKind::Mesh { mesh, morph });
    }

    fn draw_particles(&mut self, mesh: MeshHandle, instances: &[ParticleInstance]) {
        if instances.is_empty() {
            return;
        }
        self.record_draw(DrawKind::Particles { mesh, count: instances.len() });
    }

    fn upload_mesh(&mut self, mesh: &MeshData) -> MeshHandle {
        let handle = MeshHandle(self.alloc());
        self.meshes.insert(handle, mesh.frame_count().max(1));
        handle
    }

    fn upload_texture(&mut self, _texture: &TextureData) -> TextureHandle {
        let handle = TextureHandle(self.alloc());
        self.textures.insert(handle);
        handle
    }

    fn upload_lut(&mut self, _lut: &LutData) -> LutHandle {
        let handle = LutHandle(self.alloc());
        self.luts.insert(handle);
        handle
    }

    fn upload_cubemap(&mut self, _cubemap: &CubemapData) -> CubemapHandle {
        let handle = CubemapHandle(self.alloc());
        self.cubemaps.insert(handle);
        handle
    }

    fn destroy_mesh(&mut self, mesh: MeshHandle) {
        if self.meshes.remove(&mesh).is_none() {
            self.violation(format!("double destroy of mesh {mesh:?}"));
        }
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if !self.textures.remove(&texture) {
            self.violation(format!("double destroy of texture {texture:?}"));
        }
    }

    fn destroy_lut(&mut self, lut: LutHandle) {
        if !self.luts.remove(&lut) {
            self.violation(format!("double destroy of lut {lut:?}"));
        }
    }

    fn destroy_cubemap(&mut self, cubemap: CubemapHandle) {
        if !self.cubemaps.remove(&cubemap) {
            self.violation(format!("double destroy of cubemap {cubemap:?}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::backend::{ShaderStage, TextureSlotKind, UniformKind};

    fn quad_shader(backend: &mut HeadlessBackend) -> ShaderHandle {
        let src = ShaderSource::new("quad", ShaderStage::FullscreenQuad, "")
            .texture(TextureSlotKind::Color2D)
            .uniform("u_intensity", UniformKind::Float);
        backend.compile_shader(&src).unwrap()
    }

    fn fb(backend: &mut HeadlessBackend) -> FramebufferHandle {
        backend
            .create_framebuffer(&FramebufferDesc { width: 8, height: 8, color_attachments: 1, depth: true })
            .unwrap()
    }

    #[test]
    fn clean_frame_has_no_violations() {
        let mut b = HeadlessBackend::new(64, 64);
        let shader = quad_shader(&mut b);
        let src = fb(&mut b);
        b.begin_frame().unwrap();
        b.bind_shader(Some(shader));
        b.bind_texture(0, TextureBinding::Color { framebuffer: src, attachment: 0 });
        b.draw_fullscreen_quad();
        b.unbind_texture(0);
        b.bind_shader(None);
        b.end_frame();
        assert!(b.violations().is_empty(), "{:?}", b.violations());
        assert_eq!(b.draws().count(), 1);
    }

    #[test]
    fn feedback_loop_is_flagged() {
        let mut b = HeadlessBackend::new(64, 64);
        let shader = quad_shader(&mut b);
        let target = fb(&mut b);
        b.bind_shader(Some(shader));
        b.bind_framebuffer(Some(target));
        b.bind_texture(0, TextureBinding::Color { framebuffer: target, attachment: 0 });
        b.draw_fullscreen_quad();
        assert!(b.violations().iter().any(|v| v.contains("own render target")));
    }

    #[test]
    fn leaked_slot_is_flagged() {
        let mut b = HeadlessBackend::new(64, 64);
        let shader = quad_shader(&mut b);
        b.bind_shader(Some(shader));
        b.bind_texture(3, TextureBinding::Texture(None));
        b.draw_fullscreen_quad();
        assert!(b.violations().iter().any(|v| v.contains("leaked binding")));
    }

    #[test]
    fn end_frame_reports_dangling_bindings() {
        let mut b = HeadlessBackend::new(64, 64);
        let shader = quad_shader(&mut b);
        b.begin_frame().unwrap();
        b.bind_shader(Some(shader));
        b.end_frame();
        assert_eq!(b.violations().len(), 1);
    }

    #[test]
    fn uniforms_must_be_declared_with_matching_kind() {
        let mut b = HeadlessBackend::new(64, 64);
        let shader = quad_shader(&mut b);
        b.bind_shader(Some(shader));
        assert!(b.set_uniform("u_intensity", UniformValue::Float(0.5)));
        assert!(!b.set_uniform("u_intensity", UniformValue::Int(1)));
        assert!(!b.set_uniform("u_missing", UniformValue::Float(1.0)));
        assert_eq!(b.uniform(shader, "u_intensity"), Some(UniformValue::Float(0.5)));
    }

    #[test]
    fn zero_sized_framebuffer_is_rejected() {
        let mut b = HeadlessBackend::new(64, 64);
        let err = b
            .create_framebuffer(&FramebufferDesc { width: 0, height: 4, color_attachments: 1, depth: false })
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidFramebufferSize { .. }));
    }
}
