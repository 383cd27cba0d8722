use std::any::Any;

use glam::Vec4;
use log::{debug, warn};

use crate::error::RenderError;
use crate::graphics::backend::{FramebufferHandle, RenderBackend, ShaderSource};
use crate::graphics::framebuffer::Framebuffer;
use crate::graphics::shader::Shader;
use crate::graphics::shaders;

// ── Pass records ─────────────────────────────────────────────────────────────

/// A framebuffer and the program that writes it.
#[derive(Debug)]
pub struct Pass {
    pub framebuffer: Framebuffer,
    pub shader: Shader,
}

/// Ordered pass records owned by one effect, plus the bind primitives effects
/// are built from. The last pass holds the effect's output and its shader is
/// used for both the intermediate apply and the final screen draw.
#[derive(Debug, Default)]
pub struct PassChain {
    passes: Vec<Pass>,
}

impl PassChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pass: Pass) {
        self.passes.push(pass);
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn pass(&self, i: usize) -> Option<&Pass> {
        self.passes.get(i)
    }

    pub fn last_index(&self) -> Option<usize> {
        self.passes.len().checked_sub(1)
    }

    /// Framebuffer holding the effect's output.
    pub fn output(&self) -> Option<FramebufferHandle> {
        self.passes.last().and_then(|p| p.framebuffer.handle())
    }

    /// Build the single colour+depth pass, or, when the pass already exists,
    /// keep its framebuffer and rebuild only the shader.
    pub fn init_single(
        &mut self,
        backend: &mut dyn RenderBackend,
        width: u32,
        height: u32,
        source: &ShaderSource,
    ) -> Result<(), RenderError> {
        if let Some(pass) = self.passes.last_mut() {
            let shader = Shader::compile(backend, source)?;
            pass.shader.unload(backend);
            pass.shader = shader;
            return pass.framebuffer.init(backend, width, height);
        }

        let mut framebuffer = Framebuffer::color_depth();
        framebuffer.set_clear_color(Vec4::new(0.0, 0.0, 0.0, 1.0));
        framebuffer.init(backend, width, height)?;
        let shader = match Shader::compile(backend, source) {
            Ok(s) => s,
            Err(e) => {
                framebuffer.unload(backend);
                return Err(e);
            }
        };
        self.passes.push(Pass { framebuffer, shader });
        Ok(())
    }

    // -- Primitives ---------------------------------------------------------

    pub fn bind_buffer(&self, backend: &mut dyn RenderBackend, i: usize) {
        if let Some(p) = self.passes.get(i) {
            p.framebuffer.bind(backend);
        }
    }

    pub fn unbind_buffer(&self, backend: &mut dyn RenderBackend) {
        Framebuffer::unbind(backend);
    }

    pub fn bind_color_as_texture(&self, backend: &mut dyn RenderBackend, i: usize, attachment: u32, slot: u32) {
        if let Some(p) = self.passes.get(i) {
            p.framebuffer.bind_color_as_texture(backend, attachment, slot);
        }
    }

    pub fn bind_depth_as_texture(&self, backend: &mut dyn RenderBackend, i: usize, slot: u32) {
        if let Some(p) = self.passes.get(i) {
            p.framebuffer.bind_depth_as_texture(backend, slot);
        }
    }

    pub fn unbind_texture(&self, backend: &mut dyn RenderBackend, slot: u32) {
        Framebuffer::unbind_texture(backend, slot);
    }

    pub fn bind_shader(&self, backend: &mut dyn RenderBackend, i: usize) {
        if let Some(p) = self.passes.get(i) {
            p.shader.bind(backend);
        }
    }

    pub fn unbind_shader(&self, backend: &mut dyn RenderBackend) {
        backend.bind_shader(None);
    }

    pub fn shader(&self, i: usize) -> Option<&Shader> {
        self.passes.get(i).map(|p| &p.shader)
    }

    // -- Lifecycle ----------------------------------------------------------

    pub fn reshape(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) -> Result<(), RenderError> {
        for p in &mut self.passes {
            p.framebuffer.reshape(backend, width, height)?;
        }
        Ok(())
    }

    pub fn clear(&self, backend: &mut dyn RenderBackend) {
        for p in &self.passes {
            p.framebuffer.clear(backend);
        }
    }

    /// Release every framebuffer and shader and forget the passes.
    pub fn unload(&mut self, backend: &mut dyn RenderBackend) {
        for mut p in self.passes.drain(..) {
            p.framebuffer.unload(backend);
            p.shader.unload(backend);
        }
    }
}

// ── PostEffect ───────────────────────────────────────────────────────────────

/// An image effect that reads the previous stage's colour output and writes
/// its own.
pub trait PostEffect: Any {
    fn name(&self) -> &'static str;

    fn passes(&self) -> &PassChain;
    fn passes_mut(&mut self) -> &mut PassChain;

    fn init(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) -> Result<(), RenderError>;

    fn should_apply(&self) -> bool {
        true
    }

    /// Push effect-specific uniforms while the effect's shader is bound.
    fn push_uniforms(&self, _backend: &mut dyn RenderBackend) {}

    /// Bind textures beyond slot 0 (which always holds the input image).
    fn bind_extra_textures(&self, _backend: &mut dyn RenderBackend) {}
    fn unbind_extra_textures(&self, _backend: &mut dyn RenderBackend) {}

    /// Run this effect's last-pass shader over `prev`'s output into this
    /// effect's own framebuffer.
    fn apply_effect(&mut self, backend: &mut dyn RenderBackend, prev: &dyn PostEffect) {
        let Some(last) = self.passes().last_index() else {
            warn!("post effect '{}' applied before init", self.name());
            return;
        };
        let Some(prev_last) = prev.passes().last_index() else {
            return;
        };
        let chain = self.passes();
        chain.bind_shader(backend, last);
        self.push_uniforms(backend);
        prev.passes().bind_color_as_texture(backend, prev_last, 0, 0);
        self.bind_extra_textures(backend);
        chain.bind_buffer(backend, last);
        Framebuffer::draw_fullscreen_quad(backend);
        chain.unbind_buffer(backend);
        self.unbind_extra_textures(backend);
        chain.unbind_texture(backend, 0);
        chain.unbind_shader(backend);
    }

    /// Same bind sequence as [`PostEffect::apply_effect`], reading this
    /// effect's own output and writing the window surface.
    fn draw_to_screen(&mut self, backend: &mut dyn RenderBackend) {
        let Some(last) = self.passes().last_index() else {
            return;
        };
        let chain = self.passes();
        chain.bind_shader(backend, last);
        self.push_uniforms(backend);
        chain.bind_color_as_texture(backend, last, 0, 0);
        self.bind_extra_textures(backend);
        chain.unbind_buffer(backend);
        Framebuffer::draw_fullscreen_quad(backend);
        self.unbind_extra_textures(backend);
        chain.unbind_texture(backend, 0);
        chain.unbind_shader(backend);
    }

    fn reshape(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) -> Result<(), RenderError> {
        self.passes_mut().reshape(backend, width, height)
    }

    fn clear(&self, backend: &mut dyn RenderBackend) {
        self.passes().clear(backend);
    }

    fn unload(&mut self, backend: &mut dyn RenderBackend) {
        self.passes_mut().unload(backend);
    }

    fn output(&self) -> Option<FramebufferHandle> {
        self.passes().output()
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Pass-through effect; the world renders into one of these.
#[derive(Debug, Default)]
pub struct BasePostEffect {
    passes: PassChain,
}

impl BasePostEffect {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PostEffect for BasePostEffect {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn passes(&self) -> &PassChain {
        &self.passes
    }

    fn passes_mut(&mut self) -> &mut PassChain {
        &mut self.passes
    }

    fn init(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) -> Result<(), RenderError> {
        self.passes.init_single(backend, width, height, &shaders::passthrough())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ── PostEffectChain ──────────────────────────────────────────────────────────

/// Primary target plus an ordered list of effects.
///
/// Each frame the world is drawn into the primary, every active effect reads
/// the output of the previous active stage, and the last active stage draws
/// to the screen.
pub struct PostEffectChain {
    primary: BasePostEffect,
    effects: Vec<Box<dyn PostEffect>>,
    size: Option<(u32, u32)>,
}

impl Default for PostEffectChain {
    fn default() -> Self {
        Self::new()
    }
}

impl PostEffectChain {
    pub fn new() -> Self {
        Self { primary: BasePostEffect::new(), effects: Vec::new(), size: None }
    }

    pub fn init(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) -> Result<(), RenderError> {
        self.primary.init(backend, width, height)?;
        for effect in &mut self.effects {
            effect.init(backend, width, height)?;
        }
        self.size = Some((width, height));
        Ok(())
    }

    pub fn is_init(&self) -> bool {
        self.size.is_some()
    }

    /// Append an effect; it is initialised immediately if the chain already is.
    pub fn push(&mut self, backend: &mut dyn RenderBackend, mut effect: Box<dyn PostEffect>) -> Result<(), RenderError> {
        if let Some((w, h)) = self.size {
            effect.init(backend, w, h)?;
        }
        debug!("post effect '{}' added at position {}", effect.name(), self.effects.len());
        self.effects.push(effect);
        Ok(())
    }

    pub fn primary(&self) -> &BasePostEffect {
        &self.primary
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn effects(&self) -> impl Iterator<Item = &dyn PostEffect> {
        self.effects.iter().map(|e| e.as_ref())
    }

    /// First effect of type `T`.
    pub fn get<T: PostEffect>(&self) -> Option<&T> {
        self.effects.iter().find_map(|e| e.as_any().downcast_ref::<T>())
    }

    pub fn get_mut<T: PostEffect>(&mut self) -> Option<&mut T> {
        self.effects.iter_mut().find_map(|e| e.as_any_mut().downcast_mut::<T>())
    }

    /// Render one frame: world into the primary, then every active effect.
    pub fn render(&mut self, backend: &mut dyn RenderBackend, draw_world: impl FnOnce(&mut dyn RenderBackend)) {
        if !self.is_init() {
            return;
        }
        self.primary.clear(backend);
        for effect in &self.effects {
            if effect.should_apply() {
                effect.clear(backend);
            }
        }

        self.primary.passes().bind_buffer(backend, 0);
        draw_world(backend);
        self.primary.passes().unbind_buffer(backend);

        let mut last_active: Option<usize> = None;
        for i in 0..self.effects.len() {
            if !self.effects[i].should_apply() {
                continue;
            }
            let (before, rest) = self.effects.split_at_mut(i);
            let prev: &dyn PostEffect = match last_active {
                Some(j) => before[j].as_ref(),
                None => &self.primary,
            };
            rest[0].apply_effect(backend, prev);
            last_active = Some(i);
        }

        match last_active {
            Some(j) => self.effects[j].draw_to_screen(backend),
            None => self.primary.draw_to_screen(backend),
        }
    }

    pub fn reshape(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.primary.reshape(backend, width, height)?;
        for effect in &mut self.effects {
            effect.reshape(backend, width, height)?;
        }
        if self.size.is_some() {
            self.size = Some((width, height));
        }
        Ok(())
    }

    /// Release every owned GPU handle. Safe to call more than once.
    pub fn unload(&mut self, backend: &mut dyn RenderBackend) {
        self.primary.unload(backend);
        for effect in &mut self.effects {
            effect.unload(backend);
        }
        self.size = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::headless::HeadlessBackend;

    #[test]
    fn reinit_rebuilds_shader_but_keeps_framebuffer() {
        let mut backend = HeadlessBackend::new(64, 64);
        let mut effect = BasePostEffect::new();
        effect.init(&mut backend, 64, 64).unwrap();
        let fb = effect.output();
        let shader = effect.passes().shader(0).and_then(Shader::handle);

        effect.init(&mut backend, 64, 64).unwrap();
        assert_eq!(effect.output(), fb);
        assert_ne!(effect.passes().shader(0).and_then(Shader::handle), shader);
        assert_eq!(backend.live_shaders(), 1);
        assert_eq!(backend.live_framebuffers(), 1);
    }

    #[test]
    fn apply_before_init_is_a_no_op() {
        let mut backend = HeadlessBackend::new(64, 64);
        let mut a = BasePostEffect::new();
        let b = BasePostEffect::new();
        a.apply_effect(&mut backend, &b);
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn failed_shader_leaves_no_framebuffer_behind() {
        let mut backend = HeadlessBackend::new(64, 64);
        backend.fail_shader_compile(shaders::PASSTHROUGH);
        let mut effect = BasePostEffect::new();
        assert!(effect.init(&mut backend, 64, 64).is_err());
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn render_without_effects_draws_primary_to_screen() {
        let mut backend = HeadlessBackend::new(64, 64);
        let mut chain = PostEffectChain::new();
        chain.init(&mut backend, 64, 64).unwrap();
        chain.render(&mut backend, |_| {});
        let targets: Vec<_> = backend
            .draws()
            .map(|c| match c {
                crate::graphics::headless::Command::Draw { target, .. } => *target,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(targets, vec![None]);
    }
}
