use glam::Vec4;

use crate::error::RenderError;
use crate::graphics::backend::{FramebufferDesc, FramebufferHandle, RenderBackend, TextureBinding};

/// Offscreen target with zero or more colour attachments and an optional
/// depth attachment.
///
/// Attachments are declared before [`Framebuffer::init`]; the size is fixed
/// until [`Framebuffer::reshape`]. GPU memory is released only by
/// [`Framebuffer::unload`].
#[derive(Debug, Default)]
pub struct Framebuffer {
    handle: Option<FramebufferHandle>,
    color_targets: u32,
    depth: bool,
    width: u32,
    height: u32,
    clear_color: Vec4,
}

impl Framebuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Framebuffer with one colour and one depth attachment.
    pub fn color_depth() -> Self {
        let mut fb = Self::new();
        fb.add_color_target();
        fb.add_depth_target();
        fb
    }

    pub fn add_color_target(&mut self) -> &mut Self {
        self.color_targets += 1;
        self
    }

    pub fn add_depth_target(&mut self) -> &mut Self {
        self.depth = true;
        self
    }

    pub fn set_clear_color(&mut self, color: Vec4) {
        self.clear_color = color;
    }

    pub fn init(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) -> Result<(), RenderError> {
        if self.handle.is_some() {
            return self.reshape(backend, width, height);
        }
        let handle = backend.create_framebuffer(&FramebufferDesc {
            width,
            height,
            color_attachments: self.color_targets,
            depth: self.depth,
        })?;
        self.handle = Some(handle);
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub fn is_init(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> Option<FramebufferHandle> {
        self.handle
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn color_targets(&self) -> u32 {
        self.color_targets
    }

    pub fn has_depth(&self) -> bool {
        self.depth
    }

    /// Resize every attachment. Same-size reshapes do nothing.
    pub fn reshape(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) -> Result<(), RenderError> {
        let Some(handle) = self.handle else {
            return Ok(());
        };
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        backend.resize_framebuffer(handle, width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub fn clear(&self, backend: &mut dyn RenderBackend) {
        if let Some(h) = self.handle {
            backend.clear_framebuffer(Some(h), self.clear_color);
        }
    }

    /// Release GPU memory. Safe to call more than once.
    pub fn unload(&mut self, backend: &mut dyn RenderBackend) {
        if let Some(h) = self.handle.take() {
            backend.destroy_framebuffer(h);
        }
    }

    pub fn bind(&self, backend: &mut dyn RenderBackend) {
        if let Some(h) = self.handle {
            backend.bind_framebuffer(Some(h));
        }
    }

    /// Return drawing to the window surface.
    pub fn unbind(backend: &mut dyn RenderBackend) {
        backend.bind_framebuffer(None);
    }

    pub fn bind_color_as_texture(&self, backend: &mut dyn RenderBackend, attachment: u32, slot: u32) {
        match self.handle {
            Some(framebuffer) if attachment < self.color_targets => {
                backend.bind_texture(slot, TextureBinding::Color { framebuffer, attachment });
            }
            _ => {}
        }
    }

    pub fn bind_depth_as_texture(&self, backend: &mut dyn RenderBackend, slot: u32) {
        if let (Some(framebuffer), true) = (self.handle, self.depth) {
            backend.bind_texture(slot, TextureBinding::Depth { framebuffer });
        }
    }

    pub fn unbind_texture(backend: &mut dyn RenderBackend, slot: u32) {
        backend.unbind_texture(slot);
    }

    /// Draw a screen-filling quad into the currently bound target.
    pub fn draw_fullscreen_quad(backend: &mut dyn RenderBackend) {
        backend.draw_fullscreen_quad();
    }

    /// Bind, draw one full-screen quad, unbind.
    pub fn render_to_fsq(&self, backend: &mut dyn RenderBackend) {
        self.bind(backend);
        backend.draw_fullscreen_quad();
        Self::unbind(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::headless::HeadlessBackend;

    #[test]
    fn init_and_reshape() {
        let mut backend = HeadlessBackend::new(100, 100);
        let mut fb = Framebuffer::color_depth();
        fb.init(&mut backend, 100, 50).unwrap();
        let handle = fb.handle().unwrap();
        assert_eq!(backend.framebuffer_size(handle), Some((100, 50)));

        fb.reshape(&mut backend, 30, 20).unwrap();
        assert_eq!(fb.size(), (30, 20));
        assert_eq!(backend.framebuffer_size(handle), Some((30, 20)));
    }

    #[test]
    fn same_size_reshape_keeps_handle_count() {
        let mut backend = HeadlessBackend::new(100, 100);
        let mut fb = Framebuffer::color_depth();
        fb.init(&mut backend, 64, 64).unwrap();
        let before = backend.live_handles();
        fb.reshape(&mut backend, 64, 64).unwrap();
        fb.reshape(&mut backend, 64, 64).unwrap();
        assert_eq!(backend.live_handles(), before);
    }

    #[test]
    fn unload_twice_is_a_no_op() {
        let mut backend = HeadlessBackend::new(100, 100);
        let mut fb = Framebuffer::color_depth();
        fb.init(&mut backend, 8, 8).unwrap();
        fb.unload(&mut backend);
        fb.unload(&mut backend);
        assert_eq!(backend.live_framebuffers(), 0);
        assert!(backend.violations().is_empty());
    }

    #[test]
    fn binding_missing_attachment_does_nothing() {
        let mut backend = HeadlessBackend::new(100, 100);
        let mut fb = Framebuffer::new();
        fb.add_color_target();
        fb.init(&mut backend, 8, 8).unwrap();
        fb.bind_color_as_texture(&mut backend, 2, 0);
        fb.bind_depth_as_texture(&mut backend, 1);
        assert_eq!(backend.bound_textures().count(), 0);
    }
}
