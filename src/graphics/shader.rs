use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use log::warn;

use crate::error::RenderError;
use crate::graphics::backend::{RenderBackend, ShaderHandle, ShaderSource, UniformValue};

/// Compiled program plus typed uniform setters.
///
/// Setters apply to the program while it is bound. A name the program does not
/// declare is logged and ignored.
#[derive(Debug)]
pub struct Shader {
    label: String,
    handle: Option<ShaderHandle>,
}

impl Shader {
    pub fn compile(backend: &mut dyn RenderBackend, source: &ShaderSource) -> Result<Self, RenderError> {
        let handle = backend.compile_shader(source)?;
        Ok(Self { label: source.label.clone(), handle: Some(handle) })
    }

    /// Wrap a program owned elsewhere (e.g. by the asset system).
    pub fn from_handle(label: impl Into<String>, handle: ShaderHandle) -> Self {
        Self { label: label.into(), handle: Some(handle) }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn handle(&self) -> Option<ShaderHandle> {
        self.handle
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    pub fn bind(&self, backend: &mut dyn RenderBackend) {
        if let Some(h) = self.handle {
            backend.bind_shader(Some(h));
        }
    }

    pub fn unbind(&self, backend: &mut dyn RenderBackend) {
        backend.bind_shader(None);
    }

    /// Release the program. Safe to call more than once.
    pub fn unload(&mut self, backend: &mut dyn RenderBackend) {
        if let Some(h) = self.handle.take() {
            backend.destroy_shader(h);
        }
    }

    pub fn set(&self, backend: &mut dyn RenderBackend, name: &str, value: UniformValue) {
        if self.handle.is_none() {
            return;
        }
        if !backend.set_uniform(name, value) {
            warn!("shader '{}' has no uniform '{name}' of kind {:?}", self.label, value.kind());
        }
    }

    pub fn set_float(&self, backend: &mut dyn RenderBackend, name: &str, v: f32) {
        self.set(backend, name, UniformValue::Float(v));
    }

    pub fn set_int(&self, backend: &mut dyn RenderBackend, name: &str, v: i32) {
        self.set(backend, name, UniformValue::Int(v));
    }

    pub fn set_bool(&self, backend: &mut dyn RenderBackend, name: &str, v: bool) {
        self.set(backend, name, UniformValue::Bool(v));
    }

    pub fn set_vec2(&self, backend: &mut dyn RenderBackend, name: &str, v: Vec2) {
        self.set(backend, name, UniformValue::Vec2(v));
    }

    pub fn set_vec3(&self, backend: &mut dyn RenderBackend, name: &str, v: Vec3) {
        self.set(backend, name, UniformValue::Vec3(v));
    }

    pub fn set_vec4(&self, backend: &mut dyn RenderBackend, name: &str, v: Vec4) {
        self.set(backend, name, UniformValue::Vec4(v));
    }

    pub fn set_mat3(&self, backend: &mut dyn RenderBackend, name: &str, v: Mat3) {
        self.set(backend, name, UniformValue::Mat3(v));
    }

    pub fn set_mat4(&self, backend: &mut dyn RenderBackend, name: &str, v: Mat4) {
        self.set(backend, name, UniformValue::Mat4(v));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::headless::HeadlessBackend;
    use crate::graphics::shaders;

    #[test]
    fn unload_is_idempotent() {
        let mut backend = HeadlessBackend::new(32, 32);
        let mut shader = Shader::compile(&mut backend, &shaders::passthrough()).unwrap();
        assert_eq!(backend.live_shaders(), 1);
        shader.unload(&mut backend);
        shader.unload(&mut backend);
        assert_eq!(backend.live_shaders(), 0);
        assert!(backend.violations().is_empty());
    }

    #[test]
    fn typed_setter_reaches_bound_program() {
        let mut backend = HeadlessBackend::new(32, 32);
        let shader = Shader::compile(&mut backend, &shaders::color_correct()).unwrap();
        shader.bind(&mut backend);
        shader.set_float(&mut backend, "u_intensity", 0.25);
        shader.set_float(&mut backend, "u_unknown", 1.0);
        shader.unbind(&mut backend);
        let handle = shader.handle().unwrap();
        assert_eq!(backend.uniform(handle, "u_intensity"), Some(UniformValue::Float(0.25)));
    }

    #[test]
    fn failed_compile_surfaces_error() {
        let mut backend = HeadlessBackend::new(32, 32);
        backend.fail_shader_compile(shaders::PASSTHROUGH);
        let err = Shader::compile(&mut backend, &shaders::passthrough()).unwrap_err();
        assert!(matches!(err, RenderError::ShaderCompile { .. }));
    }
}
