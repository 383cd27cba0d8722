use std::cell::RefCell;
use std::rc::Rc;

use crate::graphics::backend::{
    CubemapHandle, RenderBackend, TextureBinding, TextureHandle, UniformValue,
};

/// The five mutually exclusive lighting models.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShadingMode {
    NoLight,
    Ambient,
    Specular,
    AmbientSpecular,
    /// Ambient + specular with an inverted-hull outline.
    Custom,
}

/// Surface description shared between renderers.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub albedo: Option<TextureHandle>,
    pub specular: Option<TextureHandle>,
    pub height: Option<TextureHandle>,
    pub cubemap: Option<CubemapHandle>,
    pub shininess: f32,
    pub height_influence: f32,
    pub outline_size: f32,
    mode: Option<ShadingMode>,
}

pub type SharedMaterial = Rc<RefCell<Material>>;

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: None,
            specular: None,
            height: None,
            cubemap: None,
            shininess: 0.0,
            height_influence: 1.0,
            outline_size: 0.2,
            mode: None,
        }
    }
}

impl Material {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedMaterial {
        Rc::new(RefCell::new(self))
    }

    pub fn with_albedo(mut self, texture: Option<TextureHandle>) -> Self {
        self.albedo = texture;
        self
    }

    pub fn with_mode(mut self, mode: ShadingMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn mode(&self) -> Option<ShadingMode> {
        self.mode
    }

    fn set_mode(&mut self, mode: ShadingMode, on: bool) {
        if on {
            self.mode = Some(mode);
        } else if self.mode == Some(mode) {
            self.mode = None;
        }
    }

    pub fn set_no_light(&mut self, on: bool) {
        self.set_mode(ShadingMode::NoLight, on);
    }

    pub fn set_ambient(&mut self, on: bool) {
        self.set_mode(ShadingMode::Ambient, on);
    }

    pub fn set_specular(&mut self, on: bool) {
        self.set_mode(ShadingMode::Specular, on);
    }

    pub fn set_ambient_specular(&mut self, on: bool) {
        self.set_mode(ShadingMode::AmbientSpecular, on);
    }

    pub fn set_custom(&mut self, on: bool) {
        self.set_mode(ShadingMode::Custom, on);
    }

    pub fn is_no_light(&self) -> bool {
        self.mode == Some(ShadingMode::NoLight)
    }

    pub fn is_ambient(&self) -> bool {
        self.mode == Some(ShadingMode::Ambient)
    }

    pub fn is_specular(&self) -> bool {
        self.mode == Some(ShadingMode::Specular)
    }

    pub fn is_ambient_specular(&self) -> bool {
        self.mode == Some(ShadingMode::AmbientSpecular)
    }

    pub fn is_custom(&self) -> bool {
        self.mode == Some(ShadingMode::Custom)
    }

    /// Whether any light is computed at all. A material with no mode is unlit.
    pub fn is_lit(&self) -> bool {
        !matches!(self.mode, None | Some(ShadingMode::NoLight))
    }

    pub fn has_ambient(&self) -> bool {
        matches!(
            self.mode,
            Some(ShadingMode::Ambient | ShadingMode::AmbientSpecular | ShadingMode::Custom)
        )
    }

    pub fn has_specular(&self) -> bool {
        matches!(
            self.mode,
            Some(ShadingMode::Specular | ShadingMode::AmbientSpecular | ShadingMode::Custom)
        )
    }

    pub fn has_outline(&self) -> bool {
        self.mode == Some(ShadingMode::Custom)
    }

    /// Bind the four texture slots and push material uniforms to the bound shader.
    pub fn apply(&self, backend: &mut dyn RenderBackend) {
        backend.bind_texture(0, TextureBinding::Texture(self.albedo));
        backend.bind_texture(1, TextureBinding::Texture(self.specular));
        backend.bind_texture(2, TextureBinding::Texture(self.height));
        backend.bind_texture(3, TextureBinding::Cubemap(self.cubemap));

        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        backend.set_uniform(
            "u_light_flags",
            UniformValue::Vec4(glam::Vec4::new(
                flag(self.is_lit()),
                flag(self.has_ambient()),
                flag(self.has_specular()),
                flag(self.has_outline()),
            )),
        );
        backend.set_uniform("u_shininess", UniformValue::Float(self.shininess));
        backend.set_uniform("u_height_influence", UniformValue::Float(self.height_influence));
        backend.set_uniform("u_outline", UniformValue::Float(self.outline_size));
    }

    pub fn unbind(backend: &mut dyn RenderBackend) {
        for slot in 0..4 {
            backend.unbind_texture(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_count(m: &Material) -> usize {
        [m.is_no_light(), m.is_ambient(), m.is_specular(), m.is_ambient_specular(), m.is_custom()]
            .iter()
            .filter(|&&b| b)
            .count()
    }

    #[test]
    fn every_setter_keeps_modes_exclusive() {
        let setters: [fn(&mut Material, bool); 5] = [
            Material::set_no_light,
            Material::set_ambient,
            Material::set_specular,
            Material::set_ambient_specular,
            Material::set_custom,
        ];
        let mut m = Material::new();
        for (i, set) in setters.iter().enumerate() {
            set(&mut m, true);
            assert_eq!(active_count(&m), 1, "after setter {i}");
            for (j, other) in setters.iter().enumerate() {
                if i != j {
                    other(&mut m, false);
                    assert_eq!(active_count(&m), 1, "setter {j} false cleared {i}");
                }
            }
        }
    }

    #[test]
    fn clearing_active_mode_leaves_none() {
        let mut m = Material::new();
        m.set_specular(true);
        m.set_specular(false);
        assert_eq!(m.mode(), None);
        assert_eq!(active_count(&m), 0);
        assert!(!m.is_lit());
    }

    #[test]
    fn custom_implies_ambient_specular_and_outline() {
        let mut m = Material::new();
        m.set_custom(true);
        assert!(m.has_ambient() && m.has_specular() && m.has_outline());
        m.set_ambient(true);
        assert!(!m.has_outline());
        assert!(!m.has_specular());
    }

    #[test]
    fn materials_track_modes_independently() {
        let shared = Material::new().shared();
        let other = Material::new().shared();
        let alias = Rc::clone(&shared);
        shared.borrow_mut().set_no_light(true);
        assert!(alias.borrow().is_no_light());
        assert_eq!(other.borrow().mode(), None);
    }

    #[test]
    fn defaults() {
        let m = Material::new();
        assert_eq!(m.shininess, 0.0);
        assert_eq!(m.height_influence, 1.0);
        assert_eq!(m.outline_size, 0.2);
    }
}
