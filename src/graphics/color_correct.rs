use std::any::Any;

use crate::error::RenderError;
use crate::graphics::backend::{LutHandle, RenderBackend, TextureBinding};
use crate::graphics::post_effect::{PassChain, PostEffect};
use crate::graphics::shaders;

const LUT_SLOT: u32 = 1;

/// LUT colour grading. `intensity` blends between the input and the graded
/// colour; an unset cube samples the identity table.
#[derive(Debug)]
pub struct ColorCorrect {
    passes: PassChain,
    intensity: f32,
    should_apply: bool,
    cube: Option<LutHandle>,
}

impl Default for ColorCorrect {
    fn default() -> Self {
        Self {
            passes: PassChain::new(),
            intensity: 1.0,
            should_apply: true,
            cube: None,
        }
    }
}

impl ColorCorrect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    /// Blend factor between the input (0) and the graded colour (1). Stored
    /// as given; values outside that range extrapolate.
    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity;
    }

    pub fn set_should_apply(&mut self, apply: bool) {
        self.should_apply = apply;
    }

    pub fn set_cube(&mut self, cube: Option<LutHandle>) {
        self.cube = cube;
    }

    pub fn cube(&self) -> Option<LutHandle> {
        self.cube
    }
}

impl PostEffect for ColorCorrect {
    fn name(&self) -> &'static str {
        "color_correct"
    }

    fn passes(&self) -> &PassChain {
        &self.passes
    }

    fn passes_mut(&mut self) -> &mut PassChain {
        &mut self.passes
    }

    fn init(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) -> Result<(), RenderError> {
        self.passes.init_single(backend, width, height, &shaders::color_correct())
    }

    fn should_apply(&self) -> bool {
        self.should_apply
    }

    fn push_uniforms(&self, backend: &mut dyn RenderBackend) {
        if let Some(shader) = self.passes.last_index().and_then(|i| self.passes.shader(i)) {
            shader.set_float(backend, "u_intensity", self.intensity);
        }
    }

    fn bind_extra_textures(&self, backend: &mut dyn RenderBackend) {
        backend.bind_texture(LUT_SLOT, TextureBinding::Lut(self.cube));
    }

    fn unbind_extra_textures(&self, backend: &mut dyn RenderBackend) {
        backend.unbind_texture(LUT_SLOT);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::backend::UniformValue;
    use crate::graphics::headless::{Command, HeadlessBackend};
    use crate::graphics::post_effect::BasePostEffect;
    use crate::graphics::texture::{LutData, LutPreset};

    #[test]
    fn defaults() {
        let cc = ColorCorrect::new();
        assert_eq!(cc.intensity(), 1.0);
        assert!(cc.should_apply());
        assert!(cc.cube().is_none());
    }

    #[test]
    fn intensity_is_stored_as_given() {
        let mut cc = ColorCorrect::new();
        cc.set_intensity(1.5);
        assert_eq!(cc.intensity(), 1.5);
        cc.set_intensity(-0.25);
        assert_eq!(cc.intensity(), -0.25);
    }

    #[test]
    fn apply_binds_lut_at_slot_one_and_pushes_intensity() {
        let mut backend = HeadlessBackend::new(32, 32);
        let mut prev = BasePostEffect::new();
        prev.init(&mut backend, 32, 32).unwrap();
        let lut = backend.upload_lut(&LutData::preset(LutPreset::Warm, 4));

        let mut cc = ColorCorrect::new();
        cc.init(&mut backend, 32, 32).unwrap();
        cc.set_cube(Some(lut));
        cc.set_intensity(0.5);
        cc.apply_effect(&mut backend, &prev);

        let Some(Command::Draw { target, textures, shader, .. }) = backend.draws().next().cloned() else {
            panic!("no draw recorded");
        };
        assert_eq!(target, cc.output());
        assert!(textures.contains(&(1, TextureBinding::Lut(Some(lut)))));
        assert_eq!(backend.uniform(shader, "u_intensity"), Some(UniformValue::Float(0.5)));
        assert!(backend.violations().is_empty(), "{:?}", backend.violations());
        assert_eq!(backend.bound_textures().count(), 0);
    }
}
