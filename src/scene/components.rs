use glam::{Mat4, Vec3, Vec4};

use crate::graphics::backend::{CubemapHandle, MeshHandle, ShaderHandle, TextureHandle};
use crate::graphics::material::SharedMaterial;
use crate::particles::ParticleSystem;

/// Label used by gameplay code to recognise entities in contact pairs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tag(pub String);

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is(&self, name: &str) -> bool {
        self.0 == name
    }
}

/// Marks an entity for removal once `elapsed >= duration`. From the moment it
/// is attached the entity is excluded from [`crate::scene::Scene::alive_view`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DeleteCountdown {
    pub duration: f32,
    pub elapsed: f32,
}

impl DeleteCountdown {
    pub fn new(duration: f32) -> Self {
        Self { duration, elapsed: 0.0 }
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Swept by [`crate::scene::Scene::sweep`] at the end of the frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingRemoval;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Camera {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self { fov_y_degrees: 60.0, near: 0.01, far: 1000.0 }
    }
}

impl Camera {
    pub fn perspective(fov_y_degrees: f32, near: f32, far: f32) -> Self {
        Self { fov_y_degrees, near, far }
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_degrees.to_radians(), aspect.max(f32::EPSILON), self.near, self.far)
    }
}

/// Directional light shining along the entity's local +Z.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Light {
    pub color: Vec3,
    pub strength: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self { color: Vec3::ONE, strength: 1.0 }
    }
}

#[derive(Clone, Debug)]
pub struct MeshRenderer {
    pub mesh: MeshHandle,
    pub shader: ShaderHandle,
    pub material: SharedMaterial,
    pub tint: Vec4,
}

impl MeshRenderer {
    pub fn new(mesh: MeshHandle, shader: ShaderHandle, material: SharedMaterial) -> Self {
        Self { mesh, shader, material, tint: Vec4::ONE }
    }
}

/// Screen-space image. `rect` is (x, y, w, h) as fractions of the surface
/// with the origin at the top-left.
#[derive(Clone, Debug, PartialEq)]
pub struct Sprite2D {
    pub texture: Option<TextureHandle>,
    pub shader: ShaderHandle,
    pub rect: Vec4,
    pub tint: Vec4,
    pub layer: i32,
}

impl Sprite2D {
    pub fn new(texture: Option<TextureHandle>, shader: ShaderHandle, rect: Vec4) -> Self {
        Self { texture, shader, rect, tint: Vec4::ONE, layer: 0 }
    }

    /// `rect` converted to pixels for a surface of the given size.
    pub fn pixel_rect(&self, width: u32, height: u32) -> Vec4 {
        let (w, h) = (width as f32, height as f32);
        Vec4::new(self.rect.x * w, self.rect.y * h, self.rect.z * w, self.rect.w * h)
    }

    pub(crate) fn ndc_rect(&self) -> Vec4 {
        Vec4::new(
            self.rect.x * 2.0 - 1.0,
            1.0 - self.rect.y * 2.0,
            self.rect.z * 2.0,
            self.rect.w * 2.0,
        )
    }
}

pub struct ParticleSystemComponent {
    pub system: ParticleSystem,
    pub shader: ShaderHandle,
}

impl ParticleSystemComponent {
    pub fn new(system: ParticleSystem, shader: ShaderHandle) -> Self {
        Self { system, shader }
    }
}

/// Environment cube drawn behind everything else.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Skybox {
    pub cubemap: CubemapHandle,
    pub mesh: MeshHandle,
    pub shader: ShaderHandle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_expiry_is_inclusive() {
        let mut c = DeleteCountdown::new(2.0);
        c.elapsed = 1.999;
        assert!(!c.is_expired());
        c.elapsed = 2.0;
        assert!(c.is_expired());
    }

    #[test]
    fn sprite_rect_maps_top_left_to_ndc() {
        let s = Sprite2D::new(None, ShaderHandle(1), Vec4::new(0.25, 0.5, 0.5, 0.25));
        assert_eq!(s.ndc_rect(), Vec4::new(-0.5, 0.0, 1.0, 0.5));
        assert_eq!(s.pixel_rect(200, 100), Vec4::new(50.0, 50.0, 100.0, 25.0));
    }
}
