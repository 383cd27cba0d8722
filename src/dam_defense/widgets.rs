use glam::Vec4;

use crate::assets::AssetSystem;
use crate::dam_defense::assets::{SHADER_SPRITE, TEX_BUTTON, TEX_BUTTON_HOVER};
use crate::ecs::Entity;
use crate::error::AssetError;
use crate::graphics::backend::{ShaderHandle, TextureHandle};
use crate::input::InputState;
use crate::scene::{Scene, Sprite2D};

/// Full-surface image behind everything else on a menu screen.
pub fn backdrop(scene: &mut Scene, shader: ShaderHandle, texture: TextureHandle, tint: Vec4) -> Entity {
    let e = scene.create_entity();
    let mut sprite = Sprite2D::new(Some(texture), shader, Vec4::new(0.0, 0.0, 1.0, 1.0));
    sprite.tint = tint;
    sprite.layer = -10;
    scene.attach(e, sprite);
    e
}

/// A clickable rectangle: a frame sprite with a label drawn over it. The
/// frame swaps to the hover texture while the cursor is inside.
pub struct Button {
    frame: Entity,
    normal: TextureHandle,
    hover: TextureHandle,
}

impl Button {
    /// `rect` is (x, y, w, h) as fractions of the surface.
    pub fn new(scene: &mut Scene, assets: &AssetSystem, rect: Vec4, label: &str) -> Result<Self, AssetError> {
        let shader = assets.get_shader(SHADER_SPRITE)?;
        let normal = assets.get_texture_2d(TEX_BUTTON)?;
        let hover = assets.get_texture_2d(TEX_BUTTON_HOVER)?;
        let label = assets.get_texture_2d(label)?;

        let frame = scene.create_entity();
        scene.attach(frame, Sprite2D::new(Some(normal), shader, rect));

        let inset = Vec4::new(rect.x + rect.z * 0.1, rect.y + rect.w * 0.2, rect.z * 0.8, rect.w * 0.6);
        let text = scene.create_entity();
        let mut sprite = Sprite2D::new(Some(label), shader, inset);
        sprite.layer = 1;
        scene.attach(text, sprite);

        Ok(Self { frame, normal, hover })
    }

    fn pixel_rect(&self, scene: &Scene, size: (u32, u32)) -> Vec4 {
        scene.get::<Sprite2D>(self.frame).pixel_rect(size.0, size.1)
    }

    /// Refresh the hover look and report a click inside this frame.
    pub fn update(&self, scene: &mut Scene, input: &InputState, size: (u32, u32)) -> bool {
        let r = self.pixel_rect(scene, size);
        let over = input.is_mouse_over(r.x, r.y, r.z, r.w);
        scene.get_mut::<Sprite2D>(self.frame).texture = Some(if over { self.hover } else { self.normal });
        input.was_clicked(r.x, r.y, r.z, r.w)
    }

    pub fn is_hovered(&self, scene: &Scene) -> bool {
        scene.get::<Sprite2D>(self.frame).texture == Some(self.hover)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dam_defense::assets::{register_assets, SET_BOOT, SET_LOOKS, TEX_PLAY};
    use crate::graphics::HeadlessBackend;
    use crate::input::MouseButton;
    use std::path::Path;

    #[test]
    fn hover_and_click_use_pixel_bounds() {
        let mut backend = HeadlessBackend::new(200, 100);
        let mut assets = AssetSystem::new();
        register_assets(&mut assets, Path::new("no/such/dir"));
        assets.load_set_now(&mut backend, SET_BOOT).unwrap();
        assets.load_set_now(&mut backend, SET_LOOKS).unwrap();

        let mut scene = Scene::new();
        let button = Button::new(&mut scene, &assets, Vec4::new(0.25, 0.5, 0.5, 0.2), TEX_PLAY).unwrap();
        let mut input = InputState::new();

        input.move_cursor(10.0, 10.0);
        assert!(!button.update(&mut scene, &input, (200, 100)));
        assert!(!button.is_hovered(&scene));

        input.move_cursor(100.0, 60.0);
        assert!(!button.update(&mut scene, &input, (200, 100)));
        assert!(button.is_hovered(&scene));

        input.press_mouse(MouseButton::Left);
        assert!(button.update(&mut scene, &input, (200, 100)));
    }
}
