use glam::Vec4;

use crate::dam_defense::assets::{SET_LOOKS, SET_WORLD, SHADER_SPRITE, TEX_LOADING, TEX_WHITE};
use crate::dam_defense::screens::menu::MenuScreen;
use crate::dam_defense::widgets::backdrop;
use crate::ecs::Entity;
use crate::engine::Engine;
use crate::error::TitanError;
use crate::scene::{Scene, Sprite2D};
use crate::screen::{Screen, ScreenAction};

const BAR: Vec4 = Vec4::new(0.3, 0.8, 0.4, 0.02);
const WAITING_ON: [u32; 2] = [SET_WORLD, SET_LOOKS];

/// Waits for the background sets, then opens the main menu.
pub struct LoadingScreen {
    scene: Scene,
    bar: Option<Entity>,
}

impl LoadingScreen {
    pub fn new() -> Self {
        Self { scene: Scene::new(), bar: None }
    }
}

impl Default for LoadingScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen for LoadingScreen {
    fn name(&self) -> &'static str {
        "loading"
    }

    fn on_enter(&mut self, engine: &mut Engine) -> Result<(), TitanError> {
        let shader = engine.assets.get_shader(SHADER_SPRITE)?;
        let texture = engine.assets.get_texture_2d(TEX_LOADING)?;
        backdrop(&mut self.scene, shader, texture, Vec4::ONE);

        let bar = self.scene.create_entity();
        let mut sprite = Sprite2D::new(Some(engine.assets.get_texture_2d(TEX_WHITE)?), shader, BAR);
        sprite.rect.z = 0.0;
        sprite.layer = 1;
        self.scene.attach(bar, sprite);
        self.bar = Some(bar);
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine) -> ScreenAction {
        let done = WAITING_ON.iter().filter(|&&set| engine.assets.is_set_loaded(set)).count();
        if let Some(sprite) = self.bar.and_then(|e| self.scene.try_get_mut::<Sprite2D>(e)) {
            sprite.rect.z = BAR.z * done as f32 / WAITING_ON.len() as f32;
        }
        if done == WAITING_ON.len() {
            return ScreenAction::Switch(Box::new(MenuScreen::new()));
        }
        ScreenAction::None
    }

    fn draw(&mut self, engine: &mut Engine) {
        self.scene.render(engine.backend());
    }
}
