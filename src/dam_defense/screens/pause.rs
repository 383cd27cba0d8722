use glam::Vec4;

use crate::dam_defense::assets::{SHADER_SPRITE, TEX_MENU, TEX_QUIT, TEX_RESUME, TEX_WHITE};
use crate::dam_defense::screens::menu::MenuScreen;
use crate::dam_defense::widgets::{backdrop, Button};
use crate::engine::Engine;
use crate::error::TitanError;
use crate::input::KeyCode;
use crate::scene::Scene;
use crate::screen::{Screen, ScreenAction};

pub const RESUME_RECT: Vec4 = Vec4::new(0.4, 0.35, 0.2, 0.08);
pub const MENU_RECT: Vec4 = Vec4::new(0.4, 0.47, 0.2, 0.08);
pub const QUIT_RECT: Vec4 = Vec4::new(0.4, 0.59, 0.2, 0.08);

/// Dimmed overlay over the paused game.
pub struct PauseScreen {
    scene: Scene,
    buttons: Option<[Button; 3]>,
}

impl PauseScreen {
    pub fn new() -> Self {
        Self { scene: Scene::new(), buttons: None }
    }
}

impl Default for PauseScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen for PauseScreen {
    fn name(&self) -> &'static str {
        "pause"
    }

    fn is_transparent(&self) -> bool {
        true
    }

    fn on_enter(&mut self, engine: &mut Engine) -> Result<(), TitanError> {
        let assets = &engine.assets;
        let shade = Vec4::new(0.0, 0.0, 0.0, 0.55);
        backdrop(&mut self.scene, assets.get_shader(SHADER_SPRITE)?, assets.get_texture_2d(TEX_WHITE)?, shade);
        self.buttons = Some([
            Button::new(&mut self.scene, assets, RESUME_RECT, TEX_RESUME)?,
            Button::new(&mut self.scene, assets, MENU_RECT, TEX_MENU)?,
            Button::new(&mut self.scene, assets, QUIT_RECT, TEX_QUIT)?,
        ]);
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine) -> ScreenAction {
        if engine.is_key_pressed(KeyCode::Escape) {
            return ScreenAction::Pop;
        }
        let Some([resume, menu, quit]) = &self.buttons else {
            return ScreenAction::None;
        };
        let size = engine.surface_size();
        if resume.update(&mut self.scene, &engine.input, size) {
            return ScreenAction::Pop;
        }
        if menu.update(&mut self.scene, &engine.input, size) {
            return ScreenAction::ReplaceAll(Box::new(MenuScreen::new()));
        }
        if quit.update(&mut self.scene, &engine.input, size) {
            return ScreenAction::Quit;
        }
        ScreenAction::None
    }

    fn draw(&mut self, engine: &mut Engine) {
        self.scene.render(engine.backend());
    }
}
