use glam::Vec4;
use log::info;

use crate::dam_defense::assets::{SHADER_SPRITE, TEX_DEFEAT, TEX_MENU, TEX_RETRY, TEX_VICTORY};
use crate::dam_defense::screens::menu::MenuScreen;
use crate::dam_defense::screens::play::GameScreen;
use crate::dam_defense::widgets::{backdrop, Button};
use crate::engine::Engine;
use crate::error::TitanError;
use crate::scene::Scene;
use crate::screen::{Screen, ScreenAction};

pub const RETRY_RECT: Vec4 = Vec4::new(0.4, 0.6, 0.2, 0.08);
pub const MENU_RECT: Vec4 = Vec4::new(0.4, 0.72, 0.2, 0.08);

/// Victory or defeat card with retry and back-to-menu buttons.
pub struct GameOverScreen {
    won: bool,
    boats_destroyed: u32,
    wave: u32,
    scene: Scene,
    buttons: Option<(Button, Button)>,
}

impl GameOverScreen {
    pub fn new(won: bool, boats_destroyed: u32, wave: u32) -> Self {
        Self { won, boats_destroyed, wave, scene: Scene::new(), buttons: None }
    }

    pub fn won(&self) -> bool {
        self.won
    }
}

impl Screen for GameOverScreen {
    fn name(&self) -> &'static str {
        if self.won { "victory" } else { "defeat" }
    }

    fn on_enter(&mut self, engine: &mut Engine) -> Result<(), TitanError> {
        let assets = &engine.assets;
        let card = if self.won { TEX_VICTORY } else { TEX_DEFEAT };
        backdrop(&mut self.scene, assets.get_shader(SHADER_SPRITE)?, assets.get_texture_2d(card)?, Vec4::ONE);
        let retry = Button::new(&mut self.scene, assets, RETRY_RECT, TEX_RETRY)?;
        let menu = Button::new(&mut self.scene, assets, MENU_RECT, TEX_MENU)?;
        self.buttons = Some((retry, menu));
        engine.input.request_cursor_lock(false);
        info!(
            "{} on wave {} with {} boats sunk",
            if self.won { "victory" } else { "defeat" },
            self.wave,
            self.boats_destroyed
        );
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine) -> ScreenAction {
        let Some((retry, menu)) = &self.buttons else {
            return ScreenAction::None;
        };
        let size = engine.surface_size();
        if retry.update(&mut self.scene, &engine.input, size) {
            return ScreenAction::ReplaceAll(Box::new(GameScreen::new()));
        }
        if menu.update(&mut self.scene, &engine.input, size) {
            return ScreenAction::ReplaceAll(Box::new(MenuScreen::new()));
        }
        ScreenAction::None
    }

    fn draw(&mut self, engine: &mut Engine) {
        self.scene.render(engine.backend());
    }
}
