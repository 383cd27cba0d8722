use glam::Vec4;

use crate::dam_defense::assets::{SHADER_SPRITE, TEX_MENU_BG, TEX_PLAY, TEX_QUIT};
use crate::dam_defense::screens::play::GameScreen;
use crate::dam_defense::widgets::{backdrop, Button};
use crate::engine::Engine;
use crate::error::TitanError;
use crate::scene::Scene;
use crate::screen::{Screen, ScreenAction};

pub const PLAY_RECT: Vec4 = Vec4::new(0.4, 0.45, 0.2, 0.08);
pub const QUIT_RECT: Vec4 = Vec4::new(0.4, 0.58, 0.2, 0.08);

pub struct MenuScreen {
    scene: Scene,
    buttons: Option<(Button, Button)>,
}

impl MenuScreen {
    pub fn new() -> Self {
        Self { scene: Scene::new(), buttons: None }
    }
}

impl Default for MenuScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen for MenuScreen {
    fn name(&self) -> &'static str {
        "menu"
    }

    fn on_enter(&mut self, engine: &mut Engine) -> Result<(), TitanError> {
        let assets = &engine.assets;
        backdrop(&mut self.scene, assets.get_shader(SHADER_SPRITE)?, assets.get_texture_2d(TEX_MENU_BG)?, Vec4::ONE);
        let play = Button::new(&mut self.scene, assets, PLAY_RECT, TEX_PLAY)?;
        let quit = Button::new(&mut self.scene, assets, QUIT_RECT, TEX_QUIT)?;
        self.buttons = Some((play, quit));
        engine.input.request_cursor_lock(false);
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine) -> ScreenAction {
        let Some((play, quit)) = &self.buttons else {
            return ScreenAction::None;
        };
        let size = engine.surface_size();
        if play.update(&mut self.scene, &engine.input, size) {
            return ScreenAction::Switch(Box::new(GameScreen::new()));
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
