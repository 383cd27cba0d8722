use std::path::Path;

use glam::Vec4;
use log::info;

use crate::dam_defense::assets::{
    register_assets, MUSIC, SET_BOOT, SET_LOOKS, SET_WORLD, SHADER_SPRITE, SOUND_CANNON, SOUND_EXPLOSION, TEX_SPLASH,
};
use crate::dam_defense::screens::loading::LoadingScreen;
use crate::dam_defense::widgets::backdrop;
use crate::ecs::Entity;
use crate::engine::Engine;
use crate::error::TitanError;
use crate::scene::{Scene, Sprite2D};
use crate::screen::{Screen, ScreenAction};

pub const SPLASH_SECONDS: f32 = 4.0;

/// Title card shown while the world assets start decoding in the background.
pub struct SplashScreen {
    scene: Scene,
    card: Option<Entity>,
    elapsed: f32,
}

impl SplashScreen {
    pub fn new() -> Self {
        Self { scene: Scene::new(), card: None, elapsed: 0.0 }
    }
}

impl Default for SplashScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen for SplashScreen {
    fn name(&self) -> &'static str {
        "splash"
    }

    fn on_enter(&mut self, engine: &mut Engine) -> Result<(), TitanError> {
        let dir = Path::new(&engine.config.asset_dir).to_path_buf();
        register_assets(&mut engine.assets, &dir);
        engine.assets.load_set_now(engine.backend.as_mut(), SET_BOOT)?;
        engine.assets.load_set_in_background(SET_WORLD);
        engine.assets.load_set_in_background(SET_LOOKS);

        let sounds = dir.join("sounds");
        engine.audio.load_sound(SOUND_CANNON, sounds.join("cannon.ogg"));
        engine.audio.load_sound(SOUND_EXPLOSION, sounds.join("explosion.ogg"));
        if engine.audio.load_sound(MUSIC, sounds.join("music.ogg")) {
            engine.audio.play_music(MUSIC, 2.0);
        }

        let shader = engine.assets.get_shader(SHADER_SPRITE)?;
        let texture = engine.assets.get_texture_2d(TEX_SPLASH)?;
        self.card = Some(backdrop(&mut self.scene, shader, texture, Vec4::new(1.0, 1.0, 1.0, 0.0)));
        info!("assets from {} registered", dir.display());
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine) -> ScreenAction {
        self.elapsed += engine.dt();
        // Fade in over the first second.
        if let Some(sprite) = self.card.and_then(|e| self.scene.try_get_mut::<Sprite2D>(e)) {
            sprite.tint.w = self.elapsed.min(1.0);
        }
        if self.elapsed >= SPLASH_SECONDS {
            return ScreenAction::Switch(Box::new(LoadingScreen::new()));
        }
        ScreenAction::None
    }

    fn draw(&mut self, engine: &mut Engine) {
        self.scene.render(engine.backend());
    }
}
