use log::info;

use crate::dam_defense::assets::{GameAssets, SOUND_CANNON, SOUND_EXPLOSION};
use crate::dam_defense::game::{DamDefense, GameEvent, Outcome};
use crate::dam_defense::screens::game_over::GameOverScreen;
use crate::dam_defense::screens::pause::PauseScreen;
use crate::engine::Engine;
use crate::error::TitanError;
use crate::input::KeyCode;
use crate::screen::{Screen, ScreenAction};

/// The level itself. Esc pushes the pause overlay; a decided game switches
/// to the result screen.
pub struct GameScreen {
    seed: u64,
    game: Option<DamDefense>,
}

impl GameScreen {
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self { seed, game: None }
    }

    pub fn game(&self) -> Option<&DamDefense> {
        self.game.as_ref()
    }
}

impl Default for GameScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen for GameScreen {
    fn name(&self) -> &'static str {
        "game"
    }

    fn on_enter(&mut self, engine: &mut Engine) -> Result<(), TitanError> {
        let assets = GameAssets::resolve(&engine.assets)?;
        let game = DamDefense::new(engine.backend.as_mut(), assets, &engine.config.gameplay, self.seed)?;
        self.game = Some(game);
        engine.input.request_cursor_lock(true);
        info!("level started with seed {}", self.seed);
        Ok(())
    }

    fn on_exit(&mut self, engine: &mut Engine) {
        if let Some(game) = self.game.as_mut() {
            game.unload(engine.backend());
        }
        engine.input.request_cursor_lock(false);
    }

    fn on_resume(&mut self, engine: &mut Engine) {
        if let Some(game) = self.game.as_mut() {
            game.scene.set_paused(false);
        }
        engine.input.request_cursor_lock(true);
    }

    fn update(&mut self, engine: &mut Engine) -> ScreenAction {
        let Some(game) = self.game.as_mut() else {
            return ScreenAction::None;
        };
        if engine.is_key_pressed(KeyCode::Escape) {
            game.scene.set_paused(true);
            engine.input.request_cursor_lock(false);
            return ScreenAction::Push(Box::new(PauseScreen::new()));
        }

        for event in game.update(engine.dt(), &engine.input) {
            match event {
                GameEvent::CannonFired => engine.play_sound_varied(SOUND_CANNON, 0.8, 0.1),
                GameEvent::BoatDestroyed(_) => engine.play_sound_varied(SOUND_EXPLOSION, 1.0, 0.15),
                GameEvent::WaveStarted(wave) => info!("wave {wave}"),
                GameEvent::DamHit { .. } | GameEvent::FlamesStarted => {}
            }
        }

        match game.outcome() {
            Outcome::Playing => ScreenAction::None,
            outcome => ScreenAction::Switch(Box::new(GameOverScreen::new(
                outcome == Outcome::Won,
                game.state.boats_destroyed,
                game.spawner.wave(),
            ))),
        }
    }

    fn draw(&mut self, engine: &mut Engine) {
        if let Some(game) = self.game.as_mut() {
            game.render(engine.backend());
        }
    }

    fn resize(&mut self, engine: &mut Engine, width: u32, height: u32) -> Result<(), TitanError> {
        match self.game.as_mut() {
            Some(game) => game.resize(engine.backend(), width, height),
            None => Ok(()),
        }
    }
}
