//! Dam Defense: hold the dam against waves of boats with a cannon and a row
//! of flamethrowers.

pub mod assets;
pub mod components;
pub mod game;
pub mod screens;
pub mod waves;
pub mod widgets;

pub use assets::{register_assets, GameAssets};
pub use components::{Bird, EnemyComponent, Flamethrower};
pub use game::{DamDefense, DamDefenseState, GameEvent, LutChoice, Outcome};
pub use screens::SplashScreen;
pub use waves::{SpawnSide, WaveSpawner};
