//! Screens of the Dam Defense application, in the order a player meets them.

pub mod game_over;
pub mod loading;
pub mod menu;
pub mod pause;
pub mod play;
pub mod splash;

pub use game_over::GameOverScreen;
pub use loading::LoadingScreen;
pub use menu::MenuScreen;
pub use pause::PauseScreen;
pub use play::GameScreen;
pub use splash::SplashScreen;
