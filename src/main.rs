use log::error;

use titan::config::TitanConfig;
use titan::dam_defense::SplashScreen;
use titan::engine::Engine;
use titan::error::TitanError;

const CONFIG_FILE: &str = "titan.json";

fn run() -> Result<(), TitanError> {
    let config = TitanConfig::load_or_default(CONFIG_FILE)?;
    Engine::builder()
        .with_config(config)
        .run(Box::new(SplashScreen::new()))
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        error!("{e}");
        std::process::exit(1);
    }
}
