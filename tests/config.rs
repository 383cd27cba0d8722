use titan::config::{GameplayConfig, TitanConfig, WindowMode};
use titan::error::ConfigError;

#[test]
fn round_trips_through_json() {
    let mut config = TitanConfig::default();
    config.mode = WindowMode::Fullscreen;
    config.gameplay.last_wave = 5;
    let text = config.to_json().unwrap();
    assert_eq!(TitanConfig::from_json(&text).unwrap(), config);
}

#[test]
fn missing_file_gives_defaults() {
    let config = TitanConfig::load_or_default("definitely/not/here/titan.json").unwrap();
    assert_eq!(config, TitanConfig::default());
    assert_eq!(config.title, "Dam Defense");
}

#[test]
fn unreadable_file_is_an_error() {
    let dir = std::env::temp_dir().join(format!("titan-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("titan.json");
    std::fs::write(&path, "not json").unwrap();
    assert!(matches!(TitanConfig::load_or_default(&path), Err(ConfigError::Parse(_))));
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn damage_line_sits_behind_the_target() {
    let g = GameplayConfig::default();
    assert_eq!(g.damage_z(), g.z_target + 2.0 * g.z_target_distance);
    assert!(g.damage_z() > g.z_target);
}
