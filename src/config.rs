use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ── WindowMode ────────────────────────────────────────────────────────────────

/// Controls how the OS window is presented.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    /// Standard decorated window at the configured resolution.
    #[default]
    Windowed,
    /// Exclusive hardware fullscreen at the configured resolution.
    Fullscreen,
    /// Borderless window sized to the monitor's native resolution.
    Borderless,
}

// ── TitanConfig ───────────────────────────────────────────────────────────────

/// Engine settings. Every field falls back to its default when absent from
/// the file, so a partial JSON document is valid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitanConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub mode: WindowMode,
    /// Fixed simulation rate in updates per second.
    pub ups: u32,
    /// Root for texture, sound and music files.
    pub asset_dir: String,
    pub gameplay: GameplayConfig,
}

impl Default for TitanConfig {
    fn default() -> Self {
        Self {
            title: "Dam Defense".into(),
            width: 1920,
            height: 1080,
            mode: WindowMode::Windowed,
            ups: 60,
            asset_dir: "assets".into(),
            gameplay: GameplayConfig::default(),
        }
    }
}

impl TitanConfig {
    /// Read `path`, or return the defaults when it does not exist. A file
    /// that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Seconds per simulation step.
    pub fn fixed_dt(&self) -> f32 {
        1.0 / self.ups.max(1) as f32
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f32 / self.height as f32
    }
}

// ── GameplayConfig ────────────────────────────────────────────────────────────

/// Wave and combat tuning for Dam Defense.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameplayConfig {
    pub enemies_per_wave: u32,
    pub time_between_waves: f32,
    pub time_between_spawns: f32,
    /// Clearing this wave wins the game.
    pub last_wave: u32,
    pub dam_max_health: f32,
    pub enemy_damage_cooldown: f32,
    pub boat_speed: f32,
    /// z the boats stop at in front of the dam.
    pub z_target: f32,
    pub z_target_distance: f32,
    pub shoot_cooldown: f32,
    pub cannonball_force: f32,
    pub flamethrower_cooldown: f32,
    pub flamethrower_active_time: f32,
    /// Boats closer than this z are burnt while the flamethrowers run.
    pub flame_reach_z: f32,
    pub mouse_sensitivity: f32,
    pub max_look_degrees: f32,
    pub gravity: f32,
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            enemies_per_wave: 5,
            time_between_waves: 5.0,
            time_between_spawns: 2.0,
            last_wave: 3,
            dam_max_health: 100.0,
            enemy_damage_cooldown: 3.0,
            boat_speed: 25.0,
            z_target: 20.0,
            z_target_distance: 4.0,
            shoot_cooldown: 0.7,
            cannonball_force: 3000.0,
            flamethrower_cooldown: 45.0,
            flamethrower_active_time: 3.0,
            flame_reach_z: 27.0,
            mouse_sensitivity: 5.0,
            max_look_degrees: 85.0,
            gravity: -9.8,
        }
    }
}

impl GameplayConfig {
    /// z at or below which a boat is close enough to damage the dam.
    pub fn damage_z(&self) -> f32 {
        self.z_target + 2.0 * self.z_target_distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_shipped_game() {
        let c = TitanConfig::default();
        assert_eq!(c.title, "Dam Defense");
        assert_eq!((c.width, c.height), (1920, 1080));
        assert_eq!(c.mode, WindowMode::Windowed);
        assert_eq!(c.gameplay.enemies_per_wave, 5);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let c = TitanConfig::from_json(r#"{ "width": 800, "mode": "borderless", "gameplay": { "last_wave": 7 } }"#).unwrap();
        assert_eq!(c.width, 800);
        assert_eq!(c.height, 1080);
        assert_eq!(c.mode, WindowMode::Borderless);
        assert_eq!(c.gameplay.last_wave, 7);
        assert_eq!(c.gameplay.enemies_per_wave, 5);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(TitanConfig::from_json("{ width: }"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn fixed_dt_guards_zero_ups() {
        let c = TitanConfig { ups: 0, ..Default::default() };
        assert_eq!(c.fixed_dt(), 1.0);
    }
}
