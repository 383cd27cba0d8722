use std::collections::HashMap;
use std::path::Path;

use kira::{
    manager::{AudioManager, AudioManagerSettings, backend::DefaultBackend},
    sound::{static_sound::{StaticSoundData, StaticSoundHandle, StaticSoundSettings}, PlaybackRate},
    tween::Tween,
    Volume,
};
use log::{info, warn};
use rand::Rng;

/// Configuration for playing a sound with variation.
#[derive(Debug, Clone, Copy)]
pub struct SoundConfig {
    pub volume: f32,
    pub pitch: f32,
    /// Random pitch variation range (e.g. 0.1 = +/- 10%)
    pub pitch_variation: f32,
    pub volume_variation: f32,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self { volume: 1.0, pitch: 1.0, pitch_variation: 0.0, volume_variation: 0.0 }
    }
}

pub struct AudioContext {
    /// `None` when audio hardware is unavailable (headless / CI / no audio device).
    manager: Option<AudioManager>,
    sounds: HashMap<String, StaticSoundData>,
    active_music: Option<StaticSoundHandle>,
}

impl AudioContext {
    pub fn new() -> Self {
        let manager = match AudioManager::<DefaultBackend>::new(AudioManagerSettings::default()) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!("audio device unavailable ({e}); sound disabled");
                None
            }
        };
        Self { manager, sounds: HashMap::new(), active_music: None }
    }

    /// A context that never touches the audio device. Sounds can still be
    /// registered; playing them does nothing.
    pub fn disabled() -> Self {
        Self { manager: None, sounds: HashMap::new(), active_music: None }
    }

    pub fn is_available(&self) -> bool { self.manager.is_some() }

    pub fn has_sound(&self, name: &str) -> bool {
        self.sounds.contains_key(name)
    }

    /// Load a sound file (OGG or WAV) into memory. A missing or unreadable
    /// file is logged and the sound stays unregistered.
    pub fn load_sound<P: AsRef<Path>>(&mut self, name: &str, path: P) -> bool {
        let path = path.as_ref();
        if !path.exists() {
            warn!("sound '{name}' not found at {}", path.display());
            return false;
        }
        match StaticSoundData::from_file(path) {
            Ok(sound) => {
                self.sounds.insert(name.to_string(), sound);
                info!("loaded sound '{name}'");
                true
            }
            Err(e) => {
                warn!("failed to load sound '{name}' from {}: {e}", path.display());
                false
            }
        }
    }

    /// Play a sound once.
    pub fn play(&mut self, name: &str, config: SoundConfig) {
        let Some(manager) = self.manager.as_mut() else { return; };
        let Some(data) = self.sounds.get(name) else {
            warn!("sound '{name}' is not loaded");
            return;
        };
        let mut rng = rand::thread_rng();
        let p_offset = (rng.r#gen::<f32>() - 0.5) * 2.0 * config.pitch_variation;
        let v_offset = (rng.r#gen::<f32>() - 0.5) * 2.0 * config.volume_variation;

        let mut settings = StaticSoundSettings::new();
        settings.playback_rate = PlaybackRate::Factor((config.pitch + p_offset) as f64).into();
        settings.volume = Volume::Amplitude((config.volume + v_offset).clamp(0.0, 2.0) as f64).into();

        if let Err(e) = manager.play(data.clone().with_settings(settings)) {
            warn!("failed to play '{name}': {e}");
        }
    }

    /// Start looping background music, fading out whatever was playing.
    pub fn play_music(&mut self, name: &str, fade_in_secs: f32) {
        let Some(manager) = self.manager.as_mut() else { return; };
        let Some(data) = self.sounds.get(name) else {
            warn!("music '{name}' is not loaded");
            return;
        };
        if let Some(mut handle) = self.active_music.take() {
            let _ = handle.stop(Tween {
                duration: std::time::Duration::from_secs_f32(0.5),
                ..Default::default()
            });
        }

        let mut settings = StaticSoundSettings::new().loop_region(0.0..);
        settings.volume = Volume::Amplitude(0.0).into();

        match manager.play(data.clone().with_settings(settings)) {
            Ok(mut handle) => {
                let _ = handle.set_volume(Volume::Amplitude(1.0), Tween {
                    duration: std::time::Duration::from_secs_f32(fade_in_secs),
                    ..Default::default()
                });
                self.active_music = Some(handle);
            }
            Err(e) => warn!("failed to play music '{name}': {e}"),
        }
    }

    pub fn stop_music(&mut self, fade_out_secs: f32) {
        if let Some(mut handle) = self.active_music.take() {
            let _ = handle.stop(Tween {
                duration: std::time::Duration::from_secs_f32(fade_out_secs),
                ..Default::default()
            });
        }
    }
}

impl Default for AudioContext {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_ignored() {
        let mut audio = AudioContext::disabled();
        assert!(!audio.load_sound("boom", "does/not/exist.ogg"));
        assert!(!audio.has_sound("boom"));
        audio.play("boom", SoundConfig::default());
        audio.play_music("boom", 1.0);
    }
}
