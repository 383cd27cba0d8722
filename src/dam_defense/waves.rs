use log::{debug, info};

use crate::config::GameplayConfig;

/// Edge of the river a boat enters from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SpawnSide {
    /// Enters at +x and travels toward -x.
    Left,
    Right,
}

impl SpawnSide {
    pub fn flipped(self) -> Self {
        match self {
            SpawnSide::Left => SpawnSide::Right,
            SpawnSide::Right => SpawnSide::Left,
        }
    }
}

/// Wave timing. Alternates between the cooldown before a wave and spawning
/// its boats one by one from alternating sides.
///
/// `remaining` counts boats of the current wave that are still afloat; only
/// gameplay ([`WaveSpawner::enemy_killed`]) lowers it. A new wave starts once
/// it reaches zero and the cooldown has run out.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveSpawner {
    wave: u32,
    enemies_per_wave: u32,
    time_between_waves: f32,
    time_between_spawns: f32,
    cooldown: f32,
    spawn_timer: f32,
    remaining: u32,
    still_to_spawn: u32,
    side: SpawnSide,
}

impl WaveSpawner {
    pub fn new(config: &GameplayConfig, first_side: SpawnSide) -> Self {
        Self {
            wave: 1,
            enemies_per_wave: config.enemies_per_wave,
            time_between_waves: config.time_between_waves,
            time_between_spawns: config.time_between_spawns,
            cooldown: config.time_between_waves,
            spawn_timer: config.time_between_spawns,
            remaining: config.enemies_per_wave,
            still_to_spawn: config.enemies_per_wave,
            side: first_side,
        }
    }

    pub fn wave(&self) -> u32 { self.wave }
    pub fn remaining(&self) -> u32 { self.remaining }
    pub fn still_to_spawn(&self) -> u32 { self.still_to_spawn }
    pub fn cooldown(&self) -> f32 { self.cooldown }
    pub fn next_side(&self) -> SpawnSide { self.side }

    pub fn in_cooldown(&self) -> bool {
        self.cooldown >= 0.0
    }

    /// Advance by `dt`. Returns the side to spawn a boat on, at most one per call.
    pub fn update(&mut self, dt: f32) -> Option<SpawnSide> {
        if self.remaining == 0 && self.cooldown <= 0.0 {
            self.wave += 1;
            self.remaining = self.enemies_per_wave * self.wave;
            self.still_to_spawn = self.remaining;
            self.spawn_timer = self.time_between_spawns;
            self.cooldown = self.time_between_waves;
            info!("wave {} begins: {} boats", self.wave, self.remaining);
        }

        if self.cooldown >= 0.0 {
            self.cooldown -= dt;
            return None;
        }

        self.spawn_timer -= dt;
        if self.spawn_timer <= 0.0 && self.still_to_spawn > 0 {
            let side = self.side;
            self.side = side.flipped();
            self.spawn_timer = self.time_between_spawns;
            self.still_to_spawn -= 1;
            debug!("spawning boat on {side:?}, {} left to spawn", self.still_to_spawn);
            return Some(side);
        }
        None
    }

    /// A boat of the current wave was destroyed.
    pub fn enemy_killed(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
        self.still_to_spawn = self.still_to_spawn.min(self.remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GameplayConfig {
        GameplayConfig {
            enemies_per_wave: 2,
            time_between_waves: 1.0,
            time_between_spawns: 0.5,
            ..GameplayConfig::default()
        }
    }

    #[test]
    fn initial_state() {
        let s = WaveSpawner::new(&config(), SpawnSide::Right);
        assert_eq!(s.wave(), 1);
        assert_eq!(s.remaining(), 2);
        assert_eq!(s.still_to_spawn(), 2);
        assert!(s.in_cooldown());
    }

    #[test]
    fn spawns_alternate_sides_after_cooldown() {
        let mut s = WaveSpawner::new(&config(), SpawnSide::Left);
        let mut spawns = Vec::new();
        for _ in 0..40 {
            if let Some(side) = s.update(0.1) {
                spawns.push(side);
            }
        }
        assert_eq!(spawns, vec![SpawnSide::Left, SpawnSide::Right]);
        assert_eq!(s.still_to_spawn(), 0);
        assert_eq!(s.remaining(), 2);
        assert_eq!(s.wave(), 1);
    }

    #[test]
    fn clearing_a_wave_scales_the_next_quota() {
        let mut s = WaveSpawner::new(&config(), SpawnSide::Left);
        for _ in 0..40 {
            s.update(0.1);
        }
        s.enemy_killed();
        s.enemy_killed();
        s.update(0.1);
        assert_eq!(s.wave(), 2);
        assert_eq!(s.remaining(), 4);
        assert_eq!(s.still_to_spawn(), 4);
        assert!(s.in_cooldown());
    }

    #[test]
    fn kills_never_leave_more_to_spawn_than_remain() {
        let mut s = WaveSpawner::new(&config(), SpawnSide::Left);
        s.enemy_killed();
        assert!(s.still_to_spawn() <= s.remaining());
        s.enemy_killed();
        s.enemy_killed();
        assert_eq!(s.remaining(), 0);
        assert_eq!(s.still_to_spawn(), 0);
    }
}
