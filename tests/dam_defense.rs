use std::path::Path;
use std::time::{Duration, Instant};

use glam::Vec3;
use titan::assets::AssetSystem;
use titan::config::{GameplayConfig, TitanConfig};
use titan::dam_defense::assets::{register_assets, SET_BOOT, SET_LOOKS, SET_WORLD};
use titan::dam_defense::{DamDefense, GameAssets, Outcome, SplashScreen};
use titan::engine::Engine;
use titan::graphics::HeadlessBackend;
use titan::input::{InputState, KeyCode, MouseButton};
use titan::screen::ScreenStack;

const DT: f32 = 1.0 / 60.0;

fn level(config: &GameplayConfig) -> (HeadlessBackend, DamDefense) {
    let mut backend = HeadlessBackend::new(640, 360);
    let mut assets = AssetSystem::new();
    register_assets(&mut assets, Path::new("no/such/dir"));
    for set in [SET_BOOT, SET_WORLD, SET_LOOKS] {
        assets.load_set_now(&mut backend, set).unwrap();
    }
    let resolved = GameAssets::resolve(&assets).unwrap();
    let game = DamDefense::new(&mut backend, resolved, config, 42).unwrap();
    (backend, game)
}

#[test]
fn first_wave_is_cleared_one_boat_at_a_time() {
    let config = GameplayConfig {
        time_between_waves: 0.1,
        time_between_spawns: 0.1,
        boat_speed: 0.0,
        ..GameplayConfig::default()
    };
    let (_backend, mut game) = level(&config);
    let input = InputState::new();

    let mut steps = 0;
    while game.spawner.still_to_spawn() > 0 {
        game.update(DT, &input);
        steps += 1;
        assert!(steps < 600, "wave never finished spawning");
    }
    let boats = game.boats();
    assert_eq!(boats.len(), 5);
    assert_eq!(game.spawner.remaining(), 5);

    // Spread them out so each ball can only touch its own boat.
    for (i, &boat) in boats.iter().enumerate() {
        game.scene.set_position(boat, Vec3::new(-100.0 + 50.0 * i as f32, -8.5, 200.0));
    }

    for (i, &boat) in boats.iter().enumerate() {
        let before = game.spawner.remaining();
        let at = game.scene.global_position(boat).unwrap();
        game.launch_ball(at, Vec3::ZERO);
        game.update(DT, &input);
        assert_eq!(game.spawner.remaining(), before - 1, "boat {i}");
    }
    assert_eq!(game.spawner.remaining(), 0);
    assert_eq!(game.state.boats_destroyed, 5);
    assert_eq!(game.outcome(), Outcome::Playing);

    // Sinking boats disappear after their countdown.
    for _ in 0..180 {
        game.update(DT, &input);
    }
    assert!(boats.iter().all(|&b| !game.scene.is_valid(b)));
}

#[test]
fn later_waves_grow_by_the_base_quota() {
    let config = GameplayConfig {
        time_between_waves: 0.05,
        time_between_spawns: 0.05,
        enemies_per_wave: 2,
        boat_speed: 0.0,
        ..GameplayConfig::default()
    };
    let (_backend, mut game) = level(&config);
    let input = InputState::new();

    for _ in 0..60 {
        game.update(DT, &input);
    }
    for boat in game.boats() {
        assert!(game.destroy_boat(boat));
    }
    assert_eq!(game.spawner.remaining(), 0);

    for _ in 0..30 {
        game.update(DT, &input);
    }
    assert_eq!(game.spawner.wave(), 2);
    assert_eq!(game.spawner.remaining(), 4);
}

#[test]
fn dam_falls_when_health_runs_out() {
    let config = GameplayConfig {
        time_between_waves: 1000.0,
        dam_max_health: 1.0,
        ..GameplayConfig::default()
    };
    let (_backend, mut game) = level(&config);
    game.state.dam_health = 0.0;
    game.update(DT, &InputState::new());
    assert_eq!(game.outcome(), Outcome::Lost);

    let frozen = game.spawner.clone();
    game.update(DT, &InputState::new());
    assert_eq!(game.spawner, frozen);
}

#[test]
fn screens_flow_from_splash_to_pause() {
    let config = TitanConfig { asset_dir: "no/such/dir".into(), ..TitanConfig::default() };
    let mut engine = Engine::headless(config);
    let mut screens = ScreenStack::new(Box::new(SplashScreen::new()));

    engine.step(&mut screens, DT).unwrap();
    assert_eq!(screens.top(), Some("splash"));
    for _ in 0..300 {
        if screens.top() != Some("splash") {
            break;
        }
        engine.step(&mut screens, DT).unwrap();
    }
    assert_ne!(screens.top(), Some("splash"));

    let deadline = Instant::now() + Duration::from_secs(20);
    while screens.top() == Some("loading") {
        assert!(Instant::now() < deadline, "background sets never arrived");
        std::thread::sleep(Duration::from_millis(2));
        engine.step(&mut screens, DT).unwrap();
    }
    assert_eq!(screens.top(), Some("menu"));
    engine.render(&mut screens).unwrap();

    // Centre of the play button on a 1920x1080 surface.
    engine.input.move_cursor(960.0, 529.0);
    engine.input.press_mouse(MouseButton::Left);
    engine.step(&mut screens, DT).unwrap();
    engine.input.release_mouse(MouseButton::Left);
    assert_eq!(screens.top(), Some("game"));

    engine.step(&mut screens, DT).unwrap();
    engine.input.press_key(KeyCode::Escape);
    engine.step(&mut screens, DT).unwrap();
    engine.input.release_key(KeyCode::Escape);
    assert_eq!(screens.top(), Some("pause"));
    assert_eq!(screens.len(), 2);

    engine.render(&mut screens).unwrap();
    screens.shutdown(&mut engine);
    assert!(screens.is_empty());
}
