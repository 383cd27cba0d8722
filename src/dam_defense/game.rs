use glam::{EulerRot, Quat, Vec2, Vec3, Vec4};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::animation::{MorphAnimation, MorphAnimator};
use crate::config::GameplayConfig;
use crate::dam_defense::assets::GameAssets;
use crate::dam_defense::components::{Bird, EnemyComponent, Flamethrower, TAG_BALL, TAG_BOAT};
use crate::dam_defense::waves::{SpawnSide, WaveSpawner};
use crate::ecs::Entity;
use crate::error::TitanError;
use crate::graphics::backend::{LutHandle, RenderBackend};
use crate::graphics::color_correct::ColorCorrect;
use crate::graphics::material::{Material, ShadingMode, SharedMaterial};
use crate::input::{InputState, KeyCode, MouseButton};
use crate::particles::{curves, ParticleSystem, ParticleTemplate, Ranged};
use crate::physics::PhysicsBody;
use crate::scene::{
    Camera, DeleteCountdown, Light, MeshRenderer, ParticleSystemComponent, PendingRemoval, Scene, Skybox, Sprite2D,
    Tag,
};
use crate::transform::{Transform, TransformId};

const CAMERA_POSITION: Vec3 = Vec3::new(0.0, 4.0, 0.0);
const CANNON_OFFSET: Vec3 = Vec3::new(0.0, -0.4, 0.25);
const SMOKE_OFFSET: Vec3 = Vec3::new(0.0, -0.2, 0.0);
const DAM_POSITION: Vec3 = Vec3::new(0.0, -10.0, 3.0);
const WATER_LEVEL: f32 = -10.0;

const ANIM_IDLE: usize = 0;
const ANIM_FIRING: usize = 1;

const BALL_SCALE: f32 = 0.35;
/// Cannonballs that fall this far are gone for good.
const BALL_FLOOR: f32 = -40.0;

const BOAT_SPAWN_X: f32 = 90.0;
const BOAT_SPAWN_Y: f32 = -8.5;
const BOAT_SPAWN_Z: f32 = 115.0;
const BOAT_HALF_EXTENTS: Vec3 = Vec3::new(2.0, 4.0, 8.95);
const BOAT_SINK_SECONDS: f32 = 2.5;
/// x of each path lane. Lanes 0..3 belong to the left bank, 3..6 to the right.
const LANE_X: [f32; 6] = [40.0, 25.0, 10.0, -10.0, -25.0, -40.0];

const EXPLOSION_SECONDS: f32 = 2.0;
const FLAMETHROWER_POSITIONS: [Vec3; 6] = [
    Vec3::new(5.0, -6.0, 2.0),
    Vec3::new(-5.0, -6.0, 2.0),
    Vec3::new(15.0, -6.0, 2.0),
    Vec3::new(-15.0, -6.0, 2.0),
    Vec3::new(40.0, -6.0, 2.0),
    Vec3::new(-40.0, -6.0, 2.0),
];

const BIRD_LOOP_SECONDS: f32 = 20.0;
const BIRD_START: Vec3 = Vec3::new(-120.0, 30.0, 90.0);
const BIRD_END: Vec3 = Vec3::new(120.0, 34.0, 60.0);
const BIRD_OFFSETS: [Vec3; 3] = [Vec3::ZERO, Vec3::new(3.0, -3.0, 3.0), Vec3::new(-3.0, -3.0, -3.0)];

const HEALTH_BAR_WIDTH: f32 = 0.3;

/// Color table applied by the color-correction effect.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LutChoice {
    Warm,
    Cool,
    Custom,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Playing,
    Won,
    Lost,
}

/// Something the screen layer may want to react to, e.g. with a sound.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum GameEvent {
    CannonFired,
    BoatDestroyed(Entity),
    DamHit { health: f32 },
    WaveStarted(u32),
    FlamesStarted,
}

/// Player and dam state that outlives individual entities.
#[derive(Clone, Debug, PartialEq)]
pub struct DamDefenseState {
    pub dam_health: f32,
    pub shoot_cooldown: f32,
    pub flamethrower_cooldown: f32,
    pub flame_time_left: f32,
    /// Yaw and pitch in degrees.
    pub look: Vec2,
    pub player_dir: Vec3,
    pub boats_destroyed: u32,
    pub active_lut: Option<LutChoice>,
    pub outcome: Outcome,
}

impl DamDefenseState {
    pub fn new(config: &GameplayConfig) -> Self {
        Self {
            dam_health: config.dam_max_health,
            shoot_cooldown: 0.0,
            flamethrower_cooldown: 0.0,
            flame_time_left: 0.0,
            look: Vec2::ZERO,
            player_dir: Vec3::Z,
            boats_destroyed: 0,
            active_lut: None,
            outcome: Outcome::Playing,
        }
    }
}

/// Rotation for a yaw/pitch pair in degrees. Positive yaw turns right,
/// positive pitch looks down.
pub fn look_rotation(look: Vec2) -> Quat {
    Quat::from_euler(EulerRot::YXZ, -look.x.to_radians(), look.y.to_radians(), 0.0)
}

/// The Dam Defense world: the scene plus the gameplay systems that drive it.
pub struct DamDefense {
    pub scene: Scene,
    pub state: DamDefenseState,
    pub spawner: WaveSpawner,
    config: GameplayConfig,
    assets: GameAssets,
    rng: StdRng,
    camera: Entity,
    cannon: Entity,
    smoke: Entity,
    health_bar: Entity,
    materials: Vec<SharedMaterial>,
    boat_material: SharedMaterial,
    ball_material: SharedMaterial,
    particle_material: SharedMaterial,
}

impl DamDefense {
    /// Build the level and its post-effect chain at the backend's surface size.
    pub fn new(
        backend: &mut dyn RenderBackend,
        assets: GameAssets,
        config: &GameplayConfig,
        seed: u64,
    ) -> Result<Self, TitanError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut scene = Scene::new();
        scene.gravity = Vec3::new(0.0, config.gravity, 0.0);
        scene.ambient_color = Vec3::new(1.0, 0.97, 0.9);
        scene.ambient_strength = 0.35;

        let (width, height) = backend.surface_size();
        scene.init_effects(backend, width, height)?;
        let mut color_correct = ColorCorrect::new();
        color_correct.set_should_apply(false);
        color_correct.set_cube(Some(assets.lut_warm));
        scene.effects_mut().push(backend, Box::new(color_correct))?;

        scene.set_skybox(Some(Skybox { cubemap: assets.sky, mesh: assets.sky_cube, shader: assets.skybox_shader }));

        let material = |albedo| Material::new().with_albedo(Some(albedo)).with_mode(ShadingMode::AmbientSpecular).shared();
        let cannon_material = material(assets.cannon_tex);
        let boat_material = material(assets.boat_tex);
        let ball_material = material(assets.cannonball_tex);
        let dam_material = material(assets.dam_tex);
        let water_material = material(assets.water_tex);
        let bird_material = material(assets.bird_tex);
        let particle_material = Material::new().with_albedo(Some(assets.particle_tex)).shared();
        let materials = vec![
            cannon_material.clone(),
            boat_material.clone(),
            ball_material.clone(),
            dam_material.clone(),
            water_material.clone(),
            bird_material.clone(),
        ];

        let sun = scene.create_entity();
        scene.attach_transform(sun, Transform::new(Vec3::ZERO, Vec3::new(50.0, -30.0, 0.0), Vec3::ONE));
        scene.attach(sun, Light { color: Vec3::new(1.0, 0.95, 0.85), strength: 1.0 });
        scene.add_light(sun);

        let camera = scene.create_entity();
        scene.attach_transform(camera, Transform::from_position(CAMERA_POSITION));
        scene.attach(camera, Camera::perspective(60.0, 0.1, 1000.0));
        scene.set_camera(Some(camera));

        let cannon = scene.create_entity();
        scene.attach_transform(cannon, Transform::from_position(CANNON_OFFSET).with_scale(Vec3::splat(0.3)));
        scene.set_parent(cannon, Some(camera));
        scene.attach(cannon, MeshRenderer::new(assets.cannon, assets.lit, cannon_material));
        scene.attach(cannon, MorphAnimator::cannon());

        let dam = scene.create_entity();
        scene.attach_transform(dam, Transform::from_position(DAM_POSITION));
        scene.attach(dam, MeshRenderer::new(assets.dam, assets.lit, dam_material.clone()));

        let water = scene.create_entity();
        scene.attach_transform(water, Transform::from_position(Vec3::new(0.0, WATER_LEVEL, 150.0)));
        scene.attach(water, MeshRenderer::new(assets.water, assets.lit, water_material));

        for position in FLAMETHROWER_POSITIONS {
            let e = scene.create_entity();
            scene.attach_transform(e, Transform::from_position(position));
            scene.attach(e, MeshRenderer::new(assets.flamethrower, assets.lit, dam_material.clone()));
            scene.attach(e, Flamethrower);
        }

        let smoke = scene.create_entity();
        scene.attach_transform(smoke, Transform::default());
        let smoke_template = ParticleTemplate {
            lifetime: Ranged::two(config.shoot_cooldown - 0.1, config.shoot_cooldown),
            start_color: Ranged::one(Vec4::new(0.1, 0.1, 0.1, 0.8)),
            end_color: Ranged::one(Vec4::new(0.5, 0.5, 0.5, 0.1)),
            start_size: Ranged::one(0.05),
            end_size: Ranged::one(0.05),
            start_speed: Ranged::two(1.5, 1.0),
            end_speed: Ranged::one(0.05),
            mesh: Some(assets.quad),
            material: Some(particle_material.clone()),
        };
        let mut smoke_system = ParticleSystem::with_seed(5000, 0.0, smoke_template, 0.0, false, rng.r#gen());
        smoke_system.make_circle_emitter(Vec3::ZERO);
        scene.attach(smoke, ParticleSystemComponent::new(smoke_system, assets.particles));

        for offset in BIRD_OFFSETS {
            let bird = scene.create_entity();
            scene.attach_transform(bird, Transform::from_position(BIRD_START + offset).with_scale(Vec3::splat(1.5)));
            scene.attach(bird, Bird { offset });
            scene.attach(bird, MeshRenderer::new(assets.bird, assets.lit, bird_material.clone()));
            scene.attach(bird, MorphAnimator::new(vec![MorphAnimation::new(0, 2, 10.0 / 24.0, true)]));
        }

        let crosshair = scene.create_entity();
        let mut sprite = Sprite2D::new(Some(assets.crosshair_tex), assets.sprite, Vec4::new(0.4975, 0.495, 0.005, 0.01));
        sprite.layer = 10;
        scene.attach(crosshair, sprite);

        let health_bar = scene.create_entity();
        let mut sprite = Sprite2D::new(Some(assets.health_tex), assets.sprite, Vec4::new(0.02, 0.03, HEALTH_BAR_WIDTH, 0.025));
        sprite.layer = 10;
        scene.attach(health_bar, sprite);

        let first_side = if rng.gen_bool(0.5) { SpawnSide::Left } else { SpawnSide::Right };
        info!("dam defense level built, first boat from the {first_side:?}");

        Ok(Self {
            scene,
            state: DamDefenseState::new(config),
            spawner: WaveSpawner::new(config, first_side),
            config: config.clone(),
            assets,
            rng,
            camera,
            cannon,
            smoke,
            health_bar,
            materials,
            boat_material,
            ball_material,
            particle_material,
        })
    }

    pub fn config(&self) -> &GameplayConfig {
        &self.config
    }

    pub fn camera(&self) -> Entity {
        self.camera
    }

    pub fn cannon(&self) -> Entity {
        self.cannon
    }

    pub fn outcome(&self) -> Outcome {
        self.state.outcome
    }

    /// Boats still afloat.
    pub fn boats(&self) -> Vec<Entity> {
        self.scene.alive_view::<(EnemyComponent,)>().collect()
    }

    pub fn materials(&self) -> &[SharedMaterial] {
        &self.materials
    }

    // ── Frame ────────────────────────────────────────────────────────────

    /// Run one simulation step. Nothing moves while the scene is paused or
    /// the game is decided.
    pub fn update(&mut self, dt: f32, input: &InputState) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if self.scene.is_paused() || self.state.outcome != Outcome::Playing {
            return events;
        }

        self.handle_toggles(input);
        self.rotate_player(dt, input);
        self.update_cannon(input, &mut events);
        self.cleanup_cannonballs();
        self.tick_cooldowns(dt);
        self.run_waves(dt, &mut events);
        self.steer_enemies(dt);
        self.update_flamethrowers(input, &mut events);
        self.update_birds();
        self.scene.update(dt);
        self.resolve_collisions(&mut events);
        self.apply_damage(dt, &mut events);
        self.update_outcome();
        self.update_health_bar();
        self.scene.sweep();
        events
    }

    pub fn render(&mut self, backend: &mut dyn RenderBackend) {
        self.scene.render(backend);
    }

    fn handle_toggles(&mut self, input: &InputState) {
        const MODES: [(KeyCode, ShadingMode); 5] = [
            (KeyCode::F1, ShadingMode::NoLight),
            (KeyCode::F2, ShadingMode::Ambient),
            (KeyCode::F3, ShadingMode::Specular),
            (KeyCode::F4, ShadingMode::AmbientSpecular),
            (KeyCode::F5, ShadingMode::Custom),
        ];
        for (key, mode) in MODES {
            if input.is_key_pressed(key) {
                self.set_shading(mode);
            }
        }
        for (key, lut) in [(KeyCode::F6, LutChoice::Warm), (KeyCode::F7, LutChoice::Cool), (KeyCode::F8, LutChoice::Custom)] {
            if input.is_key_pressed(key) {
                self.toggle_lut(lut);
            }
        }
    }

    /// Switch every world material to `mode`.
    pub fn set_shading(&mut self, mode: ShadingMode) {
        for material in &self.materials {
            let mut m = material.borrow_mut();
            match mode {
                ShadingMode::NoLight => m.set_no_light(true),
                ShadingMode::Ambient => m.set_ambient(true),
                ShadingMode::Specular => m.set_specular(true),
                ShadingMode::AmbientSpecular => m.set_ambient_specular(true),
                ShadingMode::Custom => m.set_custom(true),
            }
        }
        debug!("shading mode set to {mode:?}");
    }

    /// Apply `lut`, or turn color correction off when it is already the
    /// active one. At most one table is active.
    pub fn toggle_lut(&mut self, lut: LutChoice) {
        let off = self.state.active_lut == Some(lut);
        self.state.active_lut = if off { None } else { Some(lut) };
        let cube = self.lut_handle(lut);
        if let Some(cc) = self.scene.effects_mut().get_mut::<ColorCorrect>() {
            cc.set_cube(Some(cube));
            cc.set_should_apply(!off);
        }
        debug!("color table {lut:?} {}", if off { "off" } else { "on" });
    }

    fn lut_handle(&self, lut: LutChoice) -> LutHandle {
        match lut {
            LutChoice::Warm => self.assets.lut_warm,
            LutChoice::Cool => self.assets.lut_cool,
            LutChoice::Custom => self.assets.lut_custom,
        }
    }

    fn rotate_player(&mut self, dt: f32, input: &InputState) {
        let [dx, dy] = input.mouse_delta;
        let speed = self.config.mouse_sensitivity * dt;
        let max = self.config.max_look_degrees;
        let look = &mut self.state.look;
        look.x = (look.x + dx * speed).clamp(-max, max);
        look.y = (look.y + dy * speed).clamp(-max, max);

        let rotation = look_rotation(*look);
        self.state.player_dir = rotation * Vec3::Z;
        self.scene.update_transform(self.camera, |t| t.rotation = rotation);
    }

    fn update_cannon(&mut self, input: &InputState, events: &mut Vec<GameEvent>) {
        let animator = self.scene.get_mut::<MorphAnimator>(self.cannon);
        if animator.current() == ANIM_FIRING && animator.is_done() {
            animator.play(ANIM_IDLE);
        }
        let idle = animator.current() == ANIM_IDLE;
        if idle && self.state.shoot_cooldown <= 0.0 && input.is_mouse_held(MouseButton::Left) {
            self.fire_cannonball();
            events.push(GameEvent::CannonFired);
        }
    }

    /// Fire from the cannon along the player's aim, with muzzle smoke.
    pub fn fire_cannonball(&mut self) -> Entity {
        self.scene.get_mut::<MorphAnimator>(self.cannon).play(ANIM_FIRING);
        self.state.shoot_cooldown = self.config.shoot_cooldown;

        let dir = self.state.player_dir;
        let origin = self.scene.global_position(self.cannon).unwrap_or(CAMERA_POSITION);
        let ball = self.launch_ball(origin, dir * self.config.cannonball_force);

        let eye = self.scene.global_position(self.camera).unwrap_or(CAMERA_POSITION);
        self.scene.set_position(self.smoke, eye + SMOKE_OFFSET + dir * 1.5);
        let look = self.state.look;
        if let Some(smoke) = self.scene.try_get_mut::<ParticleSystemComponent>(self.smoke) {
            smoke.system.set_emitter_rotation(Vec3::new(look.y, -look.x, 0.0));
            smoke.system.burst(500);
        }
        ball
    }

    /// Spawn a cannonball at `origin` pushed by `force` on its first step.
    pub fn launch_ball(&mut self, origin: Vec3, force: Vec3) -> Entity {
        let ball = self.scene.create_entity();
        self.scene
            .attach_transform(ball, Transform::from_position(origin).with_scale(Vec3::splat(BALL_SCALE)));
        self.scene.attach(ball, Tag::new(TAG_BALL));
        self.scene
            .attach(ball, MeshRenderer::new(self.assets.sphere, self.assets.lit, self.ball_material.clone()));
        let mut body = PhysicsBody::dynamic(Vec3::splat(BALL_SCALE));
        body.add_force(force);
        self.scene.attach(ball, body);
        debug!("cannonball {ball:?} launched from {origin}");
        ball
    }

    fn cleanup_cannonballs(&mut self) {
        let fallen: Vec<Entity> = self
            .scene
            .alive_view::<(Tag, TransformId)>()
            .filter(|&e| self.scene.tag(e) == Some(TAG_BALL))
            .filter(|&e| self.scene.global_position(e).is_some_and(|p| p.y <= BALL_FLOOR))
            .collect();
        for ball in fallen {
            self.scene.delete_entity(ball);
        }
    }

    fn tick_cooldowns(&mut self, dt: f32) {
        let s = &mut self.state;
        s.shoot_cooldown = (s.shoot_cooldown - dt).max(0.0);
        s.flamethrower_cooldown = (s.flamethrower_cooldown - dt).max(0.0);
        s.flame_time_left = (s.flame_time_left - dt).max(0.0);
    }

    fn run_waves(&mut self, dt: f32, events: &mut Vec<GameEvent>) {
        let wave = self.spawner.wave();
        let spawn = self.spawner.update(dt);
        if self.spawner.wave() != wave {
            events.push(GameEvent::WaveStarted(self.spawner.wave()));
        }
        if let Some(side) = spawn {
            self.spawn_boat(side);
        }
    }

    /// Put a boat on the river at `side`'s bank, heading for a random lane.
    pub fn spawn_boat(&mut self, side: SpawnSide) -> Entity {
        let model = self.rng.gen_range(0..self.assets.boats.len());
        let speed = self.config.boat_speed;
        let (x, vx, lane) = match side {
            SpawnSide::Left => (BOAT_SPAWN_X, -speed, self.rng.gen_range(0..3)),
            SpawnSide::Right => (-BOAT_SPAWN_X, speed, self.rng.gen_range(3..6)),
        };

        let boat = self.scene.create_entity();
        let mut transform = Transform::from_position(Vec3::new(x, BOAT_SPAWN_Y, BOAT_SPAWN_Z));
        transform.look_along(Vec3::new(vx, 0.0, 0.0), Vec3::Y);
        self.scene.attach_transform(boat, transform);
        self.scene.attach(boat, Tag::new(TAG_BOAT));
        self.scene.attach(boat, EnemyComponent::new(model, lane));
        self.scene.attach(
            boat,
            PhysicsBody::dynamic(BOAT_HALF_EXTENTS)
                .with_gravity(false)
                .with_velocity(Vec3::new(vx, 0.0, 0.0)),
        );
        self.scene
            .attach(boat, MeshRenderer::new(self.assets.boats[model], self.assets.lit, self.boat_material.clone()));
        debug!("boat {boat:?} spawned on the {side:?} bank for lane {lane}");
        boat
    }

    /// Boats run across to their lane, then straight at the dam, and stop at
    /// the target line.
    fn steer_enemies(&mut self, dt: f32) {
        let speed = self.config.boat_speed;
        let snap = (speed * dt).max(0.5);
        let boats: Vec<Entity> = self.scene.alive_view::<(EnemyComponent, PhysicsBody)>().collect();
        for boat in boats {
            let lane_x = LANE_X[self.scene.get::<EnemyComponent>(boat).lane % LANE_X.len()];
            let Some(local) = self.scene.local_transform(boat) else { continue };
            let pos = local.position;
            let dx = lane_x - pos.x;

            let velocity = if dx.abs() > snap {
                Vec3::new(dx.signum() * speed, 0.0, 0.0)
            } else if pos.z > self.config.z_target {
                if dx != 0.0 {
                    self.scene.set_position(boat, Vec3::new(lane_x, pos.y, pos.z));
                }
                Vec3::new(0.0, 0.0, -speed)
            } else {
                Vec3::ZERO
            };

            self.scene.get_mut::<PhysicsBody>(boat).velocity = velocity;
            if velocity != Vec3::ZERO {
                self.scene.update_transform(boat, |t| t.look_along(velocity, Vec3::Y));
            }
        }
    }

    fn update_flamethrowers(&mut self, input: &InputState, events: &mut Vec<GameEvent>) {
        if input.is_key_pressed(KeyCode::Digit2) && self.state.flamethrower_cooldown <= 0.0 {
            self.start_flames();
            events.push(GameEvent::FlamesStarted);
        }
        if self.state.flame_time_left <= 0.0 {
            return;
        }
        let reach = self.config.flame_reach_z;
        let burnt: Vec<Entity> = self
            .scene
            .alive_view::<(EnemyComponent, TransformId)>()
            .filter(|&e| self.scene.global_position(e).is_some_and(|p| p.z < reach))
            .collect();
        for boat in burnt {
            if self.destroy_boat(boat) {
                events.push(GameEvent::BoatDestroyed(boat));
            }
        }
    }

    /// Light every flamethrower for the configured active time.
    pub fn start_flames(&mut self) {
        let active = self.config.flamethrower_active_time;
        self.state.flamethrower_cooldown = self.config.flamethrower_cooldown;
        self.state.flame_time_left = active;

        let turrets: Vec<Vec3> = self
            .scene
            .view::<(Flamethrower, TransformId)>()
            .iter()
            .filter_map(|e| self.scene.global_position(e))
            .collect();
        for position in turrets {
            let template = ParticleTemplate {
                lifetime: Ranged::one(2.0),
                start_color: Ranged::two(Vec4::new(1.0, 0.35, 0.0, 1.0), Vec4::new(1.0, 0.6, 0.0, 1.0)),
                end_color: Ranged::one(Vec4::new(1.0, 0.2, 0.0, 0.0)),
                start_size: Ranged::one(0.5),
                end_size: Ranged::one(4.0),
                start_speed: Ranged::one(8.5),
                end_speed: Ranged::one(6.0),
                mesh: Some(self.assets.quad),
                material: Some(self.particle_material.clone()),
            };
            let mut fire = ParticleSystem::with_seed(1200, 300.0, template, 2.0, true, self.rng.r#gen());
            fire.make_cone_emitter(15.0, Vec3::new(90.0, 0.0, 0.0));
            let e = self.scene.create_entity_with_countdown(active);
            self.scene.attach_transform(e, Transform::from_position(position + Vec3::new(0.0, 0.0, 2.0)));
            self.scene.attach(e, ParticleSystemComponent::new(fire, self.assets.particles));
        }
        info!("flamethrowers lit for {active}s");
    }

    fn update_birds(&mut self) {
        let t = (self.scene.elapsed() % BIRD_LOOP_SECONDS) / BIRD_LOOP_SECONDS;
        let path = BIRD_START.lerp(BIRD_END, t);
        let heading = BIRD_END - BIRD_START;
        let birds: Vec<(Entity, Vec3)> = self.scene.world().query::<Bird>().map(|(e, b)| (e, b.offset)).collect();
        for (bird, offset) in birds {
            self.scene.update_transform(bird, |tr| {
                tr.position = path + offset;
                tr.look_along(heading, Vec3::Y);
            });
        }
    }

    // ── Collisions and damage ────────────────────────────────────────────

    /// Handle this step's contacts. A ball touching a live boat destroys both;
    /// a boat already going down still eats the ball but is not counted twice.
    fn resolve_collisions(&mut self, events: &mut Vec<GameEvent>) {
        let contacts = self.scene.collisions().to_vec();
        for (a, b) in contacts {
            if !self.scene.is_valid(a) || !self.scene.is_valid(b) {
                continue;
            }
            let (boat, ball) = match (self.scene.tag(a), self.scene.tag(b)) {
                (Some(TAG_BOAT), Some(TAG_BALL)) => (a, b),
                (Some(TAG_BALL), Some(TAG_BOAT)) => (b, a),
                _ => continue,
            };
            self.scene.delete_entity(ball);
            if self.destroy_boat(boat) {
                events.push(GameEvent::BoatDestroyed(boat));
            }
        }
    }

    /// Blow up a live boat. Returns `false` for stale or already sinking boats.
    pub fn destroy_boat(&mut self, boat: Entity) -> bool {
        if !self.scene.is_valid(boat)
            || self.scene.has::<DeleteCountdown>(boat)
            || self.scene.has::<PendingRemoval>(boat)
        {
            return false;
        }
        if let Some(position) = self.scene.global_position(boat) {
            self.spawn_explosion(position);
        }
        self.scene.remove::<PhysicsBody>(boat);
        self.scene.attach(boat, DeleteCountdown::new(BOAT_SINK_SECONDS));
        if let Some(enemy) = self.scene.try_get_mut::<EnemyComponent>(boat) {
            enemy.alive = false;
        }
        self.spawner.enemy_killed();
        self.state.boats_destroyed += 1;
        debug!("boat {boat:?} destroyed, {} left this wave", self.spawner.remaining());
        true
    }

    fn spawn_explosion(&mut self, position: Vec3) -> Entity {
        let template = ParticleTemplate {
            lifetime: Ranged::two(1.8, 2.0),
            start_color: Ranged::two(Vec4::new(1.0, 0.35, 0.0, 1.0), Vec4::new(1.0, 0.6, 0.0, 1.0)),
            end_color: Ranged::two(Vec4::new(0.5, 0.1, 0.0, 0.2), Vec4::new(0.8, 0.3, 0.0, 0.2)),
            start_size: Ranged::one(1.0),
            end_size: Ranged::one(4.5),
            start_speed: Ranged::one(4.5),
            end_speed: Ranged::one(0.05),
            mesh: Some(self.assets.quad),
            material: Some(self.particle_material.clone()),
        };
        let mut system = ParticleSystem::with_seed(500, 0.0, template, 0.0, false, self.rng.r#gen());
        system.make_sphere_emitter();
        system.set_velocity_curve(curves::fast_start);
        system.set_color_curve(curves::slow_start);
        system.set_scale_curve(curves::zero_one_zero);
        system.burst(500);

        let e = self.scene.create_entity_with_countdown(EXPLOSION_SECONDS);
        self.scene.attach_transform(e, Transform::from_position(position));
        self.scene.attach(e, ParticleSystemComponent::new(system, self.assets.particles));
        e
    }

    fn apply_damage(&mut self, dt: f32, events: &mut Vec<GameEvent>) {
        let damage_z = self.config.damage_z();
        let boats: Vec<Entity> = self.scene.alive_view::<(EnemyComponent, TransformId)>().collect();
        for boat in boats {
            let Some(z) = self.scene.global_position(boat).map(|p| p.z) else { continue };
            let enemy = self.scene.get_mut::<EnemyComponent>(boat);
            if z <= damage_z && enemy.cooldown <= 0.0 {
                enemy.cooldown = self.config.enemy_damage_cooldown;
                self.state.dam_health -= 1.0;
                events.push(GameEvent::DamHit { health: self.state.dam_health });
            } else {
                enemy.cooldown -= dt;
            }
        }
    }

    fn update_outcome(&mut self) {
        if self.state.dam_health <= 0.0 {
            self.state.outcome = Outcome::Lost;
            info!("the dam has fallen after {} boats", self.state.boats_destroyed);
        } else if self.spawner.wave() >= self.config.last_wave && self.spawner.remaining() == 0 {
            self.state.outcome = Outcome::Won;
            info!("all {} waves repelled", self.config.last_wave);
        }
    }

    fn update_health_bar(&mut self) {
        let fraction = (self.state.dam_health / self.config.dam_max_health.max(1.0)).clamp(0.0, 1.0);
        if let Some(bar) = self.scene.try_get_mut::<Sprite2D>(self.health_bar) {
            bar.rect.z = HEALTH_BAR_WIDTH * fraction;
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    pub fn resize(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) -> Result<(), TitanError> {
        self.scene.reshape(backend, width, height)?;
        Ok(())
    }

    pub fn unload(&mut self, backend: &mut dyn RenderBackend) {
        self.scene.unload(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetSystem;
    use crate::dam_defense::assets::{register_assets, SET_BOOT, SET_LOOKS, SET_WORLD};
    use crate::graphics::post_effect::PostEffect;
    use crate::graphics::HeadlessBackend;
    use approx::assert_relative_eq;
    use std::path::Path;

    fn quiet_config() -> GameplayConfig {
        GameplayConfig { time_between_waves: 1000.0, ..GameplayConfig::default() }
    }

    fn game(config: &GameplayConfig) -> (HeadlessBackend, DamDefense) {
        let mut backend = HeadlessBackend::new(320, 180);
        let mut assets = AssetSystem::new();
        register_assets(&mut assets, Path::new("no/such/dir"));
        for set in [SET_BOOT, SET_WORLD, SET_LOOKS] {
            assets.load_set_now(&mut backend, set).unwrap();
        }
        let resolved = GameAssets::resolve(&assets).unwrap();
        let game = DamDefense::new(&mut backend, resolved, config, 7).unwrap();
        (backend, game)
    }

    fn idle() -> InputState {
        InputState::new()
    }

    #[test]
    fn ball_on_boat_sinks_the_boat() {
        let (_backend, mut g) = game(&quiet_config());
        let boat = g.spawn_boat(SpawnSide::Left);
        let at = g.scene.global_position(boat).unwrap();
        let ball = g.launch_ball(at, Vec3::ZERO);

        let events = g.update(1.0 / 60.0, &idle());

        assert!(!g.scene.is_valid(ball));
        assert!(!g.scene.has::<PhysicsBody>(boat));
        assert!(g.scene.get::<DeleteCountdown>(boat).duration > 0.0);
        assert!(!g.scene.get::<EnemyComponent>(boat).alive);
        assert_eq!(g.spawner.remaining(), 4);
        assert!(events.contains(&GameEvent::BoatDestroyed(boat)));
    }

    #[test]
    fn two_balls_on_one_boat_count_once() {
        let (_backend, mut g) = game(&quiet_config());
        let boat = g.spawn_boat(SpawnSide::Right);
        let at = g.scene.global_position(boat).unwrap();
        let first = g.launch_ball(at, Vec3::ZERO);
        let second = g.launch_ball(at + Vec3::Y, Vec3::ZERO);

        g.update(1.0 / 60.0, &idle());

        assert!(!g.scene.is_valid(first));
        assert!(!g.scene.is_valid(second));
        assert_eq!(g.spawner.remaining(), 4);
        assert_eq!(g.state.boats_destroyed, 1);
    }

    #[test]
    fn boats_colliding_with_each_other_are_ignored() {
        let (_backend, mut g) = game(&quiet_config());
        let a = g.spawn_boat(SpawnSide::Left);
        let b = g.spawn_boat(SpawnSide::Left);
        g.update(1.0 / 60.0, &idle());
        assert!(g.scene.has::<PhysicsBody>(a));
        assert!(g.scene.has::<PhysicsBody>(b));
        assert_eq!(g.spawner.remaining(), 5);
    }

    #[test]
    fn boat_at_the_dam_deals_damage_on_cooldown() {
        let config = quiet_config();
        let (_backend, mut g) = game(&config);
        let boat = g.spawn_boat(SpawnSide::Left);
        g.scene.set_position(boat, Vec3::new(LANE_X[0], BOAT_SPAWN_Y, config.z_target));
        g.scene.get_mut::<EnemyComponent>(boat).lane = 0;

        let events = g.update(1.0 / 60.0, &idle());
        assert!(matches!(events.as_slice(), [GameEvent::DamHit { .. }]));
        assert_relative_eq!(g.state.dam_health, config.dam_max_health - 1.0);

        g.update(1.0 / 60.0, &idle());
        assert_relative_eq!(g.state.dam_health, config.dam_max_health - 1.0);
    }

    #[test]
    fn steering_turns_toward_lane_then_dam() {
        let (_backend, mut g) = game(&quiet_config());
        let boat = g.spawn_boat(SpawnSide::Left);
        let lane = g.scene.get::<EnemyComponent>(boat).lane;
        g.update(1.0 / 60.0, &idle());
        assert!(g.scene.get::<PhysicsBody>(boat).velocity.x < 0.0);

        g.scene.set_position(boat, Vec3::new(LANE_X[lane], BOAT_SPAWN_Y, BOAT_SPAWN_Z));
        g.update(1.0 / 60.0, &idle());
        let v = g.scene.get::<PhysicsBody>(boat).velocity;
        assert_eq!(v.x, 0.0);
        assert!(v.z < 0.0);
    }

    #[test]
    fn flamethrower_burns_close_boats_and_then_cools_down() {
        let config = quiet_config();
        let (_backend, mut g) = game(&config);
        let near = g.spawn_boat(SpawnSide::Left);
        g.scene.set_position(near, Vec3::new(10.0, BOAT_SPAWN_Y, config.flame_reach_z - 1.0));
        let far = g.spawn_boat(SpawnSide::Right);

        let mut input = InputState::new();
        input.press_key(KeyCode::Digit2);
        let events = g.update(1.0 / 60.0, &input);

        assert!(events.contains(&GameEvent::FlamesStarted));
        assert!(events.contains(&GameEvent::BoatDestroyed(near)));
        assert!(g.scene.get::<EnemyComponent>(far).alive);
        assert_relative_eq!(g.state.flamethrower_cooldown, config.flamethrower_cooldown);

        input.clear_frame_state();
        input.release_key(KeyCode::Digit2);
        input.press_key(KeyCode::Digit2);
        let events = g.update(1.0 / 60.0, &input);
        assert!(!events.contains(&GameEvent::FlamesStarted));
    }

    #[test]
    fn firing_needs_idle_cannon_and_cooldown() {
        let (_backend, mut g) = game(&quiet_config());
        let mut input = InputState::new();
        input.press_mouse(MouseButton::Left);

        let events = g.update(1.0 / 60.0, &input);
        assert_eq!(events, vec![GameEvent::CannonFired]);
        let events = g.update(1.0 / 60.0, &input);
        assert!(events.is_empty());
        assert!(g.state.shoot_cooldown > 0.0);
    }

    #[test]
    fn look_is_clamped_and_drives_the_aim() {
        let config = quiet_config();
        let (_backend, mut g) = game(&config);
        let mut input = InputState::new();
        input.add_motion(1.0e6, 0.0);
        g.update(1.0 / 60.0, &input);
        assert_relative_eq!(g.state.look.x, config.max_look_degrees);
        assert!(g.state.player_dir.x < 0.0, "turning right aims toward -x");
    }

    #[test]
    fn shading_keys_switch_every_material() {
        let (_backend, mut g) = game(&quiet_config());
        let mut input = InputState::new();
        input.press_key(KeyCode::F1);
        g.update(1.0 / 60.0, &input);
        assert!(g.materials().iter().all(|m| m.borrow().is_no_light()));
        g.set_shading(ShadingMode::Custom);
        assert!(g.materials().iter().all(|m| m.borrow().is_custom() && !m.borrow().is_no_light()));
    }

    #[test]
    fn color_tables_are_exclusive_and_toggle_off() {
        let (_backend, mut g) = game(&quiet_config());
        let applied = |g: &DamDefense| g.scene.effects().get::<ColorCorrect>().unwrap().should_apply();
        assert!(!applied(&g));

        g.toggle_lut(LutChoice::Cool);
        assert!(applied(&g));
        assert_eq!(g.scene.effects().get::<ColorCorrect>().unwrap().cube(), Some(g.assets.lut_cool));

        g.toggle_lut(LutChoice::Custom);
        assert_eq!(g.state.active_lut, Some(LutChoice::Custom));
        g.toggle_lut(LutChoice::Custom);
        assert_eq!(g.state.active_lut, None);
        assert!(!applied(&g));
    }

    #[test]
    fn clearing_the_last_wave_wins() {
        let config = GameplayConfig { last_wave: 1, enemies_per_wave: 1, ..quiet_config() };
        let (_backend, mut g) = game(&config);
        let boat = g.spawn_boat(SpawnSide::Left);
        assert!(g.destroy_boat(boat));
        g.update(1.0 / 60.0, &idle());
        assert_eq!(g.outcome(), Outcome::Won);
    }

    #[test]
    fn render_through_the_chain_is_clean() {
        let (mut backend, mut g) = game(&quiet_config());
        g.toggle_lut(LutChoice::Warm);
        g.fire_cannonball();
        g.update(1.0 / 60.0, &idle());
        backend.begin_frame().unwrap();
        g.render(&mut backend);
        backend.end_frame();
        assert!(backend.violations().is_empty(), "{:?}", backend.violations());
        g.unload(&mut backend);
        assert_eq!(backend.live_framebuffers(), 0);
    }
}
