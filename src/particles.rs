use std::f32::consts::TAU;

use glam::{Quat, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::graphics::backend::{MeshHandle, ParticleInstance};
use crate::graphics::material::SharedMaterial;
use crate::transform::euler_degrees;

/// Easing over normalized lifetime `t` in `[0, 1]`.
pub type Curve = fn(f32) -> f32;

pub mod curves {
    pub fn linear(t: f32) -> f32 {
        t
    }

    /// Most of the change happens early.
    pub fn fast_start(t: f32) -> f32 {
        1.0 - (1.0 - t) * (1.0 - t)
    }

    /// Most of the change happens late.
    pub fn slow_start(t: f32) -> f32 {
        t * t
    }

    /// 0 at birth and death, 1 at mid-life.
    pub fn zero_one_zero(t: f32) -> f32 {
        1.0 - (2.0 * t - 1.0).powi(2)
    }
}

// ── Template ─────────────────────────────────────────────────────────────────

/// Uniformly sampled between `min` and `max`. Equal ends give a single value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ranged<T> {
    pub min: T,
    pub max: T,
}

impl<T: Copy> Ranged<T> {
    pub fn one(value: T) -> Self {
        Self { min: value, max: value }
    }

    pub fn two(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl Ranged<f32> {
    fn sample(&self, rng: &mut StdRng) -> f32 {
        self.min + (self.max - self.min) * rng.r#gen::<f32>()
    }
}

impl Ranged<Vec4> {
    fn sample(&self, rng: &mut StdRng) -> Vec4 {
        self.min.lerp(self.max, rng.r#gen::<f32>())
    }
}

/// Per-particle properties a system stamps out on emission.
#[derive(Clone, Debug)]
pub struct ParticleTemplate {
    pub lifetime: Ranged<f32>,
    pub start_color: Ranged<Vec4>,
    pub end_color: Ranged<Vec4>,
    pub start_size: Ranged<f32>,
    pub end_size: Ranged<f32>,
    pub start_speed: Ranged<f32>,
    pub end_speed: Ranged<f32>,
    pub mesh: Option<MeshHandle>,
    pub material: Option<SharedMaterial>,
}

impl Default for ParticleTemplate {
    fn default() -> Self {
        Self {
            lifetime: Ranged::one(1.0),
            start_color: Ranged::one(Vec4::ONE),
            end_color: Ranged::one(Vec4::ONE),
            start_size: Ranged::one(1.0),
            end_size: Ranged::one(1.0),
            start_speed: Ranged::one(1.0),
            end_speed: Ranged::one(1.0),
            mesh: None,
            material: None,
        }
    }
}

// ── Emitter ──────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum EmitterShape {
    /// Directions in the emitter's local XY plane.
    Circle,
    Sphere,
    /// Directions within `angle` degrees of the emitter's local +Y.
    Cone { angle: f32 },
}

impl EmitterShape {
    fn sample(&self, rng: &mut StdRng) -> Vec3 {
        match *self {
            EmitterShape::Circle => {
                let a = rng.r#gen::<f32>() * TAU;
                Vec3::new(a.cos(), a.sin(), 0.0)
            }
            EmitterShape::Sphere => {
                let z = rng.gen_range(-1.0f32..=1.0);
                let a = rng.r#gen::<f32>() * TAU;
                let r = (1.0 - z * z).max(0.0).sqrt();
                Vec3::new(r * a.cos(), r * a.sin(), z)
            }
            EmitterShape::Cone { angle } => {
                let max_cos = angle.to_radians().cos();
                let cos_theta = max_cos + (1.0 - max_cos) * rng.r#gen::<f32>();
                let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
                let a = rng.r#gen::<f32>() * TAU;
                Vec3::new(sin_theta * a.cos(), cos_theta, sin_theta * a.sin())
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct Particle {
    position: Vec3,
    direction: Vec3,
    start_speed: f32,
    end_speed: f32,
    start_color: Vec4,
    end_color: Vec4,
    start_size: f32,
    end_size: f32,
    age: f32,
    lifetime: f32,
    active: bool,
}

impl Particle {
    fn t(&self) -> f32 {
        (self.age / self.lifetime).clamp(0.0, 1.0)
    }
}

// ── ParticleSystem ───────────────────────────────────────────────────────────

/// Fixed-capacity particle pool. Slots are recycled through a free list; no
/// allocation happens after construction apart from [`ParticleSystem::instances`].
pub struct ParticleSystem {
    pool: Vec<Particle>,
    free: Vec<usize>,
    template: ParticleTemplate,
    shape: EmitterShape,
    rotation: Quat,
    rate: f32,
    duration: f32,
    looping: bool,
    elapsed: f32,
    emit_accumulator: f32,
    velocity_curve: Curve,
    color_curve: Curve,
    scale_curve: Curve,
    rng: StdRng,
}

impl std::fmt::Debug for ParticleSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleSystem")
            .field("capacity", &self.capacity())
            .field("active", &self.active_count())
            .field("shape", &self.shape)
            .field("rate", &self.rate)
            .finish_non_exhaustive()
    }
}

impl ParticleSystem {
    /// `rate` particles per second for `duration` seconds, or forever when
    /// `looping`. A zero rate makes a burst-only system.
    pub fn new(capacity: usize, rate: f32, template: ParticleTemplate, duration: f32, looping: bool) -> Self {
        Self::with_rng(capacity, rate, template, duration, looping, StdRng::from_entropy())
    }

    pub fn with_seed(capacity: usize, rate: f32, template: ParticleTemplate, duration: f32, looping: bool, seed: u64) -> Self {
        Self::with_rng(capacity, rate, template, duration, looping, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rate: f32, template: ParticleTemplate, duration: f32, looping: bool, rng: StdRng) -> Self {
        Self {
            pool: vec![Particle::default(); capacity],
            free: (0..capacity).rev().collect(),
            template,
            shape: EmitterShape::Circle,
            rotation: Quat::IDENTITY,
            rate: rate.max(0.0),
            duration,
            looping,
            elapsed: 0.0,
            emit_accumulator: 0.0,
            velocity_curve: curves::linear,
            color_curve: curves::linear,
            scale_curve: curves::linear,
            rng,
        }
    }

    pub fn make_circle_emitter(&mut self, rotation_degrees: Vec3) {
        self.shape = EmitterShape::Circle;
        self.set_emitter_rotation(rotation_degrees);
    }

    pub fn make_sphere_emitter(&mut self) {
        self.shape = EmitterShape::Sphere;
        self.rotation = Quat::IDENTITY;
    }

    pub fn make_cone_emitter(&mut self, angle_degrees: f32, rotation_degrees: Vec3) {
        self.shape = EmitterShape::Cone { angle: angle_degrees };
        self.set_emitter_rotation(rotation_degrees);
    }

    pub fn set_emitter_rotation(&mut self, rotation_degrees: Vec3) {
        self.rotation = euler_degrees(rotation_degrees);
    }

    pub fn shape(&self) -> EmitterShape {
        self.shape
    }

    pub fn set_velocity_curve(&mut self, curve: Curve) {
        self.velocity_curve = curve;
    }

    pub fn set_color_curve(&mut self, curve: Curve) {
        self.color_curve = curve;
    }

    pub fn set_scale_curve(&mut self, curve: Curve) {
        self.scale_curve = curve;
    }

    pub fn template(&self) -> &ParticleTemplate {
        &self.template
    }

    pub fn capacity(&self) -> usize {
        self.pool.len()
    }

    pub fn active_count(&self) -> usize {
        self.pool.len() - self.free.len()
    }

    /// Whether continuous emission is still running.
    pub fn is_emitting(&self) -> bool {
        self.rate > 0.0 && (self.looping || self.elapsed < self.duration)
    }

    /// Activate up to `n` particles now and return how many were activated.
    pub fn burst(&mut self, n: usize) -> usize {
        let count = n.min(self.free.len());
        for _ in 0..count {
            self.emit_one();
        }
        count
    }

    fn emit_one(&mut self) {
        let Some(slot) = self.free.pop() else {
            return;
        };
        let rng = &mut self.rng;
        let t = &self.template;
        self.pool[slot] = Particle {
            position: Vec3::ZERO,
            direction: self.rotation * self.shape.sample(rng),
            start_speed: t.start_speed.sample(rng),
            end_speed: t.end_speed.sample(rng),
            start_color: t.start_color.sample(rng),
            end_color: t.end_color.sample(rng),
            start_size: t.start_size.sample(rng),
            end_size: t.end_size.sample(rng),
            age: 0.0,
            lifetime: t.lifetime.sample(rng).max(f32::EPSILON),
            active: true,
        };
    }

    pub fn update(&mut self, dt: f32) {
        for (i, p) in self.pool.iter_mut().enumerate() {
            if !p.active {
                continue;
            }
            p.age += dt;
            if p.age >= p.lifetime {
                p.active = false;
                self.free.push(i);
                continue;
            }
            let k = (self.velocity_curve)(p.t());
            let speed = p.start_speed + (p.end_speed - p.start_speed) * k;
            p.position += p.direction * speed * dt;
        }

        if self.is_emitting() {
            self.elapsed += dt;
            self.emit_accumulator += self.rate * dt;
            let due = self.emit_accumulator.floor();
            self.emit_accumulator -= due;
            self.burst(due as usize);
        }
    }

    /// Billboard instances for every live particle, offset by the emitter's
    /// world position.
    pub fn instances(&self, origin: Vec3) -> Vec<ParticleInstance> {
        self.pool
            .iter()
            .filter(|p| p.active)
            .map(|p| {
                let t = p.t();
                let size = p.start_size + (p.end_size - p.start_size) * (self.scale_curve)(t);
                let color = p.start_color.lerp(p.end_color, (self.color_curve)(t));
                let position = origin + p.position;
                ParticleInstance {
                    position_size: [position.x, position.y, position.z, size],
                    color: color.to_array(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn system(capacity: usize) -> ParticleSystem {
        ParticleSystem::with_seed(capacity, 0.0, ParticleTemplate::default(), 0.0, false, 7)
    }

    #[test]
    fn burst_within_capacity_activates_exactly_n() {
        let mut ps = system(100);
        assert_eq!(ps.burst(40), 40);
        assert_eq!(ps.active_count(), 40);
        assert_eq!(ps.instances(Vec3::ZERO).len(), 40);
    }

    #[test]
    fn burst_over_capacity_clamps() {
        let mut ps = system(10);
        assert_eq!(ps.burst(25), 10);
        assert_eq!(ps.burst(5), 0);
        assert_eq!(ps.active_count(), 10);
    }

    #[test]
    fn expired_slots_are_reused() {
        let mut ps = system(4);
        ps.burst(4);
        ps.update(1.5);
        assert_eq!(ps.active_count(), 0);
        assert_eq!(ps.burst(4), 4);
        assert_eq!(ps.capacity(), 4);
    }

    #[test]
    fn continuous_emission_respects_rate_and_duration() {
        let mut ps = ParticleSystem::with_seed(1000, 100.0, ParticleTemplate::default(), 0.45, false, 1);
        for _ in 0..8 {
            ps.update(0.1);
        }
        assert!(!ps.is_emitting());
        assert_eq!(ps.active_count(), 50);
    }

    #[test]
    fn cone_directions_stay_inside_angle() {
        let mut ps = system(200);
        ps.make_cone_emitter(15.0, Vec3::ZERO);
        ps.burst(200);
        let min_cos = 15f32.to_radians().cos() - 1e-4;
        assert!(ps.pool.iter().all(|p| p.direction.y >= min_cos));
    }

    #[test]
    fn curves_hit_their_endpoints() {
        assert_relative_eq!(curves::fast_start(0.0), 0.0);
        assert_relative_eq!(curves::fast_start(1.0), 1.0);
        assert_relative_eq!(curves::slow_start(1.0), 1.0);
        assert_relative_eq!(curves::zero_one_zero(0.5), 1.0);
        assert_relative_eq!(curves::zero_one_zero(1.0), 0.0);
        assert!(curves::fast_start(0.25) > curves::linear(0.25));
        assert!(curves::slow_start(0.25) < curves::linear(0.25));
    }

    #[test]
    fn scale_curve_drives_instance_size() {
        let template = ParticleTemplate {
            start_size: Ranged::one(0.0),
            end_size: Ranged::one(4.0),
            lifetime: Ranged::one(2.0),
            ..Default::default()
        };
        let mut ps = ParticleSystem::with_seed(1, 0.0, template, 0.0, false, 3);
        ps.set_scale_curve(curves::zero_one_zero);
        ps.burst(1);
        ps.update(1.0);
        let inst = ps.instances(Vec3::new(0.0, 10.0, 0.0));
        assert_relative_eq!(inst[0].position_size[3], 4.0, epsilon = 1e-4);
    }
}
