use glam::{Mat3, Quat, Vec3};

use crate::ecs::Entity;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BodyType {
    Static,
    Dynamic,
}

/// Rigid-body component. The body's pose comes from the entity's transform.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicsBody {
    pub body_type: BodyType,
    pub half_extents: Vec3,
    pub mass: f32,
    pub velocity: Vec3,
    pub use_gravity: bool,
    force: Vec3,
}

impl PhysicsBody {
    pub fn new(body_type: BodyType, half_extents: Vec3) -> Self {
        Self {
            body_type,
            half_extents,
            mass: 1.0,
            velocity: Vec3::ZERO,
            use_gravity: true,
            force: Vec3::ZERO,
        }
    }

    pub fn dynamic(half_extents: Vec3) -> Self {
        Self::new(BodyType::Dynamic, half_extents)
    }

    pub fn fixed(half_extents: Vec3) -> Self {
        Self::new(BodyType::Static, half_extents)
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_gravity(mut self, on: bool) -> Self {
        self.use_gravity = on;
        self
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    /// Accumulate a force for the next step only.
    pub fn add_force(&mut self, force: Vec3) {
        self.force += force;
    }

    pub fn pending_force(&self) -> Vec3 {
        self.force
    }

    pub fn clear_force(&mut self) {
        self.force = Vec3::ZERO;
    }

    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }
}

/// One body as handed to a [`PhysicsProvider`] for a step. `position` and
/// `body` are written back to the scene afterwards.
#[derive(Clone, Debug)]
pub struct BodyState {
    pub entity: Entity,
    pub position: Vec3,
    pub rotation: Quat,
    pub body: PhysicsBody,
}

/// Steps rigid bodies and reports overlapping pairs.
pub trait PhysicsProvider {
    fn step(&mut self, bodies: &mut [BodyState], gravity: Vec3, dt: f32) -> Vec<(Entity, Entity)>;
}

/// Semi-implicit Euler integration with box overlap tests on the
/// world-space bounds of each oriented box. Contacts are reported, never
/// resolved.
#[derive(Debug, Default)]
pub struct SimplePhysics;

impl SimplePhysics {
    pub fn new() -> Self {
        Self
    }

    fn bounds(state: &BodyState) -> (Vec3, Vec3) {
        let r = Mat3::from_quat(state.rotation);
        let abs = Mat3::from_cols(r.x_axis.abs(), r.y_axis.abs(), r.z_axis.abs());
        let extent = abs * state.body.half_extents;
        (state.position - extent, state.position + extent)
    }
}

impl PhysicsProvider for SimplePhysics {
    fn step(&mut self, bodies: &mut [BodyState], gravity: Vec3, dt: f32) -> Vec<(Entity, Entity)> {
        for state in bodies.iter_mut() {
            let body = &mut state.body;
            if body.is_dynamic() {
                let mut accel = body.force / body.mass.max(f32::EPSILON);
                if body.use_gravity {
                    accel += gravity;
                }
                body.velocity += accel * dt;
                state.position += body.velocity * dt;
            }
            body.clear_force();
        }

        let bounds: Vec<(Vec3, Vec3)> = bodies.iter().map(Self::bounds).collect();
        let mut contacts = Vec::new();
        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                if !bodies[i].body.is_dynamic() && !bodies[j].body.is_dynamic() {
                    continue;
                }
                let (amin, amax) = bounds[i];
                let (bmin, bmax) = bounds[j];
                if amin.cmple(bmax).all() && bmin.cmple(amax).all() {
                    contacts.push((bodies[i].entity, bodies[j].entity));
                }
            }
        }
        contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::World;
    use approx::assert_relative_eq;

    fn state(world: &mut World, position: Vec3, body: PhysicsBody) -> BodyState {
        BodyState { entity: world.spawn(), position, rotation: Quat::IDENTITY, body }
    }

    #[test]
    fn gravity_and_force_integrate() {
        let mut world = World::new();
        let mut body = PhysicsBody::dynamic(Vec3::splat(0.5)).with_mass(2.0);
        body.add_force(Vec3::new(4.0, 0.0, 0.0));
        let mut bodies = vec![state(&mut world, Vec3::ZERO, body)];
        SimplePhysics.step(&mut bodies, Vec3::new(0.0, -10.0, 0.0), 0.5);
        assert_relative_eq!(bodies[0].body.velocity.x, 1.0);
        assert_relative_eq!(bodies[0].body.velocity.y, -5.0);
        assert_relative_eq!(bodies[0].position.y, -2.5);
        assert_eq!(bodies[0].body.pending_force(), Vec3::ZERO);
    }

    #[test]
    fn static_bodies_do_not_move_or_collide_with_each_other() {
        let mut world = World::new();
        let mut bodies = vec![
            state(&mut world, Vec3::ZERO, PhysicsBody::fixed(Vec3::ONE)),
            state(&mut world, Vec3::ZERO, PhysicsBody::fixed(Vec3::ONE)),
        ];
        let contacts = SimplePhysics.step(&mut bodies, Vec3::new(0.0, -10.0, 0.0), 1.0);
        assert!(contacts.is_empty());
        assert_eq!(bodies[0].position, Vec3::ZERO);
    }

    #[test]
    fn rotated_box_bounds_grow() {
        let mut world = World::new();
        let long = PhysicsBody::dynamic(Vec3::new(4.0, 0.5, 0.5)).with_gravity(false);
        let probe = PhysicsBody::dynamic(Vec3::splat(0.5)).with_gravity(false);
        let mut bodies = vec![
            state(&mut world, Vec3::ZERO, long),
            state(&mut world, Vec3::new(0.0, 3.0, 0.0), probe),
        ];
        assert!(SimplePhysics.step(&mut bodies, Vec3::ZERO, 0.0).is_empty());
        bodies[0].rotation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let contacts = SimplePhysics.step(&mut bodies, Vec3::ZERO, 0.0);
        assert_eq!(contacts, vec![(bodies[0].entity, bodies[1].entity)]);
    }
}
