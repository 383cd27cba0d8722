//! Entity-component scene: entity lifecycle, the per-frame simulation step
//! and rendering through the scene's post-effect chain.

mod components;

pub use components::{
    Camera, DeleteCountdown, Light, MeshRenderer, ParticleSystemComponent, PendingRemoval, Skybox, Sprite2D, Tag,
};

use glam::{Mat4, Vec3, Vec4};
use log::{debug, info};

use crate::animation::MorphAnimator;
use crate::ecs::{Entity, Query, View, World};
use crate::error::RenderError;
use crate::graphics::backend::{MorphFrame, RenderBackend, TextureBinding, UniformValue};
use crate::graphics::material::Material;
use crate::graphics::post_effect::PostEffectChain;
use crate::physics::{BodyState, PhysicsBody, PhysicsProvider, SimplePhysics};
use crate::transform::{Transform, TransformArena, TransformId};

/// Camera data resolved once per render.
#[derive(Copy, Clone, Debug)]
struct ViewData {
    view_proj: Mat4,
    sky_view_proj: Mat4,
    eye: Vec3,
    right: Vec3,
    up: Vec3,
    light_dir: Vec3,
    light_color: Vec4,
    ambient: Vec4,
}

pub struct Scene {
    world: World,
    transforms: TransformArena,
    physics: Box<dyn PhysicsProvider>,
    effects: PostEffectChain,
    contacts: Vec<(Entity, Entity)>,
    camera: Option<Entity>,
    lights: Vec<Entity>,
    skybox: Option<Skybox>,
    pub gravity: Vec3,
    pub ambient_color: Vec3,
    pub ambient_strength: f32,
    paused: bool,
    elapsed: f32,
    should_render: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::with_physics(Box::new(SimplePhysics::new()))
    }

    pub fn with_physics(physics: Box<dyn PhysicsProvider>) -> Self {
        Self {
            world: World::new(),
            transforms: TransformArena::new(),
            physics,
            effects: PostEffectChain::new(),
            contacts: Vec::new(),
            camera: None,
            lights: Vec::new(),
            skybox: None,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            ambient_color: Vec3::ONE,
            ambient_strength: 0.3,
            paused: false,
            elapsed: 0.0,
            should_render: true,
        }
    }

    // ── Entities ─────────────────────────────────────────────────────────

    pub fn create_entity(&mut self) -> Entity {
        self.world.spawn()
    }

    /// Entity that is removed `seconds` after creation.
    pub fn create_entity_with_countdown(&mut self, seconds: f32) -> Entity {
        let e = self.world.spawn();
        self.world.insert(e, DeleteCountdown::new(seconds));
        e
    }

    /// Remove the entity and all of its components now. Children of its
    /// transform become roots. Returns `false` for stale handles.
    pub fn delete_entity(&mut self, entity: Entity) -> bool {
        if !self.world.is_alive(entity) {
            return false;
        }
        if let Some(&id) = self.world.get::<TransformId>(entity) {
            self.transforms.remove(id);
        }
        self.lights.retain(|&l| l != entity);
        if self.camera == Some(entity) {
            self.camera = None;
        }
        self.world.despawn(entity)
    }

    pub fn is_valid(&self, entity: Entity) -> bool {
        self.world.is_alive(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.world.len()
    }

    // ── Components ───────────────────────────────────────────────────────

    /// Attach (or replace) a component. Panics on a stale entity.
    pub fn attach<T: 'static>(&mut self, entity: Entity, component: T) {
        self.world.insert(entity, component);
    }

    /// Panics when the component is missing; use [`Scene::has`] or
    /// [`Scene::try_get`] when it is optional.
    pub fn get<T: 'static>(&self, entity: Entity) -> &T {
        match self.world.get::<T>(entity) {
            Some(c) => c,
            None => panic!("{entity:?} has no {}", std::any::type_name::<T>()),
        }
    }

    pub fn get_mut<T: 'static>(&mut self, entity: Entity) -> &mut T {
        match self.world.get_mut::<T>(entity) {
            Some(c) => c,
            None => panic!("{entity:?} has no {}", std::any::type_name::<T>()),
        }
    }

    pub fn try_get<T: 'static>(&self, entity: Entity) -> Option<&T> {
        self.world.get::<T>(entity)
    }

    pub fn try_get_mut<T: 'static>(&mut self, entity: Entity) -> Option<&mut T> {
        self.world.get_mut::<T>(entity)
    }

    pub fn has<T: 'static>(&self, entity: Entity) -> bool {
        self.world.has::<T>(entity)
    }

    pub fn remove<T: 'static>(&mut self, entity: Entity) -> Option<T> {
        self.world.remove::<T>(entity)
    }

    pub fn view<Q: Query>(&self) -> View<'_, Q> {
        self.world.view::<Q>()
    }

    /// Like [`Scene::view`] but skips entities that are counting down to
    /// deletion or waiting to be swept.
    pub fn alive_view<Q: Query>(&self) -> impl Iterator<Item = Entity> + '_ {
        self.world
            .view::<Q>()
            .iter()
            .filter(move |&e| !self.world.has::<DeleteCountdown>(e) && !self.world.has::<PendingRemoval>(e))
    }

    pub fn tag(&self, entity: Entity) -> Option<&str> {
        self.world.get::<Tag>(entity).map(Tag::name)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    // ── Transforms ───────────────────────────────────────────────────────

    /// Give the entity a node in the transform arena, replacing any existing one.
    pub fn attach_transform(&mut self, entity: Entity, local: Transform) -> TransformId {
        if let Some(&old) = self.world.get::<TransformId>(entity) {
            self.transforms.remove(old);
        }
        let id = self.transforms.insert(local);
        self.world.insert(entity, id);
        id
    }

    pub fn transform_id(&self, entity: Entity) -> Option<TransformId> {
        self.world.get::<TransformId>(entity).copied()
    }

    pub fn transforms(&self) -> &TransformArena {
        &self.transforms
    }

    pub fn transforms_mut(&mut self) -> &mut TransformArena {
        &mut self.transforms
    }

    pub fn local_transform(&self, entity: Entity) -> Option<Transform> {
        self.transform_id(entity).and_then(|id| self.transforms.local(id).copied())
    }

    pub fn update_transform(&mut self, entity: Entity, f: impl FnOnce(&mut Transform)) {
        if let Some(id) = self.transform_id(entity) {
            self.transforms.update(id, f);
        }
    }

    pub fn set_position(&mut self, entity: Entity, position: Vec3) {
        if let Some(id) = self.transform_id(entity) {
            self.transforms.set_position(id, position);
        }
    }

    pub fn global_matrix(&self, entity: Entity) -> Option<Mat4> {
        self.transform_id(entity).map(|id| self.transforms.global(id))
    }

    pub fn global_position(&self, entity: Entity) -> Option<Vec3> {
        self.transform_id(entity).map(|id| self.transforms.global_position(id))
    }

    /// Parent `child`'s transform under `parent`'s. Refused when either side has
    /// no transform or the link would form a cycle.
    pub fn set_parent(&mut self, child: Entity, parent: Option<Entity>) -> bool {
        let Some(c) = self.transform_id(child) else {
            return false;
        };
        let p = match parent {
            Some(p) => match self.transform_id(p) {
                Some(id) => Some(id),
                None => return false,
            },
            None => None,
        };
        self.transforms.set_parent(c, p)
    }

    // ── Scene state ──────────────────────────────────────────────────────

    pub fn set_camera(&mut self, entity: Option<Entity>) {
        self.camera = entity;
    }

    pub fn camera(&self) -> Option<Entity> {
        self.camera
    }

    pub fn add_light(&mut self, entity: Entity) {
        if !self.lights.contains(&entity) {
            self.lights.push(entity);
        }
    }

    pub fn lights(&self) -> &[Entity] {
        &self.lights
    }

    pub fn set_skybox(&mut self, skybox: Option<Skybox>) {
        self.skybox = skybox;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_should_render(&mut self, on: bool) {
        self.should_render = on;
    }

    pub fn should_render(&self) -> bool {
        self.should_render
    }

    /// Simulated seconds, excluding time spent paused.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    // ── Simulation ───────────────────────────────────────────────────────

    /// Advance countdowns, animators, particle systems and physics by `dt`.
    /// Does nothing while paused. Contacts from the physics step are
    /// available from [`Scene::collisions`] until the next update.
    pub fn update(&mut self, dt: f32) {
        self.contacts.clear();
        if self.paused {
            return;
        }
        self.elapsed += dt;

        let mut expired = Vec::new();
        for (e, countdown) in self.world.query_mut::<DeleteCountdown>() {
            countdown.elapsed += dt;
            if countdown.is_expired() {
                expired.push(e);
            }
        }
        for e in expired {
            self.world.insert(e, PendingRemoval);
        }

        for (_, animator) in self.world.query_mut::<MorphAnimator>() {
            animator.update(dt);
        }
        for (_, ps) in self.world.query_mut::<ParticleSystemComponent>() {
            ps.system.update(dt);
        }

        self.step_physics(dt);
    }

    fn step_physics(&mut self, dt: f32) {
        let mut bodies: Vec<BodyState> = self
            .world
            .query_multi::<(PhysicsBody, TransformId)>()
            .filter_map(|(entity, (body, &id))| {
                let local = self.transforms.local(id)?;
                Some(BodyState {
                    entity,
                    position: local.position,
                    rotation: local.rotation,
                    body: body.clone(),
                })
            })
            .collect();
        if bodies.is_empty() {
            return;
        }

        self.contacts = self.physics.step(&mut bodies, self.gravity, dt);

        for state in bodies {
            if let Some(&id) = self.world.get::<TransformId>(state.entity) {
                self.transforms.set_position(id, state.position);
            }
            if let Some(body) = self.world.get_mut::<PhysicsBody>(state.entity) {
                *body = state.body;
            }
        }
        if !self.contacts.is_empty() {
            debug!("physics step produced {} contact(s)", self.contacts.len());
        }
    }

    /// Contact pairs from the last physics step. Entities may have been
    /// deleted since; check [`Scene::is_valid`] before use.
    pub fn collisions(&self) -> &[(Entity, Entity)] {
        &self.contacts
    }

    /// Delete every entity tagged [`PendingRemoval`]. Run once per frame after
    /// all systems.
    pub fn sweep(&mut self) -> usize {
        let doomed = self.world.view::<(PendingRemoval,)>().to_vec();
        for &e in &doomed {
            self.delete_entity(e);
        }
        doomed.len()
    }

    // ── Rendering ────────────────────────────────────────────────────────

    pub fn effects(&self) -> &PostEffectChain {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut PostEffectChain {
        &mut self.effects
    }

    /// Allocate the primary target and every registered effect.
    pub fn init_effects(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) -> Result<(), RenderError> {
        self.effects.init(backend, width, height)?;
        info!("scene post-effect chain ready at {width}x{height} with {} effect(s)", self.effects.len());
        Ok(())
    }

    pub fn reshape(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) -> Result<(), RenderError> {
        self.effects.reshape(backend, width, height)
    }

    /// Release the effect chain's GPU resources. Safe to call more than once.
    pub fn unload(&mut self, backend: &mut dyn RenderBackend) {
        self.effects.unload(backend);
    }

    /// Draw the scene. With an initialised effect chain the world goes through
    /// it; otherwise it is drawn straight onto the current surface contents.
    pub fn render(&mut self, backend: &mut dyn RenderBackend) {
        if !self.should_render {
            return;
        }
        let (w, h) = backend.surface_size();
        let view = self.view_data(w as f32 / h.max(1) as f32);
        let world = &self.world;
        let transforms = &self.transforms;
        let skybox = self.skybox;
        if self.effects.is_init() {
            self.effects
                .render(backend, |b| draw_world(b, world, transforms, skybox, &view));
        } else {
            backend.bind_framebuffer(None);
            draw_world(backend, world, transforms, skybox, &view);
        }
    }

    fn view_data(&self, aspect: f32) -> ViewData {
        let (view, proj, eye) = match self.camera.and_then(|c| Some((c, self.world.get::<Camera>(c)?))) {
            Some((entity, camera)) => {
                let global = self.global_matrix(entity).unwrap_or(Mat4::IDENTITY);
                let (_, rotation, eye) = global.to_scale_rotation_translation();
                let view = Mat4::look_to_rh(eye, rotation * Vec3::Z, rotation * Vec3::Y);
                (view, camera.projection(aspect), eye)
            }
            None => (Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO),
        };
        let inv = view.inverse();

        let (light_dir, light_color) = self
            .lights
            .iter()
            .find_map(|&l| {
                let light = self.world.get::<Light>(l)?;
                let (_, rot, _) = self.global_matrix(l)?.to_scale_rotation_translation();
                Some((rot * Vec3::Z, light.color.extend(light.strength)))
            })
            .unwrap_or((Vec3::new(0.0, -1.0, 0.3).normalize(), Vec4::ONE));

        let mut sky_view = view;
        sky_view.w_axis = Vec4::W;

        ViewData {
            view_proj: proj * view,
            sky_view_proj: proj * sky_view,
            eye,
            right: inv.x_axis.truncate(),
            up: inv.y_axis.truncate(),
            light_dir,
            light_color,
            ambient: self.ambient_color.extend(self.ambient_strength),
        }
    }
}

fn draw_world(
    backend: &mut dyn RenderBackend,
    world: &World,
    transforms: &TransformArena,
    skybox: Option<Skybox>,
    view: &ViewData,
) {
    if let Some(sky) = skybox {
        backend.bind_shader(Some(sky.shader));
        backend.set_uniform("u_view_proj", UniformValue::Mat4(view.sky_view_proj));
        backend.bind_texture(0, TextureBinding::Cubemap(Some(sky.cubemap)));
        backend.draw_mesh(sky.mesh, MorphFrame::default());
        backend.unbind_texture(0);
        backend.bind_shader(None);
    }

    for (entity, (renderer, &id)) in world.query_multi::<(MeshRenderer, TransformId)>() {
        let morph = world.get::<MorphAnimator>(entity).map(MorphAnimator::morph).unwrap_or_default();
        let material = renderer.material.borrow();

        backend.bind_shader(Some(renderer.shader));
        backend.set_uniform("u_view_proj", UniformValue::Mat4(view.view_proj));
        backend.set_uniform("u_model", UniformValue::Mat4(transforms.global(id)));
        backend.set_uniform("u_blend", UniformValue::Float(morph.blend));
        backend.set_uniform("u_camera_pos", UniformValue::Vec3(view.eye));
        backend.set_uniform("u_light_dir", UniformValue::Vec3(view.light_dir));
        backend.set_uniform("u_light_color", UniformValue::Vec4(view.light_color));
        backend.set_uniform("u_ambient", UniformValue::Vec4(view.ambient));
        backend.set_uniform("u_tint", UniformValue::Vec4(renderer.tint));
        material.apply(backend);
        if material.has_outline() {
            backend.set_uniform("u_outline_pass", UniformValue::Float(1.0));
            backend.draw_mesh(renderer.mesh, morph);
        }
        backend.set_uniform("u_outline_pass", UniformValue::Float(0.0));
        backend.draw_mesh(renderer.mesh, morph);
        Material::unbind(backend);
        backend.bind_shader(None);
    }

    for (_, (ps, &id)) in world.query_multi::<(ParticleSystemComponent, TransformId)>() {
        let template = ps.system.template();
        let Some(mesh) = template.mesh else {
            continue;
        };
        let instances = ps.system.instances(transforms.global_position(id));
        if instances.is_empty() {
            continue;
        }
        let albedo = template.material.as_ref().and_then(|m| m.borrow().albedo);
        backend.bind_shader(Some(ps.shader));
        backend.set_uniform("u_view_proj", UniformValue::Mat4(view.view_proj));
        backend.set_uniform("u_camera_right", UniformValue::Vec3(view.right));
        backend.set_uniform("u_camera_up", UniformValue::Vec3(view.up));
        backend.bind_texture(0, TextureBinding::Texture(albedo));
        backend.draw_particles(mesh, &instances);
        backend.unbind_texture(0);
        backend.bind_shader(None);
    }

    let mut sprites: Vec<&Sprite2D> = world.query::<Sprite2D>().map(|(_, s)| s).collect();
    sprites.sort_by_key(|s| s.layer);
    for sprite in sprites {
        backend.bind_shader(Some(sprite.shader));
        backend.set_uniform("u_rect", UniformValue::Vec4(sprite.ndc_rect()));
        backend.set_uniform("u_tint", UniformValue::Vec4(sprite.tint));
        backend.bind_texture(0, TextureBinding::Texture(sprite.texture));
        backend.draw_fullscreen_quad();
        backend.unbind_texture(0);
        backend.bind_shader(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::headless::{Command, HeadlessBackend};
    use crate::graphics::shaders;
    use crate::graphics::mesh;

    #[test]
    fn countdown_removal_is_boundary_inclusive() {
        let mut scene = Scene::new();
        let e = scene.create_entity_with_countdown(1.0);
        for _ in 0..3 {
            scene.update(0.25);
            scene.sweep();
        }
        assert!(scene.is_valid(e));
        scene.update(0.25);
        scene.sweep();
        assert!(!scene.is_valid(e));
    }

    #[test]
    fn countdown_entities_leave_alive_view_immediately() {
        let mut scene = Scene::new();
        let live = scene.create_entity();
        scene.attach(live, Tag::new("Boat"));
        let dying = scene.create_entity_with_countdown(5.0);
        scene.attach(dying, Tag::new("Boat"));
        let alive: Vec<Entity> = scene.alive_view::<(Tag,)>().collect();
        assert_eq!(alive, vec![live]);
        assert_eq!(scene.view::<(Tag,)>().iter().count(), 2);
    }

    #[test]
    fn paused_scene_does_not_advance() {
        let mut scene = Scene::new();
        let e = scene.create_entity_with_countdown(0.1);
        scene.set_paused(true);
        scene.update(1.0);
        scene.sweep();
        assert!(scene.is_valid(e));
        assert_eq!(scene.elapsed(), 0.0);
    }

    #[test]
    fn physics_moves_bodies_and_reports_contacts() {
        let mut scene = Scene::new();
        scene.gravity = Vec3::ZERO;
        let a = scene.create_entity();
        scene.attach_transform(a, Transform::from_position(Vec3::new(-2.5, 0.0, 0.0)));
        scene.attach(a, PhysicsBody::dynamic(Vec3::splat(0.5)).with_velocity(Vec3::new(4.0, 0.0, 0.0)));
        let b = scene.create_entity();
        scene.attach_transform(b, Transform::default());
        scene.attach(b, PhysicsBody::fixed(Vec3::splat(0.5)));

        scene.update(0.25);
        assert!(scene.collisions().is_empty());
        scene.update(0.25);
        assert_eq!(scene.global_position(a), Some(Vec3::new(-0.5, 0.0, 0.0)));
        assert_eq!(scene.collisions().len(), 1);
    }

    #[test]
    fn deleting_parent_keeps_child_as_root() {
        let mut scene = Scene::new();
        let parent = scene.create_entity();
        scene.attach_transform(parent, Transform::from_position(Vec3::new(5.0, 0.0, 0.0)));
        let child = scene.create_entity();
        scene.attach_transform(child, Transform::from_position(Vec3::X));
        assert!(scene.set_parent(child, Some(parent)));
        assert_eq!(scene.global_position(child), Some(Vec3::new(6.0, 0.0, 0.0)));

        scene.delete_entity(parent);
        assert_eq!(scene.global_position(child), Some(Vec3::X));
        assert!(!scene.delete_entity(parent));
    }

    #[test]
    #[should_panic(expected = "has no")]
    fn get_without_attach_panics() {
        let mut scene = Scene::new();
        let e = scene.create_entity();
        let _ = scene.get::<Tag>(e);
    }

    #[test]
    fn render_keeps_binding_discipline() {
        let mut backend = HeadlessBackend::new(64, 32);
        let mut scene = Scene::new();
        scene.init_effects(&mut backend, 64, 32).unwrap();

        let shader = backend.compile_shader(&shaders::lit_mesh(shaders::LIT_MESH)).unwrap();
        let cube = backend.upload_mesh(&mesh::cube(1.0));
        let mut material = Material::new();
        material.set_custom(true);

        let cam = scene.create_entity();
        scene.attach_transform(cam, Transform::from_position(Vec3::new(0.0, 0.0, -5.0)));
        scene.attach(cam, Camera::default());
        scene.set_camera(Some(cam));

        let e = scene.create_entity();
        scene.attach_transform(e, Transform::default());
        scene.attach(e, MeshRenderer::new(cube, shader, material.shared()));

        backend.begin_frame().unwrap();
        scene.render(&mut backend);
        backend.end_frame();

        assert!(backend.violations().is_empty(), "{:?}", backend.violations());
        let mesh_draws = backend
            .draws()
            .filter(|c| matches!(c, Command::Draw { shader: s, .. } if *s == shader))
            .count();
        assert_eq!(mesh_draws, 2, "outline hull plus the mesh itself");
        scene.unload(&mut backend);
        scene.unload(&mut backend);
        assert_eq!(backend.live_framebuffers(), 0);
    }
}
