use glam::Vec3;
use titan::ecs::*;
use titan::physics::PhysicsBody;
use titan::scene::{DeleteCountdown, Scene, Tag};
use titan::transform::Transform;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Clone)]
    struct Speed(f32);

    #[derive(Debug, PartialEq)]
    struct Hull(i32);

    // -- world: generational safety -----------------------------------------

    #[test]
    fn stale_handle_never_sees_recycled_slot() {
        let mut world = World::new();
        let old = world.spawn();
        world.insert(old, Hull(3));
        world.despawn(old);

        let new = world.spawn();
        world.insert(new, Hull(9));
        assert_eq!(old.id(), new.id());
        assert!(!world.is_alive(old));
        assert!(world.get::<Hull>(old).is_none());
        assert_eq!(world.get::<Hull>(new), Some(&Hull(9)));
    }

    #[test]
    fn despawn_drops_every_component() {
        let mut world = World::new();
        let e = world.spawn();
        world.insert(e, Hull(1));
        world.insert(e, Speed(2.0));
        world.despawn(e);
        assert_eq!(world.count::<Hull>(), 0);
        assert_eq!(world.count::<Speed>(), 0);
    }

    // -- views and queries ---------------------------------------------------

    #[test]
    fn view_matches_the_intersection_and_restarts() {
        let mut world = World::new();
        let a = world.spawn();
        world.insert(a, Hull(1));
        world.insert(a, Speed(1.0));
        let b = world.spawn();
        world.insert(b, Hull(2));
        let c = world.spawn();
        world.insert(c, Speed(3.0));

        let view = world.view::<(Hull, Speed)>();
        assert_eq!(view.to_vec(), vec![a]);
        assert_eq!(view.iter().count(), view.iter().count());
    }

    #[test]
    fn query_multi_mut_updates_in_place() {
        let mut world = World::new();
        for i in 0..4 {
            let e = world.spawn();
            world.insert(e, Hull(i));
            world.insert(e, Speed(i as f32));
        }
        for (_, (hull, speed)) in world.query_multi_mut::<(Hull, Speed)>() {
            hull.0 += 10;
            speed.0 *= 2.0;
        }
        let hulls: Vec<i32> = world.query::<Hull>().map(|(_, h)| h.0).collect();
        assert_eq!(hulls.len(), 4);
        assert!(hulls.iter().all(|&h| h >= 10));
        assert!(world.query::<Speed>().any(|(_, s)| s.0 == 6.0));
    }

    #[test]
    fn wide_queries_are_usable_outside_the_crate() {
        #[derive(Debug, PartialEq)]
        struct Lane(u8);
        #[derive(Debug, PartialEq)]
        struct Model(u8);

        let mut world = World::new();
        let full = world.spawn();
        world.insert(full, Hull(1));
        world.insert(full, Speed(2.0));
        world.insert(full, Lane(3));
        world.insert(full, Model(4));
        let partial = world.spawn();
        world.insert(partial, Hull(5));
        world.insert(partial, Speed(6.0));
        world.insert(partial, Lane(7));

        let three: Vec<Entity> = world.query_multi::<(Hull, Speed, Lane)>().map(|(e, _)| e).collect();
        assert_eq!(three.len(), 2);

        for (_, (_, _, lane, model)) in world.query_multi_mut::<(Hull, Speed, Lane, Model)>() {
            lane.0 += model.0;
        }
        assert_eq!(world.get::<Lane>(full), Some(&Lane(7)));
        assert_eq!(world.view::<(Hull, Speed, Lane, Model)>().to_vec(), vec![full]);
    }

    // -- scene ---------------------------------------------------------------

    #[test]
    fn alive_view_skips_sinking_entities() {
        let mut scene = Scene::new();
        let afloat = scene.create_entity();
        scene.attach(afloat, Tag::new("Boat"));
        let sinking = scene.create_entity();
        scene.attach(sinking, Tag::new("Boat"));
        scene.attach(sinking, DeleteCountdown::new(2.5));

        let alive: Vec<Entity> = scene.alive_view::<(Tag,)>().collect();
        assert_eq!(alive, vec![afloat]);
        assert_eq!(scene.view::<(Tag,)>().to_vec().len(), 2);
    }

    #[test]
    fn countdown_removes_on_the_boundary_frame() {
        let mut scene = Scene::new();
        let e = scene.create_entity_with_countdown(0.5);
        scene.update(0.25);
        assert_eq!(scene.sweep(), 0);
        scene.update(0.25);
        assert_eq!(scene.sweep(), 1);
        assert!(!scene.is_valid(e));
    }

    #[test]
    fn contacts_may_name_deleted_entities() {
        let mut scene = Scene::new();
        scene.gravity = Vec3::ZERO;
        let a = scene.create_entity();
        scene.attach_transform(a, Transform::default());
        scene.attach(a, PhysicsBody::dynamic(Vec3::ONE));
        let b = scene.create_entity();
        scene.attach_transform(b, Transform::from_position(Vec3::X));
        scene.attach(b, PhysicsBody::dynamic(Vec3::ONE));

        scene.update(0.01);
        let contacts = scene.collisions().to_vec();
        assert_eq!(contacts.len(), 1);

        scene.delete_entity(b);
        let (x, y) = contacts[0];
        assert!(!scene.is_valid(x) || !scene.is_valid(y));
    }

    #[test]
    fn try_get_and_has_are_the_checked_forms() {
        let mut scene = Scene::new();
        let e = scene.create_entity();
        assert!(!scene.has::<Tag>(e));
        assert!(scene.try_get::<Tag>(e).is_none());
        scene.attach(e, Tag::new("Ball"));
        assert_eq!(scene.tag(e), Some("Ball"));
        assert_eq!(scene.remove::<Tag>(e), Some(Tag::new("Ball")));
        assert_eq!(scene.tag(e), None);
    }
}
