mod query;
mod sparse_set;

use std::any::TypeId;
use std::collections::HashMap;

pub use query::{Query, QueryMultiIter, QueryMultiIterMut, View, ViewIter};
use sparse_set::{ComponentStore, SparseSet};

// ---------------------------------------------------------------------------
// Entity — generational index
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    id: u32,
    generation: u32,
}

impl Entity {
    pub fn id(self) -> u32 {
        self.id
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

#[derive(Default)]
struct EntityAllocator {
    generations: Vec<u32>,
    free: Vec<u32>,
    live: usize,
}

impl EntityAllocator {
    fn allocate(&mut self) -> Entity {
        self.live += 1;
        match self.free.pop() {
            Some(id) => Entity {
                id,
                generation: self.generations[id as usize],
            },
            None => {
                let id = self.generations.len() as u32;
                self.generations.push(0);
                Entity { id, generation: 0 }
            }
        }
    }

    fn deallocate(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = &mut self.generations[entity.id as usize];
        *slot = slot.wrapping_add(1);
        self.free.push(entity.id);
        self.live -= 1;
        true
    }

    fn is_alive(&self, entity: Entity) -> bool {
        self.generations.get(entity.id as usize) == Some(&entity.generation)
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Sparse-set entity store.
///
/// Each component type gets its own statically typed `SparseSet<T>`, found
/// through a `TypeId`-keyed map. Any `'static` type can be a component.
#[derive(Default)]
pub struct World {
    allocator: EntityAllocator,
    stores: HashMap<TypeId, Box<dyn ComponentStore>>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Entity lifecycle ---------------------------------------------------

    pub fn spawn(&mut self) -> Entity {
        self.allocator.allocate()
    }

    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.allocator.deallocate(entity) {
            return false;
        }
        for store in self.stores.values_mut() {
            store.remove_entity(entity.id);
        }
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.allocator.live
    }

    pub fn is_empty(&self) -> bool {
        self.allocator.live == 0
    }

    // -- Components ---------------------------------------------------------

    pub fn insert<T: 'static>(&mut self, entity: Entity, component: T) {
        assert!(
            self.is_alive(entity),
            "cannot insert component on dead entity"
        );
        self.storage_mut::<T>().insert(entity, component);
    }

    pub fn remove<T: 'static>(&mut self, entity: Entity) -> Option<T> {
        if !self.is_alive(entity) {
            return None;
        }
        self.storage_mut_existing::<T>()?.remove(entity.id)
    }

    pub fn get<T: 'static>(&self, entity: Entity) -> Option<&T> {
        if !self.is_alive(entity) {
            return None;
        }
        self.storage::<T>()?.get(entity.id)
    }

    pub fn get_mut<T: 'static>(&mut self, entity: Entity) -> Option<&mut T> {
        if !self.is_alive(entity) {
            return None;
        }
        self.storage_mut_existing::<T>()?.get_mut(entity.id)
    }

    pub fn has<T: 'static>(&self, entity: Entity) -> bool {
        self.is_alive(entity)
            && self
                .storage::<T>()
                .is_some_and(|set| set.contains(entity.id))
    }

    /// Number of entities carrying a `T`.
    pub fn count<T: 'static>(&self) -> usize {
        self.stores
            .get(&TypeId::of::<T>())
            .map_or(0, |store| store.len())
    }

    // -- Queries ------------------------------------------------------------

    pub fn query<T: 'static>(&self) -> impl ExactSizeIterator<Item = (Entity, &T)> {
        let (dense, data) = self.storage::<T>().map_or((&[][..], &[][..]), |set| set.parts());
        dense.iter().copied().zip(data.iter())
    }

    pub fn query_mut<T: 'static>(&mut self) -> impl ExactSizeIterator<Item = (Entity, &mut T)> {
        let (dense, data): (&[Entity], &mut [T]) = match self.storage_mut_existing::<T>() {
            Some(set) => set.parts_mut(),
            None => (&[], &mut []),
        };
        dense.iter().copied().zip(data.iter_mut())
    }

    pub fn query_multi<Q: Query>(&self) -> QueryMultiIter<'_, Q> {
        QueryMultiIter::new(self)
    }

    pub fn query_multi_mut<Q: Query>(&mut self) -> QueryMultiIterMut<'_, Q> {
        QueryMultiIterMut::new(self)
    }

    /// Entities carrying every component in `Q`.
    pub fn view<Q: Query>(&self) -> View<'_, Q> {
        View::new(self)
    }

    // -- Internal helpers ---------------------------------------------------

    fn storage<T: 'static>(&self) -> Option<&SparseSet<T>> {
        self.stores
            .get(&TypeId::of::<T>())
            .and_then(|b| b.as_any().downcast_ref::<SparseSet<T>>())
    }

    fn storage_mut_existing<T: 'static>(&mut self) -> Option<&mut SparseSet<T>> {
        self.stores
            .get_mut(&TypeId::of::<T>())
            .and_then(|b| b.as_any_mut().downcast_mut::<SparseSet<T>>())
    }

    fn storage_mut<T: 'static>(&mut self) -> &mut SparseSet<T> {
        self.stores
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(SparseSet::<T>::new()))
            .as_any_mut()
            .downcast_mut::<SparseSet<T>>()
            .expect("type mismatch in component store")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Clone)]
    struct Position(f32, f32);

    #[derive(Debug, PartialEq)]
    struct Health(i32);

    #[derive(Debug, PartialEq)]
    struct Tag(&'static str);

    #[test]
    fn recycled_slot_gets_new_generation() {
        let mut world = World::new();
        let old = world.spawn();
        world.despawn(old);
        let new = world.spawn();
        assert_eq!(old.id(), new.id());
        assert_ne!(old.generation(), new.generation());
        assert!(!world.is_alive(old));
    }

    #[test]
    fn len_tracks_live_entities() {
        let mut world = World::new();
        let a = world.spawn();
        let _b = world.spawn();
        assert_eq!(world.len(), 2);
        world.despawn(a);
        assert_eq!(world.len(), 1);
        world.despawn(a);
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn view_intersects_component_sets() {
        let mut world = World::new();
        let boat = world.spawn();
        world.insert(boat, Position(0.0, 0.0));
        world.insert(boat, Tag("Boat"));
        let rock = world.spawn();
        world.insert(rock, Position(1.0, 1.0));

        let view = world.view::<(Position, Tag)>();
        assert_eq!(view.to_vec(), vec![boat]);
    }

    #[test]
    fn view_is_restartable() {
        let mut world = World::new();
        for i in 0..3 {
            let e = world.spawn();
            world.insert(e, Health(i));
        }
        let view = world.view::<(Health,)>();
        let first: Vec<_> = view.iter().collect();
        let second: Vec<_> = view.iter().collect();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[test]
    fn view_on_missing_store_is_empty() {
        let mut world = World::new();
        let e = world.spawn();
        world.insert(e, Health(1));
        assert!(world.view::<(Health, Tag)>().is_empty());
    }

    #[test]
    fn count_reflects_store_size() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        world.insert(a, Health(1));
        world.insert(b, Health(2));
        world.remove::<Health>(a);
        assert_eq!(world.count::<Health>(), 1);
        assert_eq!(world.count::<Tag>(), 0);
    }

    #[test]
    #[should_panic(expected = "distinct component types")]
    fn query_multi_mut_rejects_duplicate_types() {
        let mut world = World::new();
        let _ = world.query_multi_mut::<(Health, Health)>();
    }
}
