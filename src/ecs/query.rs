use std::any::TypeId;
use std::marker::PhantomData;

use super::sparse_set::RawColumn;
use super::{Entity, World};

/// A set of component types that can be matched as an intersection.
///
/// Implemented for tuples of one to four component types, e.g.
/// `world.view::<(Transform, Tag)>()`.
pub trait Query: 'static {
    type Item<'w>;
    type ItemMut<'w>;
    #[doc(hidden)]
    type Columns;

    #[doc(hidden)]
    fn type_ids() -> Vec<TypeId>;

    /// The smallest dense entity list among the query's stores, or `None`
    /// when at least one store does not exist yet.
    #[doc(hidden)]
    fn candidates(world: &World) -> Option<&[Entity]>;

    #[doc(hidden)]
    fn matches(world: &World, entity: Entity) -> bool;

    #[doc(hidden)]
    fn fetch(world: &World, entity: Entity) -> Option<Self::Item<'_>>;

    #[doc(hidden)]
    fn columns(world: &mut World) -> Option<Self::Columns>;

    /// # Safety
    ///
    /// `columns` must come from a live world that is exclusively borrowed for
    /// `'w`, and each entity must be fetched at most once.
    #[doc(hidden)]
    unsafe fn fetch_mut<'w>(columns: &Self::Columns, entity: Entity) -> Option<Self::ItemMut<'w>>;
}

macro_rules! impl_query {
    ($($name:ident),+) => {
        impl<$($name: 'static),+> Query for ($($name,)+) {
            type Item<'w> = ($(&'w $name,)+);
            type ItemMut<'w> = ($(&'w mut $name,)+);
            type Columns = ($(RawColumn<$name>,)+);

            fn type_ids() -> Vec<TypeId> {
                vec![$(TypeId::of::<$name>()),+]
            }

            fn candidates(world: &World) -> Option<&[Entity]> {
                let mut best: Option<&[Entity]> = None;
                $(
                    let list = world.storage::<$name>()?.entities();
                    if best.map_or(true, |b| list.len() < b.len()) {
                        best = Some(list);
                    }
                )+
                best
            }

            fn matches(world: &World, entity: Entity) -> bool {
                $(world.has::<$name>(entity))&&+
            }

            fn fetch(world: &World, entity: Entity) -> Option<Self::Item<'_>> {
                Some(($(world.get::<$name>(entity)?,)+))
            }

            fn columns(world: &mut World) -> Option<Self::Columns> {
                Some(($(world.storage_mut_existing::<$name>()?.raw_column(),)+))
            }

            #[allow(non_snake_case)]
            unsafe fn fetch_mut<'w>(columns: &Self::Columns, entity: Entity) -> Option<Self::ItemMut<'w>> {
                let ($($name,)+) = columns;
                // SAFETY: forwarded from the caller; the types are distinct so
                // the columns point at different stores.
                Some(($(unsafe { $name.get_mut(entity.id)? },)+))
            }
        }
    };
}

impl_query!(A);
impl_query!(A, B);
impl_query!(A, B, C);
impl_query!(A, B, C, D);

// ---------------------------------------------------------------------------
// View — entity-only intersection, restartable
// ---------------------------------------------------------------------------

/// Lazy sequence of entities carrying every component in `Q`.
///
/// A view borrows the world immutably; calling [`View::iter`] again restarts
/// iteration from the beginning. Order is the dense order of the smallest
/// store, which is stable until the next structural change.
pub struct View<'w, Q: Query> {
    world: &'w World,
    candidates: &'w [Entity],
    _query: PhantomData<Q>,
}

impl<'w, Q: Query> View<'w, Q> {
    pub(super) fn new(world: &'w World) -> Self {
        Self {
            world,
            candidates: Q::candidates(world).unwrap_or(&[]),
            _query: PhantomData,
        }
    }

    pub fn iter(&self) -> ViewIter<'w, Q> {
        ViewIter {
            world: self.world,
            candidates: self.candidates.iter(),
            _query: PhantomData,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Snapshot the matching entities, for systems that mutate the world
    /// while walking the result.
    pub fn to_vec(&self) -> Vec<Entity> {
        self.iter().collect()
    }
}

impl<'w, Q: Query> IntoIterator for &View<'w, Q> {
    type Item = Entity;
    type IntoIter = ViewIter<'w, Q>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct ViewIter<'w, Q: Query> {
    world: &'w World,
    candidates: std::slice::Iter<'w, Entity>,
    _query: PhantomData<Q>,
}

impl<Q: Query> Iterator for ViewIter<'_, Q> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        self.candidates
            .by_ref()
            .copied()
            .find(|&e| Q::matches(self.world, e))
    }
}

// ---------------------------------------------------------------------------
// Multi-component iterators
// ---------------------------------------------------------------------------

/// Iterator over `(Entity, (&A, &B, ..))` for every entity matching `Q`.
pub struct QueryMultiIter<'w, Q: Query> {
    world: &'w World,
    candidates: std::slice::Iter<'w, Entity>,
    _query: PhantomData<Q>,
}

impl<'w, Q: Query> QueryMultiIter<'w, Q> {
    pub(super) fn new(world: &'w World) -> Self {
        Self {
            world,
            candidates: Q::candidates(world).unwrap_or(&[]).iter(),
            _query: PhantomData,
        }
    }
}

impl<'w, Q: Query> Iterator for QueryMultiIter<'w, Q> {
    type Item = (Entity, Q::Item<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        let world = self.world;
        self.candidates
            .by_ref()
            .find_map(|&e| Q::fetch(world, e).map(|item| (e, item)))
    }
}

/// Iterator over `(Entity, (&mut A, &mut B, ..))` for every entity matching `Q`.
pub struct QueryMultiIterMut<'w, Q: Query> {
    columns: Option<Q::Columns>,
    candidates: std::vec::IntoIter<Entity>,
    _world: PhantomData<&'w mut World>,
}

impl<'w, Q: Query> QueryMultiIterMut<'w, Q> {
    pub(super) fn new(world: &'w mut World) -> Self {
        let ids = Q::type_ids();
        for (i, id) in ids.iter().enumerate() {
            assert!(
                !ids[i + 1..].contains(id),
                "query_multi_mut requires distinct component types"
            );
        }
        // Entities are copied out so the stores' dense arrays are not
        // borrowed while elements are handed out mutably.
        let candidates = Q::candidates(world).map(<[Entity]>::to_vec).unwrap_or_default();
        let columns = Q::columns(world);
        Self {
            columns,
            candidates: candidates.into_iter(),
            _world: PhantomData,
        }
    }
}

impl<'w, Q: Query> Iterator for QueryMultiIterMut<'w, Q> {
    type Item = (Entity, Q::ItemMut<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        let columns = self.columns.as_ref()?;
        for e in self.candidates.by_ref() {
            // SAFETY: the world is exclusively borrowed for 'w, no structural
            // change can happen through this iterator, and every candidate
            // entity id is unique within a dense array.
            if let Some(item) = unsafe { Q::fetch_mut(columns, e) } {
                return Some((e, item));
            }
        }
        None
    }
}
