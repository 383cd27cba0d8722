use std::cell::Cell;

use glam::{EulerRot, Mat4, Quat, Vec3};

// ── Transform ────────────────────────────────────────────────────────────────

/// Local position / rotation / scale of a node.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Build from a position, Euler angles in degrees (applied X, then Y, then Z)
    /// and a scale.
    pub fn new(position: Vec3, rotation_degrees: Vec3, scale: Vec3) -> Self {
        Self {
            position,
            rotation: euler_degrees(rotation_degrees),
            scale,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self { position, ..Default::default() }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Rotate in the parent's frame by Euler angles in degrees.
    pub fn rotate_fixed(&mut self, degrees: Vec3) {
        self.rotation = euler_degrees(degrees) * self.rotation;
    }

    /// Point the local +Z axis along `direction`, keeping `up` as close to +Y
    /// as possible.
    pub fn look_along(&mut self, direction: Vec3, up: Vec3) {
        let forward = direction.normalize_or_zero();
        if forward == Vec3::ZERO {
            return;
        }
        let right = up.cross(forward).normalize_or_zero();
        let up = forward.cross(right);
        self.rotation = Quat::from_mat3(&glam::Mat3::from_cols(right, up, forward));
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

pub(crate) fn euler_degrees(degrees: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::XYZ,
        degrees.x.to_radians(),
        degrees.y.to_radians(),
        degrees.z.to_radians(),
    )
}

// ── TransformArena ───────────────────────────────────────────────────────────

/// Stable index into a [`TransformArena`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransformId {
    index: u32,
    generation: u32,
}

struct Node {
    local: Transform,
    parent: Option<TransformId>,
    children: Vec<TransformId>,
    dirty: Cell<bool>,
    global: Cell<Mat4>,
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena of transforms with parent links stored as indices.
///
/// A parent never owns its children. Removing a node turns its children
/// into roots. Global matrices are cached and recomputed on read only when
/// the node or one of its ancestors changed since the last read.
#[derive(Default)]
pub struct TransformArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl TransformArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, local: Transform) -> TransformId {
        let node = Node {
            local,
            parent: None,
            children: Vec::new(),
            dirty: Cell::new(true),
            global: Cell::new(Mat4::IDENTITY),
        };
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                TransformId { index, generation: slot.generation }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot { generation: 0, node: Some(node) });
                TransformId { index, generation: 0 }
            }
        }
    }

    pub fn remove(&mut self, id: TransformId) -> Option<Transform> {
        let node = self.node(id)?;
        let parent = node.parent;
        let children = node.children.clone();

        if let Some(parent) = parent {
            if let Some(p) = self.node_mut(parent) {
                p.children.retain(|&c| c != id);
            }
        }
        for child in children {
            if let Some(c) = self.node_mut(child) {
                c.parent = None;
            }
            self.mark_dirty(child);
        }

        let slot = &mut self.slots[id.index as usize];
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(node.local)
    }

    pub fn contains(&self, id: TransformId) -> bool {
        self.node(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn local(&self, id: TransformId) -> Option<&Transform> {
        self.node(id).map(|n| &n.local)
    }

    /// Mutate the local transform; the node and its descendants are marked dirty.
    pub fn update(&mut self, id: TransformId, f: impl FnOnce(&mut Transform)) {
        if let Some(node) = self.node_mut(id) {
            f(&mut node.local);
            self.mark_dirty(id);
        }
    }

    pub fn set_local(&mut self, id: TransformId, local: Transform) {
        self.update(id, |t| *t = local);
    }

    pub fn set_position(&mut self, id: TransformId, position: Vec3) {
        self.update(id, |t| t.position = position);
    }

    pub fn set_rotation(&mut self, id: TransformId, rotation: Quat) {
        self.update(id, |t| t.rotation = rotation);
    }

    pub fn set_scale(&mut self, id: TransformId, scale: Vec3) {
        self.update(id, |t| t.scale = scale);
    }

    pub fn parent(&self, id: TransformId) -> Option<TransformId> {
        self.node(id)?.parent
    }

    /// Link `child` under `parent`, or detach it with `None`. Links that would
    /// form a cycle are refused and return `false`.
    pub fn set_parent(&mut self, child: TransformId, parent: Option<TransformId>) -> bool {
        if !self.contains(child) {
            return false;
        }
        if let Some(p) = parent {
            if !self.contains(p) || self.is_ancestor_or_self(child, p) {
                return false;
            }
        }

        if let Some(old) = self.node(child).and_then(|n| n.parent) {
            if let Some(old) = self.node_mut(old) {
                old.children.retain(|&c| c != child);
            }
        }
        if let Some(p) = parent {
            if let Some(pn) = self.node_mut(p) {
                pn.children.push(child);
            }
        }
        if let Some(cn) = self.node_mut(child) {
            cn.parent = parent;
        }
        self.mark_dirty(child);
        true
    }

    /// World matrix of `id`, recomputed through the parent chain when dirty.
    pub fn global(&self, id: TransformId) -> Mat4 {
        let Some(node) = self.node(id) else {
            return Mat4::IDENTITY;
        };
        if node.dirty.get() {
            let parent = node.parent.map_or(Mat4::IDENTITY, |p| self.global(p));
            node.global.set(parent * node.local.matrix());
            node.dirty.set(false);
        }
        node.global.get()
    }

    pub fn global_position(&self, id: TransformId) -> Vec3 {
        self.global(id).w_axis.truncate()
    }

    pub fn is_dirty(&self, id: TransformId) -> bool {
        self.node(id).is_some_and(|n| n.dirty.get())
    }

    // -- Internal helpers ---------------------------------------------------

    fn node(&self, id: TransformId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, id: TransformId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    fn is_ancestor_or_self(&self, ancestor: TransformId, mut id: TransformId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.parent(id) {
                Some(p) => id = p,
                None => return false,
            }
        }
    }

    fn mark_dirty(&self, id: TransformId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.node(current) {
                node.dirty.set(true);
                stack.extend(node.children.iter().copied());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_vec(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn root_global_equals_local() {
        let mut arena = TransformArena::new();
        let id = arena.insert(Transform::from_position(Vec3::new(1.0, 2.0, 3.0)));
        assert!(approx_vec(arena.global_position(id), Vec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn child_follows_parent_move() {
        let mut arena = TransformArena::new();
        let parent = arena.insert(Transform::from_position(Vec3::new(10.0, 0.0, 0.0)));
        let child = arena.insert(Transform::from_position(Vec3::new(0.0, 1.0, 0.0)));
        assert!(arena.set_parent(child, Some(parent)));
        assert!(approx_vec(arena.global_position(child), Vec3::new(10.0, 1.0, 0.0)));

        arena.set_position(parent, Vec3::new(-5.0, 0.0, 0.0));
        assert!(arena.is_dirty(child));
        assert!(approx_vec(arena.global_position(child), Vec3::new(-5.0, 1.0, 0.0)));
        assert!(!arena.is_dirty(child));
    }

    #[test]
    fn parent_scale_applies_to_child_offset() {
        let mut arena = TransformArena::new();
        let parent = arena.insert(Transform::default().with_scale(Vec3::splat(2.0)));
        let child = arena.insert(Transform::from_position(Vec3::X));
        arena.set_parent(child, Some(parent));
        assert!(approx_vec(arena.global_position(child), Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn removing_parent_makes_children_roots() {
        let mut arena = TransformArena::new();
        let parent = arena.insert(Transform::from_position(Vec3::new(4.0, 0.0, 0.0)));
        let child = arena.insert(Transform::from_position(Vec3::Y));
        arena.set_parent(child, Some(parent));
        arena.remove(parent);

        assert_eq!(arena.parent(child), None);
        assert!(approx_vec(arena.global_position(child), Vec3::Y));
    }

    #[test]
    fn stale_id_does_not_alias_recycled_slot() {
        let mut arena = TransformArena::new();
        let old = arena.insert(Transform::default());
        arena.remove(old);
        let new = arena.insert(Transform::from_position(Vec3::ONE));
        assert!(!arena.contains(old));
        assert!(arena.contains(new));
        assert!(arena.local(old).is_none());
    }

    #[test]
    fn cycles_are_refused() {
        let mut arena = TransformArena::new();
        let a = arena.insert(Transform::default());
        let b = arena.insert(Transform::default());
        assert!(arena.set_parent(b, Some(a)));
        assert!(!arena.set_parent(a, Some(b)));
        assert!(!arena.set_parent(a, Some(a)));
    }

    #[test]
    fn look_along_points_forward_axis() {
        let mut t = Transform::default();
        t.look_along(Vec3::X, Vec3::Y);
        let forward = t.rotation * Vec3::Z;
        assert!(approx_vec(forward, Vec3::X));
    }
}
