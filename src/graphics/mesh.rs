use glam::{Vec2, Vec3};

/// One mesh vertex as uploaded to the GPU.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: uv.to_array(),
        }
    }
}

/// CPU-side mesh with one or more morph frames.
///
/// Every frame has the same vertex count and shares `indices`. Static meshes
/// have exactly one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub frames: Vec<Vec<Vertex>>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.frames.first().map_or(0, Vec::len)
    }

    /// Build a morph mesh from several single-frame meshes of identical topology.
    /// Returns `None` if the topologies differ.
    pub fn from_frames(frames: Vec<MeshData>) -> Option<MeshData> {
        let mut iter = frames.into_iter();
        let mut first = iter.next()?;
        for next in iter {
            if next.indices != first.indices || next.vertex_count() != first.vertex_count() {
                return None;
            }
            first.frames.extend(next.frames);
        }
        Some(first)
    }

    fn append(&mut self, other: &MeshData) {
        if self.frames.is_empty() {
            self.frames = vec![Vec::new(); other.frames.len()];
        }
        let base = self.vertex_count() as u32;
        for (dst, src) in self.frames.iter_mut().zip(&other.frames) {
            dst.extend_from_slice(src);
        }
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }
}

// ── Primitives ───────────────────────────────────────────────────────────────

/// Axis-aligned box centred on `center`.
pub fn cuboid(center: Vec3, half: Vec3) -> MeshData {
    const FACES: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::X, Vec3::Y, Vec3::NEG_Z),
        (Vec3::NEG_X, Vec3::Y, Vec3::Z),
        (Vec3::Y, Vec3::NEG_Z, Vec3::X),
        (Vec3::NEG_Y, Vec3::Z, Vec3::X),
        (Vec3::Z, Vec3::Y, Vec3::X),
        (Vec3::NEG_Z, Vec3::Y, Vec3::NEG_X),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, up, right) in FACES {
        let base = vertices.len() as u32;
        let c = center + normal * half;
        let u = right * half;
        let v = up * half;
        for (corner, uv) in [
            (c - u - v, Vec2::new(0.0, 1.0)),
            (c + u - v, Vec2::new(1.0, 1.0)),
            (c + u + v, Vec2::new(1.0, 0.0)),
            (c - u + v, Vec2::new(0.0, 0.0)),
        ] {
            vertices.push(Vertex::new(corner, normal, uv));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    MeshData { frames: vec![vertices], indices }
}

pub fn cube(half: f32) -> MeshData {
    cuboid(Vec3::ZERO, Vec3::splat(half))
}

pub fn uv_sphere(radius: f32, rings: u32, segments: u32) -> MeshData {
    let rings = rings.max(2);
    let segments = segments.max(3);
    let mut vertices = Vec::new();
    for r in 0..=rings {
        let v = r as f32 / rings as f32;
        let theta = v * std::f32::consts::PI;
        for s in 0..=segments {
            let u = s as f32 / segments as f32;
            let phi = u * std::f32::consts::TAU;
            let normal = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
            vertices.push(Vertex::new(normal * radius, normal, Vec2::new(u, v)));
        }
    }
    let stride = segments + 1;
    let mut indices = Vec::new();
    for r in 0..rings {
        for s in 0..segments {
            let a = r * stride + s;
            let b = a + stride;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }
    MeshData { frames: vec![vertices], indices }
}

/// Flat square on the XZ plane facing +Y.
pub fn plane(size: f32, uv_repeat: f32) -> MeshData {
    let h = size * 0.5;
    let vertices = vec![
        Vertex::new(Vec3::new(-h, 0.0, -h), Vec3::Y, Vec2::new(0.0, 0.0)),
        Vertex::new(Vec3::new(h, 0.0, -h), Vec3::Y, Vec2::new(uv_repeat, 0.0)),
        Vertex::new(Vec3::new(h, 0.0, h), Vec3::Y, Vec2::new(uv_repeat, uv_repeat)),
        Vertex::new(Vec3::new(-h, 0.0, h), Vec3::Y, Vec2::new(0.0, uv_repeat)),
    ];
    MeshData { frames: vec![vertices], indices: vec![0, 2, 1, 0, 3, 2] }
}

/// Unit quad on the XY plane, used as the particle billboard.
pub fn quad() -> MeshData {
    let vertices = vec![
        Vertex::new(Vec3::new(-0.5, -0.5, 0.0), Vec3::Z, Vec2::new(0.0, 1.0)),
        Vertex::new(Vec3::new(0.5, -0.5, 0.0), Vec3::Z, Vec2::new(1.0, 1.0)),
        Vertex::new(Vec3::new(0.5, 0.5, 0.0), Vec3::Z, Vec2::new(1.0, 0.0)),
        Vertex::new(Vec3::new(-0.5, 0.5, 0.0), Vec3::Z, Vec2::new(0.0, 0.0)),
    ];
    MeshData { frames: vec![vertices], indices: vec![0, 1, 2, 0, 2, 3] }
}

fn compound(parts: &[(Vec3, Vec3)]) -> MeshData {
    let mut mesh = MeshData::default();
    for &(center, half) in parts {
        mesh.append(&cuboid(center, half));
    }
    mesh
}

// ── Game models ──────────────────────────────────────────────────────────────

/// Boat hull, sized to fit the (2, 4, 8.95) collision box. Three variants.
pub fn boat(variant: u32) -> MeshData {
    let hull = (Vec3::new(0.0, -1.5, 0.0), Vec3::new(2.0, 1.5, 8.95));
    match variant % 3 {
        0 => compound(&[hull, (Vec3::new(0.0, 1.0, -3.0), Vec3::new(1.4, 1.0, 2.0))]),
        1 => compound(&[
            hull,
            (Vec3::new(0.0, 0.8, 2.0), Vec3::new(1.6, 0.8, 3.0)),
            (Vec3::new(0.0, 3.0, 2.0), Vec3::new(0.2, 1.4, 0.2)),
        ]),
        _ => compound(&[
            hull,
            (Vec3::new(0.0, 1.2, -5.0), Vec3::new(1.8, 1.2, 1.5)),
            (Vec3::new(0.0, 1.2, 5.0), Vec3::new(1.8, 1.2, 1.5)),
        ]),
    }
}

/// Cannon with an idle frame followed by seven recoil frames.
pub fn cannon() -> MeshData {
    const FIRING_FRAMES: u32 = 7;
    let frames = (0..=FIRING_FRAMES)
        .map(|i| {
            let t = if i == 0 { 0.0 } else { i as f32 / FIRING_FRAMES as f32 };
            let recoil = -(t * std::f32::consts::PI).sin() * 0.6;
            compound(&[
                (Vec3::new(0.0, -0.4, 0.0), Vec3::new(0.6, 0.3, 0.8)),
                (Vec3::new(0.0, 0.0, 1.2 + recoil), Vec3::new(0.25, 0.25, 1.2)),
            ])
        })
        .collect();
    // All frames are built from the same two boxes.
    MeshData::from_frames(frames).unwrap_or_default()
}

pub fn dam() -> MeshData {
    compound(&[
        (Vec3::new(0.0, 0.0, 0.0), Vec3::new(60.0, 12.0, 3.0)),
        (Vec3::new(0.0, 12.5, -1.0), Vec3::new(60.0, 0.5, 2.0)),
    ])
}

/// Bird with wings up and wings down frames.
pub fn bird() -> MeshData {
    let body = (Vec3::ZERO, Vec3::new(0.2, 0.2, 0.6));
    let frames = [0.35_f32, -0.35]
        .iter()
        .map(|&lift| {
            compound(&[
                body,
                (Vec3::new(-0.9, lift, 0.0), Vec3::new(0.7, 0.05, 0.3)),
                (Vec3::new(0.9, lift, 0.0), Vec3::new(0.7, 0.05, 0.3)),
            ])
        })
        .collect();
    MeshData::from_frames(frames).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_24_vertices_and_12_triangles() {
        let mesh = cube(1.0);
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.indices.len(), 36);
    }

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let mesh = uv_sphere(2.0, 8, 12);
        for v in &mesh.frames[0] {
            let len = Vec3::from_array(v.position).length();
            assert!((len - 2.0).abs() < 1e-4);
        }
    }

    #[test]
    fn cannon_has_idle_plus_seven_firing_frames() {
        let mesh = cannon();
        assert_eq!(mesh.frame_count(), 8);
        assert!(mesh.frames.iter().all(|f| f.len() == mesh.vertex_count()));
    }

    #[test]
    fn from_frames_rejects_mismatched_topology() {
        assert!(MeshData::from_frames(vec![cube(1.0), quad()]).is_none());
    }

    #[test]
    fn boat_variants_differ() {
        assert_ne!(boat(0), boat(1));
        assert_eq!(boat(0), boat(3));
    }
}
