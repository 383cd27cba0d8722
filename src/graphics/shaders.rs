//! Built-in WGSL programs.
//!
//! Binding declarations are generated from the texture and uniform lists so
//! the WGSL always matches what the backend binds: texture slot `i` is
//! `t{i}`/`s{i}` and every uniform is a field of `u`, with scalars in `.x`.

use crate::graphics::backend::{
    BlendMode, ShaderSource, ShaderStage, TextureSlotKind, UniformKind,
};

pub const PASSTHROUGH: &str = "Passthrough shader";
pub const COLOR_CORRECT: &str = "Color correction shader";
pub const LIT_MESH: &str = "Basic textured shader";
pub const ANIMATED_MESH: &str = "Animated textured shader";
pub const SKYBOX: &str = "Skybox shader";
pub const PARTICLES: &str = "Particle shader";
pub const SPRITE: &str = "Sprite shader";

const FULLSCREEN_VS: &str = "
struct VertexOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VertexOut {
    var positions = array<vec2<f32>, 6>(
        vec2<f32>(-1.0,  1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0,  1.0),
        vec2<f32>( 1.0,  1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0, -1.0),
    );
    var uvs = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, 1.0),
    );
    var out: VertexOut;
    out.pos = vec4<f32>(positions[vi], 0.0, 1.0);
    out.uv  = uvs[vi];
    return out;
}
";

fn wgsl_type(kind: UniformKind) -> &'static str {
    match kind {
        UniformKind::Mat3 => "mat3x3<f32>",
        UniformKind::Mat4 => "mat4x4<f32>",
        _ => "vec4<f32>",
    }
}

/// Prepend generated binding declarations to `body`.
fn compose(source: ShaderSource, body: &str) -> ShaderSource {
    let mut header = String::new();
    for (i, kind) in source.textures.iter().enumerate() {
        let ty = match kind {
            TextureSlotKind::Color2D => "texture_2d<f32>",
            TextureSlotKind::Depth2D => "texture_depth_2d",
            TextureSlotKind::Lut3D => "texture_3d<f32>",
            TextureSlotKind::Cube => "texture_cube<f32>",
        };
        header.push_str(&format!(
            "@group(0) @binding({}) var t{i}: {ty};\n@group(0) @binding({}) var s{i}: sampler;\n",
            2 * i,
            2 * i + 1
        ));
    }
    if !source.uniforms.is_empty() {
        header.push_str("struct Uniforms {\n");
        for (name, kind) in &source.uniforms {
            header.push_str(&format!("    {name}: {},\n", wgsl_type(*kind)));
        }
        header.push_str("}\n@group(1) @binding(0) var<uniform> u: Uniforms;\n");
    }
    let wgsl = format!("{header}{}", body);
    ShaderSource { wgsl, ..source }
}

// ── Full-screen passes ───────────────────────────────────────────────────────

pub fn passthrough() -> ShaderSource {
    let src = ShaderSource::new(PASSTHROUGH, ShaderStage::FullscreenQuad, "")
        .texture(TextureSlotKind::Color2D);
    compose(
        src,
        &format!(
            "{FULLSCREEN_VS}
@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {{
    return textureSample(t0, s0, in.uv);
}}"
        ),
    )
}

/// Mixes the source colour with its LUT-mapped value by `u_intensity`.
pub fn color_correct() -> ShaderSource {
    let src = ShaderSource::new(COLOR_CORRECT, ShaderStage::FullscreenQuad, "")
        .texture(TextureSlotKind::Color2D)
        .texture(TextureSlotKind::Lut3D)
        .uniform("u_intensity", UniformKind::Float);
    compose(
        src,
        &format!(
            "{FULLSCREEN_VS}
@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {{
    let source = textureSample(t0, s0, in.uv);
    let graded = textureSample(t1, s1, clamp(source.rgb, vec3<f32>(0.0), vec3<f32>(1.0))).rgb;
    return vec4<f32>(mix(source.rgb, graded, u.u_intensity.x), source.a);
}}"
        ),
    )
}

/// Screen-space textured rectangle. `u_rect` is (x, y, w, h) in NDC with
/// (x, y) the top-left corner.
pub fn sprite() -> ShaderSource {
    let src = ShaderSource::new(SPRITE, ShaderStage::FullscreenQuad, "")
        .texture(TextureSlotKind::Color2D)
        .uniform("u_rect", UniformKind::Vec4)
        .uniform("u_tint", UniformKind::Vec4)
        .blend(BlendMode::Alpha);
    compose(
        src,
        "
struct VertexOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VertexOut {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, 1.0),
    );
    let c = corners[vi];
    var out: VertexOut;
    out.pos = vec4<f32>(u.u_rect.x + c.x * u.u_rect.z, u.u_rect.y - c.y * u.u_rect.w, 0.0, 1.0);
    out.uv = c;
    return out;
}

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    return textureSample(t0, s0, in.uv) * u.u_tint;
}",
    )
}

// ── World programs ───────────────────────────────────────────────────────────

const MESH_VS: &str = "
struct MeshIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) next_position: vec3<f32>,
    @location(4) next_normal: vec3<f32>,
    @location(5) next_uv: vec2<f32>,
}

struct MeshOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

@vertex
fn vs_main(v: MeshIn) -> MeshOut {
    let t = u.u_blend.x;
    let local = mix(v.position, v.next_position, t);
    let normal = normalize(mix(v.normal, v.next_normal, t));
    let grown = local + normal * u.u_outline_pass.x * u.u_outline.x;
    let world = u.u_model * vec4<f32>(grown, 1.0);
    var out: MeshOut;
    out.pos = u.u_view_proj * world;
    // The hull keeps the unextruded depth, pushed back, so the mesh wins inside the silhouette.
    let base = u.u_view_proj * u.u_model * vec4<f32>(local, 1.0);
    let hull_z = (base.z / base.w + 0.0005) * out.pos.w;
    out.pos.z = mix(out.pos.z, hull_z, u.u_outline_pass.x);
    out.world_pos = world.xyz;
    out.normal = normalize((u.u_model * vec4<f32>(normal, 0.0)).xyz);
    out.uv = v.uv;
    return out;
}
";

/// Lit mesh shader. Texture slots: albedo, specular, height, environment cube.
/// `u_light_flags` is (lit, ambient, specular, outline).
pub fn lit_mesh(label: &str) -> ShaderSource {
    let src = ShaderSource::new(label, ShaderStage::Mesh, "")
        .texture(TextureSlotKind::Color2D)
        .texture(TextureSlotKind::Color2D)
        .texture(TextureSlotKind::Color2D)
        .texture(TextureSlotKind::Cube)
        .uniform("u_view_proj", UniformKind::Mat4)
        .uniform("u_model", UniformKind::Mat4)
        .uniform("u_blend", UniformKind::Float)
        .uniform("u_camera_pos", UniformKind::Vec3)
        .uniform("u_light_dir", UniformKind::Vec3)
        .uniform("u_light_color", UniformKind::Vec4)
        .uniform("u_ambient", UniformKind::Vec4)
        .uniform("u_light_flags", UniformKind::Vec4)
        .uniform("u_shininess", UniformKind::Float)
        .uniform("u_height_influence", UniformKind::Float)
        .uniform("u_outline", UniformKind::Float)
        .uniform("u_outline_pass", UniformKind::Float)
        .uniform("u_tint", UniformKind::Vec4);
    compose(
        src,
        &format!(
            "{MESH_VS}
@fragment
fn fs_main(in: MeshOut) -> @location(0) vec4<f32> {{
    if (u.u_outline_pass.x > 0.5) {{
        return vec4<f32>(0.0, 0.0, 0.0, 1.0);
    }}
    let albedo = textureSample(t0, s0, in.uv) * u.u_tint;
    let spec_map = textureSample(t1, s1, in.uv).r;
    let height = textureSample(t2, s2, in.uv).r * u.u_height_influence.x;
    let flags = u.u_light_flags;
    if (flags.x < 0.5) {{
        return albedo;
    }}
    let n = normalize(in.normal);
    let l = normalize(-u.u_light_dir.xyz);
    let v = normalize(u.u_camera_pos.xyz - in.world_pos);
    let diffuse = max(dot(n, l), 0.0) * u.u_light_color.rgb * u.u_light_color.a;
    var color = albedo.rgb * diffuse * (0.75 + 0.25 * height);
    if (flags.y > 0.5) {{
        color += albedo.rgb * u.u_ambient.rgb * u.u_ambient.a;
    }}
    if (flags.z > 0.5) {{
        let h = normalize(l + v);
        let power = max(u.u_shininess.x, 1.0);
        let spec = pow(max(dot(n, h), 0.0), power) * spec_map;
        let env = textureSample(t3, s3, reflect(-v, n)).rgb;
        color += (u.u_light_color.rgb * spec + env * 0.1 * spec_map);
    }}
    return vec4<f32>(color, albedo.a);
}}"
        ),
    )
}

pub fn skybox() -> ShaderSource {
    let src = ShaderSource::new(SKYBOX, ShaderStage::Mesh, "")
        .texture(TextureSlotKind::Cube)
        .uniform("u_view_proj", UniformKind::Mat4);
    compose(
        src,
        "
struct MeshIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) next_position: vec3<f32>,
    @location(4) next_normal: vec3<f32>,
    @location(5) next_uv: vec2<f32>,
}

struct SkyOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) dir: vec3<f32>,
}

@vertex
fn vs_main(v: MeshIn) -> SkyOut {
    var out: SkyOut;
    let clip = u.u_view_proj * vec4<f32>(v.position, 1.0);
    out.pos = clip.xyww;
    out.dir = v.position;
    return out;
}

@fragment
fn fs_main(in: SkyOut) -> @location(0) vec4<f32> {
    return textureSample(t0, s0, normalize(in.dir));
}",
    )
}

pub fn particles() -> ShaderSource {
    let src = ShaderSource::new(PARTICLES, ShaderStage::Particles, "")
        .texture(TextureSlotKind::Color2D)
        .uniform("u_view_proj", UniformKind::Mat4)
        .uniform("u_camera_right", UniformKind::Vec3)
        .uniform("u_camera_up", UniformKind::Vec3)
        .blend(BlendMode::Alpha);
    compose(
        src,
        "
struct QuadIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) position_size: vec4<f32>,
    @location(4) color: vec4<f32>,
}

struct ParticleOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
}

@vertex
fn vs_main(v: QuadIn) -> ParticleOut {
    let size = v.position_size.w;
    let world = v.position_size.xyz
        + u.u_camera_right.xyz * v.position.x * size
        + u.u_camera_up.xyz * v.position.y * size;
    var out: ParticleOut;
    out.pos = u.u_view_proj * vec4<f32>(world, 1.0);
    out.uv = v.uv;
    out.color = v.color;
    return out;
}

@fragment
fn fs_main(in: ParticleOut) -> @location(0) vec4<f32> {
    return textureSample(t0, s0, in.uv) * in.color;
}",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_header_declares_every_slot() {
        let src = color_correct();
        assert!(src.wgsl.contains("var t1: texture_3d<f32>"));
        assert!(src.wgsl.contains("u_intensity: vec4<f32>"));
        assert!(src.wgsl.contains("fn fs_main"));
    }

    #[test]
    fn programs_without_uniforms_skip_the_block() {
        let src = passthrough();
        assert!(!src.wgsl.contains("struct Uniforms"));
    }

    #[test]
    fn lit_mesh_declares_four_material_slots() {
        assert_eq!(lit_mesh(LIT_MESH).textures.len(), 4);
    }
}
