use std::path::Path;

use glam::Vec3;

use crate::error::AssetError;

/// RGBA8 image, row-major, top row first.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureData {
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self { width: 1, height: 1, pixels: rgba.to_vec() }
    }

    pub fn checker(size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let size = size.max(1);
        let cell = (size / cells.max(1)).max(1);
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let c = if ((x / cell) + (y / cell)) % 2 == 0 { a } else { b };
                pixels.extend_from_slice(&c);
            }
        }
        Self { width: size, height: size, pixels }
    }

    pub fn vertical_gradient(width: u32, height: u32, top: [u8; 4], bottom: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            let t = if height > 1 { y as f32 / (height - 1) as f32 } else { 0.0 };
            let row = lerp_rgba(top, bottom, t);
            for _ in 0..width {
                pixels.extend_from_slice(&row);
            }
        }
        Self { width, height, pixels }
    }

    /// Decode a PNG from disk.
    pub fn from_file(path: &Path) -> Result<Self, AssetError> {
        let img = image::open(path)
            .map_err(|source| AssetError::Decode {
                path: path.display().to_string(),
                source,
            })?
            .to_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self { width, height, pixels: img.into_raw() })
    }
}

fn lerp_rgba(a: [u8; 4], b: [u8; 4], t: f32) -> [u8; 4] {
    let mut out = [0; 4];
    for i in 0..4 {
        out[i] = (a[i] as f32 + (b[i] as f32 - a[i] as f32) * t).round() as u8;
    }
    out
}

// ── LUT ──────────────────────────────────────────────────────────────────────

/// 3D colour lookup table, `size³` RGBA8 texels, red varying fastest.
#[derive(Clone, Debug, PartialEq)]
pub struct LutData {
    pub size: u32,
    pub texels: Vec<u8>,
}

/// Stock colour grades generated in place of `.cube` files.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LutPreset {
    Identity,
    Warm,
    Cool,
    /// Faded, slightly sepia look.
    Custom,
}

impl LutData {
    pub const DEFAULT_SIZE: u32 = 32;

    pub fn from_fn(size: u32, f: impl Fn(Vec3) -> Vec3) -> Self {
        let size = size.max(2);
        let max = (size - 1) as f32;
        let mut texels = Vec::with_capacity((size * size * size * 4) as usize);
        for b in 0..size {
            for g in 0..size {
                for r in 0..size {
                    let c = f(Vec3::new(r as f32 / max, g as f32 / max, b as f32 / max))
                        .clamp(Vec3::ZERO, Vec3::ONE);
                    texels.extend_from_slice(&[
                        (c.x * 255.0).round() as u8,
                        (c.y * 255.0).round() as u8,
                        (c.z * 255.0).round() as u8,
                        255,
                    ]);
                }
            }
        }
        Self { size, texels }
    }

    pub fn preset(preset: LutPreset, size: u32) -> Self {
        match preset {
            LutPreset::Identity => Self::from_fn(size, |c| c),
            LutPreset::Warm => Self::from_fn(size, |c| c * Vec3::new(1.12, 1.0, 0.82)),
            LutPreset::Cool => Self::from_fn(size, |c| c * Vec3::new(0.82, 0.98, 1.15)),
            LutPreset::Custom => Self::from_fn(size, |c| {
                let luma = c.dot(Vec3::new(0.299, 0.587, 0.114));
                let sepia = Vec3::new(luma * 1.07, luma * 0.74, luma * 0.43);
                c.lerp(sepia, 0.6) * 0.9 + Vec3::splat(0.05)
            }),
        }
    }

    /// Texel at integer grid coordinates.
    pub fn sample(&self, r: u32, g: u32, b: u32) -> [u8; 4] {
        let i = ((b * self.size + g) * self.size + r) as usize * 4;
        [self.texels[i], self.texels[i + 1], self.texels[i + 2], self.texels[i + 3]]
    }
}

// ── Cubemap ──────────────────────────────────────────────────────────────────

/// Six square RGBA8 faces in +X, -X, +Y, -Y, +Z, -Z order.
#[derive(Clone, Debug, PartialEq)]
pub struct CubemapData {
    pub size: u32,
    pub faces: [Vec<u8>; 6],
}

impl CubemapData {
    /// Sky that fades from `zenith` through `horizon` to `ground`.
    pub fn sky_gradient(size: u32, zenith: [u8; 4], horizon: [u8; 4], ground: [u8; 4]) -> Self {
        let size = size.max(1);
        let side = TextureData::vertical_gradient(size, size, zenith, ground).pixels;
        let up = TextureData::vertical_gradient(size, size, zenith, zenith).pixels;
        let down = TextureData::vertical_gradient(size, size, ground, ground).pixels;

        // Sides blend through the horizon colour at the middle row.
        let mut side_mid = side.clone();
        for y in 0..size {
            let t = y as f32 / (size.max(2) - 1) as f32;
            let c = if t < 0.5 {
                lerp_rgba(zenith, horizon, t * 2.0)
            } else {
                lerp_rgba(horizon, ground, (t - 0.5) * 2.0)
            };
            for x in 0..size {
                let i = ((y * size + x) * 4) as usize;
                side_mid[i..i + 4].copy_from_slice(&c);
            }
        }

        Self {
            size,
            faces: [side_mid.clone(), side_mid.clone(), up, down, side_mid.clone(), side_mid],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_lut_maps_corners_to_themselves() {
        let lut = LutData::preset(LutPreset::Identity, 4);
        assert_eq!(lut.sample(0, 0, 0), [0, 0, 0, 255]);
        assert_eq!(lut.sample(3, 3, 3), [255, 255, 255, 255]);
        assert_eq!(lut.sample(3, 0, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn warm_lut_pushes_red_over_blue() {
        let lut = LutData::preset(LutPreset::Warm, 8);
        let [r, _, b, _] = lut.sample(4, 4, 4);
        assert!(r > b);
    }

    #[test]
    fn gradient_endpoints() {
        let tex = TextureData::vertical_gradient(1, 3, [0, 0, 0, 255], [200, 100, 50, 255]);
        assert_eq!(&tex.pixels[0..4], &[0, 0, 0, 255]);
        assert_eq!(&tex.pixels[8..12], &[200, 100, 50, 255]);
    }

    #[test]
    fn missing_file_reports_decode_error() {
        let err = TextureData::from_file(Path::new("does/not/exist.png")).unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
    }
}
