use std::path::Path;

use glam::Vec3;

use crate::assets::AssetSystem;
use crate::error::AssetError;
use crate::graphics::backend::{CubemapHandle, LutHandle, MeshHandle, ShaderHandle, TextureHandle};
use crate::graphics::texture::{CubemapData, LutData, LutPreset, TextureData};
use crate::graphics::{mesh, shaders};

/// Loaded synchronously before the first frame: what the splash and loading
/// screens need.
pub const SET_BOOT: u32 = 0;
/// Shaders and meshes, decoded in the background.
pub const SET_WORLD: u32 = 1;
/// Textures, the sky and the color tables, decoded in the background.
pub const SET_LOOKS: u32 = 2;

pub const BOAT_MODELS: usize = 3;

pub const SHADER_SPRITE: &str = "sprite";
pub const SHADER_LIT: &str = "lit";
pub const SHADER_SKYBOX: &str = "skybox";
pub const SHADER_PARTICLES: &str = "particles";

pub const MESH_CANNON: &str = "cannon";
pub const MESH_BOATS: [&str; BOAT_MODELS] = ["boat_0", "boat_1", "boat_2"];
pub const MESH_SPHERE: &str = "sphere";
pub const MESH_QUAD: &str = "quad";
pub const MESH_SKY_CUBE: &str = "sky_cube";
pub const MESH_DAM: &str = "dam";
pub const MESH_BIRD: &str = "bird";
pub const MESH_FLAMETHROWER: &str = "flamethrower";
pub const MESH_WATER: &str = "water";

pub const TEX_SPLASH: &str = "splash";
pub const TEX_LOADING: &str = "loading";
pub const TEX_WHITE: &str = "white";
pub const TEX_BOAT: &str = "boat";
pub const TEX_CANNON: &str = "cannon";
pub const TEX_CANNONBALL: &str = "cannonball";
pub const TEX_DAM: &str = "dam";
pub const TEX_WATER: &str = "water";
pub const TEX_BIRD: &str = "bird";
pub const TEX_PARTICLE: &str = "particle";
pub const TEX_MENU_BG: &str = "menu_background";
pub const TEX_BUTTON: &str = "button";
pub const TEX_BUTTON_HOVER: &str = "button_hover";
pub const TEX_PLAY: &str = "label_play";
pub const TEX_QUIT: &str = "label_quit";
pub const TEX_RESUME: &str = "label_resume";
pub const TEX_MENU: &str = "label_menu";
pub const TEX_RETRY: &str = "label_retry";
pub const TEX_VICTORY: &str = "victory";
pub const TEX_DEFEAT: &str = "defeat";
pub const TEX_CROSSHAIR: &str = "crosshair";
pub const TEX_HEALTH: &str = "health";

pub const SKYBOX: &str = "sky";
pub const LUT_WARM: &str = "warm";
pub const LUT_COOL: &str = "cool";
pub const LUT_CUSTOM: &str = "custom";

pub const SOUND_CANNON: &str = "cannon";
pub const SOUND_EXPLOSION: &str = "explosion";
pub const MUSIC: &str = "music";

/// Register every asset the game uses. Textures come from
/// `<asset_dir>/textures/<name>.png` when present, otherwise from a generated
/// stand-in, so the game runs from a bare checkout.
pub fn register_assets(assets: &mut AssetSystem, asset_dir: &Path) {
    let tex = asset_dir.join("textures");
    let file = |name: &str| tex.join(format!("{name}.png"));

    // Boot
    assets.add_shader_to_be_loaded(SHADER_SPRITE, SET_BOOT, shaders::sprite());
    assets.add_texture_file_or(TEX_SPLASH, SET_BOOT, file(TEX_SPLASH), || {
        TextureData::vertical_gradient(4, 64, [24, 60, 110, 255], [6, 14, 30, 255])
    });
    assets.add_texture_file_or(TEX_LOADING, SET_BOOT, file(TEX_LOADING), || {
        TextureData::vertical_gradient(4, 64, [40, 40, 48, 255], [10, 10, 14, 255])
    });
    assets.add_texture_to_be_loaded(TEX_WHITE, SET_BOOT, || TextureData::solid([255; 4]));

    // World
    assets.add_shader_to_be_loaded(SHADER_LIT, SET_WORLD, shaders::lit_mesh(shaders::LIT_MESH));
    assets.add_shader_to_be_loaded(SHADER_SKYBOX, SET_WORLD, shaders::skybox());
    assets.add_shader_to_be_loaded(SHADER_PARTICLES, SET_WORLD, shaders::particles());
    assets.add_mesh_to_be_loaded(MESH_CANNON, SET_WORLD, mesh::cannon);
    for (variant, name) in MESH_BOATS.iter().enumerate() {
        assets.add_mesh_to_be_loaded(name, SET_WORLD, move || mesh::boat(variant as u32));
    }
    assets.add_mesh_to_be_loaded(MESH_SPHERE, SET_WORLD, || mesh::uv_sphere(1.0, 12, 16));
    assets.add_mesh_to_be_loaded(MESH_QUAD, SET_WORLD, mesh::quad);
    assets.add_mesh_to_be_loaded(MESH_SKY_CUBE, SET_WORLD, || mesh::cube(1.0));
    assets.add_mesh_to_be_loaded(MESH_DAM, SET_WORLD, mesh::dam);
    assets.add_mesh_to_be_loaded(MESH_BIRD, SET_WORLD, mesh::bird);
    assets.add_mesh_to_be_loaded(MESH_FLAMETHROWER, SET_WORLD, || {
        mesh::cuboid(Vec3::new(0.0, 0.0, 0.5), Vec3::new(0.6, 0.6, 1.2))
    });
    assets.add_mesh_to_be_loaded(MESH_WATER, SET_WORLD, || mesh::plane(400.0, 40.0));

    // Looks
    let fallbacks: [(&str, fn() -> TextureData); 19] = [
        (TEX_BOAT, || TextureData::checker(64, 8, [120, 82, 48, 255], [98, 64, 36, 255])),
        (TEX_CANNON, || TextureData::solid([60, 60, 66, 255])),
        (TEX_CANNONBALL, || TextureData::solid([30, 30, 30, 255])),
        (TEX_DAM, || TextureData::checker(64, 16, [150, 150, 140, 255], [130, 130, 122, 255])),
        (TEX_WATER, || TextureData::vertical_gradient(4, 32, [40, 110, 150, 255], [20, 70, 110, 255])),
        (TEX_BIRD, || TextureData::solid([240, 240, 240, 255])),
        (TEX_PARTICLE, || TextureData::solid([255; 4])),
        (TEX_MENU_BG, || TextureData::vertical_gradient(4, 64, [30, 80, 120, 255], [8, 20, 36, 255])),
        (TEX_BUTTON, || TextureData::solid([70, 90, 110, 230])),
        (TEX_BUTTON_HOVER, || TextureData::solid([110, 140, 170, 240])),
        (TEX_PLAY, || TextureData::solid([90, 200, 110, 255])),
        (TEX_QUIT, || TextureData::solid([210, 80, 70, 255])),
        (TEX_RESUME, || TextureData::solid([90, 200, 110, 255])),
        (TEX_MENU, || TextureData::solid([200, 200, 90, 255])),
        (TEX_RETRY, || TextureData::solid([90, 160, 220, 255])),
        (TEX_VICTORY, || TextureData::vertical_gradient(4, 32, [250, 220, 90, 255], [180, 120, 30, 255])),
        (TEX_DEFEAT, || TextureData::vertical_gradient(4, 32, [200, 40, 40, 255], [80, 10, 10, 255])),
        (TEX_CROSSHAIR, || TextureData::solid([255, 255, 255, 200])),
        (TEX_HEALTH, || TextureData::solid([200, 40, 40, 255])),
    ];
    for (name, fallback) in fallbacks {
        assets.add_texture_file_or(name, SET_LOOKS, file(name), fallback);
    }
    assets.add_skybox_to_be_loaded(SKYBOX, SET_LOOKS, || {
        CubemapData::sky_gradient(64, [70, 120, 200, 255], [190, 215, 235, 255], [60, 70, 60, 255])
    });
    assets.add_lut_to_be_loaded(LUT_WARM, SET_LOOKS, || LutData::preset(LutPreset::Warm, LutData::DEFAULT_SIZE));
    assets.add_lut_to_be_loaded(LUT_COOL, SET_LOOKS, || LutData::preset(LutPreset::Cool, LutData::DEFAULT_SIZE));
    assets.add_lut_to_be_loaded(LUT_CUSTOM, SET_LOOKS, || LutData::preset(LutPreset::Custom, LutData::DEFAULT_SIZE));
}

/// Handles the game world needs, resolved once every set is resident.
#[derive(Copy, Clone, Debug)]
pub struct GameAssets {
    pub lit: ShaderHandle,
    pub skybox_shader: ShaderHandle,
    pub particles: ShaderHandle,
    pub sprite: ShaderHandle,

    pub cannon: MeshHandle,
    pub boats: [MeshHandle; BOAT_MODELS],
    pub sphere: MeshHandle,
    pub quad: MeshHandle,
    pub sky_cube: MeshHandle,
    pub dam: MeshHandle,
    pub bird: MeshHandle,
    pub flamethrower: MeshHandle,
    pub water: MeshHandle,

    pub boat_tex: TextureHandle,
    pub cannon_tex: TextureHandle,
    pub cannonball_tex: TextureHandle,
    pub dam_tex: TextureHandle,
    pub water_tex: TextureHandle,
    pub bird_tex: TextureHandle,
    pub particle_tex: TextureHandle,
    pub crosshair_tex: TextureHandle,
    pub health_tex: TextureHandle,

    pub sky: CubemapHandle,
    pub lut_warm: LutHandle,
    pub lut_cool: LutHandle,
    pub lut_custom: LutHandle,
}

impl GameAssets {
    /// Look up every handle the level needs. Shaders are resolved first, so
    /// an unloaded world set is reported by its first shader.
    pub fn resolve(assets: &AssetSystem) -> Result<Self, AssetError> {
        let lit = assets.get_shader(SHADER_LIT)?;
        let skybox_shader = assets.get_shader(SHADER_SKYBOX)?;
        let particles = assets.get_shader(SHADER_PARTICLES)?;
        let sprite = assets.get_shader(SHADER_SPRITE)?;
        let boats = [
            assets.get_mesh(MESH_BOATS[0])?,
            assets.get_mesh(MESH_BOATS[1])?,
            assets.get_mesh(MESH_BOATS[2])?,
        ];
        Ok(Self {
            lit,
            skybox_shader,
            particles,
            sprite,

            cannon: assets.get_mesh(MESH_CANNON)?,
            boats,
            sphere: assets.get_mesh(MESH_SPHERE)?,
            quad: assets.get_mesh(MESH_QUAD)?,
            sky_cube: assets.get_mesh(MESH_SKY_CUBE)?,
            dam: assets.get_mesh(MESH_DAM)?,
            bird: assets.get_mesh(MESH_BIRD)?,
            flamethrower: assets.get_mesh(MESH_FLAMETHROWER)?,
            water: assets.get_mesh(MESH_WATER)?,

            boat_tex: assets.get_texture_2d(TEX_BOAT)?,
            cannon_tex: assets.get_texture_2d(TEX_CANNON)?,
            cannonball_tex: assets.get_texture_2d(TEX_CANNONBALL)?,
            dam_tex: assets.get_texture_2d(TEX_DAM)?,
            water_tex: assets.get_texture_2d(TEX_WATER)?,
            bird_tex: assets.get_texture_2d(TEX_BIRD)?,
            particle_tex: assets.get_texture_2d(TEX_PARTICLE)?,
            crosshair_tex: assets.get_texture_2d(TEX_CROSSHAIR)?,
            health_tex: assets.get_texture_2d(TEX_HEALTH)?,

            sky: assets.get_skybox(SKYBOX)?,
            lut_warm: assets.get_lut(LUT_WARM)?,
            lut_cool: assets.get_lut(LUT_COOL)?,
            lut_custom: assets.get_lut(LUT_CUSTOM)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssetKind;
    use crate::graphics::HeadlessBackend;

    #[test]
    fn resolve_before_loading_names_the_missing_set() {
        let mut assets = AssetSystem::new();
        register_assets(&mut assets, Path::new("no/such/dir"));
        match GameAssets::resolve(&assets) {
            Err(AssetError::NotLoaded { kind: AssetKind::Shader, set, .. }) => assert_eq!(set, SET_WORLD),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn every_set_resolves_from_generated_fallbacks() {
        let mut backend = HeadlessBackend::new(320, 200);
        let mut assets = AssetSystem::new();
        register_assets(&mut assets, Path::new("no/such/dir"));
        for set in [SET_BOOT, SET_WORLD, SET_LOOKS] {
            assets.load_set_now(&mut backend, set).unwrap();
        }
        let game = GameAssets::resolve(&assets).unwrap();
        assert_ne!(game.lut_warm, game.lut_cool);
        assert!(assets.get_texture_2d(TEX_SPLASH).is_ok());
    }
}
