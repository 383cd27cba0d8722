use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use log::{debug, info, warn};

use crate::error::{AssetError, AssetKind, TitanError};
use crate::graphics::backend::{
    CubemapHandle, LutHandle, MeshHandle, RenderBackend, ShaderHandle, ShaderSource, TextureHandle,
};
use crate::graphics::mesh::MeshData;
use crate::graphics::texture::{CubemapData, LutData, TextureData};

type Loader<T> = Box<dyn FnOnce() -> Result<T, AssetError> + Send>;

/// CPU work registered for one set and not yet started.
#[derive(Default)]
struct PendingSet {
    meshes: Vec<(String, Loader<MeshData>)>,
    textures: Vec<(String, Loader<TextureData>)>,
    shaders: Vec<(String, ShaderSource)>,
    skyboxes: Vec<(String, Loader<CubemapData>)>,
    luts: Vec<(String, Loader<LutData>)>,
}

impl PendingSet {
    /// Run every loader. Called on the worker thread for background sets.
    fn decode(self) -> Result<DecodedSet, AssetError> {
        fn run<T>(items: Vec<(String, Loader<T>)>) -> Result<Vec<(String, T)>, AssetError> {
            items.into_iter().map(|(name, load)| Ok((name, load()?))).collect()
        }
        Ok(DecodedSet {
            meshes: run(self.meshes)?,
            textures: run(self.textures)?,
            shaders: self.shaders,
            skyboxes: run(self.skyboxes)?,
            luts: run(self.luts)?,
        })
    }
}

/// Decoded data ready for upload on the thread that owns the backend.
struct DecodedSet {
    meshes: Vec<(String, MeshData)>,
    textures: Vec<(String, TextureData)>,
    shaders: Vec<(String, ShaderSource)>,
    skyboxes: Vec<(String, CubemapData)>,
    luts: Vec<(String, LutData)>,
}

/// Named GPU assets grouped into numbered sets.
///
/// Assets are registered against a set with the `add_*_to_be_loaded`
/// methods, then a whole set is either loaded on the spot
/// ([`load_set_now`](Self::load_set_now)) or decoded on a worker thread
/// ([`load_set_in_background`](Self::load_set_in_background)) and uploaded
/// by [`poll`](Self::poll) once it arrives. Lookups by name fail with
/// [`AssetError`] when the name was never registered or its set is not
/// resident yet.
#[derive(Default)]
pub struct AssetSystem {
    registry: HashMap<(AssetKind, String), u32>,
    pending: BTreeMap<u32, PendingSet>,
    loading: HashMap<u32, Receiver<Result<DecodedSet, AssetError>>>,
    loaded: HashSet<u32>,

    meshes: HashMap<String, MeshHandle>,
    textures: HashMap<String, TextureHandle>,
    shaders: HashMap<String, ShaderHandle>,
    skyboxes: HashMap<String, CubemapHandle>,
    luts: HashMap<String, LutHandle>,
}

impl AssetSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, kind: AssetKind, name: &str, set: u32) {
        if let Some(prev) = self.registry.insert((kind, name.to_string()), set) {
            warn!("{kind} '{name}' re-registered (set {prev} -> {set})");
        }
        self.loaded.remove(&set);
    }

    fn set_mut(&mut self, set: u32) -> &mut PendingSet {
        self.pending.entry(set).or_default()
    }

    // ── Registration ─────────────────────────────────────────────────────────

    /// Register a procedurally generated mesh.
    pub fn add_mesh_to_be_loaded(
        &mut self,
        name: &str,
        set: u32,
        build: impl FnOnce() -> MeshData + Send + 'static,
    ) {
        self.register(AssetKind::Mesh, name, set);
        self.set_mut(set).meshes.push((name.to_string(), Box::new(move || Ok(build()))));
    }

    pub fn add_texture_to_be_loaded(
        &mut self,
        name: &str,
        set: u32,
        build: impl FnOnce() -> TextureData + Send + 'static,
    ) {
        self.register(AssetKind::Texture2D, name, set);
        self.set_mut(set).textures.push((name.to_string(), Box::new(move || Ok(build()))));
    }

    /// Register an image file, decoded with `image` when the set loads.
    pub fn add_texture_file_to_be_loaded(&mut self, name: &str, set: u32, path: impl Into<PathBuf>) {
        let path = path.into();
        self.register(AssetKind::Texture2D, name, set);
        self.set_mut(set)
            .textures
            .push((name.to_string(), Box::new(move || TextureData::from_file(&path))));
    }

    /// Like [`add_texture_file_to_be_loaded`](Self::add_texture_file_to_be_loaded),
    /// but a missing or undecodable file loads `fallback` instead.
    pub fn add_texture_file_or(
        &mut self,
        name: &str,
        set: u32,
        path: impl Into<PathBuf>,
        fallback: impl FnOnce() -> TextureData + Send + 'static,
    ) {
        let path = path.into();
        self.register(AssetKind::Texture2D, name, set);
        let label = name.to_string();
        self.set_mut(set).textures.push((
            name.to_string(),
            Box::new(move || {
                if !path.exists() {
                    return Ok(fallback());
                }
                TextureData::from_file(&path).or_else(|e| {
                    warn!("texture '{label}': {e}; using fallback");
                    Ok(fallback())
                })
            }),
        ));
    }

    /// Shaders are compiled on the backend's thread at upload time.
    pub fn add_shader_to_be_loaded(&mut self, name: &str, set: u32, source: ShaderSource) {
        self.register(AssetKind::Shader, name, set);
        self.set_mut(set).shaders.push((name.to_string(), source));
    }

    pub fn add_skybox_to_be_loaded(
        &mut self,
        name: &str,
        set: u32,
        build: impl FnOnce() -> CubemapData + Send + 'static,
    ) {
        self.register(AssetKind::Skybox, name, set);
        self.set_mut(set).skyboxes.push((name.to_string(), Box::new(move || Ok(build()))));
    }

    pub fn add_lut_to_be_loaded(
        &mut self,
        name: &str,
        set: u32,
        build: impl FnOnce() -> LutData + Send + 'static,
    ) {
        self.register(AssetKind::Lut, name, set);
        self.set_mut(set).luts.push((name.to_string(), Box::new(move || Ok(build()))));
    }

    /// Register every `.png` under `dir` as a texture named by its file stem.
    /// Only the first file with a given stem is used. Returns the number
    /// registered.
    pub fn register_texture_dir(&mut self, dir: impl AsRef<Path>, set: u32) -> usize {
        let mut seen: HashSet<String> = HashSet::new();
        let mut count = 0;
        for entry in walkdir::WalkDir::new(dir.as_ref())
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("png") {
                continue;
            }
            let name = match path.file_stem().and_then(|s| s.to_str()) {
                Some(n) if !n.is_empty() => n.to_string(),
                _ => continue,
            };
            if !seen.insert(name.clone()) {
                warn!("duplicate texture name '{name}' from {}; skipping", path.display());
                continue;
            }
            self.add_texture_file_to_be_loaded(&name, set, path.to_path_buf());
            count += 1;
        }
        debug!("registered {count} textures from {}", dir.as_ref().display());
        count
    }

    // ── Loading ──────────────────────────────────────────────────────────────

    /// Decode and upload `set` on the calling thread.
    pub fn load_set_now(&mut self, backend: &mut dyn RenderBackend, set: u32) -> Result<(), TitanError> {
        let pending = self.pending.remove(&set).unwrap_or_default();
        let decoded = pending.decode()?;
        self.upload(backend, set, decoded)
    }

    /// Decode `set` on a worker thread. [`poll`](Self::poll) uploads it once
    /// decoding finishes.
    pub fn load_set_in_background(&mut self, set: u32) {
        if self.loading.contains_key(&set) {
            return;
        }
        let pending = self.pending.remove(&set).unwrap_or_default();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(pending.decode());
        });
        debug!("asset set {set} decoding in background");
        self.loading.insert(set, rx);
    }

    /// Upload any background sets that have finished decoding. Never blocks.
    pub fn poll(&mut self, backend: &mut dyn RenderBackend) -> Result<(), TitanError> {
        let mut finished = Vec::new();
        for (&set, rx) in &self.loading {
            match rx.try_recv() {
                Ok(result) => finished.push((set, result)),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => finished.push((set, Err(AssetError::LoaderGone(set)))),
            }
        }
        for (set, result) in finished {
            self.loading.remove(&set);
            self.upload(backend, set, result?)?;
        }
        Ok(())
    }

    pub fn is_set_loaded(&self, set: u32) -> bool {
        self.loaded.contains(&set)
    }

    pub fn is_set_loading(&self, set: u32) -> bool {
        self.loading.contains_key(&set)
    }

    fn upload(&mut self, backend: &mut dyn RenderBackend, set: u32, decoded: DecodedSet) -> Result<(), TitanError> {
        for (name, source) in decoded.shaders {
            let handle = backend.compile_shader(&source)?;
            if let Some(old) = self.shaders.insert(name, handle) {
                backend.destroy_shader(old);
            }
        }
        for (name, mesh) in decoded.meshes {
            let handle = backend.upload_mesh(&mesh);
            if let Some(old) = self.meshes.insert(name, handle) {
                backend.destroy_mesh(old);
            }
        }
        for (name, tex) in decoded.textures {
            let handle = backend.upload_texture(&tex);
            if let Some(old) = self.textures.insert(name, handle) {
                backend.destroy_texture(old);
            }
        }
        for (name, cube) in decoded.skyboxes {
            let handle = backend.upload_cubemap(&cube);
            if let Some(old) = self.skyboxes.insert(name, handle) {
                backend.destroy_cubemap(old);
            }
        }
        for (name, lut) in decoded.luts {
            let handle = backend.upload_lut(&lut);
            if let Some(old) = self.luts.insert(name, handle) {
                backend.destroy_lut(old);
            }
        }
        self.loaded.insert(set);
        info!("asset set {set} loaded");
        Ok(())
    }

    // ── Lookup ───────────────────────────────────────────────────────────────

    fn lookup<H: Copy>(&self, map: &HashMap<String, H>, kind: AssetKind, name: &str) -> Result<H, AssetError> {
        if let Some(&h) = map.get(name) {
            return Ok(h);
        }
        match self.registry.get(&(kind, name.to_string())) {
            Some(&set) => Err(AssetError::NotLoaded { kind, name: name.to_string(), set }),
            None => Err(AssetError::NotRegistered { kind, name: name.to_string() }),
        }
    }

    pub fn get_mesh(&self, name: &str) -> Result<MeshHandle, AssetError> {
        self.lookup(&self.meshes, AssetKind::Mesh, name)
    }

    pub fn get_texture_2d(&self, name: &str) -> Result<TextureHandle, AssetError> {
        self.lookup(&self.textures, AssetKind::Texture2D, name)
    }

    pub fn get_shader(&self, name: &str) -> Result<ShaderHandle, AssetError> {
        self.lookup(&self.shaders, AssetKind::Shader, name)
    }

    pub fn get_skybox(&self, name: &str) -> Result<CubemapHandle, AssetError> {
        self.lookup(&self.skyboxes, AssetKind::Skybox, name)
    }

    pub fn get_lut(&self, name: &str) -> Result<LutHandle, AssetError> {
        self.lookup(&self.luts, AssetKind::Lut, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::headless::HeadlessBackend;
    use crate::graphics::texture::LutPreset;
    use crate::graphics::{mesh, shaders};
    use std::time::{Duration, Instant};

    #[test]
    fn lookup_distinguishes_unregistered_from_not_loaded() {
        let mut assets = AssetSystem::new();
        assets.add_mesh_to_be_loaded("cube", 1, || mesh::cube(0.5));
        assert!(matches!(assets.get_mesh("cube"), Err(AssetError::NotLoaded { set: 1, .. })));
        assert!(matches!(assets.get_mesh("sphere"), Err(AssetError::NotRegistered { .. })));
    }

    #[test]
    fn load_now_uploads_every_kind() {
        let mut backend = HeadlessBackend::new(8, 8);
        let mut assets = AssetSystem::new();
        assets.add_mesh_to_be_loaded("cube", 0, || mesh::cube(0.5));
        assets.add_texture_to_be_loaded("white", 0, || TextureData::solid([255; 4]));
        assets.add_shader_to_be_loaded("copy", 0, shaders::passthrough());
        assets.load_set_now(&mut backend, 0).unwrap();
        assert!(assets.is_set_loaded(0));
        assert!(assets.get_mesh("cube").is_ok());
        assert!(assets.get_texture_2d("white").is_ok());
        assert!(backend.is_shader_live(assets.get_shader("copy").unwrap()));
    }

    #[test]
    fn background_set_arrives_through_poll() {
        let mut backend = HeadlessBackend::new(8, 8);
        let mut assets = AssetSystem::new();
        assets.add_lut_to_be_loaded("lut", 2, || LutData::preset(LutPreset::Identity, 4));
        assets.load_set_in_background(2);
        let deadline = Instant::now() + Duration::from_secs(5);
        while !assets.is_set_loaded(2) && Instant::now() < deadline {
            assets.poll(&mut backend).unwrap();
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(assets.is_set_loaded(2));
        assert!(!assets.is_set_loading(2));
        assert!(assets.get_lut("lut").is_ok());
    }

    #[test]
    fn missing_file_fails_the_set() {
        let mut backend = HeadlessBackend::new(8, 8);
        let mut assets = AssetSystem::new();
        assets.add_texture_file_to_be_loaded("nope", 3, "no/such/file.png");
        assert!(matches!(
            assets.load_set_now(&mut backend, 3),
            Err(TitanError::Asset(AssetError::Decode { .. }))
        ));
        assert!(!assets.is_set_loaded(3));
    }

    #[test]
    fn reloading_a_name_releases_the_old_handle() {
        let mut backend = HeadlessBackend::new(8, 8);
        let mut assets = AssetSystem::new();
        let register = |assets: &mut AssetSystem| {
            assets.add_mesh_to_be_loaded("cube", 0, || mesh::cube(0.5));
            assets.add_texture_to_be_loaded("white", 0, || TextureData::solid([255; 4]));
            assets.add_lut_to_be_loaded("lut", 0, || LutData::preset(LutPreset::Identity, 4));
            assets.add_shader_to_be_loaded("copy", 0, shaders::passthrough());
        };
        register(&mut assets);
        assets.load_set_now(&mut backend, 0).unwrap();
        let live = backend.live_handles();
        let old_texture = assets.get_texture_2d("white").unwrap();

        register(&mut assets);
        assets.load_set_now(&mut backend, 0).unwrap();
        assert_eq!(backend.live_handles(), live);
        assert_ne!(assets.get_texture_2d("white").unwrap(), old_texture);
        assert!(backend.violations().is_empty(), "{:?}", backend.violations());
    }

    #[test]
    fn fallback_texture_covers_missing_file() {
        let mut backend = HeadlessBackend::new(8, 8);
        let mut assets = AssetSystem::new();
        assets.add_texture_file_or("metal", 0, "no/such/metal.png", || TextureData::solid([90; 4]));
        assets.load_set_now(&mut backend, 0).unwrap();
        assert!(assets.get_texture_2d("metal").is_ok());
    }
}
