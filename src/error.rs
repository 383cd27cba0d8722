use thiserror::Error;

/// Which registry an asset name was looked up in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Mesh,
    Texture2D,
    Shader,
    Skybox,
    Lut,
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AssetKind::Mesh => "mesh",
            AssetKind::Texture2D => "texture",
            AssetKind::Shader => "shader",
            AssetKind::Skybox => "skybox",
            AssetKind::Lut => "LUT",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("{kind} '{name}' was never registered")]
    NotRegistered { kind: AssetKind, name: String },

    #[error("{kind} '{name}' is registered but set {set} has not finished loading")]
    NotLoaded { kind: AssetKind, name: String, set: u32 },

    #[error("failed to decode '{path}': {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("asset loader thread for set {0} disconnected")]
    LoaderGone(u32),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("shader '{label}' failed to compile: {message}")]
    ShaderCompile { label: String, message: String },

    #[error("framebuffer of size {width}x{height} is invalid")]
    InvalidFramebufferSize { width: u32, height: u32 },

    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to create device: {0}")]
    Device(String),

    #[error("failed to create surface: {0}")]
    Surface(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level error surfaced by startup paths. Every variant is fatal.
#[derive(Error, Debug)]
pub enum TitanError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("event loop error: {0}")]
    EventLoop(String),
}
