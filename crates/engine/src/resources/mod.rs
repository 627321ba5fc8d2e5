mod cache;
mod font;
mod mesh;
mod shader;
mod texture;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::gpu::GpuError;

pub use cache::{Handle, ResourceCache, ResourceId, ResourceManager};
pub use font::{Font, Glyph, GlyphBounds, DEFAULT_PIXEL_RANGE};
pub use mesh::{Mesh, MeshVertex};
pub use shader::{Shader, ShaderStage};
pub use texture::Texture;

/// A cacheable asset. Each type names its own loader through this impl.
pub trait Resource: Sized + Send + Sync + 'static {
    type Args;

    /// Short label used in logs.
    const KIND: &'static str;

    fn load(ctx: &LoadContext, name: &str, args: Self::Args) -> Result<Self, ResourceLoadError>;
}

#[derive(Debug, Clone)]
pub struct LoadContext {
    asset_root: PathBuf,
}

impl LoadContext {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: asset_root.into(),
        }
    }

    pub fn asset_root(&self) -> &Path {
        &self.asset_root
    }

    pub fn fonts_dir(&self) -> PathBuf {
        self.asset_root.join("fonts")
    }

    pub fn textures_dir(&self) -> PathBuf {
        self.asset_root.join("textures")
    }

    pub fn shaders_dir(&self) -> PathBuf {
        self.asset_root.join("shaders")
    }

    pub fn models_dir(&self) -> PathBuf {
        self.asset_root.join("models")
    }
}

#[derive(Debug, Error)]
pub enum ResourceLoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid data in {path}: {message}")]
    InvalidData { path: PathBuf, message: String },
    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to create GPU object for {path}: {source}")]
    Gpu {
        path: PathBuf,
        #[source]
        source: GpuError,
    },
    #[error("failed to parse {path} at line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("failed to compile {stage:?} shader {path}: {message}")]
    ShaderCompile {
        path: PathBuf,
        stage: ShaderStage,
        message: String,
    },
}
