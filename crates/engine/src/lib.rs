use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod gpu;
pub mod resources;
pub mod text;

pub use app::{
    describe_entity, run_app, run_app_with_metrics, run_timers, AppError, Command, CommandError,
    CommandOutput, CommandRegistry, ConsoleMessage, ConsoleState, DispatchOutcome, DrawStats,
    Engine, EngineEvent, Entity, EntityId, EventQueue, GameState, Inspect, InputSnapshot, Key,
    LoopConfig, LoopMetricsSnapshot, MeshInstance, MessageLevel, MetricsHandle, Projection,
    RenderSettings, Renderer, RunHandle, SettingsHandle, TextLabel, Timer, Viewport, World,
};
pub use resources::{
    Font, Glyph, GlyphBounds, Handle, Mesh, MeshVertex, Resource, ResourceId, ResourceLoadError,
    ResourceManager, Shader, ShaderStage, Texture,
};
pub use text::{build_text_mesh, TextLayoutReport, TextMesh, TextMeshMode, TextVertex};

pub const ROOT_ENV_VAR: &str = "UI_ENGINE_ROOT";
pub const CONFIG_FILE_NAME: &str = "engine.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
    /// Optional loop config; absence means defaults.
    pub config_path: PathBuf,
}

impl AppPaths {
    pub fn from_root(root: PathBuf) -> Self {
        Self {
            assets_dir: root.join("assets"),
            config_path: root.join(CONFIG_FILE_NAME),
            root,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "{env_var} is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf, env_var: &'static str },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/ui-engine\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    resolve_root().map(AppPaths::from_root)
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(Path::new(&value));
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot {
                    path: normalized,
                    env_var: ROOT_ENV_VAR,
                })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            find_root_from(&exe_dir).ok_or_else(|| StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn find_root_from(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| is_repo_marker(candidate))
        .map(normalize_path)
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn repo_marker_requires_cargo_toml() {
        let temp = TempDir::new().expect("temp dir");
        fs::create_dir_all(temp.path().join("assets")).expect("assets");
        assert!(!is_repo_marker(temp.path()));

        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("cargo toml");
        assert!(is_repo_marker(temp.path()));
    }

    #[test]
    fn root_is_found_from_nested_directory() {
        let temp = TempDir::new().expect("temp dir");
        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("cargo toml");
        let nested = temp.path().join("crates").join("sandbox").join("target");
        fs::create_dir_all(&nested).expect("nested");

        let root = find_root_from(&nested).expect("root");
        assert_eq!(root, normalize_path(temp.path()));

        let paths = AppPaths::from_root(root.clone());
        assert_eq!(paths.assets_dir, root.join("assets"));
        assert_eq!(paths.config_path, root.join("engine.json"));
    }
}
