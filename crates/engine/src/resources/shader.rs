use std::fs;
use std::path::Path;

use tracing::debug;

use super::{LoadContext, Resource, ResourceLoadError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn extension(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vert",
            ShaderStage::Fragment => "frag",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSource {
    pub source: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub uniforms: Vec<String>,
}

/// A vertex/fragment program pair. The software renderer does not execute
/// GLSL; loading validates both stages and their interface so a broken
/// program is caught at load time instead of at draw time.
#[derive(Debug, Clone)]
pub struct Shader {
    name: String,
    vertex: StageSource,
    fragment: StageSource,
}

impl Shader {
    pub fn from_sources(
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, ResourceLoadError> {
        let vertex = compile_stage(Path::new(name), ShaderStage::Vertex, vertex_source)?;
        let fragment = compile_stage(Path::new(name), ShaderStage::Fragment, fragment_source)?;
        link(name, &vertex, &fragment)?;
        Ok(Self {
            name: name.to_string(),
            vertex,
            fragment,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self, stage: ShaderStage) -> &StageSource {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.vertex.uniforms.iter().any(|uniform| uniform == name)
            || self.fragment.uniforms.iter().any(|uniform| uniform == name)
    }
}

impl Resource for Shader {
    type Args = ();
    const KIND: &'static str = "shader";

    fn load(ctx: &LoadContext, name: &str, _args: ()) -> Result<Self, ResourceLoadError> {
        let base = ctx.shaders_dir();
        let read_stage = |stage: ShaderStage| {
            let path = base.join(format!("{name}.{}", stage.extension()));
            let raw = fs::read_to_string(&path).map_err(|source| ResourceLoadError::Read {
                path: path.clone(),
                source,
            })?;
            compile_stage(&path, stage, &raw)
        };
        let vertex = read_stage(ShaderStage::Vertex)?;
        let fragment = read_stage(ShaderStage::Fragment)?;
        link(name, &vertex, &fragment)?;
        debug!(
            shader = name,
            uniforms = vertex.uniforms.len() + fragment.uniforms.len(),
            "shader_linked"
        );
        Ok(Self {
            name: name.to_string(),
            vertex,
            fragment,
        })
    }
}

fn compile_stage(
    path: &Path,
    stage: ShaderStage,
    source: &str,
) -> Result<StageSource, ResourceLoadError> {
    let fail = |message: String| ResourceLoadError::ShaderCompile {
        path: path.to_path_buf(),
        stage,
        message,
    };

    let first_directive = source
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("//"));
    if !first_directive.is_some_and(|line| line.starts_with("#version")) {
        return Err(fail("missing leading #version directive".to_string()));
    }
    if !source.contains("void main") {
        return Err(fail("no `void main` entry point".to_string()));
    }

    let mut depth = 0i32;
    for ch in source.chars() {
        match ch {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return Err(fail("unbalanced braces".to_string()));
        }
    }
    if depth != 0 {
        return Err(fail("unbalanced braces".to_string()));
    }

    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    let mut uniforms = Vec::new();
    for line in source.lines() {
        let Some((qualifier, ident)) = declaration(line) else {
            continue;
        };
        match qualifier {
            "in" => inputs.push(ident),
            "out" => outputs.push(ident),
            "uniform" => uniforms.push(ident),
            _ => {}
        }
    }

    Ok(StageSource {
        source: source.to_string(),
        inputs,
        outputs,
        uniforms,
    })
}

/// Parses `[layout(...)] <qualifier> <type> <name>;` into qualifier and name.
fn declaration(line: &str) -> Option<(&str, String)> {
    let mut line = line.trim();
    if line.starts_with("layout") {
        let close = line.find(')')?;
        line = line[close + 1..].trim_start();
    }
    let statement = line.strip_suffix(';')?;
    let mut words = statement.split_whitespace();
    let qualifier = words.next()?;
    if !matches!(qualifier, "in" | "out" | "uniform") {
        return None;
    }
    let _ty = words.next()?;
    let name = words.next()?;
    let name = name.split('[').next().unwrap_or(name);
    Some((qualifier, name.to_string()))
}

fn link(name: &str, vertex: &StageSource, fragment: &StageSource) -> Result<(), ResourceLoadError> {
    let unmatched: Vec<&str> = fragment
        .inputs
        .iter()
        .filter(|input| !vertex.outputs.contains(input))
        .map(String::as_str)
        .collect();
    if unmatched.is_empty() {
        return Ok(());
    }
    Err(ResourceLoadError::InvalidData {
        path: Path::new(name).to_path_buf(),
        message: format!(
            "link failed: fragment inputs without vertex outputs: {}",
            unmatched.join(", ")
        ),
    })
}
