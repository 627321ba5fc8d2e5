use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::gpu::GpuBuffer;

use super::{LoadContext, Resource, ResourceLoadError};

const DEFAULT_NORMAL: [f32; 3] = [0.0, 0.0, 1.0];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

/// Indexed triangle mesh read from a Wavefront OBJ file. Every vertex
/// carries the color passed as load args.
#[derive(Debug)]
pub struct Mesh {
    vertices: GpuBuffer<MeshVertex>,
    indices: GpuBuffer<u32>,
}

impl Mesh {
    pub fn from_obj_str(source: &str, color: [f32; 4]) -> Result<Self, ResourceLoadError> {
        let (vertices, indices) = parse_obj(source, Path::new("<inline>"), color)?;
        Ok(Self::from_parts(&vertices, &indices))
    }

    fn from_parts(vertices: &[MeshVertex], indices: &[u32]) -> Self {
        Self {
            vertices: GpuBuffer::from_slice(vertices),
            indices: GpuBuffer::from_slice(indices),
        }
    }

    pub fn vertices(&self) -> &[MeshVertex] {
        self.vertices.as_slice()
    }

    pub fn indices(&self) -> &[u32] {
        self.indices.as_slice()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

impl Resource for Mesh {
    type Args = [f32; 4];
    const KIND: &'static str = "mesh";

    fn load(ctx: &LoadContext, name: &str, color: [f32; 4]) -> Result<Self, ResourceLoadError> {
        let path = ctx.models_dir().join(format!("{name}.obj"));
        let source = fs::read_to_string(&path).map_err(|source| ResourceLoadError::Read {
            path: path.clone(),
            source,
        })?;
        let (vertices, indices) = parse_obj(&source, &path, color)?;
        debug!(
            mesh = name,
            vertices = vertices.len(),
            triangles = indices.len() / 3,
            "mesh_parsed"
        );
        Ok(Self::from_parts(&vertices, &indices))
    }
}

/// Position, texcoord and normal indices of one face corner, zero based.
type CornerKey = (usize, Option<usize>, Option<usize>);

fn parse_obj(
    source: &str,
    path: &Path,
    color: [f32; 4],
) -> Result<(Vec<MeshVertex>, Vec<u32>), ResourceLoadError> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut uvs: Vec<[f32; 2]> = Vec::new();
    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    let mut unique: HashMap<CornerKey, u32> = HashMap::new();

    for (line_index, raw_line) in source.lines().enumerate() {
        let line_number = line_index + 1;
        let fail = |message: String| ResourceLoadError::Parse {
            path: path.to_path_buf(),
            line: line_number,
            message,
        };

        let line = raw_line.split('#').next().unwrap_or("").trim();
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };
        let rest: Vec<&str> = parts.collect();

        match keyword {
            "v" => positions.push(parse_floats::<3>(&rest).map_err(fail)?),
            "vn" => normals.push(parse_floats::<3>(&rest).map_err(fail)?),
            "vt" => uvs.push(parse_floats::<2>(&rest).map_err(fail)?),
            "f" => {
                if rest.len() < 3 {
                    return Err(fail(format!("face needs at least 3 corners, got {}", rest.len())));
                }
                let mut corners = Vec::with_capacity(rest.len());
                for token in &rest {
                    let key = parse_corner(token, positions.len(), uvs.len(), normals.len())
                        .map_err(fail)?;
                    let index = match unique.get(&key) {
                        Some(index) => *index,
                        None => {
                            let (position, uv, normal) = key;
                            let index = vertices.len() as u32;
                            vertices.push(MeshVertex {
                                position: positions[position],
                                normal: normal.map_or(DEFAULT_NORMAL, |n| normals[n]),
                                uv: uv.map_or([0.0, 0.0], |t| uvs[t]),
                                color,
                            });
                            unique.insert(key, index);
                            index
                        }
                    };
                    corners.push(index);
                }
                for pair in corners[1..].windows(2) {
                    indices.extend_from_slice(&[corners[0], pair[0], pair[1]]);
                }
            }
            // Groups, materials and smoothing carry nothing the mesh uses.
            _ => {}
        }
    }

    Ok((vertices, indices))
}

fn parse_floats<const N: usize>(parts: &[&str]) -> Result<[f32; N], String> {
    if parts.len() < N {
        return Err(format!("expected {N} components, got {}", parts.len()));
    }
    let mut out = [0.0; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part
            .parse()
            .map_err(|_| format!("invalid number `{part}`"))?;
    }
    Ok(out)
}

fn parse_corner(
    token: &str,
    position_count: usize,
    uv_count: usize,
    normal_count: usize,
) -> Result<CornerKey, String> {
    let mut fields = token.split('/');
    let position = match fields.next() {
        Some(field) if !field.is_empty() => resolve_index(field, position_count)?,
        _ => return Err(format!("corner `{token}` has no position index")),
    };
    let uv = match fields.next() {
        Some(field) if !field.is_empty() => Some(resolve_index(field, uv_count)?),
        _ => None,
    };
    let normal = match fields.next() {
        Some(field) if !field.is_empty() => Some(resolve_index(field, normal_count)?),
        _ => None,
    };
    Ok((position, uv, normal))
}

/// OBJ indices are one based; negative values count back from the end.
fn resolve_index(field: &str, count: usize) -> Result<usize, String> {
    let raw: i64 = field
        .parse()
        .map_err(|_| format!("invalid index `{field}`"))?;
    let resolved = match raw {
        0 => None,
        r if r > 0 => Some(r as usize - 1),
        r => (count as i64 + r).try_into().ok(),
    };
    resolved
        .filter(|index| *index < count)
        .ok_or_else(|| format!("index {raw} out of range ({count} defined)"))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::resources::ResourceManager;

    const QUAD: &str = "\
# unit quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn quad_face_is_fan_triangulated() {
        let mesh = Mesh::from_obj_str(QUAD, [1.0, 0.5, 0.25, 1.0]).expect("mesh");

        assert_eq!(mesh.vertices().len(), 4);
        assert_eq!(mesh.indices(), &[0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.vertices()[2].uv, [1.0, 1.0]);
        assert!(mesh
            .vertices()
            .iter()
            .all(|vertex| vertex.color == [1.0, 0.5, 0.25, 1.0]));
    }

    #[test]
    fn shared_corners_are_deduplicated_by_index_triple() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nf 1 2 3\nf 2 4 3\nf 2//1 4 3\nvn 0 1 0\n";
        let error = Mesh::from_obj_str(source, [1.0; 4]).expect_err("normal used before defined");
        assert!(matches!(error, ResourceLoadError::Parse { line: 7, .. }));

        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nvn 0 1 0\nf 1 2 3\nf 2 4 3\nf 2//1 4 3\n";
        let mesh = Mesh::from_obj_str(source, [1.0; 4]).expect("mesh");
        assert_eq!(mesh.vertices().len(), 5);
        assert_eq!(mesh.indices(), &[0, 1, 2, 1, 3, 2, 4, 3, 2]);
        assert_eq!(mesh.vertices()[0].normal, DEFAULT_NORMAL);
        assert_eq!(mesh.vertices()[4].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = Mesh::from_obj_str(source, [1.0; 4]).expect("mesh");
        assert_eq!(mesh.vertices()[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.indices(), &[0, 1, 2]);
    }

    #[test]
    fn malformed_lines_report_line_numbers() {
        let bad_number = Mesh::from_obj_str("v 0 0 0\nv 1 x 0\n", [1.0; 4]).expect_err("number");
        assert!(matches!(bad_number, ResourceLoadError::Parse { line: 2, .. }));

        let short_face = Mesh::from_obj_str("v 0 0 0\nv 1 0 0\nf 1 2\n", [1.0; 4]).expect_err("face");
        assert!(matches!(short_face, ResourceLoadError::Parse { line: 3, .. }));

        let out_of_range = Mesh::from_obj_str("v 0 0 0\nf 1 2 3\n", [1.0; 4]).expect_err("range");
        assert!(out_of_range.to_string().contains("out of range"));
    }

    #[test]
    fn loads_from_models_dir_with_color_args() {
        let temp = TempDir::new().expect("tempdir");
        let dir = temp.path().join("models");
        fs::create_dir_all(&dir).expect("dir");
        fs::write(dir.join("quad.obj"), QUAD).expect("obj");

        let mut manager = ResourceManager::new(temp.path());
        let red = manager.load::<Mesh>("quad", [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(
            red.get().map(|mesh| mesh.vertices()[0].color),
            Some([1.0, 0.0, 0.0, 1.0])
        );
        assert!(manager.load::<Mesh>("missing", [1.0; 4]).is_empty());
    }
}
