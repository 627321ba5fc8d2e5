//! Glyph quad generation for MSDF fonts.
//!
//! Layout runs in font-size units with +Y up: newlines move the cursor down
//! by one font size and back to the origin X.

use tracing::{error, warn};

use crate::gpu::GpuBuffer;
use crate::resources::{Font, Glyph};

/// Character capacity for single-line dynamic meshes (console input).
pub const LINE_CAPACITY: usize = 512;

pub const VERTICES_PER_QUAD: usize = 4;
pub const INDICES_PER_QUAD: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMeshMode {
    /// Buffers sized exactly to the current text.
    Static,
    /// Buffers allocated once for `capacity` characters and rewritten in place.
    Dynamic { capacity: usize },
}

/// Outcome of one build or update.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextLayoutReport {
    pub quads: usize,
    /// Code points with neither their own glyph nor a `'?'` fallback.
    pub missing_glyphs: usize,
    /// Set when a dynamic mesh ran out of capacity and dropped the rest.
    pub truncated: bool,
    /// Pen position after the last code point.
    pub cursor: [f32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextBounds {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

impl TextBounds {
    pub fn width(&self) -> f32 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f32 {
        self.max[1] - self.min[1]
    }
}

#[derive(Debug)]
pub struct TextMesh {
    mode: TextMeshMode,
    origin: [f32; 2],
    font_size: f32,
    text: String,
    vertices: Vec<TextVertex>,
    indices: Vec<u32>,
    vertex_buffer: GpuBuffer<TextVertex>,
    index_buffer: GpuBuffer<u32>,
    report: TextLayoutReport,
}

/// Builds a static mesh sized exactly to `text`.
pub fn build_text_mesh(
    text: &str,
    font: &Font,
    origin_x: f32,
    origin_y: f32,
    font_size: f32,
) -> TextMesh {
    let mut mesh = TextMesh {
        mode: TextMeshMode::Static,
        origin: [origin_x, origin_y],
        font_size,
        text: String::new(),
        vertices: Vec::new(),
        indices: Vec::new(),
        vertex_buffer: GpuBuffer::from_slice(&[]),
        index_buffer: GpuBuffer::from_slice(&[]),
        report: TextLayoutReport::default(),
    };
    mesh.update(font, text);
    mesh
}

impl TextMesh {
    /// Empty mesh whose buffers hold `capacity` characters.
    pub fn dynamic(capacity: usize, origin_x: f32, origin_y: f32, font_size: f32) -> Self {
        Self {
            mode: TextMeshMode::Dynamic { capacity },
            origin: [origin_x, origin_y],
            font_size,
            text: String::new(),
            vertices: Vec::with_capacity(capacity * VERTICES_PER_QUAD),
            indices: Vec::with_capacity(capacity * INDICES_PER_QUAD),
            vertex_buffer: GpuBuffer::with_capacity(capacity * VERTICES_PER_QUAD),
            index_buffer: GpuBuffer::with_capacity(capacity * INDICES_PER_QUAD),
            report: TextLayoutReport {
                cursor: [origin_x, origin_y],
                ..TextLayoutReport::default()
            },
        }
    }

    /// Regenerates geometry for `text`. Dynamic meshes write into their
    /// existing buffers; static meshes replace them.
    pub fn update(&mut self, font: &Font, text: &str) -> TextLayoutReport {
        self.vertices.clear();
        self.indices.clear();
        self.text.clear();
        self.text.push_str(text);

        let max_quads = match self.mode {
            TextMeshMode::Static => None,
            TextMeshMode::Dynamic { capacity } => Some(capacity),
        };
        let report = layout_quads(
            text,
            font,
            self.origin,
            self.font_size,
            max_quads,
            &mut self.vertices,
            &mut self.indices,
        );

        match self.mode {
            TextMeshMode::Static => {
                self.vertex_buffer = GpuBuffer::from_slice(&self.vertices);
                self.index_buffer = GpuBuffer::from_slice(&self.indices);
            }
            TextMeshMode::Dynamic { capacity } => {
                if report.truncated {
                    warn!(
                        capacity,
                        chars = text.chars().count(),
                        "text_mesh_truncated"
                    );
                }
                let written = self
                    .vertex_buffer
                    .write_range(0, &self.vertices)
                    .and_then(|()| self.index_buffer.write_range(0, &self.indices));
                if let Err(err) = written {
                    error!(error = %err, "text_mesh_upload_failed");
                }
            }
        }

        self.report = report;
        report
    }

    /// Moves the origin and lays the current text out again.
    pub fn set_origin(&mut self, font: &Font, origin_x: f32, origin_y: f32) -> TextLayoutReport {
        self.origin = [origin_x, origin_y];
        let text = std::mem::take(&mut self.text);
        self.update(font, &text)
    }

    pub fn set_font_size(&mut self, font: &Font, font_size: f32) -> TextLayoutReport {
        self.font_size = font_size;
        let text = std::mem::take(&mut self.text);
        self.update(font, &text)
    }

    pub fn mode(&self) -> TextMeshMode {
        self.mode
    }

    pub fn origin(&self) -> [f32; 2] {
        self.origin
    }

    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn vertices(&self) -> &[TextVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_buffer(&self) -> &GpuBuffer<TextVertex> {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &GpuBuffer<u32> {
        &self.index_buffer
    }

    pub fn report(&self) -> TextLayoutReport {
        self.report
    }

    pub fn cursor(&self) -> [f32; 2] {
        self.report.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn bounds(&self) -> Option<TextBounds> {
        let first = self.vertices.first()?;
        let mut bounds = TextBounds {
            min: [first.position[0], first.position[1]],
            max: [first.position[0], first.position[1]],
        };
        for vertex in &self.vertices[1..] {
            bounds.min[0] = bounds.min[0].min(vertex.position[0]);
            bounds.min[1] = bounds.min[1].min(vertex.position[1]);
            bounds.max[0] = bounds.max[0].max(vertex.position[0]);
            bounds.max[1] = bounds.max[1].max(vertex.position[1]);
        }
        Some(bounds)
    }
}

fn space_advance(font: &Font, font_size: f32) -> f32 {
    font.glyph(' ' as u32)
        .map_or(font_size, |space| space.advance * font_size)
}

fn layout_quads(
    text: &str,
    font: &Font,
    origin: [f32; 2],
    font_size: f32,
    max_quads: Option<usize>,
    vertices: &mut Vec<TextVertex>,
    indices: &mut Vec<u32>,
) -> TextLayoutReport {
    let mut report = TextLayoutReport {
        cursor: origin,
        ..TextLayoutReport::default()
    };

    for ch in text.chars() {
        match ch {
            '\n' => {
                report.cursor[0] = origin[0];
                report.cursor[1] -= font_size;
                continue;
            }
            ' ' => {
                report.cursor[0] += space_advance(font, font_size);
                continue;
            }
            _ => {}
        }

        let Some(glyph) = font.glyph_or_fallback(ch) else {
            report.missing_glyphs += 1;
            report.cursor[0] += space_advance(font, font_size);
            continue;
        };

        if glyph.has_geometry() {
            if max_quads.is_some_and(|max| report.quads >= max) {
                report.truncated = true;
                break;
            }
            push_quad(glyph, report.cursor, font_size, vertices, indices);
            report.quads += 1;
        }
        report.cursor[0] += glyph.advance * font_size;
    }

    report
}

fn push_quad(
    glyph: &Glyph,
    cursor: [f32; 2],
    font_size: f32,
    vertices: &mut Vec<TextVertex>,
    indices: &mut Vec<u32>,
) {
    let plane = glyph.plane_bounds;
    let atlas = glyph.atlas_bounds;
    let left = cursor[0] + plane.left * font_size;
    let right = cursor[0] + plane.right * font_size;
    let bottom = cursor[1] + plane.bottom * font_size;
    let top = cursor[1] + plane.top * font_size;

    let base = vertices.len() as u32;
    vertices.extend_from_slice(&[
        TextVertex {
            position: [left, bottom, 0.0],
            uv: [atlas.left, atlas.bottom],
        },
        TextVertex {
            position: [right, bottom, 0.0],
            uv: [atlas.right, atlas.bottom],
        },
        TextVertex {
            position: [right, top, 0.0],
            uv: [atlas.right, atlas.top],
        },
        TextVertex {
            position: [left, top, 0.0],
            uv: [atlas.left, atlas.top],
        },
    ]);
    indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
}
