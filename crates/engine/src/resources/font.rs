use std::collections::HashMap;
use std::fs;
use std::path::Path;

use image::ImageReader;
use serde::Deserialize;
use tracing::info;

use crate::gpu::{Texture2d, TextureDesc, TextureFormat};

use super::{LoadContext, Resource, ResourceLoadError};

pub const DEFAULT_PIXEL_RANGE: f32 = 4.0;
const METRICS_FILE: &str = "metrics.json";
const ATLAS_FILE: &str = "atlas.png";

/// Rectangle stored as left, bottom, right, top.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GlyphBounds {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl GlyphBounds {
    pub fn is_zero(&self) -> bool {
        self.left == 0.0 && self.bottom == 0.0 && self.right == 0.0 && self.top == 0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Glyph {
    pub advance: f32,
    /// Quad offsets from the cursor, in em units.
    pub plane_bounds: GlyphBounds,
    /// Normalized atlas UV rectangle.
    pub atlas_bounds: GlyphBounds,
}

impl Glyph {
    /// Glyphs without plane bounds (space and friends) only advance the cursor.
    pub fn has_geometry(&self) -> bool {
        !self.plane_bounds.is_zero()
    }
}

/// MSDF font: atlas texture plus per code point metrics.
#[derive(Debug)]
pub struct Font {
    atlas: Texture2d,
    pixel_range: f32,
    glyphs: HashMap<u32, Glyph>,
}

impl Font {
    pub fn new(atlas: Texture2d, pixel_range: f32, glyphs: HashMap<u32, Glyph>) -> Self {
        Self {
            atlas,
            pixel_range,
            glyphs,
        }
    }

    /// Builds a font from a metrics document and an already created atlas.
    pub fn from_metrics_str(metrics_json: &str, atlas: Texture2d) -> Result<Self, ResourceLoadError> {
        let metrics = parse_metrics(metrics_json, Path::new(METRICS_FILE))?;
        Ok(Self::new(atlas, metrics.pixel_range, metrics.glyphs))
    }

    pub fn atlas(&self) -> &Texture2d {
        &self.atlas
    }

    pub fn pixel_range(&self) -> f32 {
        self.pixel_range
    }

    pub fn glyph(&self, code_point: u32) -> Option<&Glyph> {
        self.glyphs.get(&code_point)
    }

    /// Looks up `ch`, then `'?'`.
    pub fn glyph_or_fallback(&self, ch: char) -> Option<&Glyph> {
        self.glyph(ch as u32).or_else(|| self.glyph('?' as u32))
    }

    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }
}

impl Resource for Font {
    type Args = ();
    const KIND: &'static str = "font";

    fn load(ctx: &LoadContext, name: &str, _args: ()) -> Result<Self, ResourceLoadError> {
        let font_dir = ctx.fonts_dir().join(name);
        let metrics_path = font_dir.join(METRICS_FILE);
        let raw = fs::read_to_string(&metrics_path).map_err(|source| ResourceLoadError::Read {
            path: metrics_path.clone(),
            source,
        })?;
        let metrics = parse_metrics(&raw, &metrics_path)?;

        let atlas_path = font_dir.join(ATLAS_FILE);
        let atlas = load_atlas(&atlas_path)?;

        info!(
            font = name,
            glyphs = metrics.glyphs.len(),
            atlas_width = atlas.width(),
            atlas_height = atlas.height(),
            pixel_range = metrics.pixel_range,
            "font_loaded"
        );
        Ok(Self::new(atlas, metrics.pixel_range, metrics.glyphs))
    }
}

#[derive(Debug, Deserialize)]
struct MetricsFile {
    atlas: AtlasMetrics,
    #[serde(default)]
    glyphs: Vec<GlyphMetrics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtlasMetrics {
    width: f32,
    height: f32,
    #[serde(default = "default_pixel_range")]
    distance_range: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GlyphMetrics {
    unicode: u32,
    #[serde(default)]
    advance: f32,
    plane_bounds: Option<BoundsMetrics>,
    atlas_bounds: Option<BoundsMetrics>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct BoundsMetrics {
    left: f32,
    bottom: f32,
    right: f32,
    top: f32,
}

fn default_pixel_range() -> f32 {
    DEFAULT_PIXEL_RANGE
}

struct ParsedMetrics {
    pixel_range: f32,
    glyphs: HashMap<u32, Glyph>,
}

fn parse_metrics(raw: &str, path: &Path) -> Result<ParsedMetrics, ResourceLoadError> {
    let metrics: MetricsFile =
        serde_json::from_str(raw).map_err(|source| ResourceLoadError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let atlas_width = metrics.atlas.width;
    let atlas_height = metrics.atlas.height;
    if atlas_width <= 0.0 || atlas_height <= 0.0 {
        return Err(ResourceLoadError::InvalidData {
            path: path.to_path_buf(),
            message: format!("atlas size must be positive, got {atlas_width}x{atlas_height}"),
        });
    }

    let mut glyphs = HashMap::with_capacity(metrics.glyphs.len());
    for entry in metrics.glyphs {
        let glyph = match (entry.plane_bounds, entry.atlas_bounds) {
            (Some(plane), Some(atlas)) => Glyph {
                advance: entry.advance,
                plane_bounds: GlyphBounds {
                    left: plane.left,
                    bottom: plane.bottom,
                    right: plane.right,
                    top: plane.top,
                },
                atlas_bounds: GlyphBounds {
                    left: atlas.left / atlas_width,
                    bottom: atlas.bottom / atlas_height,
                    right: atlas.right / atlas_width,
                    top: atlas.top / atlas_height,
                },
            },
            (Some(_), None) => {
                return Err(ResourceLoadError::InvalidData {
                    path: path.to_path_buf(),
                    message: format!(
                        "glyph U+{:04X} has planeBounds but no atlasBounds",
                        entry.unicode
                    ),
                });
            }
            (None, _) => Glyph {
                advance: entry.advance,
                ..Glyph::default()
            },
        };
        glyphs.insert(entry.unicode, glyph);
    }

    Ok(ParsedMetrics {
        pixel_range: metrics.atlas.distance_range,
        glyphs,
    })
}

fn load_atlas(path: &Path) -> Result<Texture2d, ResourceLoadError> {
    let image = ImageReader::open(path)
        .map_err(|source| ResourceLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .with_guessed_format()
        .map_err(|source| ResourceLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .decode()
        .map_err(|source| ResourceLoadError::Image {
            path: path.to_path_buf(),
            source,
        })?;
    let rgb = image.flipv().to_rgb8();
    let desc = TextureDesc::atlas(rgb.width(), rgb.height(), TextureFormat::Rgb8);
    Texture2d::new(desc, rgb.into_raw()).map_err(|source| ResourceLoadError::Gpu {
        path: path.to_path_buf(),
        source,
    })
}
