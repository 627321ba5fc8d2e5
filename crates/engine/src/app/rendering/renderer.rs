use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::app::world::{MeshInstance, World};
use crate::resources::{Font, Mesh, Shader};
use crate::text::{TextMesh, VERTICES_PER_QUAD};

use super::transform::{Projection, Viewport};

/// Uniforms of the MSDF text program that the raster below reproduces.
pub const TEXT_SHADER_UNIFORMS: [&str; 4] = ["projection", "msdf", "textColor", "pxRange"];

/// Whether `shader` declares the interface the software text raster
/// implements. A program that does not is rejected rather than silently
/// drawn with different math.
pub fn supports_text_shader(shader: &Shader) -> bool {
    TEXT_SHADER_UNIFORMS
        .iter()
        .all(|uniform| shader.has_uniform(uniform))
}

/// Counts of what one frame drew.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub text_quads: usize,
    pub mesh_triangles: usize,
}

pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
}

impl Renderer {
    pub fn new(window: Arc<Window>) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport: Viewport {
                width: size.width,
                height: size.height,
            },
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = Viewport { width, height };
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    /// Clears to `clear_color` and draws every mesh and text entity. Text is
    /// skipped entirely when `text_enabled` is false (no usable text shader).
    pub fn render_world(
        &mut self,
        world: &World,
        projection: &Projection,
        clear_color: [f32; 4],
        text_enabled: bool,
    ) -> Result<DrawStats, Error> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Ok(DrawStats::default());
        }
        let frame = self.pixels.frame_mut();
        clear_frame(frame, clear_color);
        let stats = draw_world(frame, self.viewport, world, projection, text_enabled);
        self.pixels.render()?;
        Ok(stats)
    }
}

pub fn clear_frame(frame: &mut [u8], color: [f32; 4]) {
    let rgba = color.map(to_byte);
    for chunk in frame.chunks_exact_mut(4) {
        chunk.copy_from_slice(&rgba);
    }
}

pub fn draw_world(
    frame: &mut [u8],
    viewport: Viewport,
    world: &World,
    projection: &Projection,
    text_enabled: bool,
) -> DrawStats {
    let mut stats = DrawStats::default();
    for entity in world.entities() {
        if let Some(instance) = entity.mesh.as_ref() {
            if let Some(mesh) = instance.mesh.get() {
                stats.mesh_triangles += draw_mesh(frame, viewport, mesh, instance, projection);
            }
        }
        if !text_enabled {
            continue;
        }
        let (Some(label), Some(text_mesh)) = (entity.label.as_ref(), entity.text_mesh.as_ref())
        else {
            continue;
        };
        let Some(font) = label.font.get() else {
            continue;
        };
        stats.text_quads += draw_text_mesh(frame, viewport, text_mesh, font, projection, label.color);
    }
    stats
}

/// Rasterizes every glyph quad of `mesh` with MSDF coverage. Returns the
/// number of quads visited.
pub fn draw_text_mesh(
    frame: &mut [u8],
    viewport: Viewport,
    mesh: &TextMesh,
    font: &Font,
    projection: &Projection,
    color: [f32; 4],
) -> usize {
    let atlas = font.atlas();
    let atlas_size = [atlas.width() as f32, atlas.height() as f32];
    let mut quads = 0;

    for quad in mesh.vertex_buffer().as_slice().chunks_exact(VERTICES_PER_QUAD) {
        quads += 1;
        let bottom_left = quad[0];
        let top_right = quad[2];
        let [x0, y0] = projection.to_framebuffer(bottom_left.position[0], top_right.position[1]);
        let [x1, y1] = projection.to_framebuffer(top_right.position[0], bottom_left.position[1]);
        let quad_w = x1 - x0;
        let quad_h = y1 - y0;
        if quad_w <= 0.0 || quad_h <= 0.0 {
            continue;
        }

        let [u0, v0] = bottom_left.uv;
        let [u1, v1] = top_right.uv;
        let screen_px_range = screen_px_range(
            font.pixel_range(),
            atlas_size,
            [quad_w, quad_h],
            [(u1 - u0).abs(), (v1 - v0).abs()],
        );

        let Some((px0, px1, py0, py1)) = clip_rect(viewport, x0, x1, y0, y1) else {
            continue;
        };
        for py in py0..py1 {
            // Framebuffer rows grow downward, atlas v grows upward.
            let ty = ((py as f32 + 0.5) - y0) / quad_h;
            let v = v1 + (v0 - v1) * ty;
            for px in px0..px1 {
                let tx = ((px as f32 + 0.5) - x0) / quad_w;
                let u = u0 + (u1 - u0) * tx;
                let texel = atlas.sample(u, v);
                let distance = median(texel[0], texel[1], texel[2]);
                let opacity = (screen_px_range * (distance - 0.5) + 0.5).clamp(0.0, 1.0);
                blend_pixel(frame, viewport.width, px, py, color, opacity * color[3]);
            }
        }
    }
    quads
}

/// Flat-shaded triangles using the first vertex color of each triangle.
pub fn draw_mesh(
    frame: &mut [u8],
    viewport: Viewport,
    mesh: &Mesh,
    instance: &MeshInstance,
    projection: &Projection,
) -> usize {
    let vertices = mesh.vertices();
    let mut triangles = 0;
    for triangle in mesh.indices().chunks_exact(3) {
        let Some(corners) = triangle
            .iter()
            .map(|index| vertices.get(*index as usize))
            .collect::<Option<Vec<_>>>()
        else {
            continue;
        };
        let points: Vec<[f32; 2]> = corners
            .iter()
            .map(|vertex| {
                projection.to_framebuffer(
                    instance.position[0] + vertex.position[0] * instance.scale,
                    instance.position[1] + vertex.position[1] * instance.scale,
                )
            })
            .collect();
        let color = corners[0].color;
        fill_triangle(viewport, [points[0], points[1], points[2]], |x, y| {
            blend_pixel(frame, viewport.width, x, y, color, color[3]);
        });
        triangles += 1;
    }
    triangles
}

fn screen_px_range(pixel_range: f32, atlas_size: [f32; 2], quad_px: [f32; 2], uv_size: [f32; 2]) -> f32 {
    let mut range = 0.0;
    for axis in 0..2 {
        if uv_size[axis] > 0.0 {
            let unit_range = pixel_range / atlas_size[axis];
            let screen_tex_size = quad_px[axis] / uv_size[axis];
            range += 0.5 * unit_range * screen_tex_size;
        }
    }
    range.max(1.0)
}

fn median(r: f32, g: f32, b: f32) -> f32 {
    r.min(g).max(r.max(g).min(b))
}

fn clip_rect(viewport: Viewport, x0: f32, x1: f32, y0: f32, y1: f32) -> Option<(u32, u32, u32, u32)> {
    let px0 = x0.floor().max(0.0) as u32;
    let py0 = y0.floor().max(0.0) as u32;
    let px1 = (x1.ceil().max(0.0) as u32).min(viewport.width);
    let py1 = (y1.ceil().max(0.0) as u32).min(viewport.height);
    (px0 < px1 && py0 < py1).then_some((px0, px1, py0, py1))
}

fn fill_triangle(viewport: Viewport, points: [[f32; 2]; 3], mut plot: impl FnMut(u32, u32)) {
    let [a, b, c] = points;
    let area = edge(a, b, c);
    if area.abs() < f32::EPSILON {
        return;
    }
    let min_x = a[0].min(b[0]).min(c[0]);
    let max_x = a[0].max(b[0]).max(c[0]);
    let min_y = a[1].min(b[1]).min(c[1]);
    let max_y = a[1].max(b[1]).max(c[1]);
    let Some((px0, px1, py0, py1)) = clip_rect(viewport, min_x, max_x, min_y, max_y) else {
        return;
    };
    for py in py0..py1 {
        for px in px0..px1 {
            let p = [px as f32 + 0.5, py as f32 + 0.5];
            let w0 = edge(b, c, p) / area;
            let w1 = edge(c, a, p) / area;
            let w2 = edge(a, b, p) / area;
            if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                plot(px, py);
            }
        }
    }
}

fn edge(a: [f32; 2], b: [f32; 2], p: [f32; 2]) -> f32 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

fn blend_pixel(frame: &mut [u8], width: u32, x: u32, y: u32, color: [f32; 4], alpha: f32) {
    if alpha <= 0.0 {
        return;
    }
    let offset = (y as usize * width as usize + x as usize) * 4;
    let Some(pixel) = frame.get_mut(offset..offset + 4) else {
        return;
    };
    let alpha = alpha.min(1.0);
    for channel in 0..3 {
        let dst = pixel[channel] as f32 / 255.0;
        pixel[channel] = to_byte(color[channel] * alpha + dst * (1.0 - alpha));
    }
    pixel[3] = 255;
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::gpu::{Texture2d, TextureDesc, TextureFormat};
    use crate::resources::{Glyph, GlyphBounds, Handle, ResourceManager};
    use crate::text::build_text_mesh;

    const VIEWPORT: Viewport = Viewport {
        width: 32,
        height: 32,
    };

    fn pixel(frame: &[u8], x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * VIEWPORT.width + x) * 4) as usize;
        [frame[offset], frame[offset + 1], frame[offset + 2], frame[offset + 3]]
    }

    /// Atlas whose left half is deep inside the glyph and right half far
    /// outside, with one glyph covering the whole atlas.
    fn split_font() -> Font {
        let mut texels = Vec::new();
        for _row in 0..4 {
            for column in 0..4 {
                let value = if column < 2 { 255 } else { 0 };
                texels.extend_from_slice(&[value, value, value]);
            }
        }
        let atlas = Texture2d::new(TextureDesc::atlas(4, 4, TextureFormat::Rgb8), texels)
            .expect("atlas");
        let full = GlyphBounds {
            left: 0.0,
            bottom: 0.0,
            right: 1.0,
            top: 1.0,
        };
        let glyph = Glyph {
            advance: 1.0,
            plane_bounds: full,
            atlas_bounds: full,
        };
        Font::new(atlas, 4.0, HashMap::from([('A' as u32, glyph)]))
    }

    #[test]
    fn median_picks_middle_channel() {
        assert_eq!(median(0.1, 0.9, 0.5), 0.5);
        assert_eq!(median(0.9, 0.1, 0.2), 0.2);
        assert_eq!(median(0.3, 0.3, 0.8), 0.3);
    }

    #[test]
    fn clear_fills_every_pixel() {
        let mut frame = vec![0u8; (VIEWPORT.width * VIEWPORT.height * 4) as usize];
        clear_frame(&mut frame, [1.0, 0.0, 0.2, 1.0]);
        assert_eq!(pixel(&frame, 31, 31), [255, 0, 51, 255]);
    }

    #[test]
    fn text_quad_covers_inside_and_leaves_outside() {
        let font = split_font();
        let mesh = build_text_mesh("A", &font, 0.0, 0.0, 32.0);
        let projection = Projection::new(VIEWPORT.width, VIEWPORT.height);
        let mut frame = vec![0u8; (VIEWPORT.width * VIEWPORT.height * 4) as usize];

        let quads = draw_text_mesh(
            &mut frame,
            VIEWPORT,
            &mesh,
            &font,
            &projection,
            [1.0, 1.0, 1.0, 1.0],
        );

        assert_eq!(quads, 1);
        assert_eq!(pixel(&frame, 2, 16), [255, 255, 255, 255]);
        assert_eq!(pixel(&frame, 29, 16), [0, 0, 0, 0]);
    }

    #[test]
    fn world_skips_text_without_shader_or_font() {
        let font = Handle::new(split_font());
        let mut world = World::new();
        world.spawn_label(
            "label",
            crate::app::world::TextLabel {
                text: "A".to_string(),
                font,
                font_size: 32.0,
                position: [0.0, 0.0],
                color: [1.0; 4],
            },
        );
        let projection = Projection::new(VIEWPORT.width, VIEWPORT.height);
        let mut frame = vec![0u8; (VIEWPORT.width * VIEWPORT.height * 4) as usize];

        let skipped = draw_world(&mut frame, VIEWPORT, &world, &projection, false);
        assert_eq!(skipped, DrawStats::default());
        assert!(frame.iter().all(|byte| *byte == 0));

        let drawn = draw_world(&mut frame, VIEWPORT, &world, &projection, true);
        assert_eq!(drawn.text_quads, 1);
    }

    #[test]
    fn mesh_triangles_fill_with_vertex_color() {
        let mesh = Mesh::from_obj_str("v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n", [0.0, 1.0, 0.0, 1.0])
            .expect("mesh");
        let instance = MeshInstance {
            mesh: Handle::new(mesh),
            position: [8.0, 8.0],
            scale: 16.0,
        };
        let projection = Projection::new(VIEWPORT.width, VIEWPORT.height);
        let mut frame = vec![0u8; (VIEWPORT.width * VIEWPORT.height * 4) as usize];

        let triangles = instance
            .mesh
            .get()
            .map(|mesh| draw_mesh(&mut frame, VIEWPORT, mesh, &instance, &projection));

        assert_eq!(triangles, Some(2));
        assert_eq!(pixel(&frame, 16, 16), [0, 255, 0, 255]);
        assert_eq!(pixel(&frame, 2, 2), [0, 0, 0, 0]);
    }

    #[test]
    fn text_shader_must_declare_raster_uniforms() {
        let assets = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets");
        let mut manager = ResourceManager::new(assets);
        let bundled = manager.load::<Shader>("msdf_text", ());
        assert!(bundled.get().is_some_and(supports_text_shader));

        let vertex = "#version 330 core\nlayout (location = 0) in vec2 aPos;\nuniform mat4 projection;\nvoid main() { gl_Position = projection * vec4(aPos, 0.0, 1.0); }\n";
        let fragment = "#version 330 core\nout vec4 FragColor;\nuniform vec4 textColor;\nvoid main() { FragColor = textColor; }\n";
        let flat = Shader::from_sources("flat", vertex, fragment).expect("flat shader");
        assert!(!supports_text_shader(&flat));
    }
}
