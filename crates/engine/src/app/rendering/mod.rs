mod renderer;
mod transform;

pub use renderer::{
    clear_frame, draw_mesh, draw_text_mesh, draw_world, supports_text_shader, DrawStats,
    Renderer, TEXT_SHADER_UNIFORMS,
};
pub use transform::{Projection, Viewport};
