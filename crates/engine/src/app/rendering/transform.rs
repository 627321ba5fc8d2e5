#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Orthographic projection over the window: x in `[0, width]`, y in
/// `[0, height]` with +Y up, z in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    viewport: Viewport,
    matrix: [[f32; 4]; 4],
}

impl Projection {
    pub fn new(width: u32, height: u32) -> Self {
        let viewport = Viewport { width, height };
        Self {
            viewport,
            matrix: orthographic(0.0, width as f32, 0.0, height as f32, -1.0, 1.0),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Column-major matrix, as uploaded to a shader uniform.
    pub fn matrix(&self) -> [[f32; 4]; 4] {
        self.matrix
    }

    /// Maps a point to normalized device coordinates.
    pub fn to_ndc(&self, x: f32, y: f32) -> [f32; 2] {
        let m = &self.matrix;
        [m[0][0] * x + m[3][0], m[1][1] * y + m[3][1]]
    }

    /// Maps a point to framebuffer pixels (origin top-left, +Y down).
    pub fn to_framebuffer(&self, x: f32, y: f32) -> [f32; 2] {
        let [nx, ny] = self.to_ndc(x, y);
        [
            (nx + 1.0) * 0.5 * self.viewport.width as f32,
            (1.0 - ny) * 0.5 * self.viewport.height as f32,
        ]
    }
}

fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> [[f32; 4]; 4] {
    let width = (right - left).max(f32::EPSILON);
    let height = (top - bottom).max(f32::EPSILON);
    let depth = far - near;
    [
        [2.0 / width, 0.0, 0.0, 0.0],
        [0.0, 2.0 / height, 0.0, 0.0],
        [0.0, 0.0, -2.0 / depth, 0.0],
        [
            -(right + left) / width,
            -(top + bottom) / height,
            -(far + near) / depth,
            1.0,
        ],
    ]
}
