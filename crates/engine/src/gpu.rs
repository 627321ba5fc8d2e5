use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpuError {
    #[error("texture dimensions must be non-zero (got {width}x{height})")]
    ZeroSizedTexture { width: u32, height: u32 },
    #[error("texture data is {actual} bytes, expected {expected} for {width}x{height} {format:?}")]
    TextureDataSize {
        width: u32,
        height: u32,
        format: TextureFormat,
        expected: usize,
        actual: usize,
    },
    #[error("mipmapped textures are not supported (requested {0} levels)")]
    UnsupportedMipLevels(u32),
    #[error("buffer write of {len} elements at offset {offset} exceeds capacity {capacity}")]
    BufferOverflow {
        offset: usize,
        len: usize,
        capacity: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    R8,
    Rg8,
    Rgb8,
    Rgba8,
}

impl TextureFormat {
    pub fn channels(self) -> usize {
        match self {
            TextureFormat::R8 => 1,
            TextureFormat::Rg8 => 2,
            TextureFormat::Rgb8 => 3,
            TextureFormat::Rgba8 => 4,
        }
    }

    pub fn from_channel_count(channels: u8) -> Option<Self> {
        match channels {
            1 => Some(TextureFormat::R8),
            2 => Some(TextureFormat::Rg8),
            3 => Some(TextureFormat::Rgb8),
            4 => Some(TextureFormat::Rgba8),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub filter: FilterMode,
    pub wrap: WrapMode,
    pub mip_levels: u32,
}

impl TextureDesc {
    /// Linear filtering, edge clamping, single level. Used for font atlases.
    pub fn atlas(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            filter: FilterMode::Linear,
            wrap: WrapMode::ClampToEdge,
            mip_levels: 1,
        }
    }
}

/// Texture storage owned by the software surface. Row 0 is the bottom row,
/// matching images flipped on load.
#[derive(Debug, Clone)]
pub struct Texture2d {
    desc: TextureDesc,
    texels: Vec<u8>,
}

impl Texture2d {
    pub fn new(desc: TextureDesc, texels: Vec<u8>) -> Result<Self, GpuError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GpuError::ZeroSizedTexture {
                width: desc.width,
                height: desc.height,
            });
        }
        if desc.mip_levels != 1 {
            return Err(GpuError::UnsupportedMipLevels(desc.mip_levels));
        }
        let expected = desc.width as usize * desc.height as usize * desc.format.channels();
        if texels.len() != expected {
            return Err(GpuError::TextureDataSize {
                width: desc.width,
                height: desc.height,
                format: desc.format,
                expected,
                actual: texels.len(),
            });
        }
        Ok(Self { desc, texels })
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    pub fn texels(&self) -> &[u8] {
        &self.texels
    }

    /// Samples at normalized coordinates. Missing channels read as 0, alpha as 1.
    pub fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        let x = u * self.desc.width as f32 - 0.5;
        let y = v * self.desc.height as f32 - 0.5;
        match self.desc.filter {
            FilterMode::Nearest => self.fetch(x.round() as i64, y.round() as i64),
            FilterMode::Linear => {
                let x0 = x.floor();
                let y0 = y.floor();
                let tx = x - x0;
                let ty = y - y0;
                let (x0, y0) = (x0 as i64, y0 as i64);
                let a = self.fetch(x0, y0);
                let b = self.fetch(x0 + 1, y0);
                let c = self.fetch(x0, y0 + 1);
                let d = self.fetch(x0 + 1, y0 + 1);
                let mut out = [0.0; 4];
                for channel in 0..4 {
                    let bottom = a[channel] + (b[channel] - a[channel]) * tx;
                    let top = c[channel] + (d[channel] - c[channel]) * tx;
                    out[channel] = bottom + (top - bottom) * ty;
                }
                out
            }
        }
    }

    fn fetch(&self, x: i64, y: i64) -> [f32; 4] {
        let x = self.wrap_coord(x, self.desc.width);
        let y = self.wrap_coord(y, self.desc.height);
        let channels = self.desc.format.channels();
        let start = (y * self.desc.width as usize + x) * channels;
        let mut out = [0.0, 0.0, 0.0, 1.0];
        for (channel, value) in self.texels[start..start + channels].iter().enumerate() {
            out[channel] = *value as f32 / 255.0;
        }
        out
    }

    fn wrap_coord(&self, coord: i64, size: u32) -> usize {
        let size = size as i64;
        match self.desc.wrap {
            WrapMode::ClampToEdge => coord.clamp(0, size - 1) as usize,
            WrapMode::Repeat => coord.rem_euclid(size) as usize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    Static,
    Dynamic,
}

/// Fixed-capacity element buffer. Writes go through ranges and never grow
/// the allocation.
#[derive(Debug, Clone)]
pub struct GpuBuffer<T> {
    storage: Vec<T>,
    len: usize,
    usage: BufferUsage,
}

impl<T: Copy + Default> GpuBuffer<T> {
    pub fn from_slice(data: &[T]) -> Self {
        Self {
            storage: data.to_vec(),
            len: data.len(),
            usage: BufferUsage::Static,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: vec![T::default(); capacity],
            len: 0,
            usage: BufferUsage::Dynamic,
        }
    }

    /// Overwrites `data.len()` elements starting at `offset` and marks the
    /// buffer as holding `offset + data.len()` live elements.
    pub fn write_range(&mut self, offset: usize, data: &[T]) -> Result<(), GpuError> {
        let end = offset
            .checked_add(data.len())
            .filter(|end| *end <= self.storage.len())
            .ok_or(GpuError::BufferOverflow {
                offset,
                len: data.len(),
                capacity: self.storage.len(),
            })?;
        self.storage[offset..end].copy_from_slice(data);
        self.len = end;
        Ok(())
    }

    pub fn as_slice(&self) -> &[T] {
        &self.storage[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_rejects_wrong_data_size() {
        let desc = TextureDesc::atlas(2, 2, TextureFormat::Rgb8);
        let error = Texture2d::new(desc, vec![0; 5]).expect_err("size mismatch");
        assert!(matches!(
            error,
            GpuError::TextureDataSize {
                expected: 12,
                actual: 5,
                ..
            }
        ));
    }

    #[test]
    fn texture_rejects_zero_size_and_mips() {
        let zero = TextureDesc::atlas(0, 4, TextureFormat::R8);
        assert!(Texture2d::new(zero, Vec::new()).is_err());

        let mut mipped = TextureDesc::atlas(1, 1, TextureFormat::R8);
        mipped.mip_levels = 3;
        assert_eq!(
            Texture2d::new(mipped, vec![0]).expect_err("mips"),
            GpuError::UnsupportedMipLevels(3)
        );
    }

    #[test]
    fn linear_clamp_sampling_interpolates_and_clamps() {
        let desc = TextureDesc::atlas(2, 1, TextureFormat::R8);
        let texture = Texture2d::new(desc, vec![0, 255]).expect("texture");

        let middle = texture.sample(0.5, 0.5);
        assert!((middle[0] - 0.5).abs() < 0.01);

        let left_edge = texture.sample(-1.0, 0.5);
        assert!(left_edge[0].abs() < 0.001);
        let right_edge = texture.sample(2.0, 0.5);
        assert!((right_edge[0] - 1.0).abs() < 0.001);
        assert!((right_edge[3] - 1.0).abs() < 0.001);
    }

    #[test]
    fn buffer_range_writes_stay_within_capacity() {
        let mut buffer = GpuBuffer::<u32>::with_capacity(4);
        buffer.write_range(0, &[1, 2, 3]).expect("write");
        assert_eq!(buffer.as_slice(), &[1, 2, 3]);

        buffer.write_range(0, &[9]).expect("rewrite");
        assert_eq!(buffer.as_slice(), &[9]);
        assert_eq!(buffer.capacity(), 4);

        let error = buffer.write_range(2, &[0, 0, 0]).expect_err("overflow");
        assert_eq!(
            error,
            GpuError::BufferOverflow {
                offset: 2,
                len: 3,
                capacity: 4
            }
        );
        assert_eq!(buffer.as_slice(), &[9]);
    }
}
