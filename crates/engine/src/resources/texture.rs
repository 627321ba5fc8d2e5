use image::{DynamicImage, ImageReader};
use tracing::debug;

use crate::gpu::{FilterMode, Texture2d, TextureDesc, TextureFormat, WrapMode};

use super::{LoadContext, Resource, ResourceLoadError};

/// Image texture keyed by its path relative to the textures directory.
/// Keeps the channel count of the source file.
#[derive(Debug)]
pub struct Texture {
    texture: Texture2d,
}

impl Texture {
    pub fn gpu(&self) -> &Texture2d {
        &self.texture
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }

    pub fn format(&self) -> TextureFormat {
        self.texture.desc().format
    }
}

impl Resource for Texture {
    type Args = ();
    const KIND: &'static str = "texture";

    fn load(ctx: &LoadContext, name: &str, _args: ()) -> Result<Self, ResourceLoadError> {
        let path = ctx.textures_dir().join(name);
        let image = ImageReader::open(&path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|source| ResourceLoadError::Read {
                path: path.clone(),
                source,
            })?
            .decode()
            .map_err(|source| ResourceLoadError::Image {
                path: path.clone(),
                source,
            })?
            .flipv();

        let (width, height) = (image.width(), image.height());
        let (format, texels) = native_texels(image);
        let desc = TextureDesc {
            width,
            height,
            format,
            filter: FilterMode::Linear,
            wrap: WrapMode::Repeat,
            mip_levels: 1,
        };
        let texture =
            Texture2d::new(desc, texels).map_err(|source| ResourceLoadError::Gpu { path, source })?;
        debug!(
            texture = name,
            width = texture.width(),
            height = texture.height(),
            channels = format.channels(),
            "texture_decoded"
        );
        Ok(Self { texture })
    }
}

/// Converts to the 8-bit layout with the same channel count.
fn native_texels(image: DynamicImage) -> (TextureFormat, Vec<u8>) {
    match TextureFormat::from_channel_count(image.color().channel_count()) {
        Some(TextureFormat::R8) => (TextureFormat::R8, image.into_luma8().into_raw()),
        Some(TextureFormat::Rg8) => (TextureFormat::Rg8, image.into_luma_alpha8().into_raw()),
        Some(TextureFormat::Rgb8) => (TextureFormat::Rgb8, image.into_rgb8().into_raw()),
        Some(TextureFormat::Rgba8) | None => (TextureFormat::Rgba8, image.into_rgba8().into_raw()),
    }
}
