// qgl.rs — graphics backend seam
//
// The renderer never talks to a driver directly. Everything it needs from
// the GPU side goes through `GraphicsApi`; image files are resolved through
// `TextureResolver`.

use bytemuck::{Pod, Zeroable};

pub type TextureHandle = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum TextureUnit {
    Base = 0,
    Lightmap = 1,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlendMode {
    /// No blending, depth writes on.
    Opaque,
    /// dst = dst * src, used when lightmaps are a separate pass.
    Lightmap,
    /// Translucent surfaces with a constant alpha.
    Alpha(f32),
}

/// Which bound units a polygon samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexLayers {
    Base,
    Lightmap,
    BaseAndLightmap,
}

/// One interleaved vertex: position, base texture coordinates and
/// lightmap texture coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct PolyVert {
    pub pos: [f32; 3],
    pub st: [f32; 2],
    pub lm: [f32; 2],
}

pub trait GraphicsApi {
    fn create_texture(&mut self, width: u32, height: u32, format: PixelFormat) -> TextureHandle;

    /// Replace the whole image. `data` holds `width * height` pixels.
    fn upload_texture(&mut self, handle: TextureHandle, width: u32, height: u32, data: &[u8]);

    /// Replace a rectangle of the image. `data` holds rows of the full
    /// texture width starting at row `y`.
    fn update_sub_image(
        &mut self,
        handle: TextureHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: &[u8],
    );

    fn bind(&mut self, unit: TextureUnit, handle: TextureHandle);

    fn set_blend(&mut self, mode: BlendMode);

    /// Submit one triangle fan.
    fn draw_poly(&mut self, verts: &[PolyVert], layers: TexLayers);

    /// True when base and lightmap can be combined in a single pass.
    fn has_multitexture(&self) -> bool;
}

pub trait TextureResolver {
    /// Resolve a game path (without extension) to a loaded texture and its
    /// pixel size.
    fn find_image(&mut self, path: &str) -> Option<(TextureHandle, u32, u32)>;
}
