// backend.rs — headless graphics backend
//
// Accepts everything the renderer submits and keeps counters instead of
// talking to a GPU.

use ufobsp_common::common::com_printf;
use ufobsp_renderer::qgl::{BlendMode, GraphicsApi, PixelFormat, PolyVert, TexLayers, TextureHandle, TextureUnit};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendCounters {
    pub uploads: usize,
    pub uploaded_bytes: usize,
    pub sub_images: usize,
    pub binds: usize,
    pub blend_changes: usize,
    pub polys: usize,
    pub verts: usize,
    /// polys drawn with both layers in one pass
    pub multitextured: usize,
}

#[derive(Debug)]
pub struct CountingApi {
    multitexture: bool,
    /// size of every texture, indexed by handle - 1
    textures: Vec<(u32, u32)>,
    blend: BlendMode,
    pub frame: BackendCounters,
    pub total: BackendCounters,
}

impl CountingApi {
    pub fn new(multitexture: bool) -> Self {
        Self {
            multitexture,
            textures: Vec::new(),
            blend: BlendMode::Opaque,
            frame: BackendCounters::default(),
            total: BackendCounters::default(),
        }
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn texture_size(&self, handle: TextureHandle) -> Option<(u32, u32)> {
        let i = (handle as usize).checked_sub(1)?;
        self.textures.get(i).copied()
    }

    /// Counters since the last call, folded into the running total.
    pub fn end_frame(&mut self) -> BackendCounters {
        let f = std::mem::take(&mut self.frame);
        let t = &mut self.total;
        t.uploads += f.uploads;
        t.uploaded_bytes += f.uploaded_bytes;
        t.sub_images += f.sub_images;
        t.binds += f.binds;
        t.blend_changes += f.blend_changes;
        t.polys += f.polys;
        t.verts += f.verts;
        t.multitextured += f.multitextured;
        f
    }

    pub fn print_totals(&self) {
        let t = &self.total;
        com_printf(&format!(
            "{} textures, {} uploads ({} bytes), {} sub images, {} binds, {} polys, {} verts\n",
            self.textures.len(),
            t.uploads,
            t.uploaded_bytes,
            t.sub_images,
            t.binds,
            t.polys,
            t.verts
        ));
    }
}

impl GraphicsApi for CountingApi {
    fn create_texture(&mut self, width: u32, height: u32, _format: PixelFormat) -> TextureHandle {
        self.textures.push((width, height));
        self.textures.len() as TextureHandle
    }

    fn upload_texture(&mut self, _handle: TextureHandle, _width: u32, _height: u32, data: &[u8]) {
        self.frame.uploads += 1;
        self.frame.uploaded_bytes += data.len();
    }

    fn update_sub_image(&mut self, _handle: TextureHandle, _x: u32, _y: u32, width: u32, height: u32, _data: &[u8]) {
        self.frame.sub_images += 1;
        self.frame.uploaded_bytes += (width * height * 4) as usize;
    }

    fn bind(&mut self, _unit: TextureUnit, _handle: TextureHandle) {
        self.frame.binds += 1;
    }

    fn set_blend(&mut self, mode: BlendMode) {
        if mode != self.blend {
            self.blend = mode;
            self.frame.blend_changes += 1;
        }
    }

    fn draw_poly(&mut self, verts: &[PolyVert], layers: TexLayers) {
        self.frame.polys += 1;
        self.frame.verts += verts.len();
        if layers == TexLayers::BaseAndLightmap {
            self.frame.multitextured += 1;
        }
    }

    fn has_multitexture(&self) -> bool {
        self.multitexture
    }
}
