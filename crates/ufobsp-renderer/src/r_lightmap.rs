// r_lightmap.rs — lightmap atlas pages and the per-frame dynamic page
//
// Static lightmaps are packed into pages 1.. at load time and never touched
// again. Faces whose lighting differs from what was baked are re-rastered
// every frame into the shared page 0, which is flushed and refilled as often
// as the frame needs.

use ufobsp_common::common::com_dprintf;
use ufobsp_common::qfiles::TexFlags;

use crate::qgl::{GraphicsApi, PixelFormat, TextureHandle, TextureUnit};
use crate::r_error::{LightmapError, LoadError};
use crate::r_light::{light_style, r_set_cache_state, LightParams, LightRaster, LightStyle};
use crate::r_model_types::{LightmapBlock, MSurface, SurfRef, Tile};

pub const MAX_LIGHTMAPS: usize = 256;
pub const LIGHTMAP_BYTES: usize = 4;
/// Page shared by every dynamically lit face.
pub const DYNAMIC_PAGE: usize = 0;

// ============================================================
// Skyline allocator
// ============================================================

/// Packs rectangles into a page by tracking the filled height of every
/// column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skyline {
    width: i32,
    height: i32,
    allocated: Vec<i32>,
}

impl Skyline {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height, allocated: vec![0; width.max(0) as usize] }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn clear(&mut self) {
        self.allocated.iter_mut().for_each(|a| *a = 0);
    }

    /// Tallest column, i.e. how many rows hold data.
    pub fn max_height(&self) -> i32 {
        self.allocated.iter().copied().max().unwrap_or(0)
    }

    /// Place a `w` x `h` block at the leftmost position with the lowest
    /// base. Returns the top-left corner.
    pub fn alloc(&mut self, w: i32, h: i32) -> Option<(i32, i32)> {
        if w <= 0 || h <= 0 || w > self.width {
            return None;
        }
        let w_u = w as usize;

        let mut best = self.height;
        let mut x = 0usize;
        for i in 0..=(self.width - w) as usize {
            let base = self.allocated[i..i + w_u].iter().copied().max().unwrap_or(0);
            if base < best {
                best = base;
                x = i;
            }
        }

        if best + h > self.height {
            return None;
        }

        self.allocated[x..x + w_u].iter_mut().for_each(|a| *a = best + h);
        Some((x as i32, best))
    }
}

// ============================================================
// Pages
// ============================================================

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DynamicStats {
    pub faces: usize,
    pub flushes: usize,
}

#[derive(Debug)]
pub struct LightmapState {
    block_size: i32,
    skyline: Skyline,
    buffer: Vec<u8>,
    raster: LightRaster,

    /// page being filled while loading
    pub current_page: usize,
    /// texture of every page; index 0 is the dynamic page
    pub pages: Vec<TextureHandle>,
}

impl Default for LightmapState {
    fn default() -> Self {
        Self::new(256)
    }
}

impl LightmapState {
    pub fn new(block_size: i32) -> Self {
        let block_size = block_size.max(1);
        Self {
            block_size,
            skyline: Skyline::new(block_size, block_size),
            buffer: vec![0; (block_size * block_size) as usize * LIGHTMAP_BYTES],
            raster: LightRaster::new(),
            current_page: 1,
            pages: Vec::new(),
        }
    }

    #[inline]
    pub fn block_size(&self) -> i32 {
        self.block_size
    }

    /// Number of pages holding static lightmaps.
    pub fn static_pages(&self) -> usize {
        self.pages.len().saturating_sub(1)
    }

    /// Reset the atlas and create the dynamic page. Every tile of a world
    /// shares the pages created between this and `end_building`.
    pub fn begin_building<A: GraphicsApi + ?Sized>(&mut self, api: &mut A, block_size: i32) {
        *self = Self::new(block_size);
        let bs = self.block_size as u32;
        let dynamic = api.create_texture(bs, bs, PixelFormat::Rgba8);
        api.upload_texture(dynamic, bs, bs, &self.buffer);
        self.pages.push(dynamic);
    }

    /// Upload the page in progress and start a fresh one.
    fn upload_block<A: GraphicsApi + ?Sized>(&mut self, api: &mut A) -> Result<(), LoadError> {
        let bs = self.block_size as u32;
        let handle = match self.pages.get(self.current_page) {
            Some(&h) => h,
            None => {
                let h = api.create_texture(bs, bs, PixelFormat::Rgba8);
                self.pages.push(h);
                h
            }
        };
        api.upload_texture(handle, bs, bs, &self.buffer);

        self.current_page += 1;
        if self.current_page == MAX_LIGHTMAPS {
            return Err(LoadError::TooManyLightmaps);
        }

        self.skyline.clear();
        self.buffer.iter_mut().for_each(|b| *b = 0);
        Ok(())
    }

    /// Give a face its static block and raster the baked lighting into it.
    pub fn create_surface_lightmap<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &mut A,
        tile: &mut Tile,
        surfnum: usize,
        modulate: f32,
    ) -> Result<(), LoadError> {
        let neutral = [LightStyle::NEUTRAL];
        r_set_cache_state(&mut tile.surfaces[surfnum], &neutral);

        let (smax, tmax) = tile.surfaces[surfnum].lightmap_size();
        let (s, t) = match self.skyline.alloc(smax, tmax) {
            Some(pos) => pos,
            None => {
                self.upload_block(api)?;
                self.skyline
                    .alloc(smax, tmax)
                    .ok_or(LoadError::LightmapTooLarge { width: smax, height: tmax })?
            }
        };

        let params = LightParams { styles: &neutral, dlights: &[], framecount: 0, modulate };
        let stride = self.block_size as usize * LIGHTMAP_BYTES;
        let base = (t * self.block_size + s) as usize * LIGHTMAP_BYTES;
        self.raster
            .build_light_map(tile, &tile.surfaces[surfnum], &params, &mut self.buffer[base..], stride);

        tile.surfaces[surfnum].lightmap = Some(LightmapBlock { page: self.current_page, s, t });
        Ok(())
    }

    pub fn end_building<A: GraphicsApi + ?Sized>(&mut self, api: &mut A) -> Result<(), LoadError> {
        self.upload_block(api)?;
        com_dprintf(&format!("lightmaps: {} static pages\n", self.static_pages()));
        Ok(())
    }

    // ============================================================
    // Dynamic page
    // ============================================================

    /// Re-raster every queued face into the dynamic page and draw it.
    ///
    /// When the page fills up, the faces placed so far are uploaded and
    /// drawn, the page is cleared and allocation is retried once. `draw`
    /// receives the lightmap coordinate offset from the face's static block
    /// to its place in the dynamic page.
    pub fn update_dynamic<A, F>(
        &mut self,
        api: &mut A,
        tiles: &mut [Tile],
        queue: &[SurfRef],
        params: &LightParams,
        mut draw: F,
    ) -> Result<DynamicStats, LightmapError>
    where
        A: GraphicsApi + ?Sized,
        F: FnMut(&mut A, &[Tile], SurfRef, [f32; 2]),
    {
        let mut stats = DynamicStats::default();
        if queue.is_empty() {
            return Ok(stats);
        }

        let stride = self.block_size as usize * LIGHTMAP_BYTES;
        self.skyline.clear();
        let mut first_pending = 0;

        for (i, &r) in queue.iter().enumerate() {
            let (smax, tmax) = tiles[r.tile].surfaces[r.surf].lightmap_size();

            let (s, t) = match self.skyline.alloc(smax, tmax) {
                Some(pos) => pos,
                None => {
                    self.flush_dynamic(api, tiles, &queue[first_pending..i], &mut draw);
                    stats.flushes += 1;
                    first_pending = i;
                    self.skyline.clear();
                    self.skyline.alloc(smax, tmax).ok_or(LightmapError::AllocationExhausted {
                        width: smax,
                        height: tmax,
                        dynamic: true,
                    })?
                }
            };

            let surf = &mut tiles[r.tile].surfaces[r.surf];
            surf.dlight_s = s;
            surf.dlight_t = t;

            let tile = &tiles[r.tile];
            let base = (t * self.block_size + s) as usize * LIGHTMAP_BYTES;
            self.raster
                .build_light_map(tile, &tile.surfaces[r.surf], params, &mut self.buffer[base..], stride);
            stats.faces += 1;
        }

        self.flush_dynamic(api, tiles, &queue[first_pending..], &mut draw);
        Ok(stats)
    }

    fn flush_dynamic<A, F>(&mut self, api: &mut A, tiles: &[Tile], pending: &[SurfRef], draw: &mut F)
    where
        A: GraphicsApi + ?Sized,
        F: FnMut(&mut A, &[Tile], SurfRef, [f32; 2]),
    {
        let Some(&page) = self.pages.get(DYNAMIC_PAGE) else {
            return;
        };
        let w = self.block_size;
        let h = self.skyline.max_height();
        if h > 0 {
            let len = (w * h) as usize * LIGHTMAP_BYTES;
            api.update_sub_image(page, 0, 0, w as u32, h as u32, &self.buffer[..len]);
        }
        api.bind(TextureUnit::Lightmap, page);

        for &r in pending {
            let surf = &tiles[r.tile].surfaces[r.surf];
            let Some(block) = surf.lightmap else {
                continue;
            };
            let offset = [
                (surf.dlight_s - block.s) as f32 / w as f32,
                (surf.dlight_t - block.t) as f32 / w as f32,
            ];
            draw(api, tiles, r, offset);
        }
    }
}

/// True when a face's baked lightmap no longer matches what it should show
/// this frame.
pub fn surface_is_dynamic(
    surf: &MSurface,
    flags: TexFlags,
    styles: &[LightStyle],
    framecount: i32,
    gl_dynamic: bool,
) -> bool {
    if !gl_dynamic || surf.lightmap.is_none() {
        return false;
    }
    if flags.intersects(TexFlags::TRANSLUCENT | TexFlags::WARP) {
        return false;
    }

    let restyled = surf
        .styles
        .iter()
        .zip(surf.cached_light.iter())
        .take(surf.num_styles())
        .any(|(&id, &cached)| light_style(styles, id).white != cached);

    restyled || surf.dlightframe == framecount
}

// ============================================================
// Tests
// ============================================================
