// r_light.rs — light styles, dynamic lights and the lightmap raster
//
// A face's lightmap is built from the baked per-style samples scaled by the
// live style table, plus the point lights that touched the face this frame.

use ufobsp_common::q_shared::{
    dot_product, vector_length, vector_ma, vector_subtract, Vec3,
};
use ufobsp_common::qfiles::{MAXLIGHTMAPS, STYLE_NONE};

use crate::r_model_types::{MSurface, NodeRef, Tile};

/// Point lights are tracked in a 32-bit mask per face.
pub const MAX_DLIGHTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightStyle {
    pub rgb: [f32; 3],
    pub white: f32, // highest of rgb
}

impl LightStyle {
    /// The style table lightmaps are built with at load time.
    pub const NEUTRAL: LightStyle = LightStyle { rgb: [1.0, 1.0, 1.0], white: 3.0 };
}

impl Default for LightStyle {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DLight {
    pub origin: Vec3,
    pub color: Vec3,
    /// radius of influence
    pub intensity: f32,
}

/// Style lookup that treats ids beyond the table as neutral.
#[inline]
pub fn light_style(styles: &[LightStyle], id: u8) -> LightStyle {
    styles.get(id as usize).copied().unwrap_or(LightStyle::NEUTRAL)
}

/// Everything a raster build reads besides the face itself.
#[derive(Debug, Clone, Copy)]
pub struct LightParams<'a> {
    pub styles: &'a [LightStyle],
    pub dlights: &'a [DLight],
    pub framecount: i32,
    pub modulate: f32,
}

// ============================================================
// DYNAMIC LIGHTS: BSP marking
// ============================================================

fn sphere_touches_box(center: &Vec3, radius: f32, mins: &Vec3, maxs: &Vec3) -> bool {
    let mut d2 = 0.0;
    for i in 0..3 {
        let c = center[i];
        if c < mins[i] {
            d2 += (mins[i] - c) * (mins[i] - c);
        } else if c > maxs[i] {
            d2 += (c - maxs[i]) * (c - maxs[i]);
        }
    }
    d2 <= radius * radius
}

/// Mark the faces of every non-solid leaf the light's sphere reaches.
pub fn r_mark_lights(tile: &mut Tile, light: &DLight, bit: u32, node: NodeRef, framecount: i32) {
    let (mins, maxs) = tile.bounds(node);
    if !sphere_touches_box(&light.origin, light.intensity, mins, maxs) {
        return;
    }

    let n = match node {
        NodeRef::Leaf(l) => {
            let leaf = &tile.leafs[l];
            if leaf.is_solid() {
                return;
            }
            let first = leaf.firstmarksurface;
            for i in first..first + leaf.nummarksurfaces {
                let surf = &mut tile.surfaces[tile.marksurfaces[i]];
                if surf.dlightframe != framecount {
                    surf.dlightbits = 0;
                    surf.dlightframe = framecount;
                }
                surf.dlightbits |= bit;
            }
            return;
        }
        NodeRef::Node(n) => n,
    };

    let children = tile.nodes[n].children;
    let dist = match tile.nodes[n].plane {
        Some(p) => tile.planes[p].distance(&light.origin),
        None => 0.0, // level grouping node, both sides
    };

    if dist > light.intensity {
        r_mark_lights(tile, light, bit, children[0], framecount);
        return;
    }
    if dist < -light.intensity {
        r_mark_lights(tile, light, bit, children[1], framecount);
        return;
    }

    r_mark_lights(tile, light, bit, children[0], framecount);
    r_mark_lights(tile, light, bit, children[1], framecount);
}

/// Compute this frame's touched set over every level brush drawn at
/// `worldlevel`.
pub fn r_push_dlights(tiles: &mut [Tile], dlights: &[DLight], worldlevel: i32, framecount: i32) {
    for tile in tiles.iter_mut() {
        let heads: Vec<NodeRef> = tile.level_headnodes(worldlevel).collect();
        for head in heads {
            for (i, dl) in dlights.iter().take(MAX_DLIGHTS).enumerate() {
                r_mark_lights(tile, dl, 1 << i, head, framecount);
            }
        }
    }
}

/// Remember the style intensities a lightmap was built with.
pub fn r_set_cache_state(surf: &mut MSurface, styles: &[LightStyle]) {
    for maps in 0..MAXLIGHTMAPS {
        if surf.styles[maps] == STYLE_NONE {
            break;
        }
        surf.cached_light[maps] = light_style(styles, surf.styles[maps]).white;
    }
}

// ============================================================
// Raster
// ============================================================

/// Scratch buffer for building lightmaps, reused across faces.
#[derive(Debug, Default)]
pub struct LightRaster {
    blocklights: Vec<f32>,
}

impl LightRaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the lightmap of `surf` into `dest`. `dest` starts at the
    /// block's first texel and rows are `stride` bytes apart.
    pub fn build_light_map(
        &mut self,
        tile: &Tile,
        surf: &MSurface,
        params: &LightParams,
        dest: &mut [u8],
        stride: usize,
    ) {
        let (smax, tmax) = surf.lightmap_size();
        let (smax, tmax) = (smax as usize, tmax as usize);
        let size = smax * tmax;

        self.blocklights.clear();
        self.blocklights.resize(size * 3, 0.0);

        let nummaps = surf.num_styles();
        let samples = surf
            .samples
            .and_then(|ofs| tile.lightdata.get(ofs..ofs + nummaps * size * 3));

        match samples {
            None => {
                // set to full bright if no light data
                self.blocklights.iter_mut().for_each(|b| *b = 255.0);
            }
            Some(lightmap) => {
                for (maps, chunk) in lightmap.chunks_exact(size * 3).enumerate() {
                    let style = light_style(params.styles, surf.styles[maps]);
                    let scale = [
                        params.modulate * style.rgb[0],
                        params.modulate * style.rgb[1],
                        params.modulate * style.rgb[2],
                    ];
                    for (bl, px) in self.blocklights.chunks_exact_mut(3).zip(chunk.chunks_exact(3)) {
                        bl[0] += px[0] as f32 * scale[0];
                        bl[1] += px[1] as f32 * scale[1];
                        bl[2] += px[2] as f32 * scale[2];
                    }
                }

                // add all the dynamic lights
                if surf.dlightframe == params.framecount && surf.dlightbits != 0 {
                    self.add_dynamic_lights(tile, surf, params, smax, tmax);
                }
            }
        }

        // put into texture format
        for t in 0..tmax {
            let row = t * stride;
            for s in 0..smax {
                let bl = &self.blocklights[(t * smax + s) * 3..][..3];
                let (r, g, b, a) = blocklights_to_rgba(bl[0], bl[1], bl[2]);
                let px = &mut dest[row + s * 4..row + s * 4 + 4];
                px.copy_from_slice(&[r, g, b, a]);
            }
        }
    }

    fn add_dynamic_lights(
        &mut self,
        tile: &Tile,
        surf: &MSurface,
        params: &LightParams,
        smax: usize,
        tmax: usize,
    ) {
        let tex = &tile.texinfo[surf.texinfo];
        let plane = &tile.planes[surf.plane];
        let luxel = (1 << surf.lquant) as f32;

        let len_s = vector_length(&tex.axis(0));
        let len_t = vector_length(&tex.axis(1));
        if len_s == 0.0 || len_t == 0.0 {
            return;
        }

        for (lnum, dl) in params.dlights.iter().take(MAX_DLIGHTS).enumerate() {
            if surf.dlightbits & (1 << lnum) == 0 {
                continue; // not lit by this light
            }

            let radius = dl.intensity;
            let fdist = dot_product(&dl.origin, &plane.normal) - plane.dist;
            if fdist.abs() >= radius {
                continue;
            }

            // texture space is unshifted
            let origin = vector_subtract(&dl.origin, &tile.shift);
            let impact = vector_ma(&origin, -fdist, &plane.normal);
            let local_s = tex.project(&impact, 0) - surf.texturemins[0] as f32;
            let local_t = tex.project(&impact, 1) - surf.texturemins[1] as f32;

            for t in 0..tmax {
                let td = (local_t - t as f32 * luxel) / len_t;
                for s in 0..smax {
                    let sd = (local_s - s as f32 * luxel) / len_s;
                    let d = (fdist * fdist + sd * sd + td * td).sqrt().max(1.0);
                    if d >= radius {
                        continue;
                    }
                    let add = 255.0 * (radius / d - 1.0);
                    let bl = &mut self.blocklights[(t * smax + s) * 3..][..3];
                    bl[0] += dl.color[0] * add;
                    bl[1] += dl.color[1] * add;
                    bl[2] += dl.color[2] * add;
                }
            }
        }
    }
}

/// Clamp a blocklights texel and rescale it so the brightest channel fits
/// in a byte. Alpha carries the (rescaled) brightest channel.
fn blocklights_to_rgba(r_in: f32, g_in: f32, b_in: f32) -> (u8, u8, u8, u8) {
    let mut r = (r_in as i32).max(0);
    let mut g = (g_in as i32).max(0);
    let mut b = (b_in as i32).max(0);

    let max = r.max(g).max(b);
    let mut a = max;

    if max > 255 {
        let t = 255.0 / max as f32;
        r = (r as f32 * t) as i32;
        g = (g as f32 * t) as i32;
        b = (b as f32 * t) as i32;
        a = (a as f32 * t) as i32;
    }

    (r as u8, g as u8, b as u8, a as u8)
}

// ============================================================
// Tests
// ============================================================
