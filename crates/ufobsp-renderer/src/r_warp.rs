// r_warp.rs — warped (liquid) surface subdivision and drawing

use std::sync::OnceLock;

use ufobsp_common::q_shared::{add_point_to_bounds, clear_bounds, vector_add, vector_scale, Vec3};
use ufobsp_common::qfiles::TexFlags;

use crate::qgl::{GraphicsApi, PolyVert, TexLayers};
use crate::r_model_types::{GlPoly, MSurface, MTexInfo, Tile};

pub const SUBDIVIDE_SIZE: f32 = 64.0;
/// Cuts closer than this to the polygon's edge are not worth making.
const SUBDIVIDE_MIN: f32 = 8.0;

pub const TURBSCALE: f32 = 256.0 / (2.0 * std::f32::consts::PI);

/// One period of the liquid waveform, 8 units peak.
pub fn turbsin_table() -> &'static [f32; 256] {
    static TABLE: OnceLock<[f32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = [0.0; 256];
        for (i, v) in t.iter_mut().enumerate() {
            *v = 8.0 * (i as f32 * 2.0 * std::f32::consts::PI / 256.0).sin();
        }
        t
    })
}

#[inline]
fn turb(phase: f32) -> f32 {
    turbsin_table()[(phase * TURBSCALE) as i32 as usize & 255]
}

/// Horizontal scroll of flowing surfaces at `time`.
pub fn flowing_scroll(time: f32) -> f32 {
    let scroll = -64.0 * ((time / 40.0) - (time / 40.0).floor());
    if scroll == 0.0 {
        -64.0
    } else {
        scroll
    }
}

fn subdivide_polygon(verts: &[Vec3], tex: &MTexInfo, shift: &Vec3, polys: &mut Vec<GlPoly>) {
    let mut mins = [0.0; 3];
    let mut maxs = [0.0; 3];
    clear_bounds(&mut mins, &mut maxs);
    for v in verts {
        add_point_to_bounds(v, &mut mins, &mut maxs);
    }

    for i in 0..3 {
        let mid = (mins[i] + maxs[i]) * 0.5;
        let m = SUBDIVIDE_SIZE * (mid / SUBDIVIDE_SIZE + 0.5).floor();
        if maxs[i] - m < SUBDIVIDE_MIN || m - mins[i] < SUBDIVIDE_MIN {
            continue;
        }

        // cut it
        let dist: Vec<f32> = verts.iter().map(|v| v[i] - m).collect();
        let mut front = Vec::with_capacity(verts.len() + 2);
        let mut back = Vec::with_capacity(verts.len() + 2);

        for j in 0..verts.len() {
            let k = (j + 1) % verts.len();
            let v = verts[j];
            if dist[j] >= 0.0 {
                front.push(v);
            }
            if dist[j] <= 0.0 {
                back.push(v);
            }
            if dist[j] == 0.0 || dist[k] == 0.0 {
                continue;
            }
            if (dist[j] > 0.0) != (dist[k] > 0.0) {
                // clip point
                let frac = dist[j] / (dist[j] - dist[k]);
                let next = verts[k];
                let e = [
                    v[0] + frac * (next[0] - v[0]),
                    v[1] + frac * (next[1] - v[1]),
                    v[2] + frac * (next[2] - v[2]),
                ];
                front.push(e);
                back.push(e);
            }
        }

        subdivide_polygon(&front, tex, shift, polys);
        subdivide_polygon(&back, tex, shift, polys);
        return;
    }

    // a center point first keeps the warp from folding
    let mut total = [0.0; 3];
    let mut total_st = [0.0f32; 2];
    let mut ring = Vec::with_capacity(verts.len() + 2);
    ring.push(PolyVert::default());

    for v in verts {
        let s = v[0] * tex.vecs[0][0] + v[1] * tex.vecs[0][1] + v[2] * tex.vecs[0][2];
        let t = v[0] * tex.vecs[1][0] + v[1] * tex.vecs[1][1] + v[2] * tex.vecs[1][2];
        total = vector_add(&total, v);
        total_st[0] += s;
        total_st[1] += t;
        ring.push(PolyVert { pos: vector_add(v, shift), st: [s, t], lm: [0.0; 2] });
    }

    let n = verts.len() as f32;
    let center = vector_scale(&total, 1.0 / n);
    ring[0] = PolyVert {
        pos: vector_add(&center, shift),
        st: [total_st[0] / n, total_st[1] / n],
        lm: [0.0; 2],
    };

    // close the fan
    let first = ring[1];
    ring.push(first);
    polys.push(GlPoly { verts: ring });
}

/// Break a warp face into pieces no larger than `SUBDIVIDE_SIZE` so the
/// per-vertex warp looks smooth. Runs while the tile is still in tile
/// space: cuts follow the tile's own grid and the pieces are then moved by
/// the tile shift.
pub fn r_subdivide_surface(tile: &Tile, surf: &MSurface) -> Vec<GlPoly> {
    let verts: Vec<Vec3> = (0..surf.numedges).map(|i| tile.surf_vertex(surf, i)).collect();

    let mut polys = Vec::new();
    if verts.len() >= 3 {
        subdivide_polygon(&verts, &tile.texinfo[surf.texinfo], &tile.shift, &mut polys);
    }
    polys
}

/// Draw a warp face with its texture coordinates displaced by the liquid
/// waveform at `time`.
pub fn emit_water_polys<A: GraphicsApi + ?Sized>(
    api: &mut A,
    surf: &MSurface,
    tex: &MTexInfo,
    origin: &Vec3,
    time: f32,
    waterwave: f32,
) -> usize {
    let scroll = if tex.flags.contains(TexFlags::FLOWING) {
        flowing_scroll(time)
    } else {
        0.0
    };

    let mut verts = Vec::new();
    for p in &surf.polys {
        verts.clear();
        verts.extend(p.verts.iter().map(|v| {
            let os = v.st[0];
            let ot = v.st[1];

            let s = (os + turb(ot * 0.125 + time) + scroll) * (1.0 / 64.0);
            let t = (ot + turb(os * 0.125 + time)) * (1.0 / 64.0);

            let mut pos = vector_add(&v.pos, origin);
            if waterwave > 0.0 {
                let wv = turb(pos[0] * 0.025 + time) * 0.25 + turb(pos[1] * 0.05 + time) * 0.125;
                pos[2] += wv * waterwave;
            }
            PolyVert { pos, st: [s, t], lm: [0.0; 2] }
        }));
        api.draw_poly(&verts, TexLayers::Base);
    }
    surf.polys.len()
}

// ============================================================
// Tests
// ============================================================
