// r_rsurf.rs — surface polygons, world traversal and surface drawing
//
// The world is walked front to back once per frame. Faces are either drawn
// on the spot or sorted into this frame's `SurfaceChains`, which are then
// drawn per texture, per lightmap page and finally back to front for the
// translucent ones.

use std::mem;

use ufobsp_common::common::com_dprintf;
use ufobsp_common::q_shared::{dot_product, vector_add, vector_subtract, Vec3};
use ufobsp_common::qfiles::TexFlags;

use crate::qgl::{BlendMode, GraphicsApi, PolyVert, TexLayers, TextureUnit};
use crate::r_error::LightmapError;
use crate::r_image::ImageTable;
use crate::r_light::{r_mark_lights, DLight, LightParams};
use crate::r_lightmap::{surface_is_dynamic, DYNAMIC_PAGE};
use crate::r_model_types::{GlPoly, Image, MSurface, MTexInfo, NodeRef, SurfFlags, SurfRef, Tile};
use crate::r_rmain::{r_cull_box, Entity, RenderContext, BACKFACE_EPSILON};
use crate::r_tiles::World;
use crate::r_warp::{emit_water_polys, flowing_scroll};

const ORIGIN: Vec3 = [0.0; 3];

// ============================================================
// Polygons
// ============================================================

/// Turn a face's edge loop into a triangle fan with base and lightmap
/// coordinates. Runs while the tile is still in tile space.
pub fn build_polygon_from_surface(tile: &Tile, surf: &MSurface, image: &Image, block_size: i32) -> GlPoly {
    let tex = &tile.texinfo[surf.texinfo];
    let luxel = (1i32 << surf.lquant) as f32;
    let page = block_size as f32 * luxel;
    let (w, h) = (image.width.max(1) as f32, image.height.max(1) as f32);

    let verts = (0..surf.numedges)
        .map(|i| {
            let v = tile.surf_vertex(surf, i);
            let s = tex.project(&v, 0);
            let t = tex.project(&v, 1);

            // lightmap texture coordinates
            let lm = match surf.lightmap {
                Some(b) => [
                    (s - surf.texturemins[0] as f32 + b.s as f32 * luxel + luxel * 0.5) / page,
                    (t - surf.texturemins[1] as f32 + b.t as f32 * luxel + luxel * 0.5) / page,
                ],
                None => [0.0; 2],
            };

            PolyVert { pos: vector_add(&v, &tile.shift), st: [s / w, t / h], lm }
        })
        .collect();

    GlPoly { verts }
}

/// Image index for the animation frame of `texinfo` shown at `time`.
pub fn r_texture_animation(tile: &Tile, texinfo: usize, time: f32) -> usize {
    let tex = &tile.texinfo[texinfo];
    if tex.next.is_none() {
        return tex.image;
    }

    let mut c = ((time * 2.0) as i32).rem_euclid(tex.numframes.max(1));
    let mut t = texinfo;
    while c > 0 {
        match tile.texinfo[t].next {
            Some(n) => t = n,
            None => break,
        }
        c -= 1;
    }
    tile.texinfo[t].image
}

#[inline]
fn surface_scroll(tex: &MTexInfo, time: f32) -> f32 {
    if tex.flags.contains(TexFlags::FLOWING) {
        flowing_scroll(time)
    } else {
        0.0
    }
}

fn alpha_for(flags: TexFlags) -> f32 {
    if flags.contains(TexFlags::TRANS33) {
        0.33
    } else {
        0.66
    }
}

fn poly_verts(out: &mut Vec<PolyVert>, poly: &GlPoly, scroll: f32, lm_offset: [f32; 2], origin: &Vec3) {
    out.clear();
    out.extend(poly.verts.iter().map(|v| PolyVert {
        pos: vector_add(&v.pos, origin),
        st: [v.st[0] + scroll, v.st[1]],
        lm: [v.lm[0] + lm_offset[0], v.lm[1] + lm_offset[1]],
    }));
}

// ============================================================
// Chains
// ============================================================

/// Faces collected during one frame's traversal.
#[derive(Debug, Default)]
pub struct SurfaceChains {
    /// by image index, two-pass path only
    pub texture_chains: Vec<Vec<SurfRef>>,
    /// by lightmap page; page 0 holds the faces to relight this frame
    pub lightmap_chains: Vec<Vec<SurfRef>>,
    /// translucent faces in traversal order
    pub alpha: Vec<SurfRef>,
}

fn push_chain(chains: &mut Vec<Vec<SurfRef>>, i: usize, r: SurfRef) {
    if chains.len() <= i {
        chains.resize_with(i + 1, Vec::new);
    }
    chains[i].push(r);
}

impl SurfaceChains {
    /// Empty every chain, keeping the allocations.
    pub fn clear(&mut self) {
        self.texture_chains.iter_mut().for_each(Vec::clear);
        self.lightmap_chains.iter_mut().for_each(Vec::clear);
        self.alpha.clear();
    }

    pub fn push_texture(&mut self, image: usize, r: SurfRef) {
        push_chain(&mut self.texture_chains, image, r);
    }

    pub fn push_lightmap(&mut self, page: usize, r: SurfRef) {
        push_chain(&mut self.lightmap_chains, page, r);
    }

    /// Faces waiting for the dynamic page.
    pub fn dynamic(&self) -> &[SurfRef] {
        self.lightmap_chains.get(DYNAMIC_PAGE).map_or(&[], Vec::as_slice)
    }
}

// ============================================================
// Drawing single faces
// ============================================================

fn draw_surface_polys<A: GraphicsApi + ?Sized>(
    ctx: &mut RenderContext,
    api: &mut A,
    surf: &MSurface,
    scroll: f32,
    origin: &Vec3,
    layers: TexLayers,
) {
    for p in &surf.polys {
        poly_verts(&mut ctx.scratch, p, scroll, [0.0; 2], origin);
        api.draw_poly(&ctx.scratch, layers);
        ctx.stats.polys += 1;
    }
}

/// Draw a face with its base texture only.
pub fn r_render_brush_poly<A: GraphicsApi + ?Sized>(
    ctx: &mut RenderContext,
    api: &mut A,
    tile: &Tile,
    images: &ImageTable,
    surf: &MSurface,
    origin: &Vec3,
) {
    let tex = &tile.texinfo[surf.texinfo];
    let image = images.get(r_texture_animation(tile, surf.texinfo, ctx.time));
    ctx.bind(api, TextureUnit::Base, image.handle);

    if surf.flags.contains(SurfFlags::DRAWTURB) {
        ctx.stats.warp_surfaces += 1;
        ctx.stats.polys += emit_water_polys(api, surf, tex, origin, ctx.time, ctx.config.waterwave);
        return;
    }

    draw_surface_polys(ctx, api, surf, surface_scroll(tex, ctx.time), origin, TexLayers::Base);
}

/// Draw a face with its texture and static lightmap in one pass.
fn render_lightmapped_poly<A: GraphicsApi + ?Sized>(
    ctx: &mut RenderContext,
    api: &mut A,
    tile: &Tile,
    images: &ImageTable,
    surf: &MSurface,
    origin: &Vec3,
) {
    let page = surf.lightmap.and_then(|b| ctx.lightmaps.pages.get(b.page).copied());
    let Some(page) = page else {
        r_render_brush_poly(ctx, api, tile, images, surf, origin);
        return;
    };

    let tex = &tile.texinfo[surf.texinfo];
    let image = images.get(r_texture_animation(tile, surf.texinfo, ctx.time));
    ctx.bind(api, TextureUnit::Base, image.handle);
    ctx.bind(api, TextureUnit::Lightmap, page);
    draw_surface_polys(ctx, api, surf, surface_scroll(tex, ctx.time), origin, TexLayers::BaseAndLightmap);
}

// ============================================================
// World traversal
// ============================================================

/// Sort one world face into this frame's buckets, or draw it right away.
fn r_emit_world_surface<A: GraphicsApi + ?Sized>(ctx: &mut RenderContext, api: &mut A, world: &World, r: SurfRef) {
    let tile = &world.tiles[r.tile];
    let surf = &tile.surfaces[r.surf];
    let tex = &tile.texinfo[surf.texinfo];

    if tex.flags.intersects(TexFlags::TRANSLUCENT) {
        // add to the translucent chain
        ctx.chains.alpha.push(r);
        return;
    }

    if surf.flags.contains(SurfFlags::DRAWTURB) {
        r_render_brush_poly(ctx, api, tile, &world.images, surf, &ORIGIN);
        return;
    }

    let Some(block) = surf.lightmap else {
        r_render_brush_poly(ctx, api, tile, &world.images, surf, &ORIGIN);
        return;
    };

    let dynamic = !ctx.config.fullbright
        && surface_is_dynamic(surf, tex.flags, &ctx.lightstyles, ctx.framecount, ctx.config.dynamic);

    if api.has_multitexture() {
        if dynamic {
            ctx.chains.push_lightmap(DYNAMIC_PAGE, r);
        } else if ctx.config.fullbright {
            r_render_brush_poly(ctx, api, tile, &world.images, surf, &ORIGIN);
        } else {
            render_lightmapped_poly(ctx, api, tile, &world.images, surf, &ORIGIN);
        }
    } else {
        let image = r_texture_animation(tile, surf.texinfo, ctx.time);
        ctx.chains.push_texture(image, r);
        ctx.chains.push_lightmap(if dynamic { DYNAMIC_PAGE } else { block.page }, r);
    }
}

/// Walk a tile's tree front to back from `node`, recording reached leafs
/// and emitting the faces on each splitting plane between its two sides.
pub fn r_recursive_world_node<A: GraphicsApi + ?Sized>(
    ctx: &mut RenderContext,
    api: &mut A,
    world: &World,
    tile: usize,
    node: NodeRef,
) {
    let t = &world.tiles[tile];

    if let NodeRef::Leaf(l) = node {
        if t.leafs[l].is_solid() {
            return; // solid
        }
    }

    let (mins, maxs) = t.bounds(node);
    if r_cull_box(ctx, mins, maxs) {
        ctx.stats.nodes_culled += 1;
        return;
    }

    let n = match node {
        NodeRef::Leaf(l) => {
            ctx.stats.leafs_visited += 1;
            ctx.stats.visible_leafs.push((tile, l));
            return;
        }
        NodeRef::Node(n) => n,
    };
    let mnode = &t.nodes[n];

    // level grouping nodes have no plane, both sides are walked
    let Some(planenum) = mnode.plane else {
        r_recursive_world_node(ctx, api, world, tile, mnode.children[0]);
        r_recursive_world_node(ctx, api, world, tile, mnode.children[1]);
        return;
    };

    // find which side of the node we are on
    let plane = &t.planes[planenum];
    let dot = if ctx.config.isometric {
        -dot_product(&ctx.vpn, &plane.normal)
    } else {
        plane.distance(&ctx.origin)
    };

    let (side, sidebit) = if dot >= -BACKFACE_EPSILON {
        (0, SurfFlags::empty())
    } else {
        (1, SurfFlags::PLANEBACK)
    };

    // recurse down the children, front side first
    r_recursive_world_node(ctx, api, world, tile, mnode.children[side]);

    for s in mnode.firstsurface..mnode.firstsurface + mnode.numsurfaces {
        if t.surfaces[s].flags & SurfFlags::PLANEBACK != sidebit {
            continue; // wrong side
        }
        r_emit_world_surface(ctx, api, world, SurfRef { tile, surf: s });
    }

    // recurse down the back side
    r_recursive_world_node(ctx, api, world, tile, mnode.children[1 - side]);
}

/// Walk the level brushes of every tile that are visible at the current
/// world level. Submodel 0 is the part of the map shown on every level.
pub fn r_draw_level_brushes<A: GraphicsApi + ?Sized>(ctx: &mut RenderContext, api: &mut A, world: &World) {
    for tile in 0..world.tiles.len() {
        for head in world.tiles[tile].level_headnodes(ctx.worldlevel) {
            r_recursive_world_node(ctx, api, world, tile, head);
        }
    }
}

// ============================================================
// Chain passes
// ============================================================

/// Two-pass path: every collected face with its base texture, grouped by
/// image.
fn draw_texture_chains<A: GraphicsApi + ?Sized>(ctx: &mut RenderContext, api: &mut A, world: &World) {
    let chains = mem::take(&mut ctx.chains.texture_chains);

    for (image, chain) in chains.iter().enumerate() {
        if chain.is_empty() {
            continue;
        }
        ctx.bind(api, TextureUnit::Base, world.images.get(image).handle);
        for r in chain {
            let tile = &world.tiles[r.tile];
            let surf = &tile.surfaces[r.surf];
            let scroll = surface_scroll(&tile.texinfo[surf.texinfo], ctx.time);
            draw_surface_polys(ctx, api, surf, scroll, &ORIGIN, TexLayers::Base);
        }
    }

    ctx.chains.texture_chains = chains;
}

/// Two-pass path: modulate the framebuffer with every static page in use.
fn r_blend_lightmaps<A: GraphicsApi + ?Sized>(ctx: &mut RenderContext, api: &mut A, world: &World) {
    if ctx.config.fullbright {
        return;
    }

    let chains = mem::take(&mut ctx.chains.lightmap_chains);
    api.set_blend(BlendMode::Lightmap);

    for (page, chain) in chains.iter().enumerate().skip(DYNAMIC_PAGE + 1) {
        if chain.is_empty() {
            continue;
        }
        let Some(&handle) = ctx.lightmaps.pages.get(page) else {
            continue;
        };
        ctx.bind(api, TextureUnit::Lightmap, handle);
        ctx.stats.lightmap_pages += 1;

        for r in chain {
            let surf = &world.tiles[r.tile].surfaces[r.surf];
            draw_surface_polys(ctx, api, surf, 0.0, &ORIGIN, TexLayers::Lightmap);
        }
    }

    ctx.chains.lightmap_chains = chains;
}

/// Relight the faces of `queue` into the dynamic page and draw them placed
/// at `origin`. `dlights` are in the same frame as the faces.
fn r_relight_queue<A: GraphicsApi + ?Sized>(
    ctx: &mut RenderContext,
    api: &mut A,
    world: &mut World,
    queue: &[SurfRef],
    dlights: &[DLight],
    origin: &Vec3,
) -> Result<(), LightmapError> {
    let multitexture = api.has_multitexture();
    let layers = if multitexture {
        TexLayers::BaseAndLightmap
    } else {
        api.set_blend(BlendMode::Lightmap);
        TexLayers::Lightmap
    };

    let time = ctx.time;
    let images = &world.images;
    let params = LightParams {
        styles: &ctx.lightstyles,
        dlights,
        framecount: ctx.framecount,
        modulate: ctx.config.modulate,
    };
    let scratch = &mut ctx.scratch;
    let mut polys = 0;

    let result = ctx.lightmaps.update_dynamic(api, &mut world.tiles, queue, &params, |api, tiles, r, offset| {
        let tile = &tiles[r.tile];
        let surf = &tile.surfaces[r.surf];

        let scroll = if multitexture {
            let image = images.get(r_texture_animation(tile, surf.texinfo, time));
            api.bind(TextureUnit::Base, image.handle);
            surface_scroll(&tile.texinfo[surf.texinfo], time)
        } else {
            0.0
        };

        for p in &surf.polys {
            poly_verts(scratch, p, scroll, offset, origin);
            api.draw_poly(scratch, layers);
            polys += 1;
        }
    });

    // the dynamic pass binds behind the cache's back
    ctx.invalidate_bindings();
    ctx.stats.polys += polys;

    let stats = result?;
    ctx.stats.dynamic_faces += stats.faces;
    ctx.stats.dynamic_flushes += stats.flushes;
    Ok(())
}

/// Relight and draw every world face queued on the dynamic page.
fn r_update_dynamic<A: GraphicsApi + ?Sized>(
    ctx: &mut RenderContext,
    api: &mut A,
    world: &mut World,
) -> Result<(), LightmapError> {
    let queue = match ctx.chains.lightmap_chains.get_mut(DYNAMIC_PAGE) {
        Some(q) if !q.is_empty() => mem::take(q),
        _ => return Ok(()),
    };

    let dlights = mem::take(&mut ctx.dlights);
    let result = r_relight_queue(ctx, api, world, &queue, &dlights, &ORIGIN);
    ctx.dlights = dlights;
    if let Some(q) = ctx.chains.lightmap_chains.get_mut(DYNAMIC_PAGE) {
        *q = queue;
    }
    result
}

/// Draw the opaque world: traversal, then whatever the chains still hold.
pub fn r_draw_world<A: GraphicsApi + ?Sized>(
    ctx: &mut RenderContext,
    api: &mut A,
    world: &mut World,
) -> Result<(), LightmapError> {
    r_draw_level_brushes(ctx, api, world);

    if !api.has_multitexture() {
        draw_texture_chains(ctx, api, world);
        r_blend_lightmaps(ctx, api, world);
    }

    let result = r_update_dynamic(ctx, api, world);
    api.set_blend(BlendMode::Opaque);
    result
}

/// Draw the translucent faces collected during traversal, back to front.
pub fn r_draw_alpha_surfaces<A: GraphicsApi + ?Sized>(ctx: &mut RenderContext, api: &mut A, world: &World) {
    if ctx.chains.alpha.is_empty() {
        return;
    }
    let alpha = mem::take(&mut ctx.chains.alpha);

    for r in alpha.iter().rev() {
        let tile = &world.tiles[r.tile];
        let surf = &tile.surfaces[r.surf];
        api.set_blend(BlendMode::Alpha(alpha_for(tile.texinfo[surf.texinfo].flags)));
        r_render_brush_poly(ctx, api, tile, &world.images, surf, &ORIGIN);
        ctx.stats.alpha_surfaces += 1;
    }
    api.set_blend(BlendMode::Opaque);

    ctx.chains.alpha = alpha;
}

// ============================================================
// Brush models
// ============================================================

/// Draw an inline model placed at `e.origin`, skipping faces turned away
/// from the viewer. Faces touched by a light are relit like world faces.
pub fn r_draw_brush_model<A: GraphicsApi + ?Sized>(
    ctx: &mut RenderContext,
    api: &mut A,
    world: &mut World,
    e: &Entity,
) -> Result<(), LightmapError> {
    let Some(tile) = world.tiles.get_mut(e.tile) else {
        com_dprintf(&format!("r_draw_brush_model: bad tile {}\n", e.tile));
        return Ok(());
    };
    let Some(&model) = tile.submodels.get(e.model) else {
        com_dprintf(&format!("r_draw_brush_model: bad model {} in {}\n", e.model, tile.name));
        return Ok(());
    };
    if model.numfaces == 0 {
        return Ok(());
    }

    let mins = vector_add(&e.origin, &model.mins);
    let maxs = vector_add(&e.origin, &model.maxs);
    if r_cull_box(ctx, &mins, &maxs) {
        return Ok(());
    }
    ctx.stats.brush_models += 1;

    // lights move into the model's frame
    let lights: Vec<DLight> = ctx
        .dlights
        .iter()
        .map(|dl| DLight { origin: vector_subtract(&dl.origin, &e.origin), ..*dl })
        .collect();
    let blend_lightmaps = !ctx.config.fullbright;
    if ctx.config.dynamic && blend_lightmaps {
        for (i, dl) in lights.iter().enumerate() {
            r_mark_lights(tile, dl, 1 << i, NodeRef::Node(model.headnode), ctx.framecount);
        }
    }

    let tile = &world.tiles[e.tile];
    let modelorg = vector_subtract(&ctx.origin, &e.origin);
    let multitexture = api.has_multitexture();
    let mut lightmap_pass = Vec::new();
    let mut dynamic = Vec::new();

    for s in model.firstface..model.firstface + model.numfaces {
        let surf = &tile.surfaces[s];
        let plane = &tile.planes[surf.plane];
        let dot = dot_product(&modelorg, &plane.normal) - plane.dist;

        // draw the polygon if it faces the viewer
        let back = surf.flags.contains(SurfFlags::PLANEBACK);
        if !((back && dot < -BACKFACE_EPSILON) || (!back && dot > BACKFACE_EPSILON)) {
            continue;
        }

        let flags = tile.texinfo[surf.texinfo].flags;
        let relight = blend_lightmaps
            && surface_is_dynamic(surf, flags, &ctx.lightstyles, ctx.framecount, ctx.config.dynamic);

        if flags.intersects(TexFlags::TRANSLUCENT) {
            api.set_blend(BlendMode::Alpha(alpha_for(flags)));
            r_render_brush_poly(ctx, api, tile, &world.images, surf, &e.origin);
            api.set_blend(BlendMode::Opaque);
            ctx.stats.alpha_surfaces += 1;
        } else if multitexture && blend_lightmaps && surf.lightmap.is_some() {
            if relight {
                dynamic.push(SurfRef { tile: e.tile, surf: s });
            } else {
                render_lightmapped_poly(ctx, api, tile, &world.images, surf, &e.origin);
            }
        } else {
            r_render_brush_poly(ctx, api, tile, &world.images, surf, &e.origin);
            if relight {
                dynamic.push(SurfRef { tile: e.tile, surf: s });
            } else if blend_lightmaps && surf.lightmap.is_some() {
                lightmap_pass.push(s);
            }
        }
    }

    if !lightmap_pass.is_empty() {
        api.set_blend(BlendMode::Lightmap);
        for s in lightmap_pass {
            let surf = &tile.surfaces[s];
            let Some(handle) = surf.lightmap.and_then(|b| ctx.lightmaps.pages.get(b.page).copied()) else {
                continue;
            };
            ctx.bind(api, TextureUnit::Lightmap, handle);
            draw_surface_polys(ctx, api, surf, 0.0, &e.origin, TexLayers::Lightmap);
        }
        api.set_blend(BlendMode::Opaque);
    }

    if dynamic.is_empty() {
        return Ok(());
    }
    let result = r_relight_queue(ctx, api, world, &dynamic, &lights, &e.origin);
    api.set_blend(BlendMode::Opaque);
    result
}

// ============================================================
// Tests
// ============================================================
