// r_rmain.rs — frame setup, view frustum and the render context
//
// All state that lives across frames (cvars, lightmap pages, chains, the
// frame counter, bound textures) sits in `RenderContext`. A frame is set up
// from a `RefDef`, the world is walked and drawn, then the stats for that
// frame are handed back.

use ufobsp_common::common::com_printf;
use ufobsp_common::cvar::CvarContext;
use ufobsp_common::q_shared::{
    angle_vectors, box_on_plane_side, dot_product, rotate_point_around_vector, signbits_for_plane,
    vector_scale, CPlane, Vec3, CVAR_ARCHIVE, CVAR_LATCH, CVAR_ZERO, MAX_LIGHTSTYLES, PLANE_ANYZ,
    RDF_NOWORLDMODEL,
};
use ufobsp_common::qfiles::MAX_LIGHTQUANT;

use crate::qgl::{BlendMode, GraphicsApi, PolyVert, TextureHandle, TextureUnit};
use crate::r_error::LightmapError;
use crate::r_light::{r_push_dlights, DLight, LightStyle, MAX_DLIGHTS};
use crate::r_lightmap::LightmapState;
use crate::r_rsurf::{r_draw_alpha_surfaces, r_draw_brush_model, r_draw_world, SurfaceChains};
use crate::r_tiles::World;

/// Deadband for plane side tests.
pub const BACKFACE_EPSILON: f32 = 0.01;

const MAX_LIGHTMAP_SIZE: i32 = 1024;

// ============================================================
// Configuration
// ============================================================

/// Snapshot of the cvars the renderer reads, taken once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    /// lightmap page width and height, latched
    pub lightmap_size: i32,
    pub default_lightquant: u8,
    pub modulate: f32,
    pub dynamic: bool,
    pub waterwave: f32,
    pub nocull: bool,
    pub drawworld: bool,
    pub fullbright: bool,
    pub isometric: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            lightmap_size: 256,
            default_lightquant: 4,
            modulate: 1.0,
            dynamic: true,
            waterwave: 0.0,
            nocull: false,
            drawworld: true,
            fullbright: false,
            isometric: false,
        }
    }
}

/// Largest power of two not above `v`, kept within `1..=1024`.
fn lightmap_size_from(v: f32) -> i32 {
    let v = (v as i32).clamp(1, MAX_LIGHTMAP_SIZE);
    1 << (31 - v.leading_zeros())
}

impl RenderConfig {
    pub fn from_cvars(cvars: &CvarContext) -> Self {
        Self {
            lightmap_size: lightmap_size_from(cvars.variable_value("gl_lightmap_size")),
            default_lightquant: cvars.variable_value("r_default_lightquant").clamp(0.0, MAX_LIGHTQUANT as f32) as u8,
            modulate: cvars.variable_value("gl_modulate"),
            dynamic: cvars.variable_value("gl_dynamic") != 0.0,
            waterwave: cvars.variable_value("r_waterwave"),
            nocull: cvars.variable_value("r_nocull") != 0.0,
            drawworld: cvars.variable_value("r_drawworld") != 0.0,
            fullbright: cvars.variable_value("r_fullbright") != 0.0,
            isometric: cvars.variable_value("r_isometric") != 0.0,
        }
    }
}

pub fn r_register(cvars: &mut CvarContext) {
    cvars.get("gl_lightmap_size", "256", CVAR_ARCHIVE | CVAR_LATCH);
    cvars.get("r_default_lightquant", "4", CVAR_ZERO);
    cvars.get("gl_modulate", "1", CVAR_ARCHIVE);
    cvars.get("gl_dynamic", "1", CVAR_ARCHIVE);
    cvars.get("r_waterwave", "0", CVAR_ARCHIVE);
    cvars.get("r_nocull", "0", CVAR_ZERO);
    cvars.get("r_drawworld", "1", CVAR_ZERO);
    cvars.get("r_fullbright", "0", CVAR_ZERO);
    cvars.get("r_isometric", "0", CVAR_ARCHIVE);
}

// ============================================================
// Frame input and output
// ============================================================

/// An inline brush model placed in the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entity {
    pub tile: usize,
    /// submodel index within the tile
    pub model: usize,
    pub origin: Vec3,
}

/// Everything the caller decides about one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RefDef {
    pub width: u32,
    pub height: u32,
    pub fov_x: f32,
    pub fov_y: f32,
    pub vieworg: Vec3,
    pub viewangles: Vec3,
    /// seconds, drives animation, warps and scrolling
    pub time: f32,
    pub rdflags: i32,
    /// highest level shown; selects which level brushes are drawn
    pub worldlevel: i32,
    pub lightstyles: Vec<LightStyle>,
    pub dlights: Vec<DLight>,
    pub entities: Vec<Entity>,
}

impl Default for RefDef {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fov_x: 90.0,
            fov_y: 73.74,
            vieworg: [0.0; 3],
            viewangles: [0.0; 3],
            time: 0.0,
            rdflags: 0,
            worldlevel: 0,
            lightstyles: Vec::new(),
            dlights: Vec::new(),
            entities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub leafs_visited: usize,
    /// (tile, leaf) in traversal order
    pub visible_leafs: Vec<(usize, usize)>,
    pub nodes_culled: usize,
    pub polys: usize,
    pub texture_switches: usize,
    /// lightmap pages blended in the two-pass path
    pub lightmap_pages: usize,
    pub alpha_surfaces: usize,
    pub warp_surfaces: usize,
    pub brush_models: usize,
    pub dynamic_faces: usize,
    pub dynamic_flushes: usize,
}

impl FrameStats {
    pub fn print(&self) {
        com_printf(&format!(
            "{:4} leafs {:5} polys {:3} tex {:3} lm pages {:3} dlit {:2} flushes {:3} alpha {:3} warp\n",
            self.leafs_visited,
            self.polys,
            self.texture_switches,
            self.lightmap_pages,
            self.dynamic_faces,
            self.dynamic_flushes,
            self.alpha_surfaces,
            self.warp_surfaces,
        ));
    }
}

// ============================================================
// Context
// ============================================================

#[derive(Debug)]
pub struct RenderContext {
    pub cvars: CvarContext,
    pub config: RenderConfig,
    pub lightmaps: LightmapState,
    pub chains: SurfaceChains,

    pub framecount: i32,
    pub frustum: [CPlane; 4],
    pub origin: Vec3,
    pub vpn: Vec3,
    pub vright: Vec3,
    pub vup: Vec3,

    pub time: f32,
    pub rdflags: i32,
    pub worldlevel: i32,
    pub lightstyles: Vec<LightStyle>,
    pub dlights: Vec<DLight>,

    pub stats: FrameStats,

    bound: [Option<TextureHandle>; 2],
    /// vertex scratch reused by every draw
    pub(crate) scratch: Vec<PolyVert>,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderContext {
    pub fn new() -> Self {
        let mut cvars = CvarContext::new();
        r_register(&mut cvars);
        let config = RenderConfig::from_cvars(&cvars);
        Self {
            cvars,
            config,
            lightmaps: LightmapState::new(config.lightmap_size),
            chains: SurfaceChains::default(),
            framecount: 0,
            frustum: [CPlane::default(); 4],
            origin: [0.0; 3],
            vpn: [1.0, 0.0, 0.0],
            vright: [0.0, -1.0, 0.0],
            vup: [0.0, 0.0, 1.0],
            time: 0.0,
            rdflags: 0,
            worldlevel: 0,
            lightstyles: Vec::with_capacity(MAX_LIGHTSTYLES),
            dlights: Vec::with_capacity(MAX_DLIGHTS),
            stats: FrameStats::default(),
            bound: [None; 2],
            scratch: Vec::new(),
        }
    }

    /// Re-read the cvars.
    pub fn refresh_config(&mut self) {
        self.config = RenderConfig::from_cvars(&self.cvars);
    }

    /// Bind `handle` on `unit` unless it is already bound there.
    pub fn bind<A: GraphicsApi + ?Sized>(&mut self, api: &mut A, unit: TextureUnit, handle: TextureHandle) {
        let slot = &mut self.bound[unit as usize];
        if *slot == Some(handle) {
            return;
        }
        *slot = Some(handle);
        api.bind(unit, handle);
        if unit == TextureUnit::Base {
            self.stats.texture_switches += 1;
        }
    }

    /// Forget what is bound; the next `bind` always reaches the api.
    pub fn invalidate_bindings(&mut self) {
        self.bound = [None; 2];
    }
}

// ============================================================
// Frustum
// ============================================================

pub fn r_set_frustum(ctx: &mut RenderContext, fd: &RefDef) {
    let normals: [Vec3; 4] = if ctx.config.isometric {
        [
            ctx.vright,
            vector_scale(&ctx.vright, -1.0),
            ctx.vup,
            vector_scale(&ctx.vup, -1.0),
        ]
    } else {
        [
            // rotate VPN right by FOV_X/2 degrees
            rotate_point_around_vector(&ctx.vup, &ctx.vpn, -(90.0 - fd.fov_x / 2.0)),
            // rotate VPN left by FOV_X/2 degrees
            rotate_point_around_vector(&ctx.vup, &ctx.vpn, 90.0 - fd.fov_x / 2.0),
            // rotate VPN up by FOV_Y/2 degrees
            rotate_point_around_vector(&ctx.vright, &ctx.vpn, 90.0 - fd.fov_y / 2.0),
            // rotate VPN down by FOV_Y/2 degrees
            rotate_point_around_vector(&ctx.vright, &ctx.vpn, -(90.0 - fd.fov_y / 2.0)),
        ]
    };

    // the isometric view is a box around the origin, fov_x scales its size
    let half_w = 10.0 * fd.fov_x;
    let half_h = if fd.width > 0 { half_w * fd.height as f32 / fd.width as f32 } else { half_w };

    for (i, normal) in normals.into_iter().enumerate() {
        let mut dist = dot_product(&ctx.origin, &normal);
        if ctx.config.isometric {
            dist -= if i < 2 { half_w } else { half_h };
        }
        let mut p = CPlane { normal, dist, plane_type: PLANE_ANYZ, signbits: 0 };
        p.signbits = signbits_for_plane(&p);
        ctx.frustum[i] = p;
    }
}

/// Returns true if the box is completely outside the frustum.
pub fn r_cull_box(ctx: &RenderContext, mins: &Vec3, maxs: &Vec3) -> bool {
    if ctx.config.nocull {
        return false;
    }
    ctx.frustum.iter().any(|p| box_on_plane_side(mins, maxs, p) == 2)
}

// ============================================================
// Frame
// ============================================================

fn r_setup_frame(ctx: &mut RenderContext, fd: &RefDef) {
    ctx.framecount += 1;

    ctx.origin = fd.vieworg;
    let (forward, right, up) = angle_vectors(&fd.viewangles);
    ctx.vpn = forward;
    ctx.vright = right;
    ctx.vup = up;

    ctx.time = fd.time;
    ctx.rdflags = fd.rdflags;
    ctx.worldlevel = fd.worldlevel;

    ctx.lightstyles.clear();
    ctx.lightstyles.extend(fd.lightstyles.iter().take(MAX_LIGHTSTYLES));
    ctx.dlights.clear();
    ctx.dlights.extend(fd.dlights.iter().take(MAX_DLIGHTS));

    ctx.stats = FrameStats::default();
    ctx.chains.clear();
    ctx.invalidate_bindings();
}

/// Draw one frame of `world` as seen from `fd`.
pub fn r_render_frame<A: GraphicsApi + ?Sized>(
    ctx: &mut RenderContext,
    api: &mut A,
    world: &mut World,
    fd: &RefDef,
) -> Result<FrameStats, LightmapError> {
    ctx.refresh_config();
    r_setup_frame(ctx, fd);
    r_set_frustum(ctx, fd);

    api.set_blend(BlendMode::Opaque);

    let draw_world = ctx.config.drawworld && ctx.rdflags & RDF_NOWORLDMODEL == 0;
    if draw_world {
        if ctx.config.dynamic {
            r_push_dlights(&mut world.tiles, &ctx.dlights, ctx.worldlevel, ctx.framecount);
        }
        r_draw_world(ctx, api, world)?;
    }

    for e in &fd.entities {
        r_draw_brush_model(ctx, api, world, e)?;
    }

    r_draw_alpha_surfaces(ctx, api, world);

    Ok(std::mem::take(&mut ctx.stats))
}

// ============================================================
// Tests
// ============================================================
