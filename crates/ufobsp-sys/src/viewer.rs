// viewer.rs — load a world and fly a camera around it

use thiserror::Error;

use ufobsp_common::common::com_printf;
use ufobsp_common::cvar::CvarContext;
use ufobsp_common::files::{FileLoader, FileSystem};
use ufobsp_common::q_shared::{Vec3, CVAR_ARCHIVE};
use ufobsp_renderer::r_error::{LightmapError, LoadError};
use ufobsp_renderer::r_light::DLight;
use ufobsp_renderer::r_model::tile_texture_paths;
use ufobsp_renderer::r_rmain::{r_render_frame, RefDef, RenderContext};
use ufobsp_renderer::r_tiles::{r_begin_loading, tile_names, World};

use crate::backend::CountingApi;
use crate::textures::DiskTextures;

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("usage: ufobsp-view [+set <var> <value> ...] <basedir> <tiles> [positions]")]
    Usage,
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Render(#[from] LightmapError),
    #[error("couldn't write config: {0}")]
    Config(#[from] std::io::Error),
}

pub fn view_register(cvars: &mut CvarContext) {
    cvars.get("view_frames", "8", 0);
    cvars.get("view_height", "256", 0);
    cvars.get("view_pitch", "45", 0);
    cvars.get("view_dlight", "1", 0);
    cvars.get("view_worldlevel", "7", 0);
    cvars.get("view_lists", "0", 0);
    cvars.get("view_config", "", 0);
    cvars.get("gl_ext_multitexture", "1", CVAR_ARCHIVE);
}

/// Smallest box holding every tile's world model.
pub fn world_bounds(world: &World) -> (Vec3, Vec3) {
    let mut mins = [f32::MAX; 3];
    let mut maxs = [f32::MIN; 3];
    for m in world.tiles.iter().filter_map(|t| t.submodels.first()) {
        for i in 0..3 {
            mins[i] = mins[i].min(m.mins[i]);
            maxs[i] = maxs[i].max(m.maxs[i]);
        }
    }
    (mins, maxs)
}

/// Texture paths of every tile in the list that can be read.
fn world_texture_paths<L: FileLoader + ?Sized>(fs: &L, tiles: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in tile_names(tiles) {
        let Some(buf) = fs.load_file(&format!("maps/{}.bsp", name)) else {
            continue;
        };
        for p in tile_texture_paths(&buf) {
            if !out.contains(&p) {
                out.push(p);
            }
        }
    }
    out
}

/// What a run produced, for callers that want more than the log.
#[derive(Debug, Default)]
pub struct ViewSummary {
    pub tiles: usize,
    pub textures: usize,
    pub frames: usize,
    pub polys: usize,
}

/// Parse the command line, load the world and render the configured number
/// of frames, each turned a bit further around the world's centre.
pub fn run<I, S>(args: I) -> Result<ViewSummary, ViewError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut ctx = RenderContext::new();
    view_register(&mut ctx.cvars);
    let rest = ctx.cvars.set_from_args(args);

    let (basedir, tiles, positions) = match rest.as_slice() {
        [b, t] => (b.as_str(), t.as_str(), ""),
        [b, t, p] => (b.as_str(), t.as_str(), p.as_str()),
        _ => return Err(ViewError::Usage),
    };

    let mut fs = FileSystem::new();
    fs.add_search_dir(basedir);

    let mut api = CountingApi::new(ctx.cvars.variable_value("gl_ext_multitexture") != 0.0);
    let mut textures = DiskTextures::new();
    let paths = world_texture_paths(&fs, tiles);
    textures.preload(&mut api, &fs, &paths);

    let mut world = r_begin_loading(&mut ctx, &mut api, &mut textures, &fs, tiles, positions)?;
    world.tile_list_f();
    if ctx.cvars.variable_value("view_lists") != 0.0 {
        fs.path_f();
        world.images.image_list_f();
        ctx.cvars.list(None);
    }
    api.end_frame();

    let (mins, maxs) = world_bounds(&world);
    let centre: Vec3 = std::array::from_fn(|i| (mins[i] + maxs[i]) * 0.5);
    let radius = (0..2).map(|i| (maxs[i] - mins[i]) * 0.5).fold(0.0f32, f32::max);
    let height = ctx.cvars.variable_value("view_height");
    let pitch = ctx.cvars.variable_value("view_pitch");
    let frames = ctx.cvars.variable_value("view_frames").max(1.0) as usize;

    let mut summary = ViewSummary { tiles: world.tiles.len(), textures: textures.len(), frames, polys: 0 };

    for frame in 0..frames {
        let yaw = 360.0 * frame as f32 / frames as f32;
        let (s, c) = yaw.to_radians().sin_cos();
        // stand on the circle around the centre and look inwards
        let vieworg = [centre[0] - c * radius, centre[1] - s * radius, maxs[2] + height];

        let mut fd = RefDef {
            vieworg,
            viewangles: [pitch, yaw, 0.0],
            time: frame as f32 * 0.1,
            worldlevel: ctx.cvars.variable_value("view_worldlevel") as i32,
            ..RefDef::default()
        };
        if ctx.cvars.variable_value("view_dlight") != 0.0 {
            fd.dlights.push(DLight { origin: centre, color: [1.0, 0.8, 0.6], intensity: 200.0 });
        }

        let stats = r_render_frame(&mut ctx, &mut api, &mut world, &fd)?;
        let counters = api.end_frame();
        log::debug!("frame {}: {} binds, {} sub images", frame, counters.binds, counters.sub_images);
        stats.print();
        summary.polys += stats.polys;
    }

    api.print_totals();
    com_printf(&format!("{} frames, {} polys\n", summary.frames, summary.polys));

    let config = ctx.cvars.variable_string("view_config").to_string();
    if !config.is_empty() {
        let mut f = std::fs::File::create(&config)?;
        ctx.cvars.write_variables(&mut f)?;
    }
    Ok(summary)
}
