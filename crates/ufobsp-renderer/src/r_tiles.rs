// r_tiles.rs — assembling a world out of map tiles
//
// A world is a list of tiles, each loaded from its own map file and moved
// to its place on the grid. All tiles share one texture table and one set of
// lightmap pages.

use ufobsp_common::common::{com_dprintf, com_parse, com_printf};
use ufobsp_common::files::FileLoader;
use ufobsp_common::q_shared::{Vec3, UNIT_SIZE};

use crate::qgl::{GraphicsApi, TextureResolver};
use crate::r_error::LoadError;
use crate::r_image::ImageTable;
use crate::r_model::mod_load_brush_model;
use crate::r_model_types::Tile;
use crate::r_rmain::RenderContext;
use crate::r_rsurf::SurfaceChains;

pub const MAX_MAPTILES: usize = 512;

#[derive(Debug)]
pub struct World {
    pub tiles: Vec<Tile>,
    pub images: ImageTable,
}

impl World {
    /// Print name, shift and size of every tile.
    pub fn tile_list_f(&self) {
        for (i, t) in self.tiles.iter().enumerate() {
            com_printf(&format!(
                "{:3} {} ({} {} {}) {} faces {} leafs\n",
                i,
                t.name,
                t.shift[0],
                t.shift[1],
                t.shift[2],
                t.surfaces.len(),
                t.leafs.len()
            ));
        }
    }
}

fn r_add_map_tile<A, R, L>(
    ctx: &mut RenderContext,
    api: &mut A,
    resolver: &mut R,
    loader: &L,
    world: &mut World,
    name: &str,
    shift: Vec3,
) -> Result<(), LoadError>
where
    A: GraphicsApi + ?Sized,
    R: TextureResolver + ?Sized,
    L: FileLoader + ?Sized,
{
    if world.tiles.len() >= MAX_MAPTILES {
        return Err(LoadError::TooManyTiles);
    }

    let path = format!("maps/{}.bsp", name);
    let buf = loader.load_file(&path).ok_or_else(|| LoadError::NotFound(path.clone()))?;

    let config = ctx.config;
    let tile = mod_load_brush_model(api, resolver, &mut world.images, &mut ctx.lightmaps, &config, &path, &buf, shift)?;
    world.tiles.push(tile);
    Ok(())
}

/// Expand a tile list into tile names. `-path` sets a prefix that following
/// `+name` entries are appended to; anything else is used as is.
pub fn tile_names(tiles: &str) -> Vec<String> {
    let mut names = tiles;
    let mut base = String::new();
    let mut out = Vec::new();

    while let Some(token) = com_parse(&mut names) {
        // get base path
        if let Some(b) = token.strip_prefix('-') {
            base = b.to_string();
            continue;
        }
        match token.strip_prefix('+') {
            Some(n) => out.push(format!("{}{}", base, n)),
            None => out.push(token),
        }
    }
    out
}

/// Load the world described by a tile list and a position list.
///
/// `tiles` is expanded by [`tile_names`]. Each tile takes two grid positions
/// from `positions`; when `positions` is empty only the first tile is
/// loaded, at the origin.
pub fn r_begin_loading<A, R, L>(
    ctx: &mut RenderContext,
    api: &mut A,
    resolver: &mut R,
    loader: &L,
    tiles: &str,
    positions: &str,
) -> Result<World, LoadError>
where
    A: GraphicsApi + ?Sized,
    R: TextureResolver + ?Sized,
    L: FileLoader + ?Sized,
{
    // a new map picks up latched settings such as the lightmap page size
    ctx.cvars.get_latched_vars();
    ctx.refresh_config();

    let mut world = World { tiles: Vec::new(), images: ImageTable::new(api) };
    ctx.lightmaps.begin_building(api, ctx.config.lightmap_size);
    ctx.chains = SurfaceChains::default();
    ctx.framecount = 1;

    let use_positions = !positions.trim().is_empty();
    let mut pos = positions;

    for name in tile_names(tiles) {
        if !use_positions {
            // load only a single tile, if no positions are specified
            r_add_map_tile(ctx, api, resolver, loader, &mut world, &name, [0.0; 3])?;
            break;
        }

        let mut sh = [0i32; 2];
        for s in sh.iter_mut() {
            *s = com_parse(&mut pos)
                .and_then(|t| t.parse().ok())
                .ok_or(LoadError::InvalidPositions)?;
        }
        let shift = [(sh[0] * UNIT_SIZE) as f32, (sh[1] * UNIT_SIZE) as f32, 0.0];
        r_add_map_tile(ctx, api, resolver, loader, &mut world, &name, shift)?;
    }

    if world.tiles.is_empty() {
        return Err(LoadError::InvalidTileNames);
    }

    ctx.lightmaps.end_building(api)?;
    com_dprintf(&format!("{} tiles, {} images\n", world.tiles.len(), world.images.len()));
    Ok(world)
}

// ============================================================
// Tests
// ============================================================
