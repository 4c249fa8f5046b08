#![allow(clippy::too_many_arguments, clippy::needless_range_loop, clippy::manual_range_contains,
         clippy::float_cmp, clippy::comparison_chain)]
// Static geometry renderer for tiled BSP maps: tile loading, surface
// polygons, lightmap atlas, dynamic lighting and front-to-back traversal.
// Drawing goes through the `qgl::GraphicsApi` seam.

pub mod qgl;
pub mod r_error;
pub mod r_model_types;
pub mod r_image;
pub mod r_light;
pub mod r_lightmap;
pub mod r_warp;
pub mod r_model;
pub mod r_rsurf;
pub mod r_rmain;
pub mod r_tiles;

#[cfg(test)]
mod test_support;
