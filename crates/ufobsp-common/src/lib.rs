#![allow(clippy::too_many_arguments, clippy::needless_range_loop, clippy::manual_range_contains,
         clippy::float_cmp, clippy::comparison_chain)]
// Shared math, on-disk BSP format, console variables and file access
// used by the renderer and the viewer.

pub mod q_shared;
pub mod qfiles;
pub mod common;
pub mod cvar;
pub mod files;
