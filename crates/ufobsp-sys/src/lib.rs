// Headless driver for the tile renderer: a counting graphics backend, a
// disk texture cache and the viewer loop behind `ufobsp-view`.

pub mod backend;
pub mod textures;
pub mod viewer;
