// textures.rs — texture files on disk
//
// Textures are decoded ahead of loading, in parallel, then uploaded in
// order. The renderer's lookups are then served from the cache.

use std::collections::HashMap;

use image::ImageFormat;
use rayon::prelude::*;

use ufobsp_common::common::{com_dprintf, com_wprintf};
use ufobsp_common::files::FileLoader;
use ufobsp_renderer::qgl::{GraphicsApi, PixelFormat, TextureHandle, TextureResolver};

/// Tried in this order for a path without extension.
const EXTENSIONS: [(&str, ImageFormat); 3] =
    [("tga", ImageFormat::Tga), ("png", ImageFormat::Png), ("jpg", ImageFormat::Jpeg)];

#[derive(Debug)]
pub struct DecodedImage {
    pub name: String,
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

fn load_image(raw: &[u8], format: ImageFormat) -> Option<(Vec<u8>, u32, u32)> {
    let img = image::load_from_memory_with_format(raw, format).ok()?;
    let rgba = img.to_rgba8();
    let width = rgba.width();
    let height = rgba.height();
    Some((rgba.into_raw(), width, height))
}

/// Find and decode the first image file for `name`.
pub fn decode_texture<L: FileLoader + ?Sized>(fs: &L, name: &str) -> Option<DecodedImage> {
    for (ext, format) in EXTENSIONS {
        let path = format!("{}.{}", name, ext);
        let Some(raw) = fs.load_file(&path) else {
            continue;
        };
        match load_image(&raw, format) {
            Some((pixels, width, height)) => {
                return Some(DecodedImage { name: name.to_string(), pixels, width, height });
            }
            None => com_wprintf(&format!("bad image file {}\n", path)),
        }
    }
    None
}

/// Decode `names` in parallel. Results line up with `names`.
pub fn decode_textures_ordered<L>(fs: &L, names: &[String]) -> Vec<Option<DecodedImage>>
where
    L: FileLoader + Sync + ?Sized,
{
    names.par_iter().map(|n| decode_texture(fs, n)).collect()
}

/// Uploaded textures by game path.
#[derive(Debug, Default)]
pub struct DiskTextures {
    cache: HashMap<String, (TextureHandle, u32, u32)>,
}

impl DiskTextures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Decode and upload every path not cached yet. Returns how many were
    /// loaded.
    pub fn preload<A, L>(&mut self, api: &mut A, fs: &L, paths: &[String]) -> usize
    where
        A: GraphicsApi + ?Sized,
        L: FileLoader + Sync + ?Sized,
    {
        let to_load: Vec<String> = paths.iter().filter(|p| !self.cache.contains_key(*p)).cloned().collect();
        if to_load.is_empty() {
            return 0;
        }

        let mut loaded = 0;
        for tex in decode_textures_ordered(fs, &to_load).into_iter().flatten() {
            let handle = api.create_texture(tex.width, tex.height, PixelFormat::Rgba8);
            api.upload_texture(handle, tex.width, tex.height, &tex.pixels);
            com_dprintf(&format!("loaded {} ({}x{})\n", tex.name, tex.width, tex.height));
            self.cache.insert(tex.name, (handle, tex.width, tex.height));
            loaded += 1;
        }
        loaded
    }
}

impl TextureResolver for DiskTextures {
    fn find_image(&mut self, path: &str) -> Option<(TextureHandle, u32, u32)> {
        self.cache.get(path).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CountingApi;
    use image::{Rgba, RgbaImage};
    use std::fs;
    use ufobsp_common::files::FileSystem;

    fn write_png(dir: &std::path::Path, name: &str, w: u32, h: u32) {
        let path = dir.join(format!("{}.png", name));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255])).save(&path).unwrap();
    }

    #[test]
    fn test_preload_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "textures/town/wall", 32, 16);
        write_png(dir.path(), "textures/town/floor", 8, 8);
        let mut fs = FileSystem::new();
        fs.add_search_dir(dir.path());

        let mut api = CountingApi::new(true);
        let mut tex = DiskTextures::new();
        let paths: Vec<String> =
            ["textures/town/wall", "textures/town/floor", "textures/town/missing"].iter().map(|s| s.to_string()).collect();
        assert_eq!(tex.preload(&mut api, &fs, &paths), 2);
        assert_eq!(api.frame.uploads, 2);

        let (h, w, hgt) = tex.find_image("textures/town/wall").unwrap();
        assert_eq!((w, hgt), (32, 16));
        assert_eq!(api.texture_size(h), Some((32, 16)));
        assert!(tex.find_image("textures/town/missing").is_none());

        // cached paths are not decoded again
        assert_eq!(tex.preload(&mut api, &fs, &paths[..1]), 0);
    }

    #[test]
    fn test_decode_order_follows_names() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..8 {
            write_png(dir.path(), &format!("t{}", i), i + 1, 1);
        }
        let mut fs = FileSystem::new();
        fs.add_search_dir(dir.path());

        let names: Vec<String> = (0..8).rev().map(|i| format!("t{}", i)).collect();
        let decoded = decode_textures_ordered(&fs, &names);
        for (name, img) in names.iter().zip(&decoded) {
            let img = img.as_ref().unwrap();
            assert_eq!(&img.name, name);
            assert_eq!(img.pixels.len(), (img.width * 4) as usize);
        }
    }

    #[test]
    fn test_corrupt_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.tga"), b"not an image").unwrap();
        write_png(dir.path(), "bad", 2, 2);
        let mut fs = FileSystem::new();
        fs.add_search_dir(dir.path());

        // the broken tga is passed over for the png
        let img = decode_texture(&fs, "bad").unwrap();
        assert_eq!((img.width, img.height), (2, 2));
    }
}
