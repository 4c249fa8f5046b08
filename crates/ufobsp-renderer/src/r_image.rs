// r_image.rs — texture registry shared by every tile of a world

use std::collections::HashMap;

use ufobsp_common::common::com_printf;

use crate::qgl::{GraphicsApi, PixelFormat, TextureResolver};
use crate::r_model_types::Image;

pub const NOTEXTURE_NAME: &str = "***r_notexture***";
/// Index of the placeholder in every table.
pub const NOTEXTURE: usize = 0;

const NOTEXTURE_SIZE: u32 = 16;

/// Red and black checker used when a texture cannot be found.
fn notexture_pixels() -> Vec<u8> {
    let mut data = Vec::with_capacity((NOTEXTURE_SIZE * NOTEXTURE_SIZE * 4) as usize);
    for y in 0..NOTEXTURE_SIZE {
        for x in 0..NOTEXTURE_SIZE {
            let on = ((x >> 2) ^ (y >> 2)) & 1 == 0;
            data.extend_from_slice(&[if on { 255 } else { 0 }, 0, 0, 255]);
        }
    }
    data
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageTable {
    images: Vec<Image>,
    index: HashMap<String, usize>,
}

impl ImageTable {
    /// Create the table with its placeholder texture.
    pub fn new<A: GraphicsApi + ?Sized>(api: &mut A) -> Self {
        let handle = api.create_texture(NOTEXTURE_SIZE, NOTEXTURE_SIZE, PixelFormat::Rgba8);
        api.upload_texture(handle, NOTEXTURE_SIZE, NOTEXTURE_SIZE, &notexture_pixels());

        let placeholder = Image {
            name: NOTEXTURE_NAME.to_string(),
            handle,
            width: NOTEXTURE_SIZE,
            height: NOTEXTURE_SIZE,
        };
        let mut index = HashMap::new();
        index.insert(placeholder.name.clone(), NOTEXTURE);
        Self { images: vec![placeholder], index }
    }

    /// Index of the image for `path`, resolving it on first use. `None`
    /// when the resolver does not know it.
    pub fn find_image<R: TextureResolver + ?Sized>(&mut self, resolver: &mut R, path: &str) -> Option<usize> {
        if let Some(&i) = self.index.get(path) {
            return Some(i);
        }
        let (handle, width, height) = resolver.find_image(path)?;
        let i = self.images.len();
        self.images.push(Image { name: path.to_string(), handle, width, height });
        self.index.insert(path.to_string(), i);
        Some(i)
    }

    #[inline]
    pub fn get(&self, i: usize) -> &Image {
        &self.images[i]
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn as_slice(&self) -> &[Image] {
        &self.images
    }

    /// Print every registered texture.
    pub fn image_list_f(&self) {
        let mut texels = 0u64;
        for img in &self.images {
            texels += img.width as u64 * img.height as u64;
            com_printf(&format!("{:4} {:4}: {}\n", img.width, img.height, img.name));
        }
        com_printf(&format!("Total texel count (not counting mipmaps): {}\n", texels));
    }
}
