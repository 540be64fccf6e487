//! Photo images: named RGBA pixel surfaces.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use crate::error::{Result, ScriptError};
use crate::interp::Interp;
use crate::obj::Obj;

/// Identifies an existing photo image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoHandle {
    name: String,
}

impl PhotoHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A block of pixels to copy into a photo.
///
/// Pixel `(x, y)` starts at byte `y * pitch + x * pixel_size`; its red,
/// green, blue and alpha bytes sit at the given offsets from there.
#[derive(Debug, Clone, Copy)]
pub struct PhotoBlock<'a> {
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub pitch: usize,
    pub pixel_size: usize,
    pub offsets: [usize; 4],
}

impl PhotoBlock<'_> {
    fn validate(&self) -> Result<()> {
        if self.offsets.iter().any(|&offset| offset >= self.pixel_size) {
            return Err(ScriptError::new("pixel offsets exceed the pixel size"));
        }
        if self.width == 0 || self.height == 0 {
            return Ok(());
        }
        let needed = self.pitch * (self.height as usize - 1) + self.width as usize * self.pixel_size;
        if self.pixels.len() < needed || self.pitch < self.width as usize * self.pixel_size {
            return Err(ScriptError::new(
                "pixel block is smaller than its dimensions",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct Photo {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Photo {
    fn grow_to(&mut self, width: u32, height: u32) {
        if width <= self.width && height <= self.height {
            return;
        }
        let new_width = width.max(self.width);
        let new_height = height.max(self.height);
        let mut pixels = vec![0u8; new_width as usize * new_height as usize * 4];
        let old_row = self.width as usize * 4;
        for row in 0..self.height as usize {
            let src = row * old_row;
            let dst = row * new_width as usize * 4;
            pixels[dst..dst + old_row].copy_from_slice(&self.pixels[src..src + old_row]);
        }
        self.width = new_width;
        self.height = new_height;
        self.pixels = pixels;
    }

    fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y as usize * self.width as usize + x as usize) * 4;
        let mut rgba = [0u8; 4];
        rgba.copy_from_slice(&self.pixels[at..at + 4]);
        Some(rgba)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Photos {
    images: RefCell<BTreeMap<String, Photo>>,
    next_id: Cell<u32>,
}

impl Photos {
    pub(crate) fn names(&self) -> Vec<String> {
        self.images.borrow().keys().cloned().collect()
    }

    pub(crate) fn size(&self, name: &str) -> Option<(u32, u32)> {
        self.images
            .borrow()
            .get(name)
            .map(|photo| (photo.width, photo.height))
    }

    pub(crate) fn remove(&self, name: &str) -> bool {
        self.images.borrow_mut().remove(name).is_some()
    }

    fn next_name(&self) -> String {
        loop {
            let id = self.next_id.get() + 1;
            self.next_id.set(id);
            let name = format!("image{}", id);
            if !self.images.borrow().contains_key(&name) {
                return name;
            }
        }
    }
}

pub(crate) fn not_found(name: &str) -> ScriptError {
    ScriptError::new(format!("image \"{}\" doesn't exist", name))
}

impl Interp {
    /// Look up an existing photo image.
    pub fn find_photo(&self, name: &str) -> Option<PhotoHandle> {
        self.photos
            .images
            .borrow()
            .contains_key(name)
            .then(|| PhotoHandle {
                name: name.to_string(),
            })
    }

    /// Create an empty photo image and its instance command.
    ///
    /// Without a name one is generated (`image1`, `image2`, ...). An
    /// existing image of the same name is replaced.
    pub fn create_photo(&self, name: Option<&str>) -> PhotoHandle {
        let name = match name {
            Some(name) => name.to_string(),
            None => self.photos.next_name(),
        };
        self.photos
            .images
            .borrow_mut()
            .insert(name.clone(), Photo::default());
        let command_name = name.clone();
        self.create_command(
            &name,
            move |interp, objv| photo_command(interp, &command_name, objv),
            None,
        );
        PhotoHandle { name }
    }

    /// Copy a pixel block into a photo with its top-left corner at `(x, y)`,
    /// growing the photo as needed.
    pub fn put_photo_block(
        &self,
        handle: &PhotoHandle,
        block: &PhotoBlock<'_>,
        x: u32,
        y: u32,
    ) -> Result<()> {
        block.validate()?;
        let mut images = self.photos.images.borrow_mut();
        let photo = images
            .get_mut(&handle.name)
            .ok_or_else(|| not_found(&handle.name))?;
        photo.grow_to(x.saturating_add(block.width), y.saturating_add(block.height));

        let stride = photo.width as usize * 4;
        for row in 0..block.height as usize {
            for col in 0..block.width as usize {
                let src = row * block.pitch + col * block.pixel_size;
                let dst = (y as usize + row) * stride + (x as usize + col) * 4;
                for (channel, offset) in block.offsets.iter().enumerate() {
                    photo.pixels[dst + channel] = block.pixels[src + offset];
                }
            }
        }
        Ok(())
    }

    /// The RGBA value of one pixel, if the photo exists and the coordinates
    /// are in range.
    pub fn photo_pixel(&self, name: &str, x: u32, y: u32) -> Option<[u8; 4]> {
        self.photos.images.borrow().get(name)?.pixel(x, y)
    }

    /// Width and height of a photo.
    pub fn photo_size(&self, name: &str) -> Option<(u32, u32)> {
        self.photos.size(name)
    }
}

fn photo_command(interp: &Interp, name: &str, objv: &[Obj]) -> Result<Obj> {
    let option = objv.get(1).map(Obj::to_string_lossy).unwrap_or_default();
    match (option.as_str(), objv.len()) {
        ("get", 4) => {
            let x = objv[2].get_wide_int()?;
            let y = objv[3].get_wide_int()?;
            let out_of_range =
                || ScriptError::new(format!("{} get: coordinates out of range", name));
            let x = u32::try_from(x).map_err(|_| out_of_range())?;
            let y = u32::try_from(y).map_err(|_| out_of_range())?;
            let [r, g, b, _] = interp.photo_pixel(name, x, y).ok_or_else(out_of_range)?;
            Ok(Obj::from(format!("{} {} {}", r, g, b)))
        }
        ("get", _) => Err(ScriptError::wrong_args(&format!("{} get x y", name))),
        ("blank", 2) => {
            let mut images = interp.photos.images.borrow_mut();
            let photo = images.get_mut(name).ok_or_else(|| not_found(name))?;
            photo.pixels.fill(0);
            Ok(Obj::empty())
        }
        ("blank", _) => Err(ScriptError::wrong_args(&format!("{} blank", name))),
        ("", _) => Err(ScriptError::wrong_args(&format!(
            "{} option ?arg ...?",
            name
        ))),
        (other, _) => Err(ScriptError::new(format!(
            "bad option \"{}\": must be blank or get",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_block_grows_photo_and_reorders_channels() {
        let interp = Interp::new();
        let photo = interp.create_photo(Some("pic"));
        // Two BGRA pixels.
        let pixels = [3u8, 2, 1, 255, 30, 20, 10, 128];
        let block = PhotoBlock {
            pixels: &pixels,
            width: 2,
            height: 1,
            pitch: 8,
            pixel_size: 4,
            offsets: [2, 1, 0, 3],
        };
        interp.put_photo_block(&photo, &block, 0, 0).unwrap();

        assert_eq!(interp.photo_size("pic"), Some((2, 1)));
        assert_eq!(interp.photo_pixel("pic", 0, 0), Some([1, 2, 3, 255]));
        assert_eq!(interp.photo_pixel("pic", 1, 0), Some([10, 20, 30, 128]));
    }

    #[test]
    fn put_block_rejects_short_buffers() {
        let interp = Interp::new();
        let photo = interp.create_photo(None);
        let pixels = [0u8; 7];
        let block = PhotoBlock {
            pixels: &pixels,
            width: 2,
            height: 1,
            pitch: 8,
            pixel_size: 4,
            offsets: [0, 1, 2, 3],
        };
        let err = interp.put_photo_block(&photo, &block, 0, 0).unwrap_err();
        assert_eq!(err.message(), "pixel block is smaller than its dimensions");
    }

    #[test]
    fn instance_command_reads_pixels() {
        let interp = Interp::new();
        let photo = interp.create_photo(Some("dot"));
        let pixels = [9u8, 8, 7, 255];
        let block = PhotoBlock {
            pixels: &pixels,
            width: 1,
            height: 1,
            pitch: 4,
            pixel_size: 4,
            offsets: [0, 1, 2, 3],
        };
        interp.put_photo_block(&photo, &block, 1, 1).unwrap();

        interp.eval(b"dot get 1 1").unwrap();
        assert_eq!(interp.result().to_string(), "9 8 7");
        interp.eval(b"dot get 0 0").unwrap();
        assert_eq!(interp.result().to_string(), "0 0 0");

        let err = interp.eval(b"dot get 5 5").unwrap_err();
        assert_eq!(err.message(), "dot get: coordinates out of range");

        interp.eval(b"dot blank; dot get 1 1").unwrap();
        assert_eq!(interp.result().to_string(), "0 0 0");
    }

    #[test]
    fn generated_names_skip_taken_ones() {
        let interp = Interp::new();
        interp.create_photo(Some("image1"));
        let photo = interp.create_photo(None);
        assert_eq!(photo.name(), "image2");
        assert!(interp.find_photo("image2").is_some());
        assert!(interp.find_photo("image3").is_none());
    }
}
