//! Pixel sources for photo upload.
//!
//! The runtime's photo images take packed 4-channel RGBA blocks. Sources in
//! any other layout are converted before upload.

use tether_script::{Interp, PhotoBlock};

use crate::error::{Error, Result};

/// Borrowed RGBA rows.
#[derive(Debug, Clone, Copy)]
pub struct RgbaView<'a> {
    pub pixels: &'a [u8],
    /// Bytes from the start of one row to the next.
    pub stride: usize,
}

/// Anything that can be read as RGBA pixels.
pub trait PixelSource {
    /// Width and height in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// The non-premultiplied RGBA value at `(x, y)`.
    fn rgba(&self, x: u32, y: u32) -> [u8; 4];

    /// Direct access for sources already stored as packed RGBA.
    fn as_rgba(&self) -> Option<RgbaView<'_>> {
        None
    }
}

fn buffer_len(width: u32, height: u32, channels: usize) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(channels))
        .ok_or_else(|| Error::Image {
            message: format!("{}x{} image is too large", width, height),
        })
}

fn check_len(width: u32, height: u32, channels: usize, actual: usize) -> Result<()> {
    let expected = buffer_len(width, height, channels)?;
    if actual != expected {
        return Err(Error::Image {
            message: format!(
                "{}x{} image needs {} bytes, got {}",
                width, height, expected, actual
            ),
        });
    }
    Ok(())
}

macro_rules! pixel_buffer {
    ($(#[$meta:meta])* $name:ident, $channels:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            width: u32,
            height: u32,
            pixels: Vec<u8>,
        }

        impl $name {
            const CHANNELS: usize = $channels;

            /// A zero-filled image.
            pub fn new(width: u32, height: u32) -> Result<Self> {
                let len = buffer_len(width, height, Self::CHANNELS)?;
                Ok(Self {
                    width,
                    height,
                    pixels: vec![0; len],
                })
            }

            /// Wrap a packed pixel buffer, row by row with no padding.
            pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
                check_len(width, height, Self::CHANNELS, pixels.len())?;
                Ok(Self {
                    width,
                    height,
                    pixels,
                })
            }

            pub fn width(&self) -> u32 {
                self.width
            }

            pub fn height(&self) -> u32 {
                self.height
            }

            pub fn pixels(&self) -> &[u8] {
                &self.pixels
            }

            fn offset(&self, x: u32, y: u32) -> usize {
                (y as usize * self.width as usize + x as usize) * Self::CHANNELS
            }

            /// Overwrite one pixel. Out-of-range coordinates are ignored.
            pub fn put_pixel(&mut self, x: u32, y: u32, value: [u8; $channels]) {
                if x < self.width && y < self.height {
                    let at = self.offset(x, y);
                    self.pixels[at..at + Self::CHANNELS].copy_from_slice(&value);
                }
            }

            pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; $channels]> {
                if x >= self.width || y >= self.height {
                    return None;
                }
                let at = self.offset(x, y);
                let mut value = [0; $channels];
                value.copy_from_slice(&self.pixels[at..at + Self::CHANNELS]);
                Some(value)
            }
        }
    };
}

pixel_buffer!(
    /// 8-bit RGBA, non-premultiplied.
    RgbaImage,
    4
);
pixel_buffer!(
    /// 8-bit RGB. Converts as fully opaque.
    RgbImage,
    3
);
pixel_buffer!(
    /// 8-bit luminance. Converts as opaque grey.
    GrayImage,
    1
);

impl PixelSource for RgbaImage {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn rgba(&self, x: u32, y: u32) -> [u8; 4] {
        self.get_pixel(x, y).unwrap_or_default()
    }

    fn as_rgba(&self) -> Option<RgbaView<'_>> {
        Some(RgbaView {
            pixels: &self.pixels,
            stride: self.width as usize * 4,
        })
    }
}

impl PixelSource for RgbImage {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn rgba(&self, x: u32, y: u32) -> [u8; 4] {
        match self.get_pixel(x, y) {
            Some([r, g, b]) => [r, g, b, 255],
            None => [0; 4],
        }
    }
}

impl PixelSource for GrayImage {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn rgba(&self, x: u32, y: u32) -> [u8; 4] {
        match self.get_pixel(x, y) {
            Some([l]) => [l, l, l, 255],
            None => [0; 4],
        }
    }
}

impl RgbaImage {
    /// Copy any pixel source into a packed RGBA buffer.
    pub fn from_source<S: PixelSource + ?Sized>(source: &S) -> Result<Self> {
        let (width, height) = source.dimensions();
        let mut image = Self::new(width, height)?;
        let row_len = width as usize * 4;

        if let Some(view) = source.as_rgba() {
            let needed = match height {
                0 => 0,
                h => view.stride * (h as usize - 1) + row_len,
            };
            if view.stride < row_len || view.pixels.len() < needed {
                return Err(Error::Image {
                    message: "RGBA view is smaller than its dimensions".to_string(),
                });
            }
            for (y, row) in image.pixels.chunks_exact_mut(row_len.max(1)).enumerate() {
                let start = y * view.stride;
                row.copy_from_slice(&view.pixels[start..start + row_len]);
            }
            return Ok(image);
        }

        for y in 0..height {
            for x in 0..width {
                image.put_pixel(x, y, source.rgba(x, y));
            }
        }
        Ok(image)
    }
}

/// Copy `image` into the photo `name`, creating the photo if needed.
pub(crate) fn put_image(interp: &Interp, name: &str, image: &RgbaImage) -> Result<()> {
    let photo = match interp.find_photo(name) {
        Some(photo) => photo,
        None => interp.create_photo(Some(name)),
    };
    let block = PhotoBlock {
        pixels: &image.pixels,
        width: image.width,
        height: image.height,
        pitch: image.width as usize * 4,
        pixel_size: 4,
        offsets: [0, 1, 2, 3],
    };
    interp.put_photo_block(&photo, &block, 0, 0)?;
    Ok(())
}
