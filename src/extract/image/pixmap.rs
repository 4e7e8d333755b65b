//! Decoded raster images.

use std::path::Path;

use image::{DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, RgbImage, RgbaImage};

use crate::error::{Error, Result};

/// An image decoded to 8-bit samples, interleaved, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pixmap {
    width: u32,
    height: u32,
    components: u8,
    alpha: bool,
    samples: Vec<u8>,
}

impl Pixmap {
    /// Wrap decoded samples, checking the buffer size.
    pub fn new(width: u32, height: u32, components: u8, alpha: bool, samples: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * (components as usize + alpha as usize);
        if components == 0 || samples.len() != expected {
            return Err(Error::ImageDecode(format!(
                "{}x{} image with {} components needs {} samples, got {}",
                width,
                height,
                components,
                expected,
                samples.len()
            )));
        }
        Ok(Self {
            width,
            height,
            components,
            alpha,
            samples,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Colour components per pixel, not counting alpha.
    pub fn components(&self) -> u8 {
        self.components
    }

    pub fn has_alpha(&self) -> bool {
        self.alpha
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Whether the image can be written without colour conversion.
    pub fn is_gray_or_rgb(&self) -> bool {
        self.components < 4
    }

    /// Convert to RGB.
    ///
    /// Four or more components are read as CMYK (extra components are
    /// ignored); gray is replicated. Alpha is kept.
    pub fn to_rgb(&self) -> Pixmap {
        let stride = self.components as usize + self.alpha as usize;
        let mut rgb = Vec::with_capacity(self.pixel_count() * (3 + self.alpha as usize));

        for px in self.samples.chunks_exact(stride) {
            match self.components {
                1 | 2 => rgb.extend_from_slice(&[px[0], px[0], px[0]]),
                3 => rgb.extend_from_slice(&px[..3]),
                _ => rgb.extend_from_slice(&cmyk_to_rgb(px[0], px[1], px[2], px[3])),
            }
            if self.alpha {
                rgb.push(px[stride - 1]);
            }
        }

        Pixmap {
            width: self.width,
            height: self.height,
            components: 3,
            alpha: self.alpha,
            samples: rgb,
        }
    }

    /// Write the image as PNG.
    ///
    /// Only gray and RGB pixmaps (with or without alpha) can be written; use
    /// [`Pixmap::to_rgb`] first for anything else.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let image = self.to_dynamic()?;
        image.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }

    fn to_dynamic(&self) -> Result<DynamicImage> {
        let (w, h) = (self.width, self.height);
        let samples = self.samples.clone();
        let image = match (self.components, self.alpha) {
            (1, false) => GrayImage::from_raw(w, h, samples).map(DynamicImage::ImageLuma8),
            (1, true) => GrayAlphaImage::from_raw(w, h, samples).map(DynamicImage::ImageLumaA8),
            (3, false) => RgbImage::from_raw(w, h, samples).map(DynamicImage::ImageRgb8),
            (3, true) => RgbaImage::from_raw(w, h, samples).map(DynamicImage::ImageRgba8),
            (n, _) => {
                return Err(Error::UnsupportedImage(format!(
                    "cannot write {n}-component image as PNG"
                )))
            }
        };
        image.ok_or_else(|| Error::ImageDecode("sample buffer does not match dimensions".to_string()))
    }

    fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Naive CMYK to RGB conversion.
pub fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let channel = |v: u8| ((255 - v as u16) * (255 - k as u16) / 255) as u8;
    [channel(c), channel(m), channel(y)]
}
