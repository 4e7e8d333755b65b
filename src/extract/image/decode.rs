//! Image XObject decoding.
//!
//! Undoes stream filters, unpacks samples, and resolves the colour space into
//! a [`Pixmap`] of 8-bit samples.

use image::{DynamicImage, ImageFormat};
use lopdf::{Dictionary, Object, Stream};

use super::pixmap::Pixmap;
use crate::error::{Error, Result};
use crate::parser::{decode_stream, Decoded, ImageCodec, PdfDocument};

/// Colour space of an image, reduced to what decoding needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Single tint component; full tint renders black
    Separation,
    /// Palette lookup into a base space
    Indexed {
        base: Box<ColorSpace>,
        hival: u8,
        lookup: Vec<u8>,
    },
}

impl ColorSpace {
    /// Components per pixel in the image data.
    pub fn components(&self) -> u8 {
        match self {
            ColorSpace::Gray | ColorSpace::Separation | ColorSpace::Indexed { .. } => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }

    /// Resolve a `/ColorSpace` entry.
    pub fn from_object(pdf: &PdfDocument, obj: &Object) -> Result<Self> {
        match pdf.resolve(obj)? {
            Object::Name(name) => Self::from_name(name),
            Object::Array(items) => {
                let family = items
                    .first()
                    .map(|o| pdf.resolve(o))
                    .transpose()?
                    .and_then(|o| o.as_name().ok())
                    .ok_or_else(|| unsupported("colour space array without a family name"))?;

                match family {
                    b"ICCBased" => {
                        let stream = items
                            .get(1)
                            .map(|o| pdf.resolve(o))
                            .transpose()?
                            .and_then(|o| o.as_stream().ok())
                            .ok_or_else(|| unsupported("ICCBased without a profile stream"))?;
                        match stream.dict.get(b"N").and_then(Object::as_i64) {
                            Ok(1) => Ok(ColorSpace::Gray),
                            Ok(3) => Ok(ColorSpace::Rgb),
                            Ok(4) => Ok(ColorSpace::Cmyk),
                            _ => match stream.dict.get(b"Alternate") {
                                Ok(alt) => Self::from_object(pdf, alt),
                                Err(_) => Err(unsupported("ICCBased profile without a usable /N")),
                            },
                        }
                    }
                    b"Indexed" | b"I" => Self::indexed(pdf, items),
                    b"Separation" => Ok(ColorSpace::Separation),
                    b"CalGray" => Ok(ColorSpace::Gray),
                    b"CalRGB" => Ok(ColorSpace::Rgb),
                    other => Self::from_name(other),
                }
            }
            _ => Err(unsupported("malformed colour space")),
        }
    }

    fn from_name(name: &[u8]) -> Result<Self> {
        match name {
            b"DeviceGray" | b"G" | b"CalGray" => Ok(ColorSpace::Gray),
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Ok(ColorSpace::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(ColorSpace::Cmyk),
            other => Err(unsupported(&format!(
                "colour space {}",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    fn indexed(pdf: &PdfDocument, items: &[Object]) -> Result<Self> {
        let (Some(base), Some(hival), Some(lookup)) = (items.get(1), items.get(2), items.get(3))
        else {
            return Err(unsupported("Indexed colour space needs base, hival and lookup"));
        };

        let base = Self::from_object(pdf, base)?;
        if matches!(base, ColorSpace::Indexed { .. }) {
            return Err(unsupported("nested Indexed colour space"));
        }
        let hival = pdf
            .resolve(hival)?
            .as_i64()
            .map_err(|_| unsupported("Indexed hival is not an integer"))?
            .clamp(0, 255) as u8;
        let lookup = match pdf.resolve(lookup)? {
            Object::String(bytes, _) => bytes.clone(),
            Object::Stream(stream) => match filtered(pdf, stream)? {
                Decoded { data, codec: None } => data,
                Decoded { codec: Some(codec), .. } => {
                    return Err(unsupported(&format!("Indexed lookup in {}", codec.name())))
                }
            },
            _ => return Err(unsupported("Indexed lookup is neither string nor stream")),
        };

        Ok(ColorSpace::Indexed {
            base: Box::new(base),
            hival,
            lookup,
        })
    }
}

/// Decode an image XObject into a pixmap.
pub fn decode_image(pdf: &PdfDocument, stream: &Stream) -> Result<Pixmap> {
    let dict = &stream.dict;
    let width = dimension(dict, b"Width")?;
    let height = dimension(dict, b"Height")?;

    let data = match filtered(pdf, stream)? {
        Decoded { data, codec: None } => data,
        Decoded {
            data,
            codec: Some(ImageCodec::Dct),
        } => return decode_jpeg(&data),
        Decoded {
            codec: Some(codec), ..
        } => return Err(unsupported(codec.name())),
    };

    let is_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
    let bpc = if is_mask {
        1
    } else {
        let bpc = dict
            .get(b"BitsPerComponent")
            .and_then(Object::as_i64)
            .map_err(|_| Error::ImageDecode("missing /BitsPerComponent".to_string()))?;
        u8::try_from(bpc).map_err(|_| unsupported(&format!("{bpc} bits per component")))?
    };
    if !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
        return Err(unsupported(&format!("{bpc} bits per component")));
    }

    let color_space = if is_mask {
        ColorSpace::Gray
    } else {
        let cs = dict
            .get(b"ColorSpace")
            .map_err(|_| Error::ImageDecode("missing /ColorSpace".to_string()))?;
        ColorSpace::from_object(pdf, cs)?
    };

    let n = color_space.components();
    let raw = unpack_samples(&data, width, height, n, bpc)?;

    let samples = match &color_space {
        ColorSpace::Indexed { base, hival, lookup } => expand_indexed(&raw, base, *hival, lookup),
        _ => {
            // 16-bit samples were reduced to their high byte
            let ranges = decode_ranges(dict, n as usize);
            let max = ((1u32 << bpc.min(8)) - 1) as f32;
            let mut out: Vec<u8> = raw
                .iter()
                .enumerate()
                .map(|(i, &v)| {
                    let (lo, hi) = ranges[i % n as usize];
                    let value = lo + v as f32 * (hi - lo) / max;
                    (value.clamp(0.0, 1.0) * 255.0).round() as u8
                })
                .collect();
            if color_space == ColorSpace::Separation {
                out.iter_mut().for_each(|v| *v = 255 - *v);
            }
            out
        }
    };

    let components = match &color_space {
        ColorSpace::Indexed { base, .. } => base.components(),
        other => other.components(),
    };
    Pixmap::new(width, height, components, false, samples)
}

/// Run the stream's filter chain, reporting failures as image errors.
fn filtered(pdf: &PdfDocument, stream: &Stream) -> Result<Decoded> {
    decode_stream(pdf, stream).map_err(|e| match e {
        Error::StreamDecode(msg) => Error::ImageDecode(msg),
        Error::UnsupportedFilter(msg) => unsupported(&format!("filter {msg}")),
        other => other,
    })
}

/// Split packed rows into one value per sample. 16-bit samples keep their
/// high byte.
fn unpack_samples(data: &[u8], width: u32, height: u32, n: u8, bpc: u8) -> Result<Vec<u16>> {
    let per_row = width as usize * n as usize;
    let row_bytes = (per_row * bpc as usize).div_ceil(8);
    let needed = row_bytes * height as usize;
    if data.len() < needed {
        return Err(Error::ImageDecode(format!(
            "image data has {} bytes, expected {}",
            data.len(),
            needed
        )));
    }

    let mut samples = Vec::with_capacity(per_row * height as usize);
    for row in data[..needed].chunks_exact(row_bytes) {
        match bpc {
            8 => samples.extend(row.iter().map(|&b| b as u16)),
            16 => samples.extend(row.chunks_exact(2).map(|p| p[0] as u16)),
            _ => {
                let per_byte = 8 / bpc as usize;
                let mask = (1u16 << bpc) - 1;
                samples.extend((0..per_row).map(|i| {
                    let byte = row[i / per_byte] as u16;
                    let shift = 8 - bpc as usize * (i % per_byte + 1);
                    (byte >> shift) & mask
                }));
            }
        }
    }

    Ok(samples)
}

/// `/Decode` ranges per component, `[0 1]` when absent.
fn decode_ranges(dict: &Dictionary, n: usize) -> Vec<(f32, f32)> {
    let values: Vec<f32> = dict
        .get(b"Decode")
        .and_then(Object::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|o| match o {
                    Object::Integer(i) => Some(*i as f32),
                    Object::Real(r) => Some(*r),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    if values.len() == 2 * n {
        values.chunks_exact(2).map(|p| (p[0], p[1])).collect()
    } else {
        vec![(0.0, 1.0); n]
    }
}

fn expand_indexed(indices: &[u16], base: &ColorSpace, hival: u8, lookup: &[u8]) -> Vec<u8> {
    let n = base.components() as usize;
    let mut out = Vec::with_capacity(indices.len() * n);
    for &index in indices {
        let index = index.min(hival as u16) as usize;
        for c in 0..n {
            let v = lookup.get(index * n + c).copied().unwrap_or(0);
            out.push(if *base == ColorSpace::Separation { 255 - v } else { v });
        }
    }
    out
}

fn decode_jpeg(data: &[u8]) -> Result<Pixmap> {
    let image = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?;
    let (width, height) = (image.width(), image.height());
    match image {
        DynamicImage::ImageLuma8(gray) => Pixmap::new(width, height, 1, false, gray.into_raw()),
        other => Pixmap::new(width, height, 3, false, other.to_rgb8().into_raw()),
    }
}

fn dimension(dict: &Dictionary, key: &[u8]) -> Result<u32> {
    match dict.get(key).and_then(Object::as_i64) {
        Ok(v) if v > 0 && v <= u32::MAX as i64 => Ok(v as u32),
        _ => Err(Error::ImageDecode(format!(
            "missing or invalid /{}",
            String::from_utf8_lossy(key)
        ))),
    }
}

fn unsupported(what: &str) -> Error {
    Error::UnsupportedImage(what.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use lopdf::dictionary;
    use std::io::Write;

    fn empty_pdf() -> PdfDocument {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => Vec::<Object>::new(),
                "Count" => 0,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        PdfDocument::from_bytes(&bytes).unwrap()
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_unpack_sub_byte_samples() {
        // 3 pixels at 2 bits: 01 10 11, padded
        let samples = unpack_samples(&[0b0110_1100], 3, 1, 1, 2).unwrap();
        assert_eq!(samples, vec![1, 2, 3]);

        // Rows are byte aligned
        let samples = unpack_samples(&[0b1000_0000, 0b0100_0000], 2, 2, 1, 1).unwrap();
        assert_eq!(samples, vec![1, 0, 0, 1]);

        assert!(unpack_samples(&[0], 2, 2, 3, 8).is_err());
    }

    #[test]
    fn test_decode_flate_rgb() {
        let pdf = empty_pdf();
        let stream = Stream::new(
            dictionary! {
                "Width" => 2,
                "Height" => 1,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            zlib(&[255, 0, 0, 0, 0, 255]),
        );

        let pixmap = decode_image(&pdf, &stream).unwrap();
        assert_eq!(pixmap.components(), 3);
        assert_eq!(pixmap.samples(), &[255, 0, 0, 0, 0, 255]);
    }

    #[test]
    fn test_decode_cmyk_keeps_four_components() {
        let pdf = empty_pdf();
        let stream = Stream::new(
            dictionary! {
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceCMYK",
                "BitsPerComponent" => 8,
            },
            vec![0, 255, 255, 0],
        );

        let pixmap = decode_image(&pdf, &stream).unwrap();
        assert_eq!(pixmap.components(), 4);
        assert!(!pixmap.is_gray_or_rgb());
        assert_eq!(pixmap.to_rgb().samples(), &[255, 0, 0]);
    }

    #[test]
    fn test_decode_indexed() {
        let pdf = empty_pdf();
        let palette = Object::String(vec![0, 0, 0, 255, 255, 255], lopdf::StringFormat::Hexadecimal);
        let stream = Stream::new(
            dictionary! {
                "Width" => 2,
                "Height" => 1,
                "ColorSpace" => vec!["Indexed".into(), "DeviceRGB".into(), 1.into(), palette],
                "BitsPerComponent" => 8,
            },
            vec![1, 0],
        );

        let pixmap = decode_image(&pdf, &stream).unwrap();
        assert_eq!(pixmap.components(), 3);
        assert_eq!(pixmap.samples(), &[255, 255, 255, 0, 0, 0]);
    }

    #[test]
    fn test_decode_image_mask() {
        let pdf = empty_pdf();
        let stream = Stream::new(
            dictionary! {
                "Width" => 2,
                "Height" => 1,
                "ImageMask" => true,
            },
            vec![0b0100_0000],
        );

        // Sample 0 marks painted (black) pixels
        let pixmap = decode_image(&pdf, &stream).unwrap();
        assert_eq!(pixmap.components(), 1);
        assert_eq!(pixmap.samples(), &[0, 255]);
    }

    #[test]
    fn test_decode_gray_16_bit_and_decode_array() {
        let pdf = empty_pdf();
        let stream = Stream::new(
            dictionary! {
                "Width" => 2,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 16,
                "Decode" => vec![1.into(), 0.into()],
            },
            vec![0xFF, 0x00, 0x00, 0x10],
        );

        let pixmap = decode_image(&pdf, &stream).unwrap();
        assert_eq!(pixmap.samples(), &[0, 255]);
    }

    #[test]
    fn test_decode_ascii85_rgb() {
        let pdf = empty_pdf();
        let stream = Stream::new(
            dictionary! {
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "ASCII85Decode",
            },
            b"rr<$!rr<$!s8W-!~>".to_vec(),
        );

        let pixmap = decode_image(&pdf, &stream).unwrap();
        assert_eq!(
            pixmap.samples(),
            &[255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255]
        );
    }

    #[test]
    fn test_decode_run_length_gray() {
        let pdf = empty_pdf();
        let stream = Stream::new(
            dictionary! {
                "Width" => 4,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "RunLengthDecode",
            },
            vec![254, 0x40, 0, 0xC0, 128],
        );

        let pixmap = decode_image(&pdf, &stream).unwrap();
        assert_eq!(pixmap.samples(), &[0x40, 0x40, 0x40, 0xC0]);
    }

    #[test]
    fn test_decode_lzw_gray() {
        let pdf = empty_pdf();
        // "-----A---B" as LZW
        let stream = Stream::new(
            dictionary! {
                "Width" => 5,
                "Height" => 2,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "LZWDecode",
            },
            vec![0x80, 0x0B, 0x60, 0x50, 0x22, 0x0C, 0x0C, 0x85, 0x01],
        );

        let pixmap = decode_image(&pdf, &stream).unwrap();
        assert_eq!(pixmap.samples(), b"-----A---B");
    }

    #[test]
    fn test_oversized_bits_per_component() {
        let pdf = empty_pdf();
        // 264 would wrap to 8 if narrowed blindly
        let stream = Stream::new(
            dictionary! {
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 264,
            },
            vec![0; 64],
        );
        assert!(matches!(
            decode_image(&pdf, &stream),
            Err(Error::UnsupportedImage(_))
        ));
    }

    #[test]
    fn test_corrupt_filter_data() {
        let pdf = empty_pdf();
        let stream = Stream::new(
            dictionary! {
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            b"not zlib".to_vec(),
        );
        assert!(matches!(
            decode_image(&pdf, &stream),
            Err(Error::ImageDecode(_))
        ));
    }

    #[test]
    fn test_unsupported_filter() {
        let pdf = empty_pdf();
        let stream = Stream::new(
            dictionary! {
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "JBIG2Decode",
            },
            vec![0],
        );
        assert!(matches!(
            decode_image(&pdf, &stream),
            Err(Error::UnsupportedImage(_))
        ));
    }
}
