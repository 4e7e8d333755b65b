//! Stream filter chain.
//!
//! Undoes the `/Filter` entries of a stream in order. The general purpose
//! filters are decoded here for content streams, form XObjects and images
//! alike; image codecs are only recognised and handed back to the caller.

use std::io::Read;

use flate2::read::ZlibDecoder;
use lopdf::{Dictionary, Object, Stream};
use weezl::{decode::Decoder, BitOrder};

use super::document::PdfDocument;
use crate::error::{Error, Result};

/// Image codec ending a filter chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCodec {
    /// Baseline or progressive JPEG
    Dct,
    /// JPEG 2000
    Jpx,
    Jbig2,
    CcittFax,
}

impl ImageCodec {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"DCTDecode" | b"DCT" => Some(ImageCodec::Dct),
            b"JPXDecode" => Some(ImageCodec::Jpx),
            b"JBIG2Decode" => Some(ImageCodec::Jbig2),
            b"CCITTFaxDecode" | b"CCF" => Some(ImageCodec::CcittFax),
            _ => None,
        }
    }

    /// Filter name as written in PDF files.
    pub fn name(self) -> &'static str {
        match self {
            ImageCodec::Dct => "DCTDecode",
            ImageCodec::Jpx => "JPXDecode",
            ImageCodec::Jbig2 => "JBIG2Decode",
            ImageCodec::CcittFax => "CCITTFaxDecode",
        }
    }
}

/// Output of a filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Decoded bytes, still encoded when `codec` is set
    pub data: Vec<u8>,
    /// Codec the data is left in
    pub codec: Option<ImageCodec>,
}

/// Apply the stream's filters in order.
///
/// Corrupt data fails with [`Error::StreamDecode`]; a filter we do not know,
/// or an image codec anywhere but last, fails with
/// [`Error::UnsupportedFilter`].
pub fn decode_stream(pdf: &PdfDocument, stream: &Stream) -> Result<Decoded> {
    let filters = names(pdf, stream.dict.get(b"Filter").ok())?;
    let params = decode_params(pdf, stream.dict.get(b"DecodeParms").ok(), filters.len())?;

    let mut data = stream.content.clone();
    for (i, filter) in filters.iter().enumerate() {
        let params = params.get(i).and_then(Option::as_ref);
        match filter.as_slice() {
            b"FlateDecode" | b"Fl" => data = unpredict(inflate(&data)?, params)?,
            b"LZWDecode" | b"LZW" => {
                let early_change = params
                    .and_then(|p| p.get(b"EarlyChange").and_then(Object::as_i64).ok())
                    .unwrap_or(1);
                data = unpredict(lzw(&data, early_change != 0)?, params)?;
            }
            b"ASCIIHexDecode" | b"AHx" => data = ascii_hex(&data)?,
            b"ASCII85Decode" | b"A85" => data = ascii85(&data)?,
            b"RunLengthDecode" | b"RL" => data = run_length(&data)?,
            other => {
                return match ImageCodec::from_name(other) {
                    Some(codec) if i + 1 == filters.len() => Ok(Decoded {
                        data,
                        codec: Some(codec),
                    }),
                    Some(codec) => Err(Error::UnsupportedFilter(format!(
                        "{} followed by further filters",
                        codec.name()
                    ))),
                    None => Err(Error::UnsupportedFilter(
                        String::from_utf8_lossy(other).into_owned(),
                    )),
                };
            }
        }
    }
    Ok(Decoded { data, codec: None })
}

fn names(pdf: &PdfDocument, obj: Option<&Object>) -> Result<Vec<Vec<u8>>> {
    let Some(obj) = obj else {
        return Ok(vec![]);
    };
    match pdf.resolve(obj)? {
        Object::Name(name) => Ok(vec![name.clone()]),
        Object::Array(items) => items
            .iter()
            .map(|o| match pdf.resolve(o)? {
                Object::Name(name) => Ok(name.clone()),
                _ => Err(Error::StreamDecode("filter is not a name".to_string())),
            })
            .collect(),
        _ => Err(Error::StreamDecode("malformed /Filter".to_string())),
    }
}

fn decode_params(
    pdf: &PdfDocument,
    obj: Option<&Object>,
    count: usize,
) -> Result<Vec<Option<Dictionary>>> {
    let Some(obj) = obj else {
        return Ok(vec![None; count]);
    };
    let as_dict = |o: &Object| -> Result<Option<Dictionary>> {
        match pdf.resolve(o)? {
            Object::Dictionary(d) => Ok(Some(d.clone())),
            _ => Ok(None),
        }
    };
    match pdf.resolve(obj)? {
        Object::Array(items) => items.iter().map(as_dict).collect(),
        other => Ok(vec![as_dict(other)?]),
    }
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::StreamDecode(format!("FlateDecode: {e}")))?;
    Ok(out)
}

/// LZW with 8-bit symbols, most significant bit first.
///
/// With `early_change` the code width grows one code early, the way TIFF
/// writers do it and the PDF default.
fn lzw(data: &[u8], early_change: bool) -> Result<Vec<u8>> {
    let mut decoder = if early_change {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        Decoder::new(BitOrder::Msb, 8)
    };
    let mut out = Vec::new();
    let result = decoder.into_vec(&mut out).decode(data);
    if let Err(e) = result.status {
        // Truncated streams still yield what came before the damage
        if out.is_empty() {
            return Err(Error::StreamDecode(format!("LZWDecode: {e}")));
        }
        log::debug!("LZWDecode stopped early: {}", e);
    }
    Ok(out)
}

fn ascii_hex(data: &[u8]) -> Result<Vec<u8>> {
    let mut digits = Vec::with_capacity(data.len());
    for &b in data {
        match b {
            b'>' => break,
            b if b.is_ascii_whitespace() => {}
            b if b.is_ascii_hexdigit() => digits.push((b as char).to_digit(16).unwrap_or(0) as u8),
            other => {
                return Err(Error::StreamDecode(format!(
                    "ASCIIHexDecode: invalid byte 0x{other:02x}"
                )))
            }
        }
    }
    // An odd trailing digit is followed by an implicit 0
    Ok(digits
        .chunks(2)
        .map(|pair| pair[0] << 4 | pair.get(1).copied().unwrap_or(0))
        .collect())
}

fn ascii85(data: &[u8]) -> Result<Vec<u8>> {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    let data = &data[start..];
    let data = data.strip_prefix(b"<~").unwrap_or(data);

    let mut out = Vec::with_capacity(data.len() / 5 * 4 + 4);
    let mut group = [0u8; 5];
    let mut len = 0;
    for &b in data {
        match b {
            b'~' => break,
            b'z' if len == 0 => out.extend_from_slice(&[0; 4]),
            b'!'..=b'u' => {
                group[len] = b - b'!';
                len += 1;
                if len == 5 {
                    out.extend_from_slice(&base85_word(&group)?.to_be_bytes());
                    len = 0;
                }
            }
            b if b.is_ascii_whitespace() => {}
            other => {
                return Err(Error::StreamDecode(format!(
                    "ASCII85Decode: invalid byte 0x{other:02x}"
                )))
            }
        }
    }

    match len {
        0 => {}
        1 => {
            return Err(Error::StreamDecode(
                "ASCII85Decode: lone trailing character".to_string(),
            ))
        }
        n => {
            // Pad with 'u' and keep one byte less than the characters given
            group[n..].fill(b'u' - b'!');
            let word = base85_word(&group)?.to_be_bytes();
            out.extend_from_slice(&word[..n - 1]);
        }
    }
    Ok(out)
}

fn base85_word(digits: &[u8; 5]) -> Result<u32> {
    let value = digits.iter().fold(0u64, |acc, &d| acc * 85 + d as u64);
    u32::try_from(value)
        .map_err(|_| Error::StreamDecode("ASCII85Decode: group out of range".to_string()))
}

fn run_length(data: &[u8]) -> Result<Vec<u8>> {
    let truncated = || Error::StreamDecode("RunLengthDecode: truncated run".to_string());

    let mut out = Vec::new();
    let mut i = 0;
    while let Some(&length) = data.get(i) {
        i += 1;
        match length {
            128 => break,
            0..=127 => {
                let end = i + length as usize + 1;
                out.extend_from_slice(data.get(i..end).ok_or_else(truncated)?);
                i = end;
            }
            _ => {
                let byte = *data.get(i).ok_or_else(truncated)?;
                out.resize(out.len() + 257 - length as usize, byte);
                i += 1;
            }
        }
    }
    Ok(out)
}

/// Undo a PNG or TIFF predictor. Without parameters the data is returned as is.
fn unpredict(data: Vec<u8>, params: Option<&Dictionary>) -> Result<Vec<u8>> {
    let Some(params) = params else {
        return Ok(data);
    };
    let int = |key: &[u8], default: i64| params.get(key).and_then(Object::as_i64).unwrap_or(default);
    let predictor = int(b"Predictor", 1);
    let colors = int(b"Colors", 1).max(1) as usize;
    let bpc = int(b"BitsPerComponent", 8).max(1) as usize;
    let columns = int(b"Columns", 1).max(1) as usize;

    let bytes_per_pixel = (colors * bpc).div_ceil(8);
    let row_len = (columns * colors * bpc).div_ceil(8);

    match predictor {
        1 => Ok(data),
        2 => {
            if bpc != 8 {
                return Err(Error::UnsupportedFilter(format!(
                    "TIFF predictor with {bpc} bits"
                )));
            }
            let mut data = data;
            for row in data.chunks_mut(row_len) {
                for i in colors..row.len() {
                    row[i] = row[i].wrapping_add(row[i - colors]);
                }
            }
            Ok(data)
        }
        10..=15 => {
            let mut out = Vec::with_capacity(data.len());
            let mut prev = vec![0u8; row_len];
            for chunk in data.chunks(row_len + 1) {
                let (filter, encoded) = chunk
                    .split_first()
                    .ok_or_else(|| Error::StreamDecode("empty predictor row".to_string()))?;
                let mut row = encoded.to_vec();
                row.resize(row_len, 0);
                for i in 0..row_len {
                    let left = if i >= bytes_per_pixel { row[i - bytes_per_pixel] } else { 0 };
                    let up = prev[i];
                    let up_left = if i >= bytes_per_pixel { prev[i - bytes_per_pixel] } else { 0 };
                    let base = match *filter {
                        0 => 0,
                        1 => left,
                        2 => up,
                        3 => ((left as u16 + up as u16) / 2) as u8,
                        4 => paeth(left, up, up_left),
                        other => {
                            return Err(Error::StreamDecode(format!("PNG filter type {other}")))
                        }
                    };
                    row[i] = row[i].wrapping_add(base);
                }
                out.extend_from_slice(&row);
                prev = row;
            }
            Ok(out)
        }
        other => Err(Error::UnsupportedFilter(format!("predictor {other}"))),
    }
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let (pa, pb, pc) = ((p - a as i16).abs(), (p - b as i16).abs(), (p - c as i16).abs());
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
