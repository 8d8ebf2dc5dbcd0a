//! QNT images.
//!
//! A lossless 24-bit codec: pixels are split into per-channel planes,
//! each plane laid out in 2x2 blocks, delta-filtered against the
//! left/up/average predictor and zlib-compressed. An optional 8-bit
//! alpha plane is compressed separately. Decoding works on dimensions
//! rounded up to even and crops to the declared size at the end.

use std::io::Cursor;

use binrw::BinReaderExt;
use serde::Serialize;

use crate::compression::inflate_exact;
use crate::error::{Error, Result};

const V0_HEADER_SIZE: u32 = 48;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct QntHeader {
    pub version: u32,
    pub header_size: u32,
    /// Display origin; carried but unused here.
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub bpp: u32,
    /// Always 1 in known files. Meaning unknown; preserved verbatim.
    pub reserved: u32,
    pub pixel_compressed_size: u32,
    pub alpha_compressed_size: u32,
}

impl QntHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(data);
        let magic: [u8; 4] = cur.read_le()?;
        if &magic != b"QNT\0" {
            return Err(Error::BadMagic { expected: "QNT\0" });
        }
        let version: u32 = cur.read_le()?;
        if version > 1 {
            return Err(Error::UnsupportedVersion {
                what: "QNT",
                version,
            });
        }
        // Version 0 has no header-size field and a fixed 48-byte header.
        let header_size = if version >= 1 {
            cur.read_le()?
        } else {
            V0_HEADER_SIZE
        };
        Ok(QntHeader {
            version,
            header_size,
            x: cur.read_le()?,
            y: cur.read_le()?,
            width: cur.read_le()?,
            height: cur.read_le()?,
            bpp: cur.read_le()?,
            reserved: cur.read_le()?,
            pixel_compressed_size: cur.read_le()?,
            alpha_compressed_size: cur.read_le()?,
        })
    }
}

/// A decoded image: RGBA8, row-major, top-origin.
#[derive(Debug, Clone)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    /// True when the file carried an alpha plane.
    pub has_alpha: bool,
}

/// Decode a complete QNT file.
pub fn decode(data: &[u8]) -> Result<Image> {
    let header = QntHeader::parse(data)?;
    if header.bpp != 24 {
        return Err(Error::UnsupportedVersion {
            what: "QNT bits-per-pixel",
            version: header.bpp,
        });
    }

    // Planes cover dimensions rounded up to even.
    let w = ((header.width + 1) & !1) as usize;
    let h = ((header.height + 1) & !1) as usize;

    let body = data
        .get(header.header_size as usize..)
        .ok_or(Error::Truncated)?;
    let pixel_blob = body
        .get(..header.pixel_compressed_size as usize)
        .ok_or(Error::Truncated)?;
    let mut pixels = assemble_planes(pixel_blob, w, h)?;

    if header.alpha_compressed_size > 0 {
        let alpha_blob = body
            .get(
                header.pixel_compressed_size as usize
                    ..(header.pixel_compressed_size + header.alpha_compressed_size) as usize,
            )
            .ok_or(Error::Truncated)?;
        let alpha = inflate_exact(alpha_blob, w * h)?;
        for (pixel, a) in pixels.chunks_exact_mut(4).zip(&alpha) {
            pixel[3] = *a;
        }
    } else if let Some(seed) = pixels.get_mut(3) {
        // The unfilter pass spreads this seed across the whole plane.
        *seed = 0xff;
    }

    unfilter(&mut pixels, w, h);

    let (width, height) = (header.width as usize, header.height as usize);
    let pixels = if w != width || h != height {
        let mut cropped = vec![0u8; width * height * 4];
        for y in 0..height {
            cropped[y * width * 4..(y + 1) * width * 4]
                .copy_from_slice(&pixels[y * w * 4..y * w * 4 + width * 4]);
        }
        cropped
    } else {
        pixels
    };

    Ok(Image {
        width: header.width,
        height: header.height,
        pixels,
        has_alpha: header.alpha_compressed_size > 0,
    })
}

/// Inflate the pixel blob and undo the 2x2-block channel-planar layout.
///
/// Planes appear in the file for channel 2, then 1, then 0 of the output
/// pixel; within a plane, each 2x2 block stores its four samples in
/// column order. Alpha bytes stay zero here.
fn assemble_planes(blob: &[u8], w: usize, h: usize) -> Result<Vec<u8>> {
    let raw = inflate_exact(blob, w * h * 3)?;
    let mut pixels = vec![0u8; w * h * 4];
    let mut p = 0;
    for c in (0..3usize).rev() {
        for y in (0..h).step_by(2) {
            for x in (0..w).step_by(2) {
                pixels[(y * w + x) * 4 + c] = raw[p];
                pixels[((y + 1) * w + x) * 4 + c] = raw[p + 1];
                pixels[(y * w + x + 1) * 4 + c] = raw[p + 2];
                pixels[((y + 1) * w + x + 1) * 4 + c] = raw[p + 3];
                p += 4;
            }
        }
    }
    Ok(pixels)
}

/// Undo the prediction filter in place, all four channels uniformly.
///
/// First pixel untouched; first row predicts from the left, first
/// column from above, everything else from the 9-bit average of both.
/// Neighbors are the already-unfiltered values.
fn unfilter(pixels: &mut [u8], w: usize, h: usize) {
    for x in 1..w {
        for c in 0..4 {
            pixels[x * 4 + c] = pixels[(x - 1) * 4 + c].wrapping_sub(pixels[x * 4 + c]);
        }
    }
    for y in 1..h {
        let row = y * w * 4;
        let prev = row - w * 4;
        for c in 0..4 {
            pixels[row + c] = pixels[prev + c].wrapping_sub(pixels[row + c]);
        }
        for x in 1..w {
            for c in 0..4 {
                let up = pixels[prev + x * 4 + c] as u16;
                let left = pixels[row + (x - 1) * 4 + c] as u16;
                let predicted = ((up + left) >> 1) as u8;
                pixels[row + x * 4 + c] = predicted.wrapping_sub(pixels[row + x * 4 + c]);
            }
        }
    }
}
