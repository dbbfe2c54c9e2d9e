//! Packing of per-pixel levels into bit planes.
//!
//! Each colorant owns `bits_for_levels(levels)` planes, least significant
//! bit first. Bit `b` of a pixel's level goes into plane `first_plane + b`
//! of its colorant. Pixels are packed MSB-first, eight to an octet. A
//! trailing partial octet is padded with white, then the length of every
//! plane is trimmed of trailing zero octets.

use crate::{
    error::Error,
    model::PlaneLayout,
    octets::OctetString,
};

/// Writes pixel levels into a group of bit planes, left to right.
pub struct PlanePacker<'a> {
    layout: &'a PlaneLayout,
    planes: &'a mut [OctetString],
    pixels: usize,
}

impl<'a> PlanePacker<'a> {
    pub fn new(layout: &'a PlaneLayout, planes: &'a mut [OctetString]) -> Result<Self, Error> {
        if planes.len() != layout.plane_count() {
            return Err(Error::PlaneCountMismatch {
                expected: layout.plane_count(),
                actual: planes.len(),
            });
        }
        Ok(PlanePacker {
            layout,
            planes,
            pixels: 0,
        })
    }

    /// Append one pixel. `levels` holds one level per colorant in layout
    /// order.
    ///
    /// # Panics
    ///
    /// Panics if a plane's storage cannot hold the pixel.
    pub fn push(&mut self, levels: &[u32]) {
        debug_assert_eq!(levels.len(), self.layout.colorants().len());
        let octet = self.pixels / 8;
        let mask = 0x80u8 >> (self.pixels % 8);
        let first_in_octet = self.pixels % 8 == 0;

        for (colorant, &level) in self.layout.colorants().iter().zip(levels) {
            for bit in 0..colorant.bits {
                let storage = self.planes[colorant.first_plane + bit].storage_mut();
                if first_in_octet {
                    storage[octet] = 0;
                }
                if (level >> bit) & 1 != 0 {
                    storage[octet] |= mask;
                }
            }
        }
        self.pixels += 1;
    }

    pub fn pixels(&self) -> usize {
        self.pixels
    }

    /// Pad the last octet with white and set trimmed plane lengths.
    ///
    /// Returns the number of pixels written.
    pub fn finish(self) -> usize {
        let octets = PlaneLayout::octets_per_plane(self.pixels);
        let used = self.pixels % 8;

        if used != 0 {
            let pad = 0xFFu8 >> used;
            for colorant in self.layout.colorants() {
                let white = self.layout.white_level(colorant);
                for bit in 0..colorant.bits {
                    if (white >> bit) & 1 != 0 {
                        self.planes[colorant.first_plane + bit].storage_mut()[octets - 1] |= pad;
                    }
                }
            }
        }

        for plane in self.planes.iter_mut() {
            plane.set_len(octets);
            plane.trim_trailing_zeros();
        }
        self.pixels
    }
}

/// Split a line of already quantized pixels into bit planes.
///
/// `pixel_line` holds one level per colorant per pixel, colorants in layout
/// order (black first, or R,G,B). Levels above a colorant's maximum are
/// masked to its bit count.
pub fn split_line(
    pixel_line: &[u8],
    layout: &PlaneLayout,
    planes: &mut [OctetString],
) -> Result<usize, Error> {
    let colorants = layout.colorants().len();
    let mut packer = PlanePacker::new(layout, planes)?;
    let mut levels = [0u32; 4];

    for pixel in pixel_line.chunks_exact(colorants) {
        for (level, &value) in levels.iter_mut().zip(pixel) {
            *level = value as u32;
        }
        packer.push(&levels[..colorants]);
    }
    Ok(packer.finish())
}

/// Reassemble per-pixel levels from bit planes, colorants in layout order.
#[cfg(test)]
pub(crate) fn join_planes(layout: &PlaneLayout, planes: &[OctetString], pixels: usize) -> Vec<u32> {
    let mut levels = Vec::with_capacity(pixels * layout.colorants().len());
    for pixel in 0..pixels {
        for colorant in layout.colorants() {
            let mut level = 0;
            for bit in 0..colorant.bits {
                let plane = planes[colorant.first_plane + bit].as_bytes();
                let octet = plane.get(pixel / 8).copied().unwrap_or(0);
                if octet & (0x80 >> (pixel % 8)) != 0 {
                    level |= 1 << bit;
                }
            }
            levels.push(level);
        }
    }
    levels
}
