//! Quantization of continuous-tone scan lines into colorant levels.
//!
//! Two renderings are supported: direct thresholding of every sample, and
//! Floyd-Steinberg error diffusion which carries the unrendered intensity
//! of a sample to its right neighbour and into the following scan line.
//!
//! Samples are intensities of the colorant, 0 meaning absent (for RGB: 0 is
//! black). A scan line holds `ColorModel::channels()` samples per pixel.

use crate::{
    error::Error,
    model::{ColorModel, PlaneLayout},
    octets::OctetString,
    planes::PlanePacker,
};

/// How continuous-tone samples are reduced to levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendering {
    Threshold,
    FloydSteinberg,
}

/// Level for `value` on a scale of `levels` levels: `value / (256 / levels)`,
/// clamped to the top level.
pub fn quantize_sample(value: u8, levels: u32) -> u32 {
    (value as u32 / (256 / levels)).min(levels - 1)
}

/// Error diffusion weights, in sixteenths. The lower-right neighbour gets
/// what is left.
const RIGHT: i32 = 7;
const LOWER_LEFT: i32 = 3;
const LOWER: i32 = 5;

#[derive(Debug, Clone, Copy)]
struct ChannelScale {
    divisor: u32,
    max_level: u32,
}

impl ChannelScale {
    fn approximate(&self, value: i32) -> (u32, i32) {
        let approx = (value as u32 / self.divisor).min(self.max_level);
        let rendered = (255 * approx / self.max_level) as i32;
        (approx, value - rendered)
    }
}

/// Converts scan lines to bit planes for one plane layout.
#[derive(Debug, Clone)]
pub struct Quantizer {
    layout: PlaneLayout,
    scales: Vec<ChannelScale>,
}

impl Quantizer {
    pub fn new(layout: PlaneLayout) -> Self {
        let mut scales = vec![
            ChannelScale {
                divisor: 128,
                max_level: 1,
            };
            layout.channels()
        ];
        for colorant in layout.colorants() {
            if let Some(channel) = colorant.channel {
                scales[channel] = ChannelScale {
                    divisor: 256 / colorant.levels,
                    max_level: colorant.max_level(),
                };
            }
        }
        Quantizer { layout, scales }
    }

    pub fn layout(&self) -> &PlaneLayout {
        &self.layout
    }

    /// Quantize `line` by thresholding every sample and split it into
    /// `planes`. Returns the number of pixels written.
    ///
    /// A trailing partial pixel is completed with zero samples.
    pub fn threshold_line(&self, line: &[u8], planes: &mut [OctetString]) -> Result<usize, Error> {
        let channels = self.layout.channels();
        let mut packer = PlanePacker::new(&self.layout, planes)?;
        let mut channel_levels = [0u32; 4];
        let mut levels = [0u32; 4];

        for pixel in line.chunks(channels) {
            for (channel, scale) in self.scales.iter().enumerate() {
                let value = pixel.get(channel).copied().unwrap_or(0);
                channel_levels[channel] = scale.approximate(value as i32).0;
            }
            let n = self.colorant_levels(&channel_levels, &mut levels);
            packer.push(&levels[..n]);
        }
        Ok(packer.finish())
    }

    /// Floyd-Steinberg error diffusion of `line` into `planes`.
    ///
    /// The error of every sample is spread over its right neighbour (7/16),
    /// and the lower-left (3/16), lower (5/16) and lower-right (the rest)
    /// samples in `next_line`. A neighbour clipped to `0..=255` hands the
    /// clipped amount back to the rest; what the lower-right neighbour
    /// cannot take is lost. Neighbours outside the first `max_octets` octets
    /// are skipped and their share is dropped.
    ///
    /// Both lines are modified: the logical length of `line` grows when the
    /// error reaches past its last pixel, and that of `next_line` grows to
    /// cover every sample made non-zero. Octets of either line beyond its
    /// logical length must be zero. Lines must be processed in order.
    ///
    /// Returns the number of pixels written.
    ///
    /// # Panics
    ///
    /// Panics if `max_octets` exceeds the capacity of either line.
    pub fn diffuse_line(
        &self,
        line: &mut OctetString,
        next_line: &mut OctetString,
        max_octets: usize,
        planes: &mut [OctetString],
    ) -> Result<usize, Error> {
        assert!(
            max_octets <= line.capacity() && max_octets <= next_line.capacity(),
            "scan lines shorter than {} octets",
            max_octets
        );
        let spp = self.layout.channels();
        let max_pixels = max_octets / spp;
        let mut pixels = ((line.len() + spp - 1) / spp).min(max_pixels);
        let mut line_len = pixels * spp;
        let mut next_len = next_line.len();

        let mut packer = PlanePacker::new(&self.layout, planes)?;
        let mut channel_levels = [0u32; 4];
        let mut levels = [0u32; 4];
        {
            let current = line.storage_mut();
            let below = next_line.storage_mut();

            let mut pixel = 0;
            while pixel < pixels {
                let has_right = pixel + 1 < max_pixels;

                for (channel, scale) in self.scales.iter().enumerate() {
                    let at = pixel * spp + channel;
                    let (approx, error) = scale.approximate(current[at] as i32);
                    channel_levels[channel] = approx;
                    if error == 0 {
                        continue;
                    }
                    let mut remaining = error;

                    let correction = RIGHT * error / 16;
                    remaining -= correction;
                    if has_right {
                        let to = at + spp;
                        spread(&mut current[to], correction, &mut remaining);
                        if pixel == pixels - 1 && current[to] > 0 {
                            pixels += 1;
                            line_len += spp;
                        }
                    }

                    let correction = LOWER_LEFT * error / 16;
                    remaining -= correction;
                    if pixel > 0 {
                        let to = at - spp;
                        spread(&mut below[to], correction, &mut remaining);
                        if next_len < pixel * spp && below[to] > 0 {
                            next_len = pixel * spp;
                        }
                    }

                    let correction = LOWER * error / 16;
                    remaining -= correction;
                    spread(&mut below[at], correction, &mut remaining);
                    if next_len <= pixel * spp && below[at] > 0 {
                        next_len = (pixel + 1) * spp;
                    }

                    if has_right {
                        let to = at + spp;
                        below[to] = fit_to_octet(below[to] as i32 + remaining);
                        if next_len < (pixel + 2) * spp && below[to] > 0 {
                            next_len = (pixel + 2) * spp;
                        }
                    }
                }

                let n = self.colorant_levels(&channel_levels, &mut levels);
                packer.push(&levels[..n]);
                pixel += 1;
            }
        }

        line.set_len(line_len);
        next_line.set_len(next_len);
        Ok(packer.finish())
    }

    /// Map per-channel levels to per-colorant levels in layout order,
    /// applying black extraction. Returns the number of colorants.
    fn colorant_levels(&self, channel_levels: &[u32; 4], levels: &mut [u32; 4]) -> usize {
        let colorants = self.layout.colorants();
        for (level, colorant) in levels.iter_mut().zip(colorants) {
            *level = colorant.channel.map_or(0, |channel| channel_levels[channel]);
        }
        if self.layout.model() == ColorModel::CmyPlusK {
            extract_black(
                levels,
                self.layout.black_levels(),
                self.layout.non_black_levels(),
            );
        }
        colorants.len()
    }
}

/// Replace equal non-zero C, M and Y levels by black.
///
/// `levels` is ordered K, C, M, Y. When the black scale differs from the CMY
/// scale, substitution only happens if the CMY intensity is exactly
/// representable on the black scale.
fn extract_black(levels: &mut [u32; 4], black_levels: u32, non_black_levels: u32) {
    let cmy = levels[1];
    if cmy == 0 || levels[2] != cmy || levels[3] != cmy {
        return;
    }
    let value = cmy * (black_levels - 1);
    if value % (non_black_levels - 1) == 0 {
        levels[0] = value / (non_black_levels - 1);
        levels[1] = 0;
        levels[2] = 0;
        levels[3] = 0;
    }
}

/// Add `correction` to `target`, clipping to an octet. Whatever is clipped
/// goes back into `remaining`.
fn spread(target: &mut u8, correction: i32, remaining: &mut i32) {
    let value = *target as i32 + correction;
    if value < 0 {
        *target = 0;
        *remaining += value;
    } else if value > 255 {
        *target = 255;
        *remaining += value - 255;
    } else {
        *target = value as u8;
    }
}

fn fit_to_octet(value: i32) -> u8 {
    value.max(0).min(255) as u8
}

/// Floyd-Steinberg diffusion of one scan line for a colour model.
///
/// Convenience wrapper building the layout on every call; pipelines should
/// keep a [`Quantizer`] instead.
pub fn quantize_line(
    scan_line: &mut OctetString,
    next_scan_line: &mut OctetString,
    max_octets: usize,
    color_model: ColorModel,
    black_levels: u32,
    non_black_levels: u32,
    planes: &mut [OctetString],
) -> Result<usize, Error> {
    let layout = PlaneLayout::new(color_model, black_levels, non_black_levels)?;
    Quantizer::new(layout).diffuse_line(scan_line, next_scan_line, max_octets, planes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planes::join_planes;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    fn planes_for(layout: &PlaneLayout, pixels: usize) -> Vec<OctetString> {
        (0..layout.plane_count())
            .map(|_| OctetString::with_capacity(PlaneLayout::octets_per_plane(pixels)))
            .collect()
    }

    fn line(bytes: &[u8], capacity: usize) -> OctetString {
        let mut s = OctetString::with_capacity(capacity);
        s.load(bytes);
        s
    }

    fn gray_bilevel() -> Quantizer {
        Quantizer::new(PlaneLayout::new(ColorModel::Gray, 2, 2).unwrap())
    }

    #[test]
    fn test_quantize_sample() {
        assert_eq!(quantize_sample(127, 2), 0);
        assert_eq!(quantize_sample(128, 2), 1);
        assert_eq!(quantize_sample(63, 4), 0);
        assert_eq!(quantize_sample(64, 4), 1);
        assert_eq!(quantize_sample(255, 4), 3);
        // 256/3 = 85 would put 255 on level 3
        assert_eq!(quantize_sample(255, 3), 2);
    }

    #[test]
    fn test_threshold_gray_scenario() {
        let q = gray_bilevel();
        let mut planes = planes_for(q.layout(), 4);
        q.threshold_line(&[10, 200, 130, 0], &mut planes).unwrap();
        assert_eq!(planes[0].as_bytes(), &[0x60]);
        assert_eq!(planes[0].len(), 1);
    }

    #[test]
    fn test_black_extraction_same_scale() {
        let q = Quantizer::new(PlaneLayout::new(ColorModel::CmyPlusK, 4, 4).unwrap());
        let mut planes = planes_for(q.layout(), 1);
        q.threshold_line(&[200, 200, 200], &mut planes).unwrap();
        assert_eq!(join_planes(q.layout(), &planes, 1), vec![3, 0, 0, 0]);
    }

    #[test]
    fn test_black_extraction_needs_representable_level() {
        // CMY on 4 levels, black bilevel: only level 3 maps onto black
        let q = Quantizer::new(PlaneLayout::new(ColorModel::CmyPlusK, 2, 4).unwrap());
        let mut planes = planes_for(q.layout(), 2);
        q.threshold_line(&[100, 100, 100, 255, 255, 255], &mut planes)
            .unwrap();
        assert_eq!(
            join_planes(q.layout(), &planes, 2),
            vec![0, 1, 1, 1, 1, 0, 0, 0]
        );
    }

    #[test]
    fn test_no_extraction_for_unequal_or_plain_cmy() {
        let q = Quantizer::new(PlaneLayout::new(ColorModel::CmyPlusK, 2, 2).unwrap());
        let mut planes = planes_for(q.layout(), 1);
        q.threshold_line(&[200, 200, 0], &mut planes).unwrap();
        assert_eq!(join_planes(q.layout(), &planes, 1), vec![0, 1, 1, 0]);

        let q = Quantizer::new(PlaneLayout::new(ColorModel::Cmy, 2, 2).unwrap());
        let mut planes = planes_for(q.layout(), 1);
        q.threshold_line(&[200, 200, 200], &mut planes).unwrap();
        assert_eq!(join_planes(q.layout(), &planes, 1), vec![1, 1, 1]);
    }

    #[test]
    fn test_diffusion_chain_single_pixel() {
        let q = gray_bilevel();
        let mut current = line(&[0, 100], 16);
        let mut next = OctetString::with_capacity(16);
        let mut planes = planes_for(q.layout(), 16);

        q.diffuse_line(&mut current, &mut next, 16, &mut planes).unwrap();

        assert_eq!(next.as_bytes(), &[18, 39, 24, 10, 5, 1, 2, 1]);
        assert_eq!(next.as_bytes().iter().map(|&v| v as u32).sum::<u32>(), 100);
        // the error walked right and made pixels 2..=6 non-zero
        assert_eq!(current.len(), 7);
        assert!(planes[0].is_empty());
    }

    #[test]
    fn test_diffusion_clipped_share_goes_lower_right() {
        let q = gray_bilevel();
        let mut current = line(&[0, 100, 250], 16);
        let mut next = OctetString::with_capacity(16);
        let mut planes = planes_for(q.layout(), 16);

        q.diffuse_line(&mut current, &mut next, 16, &mut planes).unwrap();

        assert_eq!(current.storage()[2], 255);
        assert_eq!(next.as_bytes(), &[18, 31, 46]);
        assert_eq!(planes[0].as_bytes(), &[0b0010_0000]);
    }

    #[test]
    fn test_diffusion_skips_neighbours_past_last_column() {
        let q = gray_bilevel();
        let mut current = line(&[0, 100], 2);
        let mut next = OctetString::with_capacity(2);
        let mut planes = planes_for(q.layout(), 2);

        q.diffuse_line(&mut current, &mut next, 2, &mut planes).unwrap();

        assert_eq!(current.len(), 2);
        assert_eq!(next.as_bytes(), &[18, 31]);
    }

    #[test]
    fn test_diffusion_strides_over_cmyk_pixels() {
        let q = Quantizer::new(PlaneLayout::new(ColorModel::Cmyk, 2, 2).unwrap());
        // cyan 100 at pixel 1
        let mut current = line(&[0, 0, 0, 0, 0, 100, 0, 0], 64);
        let mut next = OctetString::with_capacity(64);
        let mut planes = planes_for(q.layout(), 16);

        q.diffuse_line(&mut current, &mut next, 64, &mut planes).unwrap();

        let cyan: Vec<u8> = next.as_bytes().iter().skip(1).step_by(4).copied().collect();
        assert_eq!(cyan, vec![18, 39, 24, 10, 5, 1, 2, 1]);
        for channel in [0usize, 2, 3].iter() {
            assert!(next.storage().iter().skip(*channel).step_by(4).all(|&v| v == 0));
        }
        assert_eq!(next.len(), 32);
    }

    #[test]
    fn test_diffusion_conserves_error() {
        let mut rng = SmallRng::seed_from_u64(42);
        let q = gray_bilevel();

        for _ in 0..200 {
            let width = rng.gen_range(1..48);
            let capacity = width + 64;
            let mut samples: Vec<u8> = (0..width).map(|_| rng.gen()).collect();
            // no error at the left edge, where the lower-left share is dropped
            samples[0] = 0;

            let mut current = line(&samples, capacity);
            let mut next = OctetString::with_capacity(capacity);
            // mid-gray below: no clipping can happen in the next line
            next.load(&vec![128u8; capacity]);
            let before: i64 = samples.iter().map(|&v| v as i64).sum::<i64>() + 128 * capacity as i64;

            let mut planes = planes_for(q.layout(), capacity);
            q.diffuse_line(&mut current, &mut next, capacity, &mut planes)
                .unwrap();

            let rendered: i64 = join_planes(q.layout(), &planes, capacity)
                .iter()
                .map(|&level| 255 * level as i64)
                .sum();
            let after: i64 = next.storage().iter().map(|&v| v as i64).sum();
            assert_eq!(before, rendered + after, "samples {:?}", samples);
        }
    }

    #[test]
    fn test_diffusion_loses_only_lower_right_clipping() {
        let q = gray_bilevel();
        let mut current = line(&[0, 100], 16);
        let mut next = OctetString::with_capacity(16);
        next.load(&[128; 16]);
        // lower-right of pixel 1 is saturated
        next.storage_mut()[2] = 255;
        let before: i64 = 100 + 15 * 128 + 255;

        let mut planes = planes_for(q.layout(), 16);
        q.diffuse_line(&mut current, &mut next, 16, &mut planes).unwrap();

        // 100 - 43 - 18 - 31 = 8 did not fit into the saturated sample
        assert!(planes[0].is_empty());
        assert_eq!(&next.as_bytes()[..8], &[146, 167, 255, 151, 136, 129, 130, 129]);
        let after: i64 = next.storage().iter().map(|&v| v as i64).sum();
        assert_eq!(before - after, 8);
    }

    #[test]
    fn test_diffusion_extracts_black() {
        let q = Quantizer::new(PlaneLayout::new(ColorModel::CmyPlusK, 2, 2).unwrap());
        // grey below threshold, pushed over it on the next pixel
        let mut current = line(&[100, 100, 100, 100, 100, 100], 6);
        let mut next = OctetString::with_capacity(6);
        let mut planes = planes_for(q.layout(), 2);

        q.diffuse_line(&mut current, &mut next, 6, &mut planes).unwrap();

        assert_eq!(&current.storage()[3..], &[143, 143, 143]);
        assert_eq!(join_planes(q.layout(), &planes, 2), vec![0, 0, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn test_quantize_line_wrapper_matches_quantizer() {
        let mut a = line(&[0, 90, 180, 40], 8);
        let mut a_next = OctetString::with_capacity(8);
        let mut a_planes = vec![OctetString::with_capacity(1); 2];
        quantize_line(&mut a, &mut a_next, 8, ColorModel::Gray, 4, 2, &mut a_planes).unwrap();

        let q = Quantizer::new(PlaneLayout::new(ColorModel::Gray, 4, 2).unwrap());
        let mut b = line(&[0, 90, 180, 40], 8);
        let mut b_next = OctetString::with_capacity(8);
        let mut b_planes = vec![OctetString::with_capacity(1); 2];
        q.diffuse_line(&mut b, &mut b_next, 8, &mut b_planes).unwrap();

        assert_eq!(a_planes, b_planes);
        assert_eq!(a_next, b_next);
    }
}
