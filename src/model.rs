use crate::error::Error;

/// Process colour model of the raster data.
///
/// `CmyPlusK` is rendered like `Cmy` but equal non-zero CMY levels are
/// replaced by black when quantizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorModel {
    Gray,
    Rgb,
    Cmy,
    CmyPlusK,
    Cmyk,
}

impl ColorModel {
    /// Number of continuous-tone samples per pixel in a scan line.
    pub fn channels(&self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb | Self::Cmy | Self::CmyPlusK => 3,
            Self::Cmyk => 4,
        }
    }

    pub fn has_black(&self) -> bool {
        matches!(self, Self::Gray | Self::CmyPlusK | Self::Cmyk)
    }

    /// RGB is additive: white is the highest level, not zero.
    pub fn white_is_max(&self) -> bool {
        matches!(self, Self::Rgb)
    }

    /// Colorants in plane order.
    pub fn colorants(&self) -> &'static [Colorant] {
        use Colorant::*;
        match self {
            Self::Gray => &[Black],
            Self::Rgb => &[Red, Green, Blue],
            Self::Cmy => &[Cyan, Magenta, Yellow],
            Self::CmyPlusK | Self::Cmyk => &[Black, Cyan, Magenta, Yellow],
        }
    }

    /// Index of the scan-line sample feeding `colorant`.
    ///
    /// `None` for the black of `CmyPlusK`, which only comes out of black
    /// extraction.
    pub fn channel_of(&self, colorant: Colorant) -> Option<usize> {
        use Colorant::*;
        match (self, colorant) {
            (Self::Gray, Black) => Some(0),
            (Self::Rgb, Red) => Some(0),
            (Self::Rgb, Green) => Some(1),
            (Self::Rgb, Blue) => Some(2),
            (Self::Cmy, Cyan) | (Self::CmyPlusK, Cyan) => Some(0),
            (Self::Cmy, Magenta) | (Self::CmyPlusK, Magenta) => Some(1),
            (Self::Cmy, Yellow) | (Self::CmyPlusK, Yellow) => Some(2),
            (Self::Cmyk, Black) => Some(0),
            (Self::Cmyk, Cyan) => Some(1),
            (Self::Cmyk, Magenta) => Some(2),
            (Self::Cmyk, Yellow) => Some(3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colorant {
    Black,
    Cyan,
    Magenta,
    Yellow,
    Red,
    Green,
    Blue,
}

impl Colorant {
    pub fn is_black(&self) -> bool {
        matches!(self, Self::Black)
    }
}

/// Number of bit planes needed for `levels` intensity levels.
///
/// Returns `ceil(log2(levels))`, i.e. 0 for 0 or 1 level.
pub fn bits_for_levels(levels: u32) -> usize {
    let mut power: u64 = 1;
    let mut planes = 0;
    while power < levels as u64 {
        power *= 2;
        planes += 1;
    }
    planes
}

/// Where one colorant lives inside a group of bit planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorantPlanes {
    pub colorant: Colorant,
    /// Source sample within a pixel, if any.
    pub channel: Option<usize>,
    pub levels: u32,
    /// Number of planes, least significant first.
    pub bits: usize,
    pub first_plane: usize,
}

impl ColorantPlanes {
    pub fn max_level(&self) -> u32 {
        self.levels - 1
    }
}

/// Plane layout for a colour model and its intensity levels.
///
/// Planes are grouped per colorant in [`ColorModel::colorants`] order and
/// ordered from least to most significant bit within a colorant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneLayout {
    model: ColorModel,
    black_levels: u32,
    non_black_levels: u32,
    colorants: Vec<ColorantPlanes>,
    planes: usize,
}

impl PlaneLayout {
    /// Build the layout, checking the level counts the model uses.
    ///
    /// Black levels apply to Gray, CMY+K and CMYK, non-black levels to all
    /// other colorants. Each used count must lie in `2..=256`.
    pub fn new(model: ColorModel, black_levels: u32, non_black_levels: u32) -> Result<Self, Error> {
        let mut colorants = Vec::new();
        let mut planes = 0;

        for &colorant in model.colorants() {
            let levels = if colorant.is_black() {
                black_levels
            } else {
                non_black_levels
            };
            if !(2..=crate::MAX_LEVELS).contains(&levels) {
                return Err(Error::InvalidConfig(format!(
                    "{:?} needs 2 to 256 intensity levels, got {}",
                    colorant, levels
                )));
            }
            let bits = bits_for_levels(levels);
            colorants.push(ColorantPlanes {
                colorant,
                channel: model.channel_of(colorant),
                levels,
                bits,
                first_plane: planes,
            });
            planes += bits;
        }

        Ok(PlaneLayout {
            model,
            black_levels,
            non_black_levels,
            colorants,
            planes,
        })
    }

    pub fn model(&self) -> ColorModel {
        self.model
    }

    pub fn channels(&self) -> usize {
        self.model.channels()
    }

    pub fn black_levels(&self) -> u32 {
        self.black_levels
    }

    pub fn non_black_levels(&self) -> u32 {
        self.non_black_levels
    }

    pub fn colorants(&self) -> &[ColorantPlanes] {
        &self.colorants
    }

    pub fn plane_count(&self) -> usize {
        self.planes
    }

    /// Planes holding black, `0..n` since black always comes first.
    pub fn black_planes(&self) -> usize {
        self.colorants
            .iter()
            .filter(|c| c.colorant.is_black())
            .map(|c| c.bits)
            .sum()
    }

    /// Level a colorant takes in a white pixel.
    pub fn white_level(&self, colorant: &ColorantPlanes) -> u32 {
        if self.model.white_is_max() {
            colorant.max_level()
        } else {
            0
        }
    }

    /// Octets needed by a bit plane for `pixels` pixels.
    pub fn octets_per_plane(pixels: usize) -> usize {
        (pixels + 7) / 8
    }
}
