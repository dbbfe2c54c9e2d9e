use log::{debug, info};
use std::mem;

use crate::{
    compress::CompressionMethod,
    error::Error,
    model::{ColorModel, PlaneLayout},
    octets::OctetString,
    quantize::{Quantizer, Rendering},
    transfer::{RasterSink, StripLayout, TransferSequencer},
};

/// Turns pages of continuous-tone scan lines into compressed raster data.
pub struct Rasterizer {
    config: Config,
    quantizer: Quantizer,
    sequencer: TransferSequencer,
    line: OctetString,
    next_line: OctetString,
}

/// What a page cost on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSummary {
    pub groups_sent: usize,
    /// Blank groups, skipped or dropped at the end of the page.
    pub groups_skipped: usize,
    /// Plane payload octets, without method switches.
    pub octets_sent: usize,
}

impl Rasterizer {
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;
        let layout = PlaneLayout::new(config.color_model, config.black_levels, config.non_black_levels)?;
        debug!("{:?}", config);

        let strips: Vec<StripLayout> = layout
            .colorants()
            .iter()
            .map(|c| StripLayout {
                planes: c.bits,
                lines: 1,
            })
            .collect();
        let mut sequencer = TransferSequencer::new(
            &strips,
            PlaneLayout::octets_per_plane(config.width),
            config.compression,
        )?;
        if config.order_cmyk && layout.black_planes() > 0 {
            sequencer = sequencer.order_cmyk(layout.black_planes());
        }

        let octets_per_line = config.width * layout.channels();
        Ok(Rasterizer {
            quantizer: Quantizer::new(layout),
            sequencer,
            line: OctetString::with_capacity(octets_per_line),
            next_line: OctetString::with_capacity(octets_per_line),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &PlaneLayout {
        self.quantizer.layout()
    }

    /// Render one page, scan line by scan line from the top.
    ///
    /// Each line holds one sample per channel per pixel. Shorter lines are
    /// completed with zero samples, longer ones are cut to the page width.
    pub fn print_page<I, S>(&mut self, lines: I, sink: &mut S) -> Result<PageSummary, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
        S: RasterSink + ?Sized,
    {
        self.sequencer.reset();
        let mut summary = PageSummary::default();
        let mut blank = 0;

        let mut lines = lines.into_iter();
        let mut current = lines.next();
        if let Some(data) = &current {
            self.load(data.as_ref(), true);
        }

        while current.is_some() {
            let upcoming = lines.next();
            match &upcoming {
                Some(data) => self.load(data.as_ref(), false),
                None => self.next_line.load(&[]),
            }

            if self.render_line()? {
                self.sequencer.discard_group();
                blank += 1;
            } else {
                if blank > 0 {
                    self.sequencer.skip_groups(blank, sink)?;
                    summary.groups_skipped += blank;
                    blank = 0;
                }
                summary.octets_sent += self.sequencer.transmit_group(sink)?;
                summary.groups_sent += 1;
            }

            mem::swap(&mut self.line, &mut self.next_line);
            current = upcoming;
        }

        // trailing blank groups are never sent
        summary.groups_skipped += blank;
        self.sequencer.end_session(sink)?;
        info!(
            "Page done: {} groups sent, {} blank, {} octets",
            summary.groups_sent, summary.groups_skipped, summary.octets_sent
        );
        Ok(summary)
    }

    /// Load a scan line into the current or the look-ahead buffer, trimmed
    /// to whole pixels.
    fn load(&mut self, data: &[u8], current: bool) {
        let channels = self.layout().channels();
        let buffer = if current {
            &mut self.line
        } else {
            &mut self.next_line
        };
        buffer.load(data);
        let length = buffer.trim_trailing_zeros();
        buffer.set_len((length + channels - 1) / channels * channels);
    }

    /// Quantize the current line into a new group. Returns whether the group
    /// is blank.
    fn render_line(&mut self) -> Result<bool, Error> {
        let width = self.config.width;
        let planes = self.sequencer.start_group()?;

        match self.config.rendering {
            Rendering::Threshold => {
                if self.config.rgb_trailing_pixel_fix
                    && self.config.color_model == ColorModel::Rgb
                    && self.config.non_black_levels == 2
                    && self.line.len() == self.line.capacity()
                {
                    let length = self.line.len();
                    for sample in &mut self.line.storage_mut()[length - 3..] {
                        *sample = 0xFF;
                    }
                }
                self.quantizer.threshold_line(self.line.as_bytes(), planes)?;
            }
            Rendering::FloydSteinberg => {
                let max_octets = self.line.capacity();
                self.quantizer
                    .diffuse_line(&mut self.line, &mut self.next_line, max_octets, planes)?;
            }
        }

        Ok(is_blank(planes, self.quantizer.layout(), width))
    }
}

/// A group is blank when it prints nothing: all planes empty, or for RGB
/// all planes white across the full width.
fn is_blank(planes: &[OctetString], layout: &PlaneLayout, width: usize) -> bool {
    if layout.model().white_is_max() {
        let full = PlaneLayout::octets_per_plane(width);
        planes
            .iter()
            .all(|plane| plane.len() == full && plane.as_bytes().iter().all(|&octet| octet == 0xFF))
    } else {
        planes.iter().all(|plane| plane.is_empty())
    }
}

///
/// Config
///
#[derive(Debug, Clone)]
pub struct Config {
    color_model: ColorModel,
    width: usize,
    black_levels: u32,
    non_black_levels: u32,
    rendering: Rendering,
    compression: CompressionMethod,
    order_cmyk: bool,
    rgb_trailing_pixel_fix: bool,
}

impl Config {
    /// Initialize configuration data with default values.
    ///
    /// The colour model and the page width in pixels are not modifiable
    /// after the initialization. Defaults are bilevel colorants, direct
    /// thresholding and no compression.
    ///
    /// # Example
    ///
    /// ```
    /// use pcl_raster::{ColorModel, CompressionMethod, Config, Rendering};
    ///
    /// let config = Config::new(ColorModel::Cmyk, 2400)
    ///     .black_levels(4)
    ///     .rendering(Rendering::FloydSteinberg)
    ///     .compression(CompressionMethod::DeltaRow);
    /// assert!(config.validate().is_ok());
    /// ```
    ///
    pub fn new(color_model: ColorModel, width: usize) -> Config {
        Config {
            color_model,
            width,
            black_levels: 2,
            non_black_levels: 2,
            rendering: Rendering::Threshold,
            compression: CompressionMethod::None,
            order_cmyk: false,
            rgb_trailing_pixel_fix: false,
        }
    }

    /// Intensity levels for black (Gray, CMY+K and CMYK).
    pub fn black_levels(self, levels: u32) -> Self {
        Config {
            black_levels: levels,
            ..self
        }
    }

    /// Intensity levels for every colorant other than black.
    pub fn non_black_levels(self, levels: u32) -> Self {
        Config {
            non_black_levels: levels,
            ..self
        }
    }

    pub fn rendering(self, rendering: Rendering) -> Self {
        Config { rendering, ..self }
    }

    pub fn compression(self, compression: CompressionMethod) -> Self {
        Config {
            compression,
            ..self
        }
    }

    /// Send CMY planes before black.
    pub fn order_cmyk(self, flag: bool) -> Self {
        Config {
            order_cmyk: flag,
            ..self
        }
    }

    /// Force the last pixel of full-width bilevel RGB lines to white.
    pub fn rgb_trailing_pixel_fix(self, flag: bool) -> Self {
        Config {
            rgb_trailing_pixel_fix: flag,
            ..self
        }
    }

    pub fn color_model(&self) -> ColorModel {
        self.color_model
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.width == 0 {
            return Err(Error::InvalidConfig("page width must not be zero".to_string()));
        }
        PlaneLayout::new(self.color_model, self.black_levels, self.non_black_levels)?;
        Ok(())
    }
}
