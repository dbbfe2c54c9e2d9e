//! PCL Raster Encoder
//!
//! This crate turns continuous-tone scan lines into the raster data of PCL 3
//! inkjet printers: quantization (thresholding or Floyd-Steinberg error
//! diffusion), bit plane splitting and the PCL raster compression methods,
//! with seed row bookkeeping for the differential ones.
//!
//! Writing the data to a printer is left to a [`RasterSink`].
//!
//! # Example
//!
//! ```rust
//! use pcl_raster::{ColorModel, CompressionMethod, Config, RasterLog, Rasterizer};
//!
//! let config = Config::new(ColorModel::Gray, 16).compression(CompressionMethod::DeltaRow);
//! let mut rasterizer = Rasterizer::new(config).unwrap();
//! let mut sink = RasterLog::new();
//!
//! let page = vec![vec![255u8; 16]; 4];
//! let summary = rasterizer.print_page(&page, &mut sink).unwrap();
//! assert_eq!(summary.groups_sent, 4);
//! ```

mod compress;
mod error;
mod model;
mod octets;
mod planes;
mod quantize;
mod rasterizer;
mod transfer;

pub use crate::{
    compress::{compress, compress_within, CompressionMethod},
    error::Error,
    model::{bits_for_levels, ColorModel, Colorant, ColorantPlanes, PlaneLayout},
    octets::OctetString,
    planes::{split_line, PlanePacker},
    quantize::{quantize_line, quantize_sample, Quantizer, Rendering},
    rasterizer::{Config, PageSummary, Rasterizer},
    transfer::{
        RasterEvent, RasterLog, RasterSink, SeedSource, SessionState, StripLayout, TransferSequencer,
        SWITCH_COST,
    },
};

/// Highest number of intensity levels per colorant (8 bit planes).
pub const MAX_LEVELS: u32 = 256;
