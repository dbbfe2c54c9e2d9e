//! Error types for raster encoding.
//!
//! This module defines the errors the pipeline can report to the protocol
//! layer sitting on top of it.

use crate::{compress::CompressionMethod, transfer::SessionState};
use thiserror::Error;

/// Main error type for raster operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The output buffer handed to a codec is too small.
    ///
    /// The caller may retry with a larger buffer or fall back to sending
    /// the plane uncompressed. The logical length of the output buffer is
    /// left untouched, its storage may have been partially overwritten.
    #[error("Output buffer too small for {method:?} encoding ({capacity} octets available)")]
    InsufficientSpace {
        method: CompressionMethod,
        capacity: usize,
    },

    /// Invalid configuration parameter provided.
    ///
    /// This error occurs when levels, widths or strip layouts are out of
    /// range or incompatible with the selected colour model.
    #[error("Invalid configuration parameter: {0}")]
    InvalidConfig(String),

    #[error("Plane count mismatch: expected {expected}, found {actual}")]
    PlaneCountMismatch { expected: usize, actual: usize },

    /// A transfer step was requested from a state that does not allow it.
    #[error("Cannot {operation} while {state:?}")]
    UnexpectedState {
        operation: &'static str,
        state: SessionState,
    },

    /// Failure reported by a sink implemented by the protocol layer.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
