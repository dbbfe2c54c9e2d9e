//! PCL raster compression methods.
//!
//! Every codec writes into caller-owned storage and fails with
//! [`Error::InsufficientSpace`] as soon as its output would exceed the
//! available room. On failure the logical length of the output is left as
//! it was, but its storage may have been partly overwritten.

mod crdr;
mod delta;
mod packbits;

use crate::{error::Error, octets::OctetString};

/// Raster compression method, as selected with the PCL `ESC * b # M` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    None,
    RunLength,
    /// TIFF revision 4.0 PackBits.
    PackBits,
    DeltaRow,
    CompressedReplacementDeltaRow,
}

impl CompressionMethod {
    /// PCL method number.
    pub fn code(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::RunLength => 1,
            Self::PackBits => 2,
            Self::DeltaRow => 3,
            Self::CompressedReplacementDeltaRow => 9,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::RunLength),
            2 => Some(Self::PackBits),
            3 => Some(Self::DeltaRow),
            9 => Some(Self::CompressedReplacementDeltaRow),
            _ => None,
        }
    }

    /// Whether the method encodes a row relative to the row sent before.
    pub fn is_differential(&self) -> bool {
        matches!(self, Self::DeltaRow | Self::CompressedReplacementDeltaRow)
    }
}

/// Output did not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Overflow;

/// Bounded writer over the storage of an output string.
pub(crate) struct Writer<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Writer { buf, len: 0 }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn push(&mut self, octet: u8) -> Result<(), Overflow> {
        let slot = self.buf.get_mut(self.len).ok_or(Overflow)?;
        *slot = octet;
        self.len += 1;
        Ok(())
    }

    pub(crate) fn extend(&mut self, octets: &[u8]) -> Result<(), Overflow> {
        let end = self.len + octets.len();
        if end > self.buf.len() {
            return Err(Overflow);
        }
        self.buf[self.len..end].copy_from_slice(octets);
        self.len = end;
        Ok(())
    }

    /// Reserve one octet to be filled in later with [`Writer::patch`].
    pub(crate) fn reserve(&mut self) -> Result<usize, Overflow> {
        let at = self.len;
        self.push(0)?;
        Ok(at)
    }

    pub(crate) fn patch(&mut self, at: usize, octet: u8) {
        self.buf[at] = octet;
    }
}

/// Compress `input` into `output` using its full capacity.
///
/// `seed` is the row previously sent and is only used by the differential
/// methods, where a missing seed stands for an empty (all-zero) row. On
/// success the length of `output` is the length of the compressed data; a
/// differential encoding of a row identical to its seed is empty.
pub fn compress(
    method: CompressionMethod,
    input: &OctetString,
    seed: Option<&OctetString>,
    output: &mut OctetString,
) -> Result<(), Error> {
    let limit = output.capacity();
    compress_within(method, input, seed, output, limit)
}

/// Like [`compress`], but never writes more than `limit` octets.
pub fn compress_within(
    method: CompressionMethod,
    input: &OctetString,
    seed: Option<&OctetString>,
    output: &mut OctetString,
    limit: usize,
) -> Result<(), Error> {
    let limit = limit.min(output.capacity());
    let input = input.as_bytes();
    let seed = seed.map_or(&[][..], |s| s.as_bytes());

    let written = {
        let mut out = Writer::new(&mut output.storage_mut()[..limit]);
        let result = match method {
            CompressionMethod::None => out.extend(input),
            CompressionMethod::RunLength => run_length(input, &mut out),
            CompressionMethod::PackBits => packbits::encode(input, &mut out),
            CompressionMethod::DeltaRow => delta::encode(input, seed, &mut out),
            CompressionMethod::CompressedReplacementDeltaRow => crdr::encode(input, seed, &mut out),
        };
        result.map(|()| out.len())
    };

    match written {
        Ok(length) => {
            output.set_len(length);
            Ok(())
        }
        Err(Overflow) => Err(Error::InsufficientSpace {
            method,
            capacity: limit,
        }),
    }
}

/// Method 1: `(count - 1, value)` pairs, runs of at most 256 octets.
fn run_length(input: &[u8], out: &mut Writer) -> Result<(), Overflow> {
    let mut rest = input;
    while let Some(&value) = rest.first() {
        let run = rest
            .iter()
            .take(256)
            .take_while(|&&octet| octet == value)
            .count();
        out.push((run - 1) as u8)?;
        out.push(value)?;
        rest = &rest[run..];
    }
    Ok(())
}
