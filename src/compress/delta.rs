//! Method 3, delta row.
//!
//! Octets differing from the seed row are sent as replacements of at most
//! eight octets. A replacement starts with a command octet holding the
//! count minus one in its top three bits and the offset from the end of
//! the previous replacement in its low five bits. Offsets of 31 or more
//! continue in extension octets, 255 meaning "more follows".

use super::{Overflow, Writer};

const MAX_REPLACEMENT: usize = 8;
const OFFSET_LIMIT: usize = 31;

/// Rows of unequal length are compared as if the shorter one were padded
/// with zero octets.
pub(super) fn encode(input: &[u8], seed: &[u8], out: &mut Writer) -> Result<(), Overflow> {
    let common = input.len().min(seed.len());
    let mut cursor = Cursor::default();

    cursor.replace(
        common,
        |pos| input[pos],
        |pos| seed[pos],
        move |start, end| &input[start..end],
        out,
    )?;
    if common < input.len() {
        cursor.replace(
            input.len(),
            |pos| input[pos],
            |_| 0,
            move |start, end| &input[start..end],
            out,
        )?;
    } else {
        let zeros = [0u8; MAX_REPLACEMENT];
        cursor.replace(
            seed.len(),
            |_| 0,
            |pos| seed[pos],
            |start, end| &zeros[..end - start],
            out,
        )?;
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Cursor {
    /// Next position to compare.
    pos: usize,
    /// End of the last replacement.
    sent: usize,
}

impl Cursor {
    fn replace<'r>(
        &mut self,
        bound: usize,
        row: impl Fn(usize) -> u8,
        seed: impl Fn(usize) -> u8,
        octets: impl Fn(usize, usize) -> &'r [u8],
        out: &mut Writer,
    ) -> Result<(), Overflow> {
        while self.pos < bound {
            if row(self.pos) == seed(self.pos) {
                self.pos += 1;
                continue;
            }
            let offset = self.pos - self.sent;
            let start = self.pos;
            self.pos += 1;
            while self.pos < bound
                && self.pos < start + MAX_REPLACEMENT
                && row(self.pos) != seed(self.pos)
            {
                self.pos += 1;
            }
            write_replacement(offset, octets(start, self.pos), out)?;
            self.sent = self.pos;
        }
        Ok(())
    }
}

fn write_replacement(offset: usize, octets: &[u8], out: &mut Writer) -> Result<(), Overflow> {
    debug_assert!((1..=MAX_REPLACEMENT).contains(&octets.len()));
    let command = ((octets.len() - 1) << 5) as u8;
    if offset < OFFSET_LIMIT {
        out.push(command | offset as u8)?;
    } else {
        out.push(command | OFFSET_LIMIT as u8)?;
        let mut rest = offset - OFFSET_LIMIT;
        while rest >= 255 {
            out.push(255)?;
            rest -= 255;
        }
        out.push(rest as u8)?;
    }
    out.extend(octets)
}
