//! Method 9, compressed replacement delta row.
//!
//! Like delta row, but a replacement has no size limit and is itself split
//! into sections: runs of equal octets sent compressed (command, value) and
//! literals sent uncompressed (command, octets). The split is the shortest
//! one; a short run inside a literal stays part of it.
//!
//! Command octet, compressed: `1 oo ccccc`, offset up to 3 and count minus
//! two up to 31. Uncompressed: `0 oooo ccc`, offset up to 15 and count
//! minus one up to 7. A field at its maximum continues in extension octets,
//! offset first, each chain ending in an octet below 255.

use super::{Overflow, Writer};

pub(super) fn encode(input: &[u8], seed: &[u8], out: &mut Writer) -> Result<(), Overflow> {
    let common = input.len().min(seed.len());
    let mut cursor = Cursor::default();

    cursor.replace(
        common,
        |pos| input[pos],
        |pos| seed[pos],
        move |start, end| Some(&input[start..end]),
        out,
    )?;
    if common < input.len() {
        cursor.replace(
            input.len(),
            |pos| input[pos],
            |_| 0,
            move |start, end| Some(&input[start..end]),
            out,
        )?;
    } else {
        cursor.replace(seed.len(), |_| 0, |pos| seed[pos], |_, _| None, out)?;
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Cursor {
    pos: usize,
    sent: usize,
}

impl Cursor {
    /// `octets` yields the replacement for a range, `None` for zeros.
    fn replace<'r>(
        &mut self,
        bound: usize,
        row: impl Fn(usize) -> u8,
        seed: impl Fn(usize) -> u8,
        octets: impl Fn(usize, usize) -> Option<&'r [u8]>,
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
            while self.pos < bound && row(self.pos) != seed(self.pos) {
                self.pos += 1;
            }
            match octets(start, self.pos) {
                Some(octets) => write_replacement(offset, octets, out)?,
                None => write_zeros(offset, self.pos - start, out)?,
            }
            self.sent = self.pos;
        }
        Ok(())
    }
}

fn write_zeros(offset: usize, count: usize, out: &mut Writer) -> Result<(), Overflow> {
    if count == 1 {
        write_uncompressed(offset, &[0], out)
    } else {
        write_compressed(offset, 0, count, out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Literal(usize),
    Run(usize),
}

impl Section {
    fn len(&self) -> usize {
        match *self {
            Section::Literal(len) | Section::Run(len) => len,
        }
    }
}

/// Send `octets` as the shortest sequence of literal and run sections.
/// Only the first section carries `offset`.
fn write_replacement(offset: usize, octets: &[u8], out: &mut Writer) -> Result<(), Overflow> {
    let mut offset = offset;
    let mut pos = 0;
    for section in plan_sections(offset, octets) {
        match section {
            Section::Literal(len) => write_uncompressed(offset, &octets[pos..pos + len], out)?,
            Section::Run(len) => write_compressed(offset, octets[pos], len, out)?,
        }
        pos += section.len();
        offset = 0;
    }
    Ok(())
}

/// Cheapest split of a replacement, computed backwards from its end.
///
/// On equal cost a longer run wins over a shorter one, and runs win over
/// literals.
fn plan_sections(offset: usize, octets: &[u8]) -> Vec<Section> {
    let n = octets.len();
    let mut cost = vec![0usize; n + 1];
    let mut choice = vec![Section::Literal(1); n];

    for i in (0..n).rev() {
        let offset = if i == 0 { offset } else { 0 };
        let mut run = 1;
        while i + run < n && octets[i + run] == octets[i] {
            run += 1;
        }

        let mut best = usize::MAX;
        for len in (2..=run).rev() {
            let total = command_len(true, offset, len - 2) + 1 + cost[i + len];
            if total < best {
                best = total;
                choice[i] = Section::Run(len);
            }
        }
        for len in 1..=n - i {
            let total = command_len(false, offset, len - 1) + len + cost[i + len];
            if total < best {
                best = total;
                choice[i] = Section::Literal(len);
            }
        }
        cost[i] = best;
    }

    let mut sections = Vec::new();
    let mut pos = 0;
    while pos < n {
        sections.push(choice[pos]);
        pos += choice[pos].len();
    }
    sections
}

fn write_uncompressed(offset: usize, octets: &[u8], out: &mut Writer) -> Result<(), Overflow> {
    write_command(false, offset, octets.len() - 1, out)?;
    out.extend(octets)
}

fn write_compressed(offset: usize, value: u8, count: usize, out: &mut Writer) -> Result<(), Overflow> {
    debug_assert!(count >= 2);
    write_command(true, offset, count - 2, out)?;
    out.push(value)
}

/// Flag, offset maximum, offset shift and count maximum of a command octet.
fn command_fields(compressed: bool) -> (u8, usize, u32, usize) {
    if compressed {
        (0x80, 3, 5, 31)
    } else {
        (0x00, 15, 3, 7)
    }
}

/// Octets taken by a command with its extensions.
fn command_len(compressed: bool, offset: usize, count: usize) -> usize {
    let (_, offset_max, _, count_max) = command_fields(compressed);
    let extension = |value: usize, max: usize| if value >= max { (value - max) / 255 + 1 } else { 0 };
    1 + extension(offset, offset_max) + extension(count, count_max)
}

fn write_command(compressed: bool, offset: usize, count: usize, out: &mut Writer) -> Result<(), Overflow> {
    let (flag, offset_max, shift, count_max) = command_fields(compressed);
    out.push(flag | (offset.min(offset_max) << shift) as u8 | count.min(count_max) as u8)?;
    if offset >= offset_max {
        write_extension(offset - offset_max, out)?;
    }
    if count >= count_max {
        write_extension(count - count_max, out)?;
    }
    Ok(())
}

fn write_extension(mut rest: usize, out: &mut Writer) -> Result<(), Overflow> {
    while rest >= 255 {
        out.push(255)?;
        rest -= 255;
    }
    out.push(rest as u8)
}
