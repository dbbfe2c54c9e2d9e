//! Method 2, TIFF PackBits.
//!
//! A control octet `n` in `0..=127` is followed by `n + 1` literal octets,
//! `n` in `-127..=-1` by one octet repeated `1 - n` times. `-128` is never
//! emitted.
//!
//! Three or more equal octets always become a repeat. A pair inside a
//! literal stays literal unless it opens a longer run or the literal is
//! close to its limit of 128 octets; a pair at the start of a sequence
//! becomes a repeat. This yields the shortest encoding possible.

use super::{Overflow, Writer};

const MAX_RUN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing pending, `input[i]` starts a new sequence.
    Start,
    /// `last` read, deciding between literal and repeat on `input[i]`.
    Pending,
    /// Counting octets equal to `last`.
    Repeat,
    /// Literal open, `last` not yet stored.
    Literal,
    /// Literal open, `last` equals `input[i]` and neither is stored.
    LiteralPair,
}

pub(super) fn encode(input: &[u8], out: &mut Writer) -> Result<(), Overflow> {
    if input.is_empty() {
        return Ok(());
    }
    let end = input.len() - 1;
    let mut i = 0;
    let mut last = 0u8;
    let mut repeated = 0;
    let mut stored = 0;
    let mut control = 0;
    let mut state = State::Start;

    loop {
        state = match state {
            State::Start => {
                if i == end {
                    out.push(0)?;
                    out.push(input[i])?;
                    return Ok(());
                }
                last = input[i];
                i += 1;
                State::Pending
            }

            State::Pending => {
                if input[i] != last {
                    control = out.reserve()?;
                    stored = 0;
                    State::Literal
                } else {
                    repeated = 2;
                    State::Repeat
                }
            }

            State::Repeat => {
                while i < end {
                    i += 1;
                    if input[i] != last {
                        break;
                    }
                    repeated += 1;
                    if repeated >= MAX_RUN {
                        break;
                    }
                }
                out.push((257 - repeated) as u8)?;
                out.push(last)?;

                if input[i] != last {
                    State::Start
                } else if i == end {
                    return Ok(());
                } else {
                    i += 1;
                    State::Start
                }
            }

            State::Literal => {
                loop {
                    out.push(last)?;
                    stored += 1;
                    if i == end {
                        out.push(input[i])?;
                        stored += 1;
                        out.patch(control, (stored - 1) as u8);
                        return Ok(());
                    }
                    last = input[i];
                    i += 1;
                    if input[i] == last || stored > MAX_RUN - 2 {
                        break;
                    }
                }

                if input[i] == last {
                    if stored < MAX_RUN - 2 {
                        State::LiteralPair
                    } else {
                        out.patch(control, (stored - 1) as u8);
                        repeated = 2;
                        State::Repeat
                    }
                } else {
                    // full literal
                    out.push(last)?;
                    stored += 1;
                    out.patch(control, (stored - 1) as u8);
                    State::Start
                }
            }

            State::LiteralPair => {
                if i == end {
                    out.push(last)?;
                    out.push(input[i])?;
                    stored += 2;
                    out.patch(control, (stored - 1) as u8);
                    return Ok(());
                }
                i += 1;
                if input[i] == last {
                    out.patch(control, (stored - 1) as u8);
                    repeated = 3;
                    State::Repeat
                } else {
                    out.push(last)?;
                    stored += 1;
                    State::Literal
                }
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::decode;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    fn pack(input: &[u8]) -> Vec<u8> {
        let mut storage = vec![0; 2 * input.len() + 2];
        let mut out = Writer::new(&mut storage);
        encode(input, &mut out).unwrap();
        let n = out.len();
        storage.truncate(n);
        storage
    }

    /// Length of the shortest PackBits encoding of `input`.
    fn optimum(input: &[u8]) -> usize {
        let n = input.len();
        let mut best = vec![usize::MAX; n + 1];
        best[0] = 0;
        for i in 1..=n {
            for k in 1..=i.min(MAX_RUN) {
                let start = i - k;
                let literal = best[start] + 1 + k;
                best[i] = best[i].min(literal);
                if k >= 2 && input[start..i].iter().all(|&b| b == input[start]) {
                    best[i] = best[i].min(best[start] + 2);
                }
            }
        }
        best[n]
    }

    #[test]
    fn test_literal_then_repeat() {
        assert_eq!(pack(&[1, 2, 3, 3, 3]), vec![1, 1, 2, 254, 3]);
    }

    #[test]
    fn test_pair_inside_literal_stays_literal() {
        assert_eq!(pack(&[1, 2, 2, 3]), vec![3, 1, 2, 2, 3]);
    }

    #[test]
    fn test_leading_pair_is_a_repeat() {
        assert_eq!(pack(&[4, 4, 5]), vec![255, 4, 0, 5]);
    }

    #[test]
    fn test_single_octet() {
        assert_eq!(pack(&[9]), vec![0, 9]);
    }

    #[test]
    fn test_long_runs_split_at_128() {
        let out = pack(&[6; 130]);
        assert_eq!(out, vec![129, 6, 255, 6]);
        assert_eq!(decode::packbits(&out), vec![6; 130]);

        let out = pack(&[6; 129]);
        assert_eq!(out, vec![129, 6, 0, 6]);
    }

    #[test]
    fn test_long_literal_split_at_128() {
        let input: Vec<u8> = (0..200u32).map(|v| (v % 251) as u8).collect();
        let out = pack(&input);
        assert_eq!(out[0], 127);
        assert_eq!(out[129], 71);
        assert_eq!(out.len(), 202);
        assert_eq!(decode::packbits(&out), input);
    }

    #[test]
    fn test_never_emits_noop_control() {
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..200 {
            let input: Vec<u8> = (0..rng.gen_range(1..400)).map(|_| rng.gen_range(0..3)).collect();
            let out = pack(&input);
            let mut i = 0;
            while i < out.len() {
                let control = out[i] as i8;
                assert_ne!(control, -128);
                i += if control >= 0 { control as usize + 2 } else { 2 };
            }
        }
    }

    #[test]
    fn test_output_is_minimal() {
        let mut rng = SmallRng::seed_from_u64(0xfeed);
        for _ in 0..2000 {
            let len = rng.gen_range(1..40);
            let alphabet = rng.gen_range(1..4);
            let input: Vec<u8> = (0..len).map(|_| rng.gen_range(0..alphabet)).collect();
            let out = pack(&input);
            assert_eq!(decode::packbits(&out), input);
            assert_eq!(out.len(), optimum(&input), "input {:?}", input);
        }
    }

    #[test]
    fn test_minimal_around_literal_limit() {
        let mut rng = SmallRng::seed_from_u64(99);
        for _ in 0..300 {
            // a distinct literal close to 128 octets followed by short runs
            let mut input: Vec<u8> = (0..rng.gen_range(120..135)).map(|v| (v % 200 + 10) as u8).collect();
            for _ in 0..rng.gen_range(1..6) {
                let value = rng.gen_range(0..3);
                input.extend(std::iter::repeat(value).take(rng.gen_range(1..5)));
            }
            let out = pack(&input);
            assert_eq!(decode::packbits(&out), input);
            assert_eq!(out.len(), optimum(&input), "input {:?}", input);
        }
    }
}
