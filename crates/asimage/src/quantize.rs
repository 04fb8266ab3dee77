//! Reduction of 16-bit scaled samples to 8 bits.
//!
//! Input samples carry 8 fractional bits. Accumulators that leave the 16-bit range clamp: a
//! value with any of bits 24 to 30 set is taken to be a negative underflow and becomes 0,
//! anything else above `0xFFFF` saturates.

/// Number of fractional bits carried by scaled samples.
pub const ERROR_BITS: u32 = 8;
const ERROR_MASK: u32 = 0xFF;

const OUT_OF_RANGE: u32 = 0xFFFF_0000;
const UNDERFLOW: u32 = 0x7F00_0000;
const MAX_SCALED: u32 = 0x0000_FFFF;

fn clamp(c: u32, underflow: u32) -> u32 {
    if c & OUT_OF_RANGE == 0 {
        c
    } else if c & underflow != 0 {
        0
    } else {
        MAX_SCALED
    }
}

fn scaled(c: u32, ratio: u32) -> u32 {
    match ratio {
        0 | 1 => c,
        2 => c >> 1,
        ratio => c / ratio,
    }
}

/// Divides every sample by `ratio`.
pub fn divide(src: &[u32], dst: &mut [u32], ratio: u32) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d = scaled(*s, ratio);
    }
}

/// Truncates every sample to 8 bits without error diffusion.
pub fn fast(src: &[u32], dst: &mut [u32], ratio: u32) {
    for (d, s) in dst.iter_mut().zip(src) {
        let c = scaled(*s, ratio);
        *d = if c & OUT_OF_RANGE == 0 {
            c >> ERROR_BITS
        } else if c & UNDERFLOW != 0 {
            0
        } else {
            0xFF
        };
    }
}

/// Quantizes left to right, carrying half of each sample's error into the next one.
///
/// With `ratio > 1` only the incoming sample is divided, the carried error is not.
pub fn fine(src: &[u32], dst: &mut [u32], ratio: u32) {
    let mut carry = 0u32;
    for (d, s) in dst.iter_mut().zip(src) {
        let c = clamp(scaled(*s, ratio).wrapping_add(carry), UNDERFLOW);
        *d = c >> ERROR_BITS;
        carry = (c & ERROR_MASK) >> 1;
    }
}

/// Quantizes `line` in place with the single row diffusion used when no row follows.
pub fn fine_in_place(line: &mut [u32]) {
    let mut carry = 0u32;
    for sample in line.iter_mut() {
        let c = clamp(*sample, 0x7E00_0000).wrapping_add(carry);
        carry = (c & ERROR_MASK) >> 1;
        *sample = if c & 0x00FF_0000 != 0 { 0xFF } else { c >> ERROR_BITS };
    }
}

/// Quantizes `current` in place, spreading its error over the rest of the row and onto `below`.
///
/// ```text
///          X    7/16
///   3/16  5/16  1/16
/// ```
///
/// `below` must still hold scaled samples. It is quantized by the next call, or by
/// [`fine_in_place`] when it is the last row.
pub fn diffuse(current: &mut [u32], below: &mut [u32]) {
    let len = current.len().min(below.len());
    if len == 0 {
        return;
    }

    let c = clamp(current[0], UNDERFLOW);
    let mut prev_err = c & ERROR_MASK;
    current[0] = c >> ERROR_BITS;
    below[0] = below[0].wrapping_add((prev_err * 5) >> 4);

    for i in 1..len {
        let c = clamp(current[i], UNDERFLOW) + ((prev_err * 7) >> 4);
        let err = c & ERROR_MASK;
        current[i] = if c & 0x7FFF_0000 != 0 { 0xFF } else { c >> ERROR_BITS };
        below[i - 1] = below[i - 1].wrapping_add((err * 3) >> 4);
        below[i] = below[i].wrapping_add(((err * 5) >> 4) + (prev_err >> 4));
        prev_err = err;
    }
}
