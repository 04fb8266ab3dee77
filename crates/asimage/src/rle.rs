//! Per-row, per-channel run-length codec.
//!
//! Each compressed row is a sequence of control bytes followed by their payload:
//!
//! - `0x00`: end of line.
//! - `0xFF`: every remaining sample of the row follows as a literal byte.
//! - `0x80..=0xFE`: `(ctrl & 0x7F) + 1` literal bytes follow.
//! - `0x40..=0x7F`: long run. `(ctrl & 0x3F)` is the high byte and the next byte the low byte of
//!   the repeat count. The sample value comes last.
//! - `0x01..=0x3F`: short run of `ctrl` repeats. The sample value follows.
//!
//! Repeat counts are stored minus one, so a short run covers 2 to 64 samples and a long run up
//! to 16384. Rows are only ever produced by [`encode`] and [`encode_mono`]. Decoding a stream
//! that did not come from them never reads or writes out of bounds, but the decoded samples
//! are unspecified.

use core::fmt;

use crate::error::ImageError;

pub const EOL: u8 = 0x00;
pub const DIRECT_TAIL: u8 = 0xFF;

const DIRECT_FLAG: u8 = 0x80;
const DIRECT_MASK: u8 = 0x7F;
const LONG_FLAG: u8 = 0x40;
const LONG_MASK: u8 = 0x3F;

const THRESHOLD: usize = 1;
const MAX_SIMPLE_COUNT: usize = 0x3F;
const MAX_DIRECT_LEN: usize = 0x7F;
const MAX_LONG_RUN: usize = 0x3FFF + THRESHOLD;

const SCRATCH_GRANULARITY: usize = 1024;

/// Reusable work memory for encoding and tiled decoding.
///
/// Every encode or decode session owns one, so sessions never share state.
#[derive(Default)]
pub struct ScratchBuffer {
    encoded: Vec<u8>,
    decoded: Vec<u8>,
}

impl ScratchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cleared encode buffer, grown to hold at least `capacity` bytes.
    pub fn encoded(&mut self, capacity: usize) -> Result<&mut Vec<u8>, ImageError> {
        self.encoded.clear();
        grow(&mut self.encoded, capacity)?;
        Ok(&mut self.encoded)
    }

    /// Returns a zeroed decode buffer of exactly `len` bytes.
    pub fn decoded(&mut self, len: usize) -> Result<&mut [u8], ImageError> {
        self.decoded.clear();
        grow(&mut self.decoded, len)?;
        self.decoded.resize(len, 0);
        Ok(&mut self.decoded)
    }
}

impl fmt::Debug for ScratchBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScratchBuffer")
            .field("encoded_capacity", &self.encoded.capacity())
            .field("decoded_capacity", &self.decoded.capacity())
            .finish()
    }
}

fn grow(buffer: &mut Vec<u8>, capacity: usize) -> Result<(), ImageError> {
    if buffer.capacity() >= capacity {
        return Ok(());
    }

    let rounded = capacity.div_ceil(SCRATCH_GRANULARITY) * SCRATCH_GRANULARITY;
    buffer
        .try_reserve_exact(rounded)
        .map_err(|_| ImageError::Allocation(rounded))
}

/// Compresses one channel row into `out`, replacing its contents.
///
/// Only the first `max_compressed_width` samples are considered for run detection. The rest of
/// the row is always written as a literal tail. Samples are truncated to 8 bits.
pub fn encode(row: &[u32], max_compressed_width: usize, out: &mut Vec<u8>) {
    out.clear();

    let width = row.len();
    let sample = |i: usize| row[i] as u8;

    match width {
        0 => {
            out.push(EOL);
            return;
        }
        1 => {
            out.extend([DIRECT_TAIL, sample(0)]);
            return;
        }
        _ => {}
    }

    let scan = max_compressed_width.min(width);

    let mut i = 0;
    let mut block_start = 0;
    let mut run_start = 0;

    // Cheapest point at which the rest of the row could be dumped as a literal tail, expressed
    // as "bytes written" minus "samples consumed".
    let mut best_size = 0isize;
    let mut best_tail = 0;
    let mut best_block_start = 0;

    while i < scan {
        while i < scan && sample(i) == sample(run_start) {
            i += 1;
        }

        if i > run_start + THRESHOLD {
            push_run(out, i - run_start, sample(run_start));
            block_start = i;
            run_start = i;
        }

        while i < scan {
            if sample(i) != sample(run_start) {
                run_start = i;
            } else if i - run_start > THRESHOLD {
                break;
            }
            i += 1;
        }

        if i == scan {
            run_start = i;
        }

        while run_start > block_start {
            let size = signed(out.len()) - signed(block_start);
            if size < best_size {
                best_size = size;
                best_tail = out.len();
                best_block_start = block_start;
            }

            let len = (run_start - block_start).min(MAX_DIRECT_LEN);
            out.push(DIRECT_FLAG | (len - 1) as u8);
            out.extend(row[block_start..block_start + len].iter().map(|v| *v as u8));
            block_start += len;
        }
    }

    if best_size + signed(width) < signed(out.len()) {
        out.truncate(best_tail);
        out.push(DIRECT_TAIL);
        out.extend(row[best_block_start..].iter().map(|v| *v as u8));
    } else if i < width {
        out.push(DIRECT_TAIL);
        out.extend(row[i..].iter().map(|v| *v as u8));
    } else {
        out.push(EOL);
    }
}

/// Compresses a row made of `width` copies of `value` into `out`.
pub fn encode_mono(value: u8, width: usize, out: &mut Vec<u8>) {
    out.clear();

    match width {
        0 => out.push(EOL),
        1 => out.extend([DIRECT_TAIL, value]),
        _ => {
            push_run(out, width, value);
            out.push(EOL);
        }
    }
}

fn push_run(out: &mut Vec<u8>, mut len: usize, value: u8) {
    // Never leave a remainder of one sample: a count of zero would read as end of line.
    while len > MAX_LONG_RUN {
        let chunk = MAX_LONG_RUN.min(len - 2);
        push_single_run(out, chunk, value);
        len -= chunk;
    }
    push_single_run(out, len, value);
}

fn push_single_run(out: &mut Vec<u8>, len: usize, value: u8) {
    let count = len - THRESHOLD;
    if count <= MAX_SIMPLE_COUNT {
        out.extend([count as u8, value]);
    } else {
        out.extend([((count >> 8) as u8 & LONG_MASK) | LONG_FLAG, count as u8, value]);
    }
}

fn signed(value: usize) -> isize {
    isize::try_from(value).unwrap_or(isize::MAX)
}

/// One control block of a compressed row.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Block<'a> {
    /// Short run, two bytes on the wire.
    Run { len: usize, value: u8 },
    /// Long run, three bytes on the wire.
    LongRun { len: usize, value: u8 },
    Direct(&'a [u8]),
    Tail(&'a [u8]),
}

impl Block<'_> {
    /// Number of samples the block decodes to.
    pub fn len(&self) -> usize {
        match self {
            Block::Run { len, .. } | Block::LongRun { len, .. } => *len,
            Block::Direct(bytes) | Block::Tail(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of bytes the block occupies in the stream.
    pub fn encoded_len(&self) -> usize {
        match self {
            Block::Run { .. } => 2,
            Block::LongRun { .. } => 3,
            Block::Direct(bytes) | Block::Tail(bytes) => 1 + bytes.len(),
        }
    }
}

impl fmt::Debug for Block<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Block::Run { len, value } => write!(f, "Run({len} x {value:#04X})"),
            Block::LongRun { len, value } => write!(f, "LongRun({len} x {value:#04X})"),
            Block::Direct(bytes) => write!(f, "Direct({bytes:02X?})"),
            Block::Tail(bytes) => write!(f, "Tail({bytes:02X?})"),
        }
    }
}

/// Iterator over the control blocks of a compressed row.
#[derive(Debug, Clone)]
pub struct Blocks<'a> {
    src: &'a [u8],
    pos: usize,
    remaining: usize,
}

impl Blocks<'_> {
    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for Blocks<'a> {
    type Item = Block<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let ctrl = *self.src.get(self.pos)?;

        let block = if ctrl == EOL {
            return None;
        } else if ctrl == DIRECT_TAIL {
            let start = self.pos + 1;
            let end = (start + self.remaining).min(self.src.len());
            self.pos = end;
            Block::Tail(self.src.get(start..end)?)
        } else if ctrl & DIRECT_FLAG != 0 {
            let start = self.pos + 1;
            let end = (start + usize::from(ctrl & DIRECT_MASK) + 1).min(self.src.len());
            self.pos = end;
            Block::Direct(self.src.get(start..end)?)
        } else if ctrl & LONG_FLAG != 0 {
            let low = *self.src.get(self.pos + 1)?;
            let value = *self.src.get(self.pos + 2)?;
            self.pos += 3;
            let count = (usize::from(ctrl & LONG_MASK) << 8) | usize::from(low);
            Block::LongRun {
                len: count + THRESHOLD,
                value,
            }
        } else {
            let value = *self.src.get(self.pos + 1)?;
            self.pos += 2;
            Block::Run {
                len: usize::from(ctrl) + THRESHOLD,
                value,
            }
        };

        self.remaining = self.remaining.saturating_sub(block.len());

        Some(block)
    }
}

/// Iterates over the blocks of `src`, stopping after `width` samples or at end of line.
pub fn blocks(src: &[u8], width: usize) -> Blocks<'_> {
    Blocks {
        src,
        pos: 0,
        remaining: width,
    }
}

/// Decodes `src` into the first `width` elements of `dst`.
///
/// Returns the number of samples written, which is `min(width, dst.len())` for well-formed rows.
pub fn decode<T: From<u8> + Copy>(src: &[u8], width: usize, dst: &mut [T]) -> usize {
    let limit = width.min(dst.len());
    let mut x = 0;

    for block in blocks(src, limit) {
        match block {
            Block::Run { len, value } | Block::LongRun { len, value } => {
                let end = (x + len).min(limit);
                dst[x..end].fill(T::from(value));
                x = end;
            }
            Block::Direct(bytes) | Block::Tail(bytes) => {
                let count = bytes.len().min(limit - x);
                for (d, s) in dst[x..x + count].iter_mut().zip(bytes) {
                    *d = T::from(*s);
                }
                x += count;
            }
        }

        if x >= limit {
            break;
        }
    }

    x
}

/// Decodes `src` (a row of `width` samples) into `out_width` samples of `dst`.
///
/// Output starts at sample `skip % width` of the row and wraps around to the row start as often
/// as needed, which tiles the row horizontally. Returns the number of samples written.
pub fn decode_tiled(
    src: &[u8],
    width: usize,
    dst: &mut [u32],
    skip: usize,
    out_width: usize,
    scratch: &mut ScratchBuffer,
) -> Result<usize, ImageError> {
    let out_width = out_width.min(dst.len());
    if width == 0 || out_width == 0 {
        return Ok(0);
    }

    if skip > 0 || out_width < width {
        let row = scratch.decoded(width)?;
        let decoded = decode(src, width, row);
        if decoded == 0 {
            return Ok(0);
        }

        let mut pos = skip % decoded;
        for d in dst[..out_width].iter_mut() {
            *d = u32::from(row[pos]);
            pos += 1;
            if pos == decoded {
                pos = 0;
            }
        }
    } else {
        let decoded = decode(src, width, &mut dst[..width]);
        if decoded == 0 {
            return Ok(0);
        }

        let mut filled = decoded;
        while filled < out_width {
            let count = decoded.min(out_width - filled);
            dst.copy_within(0..count, filled);
            filled += count;
        }
    }

    Ok(out_width)
}

/// Length in bytes of a well-formed row of `width` samples at the start of `src`.
///
/// Returns `None` when the stream is truncated, overflows the row or misses its terminator.
pub fn stream_len(src: &[u8], width: usize) -> Option<usize> {
    let mut blocks = blocks(src, width);
    let mut decoded = 0;
    let mut tail = false;

    for block in blocks.by_ref() {
        decoded += block.len();
        tail = matches!(block, Block::Tail(_));
    }

    if decoded != width {
        return None;
    }

    if tail {
        Some(blocks.position())
    } else {
        (src.get(blocks.position()) == Some(&EOL)).then(|| blocks.position() + 1)
    }
}

/// Finds the inclusive `(start, end)` spans of samples greater than or equal to `threshold`.
///
/// Works on the compressed stream directly, one comparison per run.
pub fn threshold_runs(src: &[u8], width: usize, threshold: u8) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut open: Option<(usize, usize)> = None;
    let mut x = 0;

    let mut visit = |x: usize, len: usize, pass: bool, runs: &mut Vec<(usize, usize)>| {
        if pass {
            let end = x + len - 1;
            open = Some(open.map_or((x, end), |(start, _)| (start, end)));
        } else if let Some(span) = open.take() {
            runs.push(span);
        }
    };

    for block in blocks(src, width) {
        match block {
            Block::Run { len, value } | Block::LongRun { len, value } => {
                let len = len.min(width - x);
                if len > 0 {
                    visit(x, len, value >= threshold, &mut runs);
                }
                x += len;
            }
            Block::Direct(bytes) | Block::Tail(bytes) => {
                for value in bytes.iter().take(width - x) {
                    visit(x, 1, *value >= threshold, &mut runs);
                    x += 1;
                }
            }
        }
    }

    if let Some(span) = open {
        runs.push(span);
    }

    runs
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;

    fn encoded(row: &[u32], max_compressed_width: usize) -> Vec<u8> {
        let mut out = Vec::new();
        encode(row, max_compressed_width, &mut out);
        out
    }

    #[test]
    fn uniform_row_is_a_short_run() {
        let row = [200; 10];
        assert_eq!(encoded(&row, 10), [0x09, 200, EOL]);
    }

    #[test]
    fn alternating_row_is_stored_literally() {
        let row: Vec<u32> = (0..10).map(|i| if i % 2 == 0 { 0 } else { 255 }).collect();
        let out = encoded(&row, 10);

        assert_eq!(out[0], DIRECT_TAIL);
        assert_eq!(out.len(), 11);
        assert_eq!(&out[1..], &[0, 255, 0, 255, 0, 255, 0, 255, 0, 255]);
    }

    #[test]
    fn single_sample_row() {
        assert_eq!(encoded(&[42], 1), [DIRECT_TAIL, 42]);
        assert_eq!(encoded(&[42], 0), [DIRECT_TAIL, 42]);

        let mut out = Vec::new();
        encode_mono(42, 1, &mut out);
        assert_eq!(out, [DIRECT_TAIL, 42]);
    }

    #[test]
    fn mixed_row_blocks() {
        let row = [7, 7, 7, 7, 1, 2, 3, 9, 9, 9, 9, 9, 9, 4, 5];
        let out = encoded(&row, row.len());

        expect![[r#"
            [
                Run(4 x 0x07),
                Direct([01, 02, 03]),
                Run(6 x 0x09),
                Tail([04, 05]),
            ]
        "#]]
        .assert_debug_eq(&blocks(&out, row.len()).collect::<Vec<_>>());
        assert_eq!(stream_len(&out, row.len()), Some(out.len()));
    }

    #[test]
    fn long_runs_are_split() {
        let mut out = Vec::new();

        encode_mono(3, 1000, &mut out);
        assert_eq!(out, [0x43, 0xE7, 3, EOL]);

        encode_mono(3, 16385, &mut out);
        expect![[r#"
            [
                LongRun(16383 x 0x03),
                Run(2 x 0x03),
            ]
        "#]]
        .assert_debug_eq(&blocks(&out, 16385).collect::<Vec<_>>());

        let row = vec![11u32; 40_000];
        encode(&row, row.len(), &mut out);
        let mut decoded = vec![0u8; row.len()];
        assert_eq!(decode(&out, row.len(), &mut decoded), row.len());
        assert!(decoded.iter().all(|v| *v == 11));
    }

    #[test]
    fn unscanned_remainder_becomes_tail() {
        let row = [5; 8];
        let out = encoded(&row, 4);

        assert_eq!(out, [0x03, 5, DIRECT_TAIL, 5, 5, 5, 5]);
        assert_eq!(stream_len(&out, 8), Some(7));
    }

    #[test]
    fn zero_compression_stores_everything_literally() {
        let row = [1, 1, 1, 1];
        assert_eq!(encoded(&row, 0), [DIRECT_TAIL, 1, 1, 1, 1]);
    }

    #[test]
    fn decode_with_skip_and_extension() {
        let row = [1, 2, 3, 4];
        let out = encoded(&row, 4);
        let mut scratch = ScratchBuffer::new();

        let mut dst = [0u32; 8];
        assert_eq!(decode_tiled(&out, 4, &mut dst, 0, 8, &mut scratch), Ok(8));
        assert_eq!(dst, [1, 2, 3, 4, 1, 2, 3, 4]);

        let mut dst = [0u32; 6];
        assert_eq!(decode_tiled(&out, 4, &mut dst, 5, 6, &mut scratch), Ok(6));
        assert_eq!(dst, [2, 3, 4, 1, 2, 3]);

        let mut dst = [0u32; 2];
        assert_eq!(decode_tiled(&out, 4, &mut dst, 0, 2, &mut scratch), Ok(2));
        assert_eq!(dst, [1, 2]);
    }

    #[test]
    fn malformed_streams_are_rejected() {
        assert_eq!(stream_len(&[0x09, 200], 10), None);
        assert_eq!(stream_len(&[0x09, 200, EOL], 9), None);
        assert_eq!(stream_len(&[0x83, 1, 2], 4), None);

        let mut dst = [0u8; 4];
        assert_eq!(decode(&[0x3F, 1, EOL], 4, &mut dst), 4);
        assert_eq!(dst, [1; 4]);
    }

    #[test]
    fn threshold_runs_on_compressed_data() {
        let row = [0, 0, 0, 200, 210, 10, 255, 255, 255, 255];
        let out = encoded(&row, row.len());

        expect![[r#"
            [
                (
                    3,
                    4,
                ),
                (
                    6,
                    9,
                ),
            ]
        "#]]
        .assert_debug_eq(&threshold_runs(&out, row.len(), 128));
        assert_eq!(threshold_runs(&out, row.len(), 0), [(0, 9)]);
    }
}
