//! Compressed image storage.
//!
//! An [`AsImage`] keeps one optional compressed byte stream per channel and row. An absent row
//! reads as the matching channel of the image background color, which makes flat or fully
//! transparent planes free.

use core::fmt;

use bitflags::bitflags;

use crate::color::{Argb32, Channel, ChannelFlags};
use crate::error::ImageError;
use crate::native::PixelBuffer;
use crate::rle::{self, Block, ScratchBuffer};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ImageFlags: u8 {
        /// Channel rows are stale. The native buffer in the alternate cache holds the pixels.
        const DATA_NOT_USEFUL = 0x01;
    }
}

/// Cached alternate representation of an image.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AltImage {
    #[default]
    None,
    Native {
        image: Option<PixelBuffer>,
        mask: Option<PixelBuffer>,
    },
    Argb32(Vec<Argb32>),
    Vector(Vec<f64>),
}

/// Axis-aligned rectangle in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// Size breakdown of one compressed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineStats {
    pub bytes: usize,
    pub runs: usize,
    pub run_samples: usize,
    pub direct_blocks: usize,
    pub direct_samples: usize,
}

/// Memory summary of a whole image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageStats {
    pub width: usize,
    pub height: usize,
    pub stored_rows: usize,
    pub compressed_bytes: usize,
    pub uncompressed_bytes: usize,
}

impl ImageStats {
    /// Compressed size as a percentage of the raw four channel size.
    pub fn ratio_percent(&self) -> usize {
        if self.uncompressed_bytes == 0 {
            0
        } else {
            self.compressed_bytes * 100 / self.uncompressed_bytes
        }
    }
}

type Row = Option<Box<[u8]>>;

#[derive(Clone)]
pub struct AsImage {
    width: usize,
    height: usize,
    rows: [Vec<Row>; Channel::COUNT],
    back_color: Argb32,
    compression: u32,
    max_compressed_width: usize,
    flags: ImageFlags,
    alt: AltImage,
}

impl AsImage {
    /// Creates an empty image.
    ///
    /// `compression` is the percentage (0 to 100) of each row that is scanned for runs. The
    /// remainder of a row is always stored literally.
    pub fn new(width: usize, height: usize, compression: u32) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::InvalidDimensions { width, height });
        }

        let compression = compression.min(100);
        let max_compressed_width = (width * compression as usize / 100).min(width);

        let mut rows: [Vec<Row>; Channel::COUNT] = Default::default();
        for channel in rows.iter_mut() {
            channel
                .try_reserve_exact(height)
                .map_err(|_| ImageError::Allocation(height * size_of::<Row>()))?;
            channel.resize(height, None);
        }

        Ok(Self {
            width,
            height,
            rows,
            back_color: Argb32::DEFAULT_BACK,
            compression,
            max_compressed_width,
            flags: ImageFlags::empty(),
            alt: AltImage::None,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn back_color(&self) -> Argb32 {
        self.back_color
    }

    pub fn set_back_color(&mut self, back_color: Argb32) {
        self.back_color = back_color;
    }

    pub fn compression(&self) -> u32 {
        self.compression
    }

    pub fn max_compressed_width(&self) -> usize {
        self.max_compressed_width
    }

    pub fn flags(&self) -> ImageFlags {
        self.flags
    }

    pub fn alt(&self) -> &AltImage {
        &self.alt
    }

    pub(crate) fn alt_mut(&mut self) -> &mut AltImage {
        &mut self.alt
    }

    /// The cached native buffer, if any.
    pub fn native(&self) -> Option<&PixelBuffer> {
        match &self.alt {
            AltImage::Native { image, .. } => image.as_ref(),
            _ => None,
        }
    }

    /// The cached native mask buffer, if any.
    pub fn native_mask(&self) -> Option<&PixelBuffer> {
        match &self.alt {
            AltImage::Native { mask, .. } => mask.as_ref(),
            _ => None,
        }
    }

    /// The cached ARGB32 pixels, if any.
    pub fn argb32(&self) -> Option<&[Argb32]> {
        match &self.alt {
            AltImage::Argb32(pixels) => Some(pixels),
            _ => None,
        }
    }

    pub fn vector(&self) -> Option<&[f64]> {
        match &self.alt {
            AltImage::Vector(values) => Some(values),
            _ => None,
        }
    }

    /// Attaches one value per pixel to the image. Returns `false` when the length is wrong.
    pub fn set_vector(&mut self, values: Vec<f64>) -> bool {
        if values.len() != self.width * self.height {
            debug!(
                expected = self.width * self.height,
                actual = values.len(),
                "Rejected image vector"
            );
            return false;
        }

        self.alt = AltImage::Vector(values);
        true
    }

    /// Drops the alternate representation.
    pub fn flush_cache(&mut self) {
        self.alt = AltImage::None;
        self.flags.remove(ImageFlags::DATA_NOT_USEFUL);
    }

    /// Replaces the pixel data with a native buffer, leaving the channel rows unused.
    ///
    /// Decoding such an image reads straight from the buffer (and the mask, when present).
    pub(crate) fn attach_native(&mut self, image: PixelBuffer, mask: Option<PixelBuffer>) {
        self.alt = AltImage::Native {
            image: Some(image),
            mask,
        };
        self.flags.insert(ImageFlags::DATA_NOT_USEFUL);
    }

    fn channel_changed(&mut self) {
        if self.flags.contains(ImageFlags::DATA_NOT_USEFUL) || !matches!(self.alt, AltImage::None) {
            self.flags.remove(ImageFlags::DATA_NOT_USEFUL);
            self.alt = AltImage::None;
        }
    }

    fn row_slot(&mut self, channel: Channel, y: usize) -> Option<&mut Row> {
        self.rows[channel.index()].get_mut(y)
    }

    /// The compressed stream of one row, `None` when the row is absent.
    pub fn row(&self, channel: Channel, y: usize) -> Option<&[u8]> {
        self.rows[channel.index()].get(y)?.as_deref()
    }

    /// Stores an already compressed row.
    ///
    /// The stream is validated and trimmed to its terminator. Returns the stored length, or 0
    /// when the row index is out of range or the stream does not decode to exactly one row.
    pub fn set_row(&mut self, channel: Channel, y: usize, stream: &[u8]) -> usize {
        if y >= self.height {
            return 0;
        }

        let Some(len) = rle::stream_len(stream, self.width) else {
            warn!(?channel, y, "Rejected malformed row stream");
            return 0;
        };

        self.channel_changed();
        if let Some(slot) = self.row_slot(channel, y) {
            *slot = Some(stream[..len].into());
        }
        len
    }

    /// Compresses `data` (at least `width` samples) into row `y` of `channel`.
    ///
    /// Returns the compressed size, or 0 when nothing was stored.
    pub fn add_line(&mut self, channel: Channel, data: &[u32], y: usize, scratch: &mut ScratchBuffer) -> usize {
        if y >= self.height || data.len() < self.width {
            debug!(?channel, y, samples = data.len(), "Ignored out of range line");
            return 0;
        }

        let out = match scratch.encoded(self.width * 2) {
            Ok(out) => out,
            Err(err) => {
                warn!("Could not encode line: {err}");
                return 0;
            }
        };

        rle::encode(&data[..self.width], self.max_compressed_width, out);
        let len = out.len();
        let row: Box<[u8]> = out.as_slice().into();

        self.channel_changed();
        if let Some(slot) = self.row_slot(channel, y) {
            *slot = Some(row);
        }
        len
    }

    /// Stores a row made of a single value.
    pub fn add_line_mono(&mut self, channel: Channel, value: u8, y: usize) -> usize {
        if y >= self.height {
            return 0;
        }

        let mut out = Vec::with_capacity(8);
        rle::encode_mono(value, self.width, &mut out);
        let len = out.len();

        self.channel_changed();
        if let Some(slot) = self.row_slot(channel, y) {
            *slot = Some(out.into_boxed_slice());
        }
        len
    }

    /// Drops row `y` of `channel`, making it read as the background color.
    pub fn erase_line(&mut self, channel: Channel, y: usize) {
        if y >= self.height {
            return;
        }
        self.channel_changed();
        if let Some(slot) = self.row_slot(channel, y) {
            *slot = None;
        }
    }

    /// Drops row `y` of every channel.
    pub fn erase_row(&mut self, y: usize) {
        for channel in Channel::ALL {
            self.erase_line(channel, y);
        }
    }

    /// Duplicates the compressed row `from` into row `to` of the same channel.
    pub fn dup_line(&mut self, channel: Channel, from: usize, to: usize) {
        if from >= self.height || to >= self.height || from == to {
            return;
        }
        self.channel_changed();
        let rows = &mut self.rows[channel.index()];
        rows[to] = rows[from].clone();
    }

    /// Decodes row `y` of `channel` into `dst` following the tiling contract of
    /// [`rle::decode_tiled`]. Returns the number of samples written, 0 for absent rows.
    pub fn decode_line(
        &self,
        channel: Channel,
        dst: &mut [u32],
        y: usize,
        skip: usize,
        out_width: usize,
        scratch: &mut ScratchBuffer,
    ) -> usize {
        let Some(src) = self.row(channel, y) else {
            return 0;
        };

        match rle::decode_tiled(src, self.width, dst, skip, out_width, scratch) {
            Ok(count) => count,
            Err(err) => {
                warn!("Could not decode line: {err}");
                0
            }
        }
    }

    /// Checks that row `y` of `channel` decodes to `expected`.
    pub fn compare_line(&self, channel: Channel, y: usize, expected: &[u32], scratch: &mut ScratchBuffer) -> bool {
        let mut decoded = vec![0u32; self.width];
        let count = self.decode_line(channel, &mut decoded, y, 0, self.width, scratch);
        if count < self.width {
            decoded[count..].fill(u32::from(self.back_color.channel(channel)));
        }

        match decoded.iter().zip(expected).position(|(a, b)| a != b) {
            Some(x) => {
                debug!(?channel, y, x, "Line differs");
                false
            }
            None => expected.len() >= self.width,
        }
    }

    /// Channels that have at least one stored row.
    pub fn channel_mask(&self) -> ChannelFlags {
        Channel::ALL
            .into_iter()
            .filter(|channel| self.rows[channel.index()].iter().any(Option::is_some))
            .fold(ChannelFlags::empty(), |mask, channel| mask | channel.flag())
    }

    /// Recommended depth of a mask for this image: 0 when fully opaque, 1 when every alpha value
    /// is either 0 or 255, 8 otherwise.
    pub fn check_alpha(&self, scratch: &mut ScratchBuffer) -> u8 {
        let back_alpha = self.back_color.alpha();
        let mut depth = 0;
        let mut alpha = vec![0u32; self.width];

        for y in 0..self.height {
            let count = self.decode_line(Channel::Alpha, &mut alpha, y, 0, self.width, scratch);

            if count < self.width {
                match back_alpha {
                    0 => depth = depth.max(1),
                    0xFF => {}
                    _ => return 8,
                }
            }

            for value in &alpha[..count] {
                match value & 0xFF {
                    0 => depth = depth.max(1),
                    0xFF => {}
                    _ => return 8,
                }
            }
        }

        depth
    }

    /// Block statistics of one stored row.
    pub fn line_stats(&self, channel: Channel, y: usize) -> Option<LineStats> {
        let src = self.row(channel, y)?;
        let mut stats = LineStats {
            bytes: src.len(),
            ..LineStats::default()
        };

        for block in rle::blocks(src, self.width) {
            match block {
                Block::Run { len, .. } | Block::LongRun { len, .. } => {
                    stats.runs += 1;
                    stats.run_samples += len;
                }
                Block::Direct(bytes) | Block::Tail(bytes) => {
                    stats.direct_blocks += 1;
                    stats.direct_samples += bytes.len();
                }
            }
        }

        trace!(?channel, y, ?stats);

        Some(stats)
    }

    pub fn stats(&self) -> ImageStats {
        let mut stats = ImageStats {
            width: self.width,
            height: self.height,
            uncompressed_bytes: self.width * self.height * Channel::COUNT,
            ..ImageStats::default()
        };

        for row in self.rows.iter().flatten().flatten() {
            stats.stored_rows += 1;
            stats.compressed_bytes += row.len();
        }

        debug!(?stats, ratio = stats.ratio_percent(), "Image memory");

        stats
    }

    /// Copies the channels in `filter` into a new image with the same geometry.
    pub fn clone_filtered(&self, filter: ChannelFlags) -> Self {
        let mut rows: [Vec<Row>; Channel::COUNT] = Default::default();
        for channel in Channel::ALL {
            rows[channel.index()] = if filter.has(channel) {
                self.rows[channel.index()].clone()
            } else {
                vec![None; self.height]
            };
        }

        Self {
            width: self.width,
            height: self.height,
            rows,
            back_color: self.back_color,
            compression: self.compression,
            max_compressed_width: self.max_compressed_width,
            flags: ImageFlags::empty(),
            alt: AltImage::None,
        }
    }

    /// Moves every row of `src_channel` of `src` into `dst_channel` of `self`.
    ///
    /// Both images must have the same width. Rows beyond the shorter height are left alone.
    pub fn move_channel(&mut self, dst_channel: Channel, src: &mut AsImage, src_channel: Channel) -> bool {
        if self.width != src.width {
            debug!(src = src.width, dst = self.width, "Images size differ");
            return false;
        }

        let count = self.height.min(src.height);
        self.channel_changed();
        src.channel_changed();

        let dst_rows = &mut self.rows[dst_channel.index()][..count];
        let src_rows = &mut src.rows[src_channel.index()][..count];
        for (dst, src) in dst_rows.iter_mut().zip(src_rows.iter_mut()) {
            *dst = src.take();
        }
        true
    }

    /// Copies every row of `src_channel` of `src` into `dst_channel` of `self`.
    pub fn copy_channel(&mut self, dst_channel: Channel, src: &AsImage, src_channel: Channel) -> bool {
        if self.width != src.width {
            debug!(src = src.width, dst = self.width, "Images size differ");
            return false;
        }

        let count = self.height.min(src.height);
        self.channel_changed();
        self.rows[dst_channel.index()][..count].clone_from_slice(&src.rows[src_channel.index()][..count]);
        true
    }

    /// Copies `count` rows of the channels in `filter`, clipping to both images.
    ///
    /// Returns the number of rows copied.
    pub fn copy_lines(
        &mut self,
        dst_offset: usize,
        src: &AsImage,
        src_offset: usize,
        count: usize,
        filter: ChannelFlags,
    ) -> usize {
        if self.width != src.width || src_offset >= src.height || dst_offset >= self.height {
            return 0;
        }

        let count = count.min(src.height - src_offset).min(self.height - dst_offset);
        self.channel_changed();

        for channel in filter.channels() {
            let index = channel.index();
            self.rows[index][dst_offset..dst_offset + count]
                .clone_from_slice(&src.rows[index][src_offset..src_offset + count]);
        }

        count
    }

    /// Rectangles covering every sample of `channel` that is at least `threshold`.
    ///
    /// Vertically adjacent rows sharing the same span are merged into one rectangle. The
    /// rectangles never overlap.
    pub fn channel_rects(&self, channel: Channel, threshold: u8) -> Vec<Rect> {
        let full_row = self.back_color.channel(channel) >= threshold;
        let mut rects = Vec::new();
        let mut open: Vec<(usize, usize, usize)> = Vec::new();

        for y in 0..=self.height {
            let runs = if y == self.height {
                Vec::new()
            } else {
                match self.row(channel, y) {
                    Some(src) => rle::threshold_runs(src, self.width, threshold),
                    None if full_row => vec![(0, self.width - 1)],
                    None => Vec::new(),
                }
            };

            let mut next = Vec::with_capacity(runs.len());
            for (start, end, top) in open.drain(..) {
                if runs.contains(&(start, end)) {
                    next.push((start, end, top));
                } else {
                    rects.push(Rect {
                        x: start,
                        y: top,
                        width: end - start + 1,
                        height: y - top,
                    });
                }
            }

            for (start, end) in runs {
                if !next.iter().any(|(s, e, _)| *s == start && *e == end) {
                    next.push((start, end, y));
                }
            }

            open = next;
        }

        rects
    }
}

impl fmt::Debug for AsImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("back_color", &self.back_color)
            .field("compression", &self.compression)
            .field("flags", &self.flags)
            .field("channels", &self.channel_mask())
            .finish_non_exhaustive()
    }
}
