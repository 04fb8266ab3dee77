//! Streaming encoder: quantizes scanlines and writes them to one target.

use crate::color::{Argb32, Channel};
use crate::context::{Context, Quality};
use crate::error::ImageError;
use crate::image::{AltImage, AsImage};
use crate::native::{PixelBuffer, Visual};
use crate::quantize;
use crate::rle::ScratchBuffer;
use crate::scanline::Scanline;

/// Where an [`ImageOutput`] writes its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Compressed channel rows of the image itself.
    AsImage,
    /// The native pixel buffer cached on the image.
    Native,
    /// The native mask buffer cached on the image.
    NativeMask,
    /// A flat ARGB32 array cached on the image.
    Argb32,
    /// Per pixel values. Not a valid output target.
    Vector,
}

impl OutputFormat {
    pub const fn name(self) -> &'static str {
        match self {
            OutputFormat::AsImage => "asimage",
            OutputFormat::Native => "native",
            OutputFormat::NativeMask => "native mask",
            OutputFormat::Argb32 => "argb32",
            OutputFormat::Vector => "vector",
        }
    }
}

/// Quantization applied to incoming scanlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFilter {
    Direct,
    Fast,
    Fine,
    Top,
}

impl OutputFilter {
    fn select(shift: u32, quality: Quality) -> Self {
        if shift == 0 {
            return OutputFilter::Direct;
        }

        match quality {
            Quality::Poor | Quality::Fast => OutputFilter::Fast,
            Quality::Good => OutputFilter::Fine,
            Quality::Top => OutputFilter::Top,
        }
    }
}

/// Destination half of an output session.
struct Sink<'a> {
    image: &'a mut AsImage,
    visual: &'a dyn Visual,
    format: OutputFormat,
    scratch: ScratchBuffer,
    chan_fill: Argb32,
    next_line: isize,
    direction: isize,
    tiling_step: usize,
    tiling_range: usize,
}

impl Sink<'_> {
    fn height(&self) -> isize {
        isize::try_from(self.image.height()).unwrap_or(isize::MAX)
    }

    fn current_row(&self) -> Option<usize> {
        if (0..self.height()).contains(&self.next_line) {
            usize::try_from(self.next_line).ok()
        } else {
            None
        }
    }

    /// Rows that receive a copy of `line` when vertical tiling is enabled.
    fn tiled_rows(&self, line: usize) -> impl Iterator<Item = usize> {
        let height = self.height();
        let line = isize::try_from(line).unwrap_or(isize::MAX);
        let step = self.direction * isize::try_from(self.tiling_step).unwrap_or(0);
        let range = if self.tiling_range == 0 {
            height
        } else {
            isize::try_from(self.tiling_range).unwrap_or(height)
        };

        let max_i = height.min(line.saturating_add(range));
        let min_i = line.saturating_sub(range).max(0);
        let mut i = line + step;

        core::iter::from_fn(move || {
            if step != 0 && i < max_i && i >= min_i {
                let row = i;
                i += step;
                usize::try_from(row).ok()
            } else {
                None
            }
        })
    }

    fn encode(&mut self, line: &Scanline) {
        match self.format {
            OutputFormat::AsImage => self.encode_image(line),
            OutputFormat::Native => self.encode_native(line),
            OutputFormat::NativeMask => self.encode_mask(line),
            OutputFormat::Argb32 => self.encode_argb32(line),
            OutputFormat::Vector => {}
        }
    }

    fn encode_image(&mut self, line: &Scanline) {
        if let Some(y) = self.current_row() {
            let rows: Vec<usize> = self.tiled_rows(y).collect();

            for channel in Channel::ALL {
                let fill = line.back_color().channel(channel);

                let stored = if line.flags().has(channel) {
                    self.image.add_line(channel, line.visible(channel), y, &mut self.scratch) > 0
                } else if fill != self.chan_fill.channel(channel) {
                    self.image.add_line_mono(channel, fill, y) > 0
                } else {
                    self.image.erase_line(channel, y);
                    false
                };

                for &row in &rows {
                    if stored {
                        self.image.dup_line(channel, y, row);
                    } else {
                        self.image.erase_line(channel, row);
                    }
                }
            }

            trace!(y, tiled = rows.len(), "Encoded row");
        }

        self.next_line += self.direction;
    }

    fn encode_native(&mut self, line: &Scanline) {
        let Some(y) = self.current_row() else {
            return;
        };

        let rows: Vec<usize> = self.tiled_rows(y).collect();
        let visual = self.visual;
        if let AltImage::Native { image: Some(buffer), .. } = self.image.alt_mut() {
            if let Some(row) = buffer.row_mut(y) {
                visual.put_scanline(line, row);
            }
            for row in rows {
                buffer.copy_row(y, row);
            }
        }

        self.next_line += self.direction;
    }

    fn encode_mask(&mut self, line: &Scanline) {
        let Some(y) = self.current_row() else {
            return;
        };

        let rows: Vec<usize> = self.tiled_rows(y).collect();
        if let AltImage::Native { mask: Some(mask), .. } = self.image.alt_mut() {
            if line.flags().has(Channel::Alpha) {
                mask.put_mask_row(y, line.visible(Channel::Alpha));
            }
            for row in rows {
                mask.copy_row(y, row);
            }
        }

        self.next_line += self.direction;
    }

    fn encode_argb32(&mut self, line: &Scanline) {
        let Some(y) = self.current_row() else {
            return;
        };

        let width = self.image.width();
        let rows: Vec<usize> = self.tiled_rows(y).collect();
        let has_alpha = line.flags().has(Channel::Alpha);
        let offset = line.offset_x();

        if let AltImage::Argb32(pixels) = self.image.alt_mut() {
            let start = y * width;
            if let Some(dst) = pixels.get_mut(start..start + width) {
                for (x, pixel) in dst.iter_mut().enumerate() {
                    let color = line.pixel(offset + x);
                    *pixel = if has_alpha { color } else { color.with_alpha(0xFF) };
                }
            }
            for row in rows {
                pixels.copy_within(start..start + width, row * width);
            }
        }

        self.next_line += self.direction;
    }
}

/// An encoding session writing rows, one at a time, into an image or one of its caches.
///
/// Rows carrying 8 extra bits of precision (`shift` of 8) are reduced to 8 bits according to
/// the quality tier. The top tier holds one row back until the next one arrives, so the session
/// must be finished (or dropped) to write the last row.
pub struct ImageOutput<'a> {
    sink: Sink<'a>,
    filter: OutputFilter,
    buffers: [Scanline; 2],
    available: usize,
    used: Option<usize>,
}

impl<'a> ImageOutput<'a> {
    pub fn new(
        ctx: &'a Context,
        image: &'a mut AsImage,
        format: OutputFormat,
        shift: u32,
        quality: Quality,
    ) -> Result<Self, ImageError> {
        prepare_target(ctx.visual(), image, format)?;

        let width = image.width();
        let chan_fill = image.back_color();
        let filter = OutputFilter::select(shift, quality);

        debug!(
            width,
            height = image.height(),
            ?format,
            ?filter,
            "Starting image output"
        );

        Ok(Self {
            sink: Sink {
                image,
                visual: ctx.visual(),
                format,
                scratch: ScratchBuffer::new(),
                chan_fill,
                next_line: 0,
                direction: 1,
                tiling_step: 0,
                tiling_range: 0,
            },
            filter,
            buffers: [Scanline::new(width), Scanline::new(width)],
            available: 0,
            used: None,
        })
    }

    pub fn image(&self) -> &AsImage {
        self.sink.image
    }

    /// Row the next encoded scanline lands on. May be outside the image.
    pub fn next_line(&self) -> isize {
        self.sink.next_line
    }

    pub fn is_bottom_to_top(&self) -> bool {
        self.sink.direction < 0
    }

    /// Sets the color whose channels are considered implicit when storing compressed rows.
    pub fn set_back_color(&mut self, back_color: Argb32) {
        self.sink.chan_fill = back_color;
    }

    /// Switches between top-to-bottom and bottom-to-top output.
    ///
    /// Switching to bottom-to-top at the start of the image moves the cursor to the last row.
    /// Switching back once the cursor ran past the bottom moves it to the first row.
    pub fn toggle_direction(&mut self) {
        let last = self.sink.height() - 1;
        if self.sink.direction < 0 {
            if self.sink.next_line >= last {
                self.sink.next_line = 0;
            }
            self.sink.direction = 1;
        } else if self.sink.next_line <= 0 {
            self.sink.next_line = last;
            self.sink.direction = -1;
        }
    }

    /// Duplicates every written row at `step` intervals within `range` rows of it, in the
    /// output direction. A `range` of 0 means the whole image.
    pub fn set_tiling(&mut self, step: usize, range: usize) {
        self.sink.tiling_step = step;
        self.sink.tiling_range = range;
    }

    /// Quantizes and writes one row. Samples are divided by `ratio` first when it exceeds 1.
    pub fn output(&mut self, line: &Scanline, ratio: u32) {
        let available = self.available;

        match self.filter {
            OutputFilter::Direct => {
                if ratio > 1 || line.width() - line.offset_x() < self.sink.image.width() {
                    prepare_line(&mut self.buffers[available], line, true, |src, dst| {
                        quantize::divide(src, dst, ratio)
                    });
                    self.sink.encode(&self.buffers[available]);
                } else {
                    self.sink.encode(line);
                }
            }
            OutputFilter::Fast => {
                prepare_line(&mut self.buffers[available], line, false, |src, dst| {
                    quantize::fast(src, dst, ratio)
                });
                self.sink.encode(&self.buffers[available]);
            }
            OutputFilter::Fine => {
                prepare_line(&mut self.buffers[available], line, false, |src, dst| {
                    quantize::fine(src, dst, ratio)
                });
                self.sink.encode(&self.buffers[available]);
            }
            OutputFilter::Top => {
                prepare_line(&mut self.buffers[available], line, true, |src, dst| {
                    quantize::divide(src, dst, ratio)
                });

                if let Some(used) = self.used {
                    let [first, second] = &mut self.buffers;
                    let (held, next) = if used == 0 { (first, second) } else { (second, first) };
                    for channel in held.flags().channels() {
                        quantize::diffuse(held.channel_mut(channel), next.channel_mut(channel));
                    }
                    self.sink.encode(&self.buffers[used]);
                }

                self.used = Some(available);
                self.available = 1 - available;
            }
        }
    }

    fn flush(&mut self) {
        if let Some(used) = self.used.take() {
            let held = &mut self.buffers[used];
            for channel in held.flags().channels() {
                quantize::fine_in_place(held.channel_mut(channel));
            }
            self.sink.encode(&self.buffers[used]);
        }
    }

    /// Writes the row held back by the top quality tier and ends the session.
    pub fn finish(mut self) {
        self.flush();
        debug!(next_line = self.sink.next_line, "Finished image output");
    }
}

impl Drop for ImageOutput<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Copies `line` into `dst` through `filter`, padding short rows with the back color.
fn prepare_line(dst: &mut Scanline, line: &Scanline, scaled: bool, filter: impl Fn(&[u32], &mut [u32])) {
    dst.set_flags(line.flags());
    dst.set_back_color(line.back_color());

    for channel in line.flags().channels() {
        let src = line.visible(channel);
        let samples = dst.channel_mut(channel);
        filter(src, samples);

        if src.len() < samples.len() {
            let back = u32::from(line.back_color().channel(channel));
            let fill = if scaled { back << line.shift() } else { back };
            samples[src.len()..].fill(fill);
        }
    }
}

/// Allocates the alternate buffer an output format writes into.
fn prepare_target(visual: &dyn Visual, image: &mut AsImage, format: OutputFormat) -> Result<(), ImageError> {
    let (width, height) = (image.width(), image.height());

    match format {
        OutputFormat::AsImage => {}
        OutputFormat::Vector => return Err(ImageError::UnsupportedFormat(format.name())),
        OutputFormat::Native => {
            if image.native().is_none() {
                let buffer = visual.create_buffer(width, height, 0)?;
                let mask = match core::mem::take(image.alt_mut()) {
                    AltImage::Native { mask, .. } => mask,
                    _ => None,
                };
                *image.alt_mut() = AltImage::Native {
                    image: Some(buffer),
                    mask,
                };
            }
        }
        OutputFormat::NativeMask => {
            if image.native_mask().is_none() {
                let mask = PixelBuffer::new(width, height, 8)?;
                let native = match core::mem::take(image.alt_mut()) {
                    AltImage::Native { image, .. } => image,
                    _ => None,
                };
                *image.alt_mut() = AltImage::Native {
                    image: native,
                    mask: Some(mask),
                };
            }
        }
        OutputFormat::Argb32 => {
            if image.argb32().is_none() {
                let len = width * height;
                let mut pixels = Vec::new();
                pixels
                    .try_reserve_exact(len)
                    .map_err(|_| ImageError::Allocation(len * size_of::<Argb32>()))?;
                pixels.resize(len, Argb32::TRANSPARENT);
                *image.alt_mut() = AltImage::Argb32(pixels);
            }
        }
    }

    Ok(())
}
