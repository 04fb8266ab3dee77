//! Streaming decoder producing one scanline per call.

use crate::bevel::{Bevel, BevelGeometry};
use crate::color::{Argb32, Channel, ChannelFlags};
use crate::context::Context;
use crate::error::ImageError;
use crate::image::{AsImage, ImageFlags};
use crate::native::{PixelBuffer, Visual};
use crate::rle::ScratchBuffer;
use crate::scanline::Scanline;

/// Anything that can hand out rows of 8-bit channel samples.
pub trait ScanlineSource {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Color of samples the source has no data for.
    fn back_color(&self) -> Argb32;

    /// Writes row `y` of `channel` into `dst`, starting `skip` samples into the row and wrapping
    /// around to its start as often as needed.
    ///
    /// Returns the number of samples written, 0 when the source has no data for that row.
    fn decode_channel(&mut self, channel: Channel, y: usize, skip: usize, dst: &mut [u32]) -> usize;
}

/// Compressed rows of an image.
#[derive(Debug)]
pub struct ImageSource<'a> {
    image: &'a AsImage,
    scratch: ScratchBuffer,
}

impl<'a> ImageSource<'a> {
    pub fn new(image: &'a AsImage) -> Self {
        Self {
            image,
            scratch: ScratchBuffer::new(),
        }
    }
}

impl ScanlineSource for ImageSource<'_> {
    fn width(&self) -> usize {
        self.image.width()
    }

    fn height(&self) -> usize {
        self.image.height()
    }

    fn back_color(&self) -> Argb32 {
        self.image.back_color()
    }

    fn decode_channel(&mut self, channel: Channel, y: usize, skip: usize, dst: &mut [u32]) -> usize {
        let out_width = dst.len();
        self.image.decode_line(channel, dst, y, skip, out_width, &mut self.scratch)
    }
}

/// Pixels of a native buffer, with alpha from an optional mask buffer.
#[derive(Debug)]
pub struct NativeSource<'a> {
    visual: &'a dyn Visual,
    buffer: &'a PixelBuffer,
    mask: Option<&'a PixelBuffer>,
    back_color: Argb32,
    row: Scanline,
    row_y: Option<usize>,
}

impl<'a> NativeSource<'a> {
    pub fn new(visual: &'a dyn Visual, buffer: &'a PixelBuffer, mask: Option<&'a PixelBuffer>, back_color: Argb32) -> Self {
        Self {
            visual,
            buffer,
            mask,
            back_color,
            row: Scanline::new(buffer.width()),
            row_y: None,
        }
    }

    fn unpack(&mut self, y: usize) {
        if self.row_y == Some(y) {
            return;
        }

        let Some(row) = self.buffer.row(y) else {
            self.row.set_flags(ChannelFlags::empty());
            self.row_y = Some(y);
            return;
        };

        self.visual.get_scanline(row, &mut self.row);

        if let Some(mask) = self.mask {
            let width = self.row.width().min(mask.width());
            let alpha = self.row.channel_mut(Channel::Alpha);
            for (x, a) in alpha.iter_mut().take(width).enumerate() {
                *a = u32::from(mask.mask_value(x, y));
            }
            self.row.set_flags(self.row.flags() | ChannelFlags::ALPHA);
        }

        self.row_y = Some(y);
    }
}

impl ScanlineSource for NativeSource<'_> {
    fn width(&self) -> usize {
        self.buffer.width()
    }

    fn height(&self) -> usize {
        self.buffer.height()
    }

    fn back_color(&self) -> Argb32 {
        self.back_color
    }

    fn decode_channel(&mut self, channel: Channel, y: usize, skip: usize, dst: &mut [u32]) -> usize {
        self.unpack(y);
        if !self.row.flags().has(channel) {
            return 0;
        }

        tile_into(self.row.channel(channel), skip, dst)
    }
}

/// Copies `row` into `dst` starting at `skip`, wrapping around. Returns `dst.len()`.
pub(crate) fn tile_into(row: &[u32], skip: usize, dst: &mut [u32]) -> usize {
    if row.is_empty() {
        return 0;
    }

    for (d, s) in dst.iter_mut().zip(row.iter().cycle().skip(skip % row.len())) {
        *d = *s;
    }
    dst.len()
}

/// Where a decoder reads its rows from.
pub enum DecoderSource<'a> {
    /// No image: every row is the back color.
    None,
    /// An image, read from its cached native buffer when the channel rows are not usable.
    Image(&'a AsImage),
    Custom(Box<dyn ScanlineSource + 'a>),
}

impl<'a> From<&'a AsImage> for DecoderSource<'a> {
    fn from(image: &'a AsImage) -> Self {
        DecoderSource::Image(image)
    }
}

impl<'a> From<Option<&'a AsImage>> for DecoderSource<'a> {
    fn from(image: Option<&'a AsImage>) -> Self {
        image.map_or(DecoderSource::None, DecoderSource::Image)
    }
}

fn open_source<'a>(ctx: &'a Context, source: DecoderSource<'a>) -> Option<Box<dyn ScanlineSource + 'a>> {
    match source {
        DecoderSource::None => None,
        DecoderSource::Custom(source) => Some(source),
        DecoderSource::Image(image) => {
            if image.flags().contains(ImageFlags::DATA_NOT_USEFUL) {
                if let Some(buffer) = image.native() {
                    return Some(Box::new(NativeSource::new(
                        ctx.visual(),
                        buffer,
                        image.native_mask(),
                        image.back_color(),
                    )));
                }
            }
            Some(Box::new(ImageSource::new(image)))
        }
    }
}

fn wrap(offset: isize, size: usize) -> usize {
    match isize::try_from(size) {
        Ok(size) if size > 0 => offset.rem_euclid(size).unsigned_abs(),
        _ => 0,
    }
}

/// A decoding session over one source.
///
/// Each call to [`ImageDecoder::decode_next`] produces the next output row, tiling the source in
/// both directions when the output is larger, and framing it with a bevel when one is set.
pub struct ImageDecoder<'a> {
    source: Option<Box<dyn ScanlineSource + 'a>>,
    filter: ChannelFlags,
    offset_x: usize,
    offset_y: usize,
    out_width: usize,
    out_height: usize,
    bevel: Option<(Bevel, BevelGeometry)>,
    back_color: Argb32,
    row: usize,
    buffer: Scanline,
}

impl<'a> ImageDecoder<'a> {
    /// Opens a decoder.
    ///
    /// Negative offsets count from the right and bottom edges. Output sizes of 0 default to the
    /// source size and are required when there is no source.
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        ctx: &'a Context,
        source: impl Into<DecoderSource<'a>>,
        filter: ChannelFlags,
        offset_x: isize,
        offset_y: isize,
        out_width: usize,
        out_height: usize,
        bevel: Option<&Bevel>,
    ) -> Result<Self, ImageError> {
        if filter.is_empty() {
            return Err(ImageError::EmptyFilter);
        }

        let source = open_source(ctx, source.into());

        let (offset_x, offset_y, out_width, out_height, back_color) = match &source {
            None => {
                if out_width == 0 || out_height == 0 {
                    return Err(ImageError::MissingSource);
                }
                (0, 0, out_width, out_height, ctx.config().back_color)
            }
            Some(source) => {
                let out_width = if out_width == 0 { source.width() } else { out_width };
                let out_height = if out_height == 0 { source.height() } else { out_height };
                (
                    wrap(offset_x, source.width()),
                    wrap(offset_y, source.height()),
                    out_width,
                    out_height,
                    source.back_color(),
                )
            }
        };

        if out_width == 0 || out_height == 0 {
            return Err(ImageError::InvalidDimensions {
                width: out_width,
                height: out_height,
            });
        }

        let bevel = bevel
            .and_then(|bevel| bevel.clamped(out_width, out_height))
            .map(|bevel| (bevel, BevelGeometry::around(&bevel, out_width, out_height)));

        let h_addon = bevel.as_ref().map_or(0, |(_, geometry)| geometry.h_addon);
        let mut buffer = Scanline::new(out_width + h_addon);
        buffer.set_back_color(back_color);

        debug!(
            offset_x,
            offset_y,
            out_width,
            out_height,
            beveled = bevel.is_some(),
            "Starting image decoding"
        );

        Ok(Self {
            source,
            filter,
            offset_x,
            offset_y,
            out_width,
            out_height,
            bevel,
            back_color,
            row: 0,
            buffer,
        })
    }

    pub fn out_width(&self) -> usize {
        self.out_width
    }

    pub fn out_height(&self) -> usize {
        self.out_height
    }

    /// Width of the produced scanlines, bevel outlines included.
    pub fn line_width(&self) -> usize {
        self.buffer.width()
    }

    /// Number of rows [`ImageDecoder::decode_next`] produces.
    pub fn line_count(&self) -> usize {
        self.out_height + self.bevel.as_ref().map_or(0, |(_, geometry)| geometry.v_addon)
    }

    /// Moves the bevel rectangle to `x, y` with the given size, relative to the output.
    ///
    /// Sizes of 0 default to the source size, or to what remains of the output without a source.
    pub fn set_bevel_geometry(&mut self, x: isize, y: isize, width: usize, height: usize) {
        let Some((bevel, _)) = self.bevel else {
            return;
        };

        let (width, height) = match &self.source {
            Some(source) => (
                if width == 0 { source.width() } else { width },
                if height == 0 { source.height() } else { height },
            ),
            None => (
                if width == 0 { remaining(self.out_width, x) } else { width },
                if height == 0 { remaining(self.out_height, y) } else { height },
            ),
        };

        let geometry = BevelGeometry::placed(&bevel, x, y, width, height, self.out_width, self.out_height);

        let mut buffer = Scanline::new(self.out_width + geometry.h_addon);
        buffer.set_back_color(self.back_color);
        buffer.set_shift(self.buffer.shift());
        self.buffer = buffer;
        self.bevel = Some((bevel, geometry));
    }

    /// Sets the precision of produced samples. Any non-zero value means 8 extra bits.
    pub fn set_shift(&mut self, shift: u32) {
        self.buffer.set_shift(shift);
    }

    /// Sets the color filling channels and areas the source does not cover.
    pub fn set_back_color(&mut self, back_color: Argb32) {
        self.back_color = back_color;
        self.buffer.set_back_color(back_color);
    }

    /// Produces the next row, or `None` once every row has been produced.
    pub fn decode_next(&mut self) -> Option<&Scanline> {
        if self.row >= self.line_count() {
            self.buffer.set_flags(ChannelFlags::empty());
            self.buffer.set_back_color(self.back_color);
            return None;
        }

        let y_out = self.row;
        self.buffer.set_flags(self.filter);

        let mut body = Body {
            source: self.source.as_deref_mut(),
            filter: self.filter,
            offset_x: self.offset_x,
            back_color: self.back_color,
        };

        match &self.bevel {
            None => {
                let y = body.source_row(self.offset_y + y_out);
                body.decode(&mut self.buffer, 0, y);
            }
            Some((bevel, geometry)) => {
                let y_out = isize::try_from(y_out).unwrap_or(isize::MAX);
                let top = geometry.top.max(0).unsigned_abs();
                let offset_y = self.offset_y;

                geometry.paint(bevel, &mut self.buffer, y_out, |line, skip| {
                    let y = body.source_row((offset_y + y_out.unsigned_abs()).saturating_sub(top));
                    body.decode(line, skip, y);
                });
            }
        }

        self.row += 1;
        trace!(row = y_out, "Decoded row");

        Some(&self.buffer)
    }
}

fn remaining(size: usize, offset: isize) -> usize {
    let size = isize::try_from(size).unwrap_or(isize::MAX);
    (size - offset).max(0).unsigned_abs()
}

/// Decodes the image part of a row.
struct Body<'s, 'a> {
    source: Option<&'s mut (dyn ScanlineSource + 'a)>,
    filter: ChannelFlags,
    offset_x: usize,
    back_color: Argb32,
}

impl Body<'_, '_> {
    fn source_row(&self, y: usize) -> usize {
        match &self.source {
            Some(source) if source.height() > 0 => y % source.height(),
            _ => y,
        }
    }

    fn decode(&mut self, line: &mut Scanline, skip: usize, y: usize) {
        let shift = line.shift();

        for channel in self.filter.channels() {
            let Some(dst) = line.channel_mut(channel).get_mut(skip..) else {
                continue;
            };

            let count = match self.source.as_deref_mut() {
                Some(source) => source.decode_channel(channel, y, self.offset_x, dst),
                None => 0,
            };

            if shift > 0 {
                for sample in &mut dst[..count] {
                    *sample <<= shift;
                }
            }

            dst[count..].fill(u32::from(self.back_color.channel(channel)) << shift);
        }

        line.set_flags(self.filter);
    }
}

impl core::fmt::Debug for ImageDecoder<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ImageDecoder")
            .field("filter", &self.filter)
            .field("offset_x", &self.offset_x)
            .field("offset_y", &self.offset_y)
            .field("out_width", &self.out_width)
            .field("out_height", &self.out_height)
            .field("bevel", &self.bevel.as_ref().map(|(bevel, _)| bevel))
            .field("row", &self.row)
            .finish_non_exhaustive()
    }
}
