//! Four channel pixel rows passed between the decoding and encoding stages.

use core::fmt;

use crate::color::{Argb32, Channel, ChannelFlags, GammaTable};

/// Layout of an 8-bit raw pixel row accepted by [`Scanline::fill_from_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawLayout {
    Rgb,
    Rgba,
    Gray,
    GrayAlpha,
}

impl RawLayout {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            RawLayout::Rgb => 3,
            RawLayout::Rgba => 4,
            RawLayout::Gray => 1,
            RawLayout::GrayAlpha => 2,
        }
    }

    pub const fn has_alpha(self) -> bool {
        matches!(self, RawLayout::Rgba | RawLayout::GrayAlpha)
    }
}

/// One row of pixels, stored as four independent 32-bit sample planes.
///
/// Samples are 8-bit values, or 8-bit values shifted left by [`Scanline::shift`] bits when a
/// stage works at higher precision. The extra bits carry the quantization error of the
/// dithering encoders.
#[derive(Clone, PartialEq, Eq)]
pub struct Scanline {
    channels: [Vec<u32>; Channel::COUNT],
    width: usize,
    offset_x: usize,
    flags: ChannelFlags,
    back_color: Argb32,
    shift: u32,
}

impl Scanline {
    pub fn new(width: usize) -> Self {
        Self {
            channels: [vec![0; width], vec![0; width], vec![0; width], vec![0; width]],
            width,
            offset_x: 0,
            flags: ChannelFlags::empty(),
            back_color: Argb32::DEFAULT_BACK,
            shift: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Index of the first sample handed to the encoder.
    pub fn offset_x(&self) -> usize {
        self.offset_x
    }

    pub fn set_offset_x(&mut self, offset_x: usize) {
        self.offset_x = offset_x.min(self.width);
    }

    /// Channels holding meaningful data.
    pub fn flags(&self) -> ChannelFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: ChannelFlags) {
        self.flags = flags;
    }

    /// Color standing in for channels that are not part of [`Scanline::flags`].
    pub fn back_color(&self) -> Argb32 {
        self.back_color
    }

    pub fn set_back_color(&mut self, back_color: Argb32) {
        self.back_color = back_color;
    }

    pub fn shift(&self) -> u32 {
        self.shift
    }

    /// Sets the precision shift. Any non-zero value selects 8 extra bits.
    pub fn set_shift(&mut self, shift: u32) {
        self.shift = if shift == 0 { 0 } else { 8 };
    }

    pub fn channel(&self, channel: Channel) -> &[u32] {
        &self.channels[channel.index()]
    }

    pub fn channel_mut(&mut self, channel: Channel) -> &mut [u32] {
        &mut self.channels[channel.index()]
    }

    /// The part of `channel` starting at [`Scanline::offset_x`].
    pub fn visible(&self, channel: Channel) -> &[u32] {
        &self.channels[channel.index()][self.offset_x..]
    }

    /// Sets `channel` samples in `from..to` to `value`, clamping the range to the width.
    pub fn fill(&mut self, channel: Channel, value: u32, from: usize, to: usize) {
        let to = to.min(self.width);
        if from < to {
            self.channels[channel.index()][from..to].fill(value);
        }
    }

    /// Fills samples `from..` of every channel in `filter` with the back color, honoring the shift.
    pub fn fill_with_back_color(&mut self, filter: ChannelFlags, from: usize) {
        let back_color = self.back_color;
        let shift = self.shift;
        for channel in filter.channels() {
            self.fill(channel, u32::from(back_color.channel(channel)) << shift, from, self.width);
        }
    }

    /// Copies the channels in `filter` from `other`, sample for sample.
    pub fn copy_channels_from(&mut self, other: &Scanline, filter: ChannelFlags) {
        let len = self.width.min(other.width);
        for channel in filter.channels() {
            let index = channel.index();
            self.channels[index][..len].copy_from_slice(&other.channels[index][..len]);
        }
        self.flags = other.flags & filter;
        self.back_color = other.back_color;
    }

    /// Reads the pixel at `x` back as an 8-bit color, substituting the back color for
    /// channels missing from the flags.
    pub fn pixel(&self, x: usize) -> Argb32 {
        let mut packed = 0u32;
        for channel in Channel::ALL {
            let value = if self.flags.has(channel) {
                self.channels[channel.index()]
                    .get(x)
                    .map(|v| (v >> self.shift).min(0xFF))
                    .unwrap_or(0)
            } else {
                u32::from(self.back_color.channel(channel))
            };
            packed |= value << (channel.index() * 8);
        }
        Argb32(packed)
    }

    /// Writes an 8-bit color at `x`, honoring the shift.
    pub fn set_pixel(&mut self, x: usize, color: Argb32) {
        if x >= self.width {
            return;
        }
        for channel in Channel::ALL {
            self.channels[channel.index()][x] = u32::from(color.channel(channel)) << self.shift;
        }
    }

    /// Converts a raw 8-bit row into this scanline, optionally through a gamma table.
    ///
    /// Only color channels are gamma corrected. Alpha is copied as is. Pixels beyond the end
    /// of `row` are left untouched.
    pub fn fill_from_raw(&mut self, row: &[u8], layout: RawLayout, gamma: Option<&GammaTable>) {
        let correct = |v: u8| gamma.map_or(v, |table| table.apply(v));
        let bpp = layout.bytes_per_pixel();

        for (x, pixel) in row.chunks_exact(bpp).take(self.width).enumerate() {
            let (r, g, b, a) = match layout {
                RawLayout::Rgb => (correct(pixel[0]), correct(pixel[1]), correct(pixel[2]), 0xFF),
                RawLayout::Rgba => (correct(pixel[0]), correct(pixel[1]), correct(pixel[2]), pixel[3]),
                RawLayout::Gray => {
                    let v = correct(pixel[0]);
                    (v, v, v, 0xFF)
                }
                RawLayout::GrayAlpha => {
                    let v = correct(pixel[0]);
                    (v, v, v, pixel[1])
                }
            };
            self.channels[Channel::Red.index()][x] = u32::from(r);
            self.channels[Channel::Green.index()][x] = u32::from(g);
            self.channels[Channel::Blue.index()][x] = u32::from(b);
            self.channels[Channel::Alpha.index()][x] = u32::from(a);
        }

        self.flags = if layout.has_alpha() {
            ChannelFlags::ALL
        } else {
            ChannelFlags::COLOR
        };
    }
}

impl fmt::Debug for Scanline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanline")
            .field("width", &self.width)
            .field("offset_x", &self.offset_x)
            .field("flags", &self.flags)
            .field("back_color", &self.back_color)
            .field("shift", &self.shift)
            .finish_non_exhaustive()
    }
}
