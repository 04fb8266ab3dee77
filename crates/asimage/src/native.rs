//! Packed pixel buffers and the capability used to fill them.
//!
//! The windowing system owns the real pixel layout, so conversion between scanlines and packed
//! rows goes through the [`Visual`] trait. [`SoftwareVisual`] covers the common 24 and 32 bit
//! in-memory layouts.

use core::fmt;
use std::io;

use bitvec::prelude::{BitSlice, Msb0};
use byteorder::WriteBytesExt as _;

use crate::color::{Argb32, ChannelFlags};
use crate::error::ImageError;
use crate::scanline::Scanline;

const OPAQUE: u8 = 0xFF;
const PADDING: u8 = 0x00;

/// Rows of packed pixels are padded to a multiple of this many bytes.
const ROW_ALIGNMENT: usize = 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PixelFormat {
    ARgb32,
    XRgb32,
    ABgr32,
    XBgr32,
    BgrA32,
    BgrX32,
    RgbA32,
    RgbX32,
    Rgb24,
    Bgr24,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb24 | Self::Bgr24 => 3,
            Self::ARgb32
            | Self::XRgb32
            | Self::ABgr32
            | Self::XBgr32
            | Self::BgrA32
            | Self::BgrX32
            | Self::RgbA32
            | Self::RgbX32 => 4,
        }
    }

    pub const fn depth(self) -> u8 {
        match self {
            Self::Rgb24 | Self::Bgr24 => 24,
            _ => 32,
        }
    }

    pub const fn has_alpha(self) -> bool {
        matches!(self, Self::ARgb32 | Self::ABgr32 | Self::BgrA32 | Self::RgbA32)
    }

    pub fn read_color(self, buffer: &[u8]) -> io::Result<Argb32> {
        let bpp = self.bytes_per_pixel();
        let Some(c) = buffer.get(..bpp) else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "input buffer is not large enough for one pixel",
            ));
        };

        let color = match self {
            Self::ARgb32 => Argb32::new(c[0], c[1], c[2], c[3]),
            Self::XRgb32 => Argb32::new(OPAQUE, c[1], c[2], c[3]),
            Self::ABgr32 => Argb32::new(c[0], c[3], c[2], c[1]),
            Self::XBgr32 => Argb32::new(OPAQUE, c[3], c[2], c[1]),
            Self::BgrA32 => Argb32::new(c[3], c[2], c[1], c[0]),
            Self::BgrX32 => Argb32::new(OPAQUE, c[2], c[1], c[0]),
            Self::RgbA32 => Argb32::new(c[3], c[0], c[1], c[2]),
            Self::RgbX32 => Argb32::new(OPAQUE, c[0], c[1], c[2]),
            Self::Rgb24 => Argb32::new(OPAQUE, c[0], c[1], c[2]),
            Self::Bgr24 => Argb32::new(OPAQUE, c[2], c[1], c[0]),
        };

        Ok(color)
    }

    pub fn write_color(self, color: Argb32, mut buffer: &mut [u8]) -> io::Result<()> {
        let (a, r, g, b) = (color.alpha(), color.red(), color.green(), color.blue());

        let bytes = match self {
            Self::ARgb32 => [a, r, g, b],
            Self::XRgb32 => [PADDING, r, g, b],
            Self::ABgr32 => [a, b, g, r],
            Self::XBgr32 => [PADDING, b, g, r],
            Self::BgrA32 => [b, g, r, a],
            Self::BgrX32 => [b, g, r, PADDING],
            Self::RgbA32 => [r, g, b, a],
            Self::RgbX32 => [r, g, b, PADDING],
            Self::Rgb24 => [r, g, b, PADDING],
            Self::Bgr24 => [b, g, r, PADDING],
        };

        for byte in &bytes[..self.bytes_per_pixel()] {
            buffer.write_u8(*byte)?;
        }

        Ok(())
    }
}

/// A packed, row-padded pixel buffer.
///
/// Depth 1 buffers hold one bit per pixel, most significant bit first. Depth 8 buffers hold one
/// byte per pixel. Deeper buffers hold pixels laid out by a [`Visual`].
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    depth: u8,
    bytes_per_line: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: usize, height: usize, depth: u8) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::InvalidDimensions { width, height });
        }

        let bits_per_pixel = match depth {
            1 => 1,
            8 => 8,
            24 => 24,
            32 => 32,
            other => return Err(ImageError::UnsupportedDepth(other)),
        };

        let bytes_per_line = (width * bits_per_pixel).div_ceil(8).next_multiple_of(ROW_ALIGNMENT);
        let len = bytes_per_line * height;

        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|_| ImageError::Allocation(len))?;
        data.resize(len, 0);

        Ok(Self {
            width,
            height,
            depth,
            bytes_per_line,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn row(&self, y: usize) -> Option<&[u8]> {
        let start = y.checked_mul(self.bytes_per_line)?;
        self.data.get(start..start + self.bytes_per_line)
    }

    pub fn row_mut(&mut self, y: usize) -> Option<&mut [u8]> {
        let start = y.checked_mul(self.bytes_per_line)?;
        self.data.get_mut(start..start + self.bytes_per_line)
    }

    /// Copies row `from` over row `to`. Out of range rows are ignored.
    pub fn copy_row(&mut self, from: usize, to: usize) {
        if from >= self.height || to >= self.height || from == to {
            return;
        }
        let src = from * self.bytes_per_line;
        self.data
            .copy_within(src..src + self.bytes_per_line, to * self.bytes_per_line);
    }

    /// Reads one mask sample as an 8-bit alpha value.
    ///
    /// Depth 1 buffers read as 0x00 or 0xFF.
    pub fn mask_value(&self, x: usize, y: usize) -> u8 {
        let Some(row) = self.row(y) else {
            return 0;
        };

        match self.depth {
            1 => {
                let bits = BitSlice::<u8, Msb0>::from_slice(row);
                match bits.get(x) {
                    Some(bit) if *bit => 0xFF,
                    _ => 0x00,
                }
            }
            8 => row.get(x).copied().unwrap_or(0),
            _ => 0,
        }
    }

    /// Writes one row of mask samples from 8-bit alpha values.
    ///
    /// Depth 1 buffers set a bit wherever the alpha is at least 0x7F.
    pub fn put_mask_row(&mut self, y: usize, alpha: &[u32]) {
        let width = self.width;
        let depth = self.depth;
        let Some(row) = self.row_mut(y) else {
            return;
        };

        match depth {
            1 => {
                let bits = BitSlice::<u8, Msb0>::from_slice_mut(row);
                for (x, a) in alpha.iter().take(width).enumerate() {
                    bits.set(x, *a >= 0x7F);
                }
            }
            8 => {
                for (dst, a) in row.iter_mut().zip(alpha.iter().take(width)) {
                    *dst = (*a).min(0xFF) as u8;
                }
            }
            _ => {}
        }
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("depth", &self.depth)
            .field("bytes_per_line", &self.bytes_per_line)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// Access to the native pixel layout of the display.
pub trait Visual: fmt::Debug {
    /// Depth of color buffers created for this visual.
    fn depth(&self) -> u8;

    /// Allocates a buffer. A `depth` of zero means the visual's own depth.
    fn create_buffer(&self, width: usize, height: usize, depth: u8) -> Result<PixelBuffer, ImageError> {
        let depth = if depth == 0 { self.depth() } else { depth };
        PixelBuffer::new(width, height, depth)
    }

    /// Packs `scanline` into one row of a buffer of this visual's depth.
    ///
    /// Channels missing from the scanline flags take the scanline back color.
    fn put_scanline(&self, scanline: &Scanline, row: &mut [u8]);

    /// Unpacks one row into `scanline`, setting its flags to the channels the layout carries.
    fn get_scanline(&self, row: &[u8], scanline: &mut Scanline);
}

/// In-memory visual for a fixed [`PixelFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftwareVisual {
    format: PixelFormat,
}

impl SoftwareVisual {
    pub const fn new(format: PixelFormat) -> Self {
        Self { format }
    }

    pub const fn format(&self) -> PixelFormat {
        self.format
    }
}

impl Default for SoftwareVisual {
    fn default() -> Self {
        Self::new(PixelFormat::BgrA32)
    }
}

impl Visual for SoftwareVisual {
    fn depth(&self) -> u8 {
        self.format.depth()
    }

    fn put_scanline(&self, scanline: &Scanline, row: &mut [u8]) {
        let bpp = self.format.bytes_per_pixel();
        let offset = scanline.offset_x();
        for (x, dst) in row.chunks_exact_mut(bpp).take(scanline.width() - offset).enumerate() {
            if self.format.write_color(scanline.pixel(offset + x), dst).is_err() {
                break;
            }
        }
    }

    fn get_scanline(&self, row: &[u8], scanline: &mut Scanline) {
        let bpp = self.format.bytes_per_pixel();
        let width = scanline.width();

        for (x, src) in row.chunks_exact(bpp).take(width).enumerate() {
            match self.format.read_color(src) {
                Ok(color) => scanline.set_pixel(x, color),
                Err(_) => break,
            }
        }

        scanline.set_flags(if self.format.has_alpha() {
            ChannelFlags::ALL
        } else {
            ChannelFlags::COLOR
        });
    }
}
