// No need to be as strict as in production libraries
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::unwrap_used)]

use asimage::convert::raw_to_image;
use asimage::rle::ScratchBuffer;
use asimage::scanline::RawLayout;
use asimage::text::TextRenderer;
use asimage::{Argb32, AsImage, Channel, ChannelFlags, Context, ImageError, Scanline};

/// An image where every row of every channel holds the matching component of `color`.
pub fn solid_image(width: usize, height: usize, color: Argb32) -> AsImage {
    let mut image = AsImage::new(width, height, 100).unwrap();
    for y in 0..height {
        for channel in Channel::ALL {
            image.add_line_mono(channel, color.channel(channel), y);
        }
    }
    image
}

/// Decodes row `y` of `image` back into colors, substituting the back color for absent rows.
pub fn row_pixels(image: &AsImage, y: usize) -> Vec<Argb32> {
    let width = image.width();
    let mut line = Scanline::new(width);
    line.set_back_color(image.back_color());

    let mut flags = ChannelFlags::empty();
    let mut scratch = ScratchBuffer::new();
    for channel in Channel::ALL {
        if image.decode_line(channel, line.channel_mut(channel), y, 0, width, &mut scratch) == width {
            flags |= channel.flag();
        }
    }
    line.set_flags(flags);

    (0..width).map(|x| line.pixel(x)).collect()
}

/// Decodes one channel of row `y`.
pub fn channel_row(image: &AsImage, channel: Channel, y: usize) -> Vec<u32> {
    let mut row = vec![0; image.width()];
    let count = image.decode_line(channel, &mut row, y, 0, image.width(), &mut ScratchBuffer::new());
    row.truncate(count);
    row
}

/// Block letters of a fixed size, one column of spacing between glyphs.
#[derive(Debug, Clone, Copy)]
pub struct BlockFont {
    pub glyph_width: usize,
    pub glyph_height: usize,
    pub color: Argb32,
}

/// Renders every non-space character as a filled block.
#[derive(Debug)]
pub struct BlockRenderer<'a> {
    pub ctx: &'a Context,
}

impl TextRenderer for BlockRenderer<'_> {
    type Font = BlockFont;

    fn measure(&self, text: &str, font: &BlockFont) -> (usize, usize) {
        let count = text.chars().count();
        let width = (count * (font.glyph_width + 1)).saturating_sub(1);
        (width, font.glyph_height)
    }

    fn render(&self, text: &str, font: &BlockFont) -> Result<AsImage, ImageError> {
        let (width, height) = self.measure(text, font);
        let glyphs: Vec<char> = text.chars().collect();

        let mut raw = Vec::with_capacity(width * height * 4);
        for _ in 0..height {
            for x in 0..width {
                let glyph = x / (font.glyph_width + 1);
                let inked = x % (font.glyph_width + 1) < font.glyph_width && glyphs[glyph] != ' ';
                let alpha = if inked { 0xFF } else { 0x00 };
                raw.extend([font.color.red(), font.color.green(), font.color.blue(), alpha]);
            }
        }

        raw_to_image(self.ctx, &raw, width, height, RawLayout::Rgba, Some(1.0), None)
    }
}
