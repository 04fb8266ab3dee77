//! Conversions between images, native pixel buffers and raw pixel rows.

use crate::color::{Channel, ChannelFlags, GammaTable};
use crate::context::{Context, Quality};
use crate::decoder::ImageDecoder;
use crate::error::ImageError;
use crate::image::{AltImage, AsImage};
use crate::native::PixelBuffer;
use crate::output::{ImageOutput, OutputFormat};
use crate::scanline::{RawLayout, Scanline};

/// Compresses a native buffer into a new image.
pub fn native_to_image(ctx: &Context, buffer: &PixelBuffer, compression: Option<u32>) -> Result<AsImage, ImageError> {
    if buffer.depth() != ctx.visual().depth() {
        return Err(ImageError::UnsupportedDepth(buffer.depth()));
    }

    let (width, height) = (buffer.width(), buffer.height());
    let mut image = AsImage::new(width, height, ctx.compression(compression))?;
    let mut line = Scanline::new(width);
    line.set_back_color(image.back_color());

    let mut output = ImageOutput::new(ctx, &mut image, OutputFormat::AsImage, 0, Quality::Poor)?;
    for y in 0..height {
        if let Some(row) = buffer.row(y) {
            ctx.visual().get_scanline(row, &mut line);
        }
        output.output(&line, 1);
    }
    output.finish();

    Ok(image)
}

fn decode_rows(ctx: &Context, image: &AsImage, filter: ChannelFlags, mut put: impl FnMut(usize, &Scanline)) -> Result<(), ImageError> {
    let mut decoder = ImageDecoder::new(ctx, image, filter, 0, 0, image.width(), image.height(), None)?;
    let mut y = 0;
    while let Some(line) = decoder.decode_next() {
        put(y, line);
        y += 1;
    }
    Ok(())
}

/// Renders `image` into a native buffer of the context visual, kept as its alternate form.
pub fn image_to_native<'i>(ctx: &Context, image: &'i mut AsImage) -> Result<&'i PixelBuffer, ImageError> {
    let mut buffer = ctx.visual().create_buffer(image.width(), image.height(), 0)?;

    decode_rows(ctx, image, ChannelFlags::ALL, |y, line| {
        if let Some(row) = buffer.row_mut(y) {
            ctx.visual().put_scanline(line, row);
        }
    })?;

    let mask = match core::mem::take(image.alt_mut()) {
        AltImage::Native { mask, .. } => mask,
        _ => None,
    };
    *image.alt_mut() = AltImage::Native {
        image: Some(buffer),
        mask,
    };

    image.native().ok_or(ImageError::UnsupportedFormat(OutputFormat::Native.name()))
}

/// Renders the alpha channel of `image` into a mask buffer of depth 1 or 8.
pub fn image_to_mask<'i>(ctx: &Context, image: &'i mut AsImage, depth: u8) -> Result<&'i PixelBuffer, ImageError> {
    if depth != 1 && depth != 8 {
        return Err(ImageError::UnsupportedDepth(depth));
    }

    let mut mask = PixelBuffer::new(image.width(), image.height(), depth)?;

    decode_rows(ctx, image, ChannelFlags::ALPHA, |y, line| {
        mask.put_mask_row(y, line.visible(Channel::Alpha));
    })?;

    let native = match core::mem::take(image.alt_mut()) {
        AltImage::Native { image, .. } => image,
        _ => None,
    };
    *image.alt_mut() = AltImage::Native {
        image: native,
        mask: Some(mask),
    };

    image
        .native_mask()
        .ok_or(ImageError::UnsupportedFormat(OutputFormat::NativeMask.name()))
}

/// Keeps `buffer` (and `mask`) as the only pixel data of `image`.
///
/// The channel rows are left as they are but are no longer read: decoding goes through the
/// buffer until a row is stored again.
pub fn cache_native(image: &mut AsImage, buffer: PixelBuffer, mask: Option<PixelBuffer>) -> Result<(), ImageError> {
    for candidate in core::iter::once(&buffer).chain(mask.as_ref()) {
        if candidate.width() != image.width() {
            return Err(ImageError::SizeMismatch {
                expected: image.width(),
                actual: candidate.width(),
            });
        }
        if candidate.height() != image.height() {
            return Err(ImageError::SizeMismatch {
                expected: image.height(),
                actual: candidate.height(),
            });
        }
    }

    image.attach_native(buffer, mask);
    Ok(())
}

/// Compresses raw 8-bit rows into a new image.
///
/// Color channels go through a gamma table built from `gamma`, or from the context gamma when
/// none is given.
pub fn raw_to_image(
    ctx: &Context,
    raw: &[u8],
    width: usize,
    height: usize,
    layout: RawLayout,
    gamma: Option<f64>,
    compression: Option<u32>,
) -> Result<AsImage, ImageError> {
    let row_len = width * layout.bytes_per_pixel();
    let expected = row_len * height;
    if raw.len() < expected {
        return Err(ImageError::SizeMismatch {
            expected,
            actual: raw.len(),
        });
    }

    let table = gamma.map_or_else(|| ctx.config().gamma_table(), GammaTable::new);
    let table = (!table.is_identity()).then_some(&table);

    let mut image = AsImage::new(width, height, ctx.compression(compression))?;
    let mut line = Scanline::new(width);
    line.set_back_color(image.back_color());

    let mut output = ImageOutput::new(ctx, &mut image, OutputFormat::AsImage, 0, Quality::Poor)?;
    for row in raw.chunks_exact(row_len).take(height) {
        line.fill_from_raw(row, layout, table);
        output.output(&line, 1);
    }
    output.finish();

    debug!(width, height, ?layout, "Imported raw pixels");

    Ok(image)
}
