//! Compositing a stack of layers into a new image.

use crate::bevel::Bevel;
use crate::blend::BlendMode;
use crate::color::{Argb32, Channel, ChannelFlags};
use crate::context::{Context, Quality};
use crate::decoder::{DecoderSource, ImageDecoder};
use crate::error::ImageError;
use crate::gradient::{Gradient, GradientSource};
use crate::image::AsImage;
use crate::output::{ImageOutput, OutputFormat};
use crate::scanline::Scanline;

/// What a layer draws.
#[derive(Debug, Clone, Default)]
pub enum LayerSource<'a> {
    /// A solid rectangle of the layer back color.
    #[default]
    None,
    Image(&'a AsImage),
    Gradient(Gradient),
}

/// One entry of the compositing stack.
///
/// `dst_x, dst_y` place the top-left corner of the layer on the canvas, bevel outline included.
/// The clip rectangle selects the part of the source to draw, tiling it when larger than the
/// source. A clip size of 0 means the source size, or the canvas size for solid layers.
#[derive(Debug, Clone, Default)]
pub struct ImageLayer<'a> {
    pub source: LayerSource<'a>,
    pub dst_x: isize,
    pub dst_y: isize,
    pub clip_x: isize,
    pub clip_y: isize,
    pub clip_width: usize,
    pub clip_height: usize,
    pub bevel: Option<Bevel>,
    /// Color of solid layers and of whatever the first layer leaves uncovered.
    pub back_color: Argb32,
    pub blend: BlendMode,
}

impl<'a> ImageLayer<'a> {
    pub fn new(source: LayerSource<'a>) -> Self {
        Self {
            source,
            back_color: Argb32::TRANSPARENT,
            ..Self::default()
        }
    }

    pub fn solid(back_color: Argb32) -> Self {
        Self {
            back_color,
            ..Self::default()
        }
    }

    pub fn image(image: &'a AsImage) -> Self {
        Self::new(LayerSource::Image(image))
    }

    pub fn gradient(gradient: Gradient) -> Self {
        Self::new(LayerSource::Gradient(gradient))
    }

    #[must_use]
    pub fn with_position(mut self, x: isize, y: isize) -> Self {
        self.dst_x = x;
        self.dst_y = y;
        self
    }

    #[must_use]
    pub fn with_clip(mut self, x: isize, y: isize, width: usize, height: usize) -> Self {
        self.clip_x = x;
        self.clip_y = y;
        self.clip_width = width;
        self.clip_height = height;
        self
    }

    #[must_use]
    pub fn with_bevel(mut self, bevel: Bevel) -> Self {
        self.bevel = Some(bevel);
        self
    }

    #[must_use]
    pub fn with_back_color(mut self, back_color: Argb32) -> Self {
        self.back_color = back_color;
        self
    }

    #[must_use]
    pub fn with_blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    fn open_decoder(&self, ctx: &'a Context, width: usize, height: usize) -> Result<ImageDecoder<'a>, ImageError> {
        let (source, out_width, out_height) = match &self.source {
            LayerSource::None => (
                DecoderSource::None,
                or_default(self.clip_width, width),
                or_default(self.clip_height, height),
            ),
            LayerSource::Image(image) => (DecoderSource::Image(*image), self.clip_width, self.clip_height),
            LayerSource::Gradient(gradient) => {
                let gradient_width = or_default(self.clip_width, width);
                let gradient_height = or_default(self.clip_height, height);
                let source = GradientSource::new(gradient.clone(), gradient_width, gradient_height);
                (DecoderSource::Custom(Box::new(source)), gradient_width, gradient_height)
            }
        };

        let mut decoder = ImageDecoder::new(
            ctx,
            source,
            ChannelFlags::ALL,
            self.clip_x,
            self.clip_y,
            out_width,
            out_height,
            self.bevel.as_ref(),
        )?;
        decoder.set_shift(8);
        if matches!(self.source, LayerSource::None) {
            decoder.set_back_color(self.back_color);
        }

        Ok(decoder)
    }
}

fn or_default(size: usize, default: usize) -> usize {
    if size == 0 {
        default
    } else {
        size
    }
}

/// A layer being drawn: its decoder and where its rows land on the canvas.
struct Placed<'a> {
    decoder: ImageDecoder<'a>,
    blend: BlendMode,
    x: isize,
    y: isize,
    rows: usize,
}

impl Placed<'_> {
    fn covers(&self, y: usize) -> bool {
        let Ok(y) = isize::try_from(y) else {
            return false;
        };
        let rows = isize::try_from(self.rows).unwrap_or(isize::MAX);
        (self.y..self.y.saturating_add(rows)).contains(&y)
    }
}

/// Horizontal overlap of a row of `line_width` at `x` with a canvas of `width`, as
/// `(dst_x, src_x, len)`.
fn span(x: isize, line_width: usize, width: usize) -> Option<(usize, usize, usize)> {
    let left = x.max(0);
    let right = x
        .saturating_add(isize::try_from(line_width).unwrap_or(isize::MAX))
        .min(isize::try_from(width).unwrap_or(isize::MAX));
    if right <= left {
        return None;
    }

    Some((left.unsigned_abs(), (left - x).unsigned_abs(), (right - left).unsigned_abs()))
}

fn copy_span(canvas: &mut Scanline, line: &Scanline, dst_x: usize, src_x: usize, len: usize) {
    for channel in Channel::ALL {
        let dst = &mut canvas.channel_mut(channel)[dst_x..dst_x + len];
        if line.flags().has(channel) {
            dst.copy_from_slice(&line.channel(channel)[src_x..src_x + len]);
        } else {
            dst.fill(u32::from(line.back_color().channel(channel)) << line.shift());
        }
    }
}

/// Composites `layers` bottom to top into a new `width` by `height` image.
///
/// The first layer is copied, every further one blended over the result with its blend mode.
/// Canvas areas the first layer does not cover take its back color.
pub fn merge_layers(
    ctx: &Context,
    layers: &[ImageLayer<'_>],
    width: usize,
    height: usize,
    format: OutputFormat,
    compression: Option<u32>,
    quality: Option<Quality>,
) -> Result<AsImage, ImageError> {
    let Some(first) = layers.first() else {
        return Err(ImageError::MissingSource);
    };

    let mut image = AsImage::new(width, height, ctx.compression(compression))?;
    if matches!(first.source, LayerSource::None) {
        image.set_back_color(first.back_color);
    }

    debug!(layers = layers.len(), width, height, ?format, "Merging layers");

    let mut placed = Vec::with_capacity(layers.len());
    for layer in layers {
        let mut decoder = layer.open_decoder(ctx, width, height)?;

        for _ in 0..layer.dst_y.min(0).unsigned_abs() {
            decoder.decode_next();
        }

        placed.push(Placed {
            rows: decoder.line_count(),
            decoder,
            blend: layer.blend,
            x: layer.dst_x,
            y: layer.dst_y,
        });
    }

    let mut canvas = Scanline::new(width);
    canvas.set_shift(8);
    canvas.set_back_color(first.back_color);

    let mut output = ImageOutput::new(ctx, &mut image, format, 8, ctx.quality(quality))?;

    for y in 0..height {
        canvas.fill_with_back_color(ChannelFlags::ALL, 0);
        canvas.set_flags(ChannelFlags::ALL);

        for (index, layer) in placed.iter_mut().enumerate() {
            if !layer.covers(y) {
                continue;
            }

            let Some(line) = layer.decoder.decode_next() else {
                continue;
            };
            let Some((dst_x, src_x, len)) = span(layer.x, line.width(), width) else {
                continue;
            };

            if index == 0 {
                copy_span(&mut canvas, line, dst_x, src_x, len);
            } else {
                layer.blend.apply(&mut canvas, line, dst_x, src_x, len);
            }
        }

        output.output(&canvas, 1);
    }

    output.finish();
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::GradientKind;
    use crate::rle::ScratchBuffer;

    fn filled(width: usize, height: usize, color: Argb32) -> AsImage {
        let mut image = AsImage::new(width, height, 100).unwrap();
        for y in 0..height {
            for channel in Channel::ALL {
                image.add_line_mono(channel, color.channel(channel), y);
            }
        }
        image
    }

    fn pixels(image: &AsImage, y: usize) -> Vec<Argb32> {
        let mut line = Scanline::new(image.width());
        let mut scratch = ScratchBuffer::new();
        for channel in Channel::ALL {
            let count = image.decode_line(channel, line.channel_mut(channel), y, 0, image.width(), &mut scratch);
            if count == 0 {
                line.fill(channel, u32::from(image.back_color().channel(channel)), 0, image.width());
            }
        }
        line.set_flags(ChannelFlags::ALL);
        (0..image.width()).map(|x| line.pixel(x)).collect()
    }

    #[test]
    fn needs_a_layer() {
        let ctx = Context::default();
        let err = merge_layers(&ctx, &[], 4, 4, OutputFormat::AsImage, None, None).err();
        assert_eq!(err, Some(ImageError::MissingSource));
    }

    #[test]
    fn solid_base_with_placed_image() {
        let ctx = Context::default();
        let red = filled(2, 2, Argb32(0xFFFF_0000));

        let layers = [
            ImageLayer::solid(Argb32(0xFF00_00FF)),
            ImageLayer::image(&red).with_position(3, -1),
        ];
        let image = merge_layers(&ctx, &layers, 4, 2, OutputFormat::AsImage, None, Some(Quality::Fast)).unwrap();

        assert_eq!(image.back_color(), Argb32(0xFF00_00FF));
        assert_eq!(
            pixels(&image, 0),
            [
                Argb32(0xFF00_00FF),
                Argb32(0xFF00_00FF),
                Argb32(0xFF00_00FF),
                Argb32(0xFFFF_0000)
            ]
        );
        assert_eq!(pixels(&image, 1)[3], Argb32(0xFF00_00FF));
    }

    #[test]
    fn first_layer_leaves_back_color_uncovered() {
        let ctx = Context::default();
        let green = filled(1, 1, Argb32(0xFF00_FF00));

        let layers = [ImageLayer::image(&green)
            .with_position(1, 1)
            .with_back_color(Argb32(0x4020_2020))];
        let image = merge_layers(&ctx, &layers, 2, 2, OutputFormat::AsImage, None, Some(Quality::Poor)).unwrap();

        assert_eq!(pixels(&image, 0), [Argb32(0x4020_2020); 2]);
        assert_eq!(pixels(&image, 1), [Argb32(0x4020_2020), Argb32(0xFF00_FF00)]);
    }

    #[test]
    fn translucent_gradient_over_image() {
        let ctx = Context::default();
        let white = filled(3, 1, Argb32::WHITE);
        let gradient = Gradient::two_color(GradientKind::LeftToRight, Argb32(0x0000_0000), Argb32(0xFF00_0000));

        let layers = [ImageLayer::image(&white), ImageLayer::gradient(gradient)];
        let image = merge_layers(&ctx, &layers, 3, 1, OutputFormat::Argb32, None, Some(Quality::Fast)).unwrap();

        let argb = image.argb32().unwrap();
        assert_eq!(argb[0], Argb32::WHITE);
        assert_eq!(argb[2], Argb32::BLACK);
        assert!((0x7E..=0x81).contains(&argb[1].red()), "{:?}", argb[1]);
    }

    #[test]
    fn tiled_clip() {
        let ctx = Context::default();
        let mut source = AsImage::new(2, 1, 100).unwrap();
        let mut scratch = ScratchBuffer::new();
        for channel in [Channel::Red, Channel::Green, Channel::Blue] {
            source.add_line(channel, &[0x10, 0x20], 0, &mut scratch);
        }
        source.add_line_mono(Channel::Alpha, 0xFF, 0);

        let layers = [ImageLayer::image(&source).with_clip(1, 0, 5, 2)];
        let image = merge_layers(&ctx, &layers, 5, 2, OutputFormat::AsImage, None, Some(Quality::Fast)).unwrap();

        let reds: Vec<u8> = pixels(&image, 1).iter().map(|pixel| pixel.red()).collect();
        assert_eq!(reds, [0x20, 0x10, 0x20, 0x10, 0x20]);
    }
}
