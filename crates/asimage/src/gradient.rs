//! Multi-stop linear gradients.

use bitflags::bitflags;

use crate::color::{Argb32, Channel, ChannelFlags};
use crate::context::{Context, Quality};
use crate::decoder::{tile_into, ScanlineSource};
use crate::error::ImageError;
use crate::image::AsImage;
use crate::output::{ImageOutput, OutputFormat};
use crate::scanline::Scanline;

/// Direction a gradient runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GradientKind {
    #[default]
    LeftToRight,
    TopToBottom,
    TopLeftToBottomRight,
    BottomLeftToTopRight,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FlipFlags: u8 {
        /// Rotate by 90 degrees.
        const VERTICAL = 0x01;
        const UPSIDE_DOWN = 0x02;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub color: Argb32,
    /// Position along the gradient, in `0.0..=1.0`.
    pub offset: f64,
}

impl GradientStop {
    pub const fn new(color: Argb32, offset: f64) -> Self {
        Self { color, offset }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    kind: GradientKind,
    stops: Vec<GradientStop>,
}

impl Gradient {
    /// Creates a gradient from stops sorted by offset.
    pub fn new(kind: GradientKind, stops: Vec<GradientStop>) -> Result<Self, ImageError> {
        if stops.is_empty() {
            return Err(ImageError::InvalidGradient("no color stops"));
        }

        if stops.iter().any(|stop| !(0.0..=1.0).contains(&stop.offset)) {
            return Err(ImageError::InvalidGradient("offset outside of 0..=1"));
        }

        if stops.windows(2).any(|pair| pair[1].offset < pair[0].offset) {
            return Err(ImageError::InvalidGradient("offsets must not decrease"));
        }

        Ok(Self { kind, stops })
    }

    pub fn two_color(kind: GradientKind, from: Argb32, to: Argb32) -> Self {
        Self {
            kind,
            stops: vec![GradientStop::new(from, 0.0), GradientStop::new(to, 1.0)],
        }
    }

    pub fn kind(&self) -> GradientKind {
        self.kind
    }

    pub fn stops(&self) -> &[GradientStop] {
        &self.stops
    }

    /// Color at position `t`, clamped to `0.0..=1.0`.
    pub fn color_at(&self, t: f64) -> Argb32 {
        let sample = self.sample(t);
        let mut packed = 0u32;
        for channel in Channel::ALL {
            let value = (sample[channel.index()] + 0x80) >> 8;
            packed |= value.min(0xFF) << (channel.index() * 8);
        }
        Argb32(packed)
    }

    /// Samples with 8 fractional bits, indexed by [`Channel::index`].
    fn sample(&self, t: f64) -> [u32; Channel::COUNT] {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return [0; Channel::COUNT],
        };

        let (from, to, f) = if t <= first.offset {
            (first, first, 0.0)
        } else if t >= last.offset {
            (last, last, 0.0)
        } else {
            let next = self.stops.iter().position(|stop| stop.offset > t).unwrap_or(self.stops.len() - 1);
            let (from, to) = (&self.stops[next.saturating_sub(1)], &self.stops[next]);
            let span = to.offset - from.offset;
            let f = if span > 0.0 { (t - from.offset) / span } else { 1.0 };
            (from, to, f)
        };

        let mut sample = [0; Channel::COUNT];
        for channel in Channel::ALL {
            let a = f64::from(from.color.channel(channel));
            let b = f64::from(to.color.channel(channel));
            let value = ((a + (b - a) * f) * 256.0).round();
            sample[channel.index()] = (value as u32).min(0xFF00);
        }
        sample
    }

    /// Applies a flip to the direction of the gradient.
    ///
    /// A vertical flip turns horizontal gradients into vertical ones and swaps the diagonals.
    /// Depending on the combination, the stops are reversed, each offset becoming `1 - offset`.
    pub fn flip(&self, flip: FlipFlags) -> Self {
        let upside_down = flip.contains(FlipFlags::UPSIDE_DOWN);

        let (kind, inverse) = if flip.contains(FlipFlags::VERTICAL) {
            match self.kind {
                GradientKind::LeftToRight => (GradientKind::TopToBottom, !upside_down),
                GradientKind::TopLeftToBottomRight => (GradientKind::BottomLeftToTopRight, upside_down),
                GradientKind::TopToBottom => (GradientKind::LeftToRight, upside_down),
                GradientKind::BottomLeftToTopRight => (GradientKind::TopLeftToBottomRight, !upside_down),
            }
        } else {
            (self.kind, upside_down)
        };

        let stops = if inverse {
            self.stops
                .iter()
                .rev()
                .map(|stop| GradientStop::new(stop.color, 1.0 - stop.offset))
                .collect()
        } else {
            self.stops.clone()
        };

        Self { kind, stops }
    }

    fn position(&self, x: usize, y: usize, width: usize, height: usize) -> f64 {
        let ratio = |n: usize, d: usize| if d == 0 { 0.0 } else { n as f64 / d as f64 };

        match self.kind {
            GradientKind::LeftToRight => ratio(x, width.saturating_sub(1)),
            GradientKind::TopToBottom => ratio(y, height.saturating_sub(1)),
            GradientKind::TopLeftToBottomRight => ratio(x + y, (width + height).saturating_sub(2)),
            GradientKind::BottomLeftToTopRight => {
                ratio(x + height.saturating_sub(1 + y), (width + height).saturating_sub(2))
            }
        }
    }

    /// Fills row `y` of a `line.width()` by `height` rendering, honoring the line's shift.
    pub fn fill_row(&self, line: &mut Scanline, y: usize, height: usize, filter: ChannelFlags) {
        let width = line.width();
        let down = 8 - line.shift();

        let vertical = self.kind == GradientKind::TopToBottom;
        let row_sample = vertical.then(|| self.sample(self.position(0, y, width, height)));

        for x in 0..width {
            let sample = row_sample.unwrap_or_else(|| self.sample(self.position(x, y, width, height)));
            for channel in filter.channels() {
                line.channel_mut(channel)[x] = sample[channel.index()] >> down;
            }
        }

        line.set_flags(filter);
    }
}

/// Renders `gradient` into a new image through the encoder, dithering with the quality tier.
#[expect(clippy::too_many_arguments)]
pub fn make_gradient(
    ctx: &Context,
    gradient: &Gradient,
    width: usize,
    height: usize,
    filter: ChannelFlags,
    format: OutputFormat,
    compression: Option<u32>,
    quality: Option<Quality>,
) -> Result<AsImage, ImageError> {
    if filter.is_empty() {
        return Err(ImageError::EmptyFilter);
    }

    let mut image = AsImage::new(width, height, ctx.compression(compression))?;
    image.set_back_color(ctx.config().back_color);

    debug!(kind = ?gradient.kind, stops = gradient.stops.len(), width, height, "Rendering gradient");

    let mut line = Scanline::new(width);
    line.set_shift(8);
    line.set_back_color(ctx.config().back_color);

    let mut output = ImageOutput::new(ctx, &mut image, format, 8, ctx.quality(quality))?;
    for y in 0..height {
        gradient.fill_row(&mut line, y, height, filter);
        output.output(&line, 1);
    }
    output.finish();

    Ok(image)
}

/// A gradient rendered on demand, one row at a time.
#[derive(Debug, Clone)]
pub struct GradientSource {
    gradient: Gradient,
    height: usize,
    back_color: Argb32,
    row: Scanline,
    row_y: Option<usize>,
}

impl GradientSource {
    pub fn new(gradient: Gradient, width: usize, height: usize) -> Self {
        Self {
            gradient,
            height,
            back_color: Argb32::TRANSPARENT,
            row: Scanline::new(width),
            row_y: None,
        }
    }

    pub fn gradient(&self) -> &Gradient {
        &self.gradient
    }
}

impl ScanlineSource for GradientSource {
    fn width(&self) -> usize {
        self.row.width()
    }

    fn height(&self) -> usize {
        self.height
    }

    fn back_color(&self) -> Argb32 {
        self.back_color
    }

    fn decode_channel(&mut self, channel: Channel, y: usize, skip: usize, dst: &mut [u32]) -> usize {
        if y >= self.height {
            return 0;
        }

        if self.row_y != Some(y) {
            self.gradient.fill_row(&mut self.row, y, self.height, ChannelFlags::ALL);
            self.row_y = Some(y);
        }

        tile_into(self.row.channel(channel), skip, dst)
    }
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;
    use crate::rle::ScratchBuffer;

    fn black_to_white() -> Gradient {
        Gradient::two_color(GradientKind::LeftToRight, Argb32::BLACK, Argb32::WHITE)
    }

    #[test]
    fn stops_are_validated() {
        assert_eq!(
            Gradient::new(GradientKind::TopToBottom, Vec::new()),
            Err(ImageError::InvalidGradient("no color stops"))
        );
        assert!(Gradient::new(
            GradientKind::TopToBottom,
            vec![
                GradientStop::new(Argb32::WHITE, 0.6),
                GradientStop::new(Argb32::BLACK, 0.2)
            ]
        )
        .is_err());
    }

    #[test]
    fn colors_between_stops() {
        let gradient = Gradient::new(
            GradientKind::LeftToRight,
            vec![
                GradientStop::new(Argb32(0xFFFF_0000), 0.0),
                GradientStop::new(Argb32(0xFF00_FF00), 0.5),
                GradientStop::new(Argb32(0xFF00_00FF), 1.0),
            ],
        )
        .unwrap();

        assert_eq!(gradient.color_at(-1.0), Argb32(0xFFFF_0000));
        assert_eq!(gradient.color_at(0.25), Argb32(0xFF80_8000));
        assert_eq!(gradient.color_at(0.5), Argb32(0xFF00_FF00));
        assert_eq!(gradient.color_at(2.0), Argb32(0xFF00_00FF));
        assert_eq!(black_to_white().color_at(0.5), Argb32(0xFF80_8080));
    }

    #[test]
    fn flips() {
        let gradient = Gradient::new(
            GradientKind::LeftToRight,
            vec![
                GradientStop::new(Argb32::BLACK, 0.0),
                GradientStop::new(Argb32::WHITE, 0.25),
            ],
        )
        .unwrap();

        let rotated = gradient.flip(FlipFlags::VERTICAL);
        assert_eq!(rotated.kind(), GradientKind::TopToBottom);
        assert_eq!(rotated.stops()[0], GradientStop::new(Argb32::WHITE, 0.75));

        let rotated_back = gradient.flip(FlipFlags::VERTICAL | FlipFlags::UPSIDE_DOWN);
        assert_eq!(rotated_back.stops(), gradient.stops());

        let reversed = gradient.flip(FlipFlags::UPSIDE_DOWN);
        assert_eq!(reversed.kind(), GradientKind::LeftToRight);
        assert_eq!(reversed.stops()[1], GradientStop::new(Argb32::BLACK, 1.0));

        let diagonal = Gradient::two_color(GradientKind::TopLeftToBottomRight, Argb32::BLACK, Argb32::WHITE);
        let flipped = diagonal.flip(FlipFlags::VERTICAL);
        assert_eq!(flipped.kind(), GradientKind::BottomLeftToTopRight);
        assert_eq!(flipped.stops(), diagonal.stops());
    }

    #[test]
    fn rendered_ramp() {
        let ctx = Context::default();
        let image = make_gradient(
            &ctx,
            &black_to_white(),
            5,
            2,
            ChannelFlags::COLOR,
            OutputFormat::AsImage,
            None,
            Some(Quality::Fast),
        )
        .unwrap();

        let mut red = vec![0; 5];
        image.decode_line(Channel::Red, &mut red, 1, 0, 5, &mut ScratchBuffer::new());
        expect![[r#"
            [
                0,
                63,
                127,
                191,
                255,
            ]
        "#]]
        .assert_debug_eq(&red);
        assert_eq!(image.row(Channel::Alpha, 0), None);
    }

    #[test]
    fn diagonal_source_rows() {
        let gradient = Gradient::two_color(GradientKind::BottomLeftToTopRight, Argb32::BLACK, Argb32::WHITE);
        let mut source = GradientSource::new(gradient, 3, 3);

        let mut row = [0; 4];
        assert_eq!(source.decode_channel(Channel::Green, 2, 0, &mut row), 4);
        assert_eq!(row, [0, 63, 127, 0]);

        source.decode_channel(Channel::Green, 0, 1, &mut row);
        assert_eq!(row, [191, 255, 127, 191]);
        assert_eq!(source.decode_channel(Channel::Green, 3, 0, &mut row), 0);
    }
}
