use crate::color::Channel;
use crate::scanline::Scanline;

/// How a layer is combined with what lies below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Top over bottom, weighted by the top alpha.
    #[default]
    AlphaBlend,
    /// Average of both layers.
    Allanon,
    Add,
    /// Bottom minus top.
    Sub,
    /// Absolute difference.
    Diff,
    Darken,
    Lighten,
    Screen,
}

impl BlendMode {
    fn combine(self, bottom: u32, top: u32, full: u32) -> u32 {
        match self {
            BlendMode::AlphaBlend => top,
            BlendMode::Allanon => (bottom + top) >> 1,
            BlendMode::Add => (bottom + top).min(full),
            BlendMode::Sub => bottom.saturating_sub(top),
            BlendMode::Diff => bottom.abs_diff(top),
            BlendMode::Darken => bottom.min(top),
            BlendMode::Lighten => bottom.max(top),
            BlendMode::Screen => {
                let inverse = u64::from(full.saturating_sub(bottom)) * u64::from(full.saturating_sub(top));
                full - u32::try_from(inverse / u64::from(full.max(1))).unwrap_or(full)
            }
        }
    }

    /// Blends `len` samples of `top`, starting at `src_x`, over `bottom` at `dst_x`.
    ///
    /// Both lines must use the same shift. Channels missing from a line take its back color. A
    /// fully opaque top sample replaces the bottom one with the combined color, a fully
    /// transparent one leaves it untouched.
    pub fn apply(self, bottom: &mut Scanline, top: &Scanline, dst_x: usize, src_x: usize, len: usize) {
        let shift = bottom.shift();
        let full = 0xFFu32 << shift;
        let len = len
            .min(bottom.width().saturating_sub(dst_x))
            .min(top.width().saturating_sub(src_x));
        if len == 0 {
            return;
        }

        let top_sample = |channel: Channel, x: usize| -> u32 {
            if top.flags().has(channel) {
                top.channel(channel)[src_x + x]
            } else {
                u32::from(top.back_color().channel(channel)) << top.shift()
            }
        };

        let top_alpha: Vec<u32> = (0..len).map(|x| top_sample(Channel::Alpha, x).min(full)).collect();

        for channel in [Channel::Blue, Channel::Green, Channel::Red] {
            let samples = &mut bottom.channel_mut(channel)[dst_x..dst_x + len];
            for (x, b) in samples.iter_mut().enumerate() {
                let alpha = top_alpha[x] >> shift;
                if alpha == 0 {
                    continue;
                }

                let combined = self.combine(*b, top_sample(channel, x), full);
                *b = if alpha >= 0xFF {
                    combined
                } else {
                    (*b * (0xFF - alpha) + combined * alpha) / 0xFF
                };
            }
        }

        let samples = &mut bottom.channel_mut(Channel::Alpha)[dst_x..dst_x + len];
        for (b, ta) in samples.iter_mut().zip(&top_alpha) {
            let alpha = ta >> shift;
            if alpha >= 0xFF {
                *b = *ta;
            } else if alpha > 0 {
                *b = (*b * (0xFF - alpha) / 0xFF + ta).min(full);
            }
        }

        bottom.set_flags(bottom.flags() | top.flags());
    }
}
