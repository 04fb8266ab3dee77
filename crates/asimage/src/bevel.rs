//! Bevel frames drawn around decoded rows.
//!
//! A bevel has an outline, drawn outside the image as mitred solid bands, and an inline, drawn
//! over the image edges as either solid translucent or fading bands. The top and left edges use
//! the highlight color, the bottom and right edges the shade color.

use bitflags::bitflags;

use crate::color::{Argb32, Channel};
use crate::scanline::Scanline;

/// Outlines never exceed this many pixels.
pub const MAX_BEVEL_OUTLINE: u32 = 100;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BevelType: u8 {
        /// Inline edges are drawn at half the color alpha instead of fading towards the center.
        const SOLID_INLINE = 0x01;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bevel {
    pub kind: BevelType,
    pub hi_color: Argb32,
    pub lo_color: Argb32,
    pub hihi_color: Argb32,
    pub hilo_color: Argb32,
    pub lolo_color: Argb32,
    pub left_outline: u32,
    pub top_outline: u32,
    pub right_outline: u32,
    pub bottom_outline: u32,
    pub left_inline: u32,
    pub top_inline: u32,
    pub right_inline: u32,
    pub bottom_inline: u32,
}

impl Bevel {
    /// A bevel with uniform outline and inline thickness.
    pub fn uniform(hi_color: Argb32, lo_color: Argb32, outline: u32, inline: u32) -> Self {
        Self {
            kind: BevelType::empty(),
            hi_color,
            lo_color,
            hihi_color: hi_color,
            hilo_color: blend_halfway(hi_color, lo_color),
            lolo_color: lo_color,
            left_outline: outline,
            top_outline: outline,
            right_outline: outline,
            bottom_outline: outline,
            left_inline: inline,
            top_inline: inline,
            right_inline: inline,
            bottom_inline: inline,
        }
    }

    /// Clamps the thicknesses to an output of `width` by `height`.
    ///
    /// Returns `None` when nothing is left to draw.
    pub fn clamped(&self, width: usize, height: usize) -> Option<Self> {
        let width = u32::try_from(width).unwrap_or(u32::MAX);
        let height = u32::try_from(height).unwrap_or(u32::MAX);
        let mut bevel = *self;

        bevel.left_outline = bevel.left_outline.min(MAX_BEVEL_OUTLINE);
        bevel.top_outline = bevel.top_outline.min(MAX_BEVEL_OUTLINE);
        bevel.right_outline = bevel.right_outline.min(MAX_BEVEL_OUTLINE);
        bevel.bottom_outline = bevel.bottom_outline.min(MAX_BEVEL_OUTLINE);

        bevel.left_inline = bevel.left_inline.min(width);
        bevel.top_inline = bevel.top_inline.min(height);
        bevel.right_inline = bevel.right_inline.min(width - bevel.left_inline);
        bevel.bottom_inline = bevel.bottom_inline.min(height - bevel.top_inline);

        let empty = [
            bevel.left_outline,
            bevel.top_outline,
            bevel.right_outline,
            bevel.bottom_outline,
            bevel.left_inline,
            bevel.top_inline,
            bevel.right_inline,
            bevel.bottom_inline,
        ]
        .iter()
        .all(|v| *v == 0);

        (!empty).then_some(bevel)
    }
}

fn blend_halfway(a: Argb32, b: Argb32) -> Argb32 {
    let mut packed = 0u32;
    for channel in Channel::ALL {
        let value = (u32::from(a.channel(channel)) + u32::from(b.channel(channel))) / 2;
        packed |= value << (channel.index() * 8);
    }
    Argb32(packed)
}

fn int(value: u32) -> isize {
    isize::try_from(value).unwrap_or(isize::MAX)
}

/// Placement of the bevel rectangle relative to the decoded rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BevelGeometry {
    pub(crate) left: isize,
    pub(crate) top: isize,
    pub(crate) right: isize,
    pub(crate) bottom: isize,
    pub(crate) h_addon: usize,
    pub(crate) v_addon: usize,
}

impl BevelGeometry {
    /// The bevel tightly wraps the output, outlines included.
    pub(crate) fn around(bevel: &Bevel, out_width: usize, out_height: usize) -> Self {
        let left = int(bevel.left_outline);
        let top = int(bevel.top_outline);

        Self {
            left,
            top,
            right: left + isize::try_from(out_width).unwrap_or(isize::MAX),
            bottom: top + isize::try_from(out_height).unwrap_or(isize::MAX),
            h_addon: (bevel.left_outline + bevel.right_outline) as usize,
            v_addon: (bevel.top_outline + bevel.bottom_outline) as usize,
        }
    }

    /// Places the bevel at `x, y` with the given size. The rectangle is extended so that it
    /// always covers the whole output, and outlines falling outside the output are dropped.
    pub(crate) fn placed(bevel: &Bevel, x: isize, y: isize, width: usize, height: usize, out_width: usize, out_height: usize) -> Self {
        let out_width = isize::try_from(out_width).unwrap_or(isize::MAX);
        let out_height = isize::try_from(out_height).unwrap_or(isize::MAX);
        let mut width = isize::try_from(width).unwrap_or(isize::MAX);
        let mut height = isize::try_from(height).unwrap_or(isize::MAX);

        let x = x.min(0);
        let y = y.min(0);
        if x + width < out_width {
            width += out_width - x;
        }
        if y + height < out_height {
            height += out_height - y;
        }

        let left = x;
        let top = y;
        let right = x + width;
        let bottom = y + height;

        let h_addon = (left + int(bevel.left_outline)).max(0) + (out_width - right).max(0).min(int(bevel.right_outline));
        let v_addon = (top + int(bevel.top_outline)).max(0) + (out_height - bottom).max(0).min(int(bevel.bottom_outline));

        Self {
            left,
            top,
            right,
            bottom,
            h_addon: h_addon.unsigned_abs(),
            v_addon: v_addon.unsigned_abs(),
        }
    }

    /// Paints output row `y_out` of the beveled region into `line`.
    ///
    /// Rows between the outlines are first filled by `body`, which receives the line and the
    /// index of the first sample it has to decode.
    pub(crate) fn paint(&self, bevel: &Bevel, line: &mut Scanline, y_out: isize, body: impl FnOnce(&mut Scanline, usize)) {
        let width = isize::try_from(line.width()).unwrap_or(isize::MAX);

        if y_out < self.top {
            if bevel.top_outline > 0 {
                let outline = int(bevel.top_outline);
                let row = y_out - (self.top - outline);
                let mut alt_left = row * int(bevel.left_outline) / outline + 1;
                let mut alt_right = row * int(bevel.right_outline) / outline + 1;

                alt_left += (self.left - int(bevel.left_outline)).max(0);
                let offset_shade = (self.right + int(bevel.right_outline) - alt_right).max(0).min(width);
                if width < self.right {
                    alt_right -= self.right - width;
                }

                solid_line(
                    line,
                    alt_left,
                    offset_shade,
                    offset_shade,
                    alt_right,
                    [bevel.hi_color, bevel.lo_color, bevel.hihi_color, bevel.hilo_color],
                );
            }
        } else if y_out >= self.bottom {
            if bevel.bottom_outline > 0 {
                let outline = int(bevel.bottom_outline);
                let row = outline - (y_out - self.bottom);
                let mut alt_left = row * int(bevel.left_outline) / outline + 1;
                let mut alt_right = row * int(bevel.right_outline) / outline + 1;

                alt_left += (self.left - int(bevel.left_outline)).max(0);
                if width < self.right {
                    alt_right -= self.right - width;
                }

                solid_line(
                    line,
                    alt_left,
                    alt_left,
                    alt_left,
                    alt_right,
                    [bevel.hi_color, bevel.lo_color, bevel.hilo_color, bevel.lolo_color],
                );
            }
        } else {
            let left_margin = self.left.max(0);
            let right_margin = width.min(self.right);

            if left_margin < width {
                body(line, left_margin.unsigned_abs());
            }

            solid_line(
                line,
                -1,
                left_margin,
                right_margin,
                width,
                [bevel.hi_color, bevel.lo_color, bevel.hilo_color, bevel.lolo_color],
            );

            if left_margin < width {
                self.paint_inline(bevel, line, y_out, left_margin, right_margin);
            }
        }
    }

    fn paint_inline(&self, bevel: &Bevel, line: &mut Scanline, y_out: isize, left_margin: isize, right_margin: isize) {
        let left_inline = int(bevel.left_inline);
        let right_inline = int(bevel.right_inline);
        let top_inline = int(bevel.top_inline);
        let bottom_inline = int(bevel.bottom_inline);
        let solid = bevel.kind.contains(BevelType::SOLID_INLINE);

        let margins = Margins {
            left: left_margin,
            right: right_margin,
        };

        if y_out < self.top + top_inline {
            let row = y_out - self.top;
            let left_delta = left_inline - row * left_inline / top_inline;
            let right_delta = right_inline - (row * right_inline / top_inline - 1);
            let deltas = Deltas {
                left: left_delta,
                right: right_delta,
            };

            let alpha = if solid {
                self.transparent_sides(bevel, line, margins, deltas);
                u32::from(bevel.hi_color.alpha()) << 7
            } else {
                self.fading_sides(bevel, line, margins, deltas);
                let step = (u32::from(bevel.hi_color.alpha()) << 8) / (bevel.left_inline + 1);
                step * u32::try_from(left_delta + 1).unwrap_or(0)
            };

            self.transparent_line(
                bevel,
                line,
                Deltas {
                    left: left_delta - 1,
                    right: right_delta - 1,
                },
                alpha,
                [bevel.hihi_color, bevel.hi_color, bevel.hilo_color],
            );
        } else if y_out >= self.bottom - bottom_inline {
            let row = y_out - (self.bottom - bottom_inline);
            let left_delta = row * left_inline / bottom_inline + 1;
            let right_delta = row * right_inline / bottom_inline - 1;
            let deltas = Deltas {
                left: left_delta,
                right: right_delta,
            };

            let alpha = if solid {
                self.transparent_sides(bevel, line, margins, deltas);
                u32::from(bevel.lo_color.alpha()) << 7
            } else {
                self.fading_sides(bevel, line, margins, deltas);
                let step = (u32::from(bevel.lo_color.alpha()) << 8) / (bevel.right_inline + 1);
                step * u32::try_from(right_delta + 1).unwrap_or(0)
            };

            self.transparent_line(
                bevel,
                line,
                Deltas {
                    left: left_delta - 1,
                    right: right_delta,
                },
                alpha,
                [bevel.hilo_color, bevel.lo_color, bevel.lolo_color],
            );
        } else {
            let deltas = Deltas { left: 0, right: 0 };
            if solid {
                self.transparent_sides(bevel, line, margins, deltas);
            } else {
                self.fading_sides(bevel, line, margins, deltas);
            }
        }
    }

    /// Vertical inline edges fading from the full color alpha at the border to nothing.
    fn fading_sides(&self, bevel: &Bevel, line: &mut Scanline, margins: Margins, deltas: Deltas) {
        let width = isize::try_from(line.width()).unwrap_or(isize::MAX);
        let shift = line.shift();
        let hi_step = (i64::from(bevel.hi_color.alpha()) << 8) / (i64::from(bevel.left_inline) + 1);
        let lo_step = (i64::from(bevel.lo_color.alpha()) << 8) / (i64::from(bevel.right_inline) + 1);

        for channel in line.flags().channels() {
            let samples = line.channel_mut(channel);

            let color = i64::from(bevel.hi_color.channel(channel)) << shift;
            let mut ca = hi_step * (deltas.left as i64 + 1);
            let mut i = width.min(self.left + int(bevel.left_inline) - deltas.left);
            while i > margins.left {
                i -= 1;
                mix(samples, i, color, ca >> 8);
                ca += hi_step;
            }

            let color = i64::from(bevel.lo_color.channel(channel)) << shift;
            let mut ca = lo_step * (deltas.right as i64 + 1);
            let mut i = margins.left.max(self.right + deltas.right - int(bevel.right_inline));
            while i + 1 < margins.right {
                i += 1;
                mix(samples, i, color, ca >> 8);
                ca += lo_step;
            }
        }
    }

    /// Vertical inline edges at half the color alpha.
    fn transparent_sides(&self, bevel: &Bevel, line: &mut Scanline, margins: Margins, deltas: Deltas) {
        let width = isize::try_from(line.width()).unwrap_or(isize::MAX);
        let shift = line.shift();
        let hi_alpha = i64::from(bevel.hi_color.alpha() >> 1);
        let lo_alpha = i64::from(bevel.lo_color.alpha() >> 1);

        for channel in line.flags().channels() {
            let samples = line.channel_mut(channel);

            let color = i64::from(bevel.hi_color.channel(channel)) << shift;
            let mut i = width.min(self.left + int(bevel.left_inline) - deltas.left);
            while i > margins.left {
                i -= 1;
                mix(samples, i, color, hi_alpha);
            }

            let color = i64::from(bevel.lo_color.channel(channel)) << shift;
            let mut i = margins.left.max(self.right + deltas.right - int(bevel.right_inline));
            while i + 1 < margins.right {
                i += 1;
                mix(samples, i, color, lo_alpha);
            }
        }
    }

    /// Horizontal inline edge, with corner colors at both ends.
    fn transparent_line(&self, bevel: &Bevel, line: &mut Scanline, deltas: Deltas, ca: u32, colors: [Argb32; 3]) {
        let width = isize::try_from(line.width()).unwrap_or(isize::MAX);
        let shift = line.shift();
        let start = self.left + int(bevel.left_inline) - deltas.left;
        let end = self.right + deltas.right - int(bevel.right_inline);
        let alpha = i64::from(ca >> 8);
        let [left_color, color, right_color] = colors;

        if start >= width || end <= 0 {
            return;
        }

        for channel in line.flags().channels() {
            let samples = line.channel_mut(channel);

            let mut i = if start < 0 { -1 } else { start - 1 };
            if i >= 0 {
                mix(samples, i, i64::from(left_color.channel(channel)) << shift, alpha);
            }

            let end = if end >= width {
                width
            } else {
                mix(samples, end, i64::from(right_color.channel(channel)) << shift, alpha);
                end
            };

            let color = i64::from(color.channel(channel)) << shift;
            while i + 1 < end {
                i += 1;
                mix(samples, i, color, alpha);
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Margins {
    left: isize,
    right: isize,
}

#[derive(Debug, Clone, Copy)]
struct Deltas {
    left: isize,
    right: isize,
}

/// Blends `color` over sample `i` with an 8-bit `alpha`. Out of range indices are ignored.
fn mix(samples: &mut [u32], i: isize, color: i64, alpha: i64) {
    let alpha = alpha.clamp(0, 255);
    if let Some(sample) = usize::try_from(i).ok().and_then(|i| samples.get_mut(i)) {
        let blended = (i64::from(*sample) * (255 - alpha) + color * alpha) >> 8;
        *sample = u32::try_from(blended).unwrap_or(0);
    }
}

/// Fills `0..hi_end` with the highlight and `lo_start..` with the shade, marking the corners.
///
/// `colors` holds the highlight, the shade and the two corner colors.
fn solid_line(line: &mut Scanline, alt_left: isize, hi_end: isize, lo_start: isize, alt_right: isize, colors: [Argb32; 4]) {
    let width = isize::try_from(line.width()).unwrap_or(isize::MAX);
    let shift = line.shift();
    let [hi, lo, hi_corner, lo_corner] = colors;

    for channel in line.flags().channels() {
        let value = |color: Argb32| u32::from(color.channel(channel)) << shift;

        if hi_end > 0 {
            line.fill(channel, value(hi), 0, hi_end.unsigned_abs());
            if alt_left > 0 {
                set(line.channel_mut(channel), alt_left - 1, value(hi_corner));
            }
        }

        if lo_start < width {
            line.fill(channel, value(lo), lo_start.max(0).unsigned_abs(), line.width());
            if alt_right < width && alt_right > 0 {
                set(line.channel_mut(channel), width - alt_right, value(lo_corner));
            }
        }
    }
}

fn set(samples: &mut [u32], i: isize, value: u32) {
    if let Some(sample) = usize::try_from(i).ok().and_then(|i| samples.get_mut(i)) {
        *sample = value;
    }
}
