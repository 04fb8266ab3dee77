//! Packed ARGB32 colors, channel indices and gamma tables.

use core::fmt;

use bitflags::bitflags;

/// A packed `0xAARRGGBB` color.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Argb32(pub u32);

impl Argb32 {
    /// Opaque black, the background of freshly created images.
    pub const DEFAULT_BACK: Self = Self(0xFF00_0000);
    pub const TRANSPARENT: Self = Self(0x0000_0000);
    pub const BLACK: Self = Self(0xFF00_0000);
    pub const WHITE: Self = Self(0xFFFF_FFFF);

    pub const fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self(((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32))
    }

    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn blue(self) -> u8 {
        self.0 as u8
    }

    /// Extracts the 8-bit value of `channel`.
    pub const fn channel(self, channel: Channel) -> u8 {
        (self.0 >> (channel.index() * 8)) as u8
    }

    /// Returns a copy of `self` with the alpha channel replaced.
    #[must_use]
    pub const fn with_alpha(self, alpha: u8) -> Self {
        Self((self.0 & 0x00FF_FFFF) | ((alpha as u32) << 24))
    }

    pub const fn is_opaque(self) -> bool {
        self.alpha() == 0xFF
    }
}

impl fmt::Debug for Argb32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.0)
    }
}

impl From<u32> for Argb32 {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Argb32> for u32 {
    fn from(value: Argb32) -> Self {
        value.0
    }
}

/// One of the four sample planes of an image.
///
/// The discriminant is the byte position of the channel inside an [`Argb32`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Blue = 0,
    Green = 1,
    Red = 2,
    Alpha = 3,
}

impl Channel {
    pub const COUNT: usize = 4;

    pub const ALL: [Channel; Self::COUNT] = [Channel::Blue, Channel::Green, Channel::Red, Channel::Alpha];

    pub const fn index(self) -> usize {
        match self {
            Channel::Blue => 0,
            Channel::Green => 1,
            Channel::Red => 2,
            Channel::Alpha => 3,
        }
    }

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Channel::Blue),
            1 => Some(Channel::Green),
            2 => Some(Channel::Red),
            3 => Some(Channel::Alpha),
            _ => None,
        }
    }

    pub const fn flag(self) -> ChannelFlags {
        match self {
            Channel::Blue => ChannelFlags::BLUE,
            Channel::Green => ChannelFlags::GREEN,
            Channel::Red => ChannelFlags::RED,
            Channel::Alpha => ChannelFlags::ALPHA,
        }
    }
}

bitflags! {
    /// Set of channels a scanline carries, or a decoder/encoder should process.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChannelFlags: u8 {
        const BLUE = 0x01;
        const GREEN = 0x02;
        const RED = 0x04;
        const ALPHA = 0x08;
        const COLOR = Self::BLUE.bits() | Self::GREEN.bits() | Self::RED.bits();
        const ALL = Self::COLOR.bits() | Self::ALPHA.bits();
    }
}

impl ChannelFlags {
    pub fn has(self, channel: Channel) -> bool {
        self.contains(channel.flag())
    }

    /// Iterates over the channels in this set, in storage order.
    pub fn channels(self) -> impl Iterator<Item = Channel> {
        Channel::ALL.into_iter().filter(move |channel| self.has(*channel))
    }
}

/// Lookup table mapping linear 8-bit samples through `x^(1/gamma)`.
#[derive(Clone, PartialEq, Eq)]
pub struct GammaTable {
    table: [u8; 256],
}

impl GammaTable {
    /// Builds the table for `gamma`.
    ///
    /// A gamma of `1.0`, or any non-positive or non-finite value, yields the identity table.
    pub fn new(gamma: f64) -> Self {
        let mut table = [0u8; 256];

        for (i, entry) in table.iter_mut().enumerate() {
            *entry = i as u8;
        }

        if gamma.is_finite() && gamma > 0.0 && (gamma - 1.0).abs() > f64::EPSILON {
            let inverse = 1.0 / gamma;
            for (i, entry) in table.iter_mut().enumerate() {
                let normalized = i as f64 / 255.0;
                *entry = (normalized.powf(inverse) * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        }

        Self { table }
    }

    pub fn identity() -> Self {
        Self::new(1.0)
    }

    pub fn is_identity(&self) -> bool {
        self.table.iter().enumerate().all(|(i, v)| usize::from(*v) == i)
    }

    pub fn apply(&self, value: u8) -> u8 {
        self.table[usize::from(value)]
    }
}

impl Default for GammaTable {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Debug for GammaTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GammaTable")
            .field("identity", &self.is_identity())
            .field("mid", &self.table[128])
            .finish()
    }
}
