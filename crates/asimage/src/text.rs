use crate::error::ImageError;
use crate::image::AsImage;

/// Rasterizes text into images usable as compositing layers.
///
/// Glyph coverage is expected in the alpha channel, with the text color in the color channels.
pub trait TextRenderer {
    type Font;

    /// Size in pixels of `text` rendered with `font`, as `(width, height)`.
    fn measure(&self, text: &str, font: &Self::Font) -> (usize, usize);

    fn render(&self, text: &str, font: &Self::Font) -> Result<AsImage, ImageError>;
}
