use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context as _;
use asimage::{merge_layers, AsImage, Context, ImageLayer, OutputFormat};

use crate::config::RenderConfig;

/// Composes the configured layers into an image carrying an ARGB32 buffer.
pub fn render(config: &RenderConfig) -> anyhow::Result<AsImage> {
    let mut ctx = Context::default();
    let engine = ctx.config_mut();
    engine.quality = config.quality;
    engine.compression = config.compression;
    engine.back_color = config.back_color;

    let mut layers = vec![ImageLayer::gradient(config.gradient.clone()).with_back_color(config.back_color)];

    if let Some(panel) = &config.panel {
        let (outline_x, outline_y) = panel.bevel.map_or((0, 0), |bevel| {
            (
                (bevel.left_outline + bevel.right_outline) as usize,
                (bevel.top_outline + bevel.bottom_outline) as usize,
            )
        });
        let width = config.width.saturating_sub(2 * panel.margin + outline_x);
        let height = config.height.saturating_sub(2 * panel.margin + outline_y);

        if width == 0 || height == 0 {
            warn!(margin = panel.margin, "Panel does not fit on the canvas, skipping it");
        } else {
            let offset = isize::try_from(panel.margin).context("panel margin")?;
            let mut layer = ImageLayer::solid(panel.color)
                .with_position(offset, offset)
                .with_clip(0, 0, width, height)
                .with_blend(panel.blend);
            if let Some(bevel) = panel.bevel {
                layer = layer.with_bevel(bevel);
            }
            layers.push(layer);
        }
    }

    debug!(layers = layers.len(), width = config.width, height = config.height, "Compositing");

    let image = merge_layers(
        &ctx,
        &layers,
        config.width,
        config.height,
        OutputFormat::Argb32,
        None,
        None,
    )
    .context("layer composition")?;

    Ok(image)
}

/// Writes the ARGB32 buffer of `image` as an 8-bit RGBA PNG.
pub fn write_png(path: &Path, image: &AsImage) -> anyhow::Result<()> {
    let pixels = image.argb32().context("image has no ARGB32 buffer")?;
    if pixels.len() != image.width() * image.height() {
        anyhow::bail!("ARGB32 buffer holds {} pixels, expected {}", pixels.len(), image.width() * image.height());
    }

    let width = u32::try_from(image.width()).context("image width")?;
    let height = u32::try_from(image.height()).context("image height")?;

    let data: Vec<u8> = pixels
        .iter()
        .flat_map(|pixel| [pixel.red(), pixel.green(), pixel.blue(), pixel.alpha()])
        .collect();

    let file = File::create(path).with_context(|| format!("couldn't create {}", path.display()))?;

    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder.write_header().context("PNG header")?;
    writer.write_image_data(&data).context("PNG image data")?;
    writer.finish().context("PNG trailer")?;

    info!(path = %path.display(), width, height, "Wrote image");

    Ok(())
}
