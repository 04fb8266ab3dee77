use asimage::blend::BlendMode;
use asimage::bevel::Bevel;
use asimage::gradient::{Gradient, GradientKind};
use asimage::layer::LayerSource;
use asimage::text::TextRenderer as _;
use asimage::{merge_layers, Argb32, ChannelFlags, Context, ImageLayer, OutputFormat, Quality, Scanline};
use asimage_testsuite_core::{row_pixels, solid_image, BlockFont, BlockRenderer};
use rstest::rstest;

const BACKGROUND: Argb32 = Argb32(0xFF20_4060);
const MIDDLE: Argb32 = Argb32(0x80FF_8000);
const INK: Argb32 = Argb32(0xFFFF_FFFF);

fn over(bottom: Argb32, top: Argb32, mode: BlendMode) -> Argb32 {
    let pixel = |color: Argb32| {
        let mut line = Scanline::new(1);
        line.set_shift(8);
        line.set_flags(ChannelFlags::ALL);
        line.set_pixel(0, color);
        line
    };

    let mut line = pixel(bottom);
    mode.apply(&mut line, &pixel(top), 0, 0, 1);
    line.pixel(0)
}

#[test]
fn three_layer_composite() {
    let ctx = Context::default();
    let renderer = BlockRenderer { ctx: &ctx };
    let font = BlockFont {
        glyph_width: 2,
        glyph_height: 3,
        color: INK,
    };

    let text = renderer.render("a b", &font).unwrap();
    assert_eq!(renderer.measure("a b", &font), (8, 3));

    let layers = [
        ImageLayer::solid(BACKGROUND),
        ImageLayer::solid(MIDDLE).with_clip(0, 0, 10, 5),
        ImageLayer::image(&text).with_position(1, 1),
    ];
    let image = merge_layers(&ctx, &layers, 10, 5, OutputFormat::AsImage, None, Some(Quality::Fast)).unwrap();

    let blended = over(BACKGROUND, MIDDLE, BlendMode::AlphaBlend);
    assert_ne!(blended, BACKGROUND);
    assert_ne!(blended, MIDDLE);

    for y in 0..5 {
        let row = row_pixels(&image, y);
        for (x, pixel) in row.iter().enumerate() {
            let glyph_x = x.checked_sub(1).filter(|gx| *gx < 8);
            let inked = (1..4).contains(&y) && glyph_x.is_some_and(|gx| gx % 3 < 2 && gx / 3 != 1);
            let expected = if inked { INK } else { blended };
            assert_eq!(*pixel, expected, "pixel {x},{y}");
        }
    }
}

#[rstest]
#[case::alpha_blend(BlendMode::AlphaBlend)]
#[case::allanon(BlendMode::Allanon)]
#[case::add(BlendMode::Add)]
#[case::sub(BlendMode::Sub)]
#[case::diff(BlendMode::Diff)]
#[case::darken(BlendMode::Darken)]
#[case::lighten(BlendMode::Lighten)]
#[case::screen(BlendMode::Screen)]
fn transparent_top_leaves_bottom_untouched(#[case] mode: BlendMode) {
    let ctx = Context::default();
    let top = solid_image(2, 2, Argb32(0x0012_3456));

    let layers = [
        ImageLayer::solid(BACKGROUND),
        ImageLayer::image(&top).with_blend(mode),
    ];
    let image = merge_layers(&ctx, &layers, 2, 2, OutputFormat::AsImage, None, Some(Quality::Poor)).unwrap();

    assert_eq!(row_pixels(&image, 1), [BACKGROUND; 2]);
}

#[test]
fn opaque_top_replaces_bottom() {
    let ctx = Context::default();
    let top = solid_image(3, 1, Argb32(0xFF99_8877));

    let layers = [ImageLayer::solid(BACKGROUND), ImageLayer::image(&top).with_position(-1, 0)];
    let image = merge_layers(&ctx, &layers, 3, 1, OutputFormat::Argb32, None, Some(Quality::Good)).unwrap();

    assert_eq!(
        image.argb32().unwrap(),
        [Argb32(0xFF99_8877), Argb32(0xFF99_8877), BACKGROUND]
    );
}

#[test]
fn beveled_gradient_layer() {
    let ctx = Context::default();
    let gradient = Gradient::two_color(GradientKind::LeftToRight, Argb32::BLACK, Argb32::WHITE);
    let bevel = Bevel::uniform(Argb32(0xFFCC_CCCC), Argb32(0xFF33_3333), 1, 0);

    let layers = [
        ImageLayer::solid(BACKGROUND),
        ImageLayer {
            source: LayerSource::Gradient(gradient),
            clip_width: 4,
            clip_height: 2,
            ..ImageLayer::default()
        }
        .with_position(1, 1)
        .with_bevel(bevel),
    ];
    let image = merge_layers(&ctx, &layers, 8, 6, OutputFormat::AsImage, None, Some(Quality::Fast)).unwrap();

    assert_eq!(row_pixels(&image, 0), [BACKGROUND; 8]);
    assert_eq!(row_pixels(&image, 1)[2], Argb32(0xFFCC_CCCC));
    assert_eq!(row_pixels(&image, 2)[2], Argb32::BLACK);
    assert_eq!(row_pixels(&image, 3)[5], Argb32::WHITE);
    assert_eq!(row_pixels(&image, 4)[3], Argb32(0xFF33_3333));
    assert_eq!(row_pixels(&image, 5), [BACKGROUND; 8]);
}
