use asimage::bevel::Bevel;
use asimage::convert::{cache_native, image_to_native};
use asimage::decoder::DecoderSource;
use asimage::gradient::{Gradient, GradientKind, GradientSource};
use asimage::native::{PixelFormat, SoftwareVisual};
use asimage::rle::ScratchBuffer;
use asimage::{
    Argb32, AsImage, Channel, ChannelFlags, Config, Context, ImageDecoder, ImageOutput, OutputFormat, Quality,
};
use asimage_testsuite_core::{channel_row, row_pixels, solid_image};
use rstest::rstest;

fn checkerboard(size: usize) -> AsImage {
    let mut image = AsImage::new(size, size, 100).unwrap();
    let mut scratch = ScratchBuffer::new();
    for y in 0..size {
        let row: Vec<u32> = (0..size).map(|x| if (x + y) % 2 == 0 { 0xFF } else { 0x00 }).collect();
        for channel in Channel::ALL {
            image.add_line(channel, &row, y, &mut scratch);
        }
    }
    image
}

#[rstest]
#[case::origin(0, 0, [0xFF, 0x00, 0xFF, 0x00, 0xFF])]
#[case::shifted(1, 0, [0x00, 0xFF, 0x00, 0xFF, 0x00])]
#[case::negative(-1, 0, [0x00, 0xFF, 0x00, 0xFF, 0x00])]
#[case::next_row(0, 3, [0x00, 0xFF, 0x00, 0xFF, 0x00])]
fn offsets_tile_the_source(#[case] x: isize, #[case] y: isize, #[case] expected: [u32; 5]) {
    let ctx = Context::default();
    let image = checkerboard(4);
    let mut decoder = ImageDecoder::new(&ctx, &image, ChannelFlags::GREEN, x, y, 5, 5, None).unwrap();

    let line = decoder.decode_next().unwrap();
    assert_eq!(line.channel(Channel::Green), expected);
}

#[test]
fn decoding_and_encoding_again_preserves_rows() {
    let ctx = Context::default();
    let source = checkerboard(6);
    let mut copy = AsImage::new(6, 6, 100).unwrap();

    {
        let mut decoder = ImageDecoder::new(&ctx, &source, ChannelFlags::ALL, 0, 0, 0, 0, None).unwrap();
        let mut output = ImageOutput::new(&ctx, &mut copy, OutputFormat::AsImage, 0, Quality::Good).unwrap();
        while let Some(line) = decoder.decode_next() {
            output.output(line, 1);
        }
        output.finish();
    }

    for y in 0..6 {
        for channel in Channel::ALL {
            assert_eq!(copy.row(channel, y), source.row(channel, y), "channel {channel:?} row {y}");
        }
    }
}

#[test]
fn gradient_sources_decode_like_images() {
    let ctx = Context::default();
    let gradient = Gradient::two_color(GradientKind::TopToBottom, Argb32::BLACK, Argb32::WHITE);
    let source = GradientSource::new(gradient, 2, 3);

    let mut decoder = ImageDecoder::new(
        &ctx,
        DecoderSource::Custom(Box::new(source)),
        ChannelFlags::ALL,
        0,
        0,
        4,
        0,
        None,
    )
    .unwrap();

    let mut blue = Vec::new();
    while let Some(line) = decoder.decode_next() {
        blue.push(line.channel(Channel::Blue)[3]);
    }
    assert_eq!(blue, [0, 127, 255]);
}

#[test]
fn native_cache_round_trip() {
    let ctx = Context::new(Box::new(SoftwareVisual::new(PixelFormat::ARgb32)), Config::default());
    let mut image = solid_image(3, 2, Argb32(0xC012_3456));
    let buffer = image_to_native(&ctx, &mut image).unwrap().clone();

    let mut cached = AsImage::new(3, 2, 100).unwrap();
    cache_native(&mut cached, buffer, None).unwrap();

    assert!(cached.channel_mask().is_empty());
    assert_eq!(row_pixels(&cached, 1), [cached.back_color(); 3]);

    let mut decoder = ImageDecoder::new(&ctx, &cached, ChannelFlags::ALL, 0, 0, 0, 0, None).unwrap();
    let line = decoder.decode_next().unwrap();
    assert_eq!(line.pixel(2), Argb32(0xC012_3456));
}

#[test]
fn beveled_solid_frame() {
    let ctx = Context::default();
    let bevel = Bevel::uniform(Argb32(0xFFEE_EEEE), Argb32(0xFF22_2222), 2, 0);
    let mut decoder = ImageDecoder::new(
        &ctx,
        DecoderSource::None,
        ChannelFlags::ALL,
        0,
        0,
        3,
        3,
        Some(&bevel),
    )
    .unwrap();
    decoder.set_back_color(Argb32(0xFF80_8080));

    assert_eq!(decoder.line_width(), 7);
    assert_eq!(decoder.line_count(), 7);

    let mut rows = Vec::new();
    while let Some(line) = decoder.decode_next() {
        rows.push(line.pixel(3));
    }
    assert_eq!(rows.len(), 7);
    assert_eq!(rows[0], Argb32(0xFFEE_EEEE));
    assert_eq!(rows[3], Argb32(0xFF80_8080));
    assert_eq!(rows[6], Argb32(0xFF22_2222));

    let image = solid_image(2, 1, Argb32::WHITE);
    assert_eq!(channel_row(&image, Channel::Red, 0), [0xFF, 0xFF]);
}
