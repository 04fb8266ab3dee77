use asimage::gradient::{make_gradient, FlipFlags, Gradient, GradientKind, GradientStop};
use asimage::{Argb32, Channel, ChannelFlags, Context, OutputFormat, Quality};
use asimage_testsuite_core::channel_row;
use rstest::rstest;

#[rstest]
#[case::poor(Quality::Poor)]
#[case::fast(Quality::Fast)]
#[case::good(Quality::Good)]
#[case::top(Quality::Top)]
fn midpoint_row_is_mid_gray(#[case] quality: Quality) {
    let ctx = Context::default();
    let gradient = Gradient::two_color(GradientKind::TopToBottom, Argb32::BLACK, Argb32::WHITE);
    let image = make_gradient(
        &ctx,
        &gradient,
        8,
        3,
        ChannelFlags::ALL,
        OutputFormat::AsImage,
        None,
        Some(quality),
    )
    .unwrap();

    for channel in [Channel::Red, Channel::Green, Channel::Blue] {
        let row = channel_row(&image, channel, 1);
        assert_eq!(row.len(), 8);
        assert!(row.iter().all(|v| (127..=128).contains(v)), "{channel:?}: {row:?}");
        assert_eq!(channel_row(&image, channel, 0), [0; 8]);
        assert_eq!(channel_row(&image, channel, 2), [255; 8]);
    }
}

#[test]
fn argb_output_and_flip() {
    let ctx = Context::default();
    let gradient = Gradient::new(
        GradientKind::LeftToRight,
        vec![
            GradientStop::new(Argb32(0xFFFF_0000), 0.0),
            GradientStop::new(Argb32(0xFF00_00FF), 1.0),
        ],
    )
    .unwrap()
    .flip(FlipFlags::UPSIDE_DOWN);

    let image = make_gradient(
        &ctx,
        &gradient,
        3,
        1,
        ChannelFlags::ALL,
        OutputFormat::Argb32,
        None,
        Some(Quality::Fast),
    )
    .unwrap();

    let pixels = image.argb32().unwrap();
    assert_eq!(pixels[0], Argb32(0xFF00_00FF));
    assert_eq!(pixels[2], Argb32(0xFFFF_0000));
}

#[test]
fn diagonal_corners() {
    let gradient = Gradient::two_color(GradientKind::TopLeftToBottomRight, Argb32::BLACK, Argb32::WHITE);
    let ctx = Context::default();
    let image = make_gradient(
        &ctx,
        &gradient,
        4,
        4,
        ChannelFlags::RED,
        OutputFormat::AsImage,
        None,
        Some(Quality::Fast),
    )
    .unwrap();

    assert_eq!(channel_row(&image, Channel::Red, 0)[0], 0);
    assert_eq!(channel_row(&image, Channel::Red, 3)[3], 255);
    assert_eq!(channel_row(&image, Channel::Red, 3)[0], channel_row(&image, Channel::Red, 0)[3]);
    assert_eq!(image.channel_mask(), ChannelFlags::RED);
}
