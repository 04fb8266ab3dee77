use asimage::quantize;
use asimage::{AsImage, Channel, ChannelFlags, Context, ImageOutput, OutputFormat, Quality, Scanline};
use asimage_testsuite_core::channel_row;
use proptest::prelude::*;

fn samples() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..=0xFF00, 1..200)
}

fn image_rows() -> impl Strategy<Value = (usize, Vec<Vec<u32>>)> {
    (1usize..24, 1usize..8).prop_flat_map(|(width, height)| {
        (
            Just(width),
            prop::collection::vec(prop::collection::vec(0u32..=0xFF00, width), height),
        )
    })
}

proptest! {
    #[test]
    fn fast_truncation_loses_less_than_a_step_per_sample(src in samples()) {
        let mut dst = vec![0; src.len()];
        quantize::fast(&src, &mut dst, 1);

        let sum_in: u64 = src.iter().map(|v| u64::from(*v)).sum();
        let sum_out: u64 = dst.iter().map(|v| u64::from(*v)).sum();
        let lost = sum_in - 256 * sum_out;
        prop_assert!(lost <= 255 * src.len() as u64);
    }

    #[test]
    fn fine_diffusion_bounds_the_total_error(src in samples()) {
        let mut dst = vec![0; src.len()];
        quantize::fine(&src, &mut dst, 1);

        let sum_in: u64 = src.iter().map(|v| u64::from(*v)).sum();
        let sum_out: u64 = dst.iter().map(|v| u64::from(*v)).sum();
        prop_assert!(256 * sum_out <= sum_in);
        prop_assert!(sum_in - 256 * sum_out <= 128 * src.len() as u64 + 255);
        prop_assert!(dst.iter().all(|v| *v <= 0xFF));
    }

    #[test]
    fn diffusion_keeps_the_error_within_the_two_rows(
        (mut current, mut below) in (1usize..200).prop_flat_map(|len| {
            (
                prop::collection::vec(0u32..=0xFF00, len),
                prop::collection::vec(0u32..=0xFF00, len),
            )
        })
    ) {
        let sum_in: i64 = current.iter().map(|v| i64::from(*v)).sum();
        let below_before: i64 = below.iter().map(|v| i64::from(*v)).sum();

        quantize::diffuse(&mut current, &mut below);

        let sum_out: i64 = current.iter().map(|v| i64::from(*v)).sum();
        let spread = below.iter().map(|v| i64::from(*v)).sum::<i64>() - below_before;
        let lost = sum_in - 256 * sum_out - spread;

        prop_assert!(current.iter().all(|v| *v <= 0xFF));
        prop_assert!(spread >= 0);
        // Every sample loses its truncated sixteenths, the edge columns up to a whole step.
        prop_assert!((0..=4 * current.len() as i64 + 2 * 255).contains(&lost), "lost {}", lost);
    }

    #[test]
    fn top_quality_bounds_the_total_error((width, rows) in image_rows()) {
        let ctx = Context::default();
        let mut image = AsImage::new(width, rows.len(), 100).unwrap();

        let mut line = Scanline::new(width);
        line.set_shift(8);
        line.set_flags(ChannelFlags::RED | ChannelFlags::GREEN);

        let mut output = ImageOutput::new(&ctx, &mut image, OutputFormat::AsImage, 8, Quality::Top).unwrap();
        for row in &rows {
            line.channel_mut(Channel::Red).copy_from_slice(row);
            for (sample, value) in line.channel_mut(Channel::Green).iter_mut().zip(row.iter().rev()) {
                *sample = *value;
            }
            output.output(&line, 1);
        }
        output.finish();

        let n = (width * rows.len()) as i64;
        let edges = (width + 2 * rows.len()) as i64;
        for channel in [Channel::Red, Channel::Green] {
            let sum_in: i64 = rows.iter().flatten().map(|v| i64::from(*v)).sum();
            let sum_out: i64 = (0..rows.len())
                .flat_map(|y| channel_row(&image, channel, y))
                .map(i64::from)
                .sum();

            let lost = sum_in - 256 * sum_out;
            prop_assert!(lost >= 0, "{:?} gained {}", channel, -lost);
            prop_assert!(lost <= 4 * n + 255 * edges, "{:?} lost {}", channel, lost);
        }
    }

    #[test]
    fn ratio_divides_first(src in samples()) {
        let doubled: Vec<u32> = src.iter().map(|v| v * 2).collect();
        let mut direct = vec![0; src.len()];
        let mut halved = vec![0; src.len()];

        quantize::fast(&src, &mut direct, 1);
        quantize::fast(&doubled, &mut halved, 2);
        prop_assert_eq!(direct, halved);
    }
}

#[test]
fn top_quality_spreads_error_over_rows() {
    const SIZE: usize = 16;
    let ctx = Context::default();
    let mut image = AsImage::new(SIZE, SIZE, 100).unwrap();

    let mut line = Scanline::new(SIZE);
    line.set_shift(8);
    line.set_flags(ChannelFlags::COLOR);
    for channel in [Channel::Red, Channel::Green, Channel::Blue] {
        line.fill(channel, 0x4040, 0, SIZE);
    }

    let mut output = ImageOutput::new(&ctx, &mut image, OutputFormat::AsImage, 8, Quality::Top).unwrap();
    for _ in 0..SIZE {
        output.output(&line, 1);
    }
    output.finish();

    let values: Vec<u32> = (0..SIZE).flat_map(|y| channel_row(&image, Channel::Green, y)).collect();
    assert_eq!(values.len(), SIZE * SIZE);
    assert!(values.iter().all(|v| (64..=65).contains(v)), "{values:?}");
    assert!(values.contains(&65));
}
