use asimage::rle::{self, Block, ScratchBuffer, DIRECT_TAIL, EOL};
use expect_test::expect;
use proptest::prelude::*;
use rstest::rstest;

fn encoded(row: &[u32]) -> Vec<u8> {
    let mut out = Vec::new();
    rle::encode(row, row.len(), &mut out);
    out
}

#[rstest]
#[case::short_run(&[200; 10], &[0x09, 200, EOL])]
#[case::single_sample(&[42], &[DIRECT_TAIL, 42])]
#[case::alternating(
    &[0, 255, 0, 255, 0, 255, 0, 255, 0, 255],
    &[DIRECT_TAIL, 0, 255, 0, 255, 0, 255, 0, 255, 0, 255],
)]
#[case::run_then_literals(&[7, 7, 7, 7, 1, 2], &[0x03, 7, DIRECT_TAIL, 1, 2])]
#[case::leading_pair(&[9, 9], &[0x01, 9, EOL])]
#[case::pair_among_literals(&[7, 7, 7, 2, 2, 5], &[0x02, 7, DIRECT_TAIL, 2, 2, 5])]
fn encoding_scenarios(#[case] row: &[u32], #[case] expected: &[u8]) {
    assert_eq!(encoded(row), expected);
}

#[test]
fn long_runs() {
    let row = vec![0x33; 1000];
    let stream = encoded(&row);

    expect![[r#"
        [
            LongRun(1000 x 0x33),
        ]
    "#]]
    .assert_debug_eq(&rle::blocks(&stream, row.len()).collect::<Vec<Block<'_>>>());
    assert_eq!(rle::stream_len(&stream, row.len()), Some(stream.len()));
}

#[test]
fn mixed_row_blocks() {
    let row = [5, 5, 5, 9, 8, 7, 6, 6, 6, 6, 6, 1, 2, 3];
    let stream = encoded(&row);

    expect![[r#"
        [
            Run(3 x 0x05),
            Direct([09, 08, 07]),
            Run(5 x 0x06),
            Tail([01, 02, 03]),
        ]
    "#]]
    .assert_debug_eq(&rle::blocks(&stream, row.len()).collect::<Vec<Block<'_>>>());
}

#[test]
fn tiled_decoding_wraps_around() {
    let stream = encoded(&[1, 2, 3, 4]);
    let mut dst = [0u32; 7];

    let written = rle::decode_tiled(&stream, 4, &mut dst, 6, 7, &mut ScratchBuffer::new()).unwrap();
    assert_eq!(written, 7);
    assert_eq!(dst, [3, 4, 1, 2, 3, 4, 1]);
}

#[test]
fn threshold_spans() {
    let stream = encoded(&[0, 0, 0, 0x80, 0x90, 0x10, 0xFF, 0xFF, 0xFF]);
    assert_eq!(rle::threshold_runs(&stream, 9, 0x80), [(3, 4), (6, 8)]);
}

fn row_strategy() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(
        prop_oneof![Just(0u32), Just(0xFF), 0u32..=0xFF],
        1..300,
    )
}

proptest! {
    #[test]
    fn encoded_rows_decode_to_the_input(row in row_strategy()) {
        let stream = encoded(&row);
        let mut decoded = vec![0u32; row.len()];

        prop_assert_eq!(rle::decode(&stream, row.len(), &mut decoded), row.len());
        prop_assert_eq!(&decoded, &row);
        prop_assert_eq!(rle::stream_len(&stream, row.len()), Some(stream.len()));
    }

    #[test]
    fn re_encoding_is_stable(row in row_strategy()) {
        let stream = encoded(&row);
        let mut decoded = vec![0u32; row.len()];
        rle::decode(&stream, row.len(), &mut decoded);

        prop_assert_eq!(encoded(&decoded), stream);
    }

    #[test]
    fn tiling_matches_modular_indexing(row in row_strategy(), skip in 0usize..1000, out_width in 1usize..700) {
        let stream = encoded(&row);
        let mut dst = vec![0u32; out_width];

        let written = rle::decode_tiled(&stream, row.len(), &mut dst, skip, out_width, &mut ScratchBuffer::new()).unwrap();
        prop_assert_eq!(written, out_width);
        for (i, sample) in dst.iter().enumerate() {
            prop_assert_eq!(*sample, row[(skip + i) % row.len()]);
        }
    }

    #[test]
    fn mono_rows(value: u8, width in 1usize..40_000) {
        let mut stream = Vec::new();
        rle::encode_mono(value, width, &mut stream);

        let mut decoded = vec![0u8; width];
        prop_assert_eq!(rle::decode(&stream, width, &mut decoded), width);
        prop_assert!(decoded.iter().all(|sample| *sample == value));
        prop_assert_eq!(rle::stream_len(&stream, width), Some(stream.len()));
    }

    #[test]
    fn partial_scans_still_decode_to_the_input((row, max_width) in partially_scanned_row()) {
        let mut stream = Vec::new();
        rle::encode(&row, max_width, &mut stream);

        let mut decoded = vec![0u32; row.len()];
        prop_assert_eq!(rle::decode(&stream, row.len(), &mut decoded), row.len());
        prop_assert_eq!(&decoded, &row);
        prop_assert_eq!(rle::stream_len(&stream, row.len()), Some(stream.len()));
    }
}

/// Rows drawn from a small alphabet so that runs and literal blocks alternate, paired with a scan
/// limit anywhere from nothing to past the end of the row.
fn partially_scanned_row() -> impl Strategy<Value = (Vec<u32>, usize)> {
    (1usize..=4, 1usize..300)
        .prop_flat_map(|(symbols, width)| {
            let alphabet: Vec<u32> = [0, 7, 200, 255].into_iter().take(symbols).collect();
            prop::collection::vec(prop::sample::select(alphabet), width)
        })
        .prop_flat_map(|row| {
            let width = row.len();
            (Just(row), 0..=width + 1)
        })
}
