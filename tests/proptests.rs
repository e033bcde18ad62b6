//! Property tests: decoding always returns exactly what was encoded

use densebit::*;
use proptest::prelude::*;

prop_compose! {
    /// A maximum value and a set of variable-length sequences within it
    fn arb_delimited()(
        max_value in 1u64..u64::MAX,
        contains_zero in any::<bool>(),
        count in 0usize..20,
    )(
        max_value in Just(max_value),
        contains_zero in Just(contains_zero),
        sequences in prop::collection::vec(
            prop::collection::vec(
                if contains_zero { 0..=max_value } else { 1..=max_value },
                0..30,
            ),
            count,
        ),
    ) -> (u64, bool, Vec<Vec<u64>>) {
        (max_value, contains_zero, sequences)
    }
}

prop_compose! {
    /// A maximum value, a sequence length and fixed-length sequences
    fn arb_fixed()(
        max_value in 0u64..u64::MAX,
        sequence_length in 1u32..16,
        count in 0usize..20,
    )(
        max_value in Just(max_value),
        sequence_length in Just(sequence_length),
        sequences in prop::collection::vec(
            prop::collection::vec(0..=max_value, sequence_length as usize),
            count,
        ),
        contains_zero in any::<bool>(),
    ) -> (u64, u32, bool, Vec<Vec<u64>>) {
        (max_value, sequence_length, contains_zero, sequences)
    }
}

proptest! {
    /// Property: delimiter-mode batches survive a round trip
    #[test]
    fn prop_delimited_batch_roundtrip((max_value, contains_zero, sequences) in arb_delimited()) {
        let mut encoder = BatchEncoder::new(max_value, 0, contains_zero).unwrap();
        for sequence in &sequences {
            encoder.encode_sequence(sequence).unwrap();
        }
        prop_assert_eq!(encoder.overflow_warnings(), 0);
        let bytes = encoder.finish().unwrap();

        let mut decoder = BatchDecoder::new(&bytes[..], contains_zero).unwrap();
        prop_assert_eq!(decoder.header().sequence_count as usize, sequences.len());
        prop_assert_eq!(decoder.decode_all().unwrap(), sequences);
    }

    /// Property: fixed-length batches survive a round trip
    #[test]
    fn prop_fixed_batch_roundtrip((max_value, sequence_length, contains_zero, sequences) in arb_fixed()) {
        let mut encoder = BatchEncoder::new(max_value, sequence_length, contains_zero).unwrap();
        for sequence in &sequences {
            encoder.encode_sequence(sequence).unwrap();
        }
        let bytes = encoder.finish().unwrap();

        let bits = bytes[0] as usize;
        let payload_bits = sequences.len() * sequence_length as usize * bits;
        prop_assert_eq!(bytes.len(), BATCH_HEADER_SIZE + payload_bits.div_ceil(8));

        let mut decoder = BatchDecoder::new(&bytes[..], contains_zero).unwrap();
        prop_assert_eq!(decoder.decode_all().unwrap(), sequences);
    }

    /// Property: streams survive a round trip and drop their end marker only
    /// when truncated
    #[test]
    fn prop_stream_roundtrip((max_value, contains_zero, sequences) in arb_delimited()) {
        let values: Vec<u64> = sequences.into_iter().flatten().collect();
        let mut out = Vec::new();
        {
            let mut encoder = StreamEncoder::new(&mut out, max_value, contains_zero).unwrap();
            encoder.extend(values.iter().copied()).unwrap();
            encoder.finish().unwrap();
        }

        let decoded = StreamDecoder::new(&out[..], contains_zero)
            .unwrap()
            .decode_to_vec()
            .unwrap();
        prop_assert_eq!(&decoded, &values);

        let bits = out[0] as usize;
        let end_marker_bytes = bits.div_ceil(8);
        if out.len() > 1 + end_marker_bytes {
            let truncated = &out[..out.len() - end_marker_bytes];
            let result = StreamDecoder::new(truncated, contains_zero)
                .unwrap()
                .decode(|_| {});
            prop_assert!(matches!(result, Err(Error::MissingEndMarker)));
        }
    }

    /// Property: the element width is the bit length of the effective maximum
    #[test]
    fn prop_width_matches_bit_length(max_value in 1u64..u64::MAX) {
        let expected = 64 - max_value.leading_zeros() as u8;
        prop_assert_eq!(bit_length(max_value), expected);
        prop_assert!(max_value >> (expected - 1) == 1);
    }
}
