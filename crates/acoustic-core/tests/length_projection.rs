//! Property tests for sequence-length projection.

use acoustic_core::length::{ConvGeometry, OutputLength, PaddingMode, project};
use proptest::prelude::*;

fn border_mode() -> impl Strategy<Value = PaddingMode> {
    prop_oneof![Just(PaddingMode::Same), Just(PaddingMode::Valid)]
}

proptest! {
    #[test]
    fn unknown_length_stays_unknown(
        filter in 1usize..32,
        mode in border_mode(),
        stride in 1usize..8,
        dilation in 1usize..8,
    ) {
        prop_assert_eq!(project(None, filter, mode, stride, dilation).unwrap(), None);
    }

    #[test]
    fn same_is_ceil_division(length in 1i64..10_000, filter in 1usize..64, stride in 1usize..16) {
        let stride_i = stride as i64;
        let expected = (length + stride_i - 1) / stride_i;
        prop_assert_eq!(
            project(Some(length), filter, PaddingMode::Same, stride, 1).unwrap(),
            Some(expected)
        );
    }

    #[test]
    fn same_stride_one_is_identity(length in 0i64..10_000, filter in 1usize..64) {
        prop_assert_eq!(
            project(Some(length), filter, PaddingMode::Same, 1, 1).unwrap(),
            Some(length)
        );
    }

    #[test]
    fn projection_is_monotonic(
        a in 0i64..5_000,
        b in 0i64..5_000,
        filter in 1usize..32,
        mode in border_mode(),
        stride in 1usize..8,
        dilation in 1usize..8,
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let lo_out = project(Some(lo), filter, mode, stride, dilation).unwrap().unwrap();
        let hi_out = project(Some(hi), filter, mode, stride, dilation).unwrap().unwrap();
        prop_assert!(lo_out <= hi_out);
    }

    #[test]
    fn composition_matches_nested_calls(
        length in 0i64..5_000,
        f1 in 1usize..16,
        s1 in 1usize..4,
        f2 in 1usize..16,
        s2 in 1usize..4,
    ) {
        let nested = project(
            project(Some(length), f1, PaddingMode::Same, s1, 1).unwrap(),
            f2,
            PaddingMode::Valid,
            s2,
            1,
        )
        .unwrap();

        let mapping = OutputLength::identity()
            .then(ConvGeometry::new(f1, PaddingMode::Same, s1))
            .then(ConvGeometry::new(f2, PaddingMode::Valid, s2));

        prop_assert_eq!(mapping.apply(Some(length)).unwrap(), nested);
    }
}

#[test]
fn documented_values() {
    assert_eq!(project(Some(10), 3, PaddingMode::Valid, 1, 1).unwrap(), Some(8));
    assert_eq!(project(Some(10), 3, PaddingMode::Valid, 2, 1).unwrap(), Some(4));
    assert_eq!(project(Some(10), 3, PaddingMode::Valid, 1, 2).unwrap(), Some(6));
}

#[test]
fn causal_passed_directly_is_rejected() {
    let err = project(Some(10), 3, PaddingMode::Causal, 1, 1).unwrap_err();
    assert!(err.to_string().contains("causal"));
}
