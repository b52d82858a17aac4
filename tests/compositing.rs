use pixmix::{CompositeContext, CompositeOperation, CompositeRegistry, PixelFormat, PixmixError};

fn registry() -> CompositeRegistry {
    CompositeRegistry::with_best_available()
}

#[test]
fn multiply_rgba_over_scenario() {
    // B=(0,255,0,128) multiplied with A=(255,0,0,255) and composited over
    // it: the red channel lands on 127, alpha saturates to 255.
    let registry = registry();
    let a = [255u8, 0, 0, 255];
    let b = [0u8, 255, 0, 128];
    let mut d = [0u8; 4];
    let mut ctx = CompositeContext::contiguous(
        PixelFormat::Rgba8,
        PixelFormat::Rgba8,
        PixelFormat::Rgba8,
        1,
        &a,
        &b,
        &mut d,
    );
    registry.composite(CompositeOperation::Multiply, &mut ctx).unwrap();
    assert_eq!(d, [127, 0, 0, 255]);
}

#[test]
fn multiply_opaque_rgb_is_plain_channel_math() {
    let registry = registry();
    let a = [255u8, 128, 0];
    let b = [255u8, 255, 255];
    let mut d = [0u8; 3];
    let mut ctx = CompositeContext::contiguous(
        PixelFormat::Rgb8,
        PixelFormat::Rgb8,
        PixelFormat::Rgb8,
        1,
        &a,
        &b,
        &mut d,
    );
    registry.composite(CompositeOperation::Multiply, &mut ctx).unwrap();
    assert_eq!(d, [255, 128, 0]);
}

#[test]
fn transparent_b_leaves_a_visible() {
    let registry = registry();
    let a = [200u8, 100, 50, 255];
    let b = [255u8, 255, 255, 0];
    let mut d = [0u8; 4];
    let mut ctx = CompositeContext::contiguous(
        PixelFormat::Rgba8,
        PixelFormat::Rgba8,
        PixelFormat::Rgba8,
        1,
        &a,
        &b,
        &mut d,
    );
    registry.composite(CompositeOperation::Addition, &mut ctx).unwrap();
    assert_eq!(d, [200, 100, 50, 255]);
}

#[test]
fn addition_saturates_and_subtract_floors() {
    let registry = registry();
    let a = [200u8, 10];
    let b = [100u8, 50];
    let mut d = [0u8; 2];
    let mut ctx = CompositeContext::contiguous(
        PixelFormat::V8,
        PixelFormat::V8,
        PixelFormat::V8,
        2,
        &a,
        &b,
        &mut d,
    );
    registry.composite(CompositeOperation::Addition, &mut ctx).unwrap();
    assert_eq!(d, [255, 60]);

    let mut ctx = CompositeContext::contiguous(
        PixelFormat::V8,
        PixelFormat::V8,
        PixelFormat::V8,
        2,
        &a,
        &b,
        &mut d,
    );
    registry.composite(CompositeOperation::Subtract, &mut ctx).unwrap();
    assert_eq!(d, [100, 0]);
}

#[test]
fn darken_lighten_difference_pick_expected_channels() {
    let registry = registry();
    let a = [200u8, 10, 128];
    let b = [100u8, 50, 128];
    let mut d = [0u8; 3];
    for (op, expected) in [
        (CompositeOperation::Darken, [100u8, 10, 128]),
        (CompositeOperation::Lighten, [200, 50, 128]),
        (CompositeOperation::Difference, [100, 40, 0]),
    ] {
        let mut ctx = CompositeContext::contiguous(
            PixelFormat::V8,
            PixelFormat::V8,
            PixelFormat::V8,
            3,
            &a,
            &b,
            &mut d,
        );
        registry.composite(op, &mut ctx).unwrap();
        assert_eq!(d, expected, "{op}");
    }
}

#[test]
fn dodge_burn_divide_reference_values() {
    let registry = registry();
    let a = [64u8, 200, 128];
    let b = [128u8, 100, 128];
    let mut d = [0u8; 3];
    for (op, expected) in [
        // 64*256/(256-128) = 128; 200*256/(256-100) = 328 -> 255; 128*256/128 = 256 -> 255
        (CompositeOperation::Dodge, [128u8, 255, 255]),
        // 255 - (255-64)*256/129 = 255 - 379 -> 0; 255 - 55*256/101 = 255-139 = 116; 255 - 127*256/129 = 255-252 = 3
        (CompositeOperation::Burn, [0, 116, 3]),
        // 64*256/129 = 127; 200*256/101 = 506 -> 255; 128*256/129 = 254
        (CompositeOperation::Divide, [127, 255, 254]),
    ] {
        let mut ctx = CompositeContext::contiguous(
            PixelFormat::V8,
            PixelFormat::V8,
            PixelFormat::V8,
            3,
            &a,
            &b,
            &mut d,
        );
        registry.composite(op, &mut ctx).unwrap();
        assert_eq!(d, expected, "{op}");
    }
}

#[test]
fn grain_ops_center_on_128() {
    let registry = registry();
    let a = [77u8, 255, 0];
    let b = [77u8, 255, 0];
    let mut d = [0u8; 3];
    let mut ctx = CompositeContext::contiguous(
        PixelFormat::V8,
        PixelFormat::V8,
        PixelFormat::V8,
        3,
        &a,
        &b,
        &mut d,
    );
    registry
        .composite(CompositeOperation::GrainExtract, &mut ctx)
        .unwrap();
    assert_eq!(d, [128, 128, 128]);

    let extracted = d;
    let mut ctx = CompositeContext::contiguous(
        PixelFormat::V8,
        PixelFormat::V8,
        PixelFormat::V8,
        3,
        &a,
        &extracted,
        &mut d,
    );
    registry
        .composite(CompositeOperation::GrainMerge, &mut ctx)
        .unwrap();
    assert_eq!(d, a);
}

#[test]
fn swap_passes_b_through_with_conversion() {
    let registry = registry();
    let a = [9u8];
    let b = [77u8];
    let mut d = [0u8; 4];
    let mut ctx = CompositeContext::contiguous(
        PixelFormat::V8,
        PixelFormat::V8,
        PixelFormat::Rgba8,
        1,
        &a,
        &b,
        &mut d,
    );
    registry.composite(CompositeOperation::Swap, &mut ctx).unwrap();
    assert_eq!(d, [77, 77, 77, 255]);
}

#[test]
fn swap_with_mismatched_pixel_counts_is_invalid() {
    let registry = registry();
    let a = [1u8];
    let b = [2u8, 3];
    let mut d = [0u8; 2];
    let mut ctx = CompositeContext::contiguous(
        PixelFormat::V8,
        PixelFormat::V8,
        PixelFormat::V8,
        2,
        &a,
        &b,
        &mut d,
    );
    let err = registry
        .composite(CompositeOperation::Swap, &mut ctx)
        .unwrap_err();
    assert!(matches!(err, PixmixError::InvalidArgument(_)));
}

#[test]
fn scale_halves_every_channel() {
    let registry = registry();
    let a = [200u8, 100, 50, 255];
    let mut d = [0u8; 4];
    let mut ctx = CompositeContext::contiguous(
        PixelFormat::Rgba8,
        PixelFormat::Rgba8,
        PixelFormat::Rgba8,
        1,
        &a,
        &[],
        &mut d,
    )
    .with_scale(0.5);
    registry.composite(CompositeOperation::Scale, &mut ctx).unwrap();
    assert_eq!(d, [100, 50, 25, 128]);
}

#[test]
fn gray_sources_expand_into_color_destinations() {
    let registry = registry();
    let a = [100u8];
    let b = [200u8];
    let mut d = [0u8; 4];
    let mut ctx = CompositeContext::contiguous(
        PixelFormat::V8,
        PixelFormat::V8,
        PixelFormat::Rgba8,
        1,
        &a,
        &b,
        &mut d,
    );
    registry.composite(CompositeOperation::Lighten, &mut ctx).unwrap();
    assert_eq!(d, [200, 200, 200, 255]);
}

#[test]
fn zero_pixel_call_is_a_noop() {
    let registry = registry();
    let mut d: [u8; 0] = [];
    let mut ctx = CompositeContext::contiguous(
        PixelFormat::Rgba8,
        PixelFormat::Rgba8,
        PixelFormat::Rgba8,
        0,
        &[],
        &[],
        &mut d,
    );
    registry.composite(CompositeOperation::Multiply, &mut ctx).unwrap();
}

#[test]
fn mask_endpoints_match_noop_and_unmasked() {
    let registry = registry();
    let a = [11u8, 22, 33, 200];
    let b = [200u8, 150, 100, 255];
    let initial = [1u8, 2, 3, 4];

    let mut unmasked = initial;
    let mut ctx = CompositeContext::contiguous(
        PixelFormat::Rgba8,
        PixelFormat::Rgba8,
        PixelFormat::Rgba8,
        1,
        &a,
        &b,
        &mut unmasked,
    );
    registry.composite(CompositeOperation::Screen, &mut ctx).unwrap();

    let mut zero_masked = initial;
    let mask = [0u8];
    let mut ctx = CompositeContext::contiguous(
        PixelFormat::Rgba8,
        PixelFormat::Rgba8,
        PixelFormat::Rgba8,
        1,
        &a,
        &b,
        &mut zero_masked,
    )
    .with_mask(&mask);
    registry.composite(CompositeOperation::Screen, &mut ctx).unwrap();
    assert_eq!(zero_masked, initial);

    let mut full_masked = initial;
    let mask = [255u8];
    let mut ctx = CompositeContext::contiguous(
        PixelFormat::Rgba8,
        PixelFormat::Rgba8,
        PixelFormat::Rgba8,
        1,
        &a,
        &b,
        &mut full_masked,
    )
    .with_mask(&mask);
    registry.composite(CompositeOperation::Screen, &mut ctx).unwrap();
    assert_eq!(full_masked, unmasked);
}

#[test]
fn half_mask_blends_with_original_destination() {
    // Swap writes B straight through, so the masked result is the plain
    // lerp between the original destination and B.
    let registry = registry();
    let a = [0u8, 0, 0];
    let b = [200u8, 100, 50];
    let mut d = [0u8, 0, 0];
    let mask = [128u8];
    let mut ctx = CompositeContext::contiguous(
        PixelFormat::Rgb8,
        PixelFormat::Rgb8,
        PixelFormat::Rgb8,
        1,
        &a,
        &b,
        &mut d,
    )
    .with_mask(&mask);
    registry.composite(CompositeOperation::Swap, &mut ctx).unwrap();
    assert_eq!(d, [100, 50, 25]);
}

#[test]
fn composite_is_idempotent() {
    let registry = registry();
    let a: Vec<u8> = (0..256).map(|i| (i * 31 + 7) as u8).collect();
    let b: Vec<u8> = (0..256).map(|i| (i * 97 + 3) as u8).collect();

    for op in CompositeOperation::ALL {
        let mut first = vec![0u8; 256];
        let mut ctx = CompositeContext::contiguous(
            PixelFormat::Rgba8,
            PixelFormat::Rgba8,
            PixelFormat::Rgba8,
            64,
            &a,
            &b,
            &mut first,
        );
        registry.composite(op, &mut ctx).unwrap();

        let mut second = vec![0u8; 256];
        let mut ctx = CompositeContext::contiguous(
            PixelFormat::Rgba8,
            PixelFormat::Rgba8,
            PixelFormat::Rgba8,
            64,
            &a,
            &b,
            &mut second,
        );
        registry.composite(op, &mut ctx).unwrap();
        assert_eq!(first, second, "{op}");
    }
}

#[test]
fn strided_rows_leave_the_gap_bytes_alone() {
    let registry = registry();
    // 2 rows of 4 v8 pixels with an 8-byte destination stride: the last 4
    // bytes of each destination row must stay untouched.
    let a = [10u8, 20, 30, 40, 50, 60, 70, 80];
    let b = [1u8, 2, 3, 4, 5, 6, 7, 8];
    let mut d = [0xEEu8; 12];
    let mut ctx = CompositeContext::new(
        PixelFormat::V8,
        PixelFormat::V8,
        PixelFormat::V8,
        4,
        2,
        &a,
        &b,
        &mut d,
    )
    .with_strides(4, 4, 8);
    registry.composite(CompositeOperation::Addition, &mut ctx).unwrap();
    assert_eq!(d[..4], [11, 22, 33, 44]);
    assert_eq!(d[4..8], [0xEE; 4]);
    assert_eq!(d[8..12], [55, 66, 77, 88]);
}

#[test]
fn concurrent_composites_on_disjoint_destinations() {
    let registry = registry();
    let a = vec![123u8; 3072];
    let b = vec![45u8; 3072];

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let mut d = vec![0u8; 3072];
                let mut ctx = CompositeContext::contiguous(
                    PixelFormat::Rgb8,
                    PixelFormat::Rgb8,
                    PixelFormat::Rgb8,
                    1024,
                    &a,
                    &b,
                    &mut d,
                );
                registry.composite(CompositeOperation::Multiply, &mut ctx).unwrap();
                assert_eq!(d[0], 22); // mul_div255(123, 45)
            });
        }
    });
}
