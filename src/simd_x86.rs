//! x86-64 accelerated kernel sets: `sse2` (128-bit) and `avx2` (256-bit),
//! each gated at runtime by `is_x86_feature_detected!`. Nothing here is
//! conditionally compiled away within the architecture; the capability
//! probe alone decides whether a set is installed.
//!
//! Coverage is deliberately partial: the byte-wise operations on the opaque
//! same-format triples (v8 and rgb8), where the channel math is independent
//! of layout and the alpha policy degenerates to the plain channel result.
//! Everything else stays on the generic kernels. Masked calls fall back to
//! the generic kernel from inside the wrapper, so accelerated output can
//! never diverge under a mask.
//!
//! All division-by-255 uses the same biased shift-add formula as
//! `generic::channel::mul_div255`, which makes the accelerated output
//! bit-exact against the reference kernels.

use crate::context::CompositeContext;
use crate::format::PixelFormat;
use crate::generic;
use crate::op::CompositeOperation;
use crate::registry::{KernelEntry, KernelSet};

fn detect_sse2() -> bool {
    std::arch::is_x86_feature_detected!("sse2")
}

fn detect_avx2() -> bool {
    std::arch::is_x86_feature_detected!("avx2")
}

/// Wrapper shape shared by every accelerated kernel: generic fallback under
/// a mask, then one SIMD pass per row.
macro_rules! accel_kernel {
    ($name:ident, $row:path, $fallback:path) => {
        pub(crate) fn $name(ctx: &mut CompositeContext<'_>) {
            if ctx.mask.is_some() {
                return $fallback(ctx);
            }
            let row_bytes = ctx.width * ctx.format_d.bytes_per_pixel();
            for r in 0..ctx.rows {
                let a = &ctx.src_a[r * ctx.stride_a..][..row_bytes];
                let b = &ctx.src_b[r * ctx.stride_b..][..row_bytes];
                let d = &mut ctx.dst[r * ctx.stride_d..][..row_bytes];
                // SAFETY: the set's capability probe passed before install.
                unsafe { $row(d, a, b) };
            }
        }
    };
}

/// Scale reads a single source and a quantized factor, so it gets its own
/// wrapper shape.
macro_rules! accel_scale_kernel {
    ($name:ident, $row:path) => {
        pub(crate) fn $name(ctx: &mut CompositeContext<'_>) {
            if ctx.mask.is_some() {
                return generic::scale(ctx);
            }
            let q = generic::quantize_scale(ctx.scale);
            let row_bytes = ctx.width * ctx.format_d.bytes_per_pixel();
            for r in 0..ctx.rows {
                let a = &ctx.src_a[r * ctx.stride_a..][..row_bytes];
                let d = &mut ctx.dst[r * ctx.stride_d..][..row_bytes];
                // SAFETY: the set's capability probe passed before install.
                unsafe { $row(d, a, q) };
            }
        }
    };
}

accel_kernel!(multiply_sse2, sse2::multiply_row, generic::multiply);
accel_kernel!(screen_sse2, sse2::screen_row, generic::screen);
accel_kernel!(difference_sse2, sse2::difference_row, generic::difference);
accel_kernel!(addition_sse2, sse2::addition_row, generic::addition);
accel_kernel!(subtract_sse2, sse2::subtract_row, generic::subtract);
accel_kernel!(darken_sse2, sse2::darken_row, generic::darken);
accel_kernel!(lighten_sse2, sse2::lighten_row, generic::lighten);
accel_kernel!(grain_extract_sse2, sse2::grain_extract_row, generic::grain_extract);
accel_kernel!(grain_merge_sse2, sse2::grain_merge_row, generic::grain_merge);
accel_scale_kernel!(scale_sse2, sse2::scale_row);

accel_kernel!(multiply_avx2, avx2::multiply_row, generic::multiply);
accel_kernel!(screen_avx2, avx2::screen_row, generic::screen);
accel_kernel!(difference_avx2, avx2::difference_row, generic::difference);
accel_kernel!(addition_avx2, avx2::addition_row, generic::addition);
accel_kernel!(subtract_avx2, avx2::subtract_row, generic::subtract);
accel_kernel!(darken_avx2, avx2::darken_row, generic::darken);
accel_kernel!(lighten_avx2, avx2::lighten_row, generic::lighten);
accel_kernel!(grain_extract_avx2, avx2::grain_extract_row, generic::grain_extract);
accel_kernel!(grain_merge_avx2, avx2::grain_merge_row, generic::grain_merge);
accel_scale_kernel!(scale_avx2, avx2::scale_row);

/// Expands one entry per opaque same-format triple; the byte-stream kernels
/// are layout-agnostic, so v8 and rgb8 share the same function.
macro_rules! opaque_entries {
    ($($op:ident => $kernel:path),* $(,)?) => {
        &[
            $(
                KernelEntry {
                    op: CompositeOperation::$op,
                    format_a: PixelFormat::V8,
                    format_b: PixelFormat::V8,
                    format_d: PixelFormat::V8,
                    kernel: $kernel,
                },
                KernelEntry {
                    op: CompositeOperation::$op,
                    format_a: PixelFormat::Rgb8,
                    format_b: PixelFormat::Rgb8,
                    format_d: PixelFormat::Rgb8,
                    kernel: $kernel,
                },
            )*
        ]
    };
}

pub(crate) static SSE2: KernelSet = KernelSet {
    name: "sse2",
    detect: detect_sse2,
    entries: opaque_entries!(
        Multiply => multiply_sse2,
        Screen => screen_sse2,
        Difference => difference_sse2,
        Addition => addition_sse2,
        Subtract => subtract_sse2,
        Darken => darken_sse2,
        Lighten => lighten_sse2,
        GrainExtract => grain_extract_sse2,
        GrainMerge => grain_merge_sse2,
        Scale => scale_sse2,
    ),
};

pub(crate) static AVX2: KernelSet = KernelSet {
    name: "avx2",
    detect: detect_avx2,
    entries: opaque_entries!(
        Multiply => multiply_avx2,
        Screen => screen_avx2,
        Difference => difference_avx2,
        Addition => addition_avx2,
        Subtract => subtract_avx2,
        Darken => darken_avx2,
        Lighten => lighten_avx2,
        GrainExtract => grain_extract_avx2,
        GrainMerge => grain_merge_avx2,
        Scale => scale_avx2,
    ),
};

mod sse2 {
    use std::arch::x86_64::*;

    use crate::generic::channel;

    macro_rules! simple_row {
        ($name:ident, $scalar:path, $vop:path) => {
            #[target_feature(enable = "sse2")]
            pub(super) fn $name(dst: &mut [u8], a: &[u8], b: &[u8]) {
                let n = dst.len();
                let mut i = 0;
                while i + 16 <= n {
                    // SAFETY: 16 bytes are in bounds at offset i; loads and
                    // stores are unaligned.
                    unsafe {
                        let va = _mm_loadu_si128(a.as_ptr().add(i) as *const __m128i);
                        let vb = _mm_loadu_si128(b.as_ptr().add(i) as *const __m128i);
                        _mm_storeu_si128(dst.as_mut_ptr().add(i) as *mut __m128i, $vop(va, vb));
                    }
                    i += 16;
                }
                while i < n {
                    dst[i] = $scalar(a[i], b[i]);
                    i += 1;
                }
            }
        };
    }

    /// `(v + (v >> 8)) >> 8` with `v` pre-biased by +128: round-to-nearest
    /// division by 255, the vector form of `channel::mul_div255`.
    #[inline]
    #[target_feature(enable = "sse2")]
    fn div255_epu16(v: __m128i) -> __m128i {
        _mm_srli_epi16::<8>(_mm_add_epi16(v, _mm_srli_epi16::<8>(v)))
    }

    #[inline]
    #[target_feature(enable = "sse2")]
    fn mul_div255_epu16(a: __m128i, b: __m128i) -> __m128i {
        div255_epu16(_mm_add_epi16(_mm_mullo_epi16(a, b), _mm_set1_epi16(128)))
    }

    #[inline]
    #[target_feature(enable = "sse2")]
    fn mul_div255_u8(va: __m128i, vb: __m128i) -> __m128i {
        let zero = _mm_setzero_si128();
        let lo = mul_div255_epu16(_mm_unpacklo_epi8(va, zero), _mm_unpacklo_epi8(vb, zero));
        let hi = mul_div255_epu16(_mm_unpackhi_epi8(va, zero), _mm_unpackhi_epi8(vb, zero));
        _mm_packus_epi16(lo, hi)
    }

    #[inline]
    #[target_feature(enable = "sse2")]
    fn screen_u8(va: __m128i, vb: __m128i) -> __m128i {
        let ones = _mm_set1_epi8(-1);
        _mm_xor_si128(
            ones,
            mul_div255_u8(_mm_xor_si128(va, ones), _mm_xor_si128(vb, ones)),
        )
    }

    #[inline]
    #[target_feature(enable = "sse2")]
    fn difference_u8(va: __m128i, vb: __m128i) -> __m128i {
        _mm_or_si128(_mm_subs_epu8(va, vb), _mm_subs_epu8(vb, va))
    }

    /// clamp(a - b + 128); the signed-saturating pack does the clamping.
    #[inline]
    #[target_feature(enable = "sse2")]
    fn grain_extract_u8(va: __m128i, vb: __m128i) -> __m128i {
        let zero = _mm_setzero_si128();
        let c128 = _mm_set1_epi16(128);
        let lo = _mm_sub_epi16(
            _mm_add_epi16(_mm_unpacklo_epi8(va, zero), c128),
            _mm_unpacklo_epi8(vb, zero),
        );
        let hi = _mm_sub_epi16(
            _mm_add_epi16(_mm_unpackhi_epi8(va, zero), c128),
            _mm_unpackhi_epi8(vb, zero),
        );
        _mm_packus_epi16(lo, hi)
    }

    /// clamp(a + b - 128).
    #[inline]
    #[target_feature(enable = "sse2")]
    fn grain_merge_u8(va: __m128i, vb: __m128i) -> __m128i {
        let zero = _mm_setzero_si128();
        let c128 = _mm_set1_epi16(128);
        let lo = _mm_sub_epi16(
            _mm_add_epi16(_mm_unpacklo_epi8(va, zero), _mm_unpacklo_epi8(vb, zero)),
            c128,
        );
        let hi = _mm_sub_epi16(
            _mm_add_epi16(_mm_unpackhi_epi8(va, zero), _mm_unpackhi_epi8(vb, zero)),
            c128,
        );
        _mm_packus_epi16(lo, hi)
    }

    simple_row!(multiply_row, channel::multiply, mul_div255_u8);
    simple_row!(screen_row, channel::screen, screen_u8);
    simple_row!(difference_row, channel::difference, difference_u8);
    simple_row!(addition_row, channel::addition, _mm_adds_epu8);
    simple_row!(subtract_row, channel::subtract, _mm_subs_epu8);
    simple_row!(darken_row, channel::darken, _mm_min_epu8);
    simple_row!(lighten_row, channel::lighten, _mm_max_epu8);
    simple_row!(grain_extract_row, channel::grain_extract, grain_extract_u8);
    simple_row!(grain_merge_row, channel::grain_merge, grain_merge_u8);

    #[target_feature(enable = "sse2")]
    pub(super) fn scale_row(dst: &mut [u8], a: &[u8], q: u8) {
        let n = dst.len();
        let vq = _mm_set1_epi16(i16::from(q));
        let zero = _mm_setzero_si128();
        let mut i = 0;
        while i + 16 <= n {
            // SAFETY: 16 bytes are in bounds at offset i.
            unsafe {
                let va = _mm_loadu_si128(a.as_ptr().add(i) as *const __m128i);
                let lo = mul_div255_epu16(_mm_unpacklo_epi8(va, zero), vq);
                let hi = mul_div255_epu16(_mm_unpackhi_epi8(va, zero), vq);
                _mm_storeu_si128(
                    dst.as_mut_ptr().add(i) as *mut __m128i,
                    _mm_packus_epi16(lo, hi),
                );
            }
            i += 16;
        }
        while i < n {
            dst[i] = channel::mul_div255(a[i], q);
            i += 1;
        }
    }
}

mod avx2 {
    use std::arch::x86_64::*;

    use crate::generic::channel;

    macro_rules! simple_row {
        ($name:ident, $scalar:path, $vop:path) => {
            #[target_feature(enable = "avx2")]
            pub(super) fn $name(dst: &mut [u8], a: &[u8], b: &[u8]) {
                let n = dst.len();
                let mut i = 0;
                while i + 32 <= n {
                    // SAFETY: 32 bytes are in bounds at offset i; loads and
                    // stores are unaligned.
                    unsafe {
                        let va = _mm256_loadu_si256(a.as_ptr().add(i) as *const __m256i);
                        let vb = _mm256_loadu_si256(b.as_ptr().add(i) as *const __m256i);
                        _mm256_storeu_si256(
                            dst.as_mut_ptr().add(i) as *mut __m256i,
                            $vop(va, vb),
                        );
                    }
                    i += 32;
                }
                while i < n {
                    dst[i] = $scalar(a[i], b[i]);
                    i += 1;
                }
            }
        };
    }

    /// Splits 32 u8 lanes into two vectors of 16 u16 lanes, in byte order.
    #[inline]
    #[target_feature(enable = "avx2")]
    fn widen(v: __m256i) -> (__m256i, __m256i) {
        (
            _mm256_cvtepu8_epi16(_mm256_castsi256_si128(v)),
            _mm256_cvtepu8_epi16(_mm256_extracti128_si256::<1>(v)),
        )
    }

    /// Packs two u16 vectors back to 32 u8 lanes. `packus` interleaves the
    /// 128-bit lanes; the permute restores byte order.
    #[inline]
    #[target_feature(enable = "avx2")]
    fn pack(lo: __m256i, hi: __m256i) -> __m256i {
        _mm256_permute4x64_epi64::<0b11011000>(_mm256_packus_epi16(lo, hi))
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    fn div255_epu16(v: __m256i) -> __m256i {
        _mm256_srli_epi16::<8>(_mm256_add_epi16(v, _mm256_srli_epi16::<8>(v)))
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    fn mul_div255_epu16(a: __m256i, b: __m256i) -> __m256i {
        div255_epu16(_mm256_add_epi16(
            _mm256_mullo_epi16(a, b),
            _mm256_set1_epi16(128),
        ))
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    fn mul_div255_u8(va: __m256i, vb: __m256i) -> __m256i {
        let (a_lo, a_hi) = widen(va);
        let (b_lo, b_hi) = widen(vb);
        pack(mul_div255_epu16(a_lo, b_lo), mul_div255_epu16(a_hi, b_hi))
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    fn screen_u8(va: __m256i, vb: __m256i) -> __m256i {
        let ones = _mm256_set1_epi8(-1);
        _mm256_xor_si256(
            ones,
            mul_div255_u8(_mm256_xor_si256(va, ones), _mm256_xor_si256(vb, ones)),
        )
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    fn difference_u8(va: __m256i, vb: __m256i) -> __m256i {
        _mm256_or_si256(_mm256_subs_epu8(va, vb), _mm256_subs_epu8(vb, va))
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    fn grain_extract_u8(va: __m256i, vb: __m256i) -> __m256i {
        let c128 = _mm256_set1_epi16(128);
        let (a_lo, a_hi) = widen(va);
        let (b_lo, b_hi) = widen(vb);
        pack(
            _mm256_sub_epi16(_mm256_add_epi16(a_lo, c128), b_lo),
            _mm256_sub_epi16(_mm256_add_epi16(a_hi, c128), b_hi),
        )
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    fn grain_merge_u8(va: __m256i, vb: __m256i) -> __m256i {
        let c128 = _mm256_set1_epi16(128);
        let (a_lo, a_hi) = widen(va);
        let (b_lo, b_hi) = widen(vb);
        pack(
            _mm256_sub_epi16(_mm256_add_epi16(a_lo, b_lo), c128),
            _mm256_sub_epi16(_mm256_add_epi16(a_hi, b_hi), c128),
        )
    }

    simple_row!(multiply_row, channel::multiply, mul_div255_u8);
    simple_row!(screen_row, channel::screen, screen_u8);
    simple_row!(difference_row, channel::difference, difference_u8);
    simple_row!(addition_row, channel::addition, _mm256_adds_epu8);
    simple_row!(subtract_row, channel::subtract, _mm256_subs_epu8);
    simple_row!(darken_row, channel::darken, _mm256_min_epu8);
    simple_row!(lighten_row, channel::lighten, _mm256_max_epu8);
    simple_row!(grain_extract_row, channel::grain_extract, grain_extract_u8);
    simple_row!(grain_merge_row, channel::grain_merge, grain_merge_u8);

    #[target_feature(enable = "avx2")]
    pub(super) fn scale_row(dst: &mut [u8], a: &[u8], q: u8) {
        let n = dst.len();
        let vq = _mm256_set1_epi16(i16::from(q));
        let mut i = 0;
        while i + 32 <= n {
            // SAFETY: 32 bytes are in bounds at offset i.
            unsafe {
                let va = _mm256_loadu_si256(a.as_ptr().add(i) as *const __m256i);
                let (lo, hi) = widen(va);
                _mm256_storeu_si256(
                    dst.as_mut_ptr().add(i) as *mut __m256i,
                    pack(mul_div255_epu16(lo, vq), mul_div255_epu16(hi, vq)),
                );
            }
            i += 32;
        }
        while i < n {
            dst[i] = channel::mul_div255(a[i], q);
            i += 1;
        }
    }
}
