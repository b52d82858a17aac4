//! The portable reference kernels. One kernel per operation handles every
//! format triple by decoding through the working RGBA8 space; these are the
//! kernels the generic install places in every dispatch slot, and the
//! baseline every accelerated kernel is measured against.
//!
//! Arithmetic policy: integer math scaled to `[0, 255]`, saturated before
//! storage. `mul_div255` rounds to nearest with the exact `t + 128` /
//! shift-add formula so the SIMD kernels can reproduce it bit-for-bit.
//!
//! Alpha policy for the channel operations (B composited over A):
//!
//! ```text
//! out_a = aB + mul_div255(aA, 255 - aB)
//! out_c = (s*aB*255 + cA*aA*(255 - aB)) / (aB*255 + aA*(255 - aB))   (rounded)
//! ```
//!
//! where `s` is the per-channel blend result on the straight color values.
//! For fully opaque inputs this degenerates to `out_c = s`, which is what
//! lets the opaque-format SIMD kernels skip the alpha math entirely.

use crate::context::CompositeContext;
use crate::format::{decode, encode};
use crate::op::CompositeOperation;
use crate::registry::Kernel;

pub(crate) type ChannelOp = fn(u8, u8) -> u8;

pub(crate) mod channel {
    /// Round-to-nearest `a * b / 255`. Exact for every input pair; the
    /// shift-add form is shared verbatim by the SIMD kernels.
    #[inline]
    pub fn mul_div255(a: u8, b: u8) -> u8 {
        let t = u32::from(a) * u32::from(b) + 128;
        ((t + (t >> 8)) >> 8) as u8
    }

    #[inline]
    pub fn multiply(a: u8, b: u8) -> u8 {
        mul_div255(a, b)
    }

    #[inline]
    pub fn screen(a: u8, b: u8) -> u8 {
        255 - mul_div255(255 - a, 255 - b)
    }

    #[inline]
    pub fn difference(a: u8, b: u8) -> u8 {
        a.abs_diff(b)
    }

    #[inline]
    pub fn addition(a: u8, b: u8) -> u8 {
        a.saturating_add(b)
    }

    #[inline]
    pub fn subtract(a: u8, b: u8) -> u8 {
        a.saturating_sub(b)
    }

    #[inline]
    pub fn darken(a: u8, b: u8) -> u8 {
        a.min(b)
    }

    #[inline]
    pub fn lighten(a: u8, b: u8) -> u8 {
        a.max(b)
    }

    #[inline]
    pub fn dodge(a: u8, b: u8) -> u8 {
        let t = (u32::from(a) << 8) / (256 - u32::from(b));
        t.min(255) as u8
    }

    #[inline]
    pub fn burn(a: u8, b: u8) -> u8 {
        let t = ((255 - u32::from(a)) << 8) / (u32::from(b) + 1);
        255u32.saturating_sub(t) as u8
    }

    #[inline]
    pub fn divide(a: u8, b: u8) -> u8 {
        let t = (u32::from(a) << 8) / (u32::from(b) + 1);
        t.min(255) as u8
    }

    #[inline]
    pub fn grain_extract(a: u8, b: u8) -> u8 {
        (i16::from(a) - i16::from(b) + 128).clamp(0, 255) as u8
    }

    #[inline]
    pub fn grain_merge(a: u8, b: u8) -> u8 {
        (i16::from(a) + i16::from(b) - 128).clamp(0, 255) as u8
    }
}

/// Quantize a `[0.0, 1.0]` scale factor to the u8 domain.
pub(crate) fn quantize_scale(scale: f32) -> u8 {
    ((scale * 255.0).round() as i32).clamp(0, 255) as u8
}

/// Apply `op` per color channel to two working RGBA8 pixels and composite
/// the result over A. See the module docs for the exact formulas.
pub(crate) fn blend_pixel(op: ChannelOp, pa: [u8; 4], pb: [u8; 4]) -> [u8; 4] {
    let aa = u32::from(pa[3]);
    let ab = u32::from(pb[3]);
    let inv_b = 255 - ab;
    let den = ab * 255 + aa * inv_b;

    let mut out = [0u8; 4];
    out[3] = (ab + u32::from(channel::mul_div255(pa[3], inv_b as u8))) as u8;
    for i in 0..3 {
        let s = u32::from(op(pa[i], pb[i]));
        out[i] = if den == 0 {
            0
        } else {
            let num = s * ab * 255 + u32::from(pa[i]) * aa * inv_b;
            ((num + den / 2) / den) as u8
        };
    }
    out
}

/// `lerp(d, s, m)` per channel: the mask blend applied to the working pixel.
pub(crate) fn lerp_pixel(d: [u8; 4], s: [u8; 4], m: u8) -> [u8; 4] {
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = channel::mul_div255(d[i], 255 - m).saturating_add(channel::mul_div255(s[i], m));
    }
    out
}

fn run_pixelwise(
    ctx: &mut CompositeContext<'_>,
    mut f: impl FnMut([u8; 4], [u8; 4]) -> [u8; 4],
) {
    let bpa = ctx.format_a.bytes_per_pixel();
    let bpb = ctx.format_b.bytes_per_pixel();
    let bpd = ctx.format_d.bytes_per_pixel();
    for r in 0..ctx.rows {
        let row_b = if ctx.src_b.is_empty() {
            &[][..]
        } else {
            &ctx.src_b[r * ctx.stride_b..][..ctx.width * bpb]
        };
        let row_m = ctx.mask.map(|m| &m[r * ctx.stride_mask..][..ctx.width]);
        for x in 0..ctx.width {
            let pa = decode(ctx.format_a, &ctx.src_a[r * ctx.stride_a + x * bpa..]);
            let pb = if row_b.is_empty() {
                [0, 0, 0, 0]
            } else {
                decode(ctx.format_b, &row_b[x * bpb..])
            };
            let mut out = f(pa, pb);
            let dpx = &mut ctx.dst[r * ctx.stride_d + x * bpd..][..bpd];
            if let Some(m) = row_m {
                let old = decode(ctx.format_d, dpx);
                out = lerp_pixel(old, out, m[x]);
            }
            encode(ctx.format_d, out, dpx);
        }
    }
}

fn run_channel(ctx: &mut CompositeContext<'_>, op: ChannelOp) {
    run_pixelwise(ctx, |pa, pb| blend_pixel(op, pa, pb));
}

macro_rules! channel_kernels {
    ($(($name:ident, $opfn:path)),* $(,)?) => {
        $(
            pub(crate) fn $name(ctx: &mut CompositeContext<'_>) {
                run_channel(ctx, $opfn)
            }
        )*
    };
}

channel_kernels!(
    (multiply, channel::multiply),
    (screen, channel::screen),
    (difference, channel::difference),
    (addition, channel::addition),
    (subtract, channel::subtract),
    (darken, channel::darken),
    (lighten, channel::lighten),
    (dodge, channel::dodge),
    (burn, channel::burn),
    (divide, channel::divide),
    (grain_extract, channel::grain_extract),
    (grain_merge, channel::grain_merge),
);

pub(crate) fn swap(ctx: &mut CompositeContext<'_>) {
    run_pixelwise(ctx, |_pa, pb| pb);
}

pub(crate) fn scale(ctx: &mut CompositeContext<'_>) {
    let q = quantize_scale(ctx.scale);
    run_pixelwise(ctx, |pa, _pb| {
        [
            channel::mul_div255(pa[0], q),
            channel::mul_div255(pa[1], q),
            channel::mul_div255(pa[2], q),
            channel::mul_div255(pa[3], q),
        ]
    });
}

/// The reference kernel for an operation; the generic install places this
/// in every format slot of the operation's plane.
pub(crate) fn kernel_for(op: CompositeOperation) -> Kernel {
    match op {
        CompositeOperation::Multiply => multiply,
        CompositeOperation::Screen => screen,
        CompositeOperation::Difference => difference,
        CompositeOperation::Addition => addition,
        CompositeOperation::Subtract => subtract,
        CompositeOperation::Darken => darken,
        CompositeOperation::Lighten => lighten,
        CompositeOperation::Dodge => dodge,
        CompositeOperation::Burn => burn,
        CompositeOperation::Divide => divide,
        CompositeOperation::GrainExtract => grain_extract,
        CompositeOperation::GrainMerge => grain_merge,
        CompositeOperation::Swap => swap,
        CompositeOperation::Scale => scale,
    }
}
