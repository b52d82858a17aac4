//! The per-call value object describing one composite: the two source
//! buffers, the destination, an optional coverage mask, and the pixel
//! extent. The core never retains a context past the call and never
//! allocates; every buffer is caller-owned.

use crate::error::{PixmixError, PixmixResult};
use crate::format::PixelFormat;
use crate::op::CompositeOperation;

pub struct CompositeContext<'a> {
    pub format_a: PixelFormat,
    pub format_b: PixelFormat,
    pub format_d: PixelFormat,

    /// Pixels per row.
    pub width: usize,
    /// Number of rows. Total pixel count is `width * rows`.
    pub rows: usize,

    /// Byte distance between row starts, per buffer. For packed buffers
    /// this equals `width * bytes_per_pixel`.
    pub stride_a: usize,
    pub stride_b: usize,
    pub stride_d: usize,
    /// Row stride of the mask, in bytes (the mask is one byte per pixel).
    pub stride_mask: usize,

    pub src_a: &'a [u8],
    pub src_b: &'a [u8],
    pub dst: &'a mut [u8],
    /// Optional coverage mask: the kernel result is blended with the
    /// original destination weighted by `mask[i] / 255`.
    pub mask: Option<&'a [u8]>,

    /// Factor in `[0.0, 1.0]` consumed only by [`CompositeOperation::Scale`].
    pub scale: f32,
}

impl<'a> CompositeContext<'a> {
    /// A packed multi-row context with per-format row strides.
    pub fn new(
        format_a: PixelFormat,
        format_b: PixelFormat,
        format_d: PixelFormat,
        width: usize,
        rows: usize,
        src_a: &'a [u8],
        src_b: &'a [u8],
        dst: &'a mut [u8],
    ) -> Self {
        Self {
            format_a,
            format_b,
            format_d,
            width,
            rows,
            stride_a: width * format_a.bytes_per_pixel(),
            stride_b: width * format_b.bytes_per_pixel(),
            stride_d: width * format_d.bytes_per_pixel(),
            stride_mask: width,
            src_a,
            src_b,
            dst,
            mask: None,
            scale: 1.0,
        }
    }

    /// A single packed row of `pixels` pixels.
    pub fn contiguous(
        format_a: PixelFormat,
        format_b: PixelFormat,
        format_d: PixelFormat,
        pixels: usize,
        src_a: &'a [u8],
        src_b: &'a [u8],
        dst: &'a mut [u8],
    ) -> Self {
        Self::new(format_a, format_b, format_d, pixels, 1, src_a, src_b, dst)
    }

    pub fn with_strides(mut self, stride_a: usize, stride_b: usize, stride_d: usize) -> Self {
        self.stride_a = stride_a;
        self.stride_b = stride_b;
        self.stride_d = stride_d;
        self
    }

    pub fn with_mask(mut self, mask: &'a [u8]) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_mask_stride(mut self, stride_mask: usize) -> Self {
        self.stride_mask = stride_mask;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn pixels(&self) -> usize {
        self.width * self.rows
    }

    /// Checks that every buffer covers the extent its stride and the pixel
    /// count imply. Runs once per `composite()` call; kernels may assume a
    /// validated context.
    pub(crate) fn validate(&self, op: CompositeOperation) -> PixmixResult<()> {
        if !self.scale.is_finite() || !(0.0..=1.0).contains(&self.scale) {
            return Err(PixmixError::invalid_argument(format!(
                "scale factor {} is outside [0.0, 1.0]",
                self.scale
            )));
        }
        if self.width == 0 || self.rows == 0 {
            return Ok(());
        }

        check_buffer(
            "source A",
            self.src_a.len(),
            self.stride_a,
            self.width * self.format_a.bytes_per_pixel(),
            self.rows,
        )?;
        // Scale reads only A; B may be left empty.
        if op != CompositeOperation::Scale {
            check_buffer(
                "source B",
                self.src_b.len(),
                self.stride_b,
                self.width * self.format_b.bytes_per_pixel(),
                self.rows,
            )?;
        }
        check_buffer(
            "destination",
            self.dst.len(),
            self.stride_d,
            self.width * self.format_d.bytes_per_pixel(),
            self.rows,
        )?;
        if let Some(mask) = self.mask {
            check_buffer("mask", mask.len(), self.stride_mask, self.width, self.rows)?;
        }
        Ok(())
    }
}

fn check_buffer(
    name: &str,
    len: usize,
    stride: usize,
    row_bytes: usize,
    rows: usize,
) -> PixmixResult<()> {
    if rows > 1 && stride < row_bytes {
        return Err(PixmixError::invalid_argument(format!(
            "{name} stride {stride} is smaller than a row of {row_bytes} bytes"
        )));
    }
    let required = (rows - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(row_bytes))
        .ok_or_else(|| PixmixError::invalid_argument(format!("{name} extent overflows usize")))?;
    if len < required {
        return Err(PixmixError::invalid_argument(format!(
            "{name} holds {len} bytes, the requested extent needs {required}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba(n: usize) -> Vec<u8> {
        vec![0u8; n * 4]
    }

    #[test]
    fn contiguous_strides_are_packed() {
        let a = rgba(8);
        let b = rgba(8);
        let mut d = rgba(8);
        let ctx = CompositeContext::contiguous(
            PixelFormat::Rgba8,
            PixelFormat::Rgba8,
            PixelFormat::Rgba8,
            8,
            &a,
            &b,
            &mut d,
        );
        assert_eq!(ctx.stride_a, 32);
        assert_eq!(ctx.pixels(), 8);
        assert!(ctx.validate(CompositeOperation::Multiply).is_ok());
    }

    #[test]
    fn undersized_source_is_rejected() {
        let a = rgba(4);
        let b = rgba(8);
        let mut d = rgba(8);
        let ctx = CompositeContext::contiguous(
            PixelFormat::Rgba8,
            PixelFormat::Rgba8,
            PixelFormat::Rgba8,
            8,
            &a,
            &b,
            &mut d,
        );
        let err = ctx.validate(CompositeOperation::Multiply).unwrap_err();
        assert!(matches!(err, PixmixError::InvalidArgument(_)));
    }

    #[test]
    fn stride_smaller_than_row_is_rejected() {
        let a = rgba(64);
        let b = rgba(64);
        let mut d = rgba(64);
        let ctx = CompositeContext::new(
            PixelFormat::Rgba8,
            PixelFormat::Rgba8,
            PixelFormat::Rgba8,
            8,
            4,
            &a,
            &b,
            &mut d,
        )
        .with_strides(16, 32, 32);
        assert!(ctx.validate(CompositeOperation::Multiply).is_err());
    }

    #[test]
    fn zero_extent_passes_without_touching_buffers() {
        let mut d = [];
        let ctx = CompositeContext::contiguous(
            PixelFormat::Rgba8,
            PixelFormat::Rgba8,
            PixelFormat::Rgba8,
            0,
            &[],
            &[],
            &mut d,
        );
        assert!(ctx.validate(CompositeOperation::Multiply).is_ok());
    }

    #[test]
    fn scale_out_of_range_is_rejected() {
        let a = rgba(1);
        let b = rgba(1);
        let mut d = rgba(1);
        let ctx = CompositeContext::contiguous(
            PixelFormat::Rgba8,
            PixelFormat::Rgba8,
            PixelFormat::Rgba8,
            1,
            &a,
            &b,
            &mut d,
        )
        .with_scale(1.5);
        assert!(ctx.validate(CompositeOperation::Scale).is_err());
    }

    #[test]
    fn scale_does_not_require_b() {
        let a = rgba(4);
        let mut d = rgba(4);
        let ctx = CompositeContext::contiguous(
            PixelFormat::Rgba8,
            PixelFormat::Rgba8,
            PixelFormat::Rgba8,
            4,
            &a,
            &[],
            &mut d,
        );
        assert!(ctx.validate(CompositeOperation::Scale).is_ok());
        assert!(ctx.validate(CompositeOperation::Multiply).is_err());
    }

    #[test]
    fn short_mask_is_rejected() {
        let a = rgba(8);
        let b = rgba(8);
        let mut d = rgba(8);
        let mask = [255u8; 4];
        let ctx = CompositeContext::contiguous(
            PixelFormat::Rgba8,
            PixelFormat::Rgba8,
            PixelFormat::Rgba8,
            8,
            &a,
            &b,
            &mut d,
        )
        .with_mask(&mask);
        assert!(ctx.validate(CompositeOperation::Multiply).is_err());
    }
}
