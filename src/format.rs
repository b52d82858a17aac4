//! The pixel format model: the closed set of packed 8-bit encodings the
//! compositing core understands, and the conversion rules between them.
//!
//! Kernels that need to operate across formats decode through a working
//! RGBA8 pixel: gray replicates into the color channels, a missing alpha
//! decodes as fully opaque, and encoding back to gray takes the integer
//! luminance `(30*r + 59*g + 11*b + 50) / 100`.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit gray.
    V8,
    /// 8-bit gray + alpha.
    Va8,
    /// 8-bit RGB.
    Rgb8,
    /// 8-bit RGB + alpha, straight (non-premultiplied) alpha.
    Rgba8,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 4] = [
        PixelFormat::V8,
        PixelFormat::Va8,
        PixelFormat::Rgb8,
        PixelFormat::Rgba8,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::V8 => 1,
            PixelFormat::Va8 => 2,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }

    pub fn channels(self) -> usize {
        self.bytes_per_pixel()
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, PixelFormat::Va8 | PixelFormat::Rgba8)
    }

    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::V8 => "v8",
            PixelFormat::Va8 => "va8",
            PixelFormat::Rgb8 => "rgb8",
            PixelFormat::Rgba8 => "rgba8",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Integer luminance used when encoding color down to gray.
pub(crate) fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((u32::from(r) * 30 + u32::from(g) * 59 + u32::from(b) * 11 + 50) / 100) as u8
}

/// Read one pixel from the head of `src` into the working RGBA8 space.
pub(crate) fn decode(format: PixelFormat, src: &[u8]) -> [u8; 4] {
    match format {
        PixelFormat::V8 => [src[0], src[0], src[0], 255],
        PixelFormat::Va8 => [src[0], src[0], src[0], src[1]],
        PixelFormat::Rgb8 => [src[0], src[1], src[2], 255],
        PixelFormat::Rgba8 => [src[0], src[1], src[2], src[3]],
    }
}

/// Write one working RGBA8 pixel to the head of `dst` in `format`.
pub(crate) fn encode(format: PixelFormat, px: [u8; 4], dst: &mut [u8]) {
    match format {
        PixelFormat::V8 => dst[0] = luminance(px[0], px[1], px[2]),
        PixelFormat::Va8 => {
            dst[0] = luminance(px[0], px[1], px[2]);
            dst[1] = px[3];
        }
        PixelFormat::Rgb8 => dst[..3].copy_from_slice(&px[..3]),
        PixelFormat::Rgba8 => dst[..4].copy_from_slice(&px),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_per_pixel_matches_channel_count() {
        for format in PixelFormat::ALL {
            assert_eq!(format.bytes_per_pixel(), format.channels());
        }
    }

    #[test]
    fn gray_luminance_is_identity() {
        for v in 0..=255u8 {
            assert_eq!(luminance(v, v, v), v);
        }
    }

    #[test]
    fn decode_fills_missing_alpha_with_opaque() {
        assert_eq!(decode(PixelFormat::V8, &[7]), [7, 7, 7, 255]);
        assert_eq!(decode(PixelFormat::Rgb8, &[1, 2, 3]), [1, 2, 3, 255]);
        assert_eq!(decode(PixelFormat::Va8, &[9, 40]), [9, 9, 9, 40]);
    }

    #[test]
    fn encode_decode_is_identity_for_native_pixels() {
        let mut out = [0u8; 4];
        encode(PixelFormat::Rgba8, [1, 2, 3, 4], &mut out);
        assert_eq!(decode(PixelFormat::Rgba8, &out), [1, 2, 3, 4]);

        let mut out = [0u8; 1];
        encode(PixelFormat::V8, [80, 80, 80, 255], &mut out);
        assert_eq!(out[0], 80);
    }
}
