//! The filter itself: weights, the default kernel and a host reference.

/// The default kernel, with the `Filter` entry point.
pub const KERNEL_SOURCE: &str = include_str!("../kernels/filter.wgsl");

/// Rec. 601 luma coefficients, the kernel uses the same ones.
pub const LUMA: [f32; 3] = [0.299, 0.587, 0.114];

/// Normalized weights of a 3x3 filter, in row-major order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterWeights([f32; 9]);

impl FilterWeights {
    /// The integer binomial weights `[1,2,1; 2,4,2; 1,2,1]`.
    pub const BINOMIAL: [u32; 9] = [1, 2, 1, 2, 4, 2, 1, 2, 1];

    /// Normalize integer weights by their sum, `None` if they are all zero.
    pub fn from_integers(weights: [u32; 9]) -> Option<Self> {
        let total: u32 = weights.iter().sum();
        if total == 0 {
            return None;
        }

        Some(FilterWeights(weights.map(|w| w as f32 / total as f32)))
    }

    /// The 3x3 binomial blur.
    pub fn binomial() -> Self {
        FilterWeights(Self::BINOMIAL.map(|w| w as f32 / 16.0))
    }

    pub fn as_array(&self) -> &[f32; 9] {
        &self.0
    }

    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }

    pub fn at(&self, dx: i32, dy: i32) -> f32 {
        self.0[((dy + 1) * 3 + (dx + 1)) as usize]
    }
}

impl Default for FilterWeights {
    fn default() -> Self {
        FilterWeights::binomial()
    }
}

/// Filter an image on the host, the way the kernel does.
///
/// Neighbours outside of the image are clamped to the edge. The intensity is replicated into the
/// colour channels and alpha is opaque.
pub fn convolve_reference(image: &image::RgbaImage, weights: &FilterWeights) -> image::RgbaImage {
    let (width, height) = image.dimensions();
    let (max_x, max_y) = (width as i64 - 1, height as i64 - 1);

    image::RgbaImage::from_fn(width, height, |x, y| {
        let mut sum = 0.0f32;

        for dy in -1..=1 {
            for dx in -1..=1 {
                let sx = (x as i64 + dx as i64).clamp(0, max_x) as u32;
                let sy = (y as i64 + dy as i64).clamp(0, max_y) as u32;
                sum += weights.at(dx, dy) * luminance(image.get_pixel(sx, sy));
            }
        }

        let value = (sum.clamp(0.0, 1.0) * 255.0).round() as u8;
        image::Rgba([value, value, value, u8::MAX])
    })
}

/// Luminance of a pixel, in `[0, 1]`.
pub fn luminance(pixel: &image::Rgba<u8>) -> f32 {
    let [r, g, b, _] = pixel.0;
    [r, g, b]
        .iter()
        .zip(LUMA)
        .map(|(&c, w)| c as f32 / 255.0 * w)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binomial_is_normalized() {
        let weights = FilterWeights::binomial();
        assert!((weights.sum() - 1.0).abs() < 1e-6);
        assert_eq!(weights.at(0, 0), 0.25);
        assert_eq!(weights.at(-1, -1), 1.0 / 16.0);
    }

    #[test]
    fn zero_weights_are_rejected() {
        assert!(FilterWeights::from_integers([0; 9]).is_none());
        assert_eq!(
            FilterWeights::from_integers(FilterWeights::BINOMIAL),
            Some(FilterWeights::binomial())
        );
    }

    #[test]
    fn embedded_kernel_has_entry_point() {
        assert!(KERNEL_SOURCE.contains("fn Filter("));
    }
}
