//! Gaussian blur weights for the bloom cascades.

/// Taps per blur direction. The centre tap is index `TAPS / 2`.
pub const TAPS: usize = 15;

/// Sampling range of the curve, in standard units on either side of the centre.
pub const EXTENT: f32 = 3.0;

const INV_SQRT_2PI: f32 = 0.398_942_28;

/// Probability density of the normal distribution with mean 0.
pub fn normal_pdf(x: f32, sigma: f32) -> f32 {
    let a = x / sigma;
    INV_SQRT_2PI / sigma * (-0.5 * a * a).exp()
}

/// `TAPS` evenly spaced samples of the normal PDF over `[-EXTENT, EXTENT]`,
/// normalized so the curve sums to one.
pub fn blur_weights(sigma: f32) -> [f32; TAPS] {
    let step = 2.0 * EXTENT / (TAPS - 1) as f32;
    let mut weights = [0.0; TAPS];
    for (i, w) in weights.iter_mut().enumerate() {
        *w = normal_pdf(-EXTENT + i as f32 * step, sigma);
    }
    let sum: f32 = weights.iter().sum();
    weights.iter_mut().for_each(|w| *w /= sum);
    weights
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_peaks_at_the_mean() {
        assert!((normal_pdf(0.0, 1.0) - 0.398_942_28).abs() < 1e-6);
        assert!(normal_pdf(0.0, 0.23) > normal_pdf(0.1, 0.23));
        assert!((normal_pdf(1.5, 0.775) - normal_pdf(-1.5, 0.775)).abs() < 1e-7);
    }

    #[test]
    fn curves_are_normalized_and_symmetric() {
        for sigma in [0.23, 0.775, 1.0] {
            let w = blur_weights(sigma);
            let sum: f32 = w.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "sigma {sigma} sums to {sum}");
            for i in 0..TAPS / 2 {
                assert!((w[i] - w[TAPS - 1 - i]).abs() < 1e-6);
            }
            assert_eq!(
                w.iter().cloned().fold(f32::MIN, f32::max),
                w[TAPS / 2],
                "centre tap must carry the most weight"
            );
        }
    }

    #[test]
    fn narrow_curves_concentrate_in_the_centre() {
        let small = blur_weights(0.23);
        let large = blur_weights(1.0);
        assert!(small[TAPS / 2] > large[TAPS / 2]);
        assert!(small[0] < large[0]);
    }
}
