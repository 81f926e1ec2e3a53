use nalgebra::DMatrix;
use num_complex::Complex64;

/// Builds a phasor from magnitude and angle (radians).
#[inline]
pub fn polar_to_rect(magnitude: f64, angle: f64) -> Complex64 {
    Complex64::from_polar(magnitude, angle)
}

/// Splits a phasor into magnitude and angle (radians).
#[inline]
pub fn rect_to_polar(z: Complex64) -> (f64, f64) {
    z.to_polar()
}

/// Formats a phasor as `magnitude∠degrees`.
pub fn format_polar(z: Complex64, precision: usize) -> String {
    let (m, a) = rect_to_polar(z);
    format!("{:.*}∠{:.2}°", precision, m, a.to_degrees())
}

/// Trait for extracting the real and imaginary parts of a matrix.
pub(crate) trait RealImage {
    type Mat;

    /// Returns the real and imaginary parts of the matrix.
    fn real_imag(&self) -> (Self::Mat, Self::Mat) {
        (self.real(), self.imag())
    }

    /// Returns the real part of the matrix.
    fn real(&self) -> Self::Mat;

    /// Returns the imaginary part of the matrix.
    fn imag(&self) -> Self::Mat;
}

impl RealImage for DMatrix<Complex64> {
    type Mat = DMatrix<f64>;

    fn real(&self) -> Self::Mat {
        self.map(|x| x.re)
    }

    fn imag(&self) -> Self::Mat {
        self.map(|x| x.im)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_6;

    #[test]
    fn polar_round_trip() {
        let z = polar_to_rect(1.05, -FRAC_PI_6);
        let (m, a) = rect_to_polar(z);
        assert_abs_diff_eq!(m, 1.05, epsilon = 1e-12);
        assert_abs_diff_eq!(a, -FRAC_PI_6, epsilon = 1e-12);
    }

    #[test]
    fn split_matrix() {
        let y = DMatrix::from_row_slice(
            2,
            2,
            &[
                Complex64::new(1.0, -10.0),
                Complex64::new(-1.0, 10.0),
                Complex64::new(-1.0, 10.0),
                Complex64::new(1.0, -9.5),
            ],
        );
        let (g, b) = y.real_imag();
        assert_eq!(g[(0, 1)], -1.0);
        assert_eq!(b[(1, 1)], -9.5);
    }

    #[test]
    fn polar_text() {
        assert_eq!(format_polar(Complex64::new(0.0, 2.0), 1), "2.0∠90.00°");
    }
}
