/// Bicubic convolution kernel (Catmull-Rom family, `a = -0.5`), the standard
/// choice for image resampling.
#[inline]
pub fn bicubic_weight(x: f64) -> f64 {
    const A: f64 = -0.5;
    let x = x.abs();
    if x <= 1.0 {
        (A + 2.0) * x * x * x - (A + 3.0) * x * x + 1.0
    } else if x < 2.0 {
        A * x * x * x - 5.0 * A * x * x + 8.0 * A * x - 4.0 * A
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bicubic_weight_matches_catmull_rom_shape() {
        assert_eq!(bicubic_weight(0.0), 1.0);
        assert!(bicubic_weight(1.0).abs() < 1e-9);
        assert!(bicubic_weight(2.0).abs() < 1e-9);
        assert!(bicubic_weight(3.0).abs() < 1e-9);
    }
}
