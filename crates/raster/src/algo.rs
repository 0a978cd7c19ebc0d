//! Small numeric helpers shared by the fusion kernels: summary statistics and
//! ordinary least squares, evaluated over plain `f64` samples so that the
//! kernels can feed them window extracts regardless of the raster's base type.

/// Arithmetic mean and (population) standard deviation of `values`.
/// Returns `(0.0, 0.0)` for an empty slice.
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Ordinary least squares fit of `y ≈ slope * x + intercept`, plus the
/// coefficient of determination `r2`. Degenerate input (fewer than two
/// points, or zero variance in `x`) yields `(1.0, 0.0, 0.0)`, the identity
/// mapping with zero explanatory power.
pub fn least_squares(xs: &[f64], ys: &[f64]) -> (f64, f64, f64) {
    debug_assert_eq!(xs.len(), ys.len());
    let n = xs.len();
    if n < 2 {
        return (1.0, 0.0, 0.0);
    }

    let (mean_x, _) = mean_and_std(xs);
    let (mean_y, _) = mean_and_std(ys);

    let mut cov_xy = 0.0;
    let mut var_x = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        cov_xy += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
    }

    if var_x == 0.0 {
        return (1.0, 0.0, 0.0);
    }

    let slope = cov_xy / var_x;
    let intercept = mean_y - slope * mean_x;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        let predicted = slope * x + intercept;
        ss_res += (y - predicted).powi(2);
        ss_tot += (y - mean_y).powi(2);
    }
    let r2 = if ss_tot == 0.0 { 1.0 } else { (1.0 - ss_res / ss_tot).clamp(0.0, 1.0) };

    (slope, intercept, r2)
}

/// Sample covariance and variance of two equal-length series, used by
/// ESTARFM's per-channel conversion coefficient.
pub fn covariance_and_variance(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    debug_assert_eq!(xs.len(), ys.len());
    if xs.is_empty() {
        return (0.0, 0.0);
    }
    let (mean_x, _) = mean_and_std(xs);
    let (mean_y, _) = mean_and_std(ys);
    let n = xs.len() as f64;
    let mut cov = 0.0;
    let mut var = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        cov += (x - mean_x) * (y - mean_y);
        var += (x - mean_x).powi(2);
    }
    (cov / n, var / n)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn mean_and_std_of_constant_series_has_zero_std() {
        let (mean, std) = mean_and_std(&[4.0, 4.0, 4.0]);
        assert_relative_eq!(mean, 4.0);
        assert_relative_eq!(std, 0.0);
    }

    #[test]
    fn least_squares_recovers_exact_line() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [3.0, 5.0, 7.0, 9.0];
        let (slope, intercept, r2) = least_squares(&xs, &ys);
        assert_relative_eq!(slope, 2.0, epsilon = 1e-9);
        assert_relative_eq!(intercept, 1.0, epsilon = 1e-9);
        assert_relative_eq!(r2, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn least_squares_falls_back_on_zero_variance() {
        let xs = [5.0, 5.0, 5.0];
        let ys = [1.0, 2.0, 3.0];
        let (slope, intercept, _) = least_squares(&xs, &ys);
        assert_relative_eq!(slope, 1.0);
        assert_relative_eq!(intercept, 0.0);
    }
}
