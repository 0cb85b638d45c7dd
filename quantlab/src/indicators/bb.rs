//! Bollinger Bands over a simple moving window.

use super::mean_std;

/// Returns (middle, upper, lower) series. Middle is the rolling mean; the
/// bands sit `std_devs` population standard deviations away. Indices before
/// the first full window hold NaN.
pub fn bollinger_series(
    values: &[f64],
    period: usize,
    std_devs: f64,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    if values.is_empty() {
        return (Vec::new(), Vec::new(), Vec::new());
    }
    let mut middle = vec![f64::NAN; values.len()];
    let mut upper = vec![f64::NAN; values.len()];
    let mut lower = vec![f64::NAN; values.len()];
    if period == 0 {
        return (middle, upper, lower);
    }
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let (mean, std) = mean_std(window);
        middle[i] = mean;
        upper[i] = mean + std_devs * std;
        lower[i] = mean - std_devs * std;
    }
    (middle, upper, lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bollinger_warm_up_and_symmetry() {
        let values: Vec<f64> = (0..30).map(|i| 100.0 + ((i % 4) as f64)).collect();
        let (middle, upper, lower) = bollinger_series(&values, 20, 2.0);
        for i in 0..19 {
            assert!(middle[i].is_nan());
        }
        for i in 19..values.len() {
            assert!(upper[i] >= middle[i]);
            assert!(lower[i] <= middle[i]);
            let up = upper[i] - middle[i];
            let down = middle[i] - lower[i];
            assert!((up - down).abs() < 1e-9);
        }
    }

    #[test]
    fn test_bollinger_flat_series_collapses() {
        let values = vec![42.0; 25];
        let (middle, upper, lower) = bollinger_series(&values, 20, 2.0);
        assert_eq!(middle[24], 42.0);
        assert_eq!(upper[24], 42.0);
        assert_eq!(lower[24], 42.0);
    }
}
