//! Descriptive statistics over lap and sector times.

/// Arithmetic mean, `None` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    Some(values.iter().sum::<f64>() / n)
}

/// Sample standard deviation (n − 1 denominator), `None` below two values.
#[must_use]
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    #[allow(clippy::cast_precision_loss)]
    let denom = (values.len() - 1) as f64;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / denom;
    Some(var.sqrt())
}

/// Population standard deviation (n denominator), `None` for an empty slice.
#[must_use]
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
    Some(var.sqrt())
}

/// Coefficient of variation (sample std / mean).
///
/// `None` below two values or when the mean is not positive.
#[must_use]
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    if m <= 0.0 {
        return None;
    }
    Some(sample_std(values)? / m)
}

/// Smallest value.
#[must_use]
pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().min_by(f64::total_cmp)
}

/// Largest value.
#[must_use]
pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().max_by(f64::total_cmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&v), Some(5.0));
        assert_eq!(population_std(&v), Some(2.0));
        let s = sample_std(&v).unwrap();
        assert!((s - 2.138_089_935).abs() < 1e-6);
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(mean(&[]), None);
        assert_eq!(sample_std(&[1.0]), None);
        assert_eq!(coefficient_of_variation(&[1.0]), None);
        assert_eq!(coefficient_of_variation(&[0.0, 0.0]), None);
        assert_eq!(min(&[]), None);
    }

    #[test]
    fn cv_of_constant_series_is_zero() {
        assert_eq!(coefficient_of_variation(&[30.0, 30.0, 30.0]), Some(0.0));
    }
}
