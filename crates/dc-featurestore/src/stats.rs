//! Percentile/moment helpers for cross-sectional distribution snapshots.
//! Percentiles use the same linear-interpolation convention as numpy's
//! default `percentile` (`interpolation="linear"`).

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (`ddof=1`); `0.0` for fewer than two samples.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// `values` must already be sorted ascending.
pub fn percentile_sorted(sorted: &[f64], pct: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let idx = (sorted.len() - 1) as f64 * (pct / 100.0);
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = idx - lower as f64;
    sorted[lower] + frac * (sorted[upper] - sorted[lower])
}
