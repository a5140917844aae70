// Small descriptive statistics used by the prosody classifier and the
// expressiveness scorer. All functions ignore ordering of their input.

pub fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f32>() / values.len() as f32)
}

pub fn median(values: &[f32]) -> Option<f32> {
    let sorted = sorted(values);
    quantile_sorted(&sorted, 0.5)
}

/// Sample standard deviation (n - 1 denominator); 0 below two values
pub fn sample_stdev(values: &[f32]) -> f32 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f32>() / n as f32;
    let sum_sq: f32 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (sum_sq / (n - 1) as f32).sqrt()
}

/// Linear-interpolated quantile over pre-sorted values, position (n - 1)·q
pub fn quantile_sorted(sorted: &[f32], q: f32) -> Option<f32> {
    if sorted.is_empty() {
        return None;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let frac = position - lower as f32;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Interquartile range, Q3 - Q1
pub fn iqr(values: &[f32]) -> f32 {
    let sorted = sorted(values);
    match (quantile_sorted(&sorted, 0.25), quantile_sorted(&sorted, 0.75)) {
        (Some(q1), Some(q3)) => q3 - q1,
        _ => 0.0,
    }
}

/// Ordinary least squares slope of `ys` against `xs`
///
/// `None` with fewer than two points or zero spread in `xs`.
pub fn ols_slope(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        sxy += (x - mean_x) * (y - mean_y);
        sxx += (x - mean_x) * (x - mean_x);
    }
    (sxx > f64::EPSILON).then(|| sxy / sxx)
}

fn sorted(values: &[f32]) -> Vec<f32> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    sorted
}
