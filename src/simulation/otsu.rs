// Otsu's automatic threshold
//
// Otsu, N. (1979). A threshold selection method from gray-level histograms.
// IEEE Trans. Systems, Man, and Cybernetics, 9(1), 62-66.
//
// Values are binned into a 256-bin histogram spanning [min, max]; the
// threshold is the bin centre that maximises the between-class variance.

const N_BINS: usize = 256;

/// Threshold separating `values` into two classes
///
/// Returns `None` for empty input. Constant input returns that constant.
///
/// # Example
/// ```
/// use connectome_ksample::simulation::threshold_otsu;
///
/// let values = [0.0, 0.1, 0.05, 0.9, 1.0, 0.95];
/// let t = threshold_otsu(&values).unwrap();
/// assert!(t > 0.05 && t < 0.9);
/// ```
pub fn threshold_otsu(values: &[f64]) -> Option<f64> {
    let first = *values.first()?;
    let (min, max) = values
        .iter()
        .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if min == max {
        return Some(min);
    }

    let width = (max - min) / N_BINS as f64;
    let mut hist = [0.0f64; N_BINS];
    for &v in values {
        let bin = (((v - min) / width) as usize).min(N_BINS - 1);
        hist[bin] += 1.0;
    }
    let centers: Vec<f64> = (0..N_BINS)
        .map(|i| min + (i as f64 + 0.5) * width)
        .collect();

    // class weights and means for a split after each bin
    let mut weight_low = [0.0f64; N_BINS];
    let mut mean_low = [0.0f64; N_BINS];
    let (mut w, mut s) = (0.0, 0.0);
    for i in 0..N_BINS {
        w += hist[i];
        s += hist[i] * centers[i];
        weight_low[i] = w;
        mean_low[i] = if w > 0.0 { s / w } else { 0.0 };
    }

    let mut weight_high = [0.0f64; N_BINS];
    let mut mean_high = [0.0f64; N_BINS];
    let (mut w, mut s) = (0.0, 0.0);
    for i in (0..N_BINS).rev() {
        w += hist[i];
        s += hist[i] * centers[i];
        weight_high[i] = w;
        mean_high[i] = if w > 0.0 { s / w } else { 0.0 };
    }

    let mut best_index = 0;
    let mut best_variance = f64::NEG_INFINITY;
    for i in 0..N_BINS - 1 {
        let diff = mean_low[i] - mean_high[i + 1];
        let variance = weight_low[i] * weight_high[i + 1] * diff * diff;
        if variance > best_variance {
            best_variance = variance;
            best_index = i;
        }
    }

    Some(centers[best_index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(threshold_otsu(&[]), None);
    }

    #[test]
    fn test_constant_input_returns_value() {
        assert_eq!(threshold_otsu(&[0.3, 0.3, 0.3]), Some(0.3));
    }

    #[test]
    fn test_bimodal_split() {
        let mut values: Vec<f64> = (0..50).map(|i| -0.6 + i as f64 * 0.002).collect();
        values.extend((0..50).map(|i| 0.5 + i as f64 * 0.002));
        let t = threshold_otsu(&values).unwrap();
        assert!(t > -0.6 && t < 0.5, "threshold = {}", t);
        assert!(values[50..].iter().all(|&v| v > t));
    }

    #[test]
    fn test_two_values() {
        let t = threshold_otsu(&[0.0, 1.0]).unwrap();
        assert!((0.0..1.0).contains(&t));
    }
}
