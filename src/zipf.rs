//! Rank/frequency fit
//!
//! Zipf's law says frequency falls off as a power of rank, so ln(freq) against
//! ln(rank) should be close to a line with slope near -1.
use crate::errors::*;

#[derive(Debug, Clone, PartialEq)]
pub struct ZipfFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation of the log-log points
    pub r: f64,
    /// Predicted frequency for each rank, starting at rank 1
    pub fitted: Vec<f64>,
}

/// Least squares of ln(freq) on ln(rank), most frequent first
pub fn fit(freqs: &[u64]) -> Result<ZipfFit> {
    if freqs.len() < 2 {
        return Err(Error::Other(format!(
            "need at least two frequencies for a rank/frequency fit, got {}", freqs.len())));
    }
    if freqs.contains(&0) {
        return Err(Error::Other("zero frequencies have no logarithm".to_string()));
    }
    let mut sorted = freqs.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let xs: Vec<f64> = (1..=sorted.len()).map(|rank| (rank as f64).ln()).collect();
    let ys: Vec<f64> = sorted.iter().map(|&f| (f as f64).ln()).collect();
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(&ys) {
        sxx += (x - mean_x) * (x - mean_x);
        syy += (y - mean_y) * (y - mean_y);
        sxy += (x - mean_x) * (y - mean_y);
    }
    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    // All frequencies equal: a flat line, perfectly predicted
    let r = if syy == 0.0 { 0.0 } else { sxy / (sxx * syy).sqrt() };
    let fitted = xs.iter().map(|x| (intercept + slope * x).exp()).collect();
    Ok(ZipfFit { slope, intercept, r, fitted })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_an_exact_power_law() {
        // freq = 1200 / rank
        let freqs = [100, 1200, 400, 300, 600, 200];
        let z = fit(&freqs).unwrap();
        assert!((z.slope + 1.0).abs() < 1e-9);
        assert!((z.intercept - 1200f64.ln()).abs() < 1e-9);
        assert!((z.r + 1.0).abs() < 1e-9);
        assert!((z.fitted[2] - 400.0).abs() < 1e-6);
    }

    #[test]
    fn flat_frequencies() {
        let z = fit(&[5, 5, 5]).unwrap();
        assert_eq!(z.slope, 0.0);
        assert_eq!(z.r, 0.0);
    }

    #[test]
    fn rejects_degenerate_input() {
        assert!(fit(&[7]).is_err());
        assert!(fit(&[7, 0, 3]).is_err());
    }
}
