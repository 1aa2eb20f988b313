//! Distribution functions backed by `statrs`.
//!
//! Invalid parameters (non-positive spread, probabilities outside `[0, 1]`,
//! bad inputs) yield NaN instead of panicking.

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal, StudentsT};

use crate::{BAD, is_bad};

fn valid_prob(p: f64) -> bool {
    p.is_finite() && (0.0..=1.0).contains(&p)
}

/// Normal CDF at `x` for the given mean and standard deviation.
pub fn normal_cdf(x: f64, mean: f64, sd: f64) -> f64 {
    if is_bad(x) || is_bad(mean) || is_bad(sd) {
        return BAD;
    }
    match Normal::new(mean, sd) {
        Ok(d) => d.cdf(x),
        Err(_) => BAD,
    }
}

/// Inverse normal CDF (quantile) for probability `p`.
pub fn normal_cdf_inv(p: f64, mean: f64, sd: f64) -> f64 {
    if !valid_prob(p) || is_bad(mean) || is_bad(sd) {
        return BAD;
    }
    match Normal::new(mean, sd) {
        Ok(d) => d.inverse_cdf(p),
        Err(_) => BAD,
    }
}

/// Quantile of Student's t distribution with `df` degrees of freedom.
pub fn students_t_inv(p: f64, df: f64) -> f64 {
    if !valid_prob(p) || is_bad(df) {
        return BAD;
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(d) => d.inverse_cdf(p),
        Err(_) => BAD,
    }
}

/// Quantile of the chi-square distribution with `df` degrees of freedom.
pub fn chi2_inv(p: f64, df: f64) -> f64 {
    if !valid_prob(p) || is_bad(df) {
        return BAD;
    }
    match ChiSquared::new(df) {
        Ok(d) => d.inverse_cdf(p),
        Err(_) => BAD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normal_cdf_symmetry() {
        assert_relative_eq!(normal_cdf(10.0, 10.0, 2.0), 0.5, epsilon = 1e-12);
        let lo = normal_cdf(8.0, 10.0, 2.0);
        let hi = normal_cdf(12.0, 10.0, 2.0);
        assert_relative_eq!(lo + hi, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_normal_cdf_inv_known_quantile() {
        assert_relative_eq!(normal_cdf_inv(0.975, 0.0, 1.0), 1.959_964, epsilon = 1e-5);
        assert_relative_eq!(normal_cdf_inv(0.5, 5.0, 3.0), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bad_parameters_give_nan() {
        assert!(is_bad(normal_cdf(1.0, 0.0, 0.0)));
        assert!(is_bad(normal_cdf(f64::NAN, 0.0, 1.0)));
        assert!(is_bad(normal_cdf_inv(1.5, 0.0, 1.0)));
        assert!(is_bad(students_t_inv(0.9, 0.0)));
        assert!(is_bad(chi2_inv(-0.1, 3.0)));
    }

    #[test]
    fn test_students_t_approaches_normal() {
        let t = students_t_inv(0.975, 1000.0);
        assert_relative_eq!(t, 1.962_339, epsilon = 1e-3);
        assert_relative_eq!(students_t_inv(0.975, 10.0), 2.228_139, epsilon = 1e-4);
    }

    #[test]
    fn test_chi2_inv_known_value() {
        // 95th percentile of chi-square with 1 df is 3.841459.
        assert_relative_eq!(chi2_inv(0.95, 1.0), 3.841_459, epsilon = 1e-4);
    }
}
