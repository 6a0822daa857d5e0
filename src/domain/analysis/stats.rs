//! Numeric building blocks shared by the calculators.
//!
//! Sample statistics use the N-1 denominator throughout. Everything stays in
//! `Decimal` except the normal tail approximation, which is a rational
//! approximation over `exp` and gains nothing from exact arithmetic.

use rust_decimal::{Decimal, MathematicalOps};
use std::f64::consts::PI;

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum: Decimal = values.iter().copied().sum();
    Some(sum / Decimal::from(values.len()))
}

/// Sample variance (N-1), `None` below two observations.
pub fn sample_variance(values: &[Decimal]) -> Option<Decimal> {
    sample_covariance(values, values)
}

/// Sample covariance (N-1) of paired observations.
///
/// Returns `None` when the slices differ in length or hold fewer than two
/// pairs.
pub fn sample_covariance(xs: &[Decimal], ys: &[Decimal]) -> Option<Decimal> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mean_x = mean(xs)?;
    let mean_y = mean(ys)?;
    let sum: Decimal = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (*x - mean_x) * (*y - mean_y))
        .sum();
    Some(sum / Decimal::from(xs.len() - 1))
}

/// Pearson product-moment correlation.
///
/// `None` when fewer than two pairs exist or either side has zero variance;
/// callers decide the fallback. The result is clamped to [-1, 1].
pub fn pearson(xs: &[Decimal], ys: &[Decimal]) -> Option<Decimal> {
    let cov = sample_covariance(xs, ys)?;
    let var_x = sample_variance(xs)?;
    let var_y = sample_variance(ys)?;
    if var_x.is_zero() || var_y.is_zero() {
        return None;
    }
    let denominator = (var_x * var_y).sqrt()?;
    if denominator.is_zero() {
        return None;
    }
    Some((cov / denominator).clamp(-Decimal::ONE, Decimal::ONE))
}

/// Upper tail of the standard normal distribution, P(Z > z).
///
/// Abramowitz & Stegun 26.2.17, absolute error below 7.5e-8.
pub fn normal_survival(z: f64) -> f64 {
    if z.is_nan() {
        return 1.0;
    }
    if z.is_infinite() {
        return if z > 0.0 { 0.0 } else { 1.0 };
    }
    if z < 0.0 {
        return 1.0 - normal_survival(-z);
    }
    let t = 1.0 / (1.0 + 0.231_641_9 * z);
    let poly = t
        * (0.319_381_530
            + t * (-0.356_563_782
                + t * (1.781_477_937 + t * (-1.821_255_978 + t * 1.330_274_429))));
    let pdf = (-0.5 * z * z).exp() / (2.0 * PI).sqrt();
    (pdf * poly).clamp(0.0, 1.0)
}
