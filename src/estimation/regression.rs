//! Line fitting for the probe-gap model.
//!
//! Provides an ordinary least-squares fit and a robust Huber M-estimator
//! solved by iteratively reweighted least squares (IRLS). Both fit
//! `y = intercept + slope * x` over the `(len/gin, gout/gin)` features of one
//! link observation.
//!
//! The robust fit is deterministic: it always starts from unit weights (the
//! OLS solution) and walks the points in input order.

use super::types::{Features, LineFit};

/// Consistency constant turning the median absolute residual into a
/// standard-deviation estimate under normal errors.
const MAD_NORMALIZER: f64 = 0.674_489_750_196_081_7;

/// Failure of a single line fit
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("no samples to fit")]
    Empty,
    #[error("need at least two distinct x values, found {distinct}")]
    InsufficientSpread { distinct: usize },
    #[error("singular weighted design")]
    Singular,
    #[error("fit produced non-finite coefficients")]
    NonFinite,
    #[error("robust fit did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },
}

/// Tuning of the Huber IRLS fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrlsOptions {
    pub max_iterations: usize,
    /// Relative change of the Huber deviance that counts as converged
    pub tolerance: f64,
    /// Huber threshold in units of the residual scale
    pub huber_t: f64,
}

impl Default for IrlsOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-8,
            huber_t: 1.345,
        }
    }
}

/// Ordinary least-squares fit.
pub fn ols_fit(points: &[Features]) -> Result<LineFit, FitError> {
    check_design(points)?;
    let weights = vec![1.0; points.len()];
    let (intercept, slope) = weighted_least_squares(points, &weights)?;
    Ok(LineFit {
        intercept,
        slope,
        iterations: 1,
    })
}

/// Robust fit with Huber weights via IRLS.
///
/// The residual scale is re-estimated every iteration as the normalised
/// median absolute residual. An exact fit (all residuals zero) ends the
/// iteration immediately. Running out of iterations is an error.
pub fn huber_irls_fit(points: &[Features], options: &IrlsOptions) -> Result<LineFit, FitError> {
    check_design(points)?;

    let mut weights = vec![1.0; points.len()];
    let (mut intercept, mut slope) = weighted_least_squares(points, &weights)?;
    let mut residuals = residuals(points, intercept, slope);

    let exact = exact_fit_threshold(points);
    if is_exact_fit(&residuals, exact) {
        return Ok(LineFit { intercept, slope, iterations: 1 });
    }
    let mut scale = robust_scale(&residuals, exact);
    let mut deviance = huber_deviance(&residuals, scale, options.huber_t);

    for iteration in 1..=options.max_iterations {
        for (weight, residual) in weights.iter_mut().zip(&residuals) {
            *weight = huber_weight(residual / scale, options.huber_t);
        }

        (intercept, slope) = weighted_least_squares(points, &weights)?;
        residuals = self::residuals(points, intercept, slope);

        if is_exact_fit(&residuals, exact) {
            return Ok(LineFit { intercept, slope, iterations: iteration + 1 });
        }
        scale = robust_scale(&residuals, exact);
        let next = huber_deviance(&residuals, scale, options.huber_t);
        if !next.is_finite() {
            return Err(FitError::NonFinite);
        }

        if (next - deviance).abs() <= options.tolerance * deviance.abs().max(1.0) {
            return Ok(LineFit { intercept, slope, iterations: iteration + 1 });
        }
        deviance = next;
    }

    Err(FitError::NotConverged {
        iterations: options.max_iterations,
    })
}

/// Huber weight for a standardised residual `z`.
pub fn huber_weight(z: f64, t: f64) -> f64 {
    let z = z.abs();
    if z <= t {
        1.0
    } else {
        t / z
    }
}

/// Huber loss for a standardised residual `z`.
fn huber_rho(z: f64, t: f64) -> f64 {
    let z = z.abs();
    if z <= t {
        0.5 * z * z
    } else {
        t * z - 0.5 * t * t
    }
}

fn huber_deviance(residuals: &[f64], scale: f64, t: f64) -> f64 {
    residuals.iter().map(|r| huber_rho(r / scale, t)).sum()
}

/// Normalised median absolute residual.
pub fn mad_scale(residuals: &[f64]) -> f64 {
    let mut abs: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
    median(&mut abs) / MAD_NORMALIZER
}

/// MAD scale with a floor, so a majority of points lying exactly on the
/// line does not zero the scale while outliers remain.
fn robust_scale(residuals: &[f64], floor: f64) -> f64 {
    mad_scale(residuals).max(floor)
}

/// Median of a slice; sorts in place. Returns 0 for an empty slice.
pub fn median(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

fn residuals(points: &[Features], intercept: f64, slope: f64) -> Vec<f64> {
    points
        .iter()
        .map(|p| p.y - (intercept + slope * p.x))
        .collect()
}

/// Residual magnitude below which a point is considered on the line.
fn exact_fit_threshold(points: &[Features]) -> f64 {
    let magnitude = points.iter().fold(1.0_f64, |m, p| m.max(p.y.abs()));
    f64::EPSILON.sqrt() * magnitude
}

fn is_exact_fit(residuals: &[f64], threshold: f64) -> bool {
    residuals.iter().all(|r| r.abs() <= threshold)
}

fn check_design(points: &[Features]) -> Result<(), FitError> {
    if points.is_empty() {
        return Err(FitError::Empty);
    }
    let mut xs: Vec<f64> = points.iter().map(|p| p.x).collect();
    xs.sort_by(|a, b| a.total_cmp(b));
    xs.dedup();
    if xs.len() < 2 {
        return Err(FitError::InsufficientSpread { distinct: xs.len() });
    }
    Ok(())
}

/// Weighted least squares on centred sums. Returns `(intercept, slope)`.
fn weighted_least_squares(points: &[Features], weights: &[f64]) -> Result<(f64, f64), FitError> {
    let sum_w: f64 = weights.iter().sum();
    if !(sum_w > 0.0) {
        return Err(FitError::Singular);
    }

    let (mut sum_wx, mut sum_wy) = (0.0, 0.0);
    for (p, w) in points.iter().zip(weights) {
        sum_wx += w * p.x;
        sum_wy += w * p.y;
    }
    let mean_x = sum_wx / sum_w;
    let mean_y = sum_wy / sum_w;

    let (mut sxx, mut sxy) = (0.0, 0.0);
    let mut max_x = 0.0_f64;
    for (p, w) in points.iter().zip(weights) {
        let dx = p.x - mean_x;
        sxx += w * dx * dx;
        sxy += w * dx * (p.y - mean_y);
        max_x = max_x.max(p.x.abs());
    }

    // weighted spread of x indistinguishable from rounding noise
    let min_sxx = (f64::EPSILON * max_x).powi(2) * sum_w;
    if !(sxx > min_sxx) {
        return Err(FitError::Singular);
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    if !slope.is_finite() || !intercept.is_finite() {
        return Err(FitError::NonFinite);
    }
    Ok((intercept, slope))
}
