//! Constant-mean GARCH(1,1) with normal innovations, fitted by maximum likelihood.
//!
//! ```text
//! r_t   = mu + e_t
//! s2_t  = omega + alpha * e_{t-1}^2 + beta * s2_{t-1}
//! ```
//!
//! The recursion is started from an exponentially weighted backcast of the
//! first squared residuals.

use crate::application::volatility::nelder_mead::{self, NelderMeadOptions, OptimizeError};
use crate::domain::errors::VolatilityFitWarning;
use statrs::statistics::{Data, Distribution};
use std::f64::consts::PI;

const BACKCAST_WINDOW: usize = 75;
const BACKCAST_DECAY: f64 = 0.94;
const STATIONARITY_BOUND: f64 = 1.0 - 1e-6;
const ALPHA_START: f64 = 0.1;
const BETA_START: f64 = 0.8;

#[derive(Debug, Clone, PartialEq)]
pub struct GarchParams {
    pub mu: f64,
    pub omega: f64,
    pub alpha: f64,
    pub beta: f64,
}

impl GarchParams {
    fn from_slice(x: &[f64]) -> Self {
        Self {
            mu: x[0],
            omega: x[1],
            alpha: x[2],
            beta: x[3],
        }
    }

    pub fn persistence(&self) -> f64 {
        self.alpha + self.beta
    }

    fn is_admissible(&self) -> bool {
        self.omega > 0.0
            && self.alpha >= 0.0
            && self.beta >= 0.0
            && self.persistence() < STATIONARITY_BOUND
    }
}

#[derive(Debug, Clone)]
pub struct GarchFit {
    pub params: GarchParams,
    pub log_likelihood: f64,
    /// Conditional standard deviation per observation, in input units
    pub conditional_volatility: Vec<f64>,
    pub iterations: usize,
}

/// Fits GARCH(1,1) to `returns`.
///
/// `returns` must be finite; callers drop missing observations first.
pub fn fit(returns: &[f64], options: &NelderMeadOptions) -> Result<GarchFit, VolatilityFitWarning> {
    if returns.iter().any(|r| !r.is_finite()) {
        return Err(VolatilityFitWarning::NonFiniteReturns);
    }

    let data = Data::new(returns.to_vec());
    let (mean, variance) = match (data.mean(), data.variance()) {
        (Some(m), Some(v)) => (m, v),
        _ => {
            return Err(VolatilityFitWarning::InsufficientObservations {
                found: returns.len(),
                required: 2,
            });
        }
    };
    if !(variance.is_finite() && variance > f64::EPSILON * mean.abs().max(1.0)) {
        return Err(VolatilityFitWarning::DegenerateSeries);
    }

    let backcast = backcast(returns, mean);
    let start = [
        mean,
        variance * (1.0 - ALPHA_START - BETA_START),
        ALPHA_START,
        BETA_START,
    ];
    let steps = [
        0.1 * variance.sqrt(),
        0.5 * start[1],
        0.05,
        -0.05,
    ];

    let objective = |x: &[f64]| {
        let params = GarchParams::from_slice(x);
        if !params.is_admissible() {
            return f64::INFINITY;
        }
        negative_log_likelihood(returns, &params, backcast)
    };

    let minimum = nelder_mead::minimize(objective, &start, &steps, options).map_err(|e| match e {
        OptimizeError::NonFiniteStart => VolatilityFitWarning::NonFiniteLikelihood,
        OptimizeError::MaxIterations { iterations } => {
            VolatilityFitWarning::NotConverged { iterations }
        }
        OptimizeError::TimedOut { .. } => VolatilityFitWarning::TimedOut {
            budget_ms: options.max_duration.as_millis() as u64,
        },
    })?;

    let params = GarchParams::from_slice(&minimum.x);
    let conditional_volatility = conditional_variance(returns, &params, backcast)
        .into_iter()
        .map(f64::sqrt)
        .collect::<Vec<_>>();

    if conditional_volatility.iter().any(|v| !v.is_finite()) {
        return Err(VolatilityFitWarning::NonFiniteLikelihood);
    }

    Ok(GarchFit {
        params,
        log_likelihood: -minimum.value,
        conditional_volatility,
        iterations: minimum.iterations,
    })
}

/// Exponentially weighted mean of the first squared residuals.
fn backcast(returns: &[f64], mean: f64) -> f64 {
    let window = returns.len().min(BACKCAST_WINDOW);
    let mut weighted = 0.0;
    let mut total = 0.0;
    let mut weight = 1.0;
    for r in &returns[..window] {
        weighted += weight * (r - mean).powi(2);
        total += weight;
        weight *= BACKCAST_DECAY;
    }
    weighted / total
}

fn conditional_variance(returns: &[f64], params: &GarchParams, backcast: f64) -> Vec<f64> {
    let mut sigma2 = Vec::with_capacity(returns.len());
    let mut prev_sigma2 = backcast;
    let mut prev_resid2 = backcast;

    for r in returns {
        let s2 = params.omega + params.alpha * prev_resid2 + params.beta * prev_sigma2;
        sigma2.push(s2);
        prev_sigma2 = s2;
        prev_resid2 = (r - params.mu).powi(2);
    }
    sigma2
}

fn negative_log_likelihood(returns: &[f64], params: &GarchParams, backcast: f64) -> f64 {
    let sigma2 = conditional_variance(returns, params, backcast);
    let mut nll = 0.0;
    for (r, s2) in returns.iter().zip(&sigma2) {
        if !(*s2 > 0.0) || !s2.is_finite() {
            return f64::INFINITY;
        }
        nll += 0.5 * ((2.0 * PI).ln() + s2.ln() + (r - params.mu).powi(2) / s2);
    }
    if nll.is_finite() { nll } else { f64::INFINITY }
}
