//! Derivative-free Nelder-Mead minimizer with iteration and wall-clock limits.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct NelderMeadOptions {
    pub max_iterations: usize,
    pub max_duration: Duration,
    /// Relative tolerance on the spread of objective values across the simplex
    pub f_tolerance: f64,
    /// Relative tolerance on the simplex diameter per coordinate
    pub x_tolerance: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iterations: 5_000,
            max_duration: Duration::from_secs(5),
            f_tolerance: 1e-8,
            x_tolerance: 1e-5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptimizeError {
    NonFiniteStart,
    MaxIterations { iterations: usize },
    TimedOut { elapsed: Duration },
}

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Minimizes `objective` starting from `x0`.
///
/// The initial simplex is `x0` plus one vertex per coordinate offset by
/// `steps[i]`. Infeasible points should return `f64::INFINITY`; they are
/// simply never accepted.
pub fn minimize<F>(
    mut objective: F,
    x0: &[f64],
    steps: &[f64],
    options: &NelderMeadOptions,
) -> Result<Minimum, OptimizeError>
where
    F: FnMut(&[f64]) -> f64,
{
    let started = Instant::now();
    let dim = x0.len();

    let start_value = objective(x0);
    if !start_value.is_finite() {
        return Err(OptimizeError::NonFiniteStart);
    }

    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(dim + 1);
    simplex.push((x0.to_vec(), start_value));
    for i in 0..dim {
        let mut vertex = x0.to_vec();
        vertex[i] += steps.get(i).copied().unwrap_or(0.05);
        let value = objective(&vertex);
        simplex.push((vertex, value));
    }

    for iteration in 0..options.max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        if has_converged(&simplex, options) {
            let (x, value) = simplex.swap_remove(0);
            return Ok(Minimum {
                x,
                value,
                iterations: iteration,
            });
        }

        let elapsed = started.elapsed();
        if elapsed > options.max_duration {
            return Err(OptimizeError::TimedOut { elapsed });
        }

        let worst_value = simplex[dim].1;
        let second_worst = simplex[dim - 1].1;
        let best_value = simplex[0].1;
        let centroid = centroid(&simplex[..dim]);

        let reflected = along(&centroid, &simplex[dim].0, -REFLECTION);
        let reflected_value = objective(&reflected);

        if reflected_value < best_value {
            let expanded = along(&centroid, &simplex[dim].0, -EXPANSION);
            let expanded_value = objective(&expanded);
            simplex[dim] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
            continue;
        }

        if reflected_value < second_worst {
            simplex[dim] = (reflected, reflected_value);
            continue;
        }

        // Contract towards the better of the worst and reflected points.
        let (target, target_value) = if reflected_value < worst_value {
            (reflected, reflected_value)
        } else {
            (simplex[dim].0.clone(), worst_value)
        };
        let contracted = along(&centroid, &target, CONTRACTION);
        let contracted_value = objective(&contracted);
        if contracted_value < target_value {
            simplex[dim] = (contracted, contracted_value);
            continue;
        }

        let best = simplex[0].0.clone();
        for vertex in simplex.iter_mut().skip(1) {
            vertex.0 = along(&best, &vertex.0, SHRINK);
            vertex.1 = objective(&vertex.0);
        }
    }

    Err(OptimizeError::MaxIterations {
        iterations: options.max_iterations,
    })
}

/// `origin + t * (point - origin)`
fn along(origin: &[f64], point: &[f64], t: f64) -> Vec<f64> {
    origin
        .iter()
        .zip(point)
        .map(|(o, p)| o + t * (p - o))
        .collect()
}

fn centroid(vertices: &[(Vec<f64>, f64)]) -> Vec<f64> {
    let dim = vertices[0].0.len();
    let mut c = vec![0.0; dim];
    for (x, _) in vertices {
        for (ci, xi) in c.iter_mut().zip(x) {
            *ci += xi;
        }
    }
    let n = vertices.len() as f64;
    c.iter_mut().for_each(|ci| *ci /= n);
    c
}

fn has_converged(sorted: &[(Vec<f64>, f64)], options: &NelderMeadOptions) -> bool {
    let (best, best_value) = (&sorted[0].0, sorted[0].1);

    let f_spread = sorted
        .iter()
        .map(|(_, v)| (v - best_value).abs())
        .fold(0.0, f64::max);
    if !(f_spread <= options.f_tolerance * (1.0 + best_value.abs())) {
        return false;
    }

    sorted.iter().all(|(x, _)| {
        x.iter()
            .zip(best)
            .all(|(xi, bi)| (xi - bi).abs() <= options.x_tolerance * (1.0 + bi.abs()))
    })
}
