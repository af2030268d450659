// Limited-memory BFGS with a backtracking Armijo line search.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::error::ModelError;

/// A function to minimize. Value and gradient are produced together because
/// the training objective computes both from one forward-backward pass.
pub trait DifferentiableFn {
    fn dimension(&self) -> usize;
    fn value_and_gradient(&mut self, point: &[f64]) -> (f64, Vec<f64>);
}

const EPS: f64 = 1e-10;
const SUFFICIENT_DECREASE: f64 = 1e-4;

#[derive(Debug, Clone)]
pub struct Lbfgs {
    pub max_iterations: usize,
    pub max_history: usize,
    /// Line-search backtracking multiplier on the first iteration, where the
    /// initial Hessian guess is untrustworthy and big steps usually overshoot.
    pub initial_step_multiplier: f64,
    pub step_multiplier: f64,
}

impl Default for Lbfgs {
    fn default() -> Lbfgs {
        Lbfgs {
            max_iterations: 30,
            max_history: 5,
            initial_step_multiplier: 0.01,
            step_multiplier: 0.5,
        }
    }
}

impl Lbfgs {
    pub fn new(max_iterations: usize) -> Lbfgs {
        Lbfgs { max_iterations, ..Lbfgs::default() }
    }

    pub fn minimize<F: DifferentiableFn>(
        &self,
        function: &mut F,
        initial: Vec<f64>,
        tolerance: f64,
    ) -> Result<Vec<f64>, ModelError> {
        let mut guess = initial;
        let (mut value, mut derivative) = function.value_and_gradient(&guess);
        // Front of each deque is the most recent difference vector.
        let mut input_diffs: VecDeque<Vec<f64>> = VecDeque::new();
        let mut deriv_diffs: VecDeque<Vec<f64>> = VecDeque::new();
        let mut converged_once = false;
        let mut iteration = 0;
        while iteration < self.max_iterations {
            let mut direction =
                implicit_multiply(&input_diffs, &deriv_diffs, &derivative)?;
            for d in &mut direction {
                *d = -*d;
            }
            let multiplier = if iteration == 0 {
                self.initial_step_multiplier
            } else {
                self.step_multiplier
            };
            let searched =
                line_search(function, &guess, value, &derivative, &direction, multiplier);
            let Some(next_guess) = searched else {
                if input_diffs.is_empty() {
                    warn!("line search underflowed with no curvature history, stopping");
                    break;
                }
                debug!("line search underflowed, clearing history and retrying");
                input_diffs.clear();
                deriv_diffs.clear();
                continue;
            };
            let (next_value, next_derivative) = function.value_and_gradient(&next_guess);
            debug!(iteration, value = next_value, "minimizer step");
            if converged(value, next_value, tolerance) {
                if converged_once {
                    return Ok(next_guess);
                }
                // Converged under the kept curvature history; clear it and
                // require convergence once more from a fresh steepest-descent
                // step before accepting. The step just taken may be zero, so
                // it is not pushed as a curvature pair.
                input_diffs.clear();
                deriv_diffs.clear();
                converged_once = true;
            } else {
                converged_once = false;
                push_difference(&mut input_diffs, &next_guess, &guess, self.max_history);
                push_difference(
                    &mut deriv_diffs,
                    &next_derivative,
                    &derivative,
                    self.max_history,
                );
            }
            guess = next_guess;
            value = next_value;
            derivative = next_derivative;
            iteration += 1;
        }
        Ok(guess)
    }
}

fn converged(value: f64, next_value: f64, tolerance: f64) -> bool {
    if value == next_value {
        return true;
    }
    let change = (next_value - value).abs();
    let average = (next_value + value + EPS).abs() / 2.0;
    change / average < tolerance
}

fn push_difference(
    history: &mut VecDeque<Vec<f64>>,
    next: &[f64],
    prev: &[f64],
    max_history: usize,
) {
    let diff: Vec<f64> = next.iter().zip(prev).map(|(a, b)| a - b).collect();
    history.push_front(diff);
    if history.len() > max_history {
        history.pop_back();
    }
}

fn inner_product(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Two-loop recursion: multiplies the gradient by the implicit inverse
/// Hessian approximation. The initial diagonal is scaled by the most recent
/// curvature pair.
fn implicit_multiply(
    input_diffs: &VecDeque<Vec<f64>>,
    deriv_diffs: &VecDeque<Vec<f64>>,
    derivative: &[f64],
) -> Result<Vec<f64>, ModelError> {
    let history = input_diffs.len();
    let mut rho = vec![0.0; history];
    let mut alpha = vec![0.0; history];
    let mut right = derivative.to_vec();
    for i in (0..history).rev() {
        rho[i] = inner_product(&input_diffs[i], &deriv_diffs[i]);
        if rho[i] == 0.0 {
            return Err(ModelError::CurvatureDegeneracy);
        }
        alpha[i] = inner_product(&input_diffs[i], &right) / rho[i];
        for (r, d) in right.iter_mut().zip(&deriv_diffs[i]) {
            *r -= alpha[i] * d;
        }
    }
    let scale = if history >= 1 {
        let num = inner_product(&deriv_diffs[0], &input_diffs[0]);
        let den = inner_product(&deriv_diffs[0], &deriv_diffs[0]);
        num / den
    } else {
        1.0
    };
    let mut left: Vec<f64> = right.iter().map(|r| scale * r).collect();
    for i in 0..history {
        let beta = inner_product(&deriv_diffs[i], &left) / rho[i];
        for (l, d) in left.iter_mut().zip(&input_diffs[i]) {
            *l += (alpha[i] - beta) * d;
        }
    }
    Ok(left)
}

/// Backtracks from a unit step until the Armijo sufficient-decrease condition
/// holds. Returns None when the step size underflows before any acceptable
/// point is found.
fn line_search<F: DifferentiableFn>(
    function: &mut F,
    initial: &[f64],
    initial_value: f64,
    derivative: &[f64],
    direction: &[f64],
    multiplier: f64,
) -> Option<Vec<f64>> {
    let directional = inner_product(derivative, direction);
    let deriv_max = derivative.iter().fold(0.0f64, |m, d| m.max(d.abs()));
    let mut step = 1.0;
    loop {
        let guess: Vec<f64> = initial
            .iter()
            .zip(direction)
            .map(|(x, d)| x + step * d)
            .collect();
        let (guess_value, _) = function.value_and_gradient(&guess);
        let required = initial_value + SUFFICIENT_DECREASE * directional * step;
        if guess_value <= required {
            return Some(guess);
        }
        step *= multiplier;
        if step * deriv_max < EPS {
            warn!("line search step size underflow");
            return None;
        }
    }
}
