//! Growth curves fitted to cumulative case counts.

/// Logistic curve with inflection point `x0`, asymptote `k` and steepness `r`.
///
/// Overflow in `exp` is left to IEEE semantics: far below the inflection
/// point the denominator becomes infinite and the curve evaluates to zero.
pub fn sigmoid(x: f64, x0: f64, k: f64, r: f64) -> f64 {
    k / (1.0 + (-r * (x - x0)).exp())
}

/// Two-regime growth: an exponential phase with rate `r1` blended (weight `y`)
/// into a logistic phase with rate `r2` before the switch time `t1`, and the
/// pure logistic phase afterwards. Both regimes meet at `t1`.
pub fn two_mode_growth(x: f64, x0: f64, k: f64, r1: f64, r2: f64, y: f64, t1: f64) -> f64 {
    let logistic = sigmoid(x, x0, k, r2);
    match x < t1 {
	false => logistic,
	true => {
	    let early = sigmoid(t1, x0, k, r2) * (r1 * (x - t1)).exp();
	    y * early + (1.0 - y) * logistic
	}
    }
}


/// A parametric curve the bootstrap fitter can optimize.
pub trait GrowthModel: Sync {
    fn name(&self) -> &'static str;
    fn params(&self) -> &'static [&'static str];
    /// Starting point for the optimizer, from the time indices and values
    /// being fitted.
    fn initial_guess(&self, t: &[f64], y: &[f64]) -> Vec<f64>;
    fn eval(&self, x: f64, params: &[f64]) -> f64;
}


#[derive(Clone,Copy,Debug,Default)]
pub struct Logistic;

impl GrowthModel for Logistic {

    fn name(&self) -> &'static str {
	"logistic"
    }

    fn params(&self) -> &'static [&'static str] {
	&["x0", "K", "r"]
    }

    fn initial_guess(&self, t: &[f64], y: &[f64]) -> Vec<f64> {
	vec![max(t) / 2.0, max(y) / 2.0, 0.1]
    }

    fn eval(&self, x: f64, p: &[f64]) -> f64 {
	sigmoid(x, p[0], p[1], p[2])
    }

}


/// Not used by the default pipeline; available to callers of
/// `bootstrap::Bootstrap::fit_model`.
#[derive(Clone,Copy,Debug,Default)]
pub struct TwoMode;

impl GrowthModel for TwoMode {

    fn name(&self) -> &'static str {
	"two-mode"
    }

    fn params(&self) -> &'static [&'static str] {
	&["x0", "K", "r1", "r2", "y", "t1"]
    }

    fn initial_guess(&self, t: &[f64], y: &[f64]) -> Vec<f64> {
	let tmax = max(t);
	vec![tmax / 2.0, max(y) / 2.0, 0.2, 0.1, 0.5, tmax / 4.0]
    }

    fn eval(&self, x: f64, p: &[f64]) -> f64 {
	two_mode_growth(x, p[0], p[1], p[2], p[3], p[4], p[5])
    }

}


fn max(values: &[f64]) -> f64 {
    values.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
}


#[cfg(test)]
mod tests {

    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sigmoid_midpoint_is_half_asymptote() {
	assert_eq!(sigmoid(12.5, 12.5, 3000.0, 0.2), 1500.0);
	assert_eq!(sigmoid(-4.0, -4.0, 1.0, 7.0), 0.5);
    }

    #[test]
    fn sigmoid_monotonic_and_bounded() {
	let (x0, k, r) = (30.0, 5000.0, 0.25);
	let values: Vec<f64> = (0..60).map(|x| sigmoid(x as f64, x0, k, r)).collect();
	assert!(values.windows(2).all(|w| w[0] < w[1]));
	assert!(values.iter().all(|v| *v > 0.0 && *v < k));
    }

    #[test]
    fn sigmoid_survives_exp_overflow() {
	assert_eq!(sigmoid(-1e6, 0.0, 100.0, 1.0), 0.0);
	assert_eq!(sigmoid(1e6, 0.0, 100.0, 1.0), 100.0);
    }

    #[test]
    fn negative_rate_inverts_direction() {
	assert!(sigmoid(0.0, 5.0, 10.0, -1.0) > sigmoid(10.0, 5.0, 10.0, -1.0));
    }

    #[test]
    fn two_mode_is_continuous_at_switch() {
	let (x0, k, r1, r2, y, t1) = (40.0, 1e4, 0.3, 0.15, 0.7, 20.0);
	let before = two_mode_growth(t1 - 1e-9, x0, k, r1, r2, y, t1);
	let after = two_mode_growth(t1, x0, k, r1, r2, y, t1);
	assert_relative_eq!(before, after, max_relative = 1e-6);
	assert_eq!(after, sigmoid(t1, x0, k, r2));
    }

    #[test]
    fn two_mode_without_blend_is_logistic() {
	for x in 0..30 {
	    let x = x as f64;
	    assert_eq!(two_mode_growth(x, 15.0, 100.0, 0.5, 0.2, 0.0, 25.0),
		       sigmoid(x, 15.0, 100.0, 0.2));
	}
    }

    #[test]
    fn logistic_initial_guess() {
	let t = [1.0, 2.0, 3.0, 4.0];
	let y = [15.0, 20.0, 28.0, 40.0];
	assert_eq!(Logistic.initial_guess(&t, &y), vec![2.0, 20.0, 0.1]);
	assert_eq!(Logistic.eval(2.0, &[2.0, 20.0, 0.1]), 10.0);
    }

}
