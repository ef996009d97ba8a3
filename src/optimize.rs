//! Derivative-free local minimization.


/// Outcome of a local minimization.
#[derive(Clone,Debug,PartialEq)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub evaluations: usize,
    /// Tolerances were met before the iteration cap and the result improves
    /// on the initial guess.
    pub converged: bool,
}


pub trait Minimizer: Sync {
    fn minimize(&self, objective: &dyn Fn(&[f64]) -> f64, initial: &[f64]) -> Minimum;
}


/// Nelder-Mead simplex search with the standard coefficients
/// (reflection 1, expansion 2, contraction 0.5, shrink 0.5).
#[derive(Clone,Debug)]
pub struct NelderMead {
    /// Iteration cap per run; `None` means `200 * n` for `n` parameters.
    pub max_iter: Option<usize>,
    /// Absolute tolerance on the simplex vertex spread.
    pub xatol: f64,
    /// Absolute tolerance on the objective spread over the simplex.
    pub fatol: f64,
    /// Additional runs started from the previous optimum with a fresh simplex.
    pub restarts: usize,
}

impl Default for NelderMead {
    fn default() -> Self {
	NelderMead {
	    max_iter: None,
	    xatol: 1e-4,
	    fatol: 1e-4,
	    restarts: 0,
	}
    }
}

const RHO: f64 = 1.0;
const CHI: f64 = 2.0;
const PSI: f64 = 0.5;
const SIGMA: f64 = 0.5;
const NONZERO_DELTA: f64 = 0.05;
const ZERO_DELTA: f64 = 0.00025;


impl NelderMead {

    fn run(&self, f: &dyn Fn(&[f64]) -> f64, start: &[f64], evaluations: &mut usize) -> (Vec<f64>, f64, usize, bool) {

	let n = start.len();
	let max_iter = self.max_iter.unwrap_or(200 * n);
	let mut eval = |x: &[f64]| { *evaluations += 1; f(x) };

	let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
	simplex.push((start.to_vec(), eval(start)));
	for k in 0..n {
	    let mut vertex = start.to_vec();
	    vertex[k] = match vertex[k] == 0.0 {
		true => ZERO_DELTA,
		false => vertex[k] * (1.0 + NONZERO_DELTA),
	    };
	    let value = eval(&vertex);
	    simplex.push((vertex, value));
	}
	sort_simplex(&mut simplex);

	let mut iterations = 0;
	let mut within_tolerance = false;

	while iterations < max_iter {

	    let (best, fbest) = &simplex[0];
	    let xspread = simplex[1..].iter().flat_map(
		|(v,_)| v.iter().zip(best).map(|(a,b)| (a - b).abs())
	    ).fold(0.0, f64::max);
	    let fspread = simplex[1..].iter().map(|(_,fv)| (fv - fbest).abs())
		.fold(0.0, f64::max);
	    if xspread <= self.xatol && fspread <= self.fatol {
		within_tolerance = true;
		break;
	    }

	    let centroid: Vec<f64> = (0..n).map(
		|i| simplex[..n].iter().map(|(v,_)| v[i]).sum::<f64>() / n as f64
	    ).collect();
	    let worst = simplex[n].0.clone();
	    let fworst = simplex[n].1;
	    let fsecond = simplex[n - 1].1;
	    let fbest = simplex[0].1;

	    let xr = affine(&centroid, &worst, RHO);
	    let fxr = eval(&xr);
	    let mut shrink = false;

	    if fxr < fbest {
		let xe = affine(&centroid, &worst, RHO * CHI);
		let fxe = eval(&xe);
		simplex[n] = match fxe < fxr {
		    true => (xe, fxe),
		    false => (xr, fxr),
		};
	    } else if fxr < fsecond {
		simplex[n] = (xr, fxr);
	    } else if fxr < fworst {
		let xc = affine(&centroid, &worst, PSI * RHO);
		let fxc = eval(&xc);
		match fxc <= fxr {
		    true => simplex[n] = (xc, fxc),
		    false => shrink = true,
		}
	    } else {
		let xcc = affine(&centroid, &worst, -PSI);
		let fxcc = eval(&xcc);
		match fxcc < fworst {
		    true => simplex[n] = (xcc, fxcc),
		    false => shrink = true,
		}
	    }

	    if shrink {
		let best = simplex[0].0.clone();
		for (vertex,value) in simplex[1..].iter_mut() {
		    for (x,b) in vertex.iter_mut().zip(&best) {
			*x = b + SIGMA * (*x - b);
		    }
		    *value = eval(vertex.as_slice());
		}
	    }

	    sort_simplex(&mut simplex);
	    iterations += 1;

	}

	let (point, value) = simplex.swap_remove(0);
	(point, value, iterations, within_tolerance)

    }

}

impl Minimizer for NelderMead {

    fn minimize(&self, objective: &dyn Fn(&[f64]) -> f64, initial: &[f64]) -> Minimum {

	let f = |x: &[f64]| match objective(x) {
	    v if v.is_nan() => f64::INFINITY,
	    v => v,
	};

	let mut evaluations = 0;
	let initial_value = f(initial);
	let (mut point, mut value, mut iterations, mut within_tolerance)
	    = self.run(&f, initial, &mut evaluations);

	for _ in 0..self.restarts {
	    let (p, v, i, t) = self.run(&f, &point, &mut evaluations);
	    iterations += i;
	    within_tolerance = t;
	    if v <= value {
		point = p;
		value = v;
	    }
	}

	let improved = value < initial_value || value == 0.0;
	Minimum {
	    converged: within_tolerance && improved && value.is_finite(),
	    point, value, iterations, evaluations,
	}

    }

}


/// `centroid + coef * (centroid - worst)`
fn affine(centroid: &[f64], worst: &[f64], coef: f64) -> Vec<f64> {
    centroid.iter().zip(worst).map(|(c,w)| c + coef * (c - w)).collect()
}

fn sort_simplex(simplex: &mut Vec<(Vec<f64>, f64)>) {
    simplex.sort_by(|a,b| a.1.total_cmp(&b.1));
}


#[cfg(test)]
mod tests {

    use super::*;
    use approx::assert_abs_diff_eq;

    fn rosenbrock(x: &[f64]) -> f64 {
	(1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0].powi(2)).powi(2)
    }

    #[test]
    fn finds_quadratic_minimum() {
	let nm = NelderMead::default();
	let res = nm.minimize(&|x: &[f64]| (x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2), &[0.0, 0.0]);
	assert!(res.converged);
	assert_abs_diff_eq!(res.point[0], 3.0, epsilon = 1e-3);
	assert_abs_diff_eq!(res.point[1], -1.0, epsilon = 1e-3);
    }

    #[test]
    fn finds_rosenbrock_minimum() {
	let nm = NelderMead { max_iter: Some(5000), xatol: 1e-8, fatol: 1e-10, restarts: 1 };
	let res = nm.minimize(&rosenbrock, &[-1.2, 1.0]);
	assert!(res.converged);
	assert_abs_diff_eq!(res.point[0], 1.0, epsilon = 1e-4);
	assert_abs_diff_eq!(res.point[1], 1.0, epsilon = 1e-4);
    }

    #[test]
    fn iteration_cap_reports_non_convergence() {
	let nm = NelderMead { max_iter: Some(3), ..Default::default() };
	let res = nm.minimize(&rosenbrock, &[-1.2, 1.0]);
	assert!(!res.converged);
	assert_eq!(res.iterations, 3);
    }

    #[test]
    fn nan_objective_is_not_converged() {
	let res = NelderMead::default().minimize(&|_: &[f64]| f64::NAN, &[1.0]);
	assert!(!res.converged);
	assert_eq!(res.value, f64::INFINITY);
    }

}
