//! Bootstrap estimation of growth model parameters.
//!
//! Every draw resamples the observed series with replacement and refits the
//! model to the sample. The fitted parameters of all draws form the
//! empirical distribution the forecast bands are read from.

use std::collections::BTreeMap;

use rand::distributions::{Distribution,Uniform,WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng,SeedableRng};
use rayon::prelude::*;
use tracing::{debug,warn};

use crate::error::{Result,Error};
use crate::loss::Loss;
use crate::model::{GrowthModel,Logistic};
use crate::optimize::{Minimizer,NelderMead};
use crate::series::ObservedSeries;


/// Distribution the bootstrap indices are drawn from.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Weighting {
    /// Every observation equally likely.
    Uniform,
    /// Probability proportional to the 1-based rank, oversampling the most
    /// recent observations.
    Linear,
}

impl Default for Weighting {
    fn default() -> Self {
	Self::Linear
    }
}

impl Weighting {

    pub fn linear(enabled: bool) -> Self {
	match enabled {
	    true => Self::Linear,
	    false => Self::Uniform,
	}
    }

    /// Sampling probability of each of `n` observations.
    pub fn probabilities(&self, n: usize) -> Vec<f64> {
	match self {
	    Self::Uniform => vec![1.0 / n as f64; n],
	    Self::Linear => {
		let total = (n * (n + 1)) as f64 / 2.0;
		(1..=n).map(|rank| rank as f64 / total).collect()
	    }
	}
    }

    fn sampler(&self, n: usize) -> Result<Sampler> {
	match self {
	    Self::Uniform => Ok(Sampler::Uniform(Uniform::new(0, n))),
	    Self::Linear => WeightedIndex::new(self.probabilities(n))
		.map(Sampler::Weighted)
		.map_err(|err| Error::InvalidParameter(format!("sampling weights: {}", err)))
	}
    }

}


enum Sampler {
    Uniform(Uniform<usize>),
    Weighted(WeightedIndex<f64>),
}

impl Sampler {
    fn sample<R: Rng>(&self, rng: &mut R) -> usize {
	match self {
	    Self::Uniform(dist) => dist.sample(rng),
	    Self::Weighted(dist) => dist.sample(rng),
	}
    }
}


/// What to do with draws whose optimization did not converge.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Convergence {
    /// Keep every draw; the per-draw flag is still recorded.
    KeepAll,
    /// Drop unconverged draws, failing when none are left.
    DiscardUnconverged,
}

impl Default for Convergence {
    fn default() -> Self {
	Self::KeepAll
    }
}


/// One bootstrap draw and its fit.
#[derive(Clone,Debug,PartialEq)]
pub struct Draw {
    pub params: Vec<f64>,
    /// Positions in the observed series making up the sample.
    pub indices: Vec<usize>,
    pub loss: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
}


#[derive(Clone,Debug,PartialEq)]
pub struct ParameterEnsemble {
    names: &'static [&'static str],
    draws: Vec<Draw>,
}

impl ParameterEnsemble {

    pub fn new(names: &'static [&'static str], draws: Vec<Draw>) -> Self {
	ParameterEnsemble { names, draws }
    }

    pub fn names(&self) -> &'static [&'static str] {
	self.names
    }

    pub fn draws(&self) -> &[Draw] {
	&self.draws
    }

    pub fn len(&self) -> usize {
	self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
	self.draws.is_empty()
    }

    pub fn converged(&self) -> usize {
	self.draws.iter().filter(|d| d.converged).count()
    }

    /// Fitted values of one parameter, one per draw.
    pub fn values(&self, name: &'static str) -> Result<Vec<f64>> {
	let pos = self.names.iter().position(|n| *n == name)
	    .ok_or(Error::MissingParameter(name))?;
	Ok(self.draws.iter().map(|d| d.params[pos]).collect())
    }

    pub fn to_map(&self) -> BTreeMap<&'static str,Vec<f64>> {
	self.names.iter().enumerate().map(
	    |(i,name)| (*name, self.draws.iter().map(|d| d.params[i]).collect())
	).collect()
    }

    pub fn bootstrap_indices(&self) -> Vec<&[usize]> {
	self.draws.iter().map(|d| d.indices.as_slice()).collect()
    }

}


/// Bootstrap fitting configuration.
#[derive(Clone,Debug)]
pub struct Bootstrap<M = NelderMead> {
    pub samples: usize,
    pub loss: Loss,
    pub weighting: Weighting,
    pub convergence: Convergence,
    /// Base seed; draw `k` uses a generator seeded from `(seed, k)`.
    pub seed: u64,
    pub minimizer: M,
}

impl Bootstrap<NelderMead> {
    pub fn new(samples: usize, seed: u64) -> Self {
	Bootstrap {
	    samples, seed,
	    loss: Loss::default(),
	    weighting: Weighting::default(),
	    convergence: Convergence::default(),
	    minimizer: NelderMead::default(),
	}
    }
}

impl<M: Minimizer> Bootstrap<M> {

    pub fn with_minimizer<N: Minimizer>(self, minimizer: N) -> Bootstrap<N> {
	Bootstrap {
	    samples: self.samples,
	    loss: self.loss,
	    weighting: self.weighting,
	    convergence: self.convergence,
	    seed: self.seed,
	    minimizer,
	}
    }

    pub fn with_seed(&self, seed: u64) -> Self where M: Clone {
	Bootstrap { seed, ..self.clone() }
    }

    /// Fit the logistic curve.
    pub fn fit(&self, series: &ObservedSeries) -> Result<ParameterEnsemble> {
	self.fit_model(&Logistic, series)
    }

    pub fn fit_model(&self, model: &dyn GrowthModel, series: &ObservedSeries) -> Result<ParameterEnsemble> {

	if series.is_empty() {
	    return Err(Error::InsufficientData { required: 1, available: 0 });
	}
	if self.samples == 0 {
	    return Err(Error::InvalidParameter("bootstrap count must be at least 1".to_string()));
	}

	let t = series.times();
	let y = series.values();
	let initial = model.initial_guess(&t, &y);
	let sampler = self.weighting.sampler(series.len())?;

	let draws: Vec<Draw> = (0..self.samples).into_par_iter().map(
	    |k| self.draw(model, &t, &y, &initial, &sampler, k)
	).collect();

	let total = draws.len();
	let unconverged = draws.iter().filter(|d| !d.converged).count();
	let evaluations: usize = draws.iter().map(|d| d.evaluations).sum();
	debug!("{} fit: {} draws over {} observations, {} unconverged, {} objective evaluations",
	       model.name(), total, series.len(), unconverged, evaluations);

	let draws = match self.convergence {
	    Convergence::KeepAll => {
		if unconverged > 0 {
		    warn!("{} of {} bootstrap fits did not converge", unconverged, total);
		}
		draws
	    },
	    Convergence::DiscardUnconverged => {
		let kept: Vec<Draw> = draws.into_iter().filter(|d| d.converged).collect();
		if kept.is_empty() {
		    return Err(Error::NonConvergence { total });
		}
		kept
	    }
	};

	Ok(ParameterEnsemble::new(model.params(), draws))

    }

    fn draw(&self, model: &dyn GrowthModel, t: &[f64], y: &[f64], initial: &[f64],
	    sampler: &Sampler, k: usize) -> Draw {

	let mut rng = StdRng::seed_from_u64(draw_seed(self.seed, k as u64));
	let indices: Vec<usize> = (0..y.len()).map(|_| sampler.sample(&mut rng)).collect();
	let t_sample: Vec<f64> = indices.iter().map(|i| t[*i]).collect();
	let y_sample: Vec<f64> = indices.iter().map(|i| y[*i]).collect();

	let objective = |p: &[f64]| {
	    let predicted: Vec<f64> = t_sample.iter().map(|x| model.eval(*x, p)).collect();
	    self.loss.eval(&y_sample, &predicted)
	};
	let min = self.minimizer.minimize(&objective, initial);

	Draw {
	    params: min.point,
	    indices,
	    loss: min.value,
	    iterations: min.iterations,
	    evaluations: min.evaluations,
	    converged: min.converged,
	}

    }

}


/// Fit the logistic curve to `n_bootstrap` resamples of `series`.
pub fn fit(series: &ObservedSeries, n_bootstrap: usize, loss: Loss,
	   weighting: Weighting, seed: u64) -> Result<ParameterEnsemble> {
    Bootstrap { loss, weighting, ..Bootstrap::new(n_bootstrap, seed) }.fit(series)
}


/// Seed of draw `k` under `seed`. Nesting is order dependent: the seed of
/// draw `k` of stream `i` differs from draw `i` of stream `k`.
pub fn draw_seed(seed: u64, k: u64) -> u64 {
    splitmix(splitmix(seed).wrapping_add(k))
}

/// One SplitMix64 step, a bijection on `u64`.
fn splitmix(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}


#[cfg(test)]
mod tests {

    use super::*;
    use std::collections::HashSet;
    use approx::assert_relative_eq;
    use chrono::naive::NaiveDate;
    use rstest::rstest;

    fn observed(values: &[f64]) -> ObservedSeries {
	let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
	let series = values.iter().enumerate()
	    .map(|(i,v)| (start + chrono::Duration::days(i as i64), *v))
	    .collect();
	ObservedSeries::new(&series, 0.0).unwrap()
    }

    #[test]
    fn uniform_probabilities_are_equal() {
	let p = Weighting::Uniform.probabilities(8);
	assert!(p.iter().all(|v| *v == 1.0 / 8.0));
    }

    #[test]
    fn linear_probabilities_increase_with_rank() {
	let p = Weighting::Linear.probabilities(10);
	assert!(p.windows(2).all(|w| w[0] < w[1]));
	assert!(p[0] > 0.0);
	assert_relative_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
	assert_eq!(Weighting::Linear.probabilities(1), vec![1.0]);
    }

    #[rstest]
    #[case(1, Weighting::Uniform)]
    #[case(7, Weighting::Linear)]
    #[case(20, Weighting::Uniform)]
    fn ensemble_size_matches_draw_count(#[case] n: usize, #[case] weighting: Weighting) {
	let series = observed(&[15.0, 20.0, 28.0, 40.0, 55.0, 75.0, 100.0]);
	let ensemble = fit(&series, n, Loss::Mse, weighting, 42).unwrap();
	assert_eq!(ensemble.len(), n);
	for (_,values) in ensemble.to_map() {
	    assert_eq!(values.len(), n);
	}
	for indices in ensemble.bootstrap_indices() {
	    assert_eq!(indices.len(), series.len());
	    assert!(indices.iter().all(|i| *i < series.len()));
	}
    }

    #[test]
    fn same_seed_same_ensemble() {
	let series = observed(&[15.0, 22.0, 30.0, 45.0, 61.0, 90.0]);
	let a = fit(&series, 12, Loss::Mad, Weighting::Linear, 7).unwrap();
	let b = fit(&series, 12, Loss::Mad, Weighting::Linear, 7).unwrap();
	let c = fit(&series, 12, Loss::Mad, Weighting::Linear, 8).unwrap();
	assert_eq!(a, b);
	assert_ne!(a.bootstrap_indices(), c.bootstrap_indices());
    }

    #[test]
    fn weighted_sampler_favours_recent_ranks() {
	let sampler = Weighting::Linear.sampler(10).unwrap();
	let mut rng = StdRng::seed_from_u64(99);
	let mut counts = [0usize; 10];
	for _ in 0..20_000 {
	    counts[sampler.sample(&mut rng)] += 1;
	}
	// expected 20000 * 1/55 and 20000 * 10/55
	assert!(counts[0] > 200 && counts[0] < 550, "first rank drawn {} times", counts[0]);
	assert!(counts[9] > 3200 && counts[9] < 4100, "last rank drawn {} times", counts[9]);
	assert!(counts[9] > 5 * counts[0]);
    }

    #[test]
    fn nested_draw_seeds_never_collide() {
	let mut seen = HashSet::new();
	for region in 0..6 {
	    let region_seed = draw_seed(42, region);
	    for cutoff in 10..40 {
		let window_seed = draw_seed(region_seed, cutoff);
		for k in 0..50 {
		    assert!(seen.insert(draw_seed(window_seed, k)));
		}
	    }
	    for k in 0..50 {
		assert!(seen.insert(draw_seed(region_seed, k)));
	    }
	}
	assert_ne!(draw_seed(draw_seed(7, 20), 20), 7);
	assert_ne!(draw_seed(draw_seed(7, 0), 1), draw_seed(draw_seed(7, 1), 0));
    }

    #[test]
    fn regions_do_not_share_resamples() {
	let series = observed(&(1..=12).map(|t| 10.0 * t as f64).collect::<Vec<_>>());
	let region0 = Bootstrap::new(3, draw_seed(42, 0)).fit(&series).unwrap();
	let region1 = Bootstrap::new(3, draw_seed(42, 1)).fit(&series).unwrap();
	assert_ne!(region0.bootstrap_indices()[1], region1.bootstrap_indices()[0]);
	assert_ne!(region0.bootstrap_indices()[0], region1.bootstrap_indices()[1]);
    }

    #[test]
    fn zero_draws_rejected() {
	let series = observed(&[15.0, 20.0]);
	assert!(matches!(fit(&series, 0, Loss::Mse, Weighting::Uniform, 1),
			 Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn missing_parameter_name() {
	let ensemble = ParameterEnsemble::new(&["x0", "K", "r"], vec![]);
	assert!(matches!(ensemble.values("r1"), Err(Error::MissingParameter("r1"))));
	assert_eq!(ensemble.values("K").unwrap(), Vec::<f64>::new());
    }

    #[test]
    fn discarding_without_convergence_fails() {
	let series = observed(&[15.0, 20.0, 28.0, 40.0]);
	let mut bootstrap = Bootstrap::new(4, 3)
	    .with_minimizer(NelderMead { max_iter: Some(1), ..Default::default() });
	bootstrap.convergence = Convergence::DiscardUnconverged;
	assert!(matches!(bootstrap.fit(&series), Err(Error::NonConvergence { total: 4 })));
	bootstrap.convergence = Convergence::KeepAll;
	let ensemble = bootstrap.fit(&series).unwrap();
	assert_eq!(ensemble.len(), 4);
	assert_eq!(ensemble.converged(), 0);
    }

}
