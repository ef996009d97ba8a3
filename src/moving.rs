//! Forecasts recomputed over growing training windows.
//!
//! Each training cutoff gets a full bootstrap fit on the observations
//! available up to that day, so the archive shows what would have been
//! predicted at the time.

use rayon::prelude::*;
use tracing::{info,warn};

use crate::archive::ForecastArchive;
use crate::bootstrap::{Bootstrap,draw_seed};
use crate::error::{Result,Error};
use crate::optimize::{Minimizer,NelderMead};
use crate::predict::{ForecastBatch,horizon,predict};
use crate::series::{ObservedSeries,Series,DEFAULT_MIN_COUNT};


/// Training window lengths: `min_data`, then every `step` observations, and
/// finally the whole series.
pub fn cutoffs(len: usize, min_data: usize, step: usize) -> Result<Vec<usize>> {

    if step == 0 {
	return Err(Error::InvalidParameter("window step must be at least 1".to_string()));
    }
    if min_data == 0 {
	return Err(Error::InvalidParameter("minimum window must be at least 1".to_string()));
    }
    if len < min_data {
	return Err(Error::InsufficientData { required: min_data, available: len });
    }

    let iterations = (len - min_data + step - 1) / step + 1;
    Ok((0..iterations).map(|i| (min_data + i * step).min(len)).collect())

}


/// Fit on the whole series and forecast `1..n_prediction` days from its
/// first date.
pub fn compute_predictions<M: Minimizer>(location: &str, series: &ObservedSeries, n_prediction: usize,
					 bootstrap: &Bootstrap<M>) -> Result<ForecastArchive> {
    let batch = window_forecast(series, n_prediction, bootstrap)?;
    let mut archive = ForecastArchive::new();
    archive.push(location, batch);
    Ok(archive)
}


/// One forecast batch per training cutoff, each stamped with its last
/// training date. Windows that fail are recorded in the archive's failures.
pub fn compute_moving_predictions<M: Minimizer + Clone>(location: &str, series: &ObservedSeries,
							n_prediction: usize, step: usize, min_data: usize,
							bootstrap: &Bootstrap<M>) -> Result<ForecastArchive> {

    let cuts = cutoffs(series.len(), min_data, step)?;
    info!("{}: {} training windows from {} to {} observations",
	  location, cuts.len(), min_data, series.len());

    let results: Vec<(usize, Result<ForecastBatch>)> = cuts.par_iter().map(|cutoff| {
	let result = series.prefix(*cutoff).and_then(|window| {
	    let bootstrap = bootstrap.with_seed(draw_seed(bootstrap.seed, *cutoff as u64));
	    let mut batch = window_forecast(&window, n_prediction, &bootstrap)?;
	    batch.stamp(window.last_date());
	    Ok(batch)
	});
	(*cutoff, result)
    }).collect();

    let mut archive = ForecastArchive::new();
    let observations = series.observations();
    for (cutoff,result) in results {
	match result {
	    Ok(batch) => archive.push(location, batch),
	    Err(err) => {
		let end = observations[cutoff - 1].date;
		warn!("{}: window ending {} failed: {}", location, end, err);
		archive.fail(location, Some(end), err);
	    }
	}
    }

    Ok(archive)

}


fn window_forecast<M: Minimizer>(series: &ObservedSeries, n_prediction: usize,
				 bootstrap: &Bootstrap<M>) -> Result<ForecastBatch> {
    let ensemble = bootstrap.fit(series)?;
    predict(&ensemble, &horizon(n_prediction), series.first_date())
}


#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Mode {
    /// A single fit on all observations.
    Single,
    /// Fits on growing training windows.
    Moving { step: usize, min_data: usize },
}


/// Forecasts for many regions, isolating failures per region.
#[derive(Clone,Debug)]
pub struct Forecaster<M = NelderMead> {
    pub bootstrap: Bootstrap<M>,
    pub n_prediction: usize,
    pub min_count: f64,
    pub mode: Mode,
}

impl<M: Minimizer + Clone> Forecaster<M> {

    pub fn new(bootstrap: Bootstrap<M>, n_prediction: usize, mode: Mode) -> Self {
	Forecaster { bootstrap, n_prediction, mode, min_count: DEFAULT_MIN_COUNT }
    }

    pub fn forecast(&self, location: &str, series: &Series) -> Result<ForecastArchive> {
	let observed = ObservedSeries::new(series, self.min_count)?;
	match self.mode {
	    Mode::Single => compute_predictions(location, &observed, self.n_prediction, &self.bootstrap),
	    Mode::Moving { step, min_data } => compute_moving_predictions(
		location, &observed, self.n_prediction, step, min_data, &self.bootstrap),
	}
    }

    /// Every region gets its own seed derived from the base seed and its
    /// position, so adding regions at the end leaves earlier ones unchanged.
    pub fn forecast_regions(&self, regions: &[(String,Series)]) -> ForecastArchive {

	let mut archive = ForecastArchive::new();

	for (i,(location,series)) in regions.iter().enumerate() {
	    let forecaster = Forecaster {
		bootstrap: self.bootstrap.with_seed(draw_seed(self.bootstrap.seed, i as u64)),
		..self.clone()
	    };
	    match forecaster.forecast(location, series) {
		Ok(result) => {
		    info!("{}: {} forecast batches", location, result.batches().len());
		    archive.extend(result);
		},
		Err(err) => {
		    warn!("{}: forecast failed: {}", location, err);
		    archive.fail(location, None, err);
		}
	    }
	}

	archive

    }

}


#[cfg(test)]
mod tests {

    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(10, 4, 3, vec![4, 7, 10])]
    #[case(11, 4, 3, vec![4, 7, 10, 11])]
    #[case(5, 5, 2, vec![5])]
    #[case(6, 1, 10, vec![1, 6])]
    fn window_cutoffs(#[case] len: usize, #[case] min_data: usize, #[case] step: usize,
		      #[case] expected: Vec<usize>) {
	assert_eq!(cutoffs(len, min_data, step).unwrap(), expected);
    }

    #[test]
    fn cutoff_count_formula() {
	for len in 3..40 {
	    for min_data in 1..=len {
		for step in 1..8 {
		    let cuts = cutoffs(len, min_data, step).unwrap();
		    let expected = ((len - min_data) as f64 / step as f64).ceil() as usize + 1;
		    assert_eq!(cuts.len(), expected);
		    assert_eq!(*cuts.last().unwrap(), len);
		}
	    }
	}
    }

    #[test]
    fn invalid_windows() {
	assert!(matches!(cutoffs(3, 5, 1), Err(Error::InsufficientData { required: 5, available: 3 })));
	assert!(matches!(cutoffs(3, 1, 0), Err(Error::InvalidParameter(_))));
	assert!(matches!(cutoffs(3, 0, 1), Err(Error::InvalidParameter(_))));
    }

}
