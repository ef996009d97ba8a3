//! Forecast bands from a bootstrap parameter ensemble.
//!
//! Each band evaluates the logistic curve with the ensemble median of `x0`
//! and `r` and the band's own quantile of the asymptote `K`. Only `K` varies
//! between bands.

use chrono::naive::NaiveDate;
use chrono::Duration;
use serde::Serialize;

use crate::bootstrap::ParameterEnsemble;
use crate::error::{Result,Error};
use crate::model::sigmoid;


#[derive(Clone,Debug,PartialEq)]
pub struct Band {
    pub label: String,
    pub level: f64,
}

impl Band {
    pub fn new(label: &str, level: f64) -> Self {
	Band { label: label.to_string(), level }
    }
}

/// The 25%, median and 75% bands.
pub fn default_bands() -> Vec<Band> {
    vec![Band::new("25%", 0.25), Band::new("median", 0.5), Band::new("75%", 0.75)]
}


/// Parameters a band's trajectory was computed with.
#[derive(Clone,Debug,PartialEq,Serialize)]
pub struct BandParams {
    pub label: String,
    pub level: f64,
    pub x0: f64,
    #[serde(rename = "K")]
    pub k: f64,
    pub r: f64,
}


#[derive(Clone,Debug,PartialEq)]
pub struct ForecastRow {
    pub index: usize,
    pub date: NaiveDate,
    /// One value per band, in band order.
    pub values: Vec<f64>,
    pub median: f64,
    /// Growth rate of the median trajectory.
    pub derivative: f64,
    pub median_display: String,
    /// Last training date, for forecasts made on a truncated series.
    pub date_end_train: Option<NaiveDate>,
}


#[derive(Clone,Debug,PartialEq)]
pub struct ForecastBatch {
    pub bands: Vec<Band>,
    pub params: Vec<BandParams>,
    pub rows: Vec<ForecastRow>,
    pub draws: usize,
    pub converged: usize,
    /// Last training date, set on batches of a moving-window run.
    pub date_end_train: Option<NaiveDate>,
}

impl ForecastBatch {

    pub fn stamp(&mut self, date_end_train: NaiveDate) {
	self.date_end_train = Some(date_end_train);
	for row in self.rows.iter_mut() {
	    row.date_end_train = Some(date_end_train);
	}
    }

    pub fn date_end_train(&self) -> Option<NaiveDate> {
	self.date_end_train
    }

    /// Trajectory of the band with the given label.
    pub fn band(&self, label: &str) -> Option<Vec<f64>> {
	let pos = self.bands.iter().position(|b| b.label == label)?;
	Some(self.rows.iter().map(|row| row.values[pos]).collect())
    }

}


/// Future time indices `1..n_prediction`, counted from the first fitted day.
pub fn horizon(n_prediction: usize) -> Vec<usize> {
    (1..n_prediction).collect()
}


/// Quantile with linear interpolation between order statistics.
pub fn quantile(values: &[f64], q: f64) -> Result<f64> {

    if values.is_empty() {
	return Err(Error::EmptyEnsemble);
    }
    if !(0.0..=1.0).contains(&q) {
	return Err(Error::InvalidParameter(format!("quantile level {} outside [0, 1]", q)));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a,b| a.total_cmp(b));

    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    Ok(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))

}


pub fn predict(ensemble: &ParameterEnsemble, future: &[usize],
	       anchor: NaiveDate) -> Result<ForecastBatch> {
    predict_bands(ensemble, future, anchor, &default_bands())
}

/// Band trajectories at the `future` time indices. Index 1 falls on `anchor`.
pub fn predict_bands(ensemble: &ParameterEnsemble, future: &[usize],
		     anchor: NaiveDate, bands: &[Band]) -> Result<ForecastBatch> {

    if ensemble.is_empty() {
	return Err(Error::EmptyEnsemble);
    }

    let x0s = ensemble.values("x0")?;
    let ks = ensemble.values("K")?;
    let rs = ensemble.values("r")?;

    let x0 = quantile(&x0s, 0.5)?;
    let k_median = quantile(&ks, 0.5)?;
    let r = quantile(&rs, 0.5)?;

    let params = bands.iter().map(|band| Ok(BandParams {
	label: band.label.clone(),
	level: band.level,
	x0, r,
	k: quantile(&ks, band.level)?,
    })).collect::<Result<Vec<_>>>()?;

    let mut future = future.to_vec();
    future.sort_unstable();

    let rows = future.into_iter().map(|t| {
	let x = t as f64;
	let median = sigmoid(x, x0, k_median, r);
	ForecastRow {
	    index: t,
	    date: anchor + Duration::days(t as i64 - 1),
	    values: params.iter().map(|p| sigmoid(x, p.x0, p.k, p.r)).collect(),
	    median,
	    derivative: r * median * (1.0 - median / k_median),
	    median_display: thousands(median),
	    date_end_train: None,
	}
    }).collect();

    Ok(ForecastBatch {
	bands: bands.to_vec(),
	params,
	rows,
	draws: ensemble.len(),
	converged: ensemble.converged(),
	date_end_train: None,
    })

}


/// Round to an integer and group the digits by thousands: `12345.6` becomes
/// `"12,346"`.
pub fn thousands(value: f64) -> String {

    if !value.is_finite() {
	return format!("{}", value);
    }

    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
	out.push('-');
    }
    for (i,c) in digits.chars().enumerate() {
	if i > 0 && (digits.len() - i) % 3 == 0 {
	    out.push(',');
	}
	out.push(c);
    }
    out

}


#[cfg(test)]
mod tests {

    use super::*;
    use crate::bootstrap::Draw;
    use approx::assert_relative_eq;

    fn ensemble(params: &[[f64; 3]]) -> ParameterEnsemble {
	ParameterEnsemble::new(&["x0", "K", "r"], params.iter().map(|p| Draw {
	    params: p.to_vec(),
	    indices: vec![],
	    loss: 0.0,
	    iterations: 0,
	    evaluations: 0,
	    converged: true,
	}).collect())
    }

    fn anchor() -> NaiveDate {
	NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()
    }

    #[test]
    fn quantile_interpolates() {
	let values = [4.0, 1.0, 3.0, 2.0];
	assert_eq!(quantile(&values, 0.0).unwrap(), 1.0);
	assert_eq!(quantile(&values, 1.0).unwrap(), 4.0);
	assert_eq!(quantile(&values, 0.5).unwrap(), 2.5);
	assert_eq!(quantile(&values, 0.25).unwrap(), 1.75);
	assert_eq!(quantile(&[7.0], 0.75).unwrap(), 7.0);
    }

    #[test]
    fn quantile_of_nothing_fails() {
	assert!(matches!(quantile(&[], 0.5), Err(Error::EmptyEnsemble)));
	assert!(matches!(quantile(&[1.0], 1.5), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn empty_ensemble_rejected() {
	assert!(matches!(predict(&ensemble(&[]), &horizon(10), anchor()),
			 Err(Error::EmptyEnsemble)));
    }

    #[test]
    fn only_asymptote_varies_between_bands() {
	let ens = ensemble(&[[10.0, 100.0, 0.2], [12.0, 200.0, 0.3], [14.0, 300.0, 0.4]]);
	let batch = predict(&ens, &horizon(5), anchor()).unwrap();
	let ks: Vec<f64> = batch.params.iter().map(|p| p.k).collect();
	assert_eq!(ks, vec![150.0, 200.0, 250.0]);
	assert!(batch.params.iter().all(|p| p.x0 == 12.0 && p.r == 0.3));
    }

    #[test]
    fn bands_are_ordered() {
	let ens = ensemble(&[[20.0, 800.0, 0.2], [25.0, 1200.0, 0.25], [22.0, 1500.0, 0.3],
			     [30.0, 900.0, 0.15], [18.0, 2000.0, 0.22]]);
	let batch = predict(&ens, &horizon(90), anchor()).unwrap();
	for row in &batch.rows {
	    assert!(row.values[0] <= row.values[1] && row.values[1] <= row.values[2]);
	    assert_eq!(row.values[1], row.median);
	}
    }

    #[test]
    fn dates_start_at_anchor() {
	let batch = predict(&ensemble(&[[5.0, 50.0, 0.5]]), &[3, 1, 2], anchor()).unwrap();
	let dates: Vec<_> = batch.rows.iter().map(|r| r.date).collect();
	assert_eq!(dates, vec![anchor(), anchor().succ_opt().unwrap(),
			       NaiveDate::from_ymd_opt(2020, 3, 3).unwrap()]);
	assert_eq!(batch.rows.len(), 3);
    }

    #[test]
    fn derivative_is_logistic_slope() {
	let (x0, k, r) = (10.0, 1000.0, 0.3);
	let batch = predict(&ensemble(&[[x0, k, r]]), &[10], anchor()).unwrap();
	assert_relative_eq!(batch.rows[0].derivative, r * k / 4.0, max_relative = 1e-12);
    }

    #[test]
    fn stamp_survives_empty_horizon() {
	let mut batch = predict(&ensemble(&[[5.0, 50.0, 0.5]]), &horizon(1), anchor()).unwrap();
	assert!(batch.rows.is_empty());
	assert_eq!(batch.date_end_train(), None);
	batch.stamp(anchor());
	assert_eq!(batch.date_end_train(), Some(anchor()));
    }

    #[test]
    fn horizon_excludes_upper_bound() {
	assert_eq!(horizon(4), vec![1, 2, 3]);
	assert!(horizon(1).is_empty());
    }

    #[test]
    fn thousands_separators() {
	assert_eq!(thousands(0.4), "0");
	assert_eq!(thousands(999.5), "1,000");
	assert_eq!(thousands(1234567.0), "1,234,567");
	assert_eq!(thousands(-45678.2), "-45,678");
	assert_eq!(thousands(123.0), "123");
    }

}
