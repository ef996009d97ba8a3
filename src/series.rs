use chrono::naive::NaiveDate;

use crate::error::{Result,Error};


/// Dated values, as read from the data source.
pub type Series = Vec<(NaiveDate,f64)>;

pub const DEFAULT_MIN_COUNT: f64 = 15.0;


#[derive(Clone,Copy,Debug,PartialEq)]
pub struct Observation {
    /// 1-based rank within the filtered series.
    pub index: usize,
    pub date: NaiveDate,
    pub value: f64,
}


/// Cumulative counts of one region from the first day the count reaches the
/// minimum threshold. Never empty.
#[derive(Clone,Debug,PartialEq)]
pub struct ObservedSeries {
    obs: Vec<Observation>,
}

impl ObservedSeries {

    /// Keep the rows with a count of at least `min_count` and rank them.
    /// Fails if no rows remain or the dates are not strictly increasing.
    pub fn new(series: &Series, min_count: f64) -> Result<Self> {

	for pair in series.windows(2) {
	    if pair[1].0 <= pair[0].0 {
		return Err(Error::UnorderedDates(pair[0].0, pair[1].0));
	    }
	}

	let obs: Vec<Observation> = series.iter()
	    .filter(|(_,value)| *value >= min_count)
	    .enumerate()
	    .map(|(i,(date,value))| Observation { index: i + 1, date: *date, value: *value })
	    .collect();

	match obs.is_empty() {
	    true => Err(Error::InsufficientData { required: 1, available: 0 }),
	    false => Ok(ObservedSeries { obs })
	}

    }

    pub fn len(&self) -> usize {
	self.obs.len()
    }

    pub fn is_empty(&self) -> bool {
	self.obs.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
	&self.obs
    }

    pub fn times(&self) -> Vec<f64> {
	self.obs.iter().map(|o| o.index as f64).collect()
    }

    pub fn values(&self) -> Vec<f64> {
	self.obs.iter().map(|o| o.value).collect()
    }

    pub fn first_date(&self) -> NaiveDate {
	self.obs[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
	self.obs[self.obs.len() - 1].date
    }

    /// The first `len` observations. The indices are kept, as the prefix of
    /// a ranked series is itself ranked from 1.
    pub fn prefix(&self, len: usize) -> Result<Self> {
	match len {
	    0 => Err(Error::InsufficientData { required: 1, available: 0 }),
	    n if n > self.obs.len() => Err(Error::InsufficientData {
		required: n, available: self.obs.len()
	    }),
	    n => Ok(ObservedSeries { obs: self.obs[..n].to_vec() })
	}
    }

}
