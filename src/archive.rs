use std::io;
use std::fs::File;
use std::path::Path;

use chrono::naive::NaiveDate;
use serde::Serialize;

use crate::error::{Result,Error};
use crate::predict::{BandParams,ForecastBatch};


/// A region or training window that could not be forecast.
#[derive(Debug)]
pub struct Failure {
    pub location: String,
    pub date_end_train: Option<NaiveDate>,
    pub error: Error,
}


/// Forecast batches of all regions, tagged with their location.
#[derive(Debug,Default)]
pub struct ForecastArchive {
    batches: Vec<(String,ForecastBatch)>,
    failures: Vec<Failure>,
}

#[derive(Serialize)]
struct ParamsRecord<'a> {
    location: &'a str,
    date_end_train: Option<String>,
    draws: usize,
    converged: usize,
    bands: &'a [BandParams],
}


impl ForecastArchive {

    pub fn new() -> Self {
	Self::default()
    }

    pub fn push(&mut self, location: &str, batch: ForecastBatch) {
	self.batches.push((location.to_string(), batch));
    }

    pub fn fail(&mut self, location: &str, date_end_train: Option<NaiveDate>, error: Error) {
	self.failures.push(Failure { location: location.to_string(), date_end_train, error });
    }

    pub fn extend(&mut self, other: ForecastArchive) {
	self.batches.extend(other.batches);
	self.failures.extend(other.failures);
    }

    pub fn batches(&self) -> &[(String,ForecastBatch)] {
	&self.batches
    }

    pub fn failures(&self) -> &[Failure] {
	&self.failures
    }

    pub fn is_empty(&self) -> bool {
	self.batches.is_empty()
    }

    pub fn rows(&self) -> usize {
	self.batches.iter().map(|(_,b)| b.rows.len()).sum()
    }

    pub fn locations(&self) -> Vec<&str> {
	let mut locations: Vec<&str> = self.batches.iter().map(|(l,_)| l.as_str()).collect();
	locations.dedup();
	locations
    }

    /// Batches of one location, in archive order.
    pub fn location<'a>(&'a self, location: &'a str) -> impl Iterator<Item = &'a ForecastBatch> + 'a {
	self.batches.iter().filter(move |(l,_)| l == location).map(|(_,b)| b)
    }

    /// Group by location, then training cutoff. Rows within a batch are
    /// already ordered by date.
    pub fn sort(&mut self) {
	self.batches.sort_by(|(la,a),(lb,b)| la.cmp(lb).then(a.date_end_train().cmp(&b.date_end_train())));
    }

    fn moving(&self) -> bool {
	self.batches.iter().any(|(_,b)| b.date_end_train().is_some())
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {

	let labels: Vec<&str> = match self.batches.first() {
	    None => vec![],
	    Some((_,batch)) => batch.bands.iter().map(|b| b.label.as_str()).collect()
	};
	if let Some((location,_)) = self.batches.iter().find(
	    |(_,b)| b.bands.iter().map(|b| b.label.as_str()).ne(labels.iter().cloned())
	) {
	    return Err(Error::InvalidParameter(format!("bands of {} differ from the archive's", location)));
	}

	let moving = self.moving();
	let mut out = csv::Writer::from_writer(writer);

	let mut header = vec!["date", "date_str"];
	header.extend(labels.iter());
	header.extend(&["derivative", "median_display"]);
	if moving {
	    header.push("date_end_train");
	}
	header.push("location");
	out.write_record(&header)?;

	for (location,batch) in &self.batches {
	    for row in &batch.rows {
		let mut record = vec![
		    format!("{}", row.date.format("%Y-%m-%d")),
		    format!("{}", row.date.format("%d/%m/%Y")),
		];
		record.extend(row.values.iter().map(|v| v.to_string()));
		record.push(row.derivative.to_string());
		record.push(row.median_display.clone());
		if moving {
		    record.push(batch.date_end_train().map_or(String::new(), |d| format!("{}", d.format("%Y-%m-%d"))));
		}
		record.push(location.clone());
		out.write_record(&record)?;
	    }
	}

	out.flush()?;
	Ok(())

    }

    pub fn save_csv(&self, path: &Path) -> Result<()> {
	self.write_csv(io::BufWriter::new(File::create(path)?))
    }

    /// Band parameters and convergence counts of every batch.
    pub fn save_params(&self, path: &Path) -> Result<()> {
	let records: Vec<ParamsRecord> = self.batches.iter().map(|(location,batch)| ParamsRecord {
	    location,
	    date_end_train: batch.date_end_train().map(|d| format!("{}", d.format("%Y-%m-%d"))),
	    draws: batch.draws,
	    converged: batch.converged,
	    bands: &batch.params,
	}).collect();
	serde_json::to_writer_pretty(io::BufWriter::new(File::create(path)?), &records)?;
	Ok(())
    }

}
