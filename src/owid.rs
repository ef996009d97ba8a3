use std::{fs,io};
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use chrono::naive::NaiveDate;
use serde::Deserialize;
use tracing::{info,warn};

use crate::error::{Result,Error};
use crate::series::Series;


const FULL_DATA_URL: &str = "https://covid.ourworldindata.org/data/ecdc/full_data.csv";


#[derive(Deserialize,Debug,Clone,PartialEq)]
pub struct Record {
    pub date: NaiveDate,
    pub location: String,
    pub new_cases: Option<f64>,
    pub new_deaths: Option<f64>,
    #[serde(alias = "Total confirmed cases of COVID-19")]
    pub total_cases: Option<f64>,
    pub total_deaths: Option<f64>,
}


/// The full data set, downloaded at most every `max_age`.
pub fn full_data(cache_path: &Path, max_age: Duration) -> Result<Vec<Record>> {

    let cache_path = cache_path.join("owid");
    let cache_file = cache_path.join("full_data.csv");

    if cache_file.exists() && fs::metadata(&cache_file)?.modified()?.elapsed()? < max_age {
	if let Ok(records) = load(&cache_file) {
	    return Ok(records);
	}
    }

    let data = download_full_data()?;
    fs::create_dir_all(&cache_path)?;
    fs::write(&cache_file, &data)?;
    read_records(data.as_bytes())

}


pub fn load(path: &Path) -> Result<Vec<Record>> {
    read_records(io::BufReader::new(File::open(path)?))
}


pub fn read_records<R: io::Read>(reader: R) -> Result<Vec<Record>> {
    csv::Reader::from_reader(reader).into_deserialize()
	.map(|r| r.map_err(Error::from))
	.collect()
}


fn download_full_data() -> Result<String> {
    info!("Downloading full_data.csv...");
    let res = reqwest::blocking::get(FULL_DATA_URL)?;
    match res.status().as_u16() {
	200 => Ok(res.text()?),
	_ => Err(Error::HttpError(res.status())),
    }
}


/// Total confirmed cases of one location, by date. Days without a total are
/// skipped; of several rows for one day, the first is kept.
pub fn total_cases(records: &[Record], location: &str) -> Result<Series> {

    let mut series: Series = records.iter()
	.filter(|r| r.location == location)
	.filter_map(|r| r.total_cases.map(|v| (r.date, v)))
	.collect();

    if series.is_empty() {
	return Err(Error::MissingRegion(location.to_string()));
    }

    series.sort_by_key(|(date,_)| *date);
    let rows = series.len();
    series.dedup_by_key(|(date,_)| *date);
    if series.len() < rows {
	warn!("{}: dropped {} rows with a duplicate date", location, rows - series.len());
    }
    Ok(series)

}


/// Observed counts of one location for plotting: total cases, new cases and
/// total deaths.
pub fn observed(records: &[Record], location: &str) -> Vec<(NaiveDate,(f64,f64,f64))> {
    let mut rows: Vec<_> = records.iter()
	.filter(|r| r.location == location)
	.map(|r| (r.date, (r.total_cases.unwrap_or(f64::NAN),
			   r.new_cases.unwrap_or(f64::NAN),
			   r.total_deaths.unwrap_or(f64::NAN))))
	.collect();
    rows.sort_by_key(|(date,_)| *date);
    rows
}
