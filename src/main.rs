use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{info,warn,error};
use tracing_subscriber::{layer::SubscriberExt,util::SubscriberInitExt};

use sigmoid_forecast::{owid,graph};
use sigmoid_forecast::bootstrap::{Bootstrap,Convergence,Weighting};
use sigmoid_forecast::error::{Result,Error};
use sigmoid_forecast::loss::Loss;
use sigmoid_forecast::moving::{Forecaster,Mode};
use sigmoid_forecast::optimize::NelderMead;
use sigmoid_forecast::series::Series;


const COUNTRIES: &[&str] = &[
    "France", "Italy", "South Korea", "China", "Japan", "Spain", "United Kingdom",
    "Germany", "Denmark", "Sweden", "Norway", "Netherlands", "Australia", "Austria"
];


/// Fit bootstrap sigmoid curves to cumulative COVID-19 cases and forecast
/// them with uncertainty bands.
#[derive(Parser,Debug)]
#[command(version, about)]
struct Args {
    /// Countries to forecast, comma separated [default: 14 countries]
    #[arg(long, value_delimiter = ',')]
    regions: Vec<String>,
    /// Read the OWID full_data.csv from this file instead of downloading it
    #[arg(long)]
    data: Option<PathBuf>,
    #[arg(long, default_value = "cache")]
    cache: PathBuf,
    /// Minutes before the cached download is refreshed
    #[arg(long, default_value_t = 30)]
    cache_minutes: u64,
    #[arg(long, default_value = "graphs")]
    graphs: PathBuf,
    /// Forecast archive (CSV)
    #[arg(long, default_value = "forecasts.csv")]
    output: PathBuf,
    /// Band parameters per forecast (JSON)
    #[arg(long, default_value = "parameters.json")]
    params: PathBuf,
    /// Days before the total reaches this count are ignored
    #[arg(long, default_value_t = 15.0)]
    min_count: f64,
    #[arg(long, default_value_t = 50)]
    bootstrap: usize,
    /// Forecast horizon in days from the first fitted day
    #[arg(long, default_value_t = 90)]
    prediction: usize,
    /// Loss to minimize: mse or mad; anything else falls back to mse
    #[arg(long, default_value = "mse")]
    loss: String,
    /// Resample uniformly instead of favouring recent days
    #[arg(long)]
    uniform: bool,
    /// Recompute the forecast over growing training windows
    #[arg(long)]
    moving: bool,
    /// Observations added per training window
    #[arg(long, default_value_t = 7)]
    step: usize,
    /// Observations in the first training window
    #[arg(long, default_value_t = 15)]
    min_data: usize,
    /// Seed for the bootstrap draws [default: random, logged]
    #[arg(long)]
    seed: Option<u64>,
    /// Optimizer iteration cap per fit [default: 200 per parameter]
    #[arg(long)]
    max_iter: Option<usize>,
    /// Drop bootstrap fits that did not converge
    #[arg(long)]
    discard_unconverged: bool,
}


fn main() -> Result<()> {

    tracing_subscriber::registry()
	.with(tracing_subscriber::fmt::layer())
	.with(tracing_subscriber::EnvFilter::try_from_default_env()
	      .unwrap_or_else(|_| "info".into()))
	.init();

    let args = Args::parse();

    let records = match &args.data {
	Some(path) => owid::load(path)?,
	None => owid::full_data(&args.cache, Duration::from_secs(args.cache_minutes * 60))?,
    };

    let names: Vec<String> = match args.regions.is_empty() {
	true => COUNTRIES.iter().map(|c| c.to_string()).collect(),
	false => args.regions.clone(),
    };

    let regions: Vec<(String,Series)> = names.iter().filter_map(
	|name| match owid::total_cases(&records, name) {
	    Ok(series) => Some((name.clone(), series)),
	    Err(err) => { warn!("Skipping {}: {}", name, err); None }
	}).collect();

    let seed = args.seed.unwrap_or_else(rand::random);
    info!("Forecasting {} regions with seed {}", regions.len(), seed);

    let bootstrap = Bootstrap {
	loss: Loss::parse_or_default(&args.loss),
	weighting: Weighting::linear(!args.uniform),
	convergence: match args.discard_unconverged {
	    true => Convergence::DiscardUnconverged,
	    false => Convergence::KeepAll,
	},
	minimizer: NelderMead { max_iter: args.max_iter, ..Default::default() },
	..Bootstrap::new(args.bootstrap, seed)
    };
    let mode = match args.moving {
	true => Mode::Moving { step: args.step, min_data: args.min_data },
	false => Mode::Single,
    };
    let forecaster = Forecaster {
	min_count: args.min_count,
	..Forecaster::new(bootstrap, args.prediction, mode)
    };

    let mut archive = forecaster.forecast_regions(&regions);
    archive.sort();

    for failure in archive.failures() {
	match failure.date_end_train {
	    Some(date) => warn!("{} (trained until {}): {}", failure.location, date, failure.error),
	    None => warn!("{}: {}", failure.location, failure.error),
	}
    }

    if archive.is_empty() {
	return Err(Error::MissingData);
    }

    archive.save_csv(&args.output)?;
    archive.save_params(&args.params)?;
    info!("Wrote {} forecast rows to {}", archive.rows(), args.output.display());

    let observed: Vec<(String,graph::Observed)> = regions.iter().map(
	|(name,_)| (name.clone(), owid::observed(&records, name))
    ).collect();

    if let Err(err) = graph::cases_graph(&args.graphs, &observed) {
	error!("cases graph: {}", err);
    }

    for (name,rows) in &observed {
	let batches: Vec<_> = archive.location(name).collect();
	if batches.is_empty() {
	    continue;
	}
	match graph::forecast_graph(&args.graphs, name, rows, &batches) {
	    Ok(path) => info!("Wrote {}", path.display()),
	    Err(err) => error!("{} forecast graph: {}", name, err),
	}
    }

    Ok(())

}
