//! Bootstrap sigmoid forecasts of cumulative COVID-19 case counts.
//!
//! A logistic curve is fitted to resampled copies of a region's cumulative
//! cases ([`bootstrap`]), quantiles of the fitted asymptote give forecast
//! bands ([`predict`]), and the whole procedure is repeated over growing
//! training windows ([`moving`]) to show how the forecast evolved.

pub mod error;
pub mod model;
pub mod loss;
pub mod optimize;
pub mod series;
pub mod bootstrap;
pub mod predict;
pub mod moving;
pub mod archive;
pub mod owid;
pub mod graph;

pub use archive::ForecastArchive;
pub use bootstrap::{Bootstrap,Convergence,ParameterEnsemble,Weighting};
pub use error::{Result,Error};
pub use loss::Loss;
pub use moving::{Forecaster,Mode,compute_moving_predictions,compute_predictions};
pub use predict::{ForecastBatch,predict};
pub use series::{ObservedSeries,Series};
