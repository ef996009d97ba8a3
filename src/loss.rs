use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::error::{Result,Error};


/// Loss minimized between the model curve and a bootstrap sample.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Loss {
    /// Mean squared error.
    Mse,
    /// Mean absolute deviation.
    Mad,
}

impl Default for Loss {
    fn default() -> Self {
	Self::Mse
    }
}

impl Loss {

    pub fn name(&self) -> &'static str {
	match self {
	    Self::Mse => "mse",
	    Self::Mad => "mad",
	}
    }

    /// Mean loss of `predicted` against `observed`. Slices are zipped, so
    /// extra elements in the longer one are ignored.
    pub fn eval(&self, observed: &[f64], predicted: &[f64]) -> f64 {
	let n = observed.len().min(predicted.len());
	let sum: f64 = observed.iter().zip(predicted).map(
	    |(o,p)| match self {
		Self::Mse => (o - p).powi(2),
		Self::Mad => (o - p).abs(),
	    }).sum();
	sum / n as f64
    }

    /// Parse a loss name, falling back to `Loss::Mse` when the name is not
    /// recognized. The fallback is logged.
    pub fn parse_or_default(name: &str) -> Self {
	match name.parse() {
	    Ok(loss) => loss,
	    Err(err) => {
		warn!("{}, falling back to {}", err, Self::default());
		Self::default()
	    }
	}
    }

}

impl FromStr for Loss {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
	match s.to_ascii_lowercase().as_str() {
	    "mse" => Ok(Self::Mse),
	    "mad" => Ok(Self::Mad),
	    _ => Err(Error::InvalidLossKind(s.to_string())),
	}
    }
}

impl fmt::Display for Loss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
	write!(f, "{}", self.name())
    }
}


#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn mse_and_mad() {
	let observed = [1.0, 2.0, 3.0];
	let predicted = [2.0, 2.0, 1.0];
	assert_eq!(Loss::Mse.eval(&observed, &predicted), 5.0 / 3.0);
	assert_eq!(Loss::Mad.eval(&observed, &predicted), 1.0);
    }

    #[test]
    fn parse_names() {
	assert_eq!("MSE".parse::<Loss>().ok(), Some(Loss::Mse));
	assert_eq!("mad".parse::<Loss>().ok(), Some(Loss::Mad));
	assert!(matches!("huber".parse::<Loss>(), Err(Error::InvalidLossKind(name)) if name == "huber"));
    }

    #[test]
    fn unknown_name_defaults_to_mse() {
	assert_eq!(Loss::parse_or_default("l1"), Loss::Mse);
	assert_eq!(Loss::parse_or_default("mad"), Loss::Mad);
    }

}
