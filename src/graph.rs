use std::{io,fs};
use std::fs::File;
use std::io::Write;
use std::path::{Path,PathBuf};

use chrono::naive::NaiveDate;
use serde_json::{Value,json};
use unidecode::unidecode;

use crate::error::Result;
use crate::predict::ForecastBatch;


pub type Observed = Vec<(NaiveDate,(f64,f64,f64))>;


/// File name stem for a location: ascii, lowercase, dashes.
pub fn slug(location: &str) -> String {
    unidecode(location).to_lowercase().split(|c: char| !c.is_ascii_alphanumeric())
	.filter(|s| !s.is_empty()).collect::<Vec<_>>().join("-")
}


/// Observed totals and forecast bands of one location. With several
/// batches, a slider selects the training cutoff.
pub fn forecast_graph(graph_path: &Path, location: &str, observed: &Observed,
		      batches: &[&ForecastBatch]) -> Result<PathBuf> {

    let graph_path = graph_path.join("forecast");
    let filename = format!("{}.html", slug(location));
    let title = format!("COVID-19 cases and sigmoid forecast: {}", location);
    let last = batches.len().saturating_sub(1);

    let forecast: Vec<Value> = batches.iter().enumerate().flat_map(
	|(cutoff,batch)| {
	    let low = batch.bands.iter().position(|b| b.level <= 0.25).unwrap_or(0);
	    let high = batch.bands.iter().rposition(|b| b.level >= 0.75).unwrap_or(0);
	    batch.rows.iter().filter(|row| row.median.is_finite()).map(move |row| json!({
		"Date": format!("{}", row.date.format("%Y-%m-%d")),
		"Cutoff": cutoff,
		"Trained": row.date_end_train.map(|d| format!("{}", d.format("%Y-%m-%d"))),
		"Low": row.values.get(low),
		"High": row.values.get(high),
		"Median": row.median,
		"Display": row.median_display,
		"Derivative": row.derivative,
	    }))
	}).collect();

    let mut cutoff = json!({"name": "cutoff", "value": last});
    if last > 0 {
	cutoff["bind"] = json!({"input": "range", "min": 0, "max": last, "step": 1,
				"name": "Training window "});
    }

    let daily: Vec<Value> = observed.iter().filter(|(_,(total,_,_))| total.is_finite()).map(
	|(date,(total,new,deaths))| json!({
	    "Date": format!("{}", date.format("%Y-%m-%d")),
	    "Total": total,
	    "New": if new.is_finite() { Some(new) } else { None },
	    "Deaths": if deaths.is_finite() { Some(deaths) } else { None },
	})).collect();

    // Forecast bands and observed totals share the left axis.
    let cases = json!({
	"layer": [
	    {
		"data": {"values": forecast},
		"transform": [{"filter": "datum.Cutoff == cutoff"}],
		"layer": [
		    {
			"mark": {"type": "area", "opacity": 0.15, "color": "#1f77b4"},
			"encoding": {
			    "y": {"field": "Low", "type": "quantitative"},
			    "y2": {"field": "High"}
			}
		    },
		    {
			"mark": {"type": "line", "strokeDash": [4, 2], "color": "#1f77b4"},
			"encoding": {
			    "y": {"field": "Median", "type": "quantitative"}
			}
		    },
		    {
			"mark": {"type": "point", "opacity": 0, "tooltip": true},
			"encoding": {
			    "y": {"field": "Median", "type": "quantitative"},
			    "tooltip": [
				{"field": "Date", "type": "temporal"},
				{"field": "Display", "title": "Median forecast"},
				{"field": "Derivative", "type": "quantitative",
				 "title": "New cases per day", "format": ".0f"},
				{"field": "Trained", "type": "temporal", "title": "Trained until"}
			    ]
			}
		    }
		]
	    },
	    {
		"data": {"values": daily},
		"mark": {"type": "line", "point": true, "color": "#1f77b4"},
		"encoding": {
		    "y": {"field": "Total", "type": "quantitative",
			  "title": "Total number of cases"},
		    "tooltip": [
			{"field": "Date", "type": "temporal"},
			{"field": "Total", "type": "quantitative", "format": ",.0f"},
			{"field": "New", "type": "quantitative", "format": ",.0f"},
			{"field": "Deaths", "type": "quantitative", "format": ",.0f"}
		    ]
		}
	    }
	]
    });

    page(&graph_path, &filename, &title, &json!({
	"$schema": "https://vega.github.io/schema/vega-lite/v5.json",
	"height": "container",
	"width": "container",
	"title": title,
	"params": [cutoff],
	"encoding": {
	    "x": {"field": "Date", "type": "temporal", "title": "Date"}
	},
	"layer": [
	    cases,
	    {
		"data": {"values": daily},
		"layer": [
		    {
			"mark": {"type": "bar", "opacity": 0.5, "color": "#ff7f0e"},
			"encoding": {
			    "y": {"field": "New", "type": "quantitative",
				  "title": "New cases and total deaths", "axis": {"orient": "right"}}
			}
		    },
		    {
			"mark": {"type": "line", "point": true, "color": "#d62728"},
			"encoding": {
			    "y": {"field": "Deaths", "type": "quantitative"}
			}
		    }
		]
	    }
	],
	"resolve": {"scale": {"y": "independent"}}
    }))?;

    Ok(graph_path.join(filename))

}


/// Total cases of all locations on one chart; clicking the legend
/// highlights a location.
pub fn cases_graph(graph_path: &Path, data: &[(String,Observed)]) -> Result<PathBuf> {

    let title = "Number of total confirmed COVID-19 cases by country";

    page(graph_path, "cases.html", title, &json!({
	"$schema": "https://vega.github.io/schema/vega-lite/v5.json",
	"height": "container",
	"width": "container",
	"title": title,
	"data": {
	    "values": data.iter().flat_map(
		|(region,rows)| rows.iter().filter_map(
		    move |(date,(total,_,_))| match total.is_finite() && *total > 0.0 {
			false => None,
			true => Some(json!({
			    "Date": format!("{}", date.format("%Y-%m-%d")),
			    "Region": region,
			    "Value": total
			}))
		    })
	    ).collect::<Vec<_>>()
	},
	"params": [
	    {"name": "Highlight", "select": {"type": "point", "fields": ["Region"]}, "bind": "legend"},
	    {"name": "Grid", "select": "interval", "bind": "scales"}
	],
	"mark": "line",
	"encoding": {
	    "color": {"field": "Region", "type": "nominal"},
	    "x": {"field": "Date", "type": "temporal", "title": "Date"},
	    "y": {"field": "Value", "type": "quantitative", "title": "Count",
		  "scale": {"type": "log"}},
	    "opacity": {"value": 0.1, "condition": {"param": "Highlight", "value": 1}},
	    "tooltip": [
		{"field": "Region", "type": "nominal"},
		{"field": "Date", "type": "temporal"},
		{"field": "Value", "type": "quantitative", "format": ",.0f"}
	    ]
	}
    }))?;

    Ok(graph_path.join("cases.html"))

}


fn page(graph_path: &Path, path: &str, title: &str, spec: &Value) -> Result<()> {

    fs::create_dir_all(graph_path)?;
    let mut out = io::BufWriter::new(File::create(graph_path.join(path))?);

    write!(out, "<!DOCTYPE html><html><head>")?;
    write!(out, "<meta charset=\"UTF-8\">")?;
    write!(out, "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">")?;
    write!(out, "<title>{}</title>", title)?;
    write!(out, "<script src=\"https://cdn.jsdelivr.net/npm/vega@5\"></script>")?;
    write!(out, "<script src=\"https://cdn.jsdelivr.net/npm/vega-lite@5\"></script>")?;
    write!(out, "<script src=\"https://cdn.jsdelivr.net/npm/vega-embed\"></script>")?;
    write!(out, "</head>")?;
    write!(out, "<body>")?;
    write!(out, "<div id=\"vis\" style=\"overflow: hidden; position: absolute;top: 0; left: 0; right: 0; bottom: 0;\"></div>")?;
    write!(out, "<script type=\"text/javascript\">")?;
    write!(out, "var spec = ")?;
    serde_json::to_writer_pretty(out.by_ref(), spec)?;
    write!(out, ";vegaEmbed('#vis', spec,{{}}).then(function(result) {{")?;
    write!(out, "}}).catch(console.error);")?;
    write!(out, "</script>")?;
    write!(out, "</body></html>")?;
    out.flush()?;

    Ok(())

}
