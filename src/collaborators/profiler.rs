use std::fmt::Write;

use crate::dataset::Dataset;
use crate::error::CollaboratorError;

/// Produces a human-readable profile of a data sample.
pub trait ReportGenerator {
    fn profile(&self, sample: &Dataset) -> Result<Vec<u8>, CollaboratorError>;
}

/// Per-column summary statistics rendered as a standalone HTML page.
#[derive(Debug, Clone)]
pub struct HtmlProfiler {
    title: String,
}

impl HtmlProfiler {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
        }
    }
}

impl ReportGenerator for HtmlProfiler {
    fn profile(&self, sample: &Dataset) -> Result<Vec<u8>, CollaboratorError> {
        let mut html = String::new();
        let fmt_err = |e: std::fmt::Error| CollaboratorError::Format(e.to_string());
        write!(
            html,
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head><body>\n\
             <h1>{title}</h1>\n<p>{rows} rows, {cols} columns</p>\n<table border=\"1\">\n\
             <tr><th>column</th><th>count</th><th>missing</th><th>mean</th><th>std</th><th>min</th><th>max</th></tr>\n",
            title = escape(&self.title),
            rows = sample.len(),
            cols = sample.columns().len()
        )
        .map_err(fmt_err)?;

        for name in sample.columns() {
            let values = sample.column(name).unwrap_or_default();
            let observed: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
            let missing = values.len() - observed.len();
            let row = if observed.is_empty() {
                format!("<td>0</td><td>{missing}</td><td></td><td></td><td></td><td></td>")
            } else {
                let (min, max) = stats::find_min_max(&observed);
                format!(
                    "<td>{}</td><td>{missing}</td><td>{:.6}</td><td>{:.6}</td><td>{:.6}</td><td>{:.6}</td>",
                    observed.len(),
                    stats::mean(&observed),
                    stats::std_dev(&observed),
                    min,
                    max
                )
            };
            writeln!(html, "<tr><td>{}</td>{row}</tr>", escape(name)).map_err(fmt_err)?;
        }
        html.push_str("</table>\n</body></html>\n");
        Ok(html.into_bytes())
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
