//! Cumulative selection yields and their table renderings.

use std::fmt::Write as _;
use std::sync::Arc;

use cf_core::{Error, NOMINAL, Result, Year};
use cf_select::Cut;
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::region::Region;
use crate::sample::{Discriminant, Sample, SampleQuery};

/// Name of the first, unselected row.
pub const TOTAL: &str = "Total";

/// One named selection applied on top of the previous ones.
#[derive(Debug, Clone, PartialEq)]
pub struct CutflowStep {
    /// Row label.
    pub name: String,
    /// Cut added at this step.
    pub cut: Cut,
}

impl CutflowStep {
    /// Step named `name` adding `cut`.
    pub fn new(name: impl Into<String>, cut: Cut) -> Self {
        Self { name: name.into(), cut }
    }
}

/// Steps of a category: everything, then the category cuts, the epoch
/// overlay of `year` and finally `region`.
pub fn category_steps(category: &Category, year: Year, region: Region) -> Result<Vec<CutflowStep>> {
    let overlay = category
        .year_cuts
        .get(&year)
        .ok_or_else(|| Error::UnknownEpoch { category: category.name.clone(), year })?;
    let mut steps = vec![
        CutflowStep::new(TOTAL, Cut::all()),
        CutflowStep::new(category.name.clone(), category.cuts.clone()),
        CutflowStep::new(format!("ID {year}"), overlay.clone()),
    ];
    if region != Region::All {
        steps.push(CutflowStep::new(region.as_str(), region.cut()));
    }
    Ok(steps)
}

/// Weighted yield with its statistical uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Yield {
    /// Sum of weights.
    pub value: f64,
    /// `sqrt(sum of squared weights)`.
    pub error: f64,
}

/// Yields column of one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutflowColumn {
    /// Plain-text header.
    pub name: String,
    /// LaTeX header.
    pub latex: String,
    /// Observed data (printed as integers).
    pub is_data: bool,
    /// One yield per step.
    pub yields: Vec<Yield>,
}

/// Cumulative yields of several samples through a list of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cutflow {
    /// Step labels, in application order.
    pub filters: Vec<String>,
    /// One column per sample.
    pub columns: Vec<CutflowColumn>,
}

impl Cutflow {
    /// Yields of every sample after each cumulative step.
    pub fn compute(samples: &[Arc<dyn Sample>], steps: &[CutflowStep]) -> Result<Self> {
        if steps.is_empty() {
            return Err(Error::Config("cutflow needs at least one step".into()));
        }
        let mut cumulative = Vec::with_capacity(steps.len());
        let mut cut = Cut::all();
        for step in steps {
            cut = cut.and(&step.cut);
            cumulative.push(cut.clone());
        }

        let mut columns = Vec::with_capacity(samples.len());
        for sample in samples {
            let mut yields = Vec::with_capacity(steps.len());
            for (step, cut) in steps.iter().zip(&cumulative) {
                let category = Category::new(step.name.clone(), cut.clone()).year_cut(sample.year(), Cut::all());
                let query = SampleQuery::new(&category, Region::All);
                let values = sample.values(Discriminant::Field("1"), &query, &[])?;
                let (value, sumw2) = values
                    .get(NOMINAL)
                    .map_or((0.0, 0.0), |s| (s.total_weight(), s.weights.iter().map(|w| w * w).sum()));
                yields.push(Yield { value, error: f64::sqrt(sumw2) });
            }
            log::debug!("cutflow '{}': {:?}", sample.name(), yields.iter().map(|y| y.value).collect::<Vec<_>>());
            let label = &sample.style().label;
            columns.push(CutflowColumn {
                name: sample.name().to_string(),
                latex: if label.is_empty() { sample.name().to_string() } else { label.clone() },
                is_data: sample.is_data(),
                yields,
            });
        }
        Ok(Self { filters: steps.iter().map(|s| s.name.clone()).collect(), columns })
    }

    /// Render according to `options`.
    pub fn render(&self, options: &RenderOptions) -> String {
        match options.format {
            TableFormat::Text => {
                let table = self.text_table(options);
                match &options.rst_class {
                    Some(class) => rst_wrap(&table, class),
                    None => table,
                }
            }
            TableFormat::Latex => self.latex_table(options),
        }
    }

    fn cell(&self, column: &CutflowColumn, y: Yield, options: &RenderOptions, latex: bool) -> String {
        let p = if column.is_data { 0 } else { options.precision };
        let value = format!("{:.p$}", y.value);
        if !options.errors {
            return value;
        }
        let error = format!("{:.p$}", y.error, p = options.precision);
        if latex { format!(r"${value}\pm{error}$") } else { format!("{value}({error})") }
    }

    fn text_table(&self, options: &RenderOptions) -> String {
        let mut rows: Vec<Vec<String>> = Vec::with_capacity(self.filters.len() + 1);
        rows.push(std::iter::once("Filter".to_string()).chain(self.columns.iter().map(|c| c.name.clone())).collect());
        for (i, filter) in self.filters.iter().enumerate() {
            let mut row = vec![filter.clone()];
            row.extend(self.columns.iter().map(|c| self.cell(c, c.yields[i], options, false)));
            rows.push(row);
        }

        let widths: Vec<usize> = (0..rows[0].len())
            .map(|j| rows.iter().map(|r| r[j].chars().count()).max().unwrap_or(0))
            .collect();
        let rule = |fill: char| {
            let mut line = String::from("+");
            for w in &widths {
                line.extend(std::iter::repeat_n(fill, w + 2));
                line.push('+');
            }
            line
        };

        let mut out = String::new();
        out.push_str(&rule('-'));
        out.push('\n');
        for (i, row) in rows.iter().enumerate() {
            out.push('|');
            for (cell, w) in row.iter().zip(&widths) {
                let _ = write!(out, " {cell:<w$} |");
            }
            out.push('\n');
            out.push_str(&rule(if i == 0 { '=' } else { '-' }));
            out.push('\n');
        }
        out
    }

    fn latex_table(&self, options: &RenderOptions) -> String {
        let mut out = String::new();
        let spec = vec!["c"; self.columns.len() + 1].join("|");
        out.push_str("\\begin{center}\n\\begin{scriptsize}\n");
        let _ = writeln!(out, "\\begin{{tabular}}{{{spec}}}");
        let header: Vec<&str> = std::iter::once("Filter").chain(self.columns.iter().map(|c| c.latex.as_str())).collect();
        let _ = writeln!(out, "{} \\\\", header.join(" & "));
        out.push_str("\\hline\\hline\n");
        for (i, filter) in self.filters.iter().enumerate() {
            let mut row = vec![filter.clone()];
            row.extend(self.columns.iter().map(|c| self.cell(c, c.yields[i], options, true)));
            let _ = writeln!(out, "{} \\\\", row.join(" & "));
        }
        out.push_str("\\end{tabular}\n\\end{scriptsize}\n\\end{center}\n");
        out
    }
}

/// Output format of [`Cutflow::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// ASCII grid.
    #[default]
    Text,
    /// LaTeX tabular.
    Latex,
}

impl std::str::FromStr for TableFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(TableFormat::Text),
            "latex" => Ok(TableFormat::Latex),
            other => Err(Error::Config(format!("unknown table format '{other}'"))),
        }
    }
}

/// Rendering options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Table flavor.
    pub format: TableFormat,
    /// Decimal places of simulated yields and of errors.
    pub precision: usize,
    /// Show statistical errors.
    pub errors: bool,
    /// Wrap a text table in a reStructuredText `table` directive with this class.
    pub rst_class: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { format: TableFormat::Text, precision: 2, errors: false, rst_class: None }
    }
}

fn rst_wrap(table: &str, class: &str) -> String {
    let mut out = format!(".. table::\n   :class: {class}\n\n");
    for line in table.lines() {
        let _ = writeln!(out, "   {line}");
    }
    out
}
