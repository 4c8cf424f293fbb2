//! Columnar event tables and the selection-evaluator seam.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cut::Cut;
use crate::error::{Result, SelectError};
use crate::expr::CompiledExpr;

/// Named `f64` columns of equal length, one row per event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Vec<f64>>", into = "BTreeMap<String, Vec<f64>>")]
pub struct EventTable {
    columns: BTreeMap<String, Vec<f64>>,
    n_events: usize,
}

impl EventTable {
    /// Empty table (no columns, no events).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a column map, checking that all columns have the same length.
    pub fn from_columns(columns: BTreeMap<String, Vec<f64>>) -> Result<Self> {
        let mut table = EventTable::new();
        for (name, values) in columns {
            table.insert_column(name, values)?;
        }
        Ok(table)
    }

    /// Builder-style [`EventTable::insert_column`].
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        self.insert_column(name, values)?;
        Ok(self)
    }

    /// Add or replace a column.
    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        let replacing_only = self.columns.len() == 1 && self.columns.contains_key(&name);
        if !self.columns.is_empty() && !replacing_only && values.len() != self.n_events {
            return Err(SelectError::ColumnLength {
                name,
                got: values.len(),
                expected: self.n_events,
            });
        }
        self.n_events = values.len();
        self.columns.insert(name, values);
        Ok(())
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.n_events
    }

    /// Whether the table holds no events.
    pub fn is_empty(&self) -> bool {
        self.n_events == 0
    }

    /// Column values by name.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    /// Column names in sorted order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    /// Evaluate a compiled expression for every event.
    pub fn eval(&self, expr: &CompiledExpr) -> Result<Vec<f64>> {
        let cols: Vec<&[f64]> = expr
            .columns
            .iter()
            .map(|name| self.column(name).ok_or_else(|| SelectError::MissingColumn(name.clone())))
            .collect::<Result<_>>()?;
        Ok(expr.eval_bulk(&cols, self.n_events))
    }

    /// Evaluate an expression string for every event.
    pub fn eval_str(&self, expr: &str) -> Result<Vec<f64>> {
        self.eval(&CompiledExpr::compile(expr)?)
    }

    /// Per-event pass/fail for `cut`.
    pub fn mask(&self, cut: &Cut) -> Result<Vec<bool>> {
        ExprEvaluator.mask(&cut.serialize(), self)
    }

    /// Rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> Result<EventTable> {
        if mask.len() != self.n_events {
            return Err(SelectError::ColumnLength {
                name: "<mask>".into(),
                got: mask.len(),
                expected: self.n_events,
            });
        }
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| {
                let kept = values.iter().zip(mask).filter(|(_, keep)| **keep).map(|(v, _)| *v);
                (name.clone(), kept.collect())
            })
            .collect();
        let n_events = mask.iter().filter(|m| **m).count();
        Ok(EventTable { columns, n_events })
    }

    /// Rows passing `cut`.
    pub fn select(&self, cut: &Cut) -> Result<EventTable> {
        if cut.is_all() {
            return Ok(self.clone());
        }
        self.filter(&self.mask(cut)?)
    }
}

impl TryFrom<BTreeMap<String, Vec<f64>>> for EventTable {
    type Error = SelectError;

    fn try_from(columns: BTreeMap<String, Vec<f64>>) -> Result<Self> {
        EventTable::from_columns(columns)
    }
}

impl From<EventTable> for BTreeMap<String, Vec<f64>> {
    fn from(t: EventTable) -> Self {
        t.columns
    }
}

/// Evaluates serialized selections against event tables.
///
/// The analysis layer only hands this trait selection strings; the grammar is
/// owned by the implementation.
pub trait SelectionEvaluator: Send + Sync {
    /// Per-event pass/fail mask for `selection`.
    fn mask(&self, selection: &str, events: &EventTable) -> Result<Vec<bool>>;

    /// Subset of `events` passing `selection`.
    fn select(&self, selection: &str, events: &EventTable) -> Result<EventTable> {
        events.filter(&self.mask(selection, events)?)
    }
}

/// Default evaluator backed by [`CompiledExpr`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExprEvaluator;

impl SelectionEvaluator for ExprEvaluator {
    fn mask(&self, selection: &str, events: &EventTable) -> Result<Vec<bool>> {
        let expr = CompiledExpr::compile(selection)?;
        Ok(events.eval(&expr)?.into_iter().map(|v| v > 0.0).collect())
    }
}
