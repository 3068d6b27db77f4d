// ============================================================
// Layer 4 — CSV Series Loader
// ============================================================
// Reads a multivariate time series from a CSV file:
//
//   timestamp,load,temperature,humidity
//   2024-01-01T00:00,31.2,4.5,0.81
//   2024-01-01T01:00,29.8,4.1,0.83
//   ...
//
// The first row must be a header. Only the columns that are
// selected (features + target) have to be numeric; any other
// column (timestamps, ids) is ignored.
//
// Rows are kept in file order; file order IS time order.
//
// Reference: csv crate documentation
//            Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use std::{io::Read, path::Path};

/// A column-selected, row-major numeric time series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesFrame {
    /// Names of the selected columns, in `rows` column order.
    pub columns: Vec<String>,

    /// One Vec per time step, `columns.len()` values each.
    pub rows: Vec<Vec<f32>>,
}

impl SeriesFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Loads the feature and target columns of a CSV file.
pub struct CsvSeriesLoader {
    features: Vec<String>,
    target:   String,
}

impl CsvSeriesLoader {
    /// `features` may be empty: every numeric-looking column except
    /// the target is then used, in header order.
    pub fn new(features: Vec<String>, target: impl Into<String>) -> Self {
        Self { features, target: target.into() }
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<SeriesFrame> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Cannot open series file '{}'", path.display()))?;
        self.load_from_reader(file)
            .with_context(|| format!("Cannot parse series file '{}'", path.display()))
    }

    /// Parse from any reader.
    pub fn load_from_reader<R: Read>(&self, reader: R) -> Result<SeriesFrame> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let records: Vec<csv::StringRecord> = csv_reader
            .records()
            .collect::<std::result::Result<_, _>>()?;

        if records.is_empty() {
            bail!("series contains a header but no rows");
        }

        // ── Resolve which columns to keep ────────────────────────────────────
        // Feature columns first, target last. When no features are given,
        // pick every column whose first value parses as a number.
        let feature_names: Vec<String> = if self.features.is_empty() {
            headers
                .iter()
                .enumerate()
                .filter(|(i, name)| {
                    *name != &self.target
                        && records[0].get(*i).map_or(false, |v| v.parse::<f32>().is_ok())
                })
                .map(|(_, name)| name.clone())
                .collect()
        } else {
            self.features.clone()
        };

        let mut columns = feature_names;
        if !columns.contains(&self.target) {
            columns.push(self.target.clone());
        }

        let indices: Vec<usize> = columns
            .iter()
            .map(|name| {
                headers
                    .iter()
                    .position(|h| h == name)
                    .with_context(|| format!("Column '{name}' not found in header {headers:?}"))
            })
            .collect::<Result<_>>()?;

        // ── Parse every selected cell ────────────────────────────────────────
        let mut rows = Vec::with_capacity(records.len());
        for (line, record) in records.iter().enumerate() {
            let row = indices
                .iter()
                .zip(&columns)
                .map(|(&i, name)| {
                    let raw = record.get(i).unwrap_or("");
                    raw.parse::<f32>().with_context(|| {
                        // +2: one for the header, one for 1-based line numbers
                        format!("Row {}: column '{}' value '{}' is not numeric", line + 2, name, raw)
                    })
                })
                .collect::<Result<Vec<f32>>>()?;
            rows.push(row);
        }

        tracing::debug!("Loaded {} rows x {} columns", rows.len(), columns.len());
        Ok(SeriesFrame { columns, rows })
    }
}
