//! Per-factor holding table.
//!
//! A [`HoldingTable`] stores, for every asset of the current period and every
//! factor, the holding weight attributed to that factor. Each factor column
//! is a self-financing sub-portfolio: its weights plus its implied cash sum
//! to one.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use std::collections::HashMap;
use thiserror::Error;

/// A factor column whose renormalization divisor is zero.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("factor '{factor}' renormalizes by zero")]
pub struct DegenerateFactor {
    /// Name of the factor.
    pub factor: String,
}

/// Attributed holding weight per asset and factor.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingTable {
    codes: Vec<i64>,
    factor_names: Vec<String>,
    values: Array2<f64>,
}

impl HoldingTable {
    /// A table with no assets.
    pub fn empty<S: AsRef<str>>(factor_names: &[S]) -> Self {
        Self::zeros(Vec::new(), factor_names)
    }

    /// A zero-filled table over `codes`.
    pub fn zeros<S: AsRef<str>>(codes: Vec<i64>, factor_names: &[S]) -> Self {
        let values = Array2::zeros((codes.len(), factor_names.len()));
        Self {
            codes,
            factor_names: factor_names.iter().map(|f| f.as_ref().to_string()).collect(),
            values,
        }
    }

    /// Create a table from an `assets x factors` matrix.
    ///
    /// # Panics
    ///
    /// Panics if the matrix shape does not match the codes and factor names.
    pub fn new(codes: Vec<i64>, factor_names: Vec<String>, values: Array2<f64>) -> Self {
        assert_eq!(
            values.dim(),
            (codes.len(), factor_names.len()),
            "holding table shape must be assets x factors"
        );
        Self {
            codes,
            factor_names,
            values,
        }
    }

    /// Asset codes in row order.
    pub fn codes(&self) -> &[i64] {
        &self.codes
    }

    /// Factor names in column order.
    pub fn factor_names(&self) -> &[String] {
        &self.factor_names
    }

    /// The `assets x factors` matrix.
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Consume the table and return its matrix.
    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    /// Number of assets.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether no position has been established yet.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Attributed weights of one asset.
    pub fn row(&self, code: i64) -> Option<ArrayView1<'_, f64>> {
        self.codes
            .iter()
            .position(|&c| c == code)
            .map(|idx| self.values.row(idx))
    }

    /// Sum of each factor column.
    pub fn column_sums(&self) -> Array1<f64> {
        self.values.sum_axis(Axis(0))
    }

    /// Cash implied by each factor column: `1 - column sum`.
    pub fn implied_cash(&self) -> Array1<f64> {
        self.column_sums().mapv(|s| 1.0 - s)
    }

    /// Re-index onto a new asset universe.
    ///
    /// Assets present in both keep their rows, new assets get zero rows, and
    /// assets that left are dropped. Disjoint universes give an all-zero table.
    pub fn reindex(&self, codes: &[i64]) -> Self {
        let mut table = Self::zeros(codes.to_vec(), &self.factor_names);
        if self.codes == codes {
            table.values.assign(&self.values);
            return table;
        }

        let position: HashMap<i64, usize> =
            self.codes.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        for (row, code) in codes.iter().enumerate() {
            if let Some(&prior) = position.get(code) {
                table.values.row_mut(row).assign(&self.values.row(prior));
            }
        }
        table
    }

    /// Drift the table through one non-trading period.
    ///
    /// The table is re-indexed onto `codes`, every weight grows by
    /// `1 + next_return` of its asset, and each factor column is divided by
    /// its cash plus its grown weights so that the sub-portfolio stays fully
    /// funded.
    ///
    /// # Errors
    /// Fails when a column's cash plus grown weights is zero.
    pub fn evolve(
        &self,
        codes: &[i64],
        next_return: ArrayView1<'_, f64>,
    ) -> Result<Self, DegenerateFactor> {
        let mut table = self.reindex(codes);
        let cash = table.implied_cash();

        let growth = next_return.mapv(|r| 1.0 + r).insert_axis(Axis(1));
        table.values *= &growth;

        let divisor = cash + table.column_sums();
        if let Some(f) = divisor.iter().position(|&d| d == 0.0) {
            return Err(DegenerateFactor {
                factor: self.factor_names[f].clone(),
            });
        }
        table.values /= &divisor;

        Ok(table)
    }
}
