//! Run-level summary of an attribution report.
//!
//! Aggregates the per-period rows into cumulative active P&L per factor and
//! average weights, and renders them for the terminal or as Markdown.

use crate::report::ReportTable;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cumulative attribution of one factor over the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSummary {
    /// Factor name.
    pub factor_name: String,
    /// Sum of the factor's active P&L over all periods.
    pub cumulative_pnl: f64,
    /// Factor P&L as a percentage of the total active P&L.
    pub contribution_pct: f64,
    /// Average attributed weight.
    pub average_weight: f64,
    /// Average number of assets with a nonzero attribution.
    pub average_num: f64,
}

/// Summary of a whole attribution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Strategy or portfolio label.
    pub label: String,
    /// First application date, if any period was reported.
    pub start: Option<NaiveDate>,
    /// Last application date, if any period was reported.
    pub end: Option<NaiveDate>,
    /// Number of reported periods.
    pub periods: usize,
    /// Sum of total active P&L.
    pub cumulative_total: f64,
    /// Average portfolio weight.
    pub average_total_weight: f64,
    /// Average benchmark weight.
    pub average_benchmark_weight: f64,
    /// Per-factor summaries in factor order.
    pub factors: Vec<FactorSummary>,
}

impl ReportSummary {
    /// Summarize a report.
    pub fn from_report(label: impl Into<String>, report: &ReportTable) -> Self {
        let rows = report.rows();
        let n = rows.len().max(1) as f64;
        let cumulative_total: f64 = rows.iter().map(|r| r.total).sum();

        let factors = report
            .factor_names()
            .iter()
            .enumerate()
            .map(|(f, name)| {
                let cumulative_pnl: f64 = rows.iter().map(|r| r.factor_pnl[f]).sum();
                let contribution_pct = if cumulative_total.abs() > 1e-10 {
                    cumulative_pnl / cumulative_total * 100.0
                } else {
                    0.0
                };
                FactorSummary {
                    factor_name: name.clone(),
                    cumulative_pnl,
                    contribution_pct,
                    average_weight: rows.iter().map(|r| r.factor_weight[f]).sum::<f64>() / n,
                    average_num: rows.iter().map(|r| r.factor_num[f] as f64).sum::<f64>() / n,
                }
            })
            .collect();

        Self {
            label: label.into(),
            start: rows.first().map(|r| r.apply_date),
            end: rows.last().map(|r| r.apply_date),
            periods: rows.len(),
            cumulative_total,
            average_total_weight: rows.iter().map(|r| r.total_weight).sum::<f64>() / n,
            average_benchmark_weight: rows.iter().map(|r| r.benchmark_weight).sum::<f64>() / n,
            factors,
        }
    }

    fn span(&self) -> String {
        match (self.start, self.end) {
            (Some(start), Some(end)) => format!("{start} to {end}"),
            _ => "no reported periods".to_string(),
        }
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("\nPerformance Attribution: {}\n", self.label));
        output.push_str(&format!("Period: {}\n", self.span()));
        output.push_str(&format!("Reported Periods: {}\n", self.periods));
        output.push_str(&"=".repeat(72));
        output.push('\n');

        output.push_str(&format!(
            "{:<20} {:>12} {:>12} {:>12} {:>12}\n",
            "Factor", "Active P&L", "% of Total", "Avg Weight", "Avg Names"
        ));
        output.push_str(&"-".repeat(72));
        output.push('\n');

        for factor in &self.factors {
            output.push_str(&format!(
                "{:<20} {:>11.4}% {:>11.2}% {:>12.4} {:>12.1}\n",
                factor.factor_name,
                factor.cumulative_pnl * 100.0,
                factor.contribution_pct,
                factor.average_weight,
                factor.average_num
            ));
        }

        output.push_str(&"-".repeat(72));
        output.push('\n');
        output.push_str(&format!(
            "{:<20} {:>11.4}% {:>12} {:>12.4}\n",
            "Total Active",
            self.cumulative_total * 100.0,
            "",
            self.average_total_weight
        ));
        output.push_str(&format!(
            "{:<20} {:>12} {:>12} {:>12.4}\n",
            "Benchmark", "", "", self.average_benchmark_weight
        ));
        output.push_str(&"=".repeat(72));
        output.push('\n');

        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# Performance Attribution: {}\n\n", self.label));
        output.push_str(&format!("**Period:** {}\n\n", self.span()));
        output.push_str(&format!("**Reported Periods:** {}\n\n", self.periods));

        output.push_str("| Factor | Active P&L | % of Total | Avg Weight | Avg Names |\n");
        output.push_str("|--------|------------|------------|------------|-----------|\n");
        for factor in &self.factors {
            output.push_str(&format!(
                "| {} | {:.4}% | {:.2}% | {:.4} | {:.1} |\n",
                factor.factor_name,
                factor.cumulative_pnl * 100.0,
                factor.contribution_pct,
                factor.average_weight,
                factor.average_num
            ));
        }

        output.push_str(&format!(
            "\n- **Total Active P&L:** {:.4}%\n",
            self.cumulative_total * 100.0
        ));
        output.push_str(&format!(
            "- **Average Weight:** {:.4} (benchmark {:.4})\n",
            self.average_total_weight, self.average_benchmark_weight
        ));

        output
    }
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Attribution: {} ({})", self.label, self.span())?;
        writeln!(f, "  Periods: {}", self.periods)?;
        writeln!(f, "  Total Active P&L: {:.4}%", self.cumulative_total * 100.0)?;
        for factor in &self.factors {
            writeln!(
                f,
                "  {}: {:.4}%",
                factor.factor_name,
                factor.cumulative_pnl * 100.0
            )?;
        }
        Ok(())
    }
}
