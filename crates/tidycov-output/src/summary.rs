//! Human-readable summaries of tidy runs and cohort comparisons.
//!
//! Both summaries render as an ASCII table for the terminal and as Markdown
//! for reports.

use serde::{Deserialize, Serialize};
use std::fmt;
use tidycov_data::StoreSummary;
use tidycov_stats::{StandardizedDifference, StandardizedDifferenceReport};
use tidycov_tidy::TidyMetadata;

/// Conventional threshold above which a covariate is considered imbalanced.
pub const BALANCE_THRESHOLD: f64 = 0.1;

/// Before/after view of a tidy run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TidySummary {
    /// Cohort size.
    pub population_size: usize,

    /// Minimum fraction used by the frequency filter.
    pub min_fraction: f64,

    /// Covariates with data before tidying.
    pub covariates_before: usize,

    /// Covariates with data after tidying.
    pub covariates_after: usize,

    /// Rows before tidying.
    pub rows_before: usize,

    /// Rows after tidying.
    pub rows_after: usize,

    /// Covariates removed by the frequency filter.
    pub infrequent: usize,

    /// Covariates removed as redundant.
    pub redundant: usize,

    /// Covariates rescaled by the normalizer.
    pub normalized: usize,

    /// Data-quality warnings, rendered.
    pub warnings: Vec<String>,

    /// Completion time of the run, `YYYY-MM-DD HH:MM:SS UTC`.
    pub completed_at: String,
}

impl TidySummary {
    /// Build a summary from the removal record and both store summaries.
    pub fn new(metadata: &TidyMetadata, before: &StoreSummary, after: &StoreSummary) -> Self {
        Self {
            population_size: metadata.population_size,
            min_fraction: metadata.settings.min_fraction,
            covariates_before: before.covariates,
            covariates_after: after.covariates,
            rows_before: before.rows,
            rows_after: after.rows,
            infrequent: metadata.deleted_infrequent_covariate_ids.len(),
            redundant: metadata.deleted_redundant_covariate_ids.len(),
            normalized: metadata.norm_factors.len(),
            warnings: metadata.warnings.iter().map(ToString::to_string).collect(),
            completed_at: metadata
                .created_at
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string(),
        }
    }

    /// Fraction of rows that survived.
    pub fn row_retention(&self) -> f64 {
        if self.rows_before == 0 {
            return 1.0;
        }
        self.rows_after as f64 / self.rows_before as f64
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("\nTidy Summary ({})\n", self.completed_at));
        output.push_str(&"=".repeat(60));
        output.push('\n');
        output.push_str(&format!(
            "  Population:               {}\n",
            self.population_size
        ));
        output.push_str(&format!("  Minimum fraction:         {}\n", self.min_fraction));
        output.push_str(&"-".repeat(60));
        output.push('\n');
        output.push_str(&format!("{:<26} {:>15} {:>15}\n", "", "Before", "After"));
        output.push_str(&format!(
            "{:<26} {:>15} {:>15}\n",
            "  Covariates", self.covariates_before, self.covariates_after
        ));
        output.push_str(&format!(
            "{:<26} {:>15} {:>15}\n",
            "  Rows", self.rows_before, self.rows_after
        ));
        output.push_str(&"-".repeat(60));
        output.push('\n');
        output.push_str(&format!("  Removed (infrequent):     {}\n", self.infrequent));
        output.push_str(&format!("  Removed (redundant):      {}\n", self.redundant));
        output.push_str(&format!("  Normalized:               {}\n", self.normalized));
        output.push_str(&format!(
            "  Rows retained:            {:.1}%\n",
            self.row_retention() * 100.0
        ));

        if !self.warnings.is_empty() {
            output.push_str("\nWarnings:\n");
            for warning in &self.warnings {
                output.push_str(&format!("  - {}\n", warning));
            }
        }

        output.push_str(&"=".repeat(60));
        output.push('\n');
        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Tidy Summary\n\n");
        output.push_str(&format!("**Completed:** {}\n\n", self.completed_at));
        output.push_str(&format!("- **Population:** {}\n", self.population_size));
        output.push_str(&format!("- **Minimum fraction:** {}\n", self.min_fraction));
        output.push_str(&format!("- **Removed (infrequent):** {}\n", self.infrequent));
        output.push_str(&format!("- **Removed (redundant):** {}\n", self.redundant));
        output.push_str(&format!("- **Normalized:** {}\n\n", self.normalized));

        output.push_str("| | Before | After |\n");
        output.push_str("|---|---|---|\n");
        output.push_str(&format!(
            "| Covariates | {} | {} |\n",
            self.covariates_before, self.covariates_after
        ));
        output.push_str(&format!(
            "| Rows | {} | {} |\n",
            self.rows_before, self.rows_after
        ));

        if !self.warnings.is_empty() {
            output.push_str("\n## Warnings\n\n");
            for warning in &self.warnings {
                output.push_str(&format!("- {}\n", warning));
            }
        }
        output
    }
}

impl fmt::Display for TidySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Tidy: {} -> {} covariates, {} -> {} rows",
            self.covariates_before, self.covariates_after, self.rows_before, self.rows_after
        )?;
        writeln!(
            f,
            "  removed {} infrequent, {} redundant; normalized {}",
            self.infrequent, self.redundant, self.normalized
        )?;
        if !self.warnings.is_empty() {
            writeln!(f, "  {} warning(s)", self.warnings.len())?;
        }
        Ok(())
    }
}

/// The head of a comparison report, ready for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonSummary {
    /// Largest differences, by magnitude.
    pub records: Vec<StandardizedDifference>,

    /// Covariates compared in total.
    pub compared: usize,

    /// Covariates with `|std_diff|` at or above [`BALANCE_THRESHOLD`].
    pub imbalanced: usize,

    /// Covariates excluded as non-comparable.
    pub non_comparable: usize,
}

impl ComparisonSummary {
    /// Keep the `top` largest differences of `report`.
    pub fn new(report: &StandardizedDifferenceReport, top: usize) -> Self {
        Self {
            records: report.top(top).to_vec(),
            compared: report.records.len(),
            imbalanced: report.imbalanced(BALANCE_THRESHOLD).count(),
            non_comparable: report.non_comparable.len(),
        }
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str("\nStandardized Differences\n");
        output.push_str(&"=".repeat(80));
        output.push('\n');
        output.push_str(&format!(
            "  Compared: {}   Imbalanced (|d| >= {}): {}   Non-comparable: {}\n",
            self.compared, BALANCE_THRESHOLD, self.imbalanced, self.non_comparable
        ));
        output.push_str(&"-".repeat(80));
        output.push('\n');
        output.push_str(&format!(
            "{:>12} {:<36} {:>9} {:>9} {:>9}\n",
            "Covariate", "Name", "Target", "Comp.", "Std.Diff"
        ));
        output.push_str(&"-".repeat(80));
        output.push('\n');

        for record in &self.records {
            output.push_str(&format!(
                "{:>12} {:<36} {:>9.4} {:>9.4} {:>9.4}\n",
                record.covariate_id,
                truncate(&record.covariate_name, 36),
                record.mean_value1,
                record.mean_value2,
                record.std_diff
            ));
        }

        output.push_str(&"=".repeat(80));
        output.push('\n');
        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Standardized Differences\n\n");
        output.push_str(&format!(
            "{} covariates compared, {} with |d| >= {}, {} non-comparable.\n\n",
            self.compared, self.imbalanced, BALANCE_THRESHOLD, self.non_comparable
        ));
        output.push_str("| Covariate | Name | Target | Comparator | Std. Diff |\n");
        output.push_str("|-----------|------|--------|------------|-----------|\n");
        for record in &self.records {
            output.push_str(&format!(
                "| {} | {} | {:.4} | {:.4} | {:.4} |\n",
                record.covariate_id,
                record.covariate_name.replace('|', "\\|"),
                record.mean_value1,
                record.mean_value2,
                record.std_diff
            ));
        }
        output
    }
}

fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        name.to_string()
    } else {
        let mut short: String = name.chars().take(width - 3).collect();
        short.push_str("...");
        short
    }
}
