//! Covariate and analysis reference catalogs.

use crate::error::SchemaViolation;
use crate::types::{AnalysisId, AnalysisRef, CovariateId, CovariateRef, MissingValueStrategy, RowId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Read-only lookup of covariate and analysis definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    covariates: BTreeMap<CovariateId, CovariateRef>,
    analyses: BTreeMap<AnalysisId, AnalysisRef>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from both reference tables.
    pub fn from_refs(
        covariates: impl IntoIterator<Item = CovariateRef>,
        analyses: impl IntoIterator<Item = AnalysisRef>,
    ) -> Self {
        let mut catalog = Self::new();
        for analysis in analyses {
            catalog.insert_analysis(analysis);
        }
        for covariate in covariates {
            catalog.insert_covariate(covariate);
        }
        catalog
    }

    /// Add or replace a covariate definition.
    pub fn insert_covariate(&mut self, covariate: CovariateRef) {
        self.covariates.insert(covariate.covariate_id, covariate);
    }

    /// Add or replace an analysis definition.
    pub fn insert_analysis(&mut self, analysis: AnalysisRef) {
        self.analyses.insert(analysis.analysis_id, analysis);
    }

    /// Look up a covariate.
    pub fn covariate(&self, covariate_id: CovariateId) -> Option<&CovariateRef> {
        self.covariates.get(&covariate_id)
    }

    /// Look up an analysis.
    pub fn analysis(&self, analysis_id: AnalysisId) -> Option<&AnalysisRef> {
        self.analyses.get(&analysis_id)
    }

    /// All covariate definitions, ordered by id.
    pub fn covariates(&self) -> impl Iterator<Item = &CovariateRef> {
        self.covariates.values()
    }

    /// All analysis definitions, ordered by id.
    pub fn analyses(&self) -> impl Iterator<Item = &AnalysisRef> {
        self.analyses.values()
    }

    /// Number of covariate definitions.
    pub fn covariate_count(&self) -> usize {
        self.covariates.len()
    }

    /// Covariate ids that belong to an analysis, ascending.
    pub fn covariates_of(&self, analysis_id: AnalysisId) -> Vec<CovariateId> {
        self.covariates
            .values()
            .filter(|c| c.analysis_id == analysis_id)
            .map(|c| c.covariate_id)
            .collect()
    }

    /// Resolve the covariate referenced by `row_id` and its analysis.
    pub fn resolve(
        &self,
        covariate_id: CovariateId,
        row_id: RowId,
    ) -> Result<(&CovariateRef, &AnalysisRef), SchemaViolation> {
        let covariate = self
            .covariates
            .get(&covariate_id)
            .ok_or(SchemaViolation::UnknownCovariate {
                covariate_id,
                row_id,
            })?;
        let analysis =
            self.analyses
                .get(&covariate.analysis_id)
                .ok_or(SchemaViolation::UnknownAnalysis {
                    analysis_id: covariate.analysis_id,
                    covariate_id,
                })?;
        Ok((covariate, analysis))
    }

    /// Aggregation semantics for a covariate.
    pub fn strategy(
        &self,
        covariate_id: CovariateId,
        row_id: RowId,
    ) -> Result<MissingValueStrategy, SchemaViolation> {
        self.resolve(covariate_id, row_id)
            .map(|(_, analysis)| analysis.strategy())
    }

    /// Check that every covariate points at a known analysis.
    pub fn validate(&self) -> Result<(), SchemaViolation> {
        for covariate in self.covariates.values() {
            if !self.analyses.contains_key(&covariate.analysis_id) {
                return Err(SchemaViolation::UnknownAnalysis {
                    analysis_id: covariate.analysis_id,
                    covariate_id: covariate.covariate_id,
                });
            }
        }
        Ok(())
    }

    /// Copy of this catalog keeping only the given covariates.
    ///
    /// Analyses are kept whole so that later lookups still resolve.
    pub fn retain_covariates(&self, keep: impl Fn(CovariateId) -> bool) -> Self {
        Self {
            covariates: self
                .covariates
                .iter()
                .filter(|(id, _)| keep(**id))
                .map(|(id, c)| (*id, c.clone()))
                .collect(),
            analyses: self.analyses.clone(),
        }
    }
}
