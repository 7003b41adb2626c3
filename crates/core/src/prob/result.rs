use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use super::backend::Strategy;
use super::calls::{call_founders, FounderCallMatrix};
use super::matrix::FounderProbMatrix;
use crate::error::Result;
use crate::genetics::mapfn::MapFunction;

/// How a set of founder probabilities was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbMetadata {
    /// Requested step size (cM).
    pub step: f64,
    /// `None` when the probabilities came from IBD truth.
    pub strategy: Option<Strategy>,
    pub from_ibd: bool,
    pub map_function: MapFunction,
    pub include_markers: bool,
    pub error_prob: f64,
    pub n_founders: usize,
    /// Calling threshold of the current call matrices.
    pub threshold: f64,
}

/// Founder-origin probabilities and calls for every requested chromosome.
///
/// Both collections are keyed by chromosome name in the caller's requested
/// order.
#[derive(Debug, Clone, Serialize)]
pub struct FounderProbs {
    pub metadata: ProbMetadata,
    pub probabilities: IndexMap<String, FounderProbMatrix>,
    pub calls: IndexMap<String, FounderCallMatrix>,
}

impl FounderProbs {
    pub(crate) fn new(
        metadata: ProbMetadata,
        probabilities: IndexMap<String, FounderProbMatrix>,
    ) -> Result<Self> {
        let calls = call_all(&probabilities, metadata.threshold)?;
        Ok(Self {
            metadata,
            probabilities,
            calls,
        })
    }

    /// Replace the calls with calls at threshold `t`; probabilities are kept.
    ///
    /// # Errors
    /// Returns `InvalidParameter` unless `0 < t <= 1`.
    pub fn with_threshold(mut self, t: f64) -> Result<Self> {
        self.calls = call_all(&self.probabilities, t)?;
        self.metadata.threshold = t;
        Ok(self)
    }

    pub fn chromosome_names(&self) -> Vec<&str> {
        self.probabilities.keys().map(|k| k.as_str()).collect()
    }

    pub fn get(&self, chromosome: &str) -> Option<(&FounderProbMatrix, &FounderCallMatrix)> {
        Some((self.probabilities.get(chromosome)?, self.calls.get(chromosome)?))
    }

    /// Write `probs_<chr>.csv` and `calls_<chr>.csv` for every chromosome.
    ///
    /// Undefined probabilities and missing calls are written as `NA`.
    ///
    /// # Errors
    /// Returns `Io`/`Csv` errors from writing.
    pub fn write_csv(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for (name, probs) in &self.probabilities {
            let path = dir.join(format!("probs_{}.csv", name));
            let mut wtr = csv::Writer::from_path(&path)?;
            let mut header = vec!["id".to_string()];
            header.extend(probs.column_labels());
            wtr.write_record(&header)?;
            for (row, id) in probs.individuals().iter().enumerate() {
                let mut record = vec![id.clone()];
                record.extend(probs.values().row(row).iter().map(|v| {
                    if v.is_nan() {
                        "NA".to_string()
                    } else {
                        v.to_string()
                    }
                }));
                wtr.write_record(&record)?;
            }
            wtr.flush()?;
            written.push(path);
        }

        for (name, calls) in &self.calls {
            let path = dir.join(format!("calls_{}.csv", name));
            let mut wtr = csv::Writer::from_path(&path)?;
            let mut header = vec!["id".to_string()];
            header.extend(calls.position_names().iter().cloned());
            wtr.write_record(&header)?;
            for (row, id) in calls.individuals().iter().enumerate() {
                let mut record = vec![id.clone()];
                record.extend(
                    calls
                        .row(row)
                        .into_iter()
                        .map(|c| c.map_or_else(|| "NA".to_string(), |f| f.to_string())),
                );
                wtr.write_record(&record)?;
            }
            wtr.flush()?;
            written.push(path);
        }

        log::info!("Wrote {} files to {}", written.len(), dir.display());
        Ok(written)
    }
}

fn call_all(
    probabilities: &IndexMap<String, FounderProbMatrix>,
    threshold: f64,
) -> Result<IndexMap<String, FounderCallMatrix>> {
    probabilities
        .iter()
        .map(|(name, p)| Ok((name.clone(), call_founders(p, threshold)?)))
        .collect()
}
