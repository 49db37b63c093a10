//! Offline recall@k measurement against a brute-force baseline.

use crate::engine::{exclude_self, RecommendationEngine};
use crate::exact::rank_by_similarity;
use crate::fusion::FusedMatrix;
use crate::{Error, Result};
use ahash::AHashSet;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

/// recall@k for one queried title
#[derive(Debug, Clone, Serialize)]
pub struct RecallReport {
    pub query: String,
    pub k: usize,
    /// Fraction of the exact top-k also returned by the index, in `[0, 1]`
    pub recall: f32,
    /// Titles returned by the index, in index order
    pub neighbors: Vec<String>,
    /// Titles of the exact top-k
    pub exact_neighbors: Vec<String>,
}

/// recall@k over a batch of titles
#[derive(Debug, Clone, Serialize)]
pub struct RecallSummary {
    pub k: usize,
    pub reports: Vec<RecallReport>,
    /// Titles that did not resolve
    pub missing: Vec<String>,
    /// `None` when no title resolved
    pub mean_recall: Option<f32>,
}

/// Compares the engine's index with an exact scan of the fused catalog
pub struct RecallEvaluator<'a> {
    engine: &'a RecommendationEngine,
    fused: FusedMatrix,
}

impl<'a> RecallEvaluator<'a> {
    pub fn new(engine: &'a RecommendationEngine) -> Result<Self> {
        let fused = engine.fusion().fuse_store(engine.store())?;
        Ok(Self { engine, fused })
    }

    /// `Ok(None)` when the title is unknown.
    pub fn recall_at_k(&self, raw_title: &str, k: usize) -> Result<Option<RecallReport>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be at least 1".to_string()));
        }
        let Some(id) = self.engine.titles().resolve(raw_title) else {
            return Ok(None);
        };
        let query = self.fused.row(id).ok_or_else(|| {
            Error::InvariantViolation(format!("item id {} has no fused vector", id))
        })?;

        let exact: Vec<usize> = rank_by_similarity(&self.fused, query)
            .into_iter()
            .map(|(n, _)| n)
            .filter(|&n| n != id)
            .take(k)
            .collect();

        let approx: Vec<usize> = exclude_self(self.engine.index().query(query, k + 1)?, id, k)
            .into_iter()
            .map(|hit| hit.id)
            .collect();

        let recall = overlap_ratio(&exact, &approx);

        Ok(Some(RecallReport {
            query: raw_title.to_string(),
            k,
            recall,
            neighbors: self.display_titles(&approx)?,
            exact_neighbors: self.display_titles(&exact)?,
        }))
    }

    /// Evaluate many titles in parallel; unknown titles are listed, not fatal.
    pub fn evaluate<S>(&self, titles: &[S], k: usize) -> Result<RecallSummary>
    where
        S: AsRef<str> + Sync,
    {
        let outcomes = titles
            .par_iter()
            .map(|title| {
                self.recall_at_k(title.as_ref(), k)
                    .map(|report| (title.as_ref().to_string(), report))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut reports = Vec::new();
        let mut missing = Vec::new();
        for (title, report) in outcomes {
            match report {
                Some(report) => reports.push(report),
                None => {
                    warn!("recall: title {:?} not found", title);
                    missing.push(title);
                }
            }
        }

        let mean_recall = if reports.is_empty() {
            None
        } else {
            Some(reports.iter().map(|r| r.recall).sum::<f32>() / reports.len() as f32)
        };
        if let Some(mean) = mean_recall {
            info!("mean recall@{} over {} titles: {:.3}", k, reports.len(), mean);
        }

        Ok(RecallSummary {
            k,
            reports,
            missing,
            mean_recall,
        })
    }

    fn display_titles(&self, ids: &[usize]) -> Result<Vec<String>> {
        ids.iter()
            .map(|&id| self.engine.titles().display_title(id).map(str::to_string))
            .collect()
    }
}

/// `|exact ∩ approx| / |exact|`; an empty baseline counts as full recall.
fn overlap_ratio(exact: &[usize], approx: &[usize]) -> f32 {
    if exact.is_empty() {
        return 1.0;
    }
    let truth: AHashSet<usize> = exact.iter().copied().collect();
    let found: AHashSet<usize> = approx.iter().copied().collect();
    truth.intersection(&found).count() as f32 / truth.len() as f32
}
