use crate::domain::model::CandidateResult;
use std::cmp::Ordering;
use std::collections::HashMap;

/// 候選人結果集合：依 id 去重、只增不減
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    candidates: Vec<CandidateResult>,
    index: HashMap<String, usize>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a candidate unless its id is already present (first write wins).
    /// Returns whether the candidate was new.
    pub fn insert(&mut self, candidate: CandidateResult) -> bool {
        if self.index.contains_key(&candidate.id) {
            tracing::debug!("Duplicate candidate {} ignored", candidate.id);
            return false;
        }

        let candidate = candidate.normalized();
        self.index
            .insert(candidate.id.clone(), self.candidates.len());
        self.candidates.push(candidate);
        true
    }

    /// Merges a batch and returns the candidates that were actually added.
    pub fn extend<I>(&mut self, batch: I) -> Vec<&CandidateResult>
    where
        I: IntoIterator<Item = CandidateResult>,
    {
        let start = self.candidates.len();
        for candidate in batch {
            self.insert(candidate);
        }
        self.candidates[start..].iter().collect()
    }

    pub fn get(&self, id: &str) -> Option<&CandidateResult> {
        self.index.get(id).map(|&i| &self.candidates[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn qualified_count(&self) -> usize {
        self.candidates.iter().filter(|c| c.qualified).count()
    }

    /// Candidates in the order they were first received.
    pub fn insertion_order(&self) -> &[CandidateResult] {
        &self.candidates
    }

    /// 分數由高到低，同分依名稱排序，確保每次輸出順序一致
    pub fn ranked(&self) -> Vec<&CandidateResult> {
        let mut ranked: Vec<&CandidateResult> = self.candidates.iter().collect();
        ranked.sort_by(|a, b| rank_order(a, b));
        ranked
    }

    pub fn filtered(&self, qualified: bool) -> Vec<&CandidateResult> {
        self.candidates
            .iter()
            .filter(|c| c.qualified == qualified)
            .collect()
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
        self.index.clear();
    }
}

pub fn rank_order(a: &CandidateResult, b: &CandidateResult) -> Ordering {
    b.overall_score
        .total_cmp(&a.overall_score)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

impl FromIterator<CandidateResult> for ResultStore {
    fn from_iter<I: IntoIterator<Item = CandidateResult>>(iter: I) -> Self {
        let mut store = Self::new();
        store.extend(iter);
        store
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::model::{CandidateResult, RiskLevel, ScoringBreakdown};

    pub fn candidate(id: &str, name: &str, score: f64, qualified: bool) -> CandidateResult {
        CandidateResult {
            id: id.to_string(),
            name: name.to_string(),
            overall_score: score,
            qualified,
            rejection_reason: if qualified {
                None
            } else {
                Some("Below threshold".to_string())
            },
            key_strengths: vec!["Ownership".to_string()],
            development_areas: vec![],
            scoring_breakdown: ScoringBreakdown::new(),
            reasoning: format!("{} summary", name),
            risk_level: RiskLevel::Low,
            availability: "Immediate".to_string(),
        }
    }
}
