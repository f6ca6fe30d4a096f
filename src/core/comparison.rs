use crate::domain::model::{CandidateResult, ChartKind};
use crate::utils::error::{Result, ScreenError};
use serde::Serialize;

pub const OVERALL_LABEL: &str = "Overall";
const SUMMARY_DIMENSIONS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub candidate_id: String,
    pub name: String,
    pub values: Vec<f64>,
}

/// A dimension the first candidate has but another candidate lacks (charted as 0).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingDimension {
    pub candidate_id: String,
    pub dimension: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonView {
    pub candidate_ids: Vec<String>,
    pub chart: ChartKind,
    pub labels: Vec<String>,
    pub series: Vec<ChartSeries>,
    pub summary: Option<String>,
    pub missing_dimensions: Vec<MissingDimension>,
}

/// 比較圖：維度取自第一位選取的候選人，其他人缺少的維度以 0 計並記錄下來
#[derive(Debug, Clone, Default)]
pub struct ComparisonBuilder {
    chart: ChartKind,
}

impl ComparisonBuilder {
    pub fn new(chart: ChartKind) -> Self {
        Self { chart }
    }

    pub fn chart(&self) -> ChartKind {
        self.chart
    }

    pub fn set_chart(&mut self, chart: ChartKind) {
        self.chart = chart;
    }

    pub fn build(&self, selected: &[&CandidateResult]) -> Result<ComparisonView> {
        if selected.len() < 2 {
            return Err(ScreenError::validation(
                "Select at least two candidates to compare",
            ));
        }

        let dimensions: Vec<String> = selected[0]
            .scoring_breakdown
            .dimensions()
            .map(str::to_string)
            .collect();

        let mut missing_dimensions = Vec::new();
        let series = selected
            .iter()
            .map(|candidate| {
                let mut values = Vec::with_capacity(dimensions.len() + 1);
                if self.chart == ChartKind::Bar {
                    values.push(candidate.overall_score);
                }
                for dimension in &dimensions {
                    let score = candidate
                        .scoring_breakdown
                        .get(dimension)
                        .unwrap_or_else(|| {
                            missing_dimensions.push(MissingDimension {
                                candidate_id: candidate.id.clone(),
                                dimension: dimension.clone(),
                            });
                            0.0
                        });
                    values.push(score);
                }
                ChartSeries {
                    candidate_id: candidate.id.clone(),
                    name: candidate.name.clone(),
                    values,
                }
            })
            .collect();

        if !missing_dimensions.is_empty() {
            tracing::warn!(
                "⚠️ {} dimension score(s) missing in comparison, charted as 0",
                missing_dimensions.len()
            );
        }

        let summary = match selected {
            [a, b] => gap_summary(a, b, &dimensions),
            _ => None,
        };

        let mut labels = Vec::with_capacity(dimensions.len() + 1);
        if self.chart == ChartKind::Bar {
            labels.push(OVERALL_LABEL.to_string());
        }
        labels.extend(dimensions);

        Ok(ComparisonView {
            candidate_ids: selected.iter().map(|c| c.id.clone()).collect(),
            chart: self.chart,
            labels,
            series,
            summary,
            missing_dimensions,
        })
    }
}

fn gap_summary(a: &CandidateResult, b: &CandidateResult, dimensions: &[String]) -> Option<String> {
    let mut gaps: Vec<(&str, f64, f64)> = dimensions
        .iter()
        .map(|d| {
            (
                d.as_str(),
                a.scoring_breakdown.get(d).unwrap_or(0.0),
                b.scoring_breakdown.get(d).unwrap_or(0.0),
            )
        })
        .filter(|(_, sa, sb)| (sa - sb).abs() > f64::EPSILON)
        .collect();

    // 穩定排序：差距相同時維持維度原本順序
    gaps.sort_by(|x, y| (y.1 - y.2).abs().total_cmp(&(x.1 - x.2).abs()));

    let sentences: Vec<String> = gaps
        .into_iter()
        .take(SUMMARY_DIMENSIONS)
        .map(|(dimension, sa, sb)| {
            let (higher, lower) = if sa > sb { (a, b) } else { (b, a) };
            format!(
                "{} outperforms {} by {} in {}",
                higher.name,
                lower.name,
                format_points((sa - sb).abs()),
                dimension
            )
        })
        .collect();

    if sentences.is_empty() {
        None
    } else {
        Some(sentences.join("; "))
    }
}

fn format_points(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{:.0}", rounded)
    } else {
        format!("{:.1}", rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::test_support::candidate;
    use crate::domain::model::ScoringBreakdown;

    fn scored(id: &str, name: &str, dims: &[(&str, f64)]) -> CandidateResult {
        let mut c = candidate(id, name, 80.0, true);
        c.scoring_breakdown = dims.iter().map(|(d, s)| (*d, *s)).collect::<ScoringBreakdown>();
        c
    }

    #[test]
    fn test_requires_two_candidates() {
        let a = scored("a", "Ana", &[("technical", 90.0)]);
        let builder = ComparisonBuilder::default();
        assert!(builder.build(&[]).is_err());
        assert!(builder.build(&[&a]).is_err());
    }

    #[test]
    fn test_two_candidate_summary_uses_largest_gaps() {
        let a = scored(
            "a",
            "Ana",
            &[("technical", 90.0), ("communication", 60.0), ("leadership", 70.0)],
        );
        let b = scored(
            "b",
            "Ben",
            &[("technical", 75.0), ("communication", 85.5), ("leadership", 68.0)],
        );

        let view = ComparisonBuilder::new(ChartKind::Radar)
            .build(&[&a, &b])
            .unwrap();

        assert_eq!(view.labels, vec!["technical", "communication", "leadership"]);
        assert_eq!(view.series.len(), 2);
        assert_eq!(view.series[1].values, vec![75.0, 85.5, 68.0]);
        assert_eq!(
            view.summary.as_deref(),
            Some(
                "Ben outperforms Ana by 25.5 in communication; Ana outperforms Ben by 15 in technical"
            )
        );
    }

    #[test]
    fn test_missing_dimension_defaults_to_zero_and_is_reported() {
        let a = scored("a", "Ana", &[("technical", 90.0), ("culture", 80.0)]);
        let b = scored("b", "Ben", &[("technical", 85.0)]);
        let c = scored("c", "Cy", &[("culture", 70.0), ("technical", 60.0)]);

        let view = ComparisonBuilder::default().build(&[&a, &b, &c]).unwrap();

        assert_eq!(view.series[1].values, vec![85.0, 0.0]);
        assert_eq!(view.series[2].values, vec![60.0, 70.0]);
        assert_eq!(
            view.missing_dimensions,
            vec![MissingDimension {
                candidate_id: "b".to_string(),
                dimension: "culture".to_string(),
            }]
        );
        assert!(view.summary.is_none());
    }

    #[test]
    fn test_switching_chart_rederives_from_same_selection() {
        let a = scored("a", "Ana", &[("technical", 90.0)]);
        let b = scored("b", "Ben", &[("technical", 70.0)]);
        let mut builder = ComparisonBuilder::new(ChartKind::Radar);

        let radar = builder.build(&[&a, &b]).unwrap();
        builder.set_chart(ChartKind::Bar);
        let bar = builder.build(&[&a, &b]).unwrap();

        assert_eq!(radar.candidate_ids, bar.candidate_ids);
        assert_eq!(bar.chart, ChartKind::Bar);
        assert_eq!(bar.labels, vec![OVERALL_LABEL, "technical"]);
        assert_eq!(bar.series[0].values, vec![80.0, 90.0]);
        assert_eq!(radar.series[0].values, vec![90.0]);
        assert_eq!(radar.summary, bar.summary);
    }

    #[test]
    fn test_identical_scores_produce_no_summary() {
        let a = scored("a", "Ana", &[("technical", 90.0)]);
        let b = scored("b", "Ben", &[("technical", 90.0)]);
        let view = ComparisonBuilder::default().build(&[&a, &b]).unwrap();
        assert!(view.summary.is_none());
    }
}
