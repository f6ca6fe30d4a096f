use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 上傳狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploaded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Pdf,
    Docx,
    Txt,
    #[serde(other)]
    Unknown,
}

impl MediaKind {
    pub fn from_file_name(name: &str) -> Self {
        let extension = std::path::Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => Self::Pdf,
            Some("docx") => Self::Docx,
            Some("txt") => Self::Txt,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub status: UploadStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningRequest {
    pub job_title: String,
    pub job_description: String,
    #[serde(default)]
    pub elimination_conditions: Option<String>,
    pub qualification_threshold: u8,
    pub documents: Vec<SourceDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    #[default]
    #[serde(rename = "Not assessed", other)]
    NotAssessed,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::NotAssessed => "Not assessed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionScore {
    pub dimension: String,
    pub score: f64,
}

/// 評分維度，保留遠端回傳的欄位順序（比較圖的軸線順序依此決定）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoringBreakdown(Vec<DimensionScore>);

impl ScoringBreakdown {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Inserts or replaces a dimension, keeping the first-seen position.
    pub fn insert(&mut self, dimension: impl Into<String>, score: f64) {
        let dimension = dimension.into();
        match self.0.iter_mut().find(|d| d.dimension == dimension) {
            Some(existing) => existing.score = score,
            None => self.0.push(DimensionScore { dimension, score }),
        }
    }

    pub fn get(&self, dimension: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|d| d.dimension == dimension)
            .map(|d| d.score)
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|d| d.dimension.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &DimensionScore> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for ScoringBreakdown {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut breakdown = Self::new();
        for (dimension, score) in iter {
            breakdown.insert(dimension, score);
        }
        breakdown
    }
}

impl Serialize for ScoringBreakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in &self.0 {
            map.serialize_entry(&entry.dimension, &entry.score)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ScoringBreakdown {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct BreakdownVisitor;

        impl<'de> Visitor<'de> for BreakdownVisitor {
            type Value = ScoringBreakdown;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of dimension name to numeric score")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut breakdown = ScoringBreakdown::new();
                while let Some((dimension, score)) = access.next_entry::<String, f64>()? {
                    breakdown.insert(dimension, score);
                }
                Ok(breakdown)
            }

            fn visit_unit<E>(self) -> std::result::Result<Self::Value, E> {
                Ok(ScoringBreakdown::new())
            }
        }

        deserializer.deserialize_any(BreakdownVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub id: String,
    #[serde(alias = "candidate_name")]
    pub name: String,
    #[serde(alias = "qualification_score")]
    pub overall_score: f64,
    #[serde(alias = "is_qualified")]
    pub qualified: bool,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default, alias = "strengths")]
    pub key_strengths: Vec<String>,
    #[serde(default, alias = "weaknesses")]
    pub development_areas: Vec<String>,
    #[serde(default)]
    pub scoring_breakdown: ScoringBreakdown,
    #[serde(default, alias = "match_summary", alias = "reasoning_summary")]
    pub reasoning: String,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub availability: String,
}

impl CandidateResult {
    /// 校正遠端資料：分數限制在 0–100，拒絕原因只在未合格時存在
    pub fn normalized(mut self) -> Self {
        if !self.overall_score.is_finite() {
            self.overall_score = 0.0;
        }
        self.overall_score = self.overall_score.clamp(0.0, 100.0);

        if self.qualified {
            self.rejection_reason = None;
        } else if self
            .rejection_reason
            .as_deref()
            .map_or(true, |r| r.trim().is_empty())
        {
            self.rejection_reason = Some("No reason provided".to_string());
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeepAnalysisRequest {
    pub job_title: String,
    pub job_description: String,
    pub candidates: Vec<CandidateResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepAnalysisResponse {
    #[serde(alias = "analysis", alias = "dashboard")]
    pub narrative: String,
    #[serde(default, alias = "processing_time")]
    pub processing_seconds: Option<f64>,
    #[serde(default, alias = "usage_cost")]
    pub cost: Option<f64>,
}

/// 深度分析結果，附帶分析時所選的候選人
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepAnalysisReport {
    pub candidate_ids: Vec<String>,
    pub narrative: String,
    pub processing_seconds: Option<f64>,
    pub cost: Option<f64>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Excel,
    Word,
    Pdf,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 5] = [
        ExportFormat::Json,
        ExportFormat::Csv,
        ExportFormat::Excel,
        ExportFormat::Word,
        ExportFormat::Pdf,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Excel => "xlsx",
            Self::Word => "docx",
            Self::Pdf => "pdf",
        }
    }

    /// 只有 JSON 是可還原的完整快照
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Json)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Excel => "excel",
            Self::Word => "word",
            Self::Pdf => "pdf",
        };
        f.write_str(name)
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "excel" | "xlsx" => Ok(Self::Excel),
            "word" | "docx" => Ok(Self::Word),
            "pdf" => Ok(Self::Pdf),
            other => Err(format!("unknown export format: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
    pub filename: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Radar,
    Bar,
}
