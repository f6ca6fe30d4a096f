use crate::core::aggregator::ProgressState;
use crate::core::store::{rank_order, ResultStore};
use crate::domain::model::{
    CandidateResult, DeepAnalysisReport, ExportArtifact, ExportFormat, ScreeningRequest,
};
use crate::utils::error::{Result, ScreenError};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use zip::write::{SimpleFileOptions, ZipWriter};

pub const SNAPSHOT_VERSION: u32 = 1;
const FILE_PREFIX: &str = "screening_results";
const EXCEL_CELL_LIMIT: usize = 32_767;
const PDF_LINE_WIDTH: usize = 95;
const PDF_LINES_PER_PAGE: usize = 52;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_title: String,
    pub job_description: String,
    #[serde(default)]
    pub elimination_conditions: Option<String>,
    pub qualification_threshold: u8,
    #[serde(default)]
    pub document_count: usize,
}

impl From<&ScreeningRequest> for JobSummary {
    fn from(request: &ScreeningRequest) -> Self {
        Self {
            job_title: request.job_title.clone(),
            job_description: request.job_description.clone(),
            elimination_conditions: request.elimination_conditions.clone(),
            qualification_threshold: request.qualification_threshold,
            document_count: request.documents.len(),
        }
    }
}

/// 完整、可還原的工作階段快照；JSON 匯出與已儲存的工作階段共用此格式
///
/// Candidates are kept in insertion order so that restoring a snapshot rebuilds the
/// same store, including which of two duplicate ids won.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub job: Option<JobSummary>,
    pub progress: ProgressState,
    pub candidates: Vec<CandidateResult>,
    #[serde(default)]
    pub deep_analysis: Option<DeepAnalysisReport>,
}

impl SessionSnapshot {
    pub fn new(
        job: Option<JobSummary>,
        progress: ProgressState,
        store: &ResultStore,
        deep_analysis: Option<DeepAnalysisReport>,
        exported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            exported_at,
            job,
            progress,
            candidates: store.insertion_order().to_vec(),
            deep_analysis,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let snapshot: Self = serde_json::from_slice(bytes)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(ScreenError::validation(format!(
                "Snapshot version {} is newer than supported version {}",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot)
    }

    pub fn restore_store(&self) -> ResultStore {
        self.candidates.iter().cloned().collect()
    }

    pub fn ranked(&self) -> Vec<&CandidateResult> {
        let mut ranked: Vec<&CandidateResult> = self.candidates.iter().collect();
        ranked.sort_by(|a, b| rank_order(a, b));
        ranked
    }

    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}",
            FILE_PREFIX,
            self.exported_at.format("%Y%m%d_%H%M%S")
        )
    }
}

/// A zip archive of every artifact produced by one export request.
#[derive(Debug, Clone)]
pub struct BundleArtifact {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub entries: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ExportReport {
    pub artifacts: Vec<ExportArtifact>,
    pub failures: Vec<(ExportFormat, ScreenError)>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

enum Block {
    Title(String),
    Heading(String),
    Text(String),
    Blank,
}

enum Cell {
    Text(String),
    Number(f64),
}

pub struct ExportSerializer<'a> {
    snapshot: &'a SessionSnapshot,
}

impl<'a> ExportSerializer<'a> {
    pub fn new(snapshot: &'a SessionSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn render(&self, format: ExportFormat) -> Result<ExportArtifact> {
        let rendered = match format {
            ExportFormat::Json => self.snapshot.to_json(),
            ExportFormat::Csv => self.csv(),
            ExportFormat::Excel => self.xlsx(),
            ExportFormat::Word => self.docx(),
            ExportFormat::Pdf => self.pdf(),
        };

        let bytes = rendered.map_err(|e| match e {
            ScreenError::ExportError { .. } => e,
            other => ScreenError::export(format, other.to_string()),
        })?;

        tracing::debug!("📦 Rendered {} export ({} bytes)", format, bytes.len());
        Ok(ExportArtifact {
            format,
            filename: format!("{}.{}", self.snapshot.file_stem(), format.extension()),
            bytes,
        })
    }

    /// 每種格式獨立處理，一種失敗不影響其他格式
    pub fn render_all(&self, formats: &[ExportFormat]) -> ExportReport {
        let mut report = ExportReport::default();
        let mut seen = Vec::with_capacity(formats.len());

        for &format in formats {
            if seen.contains(&format) {
                continue;
            }
            seen.push(format);

            match self.render(format) {
                Ok(artifact) => report.artifacts.push(artifact),
                Err(e) => {
                    tracing::error!("❌ Export to {} failed: {}", format, e);
                    report.failures.push((format, e));
                }
            }
        }
        report
    }

    pub fn bundle(&self, artifacts: &[ExportArtifact]) -> Result<BundleArtifact> {
        let parts: Vec<(&str, &[u8])> = artifacts
            .iter()
            .map(|a| (a.filename.as_str(), a.bytes.as_slice()))
            .collect();
        let bytes = zip_parts(&parts).map_err(|e| ScreenError::export("bundle", e.to_string()))?;

        Ok(BundleArtifact {
            filename: format!("{}.zip", self.snapshot.file_stem()),
            bytes,
            entries: artifacts.iter().map(|a| a.filename.clone()).collect(),
        })
    }

    fn csv(&self) -> Result<Vec<u8>> {
        let ranked = self.snapshot.ranked();
        let dimensions = dimension_union(&ranked);

        let mut writer = csv::Writer::from_writer(Vec::new());
        let mut header: Vec<String> = [
            "rank",
            "id",
            "name",
            "overall_score",
            "qualified",
            "risk_level",
            "availability",
            "key_strengths",
            "development_areas",
            "rejection_reason",
            "reasoning",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect();
        header.extend(dimensions.iter().cloned());
        writer.write_record(&header)?;

        for (rank, candidate) in ranked.iter().enumerate() {
            let mut row = vec![
                (rank + 1).to_string(),
                candidate.id.clone(),
                candidate.name.clone(),
                candidate.overall_score.to_string(),
                candidate.qualified.to_string(),
                candidate.risk_level.to_string(),
                candidate.availability.clone(),
                candidate.key_strengths.join("; "),
                candidate.development_areas.join("; "),
                candidate.rejection_reason.clone().unwrap_or_default(),
                candidate.reasoning.clone(),
            ];
            row.extend(dimensions.iter().map(|d| {
                candidate
                    .scoring_breakdown
                    .get(d)
                    .map(|s| s.to_string())
                    .unwrap_or_default()
            }));
            writer.write_record(&row)?;
        }

        writer
            .into_inner()
            .map_err(|e| ScreenError::IoError(e.into_error()))
    }

    fn xlsx(&self) -> Result<Vec<u8>> {
        let ranked = self.snapshot.ranked();
        let dimensions = dimension_union(&ranked);

        let mut header: Vec<Cell> = [
            "Rank",
            "Name",
            "Score",
            "Qualified",
            "Risk Level",
            "Availability",
            "Key Strengths",
            "Development Areas",
            "Rejection Reason",
            "Summary",
        ]
        .iter()
        .map(|h| Cell::Text(h.to_string()))
        .collect();
        header.extend(dimensions.iter().map(|d| Cell::Text(d.clone())));

        let mut candidate_rows = vec![header];
        for (rank, c) in ranked.iter().enumerate() {
            let mut row = vec![
                Cell::Number((rank + 1) as f64),
                Cell::Text(c.name.clone()),
                Cell::Number(c.overall_score),
                Cell::Text(if c.qualified { "Yes" } else { "No" }.to_string()),
                Cell::Text(c.risk_level.to_string()),
                Cell::Text(c.availability.clone()),
                Cell::Text(c.key_strengths.join("; ")),
                Cell::Text(c.development_areas.join("; ")),
                Cell::Text(c.rejection_reason.clone().unwrap_or_default()),
                Cell::Text(c.reasoning.clone()),
            ];
            row.extend(dimensions.iter().map(|d| match c.scoring_breakdown.get(d) {
                Some(score) => Cell::Number(score),
                None => Cell::Text(String::new()),
            }));
            candidate_rows.push(row);
        }

        let progress = &self.snapshot.progress;
        let mut summary_rows = Vec::new();
        if let Some(job) = &self.snapshot.job {
            summary_rows.push(pair("Job Title", Cell::Text(job.job_title.clone())));
            summary_rows.push(pair(
                "Qualification Threshold",
                Cell::Number(job.qualification_threshold as f64),
            ));
        }
        summary_rows.push(pair("Total Candidates", Cell::Number(progress.total as f64)));
        summary_rows.push(pair("Processed", Cell::Number(progress.processed as f64)));
        summary_rows.push(pair("Qualified", Cell::Number(progress.qualified as f64)));
        summary_rows.push(pair("Usage Cost", Cell::Number(progress.cost)));
        summary_rows.push(pair(
            "Exported At",
            Cell::Text(self.snapshot.exported_at.to_rfc3339()),
        ));
        if let Some(analysis) = &self.snapshot.deep_analysis {
            let mut narrative = narrative_text(&analysis.narrative)?;
            if narrative.chars().count() > EXCEL_CELL_LIMIT {
                narrative = narrative.chars().take(EXCEL_CELL_LIMIT).collect();
            }
            summary_rows.push(pair("Deep Analysis", Cell::Text(narrative)));
        }

        let parts = [
            ("[Content_Types].xml", XLSX_CONTENT_TYPES.to_string()),
            ("_rels/.rels", package_rels("xl/workbook.xml")),
            ("xl/workbook.xml", XLSX_WORKBOOK.to_string()),
            ("xl/_rels/workbook.xml.rels", XLSX_WORKBOOK_RELS.to_string()),
            ("xl/worksheets/sheet1.xml", sheet_xml(&candidate_rows)),
            ("xl/worksheets/sheet2.xml", sheet_xml(&summary_rows)),
        ];
        zip_text_parts(&parts)
    }

    fn docx(&self) -> Result<Vec<u8>> {
        let mut body = String::new();
        for block in self.report_blocks()? {
            match block {
                Block::Title(text) => body.push_str(&word_paragraph(&text, Some(32))),
                Block::Heading(text) => body.push_str(&word_paragraph(&text, Some(24))),
                Block::Text(text) => body.push_str(&word_paragraph(&text, None)),
                Block::Blank => body.push_str("<w:p/>"),
            }
        }

        let document = format!(
            "{}<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            XML_DECLARATION, body
        );
        let parts = [
            ("[Content_Types].xml", DOCX_CONTENT_TYPES.to_string()),
            ("_rels/.rels", package_rels("word/document.xml")),
            ("word/document.xml", document),
        ];
        zip_text_parts(&parts)
    }

    fn pdf(&self) -> Result<Vec<u8>> {
        let mut lines = Vec::new();
        for block in self.report_blocks()? {
            match block {
                Block::Title(text) => {
                    lines.push(text.to_uppercase());
                    lines.push(String::new());
                }
                Block::Heading(text) | Block::Text(text) => {
                    lines.extend(wrap(&text, PDF_LINE_WIDTH))
                }
                Block::Blank => lines.push(String::new()),
            }
        }
        Ok(render_pdf(&lines))
    }

    fn report_blocks(&self) -> Result<Vec<Block>> {
        let snapshot = self.snapshot;
        let progress = &snapshot.progress;
        let mut blocks = vec![Block::Title("Candidate Screening Report".to_string())];

        if let Some(job) = &snapshot.job {
            blocks.push(Block::Text(format!("Position: {}", job.job_title)));
            blocks.push(Block::Text(format!(
                "Qualification threshold: {}%",
                job.qualification_threshold
            )));
        }
        blocks.push(Block::Text(format!(
            "Generated: {}",
            snapshot.exported_at.format("%Y-%m-%d %H:%M UTC")
        )));
        blocks.push(Block::Text(format!(
            "Candidates processed: {}/{} ({} qualified)",
            progress.processed, progress.total, progress.qualified
        )));
        if progress.cost > 0.0 {
            blocks.push(Block::Text(format!("Usage cost: {:.4}", progress.cost)));
        }
        blocks.push(Block::Blank);
        blocks.push(Block::Heading("Ranked Candidates".to_string()));

        for (rank, c) in snapshot.ranked().iter().enumerate() {
            blocks.push(Block::Heading(format!(
                "{}. {} - {:.1}/100 ({})",
                rank + 1,
                c.name,
                c.overall_score,
                if c.qualified { "Qualified" } else { "Not qualified" }
            )));
            blocks.push(Block::Text(format!(
                "Risk level: {} | Availability: {}",
                c.risk_level,
                if c.availability.is_empty() {
                    "-"
                } else {
                    c.availability.as_str()
                }
            )));
            if !c.key_strengths.is_empty() {
                blocks.push(Block::Text(format!(
                    "Key strengths: {}",
                    c.key_strengths.join(", ")
                )));
            }
            if !c.development_areas.is_empty() {
                blocks.push(Block::Text(format!(
                    "Development areas: {}",
                    c.development_areas.join(", ")
                )));
            }
            if !c.scoring_breakdown.is_empty() {
                let scores: Vec<String> = c
                    .scoring_breakdown
                    .iter()
                    .map(|d| format!("{} {}", d.dimension, d.score))
                    .collect();
                blocks.push(Block::Text(format!("Scores: {}", scores.join(", "))));
            }
            if let Some(reason) = &c.rejection_reason {
                blocks.push(Block::Text(format!("Rejection reason: {}", reason)));
            }
            if !c.reasoning.is_empty() {
                blocks.push(Block::Text(format!("Summary: {}", c.reasoning)));
            }
            blocks.push(Block::Blank);
        }

        if let Some(analysis) = &snapshot.deep_analysis {
            blocks.push(Block::Heading("Deep Analysis".to_string()));
            let names: Vec<&str> = analysis
                .candidate_ids
                .iter()
                .map(|id| {
                    snapshot
                        .candidates
                        .iter()
                        .find(|c| &c.id == id)
                        .map_or(id.as_str(), |c| c.name.as_str())
                })
                .collect();
            blocks.push(Block::Text(format!("Candidates: {}", names.join(", "))));
            for line in narrative_text(&analysis.narrative)?.lines() {
                if line.trim().is_empty() {
                    blocks.push(Block::Blank);
                } else {
                    blocks.push(Block::Text(line.to_string()));
                }
            }
        }

        Ok(blocks)
    }
}

fn pair(label: &str, value: Cell) -> Vec<Cell> {
    vec![Cell::Text(label.to_string()), value]
}

/// Dimension names across all candidates, first-seen order.
fn dimension_union(candidates: &[&CandidateResult]) -> Vec<String> {
    let mut dimensions: Vec<String> = Vec::new();
    for candidate in candidates {
        for dimension in candidate.scoring_breakdown.dimensions() {
            if !dimensions.iter().any(|d| d == dimension) {
                dimensions.push(dimension.to_string());
            }
        }
    }
    dimensions
}

fn pattern(expression: &str) -> Result<Regex> {
    Regex::new(expression).map_err(|e| ScreenError::export("report", e.to_string()))
}

/// 深度分析回傳的是已排版的標記文字，輸出為文件前轉成純文字
pub fn narrative_text(markup: &str) -> Result<String> {
    let breaks = pattern(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|ul|ol|tr)>")?;
    let bullets = pattern(r"(?i)<li[^>]*>")?;
    let tags = pattern(r"<[^>]+>")?;
    let markdown_headings = pattern(r"(?m)^#{1,6}\s*")?;
    let blank_runs = pattern(r"\n{3,}")?;

    let text = breaks.replace_all(markup, "\n");
    let text = bullets.replace_all(&text, "- ");
    let text = tags.replace_all(&text, "");
    let text = markdown_headings.replace_all(&text, "");
    let text = decode_entities(&text.replace("**", ""));
    let text = blank_runs.replace_all(&text, "\n\n");

    Ok(text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string())
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            // XML 1.0 不允許的控制字元直接略過
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => escaped.push(c),
        }
    }
    escaped
}

fn zip_parts(parts: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in parts {
        zip.start_file(*name, SimpleFileOptions::default())?;
        zip.write_all(bytes)?;
    }
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

fn zip_text_parts(parts: &[(&str, String)]) -> Result<Vec<u8>> {
    let parts: Vec<(&str, &[u8])> = parts
        .iter()
        .map(|(name, body)| (*name, body.as_bytes()))
        .collect();
    zip_parts(&parts)
}

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";

const XLSX_CONTENT_TYPES: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\"><Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/><Default Extension=\"xml\" ContentType=\"application/xml\"/><Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/><Override PartName=\"/xl/worksheets/sheet1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/><Override PartName=\"/xl/worksheets/sheet2.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/></Types>";

const XLSX_WORKBOOK: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\"><sheets><sheet name=\"Candidates\" sheetId=\"1\" r:id=\"rId1\"/><sheet name=\"Summary\" sheetId=\"2\" r:id=\"rId2\"/></sheets></workbook>";

const XLSX_WORKBOOK_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\"><Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet1.xml\"/><Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet2.xml\"/></Relationships>";

const DOCX_CONTENT_TYPES: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\"><Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/><Default Extension=\"xml\" ContentType=\"application/xml\"/><Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/></Types>";

fn package_rels(target: &str) -> String {
    format!(
        "{}<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\"><Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"{}\"/></Relationships>",
        XML_DECLARATION, target
    )
}

fn column_name(mut index: usize) -> String {
    let mut name = String::new();
    loop {
        name.insert(0, (b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name
}

fn sheet_xml(rows: &[Vec<Cell>]) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(
        "<worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>",
    );
    for (r, row) in rows.iter().enumerate() {
        xml.push_str(&format!("<row r=\"{}\">", r + 1));
        for (c, cell) in row.iter().enumerate() {
            let reference = format!("{}{}", column_name(c), r + 1);
            match cell {
                Cell::Number(value) if value.is_finite() => {
                    xml.push_str(&format!("<c r=\"{}\"><v>{}</v></c>", reference, value))
                }
                Cell::Number(_) => {}
                Cell::Text(text) => xml.push_str(&format!(
                    "<c r=\"{}\" t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
                    reference,
                    xml_escape(text)
                )),
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn word_paragraph(text: &str, bold_size: Option<u32>) -> String {
    let run_properties = match bold_size {
        Some(size) => format!("<w:rPr><w:b/><w:sz w:val=\"{}\"/></w:rPr>", size),
        None => String::new(),
    };
    format!(
        "<w:p><w:r>{}<w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
        run_properties,
        xml_escape(text)
    )
}

/// Greedy word wrap; continuation lines keep the original indentation.
fn wrap(line: &str, width: usize) -> Vec<String> {
    let indent: String = line.chars().take_while(|c| *c == ' ').collect();
    let width = width.max(indent.len() + 1);
    let mut lines = Vec::new();
    let mut current = indent.clone();

    for word in line.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        // 超過整行寬度的單字強制切斷
        while indent.len() + word.len() > width {
            if !current.trim().is_empty() {
                lines.push(std::mem::replace(&mut current, indent.clone()));
            }
            let split = width - indent.len();
            let head: String = word.drain(..split).collect();
            lines.push(format!("{}{}", indent, head));
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current.len() > indent.len() { 1 } else { 0 } + word.len();
        if current.chars().count() + needed > width {
            lines.push(std::mem::replace(&mut current, indent.clone()));
        }
        if current.len() > indent.len() {
            current.push(' ');
        }
        current.extend(word);
    }

    if current.len() > indent.len() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn pdf_escape(line: &str) -> String {
    let mut escaped = String::with_capacity(line.len());
    for ch in line.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '(' => escaped.push_str("\\("),
            ')' => escaped.push_str("\\)"),
            c if c.is_ascii_graphic() || c == ' ' => escaped.push(c),
            c if c.is_whitespace() => escaped.push(' '),
            // 內建 Helvetica 只有 Latin 字集
            _ => escaped.push('?'),
        }
    }
    escaped
}

/// Minimal PDF 1.4: catalog, page tree, one Helvetica font, one content stream per page.
fn render_pdf(lines: &[String]) -> Vec<u8> {
    let mut pages: Vec<&[String]> = lines.chunks(PDF_LINES_PER_PAGE).collect();
    if pages.is_empty() {
        pages.push(&[]);
    }

    let page_ids: Vec<usize> = (0..pages.len()).map(|i| 4 + i * 2).collect();
    let kids: Vec<String> = page_ids.iter().map(|id| format!("{} 0 R", id)).collect();

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];

    for (page, page_id) in pages.iter().zip(&page_ids) {
        let mut content = String::from("BT\n/F1 10 Tf\n14 TL\n50 800 Td\n");
        for line in page.iter() {
            content.push_str(&format!("({}) Tj T*\n", pdf_escape(line)));
        }
        content.push_str("ET");

        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            page_id + 1
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }

    let xref_offset = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        pdf.push_str(&format!("{:010} 00000 n \n", offset));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));
    pdf.into_bytes()
}
