use crate::domain::model::{MediaKind, ScreeningRequest, SourceDocument, UploadStatus};
use crate::utils::error::{Result, ScreenError};
use crate::utils::validation::{validate_non_empty_string, validate_range, Validate};
use uuid::Uuid;

pub const MAX_DOCUMENT_BYTES: u64 = 10 * 1024 * 1024;

impl SourceDocument {
    /// 由上傳內容建立文件；沒有可用文字時標記為失敗
    pub fn from_upload(name: &str, bytes: &[u8]) -> Self {
        let kind = MediaKind::from_file_name(name);
        let size = bytes.len() as u64;

        let content = if size > MAX_DOCUMENT_BYTES {
            tracing::warn!("📄 {} exceeds the {} byte upload limit", name, MAX_DOCUMENT_BYTES);
            String::new()
        } else {
            match kind {
                MediaKind::Txt => String::from_utf8_lossy(bytes).trim().to_string(),
                // 文件解析由上游服務負責
                _ => String::new(),
            }
        };

        let status = if content.is_empty() {
            UploadStatus::Failed
        } else {
            UploadStatus::Uploaded
        };

        Self {
            id: format!("file_{}", Uuid::new_v4().simple()),
            name: name.to_string(),
            size,
            content,
            kind,
            status,
        }
    }
}

/// 送出前的待上傳文件清單；`into_request` 取得所有權後即無法再修改
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    documents: Vec<SourceDocument>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, document: SourceDocument) {
        self.documents.push(document);
    }

    pub fn remove(&mut self, id: &str) -> Result<SourceDocument> {
        let position = self
            .documents
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| ScreenError::validation(format!("Unknown document: {}", id)))?;
        Ok(self.documents.remove(position))
    }

    pub fn documents(&self) -> &[SourceDocument] {
        &self.documents
    }

    pub fn submittable(&self) -> Vec<SourceDocument> {
        self.documents
            .iter()
            .filter(|d| d.status == UploadStatus::Uploaded)
            .cloned()
            .collect()
    }

    /// 列出每個沒有可用文字的文件，而不是在送出時默默略過
    pub fn ensure_readable(&self) -> Result<()> {
        let unreadable: Vec<&str> = self
            .documents
            .iter()
            .filter(|d| d.status == UploadStatus::Failed)
            .map(|d| d.name.as_str())
            .collect();
        if unreadable.is_empty() {
            return Ok(());
        }
        Err(ScreenError::validation(format!(
            "No text could be read from: {}",
            unreadable.join(", ")
        )))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn into_request(
        self,
        job_title: &str,
        job_description: &str,
        elimination_conditions: Option<&str>,
        qualification_threshold: u8,
    ) -> Result<ScreeningRequest> {
        let documents = self.submittable();
        let skipped = self.documents.len() - documents.len();
        if skipped > 0 {
            tracing::warn!("📄 Skipping {} document(s) without extracted text", skipped);
        }

        let request = ScreeningRequest {
            job_title: job_title.trim().to_string(),
            job_description: job_description.trim().to_string(),
            elimination_conditions: elimination_conditions
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            qualification_threshold,
            documents,
        };
        request.validate()?;
        Ok(request)
    }
}

impl Validate for ScreeningRequest {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("job_title", &self.job_title)
            .map_err(|_| ScreenError::validation("Please enter a job title"))?;
        validate_non_empty_string("job_description", &self.job_description)
            .map_err(|_| ScreenError::validation("Please enter a job description"))?;
        validate_range("qualification_threshold", self.qualification_threshold, 0, 100)?;

        if !self
            .documents
            .iter()
            .any(|d| d.status == UploadStatus::Uploaded)
        {
            return Err(ScreenError::validation("Please upload at least one CV"));
        }
        Ok(())
    }
}
