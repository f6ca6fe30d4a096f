use crate::config::toml_config::ServiceConfig;
use crate::domain::model::{DeepAnalysisRequest, DeepAnalysisResponse, ScreeningRequest};
use crate::domain::ports::{ChunkStream, ScreeningService};
use crate::utils::error::{Result, ScreenError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 篩選請求的傳輸格式
#[derive(Debug, Serialize)]
struct ScreeningPayload<'a> {
    job_title: &'a str,
    job_description: &'a str,
    elimination_conditions: Option<&'a str>,
    qualification_threshold: u8,
    cvs: Vec<CvPayload<'a>>,
}

#[derive(Debug, Serialize)]
struct CvPayload<'a> {
    id: &'a str,
    name: &'a str,
    content: &'a str,
}

impl<'a> From<&'a ScreeningRequest> for ScreeningPayload<'a> {
    fn from(request: &'a ScreeningRequest) -> Self {
        Self {
            job_title: &request.job_title,
            job_description: &request.job_description,
            elimination_conditions: request
                .elimination_conditions
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty()),
            qualification_threshold: request.qualification_threshold,
            cvs: request
                .documents
                .iter()
                .map(|d| CvPayload {
                    id: &d.id,
                    name: &d.name,
                    content: &d.content,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// reqwest 實作的遠端篩選服務
pub struct HttpScreeningService {
    client: Client,
    config: ServiceConfig,
}

impl HttpScreeningService {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        // 串流可能持續數分鐘，整體逾時只套用在單次回應的請求
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn with_headers(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(headers) = &self.config.headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }
        request
    }

    fn with_timeout(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.timeout_seconds {
            Some(timeout) => request.timeout(Duration::from_secs(timeout)),
            None => request,
        }
    }

    pub async fn health_check(&self) -> Result<HealthStatus> {
        let url = self.config.url(&self.config.health_path);
        tracing::debug!("Checking service health at: {}", url);

        let request = self.with_timeout(self.with_headers(self.client.get(&url)));
        let response = ensure_success(request.send().await?).await?;
        let health: HealthStatus = response.json().await?;

        tracing::info!(
            "🩺 Service {} reports '{}'",
            health.service.as_deref().unwrap_or("unknown"),
            health.status
        );
        Ok(health)
    }
}

#[async_trait]
impl ScreeningService for HttpScreeningService {
    async fn submit_screening(&self, request: &ScreeningRequest) -> Result<Box<dyn ChunkStream>> {
        let url = self.config.url(&self.config.screening_path);
        tracing::debug!("Opening screening stream at: {}", url);

        let response = self
            .with_headers(self.client.post(&url))
            .header("Accept", "text/event-stream")
            .json(&ScreeningPayload::from(request))
            .send()
            .await?;
        tracing::debug!("Screening response status: {}", response.status());

        let response = ensure_success(response).await?;
        Ok(Box::new(HttpChunkStream { response }))
    }

    async fn submit_deep_analysis(
        &self,
        request: &DeepAnalysisRequest,
    ) -> Result<DeepAnalysisResponse> {
        let url = self.config.url(&self.config.deep_analysis_path);
        tracing::debug!("Submitting deep analysis to: {}", url);

        let builder = self.with_timeout(self.with_headers(self.client.post(&url)));
        let response = ensure_success(builder.json(request).send().await?).await?;
        let body: serde_json::Value = response.json().await?;

        if body.get("success").and_then(|s| s.as_bool()) == Some(false) {
            let message = body
                .get("error")
                .or_else(|| body.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("service reported failure")
                .to_string();
            return Err(ScreenError::DeepAnalysisError { message });
        }

        serde_json::from_value(body).map_err(|e| ScreenError::DeepAnalysisError {
            message: format!("unexpected response: {}", e),
        })
    }
}

/// 非 2xx 時讀出錯誤內容；FastAPI 會放在 `detail`
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or(body);

    Err(ScreenError::ApiError {
        status: status.as_u16(),
        message,
    })
}

pub struct HttpChunkStream {
    response: Response,
}

#[async_trait]
impl ChunkStream for HttpChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let chunk = self.response.chunk().await?;
        Ok(chunk.map(|bytes| bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::SourceDocument;
    use httpmock::prelude::*;
    use tokio_test::assert_err;

    fn service_config(server: &MockServer) -> ServiceConfig {
        ServiceConfig {
            endpoint: server.base_url(),
            screening_path: "/api/o3/screening-stream".to_string(),
            deep_analysis_path: "/api/o3/deep-analysis".to_string(),
            health_path: "/health".to_string(),
            timeout_seconds: Some(5),
            headers: Some([("Authorization".to_string(), "Bearer t0k".to_string())].into()),
        }
    }

    fn request() -> ScreeningRequest {
        ScreeningRequest {
            job_title: "Engineer".to_string(),
            job_description: "Builds things".to_string(),
            elimination_conditions: Some("   ".to_string()),
            qualification_threshold: 80,
            documents: vec![SourceDocument::from_upload("ana.txt", b"Ana, 5 years Rust")],
        }
    }

    #[test]
    fn test_payload_nulls_blank_elimination_conditions() {
        let request = request();
        let payload = serde_json::to_value(ScreeningPayload::from(&request)).unwrap();

        assert_eq!(payload["elimination_conditions"], serde_json::Value::Null);
        assert_eq!(payload["qualification_threshold"], 80);
        assert_eq!(payload["cvs"][0]["name"], "ana.txt");
        assert_eq!(payload["cvs"][0]["content"], "Ana, 5 years Rust");
    }

    #[tokio::test]
    async fn test_screening_stream_yields_body_bytes() {
        let server = MockServer::start();
        let body = "data: {\"event\":\"screening_started\",\"data\":{\"total\":1}}\n\n";
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/o3/screening-stream")
                .header("Authorization", "Bearer t0k")
                .body_contains("\"job_title\":\"Engineer\"");
            then.status(200)
                .header("Content-Type", "text/event-stream")
                .body(body);
        });

        let service = HttpScreeningService::new(service_config(&server)).unwrap();
        let mut stream = service.submit_screening(&request()).await.unwrap();

        let mut received = Vec::new();
        while let Some(chunk) = stream.next_chunk().await.unwrap() {
            received.extend(chunk);
        }

        mock.assert();
        assert_eq!(String::from_utf8(received).unwrap(), body);
    }

    #[tokio::test]
    async fn test_error_status_uses_detail_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/o3/screening-stream");
            then.status(503)
                .json_body(serde_json::json!({"detail": "O3 service not available"}));
        });

        let service = HttpScreeningService::new(service_config(&server)).unwrap();
        let result = service.submit_screening(&request()).await;

        match result {
            Err(ScreenError::ApiError { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "O3 service not available");
            }
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[tokio::test]
    async fn test_deep_analysis_reads_dashboard() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/o3/deep-analysis");
            then.status(200).json_body(serde_json::json!({
                "success": true,
                "dashboard": "## Ana leads",
                "html_content": "<h2>Ana leads</h2>",
                "candidates_analyzed": 2
            }));
        });

        let service = HttpScreeningService::new(service_config(&server)).unwrap();
        let response = service
            .submit_deep_analysis(&DeepAnalysisRequest {
                job_title: "Engineer".to_string(),
                job_description: "Builds things".to_string(),
                candidates: vec![],
            })
            .await
            .unwrap();

        assert_eq!(response.narrative, "## Ana leads");
        assert_eq!(response.processing_seconds, None);
    }

    #[tokio::test]
    async fn test_deep_analysis_reported_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/o3/deep-analysis");
            then.status(200)
                .json_body(serde_json::json!({"success": false, "error": "quota exceeded"}));
        });

        let service = HttpScreeningService::new(service_config(&server)).unwrap();
        let result = service
            .submit_deep_analysis(&DeepAnalysisRequest {
                job_title: "Engineer".to_string(),
                job_description: "Builds things".to_string(),
                candidates: vec![],
            })
            .await;

        let err = assert_err!(result);
        assert!(matches!(err, ScreenError::DeepAnalysisError { ref message } if message == "quota exceeded"));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/health");
            then.status(200).json_body(serde_json::json!({
                "status": "healthy",
                "service": "job-matching",
                "version": "1.0.0"
            }));
        });

        let service = HttpScreeningService::new(service_config(&server)).unwrap();
        let health = service.health_check().await.unwrap();

        mock.assert();
        assert!(health.is_healthy());
        assert_eq!(health.version.as_deref(), Some("1.0.0"));
    }
}
