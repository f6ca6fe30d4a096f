use crate::domain::model::{
    DeepAnalysisRequest, DeepAnalysisResponse, ExportFormat, ScreeningRequest,
};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn delete_file(&self, path: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn service_endpoint(&self) -> &str;
    fn output_path(&self) -> &str;
    fn export_formats(&self) -> &[ExportFormat];
    fn top_n(&self) -> Option<usize>;
    fn deep_analysis_enabled(&self) -> bool;
    fn bundle_exports(&self) -> bool;
    fn archive_sessions(&self) -> bool;
}

/// 串流回應的原始位元組區塊來源
#[async_trait]
pub trait ChunkStream: Send {
    /// `Ok(None)` 代表連線正常結束
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// 遠端推理服務：篩選（串流）與深度分析（單次回應）
#[async_trait]
pub trait ScreeningService: Send + Sync {
    async fn submit_screening(&self, request: &ScreeningRequest) -> Result<Box<dyn ChunkStream>>;
    async fn submit_deep_analysis(
        &self,
        request: &DeepAnalysisRequest,
    ) -> Result<DeepAnalysisResponse>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Storage;
    use crate::utils::error::{Result, ScreenError};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    pub struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
        fail_writes_to: Option<String>,
    }

    impl MockStorage {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every write to a path ending in `suffix` fails.
        pub fn failing_writes(suffix: &str) -> Self {
            Self {
                fail_writes_to: Some(suffix.to_string()),
                ..Self::default()
            }
        }

        pub async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }

        pub async fn paths(&self) -> Vec<String> {
            let files = self.files.lock().await;
            let mut paths: Vec<String> = files.keys().cloned().collect();
            paths.sort();
            paths
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                ScreenError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            if let Some(suffix) = &self.fail_writes_to {
                if path.ends_with(suffix.as_str()) {
                    return Err(ScreenError::IoError(std::io::Error::new(
                        std::io::ErrorKind::PermissionDenied,
                        format!("read-only: {}", path),
                    )));
                }
            }
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        async fn delete_file(&self, path: &str) -> Result<bool> {
            let mut files = self.files.lock().await;
            Ok(files.remove(path).is_some())
        }
    }
}
