use crate::core::export::SessionSnapshot;
use crate::domain::ports::Storage;
use crate::utils::error::{Result, ScreenError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use uuid::Uuid;

pub const SESSIONS_DIR: &str = "sessions";
pub const METADATA_FILE: &str = "sessions_metadata.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Completed,
    /// 串流中斷或取消時保存的部分結果
    Partial,
}

/// 索引中每個已保存篩選的摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub job_title: String,
    pub created_at: DateTime<Utc>,
    pub total: usize,
    pub processed: usize,
    pub qualified: usize,
    pub status: SessionStatus,
}

impl SessionRecord {
    fn describe(id: String, snapshot: &SessionSnapshot) -> Self {
        let progress = &snapshot.progress;
        Self {
            id,
            job_title: snapshot
                .job
                .as_ref()
                .map(|j| j.job_title.clone())
                .unwrap_or_default(),
            created_at: snapshot.exported_at,
            total: progress.total,
            processed: progress.processed,
            qualified: progress.qualified,
            status: if progress.finished_at.is_some() {
                SessionStatus::Completed
            } else {
                SessionStatus::Partial
            },
        }
    }
}

/// Saved screening sessions: one JSON snapshot per session plus a summary index.
pub struct SessionArchive<S: Storage> {
    storage: S,
}

impl<S: Storage> SessionArchive<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn snapshot_path(id: &str) -> String {
        format!("{}/{}.json", SESSIONS_DIR, id)
    }

    /// 只接受 uuid，避免路徑跳脫
    fn checked_id(id: &str) -> Result<String> {
        Uuid::parse_str(id)
            .map(|uuid| uuid.to_string())
            .map_err(|_| ScreenError::validation(format!("Invalid session id '{}'", id)))
    }

    async fn read_index(&self) -> Result<Vec<SessionRecord>> {
        match self.storage.read_file(METADATA_FILE).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(ScreenError::IoError(e)) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn write_index(&self, records: &[SessionRecord]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records)?;
        self.storage.write_file(METADATA_FILE, &bytes).await
    }

    pub async fn save(&self, snapshot: &SessionSnapshot) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.storage
            .write_file(&Self::snapshot_path(&id), &snapshot.to_json()?)
            .await?;

        let mut records = self.read_index().await?;
        records.push(SessionRecord::describe(id.clone(), snapshot));
        self.write_index(&records).await?;

        tracing::info!(
            "🗄️ Archived session {} ({} candidates)",
            id,
            snapshot.candidates.len()
        );
        Ok(id)
    }

    /// Most recent first.
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<SessionRecord>> {
        let mut records = self.read_index().await?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    pub async fn load(&self, id: &str) -> Result<Option<SessionSnapshot>> {
        let id = Self::checked_id(id)?;
        match self.storage.read_file(&Self::snapshot_path(&id)).await {
            Ok(bytes) => SessionSnapshot::from_json(&bytes).map(Some),
            Err(ScreenError::IoError(e)) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Session {} not found", id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// 回傳是否真的有東西被刪除
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let id = Self::checked_id(id)?;
        let removed_file = self.storage.delete_file(&Self::snapshot_path(&id)).await?;

        let mut records = self.read_index().await?;
        let before = records.len();
        records.retain(|r| r.id != id);
        let removed_record = records.len() != before;
        if removed_record {
            self.write_index(&records).await?;
        }

        if removed_file || removed_record {
            tracing::info!("🗑️ Deleted archived session {}", id);
        }
        Ok(removed_file || removed_record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregator::ProgressState;
    use crate::core::export::JobSummary;
    use crate::core::store::test_support::candidate;
    use crate::core::store::ResultStore;
    use crate::domain::ports::test_support::MockStorage;
    use chrono::{Duration, TimeZone};

    fn snapshot(title: &str, minutes: i64, finished: bool) -> SessionSnapshot {
        let at = Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap() + Duration::minutes(minutes);
        let store: ResultStore = vec![
            candidate("a", "Ana", 91.0, true),
            candidate("b", "Ben", 40.0, false),
        ]
        .into_iter()
        .collect();
        let progress = ProgressState {
            total: 3,
            processed: 2,
            qualified: 1,
            started_at: Some(at),
            finished_at: finished.then_some(at),
            ..ProgressState::default()
        };
        let job = JobSummary {
            job_title: title.to_string(),
            job_description: "desc".to_string(),
            elimination_conditions: None,
            qualification_threshold: 80,
            document_count: 3,
        };
        SessionSnapshot::new(Some(job), progress, &store, None, at)
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let archive = SessionArchive::new(MockStorage::new());
        let original = snapshot("Engineer", 0, true);

        let id = archive.save(&original).await.unwrap();
        let loaded = archive.load(&id).await.unwrap().unwrap();

        assert_eq!(loaded, original);
        assert_eq!(
            loaded.restore_store().insertion_order(),
            original.restore_store().insertion_order()
        );
        assert!(archive
            .storage()
            .get_file(&format!("sessions/{}.json", id))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_list_is_most_recent_first_with_limit() {
        let archive = SessionArchive::new(MockStorage::new());
        archive.save(&snapshot("First", 0, true)).await.unwrap();
        archive.save(&snapshot("Third", 20, false)).await.unwrap();
        archive.save(&snapshot("Second", 10, true)).await.unwrap();

        let all = archive.list(None).await.unwrap();
        let titles: Vec<&str> = all.iter().map(|r| r.job_title.as_str()).collect();
        assert_eq!(titles, vec!["Third", "Second", "First"]);
        assert_eq!(all[0].status, SessionStatus::Partial);
        assert_eq!(all[1].status, SessionStatus::Completed);
        assert_eq!((all[1].total, all[1].processed, all[1].qualified), (3, 2, 1));

        assert_eq!(archive.list(Some(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_archive_lists_nothing() {
        let archive = SessionArchive::new(MockStorage::new());
        assert!(archive.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_snapshot_and_index_entry() {
        let archive = SessionArchive::new(MockStorage::new());
        let keep = archive.save(&snapshot("Keep", 0, true)).await.unwrap();
        let dropped = archive.save(&snapshot("Drop", 5, true)).await.unwrap();

        assert!(archive.delete(&dropped).await.unwrap());
        assert!(!archive.delete(&dropped).await.unwrap());

        assert!(archive.load(&dropped).await.unwrap().is_none());
        let remaining = archive.list(None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep);
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_ids() {
        let archive = SessionArchive::new(MockStorage::new());

        let missing = Uuid::new_v4().to_string();
        assert!(archive.load(&missing).await.unwrap().is_none());

        let result = archive.load("../sessions_metadata").await;
        assert!(matches!(result, Err(ScreenError::ValidationError { .. })));
    }
}
