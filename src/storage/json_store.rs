//! JSON 文件仓储
//!
//! 单机场景下的仓储实现：全部状态保存在一个 JSON 文件里，
//! 每次变更同步落盘。文件不存在时从空库开始。

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Application, Platform, Posting, PostingStatus};
use crate::storage::JobStore;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    postings: Vec<Posting>,
    #[serde(default)]
    applications: Vec<Application>,
}

/// JSON 文件仓储
pub struct JsonStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonStore {
    /// 打开（或新建）仓储文件
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("无法读取存储文件: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("无法解析存储文件: {}", path.display()))?
        } else {
            StoreState::default()
        };
        debug!(
            "存储已加载: {} 个职位, {} 条申请",
            state.postings.len(),
            state.applications.len()
        );
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("无法写入存储文件: {}", self.path.display()))?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        // 锁被毒化说明持有锁的线程 panic 了，状态仍可用
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    pub(crate) fn applications_snapshot(&self) -> Vec<Application> {
        self.lock().applications.clone()
    }
}

#[async_trait]
impl JobStore for JsonStore {
    async fn get_pending_postings(&self, limit: usize) -> Result<Vec<Posting>> {
        let state = self.lock();
        Ok(state
            .postings
            .iter()
            .filter(|p| p.status == PostingStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn upsert_postings(&self, postings: &[Posting]) -> Result<()> {
        let mut state = self.lock();
        for posting in postings {
            match state.postings.iter_mut().find(|p| p.id == posting.id) {
                Some(existing) => *existing = posting.clone(),
                None => state.postings.push(posting.clone()),
            }
        }
        self.persist(&state)
    }

    async fn update_posting_status(&self, id: &str, status: PostingStatus) -> Result<()> {
        let mut state = self.lock();
        if let Some(posting) = state.postings.iter_mut().find(|p| p.id == id) {
            posting.status = status;
            if status == PostingStatus::Applied {
                posting.applied_at = Some(chrono::Local::now());
            }
        }
        self.persist(&state)
    }

    async fn set_posting_platform(&self, id: &str, platform: Platform) -> Result<()> {
        let mut state = self.lock();
        if let Some(posting) = state.postings.iter_mut().find(|p| p.id == id) {
            posting.platform = platform;
        }
        self.persist(&state)
    }

    async fn add_application(&self, app: &Application) -> Result<()> {
        let mut state = self.lock();
        state.applications.push(app.clone());
        self.persist(&state)
    }

    async fn update_application(&self, app: &Application) -> Result<()> {
        let mut state = self.lock();
        match state.applications.iter_mut().find(|a| a.id == app.id) {
            Some(existing) => *existing = app.clone(),
            None => state.applications.push(app.clone()),
        }
        self.persist(&state)
    }

    async fn list_all_posting_urls(&self) -> Result<Vec<String>> {
        let state = self.lock();
        Ok(state.postings.iter().map(|p| p.url.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "auto_applier_store_{}_{}.json",
            name,
            std::process::id()
        ))
    }

    fn sample_posting(n: u32) -> Posting {
        Posting::new(
            Some(&format!("p-{}", n)),
            format!("Engineer {}", n),
            "Acme",
            format!("https://x.com/job/{}", n),
            "test",
        )
    }

    #[tokio::test]
    async fn test_upsert_and_pending() {
        let path = temp_path("pending");
        let _ = std::fs::remove_file(&path);
        let store = JsonStore::open(&path).unwrap();

        store
            .upsert_postings(&[sample_posting(1), sample_posting(2)])
            .await
            .unwrap();
        let pending = store.get_pending_postings(10).await.unwrap();
        assert_eq!(pending.len(), 2);

        store
            .update_posting_status("p-1", PostingStatus::Applied)
            .await
            .unwrap();
        let pending = store.get_pending_postings(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "p-2");

        // 重新打开应看到同样的状态
        let reopened = JsonStore::open(&path).unwrap();
        let urls = reopened.list_all_posting_urls().await.unwrap();
        assert_eq!(urls.len(), 2);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_application_roundtrip() {
        let path = temp_path("apps");
        let _ = std::fs::remove_file(&path);
        let store = JsonStore::open(&path).unwrap();

        let posting = sample_posting(1);
        let mut app = Application::from_posting(&posting);
        store.add_application(&app).await.unwrap();

        app.start().unwrap();
        app.complete().unwrap();
        store.update_application(&app).await.unwrap();

        let reopened = JsonStore::open(&path).unwrap();
        let state = reopened.lock();
        assert_eq!(state.applications.len(), 1);
        assert_eq!(
            state.applications[0].status,
            crate::models::ApplicationStatus::Submitted
        );
        drop(state);

        let _ = std::fs::remove_file(&path);
    }
}
