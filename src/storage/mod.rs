//! 存储层
//!
//! 职位与申请通过仓储接口持久化；存储引擎内部不在本系统范围内，
//! 这里提供一个 JSON 文件实现用于单机运行和测试。

pub mod json_store;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Application, Platform, Posting, PostingStatus};

/// 仓储接口
///
/// 编排器的所有持久化写入都是同步完成后才继续处理下一个职位，
/// 崩溃后只有正在处理中的那一个职位可能处于中间状态。
#[async_trait]
pub trait JobStore: Send + Sync {
    /// 取出至多 limit 个待处理职位
    async fn get_pending_postings(&self, limit: usize) -> Result<Vec<Posting>>;

    /// 写入新抓取的职位（按 id 幂等）
    async fn upsert_postings(&self, postings: &[Posting]) -> Result<()>;

    /// 更新职位状态
    async fn update_posting_status(&self, id: &str, status: PostingStatus) -> Result<()>;

    /// 更新职位的平台分类
    async fn set_posting_platform(&self, id: &str, platform: Platform) -> Result<()>;

    /// 新建一条申请记录
    async fn add_application(&self, app: &Application) -> Result<()>;

    /// 更新申请记录
    async fn update_application(&self, app: &Application) -> Result<()>;

    /// 列出库中全部职位 URL（用于填充去重集合）
    async fn list_all_posting_urls(&self) -> Result<Vec<String>>;
}

pub use json_store::JsonStore;
