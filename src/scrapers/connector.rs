//! 来源连接器接口
//!
//! 每个连接器独立抓取一个职位来源。连接器内部的解析逻辑是外部
//! 协作方，这里只约定契约：聚合器会独立调用每个连接器，并把
//! 连接器故障隔离在其自身（记日志、贡献零条职位，绝不中止聚合）。

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Posting;

/// 来源连接器
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// 来源名称（用于统计和日志）
    fn name(&self) -> &str;

    /// 抓取职位
    ///
    /// # 参数
    /// - `keywords`: 搜索关键词（可为空）
    /// - `location`: 地点（可为空）
    /// - `limit`: 本次抓取上限
    async fn scrape(&self, keywords: &[String], location: &str, limit: usize)
        -> Result<Vec<Posting>>;
}
