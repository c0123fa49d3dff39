//! 职位模型
//!
//! 职位是抓取、去重与准入的基本单位。来源连接器负责创建；
//! 编排器只修改状态和平台分类，聚合器只在重定向解析后改写 apply_url。
//! 职位从不删除，只做状态转移。

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// 申请表单所在的平台分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Greenhouse,
    Lever,
    Workday,
    LinkedinEasy,
    Icims,
    Taleo,
    Ashby,
    /// 公司自建申请页
    Custom,
    Unknown,
}

impl Default for Platform {
    fn default() -> Self {
        Platform::Unknown
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Greenhouse => "greenhouse",
            Platform::Lever => "lever",
            Platform::Workday => "workday",
            Platform::LinkedinEasy => "linkedin_easy",
            Platform::Icims => "icims",
            Platform::Taleo => "taleo",
            Platform::Ashby => "ashby",
            Platform::Custom => "custom",
            Platform::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// 职位生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingStatus {
    Pending,
    Applied,
    NeedsReview,
    Failed,
    Expired,
}

impl fmt::Display for PostingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PostingStatus::Pending => "pending",
            PostingStatus::Applied => "applied",
            PostingStatus::NeedsReview => "needs_review",
            PostingStatus::Failed => "failed",
            PostingStatus::Expired => "expired",
        };
        write!(f, "{}", name)
    }
}

/// 职位
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posting {
    /// 稳定标识：来源分配的 ID，缺失时取规范 URL 的哈希
    pub id: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: String,
    /// 规范 URL（去重宇宙中大小写、尾部斜杠不敏感地唯一）
    pub url: String,
    /// 重定向解析后的实际申请地址（可选）
    #[serde(default)]
    pub apply_url: Option<String>,
    /// 职位描述（可选，供 LLM 上下文使用）
    #[serde(default)]
    pub description: Option<String>,
    /// 来源名称
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub platform: Platform,
    pub status: PostingStatus,
    pub discovered_at: DateTime<Local>,
    #[serde(default)]
    pub applied_at: Option<DateTime<Local>>,
    /// 来源提供的原始数据，仅用于审计
    #[serde(default)]
    pub raw: JsonValue,
}

impl Posting {
    /// 由来源连接器创建职位
    pub fn new(
        source_id: Option<&str>,
        title: impl Into<String>,
        company: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let url = url.into();
        let id = match source_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Self::hash_url(&url),
        };
        Self {
            id,
            title: title.into(),
            company: company.into(),
            location: String::new(),
            url,
            apply_url: None,
            description: None,
            source: source.into(),
            platform: Platform::Unknown,
            status: PostingStatus::Pending,
            discovered_at: Local::now(),
            applied_at: None,
            raw: JsonValue::Null,
        }
    }

    /// 规范 URL 的哈希，作为缺省标识
    fn hash_url(url: &str) -> String {
        let mut hasher = DefaultHasher::new();
        normalize_url(url).hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    /// 实际用于导航的地址：优先 apply_url
    pub fn effective_url(&self) -> &str {
        self.apply_url.as_deref().unwrap_or(&self.url)
    }
}

/// URL 规范化：小写 + 去掉恰好一个尾部斜杠
///
/// 去重集合与职位标识共用这一定义。
pub fn normalize_url(url: &str) -> String {
    let lower = url.to_lowercase();
    match lower.strip_suffix('/') {
        Some(stripped) => stripped.to_string(),
        None => lower,
    }
}
