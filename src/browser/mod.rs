//! 浏览器控制边界 - 基础设施层
//!
//! 编排器和填表策略只通过这两个窄接口接触浏览器：
//! `BrowserControl` 负责页面的创建与整体回收，`PageHandle` 持有
//! 唯一的页面资源，只暴露导航、执行 JS、截图、关闭四种能力。
//! 导航结果是显式的值（`NavOutcome`），不以异常传递。

pub mod chromium;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

pub use chromium::ChromiumBrowser;

/// 一次页面导航的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    /// 导航成功（2xx/3xx 或状态不可得）
    Ok,
    /// 页面以错误状态加载（404、5xx 等）
    HttpError(u16),
    /// DNS / 连接 / 超时等网络层失败
    NetworkError(String),
}

/// 页面句柄
///
/// 职责：
/// - 持有唯一的页面资源
/// - 暴露 navigate / eval / screenshot / close 能力
/// - 不认识 Posting / Application
/// - 不处理业务流程
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// 导航到指定 URL，超时和网络错误都折叠为 `NavOutcome`
    async fn navigate(&self, url: &str, timeout: Duration) -> NavOutcome;

    /// 执行 JS 代码并返回 JSON 结果
    async fn eval(&self, js_code: &str) -> Result<JsonValue>;

    /// 截图并返回文件路径
    async fn screenshot(&self, label: &str) -> Result<PathBuf>;

    /// 关闭页面
    async fn close(self: Box<Self>) -> Result<()>;
}

/// 浏览器控制接口
#[async_trait]
pub trait BrowserControl: Send + Sync {
    /// 新建一个空白页面
    async fn new_page(&self) -> Result<Box<dyn PageHandle>>;

    /// 回收浏览器资源（运行结束或被取消时必须调用）
    async fn shutdown(&self) -> Result<()>;
}
