//! chromiumoxide 实现的浏览器控制
//!
//! 启动无头浏览器，在后台任务里消化 CDP 事件流；页面的 HTTP 状态
//! 通过 Performance API 在页面内读取，网络层失败从导航错误文本归类。

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::browser::{BrowserControl, NavOutcome, PageHandle};

/// 读取主文档 HTTP 状态的页面内脚本（Chrome 109+ 提供 responseStatus）
const NAV_STATUS_JS: &str = r#"
(() => {
    const nav = performance.getEntriesByType('navigation')[0];
    return nav && nav.responseStatus ? nav.responseStatus : 0;
})()
"#;

/// chromiumoxide 浏览器
pub struct ChromiumBrowser {
    browser: Mutex<Browser>,
    screenshots_dir: PathBuf,
}

impl ChromiumBrowser {
    /// 启动无头浏览器
    ///
    /// # 参数
    /// - `executable`: 浏览器可执行文件路径（为空则使用系统默认）
    /// - `screenshots_dir`: 截图输出目录
    pub async fn launch(executable: &str, screenshots_dir: impl Into<PathBuf>) -> Result<Self> {
        info!("🚀 启动无头浏览器...");

        let mut builder = BrowserConfig::builder().new_headless_mode().args(vec![
            "--disable-gpu",
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--remote-debugging-port=0",
        ]);
        if !executable.is_empty() {
            builder = builder.chrome_executable(Path::new(executable));
        }
        let config = builder.build().map_err(|e| {
            error!("配置无头浏览器失败: {}", e);
            anyhow::anyhow!("配置无头浏览器失败: {}", e)
        })?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            error!("启动无头浏览器失败: {}", e);
            anyhow::anyhow!("启动无头浏览器失败: {}", e)
        })?;
        debug!("无头浏览器启动成功");

        // 在后台处理浏览器事件
        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        // 添加短暂延迟以等待浏览器状态同步
        sleep(Duration::from_millis(300)).await;

        let screenshots_dir = screenshots_dir.into();
        std::fs::create_dir_all(&screenshots_dir)
            .with_context(|| format!("无法创建截图目录: {}", screenshots_dir.display()))?;

        Ok(Self {
            browser: Mutex::new(browser),
            screenshots_dir,
        })
    }
}

#[async_trait]
impl BrowserControl for ChromiumBrowser {
    async fn new_page(&self) -> Result<Box<dyn PageHandle>> {
        let browser = self.browser.lock().await;
        let page = browser.new_page("about:blank").await.map_err(|e| {
            error!("创建页面失败: {}", e);
            anyhow::anyhow!("创建页面失败: {}", e)
        })?;
        Ok(Box::new(ChromiumPage {
            page,
            screenshots_dir: self.screenshots_dir.clone(),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        debug!("关闭浏览器");
        let mut browser = self.browser.lock().await;
        browser.close().await?;
        Ok(())
    }
}

/// chromiumoxide 页面句柄
pub struct ChromiumPage {
    page: Page,
    screenshots_dir: PathBuf,
}

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> NavOutcome {
        debug!("导航到: {} (超时 {:?})", url, timeout);
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Err(_) => NavOutcome::NetworkError("navigation timeout".to_string()),
            Ok(Err(e)) => {
                // CDP 层错误（ERR_NAME_NOT_RESOLVED 等）统一作为网络失败
                NavOutcome::NetworkError(e.to_string().to_lowercase())
            }
            Ok(Ok(_)) => {
                // 等待可能的重定向安定下来
                sleep(Duration::from_secs(2)).await;
                let status = self
                    .eval(NAV_STATUS_JS)
                    .await
                    .ok()
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u16;
                if status >= 400 {
                    NavOutcome::HttpError(status)
                } else {
                    NavOutcome::Ok
                }
            }
        }
    }

    async fn eval(&self, js_code: &str) -> Result<JsonValue> {
        let result = self.page.evaluate(js_code.to_string()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    async fn screenshot(&self, label: &str) -> Result<PathBuf> {
        let filename = format!(
            "{}_{}.png",
            label,
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        let path = self.screenshots_dir.join(filename);
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(false).build(), &path)
            .await
            .with_context(|| format!("截图失败: {}", path.display()))?;
        debug!("已保存截图: {}", path.display());
        Ok(path)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.page.close().await?;
        Ok(())
    }
}
