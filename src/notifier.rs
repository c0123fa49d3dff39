//! ntfy 推送通知
//!
//! 通知是尽力而为的旁路：发送失败只记日志，绝不影响运行主流程。
//! 未配置主题时整个通知器不存在（`from_config` 返回 `None`）。

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{Application, Posting};

/// ntfy 推送通知器
pub struct NtfyNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl NtfyNotifier {
    /// 按配置构建；主题为空则通知功能整体关闭
    pub fn from_config(config: &Config) -> Option<Self> {
        if config.ntfy_topic.is_empty() {
            debug!("未配置 ntfy 主题，通知功能关闭");
            return None;
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .ok()?;
        Some(Self {
            client,
            endpoint: format!(
                "{}/{}",
                config.ntfy_server.trim_end_matches('/'),
                config.ntfy_topic
            ),
        })
    }

    /// 发送一条推送；失败只记日志
    async fn push(&self, title: &str, body: String, priority: &str, tags: &str) {
        let result = self
            .client
            .post(&self.endpoint)
            .header("Title", title)
            .header("Priority", priority)
            .header("Tags", tags)
            .body(body)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                debug!("📤 已推送通知: {}", title);
            }
            Ok(response) => warn!("推送通知被拒绝: HTTP {}", response.status()),
            Err(e) => warn!("推送通知失败: {}", e),
        }
    }

    /// 某个申请需要人工接管
    pub async fn notify_needs_review(&self, application: &Application, reason: &str) {
        self.push(
            "需要人工审核",
            format!(
                "{} @ {}\n{}\n原因: {}",
                application.job_title, application.company, application.job_url, reason
            ),
            "high",
            "eyes",
        )
        .await;
    }

    /// 某个没有自动策略的职位需要手动申请
    pub async fn notify_manual_apply(&self, posting: &Posting) {
        self.push(
            "需要手动申请",
            format!(
                "{} @ {}\n{}\n平台: {}",
                posting.title,
                posting.company,
                posting.effective_url(),
                posting.platform
            ),
            "default",
            "memo",
        )
        .await;
    }

    /// 申请提交成功
    pub async fn notify_submitted(&self, application: &Application) {
        self.push(
            "申请已提交",
            format!(
                "{} @ {}\n{}",
                application.job_title, application.company, application.job_url
            ),
            "default",
            "white_check_mark",
        )
        .await;
    }

    /// 申请失败
    pub async fn notify_failed(&self, application: &Application, error: &str) {
        self.push(
            "申请失败",
            format!(
                "{} @ {}\n错误: {}",
                application.job_title, application.company, error
            ),
            "high",
            "x",
        )
        .await;
    }

    /// 整轮运行结束的汇总
    pub async fn notify_run_summary(&self, summary: String) {
        self.push("本轮运行结束", summary, "default", "bar_chart").await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_topic() {
        let mut config = Config::default();
        config.ntfy_topic = String::new();
        assert!(NtfyNotifier::from_config(&config).is_none());
    }

    #[test]
    fn test_endpoint_joins_server_and_topic() {
        let mut config = Config::default();
        config.ntfy_server = "https://ntfy.sh/".to_string();
        config.ntfy_topic = "my-jobs".to_string();
        let notifier = NtfyNotifier::from_config(&config).expect("应该启用");
        assert_eq!(notifier.endpoint, "https://ntfy.sh/my-jobs");
    }
}
