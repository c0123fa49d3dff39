//! 单个职位的处理流程
//!
//! 负责一个待处理职位从建立申请记录到终态落库的全过程。
//! 所有失败都折叠成 `ProcessOutcome`，只有存储层故障才向上冒泡：
//! 导航失败是职位过期，页面结构不匹配是人工审核，策略抛错才算
//! 申请失败。每一步状态变更都先落库再继续。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::browser::{BrowserControl, NavOutcome, PageHandle};
use crate::fillers::PlatformFiller;
use crate::models::{Application, Posting, PostingStatus};
use crate::storage::JobStore;
use crate::utils::truncate_text;

/// 一个职位处理完毕后的结局
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// 已提交并得到页面确认
    Submitted,
    /// 转人工审核（带原因）
    NeedsReview(String),
    /// 申请失败（带错误）
    Failed(String),
    /// 职位已过期或不可达
    Expired(String),
    /// 演练模式，在浏览器交互前停止
    DryRun,
}

/// 职位处理器
pub struct PostingProcessor {
    store: Arc<dyn JobStore>,
    review_mode: bool,
    navigation_timeout: Duration,
}

impl PostingProcessor {
    pub fn new(store: Arc<dyn JobStore>, review_mode: bool, navigation_timeout: Duration) -> Self {
        Self {
            store,
            review_mode,
            navigation_timeout,
        }
    }

    /// 处理一个已匹配到策略的职位
    ///
    /// `dry_run` 为真时在任何浏览器交互之前停止。
    pub async fn process(
        &self,
        browser: Option<&dyn BrowserControl>,
        filler: &PlatformFiller,
        posting: &Posting,
    ) -> Result<ProcessOutcome> {
        info!(
            "▶ 处理职位: {} @ {} [{}]",
            truncate_text(&posting.title, 60),
            posting.company,
            posting.platform
        );

        // 每个职位每轮运行恰好一次申请尝试
        let mut app = Application::from_posting(posting);
        self.store.add_application(&app).await?;

        let browser = match browser {
            Some(browser) => browser,
            None => {
                app.skip("演练模式")?;
                self.store.update_application(&app).await?;
                info!("◌ 演练模式，跳过浏览器交互");
                return Ok(ProcessOutcome::DryRun);
            }
        };

        let page = browser.new_page().await?;
        let outcome = self.drive_page(page.as_ref(), filler, posting, &mut app).await;
        if let Err(e) = page.close().await {
            debug!("关闭页面失败: {}", e);
        }
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                // 审计记录必须与职位的失败结局一致；这里的落库只能尽力而为
                let error = format!("{:#}", e);
                if app.fail(error.as_str()).is_ok() {
                    if let Err(persist) = self.store.update_application(&app).await {
                        warn!("落库失败申请记录失败: {}", persist);
                    }
                }
                return Err(e);
            }
        };
        self.store.update_application(&app).await?;
        self.persist_posting_outcome(posting, &outcome).await?;
        Ok(outcome)
    }

    /// 页面生命周期内的全部交互
    async fn drive_page(
        &self,
        page: &dyn PageHandle,
        filler: &PlatformFiller,
        posting: &Posting,
        app: &mut Application,
    ) -> Result<ProcessOutcome> {
        // 导航失败统一按职位过期处理，不算申请失败
        match page
            .navigate(posting.effective_url(), self.navigation_timeout)
            .await
        {
            NavOutcome::Ok => {}
            NavOutcome::HttpError(status) => {
                let reason = format!("HTTP {}", status);
                warn!("⚠️ 职位不可达: {} ({})", posting.effective_url(), reason);
                app.skip(format!("职位已过期: {}", reason))?;
                return Ok(ProcessOutcome::Expired(reason));
            }
            NavOutcome::NetworkError(error) => {
                warn!("⚠️ 导航失败: {} ({})", posting.effective_url(), error);
                app.skip(format!("职位不可达: {}", error))?;
                return Ok(ProcessOutcome::Expired(error));
            }
        }

        if let Ok(path) = page.screenshot("before_fill").await {
            app.add_screenshot(path.display().to_string());
        }

        app.start()?;
        self.store.update_application(app).await?;

        if !filler.can_handle(page).await {
            debug!("策略 {} 不识别页面结构", filler.platform_name());
            app.request_review("页面结构不匹配")?;
            return Ok(ProcessOutcome::NeedsReview("页面结构不匹配".to_string()));
        }

        let fill_result = filler.fill(page, posting, app).await;

        if let Ok(path) = page.screenshot("after_fill").await {
            app.add_screenshot(path.display().to_string());
        }

        match fill_result {
            Ok(true) if self.review_mode => {
                // 审核模式：即使策略到达了确认的提交也转人工复核
                app.request_review("审核模式")?;
                Ok(ProcessOutcome::NeedsReview("审核模式".to_string()))
            }
            Ok(true) => {
                app.complete()?;
                info!("✓ 申请已提交: {} @ {}", posting.title, posting.company);
                Ok(ProcessOutcome::Submitted)
            }
            Ok(false) => {
                let reason = "策略未到达确认的提交".to_string();
                app.request_review(reason.as_str())?;
                Ok(ProcessOutcome::NeedsReview(reason))
            }
            Err(e) => {
                let error = format!("{:#}", e);
                warn!("❌ 填表异常: {}", error);
                app.fail(error.as_str())?;
                Ok(ProcessOutcome::Failed(error))
            }
        }
    }

    /// 按结局落库职位状态
    async fn persist_posting_outcome(
        &self,
        posting: &Posting,
        outcome: &ProcessOutcome,
    ) -> Result<()> {
        let status = match outcome {
            ProcessOutcome::Submitted => PostingStatus::Applied,
            ProcessOutcome::NeedsReview(_) => PostingStatus::NeedsReview,
            ProcessOutcome::Failed(_) => PostingStatus::Failed,
            ProcessOutcome::Expired(_) => PostingStatus::Expired,
            ProcessOutcome::DryRun => return Ok(()),
        };
        self.store.update_posting_status(&posting.id, status).await
    }
}
