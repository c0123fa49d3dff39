//! LinkedIn Easy Apply 的填表策略
//!
//! 与托管表单不同，Easy Apply 是模态框里的多步向导：每一步填完
//! 当前可见字段后点 Next / Review，最后一步点 Submit application。
//! 步数不可预知，用 `max_steps` 做硬预算防止死循环；提交后必须在
//! 页面上看到 "application sent" 这类确认文案才算成功。

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::PageHandle;
use crate::fillers::form::{self, FillContext};
use crate::fillers::FormFiller;
use crate::models::{Application, Posting};

const CONFIRMATION_PHRASES: &[&str] = &[
    "application sent",
    "your application was sent",
    "done",
];

/// 每步之间等模态框重渲染的时间
const STEP_SETTLE: Duration = Duration::from_millis(1500);

pub struct LinkedinFiller {
    ctx: FillContext,
}

impl LinkedinFiller {
    pub fn new(ctx: FillContext) -> Self {
        Self { ctx }
    }

    /// 当前步是否已经是最终提交步
    async fn at_submit_step(&self, page: &dyn PageHandle) -> bool {
        form::element_exists(page, "button[aria-label='Submit application']").await
    }

    async fn open_easy_apply(&self, page: &dyn PageHandle) -> Result<bool> {
        form::click_button(
            page,
            &[
                "button.jobs-apply-button--easy-apply",
                "button[aria-label*='Easy Apply']",
                ".jobs-apply-button",
            ],
            &["easy apply"],
        )
        .await
    }
}

#[async_trait]
impl FormFiller for LinkedinFiller {
    fn platform_name(&self) -> &'static str {
        "linkedin_easy"
    }

    async fn can_handle(&self, page: &dyn PageHandle) -> bool {
        form::element_exists(page, "button.jobs-apply-button--easy-apply").await
            || form::element_exists(page, "button[aria-label*='Easy Apply']").await
    }

    async fn fill(
        &self,
        page: &dyn PageHandle,
        posting: &Posting,
        application: &mut Application,
    ) -> Result<bool> {
        info!(
            "📝 LinkedIn Easy Apply: {} @ {}",
            posting.title, posting.company
        );

        if !self.open_easy_apply(page).await? {
            application.add_log("open_failed", "Easy Apply 入口不可点击", None);
            return Ok(false);
        }
        sleep(STEP_SETTLE).await;

        for step in 1..=self.ctx.max_steps {
            application.current_step = step;
            debug!("Easy Apply 第 {} 步", step);

            let unresolved =
                form::fill_visible_fields(&self.ctx, page, posting, application).await?;
            if unresolved {
                application.add_log("fields_unresolved", "存在未解析的必填字段", None);
                return Ok(false);
            }

            if self.at_submit_step(page).await {
                let clicked = form::click_button(
                    page,
                    &["button[aria-label='Submit application']"],
                    &["submit application"],
                )
                .await?;
                if !clicked {
                    application.add_log("submit_missing", "提交按钮不可点击", None);
                    return Ok(false);
                }
                application.add_log("submit_clicked", "已点击提交", None);
                sleep(Duration::from_secs(3)).await;

                let confirmed = form::page_text_contains(page, CONFIRMATION_PHRASES).await;
                if confirmed {
                    info!("✓ Easy Apply 提交已确认");
                } else {
                    debug!("提交后未见确认文案");
                    application.add_log("no_confirmation", "提交后未见确认文案", None);
                }
                return Ok(confirmed);
            }

            // 还不是最后一步：Review 优先，其次 Next / Continue
            let advanced = form::click_button(
                page,
                &[
                    "button[aria-label='Review your application']",
                    "button[aria-label='Continue to next step']",
                ],
                &["review", "next", "continue"],
            )
            .await?;
            if !advanced {
                application.add_log("stuck", format!("第 {} 步无法前进", step), None);
                return Ok(false);
            }
            sleep(STEP_SETTLE).await;
        }

        warn!("⚠️ Easy Apply 超出步数预算 ({} 步)", self.ctx.max_steps);
        application.add_log(
            "step_budget_exhausted",
            format!("超出 {} 步预算", self.ctx.max_steps),
            None,
        );
        Ok(false)
    }
}
