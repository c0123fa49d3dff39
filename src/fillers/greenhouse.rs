//! Greenhouse 托管申请页的填表策略
//!
//! Greenhouse 的申请表是单页结构：全部字段在同一个 `#application_form`
//! 下，提交后跳转到确认文案页面。简历上传字段无法自动处理，遇到
//! 必填的上传项直接转人工审核。

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::browser::PageHandle;
use crate::fillers::form::{self, FillContext};
use crate::fillers::FormFiller;
use crate::models::{Application, Posting};

/// 提交后的确认文案（任一命中即视为提交成功）
const CONFIRMATION_PHRASES: &[&str] = &[
    "thank you for applying",
    "your application has been submitted",
    "application submitted",
];

pub struct GreenhouseFiller {
    ctx: FillContext,
}

impl GreenhouseFiller {
    pub fn new(ctx: FillContext) -> Self {
        Self { ctx }
    }

    /// 必填的简历上传项没法自动处理
    async fn has_required_upload(&self, page: &dyn PageHandle) -> bool {
        form::element_exists(page, "input[type='file'][required]").await
            || form::element_exists(page, "#resume_fieldset input[type='file']").await
    }
}

#[async_trait]
impl FormFiller for GreenhouseFiller {
    fn platform_name(&self) -> &'static str {
        "greenhouse"
    }

    async fn can_handle(&self, page: &dyn PageHandle) -> bool {
        form::element_exists(page, "#application_form").await
            || form::element_exists(page, "#application-form").await
            || form::element_exists(page, "form[action*='greenhouse']").await
    }

    async fn fill(
        &self,
        page: &dyn PageHandle,
        posting: &Posting,
        application: &mut Application,
    ) -> Result<bool> {
        info!("📝 Greenhouse 填表: {} @ {}", posting.title, posting.company);
        application.total_steps = Some(1);
        application.current_step = 1;

        if self.has_required_upload(page).await {
            application.add_log("upload_required", "存在必填的简历上传项", None);
            debug!("必填上传项，转人工审核");
            return Ok(false);
        }

        let unresolved = form::fill_visible_fields(&self.ctx, page, posting, application).await?;
        if unresolved {
            application.add_log("fields_unresolved", "存在未解析的必填字段", None);
            return Ok(false);
        }

        let clicked = form::click_button(
            page,
            &["#submit_app", "input[type='submit']", "button[type='submit']"],
            &["submit application", "submit"],
        )
        .await?;
        if !clicked {
            application.add_log("submit_missing", "找不到提交按钮", None);
            return Ok(false);
        }
        application.add_log("submit_clicked", "已点击提交", None);

        // 等待确认页渲染；拿不到明确确认就不认为已提交
        sleep(Duration::from_secs(3)).await;
        let confirmed = form::page_text_contains(page, CONFIRMATION_PHRASES).await;
        if confirmed {
            info!("✓ Greenhouse 提交已确认");
        } else {
            debug!("提交后未见确认文案");
            application.add_log("no_confirmation", "提交后未见确认文案", None);
        }
        Ok(confirmed)
    }
}
