//! Lever 托管申请页的填表策略
//!
//! 与 Greenhouse 同为单页表单，差异在选择器与确认文案。

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::browser::PageHandle;
use crate::fillers::form::{self, FillContext};
use crate::fillers::FormFiller;
use crate::models::{Application, Posting};

const CONFIRMATION_PHRASES: &[&str] = &[
    "application has been received",
    "thank you for your interest",
    "application submitted",
];

pub struct LeverFiller {
    ctx: FillContext,
}

impl LeverFiller {
    pub fn new(ctx: FillContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl FormFiller for LeverFiller {
    fn platform_name(&self) -> &'static str {
        "lever"
    }

    async fn can_handle(&self, page: &dyn PageHandle) -> bool {
        form::element_exists(page, "form#application-form").await
            || form::element_exists(page, ".application-form").await
            || form::element_exists(page, "form[action*='lever']").await
    }

    async fn fill(
        &self,
        page: &dyn PageHandle,
        posting: &Posting,
        application: &mut Application,
    ) -> Result<bool> {
        info!("📝 Lever 填表: {} @ {}", posting.title, posting.company);
        application.total_steps = Some(1);
        application.current_step = 1;

        if form::element_exists(page, "input[type='file'][required]").await {
            application.add_log("upload_required", "存在必填的简历上传项", None);
            return Ok(false);
        }

        let unresolved = form::fill_visible_fields(&self.ctx, page, posting, application).await?;
        if unresolved {
            application.add_log("fields_unresolved", "存在未解析的必填字段", None);
            return Ok(false);
        }

        let clicked = form::click_button(
            page,
            &[
                "button[data-qa='btn-submit']",
                ".postings-btn[type='submit']",
                "button[type='submit']",
            ],
            &["submit application", "submit"],
        )
        .await?;
        if !clicked {
            application.add_log("submit_missing", "找不到提交按钮", None);
            return Ok(false);
        }
        application.add_log("submit_clicked", "已点击提交", None);

        sleep(Duration::from_secs(3)).await;
        let confirmed = form::page_text_contains(page, CONFIRMATION_PHRASES).await;
        if confirmed {
            info!("✓ Lever 提交已确认");
        } else {
            debug!("提交后未见确认文案");
            application.add_log("no_confirmation", "提交后未见确认文案", None);
        }
        Ok(confirmed)
    }
}
