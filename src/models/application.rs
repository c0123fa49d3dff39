//! 申请模型与生命周期状态机
//!
//! 一个 `Application` 对应某个职位的一次申请尝试。状态转移只由编排器
//! 驱动；填表策略通过窄接口追加问题和日志。每次状态转移后都会被
//! 同步持久化，以保证崩溃后可恢复。
//!
//! ```text
//! Pending ──start──> InProgress ──complete──> Submitted
//!    │                   │ ├──request_review──> NeedsReview
//!    │                   │ └──fail──> Failed
//!    └──skip──> Skipped  └（任意非终态可 fail）
//! ```

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::posting::{Platform, Posting};

/// 申请生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    InProgress,
    NeedsReview,
    Submitted,
    Failed,
    Skipped,
}

impl ApplicationStatus {
    /// 本次尝试的终态
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Submitted
                | ApplicationStatus::NeedsReview
                | ApplicationStatus::Failed
                | ApplicationStatus::Skipped
        )
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::InProgress => "in_progress",
            ApplicationStatus::NeedsReview => "needs_review",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Failed => "failed",
            ApplicationStatus::Skipped => "skipped",
        };
        write!(f, "{}", name)
    }
}

/// 答案来源标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// 档案预置答案或字段映射
    Auto,
    /// LLM 生成
    Llm,
    /// 人工审核后填写
    Human,
}

/// 填表过程中遇到的一个问题
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationQuestion {
    #[serde(default)]
    pub field_name: String,
    pub question_text: String,
    /// 如 text / select / radio
    #[serde(default = "default_question_kind")]
    pub kind: String,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default = "default_answer_source")]
    pub answered_by: AnswerSource,
    #[serde(default)]
    pub needs_review: bool,
    #[serde(default)]
    pub review_reason: String,
}

fn default_question_kind() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

fn default_answer_source() -> AnswerSource {
    AnswerSource::Auto
}

/// 一条带时间戳的操作日志（仅追加）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationLog {
    pub timestamp: DateTime<Local>,
    pub action: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub screenshot: Option<String>,
}

/// 申请
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub posting_id: String,
    /// 冗余字段：审计不依赖职位后续变更
    pub job_title: String,
    pub company: String,
    pub job_url: String,
    pub platform: Platform,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Local>,
    #[serde(default)]
    pub started_at: Option<DateTime<Local>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Local>>,
    #[serde(default)]
    pub current_step: usize,
    #[serde(default)]
    pub total_steps: Option<usize>,
    #[serde(default)]
    pub questions: Vec<ApplicationQuestion>,
    #[serde(default)]
    pub logs: Vec<ApplicationLog>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub screenshots: Vec<String>,
}

fn default_max_retries() -> u32 {
    3
}

impl Application {
    /// 由职位创建一次申请尝试
    pub fn from_posting(posting: &Posting) -> Self {
        Self {
            id: format!("{}-{}", posting.id, Local::now().format("%Y%m%d%H%M%S")),
            posting_id: posting.id.clone(),
            job_title: posting.title.clone(),
            company: posting.company.clone(),
            job_url: posting.url.clone(),
            platform: posting.platform,
            status: ApplicationStatus::Pending,
            created_at: Local::now(),
            started_at: None,
            completed_at: None,
            current_step: 0,
            total_steps: None,
            questions: Vec::new(),
            logs: Vec::new(),
            error_message: None,
            retry_count: 0,
            max_retries: 3,
            screenshots: Vec::new(),
        }
    }

    // ========== 状态转移（仅编排器调用） ==========

    /// Pending -> InProgress
    pub fn start(&mut self) -> Result<()> {
        self.ensure_transition(ApplicationStatus::Pending, ApplicationStatus::InProgress)?;
        self.status = ApplicationStatus::InProgress;
        self.started_at = Some(Local::now());
        self.add_log("started", "申请开始", None);
        Ok(())
    }

    /// InProgress -> Submitted
    pub fn complete(&mut self) -> Result<()> {
        self.ensure_transition(ApplicationStatus::InProgress, ApplicationStatus::Submitted)?;
        self.status = ApplicationStatus::Submitted;
        self.completed_at = Some(Local::now());
        self.add_log("submitted", "申请提交成功", None);
        Ok(())
    }

    /// 任意非终态 -> Failed
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(AppError::IllegalTransition {
                from: self.status.to_string(),
                to: ApplicationStatus::Failed.to_string(),
            });
        }
        let error = error.into();
        self.status = ApplicationStatus::Failed;
        self.completed_at = Some(Local::now());
        self.add_log("failed", format!("申请失败: {}", error), None);
        self.error_message = Some(error);
        Ok(())
    }

    /// InProgress -> NeedsReview
    ///
    /// 不设置完成时间：仍在等待人工处理。
    pub fn request_review(&mut self, reason: impl Into<String>) -> Result<()> {
        self.ensure_transition(ApplicationStatus::InProgress, ApplicationStatus::NeedsReview)?;
        self.status = ApplicationStatus::NeedsReview;
        self.add_log("needs_review", format!("需要人工审核: {}", reason.into()), None);
        Ok(())
    }

    /// Pending -> Skipped
    pub fn skip(&mut self, reason: impl Into<String>) -> Result<()> {
        self.ensure_transition(ApplicationStatus::Pending, ApplicationStatus::Skipped)?;
        self.status = ApplicationStatus::Skipped;
        self.add_log("skipped", format!("跳过: {}", reason.into()), None);
        Ok(())
    }

    fn ensure_transition(&self, from: ApplicationStatus, to: ApplicationStatus) -> Result<()> {
        if self.status != from {
            return Err(AppError::IllegalTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    // ========== 填表策略可用的窄接口 ==========

    /// 追加一条日志
    pub fn add_log(
        &mut self,
        action: impl Into<String>,
        details: impl Into<String>,
        screenshot: Option<String>,
    ) {
        self.logs.push(ApplicationLog {
            timestamp: Local::now(),
            action: action.into(),
            details: details.into(),
            screenshot,
        });
    }

    /// 记录遇到的一个问题，返回其索引
    pub fn add_question(&mut self, question: ApplicationQuestion) -> usize {
        self.questions.push(question);
        self.questions.len() - 1
    }

    /// 填写某个问题的答案
    pub fn answer_question(&mut self, index: usize, answer: impl Into<String>, source: AnswerSource) {
        if let Some(q) = self.questions.get_mut(index) {
            q.answer = Some(answer.into());
            q.answered_by = source;
        }
    }

    /// 标记某个问题需要人工审核
    pub fn flag_question(&mut self, index: usize, reason: impl Into<String>) {
        if let Some(q) = self.questions.get_mut(index) {
            q.needs_review = true;
            q.review_reason = reason.into();
        }
    }

    /// 记录一张截图
    pub fn add_screenshot(&mut self, path: impl Into<String>) {
        self.screenshots.push(path.into());
    }

    // ========== 派生信息 ==========

    /// 是否还有重试额度
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// 进度百分比；总步数未知时为 0
    pub fn progress_percent(&self) -> f64 {
        match self.total_steps {
            Some(total) if total > 0 => (self.current_step as f64 / total as f64) * 100.0,
            _ => 0.0,
        }
    }

    /// 耗时（秒）；从未开始则为 None
    pub fn duration_seconds(&self) -> Option<f64> {
        let started = self.started_at?;
        let end = self.completed_at.unwrap_or_else(Local::now);
        Some((end - started).num_milliseconds() as f64 / 1000.0)
    }

    /// 未回答的必填问题
    pub fn unanswered_required(&self) -> Vec<&ApplicationQuestion> {
        self.questions
            .iter()
            .filter(|q| q.answer.is_none() && q.required)
            .collect()
    }

    /// 被标记为需要人工审核的问题
    pub fn questions_needing_review(&self) -> Vec<&ApplicationQuestion> {
        self.questions.iter().filter(|q| q.needs_review).collect()
    }
}

impl ApplicationQuestion {
    /// 构建一个文本问题
    pub fn text(question_text: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            question_text: question_text.into(),
            kind: "text".to_string(),
            required: true,
            options: Vec::new(),
            answer: None,
            answered_by: AnswerSource::Auto,
            needs_review: false,
            review_reason: String::new(),
        }
    }

    /// 构建一个单选问题
    pub fn select(
        question_text: impl Into<String>,
        field_name: impl Into<String>,
        options: Vec<String>,
    ) -> Self {
        Self {
            kind: "select".to_string(),
            options,
            ..Self::text(question_text, field_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Application {
        let posting = Posting::new(Some("p-1"), "Engineer", "Acme", "https://x.com/job/1", "test");
        Application::from_posting(&posting)
    }

    #[test]
    fn test_complete_only_from_in_progress() {
        let mut app = sample();
        assert!(app.complete().is_err());
        app.start().expect("start 应该成功");
        app.complete().expect("complete 应该成功");
        assert_eq!(app.status, ApplicationStatus::Submitted);
        assert!(app.completed_at.is_some());
    }

    #[test]
    fn test_fail_sets_completion_timestamp() {
        let mut app = sample();
        app.start().unwrap();
        app.fail("表单元素缺失").unwrap();
        assert_eq!(app.status, ApplicationStatus::Failed);
        assert!(app.completed_at.is_some());
        assert_eq!(app.error_message.as_deref(), Some("表单元素缺失"));
        // 终态后不能再 fail
        assert!(app.fail("再次失败").is_err());
    }

    #[test]
    fn test_fail_from_pending() {
        let mut app = sample();
        app.fail("导航异常").unwrap();
        assert_eq!(app.status, ApplicationStatus::Failed);
        assert!(app.completed_at.is_some());
    }

    #[test]
    fn test_request_review_keeps_completion_unset() {
        let mut app = sample();
        app.start().unwrap();
        app.request_review("审核模式").unwrap();
        assert_eq!(app.status, ApplicationStatus::NeedsReview);
        assert!(app.completed_at.is_none());
    }

    #[test]
    fn test_skip_only_from_pending() {
        let mut app = sample();
        app.skip("职位已过期").unwrap();
        assert_eq!(app.status, ApplicationStatus::Skipped);

        let mut app2 = sample();
        app2.start().unwrap();
        assert!(app2.skip("太晚了").is_err());
    }

    #[test]
    fn test_progress_and_duration() {
        let mut app = sample();
        assert_eq!(app.progress_percent(), 0.0);
        assert!(app.duration_seconds().is_none());

        app.current_step = 3;
        app.total_steps = Some(6);
        assert!((app.progress_percent() - 50.0).abs() < f64::EPSILON);

        app.start().unwrap();
        assert!(app.duration_seconds().is_some());
    }

    #[test]
    fn test_question_bookkeeping() {
        let mut app = sample();
        let idx = app.add_question(ApplicationQuestion::text("Why us?", "why_us"));
        app.answer_question(idx, "Because.", AnswerSource::Llm);
        assert_eq!(app.questions[idx].answer.as_deref(), Some("Because."));
        assert_eq!(app.questions[idx].answered_by, AnswerSource::Llm);
        assert!(app.unanswered_required().is_empty());

        let idx2 = app.add_question(ApplicationQuestion::text("Salary?", "salary"));
        app.flag_question(idx2, "无法自动回答");
        assert_eq!(app.questions_needing_review().len(), 1);
        assert_eq!(app.unanswered_required().len(), 1);
    }

    #[test]
    fn test_can_retry() {
        let mut app = sample();
        assert!(app.can_retry());
        app.retry_count = app.max_retries;
        assert!(!app.can_retry());
    }
}
