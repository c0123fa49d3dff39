//! 策略共用的表单机制
//!
//! 三个平台策略的差异只在触发元素、提交按钮和确认文案；
//! 字段枚举、答案解析、写入页面这套流程完全一致，集中在这里。
//!
//! 答案解析的优先级是固定的：
//! 1. 档案字段映射（姓名、邮箱等身份字段）
//! 2. 档案预置答案（work_authorization 等常见筛选题）
//! 3. LLM 生成（自由文本）或 LLM 选项挑选（下拉框）
//! 4. 以上全部落空且字段必填 → 标记 `needs_review`

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::browser::PageHandle;
use crate::llm::{ContextBuilder, LlmGateway};
use crate::models::{AnswerSource, Applicant, Application, ApplicationQuestion, Posting};

/// 自由文本答案的目标长度上限（字符）
const FREE_TEXT_MAX_LENGTH: usize = 500;

/// 策略共享的填表上下文
#[derive(Clone)]
pub struct FillContext {
    pub applicant: Arc<Applicant>,
    pub gateway: Option<Arc<LlmGateway>>,
    pub max_steps: usize,
}

impl FillContext {
    pub fn new(
        applicant: Arc<Applicant>,
        gateway: Option<Arc<LlmGateway>>,
        max_steps: usize,
    ) -> Self {
        Self {
            applicant,
            gateway,
            max_steps,
        }
    }
}

/// 页面上枚举到的一个可见表单字段
#[derive(Debug, Clone, Deserialize)]
pub struct FormField {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub options: Vec<String>,
}

impl FormField {
    pub fn is_answered(&self) -> bool {
        !self.value.trim().is_empty()
    }

    /// 用于提示词和问题记录的题面
    pub fn question_text(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

/// 检查页面上是否存在匹配选择器的可见元素
pub async fn element_exists(page: &dyn PageHandle, selector: &str) -> bool {
    let js = format!(
        r#"
(() => {{
    const el = document.querySelector({selector});
    return el !== null && el.offsetParent !== null;
}})()
"#,
        selector = js_string(selector)
    );
    page.eval(&js)
        .await
        .ok()
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// 页面正文是否包含任一短语（忽略大小写）
pub async fn page_text_contains(page: &dyn PageHandle, phrases: &[&str]) -> bool {
    let js = r#"
(() => document.body ? document.body.innerText.toLowerCase() : '')()
"#;
    let text = match page.eval(js).await {
        Ok(value) => value.as_str().unwrap_or_default().to_string(),
        Err(_) => return false,
    };
    phrases
        .iter()
        .any(|phrase| text.contains(&phrase.to_lowercase()))
}

/// 枚举当前可见的表单字段（隐藏域和文件上传除外）
pub async fn collect_fields(page: &dyn PageHandle) -> Result<Vec<FormField>> {
    let js = r#"
(() => {
    const fields = [];
    document.querySelectorAll('input, textarea, select').forEach(el => {
        if (el.type === 'hidden' || el.type === 'file' || el.type === 'submit') return;
        if (el.offsetParent === null) return;
        let label = '';
        if (el.id) {
            const tag = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
            if (tag) label = tag.innerText.trim();
        }
        if (!label && el.closest('label')) label = el.closest('label').innerText.trim();
        if (!label) label = el.getAttribute('aria-label') || el.placeholder || '';
        const isSelect = el.tagName === 'SELECT';
        fields.push({
            name: el.name || el.id || '',
            label: label,
            kind: isSelect ? 'select' : (el.tagName === 'TEXTAREA' ? 'textarea' : (el.type || 'text')),
            required: el.required || el.getAttribute('aria-required') === 'true',
            value: el.value || '',
            options: isSelect
                ? Array.from(el.options).map(o => o.text.trim()).filter(t => t && !/^select/i.test(t))
                : [],
        });
    });
    return fields;
})()
"#;
    let raw = page.eval(js).await.context("枚举表单字段失败")?;
    let fields: Vec<FormField> =
        serde_json::from_value(raw).context("解析表单字段结构失败")?;
    Ok(fields)
}

/// 向文本字段写入值并触发 input/change 事件
pub async fn set_field_value(page: &dyn PageHandle, name: &str, value: &str) -> Result<bool> {
    let js = format!(
        r#"
(() => {{
    const name = {name};
    const el = document.querySelector('[name="' + CSS.escape(name) + '"]')
        || document.getElementById(name);
    if (!el) return false;
    el.focus();
    el.value = {value};
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    el.blur();
    return true;
}})()
"#,
        name = js_string(name),
        value = js_string(value)
    );
    Ok(page
        .eval(&js)
        .await?
        .as_bool()
        .unwrap_or(false))
}

/// 在下拉框里选中展示文本匹配的选项
pub async fn select_option(page: &dyn PageHandle, name: &str, option_text: &str) -> Result<bool> {
    let js = format!(
        r#"
(() => {{
    const name = {name};
    const el = document.querySelector('select[name="' + CSS.escape(name) + '"]')
        || document.getElementById(name);
    if (!el || el.tagName !== 'SELECT') return false;
    const wanted = {option_text}.toLowerCase();
    for (const opt of el.options) {{
        if (opt.text.trim().toLowerCase() === wanted) {{
            el.value = opt.value;
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
        }}
    }}
    return false;
}})()
"#,
        name = js_string(name),
        option_text = js_string(option_text)
    );
    Ok(page
        .eval(&js)
        .await?
        .as_bool()
        .unwrap_or(false))
}

/// 点击第一个命中的按钮：先按选择器找，再按可见文本找
pub async fn click_button(
    page: &dyn PageHandle,
    selectors: &[&str],
    texts: &[&str],
) -> Result<bool> {
    let selectors_json = serde_json::to_string(selectors)?;
    let texts_json = serde_json::to_string(texts)?;
    let js = format!(
        r#"
(() => {{
    for (const sel of {selectors_json}) {{
        const el = document.querySelector(sel);
        if (el && el.offsetParent !== null) {{ el.click(); return true; }}
    }}
    const wanted = {texts_json}.map(t => t.toLowerCase());
    for (const btn of document.querySelectorAll('button, input[type="submit"], a[role="button"]')) {{
        if (btn.offsetParent === null) continue;
        const text = (btn.innerText || btn.value || '').trim().toLowerCase();
        if (wanted.some(t => text.includes(t))) {{ btn.click(); return true; }}
    }}
    return false;
}})()
"#
    );
    Ok(page
        .eval(&js)
        .await?
        .as_bool()
        .unwrap_or(false))
}

/// 把档案身份字段映射到表单标签
///
/// 只做高置信度的关键词匹配，拿不准就交给后续的预置答案或 LLM。
pub fn profile_answer(applicant: &Applicant, label: &str) -> Option<String> {
    let label = label.to_lowercase();
    let identity = &applicant.identity;

    let direct = if label.contains("first name") || label.contains("given name") {
        identity.full_name.split_whitespace().next().map(str::to_string)
    } else if label.contains("last name")
        || label.contains("family name")
        || label.contains("surname")
    {
        identity.full_name.split_whitespace().last().map(str::to_string)
    } else if label.contains("full name") || label == "name" || label.contains("your name") {
        Some(identity.full_name.clone())
    } else if label.contains("email") {
        Some(identity.email.clone())
    } else if label.contains("phone") || label.contains("mobile") {
        Some(identity.phone.clone())
    } else if label.contains("linkedin") {
        Some(identity.linkedin.clone())
    } else if label.contains("website") || label.contains("portfolio") || label.contains("github") {
        Some(identity.website.clone())
    } else if label.contains("location")
        || label.contains("city")
        || label.contains("current address")
    {
        Some(identity.location.clone())
    } else {
        None
    };
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Some(value);
    }

    // 常见筛选题 → 档案预置答案
    let key = if label.contains("authoriz") || label.contains("legally") {
        "work_authorization"
    } else if label.contains("sponsor") {
        "sponsorship"
    } else if label.contains("salary") || label.contains("compensation") {
        "salary_expectation"
    } else if label.contains("notice") || label.contains("start date") || label.contains("available")
    {
        "notice_period"
    } else if label.contains("clearance") {
        "security_clearance"
    } else if label.contains("relocat") {
        "relocation"
    } else if label.contains("remote") {
        "remote_preference"
    } else if label.contains("hear about") || label.contains("referral source") {
        "referral_source"
    } else {
        return None;
    };
    applicant.get_answer(key).map(str::to_string)
}

/// 填写当前可见的全部未答字段
///
/// 每个字段都会被记录到申请的问题列表上；解析失败的必填字段被
/// 标记为需要人工审核。返回本轮是否还遗留未解决的必填字段。
pub async fn fill_visible_fields(
    ctx: &FillContext,
    page: &dyn PageHandle,
    posting: &Posting,
    application: &mut Application,
) -> Result<bool> {
    let fields = collect_fields(page).await?;
    let applicant_context =
        ContextBuilder::new(&ctx.applicant).full_context(Some(posting), 1200);
    let mut unresolved_required = false;

    for field in fields {
        if field.is_answered() || field.name.is_empty() {
            continue;
        }
        debug!("处理字段: {} ({})", field.question_text(), field.kind);

        let mut question = if field.kind == "select" {
            ApplicationQuestion::select(field.question_text(), &field.name, field.options.clone())
        } else {
            let mut q = ApplicationQuestion::text(field.question_text(), &field.name);
            q.kind = field.kind.clone();
            q
        };
        question.required = field.required;
        let index = application.add_question(question);

        match resolve_answer(ctx, &field, posting, &applicant_context).await {
            Some((answer, source)) => {
                let written = if field.kind == "select" {
                    select_option(page, &field.name, &answer).await?
                } else {
                    set_field_value(page, &field.name, &answer).await?
                };
                if written {
                    application.answer_question(index, answer, source);
                } else if field.required {
                    application.flag_question(index, "答案无法写入页面");
                    unresolved_required = true;
                }
            }
            None => {
                if field.required {
                    warn!("⚠️ 必填字段无法自动解析: {}", field.question_text());
                    application.flag_question(index, "无法自动解析答案");
                    unresolved_required = true;
                }
            }
        }
    }
    Ok(unresolved_required)
}

/// 按固定优先级解析一个字段的答案
async fn resolve_answer(
    ctx: &FillContext,
    field: &FormField,
    posting: &Posting,
    applicant_context: &str,
) -> Option<(String, AnswerSource)> {
    // 1/2. 档案映射与预置答案
    if let Some(answer) = profile_answer(&ctx.applicant, field.question_text()) {
        if field.kind != "select"
            || field
                .options
                .iter()
                .any(|opt| opt.eq_ignore_ascii_case(&answer))
        {
            return Some((answer, AnswerSource::Auto));
        }
    }

    // 3. LLM
    let gateway = ctx.gateway.as_ref()?;
    if field.kind == "select" {
        let choice = gateway
            .select_best_option(&field.options, field.question_text(), applicant_context)
            .await?;
        return Some((choice, AnswerSource::Llm));
    }
    if field.kind == "textarea" || field.kind == "text" {
        let answer = gateway
            .answer_question(
                field.question_text(),
                &posting.title,
                &posting.company,
                applicant_context,
                FREE_TEXT_MAX_LENGTH,
            )
            .await?;
        return Some((answer, AnswerSource::Llm));
    }
    None
}

/// JS 字符串字面量（serde_json 负责转义）
fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::applicant::{Applicant, Identity, Skills};
    use std::collections::HashMap;

    fn sample_applicant() -> Applicant {
        let mut answers = HashMap::new();
        answers.insert(
            "work_authorization".to_string(),
            "Yes, I am authorized to work".to_string(),
        );
        answers.insert("sponsorship".to_string(), "No".to_string());
        Applicant {
            identity: Identity {
                full_name: "Jane Marie Doe".to_string(),
                email: "jane@example.com".to_string(),
                phone: "+1 555 0100".to_string(),
                location: "Berlin, Germany".to_string(),
                linkedin: "https://linkedin.com/in/janedoe".to_string(),
                website: String::new(),
            },
            experience: vec![],
            education: vec![],
            skills: Skills {
                languages: vec![],
                frameworks: vec![],
                tools: vec![],
            },
            answers,
        }
    }

    #[test]
    fn test_identity_mapping() {
        let applicant = sample_applicant();
        assert_eq!(
            profile_answer(&applicant, "First Name").as_deref(),
            Some("Jane")
        );
        assert_eq!(
            profile_answer(&applicant, "Last name *").as_deref(),
            Some("Doe")
        );
        assert_eq!(
            profile_answer(&applicant, "Email address").as_deref(),
            Some("jane@example.com")
        );
        assert_eq!(
            profile_answer(&applicant, "Phone number").as_deref(),
            Some("+1 555 0100")
        );
        assert_eq!(
            profile_answer(&applicant, "LinkedIn Profile").as_deref(),
            Some("https://linkedin.com/in/janedoe")
        );
    }

    #[test]
    fn test_canned_answer_mapping() {
        let applicant = sample_applicant();
        assert_eq!(
            profile_answer(&applicant, "Are you legally authorized to work in Germany?").as_deref(),
            Some("Yes, I am authorized to work")
        );
        assert_eq!(
            profile_answer(&applicant, "Will you require visa sponsorship?").as_deref(),
            Some("No")
        );
    }

    #[test]
    fn test_unmapped_label_returns_none() {
        let applicant = sample_applicant();
        assert!(profile_answer(&applicant, "Why do you want this job?").is_none());
        // 档案里网站为空，不能把空串当答案
        assert!(profile_answer(&applicant, "Portfolio website").is_none());
    }

    #[test]
    fn test_form_field_question_text_fallback() {
        let field = FormField {
            name: "custom_question_1".to_string(),
            label: String::new(),
            kind: "text".to_string(),
            required: true,
            value: String::new(),
            options: vec![],
        };
        assert_eq!(field.question_text(), "custom_question_1");
        assert!(!field.is_answered());
    }
}
