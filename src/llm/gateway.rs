//! 受配额约束的文本生成网关
//!
//! 每次调用的状态机：检查 →（等待 | 拒绝 | 放行）→ 生成 → 记账。
//! 间隔类拒绝在网关内部有限重试（睡掉剩余等待再查）；上限类拒绝
//! 不重试，立即以"不可用"返回调用方。整个检查-生成-记账序列被
//! 一把互斥锁串联，外部并发调用不会合计超限。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型（兼容 OpenAI API 的服务）

use std::sync::atomic::{AtomicBool, Ordering};

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::LlmErrorKind;
use crate::llm::rate_limiter::{Block, QuotaLimits, RateLimiter, UsageStats};

/// 间隔类拒绝的内部重试次数
const INTERVAL_RETRY_ATTEMPTS: usize = 3;
/// 单次生成的输出单位硬上限
const MAX_OUTPUT_UNITS: u32 = 500;

/// 生成网关
pub struct LlmGateway {
    client: Client<OpenAIConfig>,
    model_name: String,
    limiter: RateLimiter,
    /// 串行化 检查→生成→记账 的整个序列
    call_guard: Mutex<()>,
    /// 接近限额的警告每个进程只提示一次
    limit_warning_shown: AtomicBool,
}

impl LlmGateway {
    /// 创建网关（同时加载持久化配额账本）
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);
        let limits = QuotaLimits {
            max_requests_per_day: config.llm_max_requests_per_day,
            max_monthly_units: config.llm_max_monthly_units,
            min_request_interval: std::time::Duration::from_millis(
                config.llm_min_request_interval_ms,
            ),
        };
        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            limiter: RateLimiter::load(&config.llm_usage_file, limits),
            call_guard: Mutex::new(()),
            limit_warning_shown: AtomicBool::new(false),
        }
    }

    /// 生成文本
    ///
    /// 任何失败（配额、凭证、下游错误）都返回 `None`，调用方据此
    /// 降级为"跳过 LLM 字段并标记人工审核"，绝不中止运行。
    pub async fn generate(
        &self,
        prompt: &str,
        max_units: u32,
        temperature: f32,
        system: Option<&str>,
    ) -> Option<String> {
        let _guard = self.call_guard.lock().await;

        // 检查阶段：间隔拒绝内部重试，上限拒绝立即返回
        for attempt in 0..INTERVAL_RETRY_ATTEMPTS {
            match self.limiter.check().await {
                None => break,
                Some(block) if block.is_ceiling() => {
                    warn!("⚠️ LLM 请求被拒绝: {}", block);
                    return None;
                }
                Some(Block::Interval { wait }) => {
                    if attempt == 0 {
                        debug!("⏳ 触发速率限制，等待 {:.1}s...", wait.as_secs_f64());
                    }
                    tokio::time::sleep(wait).await;
                }
                Some(_) => unreachable!("上限类拒绝已在上一分支处理"),
            }
        }
        // 兜底：重试耗尽后仍睡掉可能的剩余间隔
        self.limiter.wait_if_needed().await;

        if self.limiter.is_near_limit().await
            && !self.limit_warning_shown.swap(true, Ordering::Relaxed)
        {
            let stats = self.limiter.usage_stats().await;
            warn!(
                "⚠️ 接近 LLM 限额: 今日 {}/{} 次请求, 本月 {}/{} 单位",
                stats.daily_requests, stats.daily_limit, stats.monthly_units, stats.monthly_limit
            );
        }

        // 生成阶段
        let request = match self.build_request(prompt, max_units, temperature, system) {
            Ok(request) => request,
            Err(e) => {
                error!("构建 LLM 请求失败: {}", e);
                return None;
            }
        };

        match self.client.chat().create(request).await {
            Ok(response) => {
                let content = response
                    .choices
                    .first()
                    .and_then(|choice| choice.message.content.clone());
                let Some(content) = content else {
                    // 空响应也是一次被放行的请求，日计数必须反映尝试
                    warn!("⚠️ LLM 返回空内容");
                    if let Err(e) = self.limiter.record_request(0).await {
                        error!("配额记账失败: {}", e);
                    }
                    return None;
                };
                let content = content.trim().to_string();

                // 记账阶段：按长度估算消耗的生成单位
                let system_len = system.map(|s| s.len()).unwrap_or(0);
                let units = ((prompt.len() + system_len + content.len()) / 4) as u64;
                if let Err(e) = self.limiter.record_request(units).await {
                    error!("配额记账失败: {}", e);
                }
                Some(content)
            }
            Err(e) => {
                let message = e.to_string();
                match LlmErrorKind::classify(&message) {
                    LlmErrorKind::Quota => {
                        warn!("⚠️ 下游限流: {}", message);
                        // 配额类失败也要记账，日计数反映尝试次数
                        if let Err(e) = self.limiter.record_request(0).await {
                            error!("配额记账失败: {}", e);
                        }
                    }
                    LlmErrorKind::InvalidCredential => error!("❌ API 凭证无效: {}", message),
                    LlmErrorKind::NotFound => error!("❌ 模型或资源不存在: {}", message),
                    LlmErrorKind::Other => error!("❌ LLM 调用失败: {}", message),
                }
                None
            }
        }
    }

    fn build_request(
        &self,
        prompt: &str,
        max_units: u32,
        temperature: f32,
        system: Option<&str>,
    ) -> anyhow::Result<async_openai::types::chat::CreateChatCompletionRequest> {
        let mut messages = Vec::new();
        if let Some(system) = system {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(temperature)
            .max_tokens(max_units.min(MAX_OUTPUT_UNITS))
            .build()?;
        Ok(request)
    }

    /// 回答申请表中的自由文本问题
    pub async fn answer_question(
        &self,
        question: &str,
        job_title: &str,
        company: &str,
        applicant_context: &str,
        max_length: usize,
    ) -> Option<String> {
        let prompt = format!(
            "You are helping someone apply for a {job_title} position at {company}.\n\n\
             Answer the following application question professionally and concisely.\n\
             Keep the answer under {max_length} characters.\n\
             Be authentic and specific, avoiding generic responses.\n\n\
             Applicant Background:\n{applicant_context}\n\n\
             Question: {question}\n\n\
             Answer (be concise and professional):"
        );
        let answer = self
            .generate(&prompt, Self::output_budget(max_length), 0.7, None)
            .await?;
        info!("✓ LLM 已生成答案 ({} 字符)", answer.len());
        Some(answer)
    }

    /// 目标答案长度对应的输出单位预算
    pub fn output_budget(max_length: usize) -> u32 {
        ((max_length / 3) as u32).min(300)
    }

    /// 从候选项中选出最适合申请人的一项
    ///
    /// 网关的原始响应必须与某个候选项完全一致（或忽略大小写一致），
    /// 否则返回 `None`，绝不捏造列表之外的选项。
    pub async fn select_best_option(
        &self,
        options: &[String],
        field_label: &str,
        applicant_context: &str,
    ) -> Option<String> {
        let options_str = options
            .iter()
            .map(|opt| format!("- {}", opt))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Select the best option from the list below for the user based on their profile.\n\
             If none are suitable, return \"None\".\n\n\
             Field: {field_label}\n\
             User Profile Summary:\n{applicant_context}\n\n\
             Options:\n{options_str}\n\n\
             Return ONLY the exact text of the best option. Do not explain."
        );
        let response = self.generate(&prompt, 50, 0.1, None).await?;
        Self::match_option(&response, options)
    }

    /// 把原始响应匹配回候选项
    fn match_option(response: &str, options: &[String]) -> Option<String> {
        let response = response.trim();
        if response.is_empty() || response == "None" {
            return None;
        }
        if let Some(exact) = options.iter().find(|opt| opt.as_str() == response) {
            return Some(exact.clone());
        }
        options
            .iter()
            .find(|opt| opt.eq_ignore_ascii_case(response))
            .cloned()
    }

    /// 当前是否有额度发起请求
    pub async fn is_available(&self) -> bool {
        self.limiter.check().await.is_none()
    }

    /// 用量快照
    pub async fn usage_stats(&self) -> UsageStats {
        self.limiter.usage_stats().await
    }
}
