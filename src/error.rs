//! 应用程序错误类型
//!
//! 绝大多数内部接口使用 `anyhow::Result` 传递错误；这里定义的是
//! 调用方需要据此分支的错误类别（状态机非法转移、LLM 被限流等）。

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// 应用程序错误
#[derive(Debug, Error)]
pub enum AppError {
    /// 申请生命周期状态机的非法转移
    #[error("非法状态转移: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 申请人档案错误（缺失或无法解析，属于致命错误）
    #[error("申请人档案错误: {0}")]
    Profile(String),

    /// 存储层错误
    #[error("存储错误: {0}")]
    Storage(String),

    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(String),

    /// LLM 服务不可用（配额耗尽 / 凭证无效）
    #[error("LLM 不可用: {0}")]
    LlmUnavailable(String),

    /// 其他错误（包装第三方库错误）
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// LLM 调用失败的分类
///
/// 用于把下游 API 错误归入可观测的类别；配额类错误仍需记账。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// 配额 / 限流信号（429、quota、resource_exhausted）
    Quota,
    /// 凭证无效
    InvalidCredential,
    /// 模型或资源不存在（404）
    NotFound,
    /// 其他错误
    Other,
}

impl LlmErrorKind {
    /// 根据错误文本分类
    pub fn classify(message: &str) -> Self {
        let msg = message.to_lowercase();
        if msg.contains("429") || msg.contains("quota") || msg.contains("resource_exhausted") || msg.contains("rate limit") {
            LlmErrorKind::Quota
        } else if msg.contains("api key") || msg.contains("unauthorized") || msg.contains("401") {
            LlmErrorKind::InvalidCredential
        } else if msg.contains("404") || msg.contains("not found") {
            LlmErrorKind::NotFound
        } else {
            LlmErrorKind::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_llm_error() {
        assert_eq!(LlmErrorKind::classify("HTTP 429 Too Many Requests"), LlmErrorKind::Quota);
        assert_eq!(LlmErrorKind::classify("quota exceeded for project"), LlmErrorKind::Quota);
        assert_eq!(LlmErrorKind::classify("invalid api key provided"), LlmErrorKind::InvalidCredential);
        assert_eq!(LlmErrorKind::classify("model not found"), LlmErrorKind::NotFound);
        assert_eq!(LlmErrorKind::classify("connection reset by peer"), LlmErrorKind::Other);
    }
}
