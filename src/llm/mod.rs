//! LLM 子系统
//!
//! - `rate_limiter` - 持久化配额账本与速率限制
//! - `gateway` - 受配额约束的文本生成网关
//! - `context` - 为提示词构建申请人/职位上下文

pub mod context;
pub mod gateway;
pub mod rate_limiter;

pub use context::ContextBuilder;
pub use gateway::LlmGateway;
pub use rate_limiter::{Block, QuotaLimits, RateLimiter, UsageStats};
