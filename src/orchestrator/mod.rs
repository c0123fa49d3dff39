//! 编排层
//!
//! 整个系统的分层（依赖只向下）：
//!
//! ```text
//! orchestrator  编排层：控制循环、状态转移、统计
//!   ├─ fillers      业务能力层：平台填表策略
//!   ├─ scrapers     采集层：聚合、去重、校验、来源连接器
//!   ├─ llm          生成网关：配额、提示词
//!   ├─ storage      仓储
//!   ├─ browser      浏览器控制
//!   └─ notifier     推送通知
//! ```
//!
//! 申请循环严格串行：同一时刻只有一个职位、一个页面、一次策略
//! 调用在进行。浏览器和配额账本都是单流资源，并行申请会击穿
//! 速率上限，也会让截图和日志无法归属。

pub mod app;
pub mod posting_processor;

pub use app::{App, RunStats};
pub use posting_processor::{PostingProcessor, ProcessOutcome};
