//! # Auto Applier
//!
//! 自动化求职申请系统：聚合多来源职位、去重并校验链接、按承载
//! 平台分类、驱动平台填表策略（自由文本由受配额约束的生成网关
//! 辅助），并以生命周期状态机跟踪每一次申请。
//!
//! ## 架构设计
//!
//! 本系统采用分层架构，依赖只向下：
//!
//! ### ① 基础设施层
//! - `browser/` - 浏览器控制边界，`PageHandle` 是唯一的页面 owner
//! - `storage/` - 仓储接口与 JSON 文件实现
//! - `config` / `error` / `utils` - 配置、错误类型、日志工具
//!
//! ### ② 采集层
//! - `scrapers/` - 来源连接器、聚合器、URL 去重、链接校验
//! - `classifier` - 纯 URL 形状的平台分类
//!
//! ### ③ 业务能力层
//! - `llm/` - 配额账本、生成网关、提示词上下文
//! - `fillers/` - 平台填表策略（封闭的变体集合 + 两方法契约）
//! - `notifier` - ntfy 推送（尽力而为的旁路）
//!
//! ### ④ 编排层
//! - `orchestrator/` - 控制循环：分流、申请、状态落库、统计

pub mod browser;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fillers;
pub mod llm;
pub mod models;
pub mod notifier;
pub mod orchestrator;
pub mod scrapers;
pub mod storage;
pub mod utils;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, Result};
pub use fillers::{FillerRegistry, FormFiller};
pub use llm::LlmGateway;
pub use models::{Applicant, Application, ApplicationStatus, Platform, Posting, PostingStatus};
pub use orchestrator::{App, RunStats};
pub use scrapers::{JobAggregator, SeenUrls};
pub use storage::{JobStore, JsonStore};
