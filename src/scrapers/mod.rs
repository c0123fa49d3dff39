//! 抓取与准入管道
//!
//! - `connector` - 来源连接器接口（外部协作方，只约定契约）
//! - `greenhouse` - Greenhouse 公开招聘板连接器
//! - `dedup` - URL 去重过滤器
//! - `link_validator` - 并发受限的链接校验器
//! - `aggregator` - 多来源聚合 + 去重 + 校验

pub mod aggregator;
pub mod connector;
pub mod dedup;
pub mod greenhouse;
pub mod link_validator;

pub use aggregator::{JobAggregator, ScrapeOutcome, ScrapeStats};
pub use connector::SourceConnector;
pub use dedup::SeenUrls;
pub use greenhouse::GreenhouseBoardConnector;
pub use link_validator::LinkValidator;
