/// 日志工具模块
///
/// 提供日志初始化和运行信息输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::orchestrator::RunStats;

/// 初始化日志
///
/// 过滤规则优先取 `RUST_LOG`，未设置时按配置的详细程度回退。
pub fn init(verbose: bool) {
    let default_filter = if verbose {
        "debug,chromiumoxide=info,hyper=info"
    } else {
        "info,chromiumoxide=warn,hyper=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 自动求职申请");
    info!("📋 本轮申请上限: {}", config.max_applications_per_run);
    info!(
        "🔎 关键词: {} | 地点: {}",
        config.search_keywords.join(", "),
        config.search_location
    );
    info!(
        "⚙️ 审核模式: {} | 链接校验: {}",
        if config.review_mode { "开" } else { "关" },
        if config.validate_links { "开" } else { "关" }
    );
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(stats: &RunStats) {
    info!("\n{}", "=".repeat(60));
    info!("📊 本轮运行统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("🆕 新增职位: {}", stats.scraped_new);
    info!("✅ 已提交: {}", stats.submitted);
    info!("👀 待审核: {}", stats.needs_review);
    info!("❌ 失败: {}", stats.failed);
    info!("🕳 过期: {}", stats.expired);
    info!("{}", "=".repeat(60));
}
