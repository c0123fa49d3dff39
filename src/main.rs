use anyhow::Result;

use auto_applier::orchestrator::App;
use auto_applier::utils::logging;
use auto_applier::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(config.verbose_logging);
    logging::log_startup(&config);

    let args: Vec<String> = std::env::args().collect();
    let dry_run = args.iter().any(|a| a == "--dry-run");
    let scrape_first = !args.iter().any(|a| a == "--no-scrape");

    // 初始化并运行应用
    let max_applications = config.max_applications_per_run;
    let stats = App::initialize(config)
        .await?
        .run(scrape_first, max_applications, dry_run)
        .await?;
    logging::print_final_stats(&stats);

    Ok(())
}
