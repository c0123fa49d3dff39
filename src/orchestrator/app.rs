//! 应用编排器
//!
//! 持有全部长生命周期组件（仓储、聚合器、生成网关、策略注册表、
//! 通知器），驱动一轮运行：可选抓取 → 拉取待处理职位 → 逐个申请
//! → 回收浏览器 → 汇总。浏览器延迟启动：演练模式或没有可处理
//! 职位时根本不会拉起浏览器进程。

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use tracing::{info, warn};

use crate::browser::{BrowserControl, ChromiumBrowser};
use crate::classifier;
use crate::config::Config;
use crate::fillers::FillerRegistry;
use crate::llm::LlmGateway;
use crate::models::{Applicant, Platform, Posting, PostingStatus};
use crate::notifier::NtfyNotifier;
use crate::orchestrator::posting_processor::{PostingProcessor, ProcessOutcome};
use crate::scrapers::{GreenhouseBoardConnector, JobAggregator, LinkValidator, SeenUrls};
use crate::storage::{JobStore, JsonStore};
use crate::utils::truncate_text;

/// 一轮运行的统计
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// 本轮新入库的职位数
    pub scraped_new: usize,
    /// 实际处理过的职位数（含分流）
    pub processed: usize,
    pub submitted: usize,
    pub needs_review: usize,
    pub failed: usize,
    pub expired: usize,
    pub skipped: usize,
}

impl RunStats {
    /// 通知和日志共用的汇总文本
    pub fn summary(&self) -> String {
        format!(
            "新增 {} | 处理 {} | 提交 {} | 待审核 {} | 失败 {} | 过期 {}",
            self.scraped_new,
            self.processed,
            self.submitted,
            self.needs_review,
            self.failed,
            self.expired
        )
    }
}

/// 应用编排器
pub struct App {
    config: Config,
    store: Arc<dyn JobStore>,
    aggregator: JobAggregator,
    gateway: Option<Arc<LlmGateway>>,
    notifier: Option<NtfyNotifier>,
    registry: FillerRegistry,
    processor: PostingProcessor,
    browser: Option<Box<dyn BrowserControl>>,
}

impl App {
    /// 初始化全部组件
    ///
    /// 申请人档案缺失是唯一的致命错误；其余组件按配置降级。
    pub async fn initialize(config: Config) -> Result<Self> {
        info!("🚀 初始化...");

        let applicant = Arc::new(
            Applicant::from_file(&config.profile_path)
                .with_context(|| format!("无法加载申请人档案: {}", config.profile_path))?,
        );
        info!("✓ 申请人档案: {}", applicant.identity.full_name);

        let store: Arc<dyn JobStore> = Arc::new(JsonStore::open(&config.storage_path)?);

        // 去重集合在首次抓取前必须完成填充
        let seen = Arc::new(SeenUrls::new());
        seen.seed(store.list_all_posting_urls().await?);
        info!("✓ 去重集合: {} 个已知 URL", seen.len());

        let mut aggregator = JobAggregator::new(
            seen,
            config.search_keywords.clone(),
            config.search_location.clone(),
        );
        if !config.greenhouse_boards.is_empty() {
            aggregator.register(Box::new(GreenhouseBoardConnector::new(
                config.greenhouse_boards.clone(),
            )?));
        }
        if config.validate_links {
            let validator = Arc::new(LinkValidator::new(
                Duration::from_secs(config.validator_timeout_secs),
                config.validator_max_concurrent,
            )?);
            aggregator = aggregator.with_validator(validator, false);
        }

        let gateway = if config.llm_api_key.is_empty() {
            warn!("⚠️ 未配置 LLM API Key，自由文本字段将转人工审核");
            None
        } else {
            Some(Arc::new(LlmGateway::new(&config)))
        };

        let registry =
            FillerRegistry::standard(applicant, gateway.clone(), config.max_fill_steps);
        let notifier = NtfyNotifier::from_config(&config);
        let processor = PostingProcessor::new(
            Arc::clone(&store),
            config.review_mode,
            Duration::from_secs(config.navigation_timeout_secs),
        );

        Ok(Self {
            config,
            store,
            aggregator,
            gateway,
            notifier,
            registry,
            processor,
            browser: None,
        })
    }

    /// 执行一轮运行
    ///
    /// 无论循环正常结束、报错还是被 Ctrl+C 打断，浏览器都会被回收，
    /// 汇总都会被发出。
    pub async fn run(
        &mut self,
        scrape_first: bool,
        max_applications: usize,
        dry_run: bool,
    ) -> Result<RunStats> {
        self.run_until(scrape_first, max_applications, dry_run, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                // 信号监听注册失败就退化为不可中断
                warn!("监听中断信号失败: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// 与中断条件赛跑地执行一轮运行
    ///
    /// `interrupt` 先完成时放弃剩余职位，已完成部分的统计照常返回。
    pub async fn run_until<F>(
        &mut self,
        scrape_first: bool,
        max_applications: usize,
        dry_run: bool,
        interrupt: F,
    ) -> Result<RunStats>
    where
        F: std::future::Future<Output = ()>,
    {
        let mut stats = RunStats::default();
        let result = tokio::select! {
            result = self.run_loop(scrape_first, max_applications, dry_run, &mut stats) => result,
            _ = interrupt => {
                warn!("⏹ 收到中断信号，提前结束本轮运行");
                Ok(())
            }
        };

        // 始终回收浏览器资源
        if let Some(browser) = self.browser.take() {
            if let Err(e) = browser.shutdown().await {
                warn!("回收浏览器失败: {}", e);
            }
        }

        result?;
        info!("📊 本轮运行结束: {}", stats.summary());
        if let Some(gateway) = &self.gateway {
            let usage = gateway.usage_stats().await;
            info!(
                "📊 LLM 用量: 今日 {}/{} 次, 本月 {}/{} 单位",
                usage.daily_requests, usage.daily_limit, usage.monthly_units, usage.monthly_limit
            );
        }
        if let Some(notifier) = &self.notifier {
            notifier.notify_run_summary(stats.summary()).await;
        }
        Ok(stats)
    }

    async fn run_loop(
        &mut self,
        scrape_first: bool,
        max_applications: usize,
        dry_run: bool,
        stats: &mut RunStats,
    ) -> Result<()> {
        if scrape_first {
            // 抓取失败只记日志，不中止本轮运行
            match self
                .aggregator
                .scrape_all(self.config.scrape_limit_per_source)
                .await
            {
                Ok(outcome) => {
                    stats.scraped_new = outcome.stats.total_new;
                    self.store.upsert_postings(&outcome.postings).await?;
                }
                Err(e) => warn!("⚠️ 抓取失败，继续处理存量职位: {:#}", e),
            }
        }

        // 超额拉取，吸收分流与过期造成的损耗
        let pending = self
            .store
            .get_pending_postings(max_applications * 2)
            .await?;
        info!("📋 待处理职位: {} 个 (上限 {} 份申请)", pending.len(), max_applications);

        let total = pending.len();
        for (index, mut posting) in pending.into_iter().enumerate() {
            self.resolve_platform(&mut posting).await?;

            // 没有策略的职位直接分流人工，不建申请、不占提交名额
            if self.registry.get(posting.platform).is_none() {
                info!(
                    "◌ 无自动策略: {} @ {} [{}]",
                    truncate_text(&posting.title, 60),
                    posting.company,
                    posting.platform
                );
                self.store
                    .update_posting_status(&posting.id, PostingStatus::NeedsReview)
                    .await?;
                if let Some(notifier) = &self.notifier {
                    notifier.notify_manual_apply(&posting).await;
                }
                stats.processed += 1;
                stats.needs_review += 1;
                continue;
            }

            if stats.submitted >= max_applications {
                info!("⏹ 已达到本轮提交上限 ({})", max_applications);
                break;
            }

            if !dry_run {
                self.ensure_browser().await?;
            }
            let browser = if dry_run { None } else { self.browser.as_deref() };
            let Some(filler) = self.registry.get(posting.platform) else {
                continue;
            };
            let outcome = match self.processor.process(browser, filler, &posting).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // 编排器边界：未预期的异常记为职位失败，继续下一个
                    let error = format!("{:#}", e);
                    warn!("❌ 处理职位异常: {}", error);
                    self.store
                        .update_posting_status(&posting.id, PostingStatus::Failed)
                        .await?;
                    ProcessOutcome::Failed(error)
                }
            };

            stats.processed += 1;
            match &outcome {
                ProcessOutcome::Submitted => stats.submitted += 1,
                ProcessOutcome::NeedsReview(_) => stats.needs_review += 1,
                ProcessOutcome::Failed(_) => stats.failed += 1,
                ProcessOutcome::Expired(_) => stats.expired += 1,
                ProcessOutcome::DryRun => stats.skipped += 1,
            }
            self.notify_outcome(&posting, &outcome).await;

            // 随机间隔，避免对外呈现突发流量
            if !dry_run && index + 1 < total {
                let delay = rand::thread_rng()
                    .gen_range(self.config.delay_min_secs..=self.config.delay_max_secs);
                info!("⏳ 等待 {:.0}s 后处理下一个职位...", delay);
                tokio::time::sleep(Duration::from_secs_f64(delay)).await;
            }
        }

        Ok(())
    }

    /// 平台未知时分类并落库
    async fn resolve_platform(&self, posting: &mut Posting) -> Result<()> {
        if posting.platform != Platform::Unknown {
            return Ok(());
        }
        let (platform, confidence) = classifier::classify(posting.effective_url());
        if platform != Platform::Unknown {
            info!(
                "🏷 平台分类: {} → {} (置信度 {:.2})",
                posting.effective_url(),
                platform,
                confidence
            );
            posting.platform = platform;
            self.store.set_posting_platform(&posting.id, platform).await?;
        }
        Ok(())
    }

    async fn notify_outcome(&self, posting: &Posting, outcome: &ProcessOutcome) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        // 通知只需要职位级别的字段，临时构造申请视图
        let app = crate::models::Application::from_posting(posting);
        match outcome {
            ProcessOutcome::Submitted => notifier.notify_submitted(&app).await,
            ProcessOutcome::NeedsReview(reason) => {
                notifier.notify_needs_review(&app, reason).await
            }
            ProcessOutcome::Failed(error) => notifier.notify_failed(&app, error).await,
            ProcessOutcome::Expired(_) | ProcessOutcome::DryRun => {}
        }
    }

    /// 延迟启动浏览器
    async fn ensure_browser(&mut self) -> Result<()> {
        if self.browser.is_none() {
            let browser = ChromiumBrowser::launch(
                &self.config.browser_executable,
                self.config.screenshots_dir.clone(),
            )
            .await?;
            self.browser = Some(Box::new(browser));
        }
        Ok(())
    }

    #[cfg(test)]
    fn with_parts(
        config: Config,
        store: Arc<dyn JobStore>,
        registry: FillerRegistry,
        browser: Box<dyn BrowserControl>,
    ) -> Self {
        let seen = Arc::new(SeenUrls::new());
        let processor = PostingProcessor::new(
            Arc::clone(&store),
            config.review_mode,
            Duration::from_secs(config.navigation_timeout_secs),
        );
        Self {
            aggregator: JobAggregator::new(
                seen,
                config.search_keywords.clone(),
                config.search_location.clone(),
            ),
            store,
            gateway: None,
            notifier: None,
            registry,
            processor,
            browser: Some(browser),
            config,
        }
    }
}
