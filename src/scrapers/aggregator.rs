//! 来源聚合器
//!
//! 向所有注册的连接器扇出抓取请求，合并结果后依次套用
//! URL 去重过滤器和（可选的）链接校验器，并输出每个来源的统计。
//! 单个连接器失败只影响它自己：记日志、贡献零条职位。

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use tracing::{info, warn};

use crate::models::Posting;
use crate::scrapers::connector::SourceConnector;
use crate::scrapers::dedup::SeenUrls;
use crate::scrapers::link_validator::LinkValidator;

/// 单个来源的统计
#[derive(Debug, Clone)]
pub struct SourceStats {
    pub name: String,
    /// 该来源返回的职位数
    pub found: usize,
    /// 过滤后实际进入待处理队列的职位数
    pub admitted: usize,
}

/// 一次聚合抓取的统计
#[derive(Debug, Clone, Default)]
pub struct ScrapeStats {
    pub sources: Vec<SourceStats>,
    pub total_found: usize,
    pub total_new: usize,
    pub duplicates_removed: usize,
    pub invalid_removed: usize,
}

/// 一次聚合抓取的结果
#[derive(Debug)]
pub struct ScrapeOutcome {
    pub postings: Vec<Posting>,
    pub stats: ScrapeStats,
}

/// 来源聚合器
pub struct JobAggregator {
    connectors: Vec<Box<dyn SourceConnector>>,
    seen: Arc<SeenUrls>,
    validator: Option<Arc<LinkValidator>>,
    /// 内容级校验（抓正文检查失效/钓鱼短语）
    check_content: bool,
    keywords: Vec<String>,
    location: String,
}

impl JobAggregator {
    pub fn new(seen: Arc<SeenUrls>, keywords: Vec<String>, location: String) -> Self {
        Self {
            connectors: Vec::new(),
            seen,
            validator: None,
            check_content: false,
            keywords,
            location,
        }
    }

    /// 注册一个来源连接器
    pub fn register(&mut self, connector: Box<dyn SourceConnector>) {
        self.connectors.push(connector);
    }

    /// 启用链接校验
    pub fn with_validator(mut self, validator: Arc<LinkValidator>, check_content: bool) -> Self {
        self.validator = Some(validator);
        self.check_content = check_content;
        self
    }

    /// 聚合抓取所有来源
    ///
    /// 保证：返回列表中不存在两个规范化 URL 相同的职位；
    /// 已在去重集合中的 URL 计入 duplicates_removed，不算错误。
    pub async fn scrape_all(&self, limit_per_source: usize) -> Result<ScrapeOutcome> {
        info!("🔍 开始聚合抓取，共 {} 个来源", self.connectors.len());

        // 向所有来源扇出（并发数受来源数量自然约束）
        let scrapes = self.connectors.iter().map(|connector| async move {
            let name = connector.name().to_string();
            match connector
                .scrape(&self.keywords, &self.location, limit_per_source)
                .await
            {
                Ok(postings) => (name, postings),
                Err(e) => {
                    // 连接器故障被隔离，绝不中止聚合
                    warn!("⚠️ 来源 {} 抓取失败: {:#}", name, e);
                    (name, Vec::new())
                }
            }
        });
        let per_source: Vec<(String, Vec<Posting>)> = join_all(scrapes).await;

        let mut stats = ScrapeStats::default();
        let mut merged = Vec::new();
        let mut found_by_source = HashMap::new();
        for (name, postings) in per_source {
            stats.total_found += postings.len();
            found_by_source.insert(name, postings.len());
            merged.extend(postings);
        }

        // (a) URL 去重
        let before_dedup = merged.len();
        let fresh = self.seen.filter_new(merged);
        stats.duplicates_removed = before_dedup - fresh.len();

        // (b) 可选链接校验
        let admitted = match &self.validator {
            Some(validator) => {
                let (valid, invalid) = validator
                    .validate_postings(fresh, self.check_content)
                    .await;
                stats.invalid_removed = invalid.len();
                valid
            }
            None => fresh,
        };
        stats.total_new = admitted.len();

        // 统计每个来源的准入数量
        let mut admitted_by_source: HashMap<&str, usize> = HashMap::new();
        for posting in &admitted {
            *admitted_by_source.entry(posting.source.as_str()).or_default() += 1;
        }
        for (name, found) in found_by_source {
            let admitted_count = admitted_by_source.get(name.as_str()).copied().unwrap_or(0);
            stats.sources.push(SourceStats {
                name,
                found,
                admitted: admitted_count,
            });
        }

        info!(
            "✓ 抓取完成: 发现 {} 个, 新增 {} 个, 重复 {} 个, 无效 {} 个",
            stats.total_found, stats.total_new, stats.duplicates_removed, stats.invalid_removed
        );

        Ok(ScrapeOutcome {
            postings: admitted,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    /// 返回固定职位列表的桩连接器
    struct StaticConnector {
        name: String,
        postings: Vec<Posting>,
        fail: bool,
    }

    #[async_trait]
    impl SourceConnector for StaticConnector {
        fn name(&self) -> &str {
            &self.name
        }

        async fn scrape(
            &self,
            _keywords: &[String],
            _location: &str,
            limit: usize,
        ) -> Result<Vec<Posting>> {
            if self.fail {
                anyhow::bail!("来源不可用");
            }
            Ok(self.postings.iter().take(limit).cloned().collect())
        }
    }

    fn posting(source: &str, url: &str) -> Posting {
        Posting::new(None, "T", "C", url, source)
    }

    #[tokio::test]
    async fn test_scenario_admission_pipeline() {
        // 一个来源给出 10 个职位，其中 3 个已在去重集合中，
        // 1 个命中可疑域名，其余 6 个准入。
        let seen = Arc::new(SeenUrls::new());
        seen.seed([
            "http://127.0.0.1:9/job/1",
            "http://127.0.0.1:9/job/2",
            "http://127.0.0.1:9/job/3",
        ]);

        let mut postings: Vec<Posting> = (1..=9)
            // 连接被立即拒绝 → 校验 fail-open 放行
            .map(|n| posting("stub", &format!("http://127.0.0.1:9/job/{}", n)))
            .collect();
        postings.push(posting("stub", "https://scam.blogspot.invalid/job/10"));

        let mut aggregator = JobAggregator::new(seen, vec![], String::new()).with_validator(
            Arc::new(LinkValidator::new(Duration::from_millis(500), 10).unwrap()),
            false,
        );
        aggregator.register(Box::new(StaticConnector {
            name: "stub".to_string(),
            postings,
            fail: false,
        }));

        let outcome = aggregator.scrape_all(20).await.unwrap();
        assert_eq!(outcome.stats.total_found, 10);
        assert_eq!(outcome.stats.duplicates_removed, 3);
        assert_eq!(outcome.stats.invalid_removed, 1);
        assert_eq!(outcome.stats.total_new, 6);
        assert_eq!(outcome.postings.len(), 6);
        assert_eq!(outcome.stats.sources.len(), 1);
        assert_eq!(outcome.stats.sources[0].found, 10);
        assert_eq!(outcome.stats.sources[0].admitted, 6);
    }

    #[tokio::test]
    async fn test_connector_failure_is_isolated() {
        let seen = Arc::new(SeenUrls::new());
        let mut aggregator = JobAggregator::new(seen, vec![], String::new());
        aggregator.register(Box::new(StaticConnector {
            name: "broken".to_string(),
            postings: vec![],
            fail: true,
        }));
        aggregator.register(Box::new(StaticConnector {
            name: "healthy".to_string(),
            postings: vec![posting("healthy", "https://x.com/job/1")],
            fail: false,
        }));

        let outcome = aggregator.scrape_all(10).await.unwrap();
        assert_eq!(outcome.postings.len(), 1);
        assert_eq!(outcome.stats.total_found, 1);
        // 故障来源仍出现在统计中，计数为零
        let broken = outcome
            .stats
            .sources
            .iter()
            .find(|s| s.name == "broken")
            .unwrap();
        assert_eq!(broken.found, 0);
        assert_eq!(broken.admitted, 0);
    }

    #[tokio::test]
    async fn test_no_duplicate_urls_in_result() {
        let seen = Arc::new(SeenUrls::new());
        let mut aggregator = JobAggregator::new(seen, vec![], String::new());
        // 两个来源给出同一 URL（大小写和尾斜杠不同）
        aggregator.register(Box::new(StaticConnector {
            name: "a".to_string(),
            postings: vec![posting("a", "https://x.com/job/1")],
            fail: false,
        }));
        aggregator.register(Box::new(StaticConnector {
            name: "b".to_string(),
            postings: vec![posting("b", "https://X.com/job/1/")],
            fail: false,
        }));

        let outcome = aggregator.scrape_all(10).await.unwrap();
        assert_eq!(outcome.postings.len(), 1);
        assert_eq!(outcome.stats.duplicates_removed, 1);
    }
}
