//! 配额账本与速率限制
//!
//! 按自然日统计请求数、按自然月统计生成单位消耗，跨重启持久化到
//! JSON 文件。加载时：存储日期与当天不同则日计数恰好重置一次，
//! 存储月份与当月不同则月计数恰好重置一次。
//! 读取-检查-记账整个序列处于同一互斥区内，并发调用方不可能
//! 同时观察到"还有额度"而合计超限。

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

/// 请求日志保留条数上限
const REQUEST_LOG_CAP: usize = 100;

/// 配额上限配置
#[derive(Debug, Clone, Copy)]
pub struct QuotaLimits {
    /// 每日请求上限
    pub max_requests_per_day: u64,
    /// 每月生成单位上限
    pub max_monthly_units: u64,
    /// 两次请求之间的最小间隔
    pub min_request_interval: Duration,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            max_requests_per_day: 1000,
            max_monthly_units: 900_000,
            min_request_interval: Duration::from_secs(2),
        }
    }
}

/// 请求被拒绝的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// 每日请求上限已到（午夜重置）
    DailyLimit { limit: u64 },
    /// 每月单位上限已到
    MonthlyLimit { limit: u64 },
    /// 距上次请求的最小间隔未满，需再等待
    Interval { wait: Duration },
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Block::DailyLimit { limit } => write!(f, "每日请求上限已到 ({} 次)，午夜重置", limit),
            Block::MonthlyLimit { limit } => write!(f, "每月生成单位上限已到 ({} 单位)", limit),
            Block::Interval { wait } => write!(f, "触发速率限制，需等待 {:.1}s", wait.as_secs_f64()),
        }
    }
}

impl Block {
    /// 上限类拒绝（日/月）不可通过等待恢复
    pub fn is_ceiling(&self) -> bool {
        matches!(self, Block::DailyLimit { .. } | Block::MonthlyLimit { .. })
    }
}

/// 用量快照
#[derive(Debug, Clone)]
pub struct UsageStats {
    pub daily_requests: u64,
    pub daily_limit: u64,
    pub monthly_units: u64,
    pub monthly_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RequestLogEntry {
    timestamp: DateTime<Local>,
    units: u64,
}

/// 持久化账本格式
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Ledger {
    daily_requests: u64,
    monthly_units: u64,
    /// 存储的自然日（"YYYY-MM-DD"）
    date: String,
    /// 存储的自然月（1-12）
    month: u32,
    #[serde(default)]
    requests_log: Vec<RequestLogEntry>,
}

impl Ledger {
    fn fresh() -> Self {
        let today = Local::now();
        Self {
            daily_requests: 0,
            monthly_units: 0,
            date: today.date_naive().to_string(),
            month: today.month(),
            requests_log: Vec::new(),
        }
    }
}

struct Inner {
    ledger: Ledger,
    /// 上次获准请求的时刻（进程内）
    last_request: Option<Instant>,
}

/// 速率限制器
pub struct RateLimiter {
    path: PathBuf,
    limits: QuotaLimits,
    inner: Mutex<Inner>,
}

impl RateLimiter {
    /// 加载账本（文件缺失或损坏时从零开始）
    pub fn load(path: impl AsRef<Path>, limits: QuotaLimits) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut ledger = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|_| Ledger::fresh()),
            Err(_) => Ledger::fresh(),
        };

        // 日期翻转：日计数与请求日志恰好重置一次
        let today = Local::now();
        if ledger.date != today.date_naive().to_string() {
            ledger.daily_requests = 0;
            ledger.date = today.date_naive().to_string();
            ledger.requests_log.clear();
        }
        // 月份翻转：月计数恰好重置一次
        if ledger.month != today.month() {
            ledger.monthly_units = 0;
            ledger.month = today.month();
        }

        debug!(
            "配额账本已加载: 今日 {} 次请求, 本月 {} 单位",
            ledger.daily_requests, ledger.monthly_units
        );
        Self {
            path,
            limits,
            inner: Mutex::new(Inner {
                ledger,
                last_request: None,
            }),
        }
    }

    /// 检查当前是否可以发起请求
    ///
    /// 按优先级评估：日上限 → 月上限 → 最小间隔。
    pub async fn check(&self) -> Option<Block> {
        let inner = self.inner.lock().await;
        self.check_locked(&inner)
    }

    fn check_locked(&self, inner: &Inner) -> Option<Block> {
        if inner.ledger.daily_requests >= self.limits.max_requests_per_day {
            return Some(Block::DailyLimit {
                limit: self.limits.max_requests_per_day,
            });
        }
        if inner.ledger.monthly_units >= self.limits.max_monthly_units {
            return Some(Block::MonthlyLimit {
                limit: self.limits.max_monthly_units,
            });
        }
        if let Some(last) = inner.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.limits.min_request_interval {
                return Some(Block::Interval {
                    wait: self.limits.min_request_interval - elapsed,
                });
            }
        }
        None
    }

    /// 距最小间隔未满时挂起等待（定时器挂起，可被取消）
    pub async fn wait_if_needed(&self) {
        let wait = {
            let inner = self.inner.lock().await;
            match self.check_locked(&inner) {
                Some(Block::Interval { wait }) => Some(wait),
                _ => None,
            }
        };
        if let Some(wait) = wait {
            tokio::time::sleep(wait).await;
        }
    }

    /// 记录一次已发出的请求
    ///
    /// 配额类下游失败也会以 0 单位记账，日计数始终反映尝试次数。
    pub async fn record_request(&self, units: u64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.ledger.daily_requests += 1;
        inner.ledger.monthly_units += units;
        inner.ledger.requests_log.push(RequestLogEntry {
            timestamp: Local::now(),
            units,
        });
        let len = inner.ledger.requests_log.len();
        if len > REQUEST_LOG_CAP {
            inner.ledger.requests_log.drain(..len - REQUEST_LOG_CAP);
        }
        inner.last_request = Some(Instant::now());
        self.persist(&inner.ledger)
    }

    /// 用量快照
    pub async fn usage_stats(&self) -> UsageStats {
        let inner = self.inner.lock().await;
        UsageStats {
            daily_requests: inner.ledger.daily_requests,
            daily_limit: self.limits.max_requests_per_day,
            monthly_units: inner.ledger.monthly_units,
            monthly_limit: self.limits.max_monthly_units,
        }
    }

    /// 任一额度使用超过 80%
    pub async fn is_near_limit(&self) -> bool {
        let inner = self.inner.lock().await;
        let daily = inner.ledger.daily_requests as f64 / self.limits.max_requests_per_day as f64;
        let monthly = inner.ledger.monthly_units as f64 / self.limits.max_monthly_units as f64;
        daily > 0.8 || monthly > 0.8
    }

    fn persist(&self, ledger: &Ledger) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(ledger)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("无法写入配额账本: {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "auto_applier_usage_{}_{}.json",
            name,
            std::process::id()
        ))
    }

    fn limits(rpd: u64, monthly: u64, interval_ms: u64) -> QuotaLimits {
        QuotaLimits {
            max_requests_per_day: rpd,
            max_monthly_units: monthly,
            min_request_interval: Duration::from_millis(interval_ms),
        }
    }

    #[tokio::test]
    async fn test_daily_counter_is_monotonic() {
        let path = temp_path("monotonic");
        let _ = std::fs::remove_file(&path);
        let limiter = RateLimiter::load(&path, limits(3, 1_000_000, 0));

        for n in 1..=3u64 {
            assert!(limiter.check().await.is_none());
            limiter.record_request(10).await.unwrap();
            assert_eq!(limiter.usage_stats().await.daily_requests, n);
        }

        // 到达日上限后拒绝，且原因是日上限
        match limiter.check().await {
            Some(Block::DailyLimit { limit }) => assert_eq!(limit, 3),
            other => panic!("期望日上限拒绝，得到 {:?}", other),
        }

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_monthly_ceiling() {
        let path = temp_path("monthly");
        let _ = std::fs::remove_file(&path);
        let limiter = RateLimiter::load(&path, limits(100, 50, 0));
        limiter.record_request(60).await.unwrap();
        assert!(matches!(
            limiter.check().await,
            Some(Block::MonthlyLimit { .. })
        ));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_minimum_interval_enforced() {
        let path = temp_path("interval");
        let _ = std::fs::remove_file(&path);
        let limiter = RateLimiter::load(&path, limits(100, 1_000_000, 150));

        let start = Instant::now();
        limiter.record_request(1).await.unwrap();

        // 紧接着的请求触发间隔拒绝，且给出剩余等待时间
        match limiter.check().await {
            Some(Block::Interval { wait }) => assert!(wait <= Duration::from_millis(150)),
            other => panic!("期望间隔拒绝，得到 {:?}", other),
        }

        limiter.wait_if_needed().await;
        assert!(limiter.check().await.is_none());
        limiter.record_request(1).await.unwrap();

        // 两次获准请求之间的墙钟间隔不小于最小间隔
        assert!(start.elapsed() >= Duration::from_millis(150));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_persisted_ledger_survives_restart() {
        let path = temp_path("restart");
        let _ = std::fs::remove_file(&path);
        {
            let limiter = RateLimiter::load(&path, limits(100, 1_000_000, 0));
            limiter.record_request(42).await.unwrap();
        }
        let reloaded = RateLimiter::load(&path, limits(100, 1_000_000, 0));
        let stats = reloaded.usage_stats().await;
        assert_eq!(stats.daily_requests, 1);
        assert_eq!(stats.monthly_units, 42);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_daily_reset_on_date_rollover() {
        let path = temp_path("rollover");
        let _ = std::fs::remove_file(&path);
        // 手工构造昨天的账本
        let stale = serde_json::json!({
            "daily_requests": 99,
            "monthly_units": 500,
            "date": "2001-01-01",
            "month": Local::now().month(),
            "requests_log": []
        });
        std::fs::write(&path, stale.to_string()).unwrap();

        let limiter = RateLimiter::load(&path, limits(100, 1_000_000, 0));
        let stats = limiter.usage_stats().await;
        // 日计数重置，月计数保留（月份一致）
        assert_eq!(stats.daily_requests, 0);
        assert_eq!(stats.monthly_units, 500);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_monthly_reset_on_month_rollover() {
        let path = temp_path("month_rollover");
        let _ = std::fs::remove_file(&path);
        let other_month = if Local::now().month() == 1 { 2 } else { 1 };
        let stale = serde_json::json!({
            "daily_requests": 5,
            "monthly_units": 500,
            "date": "2001-01-01",
            "month": other_month,
            "requests_log": []
        });
        std::fs::write(&path, stale.to_string()).unwrap();

        let limiter = RateLimiter::load(&path, limits(100, 1_000_000, 0));
        let stats = limiter.usage_stats().await;
        assert_eq!(stats.daily_requests, 0);
        assert_eq!(stats.monthly_units, 0);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_near_limit_threshold() {
        let path = temp_path("near");
        let _ = std::fs::remove_file(&path);
        let limiter = RateLimiter::load(&path, limits(10, 1_000_000, 0));
        for _ in 0..8 {
            limiter.record_request(0).await.unwrap();
        }
        assert!(!limiter.is_near_limit().await);
        limiter.record_request(0).await.unwrap();
        assert!(limiter.is_near_limit().await);
        let _ = std::fs::remove_file(&path);
    }
}
