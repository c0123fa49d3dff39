//! 链接校验器
//!
//! 把职位 URL 归类为有效 / 失效 / 可疑。网络探测受计数信号量约束；
//! 超时和传输错误一律按有效处理（fail-open）：瞬时网络故障绝不能
//! 导致真实职位被误杀。校验结果按 URL 缓存，实例存续期内有效。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::models::Posting;

/// 失效页面的提示短语（全小写匹配）
const DEAD_LINK_PATTERNS: &[&str] = &[
    "job not found",
    "job does not exist",
    "position has been filled",
    "this job is no longer available",
    "page not found",
    "job has been removed",
    "no longer accepting",
];

/// 钓鱼迹象短语
const PHISHING_KEYWORDS: &[&str] = &[
    "telegram",
    "whatsapp",
    "check processing",
    "bank account",
    "money order",
    "verification code",
    "wire transfer",
    "google hangouts",
    "yahoo messenger",
    "cryptocurrency",
];

/// 免费建站等可疑域名片段（命中即拒绝，不发起网络请求）
const SUSPICIOUS_DOMAINS: &[&str] = &[
    "blogspot",
    "wordpress",
    "wixsite",
    "weebly",
    "yolasite",
    "jimdo",
    "site123",
    "angelfire",
    "tripod",
    "geocities",
];

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// 单条 URL 的校验结论
#[derive(Debug, Clone)]
pub struct Verdict {
    pub valid: bool,
    pub reason: Option<String>,
    /// 重定向解析后的最终地址（仅内容校验时提供）
    pub final_url: Option<String>,
}

impl Verdict {
    fn valid() -> Self {
        Self { valid: true, reason: None, final_url: None }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self { valid: false, reason: Some(reason.into()), final_url: None }
    }
}

/// 链接校验器
pub struct LinkValidator {
    client: reqwest::Client,
    semaphore: Arc<Semaphore>,
    cache: Mutex<HashMap<String, Verdict>>,
}

impl LinkValidator {
    /// 创建校验器
    ///
    /// `max_concurrent` 是同时在途的网络探测上限，默认取 10。
    pub fn new(timeout: Duration, max_concurrent: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// 轻量校验：可疑域名检查 + HEAD 探测（不取正文）
    pub async fn is_valid(&self, url: &str) -> (bool, Option<String>) {
        if let Some(cached) = self.cached(url) {
            return (cached.valid, cached.reason);
        }

        // 可疑域名优先，无需任何网络调用
        if let Some(domain) = suspicious_domain(url) {
            let verdict = Verdict::invalid(format!("suspicious domain: {}", domain));
            self.remember(url, &verdict);
            return (verdict.valid, verdict.reason);
        }

        let _permit = self.semaphore.acquire().await;
        match self.client.head(url).send().await {
            Ok(response) => {
                let status = response.status();
                let verdict = if status.as_u16() == 404 {
                    Verdict::invalid("404 Not Found")
                } else if status.is_client_error() || status.is_server_error() {
                    Verdict::invalid(format!("HTTP {}", status.as_u16()))
                } else {
                    Verdict::valid()
                };
                self.remember(url, &verdict);
                (verdict.valid, verdict.reason)
            }
            // 超时 / 传输错误一律放行，不写缓存（下次仍会探测）
            Err(e) => {
                debug!("链接探测失败（按有效处理）: {} ({})", url, e);
                (true, None)
            }
        }
    }

    /// 内容级校验：取正文并检查失效 / 钓鱼短语，附带最终地址
    pub async fn validate_with_content(&self, url: &str) -> (bool, Option<String>, Option<String>) {
        if let Some(domain) = suspicious_domain(url) {
            return (false, Some(format!("suspicious domain: {}", domain)), None);
        }

        let _permit = self.semaphore.acquire().await;
        match self.client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.as_u16() == 404 {
                    return (false, Some("404 Not Found".to_string()), None);
                }
                if status.is_client_error() || status.is_server_error() {
                    return (false, Some(format!("HTTP {}", status.as_u16())), None);
                }

                let final_url = response.url().to_string();
                let body = match response.text().await {
                    Ok(body) => body.to_lowercase(),
                    Err(e) => {
                        debug!("读取正文失败（按有效处理）: {} ({})", url, e);
                        return (true, None, None);
                    }
                };

                for pattern in DEAD_LINK_PATTERNS {
                    if body.contains(pattern) {
                        return (false, Some(format!("dead link: {}", pattern)), None);
                    }
                }
                for pattern in PHISHING_KEYWORDS {
                    if body.contains(pattern) {
                        return (false, Some(format!("phishing indicator: {}", pattern)), None);
                    }
                }

                let resolved = if final_url != url { Some(final_url) } else { None };
                (true, None, resolved)
            }
            Err(e) => {
                debug!("内容校验失败（按有效处理）: {} ({})", url, e);
                (true, None, None)
            }
        }
    }

    /// 批量校验
    ///
    /// 所有检查并发执行，结果与输入顺序一一对应。内容校验解析出
    /// 不同的最终地址时改写职位的 apply_url。
    pub async fn validate_postings(
        &self,
        postings: Vec<Posting>,
        check_content: bool,
    ) -> (Vec<Posting>, Vec<(Posting, String)>) {
        let checks = postings.iter().map(|posting| async move {
            if check_content {
                let (valid, reason, final_url) = self.validate_with_content(&posting.url).await;
                (valid, reason, final_url)
            } else {
                let (valid, reason) = self.is_valid(&posting.url).await;
                (valid, reason, None)
            }
        });
        let results = join_all(checks).await;

        let mut valid_postings = Vec::new();
        let mut invalid_postings = Vec::new();
        for (mut posting, (valid, reason, final_url)) in postings.into_iter().zip(results) {
            if let Some(final_url) = final_url {
                if final_url != posting.url {
                    posting.apply_url = Some(final_url);
                }
            }
            if valid {
                valid_postings.push(posting);
            } else {
                let reason = reason.unwrap_or_else(|| "unknown".to_string());
                warn!("❌ 职位链接无效: {} ({})", posting.url, reason);
                invalid_postings.push((posting, reason));
            }
        }
        (valid_postings, invalid_postings)
    }

    /// 清空结果缓存
    pub fn clear_cache(&self) {
        self.cache_lock().clear();
    }

    fn cached(&self, url: &str) -> Option<Verdict> {
        self.cache_lock().get(url).cloned()
    }

    fn remember(&self, url: &str, verdict: &Verdict) {
        self.cache_lock().insert(url.to_string(), verdict.clone());
    }

    fn cache_lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Verdict>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// URL 命中的第一个可疑域名片段
fn suspicious_domain(url: &str) -> Option<&'static str> {
    let url_lower = url.to_lowercase();
    SUSPICIOUS_DOMAINS
        .iter()
        .find(|domain| url_lower.contains(**domain))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// 起一个只应答一次固定响应的本地 HTTP 服务
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        format!("http://{}/job/1", addr)
    }

    fn validator(timeout_ms: u64) -> LinkValidator {
        LinkValidator::new(Duration::from_millis(timeout_ms), 10).unwrap()
    }

    #[tokio::test]
    async fn test_suspicious_domain_rejected_without_network() {
        let validator = validator(1000);
        // 指向不存在的主机：若发起网络调用会走 fail-open 分支返回有效
        let (valid, reason) = validator
            .is_valid("https://free-jobs.blogspot.invalid/job/1")
            .await;
        assert!(!valid);
        assert!(reason.unwrap().contains("suspicious domain"));
    }

    #[tokio::test]
    async fn test_404_is_invalid_with_reason() {
        let url = serve_once("HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n").await;
        let validator = validator(2000);
        let (valid, reason) = validator.is_valid(&url).await;
        assert!(!valid);
        assert!(reason.unwrap().contains("404"));
    }

    #[tokio::test]
    async fn test_timeout_fails_open() {
        // 监听但从不应答
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _conn = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let validator = validator(300);
        let (valid, reason) = validator.is_valid(&format!("http://{}/job/1", addr)).await;
        assert!(valid);
        assert!(reason.is_none());
    }

    #[tokio::test]
    async fn test_connection_refused_fails_open() {
        let validator = validator(1000);
        // 9 是 discard 端口，正常情况下无人监听，连接被立即拒绝
        let (valid, _) = validator.is_valid("http://127.0.0.1:9/job/1").await;
        assert!(valid);
    }

    #[tokio::test]
    async fn test_cache_survives_server_shutdown() {
        let url = serve_once("HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n").await;
        let validator = validator(2000);
        let (valid, _) = validator.is_valid(&url).await;
        assert!(!valid);

        // 服务只应答一次；第二次命中缓存仍为无效
        let (valid, reason) = validator.is_valid(&url).await;
        assert!(!valid);
        assert!(reason.unwrap().contains("404"));

        validator.clear_cache();
        // 缓存清空后重新探测，连接失败按有效处理
        let (valid, _) = validator.is_valid(&url).await;
        assert!(valid);
    }

    #[tokio::test]
    async fn test_dead_phrase_in_content() {
        let body = "This position has been filled. Thanks for your interest.";
        let url = serve_once(Box::leak(
            format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            )
            .into_boxed_str(),
        ))
        .await;

        let validator = validator(2000);
        let (valid, reason, _) = validator.validate_with_content(&url).await;
        assert!(!valid);
        assert!(reason.unwrap().contains("position has been filled"));
    }

    #[tokio::test]
    async fn test_validate_postings_partitions_and_preserves_input() {
        let validator = validator(1000);
        let postings = vec![
            // 连接被拒 → fail-open 有效
            Posting::new(None, "A", "X", "http://127.0.0.1:9/job/1", "test"),
            // 可疑域名 → 无效
            Posting::new(None, "B", "X", "https://jobs.blogspot.invalid/2", "test"),
        ];
        let (valid, invalid) = validator.validate_postings(postings, false).await;
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].title, "A");
        assert_eq!(invalid.len(), 1);
        assert!(invalid[0].1.contains("suspicious domain"));
    }
}
