//! URL 去重过滤器
//!
//! 维护"已见过"的规范化职位 URL 集合。运行开始时从存储播种，
//! 新职位准入后在内存中扩展；一次运行内集合只增不减。

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::debug;

use crate::models::posting::{normalize_url, Posting};

/// 已见 URL 集合
///
/// 检查并标记是单个锁区内的原子操作，并发过滤不会重复准入同一 URL。
pub struct SeenUrls {
    seen: Mutex<HashSet<String>>,
}

impl SeenUrls {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// 从存储播种（必须在本次运行第一次抓取之前完成）
    pub fn seed<I, S>(&self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = self.lock();
        for url in urls {
            seen.insert(normalize_url(url.as_ref()));
        }
        debug!("去重集合已播种: {} 条 URL", seen.len());
    }

    /// 该 URL 是否从未见过
    pub fn is_new(&self, url: &str) -> bool {
        !self.lock().contains(&normalize_url(url))
    }

    /// 标记 URL 为已见
    pub fn mark_seen(&self, url: &str) {
        self.lock().insert(normalize_url(url));
    }

    /// 过滤出未见过的职位
    ///
    /// 保序单遍扫描；返回的每个职位的 URL 同时被标记为已见，
    /// 因此对同一输入再过滤一次会得到空集。
    pub fn filter_new(&self, postings: Vec<Posting>) -> Vec<Posting> {
        let mut seen = self.lock();
        let mut fresh = Vec::new();
        for posting in postings {
            let normalized = normalize_url(&posting.url);
            // 检查并标记在同一锁区内完成
            if seen.insert(normalized) {
                fresh.push(posting);
            }
        }
        fresh
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SeenUrls {
    fn default() -> Self {
        Self::new()
    }
}
