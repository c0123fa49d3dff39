//! Greenhouse 公开招聘板连接器
//!
//! Greenhouse 为每个公司的招聘板提供公开 JSON API
//! （`/v1/boards/{board}/jobs`），无需凭证即可读取。
//! 每个连接器实例负责一组配置好的招聘板。

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::Posting;
use crate::scrapers::connector::SourceConnector;

const DEFAULT_API_BASE: &str = "https://boards-api.greenhouse.io/v1/boards";

#[derive(Debug, Deserialize)]
struct BoardResponse {
    #[serde(default)]
    jobs: Vec<BoardJob>,
}

#[derive(Debug, Deserialize)]
struct BoardJob {
    id: u64,
    title: String,
    absolute_url: String,
    #[serde(default)]
    location: Option<BoardLocation>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BoardLocation {
    #[serde(default)]
    name: String,
}

/// Greenhouse 招聘板连接器
pub struct GreenhouseBoardConnector {
    client: reqwest::Client,
    api_base: String,
    boards: Vec<String>,
}

impl GreenhouseBoardConnector {
    pub fn new(boards: Vec<String>) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
            api_base: DEFAULT_API_BASE.to_string(),
            boards,
        })
    }

    /// 指定 API 地址（测试用）
    #[cfg(test)]
    fn with_api_base(boards: Vec<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            boards,
        }
    }

    async fn fetch_board(&self, board: &str) -> Result<Vec<BoardJob>> {
        let url = format!("{}/{}/jobs?content=true", self.api_base, board);
        debug!("抓取 Greenhouse 招聘板: {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("请求招聘板失败: {}", board))?
            .error_for_status()
            .with_context(|| format!("招聘板返回错误状态: {}", board))?;
        let parsed: BoardResponse = response
            .json()
            .await
            .with_context(|| format!("解析招聘板响应失败: {}", board))?;
        Ok(parsed.jobs)
    }

    fn matches_keywords(title: &str, keywords: &[String]) -> bool {
        if keywords.is_empty() {
            return true;
        }
        let title_lower = title.to_lowercase();
        keywords.iter().any(|k| title_lower.contains(&k.to_lowercase()))
    }
}

#[async_trait]
impl SourceConnector for GreenhouseBoardConnector {
    fn name(&self) -> &str {
        "greenhouse_boards"
    }

    async fn scrape(
        &self,
        keywords: &[String],
        _location: &str,
        limit: usize,
    ) -> Result<Vec<Posting>> {
        let mut postings = Vec::new();

        for board in &self.boards {
            if postings.len() >= limit {
                break;
            }
            // 单个招聘板失败不影响其余招聘板
            let jobs = match self.fetch_board(board).await {
                Ok(jobs) => jobs,
                Err(e) => {
                    warn!("⚠️ 招聘板 {} 抓取失败: {:#}", board, e);
                    continue;
                }
            };

            for job in jobs {
                if postings.len() >= limit {
                    break;
                }
                if !Self::matches_keywords(&job.title, keywords) {
                    continue;
                }
                let mut posting = Posting::new(
                    Some(&format!("gh-{}", job.id)),
                    job.title,
                    board.clone(),
                    job.absolute_url,
                    self.name(),
                );
                posting.location = job.location.map(|l| l.name).unwrap_or_default();
                posting.description = job.content;
                postings.push(posting);
            }
        }

        Ok(postings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const BOARD_JSON: &str = r#"{"jobs":[
        {"id":101,"title":"Senior Rust Engineer","absolute_url":"https://boards.greenhouse.io/acme/jobs/101","location":{"name":"Remote"}},
        {"id":102,"title":"Accountant","absolute_url":"https://boards.greenhouse.io/acme/jobs/102","location":{"name":"NYC"}}
    ]}"#;

    async fn serve_board() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 2048];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    BOARD_JSON.len(),
                    BOARD_JSON
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_scrape_filters_by_keyword() {
        let base = serve_board().await;
        let connector =
            GreenhouseBoardConnector::with_api_base(vec!["acme".to_string()], base);
        let postings = connector
            .scrape(&["rust".to_string()], "", 10)
            .await
            .unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].id, "gh-101");
        assert_eq!(postings[0].location, "Remote");
        assert_eq!(postings[0].source, "greenhouse_boards");
    }

    #[tokio::test]
    async fn test_board_failure_yields_empty_not_error() {
        // 指向无人监听的端口，单板失败只记日志
        let connector = GreenhouseBoardConnector::with_api_base(
            vec!["acme".to_string()],
            "http://127.0.0.1:9",
        );
        let postings = connector.scrape(&[], "", 10).await.unwrap();
        assert!(postings.is_empty());
    }

    #[test]
    fn test_keyword_matching() {
        let keywords = vec!["engineer".to_string()];
        assert!(GreenhouseBoardConnector::matches_keywords("Senior Engineer", &keywords));
        assert!(!GreenhouseBoardConnector::matches_keywords("Accountant", &keywords));
        assert!(GreenhouseBoardConnector::matches_keywords("Anything", &[]));
    }
}
