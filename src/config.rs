/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 单次运行最多提交的申请数量
    pub max_applications_per_run: usize,
    /// 审核模式：填写完成后暂停等待人工确认，不直接提交
    pub review_mode: bool,
    /// 两次申请之间的最小随机延迟（秒）
    pub delay_min_secs: f64,
    /// 两次申请之间的最大随机延迟（秒）
    pub delay_max_secs: f64,
    /// 申请人档案文件路径（TOML）
    pub profile_path: String,
    /// 职位/申请存储文件路径（JSON）
    pub storage_path: String,
    /// 截图输出目录
    pub screenshots_dir: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// LLM 用量账本文件路径
    pub llm_usage_file: String,
    /// 每日请求上限
    pub llm_max_requests_per_day: u64,
    /// 每月生成单位上限
    pub llm_max_monthly_units: u64,
    /// 两次请求之间的最小间隔（毫秒）
    pub llm_min_request_interval_ms: u64,
    // --- 浏览器配置 ---
    /// 浏览器可执行文件路径（为空则使用系统默认）
    pub browser_executable: String,
    /// 页面导航超时（秒）
    pub navigation_timeout_secs: u64,
    /// 单次填表的最大步骤数
    pub max_fill_steps: usize,
    // --- 抓取与校验配置 ---
    /// 每个来源的抓取上限
    pub scrape_limit_per_source: usize,
    /// 抓取后是否进行链接校验
    pub validate_links: bool,
    /// 链接校验超时（秒）
    pub validator_timeout_secs: u64,
    /// 链接校验最大并发数
    pub validator_max_concurrent: usize,
    /// Greenhouse 公开招聘板列表（逗号分隔）
    pub greenhouse_boards: Vec<String>,
    /// 搜索关键词（逗号分隔）
    pub search_keywords: Vec<String>,
    /// 搜索地点
    pub search_location: String,
    // --- 通知配置 ---
    /// ntfy 服务器地址
    pub ntfy_server: String,
    /// ntfy 主题（为空则禁用通知）
    pub ntfy_topic: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_applications_per_run: 5,
            review_mode: true,
            delay_min_secs: 30.0,
            delay_max_secs: 90.0,
            profile_path: "data/profile.toml".to_string(),
            storage_path: "data/jobs.json".to_string(),
            screenshots_dir: "data/screenshots".to_string(),
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_usage_file: "data/llm_usage.json".to_string(),
            llm_max_requests_per_day: 1000,
            llm_max_monthly_units: 900_000,
            llm_min_request_interval_ms: 2000,
            browser_executable: String::new(),
            navigation_timeout_secs: 30,
            max_fill_steps: 15,
            scrape_limit_per_source: 20,
            validate_links: true,
            validator_timeout_secs: 10,
            validator_max_concurrent: 10,
            greenhouse_boards: Vec::new(),
            search_keywords: vec!["software engineer".to_string()],
            search_location: "Remote".to_string(),
            ntfy_server: "https://ntfy.sh".to_string(),
            ntfy_topic: String::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_applications_per_run: std::env::var("MAX_APPLICATIONS_PER_RUN").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_applications_per_run),
            review_mode: std::env::var("REVIEW_MODE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.review_mode),
            delay_min_secs: std::env::var("DELAY_MIN_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.delay_min_secs),
            delay_max_secs: std::env::var("DELAY_MAX_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.delay_max_secs),
            profile_path: std::env::var("PROFILE_PATH").unwrap_or(default.profile_path),
            storage_path: std::env::var("STORAGE_PATH").unwrap_or(default.storage_path),
            screenshots_dir: std::env::var("SCREENSHOTS_DIR").unwrap_or(default.screenshots_dir),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_usage_file: std::env::var("LLM_USAGE_FILE").unwrap_or(default.llm_usage_file),
            llm_max_requests_per_day: std::env::var("LLM_MAX_REQUESTS_PER_DAY").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_max_requests_per_day),
            llm_max_monthly_units: std::env::var("LLM_MAX_MONTHLY_UNITS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_max_monthly_units),
            llm_min_request_interval_ms: std::env::var("LLM_MIN_REQUEST_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_min_request_interval_ms),
            browser_executable: std::env::var("BROWSER_EXECUTABLE").unwrap_or(default.browser_executable),
            navigation_timeout_secs: std::env::var("NAVIGATION_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.navigation_timeout_secs),
            max_fill_steps: std::env::var("MAX_FILL_STEPS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_fill_steps),
            scrape_limit_per_source: std::env::var("SCRAPE_LIMIT_PER_SOURCE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.scrape_limit_per_source),
            validate_links: std::env::var("VALIDATE_LINKS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.validate_links),
            validator_timeout_secs: std::env::var("VALIDATOR_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.validator_timeout_secs),
            validator_max_concurrent: std::env::var("VALIDATOR_MAX_CONCURRENT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.validator_max_concurrent),
            greenhouse_boards: parse_list(std::env::var("GREENHOUSE_BOARDS").ok(), default.greenhouse_boards),
            search_keywords: parse_list(std::env::var("SEARCH_KEYWORDS").ok(), default.search_keywords),
            search_location: std::env::var("SEARCH_LOCATION").unwrap_or(default.search_location),
            ntfy_server: std::env::var("NTFY_SERVER").unwrap_or(default.ntfy_server),
            ntfy_topic: std::env::var("NTFY_TOPIC").unwrap_or(default.ntfy_topic),
        }
    }
}

/// 解析逗号分隔的环境变量列表
fn parse_list(value: Option<String>, default: Vec<String>) -> Vec<String> {
    match value {
        Some(v) => v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_applications_per_run, 5);
        assert_eq!(config.validator_max_concurrent, 10);
        assert_eq!(config.llm_min_request_interval_ms, 2000);
        assert!(config.review_mode);
    }

    #[test]
    fn test_parse_list() {
        let parsed = parse_list(Some("a, b,c,".to_string()), vec![]);
        assert_eq!(parsed, vec!["a", "b", "c"]);
        let fallback = parse_list(None, vec!["x".to_string()]);
        assert_eq!(fallback, vec!["x"]);
    }
}
