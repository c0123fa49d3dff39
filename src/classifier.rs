//! 平台分类器
//!
//! 纯粹基于 URL 形状把职位映射到承载其申请表单的平台分类，
//! 不发起任何网络请求。识别不出的形状返回 `Unknown` 和低置信度。

use std::sync::OnceLock;

use phf::phf_map;
use regex::Regex;

use crate::models::Platform;

/// 域名片段 → 平台
static DOMAIN_TABLE: phf::Map<&'static str, Platform> = phf_map! {
    "boards.greenhouse.io" => Platform::Greenhouse,
    "greenhouse.io" => Platform::Greenhouse,
    "jobs.lever.co" => Platform::Lever,
    "lever.co" => Platform::Lever,
    "myworkdayjobs.com" => Platform::Workday,
    "workday.com" => Platform::Workday,
    "linkedin.com/jobs" => Platform::LinkedinEasy,
    "icims.com" => Platform::Icims,
    "taleo.net" => Platform::Taleo,
    "jobs.ashbyhq.com" => Platform::Ashby,
    "ashbyhq.com" => Platform::Ashby,
};

/// 强匹配的 URL 形状（完整的职位路径，而不只是域名）
fn strong_patterns() -> &'static [(Regex, Platform)] {
    static PATTERNS: OnceLock<Vec<(Regex, Platform)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            (
                Regex::new(r"boards\.greenhouse\.io/[^/]+/jobs/\d+").unwrap(),
                Platform::Greenhouse,
            ),
            (
                Regex::new(r"jobs\.lever\.co/[^/]+/[0-9a-f-]{36}").unwrap(),
                Platform::Lever,
            ),
            (
                Regex::new(r"linkedin\.com/jobs/view/\d+").unwrap(),
                Platform::LinkedinEasy,
            ),
            (
                Regex::new(r"jobs\.ashbyhq\.com/[^/]+/[0-9a-f-]{36}").unwrap(),
                Platform::Ashby,
            ),
        ]
    })
}

/// 对 URL 分类，返回平台与置信度
pub fn classify(url: &str) -> (Platform, f32) {
    let url_lower = url.to_lowercase();

    // 完整职位路径命中 → 高置信度
    for (pattern, platform) in strong_patterns() {
        if pattern.is_match(&url_lower) {
            return (*platform, 0.95);
        }
    }

    // 域名片段命中 → 中等置信度
    for (fragment, platform) in DOMAIN_TABLE.entries() {
        if url_lower.contains(fragment) {
            return (*platform, 0.8);
        }
    }

    (Platform::Unknown, 0.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_match_greenhouse() {
        let (platform, confidence) = classify("https://boards.greenhouse.io/acme/jobs/4012345");
        assert_eq!(platform, Platform::Greenhouse);
        assert!(confidence >= 0.9);
    }

    #[test]
    fn test_strong_match_lever() {
        let (platform, confidence) =
            classify("https://jobs.lever.co/acme/11111111-2222-3333-4444-555555555555");
        assert_eq!(platform, Platform::Lever);
        assert!(confidence >= 0.9);
    }

    #[test]
    fn test_domain_match_workday() {
        let (platform, confidence) =
            classify("https://acme.wd1.myworkdayjobs.com/en-US/External/details/Engineer");
        assert_eq!(platform, Platform::Workday);
        assert!(confidence >= 0.5);
    }

    #[test]
    fn test_linkedin_view_url() {
        let (platform, _) = classify("https://www.linkedin.com/jobs/view/3830012345");
        assert_eq!(platform, Platform::LinkedinEasy);
    }

    #[test]
    fn test_unknown_shape_low_confidence() {
        let (platform, confidence) = classify("https://careers.example.com/openings/42");
        assert_eq!(platform, Platform::Unknown);
        assert!(confidence < 0.5);
    }

    #[test]
    fn test_case_insensitive() {
        let (platform, _) = classify("https://Boards.Greenhouse.IO/Acme/jobs/1");
        assert_eq!(platform, Platform::Greenhouse);
    }
}
