//! 申请人档案
//!
//! 描述代为投递申请的那个人：身份信息、工作经历、教育背景、技能、
//! 以及按规范问题键预置的自由文本答案。每次运行从 TOML 文件加载一次，
//! 运行期间只读。

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 申请人档案
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Applicant {
    pub identity: Identity,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub skills: Skills,
    /// 按规范问题键预置的答案（如 work_authorization、why_company）
    #[serde(default)]
    pub answers: HashMap<String, String>,
}

/// 身份信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub linkedin: String,
    #[serde(default)]
    pub website: String,
}

/// 一段工作经历
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub title: String,
    pub company: String,
    /// 如 "2021 - Present"
    #[serde(default)]
    pub duration: String,
    /// 此段经历的持续年数（用于估算总年限）
    #[serde(default)]
    pub years: f64,
    #[serde(default)]
    pub highlights: Vec<String>,
}

/// 一段教育经历
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Education {
    pub degree: String,
    #[serde(default)]
    pub field: String,
    pub institution: String,
    #[serde(default)]
    pub year: Option<u32>,
}

impl Education {
    /// 完整学位描述，如 "M.S. in Computer Science"
    pub fn full_degree(&self) -> String {
        if self.field.is_empty() {
            self.degree.clone()
        } else {
            format!("{} in {}", self.degree, self.field)
        }
    }
}

/// 技能清单
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Skills {
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

impl Applicant {
    /// 从 TOML 文件加载档案
    ///
    /// 档案缺失或无法解析属于运行级致命错误，由调用方决定是否中止。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取申请人档案: {}", path.display()))?;
        let applicant: Applicant = toml::from_str(&content)
            .with_context(|| format!("无法解析申请人档案: {}", path.display()))?;
        Ok(applicant)
    }

    /// 当前（最近一段）工作经历
    pub fn current_job(&self) -> Option<&Experience> {
        self.experience.first()
    }

    /// 估算总工作年限
    pub fn years_of_experience(&self) -> f64 {
        self.experience.iter().map(|e| e.years).sum()
    }

    /// 最高学历（档案中列在最前面的一条）
    pub fn highest_education(&self) -> Option<&Education> {
        self.education.first()
    }

    /// 取预置答案
    pub fn get_answer(&self, question_key: &str) -> Option<&str> {
        self.answers.get(question_key).map(|s| s.as_str())
    }

    /// 前 n 项技能的逗号串
    pub fn skills_string(&self, n: usize) -> String {
        self.skills
            .languages
            .iter()
            .chain(self.skills.frameworks.iter())
            .chain(self.skills.tools.iter())
            .take(n)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[identity]
full_name = "Jane Doe"
email = "jane@example.com"
phone = "+1 555 0100"

[[experience]]
title = "Senior Engineer"
company = "Acme"
duration = "2021 - Present"
years = 3.5
highlights = ["Led billing rewrite"]

[[experience]]
title = "Engineer"
company = "Initech"
years = 2.0

[[education]]
degree = "B.S."
field = "Computer Science"
institution = "State University"
year = 2016

[skills]
languages = ["Rust", "Python"]
frameworks = ["Tokio"]

[answers]
work_authorization = "Yes"
"#;

    #[test]
    fn test_parse_profile() {
        let applicant: Applicant = toml::from_str(SAMPLE).expect("解析档案失败");
        assert_eq!(applicant.identity.full_name, "Jane Doe");
        assert_eq!(applicant.current_job().unwrap().company, "Acme");
        assert!((applicant.years_of_experience() - 5.5).abs() < f64::EPSILON);
        assert_eq!(
            applicant.highest_education().unwrap().full_degree(),
            "B.S. in Computer Science"
        );
        assert_eq!(applicant.get_answer("work_authorization"), Some("Yes"));
        assert_eq!(applicant.get_answer("missing"), None);
        assert_eq!(applicant.skills_string(2), "Rust, Python");
    }
}
