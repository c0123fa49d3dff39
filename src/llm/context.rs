//! 提示词上下文构建
//!
//! 把申请人档案和目标职位压缩成有长度上限的上下文片段，
//! 供生成网关的提示词使用。

use crate::models::{Applicant, Posting};

/// 上下文构建器
pub struct ContextBuilder<'a> {
    applicant: &'a Applicant,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(applicant: &'a Applicant) -> Self {
        Self { applicant }
    }

    /// 申请人概要（姓名、现职、年限、学历、技能）
    pub fn applicant_summary(&self, max_chars: usize) -> String {
        let mut parts = Vec::new();

        if !self.applicant.identity.full_name.is_empty() {
            parts.push(format!("Name: {}", self.applicant.identity.full_name));
        }
        if let Some(current) = self.applicant.current_job() {
            parts.push(format!("Current: {} at {}", current.title, current.company));
        }
        let years = self.applicant.years_of_experience();
        if years > 0.0 {
            parts.push(format!("Experience: ~{:.0} years", years));
        }
        if let Some(edu) = self.applicant.highest_education() {
            parts.push(format!(
                "Education: {} from {}",
                edu.full_degree(),
                edu.institution
            ));
        }
        let skills = self.applicant.skills_string(8);
        if !skills.is_empty() {
            parts.push(format!("Skills: {}", skills));
        }

        truncate_chars(&parts.join("\n"), max_chars)
    }

    /// 目标职位上下文
    pub fn job_context(&self, posting: &Posting) -> String {
        let mut parts = vec![
            format!("Position: {}", posting.title),
            format!("Company: {}", posting.company),
        ];
        if !posting.location.is_empty() {
            parts.push(format!("Location: {}", posting.location));
        }
        if let Some(description) = &posting.description {
            parts.push(format!("About: {}", truncate_chars(description, 300)));
        }
        parts.join("\n")
    }

    /// 申请人 + 目标职位的完整上下文
    pub fn full_context(&self, posting: Option<&Posting>, max_chars: usize) -> String {
        let mut parts = vec![
            "=== Applicant ===".to_string(),
            self.applicant_summary(400),
        ];
        if let Some(posting) = posting {
            parts.push("=== Target Position ===".to_string());
            parts.push(self.job_context(posting));
        }
        truncate_chars(&parts.join("\n"), max_chars)
    }
}

/// 按字符数截断（不在字符中间截断）
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        text.chars().take(max_chars).collect()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::applicant::{Applicant, Education, Experience, Identity, Skills};
    use std::collections::HashMap;

    fn sample_applicant() -> Applicant {
        Applicant {
            identity: Identity {
                full_name: "Jane Doe".to_string(),
                email: "jane@example.com".to_string(),
                phone: String::new(),
                location: String::new(),
                linkedin: String::new(),
                website: String::new(),
            },
            experience: vec![Experience {
                title: "Senior Engineer".to_string(),
                company: "Acme".to_string(),
                duration: "2021 - Present".to_string(),
                years: 4.0,
                highlights: vec![],
            }],
            education: vec![Education {
                degree: "B.S.".to_string(),
                field: "CS".to_string(),
                institution: "State".to_string(),
                year: Some(2016),
            }],
            skills: Skills {
                languages: vec!["Rust".to_string()],
                frameworks: vec![],
                tools: vec![],
            },
            answers: HashMap::new(),
        }
    }

    #[test]
    fn test_summary_contains_key_facts() {
        let applicant = sample_applicant();
        let summary = ContextBuilder::new(&applicant).applicant_summary(500);
        assert!(summary.contains("Jane Doe"));
        assert!(summary.contains("Senior Engineer at Acme"));
        assert!(summary.contains("B.S. in CS"));
        assert!(summary.contains("Rust"));
    }

    #[test]
    fn test_char_cap_is_respected() {
        let applicant = sample_applicant();
        let summary = ContextBuilder::new(&applicant).applicant_summary(20);
        assert!(summary.chars().count() <= 20);
    }

    #[test]
    fn test_full_context_includes_posting() {
        let applicant = sample_applicant();
        let posting = Posting::new(None, "Engineer", "Initech", "https://x.com/job/1", "test");
        let context = ContextBuilder::new(&applicant).full_context(Some(&posting), 1000);
        assert!(context.contains("=== Target Position ==="));
        assert!(context.contains("Initech"));
    }
}
