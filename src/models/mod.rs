//! 领域模型
//!
//! - `posting` - 职位（抓取与去重的基本单位）
//! - `applicant` - 申请人档案（每次运行加载一次，运行期间只读）
//! - `application` - 单次申请尝试（生命周期状态机）

pub mod applicant;
pub mod application;
pub mod posting;

pub use applicant::Applicant;
pub use application::{AnswerSource, Application, ApplicationQuestion, ApplicationStatus};
pub use posting::{Platform, Posting, PostingStatus};
