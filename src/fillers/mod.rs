//! 填表策略 - 业务能力层
//!
//! 每个受支持的平台对应一个策略，全部策略收敛在一个封闭的
//! 枚举 `PlatformFiller` 里：新增平台意味着新增一个变体和一条
//! 注册表条目，而不是运行时的开放式发现。
//!
//! 策略契约只有两个方法：
//! - `can_handle` - 在任何破坏性交互之前做快速结构检查
//! - `fill` - 多步遍历表单，返回是否到达了明确确认的终点提交
//!
//! 无法自动解决的必填字段必须在申请的问题列表上标记
//! `needs_review`，绝不靠猜。

pub mod form;
pub mod greenhouse;
pub mod lever;
pub mod linkedin;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::browser::PageHandle;
use crate::llm::LlmGateway;
use crate::models::{Applicant, Application, Platform, Posting};

pub use form::FillContext;
pub use greenhouse::GreenhouseFiller;
pub use lever::LeverFiller;
pub use linkedin::LinkedinFiller;

/// 填表策略契约
#[async_trait]
pub trait FormFiller: Send + Sync {
    /// 平台名称（用于日志）
    fn platform_name(&self) -> &'static str;

    /// 快速结构检查：页面上是否存在本策略的触发元素
    async fn can_handle(&self, page: &dyn PageHandle) -> bool;

    /// 遍历表单；返回是否到达了明确确认的提交
    async fn fill(
        &self,
        page: &dyn PageHandle,
        posting: &Posting,
        application: &mut Application,
    ) -> Result<bool>;
}

/// 封闭的策略集合，每个受支持的平台一个变体
pub enum PlatformFiller {
    Greenhouse(GreenhouseFiller),
    Lever(LeverFiller),
    LinkedinEasy(LinkedinFiller),
    #[cfg(test)]
    Scripted(scripted::ScriptedFiller),
}

impl PlatformFiller {
    fn inner(&self) -> &dyn FormFiller {
        match self {
            PlatformFiller::Greenhouse(f) => f,
            PlatformFiller::Lever(f) => f,
            PlatformFiller::LinkedinEasy(f) => f,
            #[cfg(test)]
            PlatformFiller::Scripted(f) => f,
        }
    }

    pub fn platform_name(&self) -> &'static str {
        self.inner().platform_name()
    }

    pub async fn can_handle(&self, page: &dyn PageHandle) -> bool {
        self.inner().can_handle(page).await
    }

    pub async fn fill(
        &self,
        page: &dyn PageHandle,
        posting: &Posting,
        application: &mut Application,
    ) -> Result<bool> {
        self.inner().fill(page, posting, application).await
    }
}

/// 平台 → 策略的调度表
///
/// `Unknown` 或未注册的平台没有策略，对应职位走人工审核。
pub struct FillerRegistry {
    fillers: HashMap<Platform, PlatformFiller>,
}

impl FillerRegistry {
    pub fn empty() -> Self {
        Self {
            fillers: HashMap::new(),
        }
    }

    /// 构建默认注册表（全部受支持的平台）
    pub fn standard(
        applicant: Arc<Applicant>,
        gateway: Option<Arc<LlmGateway>>,
        max_steps: usize,
    ) -> Self {
        let ctx = FillContext::new(applicant, gateway, max_steps);
        let mut registry = Self::empty();
        registry.register(
            Platform::Greenhouse,
            PlatformFiller::Greenhouse(GreenhouseFiller::new(ctx.clone())),
        );
        registry.register(
            Platform::Lever,
            PlatformFiller::Lever(LeverFiller::new(ctx.clone())),
        );
        registry.register(
            Platform::LinkedinEasy,
            PlatformFiller::LinkedinEasy(LinkedinFiller::new(ctx)),
        );
        registry
    }

    pub fn register(&mut self, platform: Platform, filler: PlatformFiller) {
        self.fillers.insert(platform, filler);
    }

    pub fn get(&self, platform: Platform) -> Option<&PlatformFiller> {
        self.fillers.get(&platform)
    }
}

#[cfg(test)]
pub mod scripted {
    //! 测试用脚本化策略：按配置返回固定结果

    use super::*;

    pub struct ScriptedFiller {
        pub handles: bool,
        pub outcome: Result<bool, String>,
    }

    impl ScriptedFiller {
        pub fn succeeding() -> Self {
            Self {
                handles: true,
                outcome: Ok(true),
            }
        }

        pub fn declining() -> Self {
            Self {
                handles: true,
                outcome: Ok(false),
            }
        }

        pub fn erroring(message: &str) -> Self {
            Self {
                handles: true,
                outcome: Err(message.to_string()),
            }
        }
    }

    #[async_trait]
    impl FormFiller for ScriptedFiller {
        fn platform_name(&self) -> &'static str {
            "scripted"
        }

        async fn can_handle(&self, _page: &dyn PageHandle) -> bool {
            self.handles
        }

        async fn fill(
            &self,
            _page: &dyn PageHandle,
            _posting: &Posting,
            _application: &mut Application,
        ) -> Result<bool> {
            match &self.outcome {
                Ok(result) => Ok(*result),
                Err(message) => anyhow::bail!("{}", message.clone()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let mut registry = FillerRegistry::empty();
        registry.register(
            Platform::Greenhouse,
            PlatformFiller::Scripted(scripted::ScriptedFiller::succeeding()),
        );
        assert!(registry.get(Platform::Greenhouse).is_some());
        assert!(registry.get(Platform::Unknown).is_none());
        assert!(registry.get(Platform::Workday).is_none());
    }
}
