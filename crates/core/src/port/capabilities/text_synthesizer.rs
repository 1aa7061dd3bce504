// TextSynthesizer capability: produces the marketing text bundle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::CapabilityError;
use crate::port::capabilities::analyzer::AnalysisRecord;

#[derive(Debug, Clone)]
pub struct TextContext {
    pub analysis: AnalysisRecord,
    pub brand_name: Option<String>,
    pub product_name: Option<String>,
    pub tone: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionBundle {
    pub long: String,
    pub short: String,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchcopyBundle {
    pub variations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeoBundle {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
}

/// The assembled `texts` record stored on the job's `Result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBundle {
    pub description: DescriptionBundle,
    pub catchcopy: CatchcopyBundle,
    pub seo: SeoBundle,
}

#[async_trait]
pub trait TextSynthesizer: Send + Sync {
    async fn describe(&self, ctx: &TextContext) -> Result<DescriptionBundle, CapabilityError>;
    async fn catchcopy(&self, ctx: &TextContext) -> Result<CatchcopyBundle, CapabilityError>;
    async fn seo(&self, ctx: &TextContext) -> Result<SeoBundle, CapabilityError>;
}

pub mod mocks {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        Succeed,
        Fail(CapabilityError),
        FailThenSucceed(u32, CapabilityError),
        Timeout(std::time::Duration),
    }

    pub struct FakeTextSynthesizer {
        behavior: MockBehavior,
        call_count: Arc<Mutex<u32>>,
    }

    impl FakeTextSynthesizer {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior,
                call_count: Arc::new(Mutex::new(0)),
            }
        }

        pub fn succeeding() -> Self {
            Self::new(MockBehavior::Succeed)
        }

        pub fn failing(err: CapabilityError) -> Self {
            Self::new(MockBehavior::Fail(err))
        }

        pub fn call_count(&self) -> u32 {
            *self.call_count.lock()
        }

        fn record_attempt(&self) -> u32 {
            let mut count = self.call_count.lock();
            *count += 1;
            *count
        }

        async fn resolve<T>(&self, attempt: u32, succeed: impl FnOnce() -> T) -> Result<T, CapabilityError> {
            match &self.behavior {
                MockBehavior::Succeed => Ok(succeed()),
                MockBehavior::Fail(err) => Err(err.clone()),
                MockBehavior::FailThenSucceed(n, err) => {
                    if attempt <= *n {
                        Err(err.clone())
                    } else {
                        Ok(succeed())
                    }
                }
                MockBehavior::Timeout(delay) => {
                    tokio::time::sleep(*delay).await;
                    Err(CapabilityError::Timeout("text synthesis call timed out".to_string()))
                }
            }
        }
    }

    #[async_trait]
    impl TextSynthesizer for FakeTextSynthesizer {
        async fn describe(&self, _ctx: &TextContext) -> Result<DescriptionBundle, CapabilityError> {
            let attempt = self.record_attempt();
            self.resolve(attempt, || DescriptionBundle {
                long: "A long description.".to_string(),
                short: "A short description.".to_string(),
                bullets: vec!["feature one".to_string(), "feature two".to_string()],
            })
            .await
        }

        async fn catchcopy(&self, _ctx: &TextContext) -> Result<CatchcopyBundle, CapabilityError> {
            let attempt = self.record_attempt();
            self.resolve(attempt, || CatchcopyBundle {
                variations: vec!["Catch this.".to_string(), "Copy that.".to_string()],
            })
            .await
        }

        async fn seo(&self, _ctx: &TextContext) -> Result<SeoBundle, CapabilityError> {
            let attempt = self.record_attempt();
            self.resolve(attempt, || SeoBundle {
                title: "SEO Title".to_string(),
                description: "SEO description.".to_string(),
                keywords: vec!["keyword1".to_string(), "keyword2".to_string()],
            })
            .await
        }
    }
}
