// ImageSynthesizer capability: produces one image from a prompt + size.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::CapabilityError;

/// The size classes the capability supports at minimum; the adapter maps
/// each ad platform onto the closest of these before resizing to exact dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeClass {
    Square1024,
    Landscape1792x1024,
    Portrait1024x1792,
}

impl SizeClass {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            SizeClass::Square1024 => (1024, 1024),
            SizeClass::Landscape1792x1024 => (1792, 1024),
            SizeClass::Portrait1024x1792 => (1024, 1792),
        }
    }

    /// Picks the supported class whose aspect ratio is closest to the target.
    pub fn closest_to(target_width: u32, target_height: u32) -> SizeClass {
        let target_ratio = target_width as f64 / target_height as f64;
        [
            SizeClass::Square1024,
            SizeClass::Landscape1792x1024,
            SizeClass::Portrait1024x1792,
        ]
        .into_iter()
        .min_by(|a, b| {
            let (aw, ah) = a.dimensions();
            let (bw, bh) = b.dimensions();
            let da = (aw as f64 / ah as f64 - target_ratio).abs();
            let db = (bw as f64 / bh as f64 - target_ratio).abs();
            da.partial_cmp(&db).unwrap()
        })
        .unwrap()
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub prompt: String,
    pub size: SizeClass,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub image_bytes: Vec<u8>,
    pub revised_prompt: Option<String>,
    pub seed: Option<u64>,
}

#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResult, CapabilityError>;
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

    pub struct FakeImageSynthesizer {
        behavior: MockBehavior,
        call_count: Arc<Mutex<u32>>,
    }

    impl FakeImageSynthesizer {
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
    }

    #[async_trait]
    impl ImageSynthesizer for FakeImageSynthesizer {
        async fn synthesize(
            &self,
            request: &SynthesisRequest,
        ) -> Result<SynthesisResult, CapabilityError> {
            let mut count = self.call_count.lock();
            *count += 1;
            let attempt = *count;
            drop(count);

            let succeed = || SynthesisResult {
                image_bytes: vec![0u8; 16],
                revised_prompt: Some(request.prompt.clone()),
                seed: Some(42),
            };

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
                    Err(CapabilityError::Timeout("image synthesis call timed out".to_string()))
                }
            }
        }
    }
}
