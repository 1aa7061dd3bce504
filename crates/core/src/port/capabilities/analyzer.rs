// Analyzer capability: vision analysis of the submitted product image.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::CapabilityError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeType {
    Rectangular,
    Cylindrical,
    Spherical,
    Irregular,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceTexture {
    Glossy,
    Matte,
    Metallic,
    Rough,
    Smooth,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorPalette {
    pub primary_hex: String,
    pub secondary_hex: Vec<String>,
    pub full_palette_hex: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dimensions {
    pub width_ratio: f64,
    pub height_ratio: f64,
    pub depth_ratio: f64,
}

/// The `analysis` record (Result.analysis), produced once and consumed by
/// every downstream stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub category: String,
    pub palette: ColorPalette,
    pub shape: ShapeType,
    pub dimensions: Dimensions,
    pub texture: SurfaceTexture,
    pub confidence: f64,
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, image_bytes: &[u8]) -> Result<AnalysisRecord, CapabilityError>;
}

pub mod mocks {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Scripted behavior for `FakeAnalyzer`, following the same
    /// mock-behavior-enum shape as the other capability fakes.
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        Succeed(AnalysisRecord),
        Fail(CapabilityError),
        /// Fails with the given error on the first `n` calls, then succeeds.
        FailThenSucceed(u32, CapabilityError, AnalysisRecord),
        /// Sleeps past the given duration before returning `Timeout` — lets a
        /// caller-side `tokio::time::timeout` race ahead of it and win.
        Timeout(std::time::Duration),
    }

    pub struct FakeAnalyzer {
        behavior: MockBehavior,
        call_count: Arc<Mutex<u32>>,
    }

    impl FakeAnalyzer {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior,
                call_count: Arc::new(Mutex::new(0)),
            }
        }

        pub fn succeeding(record: AnalysisRecord) -> Self {
            Self::new(MockBehavior::Succeed(record))
        }

        pub fn failing(err: CapabilityError) -> Self {
            Self::new(MockBehavior::Fail(err))
        }

        pub fn call_count(&self) -> u32 {
            *self.call_count.lock()
        }

        pub fn default_record() -> AnalysisRecord {
            AnalysisRecord {
                category: "beverage".to_string(),
                palette: ColorPalette {
                    primary_hex: "#FF0000".to_string(),
                    secondary_hex: vec!["#CC0000".to_string()],
                    full_palette_hex: vec!["#FF0000".to_string(), "#CC0000".to_string()],
                },
                shape: ShapeType::Cylindrical,
                dimensions: Dimensions {
                    width_ratio: 1.0,
                    height_ratio: 2.0,
                    depth_ratio: 1.0,
                },
                texture: SurfaceTexture::Glossy,
                confidence: 0.9,
            }
        }
    }

    #[async_trait]
    impl Analyzer for FakeAnalyzer {
        async fn analyze(&self, _image_bytes: &[u8]) -> Result<AnalysisRecord, CapabilityError> {
            let mut count = self.call_count.lock();
            *count += 1;
            let attempt = *count;
            drop(count);

            match &self.behavior {
                MockBehavior::Succeed(record) => Ok(record.clone()),
                MockBehavior::Fail(err) => Err(err.clone()),
                MockBehavior::FailThenSucceed(n, err, record) => {
                    if attempt <= *n {
                        Err(err.clone())
                    } else {
                        Ok(record.clone())
                    }
                }
                MockBehavior::Timeout(delay) => {
                    tokio::time::sleep(*delay).await;
                    Err(CapabilityError::Timeout("analyzer call timed out".to_string()))
                }
            }
        }
    }
}
