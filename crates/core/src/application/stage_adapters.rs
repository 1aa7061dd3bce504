//! Stage Adapters: thin shims between the Pipeline Executor and the
//! three capability ports. Each adapter formulates the capability request,
//! applies the timeout + retry + pacing policy, and normalizes
//! `CapabilityError` into `DomainError` before the executor sees it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{DomainError, SubmitOptions};
use crate::port::capabilities::analyzer::{AnalysisRecord, Analyzer};
use crate::port::capabilities::image_synthesizer::{ImageSynthesizer, SizeClass, SynthesisRequest};
use crate::port::capabilities::text_synthesizer::{TextBundle, TextContext, TextSynthesizer};
use crate::port::CapabilityError;

use super::retry::{with_retries, RetryPolicy};

/// Races one capability attempt against a per-call deadline, mapping an
/// elapsed timeout onto the same `CapabilityError::Timeout` a capability
/// would raise on its own (so the retry classifier treats both identically).
async fn call_with_timeout<T, F>(timeout: Duration, call: F) -> Result<T, CapabilityError>
where
    F: std::future::Future<Output = Result<T, CapabilityError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(CapabilityError::Timeout("deadline exceeded".to_string())),
    }
}

pub struct AnalysisAdapter {
    analyzer: Arc<dyn Analyzer>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl AnalysisAdapter {
    pub fn new(analyzer: Arc<dyn Analyzer>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            analyzer,
            retry,
            timeout,
        }
    }

    pub async fn run(&self, image_bytes: &[u8]) -> Result<AnalysisRecord, DomainError> {
        with_retries(&self.retry, || {
            call_with_timeout(self.timeout, self.analyzer.analyze(image_bytes))
        })
        .await
        .map_err(CapabilityError::into_domain)
    }
}

const VARIATION_STYLES: [&str; 3] = ["minimalist", "vibrant", "premium"];

fn package_prompt(analysis: &AnalysisRecord, style: &str, options: &SubmitOptions) -> String {
    let name = options.product_name.as_deref().unwrap_or("the product");
    format!(
        "A {style} packaging design for {name}, a {category} item with a {shape:?} shape and a {primary} primary color.",
        style = style,
        name = name,
        category = analysis.category,
        shape = analysis.shape,
        primary = analysis.palette.primary_hex,
    )
}

pub struct PackageAdapter {
    synthesizer: Arc<dyn ImageSynthesizer>,
    retry: RetryPolicy,
    timeout: Duration,
    intra_branch_concurrency: usize,
}

impl PackageAdapter {
    pub fn new(
        synthesizer: Arc<dyn ImageSynthesizer>,
        retry: RetryPolicy,
        timeout: Duration,
        intra_branch_concurrency: usize,
    ) -> Self {
        Self {
            synthesizer,
            retry,
            timeout,
            intra_branch_concurrency,
        }
    }

    /// Generates `options.package_variations` packages, one per auto-selected
    /// style (cycling through `VARIATION_STYLES` without duplicates within
    /// the first 3, repeating after). Output order matches variation index.
    pub async fn run(
        &self,
        analysis: &AnalysisRecord,
        options: &SubmitOptions,
    ) -> Vec<Result<serde_json::Value, DomainError>> {
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.intra_branch_concurrency));
        let mut handles = Vec::with_capacity(options.package_variations as usize);
        for i in 0..options.package_variations {
            let style = VARIATION_STYLES[i as usize % VARIATION_STYLES.len()];
            let prompt = package_prompt(analysis, style, options);
            let synthesizer = self.synthesizer.clone();
            let retry = self.retry;
            let timeout = self.timeout;
            let semaphore = semaphore.clone();
            let style_owned = style.to_string();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                let request = SynthesisRequest {
                    prompt,
                    size: SizeClass::Square1024,
                };
                let result = with_retries(&retry, || {
                    call_with_timeout(timeout, synthesizer.synthesize(&request))
                })
                .await
                .map_err(CapabilityError::into_domain)
                .map(|synthesis| {
                    serde_json::json!({
                        "style": style_owned,
                        "revisedPrompt": synthesis.revised_prompt,
                        "seed": synthesis.seed,
                        "imageBytesLen": synthesis.image_bytes.len(),
                    })
                });
                if i > 0 {
                    tokio::time::sleep(Duration::from_millis(1000)).await;
                }
                result
            }));
        }
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.unwrap_or_else(|_| {
                Err(DomainError::Unknown("package generation task panicked".to_string()))
            }));
        }
        results
    }
}

/// Platform -> canonical target dimensions. The adapter maps each onto the closest supported
/// `SizeClass` before handing the request to the capability.
fn platform_dimensions(platform: &str) -> (u32, u32) {
    match platform {
        "instagram-square" => (1080, 1080),
        "twitter-card" => (1200, 675),
        "facebook-feed" => (1200, 630),
        "web-banner-medium-rectangle" => (300, 250),
        _ => (1024, 1024),
    }
}

pub struct AdAdapter {
    synthesizer: Arc<dyn ImageSynthesizer>,
    retry: RetryPolicy,
    timeout: Duration,
    intra_branch_concurrency: usize,
}

impl AdAdapter {
    pub fn new(
        synthesizer: Arc<dyn ImageSynthesizer>,
        retry: RetryPolicy,
        timeout: Duration,
        intra_branch_concurrency: usize,
    ) -> Self {
        Self {
            synthesizer,
            retry,
            timeout,
            intra_branch_concurrency,
        }
    }

    pub async fn run(
        &self,
        analysis: &AnalysisRecord,
        options: &SubmitOptions,
    ) -> HashMap<String, Result<serde_json::Value, DomainError>> {
        let platforms = if options.ad_platforms.is_empty() {
            crate::domain::DEFAULT_AD_PLATFORMS
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            options.ad_platforms.clone()
        };
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.intra_branch_concurrency));
        let mut handles = Vec::with_capacity(platforms.len());
        for (i, platform) in platforms.into_iter().enumerate() {
            let (width, height) = platform_dimensions(&platform);
            let prompt = format!(
                "An advertisement image for a {category} product, sized for {platform}.",
                category = analysis.category,
                platform = platform
            );
            let synthesizer = self.synthesizer.clone();
            let retry = self.retry;
            let timeout = self.timeout;
            let semaphore = semaphore.clone();
            let platform_owned = platform.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                let request = SynthesisRequest {
                    prompt,
                    size: SizeClass::closest_to(width, height),
                };
                let result = with_retries(&retry, || {
                    call_with_timeout(timeout, synthesizer.synthesize(&request))
                })
                .await
                .map_err(CapabilityError::into_domain)
                .map(|synthesis| {
                    serde_json::json!({
                        "platform": platform_owned,
                        "width": width,
                        "height": height,
                        "revisedPrompt": synthesis.revised_prompt,
                        "seed": synthesis.seed,
                        "imageBytesLen": synthesis.image_bytes.len(),
                    })
                });
                if i > 0 {
                    tokio::time::sleep(Duration::from_millis(1000)).await;
                }
                (platform_owned, result)
            }));
        }
        let mut results = HashMap::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok((platform, result)) => {
                    results.insert(platform, result);
                }
                Err(_) => {
                    // The join set lost the platform name with the panic; nothing
                    // to key the map entry on, so the platform is simply absent
                    // from the result.
                }
            }
        }
        results
    }
}

pub struct TextAdapter {
    synthesizer: Arc<dyn TextSynthesizer>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl TextAdapter {
    pub fn new(synthesizer: Arc<dyn TextSynthesizer>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            synthesizer,
            retry,
            timeout,
        }
    }

    pub async fn run(&self, ctx: &TextContext) -> Result<serde_json::Value, DomainError> {
        let describe = with_retries(&self.retry, || {
            call_with_timeout(self.timeout, self.synthesizer.describe(ctx))
        });
        let catchcopy = with_retries(&self.retry, || {
            call_with_timeout(self.timeout, self.synthesizer.catchcopy(ctx))
        });
        let seo = with_retries(&self.retry, || {
            call_with_timeout(self.timeout, self.synthesizer.seo(ctx))
        });
        let (description, catchcopy, seo) = tokio::join!(describe, catchcopy, seo);
        let description = description.map_err(CapabilityError::into_domain)?;
        let catchcopy = catchcopy.map_err(CapabilityError::into_domain)?;
        let seo = seo.map_err(CapabilityError::into_domain)?;
        let bundle = TextBundle {
            description,
            catchcopy,
            seo,
        };
        serde_json::to_value(bundle)
            .map_err(|e| DomainError::Unknown(format!("text bundle serialization failed: {e}")))
    }
}
