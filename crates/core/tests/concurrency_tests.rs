// Cross-module concurrency tests: scheduler admission under concurrent
// submits, per-job subscriber total ordering under concurrent mutation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use genorch_core::application::{JobStore, Orchestrator, OrchestratorConfig};
use genorch_core::domain::{Stage, SubmitOptions};
use genorch_core::port::capabilities::analyzer::mocks::FakeAnalyzer;
use genorch_core::port::capabilities::image_synthesizer::mocks::FakeImageSynthesizer;
use genorch_core::port::capabilities::text_synthesizer::mocks::FakeTextSynthesizer;
use genorch_core::port::id_provider::mocks::SequentialIdProvider;
use genorch_core::port::time_provider::mocks::FixedTimeProvider;
use parking_lot::Mutex;

fn jpeg_bytes() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.extend(std::iter::repeat(0u8).take(64));
    bytes
}

fn sample_analysis_record() -> genorch_core::port::capabilities::analyzer::AnalysisRecord {
    use genorch_core::port::capabilities::analyzer::{ColorPalette, Dimensions, ShapeType, SurfaceTexture};
    genorch_core::port::capabilities::analyzer::AnalysisRecord {
        category: "beverage".to_string(),
        palette: ColorPalette {
            primary_hex: "#FF0000".to_string(),
            secondary_hex: vec![],
            full_palette_hex: vec!["#FF0000".to_string()],
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

/// With `maxConcurrentJobs=2`, three concurrent submits admit exactly two;
/// the third is rejected before a job record exists.
#[tokio::test]
async fn capacity_cap_holds_under_concurrent_submits() {
    let config = OrchestratorConfig {
        max_concurrent_jobs: 2,
        cleanup_interval_seconds: 0,
        ..OrchestratorConfig::default()
    };
    let analyzer = Arc::new(FakeAnalyzer::succeeding(sample_analysis_record()));
    let image_synthesizer = Arc::new(FakeImageSynthesizer::succeeding());
    let text_synthesizer = Arc::new(FakeTextSynthesizer::succeeding());
    let time = Arc::new(FixedTimeProvider::stepping_by(0, 1));
    let ids = Arc::new(SequentialIdProvider::new("cap"));

    let orchestrator = Orchestrator::new(
        config,
        analyzer,
        image_synthesizer,
        text_synthesizer,
        time,
        ids,
    );

    let mut outcomes = Vec::new();
    for _ in 0..3 {
        outcomes.push(orchestrator.submit(jpeg_bytes(), SubmitOptions::default()));
    }

    let admitted = outcomes.iter().filter(|o| o.is_ok()).count();
    let rejected = outcomes.iter().filter(|o| o.is_err()).count();
    assert_eq!(admitted, 2);
    assert_eq!(rejected, 1);
    assert_eq!(orchestrator.list_jobs().len(), 2);
}

/// Every subscriber on a job observes the exact same sequence of event
/// kinds, even when stage updates race in from several tasks at once.
#[tokio::test]
async fn subscribers_observe_identical_total_order_under_concurrent_mutation() {
    let time = Arc::new(FixedTimeProvider::stepping_by(0, 10));
    let ids = Arc::new(SequentialIdProvider::new("ord"));
    let store = Arc::new(JobStore::new(time, ids));

    let job = store.create(SubmitOptions::default());
    store.start(&job.id).unwrap();

    let seen_a: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_b: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let seen_a_cb = seen_a.clone();
    let sub_a = store
        .subscribe(
            &job.id,
            Arc::new(move |event| seen_a_cb.lock().push(format!("{:?}", event.kind))),
        )
        .unwrap();

    let seen_b_cb = seen_b.clone();
    let sub_b = store
        .subscribe(
            &job.id,
            Arc::new(move |event| seen_b_cb.lock().push(format!("{:?}", event.kind))),
        )
        .unwrap();

    let handles: Vec<_> = [Stage::Packages, Stage::Ads, Stage::Texts]
        .into_iter()
        .map(|stage| {
            let store = store.clone();
            let id = job.id.clone();
            tokio::spawn(async move {
                store.start_stage(&id, stage).unwrap();
                store.finish_stage_success(&id, stage, |_| {}).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.await.unwrap();
    }
    store.complete(&job.id).unwrap();

    // Give the per-subscriber drain tasks a moment to empty their queues.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    sub_a.unsubscribe().await;
    sub_b.unsubscribe().await;

    let trace_a = seen_a.lock().clone();
    let trace_b = seen_b.lock().clone();
    assert_eq!(trace_a, trace_b);
    assert_eq!(trace_a.last().map(String::as_str), Some("Complete"));
}

/// Every admitted permit is eventually released, even under heavy concurrent
/// churn — no slot leaks across a burst of interleaved submits and terminations.
#[tokio::test]
async fn permits_never_leak_under_bursty_concurrent_submits() {
    let config = OrchestratorConfig {
        max_concurrent_jobs: 4,
        cleanup_interval_seconds: 0,
        ..OrchestratorConfig::default()
    };
    let analyzer = Arc::new(FakeAnalyzer::succeeding(sample_analysis_record()));
    let image_synthesizer = Arc::new(FakeImageSynthesizer::succeeding());
    let text_synthesizer = Arc::new(FakeTextSynthesizer::succeeding());
    let time = Arc::new(FixedTimeProvider::stepping_by(0, 1));
    let ids = Arc::new(SequentialIdProvider::new("burst"));

    let orchestrator = Orchestrator::new(
        config,
        analyzer,
        image_synthesizer,
        text_synthesizer,
        time,
        ids,
    );

    let succeeded = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        match orchestrator.submit(jpeg_bytes(), SubmitOptions::default()) {
            Ok(outcome) => {
                succeeded.fetch_add(1, Ordering::SeqCst);
                let _ = orchestrator
                    .wait_for_completion(&outcome.job_id, std::time::Duration::from_secs(5))
                    .await;
            }
            Err(_) => {}
        }
    }

    assert!(succeeded.load(Ordering::SeqCst) >= 4);
    // The permit-releasing cleanup runs a beat after the terminal event that
    // wait_for_completion resolves on; give it room to land.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let status = orchestrator.system_status();
    assert_eq!(status.active_count, 0);
}
