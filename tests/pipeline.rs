//! End-to-end runs of the fuzzing pipeline with in-process engines

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use common::{
    reached, DivergingEngine, EchoEngine, FailingGenerator, GatedEngine, NamedTestGenerator,
    TestLayout,
};
use diffuzz_core::pipeline::CounterFile;
use diffuzz_core::{ComparisonTopology, Engine, Pipeline, RunOutcome};

const RUN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interrupt_with_agreeing_engines_removes_every_artifact() {
    let layout = TestLayout::new();
    let reference = EchoEngine::new("alpha");
    let runs = reference.runs();
    let engines: Vec<Arc<dyn Engine>> = vec![Arc::new(reference), Arc::new(EchoEngine::new("beta"))];

    let pipeline = Pipeline::new(layout.config(4), NamedTestGenerator, engines).unwrap();
    let summary = tokio::time::timeout(RUN_TIMEOUT, pipeline.run(reached(runs, 20)))
        .await
        .expect("run did not stop after interrupt")
        .unwrap();

    assert!(matches!(summary.outcome, RunOutcome::Interrupted));
    assert!(summary.executed >= 20);
    assert!(summary.deleted >= 20);
    assert!(layout.artifacts().is_empty(), "left behind: {:?}", layout.artifacts());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_divergence_preserves_the_diverging_artifact() {
    let layout = TestLayout::new();
    let engines: Vec<Arc<dyn Engine>> = vec![
        Arc::new(EchoEngine::new("alpha")),
        Arc::new(DivergingEngine::new("beta", "00000007-")),
    ];

    // One generator worker, so test 7 is the eighth test it produces.
    let pipeline = Pipeline::new(layout.config(2), NamedTestGenerator, engines).unwrap();
    let summary = tokio::time::timeout(RUN_TIMEOUT, pipeline.run(std::future::pending()))
        .await
        .expect("run did not stop on divergence")
        .unwrap();

    let divergence = summary
        .outcome
        .divergence()
        .expect("expected a divergence")
        .clone();
    assert_eq!(divergence.left_engine, "alpha");
    assert_eq!(divergence.right_engine, "beta");
    assert_eq!(
        divergence.artifact.file_name().unwrap().to_str().unwrap(),
        "00000007-test-0.json"
    );
    assert!(divergence.artifact.exists());
    assert_eq!(summary.executed, 8);

    let artifacts = layout.artifacts();
    assert_eq!(artifacts, vec![divergence.artifact.clone()]);

    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&divergence.artifact).unwrap()).unwrap();
    assert_eq!(stored["name"], "00000007-test-0");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_missing_counter_file_starts_from_zero() {
    let layout = TestLayout::new();
    assert!(!layout.counter_file.exists());

    let engines: Vec<Arc<dyn Engine>> =
        vec![Arc::new(EchoEngine::new("alpha")), Arc::new(EchoEngine::new("beta"))];
    let mut config = layout.config(2);
    config.max_tests = Some(12);

    let pipeline = Pipeline::new(config, NamedTestGenerator, engines).unwrap();
    let summary = tokio::time::timeout(RUN_TIMEOUT, pipeline.run(std::future::pending()))
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(summary.outcome, RunOutcome::Completed));
    assert_eq!(CounterFile::new(&layout.counter_file).read().await, 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_counter_file_accumulates_across_runs() {
    let layout = TestLayout::new();
    std::fs::write(&layout.counter_file, "100").unwrap();

    let engines: Vec<Arc<dyn Engine>> =
        vec![Arc::new(EchoEngine::new("alpha")), Arc::new(EchoEngine::new("beta"))];
    let mut config = layout.config(2);
    config.max_tests = Some(5);

    let pipeline = Pipeline::new(config, NamedTestGenerator, engines).unwrap();
    tokio::time::timeout(RUN_TIMEOUT, pipeline.run(std::future::pending()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(CounterFile::new(&layout.counter_file).read().await, 105);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_engines_bound_artifacts_on_disk() {
    let layout = TestLayout::new();
    let gate = Arc::new(AtomicBool::new(false));
    let engines: Vec<Arc<dyn Engine>> = vec![
        Arc::new(GatedEngine::new("alpha", gate.clone())),
        Arc::new(EchoEngine::new("beta")),
    ];

    let config = layout.config(2);
    let capacity = config.queue_capacity;
    let pipeline = Pipeline::new(config, NamedTestGenerator, engines).unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let run = tokio::spawn(pipeline.run(async move {
        let _ = stopped.await;
    }));

    tokio::time::sleep(Duration::from_millis(300)).await;
    // queued + one being executed + one waiting to be enqueued
    let on_disk = layout.artifacts().len();
    assert!(on_disk > 0);
    assert!(on_disk <= capacity + 2, "{} artifacts on disk", on_disk);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(layout.artifacts().len(), on_disk, "generation did not block");

    stop.send(()).unwrap();
    gate.store(true, Ordering::SeqCst);

    let summary = tokio::time::timeout(RUN_TIMEOUT, run)
        .await
        .expect("blocked generator was never released")
        .unwrap()
        .unwrap();
    assert!(matches!(summary.outcome, RunOutcome::Interrupted));
    assert!(layout.artifacts().is_empty(), "left behind: {:?}", layout.artifacts());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_budget_completes_with_exact_count() {
    let layout = TestLayout::new();
    let engines: Vec<Arc<dyn Engine>> = vec![
        Arc::new(EchoEngine::new("alpha")),
        Arc::new(EchoEngine::new("beta")),
        Arc::new(EchoEngine::new("gamma")),
    ];
    let mut config = layout.config(6);
    config.max_tests = Some(25);
    config.topology = ComparisonTopology::AllPairs;

    let pipeline = Pipeline::new(config, NamedTestGenerator, engines).unwrap();
    let summary = tokio::time::timeout(RUN_TIMEOUT, pipeline.run(std::future::pending()))
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(summary.outcome, RunOutcome::Completed));
    assert_eq!(summary.executed, 25);
    assert_eq!(summary.deleted, 25);
    assert_eq!(summary.abandoned, 0);
    assert!(layout.artifacts().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_zero_budget_completes_immediately() {
    let layout = TestLayout::new();
    let engines: Vec<Arc<dyn Engine>> =
        vec![Arc::new(EchoEngine::new("alpha")), Arc::new(EchoEngine::new("beta"))];
    let mut config = layout.config(2);
    config.max_tests = Some(0);

    let pipeline = Pipeline::new(config, NamedTestGenerator, engines).unwrap();
    let summary = tokio::time::timeout(RUN_TIMEOUT, pipeline.run(std::future::pending()))
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(summary.outcome, RunOutcome::Completed));
    assert_eq!(summary.executed, 0);
    assert!(layout.artifacts().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_test_diverging_stops_cleanly() {
    let layout = TestLayout::new();
    let engines: Vec<Arc<dyn Engine>> = vec![
        Arc::new(EchoEngine::new("alpha")),
        Arc::new(DivergingEngine::new("beta", "")),
    ];
    let mut config = layout.config(8);
    config.queue_capacity = 2;

    let pipeline = Pipeline::new(config, NamedTestGenerator, engines).unwrap();
    let summary = tokio::time::timeout(RUN_TIMEOUT, pipeline.run(std::future::pending()))
        .await
        .expect("run deadlocked with concurrent divergences")
        .unwrap();

    let divergence = summary.outcome.divergence().expect("expected a divergence");
    assert!(divergence.artifact.exists());
    assert!(layout.artifacts().contains(&divergence.artifact));
    assert!(summary.executed >= 1);
    assert!(summary.executed <= 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failing_generators_do_not_end_as_a_clean_run() {
    let layout = TestLayout::new();
    let engines: Vec<Arc<dyn Engine>> =
        vec![Arc::new(EchoEngine::new("alpha")), Arc::new(EchoEngine::new("beta"))];

    let pipeline = Pipeline::new(layout.config(4), FailingGenerator::new(0), engines).unwrap();
    let summary = tokio::time::timeout(RUN_TIMEOUT, pipeline.run(std::future::pending()))
        .await
        .expect("run did not stop after every generator failed")
        .unwrap();

    assert!(matches!(summary.outcome, RunOutcome::Exhausted));
    assert!(!summary.outcome.is_clean());
    assert_eq!(summary.executed, 0);
    assert!(layout.artifacts().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_generator_failure_before_budget_is_used_up_is_not_completed() {
    let layout = TestLayout::new();
    let engines: Vec<Arc<dyn Engine>> =
        vec![Arc::new(EchoEngine::new("alpha")), Arc::new(EchoEngine::new("beta"))];
    let mut config = layout.config(2);
    config.max_tests = Some(20);

    let pipeline = Pipeline::new(config, FailingGenerator::new(5), engines).unwrap();
    let summary = tokio::time::timeout(RUN_TIMEOUT, pipeline.run(std::future::pending()))
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(summary.outcome, RunOutcome::Exhausted));
    assert_eq!(summary.executed, 5);
    assert!(layout.artifacts().is_empty());
}

#[tokio::test]
async fn test_single_engine_is_rejected() {
    let layout = TestLayout::new();
    let engines: Vec<Arc<dyn Engine>> = vec![Arc::new(EchoEngine::new("alpha"))];
    assert!(Pipeline::new(layout.config(2), NamedTestGenerator, engines).is_err());
}
