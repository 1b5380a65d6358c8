//! Failure paths: error categories and cleanup of everything a job wrote.

mod common;

use std::sync::Arc;

use tempfile::tempdir;

use common::{test_mixer, test_settings, write_clip, FaultMode, SimulatedEngine};
use mixdown_core::models::{ErrorKind, JobStatus, MixOptions};
use mixdown_core::orchestrator::{CancelHandle, MixRequest};
use mixdown_core::store::InputStream;

fn assert_no_leftovers(mixer: &mixdown_core::Mixer, job_id: &str) {
    assert!(
        mixer.store().job_artifacts(job_id).is_empty(),
        "leftovers: {:?}",
        mixer.store().job_artifacts(job_id)
    );
    assert!(!mixer.store().config().work_dir.join(job_id).exists());
}

#[tokio::test]
async fn unreadable_input_fails_before_any_transform() {
    let dir = tempdir().unwrap();
    let inputs = dir.path().join("in");
    let good = write_clip(&inputs, "good.wav", 5.0);
    let bad = inputs.join("notes.wav");
    std::fs::write(&bad, "this is not audio").unwrap();

    let engine = Arc::new(SimulatedEngine::new());
    let mixer = test_mixer(engine.clone(), test_settings(dir.path()));

    let outcome = mixer.mix_files(&good, &bad, MixOptions::new()).await;

    assert_eq!(outcome.summary.status, JobStatus::Failed);
    assert_eq!(outcome.summary.error_kind, Some(ErrorKind::ProbeError));
    assert_eq!(outcome.summary.failed_step.as_deref(), Some("Probe"));
    assert!(engine.calls().iter().all(|c| c.starts_with("probe:")));
    assert_no_leftovers(&mixer, &outcome.summary.job_id);
}

#[tokio::test]
async fn probe_timeout_is_reported_as_timeout() {
    let dir = tempdir().unwrap();
    let inputs = dir.path().join("in");
    let a = write_clip(&inputs, "a.wav", 5.0);
    let b = write_clip(&inputs, "b.wav", 2.0);

    let engine = Arc::new(SimulatedEngine::new().with_fault("probe", FaultMode::Timeout));
    let mixer = test_mixer(engine, test_settings(dir.path()));

    let outcome = mixer.mix_files(&a, &b, MixOptions::new()).await;

    assert_eq!(outcome.summary.error_kind, Some(ErrorKind::Timeout));
    assert_eq!(outcome.summary.failed_step.as_deref(), Some("Probe"));
}

#[tokio::test]
async fn mix_timeout_removes_the_partial_output() {
    let dir = tempdir().unwrap();
    let inputs = dir.path().join("in");
    let a = write_clip(&inputs, "a.wav", 10.0);
    let b = write_clip(&inputs, "b.wav", 3.0);

    let engine = Arc::new(SimulatedEngine::new().with_fault("mix", FaultMode::Timeout));
    let mixer = test_mixer(engine.clone(), test_settings(dir.path()));

    let outcome = mixer.mix_files(&a, &b, MixOptions::new()).await;

    assert_eq!(outcome.summary.error_kind, Some(ErrorKind::Timeout));
    assert_eq!(outcome.summary.failed_step.as_deref(), Some("Mix"));
    assert!(outcome.result.is_none());
    assert_eq!(engine.count("mix"), 1);
    assert_no_leftovers(&mixer, &outcome.summary.job_id);
}

#[tokio::test]
async fn failed_trim_is_encode_error_and_cleans_up() {
    let dir = tempdir().unwrap();
    let inputs = dir.path().join("in");
    let a = write_clip(&inputs, "a.wav", 10.0);
    let b = write_clip(&inputs, "b.wav", 3.0);

    let engine = Arc::new(SimulatedEngine::new().with_fault("trim", FaultMode::Fail));
    let mixer = test_mixer(engine.clone(), test_settings(dir.path()));

    let outcome = mixer.mix_files(&a, &b, MixOptions::new()).await;

    assert_eq!(outcome.summary.error_kind, Some(ErrorKind::EncodeError));
    assert_eq!(outcome.summary.failed_step.as_deref(), Some("LoopToLength"));
    assert_eq!(engine.count("mix"), 0);
    assert_no_leftovers(&mixer, &outcome.summary.job_id);

    // Engine diagnostics stay out of the caller-facing message
    let message = outcome.summary.error_message.unwrap_or_default();
    assert!(!message.contains("simulated trim failure"), "{}", message);
}

#[tokio::test]
async fn loop_outside_tolerance_is_encode_error() {
    for drift in [0.1, -0.1] {
        let dir = tempdir().unwrap();
        let inputs = dir.path().join("in");
        let a = write_clip(&inputs, "a.wav", 10.0);
        let b = write_clip(&inputs, "b.wav", 3.0);

        let engine = Arc::new(SimulatedEngine::new().with_trim_drift(drift));
        let mixer = test_mixer(engine.clone(), test_settings(dir.path()));

        let outcome = mixer.mix_files(&a, &b, MixOptions::new()).await;

        assert_eq!(outcome.summary.error_kind, Some(ErrorKind::EncodeError), "drift {}", drift);
        assert_eq!(outcome.summary.failed_step.as_deref(), Some("LoopToLength"));
        assert!(outcome.result.is_none());
        assert_eq!(engine.count("mix"), 0);
        assert_no_leftovers(&mixer, &outcome.summary.job_id);
    }
}

#[tokio::test]
async fn loop_cap_is_resource_exhausted() {
    let dir = tempdir().unwrap();
    let inputs = dir.path().join("in");
    let a = write_clip(&inputs, "a.wav", 10.0);
    let b = write_clip(&inputs, "b.wav", 3.0);

    let mut settings = test_settings(dir.path());
    settings.mix.max_loop_repeat_count = 3;
    let engine = Arc::new(SimulatedEngine::new());
    let mixer = test_mixer(engine.clone(), settings);

    let outcome = mixer.mix_files(&a, &b, MixOptions::new()).await;

    assert_eq!(outcome.summary.error_kind, Some(ErrorKind::ResourceExhausted));
    assert_eq!(outcome.summary.failed_step.as_deref(), Some("LoopToLength"));
    assert!(outcome
        .summary
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("loop factor too large"));
    assert_eq!(engine.count("concat"), 0);
    assert_no_leftovers(&mixer, &outcome.summary.job_id);
}

#[tokio::test]
async fn oversized_output_is_resource_exhausted() {
    let dir = tempdir().unwrap();
    let inputs = dir.path().join("in");
    let a = write_clip(&inputs, "a.wav", 4.0);
    let b = write_clip(&inputs, "b.wav", 4.0);

    let mut settings = test_settings(dir.path());
    settings.mix.max_output_bytes = 64;
    let engine = Arc::new(SimulatedEngine::new().with_output_padding(1024));
    let mixer = test_mixer(engine, settings);

    let outcome = mixer.mix_files(&a, &b, MixOptions::new()).await;

    assert_eq!(outcome.summary.error_kind, Some(ErrorKind::ResourceExhausted));
    assert_eq!(outcome.summary.failed_step.as_deref(), Some("Mix"));
    assert_no_leftovers(&mixer, &outcome.summary.job_id);
}

#[tokio::test]
async fn missing_input_is_invalid_input() {
    let dir = tempdir().unwrap();
    let inputs = dir.path().join("in");
    let a = write_clip(&inputs, "a.wav", 4.0);

    let engine = Arc::new(SimulatedEngine::new());
    let mixer = test_mixer(engine.clone(), test_settings(dir.path()));

    let outcome = mixer
        .mix_files(&a, inputs.join("missing.wav"), MixOptions::new())
        .await;

    assert_eq!(outcome.summary.error_kind, Some(ErrorKind::InvalidInput));
    assert!(engine.calls().is_empty());
    assert_no_leftovers(&mixer, &outcome.summary.job_id);
}

#[tokio::test]
async fn rejected_upload_leaves_nothing_behind() {
    let dir = tempdir().unwrap();
    let engine = Arc::new(SimulatedEngine::new());
    let mixer = test_mixer(engine.clone(), test_settings(dir.path()));

    let uploads = vec![
        InputStream::from_bytes("voice.wav", common::clip_body(6.0).into_bytes()),
        InputStream::from_bytes("notes.txt", b"hello".to_vec()).with_content_type("text/plain"),
    ];
    let outcome = mixer.mix_uploads(uploads, MixOptions::new()).await;

    assert_eq!(outcome.summary.error_kind, Some(ErrorKind::InvalidInput));
    assert!(engine.calls().is_empty());
    assert_no_leftovers(&mixer, &outcome.summary.job_id);
}

#[tokio::test]
async fn empty_upload_is_invalid_input() {
    let dir = tempdir().unwrap();
    let mixer = test_mixer(Arc::new(SimulatedEngine::new()), test_settings(dir.path()));

    let uploads = vec![
        InputStream::from_bytes("voice.wav", common::clip_body(6.0).into_bytes()),
        InputStream::from_bytes("music.wav", Vec::new()),
    ];
    let outcome = mixer.mix_uploads(uploads, MixOptions::new()).await;

    assert_eq!(outcome.summary.error_kind, Some(ErrorKind::InvalidInput));
    assert_no_leftovers(&mixer, &outcome.summary.job_id);
}

#[tokio::test]
async fn cancelled_job_stops_at_the_next_step() {
    let dir = tempdir().unwrap();
    let inputs = dir.path().join("in");
    let a = write_clip(&inputs, "a.wav", 10.0);
    let b = write_clip(&inputs, "b.wav", 3.0);

    let engine = Arc::new(SimulatedEngine::new());
    let mixer = test_mixer(engine.clone(), test_settings(dir.path()));

    let cancel = CancelHandle::new();
    let trigger = cancel.clone();
    let request = MixRequest::files(&a, &b, MixOptions::new())
        .with_cancel_handle(cancel)
        .with_progress_callback(Box::new(move |step, _pct, _msg| {
            if step == "Probe" {
                trigger.cancel();
            }
        }));
    let outcome = mixer.run(request).await;

    assert_eq!(outcome.summary.error_kind, Some(ErrorKind::InvalidInput));
    assert_eq!(
        outcome.summary.error_message.as_deref(),
        Some("job was cancelled")
    );
    assert_eq!(engine.count("probe"), 2);
    assert_eq!(engine.count("gain"), 0);
    assert_no_leftovers(&mixer, &outcome.summary.job_id);
}
