/*!
 * End-to-end pipeline tests over a scripted gateway: batch translation
 * with checkpointing, retries, the multi-phase flow, the correction
 * sweep and final composition.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lingosub::checkpoint::{CheckpointStore, TranslationRecord};
use lingosub::composer::{self, ComposeOptions};
use lingosub::errors::{GatewayError, TranslationError};
use lingosub::subtitle_processor::parse_srt_string;
use lingosub::translation::prompts::PromptSet;
use lingosub::translation::{
    correct_flagged_translations, BatchOptions, BatchTranslator, MultiPhaseOptions,
    MultiPhaseTranslator, RetryCoordinator,
};

use crate::common;
use crate::common::mock_gateway::{CollectorSink, ScriptedGateway};

fn prompts() -> PromptSet {
    PromptSet::new("English", "Chinese")
}

fn no_delay_batch_options(batch_size: usize) -> BatchOptions {
    BatchOptions {
        batch_size,
        temperature: 0.5,
        delay_secs: 0.0,
    }
}

fn stop_flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

/// Test the standard pipeline filling the checkpoint batch by batch
#[tokio::test]
async fn test_batchTranslator_withScriptedResponses_shouldFillCheckpoint() {
    let temp_dir = common::create_temp_dir().unwrap();
    let output_path = temp_dir.path().join("out.srt");
    let cues = common::make_cues(&["First line", "Second line", "Third line"]);

    let gateway = ScriptedGateway::new();
    gateway.push_ok("[1] 第一句\n[2] 第二句");
    gateway.push_ok("[1] 第三句");

    let mut store = CheckpointStore::create(&output_path, cues.len()).unwrap();
    let translator = BatchTranslator::new(&gateway, prompts(), no_delay_batch_options(2));
    let sink = CollectorSink::new();

    let translated = translator
        .translate(&cues, &mut store, &sink, &stop_flag())
        .await
        .unwrap();

    assert_eq!(translated, 3);
    assert_eq!(gateway.call_count(), 2);
    assert_eq!(store.state().translations[0].translation(), "第一句");
    assert_eq!(store.state().translations[2].translation(), "第三句");
    assert!(store.failed_indices().is_empty());
    assert_eq!(store.state().completed, 3);
}

/// Test that a failed request marks the batch failed and the run continues
#[tokio::test]
async fn test_batchTranslator_withRequestError_shouldMarkFailedAndContinue() {
    let temp_dir = common::create_temp_dir().unwrap();
    let output_path = temp_dir.path().join("out.srt");
    let cues = common::make_cues(&["First line", "Second line", "Third line"]);

    let gateway = ScriptedGateway::new();
    gateway.push_err(GatewayError::RateLimitExceeded("slow down".to_string()));
    gateway.push_ok("[1] 第三句");

    let mut store = CheckpointStore::create(&output_path, cues.len()).unwrap();
    let translator = BatchTranslator::new(&gateway, prompts(), no_delay_batch_options(2));
    let sink = CollectorSink::new();

    let translated = translator
        .translate(&cues, &mut store, &sink, &stop_flag())
        .await
        .unwrap();

    assert_eq!(translated, 1);
    assert_eq!(store.failed_indices(), &[0, 1]);
    assert_eq!(store.state().translations[2].translation(), "第三句");
    assert_eq!(sink.errors.lock().len(), 1);
}

/// Test that positions already stored are not requested again
#[tokio::test]
async fn test_batchTranslator_withPartialCheckpoint_shouldOnlyRequestMissing() {
    let temp_dir = common::create_temp_dir().unwrap();
    let output_path = temp_dir.path().join("out.srt");
    let cues = common::make_cues(&["First line", "Second line", "Third line"]);

    let mut store = CheckpointStore::create(&output_path, cues.len()).unwrap();
    store.set_record(0, TranslationRecord::text("第一句"));
    store.set_record(1, TranslationRecord::text("第二句"));
    store.persist().unwrap();

    let gateway = ScriptedGateway::new();
    gateway.push_ok("[1] 第三句");

    let translator = BatchTranslator::new(&gateway, prompts(), no_delay_batch_options(2));
    let sink = CollectorSink::new();

    let translated = translator
        .translate(&cues, &mut store, &sink, &stop_flag())
        .await
        .unwrap();

    assert_eq!(translated, 1);
    assert_eq!(gateway.call_count(), 1);
    let request = gateway.request_text(0);
    assert!(request.contains("Third line"));
    assert!(!request.contains("First line"));
}

/// Test that a raised stop flag ends the run before any request
#[tokio::test]
async fn test_batchTranslator_withStopRaised_shouldReturnWithoutRequests() {
    let temp_dir = common::create_temp_dir().unwrap();
    let output_path = temp_dir.path().join("out.srt");
    let cues = common::make_cues(&["First line", "Second line"]);

    let gateway = ScriptedGateway::new();
    let mut store = CheckpointStore::create(&output_path, cues.len()).unwrap();
    let translator = BatchTranslator::new(&gateway, prompts(), no_delay_batch_options(2));
    let sink = CollectorSink::new();
    let stop = stop_flag();
    stop.store(true, Ordering::Relaxed);

    let translated = translator
        .translate(&cues, &mut store, &sink, &stop)
        .await
        .unwrap();

    assert_eq!(translated, 0);
    assert_eq!(gateway.call_count(), 0);
}

/// Test that the retry coordinator recovers failed positions and clears
/// them from the failed set
#[tokio::test]
async fn test_retryCoordinator_shouldRecoverFailedPositions() {
    let temp_dir = common::create_temp_dir().unwrap();
    let output_path = temp_dir.path().join("out.srt");
    let cues = common::make_cues(&["First line", "Second line", "Third line"]);

    let mut store = CheckpointStore::create(&output_path, cues.len()).unwrap();
    store.set_record(1, TranslationRecord::text("第二句"));
    store.mark_failed([0, 2]);

    let gateway = ScriptedGateway::new();
    gateway.push_ok("[1] 第一句\n[2] 第三句");

    let retry = RetryCoordinator::new(&gateway, prompts(), 0.5, 0.0);
    let sink = CollectorSink::new();

    let remaining = retry
        .retry_failed(&cues, &mut store, &sink, &stop_flag())
        .await
        .unwrap();

    assert!(remaining.is_empty());
    assert!(store.failed_indices().is_empty());
    assert_eq!(store.state().translations[0].translation(), "第一句");
    assert_eq!(store.state().translations[2].translation(), "第三句");
}

/// Test that a position failing every round is reported back
#[tokio::test]
async fn test_retryCoordinator_withPersistentFailure_shouldReportRemaining() {
    let temp_dir = common::create_temp_dir().unwrap();
    let output_path = temp_dir.path().join("out.srt");
    let cues = common::make_cues(&["First line"]);

    let mut store = CheckpointStore::create(&output_path, cues.len()).unwrap();
    store.mark_failed([0]);

    // The endpoint keeps answering with nothing useful
    let gateway = ScriptedGateway::with_fallback("");

    let retry = RetryCoordinator::new(&gateway, prompts(), 0.5, 0.0);
    let sink = CollectorSink::new();

    let remaining = retry
        .retry_failed(&cues, &mut store, &sink, &stop_flag())
        .await
        .unwrap();

    assert_eq!(remaining, vec![0]);
    assert_eq!(store.failed_indices(), &[0]);
    assert_eq!(gateway.call_count(), 3);
}

/// Test the three-phase pipeline end to end: draft with glossary
/// extraction, terminology review, structured refinement
#[tokio::test]
async fn test_multiPhaseTranslator_endToEnd_shouldProduceDetailedRecords() {
    let cues = common::make_cues(&["Hello", "Goodbye, World"]);

    let gateway = ScriptedGateway::new();
    gateway.push_ok("[1] 你好\n[2] 再见，世界\n\n术语表:\nWorld | 世界");
    gateway.push_ok("World | 世界");
    gateway.push_ok(
        "#1#\nTIME: 0:00:00.000 --> 0:00:03.000\nORIG: Hello\nTRANS: 你好啊\n\n#2#\nTIME: 0:00:04.000 --> 0:00:07.000\nORIG: Goodbye, World\nTRANS: 再见，世界",
    );

    let translator = MultiPhaseTranslator::new(
        &gateway,
        prompts(),
        MultiPhaseOptions {
            batch_size: 40,
            delay_secs: 0.0,
            custom_terms: Default::default(),
        },
    );
    let sink = CollectorSink::new();

    let (records, terminology) = translator
        .translate(&cues, &sink, &stop_flag())
        .await
        .unwrap();

    assert_eq!(gateway.call_count(), 3);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].translation(), "你好啊");
    assert_eq!(records[0].original(), Some("Hello"));
    assert_eq!(records[1].translation(), "再见，世界");
    assert_eq!(terminology.get("World"), Some("世界"));
}

/// Test that a draft phase covering less than half the cues is a hard error
#[tokio::test]
async fn test_multiPhaseTranslator_withFailedDrafts_shouldErrOut() {
    let cues = common::make_cues(&["Hello", "World"]);

    let gateway = ScriptedGateway::new();
    gateway.push_err(GatewayError::ConnectionError("no route".to_string()));

    let translator =
        MultiPhaseTranslator::new(&gateway, prompts(), MultiPhaseOptions {
            batch_size: 40,
            delay_secs: 0.0,
            custom_terms: Default::default(),
        });
    let sink = CollectorSink::new();

    let result = translator.translate(&cues, &sink, &stop_flag()).await;

    assert!(matches!(
        result,
        Err(TranslationError::DraftPhaseFailed { completed: 0, total: 2 })
    ));
    assert_eq!(gateway.call_count(), 1);
}

/// Test that a stop during the draft phase ends the run with the
/// drafts collected so far instead of a draft-failure error
#[tokio::test]
async fn test_multiPhaseTranslator_withStopRaised_shouldReturnDraftsNotError() {
    let cues = common::make_cues(&["Hello", "World"]);

    let gateway = ScriptedGateway::new();
    let sink = CollectorSink::new();
    let stop = stop_flag();
    stop.store(true, Ordering::Relaxed);

    let translator = MultiPhaseTranslator::new(&gateway, prompts(), MultiPhaseOptions {
        batch_size: 40,
        delay_secs: 0.0,
        custom_terms: Default::default(),
    });

    let (records, terminology) = translator.translate(&cues, &sink, &stop).await.unwrap();

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record.translation().is_empty()));
    assert!(terminology.is_empty());
    assert_eq!(gateway.call_count(), 0);
}

/// Test the correction sweep fixing a flagged record in place
#[tokio::test]
async fn test_correctionSweep_shouldFixFlaggedRecord() {
    let cues = common::make_cues(&["First line", "Second line", "Third line"]);
    let mut records = vec![
        TranslationRecord::text("第一句"),
        TranslationRecord::text("[未翻译]"),
        TranslationRecord::text("第三句"),
    ];

    let gateway = ScriptedGateway::new();
    gateway.push_ok("<translation index=\"2\">第二句</translation>");
    let sink = CollectorSink::new();

    let fixed = correct_flagged_translations(&gateway, &cues, &mut records, 0.0, &sink, &stop_flag())
        .await
        .unwrap();

    assert_eq!(fixed, 1);
    assert_eq!(records[1].translation(), "第二句");
    // The request carried the broken line with its surrounding context
    let request = gateway.request_text(0);
    assert!(request.contains("[未翻译]"));
    assert!(request.contains("Second line"));
}

/// Test that a clean record set makes no correction requests
#[tokio::test]
async fn test_correctionSweep_withNothingFlagged_shouldMakeNoRequests() {
    let cues = common::make_cues(&["First line"]);
    let mut records = vec![TranslationRecord::text("第一句")];

    let gateway = ScriptedGateway::new();
    let sink = CollectorSink::new();

    let fixed = correct_flagged_translations(&gateway, &cues, &mut records, 0.0, &sink, &stop_flag())
        .await
        .unwrap();

    assert_eq!(fixed, 0);
    assert_eq!(gateway.call_count(), 0);
}

/// Test translating, finalizing and writing a bilingual output file
#[tokio::test]
async fn test_pipeline_translateAndCompose_shouldWriteBilingualOutput() {
    let temp_dir = common::create_temp_dir().unwrap();
    let output_path = temp_dir.path().join("out.srt");
    let cues = common::make_cues(&["First line", "Second line"]);

    let gateway = ScriptedGateway::new();
    gateway.push_ok("[1] 第一句\n[2] 第二句");

    let mut store = CheckpointStore::create(&output_path, cues.len()).unwrap();
    let translator = BatchTranslator::new(&gateway, prompts(), no_delay_batch_options(40));
    let sink = CollectorSink::new();
    translator
        .translate(&cues, &mut store, &sink, &stop_flag())
        .await
        .unwrap();

    let state = store.finalize(cues.len()).unwrap();
    let options = ComposeOptions {
        show_original: true,
        clean_punctuation: false,
    };
    let written = composer::write_output(&cues, &state.translations, &options, &output_path).unwrap();

    assert_eq!(written.len(), 2);
    let reparsed = parse_srt_string(&std::fs::read_to_string(&output_path).unwrap()).unwrap();
    assert_eq!(reparsed.len(), 2);
    assert_eq!(reparsed[0].content, "第一句\nFirst line");
    assert_eq!(reparsed[1].content, "第二句\nSecond line");
}
