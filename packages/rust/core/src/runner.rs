//! Batch runner: drives loader → synthesizer over a sliced record sequence
//! with periodic checkpointing and a clean interrupt path.
//!
//! One sequential loop, no parallelism across records: each record's full
//! enrichment + synthesis round trip completes before the next begins, so
//! answer order always matches retained question order. The run as a whole
//! has no failed terminal state; per-record failures become error records,
//! and the only fatal conditions are dataset loading and checkpoint I/O.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use answerforge_shared::{AnswerRecord, QuestionId, Result, RunId};

use crate::output;
use crate::synthesizer::Synthesizer;

/// Records with fewer trimmed characters than this are skipped silently.
pub const MIN_QUESTION_CHARS: usize = 10;

/// Suffix of the periodic checkpoint file (`answers.jsonl.temp`).
const CHECKPOINT_SUFFIX: &str = "temp";

/// Suffix of the interrupt flush file (`answers.jsonl.interrupted`).
const INTERRUPT_SUFFIX: &str = "interrupted";

// ---------------------------------------------------------------------------
// Run configuration & outcome
// ---------------------------------------------------------------------------

/// Configuration for one batch run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Dataset file to load (csv/json/txt).
    pub dataset_path: PathBuf,
    /// Persona key resolved per record (unknown keys fall back to default).
    pub persona_key: String,
    /// Leading records to drop before processing.
    pub start_offset: usize,
    /// Maximum records to process after the offset.
    pub max_count: Option<usize>,
    /// Whether to fetch search snippets per question.
    pub enrichment_enabled: bool,
    /// Canonical output path; checkpoint and interrupt files derive from it.
    pub output_path: PathBuf,
    /// Flush the accumulator every N iterated records.
    pub checkpoint_every: usize,
    /// Pause between records (rate-limiting courtesy to the API).
    pub request_delay: Duration,
}

/// Terminal state of a run. There is no `Failed`: individual record
/// failures are captured as error records and never abort the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Interrupted,
}

/// Result of a finished (or cleanly stopped) run.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: RunId,
    /// Produced records, in retained-question order.
    pub answers: Vec<AnswerRecord>,
    pub status: RunStatus,
    /// Where the final flush went: the canonical path on completion, the
    /// `.interrupted` path on a clean stop.
    pub written_to: PathBuf,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each record is synthesized.
    fn record_processed(&self, current: usize, total: usize, id: &QuestionId);
    /// Called when the run reaches a terminal state.
    fn done(&self, outcome: &RunOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn record_processed(&self, _current: usize, _total: usize, _id: &QuestionId) {}
    fn done(&self, _outcome: &RunOutcome) {}
}

// ---------------------------------------------------------------------------
// The run loop
// ---------------------------------------------------------------------------

/// Append a suffix to the canonical output path
/// (`answers.jsonl` → `answers.jsonl.temp`).
fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".");
    os.push(suffix);
    PathBuf::from(os)
}

/// Run the full answer-generation pipeline.
///
/// 1. Load the dataset (fatal errors propagate before any processing)
/// 2. Apply start offset, then max count
/// 3. Per record: skip if too short, synthesize, append, checkpoint, delay
/// 4. Flush to the canonical path on exhaustion, or to the `.interrupted`
///    path when the interrupt flag is observed before a record starts
#[instrument(skip_all, fields(dataset = %config.dataset_path.display(), persona = %config.persona_key))]
pub async fn run(
    config: &RunConfig,
    synthesizer: &Synthesizer,
    interrupt: Arc<AtomicBool>,
    progress: &dyn ProgressReporter,
) -> Result<RunOutcome> {
    let start = Instant::now();
    let run_id = RunId::new();

    progress.phase("Loading dataset");
    let mut records = answerforge_dataset::load(&config.dataset_path)?;

    if config.start_offset > 0 {
        let offset = config.start_offset.min(records.len());
        records = records.split_off(offset);
        info!(offset = config.start_offset, "applied start offset");
    }
    if let Some(max) = config.max_count {
        records.truncate(max);
    }

    let total = records.len();
    info!(
        %run_id,
        total,
        enrichment = config.enrichment_enabled,
        "starting batch run"
    );
    progress.phase("Generating answers");

    let checkpoint_path = suffixed(&config.output_path, CHECKPOINT_SUFFIX);
    let mut answers: Vec<AnswerRecord> = Vec::with_capacity(total);

    for (position, record) in records.iter().enumerate() {
        if interrupt.load(Ordering::SeqCst) {
            return finish_interrupted(config, run_id, answers, start, progress);
        }

        if record.text.trim().chars().count() < MIN_QUESTION_CHARS {
            debug!(id = %record.id, "skipping short question");
            continue;
        }

        let answer = synthesizer
            .synthesize(record, &config.persona_key, config.enrichment_enabled)
            .await;
        answers.push(answer);
        progress.record_processed(position + 1, total, &record.id);

        // Checkpoint positions count iterated records, including skipped ones.
        if config.checkpoint_every > 0 && (position + 1) % config.checkpoint_every == 0 {
            output::write_jsonl(&checkpoint_path, &answers)?;
            info!(processed = position + 1, total, "checkpoint written");
        }

        if !config.request_delay.is_zero() {
            tokio::time::sleep(config.request_delay).await;
        }
    }

    output::write_jsonl(&config.output_path, &answers)?;

    let outcome = RunOutcome {
        run_id,
        answers,
        status: RunStatus::Completed,
        written_to: config.output_path.clone(),
        elapsed: start.elapsed(),
    };

    info!(
        run_id = %outcome.run_id,
        produced = outcome.answers.len(),
        elapsed_ms = outcome.elapsed.as_millis(),
        "batch run complete"
    );
    progress.done(&outcome);

    Ok(outcome)
}

/// The clean-stop path: flush whatever has accumulated to the distinct
/// interrupt destination and leave the canonical output untouched.
fn finish_interrupted(
    config: &RunConfig,
    run_id: RunId,
    answers: Vec<AnswerRecord>,
    start: Instant,
    progress: &dyn ProgressReporter,
) -> Result<RunOutcome> {
    let interrupted_path = suffixed(&config.output_path, INTERRUPT_SUFFIX);
    warn!(
        salvaged = answers.len(),
        path = %interrupted_path.display(),
        "run interrupted by operator"
    );
    output::write_jsonl(&interrupted_path, &answers)?;

    let outcome = RunOutcome {
        run_id,
        answers,
        status: RunStatus::Interrupted,
        written_to: interrupted_path,
        elapsed: start.elapsed(),
    };
    progress.done(&outcome);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use answerforge_llm::CompletionClient;
    use answerforge_shared::{CompletionConfig, PersonaRegistry, QuestionId};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn synthesizer_for(server: &MockServer) -> Synthesizer {
        let config = CompletionConfig {
            base_url: server.uri(),
            model: "qwen-plus".into(),
            ..CompletionConfig::default()
        };
        let completion = CompletionClient::new(&config, "test-key".into()).expect("client");
        Synthesizer::new(completion, None, PersonaRegistry::builtin())
    }

    async fn mock_answer(server: &MockServer, content: &str) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": content}}]
            })))
            .mount(server)
            .await;
    }

    fn write_lines(dir: &tempfile::TempDir, lines: &[&str]) -> PathBuf {
        let path = dir.path().join("questions.txt");
        std::fs::write(&path, lines.join("\n")).expect("write dataset");
        path
    }

    fn run_config(dataset_path: PathBuf, output_path: PathBuf) -> RunConfig {
        RunConfig {
            dataset_path,
            persona_key: "default".into(),
            start_offset: 0,
            max_count: None,
            enrichment_enabled: false,
            output_path,
            checkpoint_every: 50,
            request_delay: Duration::ZERO,
        }
    }

    /// Reporter that flips the interrupt flag once N records were produced.
    struct InterruptAfterProduced {
        after: usize,
        produced: std::sync::atomic::AtomicUsize,
        flag: Arc<AtomicBool>,
    }

    impl ProgressReporter for InterruptAfterProduced {
        fn phase(&self, _name: &str) {}
        fn record_processed(&self, _current: usize, _total: usize, _id: &QuestionId) {
            let n = self.produced.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.after {
                self.flag.store(true, Ordering::SeqCst);
            }
        }
        fn done(&self, _outcome: &RunOutcome) {}
    }

    fn ten_questions() -> Vec<String> {
        (0..10)
            .map(|i| format!("Q{i}: a question comfortably over ten characters"))
            .collect()
    }

    #[tokio::test]
    async fn offset_and_limit_slice_in_order() {
        let server = MockServer::start().await;
        mock_answer(&server, "An answer.").await;

        let dir = tempfile::tempdir().expect("tempdir");
        let questions = ten_questions();
        let lines: Vec<&str> = questions.iter().map(String::as_str).collect();
        let dataset = write_lines(&dir, &lines);

        let mut config = run_config(dataset, dir.path().join("out/answers.jsonl"));
        config.start_offset = 2;
        config.max_count = Some(3);

        let synthesizer = synthesizer_for(&server);
        let outcome = run(
            &config,
            &synthesizer,
            Arc::new(AtomicBool::new(false)),
            &SilentProgress,
        )
        .await
        .expect("run");

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.answers.len(), 3);
        let ids: Vec<&QuestionId> = outcome.answers.iter().map(|a| &a.question_id).collect();
        assert_eq!(
            ids,
            [&QuestionId::Row(2), &QuestionId::Row(3), &QuestionId::Row(4)]
        );
        assert!(outcome.answers.iter().all(|a| a.search_results.is_empty()));
        assert!(outcome.answers.iter().all(|a| !a.error));

        // Canonical output holds the same three records.
        let written = output::read_answers(&config.output_path).expect("read output");
        assert_eq!(written.len(), 3);
        assert_eq!(written[0].question_id, QuestionId::Row(2));
    }

    #[tokio::test]
    async fn short_questions_are_skipped_silently() {
        let server = MockServer::start().await;
        mock_answer(&server, "An answer.").await;

        let dir = tempfile::tempdir().expect("tempdir");
        let dataset = write_lines(
            &dir,
            &[
                "What sustained you through the prison years?",
                "Too short",
                "How should leaders handle defeat with dignity?",
            ],
        );

        let config = run_config(dataset, dir.path().join("answers.jsonl"));
        let synthesizer = synthesizer_for(&server);
        let outcome = run(
            &config,
            &synthesizer,
            Arc::new(AtomicBool::new(false)),
            &SilentProgress,
        )
        .await
        .expect("run");

        assert_eq!(outcome.answers.len(), 2);
        assert_eq!(outcome.answers[0].question_id, QuestionId::Row(0));
        assert_eq!(outcome.answers[1].question_id, QuestionId::Row(2));
    }

    #[tokio::test]
    async fn completion_failure_does_not_halt_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let questions = ten_questions();
        let lines: Vec<&str> = questions.iter().map(String::as_str).collect();
        let dataset = write_lines(&dir, &lines[..3]);

        let config = run_config(dataset, dir.path().join("answers.jsonl"));
        let synthesizer = synthesizer_for(&server);
        let outcome = run(
            &config,
            &synthesizer,
            Arc::new(AtomicBool::new(false)),
            &SilentProgress,
        )
        .await
        .expect("run");

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.answers.len(), 3);
        for answer in &outcome.answers {
            assert!(answer.error);
            assert!(answer.answer.starts_with("Error: "));
        }
    }

    #[tokio::test]
    async fn checkpoint_written_at_exact_interval() {
        let server = MockServer::start().await;
        mock_answer(&server, "An answer.").await;

        let dir = tempfile::tempdir().expect("tempdir");
        let questions = ten_questions();
        let lines: Vec<&str> = questions.iter().map(String::as_str).collect();
        let dataset = write_lines(&dir, &lines[..5]);

        let output_path = dir.path().join("answers.jsonl");
        let mut config = run_config(dataset, output_path.clone());
        config.checkpoint_every = 2;

        let synthesizer = synthesizer_for(&server);
        run(
            &config,
            &synthesizer,
            Arc::new(AtomicBool::new(false)),
            &SilentProgress,
        )
        .await
        .expect("run");

        // Last checkpoint fired after record 4; it holds the first 4 in order.
        let checkpoint = output::read_answers(&suffixed(&output_path, "temp")).expect("read temp");
        assert_eq!(checkpoint.len(), 4);
        assert_eq!(checkpoint[3].question_id, QuestionId::Row(3));

        let final_output = output::read_answers(&output_path).expect("read final");
        assert_eq!(final_output.len(), 5);
    }

    #[tokio::test]
    async fn no_checkpoint_below_interval() {
        let server = MockServer::start().await;
        mock_answer(&server, "An answer.").await;

        let dir = tempfile::tempdir().expect("tempdir");
        let questions = ten_questions();
        let lines: Vec<&str> = questions.iter().map(String::as_str).collect();
        let dataset = write_lines(&dir, &lines[..3]);

        let output_path = dir.path().join("answers.jsonl");
        let config = run_config(dataset, output_path.clone());

        let synthesizer = synthesizer_for(&server);
        run(
            &config,
            &synthesizer,
            Arc::new(AtomicBool::new(false)),
            &SilentProgress,
        )
        .await
        .expect("run");

        // 3 records against a checkpoint interval of 50: no .temp file.
        assert!(!suffixed(&output_path, "temp").exists());
        assert!(output_path.exists());
    }

    #[tokio::test]
    async fn interrupt_flushes_to_distinct_path_and_leaves_canonical_untouched() {
        let server = MockServer::start().await;
        mock_answer(&server, "An answer.").await;

        let dir = tempfile::tempdir().expect("tempdir");
        let questions = ten_questions();
        let lines: Vec<&str> = questions.iter().map(String::as_str).collect();
        let dataset = write_lines(&dir, &lines);

        let output_path = dir.path().join("answers.jsonl");
        let config = run_config(dataset, output_path.clone());

        let flag = Arc::new(AtomicBool::new(false));
        let reporter = InterruptAfterProduced {
            after: 3,
            produced: std::sync::atomic::AtomicUsize::new(0),
            flag: flag.clone(),
        };

        let synthesizer = synthesizer_for(&server);
        let outcome = run(&config, &synthesizer, flag, &reporter)
            .await
            .expect("run");

        assert_eq!(outcome.status, RunStatus::Interrupted);
        assert_eq!(outcome.answers.len(), 3);

        let interrupted =
            output::read_answers(&suffixed(&output_path, "interrupted")).expect("read interrupted");
        assert_eq!(interrupted.len(), 3);
        assert_eq!(interrupted[2].question_id, QuestionId::Row(2));
        assert!(!output_path.exists(), "canonical output must stay untouched");
    }

    #[tokio::test]
    async fn timestamps_are_non_decreasing() {
        let server = MockServer::start().await;
        mock_answer(&server, "An answer.").await;

        let dir = tempfile::tempdir().expect("tempdir");
        let questions = ten_questions();
        let lines: Vec<&str> = questions.iter().map(String::as_str).collect();
        let dataset = write_lines(&dir, &lines[..4]);

        let config = run_config(dataset, dir.path().join("answers.jsonl"));
        let synthesizer = synthesizer_for(&server);
        let outcome = run(
            &config,
            &synthesizer,
            Arc::new(AtomicBool::new(false)),
            &SilentProgress,
        )
        .await
        .expect("run");

        let stamps: Vec<i64> = outcome.answers.iter().map(|a| a.timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }
}
