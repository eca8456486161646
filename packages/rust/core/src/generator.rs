//! Question-generation pipeline: asks the completion collaborator to emit
//! new question datasets about a topic.
//!
//! The generator is failure-tolerant the same way the answer pipeline is:
//! a batch whose response cannot be parsed falls back to extracting
//! question-looking lines from the raw text, and a batch whose API call
//! fails falls back to template questions. No batch aborts the run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use answerforge_llm::CompletionClient;
use answerforge_shared::Result;

use crate::output;
use crate::runner::{ProgressReporter, RunStatus};

/// Questions requested per completion call.
pub const GENERATION_BATCH_SIZE: usize = 50;

/// Extracted questions shorter than this are discarded as noise.
const MIN_EXTRACTED_CHARS: usize = 10;

/// Wall-clock bound per generation request (longer than answering: the
/// model emits a whole batch at once).
const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// The three question-generation strategies. Each carries its own opaque
/// prompt template parameterized by topic and batch size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStrategy {
    Comprehensive,
    Expert,
    Personal,
}

impl QuestionStrategy {
    /// Stable tag stamped into `generation_type` metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comprehensive => "comprehensive",
            Self::Expert => "expert",
            Self::Personal => "personal",
        }
    }

    fn prompt(&self, topic: &str, count: usize) -> String {
        match self {
            Self::Comprehensive => format!(
                "You are an expert question generator specializing in creating rich, diverse, \
                 and insightful questions about {topic}.\n\n\
                 Explore {topic} from multiple angles: historical, contemporary, personal, \
                 professional, philosophical, and practical. Mix question types (factual, \
                 analytical, reflective, comparative, hypothetical, expert-level), vary \
                 complexity from basic to advanced, keep each question specific and focused, \
                 and make every question unique in the aspect it explores.\n\n\
                 Generate exactly {count} unique, high-quality questions about {topic}.\n\
                 Format each question as a JSON object with:\n\
                 - \"question\": the actual question text\n\
                 - \"category\": the type/category of question\n\
                 - \"complexity\": \"basic\", \"intermediate\", or \"advanced\"\n\
                 - \"focus_area\": specific aspect of {topic} being addressed\n\n\
                 Return only the JSON array of questions, no additional text."
            ),
            Self::Expert => format!(
                "You are a world-class expert on {topic} creating advanced, nuanced questions \
                 that only someone with deep knowledge could answer comprehensively.\n\n\
                 Focus on subtle aspects, controversies, and complex relationships within \
                 {topic}; connect it with other fields and historical contexts; require \
                 analysis, evaluation, and synthesis; include contemporary implications, \
                 methodology, ethical dimensions, and practical applications.\n\n\
                 Generate exactly {count} expert-level questions about {topic}.\n\
                 Format each question as a JSON object with:\n\
                 - \"question\": the expert-level question\n\
                 - \"category\": specialized category\n\
                 - \"complexity\": \"advanced\"\n\
                 - \"focus_area\": specific expert aspect being addressed\n\n\
                 Return only the JSON array of questions, no additional text."
            ),
            Self::Personal => format!(
                "You are creating deeply personal and reflective questions about {topic} that \
                 encourage introspection and personal connection.\n\n\
                 Connect {topic} to personal experiences, emotions, values, and beliefs; \
                 encourage self-reflection about one's relationship to it; explore hopes, \
                 fears, challenges, growth, meaning, and motivation.\n\n\
                 Generate exactly {count} personal, reflective questions about {topic}.\n\
                 Format each question as a JSON object with:\n\
                 - \"question\": the personal reflection question\n\
                 - \"category\": \"personal_reflection\"\n\
                 - \"complexity\": \"introspective\"\n\
                 - \"focus_area\": personal aspect being explored\n\n\
                 Return only the JSON array of questions, no additional text."
            ),
        }
    }
}

impl std::str::FromStr for QuestionStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "comprehensive" => Ok(Self::Comprehensive),
            "expert" => Ok(Self::Expert),
            "personal" => Ok(Self::Personal),
            other => Err(format!(
                "unknown strategy '{other}': expected comprehensive, expert, or personal"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Generated questions
// ---------------------------------------------------------------------------

/// One generated question, as emitted (and re-parsed) from the model, plus
/// run metadata stamped by the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub complexity: String,
    #[serde(default)]
    pub focus_area: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Configuration for one generation run.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub topic: String,
    pub strategies: Vec<QuestionStrategy>,
    /// Total questions to aim for, split evenly across strategies.
    pub target_count: usize,
    /// Questions requested per completion call.
    pub batch_size: usize,
    pub output_path: PathBuf,
    /// Pause between batches.
    pub batch_delay: Duration,
}

/// Result of a finished (or cleanly stopped) generation run.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub questions: Vec<GeneratedQuestion>,
    pub duplicates_removed: usize,
    pub status: RunStatus,
    pub written_to: PathBuf,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Generate a question dataset across one or more strategies.
///
/// Accumulated questions checkpoint to `<output>.temp` after every batch
/// (whole-file overwrite, same policy as the answer runner); the interrupt
/// flag triggers an `.interrupted` flush between batches.
#[instrument(skip_all, fields(topic = %config.topic, target = config.target_count))]
pub async fn generate_dataset(
    config: &GeneratorConfig,
    client: &CompletionClient,
    interrupt: Arc<AtomicBool>,
    progress: &dyn ProgressReporter,
) -> Result<GenerationOutcome> {
    let start = Instant::now();
    let checkpoint_path = checkpoint(&config.output_path, "temp");

    let per_strategy = config.target_count / config.strategies.len().max(1);
    let batch_size = config.batch_size.max(1);

    let mut all: Vec<GeneratedQuestion> = Vec::new();

    for strategy in &config.strategies {
        let batches = per_strategy.div_ceil(batch_size);
        info!(strategy = strategy.as_str(), per_strategy, batches, "generating questions");

        for batch in 0..batches {
            if interrupt.load(Ordering::SeqCst) {
                return finish_interrupted(config, all, start, progress);
            }

            let remaining = per_strategy - batch * batch_size;
            let n = remaining.min(batch_size);
            if n == 0 {
                break;
            }

            progress.phase(&format!(
                "Generating {} questions [{}] batch {}/{}",
                n,
                strategy.as_str(),
                batch + 1,
                batches
            ));

            let mut questions = generate_batch(client, &config.topic, *strategy, n).await;
            let now = Utc::now().timestamp();
            for question in &mut questions {
                question.topic = Some(config.topic.clone());
                question.generation_type = Some(strategy.as_str().to_string());
                question.batch = Some(batch);
                question.timestamp = Some(now);
            }
            all.extend(questions);

            output::write_jsonl(&checkpoint_path, &all)?;

            if !config.batch_delay.is_zero() {
                tokio::time::sleep(config.batch_delay).await;
            }
        }
    }

    let before = all.len();
    let unique = dedup_questions(all);
    let duplicates_removed = before - unique.len();
    info!(duplicates_removed, kept = unique.len(), "duplicates removed");

    output::write_jsonl(&config.output_path, &unique)?;

    let outcome = GenerationOutcome {
        questions: unique,
        duplicates_removed,
        status: RunStatus::Completed,
        written_to: config.output_path.clone(),
        elapsed: start.elapsed(),
    };
    Ok(outcome)
}

fn checkpoint(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".");
    os.push(suffix);
    PathBuf::from(os)
}

fn finish_interrupted(
    config: &GeneratorConfig,
    questions: Vec<GeneratedQuestion>,
    start: Instant,
    progress: &dyn ProgressReporter,
) -> Result<GenerationOutcome> {
    let interrupted_path = checkpoint(&config.output_path, "interrupted");
    warn!(
        salvaged = questions.len(),
        path = %interrupted_path.display(),
        "generation interrupted by operator"
    );
    output::write_jsonl(&interrupted_path, &questions)?;
    progress.phase("Interrupted");

    Ok(GenerationOutcome {
        questions,
        duplicates_removed: 0,
        status: RunStatus::Interrupted,
        written_to: interrupted_path,
        elapsed: start.elapsed(),
    })
}

/// One generation call with boosted sampling parameters. Falls back through
/// text extraction and then templates; never fails.
async fn generate_batch(
    client: &CompletionClient,
    topic: &str,
    strategy: QuestionStrategy,
    count: usize,
) -> Vec<GeneratedQuestion> {
    let prompt = strategy.prompt(topic, count);

    match client
        .complete_with(
            &prompt,
            client.max_tokens() * 2,
            client.temperature() + 0.1,
            GENERATION_TIMEOUT,
        )
        .await
    {
        Ok(content) => match parse_questions(&content) {
            Some(questions) => questions,
            None => {
                warn!(strategy = strategy.as_str(), "response was not a JSON array, extracting from text");
                extract_questions(&content, topic, count)
            }
        },
        Err(e) => {
            warn!(strategy = strategy.as_str(), error = %e, "generation call failed, using template fallback");
            fallback_questions(topic, count)
        }
    }
}

/// Parse the response content as a JSON array of questions.
fn parse_questions(content: &str) -> Option<Vec<GeneratedQuestion>> {
    let questions: Vec<GeneratedQuestion> = serde_json::from_str(content.trim()).ok()?;
    let questions: Vec<GeneratedQuestion> = questions
        .into_iter()
        .filter(|q| !q.question.trim().is_empty())
        .collect();
    if questions.is_empty() { None } else { Some(questions) }
}

/// Salvage question-looking lines from a response that was not valid JSON.
fn extract_questions(text: &str, topic: &str, max: usize) -> Vec<GeneratedQuestion> {
    // Matches the question value inside JSON-ish fragments the model
    // sometimes emits line by line.
    let json_fragment = Regex::new(r#""question"\s*:\s*"([^"]+)""#).unwrap();

    let mut questions = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let candidate = if let Some(captures) = json_fragment.captures(line) {
            captures[1].trim().to_string()
        } else if line.contains('?') {
            line.trim_matches(|c: char| c == '"' || c == ',' || c.is_whitespace())
                .to_string()
        } else {
            continue;
        };

        if candidate.chars().count() > MIN_EXTRACTED_CHARS {
            questions.push(GeneratedQuestion {
                question: candidate,
                category: "extracted".into(),
                complexity: "intermediate".into(),
                focus_area: topic.into(),
                topic: None,
                generation_type: None,
                batch: None,
                timestamp: None,
            });
        }
        if questions.len() >= max {
            break;
        }
    }
    questions
}

/// Last-resort template questions when the API call itself failed.
fn fallback_questions(topic: &str, count: usize) -> Vec<GeneratedQuestion> {
    let templates = [
        format!("What are the key principles of {topic}?"),
        format!("How did {topic} evolve over time?"),
        format!("What impact has {topic} had on society?"),
        format!("What are the main challenges in {topic}?"),
        format!("How does {topic} relate to current events?"),
        format!("What are the different perspectives on {topic}?"),
        format!("How has {topic} influenced other fields?"),
        format!("What are the future implications of {topic}?"),
        format!("What role does {topic} play in education?"),
        format!("How can {topic} be applied in practice?"),
    ];

    (0..count)
        .map(|i| GeneratedQuestion {
            question: templates[i % templates.len()].clone(),
            category: "fallback".into(),
            complexity: "basic".into(),
            focus_area: topic.into(),
            topic: None,
            generation_type: None,
            batch: None,
            timestamp: None,
        })
        .collect()
}

/// Drop duplicate questions, comparing by digest of the lowercased trimmed
/// text. First occurrence wins; order is otherwise preserved.
fn dedup_questions(questions: Vec<GeneratedQuestion>) -> Vec<GeneratedQuestion> {
    let mut seen: HashSet<String> = HashSet::new();
    questions
        .into_iter()
        .filter(|q| seen.insert(question_digest(&q.question)))
        .collect()
}

fn question_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().to_lowercase().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::SilentProgress;
    use answerforge_shared::CompletionConfig;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn strategy_parses_from_cli_keys() {
        assert_eq!(
            "comprehensive".parse::<QuestionStrategy>().unwrap(),
            QuestionStrategy::Comprehensive
        );
        assert_eq!(
            "expert".parse::<QuestionStrategy>().unwrap(),
            QuestionStrategy::Expert
        );
        assert!("socratic".parse::<QuestionStrategy>().is_err());
    }

    #[test]
    fn parse_accepts_json_array() {
        let content = r#"[
            {"question": "What shaped the Defiance Campaign?", "category": "historical", "complexity": "intermediate", "focus_area": "resistance"},
            {"question": "How is ubuntu practiced today?"}
        ]"#;
        let questions = parse_questions(content).expect("parse");
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].category, "historical");
        // Missing optional fields default to empty.
        assert_eq!(questions[1].complexity, "");
    }

    #[test]
    fn parse_rejects_non_arrays() {
        assert!(parse_questions("not json").is_none());
        assert!(parse_questions(r#"{"question": "single object"}"#).is_none());
        assert!(parse_questions("[]").is_none());
    }

    #[test]
    fn extraction_salvages_fragments_and_bare_questions() {
        let text = r#"
Here are your questions:
  {"question": "What did the long walk teach about patience and resolve?"},
How should a movement balance principle with negotiation?
short?
no question mark on this line
"#;
        let questions = extract_questions(text, "leadership", 10);
        assert_eq!(questions.len(), 2);
        assert_eq!(
            questions[0].question,
            "What did the long walk teach about patience and resolve?"
        );
        assert_eq!(
            questions[1].question,
            "How should a movement balance principle with negotiation?"
        );
        assert_eq!(questions[0].category, "extracted");
        assert_eq!(questions[0].focus_area, "leadership");
    }

    #[test]
    fn extraction_honors_the_cap() {
        let text = "Is this one?\nIs this another one?\nIs this a third one?\n";
        let questions = extract_questions(text, "anything", 2);
        assert_eq!(questions.len(), 2);
    }

    #[test]
    fn fallback_cycles_templates() {
        let questions = fallback_questions("ubuntu", 12);
        assert_eq!(questions.len(), 12);
        assert_eq!(questions[0].question, "What are the key principles of ubuntu?");
        // Wraps around after the ten templates.
        assert_eq!(questions[10].question, questions[0].question);
        assert!(questions.iter().all(|q| q.category == "fallback"));
    }

    #[test]
    fn dedup_is_case_insensitive_and_keeps_first() {
        let questions = vec![
            GeneratedQuestion {
                question: "What is Ubuntu?".into(),
                category: "a".into(),
                complexity: String::new(),
                focus_area: String::new(),
                topic: None,
                generation_type: None,
                batch: None,
                timestamp: None,
            },
            GeneratedQuestion {
                question: "  what is ubuntu?  ".into(),
                category: "b".into(),
                complexity: String::new(),
                focus_area: String::new(),
                topic: None,
                generation_type: None,
                batch: None,
                timestamp: None,
            },
            GeneratedQuestion {
                question: "What is reconciliation?".into(),
                category: "c".into(),
                complexity: String::new(),
                focus_area: String::new(),
                topic: None,
                generation_type: None,
                batch: None,
                timestamp: None,
            },
        ];

        let unique = dedup_questions(questions);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].category, "a");
    }

    #[tokio::test]
    async fn end_to_end_generation_stamps_metadata_and_checkpoints() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content":
                    "[{\"question\": \"What are the deep roots of servant leadership?\", \"category\": \"philosophy\", \"complexity\": \"advanced\", \"focus_area\": \"leadership\"}]"
                }}]
            })))
            .mount(&server)
            .await;

        let completion_config = CompletionConfig {
            base_url: server.uri(),
            ..CompletionConfig::default()
        };
        let client = CompletionClient::new(&completion_config, "k".into()).expect("client");

        let dir = tempfile::tempdir().expect("tempdir");
        let output_path = dir.path().join("leadership_questions.jsonl");
        let config = GeneratorConfig {
            topic: "leadership".into(),
            strategies: vec![QuestionStrategy::Comprehensive, QuestionStrategy::Expert],
            target_count: 2,
            batch_size: 1,
            output_path: output_path.clone(),
            batch_delay: Duration::ZERO,
        };

        let outcome = generate_dataset(
            &config,
            &client,
            Arc::new(AtomicBool::new(false)),
            &SilentProgress,
        )
        .await
        .expect("generate");

        assert_eq!(outcome.status, RunStatus::Completed);
        // Both strategies returned the same question text; dedup keeps one.
        assert_eq!(outcome.questions.len(), 1);
        assert_eq!(outcome.duplicates_removed, 1);

        let question = &outcome.questions[0];
        assert_eq!(question.topic.as_deref(), Some("leadership"));
        assert_eq!(question.generation_type.as_deref(), Some("comprehensive"));
        assert_eq!(question.batch, Some(0));
        assert!(question.timestamp.is_some());

        // The per-batch checkpoint exists alongside the final output.
        assert!(output_path.exists());
        assert!(checkpoint(&output_path, "temp").exists());
    }
}
