//! Core domain types for AnswerForge batch runs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The origin tag stamped on snippets fetched through Google Custom Search.
pub const GOOGLE_CSE_ORIGIN: &str = "google_cse";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for batch-run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// QuestionId / QuestionRecord
// ---------------------------------------------------------------------------

/// Identifier of a question within its source dataset.
///
/// Tabular, array, and line datasets index by position; JSON map datasets
/// key by entry name. Serialized untagged so row ids appear as JSON numbers
/// and key ids as strings in the output files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionId {
    Row(usize),
    Key(String),
}

impl std::fmt::Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Row(idx) => write!(f, "{idx}"),
            Self::Key(key) => write!(f, "{key}"),
        }
    }
}

impl From<usize> for QuestionId {
    fn from(idx: usize) -> Self {
        Self::Row(idx)
    }
}

impl From<String> for QuestionId {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

/// A single question produced by the dataset loader.
///
/// The loader trims text but does not filter by length; dropping questions
/// below the minimum length is the batch runner's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: QuestionId,
    pub text: String,
}

// ---------------------------------------------------------------------------
// SearchSnippet
// ---------------------------------------------------------------------------

/// One web-search result embedded into an answer record.
///
/// Wire names (`snippet`, `url`, `source`) are stable with the output format
/// consumed by downstream tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSnippet {
    pub title: String,
    #[serde(rename = "snippet")]
    pub excerpt: String,
    #[serde(rename = "url")]
    pub source_url: String,
    #[serde(rename = "source")]
    pub origin: String,
}

// ---------------------------------------------------------------------------
// AnswerRecord
// ---------------------------------------------------------------------------

/// One line of the output JSONL file.
///
/// Field names are stable: the timing and cleaning commands parse these
/// exact keys back out of produced files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    pub answer: String,
    /// Persona display name.
    pub character: String,
    /// Persona lookup key.
    pub roleplay_character: String,
    #[serde(default)]
    pub search_results: Vec<SearchSnippet>,
    /// Epoch seconds, assigned once when synthesis finished. Non-decreasing
    /// across a single uninterrupted run.
    pub timestamp: i64,
    pub model: String,
    pub question_id: QuestionId,
    /// `true` only when synthesis failed and `answer` holds an error
    /// description; omitted from serialized output otherwise.
    #[serde(default, skip_serializing_if = "is_false")]
    pub error: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(error: bool) -> AnswerRecord {
        AnswerRecord {
            question: "What is ubuntu?".into(),
            answer: "I am because we are.".into(),
            character: "Nelson Mandela".into(),
            roleplay_character: "mandela".into(),
            search_results: vec![SearchSnippet {
                title: "Ubuntu philosophy".into(),
                excerpt: "A Nguni Bantu term...".into(),
                source_url: "https://example.com/ubuntu".into(),
                origin: GOOGLE_CSE_ORIGIN.into(),
            }],
            timestamp: 1_700_000_000,
            model: "qwen-plus".into(),
            question_id: QuestionId::Row(3),
            error,
        }
    }

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let s = id.to_string();
        let parsed: RunId = s.parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn question_id_serializes_untagged() {
        let row = serde_json::to_string(&QuestionId::Row(7)).expect("serialize");
        assert_eq!(row, "7");
        let key = serde_json::to_string(&QuestionId::Key("q1".into())).expect("serialize");
        assert_eq!(key, "\"q1\"");

        let parsed: QuestionId = serde_json::from_str("7").expect("deserialize");
        assert_eq!(parsed, QuestionId::Row(7));
        let parsed: QuestionId = serde_json::from_str("\"q1\"").expect("deserialize");
        assert_eq!(parsed, QuestionId::Key("q1".into()));
    }

    #[test]
    fn answer_record_wire_names() {
        let json = serde_json::to_value(sample_record(false)).expect("serialize");
        let obj = json.as_object().expect("object");

        for key in [
            "question",
            "answer",
            "character",
            "roleplay_character",
            "search_results",
            "timestamp",
            "model",
            "question_id",
        ] {
            assert!(obj.contains_key(key), "missing field {key}");
        }
        assert!(!obj.contains_key("error"), "error must be omitted on success");

        let snippet = &json["search_results"][0];
        assert_eq!(snippet["snippet"], "A Nguni Bantu term...");
        assert_eq!(snippet["url"], "https://example.com/ubuntu");
        assert_eq!(snippet["source"], "google_cse");
    }

    #[test]
    fn answer_record_error_flag_present_when_true() {
        let json = serde_json::to_value(sample_record(true)).expect("serialize");
        assert_eq!(json["error"], true);
    }

    #[test]
    fn answer_record_roundtrip() {
        let record = sample_record(false);
        let line = serde_json::to_string(&record).expect("serialize");
        let parsed: AnswerRecord = serde_json::from_str(&line).expect("deserialize");
        assert_eq!(parsed.question_id, QuestionId::Row(3));
        assert_eq!(parsed.search_results.len(), 1);
        assert!(!parsed.error);
    }
}
