//! Dataset loading: normalizes heterogeneous question files into an ordered
//! sequence of [`QuestionRecord`]s.
//!
//! Format dispatch is by file extension, resolved once into a closed
//! [`DatasetFormat`] variant:
//! - `csv`: delimited rows with a header; the question column is the first
//!   match from a fixed priority list
//! - `json`: a single parsed value, either an array or a map
//! - `txt`: one question per non-blank line
//!
//! The loader trims text and preserves source order. It does not filter by
//! length; that is the batch runner's job.

use std::path::Path;

use tracing::{debug, info, instrument};

use answerforge_shared::{AnswerForgeError, QuestionId, QuestionRecord, Result};

/// Column names recognized as holding question text, in priority order.
const QUESTION_COLUMNS: [&str; 6] = ["question", "Question", "text", "Text", "content", "Content"];

// ---------------------------------------------------------------------------
// DatasetFormat
// ---------------------------------------------------------------------------

/// The three supported input shapes, resolved once from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    /// Delimited rows with a header (`.csv`).
    Tabular,
    /// A single JSON value: array of records or map of key → question (`.json`).
    Records,
    /// One question per non-blank line (`.txt`).
    Lines,
}

impl DatasetFormat {
    /// Resolve the format from a path's extension (ASCII case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match ext.as_str() {
            "csv" => Ok(Self::Tabular),
            "json" => Ok(Self::Records),
            "txt" => Ok(Self::Lines),
            _ => Err(AnswerForgeError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a dataset file into an ordered sequence of question records.
///
/// Fails fast with [`AnswerForgeError::DatasetNotFound`],
/// [`AnswerForgeError::UnsupportedFormat`], or
/// [`AnswerForgeError::NoQuestionColumn`] before any processing begins;
/// no side effects beyond reading the file.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load(path: &Path) -> Result<Vec<QuestionRecord>> {
    if !path.exists() {
        return Err(AnswerForgeError::DatasetNotFound {
            path: path.to_path_buf(),
        });
    }

    let format = DatasetFormat::from_path(path)?;
    let records = match format {
        DatasetFormat::Tabular => load_tabular(path)?,
        DatasetFormat::Records => load_records(path)?,
        DatasetFormat::Lines => load_lines(path)?,
    };

    info!(count = records.len(), ?format, "dataset loaded");
    Ok(records)
}

/// Load a CSV dataset: `id` is the zero-based data-row index.
fn load_tabular(path: &Path) -> Result<Vec<QuestionRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| AnswerForgeError::parse(format!("{}: {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| AnswerForgeError::parse(format!("{}: {e}", path.display())))?
        .clone();

    let column = QUESTION_COLUMNS
        .iter()
        .find_map(|name| headers.iter().position(|h| h == *name))
        .ok_or_else(|| AnswerForgeError::NoQuestionColumn {
            path: path.to_path_buf(),
        })?;

    debug!(column = headers.get(column), "question column selected");

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row.map_err(|e| AnswerForgeError::parse(format!("{}: {e}", path.display())))?;
        let text = row.get(column).unwrap_or_default().trim().to_string();
        records.push(QuestionRecord {
            id: QuestionId::Row(idx),
            text,
        });
    }

    Ok(records)
}

/// Load a JSON dataset: an array yields positional ids, a map yields key ids.
fn load_records(path: &Path) -> Result<Vec<QuestionRecord>> {
    let content =
        std::fs::read_to_string(path).map_err(|e| AnswerForgeError::io(path, e))?;

    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| AnswerForgeError::parse(format!("{}: {e}", path.display())))?;

    match value {
        serde_json::Value::Array(items) => Ok(items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| {
                let text = match item.get("question") {
                    Some(question) => stringify(question),
                    None => stringify(&item),
                };
                QuestionRecord {
                    id: QuestionId::Row(idx),
                    text,
                }
            })
            .collect()),
        serde_json::Value::Object(entries) => Ok(entries
            .into_iter()
            .map(|(key, item)| QuestionRecord {
                id: QuestionId::Key(key),
                text: stringify(&item),
            })
            .collect()),
        _ => Err(AnswerForgeError::parse(format!(
            "{}: expected a JSON array or object at the top level",
            path.display()
        ))),
    }
}

/// Load a line-oriented dataset: `id` is the zero-based index among
/// non-blank lines in encounter order.
fn load_lines(path: &Path) -> Result<Vec<QuestionRecord>> {
    let content =
        std::fs::read_to_string(path).map_err(|e| AnswerForgeError::io(path, e))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(idx, line)| QuestionRecord {
            id: QuestionId::Row(idx),
            text: line.to_string(),
        })
        .collect())
}

/// Coerce a JSON value to question text: strings verbatim (no surrounding
/// quotes), everything else via its JSON rendering.
fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}
