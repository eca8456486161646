//! JSONL persistence for answer and question records.
//!
//! All flush triggers (periodic checkpoint, final, interrupt) funnel through
//! the same write operation: whole-file overwrite, one JSON record per line,
//! parent directories created on demand.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use answerforge_shared::{AnswerForgeError, AnswerRecord, Result};

/// Serialize records to `path` as JSON lines, overwriting any existing file.
pub fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| AnswerForgeError::io(parent, e))?;
        }
    }

    let mut buf = String::new();
    for record in records {
        let line = serde_json::to_string(record).map_err(|e| AnswerForgeError::parse(e.to_string()))?;
        buf.push_str(&line);
        buf.push('\n');
    }

    std::fs::write(path, buf).map_err(|e| AnswerForgeError::io(path, e))?;
    info!(count = records.len(), path = %path.display(), "records written");
    Ok(())
}

/// Read an answers JSONL file, skipping malformed lines with a warning.
pub fn read_answers(path: &Path) -> Result<Vec<AnswerRecord>> {
    let content = std::fs::read_to_string(path).map_err(|e| AnswerForgeError::io(path, e))?;

    let mut answers = Vec::new();
    let mut skipped = 0usize;

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<AnswerRecord>(line) {
            Ok(answer) => answers.push(answer),
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "skipping malformed line");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        info!(kept = answers.len(), skipped, "answers file read with skips");
    }
    Ok(answers)
}

// ---------------------------------------------------------------------------
// Q/A pair extraction (`clean` command)
// ---------------------------------------------------------------------------

/// Counts from a [`extract_qa_pairs`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanSummary {
    /// Lines reduced to a question/answer pair.
    pub kept: usize,
    /// Lines missing either field, or unparseable.
    pub skipped: usize,
}

/// Reduce an answers file to bare `{question, answer}` pairs.
///
/// Tolerant of heterogeneous input: lines are handled as raw JSON objects,
/// so files produced by older runs (or by hand) clean the same way.
pub fn extract_qa_pairs(input: &Path, output: &Path) -> Result<CleanSummary> {
    let content = std::fs::read_to_string(input).map_err(|e| AnswerForgeError::io(input, e))?;

    let mut pairs: Vec<serde_json::Value> = Vec::new();
    let mut skipped = 0usize;

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "skipping malformed line");
                skipped += 1;
                continue;
            }
        };

        match (value.get("question"), value.get("answer")) {
            (Some(question), Some(answer)) => {
                pairs.push(serde_json::json!({
                    "question": question,
                    "answer": answer,
                }));
            }
            _ => {
                warn!(line = line_no + 1, "line missing question or answer field");
                skipped += 1;
            }
        }
    }

    write_jsonl(output, &pairs)?;

    Ok(CleanSummary {
        kept: pairs.len(),
        skipped,
    })
}
