//! Timing statistics over a produced answers file.
//!
//! Pure functions over parsed [`AnswerRecord`]s: the CLI loads the JSONL
//! file and renders the report. Relies on the runner's invariant that
//! timestamps are non-decreasing within a single run's output.

use chrono::{DateTime, Utc};

use answerforge_shared::{AnswerRecord, QuestionId};

/// Interval histogram buckets, in minutes.
const BUCKETS: [(f64, f64, &str); 6] = [
    (0.0, 0.5, "0-30 seconds"),
    (0.5, 1.0, "30-60 seconds"),
    (1.0, 2.0, "1-2 minutes"),
    (2.0, 5.0, "2-5 minutes"),
    (5.0, 10.0, "5-10 minutes"),
    (10.0, f64::INFINITY, "10+ minutes"),
];

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// One histogram bucket of the interval distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalBucket {
    pub label: &'static str,
    pub count: usize,
    pub percentage: f64,
}

/// An interval singled out by the analysis, with the flanking question ids.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalExtreme {
    pub minutes: f64,
    pub from_id: QuestionId,
    pub to_id: QuestionId,
}

/// Descriptive statistics over the gaps between consecutive answers.
#[derive(Debug, Clone)]
pub struct TimingReport {
    pub answer_count: usize,
    pub interval_count: usize,
    pub mean_minutes: f64,
    pub median_minutes: f64,
    pub min_minutes: f64,
    pub max_minutes: f64,
    pub total_span_hours: f64,
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
    pub distribution: Vec<IntervalBucket>,
    pub longest: IntervalExtreme,
    pub shortest: IntervalExtreme,
    /// Intervals longer than twice the median.
    pub long_gaps: Vec<IntervalExtreme>,
    /// Rough per-answer wall-clock estimate from the total span.
    pub estimated_minutes_per_answer: f64,
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Compute timing statistics. Returns `None` with fewer than two answers,
/// since there are no intervals to analyze.
pub fn analyze(answers: &[AnswerRecord]) -> Option<TimingReport> {
    if answers.len() < 2 {
        return None;
    }

    let timestamps: Vec<i64> = answers.iter().map(|a| a.timestamp).collect();
    let ids: Vec<&QuestionId> = answers.iter().map(|a| &a.question_id).collect();

    let intervals_minutes: Vec<f64> = timestamps
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64 / 60.0)
        .collect();

    let mean = intervals_minutes.iter().sum::<f64>() / intervals_minutes.len() as f64;
    let median = median_of(&intervals_minutes);
    let (min_idx, min) = extreme_of(&intervals_minutes, |a, b| a < b);
    let (max_idx, max) = extreme_of(&intervals_minutes, |a, b| a > b);

    let distribution = BUCKETS
        .iter()
        .map(|&(lo, hi, label)| {
            let count = intervals_minutes
                .iter()
                .filter(|&&m| m >= lo && m < hi)
                .count();
            IntervalBucket {
                label,
                count,
                percentage: count as f64 / intervals_minutes.len() as f64 * 100.0,
            }
        })
        .collect();

    let extreme = |idx: usize, minutes: f64| IntervalExtreme {
        minutes,
        from_id: ids[idx].clone(),
        to_id: ids[idx + 1].clone(),
    };

    let long_gaps = intervals_minutes
        .iter()
        .enumerate()
        .filter(|&(_, &m)| m > 2.0 * median)
        .map(|(idx, &m)| extreme(idx, m))
        .collect();

    let total_span_minutes = (timestamps[timestamps.len() - 1] - timestamps[0]) as f64 / 60.0;

    Some(TimingReport {
        answer_count: answers.len(),
        interval_count: intervals_minutes.len(),
        mean_minutes: mean,
        median_minutes: median,
        min_minutes: min,
        max_minutes: max,
        total_span_hours: total_span_minutes / 60.0,
        first: DateTime::from_timestamp(timestamps[0], 0)?,
        last: DateTime::from_timestamp(timestamps[timestamps.len() - 1], 0)?,
        distribution,
        longest: extreme(max_idx, max),
        shortest: extreme(min_idx, min),
        long_gaps,
        estimated_minutes_per_answer: total_span_minutes / answers.len() as f64,
    })
}

fn median_of(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn extreme_of(values: &[f64], better: fn(f64, f64) -> bool) -> (usize, f64) {
    let mut best_idx = 0;
    let mut best = values[0];
    for (idx, &value) in values.iter().enumerate().skip(1) {
        if better(value, best) {
            best_idx = idx;
            best = value;
        }
    }
    (best_idx, best)
}
