//! Pure aggregate metrics over progress records and submissions.

use std::collections::BTreeMap;
use labman_core::{LabSubmission, Progress, ProgressStatus, SubmissionStatus};
use serde::{Deserialize, Serialize};

/// Total plus per-key counts, built in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tally<K: Ord> {
    /// Number of items seen
    pub total: usize,

    /// Items per key
    pub counts: BTreeMap<K, usize>,
}

impl<K: Ord> Tally<K> {
    /// Count for one key, 0 when never seen.
    pub fn get(&self, key: &K) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }
}

impl<K: Ord> Default for Tally<K> {
    fn default() -> Self {
        Self {
            total: 0,
            counts: BTreeMap::new(),
        }
    }
}

/// Count items by the key `key_fn` assigns them.
pub fn tally<T, K: Ord>(items: impl IntoIterator<Item = T>, key_fn: impl Fn(&T) -> K) -> Tally<K> {
    let mut result = Tally::default();
    for item in items {
        result.total += 1;
        *result.counts.entry(key_fn(&item)).or_insert(0) += 1;
    }
    result
}

/// Number of items matching a predicate.
pub fn count_where<T>(items: &[T], predicate: impl Fn(&T) -> bool) -> usize {
    items.iter().filter(|item| predicate(item)).count()
}

/// Percentage of records that are COMPLETED; 0 for no records.
pub fn completion_rate(progress: &[Progress]) -> f64 {
    if progress.is_empty() {
        return 0.0;
    }
    let completed = count_where(progress, |p| p.status == ProgressStatus::Completed);
    completed as f64 / progress.len() as f64 * 100.0
}

/// Mean grade over graded submissions; 0 when none are graded.
pub fn average_grade(submissions: &[LabSubmission]) -> f64 {
    let grades: Vec<f64> = submissions.iter().filter_map(|s| s.grade).collect();
    if grades.is_empty() {
        return 0.0;
    }
    grades.iter().sum::<f64>() / grades.len() as f64
}

/// Whether a submission was handed in after its due date.
pub fn is_late(submission: &LabSubmission) -> bool {
    match (submission.submitted_at, submission.due_date) {
        (Some(submitted), Some(due)) => submitted > due,
        _ => false,
    }
}

/// Most recently handed-in submission; equal times go to the higher attempt.
///
/// Drafts sort before anything handed in.
pub fn latest_submission(submissions: &[LabSubmission]) -> Option<&LabSubmission> {
    submissions.iter().max_by_key(|s| (s.submitted_at, s.attempt))
}

/// Progress aggregates for a set of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressStats {
    /// Records per status
    pub by_status: Tally<ProgressStatus>,

    /// Share of COMPLETED records, in percent
    pub completion_rate: f64,

    /// Mean `percent_complete`
    pub average_percent: f64,
}

impl ProgressStats {
    /// Aggregate a record set.
    pub fn compute(progress: &[Progress]) -> Self {
        let average_percent = if progress.is_empty() {
            0.0
        } else {
            progress.iter().map(|p| p.percent_complete as f64).sum::<f64>() / progress.len() as f64
        };

        Self {
            by_status: tally(progress, |p| p.status),
            completion_rate: completion_rate(progress),
            average_percent,
        }
    }

    /// Number of records.
    pub fn total(&self) -> usize {
        self.by_status.total
    }
}

/// Average / extremes of the graded scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    /// Mean grade
    pub average: f64,
    /// Highest grade
    pub max: f64,
    /// Lowest grade
    pub min: f64,
}

/// One 10-point band of the grade distribution, in percent of the lab maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    /// Band label, e.g. `"80-89"`
    pub range: String,
    /// Graded submissions in the band
    pub count: usize,
}

/// Submission aggregates for a set of submissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionStats {
    /// Submissions per status
    pub by_status: Tally<SubmissionStatus>,

    /// Handed in after the due date, graded or not
    pub late_count: usize,

    /// Carrying a grade
    pub graded_count: usize,

    /// Mean grade, 0 when nothing is graded
    pub average_grade: f64,

    /// Score extremes, absent when nothing is graded
    pub score_stats: Option<ScoreStats>,

    /// Ten bands from `0-9` to `90-100`
    pub score_distribution: Vec<ScoreRange>,
}

impl SubmissionStats {
    /// Aggregate submissions; `max_grade_of` gives each submission's lab maximum.
    pub fn compute(submissions: &[LabSubmission], max_grade_of: impl Fn(&LabSubmission) -> f64) -> Self {
        let grades: Vec<f64> = submissions.iter().filter_map(|s| s.grade).collect();

        let score_stats = (!grades.is_empty()).then(|| ScoreStats {
            average: average_grade(submissions),
            max: grades.iter().copied().fold(f64::MIN, f64::max),
            min: grades.iter().copied().fold(f64::MAX, f64::min),
        });

        let mut buckets = [0usize; 10];
        for s in submissions {
            if let Some(grade) = s.grade {
                let max = max_grade_of(s);
                let pct = if max > 0.0 { grade / max * 100.0 } else { 0.0 };
                let idx = ((pct / 10.0).floor().max(0.0) as usize).min(9);
                buckets[idx] += 1;
            }
        }
        let score_distribution = buckets
            .iter()
            .enumerate()
            .map(|(i, &count)| ScoreRange {
                range: if i == 9 {
                    "90-100".to_string()
                } else {
                    format!("{}-{}", i * 10, i * 10 + 9)
                },
                count,
            })
            .collect();

        Self {
            by_status: tally(submissions, |s| s.status),
            late_count: count_where(submissions, is_late),
            graded_count: grades.len(),
            average_grade: average_grade(submissions),
            score_stats,
            score_distribution,
        }
    }

    /// Number of submissions.
    pub fn total(&self) -> usize {
        self.by_status.total
    }
}
