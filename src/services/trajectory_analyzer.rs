//! Trajectory analyzer.
//!
//! Splits the scored trajectories of one label into performance cohorts,
//! runs the heuristic registry over them and curates a small, diverse set of
//! example sessions.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AnalysisResult, CohortKind, CuratedExample, Finding, Trajectory, DEFAULT_MAX_EXAMPLES,
};
use crate::domain::ports::TrajectoryRepository;
use crate::services::heuristics::{registry, Cohort};

/// Task prompts more similar than this are treated as duplicates during curation.
pub const SIMILARITY_THRESHOLD: f64 = 0.6;
/// Tokens shorter than this are ignored when comparing task prompts.
pub const MIN_TOKEN_LEN: usize = 3;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "to", "in", "for", "of", "on", "with", "this", "that", "is", "are",
];

/// Anti-pattern keywords and the practice each one recommends.
const RECOMMENDATION_RULES: &[(&[&str], &str)] = &[
    (&["research", "read"], "Read all available context before starting work"),
    (&["revision", "review"], "Always review and revise output before finalizing"),
    (&["tool"], "Use multiple tools (search, read, validate) for thorough analysis"),
    (&["rushed", "steps"], "Take time for thorough analysis - avoid rushing"),
    (&["checkpoint"], "Save progress incrementally with checkpoints"),
];

pub struct TrajectoryAnalyzer<R: TrajectoryRepository> {
    repository: Arc<R>,
}

impl<R: TrajectoryRepository> TrajectoryAnalyzer<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Analyze every scored trajectory tagged `label`.
    pub async fn analyze(&self, label: &str, min_samples: usize) -> DomainResult<AnalysisResult> {
        self.analyze_with_limit(label, min_samples, DEFAULT_MAX_EXAMPLES).await
    }

    /// Like [`analyze`](Self::analyze), curating at most `max_examples` positive examples.
    #[instrument(skip(self))]
    pub async fn analyze_with_limit(
        &self,
        label: &str,
        min_samples: usize,
        max_examples: usize,
    ) -> DomainResult<AnalysisResult> {
        let trajectories = self.repository.list_by_tag(label).await?;
        analyze_trajectories(label, &trajectories, min_samples, max_examples)
    }
}

/// Analyze an in-memory set of trajectories.
///
/// Trajectories without the label or without an outcome are ignored.
pub fn analyze_trajectories(
    label: &str,
    trajectories: &[Trajectory],
    min_samples: usize,
    max_examples: usize,
) -> DomainResult<AnalysisResult> {
    let scored: Vec<&Trajectory> = trajectories
        .iter()
        .filter(|t| t.has_tag(label) && t.outcome.is_some())
        .collect();

    if scored.len() < min_samples {
        return Err(DomainError::InsufficientData {
            label: label.to_string(),
            have: scored.len(),
            need: min_samples,
        });
    }

    let bucket = |kind: CohortKind| -> Vec<&Trajectory> {
        scored
            .iter()
            .copied()
            .filter(|t| t.score_value().map(CohortKind::for_score) == Some(kind))
            .collect()
    };
    let high = Cohort::new(bucket(CohortKind::High));
    let medium_count = bucket(CohortKind::Medium).len();
    let low = Cohort::new(bucket(CohortKind::Low));

    let patterns: Vec<Finding> = if high.is_empty() {
        Vec::new()
    } else {
        registry().iter().filter_map(|h| (h.pattern)(&high)).collect()
    };

    let anti_patterns: Vec<Finding> = if high.is_empty() || low.is_empty() {
        Vec::new()
    } else {
        registry().iter().filter_map(|h| (h.anti_pattern)(&low, &high)).collect()
    };

    debug!(
        label,
        high = high.len(),
        medium = medium_count,
        low = low.len(),
        patterns = patterns.len(),
        anti_patterns = anti_patterns.len(),
        "cohorts analyzed"
    );

    let recommendations = synthesize_recommendations(&patterns, &anti_patterns);
    let examples = curate_examples(&high, &low, max_examples);

    Ok(AnalysisResult {
        label: label.to_string(),
        total_sessions: scored.len(),
        high_score_sessions: high.len(),
        medium_score_sessions: medium_count,
        low_score_sessions: low.len(),
        high_score_mean: high.mean_score(),
        low_score_mean: low.mean_score(),
        patterns,
        anti_patterns,
        recommendations,
        examples,
    })
}

/// Patterns first, then the practice each anti-pattern points at, without duplicates.
fn synthesize_recommendations(patterns: &[Finding], anti_patterns: &[Finding]) -> Vec<String> {
    let mut recommendations: Vec<String> = patterns.iter().map(|f| f.statement.clone()).collect();

    for anti in anti_patterns {
        let statement = anti.statement.to_lowercase();
        for (keywords, practice) in RECOMMENDATION_RULES {
            if keywords.iter().any(|k| statement.contains(k)) {
                recommendations.push((*practice).to_string());
            }
        }
    }

    let mut seen = HashSet::new();
    recommendations.retain(|r| seen.insert(r.clone()));
    recommendations
}

fn score_of(t: &Trajectory) -> f64 {
    t.score_value().unwrap_or_default()
}

/// Best first; equal scores fall back to id so curation is deterministic.
fn by_score_desc(a: &&Trajectory, b: &&Trajectory) -> Ordering {
    score_of(b).total_cmp(&score_of(a)).then_with(|| a.id.cmp(&b.id))
}

fn curate_examples(high: &Cohort<'_>, low: &Cohort<'_>, max_examples: usize) -> Vec<CuratedExample> {
    let mut ranked = high.sessions().to_vec();
    ranked.sort_by(by_score_desc);

    let mut examples: Vec<CuratedExample> = select_diverse(&ranked, max_examples)
        .into_iter()
        .map(|t| curated(t, true))
        .collect();

    let mut worst = low.sessions().to_vec();
    worst.sort_by(|a, b| by_score_desc(b, a));
    if let Some(negative) = worst.into_iter().find(|t| t.summary_text().is_some()) {
        examples.push(curated(negative, false));
    }

    examples
}

/// Pick up to `n` sessions from `ranked`, preferring ones with summaries whose
/// task prompts are dissimilar to everything already picked, then backfilling
/// with the best remaining scorers.
fn select_diverse<'a>(ranked: &[&'a Trajectory], n: usize) -> Vec<&'a Trajectory> {
    if ranked.len() <= n {
        return ranked.to_vec();
    }

    let tokens: Vec<HashSet<String>> = ranked.iter().map(|t| tokenize(&t.task_prompt)).collect();
    let mut picked: Vec<usize> = Vec::with_capacity(n);

    for (i, candidate) in ranked.iter().enumerate() {
        if picked.len() >= n {
            break;
        }
        let diverse = picked
            .iter()
            .all(|&j| jaccard_similarity(&tokens[i], &tokens[j]) <= SIMILARITY_THRESHOLD);
        if diverse && candidate.summary_text().is_some() {
            picked.push(i);
        }
    }

    for i in 0..ranked.len() {
        if picked.len() >= n {
            break;
        }
        if !picked.contains(&i) {
            picked.push(i);
        }
    }

    picked.into_iter().map(|i| ranked[i]).collect()
}

fn curated(t: &Trajectory, positive: bool) -> CuratedExample {
    let score = score_of(t);
    let reason = if positive {
        format!(
            "High-scoring session ({:.0}%) with {} steps demonstrating thorough approach",
            score * 100.0,
            t.steps.len()
        )
    } else {
        format!("Low-scoring session ({:.0}%) showing common pitfalls to avoid", score * 100.0)
    };

    CuratedExample {
        trajectory_id: t.id.clone(),
        task_prompt: t.task_prompt.clone(),
        summary: t.summary.clone().unwrap_or_default(),
        score,
        notes: t.outcome.as_ref().map(|o| o.notes.clone()).unwrap_or_default(),
        step_count: t.steps.len(),
        positive,
        reason,
    }
}

/// Lowercased alphanumeric words, minus stop words and short tokens.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .filter(|w| w.len() >= MIN_TOKEN_LEN && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Jaccard index of two token sets. Two empty sets are identical.
#[allow(clippy::cast_precision_loss)]
pub fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => {
            let intersection = a.intersection(b).count();
            let union = a.union(b).count();
            intersection as f64 / union as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TrajectoryStep;

    fn scored(id: &str, prompt: &str, score: f64, summary: Option<&str>) -> Trajectory {
        let mut t = Trajectory::new(id, prompt)
            .with_tag("writing")
            .with_steps(vec![TrajectoryStep::new("Read", "a.md"), TrajectoryStep::new("Write", "b.md")]);
        t.summary = summary.map(str::to_string);
        t.score(score, format!("notes for {id}"));
        t
    }

    #[test]
    fn test_tokenize_filters_stop_words_and_short_tokens() {
        let tokens = tokenize("Write the API guide for v2 of THE parser-engine, is it ok?");
        let mut sorted: Vec<_> = tokens.into_iter().collect();
        sorted.sort();
        assert_eq!(sorted, vec!["api", "engine", "guide", "parser", "write"]);
    }

    #[test]
    fn test_jaccard_edge_cases() {
        let empty = HashSet::new();
        let some = tokenize("parser guide");
        assert_eq!(jaccard_similarity(&empty, &empty), 1.0);
        assert_eq!(jaccard_similarity(&empty, &some), 0.0);
        assert_eq!(jaccard_similarity(&some, &some), 1.0);

        let other = tokenize("parser tests");
        assert!((jaccard_similarity(&some, &other) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_data_counts_only_scored_sessions() {
        let mut trajectories = vec![scored("a", "x", 0.9, None), scored("b", "x", 0.2, None)];
        trajectories.push(Trajectory::new("unscored", "x").with_tag("writing"));

        let err = analyze_trajectories("writing", &trajectories, 3, 3).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientData { have: 2, need: 3, .. }));
    }

    #[test]
    fn test_recommendations_deduplicate_by_text() {
        let anti = |statement: &str| Finding { heuristic: "x".into(), statement: statement.into(), statistic: 0.0 };
        let recs = synthesize_recommendations(
            &[],
            &[
                anti("No revision pass - submitted first draft without review"),
                anti("Skipped self-review of written output (0% vs 80% in successful sessions)"),
                anti("Limited tool usage (1.0 tools vs 4.0 in successful sessions)"),
            ],
        );
        assert_eq!(
            recs,
            vec![
                "Always review and revise output before finalizing".to_string(),
                "Use multiple tools (search, read, validate) for thorough analysis".to_string(),
            ]
        );
    }

    #[test]
    fn test_select_diverse_prefers_dissimilar_prompts() {
        let a = scored("a", "write parser documentation guide", 0.95, Some("did a"));
        let b = scored("b", "write parser documentation guide again", 0.90, Some("did b"));
        let c = scored("c", "benchmark storage engine", 0.90, Some("did c"));
        let d = scored("d", "refactor network client", 0.80, Some("did d"));
        let ranked = vec![&a, &b, &c, &d];

        let picked: Vec<_> = select_diverse(&ranked, 2).iter().map(|t| t.id.clone()).collect();
        assert_eq!(picked, vec!["a", "c"]);
    }

    #[test]
    fn test_select_diverse_backfills_with_top_scorers() {
        let a = scored("a", "same prompt words here", 0.95, Some("s"));
        let b = scored("b", "same prompt words here", 0.90, Some("s"));
        let c = scored("c", "same prompt words here", 0.85, None);
        let d = scored("d", "same prompt words here", 0.80, Some("s"));
        let ranked = vec![&a, &b, &c, &d];

        let picked: Vec<_> = select_diverse(&ranked, 3).iter().map(|t| t.id.clone()).collect();
        assert_eq!(picked, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_negative_example_is_lowest_with_summary() {
        let trajectories = vec![
            scored("h1", "alpha task", 0.9, Some("good")),
            scored("l1", "beta task", 0.1, None),
            scored("l2", "gamma task", 0.2, Some("bad")),
            scored("l3", "delta task", 0.3, Some("meh")),
        ];
        let result = analyze_trajectories("writing", &trajectories, 1, 3).unwrap();

        let negatives: Vec<_> = result.examples.iter().filter(|e| !e.positive).collect();
        assert_eq!(negatives.len(), 1);
        assert_eq!(negatives[0].trajectory_id, "l2");
        assert_eq!(negatives[0].reason, "Low-scoring session (20%) showing common pitfalls to avoid");
        assert_eq!(result.positive_examples().count(), 1);
    }
}
