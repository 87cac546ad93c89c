//! Behavioral heuristics mined from trajectory cohorts.
//!
//! Each heuristic is a named pair of pure functions: one decides whether the
//! high-scoring cohort shows a practice worth encoding, the other whether the
//! low-scoring cohort is meaningfully worse than the high one on the same
//! measure. The analyzer runs the whole [`registry`] in order.

use std::collections::{HashMap, HashSet};

use crate::domain::models::{ActionKind, Finding, Trajectory};

/// Research pattern: share of sessions that read before their first write.
pub const RESEARCH_MIN_RATIO: f64 = 0.6;
/// Research pattern: mean reads among sessions that researched first.
pub const RESEARCH_MIN_READS: f64 = 2.0;
/// Revision pattern: share of sessions that wrote a target more than once.
pub const REVISION_MIN_RATIO: f64 = 0.5;
/// Tool diversity pattern: mean distinct tools per session.
pub const DIVERSITY_MIN_TOOLS: f64 = 3.0;
/// Thoroughness pattern: mean steps per session.
pub const THOROUGHNESS_MIN_STEPS: f64 = 5.0;
/// Self-review pattern: share of sessions that read back their own output.
pub const SELF_REVIEW_MIN_RATIO: f64 = 0.3;
/// Checkpoint pattern: share of sessions whose writes are interleaved.
pub const CHECKPOINT_MIN_RATIO: f64 = 0.4;

/// How many fewer reads the low cohort must average to count as under-researched.
pub const RESEARCH_READS_MARGIN: f64 = 1.0;
/// How far below the high cohort a low-cohort ratio must fall.
pub const RATIO_MARGIN: f64 = 0.2;
/// How many fewer distinct tools the low cohort must average.
pub const DIVERSITY_MARGIN: f64 = 1.0;
/// The low cohort is rushed below this fraction of the high cohort's steps.
pub const RUSHED_STEP_FRACTION: f64 = 0.5;

/// Per-session measures shared by every heuristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetrics {
    pub reads_before_first_write: usize,
    pub revised: bool,
    pub distinct_tools: usize,
    pub steps: usize,
    pub self_reviewed: bool,
    pub checkpointed: bool,
}

impl SessionMetrics {
    pub fn measure(trajectory: &Trajectory) -> Self {
        let steps = &trajectory.steps;

        let reads_before_first_write = steps
            .iter()
            .take_while(|s| s.kind() != ActionKind::Write)
            .filter(|s| s.kind() == ActionKind::Read)
            .count();

        let mut writes_per_target: HashMap<&str, usize> = HashMap::new();
        let mut written: HashSet<&str> = HashSet::new();
        let mut self_reviewed = false;
        let mut write_indices = Vec::new();

        for (index, step) in steps.iter().enumerate() {
            match step.kind() {
                ActionKind::Write => {
                    *writes_per_target.entry(step.target()).or_default() += 1;
                    written.insert(step.target());
                    write_indices.push(index);
                }
                ActionKind::Read => {
                    if written.contains(step.target()) {
                        self_reviewed = true;
                    }
                }
                ActionKind::Other => {}
            }
        }

        let distinct_tools = steps.iter().map(|s| s.tool_name.as_str()).collect::<HashSet<_>>().len();

        Self {
            reads_before_first_write,
            revised: writes_per_target.values().any(|&count| count > 1),
            distinct_tools,
            steps: steps.len(),
            self_reviewed,
            checkpointed: write_indices.windows(2).any(|w| w[1] - w[0] > 1),
        }
    }
}

/// A set of trajectories in one score bucket, with their measures.
#[derive(Debug, Clone)]
pub struct Cohort<'a> {
    sessions: Vec<&'a Trajectory>,
    metrics: Vec<SessionMetrics>,
}

impl<'a> Cohort<'a> {
    pub fn new(sessions: Vec<&'a Trajectory>) -> Self {
        let metrics = sessions.iter().map(|t| SessionMetrics::measure(t)).collect();
        Self { sessions, metrics }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn sessions(&self) -> &[&'a Trajectory] {
        &self.sessions
    }

    /// Mean outcome score, zero for an empty cohort.
    pub fn mean_score(&self) -> f64 {
        mean(self.sessions.iter().filter_map(|t| t.score_value()))
    }

    /// Share of sessions satisfying `predicate`, zero for an empty cohort.
    pub fn ratio(&self, predicate: impl Fn(&SessionMetrics) -> bool) -> f64 {
        if self.metrics.is_empty() {
            return 0.0;
        }
        count_f64(self.metrics.iter().filter(|m| predicate(m)).count()) / count_f64(self.metrics.len())
    }

    /// Mean of `value` over every session, zero for an empty cohort.
    pub fn mean_of(&self, value: impl Fn(&SessionMetrics) -> usize) -> f64 {
        mean(self.metrics.iter().map(|m| count_f64(value(m))))
    }

    /// Share of sessions that read before writing, and their mean read count.
    pub fn research(&self) -> (f64, f64) {
        let researched: Vec<usize> = self
            .metrics
            .iter()
            .map(|m| m.reads_before_first_write)
            .filter(|&reads| reads > 0)
            .collect();
        let ratio = self.ratio(|m| m.reads_before_first_write > 0);
        let mean_reads = mean(researched.into_iter().map(count_f64));
        (ratio, mean_reads)
    }
}

#[allow(clippy::cast_precision_loss)]
fn count_f64(n: usize) -> f64 {
    n as f64
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0_usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / count_f64(n)
    }
}

fn percent(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

/// A named pattern/anti-pattern pair.
pub struct Heuristic {
    pub name: &'static str,
    /// Runs over the high cohort
    pub pattern: fn(&Cohort<'_>) -> Option<Finding>,
    /// Runs over `(low, high)`
    pub anti_pattern: fn(&Cohort<'_>, &Cohort<'_>) -> Option<Finding>,
}

impl std::fmt::Debug for Heuristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heuristic").field("name", &self.name).finish_non_exhaustive()
    }
}

fn finding(heuristic: &str, statement: String, statistic: f64) -> Finding {
    Finding { heuristic: heuristic.to_string(), statement, statistic }
}

const REGISTRY: &[Heuristic] = &[
    Heuristic { name: "research", pattern: research_pattern, anti_pattern: research_anti_pattern },
    Heuristic { name: "revision", pattern: revision_pattern, anti_pattern: revision_anti_pattern },
    Heuristic { name: "tool_diversity", pattern: diversity_pattern, anti_pattern: diversity_anti_pattern },
    Heuristic { name: "thoroughness", pattern: thoroughness_pattern, anti_pattern: thoroughness_anti_pattern },
    Heuristic { name: "self_review", pattern: self_review_pattern, anti_pattern: self_review_anti_pattern },
    Heuristic { name: "checkpoints", pattern: checkpoint_pattern, anti_pattern: checkpoint_anti_pattern },
];

/// Every heuristic, in the order statements are reported.
pub fn registry() -> &'static [Heuristic] {
    REGISTRY
}

fn research_pattern(high: &Cohort<'_>) -> Option<Finding> {
    let (ratio, mean_reads) = high.research();
    (ratio > RESEARCH_MIN_RATIO && mean_reads >= RESEARCH_MIN_READS).then(|| {
        finding(
            "research",
            format!(
                "Read source material before writing ({} of sessions read {mean_reads:.1}+ files first)",
                percent(ratio)
            ),
            ratio,
        )
    })
}

fn research_anti_pattern(low: &Cohort<'_>, high: &Cohort<'_>) -> Option<Finding> {
    let (_, low_reads) = low.research();
    let (_, high_reads) = high.research();
    (high_reads > RESEARCH_READS_MARGIN && low_reads < high_reads - RESEARCH_READS_MARGIN).then(|| {
        finding(
            "research",
            format!("Insufficient research before writing ({low_reads:.1} reads vs {high_reads:.1} in successful sessions)"),
            low_reads,
        )
    })
}

fn revision_pattern(high: &Cohort<'_>) -> Option<Finding> {
    let ratio = high.ratio(|m| m.revised);
    (ratio > REVISION_MIN_RATIO).then(|| {
        finding(
            "revision",
            format!("Revise and iterate on output ({} of sessions made revisions)", percent(ratio)),
            ratio,
        )
    })
}

fn revision_anti_pattern(low: &Cohort<'_>, high: &Cohort<'_>) -> Option<Finding> {
    let low_ratio = low.ratio(|m| m.revised);
    let high_ratio = high.ratio(|m| m.revised);
    (low_ratio < high_ratio - RATIO_MARGIN).then(|| {
        finding("revision", "No revision pass - submitted first draft without review".to_string(), low_ratio)
    })
}

fn diversity_pattern(high: &Cohort<'_>) -> Option<Finding> {
    let tools = high.mean_of(|m| m.distinct_tools);
    (tools >= DIVERSITY_MIN_TOOLS).then(|| {
        finding("tool_diversity", format!("Use diverse tool set (average {tools:.1} distinct tools used)"), tools)
    })
}

fn diversity_anti_pattern(low: &Cohort<'_>, high: &Cohort<'_>) -> Option<Finding> {
    let low_tools = low.mean_of(|m| m.distinct_tools);
    let high_tools = high.mean_of(|m| m.distinct_tools);
    (low_tools < high_tools - DIVERSITY_MARGIN).then(|| {
        finding(
            "tool_diversity",
            format!("Limited tool usage ({low_tools:.1} tools vs {high_tools:.1} in successful sessions)"),
            low_tools,
        )
    })
}

fn thoroughness_pattern(high: &Cohort<'_>) -> Option<Finding> {
    let steps = high.mean_of(|m| m.steps);
    (steps >= THOROUGHNESS_MIN_STEPS).then(|| {
        finding("thoroughness", format!("Invest thoroughness with multiple steps (average {steps:.0} steps)"), steps)
    })
}

fn thoroughness_anti_pattern(low: &Cohort<'_>, high: &Cohort<'_>) -> Option<Finding> {
    let low_steps = low.mean_of(|m| m.steps);
    let high_steps = high.mean_of(|m| m.steps);
    (low_steps < high_steps * RUSHED_STEP_FRACTION).then(|| {
        finding(
            "thoroughness",
            format!("Rushed execution ({low_steps:.0} steps vs {high_steps:.0} in successful sessions)"),
            low_steps,
        )
    })
}

fn self_review_pattern(high: &Cohort<'_>) -> Option<Finding> {
    let ratio = high.ratio(|m| m.self_reviewed);
    (ratio > SELF_REVIEW_MIN_RATIO).then(|| {
        finding("self_review", format!("Re-read output for self-critique ({} of sessions)", percent(ratio)), ratio)
    })
}

fn self_review_anti_pattern(low: &Cohort<'_>, high: &Cohort<'_>) -> Option<Finding> {
    let low_ratio = low.ratio(|m| m.self_reviewed);
    let high_ratio = high.ratio(|m| m.self_reviewed);
    (low_ratio < high_ratio - RATIO_MARGIN).then(|| {
        finding(
            "self_review",
            format!(
                "Skipped self-review of written output ({} vs {} in successful sessions)",
                percent(low_ratio),
                percent(high_ratio)
            ),
            low_ratio,
        )
    })
}

fn checkpoint_pattern(high: &Cohort<'_>) -> Option<Finding> {
    let ratio = high.ratio(|m| m.checkpointed);
    (ratio > CHECKPOINT_MIN_RATIO).then(|| {
        finding("checkpoints", format!("Work incrementally with checkpoints ({} of sessions)", percent(ratio)), ratio)
    })
}

fn checkpoint_anti_pattern(low: &Cohort<'_>, high: &Cohort<'_>) -> Option<Finding> {
    let low_ratio = low.ratio(|m| m.checkpointed);
    let high_ratio = high.ratio(|m| m.checkpointed);
    (low_ratio < high_ratio - RATIO_MARGIN).then(|| {
        finding(
            "checkpoints",
            format!(
                "No incremental checkpoints ({} vs {} in successful sessions)",
                percent(low_ratio),
                percent(high_ratio)
            ),
            low_ratio,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TrajectoryStep;

    fn session(id: &str, steps: &[(&str, &str)]) -> Trajectory {
        Trajectory::new(id, "task")
            .with_steps(steps.iter().map(|(tool, input)| TrajectoryStep::new(*tool, *input)).collect())
    }

    fn thorough(id: &str) -> Trajectory {
        session(
            id,
            &[
                ("Read", "docs/design.md"),
                ("Grep", "needle"),
                ("Read", "src/lib.rs"),
                ("Write", "out.md"),
                ("Bash", "check"),
                ("Edit", "out.md"),
                ("Read", "out.md"),
            ],
        )
    }

    fn rushed(id: &str) -> Trajectory {
        session(id, &[("Write", "out.md")])
    }

    #[test]
    fn test_session_metrics() {
        let m = SessionMetrics::measure(&thorough("a"));
        assert_eq!(m.reads_before_first_write, 3);
        assert!(m.revised);
        assert_eq!(m.distinct_tools, 5);
        assert_eq!(m.steps, 7);
        assert!(m.self_reviewed);
        assert!(m.checkpointed);

        let m = SessionMetrics::measure(&rushed("b"));
        assert_eq!(m.reads_before_first_write, 0);
        assert!(!m.revised && !m.self_reviewed && !m.checkpointed);
    }

    #[test]
    fn test_adjacent_writes_are_not_checkpoints() {
        let t = session("a", &[("Write", "a.md"), ("Edit", "b.md"), ("Read", "c.md")]);
        assert!(!SessionMetrics::measure(&t).checkpointed);
    }

    #[test]
    fn test_reading_before_writing_is_not_self_review() {
        let t = session("a", &[("Read", "a.md"), ("Write", "a.md")]);
        assert!(!SessionMetrics::measure(&t).self_reviewed);
    }

    #[test]
    fn test_every_pattern_fires_for_thorough_cohort() {
        let sessions = [thorough("a"), thorough("b"), thorough("c")];
        let high = Cohort::new(sessions.iter().collect());

        let names: Vec<_> = registry()
            .iter()
            .filter_map(|h| (h.pattern)(&high))
            .map(|f| f.heuristic)
            .collect();
        assert_eq!(names, vec!["research", "revision", "tool_diversity", "thoroughness", "self_review", "checkpoints"]);
    }

    #[test]
    fn test_research_statement_reports_statistics() {
        let sessions = [thorough("a"), thorough("b")];
        let high = Cohort::new(sessions.iter().collect());
        let finding = research_pattern(&high).unwrap();
        assert_eq!(finding.statement, "Read source material before writing (100% of sessions read 3.0+ files first)");
        assert!((finding.statistic - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_anti_patterns_compare_against_high_cohort() {
        let good = [thorough("a"), thorough("b")];
        let bad = [rushed("c"), rushed("d")];
        let high = Cohort::new(good.iter().collect());
        let low = Cohort::new(bad.iter().collect());

        let statements: Vec<_> = registry()
            .iter()
            .filter_map(|h| (h.anti_pattern)(&low, &high))
            .map(|f| f.statement)
            .collect();
        assert_eq!(statements.len(), 6, "got {statements:?}");
        assert_eq!(statements[0], "Insufficient research before writing (0.0 reads vs 3.0 in successful sessions)");
        assert_eq!(statements[3], "Rushed execution (1 steps vs 7 in successful sessions)");

        // Identical cohorts are never meaningfully worse.
        assert!(registry().iter().all(|h| (h.anti_pattern)(&high, &high).is_none()));
    }

    #[test]
    fn test_empty_cohort_measures_are_zero() {
        let empty = Cohort::new(Vec::new());
        assert_eq!(empty.mean_score(), 0.0);
        assert_eq!(empty.ratio(|m| m.revised), 0.0);
        assert_eq!(empty.research(), (0.0, 0.0));
        assert!(registry().iter().all(|h| (h.pattern)(&empty).is_none()));
    }
}
