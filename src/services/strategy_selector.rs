//! Strategy selector.
//!
//! A strategies region declares named approaches for one task label:
//!
//! ```text
//! <!-- trajectory-strategies:daily-briefing -->
//! strategies:
//!   - name: comprehensive
//!     description: Cover every source
//!     approach_prompt: |
//!       Read all feeds first.
//!       Then summarize by theme.
//!   - name: headlines
//!     approach_prompt: |
//!       Only the top five items.
//! <!-- /trajectory-strategies:daily-briefing -->
//! ```
//!
//! Selection picks one of them under an explicit, exploit or explore policy
//! using the usage statistics recorded for the label.

use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    RegionKind, SelectionMode, StrategiesAnalysis, Strategy, StrategySelection, StrategyUsage,
    EXPLORATION_USAGE_THRESHOLD, MIN_USAGES_FOR_RECOMMENDATION,
};
use crate::domain::ports::{StrategyUsageRepository, TrajectoryRepository};
use crate::services::marker_parser;

static NAME_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)-\s*name:\s*(.+?)\s*$").expect("name pattern compiles"));

static DESCRIPTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*description:\s*(.+?)\s*$").expect("description pattern compiles"));

static APPROACH_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)approach_prompt:\s*(\|)?\s*(.*?)\s*$").expect("approach pattern compiles"));

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

/// An `approach_prompt: |` block being collected.
struct Block {
    key_indent: usize,
    lines: Vec<String>,
}

impl Block {
    fn finish(self) -> String {
        let base = self
            .lines
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| indent_of(l))
            .min()
            .unwrap_or(0);
        let text = self
            .lines
            .iter()
            .map(|l| l.get(base..).unwrap_or("").trim_end())
            .collect::<Vec<_>>()
            .join("\n");
        text.trim().to_string()
    }
}

/// Parse the strategies declared in a region body, in declaration order.
///
/// Lines before the first `- name:` entry (including a `strategies:` header)
/// are ignored, as are keys the grammar does not know.
pub fn parse_strategies(body: &str) -> Vec<Strategy> {
    let mut strategies: Vec<Strategy> = Vec::new();
    let mut block: Option<Block> = None;

    for line in body.lines() {
        if let Some(open) = block.as_mut() {
            if line.trim().is_empty() || indent_of(line) > open.key_indent {
                open.lines.push(line.to_string());
                continue;
            }
            if let (Some(done), Some(current)) = (block.take(), strategies.last_mut()) {
                current.approach = done.finish();
            }
        }

        if let Some(caps) = NAME_LINE.captures(line) {
            strategies.push(Strategy::new(&caps[2]));
            continue;
        }
        let Some(current) = strategies.last_mut() else {
            continue;
        };

        if let Some(caps) = DESCRIPTION_LINE.captures(line) {
            current.description = Some(caps[1].to_string());
        } else if let Some(caps) = APPROACH_LINE.captures(line) {
            if caps.get(2).is_some() {
                block = Some(Block { key_indent: caps[1].len(), lines: Vec::new() });
            } else {
                current.approach = caps[3].to_string();
            }
        }
    }

    if let (Some(done), Some(current)) = (block, strategies.last_mut()) {
        current.approach = done.finish();
    }
    strategies
}

/// Apply a selection policy to hydrated strategies.
///
/// Returns the chosen strategy and a one-line justification.
pub fn choose(
    label: &str,
    strategies: &[Strategy],
    mode: SelectionMode,
    name: Option<&str>,
) -> DomainResult<(Strategy, String)> {
    let first = strategies.first().ok_or_else(|| DomainError::StrategyNotFound {
        label: label.to_string(),
        name: name.unwrap_or_default().to_string(),
    })?;

    match mode {
        SelectionMode::Explicit => {
            let name = name.filter(|n| !n.trim().is_empty()).ok_or_else(|| {
                DomainError::ValidationFailed("explicit selection requires a strategy name".to_string())
            })?;
            strategies
                .iter()
                .find(|s| s.name == name)
                .map(|s| (s.clone(), "Explicitly selected".to_string()))
                .ok_or_else(|| DomainError::StrategyNotFound { label: label.to_string(), name: name.to_string() })
        }
        SelectionMode::Recommend => Ok(best_performer(strategies)
            .map(|(s, mean)| {
                let reason = format!("Best performer ({mean:.2} avg over {} sessions)", s.usage_count);
                (s.clone(), reason)
            })
            .unwrap_or_else(|| (first.clone(), "Default (no performance data yet)".to_string()))),
        SelectionMode::Rotate => {
            let chosen = least_used(strategies).unwrap_or(first);
            let reason = format!("Rotation for exploration ({} previous uses)", chosen.usage_count);
            Ok((chosen.clone(), reason))
        }
    }
}

/// Highest mean among strategies with enough usages; earlier declarations win ties.
fn best_performer(strategies: &[Strategy]) -> Option<(&Strategy, f64)> {
    strategies
        .iter()
        .filter(|s| s.usage_count >= MIN_USAGES_FOR_RECOMMENDATION)
        .filter_map(|s| s.mean_score.map(|mean| (s, mean)))
        .fold(None, |best, (s, mean)| match best {
            Some((_, top)) if top >= mean => best,
            _ => Some((s, mean)),
        })
}

/// Fewest usages; earlier declarations win ties.
fn least_used(strategies: &[Strategy]) -> Option<&Strategy> {
    strategies.iter().fold(None, |least: Option<&Strategy>, s| match least {
        Some(l) if l.usage_count <= s.usage_count => Some(l),
        _ => Some(s),
    })
}

pub struct StrategySelector<U, T>
where
    U: StrategyUsageRepository,
    T: TrajectoryRepository,
{
    usages: Arc<U>,
    trajectories: Arc<T>,
}

impl<U, T> StrategySelector<U, T>
where
    U: StrategyUsageRepository,
    T: TrajectoryRepository,
{
    pub fn new(usages: Arc<U>, trajectories: Arc<T>) -> Self {
        Self { usages, trajectories }
    }

    /// Strategies declared for `label` in the document, with their statistics.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn list(&self, path: &Path, label: &str) -> DomainResult<Vec<Strategy>> {
        let region = marker_parser::find_region(path, RegionKind::Strategies, label).await?;
        let mut strategies = parse_strategies(&region.content);

        let stats = self.usages.stats(label).await?;
        for strategy in &mut strategies {
            if let Some(found) = stats.iter().find(|s| s.strategy_name == strategy.name) {
                strategy.hydrate(found);
            }
        }
        debug!(count = strategies.len(), "strategies loaded");
        Ok(strategies)
    }

    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn select(
        &self,
        path: &Path,
        label: &str,
        mode: SelectionMode,
        name: Option<&str>,
    ) -> DomainResult<StrategySelection> {
        let strategies = self.list(path, label).await?;
        let (strategy, reason) = choose(label, &strategies, mode, name)?;
        info!(strategy = %strategy.name, mode = mode.as_str(), "strategy selected");
        Ok(StrategySelection { label: label.to_string(), mode, strategy, reason })
    }

    /// Link a trajectory to the strategy it followed.
    ///
    /// A later call for the same label and trajectory overwrites the earlier one.
    #[instrument(skip(self))]
    pub async fn record_usage(
        &self,
        label: &str,
        strategy_name: &str,
        trajectory_id: &str,
    ) -> DomainResult<StrategyUsage> {
        for (field, value) in [("label", label), ("strategy name", strategy_name), ("trajectory id", trajectory_id)] {
            if value.trim().is_empty() {
                return Err(DomainError::ValidationFailed(format!("{field} is required")));
            }
        }

        let mut usage = StrategyUsage::new(label, strategy_name, trajectory_id);
        if let Some(trajectory) = self.trajectories.get(trajectory_id).await? {
            usage.score = trajectory.score_value();
            self.trajectories.set_strategy(trajectory_id, strategy_name).await?;
        }
        self.usages.upsert(&usage).await?;

        info!("strategy usage recorded");
        Ok(usage)
    }

    /// Back-fill the score of every usage linked to a trajectory.
    pub async fn update_usage_score(&self, trajectory_id: &str, score: f64) -> DomainResult<u64> {
        let updated = self.usages.update_score_by_trajectory(trajectory_id, score).await?;
        debug!(trajectory_id, updated, "usage scores updated");
        Ok(updated)
    }

    /// Compare the recorded performance of every strategy used under `label`.
    #[instrument(skip(self))]
    pub async fn analyze(&self, label: &str) -> DomainResult<StrategiesAnalysis> {
        let strategies: Vec<Strategy> = self
            .usages
            .stats(label)
            .await?
            .iter()
            .map(|stats| {
                let mut strategy = Strategy::new(&stats.strategy_name);
                strategy.hydrate(stats);
                strategy
            })
            .collect();

        let best_strategy = best_performer(&strategies).map(|(s, _)| s.name.clone());
        let least_used = least_used(&strategies).map(|s| s.name.clone());
        let rotation_suggested = strategies.iter().any(|s| s.usage_count < EXPLORATION_USAGE_THRESHOLD);
        let recommended_next = if rotation_suggested { least_used.clone() } else { best_strategy.clone() };

        Ok(StrategiesAnalysis {
            label: label.to_string(),
            total_usages: strategies.iter().map(|s| s.usage_count).sum(),
            strategies,
            best_strategy,
            least_used,
            rotation_suggested,
            recommended_next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{
        create_migrated_test_pool, SqliteStrategyUsageRepository, SqliteTrajectoryRepository,
    };

    #[test]
    fn test_strategy_patterns_compile() {
        for pattern in [&NAME_LINE, &DESCRIPTION_LINE, &APPROACH_LINE] {
            LazyLock::force(pattern);
        }
    }
    use crate::domain::models::Trajectory;

    const BODY: &str = "strategies:\n  - name: comprehensive\n    description: Cover every source\n    approach_prompt: |\n      Read all feeds first.\n\n        Indented detail.\n      Then summarize by theme.\n  - name: headlines\n    approach_prompt: |\n      Only the top five items.\n";

    fn hydrated(name: &str, usage_count: usize, mean_score: Option<f64>) -> Strategy {
        let mut s = Strategy::new(name);
        s.usage_count = usage_count;
        s.scored_count = if mean_score.is_some() { usage_count } else { 0 };
        s.mean_score = mean_score;
        s
    }

    #[test]
    fn test_parse_strategies() {
        let strategies = parse_strategies(BODY);
        assert_eq!(strategies.len(), 2);

        assert_eq!(strategies[0].name, "comprehensive");
        assert_eq!(strategies[0].description.as_deref(), Some("Cover every source"));
        assert_eq!(
            strategies[0].approach,
            "Read all feeds first.\n\n  Indented detail.\nThen summarize by theme."
        );

        assert_eq!(strategies[1].name, "headlines");
        assert_eq!(strategies[1].description, None);
        assert_eq!(strategies[1].approach, "Only the top five items.");
    }

    #[test]
    fn test_parse_strategies_inline_approach_and_noise() {
        let body = "Intro text\n- name: quick\n  approach_prompt: Just answer.\n  owner: someone\n";
        let strategies = parse_strategies(body);
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].approach, "Just answer.");
        assert!(parse_strategies("no strategies here\n").is_empty());
    }

    #[test]
    fn test_recommend_requires_enough_usages() {
        let strategies = vec![hydrated("A", 3, Some(0.9)), hydrated("B", 1, Some(1.0))];

        let (chosen, reason) = choose("t", &strategies, SelectionMode::Recommend, None).unwrap();
        assert_eq!(chosen.name, "A");
        assert_eq!(reason, "Best performer (0.90 avg over 3 sessions)");

        let (chosen, reason) = choose("t", &strategies, SelectionMode::Rotate, None).unwrap();
        assert_eq!(chosen.name, "B");
        assert_eq!(reason, "Rotation for exploration (1 previous uses)");
    }

    #[test]
    fn test_recommend_falls_back_to_first_declared() {
        let strategies = vec![hydrated("A", 1, Some(0.2)), hydrated("B", 0, None)];
        let (chosen, reason) = choose("t", &strategies, SelectionMode::Recommend, None).unwrap();
        assert_eq!(chosen.name, "A");
        assert_eq!(reason, "Default (no performance data yet)");
    }

    #[test]
    fn test_ties_go_to_declaration_order() {
        let strategies = vec![hydrated("A", 2, Some(0.8)), hydrated("B", 2, Some(0.8)), hydrated("C", 2, None)];
        assert_eq!(choose("t", &strategies, SelectionMode::Recommend, None).unwrap().0.name, "A");
        assert_eq!(choose("t", &strategies, SelectionMode::Rotate, None).unwrap().0.name, "A");
    }

    #[test]
    fn test_explicit_selection() {
        let strategies = vec![hydrated("A", 0, None), hydrated("B", 0, None)];

        let (chosen, reason) = choose("t", &strategies, SelectionMode::Explicit, Some("B")).unwrap();
        assert_eq!(chosen.name, "B");
        assert_eq!(reason, "Explicitly selected");

        let err = choose("t", &strategies, SelectionMode::Explicit, Some("Z")).unwrap_err();
        assert!(matches!(err, DomainError::StrategyNotFound { name, .. } if name == "Z"));

        let err = choose("t", &strategies, SelectionMode::Explicit, None).unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }

    #[test]
    fn test_no_strategies() {
        let err = choose("t", &[], SelectionMode::Rotate, None).unwrap_err();
        assert!(matches!(err, DomainError::StrategyNotFound { .. }));
    }

    async fn setup_selector() -> (
        StrategySelector<SqliteStrategyUsageRepository, SqliteTrajectoryRepository>,
        Arc<SqliteTrajectoryRepository>,
    ) {
        let pool = create_migrated_test_pool().await.unwrap();
        let trajectories = Arc::new(SqliteTrajectoryRepository::new(pool.clone()));
        let usages = Arc::new(SqliteStrategyUsageRepository::new(pool));
        (StrategySelector::new(usages, trajectories.clone()), trajectories)
    }

    #[tokio::test]
    async fn test_select_from_document() {
        let (selector, _) = setup_selector().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CLAUDE.md");
        std::fs::write(&path, format!("# Guide\n<!-- trajectory-strategies:briefing -->\n{BODY}<!-- /trajectory-strategies:briefing -->\n")).unwrap();

        selector.record_usage("briefing", "comprehensive", "s1").await.unwrap();
        selector.record_usage("briefing", "comprehensive", "s2").await.unwrap();

        let listed = selector.list(&path, "briefing").await.unwrap();
        assert_eq!(listed[0].usage_count, 2);
        assert_eq!(listed[1].usage_count, 0);

        let selection = selector.select(&path, "briefing", SelectionMode::Rotate, None).await.unwrap();
        assert_eq!(selection.strategy.name, "headlines");

        let err = selector.select(&path, "other", SelectionMode::Rotate, None).await.unwrap_err();
        assert!(matches!(err, DomainError::TargetNotFound { .. }));
    }

    #[tokio::test]
    async fn test_record_usage_overwrites_and_stamps_trajectory() {
        let (selector, trajectories) = setup_selector().await;
        let mut trajectory = Trajectory::new("s1", "write the briefing").with_tag("briefing");
        trajectory.score(0.7, "");
        trajectories.save(&trajectory).await.unwrap();

        selector.record_usage("briefing", "comprehensive", "s1").await.unwrap();
        let usage = selector.record_usage("briefing", "headlines", "s1").await.unwrap();
        assert_eq!(usage.score, Some(0.7));

        let analysis = selector.analyze("briefing").await.unwrap();
        assert_eq!(analysis.total_usages, 1);
        assert_eq!(analysis.strategies[0].name, "headlines");

        let stored = trajectories.get("s1").await.unwrap().unwrap();
        assert_eq!(stored.strategy.as_deref(), Some("headlines"));

        let err = selector.record_usage("briefing", " ", "s1").await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_analyze_suggests_rotation_until_explored() {
        let (selector, _) = setup_selector().await;
        for (i, name) in ["A", "A", "A", "B"].iter().enumerate() {
            let id = format!("s{i}");
            selector.record_usage("t", name, &id).await.unwrap();
            selector.update_usage_score(&id, if *name == "A" { 0.9 } else { 1.0 }).await.unwrap();
        }

        let analysis = selector.analyze("t").await.unwrap();
        assert_eq!(analysis.total_usages, 4);
        assert_eq!(analysis.best_strategy.as_deref(), Some("A"));
        assert_eq!(analysis.least_used.as_deref(), Some("B"));
        assert!(analysis.rotation_suggested);
        assert_eq!(analysis.recommended_next.as_deref(), Some("B"));

        for i in 4..6 {
            let id = format!("s{i}");
            selector.record_usage("t", "B", &id).await.unwrap();
            selector.update_usage_score(&id, 0.5).await.unwrap();
        }
        let analysis = selector.analyze("t").await.unwrap();
        assert!(!analysis.rotation_suggested);
        assert_eq!(analysis.recommended_next.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_analyze_without_usages() {
        let (selector, _) = setup_selector().await;
        let analysis = selector.analyze("nothing").await.unwrap();
        assert!(analysis.strategies.is_empty());
        assert_eq!(analysis.best_strategy, None);
        assert!(!analysis.rotation_suggested);
        assert_eq!(analysis.recommended_next, None);
    }
}
