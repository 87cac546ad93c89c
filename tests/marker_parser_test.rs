mod common;

use proptest::prelude::*;
use std::path::Path;
use trajectory_memory::domain::errors::DomainError;
use trajectory_memory::domain::models::RegionKind;
use trajectory_memory::services::marker_parser::{find_region, find_regions, parse_regions, replace, splice};

use common::write_document;

const GUIDE: &str = "\
# Project guide

Intro text stays put.

<!-- trajectory-optimize:start tag=\"briefing\" min_sessions=4 -->
Summarize the news.
Keep it short.
<!-- trajectory-optimize:end -->

<!-- trajectory-examples:briefing max=2 include_negative=false -->
<!-- /trajectory-examples:briefing -->

<!-- trajectory-strategies:start tag=\"briefing\" -->
- name: headlines
  approach_prompt: Lead with the three biggest stories.
<!-- trajectory-strategies:end -->
";

#[tokio::test]
async fn test_find_regions_in_document_order() {
    let (_dir, path) = write_document(GUIDE);
    let regions = find_regions(&path).await.unwrap();

    let kinds: Vec<_> = regions.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![RegionKind::Optimize, RegionKind::Examples, RegionKind::Strategies]);
    assert!(regions.iter().all(|r| r.label == "briefing"));

    let optimize = &regions[0];
    assert_eq!(optimize.params.min_sessions, 4);
    assert_eq!(optimize.content, "Summarize the news.\nKeep it short.\n");
    assert_eq!((optimize.start_line, optimize.end_line), (5, 8));

    let examples = &regions[1];
    assert_eq!(examples.params.max_examples, 2);
    assert!(!examples.params.include_negative);
    assert_eq!(examples.content, "");
}

#[tokio::test]
async fn test_replace_touches_only_the_region_body() {
    let (_dir, path) = write_document(GUIDE);
    let region = find_region(&path, RegionKind::Optimize, "briefing").await.unwrap();

    replace(&region, "1. Read every source\n2. Summarize").await.unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let expected = GUIDE.replace(
        "Summarize the news.\nKeep it short.\n",
        "1. Read every source\n2. Summarize\n",
    );
    assert_eq!(text, expected);

    // The old region is stale now that the body moved.
    let err = replace(&region, "again").await.unwrap_err();
    assert!(matches!(err, DomainError::StaleRegion { .. }));
}

#[tokio::test]
async fn test_missing_region_reports_target() {
    let (_dir, path) = write_document(GUIDE);
    let err = find_region(&path, RegionKind::Optimize, "research").await.unwrap_err();
    assert!(matches!(err, DomainError::TargetNotFound { label, .. } if label == "research"));
}

#[test]
fn test_unterminated_region_is_malformed() {
    let text = "<!-- trajectory-optimize:start tag=\"a\" -->\nbody\n";
    let err = parse_regions(Path::new("CLAUDE.md"), text).unwrap_err();
    assert!(matches!(err, DomainError::MalformedMarkers { .. }));
}

#[test]
fn test_missing_label_is_rejected() {
    let text = "<!-- trajectory-optimize:start min_sessions=3 -->\nbody\n<!-- trajectory-optimize:end -->\n";
    let err = parse_regions(Path::new("CLAUDE.md"), text).unwrap_err();
    assert!(matches!(err, DomainError::MissingLabel { line: 1 }));
}

#[test]
fn test_text_without_markers_has_no_regions() {
    let regions = parse_regions(Path::new("README.md"), "# Title\n\nNothing to see.\n").unwrap();
    assert!(regions.is_empty());
}

fn body_line() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,:;#*-]{0,40}"
}

proptest! {
    /// Property: splicing a body and parsing again yields exactly that body,
    /// and everything outside the markers is untouched.
    #[test]
    fn prop_splice_then_parse_recovers_body(
        before in prop::collection::vec(body_line(), 0..5),
        old_body in prop::collection::vec(body_line(), 0..5),
        new_body in prop::collection::vec(body_line(), 0..5),
        after in prop::collection::vec(body_line(), 0..5),
    ) {
        let lines = |v: &[String]| v.iter().map(|l| format!("{l}\n")).collect::<String>();
        let start = "<!-- trajectory-optimize:start tag=\"prop\" -->\n";
        let end = "<!-- trajectory-optimize:end -->\n";
        let text = format!("{}{start}{}{end}{}", lines(&before), lines(&old_body), lines(&after));

        let path = Path::new("CLAUDE.md");
        let regions = parse_regions(path, &text).unwrap();
        prop_assert_eq!(regions.len(), 1);
        prop_assert_eq!(&regions[0].content, &lines(&old_body));

        let replacement = lines(&new_body);
        let spliced = splice(&text, &regions[0], &replacement).unwrap();
        let reparsed = parse_regions(path, &spliced).unwrap();
        prop_assert_eq!(reparsed.len(), 1);
        prop_assert_eq!(&reparsed[0].content, &replacement);
        prop_assert_eq!(
            spliced,
            format!("{}{start}{replacement}{end}{}", lines(&before), lines(&after))
        );
    }
}
