//! Marker parser for rewritable document regions.
//!
//! Regions are delimited by HTML comments on lines of their own. Every region
//! kind accepts two syntaxes:
//!
//! ```text
//! <!-- trajectory-optimize:start tag="writing" min_sessions=5 -->
//! ...body...
//! <!-- trajectory-optimize:end -->
//!
//! <!-- trajectory-strategies:writing -->
//! ...body...
//! <!-- /trajectory-strategies:writing -->
//! ```
//!
//! Region bodies are kept verbatim so that writing a body back unchanged
//! reproduces the document byte for byte.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Region, RegionKind, RegionParams};
use crate::services::document;

const KINDS: &str = "optimize|examples|strategies";

fn marker_regex(pattern: &str) -> Regex {
    Regex::new(&pattern.replace("KINDS", KINDS)).expect("marker pattern compiles")
}

static ATTRIBUTED_START: LazyLock<Regex> =
    LazyLock::new(|| marker_regex(r"^\s*<!--\s*trajectory-(KINDS):start(?:\s+(.*?))?\s*-->\s*$"));

static ATTRIBUTED_END: LazyLock<Regex> =
    LazyLock::new(|| marker_regex(r"^\s*<!--\s*trajectory-(KINDS):end\s*-->\s*$"));

static COMPACT_START: LazyLock<Regex> = LazyLock::new(|| {
    marker_regex(r"^\s*<!--\s*trajectory-(KINDS):([A-Za-z0-9_.\-]+?)(?:\s+(.*?))?\s*-->\s*$")
});

static COMPACT_END: LazyLock<Regex> =
    LazyLock::new(|| marker_regex(r"^\s*<!--\s*/trajectory-(KINDS):([A-Za-z0-9_.\-]+?)\s*-->\s*$"));

static ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| marker_regex(r#"([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(?:"([^"]*)"|([^\s"]+))"#));

/// A recognized marker line.
#[derive(Debug, PartialEq, Eq)]
enum Marker {
    Start { kind: RegionKind, label: Option<String>, attributes: String },
    End { kind: RegionKind, label: Option<String> },
}

/// A region whose end marker has not been seen yet.
struct OpenRegion {
    kind: RegionKind,
    label: String,
    params: RegionParams,
    start_line: usize,
    body: String,
}

fn classify(line: &str) -> Option<Marker> {
    let line = line.trim_end_matches(['\n', '\r']);
    if !line.contains("trajectory-") {
        return None;
    }

    let kind = |caps: &regex::Captures<'_>| RegionKind::from_str(&caps[1]);

    if let Some(caps) = ATTRIBUTED_END.captures(line) {
        return Some(Marker::End { kind: kind(&caps)?, label: None });
    }
    if let Some(caps) = COMPACT_END.captures(line) {
        return Some(Marker::End { kind: kind(&caps)?, label: Some(caps[2].to_string()) });
    }
    if let Some(caps) = ATTRIBUTED_START.captures(line) {
        return Some(Marker::Start {
            kind: kind(&caps)?,
            label: None,
            attributes: caps.get(2).map_or_else(String::new, |m| m.as_str().to_string()),
        });
    }
    if let Some(caps) = COMPACT_START.captures(line) {
        return Some(Marker::Start {
            kind: kind(&caps)?,
            label: Some(caps[2].to_string()),
            attributes: caps.get(3).map_or_else(String::new, |m| m.as_str().to_string()),
        });
    }
    None
}

/// Parse `key=value` attributes from a start marker.
///
/// Returns the label (if any) and the declared parameters. Unknown keys are
/// ignored; malformed values for known keys are errors.
fn parse_attributes(attributes: &str, line: usize) -> DomainResult<(Option<String>, RegionParams)> {
    let mut label = None;
    let mut params = RegionParams::default();

    for caps in ATTRIBUTE.captures_iter(attributes) {
        let key = &caps[1];
        let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());

        match key {
            "tag" | "label" => label = Some(value.to_string()),
            "min_sessions" => params.min_sessions = parse_integer(key, value, line)?,
            "max" | "max_examples" => params.max_examples = parse_integer(key, value, line)?,
            "include_negative" => params.include_negative = parse_bool(key, value, line)?,
            _ => debug!(line, key, "ignoring unknown marker attribute"),
        }
    }

    Ok((label, params))
}

fn parse_integer(key: &str, value: &str, line: usize) -> DomainResult<usize> {
    value.parse().map_err(|_| DomainError::MalformedMarkers {
        line,
        reason: format!("attribute {key} expects an integer, got '{value}'"),
    })
}

fn parse_bool(key: &str, value: &str, line: usize) -> DomainResult<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(DomainError::MalformedMarkers {
            line,
            reason: format!("attribute {key} expects true or false, got '{value}'"),
        }),
    }
}

/// Find every region in `text`, in document order.
///
/// `path` is recorded on each region so it can later be written back.
pub fn parse_regions(path: &Path, text: &str) -> DomainResult<Vec<Region>> {
    let mut regions = Vec::new();
    let mut open: Option<OpenRegion> = None;

    for (index, line) in text.split_inclusive('\n').enumerate() {
        let line_no = index + 1;

        match classify(line) {
            Some(Marker::Start { kind, label, attributes }) => {
                if let Some(current) = &open {
                    return Err(DomainError::MalformedMarkers {
                        line: line_no,
                        reason: format!(
                            "{kind} region starts inside {} region '{}' opened at line {}; nesting is not allowed",
                            current.kind, current.label, current.start_line
                        ),
                    });
                }

                let (attr_label, params) = parse_attributes(&attributes, line_no)?;
                let label = label
                    .or(attr_label)
                    .filter(|l| !l.trim().is_empty())
                    .ok_or(DomainError::MissingLabel { line: line_no })?;

                open = Some(OpenRegion { kind, label, params, start_line: line_no, body: String::new() });
            }
            Some(Marker::End { kind, label }) => {
                let Some(current) = open.take() else {
                    return Err(DomainError::MalformedMarkers {
                        line: line_no,
                        reason: format!("{kind} end marker without a matching start"),
                    });
                };

                if current.kind != kind {
                    return Err(DomainError::MalformedMarkers {
                        line: line_no,
                        reason: format!(
                            "{kind} end marker closes {} region '{}' opened at line {}",
                            current.kind, current.label, current.start_line
                        ),
                    });
                }
                if let Some(end_label) = label.filter(|l| *l != current.label) {
                    return Err(DomainError::MalformedMarkers {
                        line: line_no,
                        reason: format!(
                            "end marker for '{end_label}' closes region '{}' opened at line {}",
                            current.label, current.start_line
                        ),
                    });
                }

                regions.push(Region {
                    path: path.to_path_buf(),
                    kind: current.kind,
                    label: current.label,
                    params: current.params,
                    start_line: current.start_line,
                    end_line: line_no,
                    content: current.body,
                });
            }
            None => {
                if let Some(current) = open.as_mut() {
                    current.body.push_str(line);
                }
            }
        }
    }

    if let Some(current) = open {
        return Err(DomainError::MalformedMarkers {
            line: current.start_line,
            reason: format!("{} region '{}' is never closed", current.kind, current.label),
        });
    }

    Ok(regions)
}

/// Read `path` and find every region in it.
#[instrument(skip(path), fields(path = %path.display()))]
pub async fn find_regions(path: &Path) -> DomainResult<Vec<Region>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DomainError::document_io(path, e))?;
    let regions = parse_regions(path, &text)?;
    debug!(count = regions.len(), "found regions");
    Ok(regions)
}

/// Read `path` and return the region of `kind` tagged `label`.
pub async fn find_region(path: &Path, kind: RegionKind, label: &str) -> DomainResult<Region> {
    find_regions(path)
        .await?
        .into_iter()
        .find(|r| r.kind == kind && r.label == label)
        .ok_or_else(|| DomainError::TargetNotFound { path: path.to_path_buf(), label: label.to_string() })
}

/// Make a body end with a newline so the end marker stays on its own line.
fn normalize_body(body: &str) -> String {
    if body.is_empty() || body.ends_with('\n') {
        body.to_string()
    } else {
        format!("{body}\n")
    }
}

/// Reject a body that carries region markers of its own.
///
/// Such a body would change the document's region structure once written,
/// leaving a document that can no longer be rolled back. `first_line` is the
/// line number the body starts at, used for error positions.
pub fn check_body(body: &str, first_line: usize) -> DomainResult<()> {
    for (index, line) in body.split_inclusive('\n').enumerate() {
        if let Some(marker) = classify(line) {
            let kind = match marker {
                Marker::Start { kind, .. } => format!("{kind} start"),
                Marker::End { kind, .. } => format!("{kind} end"),
            };
            return Err(DomainError::MalformedMarkers {
                line: first_line + index,
                reason: format!("region body contains a {kind} marker"),
            });
        }
    }
    Ok(())
}

/// Rebuild `text` with the body of `region` swapped for `new_body`.
///
/// Every byte outside the body, including both marker lines, is kept.
/// Bodies containing marker lines are rejected with `MalformedMarkers`.
pub fn splice(text: &str, region: &Region, new_body: &str) -> DomainResult<String> {
    check_body(new_body, region.start_line + 1)?;
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    if region.start_line == 0 || region.start_line >= region.end_line || region.end_line > lines.len() {
        return Err(DomainError::ValidationFailed(format!(
            "invalid region line range {}-{} for a document of {} lines",
            region.start_line,
            region.end_line,
            lines.len()
        )));
    }

    let mut out = String::with_capacity(text.len() + new_body.len());
    for line in &lines[..region.start_line] {
        out.push_str(line);
    }
    out.push_str(&normalize_body(new_body));
    for line in &lines[region.end_line - 1..] {
        out.push_str(line);
    }
    Ok(out)
}

/// Check that `region` still describes the current document text.
///
/// Returns the document's current regions.
fn revalidate(text: &str, region: &Region) -> DomainResult<Vec<Region>> {
    let current = parse_regions(&region.path, text)?;
    let still_valid = current.iter().any(|r| {
        r.kind == region.kind
            && r.label == region.label
            && r.start_line == region.start_line
            && r.end_line == region.end_line
            && r.content == region.content
    });

    if still_valid {
        Ok(current)
    } else {
        Err(DomainError::StaleRegion {
            path: region.path.clone(),
            label: region.label.clone(),
            expected_start: region.start_line,
            expected_end: region.end_line,
        })
    }
}

/// Check that `updated` has the same regions, in order, as `before`.
fn ensure_same_structure(region: &Region, before: &[Region], updated: &str) -> DomainResult<()> {
    let after = parse_regions(&region.path, updated)?;
    let shape = |regions: &[Region]| -> Vec<(RegionKind, String)> {
        regions.iter().map(|r| (r.kind, r.label.clone())).collect()
    };

    if shape(before) == shape(&after) {
        Ok(())
    } else {
        Err(DomainError::MalformedMarkers {
            line: region.start_line,
            reason: format!("replacing the body of '{}' would change the document's regions", region.label),
        })
    }
}

/// Replace the body of `region` in its document.
///
/// The document is re-read and the region re-validated first, so a region
/// located before a concurrent edit fails with `StaleRegion` instead of
/// overwriting the wrong lines. The write itself is atomic.
#[instrument(skip(region, new_body), fields(path = %region.path.display(), label = %region.label))]
pub async fn replace(region: &Region, new_body: &str) -> DomainResult<()> {
    let path: PathBuf = region.path.clone();
    let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| DomainError::document_io(&path, e))?;

    let before = revalidate(&text, region)?;
    let updated = splice(&text, region, new_body)?;
    ensure_same_structure(region, &before, &updated)?;
    document::write_atomic(&path, updated.into_bytes()).await?;

    debug!(start = region.start_line, end = region.end_line, "replaced region body");
    Ok(())
}
