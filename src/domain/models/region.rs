//! Rewritable document regions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default minimum number of scored sessions before a region may be optimized.
pub const DEFAULT_MIN_SESSIONS: usize = 10;
/// Default number of curated examples rendered into an examples region.
pub const DEFAULT_MAX_EXAMPLES: usize = 3;
/// Whether an examples region includes a negative example by default.
pub const DEFAULT_INCLUDE_NEGATIVE: bool = true;

/// What a marked region is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    /// Instructions rewritten by the optimization lifecycle
    Optimize,
    /// Curated examples rendered from past sessions
    Examples,
    /// Named strategies for the selector
    Strategies,
}

impl RegionKind {
    pub const ALL: [Self; 3] = [Self::Optimize, Self::Examples, Self::Strategies];

    /// Marker keyword, as in `trajectory-<keyword>:start`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optimize => "optimize",
            Self::Examples => "examples",
            Self::Strategies => "strategies",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "optimize" => Some(Self::Optimize),
            "examples" => Some(Self::Examples),
            "strategies" => Some(Self::Strategies),
            _ => None,
        }
    }
}

impl std::fmt::Display for RegionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters declared on a region's start marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionParams {
    pub min_sessions: usize,
    pub max_examples: usize,
    pub include_negative: bool,
}

impl Default for RegionParams {
    fn default() -> Self {
        Self {
            min_sessions: DEFAULT_MIN_SESSIONS,
            max_examples: DEFAULT_MAX_EXAMPLES,
            include_negative: DEFAULT_INCLUDE_NEGATIVE,
        }
    }
}

/// A labeled, marker-delimited span of a document.
///
/// Line numbers are only valid for the document text the region was parsed
/// from. Any edit invalidates them, which is why replacement re-parses the
/// document and checks the region still lines up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub path: PathBuf,
    pub kind: RegionKind,
    pub label: String,
    pub params: RegionParams,
    /// 1-indexed line of the start marker
    pub start_line: usize,
    /// 1-indexed line of the end marker
    pub end_line: usize,
    /// Verbatim body, each line keeping its terminator
    pub content: String,
}

impl Region {
    /// Body with surrounding whitespace removed, for prompts and display.
    pub fn trimmed_content(&self) -> &str {
        self.content.trim()
    }

    /// Number of body lines.
    pub fn body_lines(&self) -> usize {
        self.end_line.saturating_sub(self.start_line + 1)
    }
}
