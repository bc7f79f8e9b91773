//! Value types shared by the node tree, the export projection and the
//! report pipeline: coverage counters, ratios, threshold classification and
//! report configuration.

use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::path::PathBuf;

use clap::ValueEnum;
use serde::Serialize;

use crate::error::CoverageError;

/// Compute a coverage rate, returning 0.0 when the total is zero.
#[must_use]
pub fn rate(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

/// The five raw counters carried by every coverage node and record.
///
/// Totals are always derived, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoverageCounts {
    pub lines_covered: u32,
    pub lines_partially_covered: u32,
    pub lines_not_covered: u32,
    pub blocks_covered: u32,
    pub blocks_not_covered: u32,
}

impl CoverageCounts {
    #[must_use]
    pub fn total_lines(&self) -> u64 {
        u64::from(self.lines_covered)
            + u64::from(self.lines_partially_covered)
            + u64::from(self.lines_not_covered)
    }

    #[must_use]
    pub fn total_blocks(&self) -> u64 {
        u64::from(self.blocks_covered) + u64::from(self.blocks_not_covered)
    }

    #[must_use]
    pub fn lines_covered_ratio(&self) -> f64 {
        rate(self.lines_covered.into(), self.total_lines())
    }

    #[must_use]
    pub fn lines_partially_covered_ratio(&self) -> f64 {
        rate(self.lines_partially_covered.into(), self.total_lines())
    }

    #[must_use]
    pub fn lines_not_covered_ratio(&self) -> f64 {
        rate(self.lines_not_covered.into(), self.total_lines())
    }

    #[must_use]
    pub fn blocks_covered_ratio(&self) -> f64 {
        rate(self.blocks_covered.into(), self.total_blocks())
    }

    #[must_use]
    pub fn blocks_not_covered_ratio(&self) -> f64 {
        rate(self.blocks_not_covered.into(), self.total_blocks())
    }
}

impl Add for CoverageCounts {
    type Output = CoverageCounts;

    fn add(mut self, rhs: CoverageCounts) -> CoverageCounts {
        self += rhs;
        self
    }
}

/// Counters are `xs:unsignedInt` on disk, so sums saturate at `u32::MAX`.
impl AddAssign for CoverageCounts {
    fn add_assign(&mut self, rhs: CoverageCounts) {
        self.lines_covered = self.lines_covered.saturating_add(rhs.lines_covered);
        self.lines_partially_covered = self
            .lines_partially_covered
            .saturating_add(rhs.lines_partially_covered);
        self.lines_not_covered = self.lines_not_covered.saturating_add(rhs.lines_not_covered);
        self.blocks_covered = self.blocks_covered.saturating_add(rhs.blocks_covered);
        self.blocks_not_covered = self.blocks_not_covered.saturating_add(rhs.blocks_not_covered);
    }
}

impl Sum for CoverageCounts {
    fn sum<I: Iterator<Item = CoverageCounts>>(iter: I) -> Self {
        iter.fold(CoverageCounts::default(), Add::add)
    }
}

/// Pass/fail classification of a node against the coverage threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageLevel {
    Covered,
    PartiallyCovered,
    NotCovered,
}

impl CoverageLevel {
    /// Classify line coverage. Partial coverage only wins when the covered
    /// ratio alone misses the threshold.
    #[must_use]
    pub fn for_lines(counts: &CoverageCounts, threshold: f64) -> Self {
        if counts.lines_covered_ratio() >= threshold {
            CoverageLevel::Covered
        } else if counts.lines_partially_covered_ratio() >= threshold {
            CoverageLevel::PartiallyCovered
        } else {
            CoverageLevel::NotCovered
        }
    }

    /// Blocks have no partial state.
    #[must_use]
    pub fn for_blocks(counts: &CoverageCounts, threshold: f64) -> Self {
        if counts.blocks_covered_ratio() >= threshold {
            CoverageLevel::Covered
        } else {
            CoverageLevel::NotCovered
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            CoverageLevel::Covered => "✓",
            CoverageLevel::PartiallyCovered => "~",
            CoverageLevel::NotCovered => "✗",
        }
    }
}

/// How far an HTML report (or the grid) is expanded by default.
///
/// The numeric values are part of the report template contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum ViewLevel {
    Totals = 1,
    Modules = 2,
    Namespaces = 3,
    Classes = 4,
    Members = 5,
}

impl ViewLevel {
    pub fn depth(self) -> u8 {
        self as u8
    }
}

impl Default for ViewLevel {
    fn default() -> Self {
        ViewLevel::Classes
    }
}

impl std::str::FromStr for ViewLevel {
    type Err = CoverageError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "totals" | "1" => Ok(ViewLevel::Totals),
            "modules" | "2" => Ok(ViewLevel::Modules),
            "namespaces" | "3" => Ok(ViewLevel::Namespaces),
            "classes" | "4" => Ok(ViewLevel::Classes),
            "members" | "5" => Ok(ViewLevel::Members),
            _ => Err(CoverageError::Parse(format!(
                "Unknown view level: '{}'. Supported: totals, modules, namespaces, classes, members",
                s
            ))),
        }
    }
}

/// Output format of an HTML report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// One HTML file; the script dependency is loaded from its CDN.
    #[default]
    #[value(name = "single")]
    HtmlSingleFile,
    /// HTML file plus a `<name>_files` folder holding a local script copy.
    #[value(name = "multi")]
    HtmlMultiFile,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::HtmlSingleFile => "single",
            ReportFormat::HtmlMultiFile => "multi",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ReportFormat::HtmlSingleFile => "HTML single file (requires internet connection)",
            ReportFormat::HtmlMultiFile => "HTML file + folder (no internet connection)",
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = CoverageError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" | "html-single-file" => Ok(ReportFormat::HtmlSingleFile),
            "multi" | "html-multi-file" => Ok(ReportFormat::HtmlMultiFile),
            _ => Err(CoverageError::Parse(format!(
                "Unknown report format: '{}'. Supported: single, multi",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a caller supplies to generate a report.
#[derive(Debug, Clone)]
pub struct ReportConfiguration {
    pub destination_path: PathBuf,
    pub project_name: String,
    pub default_expansion: ViewLevel,
    pub report_format: ReportFormat,
    pub open_when_done: bool,
}

impl Default for ReportConfiguration {
    fn default() -> Self {
        Self {
            destination_path: PathBuf::new(),
            project_name: String::new(),
            default_expansion: ViewLevel::default(),
            report_format: ReportFormat::default(),
            open_when_done: true,
        }
    }
}
